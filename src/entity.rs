//! Entity kinds known to the gateway and the references between them.

use crate::models::{Liveness, deletion_marker};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Country,
    Event,
    Athlete,
    Medal,
    User,
    LiveStream,
}

/// A payload field holding the id of another entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceSpec {
    pub field: &'static str,
    pub kind: EntityKind,
}

const ATHLETE_REFERENCES: &[ReferenceSpec] = &[ReferenceSpec {
    field: "country_id",
    kind: EntityKind::Country,
}];

// Checked in this order; the first failure stops the sequence
const MEDAL_REFERENCES: &[ReferenceSpec] = &[
    ReferenceSpec {
        field: "country_id",
        kind: EntityKind::Country,
    },
    ReferenceSpec {
        field: "event_id",
        kind: EntityKind::Event,
    },
    ReferenceSpec {
        field: "athlete_id",
        kind: EntityKind::Athlete,
    },
];

const LIVE_STREAM_REFERENCES: &[ReferenceSpec] = &[ReferenceSpec {
    field: "event_id",
    kind: EntityKind::Event,
}];

impl EntityKind {
    /// Lower-case singular name, used in error bodies and logs
    pub fn label(self) -> &'static str {
        match self {
            EntityKind::Country => "country",
            EntityKind::Event => "event",
            EntityKind::Athlete => "athlete",
            EntityKind::Medal => "medal",
            EntityKind::User => "user",
            EntityKind::LiveStream => "live",
        }
    }

    /// Path segment on the owning service
    pub fn collection(self) -> &'static str {
        match self {
            EntityKind::Country => "countries",
            EntityKind::Event => "events",
            EntityKind::Athlete => "athletes",
            EntityKind::Medal => "medals",
            EntityKind::User => "users",
            EntityKind::LiveStream => "live",
        }
    }

    pub fn service_name(self) -> &'static str {
        match self {
            EntityKind::Country => "country-service",
            EntityKind::Event => "event-service",
            EntityKind::Athlete => "athlete-service",
            EntityKind::Medal => "medal-service",
            EntityKind::User => "user-service",
            EntityKind::LiveStream => "live-service",
        }
    }

    /// Foreign references a payload of this kind declares
    pub fn references(self) -> &'static [ReferenceSpec] {
        match self {
            EntityKind::Athlete => ATHLETE_REFERENCES,
            EntityKind::Medal => MEDAL_REFERENCES,
            EntityKind::LiveStream => LIVE_STREAM_REFERENCES,
            EntityKind::Country | EntityKind::Event | EntityKind::User => &[],
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = self.label();
        let mut chars = label.chars();
        match chars.next() {
            Some(first) => write!(f, "{}{}", first.to_ascii_uppercase(), chars.as_str()),
            None => Ok(()),
        }
    }
}

/// A record returned by an owning service, kept as raw JSON
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRecord {
    kind: EntityKind,
    body: Value,
}

impl EntityRecord {
    pub fn new(kind: EntityKind, body: Value) -> Self {
        Self { kind, body }
    }

    pub fn into_body(self) -> Value {
        self.body
    }

    /// Read the soft-delete marker, either at the top level or inside the
    /// `{"success": .., "<kind>": {..}}` envelope some services answer with.
    pub fn liveness(&self) -> Liveness {
        let marker = self.body.get("deleted_at").or_else(|| {
            self.body
                .get(self.kind.label())
                .and_then(|inner| inner.get("deleted_at"))
        });

        match marker.and_then(deletion_marker) {
            Some(at) => Liveness::Deleted { at },
            None => Liveness::Live,
        }
    }
}
