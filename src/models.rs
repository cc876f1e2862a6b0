// ============================================================================
// Shared data model
// ============================================================================
//
// Records owned by the back-end services are mostly passed through as JSON.
// Only the parts the gateway reasons about get types: principals (for the
// session layer), soft-delete markers (for validation) and live frames.
//
// ============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Whether a record may still be referenced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    Live,
    Deleted { at: DateTime<Utc> },
}

/// Interpret a soft-delete marker.
///
/// The services encode "not deleted" as null, 0 or an empty string, and a
/// deletion as unix seconds or an RFC 3339 timestamp.
pub fn deletion_marker(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .filter(|secs| *secs > 0)
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0)),
        Value::String(s) if !s.is_empty() && s != "0" => DateTime::parse_from_rfc3339(s)
            .map(|at| at.with_timezone(&Utc))
            .ok()
            .or_else(|| s.parse::<i64>().ok().and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))),
        _ => None,
    }
}

fn deserialize_deleted_at<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(deletion_marker(&value))
}

/// A user record as stored by the user service
#[derive(Debug, Clone, Deserialize)]
pub struct Principal {
    pub id: String,
    pub username: String,
    #[serde(alias = "password")]
    pub password_hash: String,
    pub role: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default, deserialize_with = "deserialize_deleted_at")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Principal {
    pub fn liveness(&self) -> Liveness {
        match self.deleted_at {
            Some(at) => Liveness::Deleted { at },
            None => Liveness::Live,
        }
    }

    pub fn is_live(&self) -> bool {
        self.liveness() == Liveness::Live
    }

    pub fn public(&self) -> PublicPrincipal {
        PublicPrincipal {
            id: self.id.clone(),
            username: self.username.clone(),
            role: self.role.clone(),
            created_at: self.created_at.clone(),
            updated_at: self.updated_at.clone(),
        }
    }
}

/// What callers may see about a principal
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PublicPrincipal {
    pub id: String,
    pub username: String,
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// Body sent to the user service when creating a principal
#[derive(Debug, Clone, Serialize)]
pub struct NewPrincipal {
    pub username: String,
    pub password_hash: String,
    pub role: String,
}

/// Partial update sent to the user service; absent fields stay untouched
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct PrincipalPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
}

/// One frame on the live relay
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveStream {
    pub event_id: String,
    #[serde(default)]
    pub left_side: String,
    #[serde(default)]
    pub right_side: String,
    #[serde(default)]
    pub action: HashMap<String, String>,
    #[serde(default)]
    pub timestamp: String,
}

/// Remove credential material from a payload before it leaves the gateway
pub fn scrub_credentials(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.remove("password");
            map.remove("password_hash");
            for nested in map.values_mut() {
                scrub_credentials(nested);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(scrub_credentials),
        _ => {}
    }
}
