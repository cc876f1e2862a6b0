// ============================================================================
// Cross-service validation
// ============================================================================
//
// Before a mutation is forwarded, every foreign id in its payload is looked
// up on the service that owns it. Checks run one at a time in declaration
// order and stop at the first failure, so an invalid request costs at most
// one wasted round-trip per earlier valid reference.
//
// This is a best-effort gate: a record can still be deleted between the
// check and the owning service's write, and nothing is rolled back if that
// write fails.
//
// ============================================================================

use crate::clients::ClientError;
use crate::entity::{EntityKind, EntityRecord};
use crate::metrics;
use crate::models::Liveness;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use medalstream_error::AppError;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, warn};

/// Existence lookups used by the orchestrator
#[async_trait]
pub trait EntityDirectory: Send + Sync {
    /// `Ok(None)` when the owning service does not know the id
    async fn lookup(&self, kind: EntityKind, id: &str) -> Result<Option<EntityRecord>, ClientError>;
}

/// One reference that must resolve to a live record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationRequest {
    pub kind: EntityKind,
    pub id: String,
}

impl ValidationRequest {
    pub fn new(kind: EntityKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

/// Create requires every declared reference; update checks only those present
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Create,
    Update,
}

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("{kind} {id} does not exist")]
    Missing { kind: EntityKind, id: String },

    #[error("{kind} {id} was deleted at {at}")]
    Deleted {
        kind: EntityKind,
        id: String,
        at: DateTime<Utc>,
    },

    #[error("{kind} {id} could not be checked: {source}")]
    Unavailable {
        kind: EntityKind,
        id: String,
        #[source]
        source: ClientError,
    },

    #[error("{field} is required")]
    MissingReference { kind: EntityKind, field: &'static str },

    #[error("{field} must be a string or number")]
    MalformedReference { kind: EntityKind, field: &'static str },
}

impl ValidationError {
    /// The referenced entity that failed
    pub fn kind(&self) -> EntityKind {
        match self {
            ValidationError::Missing { kind, .. }
            | ValidationError::Deleted { kind, .. }
            | ValidationError::Unavailable { kind, .. }
            | ValidationError::MissingReference { kind, .. }
            | ValidationError::MalformedReference { kind, .. } => *kind,
        }
    }

    fn caller_message(&self) -> String {
        match self {
            ValidationError::Missing { kind, .. } | ValidationError::Deleted { kind, .. } => {
                format!("{} with the provided ID does not exist or has been deleted", kind)
            }
            ValidationError::Unavailable { kind, .. } => {
                format!("{} with the provided ID could not be verified", kind)
            }
            ValidationError::MissingReference { field, .. } => format!("{} is required", field),
            ValidationError::MalformedReference { field, .. } => {
                format!("{} must be a string or number", field)
            }
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::validation_failed(err.kind().label(), err.caller_message())
    }
}

/// Collect the references a payload of `kind` declares.
pub fn references_from_payload(
    kind: EntityKind,
    payload: &Value,
    mode: WriteMode,
) -> Result<Vec<ValidationRequest>, ValidationError> {
    let mut checks = Vec::with_capacity(kind.references().len());

    for reference in kind.references() {
        let id = match payload.get(reference.field) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.trim().is_empty() => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(_) => {
                return Err(ValidationError::MalformedReference {
                    kind: reference.kind,
                    field: reference.field,
                });
            }
        };

        match (id, mode) {
            (Some(id), _) => checks.push(ValidationRequest::new(reference.kind, id)),
            (None, WriteMode::Create) => {
                return Err(ValidationError::MissingReference {
                    kind: reference.kind,
                    field: reference.field,
                });
            }
            (None, WriteMode::Update) => {}
        }
    }

    Ok(checks)
}

#[derive(Clone)]
pub struct ValidationOrchestrator {
    directory: Arc<dyn EntityDirectory>,
}

impl ValidationOrchestrator {
    pub fn new(directory: Arc<dyn EntityDirectory>) -> Self {
        Self { directory }
    }

    /// Resolve every check, in order, stopping at the first failure
    pub async fn validate(&self, checks: &[ValidationRequest]) -> Result<(), ValidationError> {
        for check in checks {
            if let Err(e) = self.check_one(check).await {
                metrics::VALIDATION_FAILURES_TOTAL
                    .with_label_values(&[check.kind.label()])
                    .inc();
                return Err(e);
            }
        }
        Ok(())
    }

    /// Extract references from `payload` and validate them
    pub async fn validate_payload(
        &self,
        kind: EntityKind,
        payload: &Value,
        mode: WriteMode,
    ) -> Result<(), ValidationError> {
        let checks = references_from_payload(kind, payload, mode)?;
        self.validate(&checks).await
    }

    async fn check_one(&self, check: &ValidationRequest) -> Result<(), ValidationError> {
        let record = match self.directory.lookup(check.kind, &check.id).await {
            Ok(record) => record,
            Err(source) => {
                error!(
                    entity = check.kind.label(),
                    id = %check.id,
                    dependency = source.service(),
                    error = %source,
                    "Reference lookup failed"
                );
                return Err(ValidationError::Unavailable {
                    kind: check.kind,
                    id: check.id.clone(),
                    source,
                });
            }
        };

        match record.as_ref().map(EntityRecord::liveness) {
            Some(Liveness::Live) => Ok(()),
            Some(Liveness::Deleted { at }) => {
                warn!(entity = check.kind.label(), id = %check.id, deleted_at = %at, "Referenced record is deleted");
                Err(ValidationError::Deleted {
                    kind: check.kind,
                    id: check.id.clone(),
                    at,
                })
            }
            None => {
                warn!(entity = check.kind.label(), id = %check.id, "Referenced record does not exist");
                Err(ValidationError::Missing {
                    kind: check.kind,
                    id: check.id.clone(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Directory answering from a fixed table and recording every lookup
    #[derive(Default)]
    struct TableDirectory {
        records: HashMap<(EntityKind, String), Value>,
        down: Option<EntityKind>,
        lookups: Mutex<Vec<EntityKind>>,
    }

    impl TableDirectory {
        fn with(mut self, kind: EntityKind, id: &str, body: Value) -> Self {
            self.records.insert((kind, id.to_string()), body);
            self
        }
    }

    #[async_trait]
    impl EntityDirectory for TableDirectory {
        async fn lookup(&self, kind: EntityKind, id: &str) -> Result<Option<EntityRecord>, ClientError> {
            self.lookups.lock().unwrap().push(kind);
            if self.down == Some(kind) {
                return Err(ClientError::Transport {
                    service: kind.service_name().to_string(),
                    message: "connection refused".to_string(),
                });
            }
            Ok(self
                .records
                .get(&(kind, id.to_string()))
                .map(|body| EntityRecord::new(kind, body.clone())))
        }
    }

    fn medal_payload() -> Value {
        json!({"country_id": "c1", "event_id": "e1", "athlete_id": "a1", "type": 0})
    }

    #[test]
    fn create_requires_every_reference() {
        let err = references_from_payload(
            EntityKind::Medal,
            &json!({"country_id": "c1", "athlete_id": "a1"}),
            WriteMode::Create,
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::MissingReference { field: "event_id", .. }));
    }

    #[test]
    fn update_checks_only_present_references() {
        let checks =
            references_from_payload(EntityKind::Medal, &json!({"athlete_id": "a9"}), WriteMode::Update)
                .unwrap();
        assert_eq!(checks, vec![ValidationRequest::new(EntityKind::Athlete, "a9")]);
    }

    #[test]
    fn numeric_ids_are_accepted_and_objects_rejected() {
        let checks =
            references_from_payload(EntityKind::Athlete, &json!({"country_id": 7}), WriteMode::Create)
                .unwrap();
        assert_eq!(checks[0].id, "7");

        let err = references_from_payload(
            EntityKind::Athlete,
            &json!({"country_id": {"id": 7}}),
            WriteMode::Create,
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::MalformedReference { .. }));
    }

    #[tokio::test]
    async fn stops_at_first_failure() {
        let directory = Arc::new(
            TableDirectory::default()
                .with(EntityKind::Country, "c1", json!({"id": "c1", "deleted_at": 0}))
                .with(EntityKind::Athlete, "a1", json!({"id": "a1", "deleted_at": 0})),
        );
        let orchestrator = ValidationOrchestrator::new(directory.clone());

        let err = orchestrator
            .validate_payload(EntityKind::Medal, &medal_payload(), WriteMode::Create)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), EntityKind::Event);
        // The athlete lookup never happened
        assert_eq!(
            *directory.lookups.lock().unwrap(),
            vec![EntityKind::Country, EntityKind::Event]
        );
    }

    #[tokio::test]
    async fn deleted_records_fail_like_missing_ones() {
        let directory = Arc::new(
            TableDirectory::default()
                .with(EntityKind::Country, "c1", json!({"id": "c1", "deleted_at": 1_722_470_400})),
        );
        let orchestrator = ValidationOrchestrator::new(directory);

        let err = orchestrator
            .validate(&[ValidationRequest::new(EntityKind::Country, "c1")])
            .await
            .unwrap_err();
        assert!(matches!(err, ValidationError::Deleted { .. }));

        let app: AppError = err.into();
        assert_eq!(
            app.user_message(),
            "Country with the provided ID does not exist or has been deleted"
        );
    }

    #[tokio::test]
    async fn transport_failure_names_the_entity() {
        let directory = Arc::new(TableDirectory {
            down: Some(EntityKind::Country),
            ..TableDirectory::default()
        });
        let orchestrator = ValidationOrchestrator::new(directory);

        let err = orchestrator
            .validate(&[ValidationRequest::new(EntityKind::Country, "c1")])
            .await
            .unwrap_err();
        assert!(matches!(err, ValidationError::Unavailable { kind: EntityKind::Country, .. }));

        let app: AppError = err.into();
        assert!(matches!(app, AppError::ValidationFailed { ref entity, .. } if entity == "country"));
    }

    #[tokio::test]
    async fn all_live_passes() {
        let directory = Arc::new(
            TableDirectory::default()
                .with(EntityKind::Country, "c1", json!({"deleted_at": 0}))
                .with(EntityKind::Event, "e1", json!({"deleted_at": null}))
                .with(EntityKind::Athlete, "a1", json!({})),
        );
        let orchestrator = ValidationOrchestrator::new(directory);
        orchestrator
            .validate_payload(EntityKind::Medal, &medal_payload(), WriteMode::Create)
            .await
            .unwrap();
    }
}
