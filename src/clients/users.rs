//! Principal lookups against the user service.
//!
//! The session layer never stores principals itself; it reads and writes them
//! through this interface.

use super::ClientError;
use super::owning::OwningService;
use crate::models::{NewPrincipal, Principal, PrincipalPatch};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

#[async_trait]
pub trait PrincipalDirectory: Send + Sync {
    async fn create_principal(&self, principal: &NewPrincipal) -> Result<Principal, ClientError>;

    /// The live principal with this username, if any
    async fn find_by_username(&self, username: &str) -> Result<Option<Principal>, ClientError>;

    async fn get_principal(&self, id: &str) -> Result<Option<Principal>, ClientError>;

    async fn update_principal(&self, id: &str, patch: &PrincipalPatch) -> Result<Principal, ClientError>;
}

/// `PrincipalDirectory` on top of the user service's REST collection
pub struct HttpPrincipalDirectory {
    users: Arc<dyn OwningService>,
}

impl HttpPrincipalDirectory {
    pub fn new(users: Arc<dyn OwningService>) -> Self {
        Self { users }
    }

    fn decode(&self, body: Value) -> Result<Principal, ClientError> {
        // Answers are either the bare record or wrapped as {"user": {...}}
        let record = match body {
            Value::Object(mut map) if map.contains_key("user") => {
                map.remove("user").unwrap_or(Value::Null)
            }
            other => other,
        };
        serde_json::from_value(record).map_err(|e| ClientError::Decode {
            service: self.users.kind().service_name().to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl PrincipalDirectory for HttpPrincipalDirectory {
    async fn create_principal(&self, principal: &NewPrincipal) -> Result<Principal, ClientError> {
        let payload = serde_json::to_value(principal).map_err(|e| ClientError::Decode {
            service: self.users.kind().service_name().to_string(),
            message: e.to_string(),
        })?;
        let body = self.users.create(&payload).await?;
        self.decode(body)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Principal>, ClientError> {
        let body = self
            .users
            .list(&[("username".to_string(), username.to_string())])
            .await?;

        let records = match body {
            Value::Array(items) => items,
            Value::Object(mut map) => match map.remove("users") {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            },
            _ => Vec::new(),
        };

        for record in records {
            let principal = self.decode(record)?;
            // The filter may be a prefix match on some backends
            if principal.username == username && principal.is_live() {
                return Ok(Some(principal));
            }
        }
        Ok(None)
    }

    async fn get_principal(&self, id: &str) -> Result<Option<Principal>, ClientError> {
        match self.users.get(id).await? {
            Some(record) => self.decode(record.into_body()).map(Some),
            None => Ok(None),
        }
    }

    async fn update_principal(&self, id: &str, patch: &PrincipalPatch) -> Result<Principal, ClientError> {
        let payload = serde_json::to_value(patch).map_err(|e| ClientError::Decode {
            service: self.users.kind().service_name().to_string(),
            message: e.to_string(),
        })?;
        let body = self.users.update(id, &payload).await?;
        self.decode(body)
    }
}
