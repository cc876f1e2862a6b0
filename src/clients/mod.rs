// ============================================================================
// Owning-service clients
// ============================================================================
//
// Typed access to the services that own athletes, countries, events, medals,
// users and live streams. The gateway only ever reads records for existence
// checks and forwards mutations unchanged.
//
// ============================================================================

pub mod circuit_breaker;
pub mod owning;
pub mod registry;
pub mod service_client;
pub mod users;

pub use owning::{HttpOwningService, OwningService};
pub use registry::ServiceRegistry;
pub use service_client::{ServiceClient, ServiceResponse};
pub use users::{HttpPrincipalDirectory, PrincipalDirectory};

use medalstream_error::AppError;
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("{service} request failed: {message}")]
    Transport { service: String, message: String },

    #[error("{service} responded with {status}")]
    Upstream {
        service: String,
        status: u16,
        body: Value,
    },

    #[error("{service} circuit breaker is open")]
    CircuitOpen { service: String },

    #[error("{service} returned an unreadable body: {message}")]
    Decode { service: String, message: String },
}

impl ClientError {
    pub fn service(&self) -> &str {
        match self {
            ClientError::Transport { service, .. }
            | ClientError::Upstream { service, .. }
            | ClientError::CircuitOpen { service }
            | ClientError::Decode { service, .. } => service,
        }
    }
}

impl From<ClientError> for AppError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Upstream {
                service,
                status,
                body,
            } if status < 500 => AppError::Upstream {
                service,
                status,
                body,
            },
            other => AppError::upstream_unavailable(other.service().to_string(), other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use serde_json::json;

    #[test]
    fn client_errors_pass_through_but_outages_are_opaque() {
        let conflict: AppError = ClientError::Upstream {
            service: "user-service".into(),
            status: 409,
            body: json!({"error": "username taken"}),
        }
        .into();
        assert_eq!(conflict.status_code(), StatusCode::CONFLICT);
        assert_eq!(conflict.user_message(), "username taken");

        let outage: AppError = ClientError::Transport {
            service: "medal-service".into(),
            message: "connection refused".into(),
        }
        .into();
        assert_eq!(outage.status_code(), StatusCode::BAD_GATEWAY);
        assert!(matches!(
            outage,
            AppError::UpstreamUnavailable { ref dependency, .. } if dependency == "medal-service"
        ));
    }
}
