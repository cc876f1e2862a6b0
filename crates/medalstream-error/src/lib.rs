// ============================================================================
// Medalstream Error - Gateway error taxonomy
// ============================================================================
//
// Every failure that reaches the HTTP boundary is one of:
// - AdmissionRejected: caller exceeded its rate budget (terminal)
// - ValidationFailed: a referenced record is missing, deleted or unreachable
// - AuthFailed: bad credentials or an unusable token (generic message only)
// - UpstreamUnavailable: an owning service or the session store is down
//
// Server-side failures are logged with full context and returned opaque.
//
// ============================================================================

use axum::{
    http::{HeaderValue, StatusCode, header},
    response::IntoResponse,
};
use serde_json::json;
use thiserror::Error;

/// Which authentication factor failed. Only used for logs; callers always
/// see the same generic message for a given kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    /// Unknown user, wrong password or deleted account
    InvalidCredentials,
    /// Forged, expired, wrong-purpose, rotated-out or absent token
    InvalidToken,
    /// No bearer token on a route that requires one
    MissingToken,
}

impl std::fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthFailure::InvalidCredentials => f.write_str("invalid credentials"),
            AuthFailure::InvalidToken => f.write_str("invalid token"),
            AuthFailure::MissingToken => f.write_str("missing token"),
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    // ===== Edge errors =====
    #[error("Admission rejected, retry after {retry_after_secs}s")]
    AdmissionRejected { retry_after_secs: u64 },

    #[error("Validation failed for {entity}: {message}")]
    ValidationFailed { entity: String, message: String },

    #[error("Authentication failed: {0}")]
    AuthFailed(AuthFailure),

    // ===== Dependency errors =====
    #[error("{dependency} unavailable: {message}")]
    UpstreamUnavailable { dependency: String, message: String },

    /// Non-success answer from an owning service, reported as-is
    #[error("{service} responded with {status}")]
    Upstream {
        service: String,
        status: u16,
        body: serde_json::Value,
    },

    // ===== Request errors =====
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ===== Internal Server Errors =====
    #[error("Unknown error: {0}")]
    Unknown(#[from] anyhow::Error),
}

impl AppError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::AdmissionRejected { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::ValidationFailed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::AuthFailed(_) => StatusCode::UNAUTHORIZED,
            AppError::UpstreamUnavailable { .. } => StatusCode::BAD_GATEWAY,
            AppError::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get a user-friendly error message (without sensitive details)
    pub fn user_message(&self) -> String {
        match self {
            AppError::AdmissionRejected { .. } => "Too many requests".to_string(),
            AppError::ValidationFailed { message, .. } => message.clone(),
            AppError::AuthFailed(AuthFailure::InvalidCredentials) => {
                "Invalid credentials".to_string()
            }
            AppError::AuthFailed(_) => "Invalid token".to_string(),
            AppError::UpstreamUnavailable { .. } => "Service temporarily unavailable".to_string(),
            AppError::Upstream { body, .. } => body
                .get("error")
                .and_then(|e| e.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| "Request rejected by service".to_string()),
            AppError::BadRequest(msg) => format!("Bad request: {}", msg),
            AppError::NotFound(msg) => format!("Not found: {}", msg),
            _ => "Internal server error".to_string(),
        }
    }

    /// Get error code for programmatic error handling
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::AdmissionRejected { .. } => "RATE_LIMIT_EXCEEDED",
            AppError::ValidationFailed { .. } => "VALIDATION_FAILED",
            AppError::AuthFailed(_) => "AUTH_FAILED",
            AppError::UpstreamUnavailable { .. } => "UPSTREAM_UNAVAILABLE",
            AppError::Upstream { .. } => "UPSTREAM_ERROR",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Json(_) => "JSON_ERROR",
            AppError::Unknown(_) => "UNKNOWN_ERROR",
        }
    }

    /// Log this error with appropriate level and context
    pub fn log(&self) {
        let status = self.status_code();
        let code = self.error_code();

        match self {
            AppError::UpstreamUnavailable { dependency, message } => {
                tracing::error!(
                    dependency = %dependency,
                    error = %message,
                    error_code = %code,
                    "Dependency unavailable"
                );
            }
            _ if status.is_server_error() => {
                tracing::error!(
                    error = %self,
                    error_code = %code,
                    status = %status.as_u16(),
                    "Server error occurred"
                );
            }
            _ if status == StatusCode::UNAUTHORIZED => {
                tracing::warn!(error = %self, error_code = %code, "Authentication failed");
            }
            _ => {
                tracing::debug!(error = %self, error_code = %code, "Client error occurred");
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        self.log();

        let status = self.status_code();
        let error_code = self.error_code();

        let response_body = if status.is_server_error() {
            // For server errors, don't expose internal details to client
            json!({
                "error": "Internal server error",
                "error_code": error_code,
                "status": status.as_u16(),
            })
        } else if let AppError::ValidationFailed { entity, .. } = &self {
            json!({
                "error": self.user_message(),
                "error_code": error_code,
                "entity": entity,
                "status": status.as_u16(),
            })
        } else {
            json!({
                "error": self.user_message(),
                "error_code": error_code,
                "status": status.as_u16(),
            })
        };

        let mut response = (status, axum::Json(response_body)).into_response();
        if let AppError::AdmissionRejected { retry_after_secs } = self
            && let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string())
        {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
        response
    }
}

// ============================================================================
// Helper functions for creating common errors
// ============================================================================

impl AppError {
    /// Create a validation failure naming the referenced entity
    pub fn validation_failed(entity: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::ValidationFailed {
            entity: entity.into(),
            message: message.into(),
        }
    }

    /// Create an upstream-unavailable error for the named dependency
    pub fn upstream_unavailable(dependency: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::UpstreamUnavailable {
            dependency: dependency.into(),
            message: message.into(),
        }
    }

    pub fn invalid_credentials() -> Self {
        AppError::AuthFailed(AuthFailure::InvalidCredentials)
    }

    pub fn invalid_token() -> Self {
        AppError::AuthFailed(AuthFailure::InvalidToken)
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        AppError::BadRequest(msg.into())
    }
}
