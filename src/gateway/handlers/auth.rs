// ============================================================================
// Authentication Routes
// ============================================================================
//
// Endpoints:
// - POST /auth/register - Create a principal (does not log in)
// - POST /auth/login    - Exchange credentials for an access/refresh pair
// - POST /auth/refresh  - Rotate a refresh token into a new pair
// - POST /auth/logout   - Retire a refresh token
//
// ============================================================================

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::gateway::GatewayState;
use crate::session::RegisterInput;
use crate::utils::SecureString;
use medalstream_error::AppError;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: SecureString,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: SecureString,
}

#[derive(Debug, Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

/// POST /auth/register
pub async fn register(
    State(state): State<Arc<GatewayState>>,
    Json(request): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = state
        .sessions
        .register(RegisterInput {
            username: request.username,
            password: request.password,
            role: request.role,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "User registered successfully",
            "user": user,
        })),
    ))
}

/// POST /auth/login
///
/// Unknown username and wrong password produce the same response.
pub async fn login(
    State(state): State<Arc<GatewayState>>,
    Json(request): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = state
        .sessions
        .login(&request.username, &request.password)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Login successful",
        "user": outcome.principal,
        "access_token": outcome.tokens.access_token,
        "refresh_token": outcome.tokens.refresh_token,
        "access_expires_at": outcome.tokens.access_expires_at,
        "refresh_expires_at": outcome.tokens.refresh_expires_at,
    })))
}

/// POST /auth/refresh
///
/// The presented token is retired; presenting it again fails.
pub async fn refresh(
    State(state): State<Arc<GatewayState>>,
    Json(request): Json<RefreshTokenRequest>,
) -> Result<impl IntoResponse, AppError> {
    let tokens = state.sessions.refresh(&request.refresh_token).await?;

    Ok(Json(json!({
        "success": true,
        "access_token": tokens.access_token,
        "refresh_token": tokens.refresh_token,
        "access_expires_at": tokens.access_expires_at,
        "refresh_expires_at": tokens.refresh_expires_at,
    })))
}

/// POST /auth/logout
pub async fn logout(
    State(state): State<Arc<GatewayState>>,
    Json(request): Json<RefreshTokenRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.sessions.logout(&request.refresh_token).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Logged out successfully",
    })))
}
