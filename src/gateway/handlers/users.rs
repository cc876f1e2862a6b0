// ============================================================================
// User Routes
// ============================================================================
//
// Reads and deletes are plain pass-through (see resources.rs). Anything that
// touches a credential goes through the session manager so the password is
// hashed before it leaves the gateway.
//
// ============================================================================

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::gateway::{Caller, GatewayState};
use crate::session::ProfileUpdate;
use crate::utils::SecureString;
use medalstream_error::AppError;

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<SecureString>,
    #[serde(default)]
    pub role: Option<String>,
}

/// PUT /users/:id
///
/// Omitted fields are left untouched; the stored hash only changes when a
/// new password is supplied.
pub async fn update(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<String>,
    caller: Caller,
    Json(request): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = state
        .sessions
        .update_profile(
            &id,
            ProfileUpdate {
                username: request.username,
                password: request.password,
                role: request.role,
            },
        )
        .await?;

    tracing::info!(
        entity = "user",
        authenticated = caller.0.is_some(),
        "Record updated"
    );
    Ok(Json(user))
}
