// ============================================================================
// Resource Routes
// ============================================================================
//
// One set of handlers serves every owning service. The collection a request
// belongs to arrives as an `EntityKind` extension set by the router.
//
// Mutations are checked against the records their payload references before
// anything is forwarded; a failed check means the owning service never sees
// the write.
//
// ============================================================================

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::Value;
use std::sync::Arc;

use crate::clients::OwningService;
use crate::entity::EntityKind;
use crate::gateway::{Caller, GatewayState};
use crate::models::scrub_credentials;
use crate::validation::WriteMode;
use medalstream_error::AppError;

pub(crate) fn owning_service(
    state: &GatewayState,
    kind: EntityKind,
) -> Result<&Arc<dyn OwningService>, AppError> {
    state.registry.service(kind).ok_or_else(|| {
        AppError::upstream_unavailable(kind.service_name(), "no owning service registered")
    })
}

pub(crate) fn require_object(payload: &Value) -> Result<(), AppError> {
    if payload.is_object() {
        Ok(())
    } else {
        Err(AppError::bad_request("Request body must be a JSON object"))
    }
}

/// User records may carry credential material
pub(crate) fn outbound(kind: EntityKind, mut body: Value) -> Value {
    if kind == EntityKind::User {
        scrub_credentials(&mut body);
    }
    body
}

/// GET /{collection}
pub async fn list(
    State(state): State<Arc<GatewayState>>,
    Extension(kind): Extension<EntityKind>,
    Query(query): Query<Vec<(String, String)>>,
) -> Result<impl IntoResponse, AppError> {
    let body = owning_service(&state, kind)?.list(&query).await?;
    Ok(Json(outbound(kind, body)))
}

/// GET /{collection}/:id
pub async fn get(
    State(state): State<Arc<GatewayState>>,
    Extension(kind): Extension<EntityKind>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    match owning_service(&state, kind)?.get(&id).await? {
        Some(record) => Ok(Json(outbound(kind, record.into_body()))),
        None => Err(AppError::NotFound(format!("{} not found", kind))),
    }
}

/// POST /{collection}
pub async fn create(
    State(state): State<Arc<GatewayState>>,
    Extension(kind): Extension<EntityKind>,
    caller: Caller,
    Json(payload): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    require_object(&payload)?;
    state
        .validator
        .validate_payload(kind, &payload, WriteMode::Create)
        .await?;

    let body = owning_service(&state, kind)?.create(&payload).await?;
    tracing::info!(
        entity = kind.label(),
        authenticated = caller.0.is_some(),
        "Record created"
    );
    Ok((StatusCode::CREATED, Json(outbound(kind, body))))
}

/// PUT /{collection}/:id
///
/// Only references present in the payload are checked.
pub async fn update(
    State(state): State<Arc<GatewayState>>,
    Extension(kind): Extension<EntityKind>,
    Path(id): Path<String>,
    caller: Caller,
    Json(payload): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    require_object(&payload)?;
    state
        .validator
        .validate_payload(kind, &payload, WriteMode::Update)
        .await?;

    let body = owning_service(&state, kind)?.update(&id, &payload).await?;
    tracing::info!(
        entity = kind.label(),
        id = %id,
        authenticated = caller.0.is_some(),
        "Record updated"
    );
    Ok(Json(outbound(kind, body)))
}

/// DELETE /{collection}/:id
pub async fn delete(
    State(state): State<Arc<GatewayState>>,
    Extension(kind): Extension<EntityKind>,
    Path(id): Path<String>,
    caller: Caller,
) -> Result<impl IntoResponse, AppError> {
    let body = owning_service(&state, kind)?.delete(&id).await?;
    tracing::info!(
        entity = kind.label(),
        id = %id,
        authenticated = caller.0.is_some(),
        "Record deleted"
    );
    Ok(Json(outbound(kind, body)))
}
