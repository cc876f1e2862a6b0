// ============================================================================
// Gateway Router
// ============================================================================
//
// Routing rules:
// - /auth/*                     → session manager
// - /users, /users/:id          → user service (PUT and POST via session manager)
// - /countries, /events,
//   /athletes, /medals          → owning service, references checked first
// - /users/filter, /medals/filter → same as the collection list
// - /live/:event_id             → live service
// - /live                       → websocket relay
// - /health, /metrics           → local, not subject to admission control
//
// ============================================================================

use axum::{
    Extension, Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
};
use medalstream_config::MAX_REQUEST_BODY_SIZE;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use super::GatewayState;
use super::handlers::{auth, health, resources, users};
use super::middleware::admission_control;
use crate::entity::EntityKind;
use crate::live;

fn collection_routes() -> Router<Arc<GatewayState>> {
    Router::new()
        .route("/", get(resources::list).post(resources::create))
        .route(
            "/:id",
            get(resources::get)
                .put(resources::update)
                .delete(resources::delete),
        )
}

/// Collection routes for one owning service
fn collection(kind: EntityKind) -> Router<Arc<GatewayState>> {
    collection_routes().layer(Extension(kind))
}

// Static segments win over `/:id`, so `filter` is never read as a medal id
fn medal_routes() -> Router<Arc<GatewayState>> {
    collection_routes()
        .route("/filter", get(resources::list))
        .layer(Extension(EntityKind::Medal))
}

fn user_routes() -> Router<Arc<GatewayState>> {
    Router::new()
        .route("/", get(resources::list).post(auth::register))
        .route("/filter", get(resources::list))
        .route(
            "/:id",
            get(resources::get)
                .put(users::update)
                .delete(resources::delete),
        )
        .layer(Extension(EntityKind::User))
}

pub fn build_router(state: Arc<GatewayState>) -> Router {
    let api = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/logout", post(auth::logout))
        .nest("/users", user_routes())
        .nest("/countries", collection(EntityKind::Country))
        .nest("/events", collection(EntityKind::Event))
        .nest("/athletes", collection(EntityKind::Athlete))
        .nest("/medals", medal_routes())
        .route("/live", get(live::relay))
        .route(
            "/live/:id",
            get(resources::get).layer(Extension(EntityKind::LiveStream)),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            admission_control,
        ));

    let ops = Router::new()
        .route("/health", get(health::health_check))
        .route("/metrics", get(health::metrics));

    let request_timeout = state.settings.request_timeout;

    api.merge(ops)
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_SIZE))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(request_timeout))
                .into_inner(),
        )
        .with_state(state)
}
