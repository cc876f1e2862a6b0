// ============================================================================
// Gateway Handlers
// ============================================================================
//
// - auth.rs: register, login, refresh, logout
// - resources.rs: generic CRUD pass-through with reference pre-flight
// - users.rs: user records, credential changes go through the session manager
// - health.rs: health check and metrics
//
// ============================================================================

pub mod auth;
pub mod health;
pub mod resources;
pub mod users;
