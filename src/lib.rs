pub mod auth;
pub mod clients;
pub mod credentials;
pub mod entity;
pub mod gateway;
pub mod live;
pub mod metrics;
pub mod models;
pub mod rate_limit;
pub mod session;
pub mod utils;
pub mod validation;
