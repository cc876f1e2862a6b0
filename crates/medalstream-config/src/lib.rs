// ============================================================================
// Medalstream Config - Gateway configuration
// ============================================================================
//
// Configuration for the edge gateway, loaded from environment variables
// (and an optional .env file) with sensible defaults. Values are read once
// at process start.
//
// ============================================================================

mod constants;
mod limiter;
mod logging;
mod services;
mod session;

pub use constants::MAX_REQUEST_BODY_SIZE;
pub use limiter::LimiterConfig;
pub use logging::LoggingConfig;
pub use services::{CircuitBreakerConfig, ServicesConfig};
pub use session::SessionConfig;

use anyhow::{Result, bail};
use constants::*;

/// Where refresh-token liveness is recorded
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionBackend {
    Redis,
    /// Process-local map; only suitable for a single gateway instance
    Memory,
}

impl std::str::FromStr for SessionBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "redis" => Ok(SessionBackend::Redis),
            "memory" => Ok(SessionBackend::Memory),
            other => bail!("unknown SESSION_BACKEND '{}', expected 'redis' or 'memory'", other),
        }
    }
}

/// Main configuration structure for the gateway
#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    /// Whole-request deadline; covers validation checks and the forwarded call
    pub request_timeout_secs: u64,
    /// Honour X-Forwarded-For / X-Real-IP when keying the admission limiter
    pub trust_proxy_headers: bool,
    pub redis_url: String,
    pub session_backend: SessionBackend,

    // Sub-configurations
    pub session: SessionConfig,
    pub limiter: LimiterConfig,
    pub services: ServicesConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let session = SessionConfig::from_env()?;
        let limiter = LimiterConfig::from_env()?;
        let services = ServicesConfig::from_env();
        let logging = LoggingConfig::from_env()?;

        let session_backend = match std::env::var("SESSION_BACKEND") {
            Ok(value) => value.parse()?,
            Err(_) => SessionBackend::Redis,
        };

        Ok(Self {
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_PORT),
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            request_timeout_secs: std::env::var("REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            trust_proxy_headers: std::env::var("TRUST_PROXY_HEADERS")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            redis_url: std::env::var("REDIS_URL").unwrap_or_else(|_| DEFAULT_REDIS_URL.to_string()),
            session_backend,
            session,
            limiter,
            services,
            logging,
        })
    }
}
