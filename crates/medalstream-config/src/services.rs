// ============================================================================
// Owning Service Endpoints
// ============================================================================
//
// Base URLs of the record services the gateway forwards to, plus the
// resilience settings shared by every outbound client.
//
// ============================================================================

use crate::constants::*;

#[derive(Clone, Debug)]
pub struct CircuitBreakerConfig {
    /// Failure threshold before opening circuit (default: 5)
    pub failure_threshold: u32,
    /// Success threshold to close circuit (default: 2)
    pub success_threshold: u32,
    /// Seconds before an open circuit lets a probe through (default: 60)
    pub timeout_secs: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_CB_FAILURE_THRESHOLD,
            success_threshold: DEFAULT_CB_SUCCESS_THRESHOLD,
            timeout_secs: DEFAULT_CB_TIMEOUT_SECS,
        }
    }
}

impl CircuitBreakerConfig {
    pub(crate) fn from_env() -> Self {
        Self {
            failure_threshold: std::env::var("CIRCUIT_BREAKER_FAILURE_THRESHOLD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_CB_FAILURE_THRESHOLD),
            success_threshold: std::env::var("CIRCUIT_BREAKER_SUCCESS_THRESHOLD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_CB_SUCCESS_THRESHOLD),
            timeout_secs: std::env::var("CIRCUIT_BREAKER_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_CB_TIMEOUT_SECS),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ServicesConfig {
    pub user_url: String,
    pub country_url: String,
    pub event_url: String,
    pub athlete_url: String,
    pub medal_url: String,
    pub live_url: String,
    /// Per-call timeout for outbound requests
    pub timeout_secs: u64,
    pub circuit_breaker: CircuitBreakerConfig,
}

impl ServicesConfig {
    pub(crate) fn from_env() -> Self {
        Self {
            user_url: service_url("USER_SERVICE_URL", 8081),
            country_url: service_url("COUNTRY_SERVICE_URL", 8082),
            event_url: service_url("EVENT_SERVICE_URL", 8083),
            athlete_url: service_url("ATHLETE_SERVICE_URL", 8084),
            medal_url: service_url("MEDAL_SERVICE_URL", 8085),
            live_url: service_url("LIVE_SERVICE_URL", 8086),
            timeout_secs: std::env::var("SERVICE_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_SERVICE_TIMEOUT_SECS),
            circuit_breaker: CircuitBreakerConfig::from_env(),
        }
    }
}

fn service_url(var: &str, default_port: u16) -> String {
    std::env::var(var)
        .map(|url| url.trim_end_matches('/').to_string())
        .unwrap_or_else(|_| format!("http://127.0.0.1:{}", default_port))
}
