// ============================================================================
// Session Configuration
// ============================================================================
//
// Token signing, token lifetimes and the session store key layout.
// Loaded once at startup; not hot-reloaded.
//
// ============================================================================

use crate::constants::*;
use anyhow::{Result, bail};

#[derive(Clone)]
pub struct SessionConfig {
    /// Shared HS256 signing secret
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub access_token_ttl_secs: u64,
    pub refresh_token_ttl_secs: u64,
    /// Session store key = prefix + refresh token string
    pub refresh_key_prefix: String,
    pub bcrypt_cost: u32,
    /// Require a bearer access token on mutating resource routes
    pub require_access_token: bool,
}

// Keep the secret out of logs
impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("jwt_secret", &"[REDACTED]")
            .field("jwt_issuer", &self.jwt_issuer)
            .field("access_token_ttl_secs", &self.access_token_ttl_secs)
            .field("refresh_token_ttl_secs", &self.refresh_token_ttl_secs)
            .field("refresh_key_prefix", &self.refresh_key_prefix)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .field("require_access_token", &self.require_access_token)
            .finish()
    }
}

impl SessionConfig {
    /// Configuration with default lifetimes around the given secret
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: secret.into(),
            jwt_issuer: DEFAULT_JWT_ISSUER.to_string(),
            access_token_ttl_secs: DEFAULT_ACCESS_TOKEN_TTL_SECS,
            refresh_token_ttl_secs: DEFAULT_REFRESH_TOKEN_TTL_SECS,
            refresh_key_prefix: DEFAULT_REFRESH_KEY_PREFIX.to_string(),
            bcrypt_cost: bcrypt::DEFAULT_COST,
            require_access_token: true,
        }
    }

    pub(crate) fn from_env() -> Result<Self> {
        let jwt_secret = std::env::var("JWT_SECRET").unwrap_or_default();
        if jwt_secret.trim().is_empty() {
            bail!("JWT_SECRET must be set to a non-empty value");
        }

        let defaults = Self::with_secret(jwt_secret);
        Ok(Self {
            jwt_issuer: std::env::var("JWT_ISSUER").unwrap_or(defaults.jwt_issuer.clone()),
            access_token_ttl_secs: std::env::var("ACCESS_TOKEN_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.access_token_ttl_secs),
            refresh_token_ttl_secs: std::env::var("REFRESH_TOKEN_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.refresh_token_ttl_secs),
            refresh_key_prefix: std::env::var("REFRESH_KEY_PREFIX")
                .unwrap_or(defaults.refresh_key_prefix.clone()),
            bcrypt_cost: std::env::var("BCRYPT_COST")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.bcrypt_cost),
            require_access_token: std::env::var("REQUIRE_ACCESS_TOKEN")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(defaults.require_access_token),
            ..defaults
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_lifetimes_are_one_hour_and_one_day() {
        let config = SessionConfig::with_secret("s3cret");
        assert_eq!(config.access_token_ttl_secs, 3600);
        assert_eq!(config.refresh_token_ttl_secs, 86400);
        assert_eq!(config.refresh_key_prefix, "refresh:");
    }

    #[test]
    fn debug_output_redacts_secret() {
        let config = SessionConfig::with_secret("super-secret-value");
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("super-secret-value"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
