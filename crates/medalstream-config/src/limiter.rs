// ============================================================================
// Admission Limiter Configuration
// ============================================================================

use crate::constants::*;
use anyhow::{Result, bail};

/// Token-bucket parameters applied per caller
#[derive(Clone, Debug)]
pub struct LimiterConfig {
    /// Continuous refill rate in tokens per second
    pub rate_per_second: f64,
    /// Bucket capacity; a fresh caller may send this many requests at once
    pub burst: u32,
    /// Number of independently locked shards in the bucket map
    pub shards: usize,
    /// How often idle buckets are swept out of memory
    pub sweep_interval_secs: u64,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            rate_per_second: DEFAULT_RATE_PER_SECOND,
            burst: DEFAULT_BURST,
            shards: DEFAULT_LIMITER_SHARDS,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
        }
    }
}

impl LimiterConfig {
    pub(crate) fn from_env() -> Result<Self> {
        let config = Self {
            rate_per_second: std::env::var("RATE_LIMIT_PER_SECOND")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_RATE_PER_SECOND),
            burst: std::env::var("RATE_LIMIT_BURST")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_BURST),
            shards: std::env::var("RATE_LIMIT_SHARDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_LIMITER_SHARDS),
            sweep_interval_secs: std::env::var("RATE_LIMIT_SWEEP_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_SWEEP_INTERVAL_SECS),
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject parameters that would make the bucket useless
    pub fn validate(&self) -> Result<()> {
        if !(self.rate_per_second.is_finite() && self.rate_per_second > 0.0) {
            bail!("RATE_LIMIT_PER_SECOND must be a positive number");
        }
        if self.burst == 0 {
            bail!("RATE_LIMIT_BURST must be at least 1");
        }
        if self.shards == 0 {
            bail!("RATE_LIMIT_SHARDS must be at least 1");
        }
        Ok(())
    }
}
