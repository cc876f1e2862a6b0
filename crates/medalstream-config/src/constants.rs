// ============================================================================
// Configuration Constants
// ============================================================================

pub(crate) const DEFAULT_PORT: u16 = 8080;
pub(crate) const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";
pub(crate) const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

// Admission limiter: one request per second, bursts of five
pub(crate) const DEFAULT_RATE_PER_SECOND: f64 = 1.0;
pub(crate) const DEFAULT_BURST: u32 = 5;
pub(crate) const DEFAULT_LIMITER_SHARDS: usize = 16;
pub(crate) const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

pub(crate) const DEFAULT_ACCESS_TOKEN_TTL_SECS: u64 = SECONDS_PER_HOUR;
pub(crate) const DEFAULT_REFRESH_TOKEN_TTL_SECS: u64 = SECONDS_PER_DAY;
pub(crate) const DEFAULT_JWT_ISSUER: &str = "medalstream-gateway";
pub(crate) const DEFAULT_REFRESH_KEY_PREFIX: &str = "refresh:";

pub(crate) const DEFAULT_SERVICE_TIMEOUT_SECS: u64 = 10;
pub(crate) const DEFAULT_CB_FAILURE_THRESHOLD: u32 = 5;
pub(crate) const DEFAULT_CB_SUCCESS_THRESHOLD: u32 = 2;
pub(crate) const DEFAULT_CB_TIMEOUT_SECS: u64 = 60;

// Time conversion constants
pub(crate) const SECONDS_PER_HOUR: u64 = 3600;
pub(crate) const SECONDS_PER_DAY: u64 = 86400;

// Request bodies larger than this are rejected before any backend call
pub const MAX_REQUEST_BODY_SIZE: usize = 1024 * 1024;
