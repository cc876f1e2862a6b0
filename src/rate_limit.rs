//! Admission limiter
//!
//! Per-caller token bucket kept in gateway memory. Each bucket holds at most
//! `burst` tokens, refills continuously at `rate_per_second`, and a request
//! spends one token. Buckets live in a fixed set of independently locked
//! shards, so callers that hash to different shards never contend.

use medalstream_config::LimiterConfig;
use std::collections::HashMap;
use std::hash::{BuildHasher, RandomState};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

// Absorbs float error when a refill lands a hair under one whole token
const TOKEN_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy)]
pub struct RateBucket {
    tokens: f64,
    last_refill: Instant,
}

impl RateBucket {
    fn full(burst: f64, now: Instant) -> Self {
        Self {
            tokens: burst,
            last_refill: now,
        }
    }

    fn refill(&mut self, now: Instant, rate: f64, burst: f64) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * rate).min(burst);
        self.last_refill = now;
    }
}

type Shard = Mutex<HashMap<String, RateBucket>>;

pub struct AdmissionLimiter {
    rate_per_second: f64,
    burst: f64,
    shards: Box<[Shard]>,
    hasher: RandomState,
}

impl AdmissionLimiter {
    pub fn new(config: &LimiterConfig) -> Self {
        let shards = (0..config.shards.max(1))
            .map(|_| Mutex::new(HashMap::new()))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            rate_per_second: config.rate_per_second,
            burst: f64::from(config.burst),
            shards,
            hasher: RandomState::new(),
        }
    }

    /// Spend one token for `caller_key`; `false` means reject
    pub fn allow(&self, caller_key: &str) -> bool {
        self.check(caller_key).is_ok()
    }

    pub fn check(&self, caller_key: &str) -> Result<(), Duration> {
        self.check_at(caller_key, Instant::now())
    }

    /// On rejection returns how long until the next token is available
    pub fn check_at(&self, caller_key: &str, now: Instant) -> Result<(), Duration> {
        let mut shard = self.shard(caller_key);

        if let Some(bucket) = shard.get_mut(caller_key) {
            bucket.refill(now, self.rate_per_second, self.burst);
            return self.spend(bucket);
        }

        let bucket = shard
            .entry(caller_key.to_string())
            .or_insert_with(|| RateBucket::full(self.burst, now));
        self.spend(bucket)
    }

    fn spend(&self, bucket: &mut RateBucket) -> Result<(), Duration> {
        if bucket.tokens + TOKEN_EPSILON >= 1.0 {
            bucket.tokens = (bucket.tokens - 1.0).max(0.0);
            Ok(())
        } else {
            let missing = 1.0 - bucket.tokens;
            // Saturates for rates so low the wait does not fit in a Duration
            Err(Duration::try_from_secs_f64(missing / self.rate_per_second).unwrap_or(Duration::MAX))
        }
    }

    /// Drop buckets that have refilled to capacity.
    ///
    /// A full bucket is indistinguishable from one created on first sight,
    /// so eviction never changes an admission decision.
    pub fn sweep(&self, now: Instant) -> usize {
        let mut removed = 0;
        for shard in self.shards.iter() {
            let mut buckets = lock(shard);
            let before = buckets.len();
            buckets.retain(|_, bucket| {
                let elapsed = now.saturating_duration_since(bucket.last_refill).as_secs_f64();
                bucket.tokens + elapsed * self.rate_per_second + TOKEN_EPSILON < self.burst
            });
            removed += before - buckets.len();
        }
        removed
    }

    /// Number of tracked callers
    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| lock(shard).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Periodically evict idle buckets so unseen callers cannot grow memory forever
    pub fn spawn_sweeper(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let removed = self.sweep(Instant::now());
                if removed > 0 {
                    tracing::debug!(removed, remaining = self.len(), "Swept idle rate buckets");
                }
            }
        })
    }

    fn shard(&self, caller_key: &str) -> MutexGuard<'_, HashMap<String, RateBucket>> {
        let index = (self.hasher.hash_one(caller_key) % self.shards.len() as u64) as usize;
        lock(&self.shards[index])
    }
}

// Bucket state is two plain numbers; a panic mid-update cannot leave it inconsistent
fn lock(shard: &Shard) -> MutexGuard<'_, HashMap<String, RateBucket>> {
    shard.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(rate: f64, burst: u32) -> AdmissionLimiter {
        AdmissionLimiter::new(&LimiterConfig {
            rate_per_second: rate,
            burst,
            shards: 4,
            sweep_interval_secs: 60,
        })
    }

    #[test]
    fn fresh_caller_gets_exactly_burst() {
        let limiter = limiter(1.0, 5);
        let now = Instant::now();
        for _ in 0..5 {
            assert!(limiter.check_at("203.0.113.7", now).is_ok());
        }
        assert!(limiter.check_at("203.0.113.7", now).is_err());
    }

    #[test]
    fn refills_one_token_per_interval() {
        let limiter = limiter(4.0, 2);
        let start = Instant::now();
        assert!(limiter.check_at("a", start).is_ok());
        assert!(limiter.check_at("a", start).is_ok());
        assert!(limiter.check_at("a", start).is_err());

        let later = start + Duration::from_millis(250);
        assert!(limiter.check_at("a", later).is_ok());
        assert!(limiter.check_at("a", later).is_err());
    }

    #[test]
    fn vanishing_rate_saturates_retry_after() {
        let limiter = limiter(1e-20, 1);
        let now = Instant::now();
        assert!(limiter.check_at("slow", now).is_ok());
        assert_eq!(limiter.check_at("slow", now), Err(Duration::MAX));
    }

    #[test]
    fn retry_after_reflects_missing_fraction() {
        let limiter = limiter(2.0, 1);
        let now = Instant::now();
        assert!(limiter.check_at("a", now).is_ok());
        let wait = limiter.check_at("a", now).unwrap_err();
        assert_eq!(wait, Duration::from_millis(500));
    }

    #[test]
    fn callers_are_independent() {
        let limiter = limiter(1.0, 1);
        let now = Instant::now();
        assert!(limiter.check_at("a", now).is_ok());
        assert!(limiter.check_at("a", now).is_err());
        assert!(limiter.check_at("b", now).is_ok());
    }

    #[test]
    fn capacity_never_exceeds_burst() {
        let limiter = limiter(10.0, 3);
        let start = Instant::now();
        assert!(limiter.check_at("a", start).is_ok());
        let much_later = start + Duration::from_secs(3600);
        for _ in 0..3 {
            assert!(limiter.check_at("a", much_later).is_ok());
        }
        assert!(limiter.check_at("a", much_later).is_err());
    }

    #[test]
    fn sweep_only_evicts_refilled_buckets() {
        let limiter = limiter(1.0, 2);
        let start = Instant::now();
        assert!(limiter.check_at("idle", start).is_ok());
        assert!(limiter.check_at("busy", start + Duration::from_secs(1)).is_ok());
        assert!(limiter.check_at("busy", start + Duration::from_secs(1)).is_ok());
        assert_eq!(limiter.len(), 2);

        // "idle" is full again after 1s; "busy" needs until 3s
        assert_eq!(limiter.sweep(start + Duration::from_secs(2)), 1);
        assert_eq!(limiter.len(), 1);
        assert_eq!(limiter.sweep(start + Duration::from_secs(3)), 1);
        assert!(limiter.is_empty());
    }
}
