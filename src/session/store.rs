// ============================================================================
// Session Store
// ============================================================================
//
// Records which refresh tokens are live: token string -> principal id, with
// a TTL. The store is the only source of truth for refresh-token liveness;
// nothing is cached in the gateway.
//
// ============================================================================

use async_trait::async_trait;
use medalstream_redis::{RedisClient, RedisError};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] RedisError),

    #[error("session store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Record `token` as live for `principal_id` until `ttl` elapses
    async fn put(&self, token: &str, principal_id: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Principal id recorded for a live token
    async fn get(&self, token: &str) -> Result<Option<String>, StoreError>;

    /// `true` if an entry was removed
    async fn remove(&self, token: &str) -> Result<bool, StoreError>;

    /// Atomically retire `old` and record `new`, but only if `old` is still
    /// live for `principal_id`. Of two concurrent rotations of the same token
    /// exactly one returns `true`.
    async fn rotate(
        &self,
        old: &str,
        new: &str,
        principal_id: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

/// Redis-backed store; keys are `prefix + token`
pub struct RedisSessionStore {
    client: RedisClient,
    prefix: String,
}

impl RedisSessionStore {
    pub fn new(client: RedisClient, prefix: impl Into<String>) -> Self {
        Self {
            client,
            prefix: prefix.into(),
        }
    }

    fn key(&self, token: &str) -> String {
        format!("{}{}", self.prefix, token)
    }
}

// Never let a TTL round down to "no expiry"
fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn put(&self, token: &str, principal_id: &str, ttl: Duration) -> Result<(), StoreError> {
        // ConnectionManager clones share one multiplexed connection
        let mut client = self.client.clone();
        client
            .set_ex(&self.key(token), principal_id, ttl_secs(ttl))
            .await?;
        Ok(())
    }

    async fn get(&self, token: &str) -> Result<Option<String>, StoreError> {
        let mut client = self.client.clone();
        Ok(client.get(&self.key(token)).await?)
    }

    async fn remove(&self, token: &str) -> Result<bool, StoreError> {
        let mut client = self.client.clone();
        Ok(client.del(&self.key(token)).await? > 0)
    }

    async fn rotate(
        &self,
        old: &str,
        new: &str,
        principal_id: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let mut client = self.client.clone();
        Ok(client
            .swap_key(&self.key(old), &self.key(new), principal_id, ttl_secs(ttl))
            .await?)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut client = self.client.clone();
        client.ping().await?;
        Ok(())
    }
}

/// Process-local store for single-instance deployments and tests.
///
/// Expired entries are dropped when their token is touched and on every
/// insert, so tokens that are never presented again do not pile up.
#[derive(Default)]
pub struct InMemorySessionStore {
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries, expired or not
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop every expired entry, returning how many were removed
    pub async fn sweep(&self) -> usize {
        purge_expired(&mut *self.entries.lock().await, Instant::now())
    }
}

fn purge_expired(entries: &mut HashMap<String, (String, Instant)>, now: Instant) -> usize {
    let before = entries.len();
    entries.retain(|_, (_, expires_at)| *expires_at > now);
    before - entries.len()
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn put(&self, token: &str, principal_id: &str, ttl: Duration) -> Result<(), StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        purge_expired(&mut entries, now);
        entries.insert(token.to_string(), (principal_id.to_string(), now + ttl));
        Ok(())
    }

    async fn get(&self, token: &str) -> Result<Option<String>, StoreError> {
        let mut entries = self.entries.lock().await;
        match entries.get(token) {
            Some((principal_id, expires_at)) if *expires_at > Instant::now() => {
                Ok(Some(principal_id.clone()))
            }
            Some(_) => {
                entries.remove(token);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn remove(&self, token: &str) -> Result<bool, StoreError> {
        let mut entries = self.entries.lock().await;
        Ok(match entries.remove(token) {
            Some((_, expires_at)) => expires_at > Instant::now(),
            None => false,
        })
    }

    async fn rotate(
        &self,
        old: &str,
        new: &str,
        principal_id: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;

        let live_for_principal = matches!(
            entries.get(old),
            Some((owner, expires_at)) if owner == principal_id && *expires_at > now
        );
        if !live_for_principal {
            return Ok(false);
        }

        entries.remove(old);
        purge_expired(&mut entries, now);
        entries.insert(new.to_string(), (principal_id.to_string(), now + ttl));
        Ok(true)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
