//! Redis client implementation with connection management

use crate::Result;
use redis::{AsyncCommands, Script, aio::ConnectionManager};

/// Replaces `KEYS[1]` with `KEYS[2]` only while `KEYS[1]` still holds
/// `ARGV[1]`. Returns 1 when the swap happened, 0 otherwise.
const SWAP_KEY_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    redis.call('DEL', KEYS[1])
    redis.call('SET', KEYS[2], ARGV[1], 'EX', tonumber(ARGV[2]))
    return 1
end
return 0
"#;

/// Redis client with automatic reconnection
#[derive(Clone)]
pub struct RedisClient {
    conn: ConnectionManager,
    swap_script: Script,
}

impl RedisClient {
    /// Connect to Redis server
    ///
    /// Supports both redis:// and rediss:// (TLS) URLs
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self {
            conn,
            swap_script: Script::new(SWAP_KEY_SCRIPT),
        })
    }

    // ============================================================================
    // Key-Value Operations
    // ============================================================================

    /// GET - Get value by key
    pub async fn get(&mut self, key: &str) -> Result<Option<String>> {
        self.conn.get(key).await
    }

    /// SETEX - Set key with expiry in seconds
    pub async fn set_ex(&mut self, key: &str, value: &str, seconds: u64) -> Result<()> {
        self.conn.set_ex(key, value, seconds).await
    }

    /// DEL - Delete a key, returning how many keys were removed
    pub async fn del(&mut self, key: &str) -> Result<i64> {
        self.conn.del(key).await
    }

    /// EXISTS - Check if key exists
    pub async fn exists(&mut self, key: &str) -> Result<bool> {
        self.conn.exists(key).await
    }

    /// TTL - Get time to live in seconds
    pub async fn ttl(&mut self, key: &str) -> Result<i64> {
        self.conn.ttl(key).await
    }

    /// PING - Round-trip check used by health probes
    pub async fn ping(&mut self) -> Result<()> {
        let _: String = redis::cmd("PING").query_async(&mut self.conn).await?;
        Ok(())
    }

    // ============================================================================
    // Lua Scripts
    // ============================================================================

    /// Atomically move `expected` from `old_key` to `new_key` with a fresh expiry.
    ///
    /// Returns `false` without touching anything when `old_key` is absent or
    /// holds a different value.
    pub async fn swap_key(
        &mut self,
        old_key: &str,
        new_key: &str,
        expected: &str,
        seconds: u64,
    ) -> Result<bool> {
        let swapped: i64 = self
            .swap_script
            .key(old_key)
            .key(new_key)
            .arg(expected)
            .arg(seconds)
            .invoke_async(&mut self.conn)
            .await?;
        Ok(swapped == 1)
    }
}
