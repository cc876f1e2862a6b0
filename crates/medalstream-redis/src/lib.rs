//! # Medalstream Redis
//!
//! Low-level Redis client for the medalstream gateway.
//!
//! - Connection management with automatic reconnection
//! - Key-value operations with expiry
//! - Atomic compare-and-rename of a key (Lua)
//!
//! No business logic lives here; key layout belongs to the caller.
//!
//! ```rust,no_run
//! use medalstream_redis::RedisClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = RedisClient::connect("redis://localhost:6379").await?;
//!     client.set_ex("key", "value", 3600).await?;
//!     let value = client.get("key").await?;
//!     assert_eq!(value.as_deref(), Some("value"));
//!     Ok(())
//! }
//! ```

mod client;

pub use client::RedisClient;

// Re-export commonly used types
pub use redis::RedisError;

/// Result type for Redis operations
pub type Result<T> = std::result::Result<T, RedisError>;
