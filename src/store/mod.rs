//! Remote key-value store abstraction
//!
//! Every component in this crate talks to the shared store through the
//! [`KvStore`] trait. Values are UTF-8 strings (JSON documents, lock tokens
//! and the empty-string tombstone), matching how a Redis string template
//! stores them.
//!
//! Two implementations are provided:
//! - [`InMemoryStore`]: a TTL-aware map for tests and single-process use
//! - `RedisStore` (feature `redis`): a multiplexed async Redis connection

pub mod memory;
#[cfg(feature = "redis")]
pub mod redis_store;

use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

pub use memory::InMemoryStore;
#[cfg(feature = "redis")]
pub use redis_store::{RedisStore, RedisStoreConfig};

/// Minimal operation set required from the shared store
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Read a value; `None` when the key is absent or physically expired
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, with a physical TTL when `ttl` is `Some`
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()>;

    /// Write a value only if the key is absent; returns whether the write happened
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool>;

    /// Delete a key; returns whether a key was removed
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Atomically increment an integer key, creating it at 0 first if absent
    async fn increment(&self, key: &str) -> Result<i64>;

    /// Delete a key only if it currently holds `expected`
    ///
    /// The default implementation reads then deletes, which leaves a small
    /// window between the two calls. Stores that can do better (a Lua script
    /// on Redis) should override it.
    async fn delete_if_equals(&self, key: &str, expected: &str) -> Result<bool> {
        match self.get(key).await? {
            Some(current) if current == expected => self.delete(key).await,
            _ => Ok(false),
        }
    }
}
