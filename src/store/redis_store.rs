//! Redis-backed [`KvStore`]
//!
//! Uses a single multiplexed async connection, cloned per command. Lock
//! release is done with a Lua script so the token comparison and the delete
//! happen atomically on the server.

use crate::error::{CacheError, Result};
use crate::store::KvStore;
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{Client, Script, Value};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Compare-and-delete: remove KEYS[1] only when it holds ARGV[1]
const RELEASE_SCRIPT: &str = r#"
if redis.call('get', KEYS[1]) == ARGV[1] then
    return redis.call('del', KEYS[1])
end
return 0
"#;

/// Connection settings for [`RedisStore`]
#[derive(Debug, Clone)]
pub struct RedisStoreConfig {
    /// Redis URL, e.g. `redis://127.0.0.1:6379/0`
    pub url: String,
    /// Response time above which a health check logs a warning
    pub slow_threshold: Duration,
}

impl Default for RedisStoreConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            slow_threshold: Duration::from_millis(200),
        }
    }
}

impl RedisStoreConfig {
    /// Read `REDIS_URL` from the environment (and `.env`), keeping defaults otherwise
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        let mut config = Self::default();
        if let Ok(url) = std::env::var("REDIS_URL") {
            config.url = url;
        }
        config
    }
}

/// Redis client implementing the store operations used by this crate
#[derive(Clone)]
pub struct RedisStore {
    connection: MultiplexedConnection,
    config: RedisStoreConfig,
}

impl RedisStore {
    /// Connect with default settings to the given URL
    pub async fn new(url: &str) -> Result<Self> {
        Self::with_config(RedisStoreConfig {
            url: url.to_string(),
            ..Default::default()
        })
        .await
    }

    /// Connect using an explicit configuration
    pub async fn with_config(config: RedisStoreConfig) -> Result<Self> {
        info!("Connecting to Redis at {}", config.url);

        let client = Client::open(config.url.as_str())
            .map_err(|e| CacheError::ConfigError(e.to_string()))?;
        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| CacheError::StoreError(e.to_string()))?;

        info!("Successfully connected to Redis");

        Ok(Self { connection, config })
    }

    /// Round-trip a PING; returns `Ok(true)` when the server answers PONG
    pub async fn health_check(&self) -> Result<bool> {
        let started = Instant::now();
        let mut conn = self.connection.clone();
        let reply: String = redis::cmd("PING").query_async(&mut conn).await?;
        let elapsed = started.elapsed();

        if elapsed > self.config.slow_threshold {
            warn!("Redis health check slow: {:?}", elapsed);
        } else {
            debug!("Redis health check passed in {:?}", elapsed);
        }
        Ok(reply == "PONG")
    }
}

#[async_trait]
impl KvStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.connection.clone();
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let mut conn = self.connection.clone();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl {
            cmd.arg("PX").arg(ttl_millis(ttl));
        }
        let _: Value = cmd.query_async(&mut conn).await?;
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let mut conn = self.connection.clone();
        let reply: Value = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(ttl_millis(ttl))
            .query_async(&mut conn)
            .await?;
        Ok(!matches!(reply, Value::Nil))
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut conn = self.connection.clone();
        let removed: i64 = redis::cmd("DEL").arg(key).query_async(&mut conn).await?;
        Ok(removed > 0)
    }

    async fn increment(&self, key: &str) -> Result<i64> {
        let mut conn = self.connection.clone();
        let value: i64 = redis::cmd("INCR").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn delete_if_equals(&self, key: &str, expected: &str) -> Result<bool> {
        let mut conn = self.connection.clone();
        let removed: i64 = Script::new(RELEASE_SCRIPT)
            .key(key)
            .arg(expected)
            .invoke_async(&mut conn)
            .await?;
        Ok(removed > 0)
    }
}

/// Largest PX we send; Redis rejects expiries that overflow `now + PX` as an i64
const MAX_PX_MILLIS: u64 = (i64::MAX / 2) as u64;

/// Redis rejects a zero PX, so sub-millisecond TTLs round up to 1ms;
/// longer TTLs saturate at [`MAX_PX_MILLIS`]
fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis())
        .unwrap_or(u64::MAX)
        .clamp(1, MAX_PX_MILLIS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_millis_rounds_up() {
        assert_eq!(ttl_millis(Duration::from_micros(10)), 1);
        assert_eq!(ttl_millis(Duration::from_secs(2)), 2000);
    }

    #[test]
    fn test_ttl_millis_saturates_instead_of_wrapping() {
        assert_eq!(
            ttl_millis(Duration::new(18_446_744_073_709_551, 616_000_000)),
            MAX_PX_MILLIS
        );
        assert_eq!(ttl_millis(Duration::MAX), MAX_PX_MILLIS);
        assert_eq!(ttl_millis(Duration::from_millis(MAX_PX_MILLIS - 1)), MAX_PX_MILLIS - 1);
    }

    #[test]
    fn test_default_config() {
        let config = RedisStoreConfig::default();
        assert!(config.url.starts_with("redis://"));
        assert_eq!(config.slow_threshold, Duration::from_millis(200));
    }
}
