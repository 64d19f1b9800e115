//! Configuration for the cache client

use crate::error::{CacheError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Configuration for [`CacheClient`](crate::cache::CacheClient)
///
/// Defaults follow the shop cache this crate was built for:
/// - Positive entries: 30 minutes, with 10% jitter so keys written together
///   do not all expire together
/// - Tombstones: 2 minutes, short enough that a newly created record shows
///   up quickly
/// - Rebuild lease: 10 seconds, rebuild pool: 10 workers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheConfig {
    /// Physical TTL for positive entries when the caller has no opinion
    ///
    /// The client never reads it; callers pass it as the `ttl` argument.
    pub default_ttl: Duration,

    /// Physical TTL for the empty-string tombstone
    /// Must be shorter than `default_ttl`
    pub null_ttl: Duration,

    /// TTL jitter factor (0.0 - 1.0) applied to positive physical TTLs
    pub ttl_jitter: f64,

    /// Logical TTL for hot keys
    ///
    /// The client never reads it; callers pass it as the `ttl` argument of
    /// `warm_logical` and `query_with_logical_expire`.
    pub logical_ttl: Duration,

    /// Lease on the rebuild lock; bounds how long a stuck rebuild blocks others
    pub rebuild_lease: Duration,

    /// Number of background rebuilds allowed to run at once
    pub rebuild_workers: usize,

    /// Sleep between attempts while another task holds the rebuild lock
    pub mutex_retry_delay: Duration,

    /// Retries after the first failed acquisition before a mutex read gives up with `LockTimeout`
    pub mutex_max_retries: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(30 * 60),
            null_ttl: Duration::from_secs(2 * 60),
            ttl_jitter: 0.1,
            logical_ttl: Duration::from_secs(30 * 60),
            rebuild_lease: Duration::from_secs(10),
            rebuild_workers: 10,
            mutex_retry_delay: Duration::from_millis(50),
            mutex_max_retries: 100,
        }
    }
}

impl CacheConfig {
    /// Create a new builder for cache configuration
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }

    /// Load configuration from the environment, reading a `.env` file if present
    ///
    /// Unset variables keep their defaults; unparsable ones are an error.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        let defaults = Self::default();

        let config = Self {
            default_ttl: env_secs("CACHE_DEFAULT_TTL_SECS")?.unwrap_or(defaults.default_ttl),
            null_ttl: env_secs("CACHE_NULL_TTL_SECS")?.unwrap_or(defaults.null_ttl),
            ttl_jitter: env_parse("CACHE_TTL_JITTER")?.unwrap_or(defaults.ttl_jitter),
            logical_ttl: env_secs("CACHE_LOGICAL_TTL_SECS")?.unwrap_or(defaults.logical_ttl),
            rebuild_lease: env_secs("CACHE_REBUILD_LEASE_SECS")?
                .unwrap_or(defaults.rebuild_lease),
            rebuild_workers: env_parse("CACHE_REBUILD_WORKERS")?
                .unwrap_or(defaults.rebuild_workers),
            mutex_retry_delay: env_parse::<u64>("CACHE_MUTEX_RETRY_DELAY_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.mutex_retry_delay),
            mutex_max_retries: env_parse("CACHE_MUTEX_MAX_RETRIES")?
                .unwrap_or(defaults.mutex_max_retries),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.default_ttl.is_zero() {
            return Err(CacheError::ConfigError(
                "default_ttl must be greater than 0".to_string(),
            ));
        }

        if self.null_ttl.is_zero() || self.null_ttl >= self.default_ttl {
            return Err(CacheError::ConfigError(
                "null_ttl must be greater than 0 and shorter than default_ttl".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.ttl_jitter) {
            return Err(CacheError::ConfigError(
                "ttl_jitter must be between 0.0 and 1.0".to_string(),
            ));
        }

        if self.logical_ttl.is_zero() || self.rebuild_lease.is_zero() {
            return Err(CacheError::ConfigError(
                "logical_ttl and rebuild_lease must be greater than 0".to_string(),
            ));
        }

        if self.rebuild_workers == 0 {
            return Err(CacheError::ConfigError(
                "rebuild_workers must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Apply jitter to a positive-entry TTL
    ///
    /// The result stays within `ttl * (1 +/- ttl_jitter)`, saturating at
    /// `Duration::MAX`.
    pub fn jittered(&self, ttl: Duration) -> Duration {
        if self.ttl_jitter == 0.0 {
            return ttl;
        }

        let base_secs = ttl.as_secs_f64();
        let jitter_range = base_secs * self.ttl_jitter;
        let jitter = (rand::random::<f64>() * 2.0 - 1.0) * jitter_range;
        let final_secs = (base_secs + jitter).max(0.0);

        Duration::try_from_secs_f64(final_secs).unwrap_or(Duration::MAX)
    }
}

fn env_parse<T: FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| CacheError::ConfigError(format!("{} has invalid value {:?}", name, raw))),
        Err(_) => Ok(None),
    }
}

fn env_secs(name: &str) -> Result<Option<Duration>> {
    Ok(env_parse::<u64>(name)?.map(Duration::from_secs))
}

/// Builder for cache configuration
#[derive(Debug, Default)]
pub struct CacheConfigBuilder {
    default_ttl: Option<Duration>,
    null_ttl: Option<Duration>,
    ttl_jitter: Option<f64>,
    logical_ttl: Option<Duration>,
    rebuild_lease: Option<Duration>,
    rebuild_workers: Option<usize>,
    mutex_retry_delay: Option<Duration>,
    mutex_max_retries: Option<u32>,
}

impl CacheConfigBuilder {
    /// Set default TTL for positive entries
    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }

    /// Set TTL for tombstones
    pub fn null_ttl(mut self, ttl: Duration) -> Self {
        self.null_ttl = Some(ttl);
        self
    }

    /// Set TTL jitter factor (0.0 - 1.0)
    pub fn ttl_jitter(mut self, jitter: f64) -> Self {
        self.ttl_jitter = Some(jitter);
        self
    }

    /// Set logical TTL used by pre-warming
    pub fn logical_ttl(mut self, ttl: Duration) -> Self {
        self.logical_ttl = Some(ttl);
        self
    }

    /// Set the rebuild lock lease
    pub fn rebuild_lease(mut self, lease: Duration) -> Self {
        self.rebuild_lease = Some(lease);
        self
    }

    /// Set the number of concurrent background rebuilds
    pub fn rebuild_workers(mut self, workers: usize) -> Self {
        self.rebuild_workers = Some(workers);
        self
    }

    /// Set the delay between mutex read attempts
    pub fn mutex_retry_delay(mut self, delay: Duration) -> Self {
        self.mutex_retry_delay = Some(delay);
        self
    }

    /// Set the maximum number of mutex read attempts
    pub fn mutex_max_retries(mut self, retries: u32) -> Self {
        self.mutex_max_retries = Some(retries);
        self
    }

    /// Build the cache configuration
    pub fn build(self) -> CacheConfig {
        let defaults = CacheConfig::default();

        CacheConfig {
            default_ttl: self.default_ttl.unwrap_or(defaults.default_ttl),
            null_ttl: self.null_ttl.unwrap_or(defaults.null_ttl),
            ttl_jitter: self.ttl_jitter.unwrap_or(defaults.ttl_jitter),
            logical_ttl: self.logical_ttl.unwrap_or(defaults.logical_ttl),
            rebuild_lease: self.rebuild_lease.unwrap_or(defaults.rebuild_lease),
            rebuild_workers: self.rebuild_workers.unwrap_or(defaults.rebuild_workers),
            mutex_retry_delay: self.mutex_retry_delay.unwrap_or(defaults.mutex_retry_delay),
            mutex_max_retries: self.mutex_max_retries.unwrap_or(defaults.mutex_max_retries),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.default_ttl, Duration::from_secs(1800));
        assert_eq!(config.null_ttl, Duration::from_secs(120));
        assert_eq!(config.rebuild_workers, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut invalid = CacheConfig::default();
        invalid.rebuild_workers = 0;
        assert!(invalid.validate().is_err());

        let mut invalid = CacheConfig::default();
        invalid.ttl_jitter = 1.5;
        assert!(invalid.validate().is_err());

        let mut invalid = CacheConfig::default();
        invalid.null_ttl = invalid.default_ttl;
        assert!(matches!(invalid.validate(), Err(CacheError::ConfigError(_))));

        let mut invalid = CacheConfig::default();
        invalid.default_ttl = Duration::ZERO;
        assert!(invalid.validate().is_err());

        let mut invalid = CacheConfig::default();
        invalid.ttl_jitter = f64::NAN;
        assert!(matches!(invalid.validate(), Err(CacheError::ConfigError(_))));
    }

    #[test]
    fn test_config_builder() {
        let config = CacheConfig::builder()
            .default_ttl(Duration::from_secs(600))
            .null_ttl(Duration::from_secs(30))
            .rebuild_workers(4)
            .build();

        assert_eq!(config.default_ttl, Duration::from_secs(600));
        assert_eq!(config.null_ttl, Duration::from_secs(30));
        assert_eq!(config.rebuild_workers, 4);
        assert_eq!(config.rebuild_lease, Duration::from_secs(10));
    }

    #[test]
    fn test_jittered_ttl() {
        let config = CacheConfig {
            ttl_jitter: 0.1,
            ..Default::default()
        };

        let ttl = config.jittered(Duration::from_secs(3600));
        assert!(ttl.as_secs_f64() >= 3600.0 - 360.0);
        assert!(ttl.as_secs_f64() <= 3600.0 + 360.0);

        let exact = CacheConfig {
            ttl_jitter: 0.0,
            ..Default::default()
        };
        assert_eq!(exact.jittered(Duration::from_secs(60)), Duration::from_secs(60));
    }

    #[test]
    fn test_jittered_ttl_saturates() {
        let config = CacheConfig {
            ttl_jitter: 0.5,
            ..Default::default()
        };

        for _ in 0..32 {
            let ttl = config.jittered(Duration::from_secs(u64::MAX - 10));
            assert!(ttl >= Duration::from_secs(u64::MAX / 4));
        }
        let _ = config.jittered(Duration::MAX);
    }

    #[test]
    fn test_jittered_sub_second_ttl_is_not_raised() {
        let config = CacheConfig {
            ttl_jitter: 0.2,
            ..Default::default()
        };

        for _ in 0..32 {
            let ttl = config.jittered(Duration::from_millis(500));
            assert!(ttl >= Duration::from_millis(400));
            assert!(ttl <= Duration::from_millis(600));
        }
    }

    #[test]
    fn test_env_parse_rejects_garbage() {
        std::env::set_var("CACHE_GUARD_TEST_WORKERS", "lots");
        let parsed = env_parse::<usize>("CACHE_GUARD_TEST_WORKERS");
        assert!(matches!(parsed, Err(CacheError::ConfigError(_))));

        std::env::set_var("CACHE_GUARD_TEST_WORKERS", " 8 ");
        assert_eq!(env_parse::<usize>("CACHE_GUARD_TEST_WORKERS").unwrap(), Some(8));

        assert_eq!(env_parse::<usize>("CACHE_GUARD_TEST_UNSET").unwrap(), None);
    }
}
