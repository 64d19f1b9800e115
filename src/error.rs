//! Error types for cache, lock and ID operations
//!
//! This module defines the error type shared by every component of the crate.
//! Cache misses, confirmed absences (tombstones) and lock contention are not
//! errors; they are reported through `Ok(None)` by the relevant operations.

use thiserror::Error;

/// Main error type for cache-guard operations
#[derive(Error, Debug)]
pub enum CacheError {
    /// The remote key-value store failed or was unreachable
    #[error("Store error: {0}")]
    StoreError(String),

    /// A stored document could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A caller-supplied load or write against the backing data store failed
    #[error("Backing store error: {0}")]
    BackingStore(#[source] anyhow::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The per-day counter for a business prefix left the 32-bit sequence range
    #[error("Sequence overflow for counter {key}: {sequence} does not fit in 32 bits")]
    SequenceOverflow { key: String, sequence: i64 },

    /// The system clock is before the ID generator epoch
    #[error("Clock error: {0}")]
    ClockError(String),

    /// Gave up waiting for another holder to finish rebuilding a key
    #[error("Timed out waiting for lock {key} after {attempts} attempts")]
    LockTimeout { key: String, attempts: u32 },

    /// Generic error with context
    #[error("Error: {0}")]
    Other(String),
}

/// Result type alias for cache-guard operations
pub type Result<T> = std::result::Result<T, CacheError>;

impl From<String> for CacheError {
    fn from(s: String) -> Self {
        CacheError::Other(s)
    }
}

impl From<&str> for CacheError {
    fn from(s: &str) -> Self {
        CacheError::Other(s.to_string())
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(e: serde_json::Error) -> Self {
        CacheError::Serialization(e.to_string())
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for CacheError {
    fn from(e: redis::RedisError) -> Self {
        CacheError::StoreError(e.to_string())
    }
}
