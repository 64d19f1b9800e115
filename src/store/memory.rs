//! In-memory key-value store with per-key TTL
//!
//! Expiry is measured with `tokio::time::Instant`, so tests running on a
//! paused runtime can move past a TTL with `tokio::time::advance`.

use crate::error::{CacheError, Result};
use crate::store::KvStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// A stored value with its optional physical deadline
#[derive(Debug, Clone)]
struct StoredItem {
    value: String,
    expires_at: Option<Instant>,
}

impl StoredItem {
    /// A TTL too large to represent as a deadline never expires
    fn new(value: &str, ttl: Option<Duration>) -> Self {
        Self {
            value: value.to_string(),
            expires_at: ttl.and_then(|ttl| Instant::now().checked_add(ttl)),
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.map(|deadline| now >= deadline).unwrap_or(false)
    }
}

/// Thread-safe in-memory [`KvStore`]
///
/// Every operation takes a single mutex, so `set_if_absent`, `increment`
/// and `delete_if_equals` are atomic with respect to each other, the same
/// guarantee a single Redis node gives.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    entries: Arc<Mutex<HashMap<String, StoredItem>>>,
}

impl InMemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Remaining physical TTL of a key
    ///
    /// `None` if the key is absent, `Some(None)` if it never expires.
    pub async fn ttl(&self, key: &str) -> Option<Option<Duration>> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        let item = Self::live_item(&mut entries, key, now)?;
        Some(item.expires_at.map(|deadline| deadline.saturating_duration_since(now)))
    }

    /// Number of live keys
    pub async fn len(&self) -> usize {
        let entries = self.entries.lock().await;
        let now = Instant::now();
        entries.values().filter(|item| !item.is_expired(now)).count()
    }

    /// Check if the store holds no live keys
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop every physically expired key, returning how many were removed
    pub async fn purge_expired(&self) -> usize {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        let before = entries.len();
        entries.retain(|_, item| !item.is_expired(now));
        let removed = before - entries.len();
        if removed > 0 {
            debug!("Purged {} expired keys", removed);
        }
        removed
    }

    /// Internal: look up a key, evicting it first if its TTL has passed
    fn live_item<'a>(
        entries: &'a mut HashMap<String, StoredItem>,
        key: &str,
        now: Instant,
    ) -> Option<&'a StoredItem> {
        if entries.get(key).map(|item| item.is_expired(now)).unwrap_or(false) {
            entries.remove(key);
        }
        entries.get(key)
    }
}

#[async_trait]
impl KvStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        Ok(Self::live_item(&mut entries, key, now).map(|item| item.value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let mut entries = self.entries.lock().await;
        entries.insert(key.to_string(), StoredItem::new(value, ttl));
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        if Self::live_item(&mut entries, key, now).is_some() {
            return Ok(false);
        }
        entries.insert(key.to_string(), StoredItem::new(value, Some(ttl)));
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        let live = Self::live_item(&mut entries, key, now).is_some();
        entries.remove(key);
        Ok(live)
    }

    async fn increment(&self, key: &str) -> Result<i64> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        let (current, expires_at) = match Self::live_item(&mut entries, key, now) {
            Some(item) => {
                let current = item.value.parse::<i64>().map_err(|_| {
                    CacheError::StoreError(format!("value at {} is not an integer", key))
                })?;
                (current, item.expires_at)
            }
            None => (0, None),
        };

        let next = current
            .checked_add(1)
            .ok_or_else(|| CacheError::StoreError(format!("increment overflow at {}", key)))?;
        entries.insert(
            key.to_string(),
            StoredItem {
                value: next.to_string(),
                expires_at,
            },
        );
        Ok(next)
    }

    async fn delete_if_equals(&self, key: &str, expected: &str) -> Result<bool> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        let matches = Self::live_item(&mut entries, key, now)
            .map(|item| item.value == expected)
            .unwrap_or(false);
        if matches {
            entries.remove(key);
        }
        Ok(matches)
    }
}
