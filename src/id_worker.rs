//! Globally unique, time-ordered 64-bit IDs
//!
//! ```text
//! | 32 bits: seconds since BEGIN_TIMESTAMP | 32 bits: per-day sequence |
//! ```
//!
//! The sequence comes from `INCR icr:<prefix>:<yyMMdd>` on the shared store,
//! so any number of generator instances can run side by side. Both the
//! timestamp and the date partition use UTC.

use crate::cache::keys::counter_key;
use crate::error::{CacheError, Result};
use crate::store::KvStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::debug;

/// Custom epoch: 2023-01-01T00:00:00Z. Never change it; doing so can reissue IDs.
pub const BEGIN_TIMESTAMP: i64 = 1_672_531_200;

/// Width of the sequence field
pub const COUNT_BITS: u32 = 32;

const SEQUENCE_MASK: u64 = (1 << COUNT_BITS) - 1;

/// ID generator backed by the shared store's atomic increment
pub struct IdWorker {
    store: Arc<dyn KvStore>,
}

impl IdWorker {
    /// Create a generator on the given store
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Allocate the next ID for a business prefix (e.g. `"order"`)
    pub async fn next_id(&self, business_prefix: &str) -> Result<u64> {
        self.next_id_at(business_prefix, Utc::now()).await
    }

    /// Allocate an ID as if the current time were `now`
    pub async fn next_id_at(&self, business_prefix: &str, now: DateTime<Utc>) -> Result<u64> {
        let elapsed = now.timestamp() - BEGIN_TIMESTAMP;
        if elapsed < 0 {
            return Err(CacheError::ClockError(format!(
                "clock {} is before the ID epoch",
                now
            )));
        }
        if elapsed as u64 > u32::MAX as u64 {
            return Err(CacheError::ClockError(format!(
                "clock {} is past the end of the 32-bit timestamp range",
                now
            )));
        }

        let key = counter_key(business_prefix, &Self::date_partition(now));
        let sequence = self.store.increment(&key).await?;
        if sequence < 1 || sequence as u64 > SEQUENCE_MASK {
            return Err(CacheError::SequenceOverflow { key, sequence });
        }

        let id = ((elapsed as u64) << COUNT_BITS) | sequence as u64;
        debug!("Issued id {} from {} (sequence {})", id, key, sequence);
        Ok(id)
    }

    /// The `yyMMdd` counter partition for an instant
    pub fn date_partition(now: DateTime<Utc>) -> String {
        now.format("%y%m%d").to_string()
    }

    /// Seconds since [`BEGIN_TIMESTAMP`] encoded in an ID
    pub fn timestamp_of(id: u64) -> u64 {
        id >> COUNT_BITS
    }

    /// Wall-clock second at which an ID was issued
    pub fn issued_at(id: u64) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(BEGIN_TIMESTAMP + Self::timestamp_of(id) as i64, 0)
    }

    /// Per-day sequence encoded in an ID
    pub fn sequence_of(id: u64) -> u64 {
        id & SEQUENCE_MASK
    }
}
