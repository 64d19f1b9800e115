//! Distributed mutual exclusion on top of the shared store
//!
//! A lock is a `lock:<resource>` key written with SET-if-absent and a lease
//! (store-side TTL). The value is a token unique to one acquisition, and
//! release deletes the key only while it still holds that token. If the
//! lease ran out and someone else took the lock, release leaves their record
//! alone.
//!
//! Acquisition never waits or retries; callers pick their own policy.

use crate::cache::keys::lock_key;
use crate::error::Result;
use crate::store::KvStore;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

/// Proof of a successful acquisition, required to release
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockToken {
    key: String,
    value: String,
}

impl LockToken {
    /// The lock record key (`lock:<resource>`)
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The holder identity stored in the record
    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for LockToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

/// Lock manager for one process instance
///
/// Tokens are `<instance-uuid>-<n>` where `n` counts acquisitions made
/// through this manager, so two tasks in the same process never share one.
pub struct DistributedLock {
    store: Arc<dyn KvStore>,
    instance_id: String,
    sequence: AtomicU64,
}

impl DistributedLock {
    /// Create a lock manager with a fresh instance identity
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self::with_instance_id(store, Uuid::new_v4().simple().to_string())
    }

    /// Create a lock manager with an explicit instance identity
    pub fn with_instance_id(store: Arc<dyn KvStore>, instance_id: impl Into<String>) -> Self {
        Self {
            store,
            instance_id: instance_id.into(),
            sequence: AtomicU64::new(0),
        }
    }

    /// The identity prefix of every token issued by this manager
    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Try once to take `lock:<resource_name>` for `lease`
    ///
    /// Returns `Ok(None)` when another holder has it.
    pub async fn try_acquire(
        &self,
        resource_name: &str,
        lease: Duration,
    ) -> Result<Option<LockToken>> {
        let key = lock_key(resource_name);
        let n = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let value = format!("{}-{}", self.instance_id, n);

        if self.store.set_if_absent(&key, &value, lease).await? {
            debug!("Acquired lock {} (lease {:?})", key, lease);
            Ok(Some(LockToken { key, value }))
        } else {
            debug!("Lock busy: {}", key);
            Ok(None)
        }
    }

    /// Release a lock if the record still carries this token
    ///
    /// Returns `false` when the record is gone or now belongs to another holder.
    pub async fn release(&self, token: &LockToken) -> Result<bool> {
        let released = self
            .store
            .delete_if_equals(&token.key, &token.value)
            .await?;

        if released {
            debug!("Released lock {}", token.key);
        } else {
            warn!(
                "Lock {} no longer held by {} (lease expired?)",
                token.key, token.value
            );
        }
        Ok(released)
    }
}
