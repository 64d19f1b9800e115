//! Cache-aside client with anti-penetration and anti-breakdown read strategies
//!
//! Every read strategy takes a key prefix, an id and a loader for the backing
//! data store. The loader runs only when the cache cannot answer, receives
//! the id, and returns `Ok(None)` when the record does not exist upstream.

use crate::cache::{
    config::CacheConfig,
    entry::{LogicalEntry, Lookup, TOMBSTONE},
    keys::{cache_key, lock_key},
    rebuild::RebuildExecutor,
    types::{CacheStats, StatEvent, StatsRecorder},
};
use crate::error::{CacheError, Result};
use crate::lock::{DistributedLock, LockToken};
use crate::store::KvStore;
use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Cache client over a shared key-value store
///
/// Cheap to clone; clones share the store connection, the rebuild pool,
/// the lock manager and the statistics.
#[derive(Clone)]
pub struct CacheClient {
    store: Arc<dyn KvStore>,
    config: CacheConfig,
    lock: Arc<DistributedLock>,
    executor: RebuildExecutor,
    stats: Arc<StatsRecorder>,
}

impl CacheClient {
    /// Create a client with a pooled rebuild executor sized from `config`
    pub fn new(store: Arc<dyn KvStore>, config: CacheConfig) -> Result<Self> {
        let executor = RebuildExecutor::new(config.rebuild_workers);
        Self::with_executor(store, config, executor)
    }

    /// Create a client that runs rebuilds on the given executor
    pub fn with_executor(
        store: Arc<dyn KvStore>,
        config: CacheConfig,
        executor: RebuildExecutor,
    ) -> Result<Self> {
        config.validate()?;
        info!("Initializing cache client with config: {:?}", config);

        let lock = Arc::new(DistributedLock::new(store.clone()));
        Ok(Self {
            store,
            config,
            lock,
            executor,
            stats: Arc::new(StatsRecorder::default()),
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn KvStore> {
        &self.store
    }

    /// Lock manager used for rebuild and mutex locks
    pub fn lock(&self) -> &DistributedLock {
        &self.lock
    }

    pub fn executor(&self) -> &RebuildExecutor {
        &self.executor
    }

    /// Snapshot of the read counters
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }

    /// Write `value` as JSON with a physical TTL
    pub async fn set<V>(&self, key: &str, value: &V, ttl: Duration) -> Result<()>
    where
        V: Serialize + ?Sized,
    {
        let json = serde_json::to_string(value)?;
        self.store.set(key, &json, Some(ttl)).await?;
        debug!("Cached {} (ttl {:?})", key, ttl);
        Ok(())
    }

    /// Write `value` wrapped in a logical-expiration envelope, with no physical TTL
    pub async fn set_with_logical_expire<V>(&self, key: &str, value: &V, ttl: Duration) -> Result<()>
    where
        V: Serialize + ?Sized,
    {
        let entry = LogicalEntry::new(value, ttl);
        self.store.set(key, &entry.to_json()?, None).await?;
        debug!("Cached {} with logical expiry at {}", key, entry.expire_at);
        Ok(())
    }

    /// Read and decode a value written by [`set`](Self::set)
    ///
    /// Tombstones and missing keys both read as `None`.
    pub async fn get<R: DeserializeOwned>(&self, key: &str) -> Result<Option<R>> {
        match self.lookup(key).await? {
            Lookup::Value(json) => decode(key, &json).map(Some),
            Lookup::Tombstone | Lookup::Missing => Ok(None),
        }
    }

    /// Drop a cached entry so the next read goes to the backing store
    pub async fn invalidate(&self, key: &str) -> Result<bool> {
        let removed = self.store.delete(key).await?;
        debug!("Invalidated {} (present: {})", key, removed);
        Ok(removed)
    }

    /// Run a write against the backing store, then invalidate `key`
    ///
    /// The cache is only touched after the write succeeds; a failed write
    /// leaves the cached entry alone.
    pub async fn update_then_invalidate<T, Fut>(&self, key: &str, write: Fut) -> Result<T>
    where
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let output = write.await.map_err(CacheError::BackingStore)?;
        self.invalidate(key).await?;
        Ok(output)
    }

    /// Cache-aside read that also caches absence
    ///
    /// On a miss the loader runs; a found record is cached for `ttl` (with
    /// jitter) and an absent one is cached as a tombstone for `null_ttl`,
    /// so repeated lookups of a nonexistent id stop reaching the backing store.
    pub async fn query_with_pass_through<R, ID, F, Fut>(
        &self,
        key_prefix: &str,
        id: ID,
        loader: F,
        ttl: Duration,
    ) -> Result<Option<R>>
    where
        R: Serialize + DeserializeOwned,
        ID: Display,
        F: FnOnce(ID) -> Fut,
        Fut: Future<Output = anyhow::Result<Option<R>>>,
    {
        let key = cache_key(key_prefix, &id);

        match self.lookup(&key).await? {
            Lookup::Value(json) => {
                self.stats.record(StatEvent::Hit);
                debug!("Cache hit: {}", key);
                return decode(&key, &json).map(Some);
            }
            Lookup::Tombstone => {
                self.stats.record(StatEvent::NullHit);
                debug!("Cache hit (tombstone): {}", key);
                return Ok(None);
            }
            Lookup::Missing => {
                self.stats.record(StatEvent::Miss);
                debug!("Cache miss: {}", key);
            }
        }

        self.stats.record(StatEvent::BackingLoad);
        let loaded = loader(id).await.map_err(CacheError::BackingStore)?;
        self.write_loaded(&key, loaded.as_ref(), ttl).await?;
        Ok(loaded)
    }

    /// Read a hot key that never physically expires
    ///
    /// Keys must be pre-warmed (see [`warm_logical`](Self::warm_logical));
    /// a missing key returns `None` without consulting the backing store.
    /// A stale entry is returned immediately while at most one caller per
    /// key, cluster-wide, schedules a rebuild on the executor.
    pub async fn query_with_logical_expire<R, ID, F, Fut>(
        &self,
        key_prefix: &str,
        id: ID,
        loader: F,
        ttl: Duration,
    ) -> Result<Option<R>>
    where
        R: Serialize + DeserializeOwned + Send + 'static,
        ID: Display + Send + 'static,
        F: FnOnce(ID) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<Option<R>>> + Send + 'static,
    {
        let key = cache_key(key_prefix, &id);

        let json = match self.lookup(&key).await? {
            Lookup::Value(json) => json,
            Lookup::Tombstone | Lookup::Missing => {
                self.stats.record(StatEvent::Miss);
                debug!("Logical cache miss (not warmed): {}", key);
                return Ok(None);
            }
        };

        let entry: LogicalEntry<R> = LogicalEntry::from_json(&json)?;
        self.stats.record(StatEvent::Hit);
        if !entry.is_expired() {
            debug!("Cache hit: {}", key);
            return Ok(Some(entry.payload));
        }

        self.stats.record(StatEvent::StaleHit);
        let token = match self.lock.try_acquire(&key, self.config.rebuild_lease).await? {
            Some(token) => token,
            None => {
                self.stats.record(StatEvent::LockContention);
                debug!("Rebuild already in flight for {}, serving stale", key);
                return Ok(Some(entry.payload));
            }
        };

        // Another holder may have finished a rebuild between our read and the acquire
        match self.fresh_logical::<R>(&key).await {
            Ok(Some(fresh)) => {
                debug!("{} was rebuilt while acquiring the lock", key);
                release_quietly(&self.lock, &token).await;
                return Ok(Some(fresh));
            }
            Ok(None) => {}
            Err(e) => warn!("Re-check of {} failed, rebuilding anyway: {}", key, e),
        }

        self.stats.record(StatEvent::RebuildStarted);
        info!("Scheduling rebuild of {}", key);
        let task = rebuild(
            self.store.clone(),
            self.lock.clone(),
            self.stats.clone(),
            key,
            token,
            id,
            loader,
            ttl,
        );
        self.executor.submit(task.boxed()).await;

        Ok(Some(entry.payload))
    }

    /// Cache-aside read where only the lock holder may load a missing key
    ///
    /// Callers that lose the race sleep `mutex_retry_delay` and read again,
    /// giving up with [`CacheError::LockTimeout`] after `mutex_max_retries`.
    pub async fn query_with_mutex<R, ID, F, Fut>(
        &self,
        key_prefix: &str,
        id: ID,
        loader: F,
        ttl: Duration,
    ) -> Result<Option<R>>
    where
        R: Serialize + DeserializeOwned,
        ID: Display,
        F: FnOnce(ID) -> Fut,
        Fut: Future<Output = anyhow::Result<Option<R>>>,
    {
        let key = cache_key(key_prefix, &id);
        let mut attempts: u32 = 0;

        loop {
            match self.lookup(&key).await? {
                Lookup::Value(json) => {
                    self.stats.record(StatEvent::Hit);
                    return decode(&key, &json).map(Some);
                }
                Lookup::Tombstone => {
                    self.stats.record(StatEvent::NullHit);
                    return Ok(None);
                }
                Lookup::Missing if attempts == 0 => {
                    self.stats.record(StatEvent::Miss);
                    debug!("Cache miss: {}", key);
                }
                Lookup::Missing => {}
            }

            attempts += 1;
            if let Some(token) = self.lock.try_acquire(&key, self.config.rebuild_lease).await? {
                let outcome = AssertUnwindSafe(self.load_under_lock(&key, id, loader, ttl))
                    .catch_unwind()
                    .await;
                release_quietly(&self.lock, &token).await;
                return match outcome {
                    Ok(result) => result,
                    Err(panic) => std::panic::resume_unwind(panic),
                };
            }

            self.stats.record(StatEvent::LockContention);
            if attempts > self.config.mutex_max_retries {
                warn!("Gave up waiting for {} after {} attempts", key, attempts);
                return Err(CacheError::LockTimeout {
                    key: lock_key(&key),
                    attempts,
                });
            }
            tokio::time::sleep(self.config.mutex_retry_delay).await;
        }
    }

    /// Load a record and store it under a logical-expiration envelope
    ///
    /// Returns `false` when the record does not exist upstream; nothing is written then.
    pub async fn warm_logical<R, ID, F, Fut>(
        &self,
        key_prefix: &str,
        id: ID,
        loader: F,
        ttl: Duration,
    ) -> Result<bool>
    where
        R: Serialize,
        ID: Display,
        F: FnOnce(ID) -> Fut,
        Fut: Future<Output = anyhow::Result<Option<R>>>,
    {
        let key = cache_key(key_prefix, &id);
        self.stats.record(StatEvent::BackingLoad);

        match loader(id).await.map_err(CacheError::BackingStore)? {
            Some(value) => {
                self.set_with_logical_expire(&key, &value, ttl).await?;
                info!("Warmed {}", key);
                Ok(true)
            }
            None => {
                warn!("Nothing to warm for {}: record does not exist", key);
                Ok(false)
            }
        }
    }

    async fn lookup(&self, key: &str) -> Result<Lookup> {
        Ok(Lookup::from_raw(self.store.get(key).await?))
    }

    async fn write_loaded<R: Serialize>(
        &self,
        key: &str,
        loaded: Option<&R>,
        ttl: Duration,
    ) -> Result<()> {
        match loaded {
            Some(value) => self.set(key, value, self.config.jittered(ttl)).await,
            None => {
                debug!("Caching tombstone for {} ({:?})", key, self.config.null_ttl);
                self.store
                    .set(key, TOMBSTONE, Some(self.config.null_ttl))
                    .await
            }
        }
    }

    async fn load_under_lock<R, ID, F, Fut>(
        &self,
        key: &str,
        id: ID,
        loader: F,
        ttl: Duration,
    ) -> Result<Option<R>>
    where
        R: Serialize + DeserializeOwned,
        F: FnOnce(ID) -> Fut,
        Fut: Future<Output = anyhow::Result<Option<R>>>,
    {
        // The previous holder may have filled the key before releasing
        match self.lookup(key).await? {
            Lookup::Value(json) => return decode(key, &json).map(Some),
            Lookup::Tombstone => return Ok(None),
            Lookup::Missing => {}
        }

        self.stats.record(StatEvent::BackingLoad);
        let loaded = loader(id).await.map_err(CacheError::BackingStore)?;
        self.write_loaded(key, loaded.as_ref(), ttl).await?;
        Ok(loaded)
    }

    async fn fresh_logical<R: DeserializeOwned>(&self, key: &str) -> Result<Option<R>> {
        match self.lookup(key).await? {
            Lookup::Value(json) => {
                let entry: LogicalEntry<R> = LogicalEntry::from_json(&json)?;
                Ok((!entry.is_expired()).then_some(entry.payload))
            }
            Lookup::Tombstone | Lookup::Missing => Ok(None),
        }
    }
}

fn decode<R: DeserializeOwned>(key: &str, json: &str) -> Result<R> {
    serde_json::from_str(json)
        .map_err(|e| CacheError::Serialization(format!("{}: {}", key, e)))
}

async fn release_quietly(lock: &DistributedLock, token: &LockToken) {
    if let Err(e) = lock.release(token).await {
        warn!("Failed to release {}: {}", token, e);
    }
}

/// Background rebuild of a logically expired key
///
/// Runs with the rebuild lock held and releases it on every exit path,
/// including a panicking loader.
#[allow(clippy::too_many_arguments)]
async fn rebuild<R, ID, F, Fut>(
    store: Arc<dyn KvStore>,
    lock: Arc<DistributedLock>,
    stats: Arc<StatsRecorder>,
    key: String,
    token: LockToken,
    id: ID,
    loader: F,
    ttl: Duration,
) where
    R: Serialize,
    F: FnOnce(ID) -> Fut,
    Fut: Future<Output = anyhow::Result<Option<R>>>,
{
    let outcome = AssertUnwindSafe(reload(store.as_ref(), &stats, &key, id, loader, ttl))
        .catch_unwind()
        .await;

    match outcome {
        Ok(Ok(())) => info!("Rebuilt {}", key),
        Ok(Err(e)) => {
            stats.record(StatEvent::RebuildFailed);
            error!("Rebuild of {} failed: {}", key, e);
        }
        Err(_) => {
            stats.record(StatEvent::RebuildFailed);
            error!("Rebuild of {} panicked", key);
        }
    }

    release_quietly(&lock, &token).await;
}

async fn reload<R, ID, F, Fut>(
    store: &dyn KvStore,
    stats: &StatsRecorder,
    key: &str,
    id: ID,
    loader: F,
    ttl: Duration,
) -> Result<()>
where
    R: Serialize,
    F: FnOnce(ID) -> Fut,
    Fut: Future<Output = anyhow::Result<Option<R>>>,
{
    stats.record(StatEvent::BackingLoad);
    match loader(id).await.map_err(CacheError::BackingStore)? {
        Some(value) => {
            let entry = LogicalEntry::new(value, ttl);
            store.set(key, &entry.to_json()?, None).await
        }
        None => {
            warn!("Record behind {} no longer exists, evicting", key);
            store.delete(key).await.map(|_| ())
        }
    }
}
