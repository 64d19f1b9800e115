//! # cache-guard
//!
//! Distributed caching and coordination toolkit for services that share one
//! key-value store (Redis or compatible).
//!
//! ## Features
//!
//! - Cache-aside reads with tombstones against cache penetration
//! - Logical expiration with single-flight background rebuilds against cache breakdown
//! - Mutex-guarded reads for keys that must never serve stale data
//! - Distributed locks with lease expiry and token-checked release
//! - Time-ordered 64-bit ID generation backed by an atomic counter
//! - Async-first design using tokio
//!
//! ## Cache Client
//!
//! ```no_run
//! use cache_guard::{CacheClient, CacheConfig, InMemoryStore, KvStore};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store: Arc<dyn KvStore> = Arc::new(InMemoryStore::new());
//!     let cache = CacheClient::new(store, CacheConfig::default())?;
//!
//!     // A missing record is cached as a tombstone for the null TTL
//!     let shop: Option<String> = cache
//!         .query_with_pass_through("cache:shop:", 999u64, |_| async { Ok(None) }, Duration::from_secs(1800))
//!         .await?;
//!     assert!(shop.is_none());
//!     Ok(())
//! }
//! ```
//!
//! ## Distributed Lock
//!
//! ```no_run
//! use cache_guard::{DistributedLock, InMemoryStore, KvStore};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store: Arc<dyn KvStore> = Arc::new(InMemoryStore::new());
//!     let lock = DistributedLock::new(store);
//!
//!     if let Some(token) = lock.try_acquire("order:1001", Duration::from_secs(10)).await? {
//!         // critical section
//!         lock.release(&token).await?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## ID Generation
//!
//! ```no_run
//! use cache_guard::{IdWorker, InMemoryStore, KvStore};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store: Arc<dyn KvStore> = Arc::new(InMemoryStore::new());
//!     let ids = IdWorker::new(store);
//!
//!     let order_id = ids.next_id("order").await?;
//!     println!("issued {} at {:?}", order_id, IdWorker::issued_at(order_id));
//!     Ok(())
//! }
//! ```
//!
//! ## Redis
//!
//! Enable the `redis` feature for [`store::RedisStore`]; the connection URL
//! comes from `REDIS_URL` (a `.env` file is honored).

pub mod cache;
pub mod error;
pub mod id_worker;
pub mod lock;
pub mod store;

// Re-export main types for convenience
pub use cache::{
    CacheClient, CacheConfig, CacheConfigBuilder, CacheKey, CacheStats, LogicalEntry,
    RebuildExecutor,
};
pub use error::{CacheError, Result};
pub use id_worker::IdWorker;
pub use lock::{DistributedLock, LockToken};
pub use store::{InMemoryStore, KvStore};
#[cfg(feature = "redis")]
pub use store::{RedisStore, RedisStoreConfig};
