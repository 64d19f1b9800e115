//! # Cache-Aside Client
//!
//! Read-through caching in front of a slow backing data store, sharing one
//! key-value store across every service instance.
//!
//! ## Strategies
//!
//! - **Pass-through (anti-penetration)**: absent records are cached as
//!   tombstones with a short TTL, so lookups of ids that do not exist stop
//!   reaching the backing store
//! - **Logical expiration (anti-breakdown)**: hot keys carry their own expiry
//!   inside the stored document and never physically expire; a stale read is
//!   served immediately while one caller per key rebuilds in the background
//! - **Mutex**: only the holder of a per-key lock may load a missing key;
//!   everyone else retries the cache after a short sleep
//!
//! ## Example
//!
//! ```rust
//! use cache_guard::cache::{keys::CACHE_SHOP_KEY, CacheClient, CacheConfig};
//! use cache_guard::store::{InMemoryStore, KvStore};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let store: Arc<dyn KvStore> = Arc::new(InMemoryStore::new());
//! let config = CacheConfig::builder()
//!     .default_ttl(Duration::from_secs(30 * 60))
//!     .null_ttl(Duration::from_secs(2 * 60))
//!     .build();
//!
//! let cache = CacheClient::new(store, config)?;
//!
//! let name: Option<String> = cache
//!     .query_with_pass_through(
//!         CACHE_SHOP_KEY,
//!         42u64,
//!         |id| async move { Ok(Some(format!("shop #{}", id))) },
//!         Duration::from_secs(30 * 60),
//!     )
//!     .await?;
//!
//! println!("{:?}", name);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod entry;
pub mod keys;
pub mod rebuild;
pub mod types;

pub use client::CacheClient;
pub use config::{CacheConfig, CacheConfigBuilder};
pub use entry::{LogicalEntry, Lookup, TOMBSTONE};
pub use rebuild::RebuildExecutor;
pub use types::{CacheKey, CacheStats};
