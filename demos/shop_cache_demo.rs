//! Shop Cache Demo Application
//!
//! Walks through the three read strategies, the distributed lock and the ID
//! generator against the in-memory store.
//!
//! Usage:
//!   cargo run --example shop_cache_demo
//!
//! Environment variables:
//!   RUST_LOG             - log filter (default: info)
//!   CACHE_NULL_TTL_SECS  - tombstone TTL, see `CacheConfig::from_env`

use cache_guard::cache::keys::CACHE_SHOP_KEY;
use cache_guard::{CacheClient, CacheConfig, DistributedLock, IdWorker, InMemoryStore, KvStore};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Shop {
    id: u64,
    name: String,
    area: String,
}

/// Stand-in for the relational database
struct ShopTable {
    rows: HashMap<u64, Shop>,
}

impl ShopTable {
    fn seeded() -> Self {
        let rows = [(1, "Tea House", "Downtown"), (2, "Noodle Bar", "Harbor")]
            .into_iter()
            .map(|(id, name, area)| {
                (
                    id,
                    Shop {
                        id,
                        name: name.to_string(),
                        area: area.to_string(),
                    },
                )
            })
            .collect();
        Self { rows }
    }

    async fn find(&self, id: u64) -> anyhow::Result<Option<Shop>> {
        tokio::time::sleep(Duration::from_millis(50)).await;
        info!("DB query for shop {}", id);
        Ok(self.rows.get(&id).cloned())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("=== Shop Cache Demo ===");

    let db = Arc::new(ShopTable::seeded());
    let store: Arc<dyn KvStore> = Arc::new(InMemoryStore::new());
    let config = CacheConfig::from_env()?;
    let ttl = config.default_ttl;
    let logical_ttl = config.logical_ttl;
    let cache = CacheClient::new(store.clone(), config)?;

    info!("\n--- Pass-through (tombstones) ---");
    for id in [1u64, 1, 404, 404] {
        let db = db.clone();
        let shop: Option<Shop> = cache
            .query_with_pass_through(CACHE_SHOP_KEY, id, |id| async move { db.find(id).await }, ttl)
            .await?;
        info!("shop {} -> {:?}", id, shop.map(|s| s.name));
    }

    info!("\n--- Logical expiration ---");
    let db2 = db.clone();
    cache
        .warm_logical(CACHE_SHOP_KEY, 2u64, |id| async move { db2.find(id).await }, Duration::from_millis(100))
        .await?;
    tokio::time::sleep(Duration::from_millis(150)).await;

    let db3 = db.clone();
    let stale: Option<Shop> = cache
        .query_with_logical_expire(CACHE_SHOP_KEY, 2u64, move |id| async move { db3.find(id).await }, logical_ttl)
        .await?;
    info!("served while rebuilding: {:?}", stale.map(|s| s.name));
    cache.executor().wait_idle(Duration::from_secs(5)).await;

    info!("\n--- Mutex ---");
    cache.invalidate(&format!("{}1", CACHE_SHOP_KEY)).await?;
    let db4 = db.clone();
    let shop: Option<Shop> = cache
        .query_with_mutex(CACHE_SHOP_KEY, 1u64, |id| async move { db4.find(id).await }, ttl)
        .await?;
    info!("mutex read -> {:?}", shop.map(|s| s.name));

    info!("\n--- Distributed lock ---");
    let lock = DistributedLock::new(store.clone());
    if let Some(token) = lock.try_acquire("shop:1", Duration::from_secs(10)).await? {
        info!("holding {}", token);
        lock.release(&token).await?;
    }

    info!("\n--- ID generation ---");
    let ids = IdWorker::new(store);
    for _ in 0..3 {
        let id = ids.next_id("order").await?;
        info!(
            "order id {} (issued {:?}, seq {})",
            id,
            IdWorker::issued_at(id),
            IdWorker::sequence_of(id)
        );
    }

    info!("\n{}", cache.stats());
    Ok(())
}
