//! Integration tests against a live Redis server
//!
//! These tests require a running Redis instance and the `redis` feature.
//! Run with: REDIS_URL=redis://localhost:6379 cargo test --features redis -- --ignored

#![cfg(feature = "redis")]

use cache_guard::cache::{CacheClient, CacheConfig, RebuildExecutor};
use cache_guard::lock::DistributedLock;
use cache_guard::store::{KvStore, RedisStore, RedisStoreConfig};
use cache_guard::IdWorker;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

async fn connect() -> Arc<RedisStore> {
    let store = RedisStore::with_config(RedisStoreConfig::from_env())
        .await
        .expect("Failed to connect to Redis");
    Arc::new(store)
}

// Keys are namespaced per run so parallel test runs do not collide
fn unique(prefix: &str) -> String {
    format!("{}{}:", prefix, Uuid::new_v4().simple())
}

#[tokio::test]
#[ignore] // Run with: cargo test --features redis -- --ignored
async fn test_health_check() {
    let store = connect().await;
    assert!(store.health_check().await.unwrap());
}

#[tokio::test]
#[ignore]
async fn test_basic_commands() {
    let store = connect().await;
    let key = unique("test:basic:");

    store.set(&key, "value", Some(Duration::from_secs(30))).await.unwrap();
    assert_eq!(store.get(&key).await.unwrap().as_deref(), Some("value"));
    assert!(!store
        .set_if_absent(&key, "other", Duration::from_secs(30))
        .await
        .unwrap());
    assert!(store.delete(&key).await.unwrap());
    assert!(store.get(&key).await.unwrap().is_none());
}

#[tokio::test]
#[ignore]
async fn test_compare_and_delete_script() {
    let store = connect().await;
    let key = unique("test:cad:");

    store.set(&key, "owner-a", Some(Duration::from_secs(30))).await.unwrap();
    assert!(!store.delete_if_equals(&key, "owner-b").await.unwrap());
    assert!(store.delete_if_equals(&key, "owner-a").await.unwrap());
    assert!(store.get(&key).await.unwrap().is_none());
}

#[tokio::test]
#[ignore]
async fn test_lock_round_trip() {
    let store = connect().await;
    let resource = unique("test:lock:");
    let a = DistributedLock::new(store.clone() as Arc<dyn KvStore>);
    let b = DistributedLock::new(store.clone() as Arc<dyn KvStore>);

    let token = a
        .try_acquire(&resource, Duration::from_secs(5))
        .await
        .unwrap()
        .expect("lock should be free");
    assert!(b.try_acquire(&resource, Duration::from_secs(5)).await.unwrap().is_none());
    assert!(a.release(&token).await.unwrap());
}

#[tokio::test]
#[ignore]
async fn test_ids_from_redis_counter() {
    let store = connect().await;
    let worker = IdWorker::new(store as Arc<dyn KvStore>);
    let prefix = Uuid::new_v4().simple().to_string();

    let first = worker.next_id(&prefix).await.unwrap();
    let second = worker.next_id(&prefix).await.unwrap();
    assert!(second > first);
}

#[tokio::test]
#[ignore]
async fn test_tombstone_in_redis() {
    let store = connect().await;
    let prefix = unique("test:item:");
    let cache = CacheClient::with_executor(
        store.clone() as Arc<dyn KvStore>,
        CacheConfig::default(),
        RebuildExecutor::inline(),
    )
    .unwrap();

    let result: Option<String> = cache
        .query_with_pass_through(&prefix, 42u64, |_| async { Ok(None) }, Duration::from_secs(60))
        .await
        .unwrap();
    assert!(result.is_none());
    assert_eq!(
        store.get(&format!("{}42", prefix)).await.unwrap().as_deref(),
        Some("")
    );
}
