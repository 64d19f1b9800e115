//! Integration tests for the distributed lock
//!
//! Several lock managers stand in for separate service instances sharing one store.

use cache_guard::lock::DistributedLock;
use cache_guard::store::{InMemoryStore, KvStore};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;

fn instances(store: &Arc<InMemoryStore>, count: usize) -> Vec<DistributedLock> {
    (0..count)
        .map(|i| DistributedLock::with_instance_id(store.clone() as Arc<dyn KvStore>, format!("node{}", i)))
        .collect()
}

#[tokio::test]
async fn test_concurrent_acquire_has_single_winner() {
    let store = Arc::new(InMemoryStore::new());
    let nodes = instances(&store, 16);

    let attempts = nodes
        .iter()
        .map(|node| node.try_acquire("order:1001", Duration::from_secs(10)));
    let tokens: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    let winners: Vec<_> = tokens.iter().flatten().collect();
    assert_eq!(winners.len(), 1);
    assert_eq!(
        store.get("lock:order:1001").await.unwrap().as_deref(),
        Some(winners[0].value())
    );
}

#[tokio::test]
async fn test_lock_is_free_again_after_release() {
    let store = Arc::new(InMemoryStore::new());
    let nodes = instances(&store, 2);

    let token = nodes[0]
        .try_acquire("voucher:7", Duration::from_secs(10))
        .await
        .unwrap()
        .unwrap();
    assert!(nodes[1]
        .try_acquire("voucher:7", Duration::from_secs(10))
        .await
        .unwrap()
        .is_none());

    assert!(nodes[0].release(&token).await.unwrap());
    assert!(nodes[1]
        .try_acquire("voucher:7", Duration::from_secs(10))
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_foreign_token_cannot_release() {
    let store = Arc::new(InMemoryStore::new());
    let nodes = instances(&store, 2);

    let held = nodes[0]
        .try_acquire("order:1", Duration::from_secs(10))
        .await
        .unwrap()
        .unwrap();
    let other = nodes[1]
        .try_acquire("order:2", Duration::from_secs(10))
        .await
        .unwrap()
        .unwrap();

    // order:2 changed hands behind node1's back
    store.set("lock:order:2", held.value(), None).await.unwrap();
    assert!(!nodes[1].release(&other).await.unwrap());
    assert_eq!(
        store.get("lock:order:2").await.unwrap().as_deref(),
        Some(held.value())
    );
}

#[tokio::test(start_paused = true)]
async fn test_lease_expiry_frees_abandoned_lock() {
    let store = Arc::new(InMemoryStore::new());
    let nodes = instances(&store, 2);

    let _abandoned = nodes[0]
        .try_acquire("shop:9", Duration::from_secs(10))
        .await
        .unwrap()
        .unwrap();

    tokio::time::advance(Duration::from_secs(5)).await;
    assert!(nodes[1]
        .try_acquire("shop:9", Duration::from_secs(10))
        .await
        .unwrap()
        .is_none());

    tokio::time::advance(Duration::from_secs(6)).await;
    assert!(nodes[1]
        .try_acquire("shop:9", Duration::from_secs(10))
        .await
        .unwrap()
        .is_some());
}
