//! Integration tests for ID generation

use cache_guard::id_worker::{IdWorker, BEGIN_TIMESTAMP};
use cache_guard::store::{InMemoryStore, KvStore};
use chrono::{TimeZone, Utc};
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;

#[tokio::test]
async fn test_concurrent_ids_are_unique() {
    let store: Arc<dyn KvStore> = Arc::new(InMemoryStore::new());
    let workers: Vec<IdWorker> = (0..4).map(|_| IdWorker::new(store.clone())).collect();
    let now = Utc.with_ymd_and_hms(2024, 5, 20, 8, 30, 0).unwrap();

    let calls = (0..200).map(|i| workers[i % workers.len()].next_id_at("order", now));
    let ids: Vec<u64> = join_all(calls)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    let unique: HashSet<u64> = ids.iter().copied().collect();
    assert_eq!(unique.len(), ids.len());

    let mut sequences: Vec<u64> = ids.iter().map(|id| IdWorker::sequence_of(*id)).collect();
    sequences.sort_unstable();
    assert_eq!(sequences, (1..=200).collect::<Vec<u64>>());

    let counter = store.get("icr:order:240520").await.unwrap();
    assert_eq!(counter.as_deref(), Some("200"));
}

#[tokio::test]
async fn test_successive_ids_increase() {
    let store: Arc<dyn KvStore> = Arc::new(InMemoryStore::new());
    let worker = IdWorker::new(store);
    let start = Utc.with_ymd_and_hms(2024, 5, 20, 8, 30, 0).unwrap();

    let mut previous = 0;
    for offset in 0..50 {
        let now = start + chrono::Duration::seconds(offset / 10);
        let id = worker.next_id_at("order", now).await.unwrap();
        assert!(id > previous);
        assert_eq!(
            IdWorker::timestamp_of(id),
            (now.timestamp() - BEGIN_TIMESTAMP) as u64
        );
        previous = id;
    }
}

#[tokio::test]
async fn test_live_clock_ids() {
    let store: Arc<dyn KvStore> = Arc::new(InMemoryStore::new());
    let worker = IdWorker::new(store);

    let a = worker.next_id("voucher").await.unwrap();
    let b = worker.next_id("voucher").await.unwrap();
    assert!(b > a);
    assert!(IdWorker::issued_at(b).unwrap() <= Utc::now());
}
