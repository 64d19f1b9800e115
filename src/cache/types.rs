//! Core type definitions for the cache system

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Cache key type - `<keyPrefix><id>` for cached records
pub type CacheKey = String;

/// Statistics and metrics for cache performance monitoring
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Reads answered from a cached value (fresh or stale)
    pub hits: u64,

    /// Reads that found nothing cached
    pub misses: u64,

    /// Reads answered by a tombstone without touching the backing store
    pub null_hits: u64,

    /// Logical-expiration reads that returned an expired payload
    pub stale_hits: u64,

    /// Number of loader invocations against the backing store
    pub backing_loads: u64,

    /// Background rebuilds submitted
    pub rebuilds_started: u64,

    /// Background rebuilds whose loader or write failed
    pub rebuilds_failed: u64,

    /// Lock acquisitions that found another holder
    pub lock_contentions: u64,
}

impl CacheStats {
    /// Calculate cache hit rate as a percentage (tombstone hits count as hits)
    pub fn hit_rate(&self) -> f64 {
        let answered = self.hits + self.null_hits;
        let total = answered + self.misses;
        if total == 0 {
            0.0
        } else {
            (answered as f64 / total as f64) * 100.0
        }
    }

    /// Calculate miss rate as a percentage
    pub fn miss_rate(&self) -> f64 {
        100.0 - self.hit_rate()
    }

    /// Share of reads that had to wait on the backing store, as a percentage
    pub fn backing_load_rate(&self) -> f64 {
        let total = self.hits + self.null_hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.backing_loads as f64 / total as f64) * 100.0
        }
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CacheStats {{ hits: {}, misses: {}, null_hits: {}, stale_hits: {}, hit_rate: {:.2}%, loads: {}, rebuilds: {}/{} failed }}",
            self.hits,
            self.misses,
            self.null_hits,
            self.stale_hits,
            self.hit_rate(),
            self.backing_loads,
            self.rebuilds_started,
            self.rebuilds_failed
        )
    }
}

/// Lock-free counters shared between request paths and rebuild tasks
#[derive(Debug, Default)]
pub(crate) struct StatsRecorder {
    hits: AtomicU64,
    misses: AtomicU64,
    null_hits: AtomicU64,
    stale_hits: AtomicU64,
    backing_loads: AtomicU64,
    rebuilds_started: AtomicU64,
    rebuilds_failed: AtomicU64,
    lock_contentions: AtomicU64,
}

/// Counter selector for [`StatsRecorder::record`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StatEvent {
    Hit,
    Miss,
    NullHit,
    StaleHit,
    BackingLoad,
    RebuildStarted,
    RebuildFailed,
    LockContention,
}

impl StatsRecorder {
    pub(crate) fn record(&self, event: StatEvent) {
        let counter = match event {
            StatEvent::Hit => &self.hits,
            StatEvent::Miss => &self.misses,
            StatEvent::NullHit => &self.null_hits,
            StatEvent::StaleHit => &self.stale_hits,
            StatEvent::BackingLoad => &self.backing_loads,
            StatEvent::RebuildStarted => &self.rebuilds_started,
            StatEvent::RebuildFailed => &self.rebuilds_failed,
            StatEvent::LockContention => &self.lock_contentions,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            null_hits: self.null_hits.load(Ordering::Relaxed),
            stale_hits: self.stale_hits.load(Ordering::Relaxed),
            backing_loads: self.backing_loads.load(Ordering::Relaxed),
            rebuilds_started: self.rebuilds_started.load(Ordering::Relaxed),
            rebuilds_failed: self.rebuilds_failed.load(Ordering::Relaxed),
            lock_contentions: self.lock_contentions.load(Ordering::Relaxed),
        }
    }
}
