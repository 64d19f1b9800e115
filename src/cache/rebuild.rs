//! Bounded executor for background cache rebuilds
//!
//! Rebuild tasks are spawned onto the tokio runtime but only `workers` of
//! them run at once; the rest wait for a semaphore permit. The pool is shared
//! by every key, so size it for the number of hot keys that can expire
//! together.

use futures::future::BoxFuture;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, Semaphore};
use tracing::{debug, warn};

#[derive(Debug)]
enum Mode {
    /// Spawn onto the runtime, at most N running concurrently
    Pooled(Arc<Semaphore>),
    /// Run to completion on the submitting task
    Inline,
}

/// Submitted-but-unfinished task count, with a wakeup when it reaches zero
#[derive(Debug, Default)]
struct InFlight {
    count: AtomicUsize,
    idle: Notify,
}

/// Decrements [`InFlight`] when a task finishes, panics included
struct InFlightGuard(Arc<InFlight>);

impl InFlightGuard {
    fn enter(in_flight: &Arc<InFlight>) -> Self {
        in_flight.count.fetch_add(1, Ordering::SeqCst);
        Self(in_flight.clone())
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.0.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

/// Executor handle; cheap to clone
#[derive(Debug, Clone)]
pub struct RebuildExecutor {
    mode: Arc<Mode>,
    in_flight: Arc<InFlight>,
}

impl RebuildExecutor {
    /// Pooled executor running at most `workers` rebuilds at a time
    pub fn new(workers: usize) -> Self {
        Self {
            mode: Arc::new(Mode::Pooled(Arc::new(Semaphore::new(workers.max(1))))),
            in_flight: Arc::new(InFlight::default()),
        }
    }

    /// Executor that runs each rebuild on the caller's task before returning
    ///
    /// Useful in tests that need the rebuild to have finished when the read returns.
    pub fn inline() -> Self {
        Self {
            mode: Arc::new(Mode::Inline),
            in_flight: Arc::new(InFlight::default()),
        }
    }

    /// Number of submitted rebuilds that have not finished yet
    pub fn in_flight(&self) -> usize {
        self.in_flight.count.load(Ordering::SeqCst)
    }

    /// Wait until no rebuild is queued or running, or `timeout` passes
    ///
    /// Returns whether the executor went idle.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        let wait = async {
            loop {
                // Register before checking so a wakeup in between is not lost
                let idle = self.in_flight.idle.notified();
                if self.in_flight() == 0 {
                    return;
                }
                idle.await;
            }
        };
        tokio::time::timeout(timeout, wait).await.is_ok()
    }

    /// Submit a rebuild task
    ///
    /// The task is responsible for its own error handling and lock release;
    /// the executor only bounds concurrency.
    pub async fn submit(&self, task: BoxFuture<'static, ()>) {
        let guard = InFlightGuard::enter(&self.in_flight);

        match self.mode.as_ref() {
            Mode::Inline => {
                task.await;
                drop(guard);
            }
            Mode::Pooled(semaphore) => {
                let semaphore = semaphore.clone();
                tokio::spawn(async move {
                    let _guard = guard;
                    match semaphore.acquire_owned().await {
                        Ok(_permit) => {
                            debug!("Rebuild task started");
                            task.await;
                        }
                        Err(_) => warn!("Rebuild pool closed, dropping task"),
                    }
                });
            }
        }
    }
}
