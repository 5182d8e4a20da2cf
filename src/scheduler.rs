//! Cycle scheduling and the singleton guard
//!
//! The scheduler fires on a fixed per-minute cadence and fans out evenly
//! spaced sub-interval triggers within each minute to approximate sub-minute
//! polling. Every trigger funnels through the [`SingletonGuard`], which
//! drops (never queues) invocations that arrive while a cycle is running.

use crate::reconciler::Reconciler;
use crate::utils::current_timestamp;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{error, warn};

/// Guarantees at most one concurrent run of a guarded job
#[derive(Debug, Default)]
pub struct SingletonGuard {
    running: AtomicBool,
}

impl SingletonGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `job` unless one is already in flight. Returns false when the
    /// invocation was dropped.
    pub async fn run<F, Fut>(&self, job: F) -> bool
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ()>,
    {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("Skipping update since already in progress");
            return false;
        }
        job().await;
        self.running.store(false, Ordering::Release);
        true
    }

    /// Whether a guarded run is currently in flight
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// Drives reconciliation cycles on a fixed cadence
pub struct Scheduler {
    reconciler: Arc<Reconciler>,
    guard: Arc<SingletonGuard>,
    updates_per_minute: u32,
}

impl Scheduler {
    pub fn new(reconciler: Arc<Reconciler>, updates_per_minute: u32) -> Self {
        Self {
            reconciler,
            guard: Arc::new(SingletonGuard::new()),
            updates_per_minute: updates_per_minute.clamp(1, 60),
        }
    }

    pub fn guard(&self) -> Arc<SingletonGuard> {
        self.guard.clone()
    }

    /// Spawn the scheduling loop. Each minute tick triggers one immediate
    /// cycle plus evenly spaced sub-interval triggers; overlapping triggers
    /// are dropped by the guard.
    pub fn start(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(60));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let period = Duration::from_millis(60_000 / u64::from(self.updates_per_minute));

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            break;
                        }
                        continue;
                    }
                }

                for i in 0..self.updates_per_minute {
                    let scheduler = self.clone();
                    let delay = period * i;
                    tokio::spawn(async move {
                        if !delay.is_zero() {
                            tokio::time::sleep(delay).await;
                        }
                        scheduler.trigger().await;
                    });
                }
            }
        })
    }

    /// Run one guarded reconciliation cycle
    pub async fn trigger(&self) -> bool {
        let reconciler = self.reconciler.clone();
        self.guard
            .run(|| async move {
                if let Err(e) = reconciler.run_cycle(current_timestamp()).await {
                    error!(error = %e, "Reconciliation cycle failed");
                }
            })
            .await
    }
}
