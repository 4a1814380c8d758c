//! Background refresh of stale cache entries.
//!
//! Reads already refresh lazily. The sweeper additionally refreshes stale
//! subscribed entries on a timer so that rarely-read keys stay current.
//!
//! ```ignore
//! let (shutdown_tx, shutdown_rx) = watch::channel(false);
//! let handle = spawn_sweeper(cache.clone(), Duration::from_secs(60), shutdown_rx);
//!
//! // Later
//! let _ = shutdown_tx.send(true);
//! let metrics = handle.await?;
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use super::read_through::ReadThroughCache;

/// Counters accumulated over a sweeper's lifetime.
#[derive(Debug, Default)]
pub struct SweeperMetrics {
    pub cycles: AtomicU64,
    pub refreshed: AtomicU64,
    pub failed: AtomicU64,
    /// Sweeps that could not run at all (poisoned cache).
    pub errors: AtomicU64,
}

impl SweeperMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> SweeperSnapshot {
        SweeperSnapshot {
            cycles: self.cycles.load(Ordering::Relaxed),
            refreshed: self.refreshed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of sweeper metrics at a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweeperSnapshot {
    pub cycles: u64,
    pub refreshed: u64,
    pub failed: u64,
    pub errors: u64,
}

/// Run sweeps every `period` until `shutdown_rx` turns true.
pub async fn sweeper_task<V>(
    cache: Arc<ReadThroughCache<V>>,
    period: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Arc<SweeperMetrics>
where
    V: Clone + Send + Sync + 'static,
{
    let metrics = Arc::new(SweeperMetrics::new());

    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(period_ms = period.as_millis() as u64, "Cache sweeper started");

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                // A dropped sender also stops the sweeper.
                if changed.is_err() || *shutdown_rx.borrow() {
                    tracing::info!("Cache sweeper shutting down");
                    break;
                }
            }

            _ = ticker.tick() => {
                sweep_once(&cache, &metrics).await;
            }
        }
    }

    let snapshot = metrics.snapshot();
    tracing::info!(
        cycles = snapshot.cycles,
        refreshed = snapshot.refreshed,
        failed = snapshot.failed,
        errors = snapshot.errors,
        "Cache sweeper completed"
    );

    metrics
}

/// Spawn [`sweeper_task`] on the current runtime.
pub fn spawn_sweeper<V>(
    cache: Arc<ReadThroughCache<V>>,
    period: Duration,
    shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<Arc<SweeperMetrics>>
where
    V: Clone + Send + Sync + 'static,
{
    tokio::spawn(sweeper_task(cache, period, shutdown_rx))
}

async fn sweep_once<V>(cache: &ReadThroughCache<V>, metrics: &SweeperMetrics)
where
    V: Clone + Send + Sync + 'static,
{
    metrics.cycles.fetch_add(1, Ordering::Relaxed);
    match cache.sweep().await {
        Ok(report) => {
            metrics
                .refreshed
                .fetch_add(report.refreshed as u64, Ordering::Relaxed);
            metrics
                .failed
                .fetch_add(report.failed as u64, Ordering::Relaxed);
        }
        Err(e) => {
            metrics.errors.fetch_add(1, Ordering::Relaxed);
            tracing::error!(error = %e, "Cache sweep failed");
        }
    }
}
