//! Per-stage counters

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::info;

/// Thread-safe counters shared by the partition workers of one stage
#[derive(Debug)]
pub struct StageMetrics {
    start_time: Instant,
    records_processed: AtomicU64,
    records_emitted: AtomicU64,
    records_dropped: AtomicU64,
}

/// Point-in-time copy of [`StageMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub records_processed: u64,
    pub records_emitted: u64,
    pub records_dropped: u64,
}

impl StageMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            records_processed: AtomicU64::new(0),
            records_emitted: AtomicU64::new(0),
            records_dropped: AtomicU64::new(0),
        }
    }

    pub fn increment_processed(&self) {
        self.records_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_emitted(&self, n: u64) {
        self.records_emitted.fetch_add(n, Ordering::Relaxed);
    }

    /// Input rejected (invalid, late, stale or filtered)
    pub fn increment_dropped(&self) {
        self.records_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            records_processed: self.records_processed.load(Ordering::Relaxed),
            records_emitted: self.records_emitted.load(Ordering::Relaxed),
            records_dropped: self.records_dropped.load(Ordering::Relaxed),
        }
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn log_summary(&self, stage: &str) {
        let snapshot = self.snapshot();
        info!(
            stage,
            processed = snapshot.records_processed,
            emitted = snapshot.records_emitted,
            dropped = snapshot.records_dropped,
            uptime_secs = self.uptime().as_secs(),
            "Stage counters"
        );
    }
}

/// Log the counters every `every` until shutdown
pub fn spawn_reporter(
    stage: &'static str,
    metrics: Arc<StageMetrics>,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => metrics.log_summary(stage),
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    })
}

impl Default for StageMetrics {
    fn default() -> Self {
        Self::new()
    }
}
