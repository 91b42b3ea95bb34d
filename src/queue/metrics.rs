use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters updated by producers and the worker
#[derive(Debug, Default)]
pub struct QueueMetrics {
    enqueued: AtomicU64,
    rejected: AtomicU64,
    drained_batches: AtomicU64,
    processed: AtomicU64,
    failed: AtomicU64,
    discarded: AtomicU64,
}

/// Point-in-time copy of [`QueueMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueMetricsSnapshot {
    pub enqueued: u64,
    pub rejected: u64,
    pub drained_batches: u64,
    pub processed: u64,
    pub failed: u64,
    /// Results produced after the caller stopped waiting
    pub discarded: u64,
}

impl QueueMetrics {
    pub(crate) fn record_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_batch(&self) {
        self.drained_batches.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_processed(&self, success: bool) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_discarded(&self) {
        self.discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> QueueMetricsSnapshot {
        QueueMetricsSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            drained_batches: self.drained_batches.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failures_count_as_processed() {
        let metrics = QueueMetrics::default();
        metrics.record_processed(true);
        metrics.record_processed(false);
        metrics.record_discarded();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.processed, 2);
        assert_eq!(snapshot.failed, 1);
        assert_eq!(snapshot.discarded, 1);
        assert_eq!(snapshot.enqueued, 0);
    }
}
