//! Delivery counters for the dispatcher

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Counters of a single dispatcher
#[derive(Debug, Default)]
pub struct DispatchMetrics {
    /// Queue length seen at the last dequeue
    queue_len: AtomicUsize,
    /// Entries accepted by the sink
    write_count: AtomicU64,
    /// Writes that returned an error
    failure_count: AtomicU64,
    /// Entries lost to a failed or timed-out write
    dropped_count: AtomicU64,
    /// Entries left in the queue at shutdown
    discarded_count: AtomicU64,
}

impl DispatchMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_len(&self) -> usize {
        self.queue_len.load(Ordering::Relaxed)
    }

    pub fn set_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
    }

    pub fn write_count(&self) -> u64 {
        self.write_count.load(Ordering::Relaxed)
    }

    pub fn inc_write_count(&self) {
        self.write_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    pub fn inc_failure_count(&self) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped_count.load(Ordering::Relaxed)
    }

    pub fn inc_dropped_count(&self) {
        self.dropped_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn discarded_count(&self) -> u64 {
        self.discarded_count.load(Ordering::Relaxed)
    }

    pub fn add_discarded(&self, count: u64) {
        self.discarded_count.fetch_add(count, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queue_len: self.queue_len(),
            write_count: self.write_count(),
            failure_count: self.failure_count(),
            dropped_count: self.dropped_count(),
            discarded_count: self.discarded_count(),
        }
    }
}

/// Snapshot of dispatcher metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub queue_len: usize,
    pub write_count: u64,
    pub failure_count: u64,
    pub dropped_count: u64,
    pub discarded_count: u64,
}
