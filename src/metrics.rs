// ABOUTME: Atomics-backed counters observable from outside the pool/dispatcher

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Running counters for one pool/dispatcher pair. Cheap to update from hot paths
/// (relaxed atomics, no locking) and cheap to snapshot for a metrics endpoint.
#[derive(Debug, Default)]
pub struct PoolMetrics {
    submitted: AtomicU64,
    completed: AtomicU64,
    batches_processed: AtomicU64,
    batch_size_sum: AtomicU64,
    connected_connections: AtomicUsize,
    total_connections: AtomicUsize,
    cache_size: AtomicUsize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricsSnapshot {
    pub submitted: u64,
    pub completed: u64,
    pub batches_processed: u64,
    pub average_batch_size: f64,
    pub connected_connections: usize,
    pub total_connections: usize,
    pub cache_size: usize,
}

impl PoolMetrics {
    pub fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_batch(&self, size: usize) {
        self.batches_processed.fetch_add(1, Ordering::Relaxed);
        self.batch_size_sum.fetch_add(size as u64, Ordering::Relaxed);
    }

    pub fn set_connection_counts(&self, connected: usize, total: usize) {
        self.connected_connections.store(connected, Ordering::Relaxed);
        self.total_connections.store(total, Ordering::Relaxed);
    }

    pub fn set_cache_size(&self, size: usize) {
        self.cache_size.store(size, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let batches = self.batches_processed.load(Ordering::Relaxed);
        let sum = self.batch_size_sum.load(Ordering::Relaxed);
        let average_batch_size = if batches == 0 { 0.0 } else { sum as f64 / batches as f64 };
        MetricsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            batches_processed: batches,
            average_batch_size,
            connected_connections: self.connected_connections.load(Ordering::Relaxed),
            total_connections: self.total_connections.load(Ordering::Relaxed),
            cache_size: self.cache_size.load(Ordering::Relaxed),
        }
    }
}
