//! Advisory diagnostics for a bounded queue
//!
//! Counters here are updated with relaxed atomics and never consulted by the
//! queue's own synchronization. They may lag the real state by a few
//! operations and are meant for progress reporting only.

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Lock-free counters describing queue activity
#[derive(Debug, Default)]
pub struct QueueMetrics {
    current_len: AtomicUsize,
    peak_len: AtomicUsize,
    add_waits: AtomicU64,
    withdraw_waits: AtomicU64,
    rejected_adds: AtomicU64,
    cancellations: AtomicU64,
}

impl QueueMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the queue length observed after a mutation
    pub fn record_len(&self, len: usize) {
        self.current_len.store(len, Ordering::Relaxed);

        let mut peak = self.peak_len.load(Ordering::Relaxed);
        while len > peak {
            match self.peak_len.compare_exchange_weak(
                peak,
                len,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(observed) => peak = observed,
            }
        }
    }

    pub fn record_add_wait(&self) {
        self.add_waits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_withdraw_wait(&self) {
        self.withdraw_waits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected_add(&self) {
        self.rejected_adds.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cancellation(&self) {
        self.cancellations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn current_len(&self) -> usize {
        self.current_len.load(Ordering::Relaxed)
    }

    pub fn peak_len(&self) -> usize {
        self.peak_len.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            current_len: self.current_len(),
            peak_len: self.peak_len(),
            add_waits: self.add_waits.load(Ordering::Relaxed),
            withdraw_waits: self.withdraw_waits.load(Ordering::Relaxed),
            rejected_adds: self.rejected_adds.load(Ordering::Relaxed),
            cancellations: self.cancellations.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`QueueMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub current_len: usize,
    pub peak_len: usize,
    /// Times an adder suspended on a full queue
    pub add_waits: u64,
    /// Times a withdrawer suspended on an empty queue
    pub withdraw_waits: u64,
    pub rejected_adds: u64,
    pub cancellations: u64,
}

impl fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "len={} peak={} add_waits={} withdraw_waits={} rejected={} cancelled={}",
            self.current_len,
            self.peak_len,
            self.add_waits,
            self.withdraw_waits,
            self.rejected_adds,
            self.cancellations
        )
    }
}
