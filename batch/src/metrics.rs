//! Success and error counters for the controllers.

use std::sync::atomic::{AtomicU64, Ordering};

/// Per-run counters.
#[derive(Debug, Default)]
pub struct Metrics {
    /// Units completed, fetched or already stored.
    pub processed_ok: AtomicU64,
    /// Units that failed for a reason other than quota.
    pub processed_error: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self) {
        self.processed_ok.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.processed_error.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            processed_ok: self.processed_ok.load(Ordering::Relaxed),
            processed_error: self.processed_error.load(Ordering::Relaxed),
        }
    }

    /// Zero the counters, returning their values before the reset.
    pub fn reset(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            processed_ok: self.processed_ok.swap(0, Ordering::Relaxed),
            processed_error: self.processed_error.swap(0, Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub processed_ok: u64,
    pub processed_error: u64,
}
