//! Global atomic counters for Roundkeep.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single `tracing::info!`
//! event.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    mutations_applied: AtomicU64,
    mutations_denied: AtomicU64,
    reorders_applied: AtomicU64,
    reorder_conflicts: AtomicU64,
    integrity_warnings: AtomicU64,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub mutations_applied: u64,
    pub mutations_denied: u64,
    pub reorders_applied: u64,
    pub reorder_conflicts: u64,
    pub integrity_warnings: u64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            mutations_applied: AtomicU64::new(0),
            mutations_denied: AtomicU64::new(0),
            reorders_applied: AtomicU64::new(0),
            reorder_conflicts: AtomicU64::new(0),
            integrity_warnings: AtomicU64::new(0),
        }
    }

    pub fn inc_applied(&self) {
        self.mutations_applied.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "mutations_applied", "counter incremented");
    }

    pub fn inc_denied(&self) {
        self.mutations_denied.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "mutations_denied", "counter incremented");
    }

    pub fn inc_reorders(&self) {
        self.reorders_applied.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "reorders_applied", "counter incremented");
    }

    pub fn inc_conflicts(&self) {
        self.reorder_conflicts.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "reorder_conflicts", "counter incremented");
    }

    pub fn add_integrity_warnings(&self, n: u64) {
        if n > 0 {
            self.integrity_warnings.fetch_add(n, Ordering::Relaxed);
            tracing::trace!(metric = "integrity_warnings", n = n, "counter incremented");
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            mutations_applied: self.mutations_applied.load(Ordering::Relaxed),
            mutations_denied: self.mutations_denied.load(Ordering::Relaxed),
            reorders_applied: self.reorders_applied.load(Ordering::Relaxed),
            reorder_conflicts: self.reorder_conflicts.load(Ordering::Relaxed),
            integrity_warnings: self.integrity_warnings.load(Ordering::Relaxed),
        }
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        let s = self.snapshot();
        tracing::info!(
            metric = "flush",
            mutations_applied = s.mutations_applied,
            mutations_denied = s.mutations_denied,
            reorders_applied = s.reorders_applied,
            reorder_conflicts = s.reorder_conflicts,
            integrity_warnings = s.integrity_warnings,
        );
    }
}
