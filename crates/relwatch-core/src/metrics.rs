//! Global atomic counters for reconciliation runs.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event at the end of a run.

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Lightweight atomic counters, no allocations and no locking.
pub struct Metrics {
    lookups_performed: AtomicU64,
    lookups_failed: AtomicU64,
    records_released: AtomicU64,
    writes_failed: AtomicU64,
    deliveries_failed: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            lookups_performed: AtomicU64::new(0),
            lookups_failed: AtomicU64::new(0),
            records_released: AtomicU64::new(0),
            writes_failed: AtomicU64::new(0),
            deliveries_failed: AtomicU64::new(0),
        }
    }

    pub fn inc_lookups(&self) {
        self.lookups_performed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "lookups_performed", "counter incremented");
    }

    pub fn inc_lookups_failed(&self) {
        self.lookups_failed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "lookups_failed", "counter incremented");
    }

    pub fn inc_released(&self) {
        self.records_released.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "records_released", "counter incremented");
    }

    pub fn inc_writes_failed(&self) {
        self.writes_failed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "writes_failed", "counter incremented");
    }

    pub fn inc_deliveries_failed(&self) {
        self.deliveries_failed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "deliveries_failed", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            lookups_performed = self.lookups_performed(),
            lookups_failed = self.lookups_failed(),
            records_released = self.records_released(),
            writes_failed = self.writes_failed(),
            deliveries_failed = self.deliveries_failed(),
        );
    }

    pub fn lookups_performed(&self) -> u64 {
        self.lookups_performed.load(Ordering::Relaxed)
    }

    pub fn lookups_failed(&self) -> u64 {
        self.lookups_failed.load(Ordering::Relaxed)
    }

    pub fn records_released(&self) -> u64 {
        self.records_released.load(Ordering::Relaxed)
    }

    pub fn writes_failed(&self) -> u64 {
        self.writes_failed.load(Ordering::Relaxed)
    }

    pub fn deliveries_failed(&self) -> u64 {
        self.deliveries_failed.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero.
    pub fn reset(&self) {
        self.lookups_performed.store(0, Ordering::Relaxed);
        self.lookups_failed.store(0, Ordering::Relaxed);
        self.records_released.store(0, Ordering::Relaxed);
        self.writes_failed.store(0, Ordering::Relaxed);
        self.deliveries_failed.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_increment_and_reset() {
        let metrics = Metrics::new();
        metrics.inc_lookups();
        metrics.inc_lookups();
        metrics.inc_lookups_failed();
        metrics.inc_released();
        metrics.inc_writes_failed();
        metrics.inc_deliveries_failed();

        assert_eq!(metrics.lookups_performed(), 2);
        assert_eq!(metrics.lookups_failed(), 1);
        assert_eq!(metrics.records_released(), 1);
        assert_eq!(metrics.writes_failed(), 1);
        assert_eq!(metrics.deliveries_failed(), 1);

        metrics.reset();
        assert_eq!(metrics.lookups_performed(), 0);
        assert_eq!(metrics.deliveries_failed(), 0);
    }
}
