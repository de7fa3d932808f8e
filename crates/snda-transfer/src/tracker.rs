//! Progress accounting for one operation
//!
//! A [`ProgressTracker`] is created per operation and shared by `Arc` between
//! the coordinator and the pool workers. Every counter is atomic, so
//! snapshots can be taken at any time without blocking the workers.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use tracing::trace;

use crate::unit::TransferUnit;

/// Point-in-time statistics of an operation
#[derive(Debug, Clone, PartialEq)]
pub struct ThreadWatcher {
    /// Units currently executing on a worker
    pub threads_active: usize,
    pub units_completed: usize,
    /// Units neither completed nor abandoned
    pub units_remaining: usize,
    pub units_abandoned: usize,
    pub total_units: usize,
    pub ignored_failures: usize,
    pub bytes_transferred: u64,
    /// Total bytes, when every unit moves a known byte range
    pub bytes_total: Option<u64>,
    pub elapsed: Duration,
    pub bytes_per_second: f64,
}

impl ThreadWatcher {
    /// Estimated time to move the remaining bytes at the observed rate
    pub fn time_remaining(&self) -> Option<Duration> {
        let total = self.bytes_total?;
        if self.bytes_per_second <= 0.0 {
            return None;
        }
        let remaining = total.saturating_sub(self.bytes_transferred) as f64;
        Some(Duration::from_secs_f64(remaining / self.bytes_per_second))
    }

    pub fn is_finished(&self) -> bool {
        self.units_remaining == 0
    }
}

/// Thread-safe accumulator of unit outcomes
#[derive(Debug)]
pub struct ProgressTracker {
    total_units: usize,
    total_bytes: Option<u64>,
    started_at: Instant,
    active: AtomicUsize,
    completed: AtomicUsize,
    abandoned: AtomicUsize,
    ignored_failures: AtomicUsize,
    fatal_failures: AtomicUsize,
    bytes: AtomicU64,
}

impl ProgressTracker {
    pub fn new(total_units: usize, total_bytes: Option<u64>) -> Self {
        Self {
            total_units,
            total_bytes,
            started_at: Instant::now(),
            active: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            abandoned: AtomicUsize::new(0),
            ignored_failures: AtomicUsize::new(0),
            fatal_failures: AtomicUsize::new(0),
            bytes: AtomicU64::new(0),
        }
    }

    /// A worker picked the unit up
    pub fn record_dispatched(&self, unit: &TransferUnit) {
        trace!(unit = %unit.id(), attempt = unit.attempt(), "unit dispatched");
        self.active.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_completed(&self, unit: &TransferUnit, bytes: u64) {
        trace!(unit = %unit.id(), bytes, "unit completed");
        self.finish_active();
        self.completed.fetch_add(1, Ordering::SeqCst);
        self.bytes.fetch_add(bytes, Ordering::SeqCst);
    }

    pub fn record_failed(&self, unit: &TransferUnit, ignorable: bool) {
        trace!(unit = %unit.id(), attempt = unit.attempt(), ignorable, "unit failed");
        self.finish_active();
        if ignorable {
            self.ignored_failures.fetch_add(1, Ordering::SeqCst);
        } else {
            self.fatal_failures.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// The unit exhausted its retry budget
    pub fn record_abandoned(&self, unit: &TransferUnit) {
        trace!(unit = %unit.id(), "unit abandoned");
        self.abandoned.fetch_add(1, Ordering::SeqCst);
    }

    pub fn fatal_failures(&self) -> usize {
        self.fatal_failures.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> ThreadWatcher {
        let completed = self.completed.load(Ordering::SeqCst);
        let abandoned = self.abandoned.load(Ordering::SeqCst);
        let bytes = self.bytes.load(Ordering::SeqCst);
        let elapsed = self.started_at.elapsed();
        let secs = elapsed.as_secs_f64();

        ThreadWatcher {
            threads_active: self.active.load(Ordering::SeqCst),
            units_completed: completed,
            units_remaining: self.total_units.saturating_sub(completed + abandoned),
            units_abandoned: abandoned,
            total_units: self.total_units,
            ignored_failures: self.ignored_failures.load(Ordering::SeqCst),
            bytes_transferred: bytes,
            bytes_total: self.total_bytes,
            elapsed,
            bytes_per_second: if secs > 0.0 { bytes as f64 / secs } else { 0.0 },
        }
    }

    fn finish_active(&self) {
        // Saturate rather than wrap if an outcome is recorded twice.
        let _ = self
            .active
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_initial_snapshot_is_zeroed() {
        let tracker = ProgressTracker::new(4, Some(400));
        let snap = tracker.snapshot();

        assert_eq!(snap.threads_active, 0);
        assert_eq!(snap.units_completed, 0);
        assert_eq!(snap.units_remaining, 4);
        assert_eq!(snap.bytes_transferred, 0);
        assert!(!snap.is_finished());
    }

    #[test]
    fn test_outcomes_update_counters() {
        let tracker = ProgressTracker::new(3, None);
        let a = TransferUnit::upload_part(1, 0, 9);
        let b = TransferUnit::upload_part(2, 10, 19);
        let c = TransferUnit::upload_part(3, 20, 29);

        for unit in [&a, &b, &c] {
            tracker.record_dispatched(unit);
        }
        assert_eq!(tracker.snapshot().threads_active, 3);

        tracker.record_completed(&a, 10);
        tracker.record_failed(&b, true);
        tracker.record_abandoned(&b);
        tracker.record_failed(&c, false);

        let snap = tracker.snapshot();
        assert_eq!(snap.threads_active, 0);
        assert_eq!(snap.units_completed, 1);
        assert_eq!(snap.units_abandoned, 1);
        assert_eq!(snap.units_remaining, 1);
        assert_eq!(snap.ignored_failures, 1);
        assert_eq!(snap.bytes_transferred, 10);
        assert_eq!(tracker.fatal_failures(), 1);
    }

    #[test]
    fn test_concurrent_updates() {
        let tracker = Arc::new(ProgressTracker::new(800, None));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let tracker = Arc::clone(&tracker);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        let unit = TransferUnit::upload_part(t * 100 + i + 1, 0, 0);
                        tracker.record_dispatched(&unit);
                        tracker.record_completed(&unit, 1);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let snap = tracker.snapshot();
        assert_eq!(snap.units_completed, 800);
        assert_eq!(snap.bytes_transferred, 800);
        assert!(snap.is_finished());
    }

    #[test]
    fn test_time_remaining_needs_rate_and_total() {
        let mut snap = ProgressTracker::new(1, Some(1000)).snapshot();
        assert_eq!(snap.time_remaining(), None);

        snap.bytes_transferred = 500;
        snap.bytes_per_second = 100.0;
        assert_eq!(snap.time_remaining(), Some(Duration::from_secs(5)));

        snap.bytes_total = None;
        assert_eq!(snap.time_remaining(), None);
    }
}
