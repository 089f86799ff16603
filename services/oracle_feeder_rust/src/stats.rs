//! Run statistics
//!
//! Lock-free counters shared by the scheduler and every submission worker.
//! `in_flight` doubles as the worker-slot count: a [`WorkerSlot`] is held for
//! exactly as long as one external process runs.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct FeederStats {
    pub ticks: AtomicU64,
    pub fetch_failures: AtomicU64,
    pub invalid_prices: AtomicU64,
    pub submissions_enqueued: AtomicU64,
    pub submissions_dropped: AtomicU64,
    pub submissions_succeeded: AtomicU64,
    pub submissions_failed: AtomicU64,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl FeederStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_tick(&self) -> u64 {
        self.ticks.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> FeederStatsSnapshot {
        FeederStatsSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            invalid_prices: self.invalid_prices.load(Ordering::Relaxed),
            submissions_enqueued: self.submissions_enqueued.load(Ordering::Relaxed),
            submissions_dropped: self.submissions_dropped.load(Ordering::Relaxed),
            submissions_succeeded: self.submissions_succeeded.load(Ordering::Relaxed),
            submissions_failed: self.submissions_failed.load(Ordering::Relaxed),
            in_flight: self.in_flight(),
            peak_in_flight: self.peak_in_flight(),
        }
    }
}

/// One unit of submission concurrency; released on drop, whatever the outcome.
pub struct WorkerSlot {
    stats: Arc<FeederStats>,
}

impl WorkerSlot {
    pub fn acquire(stats: Arc<FeederStats>) -> Self {
        let now = stats.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        stats.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        Self { stats }
    }
}

impl Drop for WorkerSlot {
    fn drop(&mut self) {
        self.stats.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeederStatsSnapshot {
    pub ticks: u64,
    pub fetch_failures: u64,
    pub invalid_prices: u64,
    pub submissions_enqueued: u64,
    pub submissions_dropped: u64,
    pub submissions_succeeded: u64,
    pub submissions_failed: u64,
    pub in_flight: usize,
    pub peak_in_flight: usize,
}
