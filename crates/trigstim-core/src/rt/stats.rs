//! Lock-free timing statistics for the timer thread.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated by the timer thread and read from anywhere.
///
/// All operations are non-blocking and suitable for RT contexts.
#[derive(Debug)]
pub struct ServiceStats {
    /// Service passes
    passes: AtomicU64,
    /// Timer events executed
    firings: AtomicU64,
    /// Total time spent servicing
    total_time_ns: AtomicU64,
    /// Longest service pass
    max_time_ns: AtomicU64,
    /// Largest delay between a deadline and the wake-up serving it
    max_wake_late_ns: AtomicU64,
    /// Passes that woke up after a deadline by more than one period slice
    overruns: AtomicU64,
}

impl Default for ServiceStats {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceStats {
    pub fn new() -> Self {
        Self {
            passes: AtomicU64::new(0),
            firings: AtomicU64::new(0),
            total_time_ns: AtomicU64::new(0),
            max_time_ns: AtomicU64::new(0),
            max_wake_late_ns: AtomicU64::new(0),
            overruns: AtomicU64::new(0),
        }
    }

    /// Record one service pass
    #[inline]
    pub fn record_pass(&self, elapsed_ns: u64, firings: usize) {
        self.passes.fetch_add(1, Ordering::Relaxed);
        self.firings.fetch_add(firings as u64, Ordering::Relaxed);
        self.total_time_ns.fetch_add(elapsed_ns, Ordering::Relaxed);
        fetch_max(&self.max_time_ns, elapsed_ns);
    }

    /// Record how late the thread woke for a deadline
    #[inline]
    pub fn record_wake_late(&self, late_ns: u64) {
        fetch_max(&self.max_wake_late_ns, late_ns);
    }

    #[inline]
    pub fn record_overrun(&self) {
        self.overruns.fetch_add(1, Ordering::Relaxed);
    }

    pub fn passes(&self) -> u64 {
        self.passes.load(Ordering::Relaxed)
    }

    pub fn firings(&self) -> u64 {
        self.firings.load(Ordering::Relaxed)
    }

    pub fn overruns(&self) -> u64 {
        self.overruns.load(Ordering::Relaxed)
    }

    /// Average pass time in nanoseconds
    pub fn avg_time_ns(&self) -> u64 {
        let passes = self.passes();
        if passes == 0 {
            0
        } else {
            self.total_time_ns.load(Ordering::Relaxed) / passes
        }
    }

    pub fn snapshot(&self) -> ServiceStatsSnapshot {
        ServiceStatsSnapshot {
            passes: self.passes(),
            firings: self.firings(),
            avg_time_ns: self.avg_time_ns(),
            max_time_ns: self.max_time_ns.load(Ordering::Relaxed),
            max_wake_late_ns: self.max_wake_late_ns.load(Ordering::Relaxed),
            overruns: self.overruns(),
        }
    }

    pub fn reset(&self) {
        self.passes.store(0, Ordering::Relaxed);
        self.firings.store(0, Ordering::Relaxed);
        self.total_time_ns.store(0, Ordering::Relaxed);
        self.max_time_ns.store(0, Ordering::Relaxed);
        self.max_wake_late_ns.store(0, Ordering::Relaxed);
        self.overruns.store(0, Ordering::Relaxed);
    }
}

fn fetch_max(cell: &AtomicU64, value: u64) {
    let mut current = cell.load(Ordering::Relaxed);
    while value > current {
        match cell.compare_exchange_weak(current, value, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => break,
            Err(v) => current = v,
        }
    }
}

/// Point-in-time copy of [`ServiceStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceStatsSnapshot {
    pub passes: u64,
    pub firings: u64,
    pub avg_time_ns: u64,
    pub max_time_ns: u64,
    pub max_wake_late_ns: u64,
    pub overruns: u64,
}
