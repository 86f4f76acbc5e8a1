//! Time sources.
//!
//! Timestamps are nanoseconds since the clock was created. The scheduler
//! and controller only ever compare them, so the epoch is irrelevant.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Timestamp in nanoseconds
pub type Nanos = u64;

/// Monotonic time source shared between the controller and the timer thread
pub trait Clock: Send + Sync {
    fn now_ns(&self) -> Nanos;

    /// Nanoseconds elapsed since `earlier`, zero if it lies in the future
    fn since(&self, earlier: Nanos) -> Nanos {
        self.now_ns().saturating_sub(earlier)
    }
}

/// Wall clock backed by [`Instant`]
#[derive(Debug)]
pub struct SystemClock {
    epoch: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ns(&self) -> Nanos {
        self.epoch.elapsed().as_nanos() as Nanos
    }
}

/// Manually driven clock for deterministic tests
#[derive(Debug, Default)]
pub struct MockClock {
    now: AtomicU64,
}

impl MockClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_nanos() as Nanos, Ordering::SeqCst);
    }

    /// Jump to an absolute time
    pub fn set_time_ns(&self, ns: Nanos) {
        self.now.store(ns, Ordering::SeqCst);
    }
}

impl Clock for MockClock {
    fn now_ns(&self) -> Nanos {
        self.now.load(Ordering::SeqCst)
    }
}
