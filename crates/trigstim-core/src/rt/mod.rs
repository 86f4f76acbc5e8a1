//! # Real-Time Guards
//!
//! Primitives for code running in the emulator's timer context:
//!
//! - **Stack budget**: [`StackMonitor`] measures how much stack is left on
//!   the timer thread; running out is fatal
//! - **Fatal path**: [`fatal_error`] logs and aborts the process
//! - **Service statistics**: [`ServiceStats`], lock-free timing counters for
//!   the host timer thread
//! - **Scheduling policy**: [`set_realtime_priority`] for the timer thread

mod stack;
mod stats;
mod thread;

pub use stack::{StackMonitor, DEFAULT_TIMER_STACK_SIZE, EXPECTED_REMAINING_STACK};
pub use stats::{ServiceStats, ServiceStatsSnapshot};
pub use thread::set_realtime_priority;

/// Report an unrecoverable real-time fault and abort.
///
/// Unwinding from a timer callback would leave outputs in an unknown
/// state, so this never panics.
#[cold]
#[inline(never)]
pub fn fatal_error(reason: &str) -> ! {
    tracing::error!(reason, "fatal real-time fault, aborting");
    std::process::abort()
}
