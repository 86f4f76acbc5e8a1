use std::thread::{self, ThreadId};

use crate::error::{StimError, StimResult};

/// Stack reserved for the host timer thread
pub const DEFAULT_TIMER_STACK_SIZE: usize = 256 * 1024;

/// Stack that must still be free when the timer callback is entered
pub const EXPECTED_REMAINING_STACK: usize = 16 * 1024;

/// Remaining-stack estimator for one thread.
///
/// Captured at the top of a thread whose stack size is known. Stacks are
/// assumed to grow downward. Queries from any other thread report `None`.
#[derive(Debug, Clone, Copy)]
pub struct StackMonitor {
    thread: ThreadId,
    base: usize,
    size: usize,
}

impl StackMonitor {
    /// Record the current stack position as the base of a `size`-byte stack
    #[inline(never)]
    pub fn capture(size: usize) -> Self {
        let marker = 0u8;
        Self {
            thread: thread::current().id(),
            base: std::hint::black_box(&marker) as *const u8 as usize,
            size,
        }
    }

    /// Bytes of stack left, `None` if called off the captured thread
    #[inline(never)]
    pub fn remaining(&self) -> Option<usize> {
        if thread::current().id() != self.thread {
            return None;
        }
        let marker = 0u8;
        let here = std::hint::black_box(&marker) as *const u8 as usize;
        let used = self.base.saturating_sub(here);
        Some(self.size.saturating_sub(used))
    }

    /// Fail if fewer than `required` bytes are left
    pub fn check(&self, required: usize) -> StimResult<()> {
        match self.remaining() {
            Some(remaining) if remaining < required => {
                Err(StimError::StackBudgetExceeded { remaining, required })
            }
            _ => Ok(()),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }
}
