//! Timer thread scheduling policy.

use crate::error::{StimError, StimResult};

/// Switch the calling thread to SCHED_FIFO at `priority` (1-99).
#[cfg(target_os = "linux")]
pub fn set_realtime_priority(priority: u8) -> StimResult<()> {
    let priority = priority.clamp(1, 99) as libc::c_int;

    // SAFETY: sched_param is plain data and pid 0 targets the calling thread.
    unsafe {
        let mut param: libc::sched_param = std::mem::zeroed();
        param.sched_priority = priority;
        if libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) != 0 {
            return Err(StimError::Thread(format!(
                "sched_setscheduler failed: {}",
                std::io::Error::last_os_error()
            )));
        }
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
pub fn set_realtime_priority(_priority: u8) -> StimResult<()> {
    tracing::debug!("real-time priority not supported on this platform");
    Ok(())
}
