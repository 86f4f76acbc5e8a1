//! # Timer Thread
//!
//! Hosts an [`EmulatorController`] on a dedicated, named thread that stands
//! in for the hardware timer interrupt. The loop services the controller,
//! then sleeps until the next deadline, never longer than `max_sleep_us`
//! so RPM and mode changes made from other threads are picked up quickly.
//!
//! The thread records its own stack base at entry, which arms the
//! stack-budget check in the scheduler.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use trigstim_io::OutputPin;

use crate::controller::EmulatorController;
use crate::dispatch::EdgeDecoder;
use crate::error::{StimError, StimResult};
use crate::rt::{set_realtime_priority, ServiceStats, StackMonitor, DEFAULT_TIMER_STACK_SIZE};
use crate::waveform::ShapeSource;

/// Timer thread settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub thread_name: String,
    /// Stack size of the timer thread (bytes)
    pub stack_size: usize,
    /// Longest single sleep between service passes (µs)
    pub max_sleep_us: u64,
    /// SCHED_FIFO priority (1-99); `None` keeps the default policy
    pub realtime_priority: Option<u8>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            thread_name: "trigger-emulator".to_string(),
            stack_size: DEFAULT_TIMER_STACK_SIZE,
            max_sleep_us: 1_000,
            realtime_priority: None,
        }
    }
}

/// Shared handle to a controller serviced by an [`EmulatorRunner`]
pub type SharedController<S, D, P> = Arc<Mutex<EmulatorController<S, D, P>>>;

/// Background timer thread driving one controller
pub struct EmulatorRunner {
    running: Arc<AtomicBool>,
    stats: Arc<ServiceStats>,
    handle: Option<JoinHandle<()>>,
}

impl EmulatorRunner {
    /// Start servicing `controller` on a new thread
    pub fn spawn<S, D, P>(controller: SharedController<S, D, P>, config: RunnerConfig) -> StimResult<Self>
    where
        S: ShapeSource + Send + 'static,
        D: EdgeDecoder + Send + 'static,
        P: OutputPin + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let stats = Arc::new(ServiceStats::new());

        let thread_running = Arc::clone(&running);
        let thread_stats = Arc::clone(&stats);
        let thread_config = config.clone();

        let handle = thread::Builder::new()
            .name(config.thread_name.clone())
            .stack_size(config.stack_size)
            .spawn(move || {
                timer_loop(controller, thread_config, thread_running, thread_stats);
            })
            .map_err(|e| StimError::Thread(e.to_string()))?;

        tracing::info!(
            thread = %config.thread_name,
            stack_size = config.stack_size,
            "trigger emulator timer thread started"
        );

        Ok(Self {
            running,
            stats,
            handle: Some(handle),
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> Arc<ServiceStats> {
        Arc::clone(&self.stats)
    }

    /// Stop the loop and wait for the thread to exit
    pub fn stop(&mut self) -> StimResult<()> {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            handle
                .join()
                .map_err(|_| StimError::Thread("timer thread panicked".to_string()))?;
            tracing::info!("trigger emulator timer thread stopped");
        }
        Ok(())
    }
}

impl Drop for EmulatorRunner {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            tracing::warn!(error = %e, "timer thread did not shut down cleanly");
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn timer_loop<S, D, P>(
    controller: SharedController<S, D, P>,
    config: RunnerConfig,
    running: Arc<AtomicBool>,
    stats: Arc<ServiceStats>,
) where
    S: ShapeSource,
    D: EdgeDecoder,
    P: OutputPin,
{
    if let Some(priority) = config.realtime_priority {
        if let Err(e) = set_realtime_priority(priority) {
            tracing::warn!(priority, error = %e, "running timer thread without real-time priority");
        }
    }

    let clock = {
        let mut ctrl = lock(&controller);
        ctrl.set_stack_monitor(Some(StackMonitor::capture(config.stack_size)));
        Arc::clone(ctrl.clock())
    };
    let max_sleep = config.max_sleep_us.saturating_mul(1_000).max(1);
    let mut deadline: Option<u64> = None;

    while running.load(Ordering::Acquire) {
        let next = {
            let mut ctrl = lock(&controller);
            let start = clock.now_ns();
            if let Some(at) = deadline.filter(|at| *at <= start) {
                let late = start - at;
                stats.record_wake_late(late);
                if late > max_sleep {
                    stats.record_overrun();
                }
            }

            let firings = ctrl.service_at(start);
            stats.record_pass(clock.since(start), firings);
            ctrl.next_deadline()
        };
        deadline = next;

        let now = clock.now_ns();
        let sleep_ns = next.map_or(max_sleep, |at| at.saturating_sub(now).min(max_sleep));
        if sleep_ns > 0 {
            thread::sleep(Duration::from_nanos(sleep_ns));
        }
    }

    lock(&controller).set_stack_monitor(None);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmulatorConfig;
    use crate::dispatch::RecordingDecoder;
    use crate::waveform::TriggerShape;
    use trigstim_io::SimulatedPin;

    #[test]
    fn test_default_config() {
        let config = RunnerConfig::default();
        assert_eq!(config.thread_name, "trigger-emulator");
        assert_eq!(config.max_sleep_us, 1_000);
        assert!(config.realtime_priority.is_none());
    }

    #[test]
    fn test_spawn_and_stop() {
        let controller = Arc::new(Mutex::new(EmulatorController::new(
            EmulatorConfig {
                trigger_simulator_rpm: 6000,
                ..Default::default()
            },
            TriggerShape::default(),
            RecordingDecoder::new(),
            std::array::from_fn(|_| SimulatedPin::new()),
        )));
        lock(&controller).enable_self_stimulation(false).unwrap();

        let mut runner = EmulatorRunner::spawn(Arc::clone(&controller), RunnerConfig::default()).unwrap();
        assert!(runner.is_running());
        thread::sleep(Duration::from_millis(50));
        runner.stop().unwrap();
        assert!(!runner.is_running());

        assert!(runner.stats().passes() > 0);
        let ctrl = lock(&controller);
        assert!(!ctrl.decoder().edges().is_empty());
        assert!(ctrl.scheduler().stats().firings > 0);
    }
}
