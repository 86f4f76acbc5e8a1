//! # Waveform Scheduler
//!
//! Plays a [`PhaseSequence`] cycle after cycle at a given frequency. Each
//! timer firing lands on one phase boundary; the scheduler finds the edges
//! entering that phase, hands them to an [`EdgeListener`], and arms the
//! timer for the next boundary.
//!
//! ## States
//!
//! ```text
//!   Stopped ──start──► Running ◄──────────┐
//!      ▲                  │               │ period re-established
//!      │                  │ shape changed │
//!      └──────stop────────┴──► Reconfiguring
//! ```
//!
//! A NaN or non-positive frequency keeps the timer armed but pauses the
//! waveform: firings re-arm every `nan_sleep_ms` and emit nothing until a
//! usable frequency is set.
//!
//! ## Timing
//!
//! Phase `i` starts at `cycle_start + start_time(i) * period`. A new period
//! takes effect at the next boundary by rebasing `cycle_start`, so the
//! waveform keeps its position within the cycle. A shape swap restarts
//! the cycle at phase 0 of the new shape.
//!
//! Edge timestamps are the scheduled boundary times, clamped so they never
//! go backwards. The listener is borrowed mutably for the duration of a
//! service pass, so it cannot call back into the scheduler.

use serde::{Deserialize, Serialize};

use crate::clock::Nanos;
use crate::error::StimResult;
use crate::event_queue::EventQueue;
use crate::frequency::period_ns;
use crate::rt::{fatal_error, StackMonitor, EXPECTED_REMAINING_STACK};
use crate::waveform::{
    edge_at, transition, Direction, PhaseSequence, PinState, ShapeSource, MAX_CHANNELS,
};

/// Timer slots reserved for the scheduler
const TIMER_SLOTS: usize = 4;

// ============================================================================
// Configuration
// ============================================================================

/// Scheduler tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Events due within this window fire together with due ones (ns)
    pub late_delay_ns: u64,
    /// Re-arm interval while paused (ms)
    pub nan_sleep_ms: u64,
    /// Upper bound on firings handled per service pass
    pub max_firings_per_service: usize,
    /// Minimum free stack at timer callback entry (bytes)
    pub expected_remaining_stack: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            late_delay_ns: 10_000,
            nan_sleep_ms: 100,
            max_firings_per_service: 64,
            expected_remaining_stack: EXPECTED_REMAINING_STACK,
        }
    }
}

// ============================================================================
// State Machine
// ============================================================================

/// Scheduler lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SchedulerState {
    /// No timer armed
    #[default]
    Stopped,
    /// Timer armed, phases advancing (or paused on an invalid frequency)
    Running,
    /// Shape changed; timing is re-established at this boundary
    Reconfiguring,
}

impl SchedulerState {
    /// Get valid transitions from this state
    pub fn valid_transitions(&self) -> &'static [SchedulerState] {
        match self {
            SchedulerState::Stopped => &[SchedulerState::Running],
            SchedulerState::Running => &[SchedulerState::Reconfiguring, SchedulerState::Stopped],
            SchedulerState::Reconfiguring => &[SchedulerState::Running, SchedulerState::Stopped],
        }
    }

    /// Check if transition to target state is valid
    pub fn can_transition_to(&self, target: SchedulerState) -> bool {
        self.valid_transitions().contains(&target)
    }
}

/// Period the running loop is based on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppliedPeriod {
    /// Timing must be re-established at the next boundary
    #[default]
    Reset,
    /// Current cycle period
    Ns(Nanos),
}

/// Timing state owned by the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScheduleState {
    pub period: AppliedPeriod,
    pub phase_index: usize,
    /// Version of the shape currently being played
    pub shape_version: Option<u32>,
    /// Time phase 0 of the current cycle started; negative after a rebase near zero
    pub cycle_start_ns: i64,
}

/// Scheduler statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Timer firings handled
    pub firings: u64,
    /// Edges delivered to listeners
    pub edges: u64,
    /// Shape hot-swaps applied
    pub shape_swaps: u64,
    /// Times the timing base was re-established
    pub period_resets: u64,
    /// Firings that found no usable frequency
    pub paused_firings: u64,
    /// Service passes that hit the firing limit with work left
    pub deferred_passes: u64,
}

// ============================================================================
// Edge Delivery
// ============================================================================

/// One transition on one channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeEvent {
    pub channel: usize,
    pub direction: Direction,
    pub timestamp: Nanos,
}

/// Receiver of scheduler edges
pub trait EdgeListener {
    fn on_edge(&mut self, edge: EdgeEvent);
}

impl<F: FnMut(EdgeEvent)> EdgeListener for F {
    fn on_edge(&mut self, edge: EdgeEvent) {
        self(edge)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerAction {
    PhaseSwitch { generation: u32 },
}

// ============================================================================
// Scheduler
// ============================================================================

/// Periodic phase engine
#[derive(Debug, Clone)]
pub struct WaveformScheduler {
    config: SchedulerConfig,
    state: SchedulerState,
    desired_period: Option<Nanos>,
    schedule: ScheduleState,
    sequence: PhaseSequence,
    /// Level each channel was last driven to
    levels: [PinState; MAX_CHANNELS],
    /// Compare against `levels` instead of the previous phase at the next boundary
    resync_levels: bool,
    queue: EventQueue<TimerAction, TIMER_SLOTS>,
    generation: u32,
    last_timestamp: Nanos,
    stack: Option<StackMonitor>,
    stats: SchedulerStats,
}

impl WaveformScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        let queue = EventQueue::new(config.late_delay_ns);
        Self {
            config,
            state: SchedulerState::Stopped,
            desired_period: None,
            schedule: ScheduleState::default(),
            sequence: PhaseSequence::default(),
            levels: [PinState::Low; MAX_CHANNELS],
            resync_levels: false,
            queue,
            generation: 0,
            last_timestamp: 0,
            stack: None,
            stats: SchedulerStats::default(),
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state != SchedulerState::Stopped
    }

    /// Running, but waiting for a usable frequency
    pub fn is_paused(&self) -> bool {
        self.is_running() && self.desired_period.is_none()
    }

    pub fn schedule(&self) -> &ScheduleState {
        &self.schedule
    }

    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Sequence currently being played
    pub fn sequence(&self) -> &PhaseSequence {
        &self.sequence
    }

    /// Desired cycle period, `None` while paused
    pub fn period_ns(&self) -> Option<Nanos> {
        self.desired_period
    }

    /// Attach the stack monitor of the thread that services this scheduler
    pub fn set_stack_monitor(&mut self, monitor: Option<StackMonitor>) {
        self.stack = monitor;
    }

    /// Arm the timer and start playing `shape` at `hz` from `now`.
    ///
    /// Does nothing if already running.
    pub fn start<S: ShapeSource + ?Sized>(&mut self, shape: &S, hz: f32, now: Nanos) -> StimResult<()> {
        if self.is_running() {
            tracing::debug!("scheduler already running");
            return Ok(());
        }

        self.set_frequency(hz);
        self.load_shape(shape);
        self.queue.clear();
        self.generation = self.generation.wrapping_add(1);
        self.queue.insert(
            now,
            TimerAction::PhaseSwitch {
                generation: self.generation,
            },
        )?;
        self.transition(SchedulerState::Running);

        tracing::debug!(
            phases = self.sequence.phase_count(),
            version = shape.version(),
            period_ns = ?self.desired_period,
            "scheduler started"
        );
        Ok(())
    }

    /// Disarm the timer and forget all timing state
    pub fn stop(&mut self) {
        if !self.is_running() {
            return;
        }
        self.queue.clear();
        self.generation = self.generation.wrapping_add(1);
        self.schedule = ScheduleState::default();
        self.resync_levels = false;
        self.transition(SchedulerState::Stopped);
        tracing::debug!("scheduler stopped");
    }

    /// Set the cycle frequency; NaN or non-positive pauses the waveform
    pub fn set_frequency(&mut self, hz: f32) {
        self.desired_period = period_ns(hz);
        tracing::trace!(hz, period_ns = ?self.desired_period, "frequency set");
    }

    /// When the timer must fire next
    pub fn next_deadline(&self, now: Nanos) -> Option<Nanos> {
        self.queue.next_event_time(now)
    }

    /// Run every timer firing due at `now`.
    ///
    /// Returns the number of phase boundaries handled.
    pub fn service<S, L>(&mut self, shape: &S, now: Nanos, listener: &mut L) -> usize
    where
        S: ShapeSource + ?Sized,
        L: EdgeListener + ?Sized,
    {
        if !self.is_running() {
            return 0;
        }

        let mut fired = 0;
        while fired < self.config.max_firings_per_service {
            let Some((at, action)) = self.queue.execute_one(now) else {
                break;
            };
            match action {
                TimerAction::PhaseSwitch { generation } if generation == self.generation => {
                    let next = self.on_timer(at, shape, listener);
                    if let Err(e) = self.queue.insert(next, TimerAction::PhaseSwitch { generation }) {
                        tracing::error!(error = %e, "failed to re-arm phase timer");
                    }
                    fired += 1;
                }
                TimerAction::PhaseSwitch { .. } => {}
            }
        }

        if fired == self.config.max_firings_per_service && self.queue.has_due(now) {
            self.stats.deferred_passes += 1;
        }
        fired
    }

    fn on_timer<S, L>(&mut self, at: Nanos, shape: &S, listener: &mut L) -> Nanos
    where
        S: ShapeSource + ?Sized,
        L: EdgeListener + ?Sized,
    {
        if let Some(monitor) = &self.stack {
            if let Err(e) = monitor.check(self.config.expected_remaining_stack) {
                fatal_error(&e.to_string());
            }
        }
        self.stats.firings += 1;

        if self.schedule.shape_version != Some(shape.version()) {
            self.transition(SchedulerState::Reconfiguring);
            self.load_shape(shape);
            self.stats.shape_swaps += 1;
            tracing::info!(
                version = shape.version(),
                phases = self.sequence.phase_count(),
                "updating trigger shape"
            );
        }

        let Some(period) = self.desired_period else {
            self.stats.paused_firings += 1;
            self.schedule.period = AppliedPeriod::Reset;
            self.transition(SchedulerState::Running);
            return at.saturating_add(self.config.nan_sleep_ms.saturating_mul(1_000_000));
        };

        let phase = self.schedule.phase_index;
        if self.schedule.period != AppliedPeriod::Ns(period) {
            let offset = scale(self.sequence.start_time(phase), period);
            self.schedule.cycle_start_ns = at as i64 - offset as i64;
            self.schedule.period = AppliedPeriod::Ns(period);
            self.stats.period_resets += 1;
        }
        self.transition(SchedulerState::Running);

        let timestamp = at.max(self.last_timestamp);
        self.last_timestamp = timestamp;
        for channel in 0..MAX_CHANNELS {
            let state = self.sequence.state(channel, phase);
            let edge = if self.resync_levels {
                transition(self.levels[channel], state)
            } else {
                edge_at(&self.sequence, channel, phase)
            };
            self.levels[channel] = state;
            if let Some(direction) = edge {
                self.stats.edges += 1;
                listener.on_edge(EdgeEvent {
                    channel,
                    direction,
                    timestamp,
                });
            }
        }
        self.resync_levels = false;

        let next = self.schedule.cycle_start_ns + scale(self.sequence.switch_time(phase), period) as i64;
        self.schedule.phase_index += 1;
        if self.schedule.phase_index >= self.sequence.phase_count() {
            self.schedule.phase_index = 0;
            self.schedule.cycle_start_ns += period as i64;
        }
        (next.max(0) as Nanos).max(at + 1)
    }

    /// Copy a shape in one step and force timing to be re-established
    fn load_shape<S: ShapeSource + ?Sized>(&mut self, shape: &S) {
        let first_load = self.schedule.shape_version.is_none();
        self.sequence.clone_from(shape.sequence());
        self.schedule.shape_version = Some(shape.version());
        self.schedule.phase_index = 0;
        self.schedule.period = AppliedPeriod::Reset;

        if first_load {
            // Outputs are assumed to sit at the level of the last phase
            let last = self.sequence.phase_count() - 1;
            for (channel, level) in self.levels.iter_mut().enumerate() {
                *level = self.sequence.state(channel, last);
            }
            self.resync_levels = false;
        } else {
            self.resync_levels = true;
        }
    }

    fn transition(&mut self, to: SchedulerState) {
        if self.state == to {
            return;
        }
        debug_assert!(
            self.state.can_transition_to(to),
            "invalid scheduler transition {:?} -> {:?}",
            self.state,
            to
        );
        tracing::trace!(from = ?self.state, to = ?to, "scheduler state");
        self.state = to;
    }
}

impl Default for WaveformScheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

/// `fraction` of `period`, in nanoseconds
#[inline]
fn scale(fraction: f32, period: Nanos) -> Nanos {
    (fraction as f64 * period as f64).round() as Nanos
}
