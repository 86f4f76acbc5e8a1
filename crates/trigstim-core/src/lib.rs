//! # Trigger Emulator Core
//!
//! Synthesizes crank and cam position-sensor waveforms in real time. A
//! trigger shape is a cyclic sequence of phases, each holding the level of
//! up to three output channels. The emulator plays that sequence at a rate
//! derived from a virtual engine RPM and delivers every level change either
//! straight into the shaft-position decoder (self-stimulation) or onto
//! physical output pins (external stimulation).
//!
//! ## Components
//!
//! - [`waveform`]: phase sequences and edge detection
//! - [`frequency`]: RPM to cycle frequency for each operation mode
//! - [`event_queue`]: fixed-capacity sorted timer queue
//! - [`scheduler`]: the periodic phase engine
//! - [`dispatch`]: where edges go (decoder, pins, or nowhere)
//! - [`controller`]: lifecycle and configuration of one emulator
//! - [`runner`]: host thread standing in for the hardware timer
//!
//! ## Signal Flow
//!
//! ```text
//! RPM ─► FrequencyConverter ─► WaveformScheduler ─► DispatchSink ─┬─► EdgeDecoder
//!                                     ▲                           └─► PinBank ─► OutputPin
//!                               ShapeSource
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::{Arc, Mutex};
//! use trigstim_core::config::EmulatorConfig;
//! use trigstim_core::controller::EmulatorController;
//! use trigstim_core::dispatch::RecordingDecoder;
//! use trigstim_core::observe::init_logging;
//! use trigstim_core::runner::EmulatorRunner;
//! use trigstim_core::waveform::TriggerShape;
//! use trigstim_io::SimulatedPin;
//!
//! let config = EmulatorConfig::load().unwrap();
//! init_logging(&config.logging);
//!
//! let runner_config = config.timer_thread.clone();
//! let mut emulator = EmulatorController::new(
//!     config,
//!     TriggerShape::default(),
//!     RecordingDecoder::new(),
//!     std::array::from_fn(|_| SimulatedPin::new()),
//! );
//! emulator.init();
//! emulator.enable_self_stimulation(true).unwrap();
//!
//! let shared = Arc::new(Mutex::new(emulator));
//! let mut runner = EmulatorRunner::spawn(shared, runner_config).unwrap();
//! std::thread::sleep(std::time::Duration::from_secs(1));
//! runner.stop().unwrap();
//! ```
//!
//! ## Feature Flags
//!
//! - `shaft-input` (default): a shaft-position decoder is present
//! - `position-emulation` (default): position sensor emulation; requires
//!   `shaft-input`

#[cfg(all(feature = "position-emulation", not(feature = "shaft-input")))]
compile_error!("position-emulation requires the shaft-input feature");

pub mod clock;
pub mod config;
pub mod controller;
pub mod dispatch;
pub mod error;
pub mod event_queue;
pub mod frequency;
pub mod observe;
pub mod pins;
pub mod rt;
pub mod runner;
pub mod scheduler;
pub mod waveform;

pub use clock::{Clock, MockClock, Nanos, SystemClock};
pub use config::{ConfigError, ConfigVersion, EmulatorConfig};
pub use controller::EmulatorController;
pub use dispatch::{ChannelPolarity, DispatchMode, DispatchSink, EdgeDecoder, RecordingDecoder};
pub use error::{StimError, StimResult};
pub use event_queue::EventQueue;
pub use frequency::{cycle_hz, rpm_multiplier, OperationMode};
pub use pins::PinBank;
pub use runner::{EmulatorRunner, RunnerConfig, SharedController};
pub use scheduler::{
    EdgeEvent, EdgeListener, SchedulerConfig, SchedulerState, SchedulerStats, WaveformScheduler,
};
pub use waveform::{
    edge_at, previous_index, Direction, PhaseSequence, PinState, ShapeSource, TriggerShape,
    MAX_CHANNELS, MAX_PHASES,
};
