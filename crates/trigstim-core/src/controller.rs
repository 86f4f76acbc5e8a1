//! # Emulator Controller
//!
//! Owns one emulator instance: the scheduler, the dispatch mode, the
//! output pin bank, and the collaborators edges flow to. Every entry
//! point takes `&mut self`, so there is exactly one writer at a time;
//! share a controller across threads through a `Mutex` (see
//! [`EmulatorRunner`](crate::runner::EmulatorRunner)).
//!
//! ## Example
//!
//! ```rust
//! use std::path::Path;
//! use std::sync::Arc;
//! use std::time::Duration;
//! use trigstim_core::clock::MockClock;
//! use trigstim_core::controller::EmulatorController;
//! use trigstim_core::config::EmulatorConfig;
//! use trigstim_core::dispatch::RecordingDecoder;
//! use trigstim_core::waveform::TriggerShape;
//! use trigstim_io::SimulatedPin;
//!
//! let clock = Arc::new(MockClock::new());
//! let mut emulator = EmulatorController::new(
//!     EmulatorConfig::default(),
//!     TriggerShape::default(),
//!     RecordingDecoder::new(),
//!     std::array::from_fn(|_| SimulatedPin::new()),
//! )
//! .with_clock(clock.clone());
//!
//! emulator.enable_self_stimulation(true).unwrap();
//! clock.advance(Duration::from_millis(100));
//! emulator.service();
//! assert!(!emulator.decoder().edges().is_empty());
//! ```

use std::path::Path;
use std::sync::Arc;

use trigstim_io::OutputPin;

use crate::clock::{Clock, Nanos, SystemClock};
use crate::config::{ConfigVersion, EmulatorConfig};
use crate::dispatch::{DispatchMode, DispatchSink, EdgeDecoder};
use crate::error::StimResult;
use crate::frequency::{cycle_hz, OperationMode};
use crate::pins::PinBank;
use crate::rt::StackMonitor;
use crate::scheduler::WaveformScheduler;
use crate::waveform::{ShapeSource, MAX_CHANNELS};

/// Version tag for enabling self-stimulation
pub const TAG_SELF_STIMULATION: &str = "trgSim";
/// Version tag for enabling external stimulation
pub const TAG_EXTERNAL_STIMULATION: &str = "extTrg";
/// Version tag for disabling the emulator
pub const TAG_DISABLED: &str = "disTrg";

/// Trigger emulator instance
pub struct EmulatorController<S, D, P> {
    config: EmulatorConfig,
    shape: S,
    decoder: D,
    pins: PinBank<P>,
    scheduler: WaveformScheduler,
    mode: DispatchMode,
    /// Scheduler armed by `start`
    started: bool,
    /// Pins must be driven low before the next edge is delivered
    pending_deassert: bool,
    /// Operation mode the current frequency was computed with
    applied_mode: OperationMode,
    clock: Arc<dyn Clock>,
    config_version: Arc<ConfigVersion>,
}

impl<S, D, P> EmulatorController<S, D, P>
where
    S: ShapeSource,
    D: EdgeDecoder,
    P: OutputPin,
{
    pub fn new(config: EmulatorConfig, shape: S, decoder: D, drivers: [P; MAX_CHANNELS]) -> Self {
        let scheduler = WaveformScheduler::new(config.scheduler.clone());
        let applied_mode = shape.operation_mode();
        Self {
            config,
            shape,
            decoder,
            pins: PinBank::new(drivers),
            scheduler,
            mode: DispatchMode::Stopped,
            started: false,
            pending_deassert: false,
            applied_mode,
            clock: Arc::new(SystemClock::new()),
            config_version: Arc::new(ConfigVersion::new()),
        }
    }

    /// Use a custom time source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Share a process-wide configuration version counter
    pub fn with_config_version(mut self, version: Arc<ConfigVersion>) -> Self {
        self.config_version = version;
        self
    }

    /// Announce the emulator and bind configured output pins
    pub fn init(&mut self) {
        tracing::info!(
            mode = ?self.shape.operation_mode(),
            phases = self.shape.sequence().phase_count(),
            "Emulating position sensors"
        );
        self.start_pins();
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Arm the scheduler at the configured RPM. No-op once started.
    pub fn start(&mut self) -> StimResult<()> {
        if self.started {
            return Ok(());
        }

        self.set_rpm(self.config.trigger_simulator_rpm);
        let hz = self.cycle_hz();
        let now = self.clock.now_ns();
        self.scheduler.start(&self.shape, hz, now)?;
        self.started = true;
        Ok(())
    }

    /// Change the virtual engine speed; 0 pauses edge output
    pub fn set_rpm(&mut self, rpm: u32) {
        self.config.trigger_simulator_rpm = rpm;
        self.applied_mode = self.shape.operation_mode();
        self.scheduler.set_frequency(self.cycle_hz());
        tracing::info!(rpm, "Emulating position sensor(s). RPM={}", rpm);
    }

    /// Feed generated edges straight into the decoder
    pub fn enable_self_stimulation(&mut self, increment_global_version: bool) -> StimResult<()> {
        self.start()?;
        if self.mode == DispatchMode::ExternalStimulation {
            self.pending_deassert = true;
        }
        self.mode = DispatchMode::SelfStimulation;
        self.config.direct_self_stimulation = true;
        if increment_global_version {
            self.config_version.increment(TAG_SELF_STIMULATION);
        }
        tracing::debug!("trigger self-stimulation enabled");
        Ok(())
    }

    /// Drive generated edges onto the output pins
    pub fn enable_external_stimulation(&mut self) -> StimResult<()> {
        self.start()?;
        // a queued deassert would cut the waveform now being driven
        self.pending_deassert = false;
        self.mode = DispatchMode::ExternalStimulation;
        self.config.direct_self_stimulation = false;
        self.config_version.increment(TAG_EXTERNAL_STIMULATION);
        tracing::debug!(has_pins = self.pins.has_pins(), "external trigger stimulation enabled");
        Ok(())
    }

    /// Stop producing edges; a later `start` re-initializes from scratch
    pub fn disable(&mut self) {
        if self.mode == DispatchMode::ExternalStimulation || self.pending_deassert {
            // no further tick will run, so release outputs now
            self.pins.deassert_all();
        }
        self.pending_deassert = false;
        self.mode = DispatchMode::Stopped;
        self.config.direct_self_stimulation = false;
        self.scheduler.stop();
        self.started = false;
        self.config_version.increment(TAG_DISABLED);
        tracing::debug!("trigger stimulation disabled");
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    /// React to a configuration change; cheap when the RPM did not move
    pub fn on_configuration_changed(&mut self, previous: &EmulatorConfig) {
        if self.config.trigger_simulator_rpm == previous.trigger_simulator_rpm {
            return;
        }
        self.set_rpm(self.config.trigger_simulator_rpm);
    }

    /// Install a new configuration, rebinding only pins that changed
    pub fn apply_configuration(&mut self, config: EmulatorConfig) {
        let previous = std::mem::replace(&mut self.config, config);
        self.stop_pins();
        self.start_pins();
        self.on_configuration_changed(&previous);
    }

    /// Load a configuration file and install it
    pub fn reload_configuration(&mut self, path: &Path) -> StimResult<()> {
        let config = EmulatorConfig::load_from(path)?;
        tracing::info!(path = %path.display(), "trigger emulator configuration reloaded");
        self.apply_configuration(config);
        Ok(())
    }

    /// Bind configured pins, initializing only the ones that changed
    pub fn start_pins(&mut self) -> usize {
        self.pins.start(
            &self.config.trigger_simulator_pins,
            &self.config.trigger_simulator_pin_modes,
        )
    }

    /// Release pins whose configuration changed
    pub fn stop_pins(&mut self) -> usize {
        self.pins.stop_changed(
            &self.config.trigger_simulator_pins,
            &self.config.trigger_simulator_pin_modes,
        )
    }

    // ========================================================================
    // Timer Context
    // ========================================================================

    /// Handle due timer firings at the clock's current time
    pub fn service(&mut self) -> usize {
        let now = self.clock.now_ns();
        self.service_at(now)
    }

    /// Handle due timer firings at `now`
    pub fn service_at(&mut self, now: Nanos) -> usize {
        if self.pending_deassert {
            self.pins.deassert_all();
            self.pending_deassert = false;
        }

        let mode = self.shape.operation_mode();
        if mode != self.applied_mode {
            self.applied_mode = mode;
            self.scheduler.set_frequency(self.cycle_hz());
            tracing::debug!(?mode, "operation mode changed, frequency recomputed");
        }

        let polarity = self.config.polarity();
        let mut sink = match self.mode {
            DispatchMode::SelfStimulation => DispatchSink::SelfStimulation {
                decoder: &mut self.decoder,
                polarity,
            },
            DispatchMode::ExternalStimulation => DispatchSink::ExternalStimulation {
                pins: &mut self.pins,
            },
            DispatchMode::Stopped => DispatchSink::Stopped,
        };
        self.scheduler.service(&self.shape, now, &mut sink)
    }

    /// When the timer must fire next, `None` if stopped
    pub fn next_deadline(&self) -> Option<Nanos> {
        self.scheduler.next_deadline(self.clock.now_ns())
    }

    pub(crate) fn set_stack_monitor(&mut self, monitor: Option<StackMonitor>) {
        self.scheduler.set_stack_monitor(monitor);
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Current cycle frequency for the configured RPM and shape
    pub fn cycle_hz(&self) -> f32 {
        cycle_hz(self.config.trigger_simulator_rpm, self.applied_mode)
    }

    pub fn config(&self) -> &EmulatorConfig {
        &self.config
    }

    pub fn mode(&self) -> DispatchMode {
        self.mode
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn has_pins(&self) -> bool {
        self.pins.has_pins()
    }

    pub fn scheduler(&self) -> &WaveformScheduler {
        &self.scheduler
    }

    pub fn shape(&self) -> &S {
        &self.shape
    }

    /// Shape collaborator; changes are picked up at the next firing
    pub fn shape_mut(&mut self) -> &mut S {
        &mut self.shape
    }

    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    pub fn decoder_mut(&mut self) -> &mut D {
        &mut self.decoder
    }

    pub fn pins(&self) -> &PinBank<P> {
        &self.pins
    }

    pub fn config_version(&self) -> &Arc<ConfigVersion> {
        &self.config_version
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }
}
