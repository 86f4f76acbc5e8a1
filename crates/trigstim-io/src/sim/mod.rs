//! Simulated output pins for development and testing
//!
//! A [`SimulatedPin`] behaves like a GPIO driver but only records what
//! happens to it. Several pins can share one [`PinTrace`] so tests can
//! check the relative order of writes across channels.

use std::sync::{Arc, Mutex};

use crate::error::{IoError, IoResult};
use crate::traits::OutputPin;
use crate::types::{PinId, PinLevel, PinMode};

/// What happened to a simulated pin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinEvent {
    /// Pin claimed with the given mode
    Init(PinMode),
    /// Pin released
    DeInit,
    /// Electrical level written
    Set(PinLevel),
}

/// One entry in a [`PinTrace`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinRecord {
    pub label: &'static str,
    pub pin: PinId,
    pub event: PinEvent,
}

/// Shared, append-only log of pin activity
#[derive(Debug, Clone, Default)]
pub struct PinTrace {
    records: Arc<Mutex<Vec<PinRecord>>>,
}

impl PinTrace {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, record: PinRecord) {
        let mut records = match self.records.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        records.push(record);
    }

    /// Copy of all records so far
    pub fn snapshot(&self) -> Vec<PinRecord> {
        match self.records.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Records for a single pin
    pub fn events_for(&self, pin: PinId) -> Vec<PinEvent> {
        self.snapshot()
            .into_iter()
            .filter(|r| r.pin == pin)
            .map(|r| r.event)
            .collect()
    }

    pub fn clear(&self) {
        match self.records.lock() {
            Ok(mut guard) => guard.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }
}

/// Software stand-in for a GPIO output driver
#[derive(Debug, Default)]
pub struct SimulatedPin {
    label: &'static str,
    pin: Option<PinId>,
    mode: PinMode,
    level: PinLevel,
    writes: u64,
    fail_init: bool,
    trace: PinTrace,
}

impl SimulatedPin {
    /// Create a pin with a private trace
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a pin that logs into a shared trace
    pub fn with_trace(trace: PinTrace) -> Self {
        Self {
            trace,
            ..Self::default()
        }
    }

    /// Make every subsequent `init_pin` fail with a hardware fault
    pub fn set_fail_init(&mut self, fail: bool) {
        self.fail_init = fail;
    }

    /// Electrical level currently driven
    pub fn level(&self) -> PinLevel {
        self.level
    }

    /// Number of `set_state` calls while initialized
    pub fn writes(&self) -> u64 {
        self.writes
    }

    pub fn mode(&self) -> PinMode {
        self.mode
    }

    pub fn trace(&self) -> &PinTrace {
        &self.trace
    }
}

impl OutputPin for SimulatedPin {
    fn init_pin(&mut self, label: &'static str, pin: PinId, mode: PinMode) -> IoResult<()> {
        if !pin.is_valid() {
            return Err(IoError::Unusable(pin.to_string()));
        }
        if let Some(current) = self.pin {
            return Err(IoError::AlreadyInitialized {
                label: self.label,
                pin: current.to_string(),
            });
        }
        if self.fail_init {
            return Err(IoError::HardwareFault {
                pin: pin.to_string(),
                reason: "simulated init failure".to_string(),
            });
        }

        self.label = label;
        self.pin = Some(pin);
        self.mode = mode;
        self.level = mode.electrical(PinLevel::Low);
        self.trace.push(PinRecord {
            label,
            pin,
            event: PinEvent::Init(mode),
        });
        Ok(())
    }

    fn de_init(&mut self) {
        if let Some(pin) = self.pin.take() {
            self.trace.push(PinRecord {
                label: self.label,
                pin,
                event: PinEvent::DeInit,
            });
        }
        self.level = PinLevel::Low;
    }

    fn set_state(&mut self, level: PinLevel) {
        let Some(pin) = self.pin else {
            return;
        };
        self.level = self.mode.electrical(level);
        self.writes += 1;
        self.trace.push(PinRecord {
            label: self.label,
            pin,
            event: PinEvent::Set(self.level),
        });
    }

    fn pin(&self) -> Option<PinId> {
        self.pin
    }
}
