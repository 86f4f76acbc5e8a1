//! Output pin trait definition

use crate::error::IoResult;
use crate::types::{PinId, PinLevel, PinMode};

/// A single driven output pin.
///
/// One driver instance owns at most one physical pin at a time. The
/// emulator keeps one driver per waveform channel and moves it between
/// pins when configuration changes.
///
/// `set_state` takes the logical level; drivers apply [`PinMode`]
/// inversion themselves. It must not block or allocate, since it is
/// called from the timer callback.
pub trait OutputPin: Send {
    /// Claim `pin` for this driver and configure its output stage
    fn init_pin(&mut self, label: &'static str, pin: PinId, mode: PinMode) -> IoResult<()>;

    /// Release the pin. No-op if nothing is claimed.
    fn de_init(&mut self);

    /// Drive the pin to a logical level
    fn set_state(&mut self, level: PinLevel);

    /// Pin currently claimed, if any
    fn pin(&self) -> Option<PinId>;

    /// Check if the driver owns a pin
    fn is_initialized(&self) -> bool {
        self.pin().is_some()
    }
}

impl<T: OutputPin + ?Sized> OutputPin for Box<T> {
    fn init_pin(&mut self, label: &'static str, pin: PinId, mode: PinMode) -> IoResult<()> {
        (**self).init_pin(label, pin, mode)
    }

    fn de_init(&mut self) {
        (**self).de_init()
    }

    fn set_state(&mut self, level: PinLevel) {
        (**self).set_state(level)
    }

    fn pin(&self) -> Option<PinId> {
        (**self).pin()
    }
}
