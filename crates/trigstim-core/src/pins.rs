//! Output pin bank for external stimulation.
//!
//! One [`OutputPin`] driver per channel. The bank remembers which pin and
//! mode each driver was last bound to, so reconfiguration only touches
//! channels whose settings moved.

use trigstim_io::{OutputPin, PinId, PinLevel, PinMode};

use crate::error::{StimError, StimResult};
use crate::waveform::MAX_CHANNELS;

/// Labels under which the pins are claimed
pub const PIN_LABELS: [&str; MAX_CHANNELS] = [
    "Trigger emulator 1",
    "Trigger emulator 2",
    "Trigger emulator 3",
];

/// Per-channel output drivers plus their binding snapshot
#[derive(Debug)]
pub struct PinBank<P> {
    drivers: [P; MAX_CHANNELS],
    bound: [(PinId, PinMode); MAX_CHANNELS],
    has_pins: bool,
}

impl<P: OutputPin> PinBank<P> {
    pub fn new(drivers: [P; MAX_CHANNELS]) -> Self {
        Self {
            drivers,
            bound: [(PinId::Unassigned, PinMode::Default); MAX_CHANNELS],
            has_pins: false,
        }
    }

    /// At least one channel has a usable pin configured
    #[inline]
    pub fn has_pins(&self) -> bool {
        self.has_pins
    }

    /// Release drivers whose configured pin or mode differs from `pins`/`modes`.
    ///
    /// Returns the number of channels released.
    pub fn stop_changed(&mut self, pins: &[PinId; MAX_CHANNELS], modes: &[PinMode; MAX_CHANNELS]) -> usize {
        let mut released = 0;
        for channel in 0..MAX_CHANNELS {
            let wanted = (pins[channel], modes[channel]);
            if wanted == self.bound[channel] {
                continue;
            }
            if self.drivers[channel].is_initialized() {
                self.drivers[channel].de_init();
                released += 1;
            }
            self.bound[channel] = (PinId::Unassigned, PinMode::Default);
        }
        released
    }

    /// Bind every channel to its configured pin.
    ///
    /// Channels already bound to the same pin and mode are left alone;
    /// changed ones are released first. Unusable pins are skipped, and a
    /// driver that refuses its pin leaves that channel dark.
    /// Returns the number of channels (re)initialized.
    pub fn start(&mut self, pins: &[PinId; MAX_CHANNELS], modes: &[PinMode; MAX_CHANNELS]) -> usize {
        self.stop_changed(pins, modes);

        self.has_pins = pins.iter().any(PinId::is_valid);
        let mut initialized = 0;
        for channel in 0..MAX_CHANNELS {
            let (pin, mode) = (pins[channel], modes[channel]);
            if self.drivers[channel].is_initialized() || !pin.is_valid() {
                continue;
            }
            match self.bind(channel, pin, mode) {
                Ok(()) => initialized += 1,
                Err(e) => {
                    tracing::warn!(channel, %pin, error = %e, "trigger emulator pin unavailable");
                }
            }
        }
        initialized
    }

    /// Claim `pin` for `channel` and record the binding
    pub fn bind(&mut self, channel: usize, pin: PinId, mode: PinMode) -> StimResult<()> {
        let driver = self
            .drivers
            .get_mut(channel)
            .ok_or(StimError::ChannelOutOfRange {
                channel,
                max: MAX_CHANNELS,
            })?;
        driver.init_pin(PIN_LABELS[channel], pin, mode)?;
        self.bound[channel] = (pin, mode);
        tracing::debug!(channel, %pin, ?mode, "trigger emulator pin bound");
        Ok(())
    }

    /// Release every driver
    pub fn stop_all(&mut self) {
        for (driver, bound) in self.drivers.iter_mut().zip(self.bound.iter_mut()) {
            driver.de_init();
            *bound = (PinId::Unassigned, PinMode::Default);
        }
        self.has_pins = false;
    }

    /// Drive `channel` to `level`; unbound channels are skipped
    #[inline]
    pub fn apply(&mut self, channel: usize, level: PinLevel) {
        if let Some(driver) = self.drivers.get_mut(channel) {
            if driver.is_initialized() {
                driver.set_state(level);
            }
        }
    }

    /// Drive every bound channel low
    pub fn deassert_all(&mut self) {
        for driver in self.drivers.iter_mut().filter(|d| d.is_initialized()) {
            driver.set_state(PinLevel::Low);
        }
    }

    /// Pin and mode a channel is currently bound to
    pub fn binding(&self, channel: usize) -> Option<(PinId, PinMode)> {
        self.bound
            .get(channel)
            .copied()
            .filter(|(pin, _)| pin.is_valid())
    }

    pub fn driver(&self, channel: usize) -> Option<&P> {
        self.drivers.get(channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trigstim_io::{IoError, PinEvent, PinTrace, SimulatedPin};

    fn bank(trace: &PinTrace) -> PinBank<SimulatedPin> {
        PinBank::new(std::array::from_fn(|_| SimulatedPin::with_trace(trace.clone())))
    }

    const MODES: [PinMode; MAX_CHANNELS] = [PinMode::Default; MAX_CHANNELS];

    #[test]
    fn test_no_pins_configured() {
        let trace = PinTrace::new();
        let mut bank = bank(&trace);
        assert_eq!(bank.start(&[PinId::Unassigned; MAX_CHANNELS], &MODES), 0);
        assert!(!bank.has_pins());
        assert!(trace.snapshot().is_empty());
    }

    #[test]
    fn test_invalid_pins_skipped() {
        let trace = PinTrace::new();
        let mut bank = bank(&trace);
        let pins = [PinId::gpio('A', 5), PinId::Invalid, PinId::Unassigned];
        assert_eq!(bank.start(&pins, &MODES), 1);
        assert!(bank.has_pins());
        assert_eq!(bank.binding(0), Some((PinId::gpio('A', 5), PinMode::Default)));
        assert_eq!(bank.binding(1), None);

        bank.apply(1, PinLevel::High);
        bank.apply(0, PinLevel::High);
        assert_eq!(bank.driver(0).unwrap().level(), PinLevel::High);
        assert_eq!(bank.driver(1).unwrap().writes(), 0);
    }

    #[test]
    fn test_only_changed_pins_reinitialized() {
        let trace = PinTrace::new();
        let mut bank = bank(&trace);
        let pins = [PinId::gpio('A', 1), PinId::gpio('A', 2), PinId::Unassigned];
        assert_eq!(bank.start(&pins, &MODES), 2);
        trace.clear();

        // same config again touches nothing
        assert_eq!(bank.start(&pins, &MODES), 0);
        assert!(trace.snapshot().is_empty());

        let moved = [PinId::gpio('A', 1), PinId::gpio('B', 2), PinId::Unassigned];
        assert_eq!(bank.start(&moved, &MODES), 1);
        assert!(trace.events_for(PinId::gpio('A', 1)).is_empty());
        assert_eq!(trace.events_for(PinId::gpio('A', 2)), vec![PinEvent::DeInit]);
        assert_eq!(
            trace.events_for(PinId::gpio('B', 2)),
            vec![PinEvent::Init(PinMode::Default)]
        );
    }

    #[test]
    fn test_mode_change_rebinds() {
        let trace = PinTrace::new();
        let mut bank = bank(&trace);
        let pins = [PinId::gpio('C', 3), PinId::Unassigned, PinId::Unassigned];
        bank.start(&pins, &MODES);

        let mut modes = MODES;
        modes[0] = PinMode::Inverted;
        assert_eq!(bank.stop_changed(&pins, &modes), 1);
        assert_eq!(bank.start(&pins, &modes), 1);
        assert_eq!(bank.driver(0).unwrap().mode(), PinMode::Inverted);
    }

    #[test]
    fn test_pins_swapped_between_channels() {
        let trace = PinTrace::new();
        let mut bank = bank(&trace);
        let a = PinId::gpio('A', 1);
        let b = PinId::gpio('A', 2);
        bank.start(&[a, b, PinId::Unassigned], &MODES);
        assert_eq!(bank.start(&[b, a, PinId::Unassigned], &MODES), 2);
        assert_eq!(bank.binding(0), Some((b, PinMode::Default)));
        assert_eq!(bank.binding(1), Some((a, PinMode::Default)));
    }

    #[test]
    fn test_failed_init_leaves_channel_dark() {
        let trace = PinTrace::new();
        let mut drivers: [SimulatedPin; MAX_CHANNELS] =
            std::array::from_fn(|_| SimulatedPin::with_trace(trace.clone()));
        drivers[0].set_fail_init(true);
        let mut bank = PinBank::new(drivers);

        let pins = [PinId::gpio('A', 1), PinId::gpio('A', 2), PinId::Unassigned];
        assert_eq!(bank.start(&pins, &MODES), 1);
        assert_eq!(bank.binding(0), None);
        assert!(bank.has_pins());
    }

    #[test]
    fn test_bind_reports_driver_errors() {
        let trace = PinTrace::new();
        let mut bank = bank(&trace);
        let pin = PinId::gpio('D', 4);
        bank.bind(0, pin, PinMode::Default).unwrap();

        let err = bank.bind(0, PinId::gpio('D', 5), PinMode::Default).unwrap_err();
        assert!(matches!(
            err,
            StimError::Pin(IoError::AlreadyInitialized { .. })
        ));
        assert!(err.is_recoverable());
        assert_eq!(bank.binding(0), Some((pin, PinMode::Default)));

        assert!(matches!(
            bank.bind(1, PinId::Unassigned, PinMode::Default),
            Err(StimError::Pin(IoError::Unusable(_)))
        ));
        assert!(matches!(
            bank.bind(MAX_CHANNELS, pin, PinMode::Default),
            Err(StimError::ChannelOutOfRange { .. })
        ));
    }

    #[test]
    fn test_deassert_and_stop_all() {
        let trace = PinTrace::new();
        let mut bank = bank(&trace);
        let pins = [PinId::gpio('A', 1), PinId::gpio('A', 2), PinId::Unassigned];
        bank.start(&pins, &MODES);
        bank.apply(0, PinLevel::High);
        bank.apply(1, PinLevel::High);

        bank.deassert_all();
        assert_eq!(bank.driver(0).unwrap().level(), PinLevel::Low);
        assert_eq!(bank.driver(1).unwrap().level(), PinLevel::Low);

        bank.stop_all();
        assert!(!bank.has_pins());
        assert!(!bank.driver(0).unwrap().is_initialized());
    }
}
