//! Trigger Emulator Pin I/O
//!
//! Hardware boundary of the trigger emulator: pin identifiers, output
//! modes, and the [`OutputPin`] driver trait the emulator uses to drive
//! its waveform onto physical outputs.
//!
//! # Feature Flags
//!
//! - `sim` (default): [`SimulatedPin`], a recording software backend
//!
//! # Example
//!
//! ```rust
//! use trigstim_io::{OutputPin, PinLevel, PinMode, SimulatedPin};
//!
//! let mut pin = SimulatedPin::new();
//! pin.init_pin("Trigger emulator 1", "PA5".parse().unwrap(), PinMode::Default)
//!     .unwrap();
//! pin.set_state(PinLevel::High);
//! assert_eq!(pin.level(), PinLevel::High);
//! ```

pub mod error;
pub mod traits;
pub mod types;

#[cfg(feature = "sim")]
pub mod sim;

pub use error::{IoError, IoResult};
pub use traits::OutputPin;
pub use types::{PinId, PinLevel, PinMode, PINS_PER_PORT, PORT_COUNT};

#[cfg(feature = "sim")]
pub use sim::{PinEvent, PinRecord, PinTrace, SimulatedPin};
