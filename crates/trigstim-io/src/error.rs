//! Pin I/O error types

use thiserror::Error;

/// Result type for pin operations
pub type IoResult<T> = Result<T, IoError>;

/// Errors that can occur while driving output pins
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IoError {
    /// Pin identifier could not be parsed
    #[error("Invalid pin identifier: '{0}'")]
    InvalidPin(String),

    /// Pin is unassigned or outside the board's pin range
    #[error("Pin {0} is not usable on this board")]
    Unusable(String),

    /// Pin driver already owns a pin
    #[error("{label}: already initialized on {pin}")]
    AlreadyInitialized { label: &'static str, pin: String },

    /// Underlying hardware reported a fault
    #[error("Hardware fault on {pin}: {reason}")]
    HardwareFault { pin: String, reason: String },
}

impl IoError {
    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            IoError::HardwareFault { .. } | IoError::AlreadyInitialized { .. }
        )
    }
}
