//! Emulator error types

use thiserror::Error;

use crate::config::ConfigError;

/// Result type for emulator operations
pub type StimResult<T> = Result<T, StimError>;

/// Errors produced while building or driving the emulator
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StimError {
    /// Phase sequence needs at least one phase
    #[error("Phase sequence must have at least one phase")]
    EmptySequence,

    /// Phase count exceeds pre-allocated storage
    #[error("Phase count {actual} exceeds maximum {max}")]
    TooManyPhases { actual: usize, max: usize },

    /// Channel index exceeds pre-allocated storage
    #[error("Channel {channel} out of range (max {max})")]
    ChannelOutOfRange { channel: usize, max: usize },

    /// Channel table length does not match phase count
    #[error("Channel {channel} has {actual} states, expected {expected}")]
    StateCountMismatch {
        channel: usize,
        expected: usize,
        actual: usize,
    },

    /// Switch times must rise strictly and end the cycle at 1.0
    #[error("Invalid switch time {value} at phase {phase}")]
    InvalidSwitchTime { phase: usize, value: f32 },

    /// Timer event pool exhausted
    #[error("Event queue full (capacity {capacity})")]
    QueueFull { capacity: usize },

    /// Not enough stack left for the timer callback
    #[error("Stack budget exceeded: {remaining} bytes left, {required} required")]
    StackBudgetExceeded { remaining: usize, required: usize },

    /// Pin driver failure
    #[error("Pin error: {0}")]
    Pin(#[from] trigstim_io::IoError),

    /// Configuration could not be loaded or is invalid
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Host timer thread could not be started
    #[error("Timer thread error: {0}")]
    Thread(String),
}

impl StimError {
    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            StimError::QueueFull { .. } => true,
            StimError::Pin(e) => e.is_recoverable(),
            _ => false,
        }
    }
}
