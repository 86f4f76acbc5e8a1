//! Pin identifiers, modes and electrical levels

use std::fmt;
use std::ops::Not;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::IoError;

/// Number of GPIO ports on the board (`A` through `I`)
pub const PORT_COUNT: u8 = 9;

/// Pins per GPIO port
pub const PINS_PER_PORT: u8 = 16;

/// Board pin identifier.
///
/// Configuration stores pins in their printed form (`"PA5"`, `"PC13"`);
/// `"none"` or an empty string leaves a channel unassigned. Anything that
/// does not parse becomes [`PinId::Invalid`] instead of failing the whole
/// configuration, so the channel is simply skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PinId {
    /// No pin configured
    #[default]
    Unassigned,
    /// Configured, but not a pin this board has
    Invalid,
    /// GPIO pin `P<port><index>`, port 0 being `A`
    Gpio { port: u8, index: u8 },
}

impl PinId {
    /// Create a GPIO pin from a port letter and index
    pub fn gpio(port: char, index: u8) -> Self {
        let upper = port.to_ascii_uppercase();
        if !upper.is_ascii_uppercase() {
            return PinId::Invalid;
        }
        let port = upper as u8 - b'A';
        if port >= PORT_COUNT || index >= PINS_PER_PORT {
            return PinId::Invalid;
        }
        PinId::Gpio { port, index }
    }

    /// Check if this identifier names a usable pin
    pub fn is_valid(&self) -> bool {
        match *self {
            PinId::Gpio { port, index } => port < PORT_COUNT && index < PINS_PER_PORT,
            PinId::Unassigned | PinId::Invalid => false,
        }
    }
}

impl fmt::Display for PinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            PinId::Unassigned => write!(f, "none"),
            PinId::Invalid => write!(f, "invalid"),
            PinId::Gpio { port, index } => write!(f, "P{}{}", (b'A' + port) as char, index),
        }
    }
}

impl FromStr for PinId {
    type Err = IoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
            return Ok(PinId::Unassigned);
        }

        let mut chars = trimmed.chars();
        let prefix = chars.next().map(|c| c.to_ascii_uppercase());
        let port = chars.next();
        let index = chars.as_str().parse::<u8>().ok();

        match (prefix, port, index) {
            (Some('P'), Some(port), Some(index)) => match PinId::gpio(port, index) {
                PinId::Invalid => Err(IoError::InvalidPin(trimmed.to_string())),
                pin => Ok(pin),
            },
            _ => Err(IoError::InvalidPin(trimmed.to_string())),
        }
    }
}

impl From<String> for PinId {
    fn from(s: String) -> Self {
        s.parse().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "treating pin as invalid");
            PinId::Invalid
        })
    }
}

impl From<PinId> for String {
    fn from(pin: PinId) -> Self {
        pin.to_string()
    }
}

/// Output stage configuration of a pin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PinMode {
    /// Push-pull, active high
    #[default]
    Default,
    /// Push-pull, active low
    Inverted,
    /// Open drain, active high
    OpenDrain,
    /// Open drain, active low
    OpenDrainInverted,
}

impl PinMode {
    /// Check if logical high drives the pin low
    pub fn is_inverted(&self) -> bool {
        matches!(self, PinMode::Inverted | PinMode::OpenDrainInverted)
    }

    /// Electrical level produced for a logical level
    pub fn electrical(&self, logical: PinLevel) -> PinLevel {
        if self.is_inverted() {
            !logical
        } else {
            logical
        }
    }
}

/// Logic level on a pin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinLevel {
    #[default]
    Low,
    High,
}

impl PinLevel {
    pub fn is_high(&self) -> bool {
        matches!(self, PinLevel::High)
    }
}

impl From<bool> for PinLevel {
    fn from(high: bool) -> Self {
        if high {
            PinLevel::High
        } else {
            PinLevel::Low
        }
    }
}

impl Not for PinLevel {
    type Output = PinLevel;

    fn not(self) -> PinLevel {
        match self {
            PinLevel::Low => PinLevel::High,
            PinLevel::High => PinLevel::Low,
        }
    }
}
