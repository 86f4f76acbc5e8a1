//! # Configuration
//!
//! YAML configuration for the trigger emulator.
//!
//! ## Configuration Search Path
//!
//! Configuration is loaded from the first file found:
//! 1. Path specified via `TRIGSTIM_CONFIG` environment variable
//! 2. `./trigstim.yaml` (current directory)
//! 3. `~/.config/trigstim/config.yaml` (user config)
//! 4. `/etc/trigstim/config.yaml` (system config)
//!
//! ## Example Configuration
//!
//! ```yaml
//! trigger_simulator_rpm: 1200
//! trigger_simulator_pins: [PD1, PD2, none]
//! trigger_simulator_pin_modes: [default, inverted, default]
//! invert_primary_trigger_signal: false
//! direct_self_stimulation: true
//!
//! scheduler:
//!   late_delay_ns: 10000
//!   nan_sleep_ms: 100
//!
//! timer_thread:
//!   max_sleep_us: 1000
//!
//! logging:
//!   level: debug
//!   format: compact
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use trigstim_io::{PinId, PinMode};

use crate::dispatch::ChannelPolarity;
use crate::observe::LogConfig;
use crate::runner::RunnerConfig;
use crate::scheduler::SchedulerConfig;
use crate::waveform::MAX_CHANNELS;

/// RPM the emulator starts at when nothing is configured
pub const DEFAULT_SELF_STIM_RPM: u32 = 1200;

/// Highest RPM accepted from configuration
pub const MAX_SIMULATOR_RPM: u32 = 100_000;

/// Error type for configuration operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("config not found: {0}")]
    NotFound(String),
    /// Failed to read configuration file
    #[error("failed to read config: {0}")]
    ReadError(String),
    /// Failed to parse configuration
    #[error("failed to parse config: {0}")]
    ParseError(String),
    /// Invalid configuration value
    #[error("invalid config: {0}")]
    ValidationError(String),
}

/// Emulator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmulatorConfig {
    /// Virtual engine speed; 0 stops edge production
    pub trigger_simulator_rpm: u32,
    /// Output pin per channel
    pub trigger_simulator_pins: [PinId; MAX_CHANNELS],
    /// Output stage per channel
    pub trigger_simulator_pin_modes: [PinMode; MAX_CHANNELS],
    /// Invert channel 0 when self-stimulating
    pub invert_primary_trigger_signal: bool,
    /// Invert channel 1 when self-stimulating
    pub invert_secondary_trigger_signal: bool,
    /// Feed the decoder directly instead of driving pins
    pub direct_self_stimulation: bool,
    /// Scheduler tuning
    pub scheduler: SchedulerConfig,
    /// Host timer thread
    pub timer_thread: RunnerConfig,
    /// Logging
    pub logging: LogConfig,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            trigger_simulator_rpm: DEFAULT_SELF_STIM_RPM,
            trigger_simulator_pins: [PinId::Unassigned; MAX_CHANNELS],
            trigger_simulator_pin_modes: [PinMode::Default; MAX_CHANNELS],
            invert_primary_trigger_signal: false,
            invert_secondary_trigger_signal: false,
            direct_self_stimulation: false,
            scheduler: SchedulerConfig::default(),
            timer_thread: RunnerConfig::default(),
            logging: LogConfig::default(),
        }
    }
}

impl EmulatorConfig {
    /// Load configuration from the default search path.
    ///
    /// Returns default config if no file is found.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = std::env::var("TRIGSTIM_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Self::load_from(&path);
            }
            return Err(ConfigError::NotFound(path.display().to_string()));
        }

        for path in Self::config_search_paths() {
            if path.exists() {
                return Self::load_from(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;

        let config = Self::parse(&content)?;
        tracing::debug!(path = %path.display(), "loaded emulator config");
        Ok(config)
    }

    /// Parse and validate configuration from a YAML string.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_yaml::from_str(yaml).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content =
            serde_yaml::to_string(self).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        std::fs::write(path, content)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))
    }

    /// Get configuration search paths.
    pub fn config_search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("./trigstim.yaml")];

        if let Some(dirs) = directories::ProjectDirs::from("", "", "trigstim") {
            paths.push(dirs.config_dir().join("config.yaml"));
        }

        paths.push(PathBuf::from("/etc/trigstim/config.yaml"));
        paths
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.trigger_simulator_rpm > MAX_SIMULATOR_RPM {
            return Err(ConfigError::ValidationError(format!(
                "trigger_simulator_rpm must be <= {}",
                MAX_SIMULATOR_RPM
            )));
        }

        for (i, pin) in self.trigger_simulator_pins.iter().enumerate() {
            if !pin.is_valid() {
                continue;
            }
            if self.trigger_simulator_pins[i + 1..].contains(pin) {
                return Err(ConfigError::ValidationError(format!(
                    "pin {} assigned to more than one channel",
                    pin
                )));
            }
        }

        if self.scheduler.max_firings_per_service == 0 {
            return Err(ConfigError::ValidationError(
                "scheduler.max_firings_per_service must be > 0".to_string(),
            ));
        }
        if self.scheduler.nan_sleep_ms == 0 {
            return Err(ConfigError::ValidationError(
                "scheduler.nan_sleep_ms must be > 0".to_string(),
            ));
        }
        if self.timer_thread.stack_size < self.scheduler.expected_remaining_stack * 2 {
            return Err(ConfigError::ValidationError(format!(
                "timer_thread.stack_size must be >= {} bytes",
                self.scheduler.expected_remaining_stack * 2
            )));
        }
        if matches!(self.timer_thread.realtime_priority, Some(p) if p == 0 || p > 99) {
            return Err(ConfigError::ValidationError(
                "timer_thread.realtime_priority must be in 1..=99".to_string(),
            ));
        }

        Ok(())
    }

    /// Inversion flags for the self-stimulation sink
    pub fn polarity(&self) -> ChannelPolarity {
        ChannelPolarity {
            invert_primary: self.invert_primary_trigger_signal,
            invert_secondary: self.invert_secondary_trigger_signal,
        }
    }
}

// ============================================================================
// Global Configuration Version
// ============================================================================

/// Process-wide configuration version.
///
/// Bumped whenever a subsystem changes effective configuration; other
/// subsystems compare against the last value they saw. The tag of the
/// most recent bump is kept for diagnostics.
#[derive(Debug)]
pub struct ConfigVersion {
    version: AtomicU32,
    last_tag: Mutex<&'static str>,
}

impl ConfigVersion {
    pub fn new() -> Self {
        Self {
            version: AtomicU32::new(0),
            last_tag: Mutex::new(""),
        }
    }

    /// Bump the version, returning the new value
    pub fn increment(&self, tag: &'static str) -> u32 {
        let version = self.version.fetch_add(1, Ordering::SeqCst).wrapping_add(1);
        match self.last_tag.lock() {
            Ok(mut last) => *last = tag,
            Err(poisoned) => *poisoned.into_inner() = tag,
        }
        tracing::debug!(version, tag, "global configuration version bumped");
        version
    }

    pub fn current(&self) -> u32 {
        self.version.load(Ordering::SeqCst)
    }

    /// Tag of the latest bump, empty before the first one
    pub fn last_tag(&self) -> &'static str {
        match self.last_tag.lock() {
            Ok(last) => *last,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

impl Default for ConfigVersion {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EmulatorConfig::default();
        assert_eq!(config.trigger_simulator_rpm, 1200);
        assert!(!config.direct_self_stimulation);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
trigger_simulator_rpm: 6000
trigger_simulator_pins: [PD1, PD2, none]
trigger_simulator_pin_modes: [default, inverted, default]
invert_secondary_trigger_signal: true
direct_self_stimulation: true
scheduler:
  nan_sleep_ms: 50
"#;
        let config = EmulatorConfig::parse(yaml).unwrap();
        assert_eq!(config.trigger_simulator_rpm, 6000);
        assert_eq!(config.trigger_simulator_pins[1], PinId::gpio('D', 2));
        assert_eq!(config.trigger_simulator_pins[2], PinId::Unassigned);
        assert_eq!(config.trigger_simulator_pin_modes[1], PinMode::Inverted);
        assert!(config.direct_self_stimulation);
        assert_eq!(config.scheduler.nan_sleep_ms, 50);
        assert_eq!(config.scheduler.late_delay_ns, 10_000);
        assert_eq!(
            config.polarity(),
            ChannelPolarity {
                invert_primary: false,
                invert_secondary: true
            }
        );
    }

    #[test]
    fn test_bad_pin_is_not_fatal() {
        let config = EmulatorConfig::parse("trigger_simulator_pins: [PA1, X9, none]").unwrap();
        assert_eq!(config.trigger_simulator_pins[1], PinId::Invalid);
    }

    #[test]
    fn test_validation() {
        let mut config = EmulatorConfig::default();
        config.trigger_simulator_rpm = MAX_SIMULATOR_RPM + 1;
        assert!(config.validate().is_err());

        let mut config = EmulatorConfig::default();
        config.trigger_simulator_pins = [PinId::gpio('A', 1), PinId::gpio('A', 1), PinId::Unassigned];
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));

        let mut config = EmulatorConfig::default();
        config.scheduler.max_firings_per_service = 0;
        assert!(config.validate().is_err());

        let mut config = EmulatorConfig::default();
        config.timer_thread.stack_size = 4096;
        assert!(config.validate().is_err());

        let mut config = EmulatorConfig::default();
        config.timer_thread.realtime_priority = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            EmulatorConfig::parse("trigger_simulator_rpm: [1, 2]"),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trigstim.yaml");

        let mut config = EmulatorConfig::default();
        config.trigger_simulator_rpm = 3000;
        config.trigger_simulator_pins[0] = PinId::gpio('E', 4);
        config.save(&path).unwrap();

        let loaded = EmulatorConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing_file() {
        let err = EmulatorConfig::load_from(Path::new("/nonexistent/trigstim.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadError(_)));
    }

    #[test]
    fn test_config_version() {
        let version = ConfigVersion::new();
        assert_eq!(version.current(), 0);
        assert_eq!(version.last_tag(), "");
        assert_eq!(version.increment("trgSim"), 1);
        assert_eq!(version.increment("disTrg"), 2);
        assert_eq!(version.current(), 2);
        assert_eq!(version.last_tag(), "disTrg");
    }
}
