//! # Observability
//!
//! Structured logging for the emulator via `tracing`. Lifecycle events
//! (start, RPM changes, mode switches, shape swaps, pin binding) are logged
//! at `info`/`debug`; per-edge activity never goes above `trace`.
//!
//! ```rust,ignore
//! use trigstim_core::observe::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::development());
//! tracing::info!(rpm = 1200, "emulator ready");
//! ```

pub mod logging;

pub use logging::{init_logging, LogConfig, LogFormat, LogLevel};
