//! RPM to cycle frequency conversion.
//!
//! One waveform cycle covers a different amount of crank rotation
//! depending on where the emulated sensor sits. The operation mode picks
//! the multiplier between crank revolutions and waveform cycles.

use serde::{Deserialize, Serialize};

/// Crank-speed sensor on a four-stroke engine, two cycles per cam turn
pub const SYMMETRICAL_CRANK_SENSOR_DIVIDER: u32 = 4;

/// Sensor turning at three times crank speed
pub const SYMMETRICAL_THREE_TIMES_CRANK_SENSOR_DIVIDER: u32 = 6;

/// Sensor turning at twelve times crank speed
pub const SYMMETRICAL_TWELVE_TIMES_CRANK_SENSOR_DIVIDER: u32 = 24;

/// Relation between crank rotation and one waveform cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationMode {
    /// Four-stroke, one cycle per crank revolution
    #[default]
    FourStrokeCrankSensor,
    /// Four-stroke, one cycle per cam revolution
    FourStrokeCamSensor,
    /// Four-stroke, sensor on the crank seeing two cycles per revolution
    FourStrokeSymmetricalCrankSensor,
    /// Four-stroke, sensor at three times crank speed
    FourStrokeThreeTimesCrankSensor,
    /// Four-stroke, sensor at twelve times crank speed
    FourStrokeTwelveTimesCrankSensor,
    /// Two-stroke
    TwoStroke,
    /// Not yet configured
    Undefined,
}

/// Waveform cycles per crank revolution
pub fn rpm_multiplier(mode: OperationMode) -> f32 {
    match mode {
        OperationMode::FourStrokeThreeTimesCrankSensor => {
            SYMMETRICAL_THREE_TIMES_CRANK_SENSOR_DIVIDER as f32 / 2.0
        }
        OperationMode::FourStrokeSymmetricalCrankSensor => {
            SYMMETRICAL_CRANK_SENSOR_DIVIDER as f32 / 2.0
        }
        OperationMode::FourStrokeTwelveTimesCrankSensor => {
            SYMMETRICAL_TWELVE_TIMES_CRANK_SENSOR_DIVIDER as f32 / 2.0
        }
        OperationMode::FourStrokeCamSensor => 0.5,
        OperationMode::FourStrokeCrankSensor => 1.0,
        OperationMode::TwoStroke | OperationMode::Undefined => 1.0,
    }
}

/// Cycle frequency in Hz, or NaN when `rpm == 0` (stop).
pub fn cycle_hz(rpm: u32, mode: OperationMode) -> f32 {
    if rpm == 0 {
        return f32::NAN;
    }
    rpm as f32 * rpm_multiplier(mode) / 60.0
}

/// Check if a frequency can drive the scheduler
#[inline]
pub fn is_running_frequency(hz: f32) -> bool {
    hz.is_finite() && hz > 0.0
}

/// Cycle period in nanoseconds, `None` for the stop sentinel
pub fn period_ns(hz: f32) -> Option<u64> {
    if !is_running_frequency(hz) {
        return None;
    }
    let ns = (1e9_f64 / hz as f64).round();
    if ns >= u64::MAX as f64 {
        return None;
    }
    Some((ns as u64).max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_MODES: [OperationMode; 7] = [
        OperationMode::FourStrokeCrankSensor,
        OperationMode::FourStrokeCamSensor,
        OperationMode::FourStrokeSymmetricalCrankSensor,
        OperationMode::FourStrokeThreeTimesCrankSensor,
        OperationMode::FourStrokeTwelveTimesCrankSensor,
        OperationMode::TwoStroke,
        OperationMode::Undefined,
    ];

    #[test]
    fn test_crank_6000_rpm() {
        assert_eq!(cycle_hz(6000, OperationMode::FourStrokeCrankSensor), 100.0);
    }

    #[test]
    fn test_multipliers() {
        assert_eq!(rpm_multiplier(OperationMode::FourStrokeCamSensor), 0.5);
        assert_eq!(rpm_multiplier(OperationMode::FourStrokeSymmetricalCrankSensor), 2.0);
        assert_eq!(rpm_multiplier(OperationMode::FourStrokeThreeTimesCrankSensor), 3.0);
        assert_eq!(rpm_multiplier(OperationMode::FourStrokeTwelveTimesCrankSensor), 12.0);
        assert_eq!(rpm_multiplier(OperationMode::TwoStroke), 1.0);
    }

    #[test]
    fn test_zero_rpm_is_stop() {
        for mode in ALL_MODES {
            assert!(cycle_hz(0, mode).is_nan(), "{:?}", mode);
        }
        assert_eq!(period_ns(cycle_hz(0, OperationMode::default())), None);
    }

    #[test]
    fn test_period() {
        assert_eq!(period_ns(100.0), Some(10_000_000));
        assert_eq!(period_ns(f32::NAN), None);
        assert_eq!(period_ns(-5.0), None);
        assert_eq!(period_ns(f32::INFINITY), None);
    }
}
