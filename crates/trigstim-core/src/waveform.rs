//! # Waveform Shape
//!
//! A [`PhaseSequence`] describes one cycle of a multi-channel trigger
//! waveform: an ordered, circular list of phases and, for every channel,
//! the logic level held during each phase. Edges exist only at phase
//! boundaries and are found by comparing a phase with its predecessor
//! ([`edge_at`]).
//!
//! Storage is fixed-size ([`MAX_CHANNELS`] x [`MAX_PHASES`]) so a
//! sequence can be copied into the scheduler without allocating.
//!
//! ## Example
//!
//! ```rust
//! use trigstim_core::waveform::{edge_at, Direction, PhaseSequence, PinState::*};
//!
//! let seq = PhaseSequence::from_channels(&[&[Low, High, High, Low]]).unwrap();
//! assert_eq!(edge_at(&seq, 0, 1), Some(Direction::Rising));
//! assert_eq!(edge_at(&seq, 0, 2), None);
//! assert_eq!(edge_at(&seq, 0, 3), Some(Direction::Falling));
//! ```

use serde::{Deserialize, Serialize};
use trigstim_io::PinLevel;

use crate::error::{StimError, StimResult};
use crate::frequency::OperationMode;

/// Channels a sequence can carry (primary, secondary, tertiary)
pub const MAX_CHANNELS: usize = 3;

/// Phases a sequence can carry
pub const MAX_PHASES: usize = 252;

/// Logic level of a channel during one phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinState {
    #[default]
    Low,
    High,
}

impl PinState {
    pub fn is_high(&self) -> bool {
        matches!(self, PinState::High)
    }

    /// Level a physical output should be driven to
    pub fn level(&self) -> PinLevel {
        PinLevel::from(self.is_high())
    }
}

impl From<bool> for PinState {
    fn from(high: bool) -> Self {
        if high {
            PinState::High
        } else {
            PinState::Low
        }
    }
}

/// Direction of a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Rising,
    Falling,
}

impl Direction {
    pub fn is_rise(&self) -> bool {
        matches!(self, Direction::Rising)
    }

    /// Level after the transition
    pub fn resulting_state(&self) -> PinState {
        match self {
            Direction::Rising => PinState::High,
            Direction::Falling => PinState::Low,
        }
    }
}

/// Edges produced at one phase boundary, indexed by channel
pub type EdgeSet = [Option<Direction>; MAX_CHANNELS];

/// One waveform cycle.
///
/// Channels at or above [`channel_count`](Self::channel_count) read as
/// constant `Low` and never produce edges.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseSequence {
    phase_count: usize,
    channel_count: usize,
    states: [[PinState; MAX_PHASES]; MAX_CHANNELS],
    /// Fraction of the cycle at which each phase ends
    switch_times: [f32; MAX_PHASES],
}

impl PhaseSequence {
    /// Create an all-low sequence with evenly spaced phases
    pub fn new(phase_count: usize, channel_count: usize) -> StimResult<Self> {
        if phase_count == 0 {
            return Err(StimError::EmptySequence);
        }
        if phase_count > MAX_PHASES {
            return Err(StimError::TooManyPhases {
                actual: phase_count,
                max: MAX_PHASES,
            });
        }
        if channel_count > MAX_CHANNELS {
            return Err(StimError::ChannelOutOfRange {
                channel: channel_count - 1,
                max: MAX_CHANNELS,
            });
        }

        let mut switch_times = [0.0; MAX_PHASES];
        for (phase, slot) in switch_times.iter_mut().take(phase_count).enumerate() {
            *slot = (phase + 1) as f32 / phase_count as f32;
        }
        // Guard against rounding leaving the last boundary short of 1.0
        switch_times[phase_count - 1] = 1.0;

        Ok(Self {
            phase_count,
            channel_count,
            states: [[PinState::Low; MAX_PHASES]; MAX_CHANNELS],
            switch_times,
        })
    }

    /// Build from per-channel state tables; all tables must have the same length
    pub fn from_channels(channels: &[&[PinState]]) -> StimResult<Self> {
        let phase_count = channels.first().map(|c| c.len()).unwrap_or(0);
        let mut seq = Self::new(phase_count, channels.len())?;

        for (channel, table) in channels.iter().enumerate() {
            if table.len() != phase_count {
                return Err(StimError::StateCountMismatch {
                    channel,
                    expected: phase_count,
                    actual: table.len(),
                });
            }
            seq.states[channel][..phase_count].copy_from_slice(table);
        }
        Ok(seq)
    }

    /// Replace the uniform phase timing with explicit switch times
    pub fn with_switch_times(mut self, times: &[f32]) -> StimResult<Self> {
        self.set_switch_times(times)?;
        Ok(self)
    }

    /// Set the fraction of the cycle at which each phase ends.
    ///
    /// Values must rise strictly within (0, 1] and the last must be 1.0.
    pub fn set_switch_times(&mut self, times: &[f32]) -> StimResult<()> {
        if times.len() != self.phase_count {
            return Err(StimError::StateCountMismatch {
                channel: 0,
                expected: self.phase_count,
                actual: times.len(),
            });
        }

        let mut previous = 0.0;
        for (phase, &value) in times.iter().enumerate() {
            if !(value > previous && value <= 1.0) {
                return Err(StimError::InvalidSwitchTime { phase, value });
            }
            previous = value;
        }
        if previous != 1.0 {
            return Err(StimError::InvalidSwitchTime {
                phase: self.phase_count - 1,
                value: previous,
            });
        }

        self.switch_times[..self.phase_count].copy_from_slice(times);
        Ok(())
    }

    /// Set one channel's level for one phase
    pub fn set_state(&mut self, channel: usize, phase: usize, state: PinState) -> StimResult<()> {
        if channel >= self.channel_count {
            return Err(StimError::ChannelOutOfRange {
                channel,
                max: self.channel_count,
            });
        }
        self.states[channel][phase % self.phase_count] = state;
        Ok(())
    }

    pub fn phase_count(&self) -> usize {
        self.phase_count
    }

    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    /// Level of `channel` during `phase` (index taken modulo the phase count)
    pub fn state(&self, channel: usize, phase: usize) -> PinState {
        if channel >= self.channel_count {
            return PinState::Low;
        }
        self.states[channel][phase % self.phase_count]
    }

    /// Fraction of the cycle at which `phase` ends
    pub fn switch_time(&self, phase: usize) -> f32 {
        self.switch_times[phase % self.phase_count]
    }

    /// Fraction of the cycle at which `phase` begins
    pub fn start_time(&self, phase: usize) -> f32 {
        match phase % self.phase_count {
            0 => 0.0,
            p => self.switch_times[p - 1],
        }
    }
}

impl Default for PhaseSequence {
    /// Single channel, square wave at 50% duty
    fn default() -> Self {
        let mut states = [[PinState::Low; MAX_PHASES]; MAX_CHANNELS];
        states[0][1] = PinState::High;
        let mut switch_times = [0.0; MAX_PHASES];
        switch_times[0] = 0.5;
        switch_times[1] = 1.0;
        Self {
            phase_count: 2,
            channel_count: 1,
            states,
            switch_times,
        }
    }
}

// ============================================================================
// Edge Detection
// ============================================================================

/// Index before `index` in a circular space of `count` phases
#[inline]
pub fn previous_index(index: usize, count: usize) -> usize {
    debug_assert!(count > 0);
    (index % count + count - 1) % count
}

/// Transition between two levels, if any
#[inline]
pub fn transition(from: PinState, to: PinState) -> Option<Direction> {
    match (from, to) {
        (PinState::Low, PinState::High) => Some(Direction::Rising),
        (PinState::High, PinState::Low) => Some(Direction::Falling),
        _ => None,
    }
}

/// Edge on `channel` at the boundary entering `phase`
#[inline]
pub fn edge_at(seq: &PhaseSequence, channel: usize, phase: usize) -> Option<Direction> {
    let prev = previous_index(phase, seq.phase_count());
    transition(seq.state(channel, prev), seq.state(channel, phase))
}

/// Edges on every channel entering `phase`, in channel order
pub fn edges_at(seq: &PhaseSequence, phase: usize) -> EdgeSet {
    let mut edges = [None; MAX_CHANNELS];
    for (channel, edge) in edges.iter_mut().enumerate() {
        *edge = edge_at(seq, channel, phase);
    }
    edges
}

// ============================================================================
// Shape Source
// ============================================================================

/// Producer of the current waveform shape.
///
/// `version` must increase whenever `sequence` changes. The scheduler
/// polls it on every timer firing and copies the sequence when it moves.
pub trait ShapeSource {
    fn version(&self) -> u32;

    fn sequence(&self) -> &PhaseSequence;

    fn operation_mode(&self) -> OperationMode;
}

/// Versioned shape held in memory
#[derive(Debug, Clone)]
pub struct TriggerShape {
    version: u32,
    sequence: PhaseSequence,
    mode: OperationMode,
}

impl TriggerShape {
    pub fn new(sequence: PhaseSequence, mode: OperationMode) -> Self {
        Self {
            version: 1,
            sequence,
            mode,
        }
    }

    /// Install a new sequence and bump the version
    pub fn replace(&mut self, sequence: PhaseSequence) {
        self.sequence = sequence;
        self.version = self.version.wrapping_add(1);
    }

    /// Change the operation mode and bump the version
    pub fn set_operation_mode(&mut self, mode: OperationMode) {
        self.mode = mode;
        self.version = self.version.wrapping_add(1);
    }
}

impl Default for TriggerShape {
    fn default() -> Self {
        Self::new(PhaseSequence::default(), OperationMode::default())
    }
}

impl ShapeSource for TriggerShape {
    fn version(&self) -> u32 {
        self.version
    }

    fn sequence(&self) -> &PhaseSequence {
        &self.sequence
    }

    fn operation_mode(&self) -> OperationMode {
        self.mode
    }
}

#[cfg(test)]
mod tests {
    use super::PinState::{High, Low};
    use super::*;

    #[test]
    fn test_previous_index_wraps() {
        assert_eq!(previous_index(0, 4), 3);
        assert_eq!(previous_index(1, 4), 0);
        assert_eq!(previous_index(0, 1), 0);
    }

    #[test]
    fn test_edge_scenario() {
        let seq = PhaseSequence::from_channels(&[&[Low, High, High, Low]]).unwrap();
        assert_eq!(edge_at(&seq, 0, 0), None);
        assert_eq!(edge_at(&seq, 0, 1), Some(Direction::Rising));
        assert_eq!(edge_at(&seq, 0, 2), None);
        assert_eq!(edge_at(&seq, 0, 3), Some(Direction::Falling));
    }

    #[test]
    fn test_simultaneous_edges_in_channel_order() {
        let seq = PhaseSequence::from_channels(&[&[Low, High], &[High, Low]]).unwrap();
        assert_eq!(
            edges_at(&seq, 1),
            [Some(Direction::Rising), Some(Direction::Falling), None]
        );
        assert_eq!(
            edges_at(&seq, 0),
            [Some(Direction::Falling), Some(Direction::Rising), None]
        );
    }

    #[test]
    fn test_unused_channels_are_quiet() {
        let seq = PhaseSequence::from_channels(&[&[Low, High]]).unwrap();
        assert_eq!(seq.state(2, 1), Low);
        assert_eq!(edge_at(&seq, 2, 1), None);
    }

    #[test]
    fn test_single_phase_has_no_edges() {
        let seq = PhaseSequence::from_channels(&[&[High]]).unwrap();
        assert_eq!(edge_at(&seq, 0, 0), None);
    }

    #[test]
    fn test_construction_errors() {
        assert_eq!(PhaseSequence::new(0, 1).unwrap_err(), StimError::EmptySequence);
        assert!(matches!(
            PhaseSequence::new(MAX_PHASES + 1, 1),
            Err(StimError::TooManyPhases { .. })
        ));
        assert!(matches!(
            PhaseSequence::new(4, MAX_CHANNELS + 1),
            Err(StimError::ChannelOutOfRange { .. })
        ));
        assert!(matches!(
            PhaseSequence::from_channels(&[&[Low, High], &[Low]]),
            Err(StimError::StateCountMismatch { channel: 1, .. })
        ));
    }

    #[test]
    fn test_uniform_switch_times() {
        let seq = PhaseSequence::new(4, 1).unwrap();
        assert_eq!(seq.switch_time(0), 0.25);
        assert_eq!(seq.switch_time(3), 1.0);
        assert_eq!(seq.start_time(0), 0.0);
        assert_eq!(seq.start_time(2), 0.5);
    }

    #[test]
    fn test_irregular_switch_times() {
        let seq = PhaseSequence::new(3, 1)
            .unwrap()
            .with_switch_times(&[0.1, 0.6, 1.0])
            .unwrap();
        assert_eq!(seq.start_time(1), 0.1);
        assert_eq!(seq.switch_time(1), 0.6);

        let bad = PhaseSequence::new(3, 1).unwrap();
        assert!(bad.clone().with_switch_times(&[0.5, 0.4, 1.0]).is_err());
        assert!(bad.clone().with_switch_times(&[0.2, 0.4, 0.9]).is_err());
        assert!(bad.with_switch_times(&[0.5, 1.0]).is_err());
    }

    #[test]
    fn test_shape_version_bumps() {
        let mut shape = TriggerShape::default();
        let v = shape.version();
        shape.replace(PhaseSequence::new(8, 2).unwrap());
        assert_eq!(shape.version(), v + 1);
        assert_eq!(shape.sequence().phase_count(), 8);
    }
}
