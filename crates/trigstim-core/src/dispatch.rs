//! Edge delivery.
//!
//! Generated edges go to exactly one place at a time: straight into the
//! shaft-position decoder (self-stimulation), onto physical output pins
//! (external stimulation), or nowhere. [`DispatchSink`] borrows whichever
//! collaborator the current [`DispatchMode`] needs for one service pass.

use trigstim_io::OutputPin;

use crate::clock::Nanos;
use crate::pins::PinBank;
use crate::scheduler::{EdgeEvent, EdgeListener};

/// Where generated edges go
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DispatchMode {
    #[default]
    Stopped,
    /// Feed the decoder in-process
    SelfStimulation,
    /// Drive the output pins
    ExternalStimulation,
}

/// Shaft-position decoder input
pub trait EdgeDecoder {
    /// Handle one edge on `channel`
    fn ingest_edge(&mut self, channel: usize, is_rise: bool, timestamp: Nanos);
}

impl<T: EdgeDecoder + ?Sized> EdgeDecoder for Box<T> {
    fn ingest_edge(&mut self, channel: usize, is_rise: bool, timestamp: Nanos) {
        (**self).ingest_edge(channel, is_rise, timestamp)
    }
}

/// Polarity inversion for self-stimulated edges.
///
/// Only the primary (0) and secondary (1) channels can be inverted;
/// higher channels pass through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChannelPolarity {
    pub invert_primary: bool,
    pub invert_secondary: bool,
}

impl ChannelPolarity {
    #[inline]
    pub fn apply(&self, channel: usize, is_rise: bool) -> bool {
        match channel {
            0 => is_rise ^ self.invert_primary,
            1 => is_rise ^ self.invert_secondary,
            _ => is_rise,
        }
    }
}

/// Active edge consumer for one service pass
pub enum DispatchSink<'a, D: ?Sized, P> {
    SelfStimulation {
        decoder: &'a mut D,
        polarity: ChannelPolarity,
    },
    ExternalStimulation {
        pins: &'a mut PinBank<P>,
    },
    Stopped,
}

impl<'a, D: ?Sized, P> DispatchSink<'a, D, P> {
    pub fn mode(&self) -> DispatchMode {
        match self {
            DispatchSink::SelfStimulation { .. } => DispatchMode::SelfStimulation,
            DispatchSink::ExternalStimulation { .. } => DispatchMode::ExternalStimulation,
            DispatchSink::Stopped => DispatchMode::Stopped,
        }
    }
}

impl<'a, D, P> EdgeListener for DispatchSink<'a, D, P>
where
    D: EdgeDecoder + ?Sized,
    P: OutputPin,
{
    #[inline]
    fn on_edge(&mut self, edge: EdgeEvent) {
        match self {
            DispatchSink::SelfStimulation { decoder, polarity } => {
                let is_rise = polarity.apply(edge.channel, edge.direction.is_rise());
                decoder.ingest_edge(edge.channel, is_rise, edge.timestamp);
            }
            DispatchSink::ExternalStimulation { pins } => {
                if !pins.has_pins() {
                    return;
                }
                pins.apply(edge.channel, edge.direction.resulting_state().level());
            }
            DispatchSink::Stopped => {}
        }
    }
}

/// Edge delivered to a [`RecordingDecoder`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestedEdge {
    pub channel: usize,
    pub is_rise: bool,
    pub timestamp: Nanos,
}

/// Decoder that just keeps what it is fed
#[derive(Debug, Clone, Default)]
pub struct RecordingDecoder {
    edges: Vec<IngestedEdge>,
}

impl RecordingDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn edges(&self) -> &[IngestedEdge] {
        &self.edges
    }

    /// Rising and falling counts on `channel`
    pub fn counts(&self, channel: usize) -> (usize, usize) {
        self.edges
            .iter()
            .filter(|e| e.channel == channel)
            .fold((0, 0), |(rise, fall), e| {
                if e.is_rise {
                    (rise + 1, fall)
                } else {
                    (rise, fall + 1)
                }
            })
    }

    pub fn clear(&mut self) {
        self.edges.clear();
    }
}

impl EdgeDecoder for RecordingDecoder {
    fn ingest_edge(&mut self, channel: usize, is_rise: bool, timestamp: Nanos) {
        self.edges.push(IngestedEdge {
            channel,
            is_rise,
            timestamp,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::waveform::{Direction, MAX_CHANNELS};
    use trigstim_io::{PinId, PinLevel, PinMode, SimulatedPin};

    fn edge(channel: usize, direction: Direction) -> EdgeEvent {
        EdgeEvent {
            channel,
            direction,
            timestamp: 42,
        }
    }

    #[test]
    fn test_polarity_only_first_two_channels() {
        let polarity = ChannelPolarity {
            invert_primary: true,
            invert_secondary: true,
        };
        assert!(!polarity.apply(0, true));
        assert!(polarity.apply(1, false));
        assert!(polarity.apply(2, true));
        assert!(!polarity.apply(2, false));
    }

    #[test]
    fn test_self_stimulation_forwards() {
        let mut decoder = RecordingDecoder::new();
        let mut sink: DispatchSink<'_, _, SimulatedPin> = DispatchSink::SelfStimulation {
            decoder: &mut decoder,
            polarity: ChannelPolarity {
                invert_primary: false,
                invert_secondary: true,
            },
        };
        assert_eq!(sink.mode(), DispatchMode::SelfStimulation);
        sink.on_edge(edge(0, Direction::Rising));
        sink.on_edge(edge(1, Direction::Rising));
        sink.on_edge(edge(2, Direction::Falling));

        assert_eq!(
            decoder.edges(),
            &[
                IngestedEdge { channel: 0, is_rise: true, timestamp: 42 },
                IngestedEdge { channel: 1, is_rise: false, timestamp: 42 },
                IngestedEdge { channel: 2, is_rise: false, timestamp: 42 },
            ]
        );
        assert_eq!(decoder.counts(0), (1, 0));
    }

    #[test]
    fn test_external_stimulation_drives_pins() {
        let mut bank = PinBank::new(std::array::from_fn(|_| SimulatedPin::new()));
        let pins = [PinId::gpio('A', 1), PinId::Unassigned, PinId::Unassigned];
        bank.start(&pins, &[PinMode::Default; MAX_CHANNELS]);

        let mut sink: DispatchSink<'_, RecordingDecoder, _> =
            DispatchSink::ExternalStimulation { pins: &mut bank };
        sink.on_edge(edge(0, Direction::Rising));
        sink.on_edge(edge(1, Direction::Rising));
        assert_eq!(bank.driver(0).unwrap().level(), PinLevel::High);
        assert_eq!(bank.driver(1).unwrap().writes(), 0);
    }

    #[test]
    fn test_external_without_pins_is_noop() {
        let mut bank: PinBank<SimulatedPin> = PinBank::new(std::array::from_fn(|_| SimulatedPin::new()));
        let mut sink: DispatchSink<'_, RecordingDecoder, _> =
            DispatchSink::ExternalStimulation { pins: &mut bank };
        sink.on_edge(edge(0, Direction::Rising));
        assert_eq!(bank.driver(0).unwrap().writes(), 0);
    }

    #[test]
    fn test_stopped_drops_edges() {
        let mut sink: DispatchSink<'_, RecordingDecoder, SimulatedPin> = DispatchSink::Stopped;
        sink.on_edge(edge(0, Direction::Rising));
        assert_eq!(sink.mode(), DispatchMode::Stopped);
    }
}
