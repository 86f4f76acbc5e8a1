//! Scheduler Tick Cost Benchmark
//!
//! Measures the cost of one timer pass through the phase engine.
//! Run with:
//!
//! ```bash
//! cargo bench -p trigstim-core --bench tick_bench
//! ```
//!
//! This benchmark measures:
//! - A single phase boundary, across sequence sizes
//! - A full cycle serviced in one pass
//! - A controller pass in self-stimulation, including dispatch

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;

use trigstim_core::clock::{MockClock, Nanos};
use trigstim_core::config::EmulatorConfig;
use trigstim_core::controller::EmulatorController;
use trigstim_core::dispatch::EdgeDecoder;
use trigstim_core::frequency::OperationMode;
use trigstim_core::scheduler::{EdgeEvent, SchedulerConfig, WaveformScheduler};
use trigstim_core::waveform::{PhaseSequence, PinState, TriggerShape};
use trigstim_io::SimulatedPin;

/// 60-2 style crank wheel on channel 0, cam tooth on channel 1
fn wheel(teeth: usize) -> TriggerShape {
    let phases = teeth * 2;
    let mut seq = PhaseSequence::new(phases, 2).expect("wheel fits in a sequence");
    for phase in 0..phases {
        let tooth = phase / 2;
        let high = phase % 2 == 1 && tooth < teeth - 2;
        let _ = seq.set_state(0, phase, PinState::from(high));
        let _ = seq.set_state(1, phase, PinState::from(phase < phases / 2));
    }
    TriggerShape::new(seq, OperationMode::FourStrokeCrankSensor)
}

struct NullDecoder(u64);

impl EdgeDecoder for NullDecoder {
    fn ingest_edge(&mut self, channel: usize, is_rise: bool, timestamp: Nanos) {
        self.0 = self
            .0
            .wrapping_add(black_box(channel as u64 + is_rise as u64 + timestamp));
    }
}

// ============================================================================
// Single Boundary
// ============================================================================

fn bench_single_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick/single");

    for teeth in [4, 36, 60, 120] {
        let shape = wheel(teeth);
        let mut scheduler = WaveformScheduler::default();
        let _ = scheduler.start(&shape, 100.0, 0);
        let mut listener = |edge: EdgeEvent| {
            black_box(edge);
        };

        group.bench_function(BenchmarkId::new("teeth", teeth), |b| {
            let mut now: Nanos = 0;
            b.iter(|| {
                now = scheduler.next_deadline(now).unwrap_or(now);
                black_box(scheduler.service(&shape, now, &mut listener))
            });
        });
    }

    group.finish();
}

// ============================================================================
// Full Cycle
// ============================================================================

fn bench_full_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick/cycle");
    let period: Nanos = 10_000_000;

    for teeth in [36, 60, 120] {
        let shape = wheel(teeth);
        let mut scheduler = WaveformScheduler::new(SchedulerConfig {
            max_firings_per_service: 1024,
            ..SchedulerConfig::default()
        });
        let _ = scheduler.start(&shape, 100.0, 0);
        let mut listener = |edge: EdgeEvent| {
            black_box(edge);
        };

        group.bench_function(BenchmarkId::new("teeth", teeth), |b| {
            let mut horizon: Nanos = 0;
            b.iter(|| {
                horizon += period;
                black_box(scheduler.service(&shape, horizon, &mut listener))
            });
        });
    }

    group.finish();
}

// ============================================================================
// Controller Pass
// ============================================================================

fn bench_controller_pass(c: &mut Criterion) {
    let clock = Arc::new(MockClock::new());
    let mut emulator = EmulatorController::new(
        EmulatorConfig {
            trigger_simulator_rpm: 6000,
            invert_primary_trigger_signal: true,
            ..Default::default()
        },
        wheel(60),
        NullDecoder(0),
        std::array::from_fn(|_| SimulatedPin::new()),
    )
    .with_clock(clock);
    let _ = emulator.enable_self_stimulation(false);

    c.bench_function("tick/controller_self_stimulation", |b| {
        let mut now: Nanos = 0;
        b.iter(|| {
            now = emulator.scheduler().next_deadline(now).unwrap_or(now);
            black_box(emulator.service_at(now))
        });
    });
}

criterion_group!(benches, bench_single_tick, bench_full_cycle, bench_controller_pass);
criterion_main!(benches);
