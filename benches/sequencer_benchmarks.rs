use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use echo_delirium::graph::CaptureGraph;
use echo_delirium::sequencer::{Sequencer, StepCount, TickScheduler};
use echo_delirium::store::MemoryBlobStore;
use echo_delirium::track::{RowPattern, TrackType};
use std::sync::Arc;

fn dense_sequencer(tracks: usize) -> Sequencer {
    let mut seq = Sequencer::new(
        Box::new(CaptureGraph::new()),
        Arc::new(MemoryBlobStore::new()),
    );
    for i in 0..tracks {
        let track_type = match i % 3 {
            0 => TrackType::Bass,
            1 => TrackType::Poly,
            _ => TrackType::Drum,
        };
        let id = seq.add_track(track_type, format!("lane {i}"));
        for step in 0..16 {
            let degree = match track_type {
                TrackType::Drum => None,
                _ => Some(step % 8),
            };
            seq.toggle_cell(id, step, degree).unwrap();
        }
    }
    seq
}

/// Benchmark a full step dispatch across many dense tracks (the per-tick
/// hot path while the transport runs)
fn bench_step_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("step_dispatch");

    for tracks in [4, 16, 64] {
        let mut seq = dense_sequencer(tracks);
        let mut time = 0.0;

        group.bench_with_input(BenchmarkId::from_parameter(tracks), &tracks, |b, _| {
            b.iter(|| {
                time += 0.125;
                seq.tick(black_box(time));
            });
        });
    }
    group.finish();
}

/// Benchmark the lookahead scheduler's tick arithmetic in isolation
fn bench_tick_scheduling(c: &mut Criterion) {
    c.bench_function("due_ticks_one_bar", |b| {
        b.iter(|| {
            let mut scheduler = TickScheduler::new(0.0);
            // One bar of 16ths at 120 BPM with swing
            black_box(scheduler.due_ticks(2.0, 120.0, 0.3));
        });
    });
}

/// Benchmark resizing every pattern in a loaded session
fn bench_pattern_resize(c: &mut Criterion) {
    c.bench_function("resize_32_tracks", |b| {
        let mut seq = dense_sequencer(32);
        let mut grow = true;

        b.iter(|| {
            let next = if grow {
                StepCount::SixtyFour
            } else {
                StepCount::Sixteen
            };
            grow = !grow;
            seq.set_step_count(black_box(next));
        });
    });
}

/// Benchmark raw row-pattern scans (read per step per melodic track)
fn bench_row_scan(c: &mut Criterion) {
    let mut pattern = RowPattern::new(64);
    for step in 0..64 {
        pattern.set_cell(step, step % 8, true);
    }

    c.bench_function("first_active_degree_64_steps", |b| {
        b.iter(|| {
            for step in 0..64 {
                black_box(pattern.first_active_degree(black_box(step)));
            }
        });
    });
}

criterion_group!(
    benches,
    bench_step_dispatch,
    bench_tick_scheduling,
    bench_pattern_resize,
    bench_row_scan
);
criterion_main!(benches);
