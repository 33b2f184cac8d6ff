//! Benchmark for segment population.
//!
//! Measures the whole per-step cost of the generator with hazards, coins
//! and pickups enabled, against the sandbox host.
//!
//! Run with: cargo bench --package rushline_procedural --bench placement_benchmark

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use rushline_procedural::{Frame, SandboxHost, TrackConfig, TrackGenerator};
use rushline_shared::Vec3;

fn benchmark_populated_segment(c: &mut Criterion) {
    let config = TrackConfig::default();
    let mut host = SandboxHost::for_config(&config);
    let mut track = TrackGenerator::new(config).expect("default config is valid");
    track.build_initial(&mut host, &Frame::at(Vec3::ZERO, 0.0, 0.0));

    let mut group = c.benchmark_group("populated_track");

    group.throughput(Throughput::Elements(1));
    group.bench_function("recycle_and_populate", |b| {
        let mut z = 0.0f32;
        let mut elapsed = 0.0f32;
        b.iter(|| {
            z += 30.0;
            elapsed += 1.0;
            let recycled = track.tick(&mut host, &Frame::at(Vec3::new(0.0, 0.0, z), elapsed, 1.0 / 60.0));
            track.drain_events().for_each(drop);
            black_box(recycled)
        });
    });

    group.finish();
}

fn benchmark_frame_without_recycle(c: &mut Criterion) {
    let config = TrackConfig::default();
    let mut host = SandboxHost::for_config(&config);
    let mut track = TrackGenerator::new(config).expect("default config is valid");
    track.build_initial(&mut host, &Frame::at(Vec3::ZERO, 0.0, 0.0));

    // the observer never moves: timers and the passed check only
    c.bench_function("idle_frame", |b| {
        b.iter(|| black_box(track.tick(&mut host, &Frame::at(Vec3::new(0.0, 0.0, 1.0), 1.0, 1.0 / 60.0))));
    });
}

criterion_group!(benches, benchmark_populated_segment, benchmark_frame_without_recycle);
criterion_main!(benches);
