//! Gait and collector benchmarks
//!
//! Benchmarks for the per-control-period hot path:
//! - Motor target generation
//! - Epoch persistence (journal append vs. Parquet snapshot)
//!
//! Toyota Way: Measure before optimizing (Genchi Genbutsu)

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pupy::actor::{Epoch, PuppyActor};
use pupy::collector::PuppyCollector;
use pupy::control::ConstantGaitControl;
use pupy::gait::{Gait, GaitParameters};
use pupy::storage::{JournalRunStore, ParquetRunStore, RunStore};
use tempfile::TempDir;

fn trot() -> Gait {
    Gait::named(
        GaitParameters {
            amplitude: [0.8, 0.8, 0.6, 0.6],
            frequency: [1.0, 1.0, 1.0, 1.0],
            phase: [0.0, 0.5, 0.5, 0.0],
            offset: [0.0, 0.0, 0.1, 0.1],
        },
        "trot",
    )
}

/// One epoch of `samples` readings for a handful of sensors
#[allow(clippy::cast_precision_loss)]
fn create_epoch(samples: usize) -> Epoch {
    ["hip_fl", "hip_fr", "hip_rl", "hip_rr", "accel_x", "accel_y", "accel_z"]
        .iter()
        .map(|name| {
            let data = (0..samples).map(|i| (i as f64 * 0.01).sin()).collect();
            ((*name).to_string(), data)
        })
        .collect()
}

/// Benchmark target generation for a control period
fn bench_gait_iteration(c: &mut Criterion) {
    let mut group = c.benchmark_group("gait_iteration");
    let gait = trot();

    for targets in [100, 1_000, 10_000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(targets), targets, |b, &n| {
            b.iter(|| {
                let sum: f64 = gait.iter(black_box(0), 20).take(n).map(|t| t[0]).sum();
                black_box(sum);
            });
        });
    }

    group.finish();
}

fn bench_collector_backend<S: RunStore>(c: &mut Criterion, name: &str, file: &str) {
    let mut group = c.benchmark_group(name);

    for samples in [100, 1_000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(samples), samples, |b, &n| {
            let dir = TempDir::new().unwrap();
            let mut collector = PuppyCollector::<_, S>::builder(ConstantGaitControl::new(trot()))
                .open::<S>(dir.path().join(file))
                .unwrap();
            let epoch = create_epoch(n);
            let mut start = 0;
            b.iter(|| {
                let targets = collector.call(&epoch, start, start + 2_000, 20).unwrap();
                black_box(targets.take(100).count());
                start += 2_000;
            });
        });
    }

    group.finish();
}

/// Benchmark epoch persistence with the journal backend
fn bench_journal_collector(c: &mut Criterion) {
    bench_collector_backend::<JournalRunStore>(c, "journal_collector", "bench.jsonl");
}

/// Benchmark epoch persistence with the Parquet backend
fn bench_parquet_collector(c: &mut Criterion) {
    bench_collector_backend::<ParquetRunStore>(c, "parquet_collector", "bench.parquet");
}

criterion_group!(
    benches,
    bench_gait_iteration,
    bench_journal_collector,
    bench_parquet_collector
);
criterion_main!(benches);
