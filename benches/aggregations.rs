//! Aggregation benchmarks (pipeline pull + noisy release)
//!
//! Toyota Way: Genchi Genbutsu (measure, don't guess)
//!
//! Run with: cargo bench --bench aggregations

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;
use trueno_privacy::agent::Agent;
use trueno_privacy::noise::LaplaceNoise;
use trueno_privacy::sequence::PrivateSequence;

const SMALL_SIZE: usize = 1_000; // 1K rows
const MEDIUM_SIZE: usize = 1_000_000; // 1M rows

#[allow(clippy::cast_precision_loss)]
fn rows(n: usize) -> Vec<f64> {
    (0..n).map(|i| (i % 200) as f64 / 100.0 - 1.0).collect()
}

fn sequence(n: usize) -> PrivateSequence<f64> {
    let agent = Arc::new(Agent::unlimited("bench"));
    PrivateSequence::from_rows(rows(n), agent).with_noise(Arc::new(LaplaceNoise::seeded(42)))
}

/// Benchmark noisy SUM over a bare source
fn bench_noisy_sum(c: &mut Criterion) {
    let mut group = c.benchmark_group("noisy_sum_f64");

    for size in [SMALL_SIZE, MEDIUM_SIZE] {
        let seq = sequence(size);
        group.bench_with_input(BenchmarkId::new("source", size), &seq, |b, seq| {
            b.iter(|| seq.noisy_sum(black_box(1.0), |x| *x).unwrap());
        });
    }

    // Scalar baseline for comparison (no pipeline, no charge)
    let data = rows(MEDIUM_SIZE);
    group.bench_with_input(
        BenchmarkId::new("scalar_baseline", MEDIUM_SIZE),
        &data,
        |b, data| {
            b.iter(|| black_box(data).iter().map(|x| x.clamp(-1.0, 1.0)).sum::<f64>());
        },
    );

    group.finish();
}

/// Benchmark a three-stage pipeline feeding COUNT and SUM
fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline_f64");
    let seq = sequence(MEDIUM_SIZE);
    let staged = seq.filter(|x| *x > -0.5).map(|x| x * 0.5).map(|x| x + 0.1);

    group.bench_function(BenchmarkId::new("noisy_count", MEDIUM_SIZE), |b| {
        b.iter(|| staged.noisy_count(black_box(0.5)).unwrap());
    });
    group.bench_function(BenchmarkId::new("noisy_sum", MEDIUM_SIZE), |b| {
        b.iter(|| staged.noisy_sum(black_box(0.5), |x| *x).unwrap());
    });

    group.finish();
}

criterion_group!(benches, bench_noisy_sum, bench_pipeline);
criterion_main!(benches);
