//! Per-trial Cost Benchmarks
//!
//! Measures the scorer and the clustering stage, the two steps every trial
//! runs after reduction.
//!
//! Run: cargo bench -p topic-tuner-core -- scoring

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use topic_tuner_core::{ClusterScorer, DensityClusterer, EmbeddingMatrix, HdbscanClusterer, HdbscanParams};

fn synthetic_assignment(n: usize) -> (Vec<i32>, Vec<f32>) {
    let mut rng = ChaCha8Rng::seed_from_u64(1);
    let labels = (0..n).map(|_| rng.gen_range(-1..30)).collect();
    let probs = (0..n).map(|_| rng.gen_range(0.0..1.0)).collect();
    (labels, probs)
}

fn reduced_blobs(n: usize) -> EmbeddingMatrix {
    let mut rng = ChaCha8Rng::seed_from_u64(2);
    let rows: Vec<Vec<f32>> = (0..n)
        .map(|i| {
            let centre = (i % 8) as f32 * 4.0;
            (0..5).map(|_| centre + rng.gen_range(-0.5..0.5)).collect()
        })
        .collect();
    EmbeddingMatrix::from_rows(&rows).unwrap()
}

/// Benchmark score() over growing corpora.
fn bench_score(c: &mut Criterion) {
    let scorer = ClusterScorer::new(0.1, 10, 50);
    let mut group = c.benchmark_group("score");

    for n in [1_000, 10_000, 100_000] {
        let (labels, probs) = synthetic_assignment(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| black_box(scorer.score(black_box(&labels), black_box(&probs)).unwrap()))
        });
    }
    group.finish();
}

/// Benchmark HDBSCAN fit on a 5-D reduced layout.
fn bench_hdbscan_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("hdbscan_fit");
    group.sample_size(20);

    for n in [200, 800] {
        let data = reduced_blobs(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &data, |b, data| {
            b.iter(|| {
                let mut clusterer = HdbscanClusterer::new(HdbscanParams::new(10, 3));
                black_box(clusterer.fit(data).unwrap())
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_score, bench_hdbscan_fit);
criterion_main!(benches);
