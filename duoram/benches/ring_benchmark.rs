//! Ring and preprocessing benchmarks.
//!
//! Run with: `cargo bench --bench ring_benchmark`

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use duoram::ring;
use duoram::triple;

/// Dot products dominate the online phase; triple generation dominates the
/// pairing server. Both scale linearly in the dimension.
fn bench_ring_ops(c: &mut Criterion) {
    let mut group = c.benchmark_group("ring");

    for dim in [64usize, 256, 1024, 4096] {
        let mut rng = rand::rng();
        let xs = ring::random_vector(dim, &mut rng);
        let ys = ring::random_vector(dim, &mut rng);

        group.bench_with_input(BenchmarkId::new("dot", dim), &(&xs, &ys), |b, (xs, ys)| {
            b.iter(|| ring::dot(xs, ys));
        });

        group.bench_with_input(BenchmarkId::new("triple", dim), &dim, |b, dim| {
            let mut rng = rand::rng();
            b.iter(|| triple::generate(*dim, &mut rng));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_ring_ops);
criterion_main!(benches);
