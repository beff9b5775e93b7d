//! # Shared Vector Benchmark
//!
//! Measures lock overhead of the per-vector operations.
//!
//! Run with: `cargo bench --package lattice_core`

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use lattice_core::{Orientation, SharedMatrix, SharedVector};

fn bench_add(c: &mut Criterion) {
    let mut group = c.benchmark_group("vector_add");

    for len in [16, 256, 4096] {
        let a = SharedVector::new(vec![1.0; len], Orientation::RowMajor);
        let b = SharedVector::new(vec![0.5; len], Orientation::RowMajor);
        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |bench, _| {
            bench.iter(|| a.add(black_box(&b)).unwrap());
        });
    }
    group.finish();
}

fn bench_mat_mul_into(c: &mut Criterion) {
    let mut group = c.benchmark_group("vector_mat_mul_into");

    for n in [8, 64, 256] {
        let rows: Vec<Vec<f64>> = (0..n)
            .map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
            .collect();
        let identity = SharedMatrix::new();
        identity.load_column_major(&rows).unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |bench, &n| {
            bench.iter(|| {
                let v = SharedVector::new(vec![1.0; n], Orientation::RowMajor);
                v.mat_mul_into(black_box(&identity)).unwrap();
                v
            });
        });
    }
    group.finish();
}

fn bench_read_row_major(c: &mut Criterion) {
    let rows = vec![vec![1.0; 256]; 256];
    let m = SharedMatrix::new();
    m.load_column_major(&rows).unwrap();

    c.bench_function("read_row_major_256_transposed", |b| {
        b.iter(|| black_box(m.read_row_major().unwrap()));
    });
}

criterion_group!(benches, bench_add, bench_mat_mul_into, bench_read_row_major);
criterion_main!(benches);
