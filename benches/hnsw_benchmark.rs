//! Benchmarks for HNSW insert and search throughput.
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use lynxdb::{Config, Database, DistanceMetric, SearchParams, Vector};

fn random_vector(dim: usize, seed: u64) -> Vec<f32> {
    (0..dim).map(|i| ((seed.wrapping_mul(2654435761).wrapping_add(i as u64)) % 1000) as f32 / 1000.0).collect()
}

fn bench_insert(c: &mut Criterion) {
    c.bench_function("hnsw_insert_1k", |b| {
        b.iter(|| {
            let db = Database::create(Config::new(64, DistanceMetric::L2)).unwrap();
            for i in 0..1000u64 {
                db.insert(i, Vector::new(random_vector(64, i))).unwrap();
            }
            black_box(db.size());
        });
    });
}

fn bench_search(c: &mut Criterion) {
    let db = Database::create(Config::new(64, DistanceMetric::L2)).unwrap();
    for i in 0..10_000u64 {
        db.insert(i, Vector::new(random_vector(64, i))).unwrap();
    }
    let query = random_vector(64, 42);

    c.bench_function("hnsw_search_10k", |b| {
        b.iter(|| {
            let result = db.search(black_box(&query), 10, &SearchParams::none()).unwrap();
            black_box(result.items.len());
        });
    });
}

fn bench_optimize(c: &mut Criterion) {
    let db = Database::create(Config::new(32, DistanceMetric::L2)).unwrap();
    for i in 0..2000u64 {
        db.insert(i, Vector::new(random_vector(32, i))).unwrap();
    }

    c.bench_function("hnsw_optimize_2k", |b| {
        b.iter(|| {
            db.optimize_index().unwrap();
        });
    });
}

criterion_group!(benches, bench_insert, bench_search, bench_optimize);
criterion_main!(benches);
