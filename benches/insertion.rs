//! Benchmarks for incremental insertion and the predicate fast/exact paths.

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::hint::black_box;
use voronoi::geometry::predicates::{in_sphere, left_of_plane};
use voronoi::{Builder, Point3};

fn random_points(seed: u64, n: usize) -> Vec<Point3> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            Point3::new(
                rng.random_range(-100.0..100.0),
                rng.random_range(-100.0..100.0),
                rng.random_range(-100.0..100.0),
            )
        })
        .collect()
}

fn bench_insertion(c: &mut Criterion) {
    let points = random_points(42, 500);
    c.bench_function("insert_500_random_sites", |b| {
        b.iter_batched(
            || Builder::with_rng(StdRng::seed_from_u64(7)),
            |mut builder| {
                builder.no_warning(true);
                for &p in &points {
                    let _ = black_box(builder.insert_point(p));
                }
                builder
            },
            BatchSize::LargeInput,
        );
    });
}

fn bench_statistics(c: &mut Criterion) {
    let points = random_points(43, 300);
    c.bench_function("voronoi_statistics_300_sites", |b| {
        b.iter_batched(
            || {
                let mut builder = Builder::with_rng(StdRng::seed_from_u64(8));
                builder.no_warning(true);
                for &p in &points {
                    builder.insert_point(p).expect("insertion succeeds");
                }
                builder
            },
            |mut builder| {
                let sites: Vec<_> = builder.sites().collect();
                let mut total = 0.0;
                for s in sites {
                    total += builder.atomic_volume(s);
                }
                black_box(total)
            },
            BatchSize::LargeInput,
        );
    });
}

fn bench_predicates(c: &mut Criterion) {
    // Generic input: the floating-point filter certifies the sign.
    let a = Point3::new(0.3, 0.1, -0.4);
    let b = Point3::new(1.1, -0.2, 0.9);
    let cc = Point3::new(-0.7, 1.3, 0.2);
    let d = Point3::new(0.4, 0.6, 1.5);
    let e = Point3::new(0.2, 0.3, 0.1);
    c.bench_function("in_sphere_fast_path", |bch| {
        bch.iter(|| {
            black_box(in_sphere(
                black_box(a),
                black_box(b),
                black_box(cc),
                black_box(d),
                black_box(e),
            ))
        });
    });

    // Cospherical input: every call falls through to the exact expansion
    // pipeline.
    let a = Point3::new(1.0, 1.0, 1.0);
    let b = Point3::new(1.0, -1.0, -1.0);
    let cc = Point3::new(-1.0, 1.0, -1.0);
    let d = Point3::new(-1.0, -1.0, 1.0);
    let e = Point3::new(-1.0, -1.0, -1.0);
    assert!(left_of_plane(a, b, cc, d) > 0.0);
    c.bench_function("in_sphere_exact_path", |bch| {
        bch.iter(|| {
            black_box(in_sphere(
                black_box(a),
                black_box(b),
                black_box(cc),
                black_box(d),
                black_box(e),
            ))
        });
    });
}

criterion_group!(benches, bench_insertion, bench_statistics, bench_predicates);
criterion_main!(benches);
