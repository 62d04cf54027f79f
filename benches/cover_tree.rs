#![allow(dead_code)]

use cover_tree::{CoverTree, Metric};
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use std::time::Duration;
use tracing::info;

const BENCH_NUM_INSERT: usize = 2_000;
const BENCH_KNN_SIZE: usize = 10;
const BENCH_RANGE_RADIUS: f64 = 0.2;

#[derive(Clone, Copy, Debug, Default)]
struct Euclidean3;

impl Metric<Vec<f64>> for Euclidean3 {
    fn distance(&self, a: &Vec<f64>, b: &Vec<f64>) -> f64 {
        a.iter()
            .zip(b.iter())
            .map(|(x, y)| (x - y) * (x - y))
            .sum::<f64>()
            .sqrt()
    }
}

fn configure_criterion() -> Criterion {
    Criterion::default().measurement_time(Duration::from_secs(10))
}

fn generate_points(n: usize) -> Vec<Vec<f64>> {
    info!("Generating {} random 3D points", n);
    let mut seed: u64 = 0x9E3779B97F4A7C15;
    let mut next = || {
        seed ^= seed << 13;
        seed ^= seed >> 7;
        seed ^= seed << 17;
        (seed as f64 / u64::MAX as f64).abs()
    };
    (0..n).map(|_| vec![next(), next(), next()]).collect()
}

fn bench_insert(_c: &mut Criterion) {
    let points = generate_points(BENCH_NUM_INSERT);
    let to_insert = points[points.len() - 1].clone();
    let base_points = &points[..points.len() - 1];
    let mut cc = configure_criterion();
    cc.bench_function("insert_single_point", |b| {
        b.iter_with_setup(
            || {
                let tree: CoverTree<Vec<f64>, Euclidean3> = CoverTree::new(2.0, None, Euclidean3);
                tree.insert_all(base_points.to_vec());
                tree
            },
            |tree| {
                black_box(tree.insert(to_insert.clone()));
            },
        )
    });
}

fn bench_insert_bulk(_c: &mut Criterion) {
    let points = generate_points(BENCH_NUM_INSERT);
    let mut cc = configure_criterion();
    cc.bench_function("insert_bulk", |b| {
        b.iter_with_setup(
            || points.clone(),
            |points| {
                let tree: CoverTree<Vec<f64>, Euclidean3> = CoverTree::new(2.0, None, Euclidean3);
                black_box(tree.insert_all(points));
            },
        )
    });
}

fn bench_knn(_c: &mut Criterion) {
    let points = generate_points(BENCH_NUM_INSERT);
    let target = points[0].clone();
    let tree: CoverTree<Vec<f64>, Euclidean3> = CoverTree::new(2.0, None, Euclidean3);
    tree.insert_all(points);
    let mut cc = configure_criterion();
    cc.bench_function("knn_search", |b| {
        b.iter(|| black_box(tree.knn(&target, BENCH_KNN_SIZE).unwrap()))
    });
}

fn bench_rnn(_c: &mut Criterion) {
    let points = generate_points(BENCH_NUM_INSERT);
    let target = points[0].clone();
    let tree: CoverTree<Vec<f64>, Euclidean3> = CoverTree::new(2.0, None, Euclidean3);
    tree.insert_all(points);
    let mut cc = configure_criterion();
    cc.bench_function("range_search", |b| {
        b.iter(|| black_box(tree.rnn(&target, BENCH_RANGE_RADIUS).unwrap()))
    });
}

fn bench_erase(_c: &mut Criterion) {
    let points = generate_points(BENCH_NUM_INSERT);
    let to_erase = points[points.len() - 1].clone();
    let mut cc = configure_criterion();
    cc.bench_function("erase_single_point", |b| {
        b.iter_with_setup(
            || {
                let tree: CoverTree<Vec<f64>, Euclidean3> = CoverTree::new(2.0, None, Euclidean3);
                tree.insert_all(points.clone());
                tree
            },
            |tree| {
                black_box(tree.erase(&to_erase));
            },
        )
    });
}

#[cfg(feature = "serde")]
fn bench_serialization(_c: &mut Criterion) {
    let points = generate_points(BENCH_NUM_INSERT);
    let tree: CoverTree<Vec<f64>, Euclidean3> = CoverTree::new(2.0, None, Euclidean3);
    tree.insert_all(points);
    let frames = tree.traverse_frames();
    let mut cc = configure_criterion();
    cc.bench_function("serialize_frames", |b| {
        b.iter(|| black_box(bincode::serialize(&frames).unwrap()))
    });
}

#[cfg(feature = "serde")]
criterion_group!(
    benches,
    bench_insert,
    bench_insert_bulk,
    bench_knn,
    bench_rnn,
    bench_erase,
    bench_serialization
);

#[cfg(not(feature = "serde"))]
criterion_group!(
    benches,
    bench_insert,
    bench_insert_bulk,
    bench_knn,
    bench_rnn,
    bench_erase
);

criterion_main!(benches);
