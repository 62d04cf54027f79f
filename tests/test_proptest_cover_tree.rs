//! Property-based tests for the cover tree: knn/rnn must agree with a brute-force
//! linear scan, and the covering invariant must survive arbitrary insert/erase
//! sequences.

use shared::*;

use cover_tree::{CoverTree, Metric};
use proptest::prelude::*;
use std::cmp::Ordering;

prop_compose! {
    fn arb_point()(x in -100.0..100.0, y in -100.0..100.0, z in -100.0..100.0) -> Vec<f64> {
        vec![x, y, z]
    }
}

fn brute_knn(points: &[Vec<f64>], target: &Vec<f64>, k: usize) -> Vec<f64> {
    let metric = Euclidean;
    let mut dists: Vec<f64> = points.iter().map(|p| metric.distance(p, target)).collect();
    dists.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    dists.into_iter().take(k).collect()
}

proptest! {
    #[test]
    fn test_knn_matches_bruteforce(
        points in prop::collection::vec(arb_point(), 1..60),
        target in arb_point(),
        k in 1usize..12,
    ) {
        let tree: CoverTree<Vec<f64>, Euclidean> = CoverTree::new(2.0, None, Euclidean);
        tree.insert_all(points.clone());

        let k = k.min(points.len());
        let knn = tree.knn(&target, k).unwrap();
        let got: Vec<f64> = knn.iter().map(|(_, _, d)| *d).collect();
        let expected = brute_knn(&points, &target, k);

        prop_assert_eq!(got.len(), expected.len());
        for (g, e) in got.iter().zip(expected.iter()) {
            prop_assert!((g - e).abs() < 1e-6, "got {} expected {}", g, e);
        }
    }

    #[test]
    fn test_rnn_matches_bruteforce(
        points in prop::collection::vec(arb_point(), 1..60),
        target in arb_point(),
        radius in 1.0..80.0,
    ) {
        let tree: CoverTree<Vec<f64>, Euclidean> = CoverTree::new(2.0, None, Euclidean);
        tree.insert_all(points.clone());

        let metric = Euclidean;
        let mut expected: Vec<usize> = points
            .iter()
            .enumerate()
            .filter(|(_, p)| metric.distance(p, &target) < radius)
            .map(|(i, _)| i)
            .collect();
        let mut got: Vec<usize> = tree
            .rnn(&target, radius)
            .unwrap()
            .into_iter()
            .map(|(id, _, _)| id as usize)
            .collect();
        expected.sort();
        got.sort();

        prop_assert_eq!(got, expected);
    }

    #[test]
    fn test_insert_erase_preserves_covering(
        points in prop::collection::vec(arb_point(), 1..40),
    ) {
        let tree: CoverTree<Vec<f64>, Euclidean> = CoverTree::new(2.0, None, Euclidean);
        for p in &points {
            tree.insert(p.clone());
        }
        prop_assert!(tree.check_covering());

        for p in &points {
            tree.erase(p);
        }
        prop_assert_eq!(tree.size(), 0);
        prop_assert!(tree.check_covering());
    }

    #[test]
    fn test_rebalancing_strategy_preserves_covering_on_sorted_input(
        n in 4usize..80,
    ) {
        let tree: CoverTree<f64, AbsDiff> =
            CoverTree::with_strategy(2.0, None, AbsDiff, cover_tree::InsertStrategy::Rebalancing);
        for i in 0..n {
            tree.insert(i as f64);
        }
        prop_assert_eq!(tree.size(), n);
        prop_assert!(tree.check_covering());
    }
}
