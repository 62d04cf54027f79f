//! Nearest-neighbour, k-nearest-neighbour, range, and distribution-based clustering
//! queries.
//!
//! Every descent here shares one pruning idea: `d(x, q) - q.parent_dist` is a lower
//! bound on the distance from `x` to anything in `q`'s subtree, so once that bound
//! reaches the current running bound the whole subtree can be skipped.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

use ordered_float::OrderedFloat;
use tracing::{debug, info};

use crate::errors::CoverTreeError;

use super::metric::Metric;
use super::node::{sort_children_by_distance, Node};

/// `nn(x)`: the single closest node, by exhaustive triangle-inequality-pruned descent.
pub(crate) fn nn<R: Clone, M: Metric<R>>(root: &Node<R>, x: &R, metric: &M) -> (u64, R, f64) {
    let mut best = (root.id, root.data.clone(), f64::INFINITY);
    nn_rec(root, x, metric, &mut best);
    best
}

fn nn_rec<R: Clone, M: Metric<R>>(node: &Node<R>, x: &R, metric: &M, best: &mut (u64, R, f64)) {
    let d = node.dist(x, metric);
    if d < best.2 {
        *best = (node.id, node.data.clone(), d);
    }
    let (idx, dists) = sort_children_by_distance(node, x, metric);
    for i in idx {
        let child = &node.children[i];
        if dists[i] - child.parent_dist >= best.2 {
            debug!("pruning subtree rooted at node {}", child.id);
            continue;
        }
        nn_rec(child, x, metric, best);
    }
}

struct HeapItem<R> {
    dist: OrderedFloat<f64>,
    id: u64,
    data: R,
}

impl<R> PartialEq for HeapItem<R> {
    fn eq(&self, other: &Self) -> bool {
        self.dist == other.dist
    }
}
impl<R> Eq for HeapItem<R> {}
impl<R> PartialOrd for HeapItem<R> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl<R> Ord for HeapItem<R> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.dist.cmp(&other.dist)
    }
}

/// `knn(x, k)`: up to `k` closest nodes, ascending by distance. Internally a bounded
/// max-heap keyed on distance (the furthest of the current top-`k` sits on top and is
/// evicted first), mirroring this crate's `kd_tree` module's `knn_search`.
pub(crate) fn knn<R: Clone, M: Metric<R>>(
    root: &Node<R>,
    x: &R,
    k: usize,
    metric: &M,
) -> Vec<(u64, R, f64)> {
    if k == 0 {
        return Vec::new();
    }
    let mut heap: BinaryHeap<HeapItem<R>> = BinaryHeap::with_capacity(k);
    knn_rec(root, x, k, metric, &mut heap);
    let mut out: Vec<(u64, R, f64)> = heap
        .into_iter()
        .map(|h| (h.id, h.data, h.dist.into_inner()))
        .collect();
    out.sort_by(|a, b| a.2.partial_cmp(&b.2).unwrap());
    out
}

fn knn_rec<R: Clone, M: Metric<R>>(
    node: &Node<R>,
    x: &R,
    k: usize,
    metric: &M,
    heap: &mut BinaryHeap<HeapItem<R>>,
) {
    let d = node.dist(x, metric);
    if heap.len() < k {
        heap.push(HeapItem {
            dist: OrderedFloat(d),
            id: node.id,
            data: node.data.clone(),
        });
    } else if d < heap.peek().unwrap().dist.into_inner() {
        heap.pop();
        heap.push(HeapItem {
            dist: OrderedFloat(d),
            id: node.id,
            data: node.data.clone(),
        });
    }
    let bound = if heap.len() < k {
        f64::INFINITY
    } else {
        heap.peek().unwrap().dist.into_inner()
    };
    let (idx, dists) = sort_children_by_distance(node, x, metric);
    for i in idx {
        let child = &node.children[i];
        if dists[i] - child.parent_dist >= bound {
            debug!("pruning subtree rooted at node {}", child.id);
            continue;
        }
        knn_rec(child, x, k, metric, heap);
    }
}

/// `rnn(x, r)`: every node strictly within radius `r`, in traversal order (not sorted by
/// distance — callers that need an ordering should sort the result themselves).
pub(crate) fn rnn<R: Clone, M: Metric<R>>(
    root: &Node<R>,
    x: &R,
    radius: f64,
    metric: &M,
) -> Vec<(u64, R, f64)> {
    let mut out = Vec::new();
    rnn_rec(root, x, radius, metric, &mut out);
    out
}

fn rnn_rec<R: Clone, M: Metric<R>>(
    node: &Node<R>,
    x: &R,
    radius: f64,
    metric: &M,
    out: &mut Vec<(u64, R, f64)>,
) {
    let d = node.dist(x, metric);
    if d < radius {
        out.push((node.id, node.data.clone(), d));
    }
    let (idx, dists) = sort_children_by_distance(node, x, metric);
    for i in idx {
        let child = &node.children[i];
        if dists[i] - child.parent_dist >= radius {
            debug!("pruning subtree rooted at node {}", child.id);
            continue;
        }
        rnn_rec(child, x, radius, metric, out);
    }
}

/// Returns the path from `root` to the node nearest `x`, root first. Used by
/// `clustering` in place of the source's stored parent pointers: since nothing here
/// records an ancestor reference, the descent that finds the nearest node records its
/// own path instead.
fn nearest_path<'a, R, M: Metric<R>>(root: &'a Node<R>, x: &R, metric: &M) -> Vec<&'a Node<R>> {
    let mut best_dist = f64::INFINITY;
    let mut best_path: Vec<&Node<R>> = Vec::new();
    let mut path: Vec<&Node<R>> = vec![root];
    nearest_path_rec(root, x, metric, &mut path, &mut best_dist, &mut best_path);
    best_path
}

fn nearest_path_rec<'a, R, M: Metric<R>>(
    node: &'a Node<R>,
    x: &R,
    metric: &M,
    path: &mut Vec<&'a Node<R>>,
    best_dist: &mut f64,
    best_path: &mut Vec<&'a Node<R>>,
) {
    let d = node.dist(x, metric);
    if d < *best_dist {
        *best_dist = d;
        *best_path = path.clone();
    }
    let (idx, dists) = sort_children_by_distance(node, x, metric);
    for i in idx {
        let child = &node.children[i];
        if dists[i] - child.parent_dist >= *best_dist {
            continue;
        }
        path.push(child);
        nearest_path_rec(child, x, metric, path, best_dist, best_path);
        path.pop();
    }
}

/// Collects every node in `node`'s subtree whose id is not already in `seen`, as
/// `(id, data, distance-to-centre)` triples, in arbitrary order (the caller sorts).
fn collect_subtree<R: Clone, M: Metric<R>>(
    node: &Node<R>,
    centre: &R,
    metric: &M,
    seen: &HashSet<u64>,
    out: &mut Vec<(u64, R, f64)>,
) {
    if !seen.contains(&node.id) {
        out.push((node.id, node.data.clone(), node.dist(centre, metric)));
    }
    for child in &node.children {
        collect_subtree(child, centre, metric, seen, out);
    }
}

/// Picks the seed with the smallest sum of distances to the other seeds (a medoid) to
/// stand in as a single "centre" record, and the maximum pairwise distance among all
/// seeds as the radius. Generalizes "average the seed points" to an arbitrary metric
/// space, where there is no addition to average with.
pub(crate) fn medoid_and_radius<R, M: Metric<R>>(seeds: &[R], metric: &M) -> (usize, f64) {
    let mut radius = 0.0_f64;
    let mut best_idx = 0;
    let mut best_sum = f64::INFINITY;
    for (i, a) in seeds.iter().enumerate() {
        let mut sum = 0.0;
        for (j, b) in seeds.iter().enumerate() {
            if i == j {
                continue;
            }
            let d = metric.distance(a, b);
            sum += d;
            if d > radius {
                radius = d;
            }
        }
        if sum < best_sum {
            best_sum = sum;
            best_idx = i;
        }
    }
    (best_idx, radius)
}

fn validate_distribution(distribution: &[f64]) -> Result<(), CoverTreeError> {
    let mut prev = 0.0_f64;
    for &f in distribution {
        if !(0.0..=1.0).contains(&f) {
            return Err(CoverTreeError::BadDistribution { value: f });
        }
        if f < prev {
            return Err(CoverTreeError::UnsortedDistribution);
        }
        prev = f;
    }
    Ok(())
}

fn group_targets(distribution: &[f64], total: usize) -> Vec<usize> {
    let mut prev_count = 0usize;
    distribution
        .iter()
        .map(|&f| {
            let count = (f * total as f64).floor() as usize;
            let target = count.saturating_sub(prev_count);
            prev_count = count;
            target
        })
        .collect()
}

/// `clustering(distribution, centre, radius)`. See this module's docs for the pruning
/// idea shared with the other queries; the walk-up-through-ancestors step is driven by
/// the path `nearest_path` recorded on the way down, since no node stores its parent.
pub(crate) fn clustering<R: Clone, M: Metric<R>>(
    root: &Node<R>,
    distribution: &[f64],
    centre: &R,
    radius: f64,
    base: f64,
    total: usize,
    metric: &M,
) -> Result<Vec<Vec<u64>>, CoverTreeError> {
    validate_distribution(distribution)?;
    let targets = group_targets(distribution, total);
    info!(
        "clustering {} points into {} groups with targets {:?}",
        total,
        targets.len(),
        targets
    );
    let mut groups: Vec<Vec<u64>> = vec![Vec::new(); distribution.len()];

    let path = nearest_path(root, centre, metric);
    let mut level = path
        .iter()
        .rposition(|n| n.covdist(base) >= radius)
        .unwrap_or(0);

    let mut seen: HashSet<u64> = HashSet::new();
    let mut group_idx = 0;
    while group_idx < groups.len() && targets[group_idx] == 0 {
        group_idx += 1;
    }

    loop {
        if group_idx >= groups.len() {
            break;
        }
        let mut candidates = Vec::new();
        collect_subtree(path[level], centre, metric, &seen, &mut candidates);
        candidates.sort_by(|a, b| a.2.partial_cmp(&b.2).unwrap());

        for (id, _data, _d) in candidates {
            if group_idx >= groups.len() {
                break;
            }
            groups[group_idx].push(id);
            seen.insert(id);
            while group_idx < groups.len() && groups[group_idx].len() >= targets[group_idx] {
                debug!("group {} filled, advancing", group_idx);
                group_idx += 1;
            }
        }

        if group_idx >= groups.len() || level == 0 {
            break;
        }
        level -= 1;
        debug!("walking up to ancestor at path index {}", level);
    }

    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cover_tree::metric::test_metrics::AbsDiff;
    use crate::cover_tree::ops::{insert_root, InsertStrategy};

    fn build(points: &[f64]) -> Box<Node<f64>> {
        let mut iter = points.iter();
        let first = *iter.next().unwrap();
        let mut root = Box::new(Node::leaf(0, first, 0, 0.0));
        for (i, &v) in iter.enumerate() {
            let leaf = Box::new(Node::leaf((i + 1) as u64, v, 0, 0.0));
            root = insert_root(root, leaf, 2.0, None, InsertStrategy::Simple, &AbsDiff);
        }
        root
    }

    #[test]
    fn test_nn_scenario_1() {
        let root = build(&[0.0, 1.0, 2.0, 3.0, 4.0]);
        let (id, data, d) = nn(&root, &2.4, &AbsDiff);
        assert_eq!(id, 2);
        assert_eq!(data, 2.0);
        assert!((d - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_knn_scenario_1() {
        let root = build(&[0.0, 1.0, 2.0, 3.0, 4.0]);
        let result = knn(&root, &2.4, 3, &AbsDiff);
        let dists: Vec<f64> = result.iter().map(|(_, _, d)| *d).collect();
        assert_eq!(dists.len(), 3);
        assert!((dists[0] - 0.4).abs() < 1e-9);
        assert!((dists[1] - 0.6).abs() < 1e-9);
        assert!((dists[2] - 1.4).abs() < 1e-9);
    }

    #[test]
    fn test_rnn_scenario_4() {
        let root = build(&[0.0, 1.0, 2.0, 3.0, 4.0]);
        let result = rnn(&root, &0.0, 2.5, &AbsDiff);
        let mut ids: Vec<u64> = result.iter().map(|(id, _, _)| *id).collect();
        ids.sort();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn test_clustering_scenario_5() {
        let root = build(&[0.0, 1.0, 2.0, 3.0, 4.0]);
        let groups = clustering(&root, &[0.2, 0.6, 1.0], &0.0, 0.0, 2.0, 5, &AbsDiff).unwrap();
        let sizes: Vec<usize> = groups.iter().map(|g| g.len()).collect();
        assert_eq!(sizes, vec![1, 2, 2]);
        assert_eq!(groups[0], vec![0]);
        let mut g1 = groups[1].clone();
        g1.sort();
        assert_eq!(g1, vec![1, 2]);
        let mut g2 = groups[2].clone();
        g2.sort();
        assert_eq!(g2, vec![3, 4]);
    }

    #[test]
    fn test_clustering_rejects_unsorted_distribution() {
        let root = build(&[0.0, 1.0]);
        let err = clustering(&root, &[0.6, 0.2], &0.0, 0.0, 2.0, 2, &AbsDiff).unwrap_err();
        assert!(matches!(err, CoverTreeError::UnsortedDistribution));
    }

    #[test]
    fn test_clustering_rejects_out_of_range_fraction() {
        let root = build(&[0.0, 1.0]);
        let err = clustering(&root, &[1.5], &0.0, 0.0, 2.0, 2, &AbsDiff).unwrap_err();
        assert!(matches!(err, CoverTreeError::BadDistribution { .. }));
    }
}
