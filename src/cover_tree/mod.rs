//! A metric cover tree: a hierarchical spatial index over points drawn from an
//! arbitrary metric space `(X, d)`, supporting dynamic insertion and deletion, exact
//! nearest-neighbour and k-nearest-neighbour queries, range queries, and
//! distribution-based clustering.
//!
//! # Ownership model
//!
//! The reference implementation this crate is modeled on links nodes with raw
//! parent/child pointers and deletes them by hand in destructors. Here, a `Node`
//! exclusively owns its children as values (`Vec<Box<Node<R>>>`); there is no stored
//! parent back-reference anywhere. Every structural operation that conceptually needs to
//! "go up" — root promotion, erase's subtree re-homing, clustering's ancestor walk —
//! instead threads the relevant ancestor state through its own call stack or return
//! value. This crate's internal `ops` and `query` modules hold the details; this module
//! is the public surface that takes a lock and calls into them.
//!
//! # Concurrency
//!
//! One `parking_lot::RwLock` protects the whole tree: queries take a shared lock,
//! mutators take an exclusive one. The `Metric` lives outside the lock — it must
//! never itself try to acquire it.
//!
//! # `parent_dist`'s double duty
//!
//! Every node's `parent_dist` is both "distance to parent" and, looser, "upper bound on
//! distance to any descendant" (used by every query's pruning). The two meanings agree
//! only if `parent_dist` is recomputed whenever a subtree is grafted somewhere else —
//! `ops::attach_subtree` is the one place that happens, and every structural operation
//! that relocates a subtree routes through it.

mod frame;
mod metric;
mod node;
mod ops;
mod query;

use std::collections::BTreeMap;
use std::fmt::Debug;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::errors::CoverTreeError;

pub use frame::Frame;
pub use metric::Metric;
pub use ops::InsertStrategy;
use node::Node;

struct Inner<R> {
    root: Option<Box<Node<R>>>,
    size: usize,
    next_id: u64,
}

/// A cover tree over records of type `R`, indexed by a caller-supplied [`Metric`].
pub struct CoverTree<R, M> {
    metric: M,
    base: f64,
    truncate_level: Option<i32>,
    insert_strategy: InsertStrategy,
    inner: RwLock<Inner<R>>,
}

fn find_by_id<R>(node: &Node<R>, id: u64) -> Option<&Node<R>> {
    if node.id == id {
        return Some(node);
    }
    for child in &node.children {
        if let Some(found) = find_by_id(child, id) {
            return Some(found);
        }
    }
    None
}

impl<R: Clone + Debug, M: Metric<R>> CoverTree<R, M> {
    /// An empty tree. `base` must be > 1; `truncate_level`, when set, stops insertion's
    /// descent one level early (see the crate's design notes for why this differs
    /// slightly from a literal reading of the source's unused `truncate_level` field).
    pub fn new(base: f64, truncate_level: Option<i32>, metric: M) -> Self {
        Self::with_strategy(base, truncate_level, metric, InsertStrategy::default())
    }

    /// Like [`CoverTree::new`], but selects the insertion strategy explicitly (see
    /// [`InsertStrategy`]).
    pub fn with_strategy(
        base: f64,
        truncate_level: Option<i32>,
        metric: M,
        insert_strategy: InsertStrategy,
    ) -> Self {
        assert!(base > 1.0, "cover tree base must be greater than 1");
        info!(
            "Creating new CoverTree with base={} truncate_level={:?} insert_strategy={:?}",
            base, truncate_level, insert_strategy
        );
        CoverTree {
            metric,
            base,
            truncate_level,
            insert_strategy,
            inner: RwLock::new(Inner {
                root: None,
                size: 0,
                next_id: 0,
            }),
        }
    }

    /// A tree containing a single point, which becomes id `0`.
    pub fn new_from_point(point: R, base: f64, truncate_level: Option<i32>, metric: M) -> Self {
        let tree = Self::new(base, truncate_level, metric);
        tree.insert(point);
        tree
    }

    /// A tree built by inserting `points` in order; the first becomes the root with id
    /// `0`.
    pub fn new_from_points(points: Vec<R>, base: f64, truncate_level: Option<i32>, metric: M) -> Self {
        let tree = Self::new(base, truncate_level, metric);
        tree.insert_all(points);
        tree
    }

    fn insert_locked(&self, inner: &mut Inner<R>, record: R) {
        let id = inner.next_id;
        inner.next_id += 1;
        let node = Box::new(Node::leaf(id, record, 0, 0.0));
        inner.root = Some(match inner.root.take() {
            None => node,
            Some(root) => ops::insert_root(
                root,
                node,
                self.base,
                self.truncate_level,
                self.insert_strategy,
                &self.metric,
            ),
        });
        inner.size += 1;
    }

    /// Inserts `record`. Always succeeds; duplicate records are allowed and each grows
    /// `size()` by one.
    pub fn insert(&self, record: R) -> bool {
        info!("Inserting record: {:?}", record);
        let mut inner = self.inner.write();
        self.insert_locked(&mut inner, record);
        true
    }

    /// Inserts every record in `records`, in order.
    pub fn insert_all(&self, records: Vec<R>) -> bool {
        info!("Inserting {} records", records.len());
        let mut inner = self.inner.write();
        for record in records {
            self.insert_locked(&mut inner, record);
        }
        true
    }

    /// Inserts `record` only if it is farther than `threshold` from the current root
    /// (an empty tree always accepts). Returns whether it was inserted.
    pub fn insert_if(&self, record: R, threshold: f64) -> bool {
        info!("insert_if: record={:?} threshold={}", record, threshold);
        let mut inner = self.inner.write();
        let accept = match &inner.root {
            None => true,
            Some(root) => root.dist(&record, &self.metric) > threshold,
        };
        if accept {
            self.insert_locked(&mut inner, record);
        }
        accept
    }

    /// Applies [`CoverTree::insert_if`] to every record in `records`; returns how many
    /// were actually inserted.
    pub fn insert_if_all(&self, records: Vec<R>, threshold: f64) -> usize {
        info!(
            "insert_if_all: {} candidate records, threshold={}",
            records.len(),
            threshold
        );
        let mut inner = self.inner.write();
        let mut accepted = 0;
        for record in records {
            let accept = match &inner.root {
                None => true,
                Some(root) => root.dist(&record, &self.metric) > threshold,
            };
            if accept {
                self.insert_locked(&mut inner, record);
                accepted += 1;
            }
        }
        accepted
    }

    /// Removes the node whose data equals `record` (located via a nearest-neighbour
    /// search that must land at distance exactly `0`). Returns whether anything was
    /// removed.
    pub fn erase(&self, record: &R) -> bool {
        info!("Attempting to erase record: {:?}", record);
        let mut inner = self.inner.write();
        let target_id = match &inner.root {
            None => return false,
            Some(root) => {
                let (id, _data, d) = query::nn(root, record, &self.metric);
                if d == 0.0 {
                    id
                } else {
                    return false;
                }
            }
        };
        debug!("erasing node with id {}", target_id);
        ops::erase_point(
            &mut inner.root,
            target_id,
            self.base,
            self.truncate_level,
            &self.metric,
        );
        inner.size -= 1;
        true
    }

    /// The single node closest to `x`.
    pub fn nn(&self, x: &R) -> Result<(u64, R, f64), CoverTreeError> {
        info!("nn query: {:?}", x);
        let inner = self.inner.read();
        let root = inner.root.as_ref().ok_or(CoverTreeError::EmptyTree)?;
        Ok(query::nn(root, x, &self.metric))
    }

    /// Up to `k` nodes closest to `x`, ascending by distance.
    pub fn knn(&self, x: &R, k: usize) -> Result<Vec<(u64, R, f64)>, CoverTreeError> {
        info!("knn query: {:?}, k={}", x, k);
        let inner = self.inner.read();
        let root = inner.root.as_ref().ok_or(CoverTreeError::EmptyTree)?;
        Ok(query::knn(root, x, k, &self.metric))
    }

    /// Every node strictly within `radius` of `x`.
    pub fn rnn(&self, x: &R, radius: f64) -> Result<Vec<(u64, R, f64)>, CoverTreeError> {
        info!("rnn query: {:?}, radius={}", x, radius);
        let inner = self.inner.read();
        let root = inner.root.as_ref().ok_or(CoverTreeError::EmptyTree)?;
        Ok(query::rnn(root, x, radius, &self.metric))
    }

    /// Splits the tree's points into `distribution.len()` groups of progressively
    /// increasing distance from a centre derived from `seeds`: the seed with the
    /// smallest sum of distances to the other seeds stands in as the centre (there is no
    /// addition to average arbitrary records with), and the maximum pairwise distance
    /// among the seeds bounds the starting subtree. `distribution` must be a
    /// non-decreasing sequence of fractions in `[0, 1]`; group `i` gets
    /// `floor(f_i * size()) - floor(f_{i-1} * size())` members.
    pub fn clustering(
        &self,
        distribution: &[f64],
        seeds: &[R],
    ) -> Result<Vec<Vec<u64>>, CoverTreeError> {
        info!(
            "clustering query: {} seeds, distribution={:?}",
            seeds.len(),
            distribution
        );
        let inner = self.inner.read();
        let root = inner.root.as_ref().ok_or(CoverTreeError::EmptyTree)?;
        if seeds.is_empty() {
            return Err(CoverTreeError::Corrupt {
                reason: "clustering requires at least one seed point".into(),
            });
        }
        let (centre_idx, radius) = query::medoid_and_radius(seeds, &self.metric);
        query::clustering(
            root,
            distribution,
            &seeds[centre_idx],
            radius,
            self.base,
            inner.size,
            &self.metric,
        )
    }

    /// The number of live nodes.
    pub fn size(&self) -> usize {
        self.inner.read().size
    }

    /// The record stored at `id`, if live.
    pub fn get(&self, id: u64) -> Result<R, CoverTreeError> {
        let inner = self.inner.read();
        let root = inner.root.as_ref().ok_or(CoverTreeError::EmptyTree)?;
        find_by_id(root, id)
            .map(|n| n.data.clone())
            .ok_or(CoverTreeError::NotFound { id })
    }

    /// Every record, ordered by ascending id.
    pub fn to_vector(&self) -> Vec<R> {
        let inner = self.inner.read();
        let mut pairs: Vec<(u64, R)> = Vec::with_capacity(inner.size);
        if let Some(root) = &inner.root {
            collect_all(root, &mut pairs);
        }
        pairs.sort_by_key(|(id, _)| *id);
        pairs.into_iter().map(|(_, data)| data).collect()
    }

    /// Visits every node exactly once via an explicit stack (not recursion); the order
    /// is depth-first but is not otherwise a contract callers may rely on.
    pub fn traverse<F: FnMut(u64, &R, i32)>(&self, mut f: F) {
        let inner = self.inner.read();
        let Some(root) = inner.root.as_ref() else {
            return;
        };
        let mut stack: Vec<&Node<R>> = vec![root];
        while let Some(node) = stack.pop() {
            f(node.id, &node.data, node.level);
            for child in node.children.iter().rev() {
                stack.push(child);
            }
        }
    }

    /// Checks the covering invariant (`d(parent, child) <= parent.covdist()`) for every
    /// live edge.
    pub fn check_covering(&self) -> bool {
        let inner = self.inner.read();
        match &inner.root {
            None => true,
            Some(root) => check_covering_rec(root, self.base, &self.metric),
        }
    }

    /// The root's level, or `0` for an empty tree (mirrors the reference
    /// implementation's `levelSize()`, which returns the root node's level rather than
    /// a count of distinct levels in use). Node levels never go negative under this
    /// insertion algorithm, so the cast is lossless.
    pub fn level_size(&self) -> usize {
        self.inner.read().root.as_ref().map_or(0, |r| r.level as usize)
    }

    /// A count of live nodes per level.
    pub fn level_counts(&self) -> BTreeMap<i32, usize> {
        let inner = self.inner.read();
        let mut counts = BTreeMap::new();
        if let Some(root) = &inner.root {
            count_levels_rec(root, &mut counts);
        }
        counts
    }

    /// The tree's points, in DFS pre-order, as a frame stream suitable for any concrete
    /// encoder.
    pub fn traverse_frames(&self) -> Vec<Frame<R>> {
        let inner = self.inner.read();
        frame::traverse_frames(&inner.root)
    }

    /// Rebuilds a tree from a frame stream produced by [`CoverTree::traverse_frames`].
    pub fn from_frames(
        frames: Vec<Frame<R>>,
        base: f64,
        truncate_level: Option<i32>,
        metric: M,
    ) -> Result<Self, CoverTreeError> {
        let root = frame::from_frames(frames)?;
        let mut size = 0;
        let mut max_id = 0u64;
        if let Some(root) = &root {
            count_nodes_rec(root, &mut size, &mut max_id);
        }
        Ok(CoverTree {
            metric,
            base,
            truncate_level,
            insert_strategy: InsertStrategy::default(),
            inner: RwLock::new(Inner {
                root,
                size,
                next_id: if size == 0 { 0 } else { max_id + 1 },
            }),
        })
    }
}

impl<R: Clone + PartialEq, M: Metric<R>> CoverTree<R, M> {
    /// Structural equality: same ids, levels, parent distances, data, and child order,
    /// recursively. Two trees holding the same points need not satisfy this (tree shape
    /// is not part of the contract) — it is meant for round-trip checks against a tree's
    /// own serialization.
    pub fn same_tree(&self, other: &Self) -> bool {
        let a = self.inner.read();
        let b = other.inner.read();
        match (&a.root, &b.root) {
            (None, None) => true,
            (Some(x), Some(y)) => same_subtree(x, y),
            _ => false,
        }
    }
}

fn same_subtree<R: PartialEq>(a: &Node<R>, b: &Node<R>) -> bool {
    a.id == b.id
        && a.level == b.level
        && a.parent_dist == b.parent_dist
        && a.data == b.data
        && a.children.len() == b.children.len()
        && a.children
            .iter()
            .zip(b.children.iter())
            .all(|(x, y)| same_subtree(x, y))
}

fn check_covering_rec<R, M: Metric<R>>(node: &Node<R>, base: f64, metric: &M) -> bool {
    node.children.iter().all(|child| {
        node.dist(&child.data, metric) <= node.covdist(base) && check_covering_rec(child, base, metric)
    })
}

fn count_levels_rec<R>(node: &Node<R>, counts: &mut BTreeMap<i32, usize>) {
    *counts.entry(node.level).or_insert(0) += 1;
    for child in &node.children {
        count_levels_rec(child, counts);
    }
}

fn collect_all<R: Clone>(node: &Node<R>, out: &mut Vec<(u64, R)>) {
    out.push((node.id, node.data.clone()));
    for child in &node.children {
        collect_all(child, out);
    }
}

fn count_nodes_rec<R>(node: &Node<R>, size: &mut usize, max_id: &mut u64) {
    *size += 1;
    if node.id > *max_id {
        *max_id = node.id;
    }
    for child in &node.children {
        count_nodes_rec(child, size, max_id);
    }
}
