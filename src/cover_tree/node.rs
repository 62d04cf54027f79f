//! A single cover tree node and the geometry helpers that every descent relies on.

use super::metric::Metric;

/// One live point in the tree.
///
/// A `Node` owns its children outright (`Vec<Box<Node<R>>>`); there is no stored parent
/// back-reference. Every structural operation that needs to "go up" instead threads the
/// relevant ancestor information through its own call stack or return value — see the
/// design notes in the crate's top-level documentation for why that replaces the
/// original pointer-graph design's parent pointers.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Node<R> {
    /// Stable id, unique among live nodes, assigned at insertion.
    pub(crate) id: u64,
    /// The record this node carries.
    pub(crate) data: R,
    /// Level in the tree; higher is coarser. This node covers a ball of radius
    /// `base^level`.
    pub(crate) level: i32,
    /// Distance from this node to its parent, and (looser) an upper bound on the
    /// distance from this node to any of its descendants. See the crate docs for why
    /// both meanings are carried by one field.
    pub(crate) parent_dist: f64,
    /// Children, order not semantically meaningful.
    pub(crate) children: Vec<Box<Node<R>>>,
}

impl<R> Node<R> {
    pub(crate) fn leaf(id: u64, data: R, level: i32, parent_dist: f64) -> Self {
        Node {
            id,
            data,
            level,
            parent_dist,
            children: Vec::new(),
        }
    }

    /// Covering distance: the radius of the ball this node must cover.
    pub(crate) fn covdist(&self, base: f64) -> f64 {
        base.powi(self.level)
    }

    /// Separating distance: the minimum distance allowed between this node's children.
    pub(crate) fn sepdist(&self, base: f64) -> f64 {
        2.0 * base.powi(self.level - 1)
    }

    /// Distance from this node's data to an arbitrary record `x`.
    pub(crate) fn dist<M: Metric<R>>(&self, x: &R, metric: &M) -> f64 {
        metric.distance(&self.data, x)
    }

    /// Distance from this node's data to another node's data.
    pub(crate) fn dist_node<M: Metric<R>>(&self, other: &Node<R>, metric: &M) -> f64 {
        metric.distance(&self.data, &other.data)
    }
}

/// Returns the permutation of `p`'s children sorted ascending by distance to `x`, along
/// with the precomputed distances indexed by the *original* child position. Ties break
/// by original child-list order (`sort_by` is stable).
///
/// Every descent (insert, erase, nn, knn, rnn, clustering) uses this batched form so
/// that children are visited nearest-first and pruning can stop early.
pub(crate) fn sort_children_by_distance<R, M: Metric<R>>(
    p: &Node<R>,
    x: &R,
    metric: &M,
) -> (Vec<usize>, Vec<f64>) {
    let dists: Vec<f64> = p.children.iter().map(|c| c.dist(x, metric)).collect();
    let mut idx: Vec<usize> = (0..p.children.len()).collect();
    idx.sort_by(|&a, &b| dists[a].partial_cmp(&dists[b]).unwrap());
    (idx, dists)
}
