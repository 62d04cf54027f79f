//! Structural operations: insertion (both regimes), erase, and the Izbicki-Shelton
//! rebalance.
//!
//! None of these functions carry a stored parent pointer anywhere. Every operation
//! either takes `&mut Node<R>` and mutates the subtree it is handed, or takes
//! `Box<Node<R>>` by value and returns the (possibly different) subtree root. The
//! caller is always the one place that learns "this is now my child" — see the crate's
//! top-level docs for why that replaces the original pointer-graph design's parent
//! back-references.

use tracing::{debug, info};

use super::metric::Metric;
use super::node::{sort_children_by_distance, Node};

/// Which descent rule `insert` uses once a point falls inside the root's covering ball.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InsertStrategy {
    /// Descend to the first covering child, attach as a new child otherwise. Cheaper,
    /// and sufficient for non-adversarial insertion orders.
    Simple,
    /// The Izbicki-Shelton rebalance: partition every existing child's descendants into
    /// those now closer to the new point and those that stay, and re-home accordingly.
    /// Preserves the cover tree invariants even under adversarial (e.g. sorted) input.
    Rebalancing,
}

impl Default for InsertStrategy {
    fn default() -> Self {
        InsertStrategy::Simple
    }
}

/// Re-levels an entire subtree so `node.level == level` and every descendant is exactly
/// one level below its parent, cascading down. Cover tree nodes are always exactly
/// `parent.level - 1`, so this is correct regardless of the subtree's previous absolute
/// levels — only relative structure is preserved.
fn relevel_cascade<R>(node: &mut Node<R>, level: i32) {
    node.level = level;
    for child in node.children.iter_mut() {
        relevel_cascade(child, level - 1);
    }
}

/// Grafts `x` as a new child of `p`, re-leveling `x`'s entire subtree to sit at
/// `p.level - 1` and recomputing its `parent_dist`.
fn attach_subtree<R, M: Metric<R>>(p: &mut Node<R>, mut x: Box<Node<R>>, metric: &M) {
    relevel_cascade(&mut x, p.level - 1);
    x.parent_dist = p.dist(&x.data, metric);
    p.children.push(x);
}

/// Walks down the last child at each level until it finds a childless node, detaches it
/// from its immediate parent, and returns it. `node` must have at least one child.
pub(crate) fn take_any_leaf<R>(node: &mut Node<R>) -> Box<Node<R>> {
    let last = node.children.len() - 1;
    if node.children[last].children.is_empty() {
        node.children.pop().expect("checked non-empty above")
    } else {
        take_any_leaf(&mut node.children[last])
    }
}

/// The inside-covering descent (`insert_` in the source): find the first child (in
/// ascending-distance order) that covers `x`, recurse into it, or attach `x` as a new
/// child of `p` if none does. `truncate_level`, when set, stops the descent one level
/// early by attaching directly instead of recursing once the candidate child's level has
/// reached the truncation point.
pub(crate) fn insert_simple<R, M: Metric<R>>(
    p: &mut Node<R>,
    x: Box<Node<R>>,
    base: f64,
    truncate_level: Option<i32>,
    metric: &M,
) {
    let (idx, dists) = sort_children_by_distance(p, &x.data, metric);
    for i in idx {
        if dists[i] <= p.children[i].covdist(base) {
            if truncate_level.is_some_and(|t| p.children[i].level <= t) {
                debug!(
                    "truncate_level reached at level {}, attaching directly to node {}",
                    p.children[i].level, p.children[i].id
                );
                attach_subtree(p, x, metric);
            } else {
                insert_simple(&mut p.children[i], x, base, truncate_level, metric);
            }
            return;
        }
    }
    debug!("no covering child found under node {}, attaching as new child", p.id);
    attach_subtree(p, x, metric);
}

/// Inserts `x` into the subtree rooted at `p`, handling both the outside-covering
/// (root-promotion) and inside-covering regimes, and returns the (possibly new)
/// subtree root. This is the single entry point used both for ordinary top-level
/// inserts and for re-homing orphaned subtrees during `erase` and `rebalance`.
pub(crate) fn insert_root<R: Clone, M: Metric<R>>(
    mut p: Box<Node<R>>,
    mut x: Box<Node<R>>,
    base: f64,
    truncate_level: Option<i32>,
    strategy: InsertStrategy,
    metric: &M,
) -> Box<Node<R>> {
    if p.dist(&x.data, metric) > p.covdist(base) {
        info!(
            "point outside root's covering ball (root level {}), promoting",
            p.level
        );
        while p.dist(&x.data, metric) > base * p.covdist(base) / (base - 1.0) {
            if p.children.is_empty() {
                p.level += 1;
            } else {
                let mut leaf = take_any_leaf(&mut p);
                leaf.level = p.level + 1;
                p.parent_dist = p.dist_node(&leaf, metric);
                leaf.children.push(p);
                p = leaf;
            }
        }
        x.level = p.level + 1;
        p.parent_dist = p.dist_node(&x, metric);
        x.children.push(p);
        debug!("new root is node {} at level {}", x.id, x.level);
        x
    } else {
        match strategy {
            InsertStrategy::Simple => {
                insert_simple(&mut p, x, base, truncate_level, metric);
                p
            }
            InsertStrategy::Rebalancing => rebalance(p, x, base, truncate_level, metric),
        }
    }
}

/// Splits an owned subtree into `(id, data)` pairs, discarding its internal shape:
/// every node closer to `x_data` than to `p_data` goes to `moveset`, the rest to
/// `stayset`. Used by `rebalance`, which rebuilds both groups from scratch rather than
/// trying to graft partial subtrees back in place — a deliberate simplification (see
/// this crate's design notes) of the source algorithm's nested partial-reinsertion,
/// which can strand nodes that fail to find a home at every ancestor level.
fn partition_subtree<R: Clone, M: Metric<R>>(
    node: Box<Node<R>>,
    p_data: &R,
    x_data: &R,
    metric: &M,
    moveset: &mut Vec<(u64, R)>,
    stayset: &mut Vec<(u64, R)>,
) {
    let dist_to_p = metric.distance(&node.data, p_data);
    let dist_to_x = metric.distance(&node.data, x_data);
    let Node {
        id,
        data,
        children,
        ..
    } = *node;
    if dist_to_p > dist_to_x {
        moveset.push((id, data));
    } else {
        stayset.push((id, data));
    }
    for child in children {
        partition_subtree(child, p_data, x_data, metric, moveset, stayset);
    }
}

/// The Izbicki-Shelton rebalance: every existing child's descendants are partitioned
/// against the new point `x`, nodes that stay are re-inserted under `p`, nodes that move
/// grow `x`'s own subtree, and `x` is finally grafted onto `p`.
fn rebalance<R: Clone, M: Metric<R>>(
    mut p: Box<Node<R>>,
    x: Box<Node<R>>,
    base: f64,
    truncate_level: Option<i32>,
    metric: &M,
) -> Box<Node<R>> {
    let old_children = std::mem::take(&mut p.children);
    let mut moveset: Vec<(u64, R)> = Vec::new();
    let mut stayset: Vec<(u64, R)> = Vec::new();
    for child in old_children {
        partition_subtree(child, &p.data, &x.data, metric, &mut moveset, &mut stayset);
    }
    debug!(
        "rebalancing at node {}: {} moveset, {} stayset",
        p.id,
        moveset.len(),
        stayset.len()
    );

    for (id, data) in stayset {
        let node = Box::new(Node::leaf(id, data, 0, 0.0));
        insert_simple(&mut p, node, base, truncate_level, metric);
    }

    let mut x = x;
    for (id, data) in moveset {
        let node = Box::new(Node::leaf(id, data, 0, 0.0));
        x = insert_root(x, node, base, truncate_level, InsertStrategy::Simple, metric);
    }

    attach_subtree(&mut p, x, metric);
    p
}

/// Removes the node with id `target_id` from somewhere under `node` (not `node` itself),
/// returning the detached subtree. `None` if no such id is present.
fn remove_by_id<R>(node: &mut Node<R>, target_id: u64) -> Option<Box<Node<R>>> {
    if let Some(pos) = node.children.iter().position(|c| c.id == target_id) {
        return Some(node.children.swap_remove(pos));
    }
    for child in node.children.iter_mut() {
        if let Some(found) = remove_by_id(child, target_id) {
            return Some(found);
        }
    }
    None
}

/// Erases the live node with id `target_id` from the tree rooted at `*root_slot`,
/// re-homing its children as described in the crate's module documentation. Assumes the
/// id is present (callers locate it via `nn` first and check the distance is exactly
/// zero); does nothing if `*root_slot` is empty.
pub(crate) fn erase_point<R: Clone, M: Metric<R>>(
    root_slot: &mut Option<Box<Node<R>>>,
    target_id: u64,
    base: f64,
    truncate_level: Option<i32>,
    metric: &M,
) {
    let mut root = match root_slot.take() {
        Some(r) => r,
        None => return,
    };

    if root.id == target_id {
        if root.children.is_empty() {
            debug!("erasing childless root node {}", target_id);
            *root_slot = None;
            return;
        }
        debug!("erasing root node {}, promoting a leaf to replace it", target_id);
        let mut leaf = take_any_leaf(&mut root);
        leaf.level = root.level;
        leaf.children = std::mem::take(&mut root.children);
        *root_slot = Some(leaf);
        return;
    }

    match remove_by_id(&mut root, target_id) {
        Some(removed) => {
            let orphans = removed.children;
            debug!(
                "erased interior node {}, re-homing {} orphaned children",
                target_id,
                orphans.len()
            );
            let mut new_root = root;
            for orphan in orphans {
                insert_simple(&mut new_root, orphan, base, truncate_level, metric);
            }
            *root_slot = Some(new_root);
        }
        None => *root_slot = Some(root),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cover_tree::metric::test_metrics::AbsDiff;

    fn leaf(id: u64, v: f64) -> Box<Node<f64>> {
        Box::new(Node::leaf(id, v, 0, 0.0))
    }

    #[test]
    fn test_take_any_leaf_descends_last_child() {
        let mut root = Node::leaf(0, 0.0, 2, 0.0);
        let mut mid = Node::leaf(1, 1.0, 1, 1.0);
        mid.children.push(leaf(2, 1.5));
        root.children.push(Box::new(mid));
        let taken = take_any_leaf(&mut root);
        assert_eq!(taken.id, 2);
        assert!(root.children[0].children.is_empty());
    }

    #[test]
    fn test_insert_simple_attaches_when_no_child_covers() {
        let mut root = Node::leaf(0, 0.0, 1, 0.0);
        insert_simple(&mut root, leaf(1, 1.5), 2.0, None, &AbsDiff);
        assert_eq!(root.children.len(), 1);
        assert_eq!(root.children[0].level, 0);
        assert_eq!(root.children[0].parent_dist, 1.5);
    }

    #[test]
    fn test_insert_root_promotes_when_outside_covering() {
        let root = leaf(0, 0.0);
        let new_root = insert_root(
            root,
            leaf(1, 100.0),
            2.0,
            None,
            InsertStrategy::Simple,
            &AbsDiff,
        );
        assert_eq!(new_root.id, 1);
        assert!(new_root.level > 0);
        assert_eq!(new_root.children[0].id, 0);
    }

    #[test]
    fn test_erase_root_with_children_reparents() {
        let mut root = Node::leaf(0, 0.0, 1, 0.0);
        root.children.push(leaf(1, 1.0));
        root.children.push(leaf(2, -1.0));
        let mut slot = Some(Box::new(root));
        erase_point(&mut slot, 0, 2.0, None, &AbsDiff);
        let new_root = slot.unwrap();
        assert_ne!(new_root.id, 0);
        assert_eq!(new_root.level, 1);
    }
}
