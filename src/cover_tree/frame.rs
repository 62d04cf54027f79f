//! Traversal and reconstruction contract: a stream of frames a caller can hand to any
//! concrete encoder (textual, binary, self-describing) without this crate needing to
//! know which one. The concrete wire format is out of scope here; only the frame shape
//! and the DFS-with-sentinel contract are.

use crate::errors::CoverTreeError;

use super::node::Node;

/// One step of a depth-first, pre-order walk of a tree. A `Node` frame is always
/// followed, once every child has been emitted, by an `EndChildren` frame — but only if
/// `has_children` was true; a childless node has no matching sentinel.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Frame<R> {
    /// A live node, in the order it was encountered by the walk.
    Node {
        id: u64,
        level: i32,
        parent_dist: f64,
        data: R,
        has_children: bool,
    },
    /// Marks that every child of the most recently opened `Node { has_children: true, .. }`
    /// has now been emitted.
    EndChildren,
}

/// Flattens `root` into its frame stream. Returns an empty vector for an empty tree.
pub(crate) fn traverse_frames<R: Clone>(root: &Option<Box<Node<R>>>) -> Vec<Frame<R>> {
    let mut out = Vec::new();
    if let Some(root) = root {
        traverse_frames_rec(root, &mut out);
    }
    out
}

fn traverse_frames_rec<R: Clone>(node: &Node<R>, out: &mut Vec<Frame<R>>) {
    let has_children = !node.children.is_empty();
    out.push(Frame::Node {
        id: node.id,
        level: node.level,
        parent_dist: node.parent_dist,
        data: node.data.clone(),
        has_children,
    });
    if has_children {
        for child in &node.children {
            traverse_frames_rec(child, out);
        }
        out.push(Frame::EndChildren);
    }
}

/// Reconstructs a tree from a frame stream produced by `traverse_frames`, rebuilding the
/// parent stack as `has_children`/`EndChildren` pairs open and close it. Rejects any
/// stream that doesn't nest correctly or names more than one top-level node.
pub(crate) fn from_frames<R>(frames: Vec<Frame<R>>) -> Result<Option<Box<Node<R>>>, CoverTreeError> {
    let mut stack: Vec<Node<R>> = Vec::new();
    let mut result: Option<Box<Node<R>>> = None;

    for frame in frames {
        match frame {
            Frame::Node {
                id,
                level,
                parent_dist,
                data,
                has_children,
            } => {
                let node = Node::leaf(id, data, level, parent_dist);
                if has_children {
                    stack.push(node);
                } else {
                    attach_completed(Box::new(node), &mut stack, &mut result)?;
                }
            }
            Frame::EndChildren => {
                let node = stack.pop().ok_or(CoverTreeError::Corrupt {
                    reason: "unmatched end-of-children sentinel".into(),
                })?;
                attach_completed(Box::new(node), &mut stack, &mut result)?;
            }
        }
    }

    if !stack.is_empty() {
        return Err(CoverTreeError::Corrupt {
            reason: "frame stream ended with open children lists".into(),
        });
    }

    Ok(result)
}

fn attach_completed<R>(
    node: Box<Node<R>>,
    stack: &mut [Node<R>],
    result: &mut Option<Box<Node<R>>>,
) -> Result<(), CoverTreeError> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(node);
            Ok(())
        }
        None => {
            if result.is_some() {
                return Err(CoverTreeError::Corrupt {
                    reason: "frame stream names more than one top-level node".into(),
                });
            }
            *result = Some(node);
            Ok(())
        }
    }
}
