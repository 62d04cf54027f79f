//! A metric cover tree over arbitrary records, indexed purely through an injected
//! distance function. See [`cover_tree`] for the public API.

pub mod cover_tree;
pub mod errors;
mod logging;

pub use cover_tree::{CoverTree, Frame, InsertStrategy, Metric};
