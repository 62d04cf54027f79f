//! ## Custom Errors for the cover tree
//!
//! This module defines the error type returned by the public cover tree API. Every
//! fallible operation surfaces one of these variants rather than panicking, so a caller
//! driving a long-lived tree can recover from a bad query instead of aborting.

use std::error::Error;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Errors that the cover tree can report to a caller.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug)]
pub enum CoverTreeError {
    /// A clustering distribution was not ascending.
    UnsortedDistribution,
    /// A clustering distribution fraction fell outside `[0, 1]`.
    BadDistribution {
        /// The offending fraction.
        value: f64,
    },
    /// `get` was called with an id that does not name a live node.
    NotFound {
        /// The id that was requested.
        id: u64,
    },
    /// A query was issued against a tree with no points.
    EmptyTree,
    /// A frame stream passed to `from_frames` was malformed.
    Corrupt {
        /// Human-readable description of what went wrong.
        reason: String,
    },
}

impl fmt::Display for CoverTreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoverTreeError::UnsortedDistribution => {
                write!(f, "clustering distribution must be non-decreasing")
            }
            CoverTreeError::BadDistribution { value } => {
                write!(
                    f,
                    "clustering distribution fraction {value} is outside [0, 1]"
                )
            }
            CoverTreeError::NotFound { id } => {
                write!(f, "no live node with id {id}")
            }
            CoverTreeError::EmptyTree => {
                write!(f, "query issued against an empty cover tree")
            }
            CoverTreeError::Corrupt { reason } => {
                write!(f, "corrupt cover tree frame stream: {reason}")
            }
        }
    }
}

impl Error for CoverTreeError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = CoverTreeError::NotFound { id: 7 };
        assert_eq!(format!("{err}"), "no live node with id 7");
    }

    #[test]
    fn test_bad_distribution_display() {
        let err = CoverTreeError::BadDistribution { value: 1.5 };
        assert_eq!(
            format!("{err}"),
            "clustering distribution fraction 1.5 is outside [0, 1]"
        );
    }
}
