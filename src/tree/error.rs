//! Tree-specific error types

use thiserror::Error;

/// Structural errors raised by `MirrorTree` operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// The remote identity is already materialized somewhere in the tree.
    /// This points at a sequencing bug in ingestion rather than a routine
    /// condition.
    #[error("identity already present in the mirrored tree: {0}")]
    DuplicateIdentity(String),

    /// Lookup miss; usually benign under eventual consistency
    #[error("not found in the mirrored tree: {0}")]
    NotFound(String),

    /// A reorder payload that, after filtering unknown entries, is not a
    /// permutation of the known children
    #[error("reorder for {0} is not a permutation of the known children")]
    InvalidOrder(String),
}

/// Result type for tree operations
pub type Result<T> = std::result::Result<T, TreeError>;
