//! Engine-level error types

use crate::source::SourceError;
use crate::tree::TreeError;
use thiserror::Error;

/// Errors surfaced by the outward-facing engine API
#[derive(Error, Debug)]
pub enum RosterError {
    /// `initialize` was already called for this engine instance
    #[error("engine is already initialized")]
    AlreadyInitialized,

    /// A request needs a bound source before `initialize`
    #[error("engine is not initialized")]
    NotInitialized,

    /// The given handle no longer exists locally
    #[error("target no longer exists locally: {0}")]
    InvalidTarget(String),

    /// A default-parent contact request found no group to place it under
    #[error("no group available to place the contact under")]
    NoParentGroup,

    /// The source refused to accept a request for submission
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Structural failure from the mirrored tree
    #[error(transparent)]
    Tree(#[from] TreeError),
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, RosterError>;
