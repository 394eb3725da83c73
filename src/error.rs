//! Error types surfaced by the tree.

use thiserror::Error;

use crate::arena::ArenaError;

/// Errors returned by [`AvlTree`](crate::AvlTree) operations.
///
/// Every error is reported by the call that caused it. None of them leave the
/// tree partially modified.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AvlError {
    /// `insert` hit a key that is already present and the tree rejects
    /// duplicates.
    #[error("key already present")]
    DuplicateKey,

    /// `find` or `remove` was asked for a key that is not in the tree.
    #[error("key not found")]
    KeyNotFound,

    /// The node arena could not provide a slot for a new entry.
    #[error("node allocation failed: {0}")]
    AllocationFailure(#[source] ArenaError),

    /// The supplied configuration cannot be used to build a tree.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

impl From<ArenaError> for AvlError {
    fn from(err: ArenaError) -> Self {
        match err {
            ArenaError::InvalidConfig(reason) => AvlError::InvalidConfig(reason),
            other => AvlError::AllocationFailure(other),
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T, E = AvlError> = std::result::Result<T, E>;
