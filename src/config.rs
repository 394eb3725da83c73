//! Tree configuration.

use crate::arena::ArenaConfig;
use crate::error::Result;

/// What `insert` does when the key is already present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Leave the tree untouched and return
    /// [`AvlError::DuplicateKey`](crate::AvlError::DuplicateKey).
    #[default]
    Reject,
    /// Replace the stored value and hand the previous one back. The stored key
    /// is kept.
    Overwrite,
}

/// Configuration for an [`AvlTree`](crate::AvlTree).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    /// Backing storage for nodes.
    pub arena: ArenaConfig,
    /// Behaviour of `insert` on an existing key.
    pub duplicate_policy: DuplicatePolicy,
}

impl Config {
    /// Checks that a tree can be built from this configuration.
    pub fn validate(&self) -> Result<()> {
        self.arena.validate()?;
        Ok(())
    }

    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }

    pub fn with_initial_capacity(mut self, slots: usize) -> Self {
        self.arena.initial_capacity = slots;
        self
    }

    pub fn with_growth_factor(mut self, factor: usize) -> Self {
        self.arena.growth_factor = factor;
        self
    }

    pub fn with_max_capacity(mut self, slots: usize) -> Self {
        self.arena.max_capacity = Some(slots);
        self
    }
}
