//! # avl-slab
//!
//! An ordered map kept balanced by AVL rotations, with every node stored in a
//! slab arena instead of its own heap allocation.
//!
//! - Lookups, inserts and removals are `O(log n)`; every node's subtree height
//!   is cached and the left/right heights never differ by more than one.
//! - Nodes are carved from backing blocks that grow geometrically
//!   (`initial_capacity * growth_factor^i`), and released nodes are recycled
//!   through a free list, so steady-state churn does not touch the system
//!   allocator.
//! - Duplicate keys are rejected by default; [`DuplicatePolicy::Overwrite`]
//!   opts into replace-on-insert.
//!
//! ## Example
//!
//! ```rust
//! use avl_slab::{AvlError, AvlTree};
//!
//! let mut tree: AvlTree<u32, &str> = AvlTree::new();
//! tree.insert(2, "two").unwrap();
//! tree.insert(1, "one").unwrap();
//!
//! assert_eq!(tree.get(&1), Some(&"one"));
//! assert_eq!(tree.insert(2, "deux"), Err(AvlError::DuplicateKey));
//! assert_eq!(tree.remove(&2), Ok("two"));
//! assert_eq!(tree.remove(&2), Err(AvlError::KeyNotFound));
//! ```
//!
//! ## Configuration
//!
//! ```rust
//! use avl_slab::{AvlTree, Config, DuplicatePolicy};
//!
//! let config = Config::default()
//!     .with_initial_capacity(64)
//!     .with_growth_factor(2)
//!     .with_duplicate_policy(DuplicatePolicy::Overwrite);
//! let mut tree: AvlTree<String, u64> = AvlTree::with_config(config).unwrap();
//!
//! assert_eq!(tree.insert("a".into(), 1).unwrap(), None);
//! assert_eq!(tree.insert("a".into(), 2).unwrap(), Some(1));
//! ```

#![forbid(unsafe_code)]

pub mod arena;
pub mod compare;
pub mod config;
pub mod error;
pub mod iter;
pub mod tree;

pub use arena::{ArenaConfig, ArenaError, ArenaStats, NodeArena, SlotId};
pub use compare::{Comparator, NaturalOrder, ReverseOrder};
pub use config::{Config, DuplicatePolicy};
pub use error::{AvlError, Result};
pub use iter::{Iter, Keys, Values};
pub use tree::{AvlTree, NodeId};

#[cfg(test)]
mod proptests;
