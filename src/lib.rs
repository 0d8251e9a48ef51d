//! # radix-index
//!
//! A sparse map from `u64` indices to items, built as a fixed-fanout radix
//! tree. Each stored item carries two independent boolean tags, and every
//! interior node aggregates the tags of everything below it. That makes "is
//! anything tagged?" a constant-time question and lets gang lookups skip
//! untagged subtrees.
//!
//! ## Example
//!
//! ```rust
//! use radix_index::{RadixTree, Tag};
//!
//! let mut tree: RadixTree<&str> = RadixTree::new();
//! tree.insert(7, "seven").unwrap();
//! tree.insert(1 << 40, "far").unwrap();
//! tree.tag_set(7, Tag::Dirty).unwrap();
//!
//! assert_eq!(tree.lookup(7), Some(&"seven"));
//! assert!(tree.tagged(Tag::Dirty));
//! assert_eq!(tree.gang_lookup(0, 10), vec![(7, &"seven"), (1 << 40, &"far")]);
//! assert_eq!(tree.gang_lookup_tag(0, 10, Tag::Dirty), vec![(7, &"seven")]);
//!
//! assert_eq!(tree.delete(7), Some("seven"));
//! assert!(!tree.tagged(Tag::Dirty));
//! ```
//!
//! ## Allocation
//!
//! Nodes come from a [`NodeAllocator`]. A tree configured with
//! [`AllocPolicy::NonBlocking`] falls back to a per-context [`PreloadPool`]
//! when the allocator fails, so a caller can reserve nodes ahead of time:
//!
//! ```rust
//! use radix_index::{AllocPolicy, PreloadPool, RadixTree, TreeConfig};
//!
//! let config = TreeConfig::default().with_policy(AllocPolicy::NonBlocking);
//! let mut tree: RadixTree<u32> = RadixTree::with_config(config).unwrap();
//! let mut pool = PreloadPool::for_config(&config);
//!
//! let mut preloaded = tree.preload(&mut pool, AllocPolicy::Blocking).unwrap();
//! tree.insert_preloaded(&mut preloaded, 12345, 1).unwrap();
//! assert_eq!(tree.lookup(12345), Some(&1));
//! ```

#![deny(unsafe_op_in_unsafe_fn)]

mod alloc;
mod config;
mod error;
mod gang;
mod iter;
mod node;
mod preload;
mod shared;
mod tree;

pub use alloc::{BudgetAllocator, HeapAllocator, NodeAllocator};
pub use config::{AllocPolicy, TreeConfig, KEY_BITS};
pub use error::{Error, Result};
pub use iter::Iter;
pub use node::{Node, Tag, MAX_BRANCH, MAX_SHIFT, NUM_TAGS};
pub use preload::{PreloadPool, Preloaded};
pub use shared::SharedRadixTree;
pub use tree::RadixTree;

#[cfg(test)]
mod proptests;
