//! Per-context stash of spare nodes.
//!
//! A worker that must insert from a context where allocation may not wait
//! first tops up its own [`PreloadPool`], then inserts through the returned
//! [`Preloaded`] guard. The guard mutably borrows the pool, so the nodes cannot
//! be handed to another context until the insertion is done.

use log::{debug, warn};

use crate::node::Node;
use crate::{AllocPolicy, Error, NodeAllocator, Result, TreeConfig};

/// Bounded stack of pre-allocated nodes owned by one execution context.
pub struct PreloadPool<T> {
    nodes: Vec<Box<Node<T>>>,
    capacity: usize,
}

impl<T> PreloadPool<T> {
    /// Pool sized for the default tree configuration.
    pub fn new() -> Self {
        Self::for_config(&TreeConfig::default())
    }

    /// Pool holding enough nodes for one worst-case insertion into a tree built
    /// with `config`.
    pub fn for_config(config: &TreeConfig) -> Self {
        let capacity = config.max_path();
        Self {
            nodes: Vec::with_capacity(capacity),
            capacity,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Top the pool up to capacity.
    ///
    /// Nodes obtained before a failure stay in the pool. On success the
    /// returned guard is what grants access to the pool for the insertion.
    pub fn preload<A: NodeAllocator>(
        &mut self,
        alloc: &A,
        policy: AllocPolicy,
    ) -> Result<Preloaded<'_, T>> {
        let before = self.nodes.len();
        while self.nodes.len() < self.capacity {
            match alloc.allocate(policy) {
                Some(node) => self.nodes.push(node),
                None => {
                    warn!(
                        "preload stopped at {}/{} nodes: allocation failed",
                        self.nodes.len(),
                        self.capacity
                    );
                    return Err(Error::OutOfMemory);
                }
            }
        }
        if self.nodes.len() != before {
            debug!("preload topped up pool from {before} to {} nodes", self.nodes.len());
        }
        Ok(Preloaded { pool: self })
    }

    #[inline]
    pub(crate) fn take(&mut self) -> Option<Box<Node<T>>> {
        self.nodes.pop()
    }

    /// Return an unused node; dropped when the pool is already full.
    pub(crate) fn give_back(&mut self, node: Box<Node<T>>) {
        debug_assert_eq!(node.count(), 0);
        if self.nodes.len() < self.capacity {
            self.nodes.push(node);
        }
    }

    /// Free every pooled node, for when the owning context goes away.
    ///
    /// Returns the number of nodes released.
    pub fn retire(&mut self) -> usize {
        let freed = self.nodes.len();
        self.nodes.clear();
        if freed > 0 {
            debug!("retired preload pool, freed {freed} nodes");
        }
        freed
    }
}

impl<T> Default for PreloadPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for PreloadPool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreloadPool")
            .field("len", &self.nodes.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

/// Proof that a pool was topped up, held across one preloaded insertion.
#[derive(Debug)]
pub struct Preloaded<'a, T> {
    pool: &'a mut PreloadPool<T>,
}

impl<T> Preloaded<'_, T> {
    /// Nodes still available to the insertion.
    #[inline]
    pub fn available(&self) -> usize {
        self.pool.len()
    }

    #[inline]
    pub(crate) fn pool(&mut self) -> &mut PreloadPool<T> {
        self.pool
    }
}
