//! Node allocation seam.
//!
//! Trees never call the global allocator directly; they ask a
//! [`NodeAllocator`] and treat `None` as memory pressure. This is what makes
//! `OutOfMemory` reachable at all, and what lets embedders and tests decide
//! when allocation fails.

use std::alloc::Layout;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::node::Node;
use crate::AllocPolicy;

/// Source of fresh, empty nodes.
///
/// Returned nodes are released through the global allocator when the tree
/// drops them, so implementations must ultimately obtain them from
/// [`HeapAllocator`].
pub trait NodeAllocator {
    fn allocate<T>(&self, policy: AllocPolicy) -> Option<Box<Node<T>>>;
}

/// Fallible allocation from the global heap.
///
/// The policy is not distinguished: the process heap either has memory or it
/// does not.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeapAllocator;

impl NodeAllocator for HeapAllocator {
    fn allocate<T>(&self, _policy: AllocPolicy) -> Option<Box<Node<T>>> {
        let layout = Layout::new::<Node<T>>();
        // SAFETY: `Node<T>` always has a non-zero size (count and tag words).
        let ptr = NonNull::new(unsafe { std::alloc::alloc(layout) }.cast::<Node<T>>())?;
        // SAFETY: `ptr` was just allocated with the layout of `Node<T>`, so it is
        // valid for a write and owned by us; `Box` frees it with that same layout.
        unsafe {
            ptr.as_ptr().write(Node::new());
            Some(Box::from_raw(ptr.as_ptr()))
        }
    }
}

/// Heap allocator that only hands out a fixed number of nodes.
///
/// With `non_blocking_only`, blocking requests always succeed and only
/// non-blocking ones draw from the budget, which models an allocator that can
/// always make progress when allowed to wait.
#[derive(Debug, Default)]
pub struct BudgetAllocator {
    remaining: AtomicUsize,
    non_blocking_only: bool,
}

impl BudgetAllocator {
    pub fn new(budget: usize) -> Self {
        Self {
            remaining: AtomicUsize::new(budget),
            non_blocking_only: false,
        }
    }

    pub fn non_blocking_only(budget: usize) -> Self {
        Self {
            remaining: AtomicUsize::new(budget),
            non_blocking_only: true,
        }
    }

    pub fn remaining(&self) -> usize {
        self.remaining.load(Ordering::Relaxed)
    }

    pub fn set_budget(&self, budget: usize) {
        self.remaining.store(budget, Ordering::Relaxed);
    }
}

impl NodeAllocator for BudgetAllocator {
    fn allocate<T>(&self, policy: AllocPolicy) -> Option<Box<Node<T>>> {
        if self.non_blocking_only && policy.may_block() {
            return HeapAllocator.allocate(policy);
        }
        self.remaining
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .ok()?;
        HeapAllocator.allocate(policy)
    }
}

impl<A: NodeAllocator> NodeAllocator for &A {
    fn allocate<T>(&self, policy: AllocPolicy) -> Option<Box<Node<T>>> {
        (**self).allocate(policy)
    }
}
