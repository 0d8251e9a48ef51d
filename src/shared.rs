//! Tree behind a reader/writer lock.
//!
//! [`RadixTree`] has no locking of its own. This wrapper supplies the external
//! lock it expects: any number of concurrent readers, or one writer.
//! Preloading happens outside the lock, the insertion inside it.

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::node::Tag;
use crate::{HeapAllocator, NodeAllocator, Preloaded, RadixTree, Result, TreeConfig};

pub struct SharedRadixTree<T, A = HeapAllocator> {
    inner: RwLock<RadixTree<T, A>>,
}

impl<T> SharedRadixTree<T> {
    pub fn new() -> Self {
        Self::from_tree(RadixTree::new())
    }

    pub fn with_config(config: TreeConfig) -> Result<Self> {
        RadixTree::with_config(config).map(Self::from_tree)
    }
}

impl<T> Default for SharedRadixTree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, A: NodeAllocator> SharedRadixTree<T, A> {
    pub fn from_tree(tree: RadixTree<T, A>) -> Self {
        Self {
            inner: RwLock::new(tree),
        }
    }

    pub fn into_inner(self) -> RadixTree<T, A> {
        self.inner.into_inner()
    }

    /// Shared access for lookups and scans.
    pub fn read(&self) -> RwLockReadGuard<'_, RadixTree<T, A>> {
        self.inner.read()
    }

    /// Exclusive access for mutation.
    pub fn write(&self) -> RwLockWriteGuard<'_, RadixTree<T, A>> {
        self.inner.write()
    }

    pub fn insert(&self, index: u64, item: T) -> Result<()> {
        self.inner.write().insert(index, item)
    }

    pub fn insert_preloaded(
        &self,
        preloaded: &mut Preloaded<'_, T>,
        index: u64,
        item: T,
    ) -> Result<()> {
        self.inner.write().insert_preloaded(preloaded, index, item)
    }

    pub fn delete(&self, index: u64) -> Option<T> {
        self.inner.write().delete(index)
    }

    /// Set `tag` on the item at `index`.
    pub fn tag_set(&self, index: u64, tag: Tag) -> Result<()> {
        self.inner.write().tag_set(index, tag).map(|_| ())
    }

    /// Clear `tag` on the item at `index`; `false` if nothing is stored there.
    pub fn tag_clear(&self, index: u64, tag: Tag) -> bool {
        self.inner.write().tag_clear(index, tag).is_some()
    }

    pub fn tagged(&self, tag: Tag) -> bool {
        self.inner.read().tagged(tag)
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

impl<T: Clone, A: NodeAllocator> SharedRadixTree<T, A> {
    /// Copy of the item at `index`.
    pub fn get(&self, index: u64) -> Option<T> {
        self.inner.read().lookup(index).cloned()
    }

    /// Copies of up to `max_items` items from `first_index` on, optionally
    /// filtered by tag.
    pub fn gang_lookup(
        &self,
        first_index: u64,
        max_items: usize,
        tag: Option<Tag>,
    ) -> Vec<(u64, T)> {
        self.inner
            .read()
            .gang_lookup_filtered(first_index, max_items, tag)
            .into_iter()
            .map(|(index, item)| (index, item.clone()))
            .collect()
    }
}
