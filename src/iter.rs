use crate::node::Tag;
use crate::{HeapAllocator, NodeAllocator, RadixTree};

/// Items fetched per gang lookup while iterating.
const BATCH: usize = 64;

/// Ascending iterator over `(index, &item)`, fed by batched gang lookups.
pub struct Iter<'a, T, A = HeapAllocator> {
    tree: &'a RadixTree<T, A>,
    tag: Option<Tag>,
    next: Option<u64>,
    batch: std::vec::IntoIter<(u64, &'a T)>,
}

impl<T, A: NodeAllocator> RadixTree<T, A> {
    pub fn iter(&self) -> Iter<'_, T, A> {
        self.iter_from(0)
    }

    /// Iterate over items at indices `>= first_index`.
    pub fn iter_from(&self, first_index: u64) -> Iter<'_, T, A> {
        Iter {
            tree: self,
            tag: None,
            next: Some(first_index),
            batch: Vec::new().into_iter(),
        }
    }

    /// Iterate over items carrying `tag`.
    pub fn iter_tagged(&self, tag: Tag) -> Iter<'_, T, A> {
        Iter {
            tree: self,
            tag: Some(tag),
            next: Some(0),
            batch: Vec::new().into_iter(),
        }
    }
}

impl<'a, T, A: NodeAllocator> Iterator for Iter<'a, T, A> {
    type Item = (u64, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(entry) = self.batch.next() {
                return Some(entry);
            }
            let cursor = self.next?;
            let batch = self.tree.gang_lookup_filtered(cursor, BATCH, self.tag);
            self.next = batch.last().and_then(|(index, _)| index.checked_add(1));
            if batch.is_empty() {
                return None;
            }
            self.batch = batch.into_iter();
        }
    }
}

impl<'a, T, A: NodeAllocator> IntoIterator for &'a RadixTree<T, A> {
    type Item = (u64, &'a T);
    type IntoIter = Iter<'a, T, A>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
