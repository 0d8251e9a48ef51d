//! Ranged multi-item fetch ("gang lookup"), optionally filtered by tag.
//!
//! Each call is a bounded scan made of passes. A pass probes depth-first from
//! a cursor; at every level it looks for the first present (or tagged) slot at
//! or after the cursor's offset, and when a node has none it jumps the cursor
//! to the next block at that level instead of walking the empty key range.

use crate::node::{Node, Slot, Tag};
use crate::{NodeAllocator, RadixTree};

/// Upper bound on the up-front result allocation.
const RESULT_PREALLOC: usize = 64;

impl<T, A: NodeAllocator> RadixTree<T, A> {
    /// Up to `max_items` items at indices `>= first_index`, in ascending order.
    ///
    /// Resume with `first_index` set to one past the last returned index.
    pub fn gang_lookup(&self, first_index: u64, max_items: usize) -> Vec<(u64, &T)> {
        self.gang_lookup_filtered(first_index, max_items, None)
    }

    /// Like [`gang_lookup`](Self::gang_lookup), restricted to items carrying `tag`.
    pub fn gang_lookup_tag(&self, first_index: u64, max_items: usize, tag: Tag) -> Vec<(u64, &T)> {
        self.gang_lookup_filtered(first_index, max_items, Some(tag))
    }

    /// Gang lookup with an optional tag filter.
    pub fn gang_lookup_filtered(
        &self,
        first_index: u64,
        max_items: usize,
        tag: Option<Tag>,
    ) -> Vec<(u64, &T)> {
        let mut results = Vec::with_capacity(max_items.min(RESULT_PREALLOC));
        if max_items == 0 {
            return results;
        }

        let root = match &self.root {
            Slot::Empty => return results,
            Slot::Item(item) => {
                if first_index == 0 && tag.map_or(true, |tag| self.tagged(tag)) {
                    results.push((0, item));
                }
                return results;
            }
            Slot::Node(node) => &**node,
        };

        let max_index = self.max_index();
        let mut cursor = first_index;
        while results.len() < max_items && cursor <= max_index {
            match self.gang_pass(root, cursor, max_items, tag, &mut results) {
                Some(next) => cursor = next,
                None => break,
            }
        }
        results
    }

    /// One depth-first probe from `index`, collecting from at most one bottom
    /// node. Returns where the next pass should start, or `None` once the
    /// cursor would run past the end of the key space.
    fn gang_pass<'a>(
        &'a self,
        root: &'a Node<T>,
        mut index: u64,
        max_items: usize,
        tag: Option<Tag>,
        results: &mut Vec<(u64, &'a T)>,
    ) -> Option<u64> {
        let config = &self.config;
        let branch = config.branch();
        let mut node = root;
        let mut level = self.height;

        loop {
            let shift = (level - 1) * config.shift;
            let start = config.offset(index, level);
            // Index with the bits decided at and below this level cleared.
            let base = index & !((config.mask() << shift) | ((1u64 << shift) - 1));

            let found = match tag {
                None => node.next_present(start, branch),
                Some(tag) => node.next_tagged(tag, start),
            };
            let Some(offset) = found else {
                return next_block(base, branch, shift);
            };
            if offset != start {
                index = base | ((offset as u64) << shift);
            }

            if level == 1 {
                for j in offset..branch {
                    if tag.is_some_and(|tag| !node.tag_get(tag, j)) {
                        continue;
                    }
                    let Some(item) = node.slot(j).as_item() else {
                        debug_assert!(tag.is_none(), "tagged bottom slot {j} is empty");
                        continue;
                    };
                    let key = base | j as u64;
                    results.push((key, item));
                    if results.len() == max_items {
                        return key.checked_add(1);
                    }
                }
                return next_block(base, branch, 0);
            }

            node = node.slot(offset).as_node()?;
            level -= 1;
        }
    }
}

/// Start of the block after the one beginning at `base`, where each of the
/// `branch` slots spans `1 << shift` indices.
#[inline]
fn next_block(base: u64, branch: usize, shift: u32) -> Option<u64> {
    let next = u128::from(base) + ((branch as u128) << shift);
    u64::try_from(next).ok()
}
