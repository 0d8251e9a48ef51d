//! The radix tree: extension, insertion, lookup, tags and deletion.
//!
//! The tree owns a strict hierarchy of boxed nodes. Interior slots own their
//! child nodes, bottom slots own items, and a height-0 tree keeps its only
//! item (index 0) directly in the root slot.

use log::{debug, trace, warn};
use smallvec::SmallVec;

use crate::node::{Node, Slot, Tag, ALL_TAGS};
use crate::{
    AllocPolicy, Error, HeapAllocator, NodeAllocator, PreloadPool, Preloaded, Result, TreeConfig,
};

/// Nodes obtained for one insertion before anything is linked.
type Reservation<T> = SmallVec<[Box<Node<T>>; 8]>;

// =============================================================================
// RadixTree
// =============================================================================

/// Sparse map from `u64` indices to items, with two aggregated tags per item.
///
/// The tree does no locking of its own: mutators take `&mut self` and readers
/// `&self`. See [`SharedRadixTree`](crate::SharedRadixTree) for a locked
/// wrapper.
pub struct RadixTree<T, A = HeapAllocator> {
    pub(crate) root: Slot<T>,
    pub(crate) height: u32,
    /// Tags carried by anything under the root slot.
    pub(crate) root_tags: u8,
    pub(crate) config: TreeConfig,
    alloc: A,
    len: usize,
    nodes: usize,
}

impl<T> RadixTree<T> {
    /// Empty 64-way tree with blocking allocation from the heap.
    pub fn new() -> Self {
        Self::build(TreeConfig::default(), HeapAllocator)
    }

    pub fn with_config(config: TreeConfig) -> Result<Self> {
        Self::with_allocator(config, HeapAllocator)
    }
}

impl<T> Default for RadixTree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, A: NodeAllocator> RadixTree<T, A> {
    pub fn with_allocator(config: TreeConfig, alloc: A) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config, alloc))
    }

    fn build(config: TreeConfig, alloc: A) -> Self {
        Self {
            root: Slot::Empty,
            height: 0,
            root_tags: 0,
            config,
            alloc,
            len: 0,
            nodes: 0,
        }
    }

    /// Number of stored items.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Node levels between the root and the items.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Largest index the tree can hold without growing.
    #[inline]
    pub fn max_index(&self) -> u64 {
        self.config.max_index(self.height)
    }

    #[inline]
    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    #[inline]
    pub fn allocator(&self) -> &A {
        &self.alloc
    }

    /// Number of nodes currently linked into the tree.
    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes
    }

    /// Approximate bytes held by linked nodes.
    pub fn memory_usage(&self) -> usize {
        self.nodes * std::mem::size_of::<Node<T>>()
    }

    /// Drop every item and node.
    pub fn clear(&mut self) {
        self.root = Slot::Empty;
        self.height = 0;
        self.root_tags = 0;
        self.len = 0;
        self.nodes = 0;
    }

    /// Top up `pool` using this tree's allocator.
    pub fn preload<'p>(
        &self,
        pool: &'p mut PreloadPool<T>,
        policy: AllocPolicy,
    ) -> Result<Preloaded<'p, T>> {
        pool.preload(&self.alloc, policy)
    }

    /// Try the allocator, then (only for non-blocking trees) the preload pool.
    fn alloc_node(&self, pool: Option<&mut PreloadPool<T>>) -> Option<Box<Node<T>>> {
        if let Some(node) = self.alloc.allocate(self.config.policy) {
            return Some(node);
        }
        if self.config.policy.may_block() {
            return None;
        }
        pool?.take()
    }
}

// =============================================================================
// Extend / Insert
// =============================================================================

impl<T, A: NodeAllocator> RadixTree<T, A> {
    /// Store `item` at `index`.
    ///
    /// Never overwrites: an occupied index fails with [`Error::AlreadyExists`].
    /// On any error the tree is left exactly as it was.
    pub fn insert(&mut self, index: u64, item: T) -> Result<()> {
        self.insert_with(index, item, None)
    }

    /// Like [`insert`](Self::insert), but a non-blocking tree may fall back to
    /// the nodes stashed by a preceding preload.
    pub fn insert_preloaded(
        &mut self,
        preloaded: &mut Preloaded<'_, T>,
        index: u64,
        item: T,
    ) -> Result<()> {
        self.insert_with(index, item, Some(preloaded.pool()))
    }

    fn insert_with(
        &mut self,
        index: u64,
        item: T,
        mut pool: Option<&mut PreloadPool<T>>,
    ) -> Result<()> {
        let target = if index > self.max_index() {
            self.height_for(index)
        } else {
            self.height
        };
        if target == self.height && self.lookup(index).is_some() {
            return Err(Error::AlreadyExists { index });
        }

        let needed = self.nodes_needed(index, target);
        let mut reserved: Reservation<T> = SmallVec::with_capacity(needed);
        for _ in 0..needed {
            match self.alloc_node(pool.as_deref_mut()) {
                Some(node) => reserved.push(node),
                None => {
                    warn!(
                        "insert at {index} failed: got {} of {needed} nodes",
                        reserved.len()
                    );
                    if let Some(pool) = pool {
                        reserved.into_iter().for_each(|node| pool.give_back(node));
                    }
                    return Err(Error::OutOfMemory);
                }
            }
        }
        if needed > 0 {
            trace!("insert at {index} links {needed} new nodes");
        }

        if target > self.height {
            self.extend(target, &mut reserved);
        }
        self.link(index, item, &mut reserved);
        debug_assert!(reserved.is_empty(), "reservation overcounted");
        self.len += 1;
        Ok(())
    }

    /// Smallest height above the current one that can represent `index`.
    fn height_for(&self, index: u64) -> u32 {
        let mut height = self.height + 1;
        while index > self.config.max_index(height) {
            height += 1;
        }
        height
    }

    /// Nodes an insertion at `index` must create, including the extension
    /// nodes needed to reach `target` height.
    fn nodes_needed(&self, index: u64, target: u32) -> usize {
        let root = match &self.root {
            Slot::Empty => return target as usize,
            Slot::Item(_) => None,
            Slot::Node(node) => Some(&**node),
        };

        // Extension stacks new nodes on top, each holding the old root in
        // slot 0. The path leaves that chain at the first non-zero offset.
        let mut needed = (target - self.height) as usize;
        let mut level = target;
        while level > self.height {
            if self.config.offset(index, level) != 0 {
                return needed + (level - 1) as usize;
            }
            level -= 1;
        }

        let Some(mut node) = root else {
            return needed;
        };
        while level > 1 {
            match node.slot(self.config.offset(index, level)).as_node() {
                Some(child) => node = child,
                None => {
                    needed += (level - 1) as usize;
                    break;
                }
            }
            level -= 1;
        }
        needed
    }

    /// Grow to `target` levels by wrapping the root, carrying its tags along.
    fn extend(&mut self, target: u32, reserved: &mut Reservation<T>) {
        let from = self.height;
        if self.root.is_empty() {
            self.height = target;
        } else {
            while self.height < target {
                let mut node = reserved
                    .pop()
                    .expect("reservation covers every extension level");
                node.fill(0, self.root.take());
                for tag in Tag::ALL {
                    if self.root_tags & tag.bit() != 0 {
                        node.tag_set(tag, 0);
                    }
                }
                self.root = Slot::Node(node);
                self.height += 1;
                self.nodes += 1;
            }
        }
        debug!("extended tree height {from} -> {target}");
    }

    /// Descend to `index`, creating missing nodes from `reserved`, and store
    /// the item in the (empty) bottom slot.
    fn link(&mut self, index: u64, item: T, reserved: &mut Reservation<T>) {
        let config = self.config;
        let height = self.height;
        let mut created = 0;
        let mut parent_count: Option<&mut u32> = None;
        let mut slot = &mut self.root;

        for level in (1..=height).rev() {
            if slot.is_empty() {
                let node = reserved
                    .pop()
                    .expect("reservation covers every missing level");
                *slot = Slot::Node(node);
                created += 1;
                if let Some(count) = parent_count.as_deref_mut() {
                    *count += 1;
                }
            }
            let node = slot.as_node_mut().expect("interior slot holds a node");
            let offset = config.offset(index, level);
            if level == 1 {
                debug_assert!(
                    Tag::ALL.iter().all(|tag| !node.tag_get(*tag, offset)),
                    "empty slot {offset} carries a tag"
                );
            }
            let (count, child) = node.parts_mut(offset);
            parent_count = Some(count);
            slot = child;
        }

        debug_assert!(slot.is_empty());
        *slot = Slot::Item(item);
        if let Some(count) = parent_count {
            *count += 1;
        }
        self.nodes += created;
    }
}

// =============================================================================
// Lookup
// =============================================================================

impl<T, A: NodeAllocator> RadixTree<T, A> {
    pub fn lookup(&self, index: u64) -> Option<&T> {
        if index > self.max_index() {
            return None;
        }
        let mut slot = &self.root;
        for level in (1..=self.height).rev() {
            slot = slot.as_node()?.slot(self.config.offset(index, level));
        }
        slot.as_item()
    }

    /// Mutable access to the item at `index`, for in-place replacement.
    pub fn lookup_mut(&mut self, index: u64) -> Option<&mut T> {
        if index > self.max_index() {
            return None;
        }
        let config = self.config;
        let mut slot = &mut self.root;
        for level in (1..=self.height).rev() {
            slot = slot.as_node_mut()?.slot_mut(config.offset(index, level));
        }
        slot.as_item_mut()
    }

    pub fn contains_key(&self, index: u64) -> bool {
        self.lookup(index).is_some()
    }
}

// =============================================================================
// Tags
// =============================================================================

impl<T, A: NodeAllocator> RadixTree<T, A> {
    /// Set `tag` on the item at `index` and on every node above it.
    ///
    /// Fails with [`Error::NoSuchKey`] (touching nothing) when no item is
    /// stored there.
    pub fn tag_set(&mut self, index: u64, tag: Tag) -> Result<&T> {
        if self.lookup(index).is_none() {
            return Err(Error::NoSuchKey { index });
        }
        let config = self.config;
        let height = self.height;
        self.root_tags |= tag.bit();

        let mut slot = &mut self.root;
        for level in (1..=height).rev() {
            let node = slot.as_node_mut().expect("path checked by lookup");
            let offset = config.offset(index, level);
            node.tag_set(tag, offset);
            slot = node.slot_mut(offset);
        }
        Ok(slot.as_item().expect("path checked by lookup"))
    }

    /// Clear `tag` on the item at `index`, retracting it from ancestors that
    /// have nothing else tagged.
    ///
    /// Returns the item (which stays stored), or `None` when absent.
    pub fn tag_clear(&mut self, index: u64, tag: Tag) -> Option<&T> {
        if index > self.max_index() {
            return None;
        }
        let config = self.config;
        let height = self.height;
        let reached_root = match &mut self.root {
            Slot::Empty => return None,
            Slot::Item(_) => true,
            Slot::Node(node) => clear_tag_below(node, height, index, tag, &config)?,
        };
        if reached_root {
            self.root_tags &= !tag.bit();
        }
        self.lookup(index)
    }

    /// Whether the item at `index` carries `tag`.
    pub fn tag_get(&self, index: u64, tag: Tag) -> bool {
        if index > self.max_index() || !self.tagged(tag) {
            return false;
        }
        let mut slot = &self.root;
        for level in (1..=self.height).rev() {
            let Some(node) = slot.as_node() else {
                return false;
            };
            let offset = self.config.offset(index, level);
            if !node.tag_get(tag, offset) {
                return false;
            }
            slot = node.slot(offset);
        }
        debug_assert!(!slot.is_empty(), "tag set on an empty slot");
        !slot.is_empty()
    }

    /// Whether any item in the tree carries `tag`.
    #[inline]
    pub fn tagged(&self, tag: Tag) -> bool {
        self.root_tags & tag.bit() != 0
    }
}

/// Clear `tag` along the path to `index` below `node` (which sits at `level`).
///
/// Returns `None` if nothing is stored at `index`, otherwise whether `node`
/// itself no longer has `tag` on any slot.
fn clear_tag_below<T>(
    node: &mut Node<T>,
    level: u32,
    index: u64,
    tag: Tag,
    config: &TreeConfig,
) -> Option<bool> {
    let offset = config.offset(index, level);
    let child_cleared = if level == 1 {
        node.slot(offset).as_item()?;
        true
    } else {
        let child = node.slot_mut(offset).as_node_mut()?;
        clear_tag_below(child, level - 1, index, tag, config)?
    };
    // A sibling below still carries the tag: stop here.
    if !child_cleared {
        return Some(false);
    }
    node.tag_clear(tag, offset);
    Some(!node.any_tag(tag))
}

// =============================================================================
// Delete
// =============================================================================

struct Removal<T> {
    item: T,
    /// Tags the parent must clear for the slot leading here.
    clear_above: u8,
    /// Node has no occupied slots left.
    emptied: bool,
}

impl<T, A: NodeAllocator> RadixTree<T, A> {
    /// Remove and return the item at `index`.
    ///
    /// Nodes left empty are freed; once the last item is gone the height
    /// resets to 0.
    pub fn delete(&mut self, index: u64) -> Option<T> {
        if index > self.max_index() {
            return None;
        }
        if matches!(self.root, Slot::Item(_)) {
            let Slot::Item(item) = self.root.take() else {
                unreachable!("root slot checked above");
            };
            self.root_tags = 0;
            self.len -= 1;
            debug!("deleted root item, tree is empty");
            return Some(item);
        }

        let config = self.config;
        let height = self.height;
        let Slot::Node(root) = &mut self.root else {
            return None;
        };
        let mut freed = 0;
        let removal = delete_below(root, height, index, &config, &mut freed)?;

        self.root_tags &= !removal.clear_above;
        if removal.emptied {
            debug_assert_eq!(self.root_tags, 0, "empty tree still tagged");
            self.root = Slot::Empty;
            self.height = 0;
            freed += 1;
            debug!("tree emptied, height {height} -> 0");
        }
        self.nodes -= freed;
        self.len -= 1;
        Some(removal.item)
    }
}

/// Remove the item at `index` below `node`, retracting tags and freeing
/// emptied children on the way back up.
fn delete_below<T>(
    node: &mut Node<T>,
    level: u32,
    index: u64,
    config: &TreeConfig,
    freed: &mut usize,
) -> Option<Removal<T>> {
    let offset = config.offset(index, level);
    let (item, mut clear) = if level == 1 {
        node.slot(offset).as_item()?;
        let Slot::Item(item) = node.vacate(offset) else {
            unreachable!("bottom slot checked above");
        };
        (item, ALL_TAGS)
    } else {
        let child = node.slot_mut(offset).as_node_mut()?;
        let removal = delete_below(child, level - 1, index, config, freed)?;
        if removal.emptied {
            let child = node.vacate(offset);
            debug_assert!(
                matches!(&child, Slot::Node(n) if n.tag_summary() == 0),
                "freeing a tagged node"
            );
            drop(child);
            *freed += 1;
        }
        (removal.item, removal.clear_above)
    };

    for tag in Tag::ALL {
        if clear & tag.bit() != 0 {
            node.tag_clear(tag, offset);
            if node.any_tag(tag) {
                clear &= !tag.bit();
            }
        }
    }

    Some(Removal {
        item,
        clear_above: clear,
        emptied: node.count() == 0,
    })
}

// =============================================================================
// Debug / validation
// =============================================================================

impl<T: std::fmt::Debug, A: NodeAllocator> std::fmt::Debug for RadixTree<T, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

#[cfg(test)]
impl<T, A: NodeAllocator> RadixTree<T, A> {
    /// Walk the whole tree and assert every structural invariant.
    pub(crate) fn validate(&self) {
        use crate::node::MAX_BRANCH;

        fn walk<T>(
            node: &Node<T>,
            level: u32,
            config: &TreeConfig,
            items: &mut usize,
            nodes: &mut usize,
        ) -> u8 {
            *nodes += 1;
            let mut occupied = 0u32;
            for offset in 0..MAX_BRANCH {
                let slot = node.slot(offset);
                if offset >= config.branch() {
                    assert!(slot.is_empty(), "slot {offset} beyond branch is used");
                }
                match slot {
                    Slot::Empty => {
                        for tag in Tag::ALL {
                            assert!(!node.tag_get(tag, offset), "empty slot {offset} tagged");
                        }
                    }
                    Slot::Item(_) => {
                        assert_eq!(level, 1, "item stored above the bottom level");
                        occupied += 1;
                        *items += 1;
                    }
                    Slot::Node(child) => {
                        assert!(level > 1, "node stored at the bottom level");
                        occupied += 1;
                        let below = walk(child, level - 1, config, items, nodes);
                        for tag in Tag::ALL {
                            assert_eq!(
                                node.tag_get(tag, offset),
                                below & tag.bit() != 0,
                                "tag {tag:?} at level {level} slot {offset} disagrees with child"
                            );
                        }
                    }
                }
            }
            assert_eq!(node.count(), occupied, "occupancy count is stale");
            assert!(occupied > 0, "empty node left in the tree");
            node.tag_summary()
        }

        match &self.root {
            Slot::Empty => {
                assert_eq!(self.height, 0, "empty tree must have height 0");
                assert_eq!(self.len, 0);
                assert_eq!(self.nodes, 0);
                assert_eq!(self.root_tags, 0);
            }
            Slot::Item(_) => {
                assert_eq!(self.height, 0, "root item above height 0");
                assert_eq!(self.len, 1);
                assert_eq!(self.nodes, 0);
            }
            Slot::Node(root) => {
                assert!(self.height >= 1);
                let (mut items, mut nodes) = (0, 0);
                let summary = walk(root, self.height, &self.config, &mut items, &mut nodes);
                assert_eq!(summary, self.root_tags, "root tags disagree with root node");
                assert_eq!(items, self.len, "reachable items must match len");
                assert_eq!(nodes, self.nodes, "reachable nodes must match node_count");
            }
        }
    }
}
