//! Fixed fan-out radix nodes and their per-slot tag bitmaps.
//!
//! Every node reserves room for [`MAX_BRANCH`] slots; a tree configured with a
//! smaller shift simply never touches the slots past its branching factor. Tag
//! bitmaps are one `u64` per tag, so any shift up to [`MAX_SHIFT`] fits.

/// Largest supported number of key bits consumed per level.
pub const MAX_SHIFT: u32 = 6;

/// Slot storage reserved in every node.
pub const MAX_BRANCH: usize = 1 << MAX_SHIFT;

/// Number of independent tag kinds tracked per slot.
pub const NUM_TAGS: usize = 2;

/// A per-key boolean annotation, aggregated up through every ancestor node.
///
/// The names follow the page-cache usage the index was built for, but the
/// index attaches no meaning to them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Tag {
    Dirty = 0,
    Writeback = 1,
}

impl Tag {
    /// Every tag kind, in index order.
    pub const ALL: [Tag; NUM_TAGS] = [Tag::Dirty, Tag::Writeback];

    #[inline]
    pub(crate) fn index(self) -> usize {
        self as usize
    }

    /// Bit for this tag inside a `u8` tag set.
    #[inline]
    pub(crate) fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

/// Tag set with every kind present.
pub(crate) const ALL_TAGS: u8 = (1 << NUM_TAGS) - 1;

/// Contents of one child position.
pub(crate) enum Slot<T> {
    Empty,
    Node(Box<Node<T>>),
    /// Only found at the bottom level (or in the root slot of a height-0 tree).
    Item(T),
}

impl<T> Slot<T> {
    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        matches!(self, Slot::Empty)
    }

    #[inline]
    pub(crate) fn as_node(&self) -> Option<&Node<T>> {
        match self {
            Slot::Node(node) => Some(&**node),
            _ => None,
        }
    }

    #[inline]
    pub(crate) fn as_node_mut(&mut self) -> Option<&mut Node<T>> {
        match self {
            Slot::Node(node) => Some(&mut **node),
            _ => None,
        }
    }

    #[inline]
    pub(crate) fn as_item(&self) -> Option<&T> {
        match self {
            Slot::Item(item) => Some(item),
            _ => None,
        }
    }

    #[inline]
    pub(crate) fn as_item_mut(&mut self) -> Option<&mut T> {
        match self {
            Slot::Item(item) => Some(item),
            _ => None,
        }
    }

    #[inline]
    pub(crate) fn take(&mut self) -> Slot<T> {
        std::mem::replace(self, Slot::Empty)
    }
}

/// One level of the tree: child slots, an occupancy count and tag bitmaps.
///
/// Nodes are only handed out by a [`NodeAllocator`](crate::NodeAllocator) and
/// are otherwise opaque.
pub struct Node<T> {
    count: u32,
    tags: [u64; NUM_TAGS],
    slots: [Slot<T>; MAX_BRANCH],
}

impl<T> Node<T> {
    pub(crate) fn new() -> Self {
        Self {
            count: 0,
            tags: [0; NUM_TAGS],
            slots: std::array::from_fn(|_| Slot::Empty),
        }
    }

    /// Number of occupied slots.
    #[inline]
    pub(crate) fn count(&self) -> u32 {
        self.count
    }

    #[inline]
    pub(crate) fn slot(&self, offset: usize) -> &Slot<T> {
        &self.slots[offset]
    }

    #[inline]
    pub(crate) fn slot_mut(&mut self, offset: usize) -> &mut Slot<T> {
        &mut self.slots[offset]
    }

    /// Install `slot` into an empty position and bump the occupancy count.
    #[inline]
    pub(crate) fn fill(&mut self, offset: usize, slot: Slot<T>) {
        debug_assert!(self.slots[offset].is_empty());
        debug_assert!(!slot.is_empty());
        self.slots[offset] = slot;
        self.count += 1;
    }

    /// Empty an occupied position and drop the occupancy count.
    #[inline]
    pub(crate) fn vacate(&mut self, offset: usize) -> Slot<T> {
        debug_assert!(self.count > 0);
        let old = self.slots[offset].take();
        debug_assert!(!old.is_empty());
        self.count -= 1;
        old
    }

    /// Split borrow used by descents that must both link a child and keep the
    /// parent's count reachable.
    #[inline]
    pub(crate) fn parts_mut(&mut self, offset: usize) -> (&mut u32, &mut Slot<T>) {
        (&mut self.count, &mut self.slots[offset])
    }

    #[inline]
    pub(crate) fn tag_set(&mut self, tag: Tag, offset: usize) {
        self.tags[tag.index()] |= 1u64 << offset;
    }

    #[inline]
    pub(crate) fn tag_clear(&mut self, tag: Tag, offset: usize) {
        self.tags[tag.index()] &= !(1u64 << offset);
    }

    #[inline]
    pub(crate) fn tag_get(&self, tag: Tag, offset: usize) -> bool {
        self.tags[tag.index()] & (1u64 << offset) != 0
    }

    /// Whether any slot of this node carries `tag`.
    #[inline]
    pub(crate) fn any_tag(&self, tag: Tag) -> bool {
        self.tags[tag.index()] != 0
    }

    /// Tags set on at least one slot, as a `u8` tag set.
    #[inline]
    pub(crate) fn tag_summary(&self) -> u8 {
        Tag::ALL
            .iter()
            .filter(|tag| self.any_tag(**tag))
            .fold(0, |acc, tag| acc | tag.bit())
    }

    /// First occupied slot at or after `from`, below `branch`.
    #[inline]
    pub(crate) fn next_present(&self, from: usize, branch: usize) -> Option<usize> {
        (from..branch).find(|&i| !self.slots[i].is_empty())
    }

    /// First slot at or after `from` whose `tag` bit is set.
    #[inline]
    pub(crate) fn next_tagged(&self, tag: Tag, from: usize) -> Option<usize> {
        if from >= MAX_BRANCH {
            return None;
        }
        let bits = self.tags[tag.index()] & (u64::MAX << from);
        (bits != 0).then(|| bits.trailing_zeros() as usize)
    }
}
