//! Tree configuration.

use crate::node::MAX_SHIFT;
use crate::{Error, Result};

/// Width of an index in bits.
pub const KEY_BITS: u32 = u64::BITS;

/// Whether node allocation may wait for memory to become available.
///
/// Only non-blocking trees fall back to a [`PreloadPool`](crate::PreloadPool)
/// when the allocator comes up empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AllocPolicy {
    #[default]
    Blocking,
    NonBlocking,
}

impl AllocPolicy {
    #[inline]
    pub fn may_block(self) -> bool {
        matches!(self, AllocPolicy::Blocking)
    }
}

/// Configuration for a [`RadixTree`](crate::RadixTree).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeConfig {
    /// Key bits consumed per level; the branching factor is `1 << shift`.
    ///
    /// Must be in `1..=6`. Small shifts make tall trees, which is mostly
    /// useful for stress testing.
    pub shift: u32,
    /// Allocation policy for operations that are not explicitly preloaded.
    pub policy: AllocPolicy,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            shift: MAX_SHIFT,
            policy: AllocPolicy::Blocking,
        }
    }
}

impl TreeConfig {
    pub fn with_shift(mut self, shift: u32) -> Self {
        self.shift = shift;
        self
    }

    pub fn with_policy(mut self, policy: AllocPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.shift == 0 || self.shift > MAX_SHIFT {
            return Err(Error::InvalidConfig(format!(
                "shift must be in 1..={MAX_SHIFT}, got {}",
                self.shift
            )));
        }
        Ok(())
    }

    /// Slots per node.
    #[inline]
    pub fn branch(&self) -> usize {
        1 << self.shift
    }

    #[inline]
    pub(crate) fn mask(&self) -> u64 {
        (1u64 << self.shift) - 1
    }

    /// Tallest tree this configuration can build.
    #[inline]
    pub fn max_height(&self) -> u32 {
        KEY_BITS.div_ceil(self.shift)
    }

    /// Nodes a single insertion can consume in the worst case: one per level
    /// plus slack for the extension nodes.
    #[inline]
    pub fn max_path(&self) -> usize {
        self.max_height() as usize + 2
    }

    /// Largest index representable by a tree of `height` levels.
    #[inline]
    pub fn max_index(&self, height: u32) -> u64 {
        let bits = height * self.shift;
        if bits >= KEY_BITS {
            u64::MAX
        } else {
            (1u64 << bits) - 1
        }
    }

    /// Slot within a node at `level` (1 = bottom) that `index` passes through.
    #[inline]
    pub(crate) fn offset(&self, index: u64, level: u32) -> usize {
        debug_assert!(level >= 1 && level <= self.max_height());
        ((index >> ((level - 1) * self.shift)) & self.mask()) as usize
    }
}
