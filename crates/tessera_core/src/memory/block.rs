//! # Memory Block
//!
//! A fixed-size, zero-initialized byte block with bounds-checked views.

use crate::error::{StorageError, StorageResult};

/// Size of one backing word. Blocks are aligned to this.
const WORD: usize = std::mem::size_of::<u64>();

/// A fixed-size byte block.
///
/// The block is backed by `u64` words so its start is 8-byte aligned, and
/// exposes exactly `len` bytes. All accessors are bounds-checked.
///
/// # Example
///
/// ```rust
/// use tessera_core::memory::MemoryBlock;
///
/// let mut block = MemoryBlock::try_new(64).unwrap();
/// block.bytes_mut(8, 4).unwrap().copy_from_slice(&[1, 2, 3, 4]);
/// block.copy_within(8, 0, 4);
/// assert_eq!(block.bytes(0, 4), Some(&[1, 2, 3, 4][..]));
/// ```
pub struct MemoryBlock {
    /// Backing storage, rounded up to whole words.
    words: Vec<u64>,
    /// Usable size in bytes.
    len: usize,
}

impl MemoryBlock {
    /// Allocates a zeroed block of `len` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::AllocationFailed`] if the memory cannot be
    /// reserved.
    pub fn try_new(len: usize) -> StorageResult<Self> {
        let word_count = len.div_ceil(WORD);
        let mut words: Vec<u64> = Vec::new();
        if words.try_reserve_exact(word_count).is_err() {
            tracing::warn!("failed to reserve {} bytes for memory block", len);
            return Err(StorageError::AllocationFailed { bytes: len });
        }
        words.resize(word_count, 0);
        Ok(Self { words, len })
    }

    /// Returns the size of the block in bytes.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Checks if the block holds zero bytes.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the whole block.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &bytemuck::cast_slice::<u64, u8>(&self.words)[..self.len]
    }

    /// Returns the whole block mutably.
    #[inline]
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        let len = self.len;
        &mut bytemuck::cast_slice_mut::<u64, u8>(&mut self.words)[..len]
    }

    /// Returns `len` bytes starting at `offset`, or `None` if out of range.
    #[inline]
    #[must_use]
    pub fn bytes(&self, offset: usize, len: usize) -> Option<&[u8]> {
        let end = offset.checked_add(len)?;
        self.as_bytes().get(offset..end)
    }

    /// Returns `len` mutable bytes starting at `offset`, or `None` if out of range.
    #[inline]
    pub fn bytes_mut(&mut self, offset: usize, len: usize) -> Option<&mut [u8]> {
        let end = offset.checked_add(len)?;
        self.as_bytes_mut().get_mut(offset..end)
    }

    /// Copies `len` bytes from `src` to `dst` inside this block.
    ///
    /// # Panics
    ///
    /// Panics if either range is out of bounds.
    #[inline]
    pub fn copy_within(&mut self, src: usize, dst: usize, len: usize) {
        self.as_bytes_mut().copy_within(src..src + len, dst);
    }

    /// Copies `len` bytes from `other` at `src_offset` into this block at
    /// `dst_offset`.
    ///
    /// # Panics
    ///
    /// Panics if either range is out of bounds.
    #[inline]
    pub fn copy_from(&mut self, dst_offset: usize, other: &Self, src_offset: usize, len: usize) {
        self.as_bytes_mut()[dst_offset..dst_offset + len]
            .copy_from_slice(&other.as_bytes()[src_offset..src_offset + len]);
    }
}

impl std::fmt::Debug for MemoryBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBlock").field("len", &self.len).finish()
    }
}
