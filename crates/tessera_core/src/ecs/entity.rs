//! # Entities and Addresses
//!
//! Entities are lightweight identifiers consisting of:
//! - An index into the entity directory
//! - A generation counter for safe reuse
//!
//! An [`EntityAddress`] locates the row an entity currently occupies. It is
//! only valid until the row moves (migration or swap-remove).

use super::layout::ArchetypeId;

/// Unique identifier for an entity.
///
/// The ID is split into two parts:
/// - Lower 32 bits: Index into the entity directory
/// - Upper 32 bits: Generation counter for detecting stale references
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct EntityId(u64);

impl EntityId {
    /// Creates a new entity ID from index and generation.
    ///
    /// # Arguments
    ///
    /// * `index` - The directory index (0 to 2^32-1)
    /// * `generation` - The generation counter (0 to 2^32-1)
    #[inline]
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self(((generation as u64) << 32) | (index as u64))
    }

    /// Rebuilds an ID from its raw bits.
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Returns the raw bits.
    #[inline]
    #[must_use]
    pub const fn to_bits(self) -> u64 {
        self.0
    }

    /// Returns the index portion of the entity ID.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0 as u32
    }

    /// Returns the generation portion of the entity ID.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Null/invalid entity ID.
    pub const NULL: Self = Self(u64::MAX);

    /// Checks if this entity ID is null/invalid.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == u64::MAX
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::NULL
    }
}

/// Reference to one chunk: which chunk list, which link of its chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChunkRef {
    /// Archetype (layout hash) of the owning chunk list.
    pub archetype: ArchetypeId,
    /// 0-based position in the chain, the head being 0.
    pub position: u32,
}

impl ChunkRef {
    /// Creates a chunk reference.
    #[inline]
    #[must_use]
    pub const fn new(archetype: ArchetypeId, position: u32) -> Self {
        Self {
            archetype,
            position,
        }
    }
}

/// Location of one entity's row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EntityAddress {
    /// Chunk holding the row.
    pub chunk: ChunkRef,
    /// Row index inside the chunk.
    pub index: u32,
}

impl EntityAddress {
    /// Creates an address.
    #[inline]
    #[must_use]
    pub const fn new(chunk: ChunkRef, index: u32) -> Self {
        Self { chunk, index }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_id_roundtrip() {
        let id = EntityId::new(12345, 67890);
        assert_eq!(id.index(), 12345);
        assert_eq!(id.generation(), 67890);
        assert_eq!(EntityId::from_bits(id.to_bits()), id);
    }

    #[test]
    fn test_null_is_default() {
        assert!(EntityId::default().is_null());
        assert!(!EntityId::new(0, 0).is_null());
    }
}
