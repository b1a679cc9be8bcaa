//! # Component System
//!
//! Components are pure data containers with no behavior.
//! Chunks store them as raw byte images, so they must be plain old data.

use std::any::TypeId;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use bytemuck::{Pod, Zeroable};

use super::entity::{ChunkRef, EntityAddress, EntityId};
use super::layout::ArchetypeId;

/// Stable identity of a component kind.
///
/// The only key distinguishing component kinds at runtime. Identities are
/// totally ordered; layouts keep their descriptors sorted by it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct ComponentId(u64);

impl ComponentId {
    /// Derives the identity of a Rust type.
    ///
    /// Stable for the lifetime of the process.
    #[must_use]
    pub fn of<T: 'static>() -> Self {
        let mut hasher = DefaultHasher::new();
        TypeId::of::<T>().hash(&mut hasher);
        Self(hasher.finish())
    }

    /// Wraps a raw identity value.
    ///
    /// Useful when the ordering between kinds must be fixed explicitly.
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw identity value.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Marker trait for chunk-storable components.
///
/// Components must be:
/// - `Pod`: Plain old data, any byte image is a valid value
/// - `Zeroable`: A zeroed slot is a valid value
/// - `Send + Sync`: Chunks may be read from worker threads
///
/// # Example
///
/// ```rust
/// use bytemuck::{Pod, Zeroable};
/// use tessera_core::Component;
///
/// #[derive(Clone, Copy, Default, Pod, Zeroable)]
/// #[repr(C)]
/// struct Health {
///     current: f32,
///     max: f32,
/// }
///
/// impl Component for Health {}
/// ```
pub trait Component: Pod + Zeroable + Send + Sync + 'static {
    /// Identity of this component kind.
    #[inline]
    #[must_use]
    fn id() -> ComponentId {
        ComponentId::of::<Self>()
    }

    /// Byte size of one value.
    #[inline]
    #[must_use]
    fn size() -> u32 {
        // Components wider than u32::MAX bytes cannot fit in any chunk.
        u32::try_from(std::mem::size_of::<Self>()).unwrap_or(u32::MAX)
    }
}

/// Reserved component present in every stored row.
///
/// Holds the owning entity's id and its current address, colocated with the
/// rest of the entity's data.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct EntityRecord {
    /// Raw bits of the owning [`EntityId`].
    pub id: u64,
    /// Layout hash of the chunk list holding the row.
    pub archetype: u64,
    /// Chunk position inside that list.
    pub chunk: u32,
    /// Row index inside that chunk.
    pub index: u32,
}

impl Component for EntityRecord {}

impl EntityRecord {
    /// Creates a record for an entity placed at `address`.
    #[inline]
    #[must_use]
    pub const fn new(id: EntityId, address: EntityAddress) -> Self {
        Self {
            id: id.to_bits(),
            archetype: address.chunk.archetype.raw(),
            chunk: address.chunk.position,
            index: address.index,
        }
    }

    /// Returns the owning entity.
    #[inline]
    #[must_use]
    pub const fn entity(&self) -> EntityId {
        EntityId::from_bits(self.id)
    }

    /// Returns the address stored in this record.
    #[inline]
    #[must_use]
    pub const fn address(&self) -> EntityAddress {
        EntityAddress {
            chunk: ChunkRef {
                archetype: ArchetypeId::from_raw(self.archetype),
                position: self.chunk,
            },
            index: self.index,
        }
    }
}
