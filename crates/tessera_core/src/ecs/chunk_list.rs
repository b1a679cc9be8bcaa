//! # Chunk List
//!
//! Owns the chain of chunks for one archetype.
//!
//! The chain is an arena: chunks live in a `Vec` in chain order, and a
//! chunk's position is its index. Allocation walks forward from the lowest
//! position that may still have room. The chain only grows.

use std::sync::Arc;

use super::chunk::{Chunk, RowSource};
use super::component::{Component, EntityRecord};
use super::entity::{ChunkRef, EntityAddress, EntityId};
use super::layout::{ArchetypeId, ComponentLayout};
use super::observer::AddressObserver;
use crate::error::{StorageError, StorageResult};

/// All chunks of one archetype plus the observer told about row moves.
///
/// # Example
///
/// ```rust
/// use tessera_core::{ChunkList, ComponentId, ComponentLayout, EntityAddress, EntityId};
///
/// let mut layout = ComponentLayout::with_entity_record(16 * 1024);
/// layout.add_component(ComponentId::from_raw(1), 4);
///
/// let mut list = ChunkList::new(layout, |_: EntityId, _: EntityAddress| {}).unwrap();
/// let address = list.add_entity(EntityId::new(0, 0), None).unwrap();
/// assert_eq!(address.index, 0);
/// assert_eq!(list.entity_count(), 1);
/// ```
pub struct ChunkList {
    /// Layout shared by every chunk in the chain.
    layout: Arc<ComponentLayout>,
    /// Chain in order; never empty.
    chunks: Vec<Chunk>,
    /// Lowest position that may have a free row.
    first_open: usize,
    /// Told about every placement and relocation.
    observer: Box<dyn AddressObserver>,
}

impl ChunkList {
    /// Creates a chunk list and allocates its head chunk.
    ///
    /// The [`EntityRecord`] component is added to `layout` if missing.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::AllocationFailed`] if the head chunk cannot
    /// be allocated.
    pub fn new(
        mut layout: ComponentLayout,
        observer: impl AddressObserver + 'static,
    ) -> StorageResult<Self> {
        if !layout.contains(EntityRecord::id()) {
            layout.add::<EntityRecord>();
        }
        let layout = Arc::new(layout);
        let head = Chunk::new(Arc::clone(&layout), ChunkRef::new(layout.hash(), 0))?;

        tracing::debug!(
            archetype = layout.hash().raw(),
            components = layout.component_count(),
            capacity = layout.max_entity_count(),
            "chunk list created"
        );

        Ok(Self {
            layout,
            chunks: vec![head],
            first_open: 0,
            observer: Box::new(observer),
        })
    }

    /// Places an entity in the first chunk with a free row.
    ///
    /// A new chunk is appended when every chunk is full. With `previous`
    /// the entity is migrating and its shared components are copied over;
    /// the caller removes the previous row afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::AllocationFailed`] if a new chunk is needed
    /// and cannot be allocated.
    ///
    /// # Panics
    ///
    /// Panics if the row in `previous` belongs to another entity.
    pub fn add_entity(
        &mut self,
        id: EntityId,
        previous: Option<RowSource<'_>>,
    ) -> StorageResult<EntityAddress> {
        let mut position = self.first_open;
        loop {
            if position == self.chunks.len() {
                self.push_chunk()?;
            }
            let chunk = &mut self.chunks[position];
            if let Some(address) = chunk.add_entity(id, previous, &mut *self.observer) {
                self.first_open = position;
                return Ok(address);
            }
            position += 1;
        }
    }

    /// Removes the row at `address`, filling it with the chunk's last row.
    ///
    /// Returns the entity relocated into the vacated row, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ForeignAddress`] if `address` belongs to
    /// another archetype, or [`StorageError::StaleAddress`] if it does not
    /// point at an occupied row.
    pub fn remove_entity(&mut self, address: EntityAddress) -> StorageResult<Option<EntityId>> {
        let position = self.check(address)?;
        let moved = self.chunks[position].remove_entity(address.index, &mut *self.observer);
        self.first_open = self.first_open.min(position);
        Ok(moved)
    }

    /// Borrows the occupied row at `address`, e.g. as a migration source.
    ///
    /// # Errors
    ///
    /// Same as [`Self::remove_entity`].
    pub fn row(&self, address: EntityAddress) -> StorageResult<RowSource<'_>> {
        let position = self.check(address)?;
        self.chunks[position]
            .row(address.index)
            .ok_or(StorageError::StaleAddress {
                position: address.chunk.position,
                index: address.index,
            })
    }

    /// Reads component `C` of the row at `address`.
    #[must_use]
    pub fn get<C: Component>(&self, address: EntityAddress) -> Option<C> {
        let position = self.check(address).ok()?;
        self.chunks[position].get(address.index)
    }

    /// Overwrites component `C` of the row at `address`.
    ///
    /// Returns `false` if the address is not valid here or the component is
    /// absent.
    pub fn set<C: Component>(&mut self, address: EntityAddress, value: C) -> bool {
        match self.check(address) {
            Ok(position) => self.chunks[position].set(address.index, value),
            Err(_) => false,
        }
    }

    /// Returns the chunk at `position`.
    #[inline]
    #[must_use]
    pub fn chunk(&self, position: u32) -> Option<&Chunk> {
        self.chunks.get(position as usize)
    }

    /// Mutable variant of [`Self::chunk`].
    ///
    /// Gives access to component data only; rows cannot be added or removed
    /// through it.
    #[inline]
    pub fn chunk_mut(&mut self, position: u32) -> Option<&mut Chunk> {
        self.chunks.get_mut(position as usize)
    }

    /// Returns the head of the chain.
    #[inline]
    #[must_use]
    pub fn head(&self) -> &Chunk {
        &self.chunks[0]
    }

    /// Returns the chunk following `chunk` in this chain.
    #[must_use]
    pub fn next_chunk(&self, chunk: &Chunk) -> Option<&Chunk> {
        if chunk.chunk_ref().archetype != self.archetype() {
            return None;
        }
        self.chunks.get(chunk.position() as usize + 1)
    }

    /// Iterates over the chain from the head.
    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> + Clone + '_ {
        self.chunks.iter()
    }

    /// Iterates mutably over the chain from the head.
    pub fn chunks_mut(&mut self) -> impl Iterator<Item = &mut Chunk> + '_ {
        self.chunks.iter_mut()
    }

    /// Returns the number of chunks in the chain.
    #[inline]
    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Returns the number of entities across the chain.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.chunks.iter().map(|c| c.entity_count() as usize).sum()
    }

    /// Returns the archetype of this list.
    #[inline]
    #[must_use]
    pub fn archetype(&self) -> ArchetypeId {
        self.layout.hash()
    }

    /// Returns the shared layout.
    #[inline]
    #[must_use]
    pub fn layout(&self) -> &ComponentLayout {
        &self.layout
    }

    /// Appends an empty chunk to the chain.
    ///
    /// # Panics
    ///
    /// Panics if the chain already holds `u32::MAX + 1` chunks.
    fn push_chunk(&mut self) -> StorageResult<()> {
        let position = chain_position(self.chunks.len());
        let chunk = Chunk::new(
            Arc::clone(&self.layout),
            ChunkRef::new(self.archetype(), position),
        )?;
        tracing::debug!(
            archetype = self.archetype().raw(),
            position,
            "chain extended"
        );
        self.chunks.push(chunk);
        Ok(())
    }

    /// Validates `address` and returns its chunk position.
    fn check(&self, address: EntityAddress) -> StorageResult<usize> {
        if address.chunk.archetype != self.archetype() {
            return Err(StorageError::ForeignAddress {
                expected: self.archetype(),
                found: address.chunk.archetype,
            });
        }
        let position = address.chunk.position as usize;
        match self.chunks.get(position) {
            Some(chunk) if address.index < chunk.entity_count() => Ok(position),
            _ => Err(StorageError::StaleAddress {
                position: address.chunk.position,
                index: address.index,
            }),
        }
    }
}

/// Position of the link appended to a chain of `len` chunks.
fn chain_position(len: usize) -> u32 {
    u32::try_from(len).expect("Chunk chain cannot hold more than u32::MAX + 1 chunks")
}

impl std::fmt::Debug for ChunkList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkList")
            .field("archetype", &self.archetype())
            .field("chunks", &self.chunks.len())
            .field("entities", &self.entity_count())
            .field("first_open", &self.first_open)
            .finish_non_exhaustive()
    }
}
