//! # Chunk
//!
//! One fixed-size memory block holding up to `max_entity_count` rows of a
//! single archetype, in Structure of Arrays layout.
//!
//! Occupied rows are always `[0, entity_count)`. Removal moves the last row
//! into the hole, so iteration over a chunk never has to skip anything.

use std::sync::Arc;

use super::column::{Column, ColumnMut};
use super::component::{Component, ComponentId, EntityRecord};
use super::entity::{ChunkRef, EntityAddress, EntityId};
use super::layout::{ComponentDescriptor, ComponentLayout};
use super::observer::AddressObserver;
use crate::error::StorageResult;
use crate::memory::MemoryBlock;

/// Borrowed handle to one occupied row, used as the source of a migration.
///
/// Obtained from [`Chunk::row`] or [`ChunkList::row`](super::ChunkList::row),
/// both of which check that the row is occupied.
#[derive(Clone, Copy, Debug)]
pub struct RowSource<'a> {
    chunk: &'a Chunk,
    index: u32,
}

impl<'a> RowSource<'a> {
    /// Returns the chunk holding the row.
    #[inline]
    #[must_use]
    pub const fn chunk(&self) -> &'a Chunk {
        self.chunk
    }

    /// Returns the row index.
    #[inline]
    #[must_use]
    pub const fn index(&self) -> u32 {
        self.index
    }

    /// Returns the address of the row.
    #[inline]
    #[must_use]
    pub const fn address(&self) -> EntityAddress {
        EntityAddress::new(self.chunk.chunk_ref, self.index)
    }
}

/// A fixed-size block of rows for one archetype.
pub struct Chunk {
    /// Component arrays, laid out by `layout`.
    memory: MemoryBlock,
    /// Layout shared by every chunk of the owning list.
    layout: Arc<ComponentLayout>,
    /// Where this chunk sits.
    chunk_ref: ChunkRef,
    /// Rows currently occupied.
    entity_count: u32,
}

impl Chunk {
    /// Allocates an empty chunk of `layout.chunk_size()` bytes.
    pub(crate) fn new(layout: Arc<ComponentLayout>, chunk_ref: ChunkRef) -> StorageResult<Self> {
        let memory = MemoryBlock::try_new(layout.chunk_size())?;
        tracing::debug!(
            archetype = chunk_ref.archetype.raw(),
            position = chunk_ref.position,
            capacity = layout.max_entity_count(),
            "chunk allocated"
        );
        Ok(Self {
            memory,
            layout,
            chunk_ref,
            entity_count: 0,
        })
    }

    /// Returns the layout of this chunk.
    #[inline]
    #[must_use]
    pub fn layout(&self) -> &ComponentLayout {
        &self.layout
    }

    /// Returns the reference identifying this chunk.
    #[inline]
    #[must_use]
    pub const fn chunk_ref(&self) -> ChunkRef {
        self.chunk_ref
    }

    /// Returns the position of this chunk in its chain.
    #[inline]
    #[must_use]
    pub const fn position(&self) -> u32 {
        self.chunk_ref.position
    }

    /// Returns the number of occupied rows.
    #[inline]
    #[must_use]
    pub const fn entity_count(&self) -> u32 {
        self.entity_count
    }

    /// Returns the maximum number of rows.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> u32 {
        self.layout.max_entity_count()
    }

    /// Checks if every row is occupied.
    #[inline]
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.entity_count >= self.capacity()
    }

    /// Checks if no row is occupied.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.entity_count == 0
    }

    /// Returns the raw memory block.
    #[inline]
    #[must_use]
    pub const fn memory(&self) -> &MemoryBlock {
        &self.memory
    }

    /// Returns a handle to row `index` if it is occupied.
    #[inline]
    #[must_use]
    pub fn row(&self, index: u32) -> Option<RowSource<'_>> {
        (index < self.entity_count).then_some(RowSource { chunk: self, index })
    }

    /// Reserves the next free row.
    ///
    /// Returns `None` when the chunk is full; the owning list then moves on
    /// to the next link of the chain.
    pub(crate) fn allocate_row(&mut self) -> Option<EntityAddress> {
        if self.is_full() {
            return None;
        }
        let address = EntityAddress::new(self.chunk_ref, self.entity_count);
        self.entity_count += 1;
        Some(address)
    }

    /// Places an entity in a new row.
    ///
    /// With `previous`, every component present in both layouts is copied
    /// from the previous row; components only in this layout are left as
    /// they are, components only in the previous layout are dropped. Without
    /// it, a fresh entity record is written.
    ///
    /// Notifies `observer` with the new address. Returns `None` if the chunk
    /// is full.
    ///
    /// # Panics
    ///
    /// Panics if the migrated record belongs to another entity, or if a
    /// shared component has different sizes in the two layouts.
    pub(crate) fn add_entity(
        &mut self,
        id: EntityId,
        previous: Option<RowSource<'_>>,
        observer: &mut dyn AddressObserver,
    ) -> Option<EntityAddress> {
        let address = self.allocate_row()?;
        let layout = Arc::clone(&self.layout);

        if let Some(previous) = previous {
            let source = previous.chunk;
            for descriptor in layout.descriptors() {
                let Some(source_descriptor) = source.layout.component_descriptor(descriptor.id)
                else {
                    continue;
                };
                assert_eq!(
                    source_descriptor.size, descriptor.size,
                    "Component {:?} changed size between layouts",
                    descriptor.id
                );
                self.memory.copy_from(
                    descriptor.element_offset(address.index),
                    &source.memory,
                    source_descriptor.element_offset(previous.index),
                    descriptor.size as usize,
                );
            }

            let record = self.get::<EntityRecord>(address.index).unwrap_or_default();
            assert!(
                record.entity() == id,
                "Entity record at {:?} belongs to {:?}, not {:?}",
                previous.address(),
                record.entity(),
                id
            );
        }

        self.set(address.index, EntityRecord::new(id, address));
        debug_assert!(self.entity_id(address.index) == Some(id));

        observer.address_changed(id, address);
        Some(address)
    }

    /// Removes row `index`, moving the last row into its place.
    ///
    /// Notifies `observer` about the relocated entity, whose id is returned.
    ///
    /// # Panics
    ///
    /// Panics if `index >= entity_count`.
    pub(crate) fn remove_entity(
        &mut self,
        index: u32,
        observer: &mut dyn AddressObserver,
    ) -> Option<EntityId> {
        assert!(
            index < self.entity_count,
            "Row {index} is not occupied (entity count {})",
            self.entity_count
        );

        let last = self.entity_count - 1;
        let mut moved = None;

        if index < last {
            let layout = Arc::clone(&self.layout);
            for descriptor in layout.descriptors() {
                self.memory.copy_within(
                    descriptor.element_offset(last),
                    descriptor.element_offset(index),
                    descriptor.size as usize,
                );
            }

            let address = EntityAddress::new(self.chunk_ref, index);
            if let Some(mut record) = self.get::<EntityRecord>(index) {
                record.chunk = address.chunk.position;
                record.index = address.index;
                self.set(index, record);

                let id = record.entity();
                tracing::trace!(entity = id.to_bits(), from = last, to = index, "row relocated");
                observer.address_changed(id, address);
                moved = Some(id);
            }
        }

        self.entity_count -= 1;
        moved
    }

    /// Returns the bytes of component `id` in row `index`.
    ///
    /// `None` if the component is not part of this layout or the row is not
    /// occupied.
    #[must_use]
    pub fn component_bytes(&self, index: u32, id: ComponentId) -> Option<&[u8]> {
        let descriptor = self.layout.component_descriptor(id)?;
        self.slot(index, descriptor)
    }

    /// Mutable variant of [`Self::component_bytes`].
    pub fn component_bytes_mut(&mut self, index: u32, id: ComponentId) -> Option<&mut [u8]> {
        let descriptor = *self.layout.component_descriptor(id)?;
        self.slot_mut(index, &descriptor)
    }

    /// Returns the bytes for an already resolved descriptor.
    ///
    /// `None` if the descriptor does not belong to this layout.
    #[must_use]
    pub fn descriptor_bytes(&self, index: u32, descriptor: &ComponentDescriptor) -> Option<&[u8]> {
        if self.layout.component_descriptor(descriptor.id) != Some(descriptor) {
            return None;
        }
        self.slot(index, descriptor)
    }

    /// Mutable variant of [`Self::descriptor_bytes`].
    pub fn descriptor_bytes_mut(
        &mut self,
        index: u32,
        descriptor: &ComponentDescriptor,
    ) -> Option<&mut [u8]> {
        if self.layout.component_descriptor(descriptor.id) != Some(descriptor) {
            return None;
        }
        self.slot_mut(index, descriptor)
    }

    /// Reads component `C` of row `index`.
    #[must_use]
    pub fn get<C: Component>(&self, index: u32) -> Option<C> {
        let bytes = self.component_bytes(index, C::id())?;
        (bytes.len() == std::mem::size_of::<C>()).then(|| bytemuck::pod_read_unaligned(bytes))
    }

    /// Overwrites component `C` of row `index`.
    ///
    /// # Returns
    ///
    /// `true` if the component was set, `false` if it is absent or the row
    /// is not occupied.
    pub fn set<C: Component>(&mut self, index: u32, value: C) -> bool {
        match self.component_bytes_mut(index, C::id()) {
            Some(bytes) if bytes.len() == std::mem::size_of::<C>() => {
                bytes.copy_from_slice(bytemuck::bytes_of(&value));
                true
            }
            _ => false,
        }
    }

    /// Typed view over the occupied part of the `C` array.
    #[must_use]
    pub fn column<C: Component>(&self) -> Option<Column<'_, C>> {
        let descriptor = self.column_descriptor::<C>()?;
        let len = self.entity_count as usize;
        let bytes = self
            .memory
            .bytes(descriptor.offset as usize, descriptor.size as usize * len)?;
        Some(Column::new(bytes, len))
    }

    /// Mutable typed view over the occupied part of the `C` array.
    pub fn column_mut<C: Component>(&mut self) -> Option<ColumnMut<'_, C>> {
        let descriptor = self.column_descriptor::<C>()?;
        let len = self.entity_count as usize;
        let bytes = self
            .memory
            .bytes_mut(descriptor.offset as usize, descriptor.size as usize * len)?;
        Some(ColumnMut::new(bytes, len))
    }

    /// Reads the entity record of row `index`.
    #[inline]
    #[must_use]
    pub fn entity_record(&self, index: u32) -> Option<EntityRecord> {
        self.get::<EntityRecord>(index)
    }

    /// Returns the entity occupying row `index`.
    #[inline]
    #[must_use]
    pub fn entity_id(&self, index: u32) -> Option<EntityId> {
        self.entity_record(index).map(|record| record.entity())
    }

    /// Iterates over the entities of the occupied rows in row order.
    pub fn entity_ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        (0..self.entity_count).filter_map(|index| self.entity_id(index))
    }

    fn column_descriptor<C: Component>(&self) -> Option<ComponentDescriptor> {
        let descriptor = *self.layout.component_descriptor(C::id())?;
        (descriptor.size as usize == std::mem::size_of::<C>()).then_some(descriptor)
    }

    fn slot(&self, index: u32, descriptor: &ComponentDescriptor) -> Option<&[u8]> {
        if index >= self.entity_count {
            return None;
        }
        self.memory
            .bytes(descriptor.element_offset(index), descriptor.size as usize)
    }

    fn slot_mut(&mut self, index: u32, descriptor: &ComponentDescriptor) -> Option<&mut [u8]> {
        if index >= self.entity_count {
            return None;
        }
        self.memory
            .bytes_mut(descriptor.element_offset(index), descriptor.size as usize)
    }
}

impl std::fmt::Debug for Chunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunk")
            .field("chunk_ref", &self.chunk_ref)
            .field("entity_count", &self.entity_count)
            .field("capacity", &self.capacity())
            .finish()
    }
}
