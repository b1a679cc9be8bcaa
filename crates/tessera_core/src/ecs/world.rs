//! # Archetype World
//!
//! A minimal entity manager on top of the chunk lists.
//!
//! [`EntityDirectory`] maps entity ids to their current row. Each chunk list
//! keeps it current through an observer, so ids stay valid while rows move.
//! [`ArchetypeWorld`] owns one chunk list per archetype and moves entities
//! between them when components are inserted or removed.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::chunk_list::ChunkList;
use super::component::{Component, ComponentId, EntityRecord};
use super::entity::{EntityAddress, EntityId};
use super::layout::{ArchetypeId, ComponentLayout};
use super::observer::AddressObserver;
use crate::config::StorageConfig;
use crate::error::{StorageError, StorageResult};

/// One directory entry.
#[derive(Clone, Copy, Debug)]
struct Slot {
    /// Generation of the current (or next) occupant.
    generation: u32,
    /// Whether the slot is occupied.
    alive: bool,
    /// Row of the occupant, once placed.
    address: Option<EntityAddress>,
}

/// Slot table from entity ids to row addresses.
///
/// Released indices are recycled with a bumped generation, so ids held
/// past despawn are detected as dead.
#[derive(Debug, Default)]
pub struct EntityDirectory {
    /// Slots indexed by [`EntityId::index`].
    slots: Vec<Slot>,
    /// Released indices for reuse.
    free_indices: Vec<u32>,
    /// Number of currently alive entities.
    alive_count: usize,
}

/// Directory shared between a world and the observers of its chunk lists.
pub type SharedDirectory = Arc<Mutex<EntityDirectory>>;

impl EntityDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty directory behind a shared lock.
    #[must_use]
    pub fn shared() -> SharedDirectory {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Builds an observer that records every address change in `directory`.
    pub fn observer(directory: &SharedDirectory) -> impl AddressObserver + 'static {
        let directory = Arc::clone(directory);
        move |id: EntityId, address: EntityAddress| {
            if !directory.lock().update(id, address) {
                tracing::warn!(entity = id.to_bits(), "address change for dead entity");
            }
        }
    }

    /// Allocates a fresh entity id, reusing a released index when possible.
    ///
    /// # Panics
    ///
    /// Panics if all `u32::MAX` indices are in use.
    pub fn allocate(&mut self) -> EntityId {
        let index = if let Some(index) = self.free_indices.pop() {
            index
        } else {
            let index = u32::try_from(self.slots.len())
                .ok()
                .filter(|&index| index != u32::MAX);
            let Some(index) = index else {
                panic!("Entity index space exhausted");
            };
            self.slots.push(Slot {
                generation: 0,
                alive: false,
                address: None,
            });
            index
        };

        let slot = &mut self.slots[index as usize];
        slot.alive = true;
        slot.address = None;
        self.alive_count += 1;
        EntityId::new(index, slot.generation)
    }

    /// Releases `id`, freeing its index for reuse.
    ///
    /// # Returns
    ///
    /// `true` if the entity was alive.
    pub fn release(&mut self, id: EntityId) -> bool {
        let Some(slot) = self.live_slot_mut(id) else {
            return false;
        };
        slot.alive = false;
        slot.address = None;
        // Invalidate outstanding copies of the id.
        slot.generation = slot.generation.wrapping_add(1);
        self.free_indices.push(id.index());
        self.alive_count -= 1;
        true
    }

    /// Returns the current row of `id`, if alive and placed.
    #[must_use]
    pub fn locate(&self, id: EntityId) -> Option<EntityAddress> {
        self.live_slot(id).and_then(|slot| slot.address)
    }

    /// Records the new row of `id`.
    ///
    /// Returns `false` if the entity is not alive.
    pub fn update(&mut self, id: EntityId, address: EntityAddress) -> bool {
        match self.live_slot_mut(id) {
            Some(slot) => {
                slot.address = Some(address);
                true
            }
            None => false,
        }
    }

    /// Checks if `id` refers to a live entity.
    #[inline]
    #[must_use]
    pub fn is_alive(&self, id: EntityId) -> bool {
        self.live_slot(id).is_some()
    }

    /// Returns the number of alive entities.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.alive_count
    }

    /// Checks if no entity is alive.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.alive_count == 0
    }

    fn live_slot(&self, id: EntityId) -> Option<&Slot> {
        self.slots
            .get(id.index() as usize)
            .filter(|slot| slot.alive && slot.generation == id.generation())
    }

    fn live_slot_mut(&mut self, id: EntityId) -> Option<&mut Slot> {
        self.slots
            .get_mut(id.index() as usize)
            .filter(|slot| slot.alive && slot.generation == id.generation())
    }
}

/// Entities grouped by archetype, one chunk list each.
///
/// # Example
///
/// ```rust
/// use bytemuck::{Pod, Zeroable};
/// use tessera_core::{ArchetypeWorld, Component, StorageConfig};
///
/// #[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
/// #[repr(C)]
/// struct Position([f32; 3]);
///
/// impl Component for Position {}
///
/// let mut world = ArchetypeWorld::new(StorageConfig::default()).unwrap();
/// let entity = world.spawn(&[]).unwrap();
/// world.insert(entity, Position([1.0, 2.0, 3.0])).unwrap();
///
/// assert_eq!(world.get::<Position>(entity), Some(Position([1.0, 2.0, 3.0])));
/// assert_eq!(world.archetype_count(), 2);
/// ```
pub struct ArchetypeWorld {
    /// Chunk size for archetypes created by the world.
    config: StorageConfig,
    /// Id to address mapping, fed by the chunk lists.
    directory: SharedDirectory,
    /// One list per archetype, in creation order.
    lists: Vec<ChunkList>,
    /// Archetype to index in `lists`.
    archetypes: HashMap<ArchetypeId, usize>,
}

impl ArchetypeWorld {
    /// Creates an empty world.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidConfig`] if `config` is invalid.
    pub fn new(config: StorageConfig) -> StorageResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            directory: EntityDirectory::shared(),
            lists: Vec::new(),
            archetypes: HashMap::new(),
        })
    }

    /// Spawns an entity with the given components.
    ///
    /// Component bytes start out however the chunk left them; write them
    /// with [`Self::set`] or through the chunk list.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::AllocationFailed`] if chunk memory runs out.
    ///
    /// # Panics
    ///
    /// Panics if the components exceed the layout capacity.
    pub fn spawn(&mut self, components: &[(ComponentId, u32)]) -> StorageResult<EntityId> {
        let layout = ComponentLayout::from_components(
            self.config.chunk_size,
            components
                .iter()
                .copied()
                .chain([(EntityRecord::id(), EntityRecord::size())]),
        );
        self.spawn_layout(layout)
    }

    /// Spawns an entity into the archetype described by `layout`.
    ///
    /// An archetype already registered under the same hash is reused as is.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::AllocationFailed`] if chunk memory runs out.
    pub fn spawn_layout(&mut self, layout: ComponentLayout) -> StorageResult<EntityId> {
        let list = self.list_for(layout)?;
        let id = self.directory.lock().allocate();
        if let Err(error) = self.lists[list].add_entity(id, None) {
            self.directory.lock().release(id);
            return Err(error);
        }
        Ok(id)
    }

    /// Removes an entity and all its components.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NoSuchEntity`] if `id` is not alive.
    pub fn despawn(&mut self, id: EntityId) -> StorageResult<()> {
        let address = self.address(id)?;
        let list = self.list_index(address.chunk.archetype)?;
        self.lists[list].remove_entity(address)?;
        self.directory.lock().release(id);
        Ok(())
    }

    /// Sets component `C` on `id`, moving the entity to a wider archetype
    /// if it does not have `C` yet.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NoSuchEntity`] if `id` is not alive, or
    /// [`StorageError::AllocationFailed`] if chunk memory runs out.
    pub fn insert<C: Component>(&mut self, id: EntityId, value: C) -> StorageResult<()> {
        let mut address = self.address(id)?;
        let list = self.list_index(address.chunk.archetype)?;

        if !self.lists[list].layout().contains(C::id()) {
            let mut layout = self.lists[list].layout().clone();
            layout.add::<C>();
            address = self.migrate(id, address, layout)?;
        }

        let list = self.list_index(address.chunk.archetype)?;
        self.lists[list].set(address, value);
        Ok(())
    }

    /// Removes component `C` from `id`, moving the entity to a narrower
    /// archetype.
    ///
    /// # Returns
    ///
    /// `false` if the entity did not have `C`. The entity record cannot be
    /// removed.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NoSuchEntity`] if `id` is not alive, or
    /// [`StorageError::AllocationFailed`] if chunk memory runs out.
    pub fn remove<C: Component>(&mut self, id: EntityId) -> StorageResult<bool> {
        let address = self.address(id)?;
        let list = self.list_index(address.chunk.archetype)?;

        let layout = self.lists[list].layout();
        if C::id() == EntityRecord::id() || !layout.contains(C::id()) {
            return Ok(false);
        }
        let mut layout = layout.clone();
        layout.remove::<C>();
        self.migrate(id, address, layout)?;
        Ok(true)
    }

    /// Reads component `C` of `id`.
    ///
    /// `None` if the entity is dead or lacks `C`.
    #[must_use]
    pub fn get<C: Component>(&self, id: EntityId) -> Option<C> {
        let address = self.locate(id)?;
        self.chunk_list(address.chunk.archetype)?.get(address)
    }

    /// Overwrites component `C` of `id`.
    ///
    /// # Returns
    ///
    /// `false` if the entity lacks `C`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NoSuchEntity`] if `id` is not alive.
    pub fn set<C: Component>(&mut self, id: EntityId, value: C) -> StorageResult<bool> {
        let address = self.address(id)?;
        let list = self.list_index(address.chunk.archetype)?;
        Ok(self.lists[list].set(address, value))
    }

    /// Returns the current row of `id`.
    #[must_use]
    pub fn locate(&self, id: EntityId) -> Option<EntityAddress> {
        self.directory.lock().locate(id)
    }

    /// Returns the archetype `id` currently belongs to.
    #[must_use]
    pub fn archetype_of(&self, id: EntityId) -> Option<ArchetypeId> {
        self.locate(id).map(|address| address.chunk.archetype)
    }

    /// Checks if `id` refers to a live entity.
    #[must_use]
    pub fn is_alive(&self, id: EntityId) -> bool {
        self.directory.lock().is_alive(id)
    }

    /// Returns the number of archetypes created so far.
    #[inline]
    #[must_use]
    pub fn archetype_count(&self) -> usize {
        self.lists.len()
    }

    /// Returns the chunk list of `archetype`.
    #[must_use]
    pub fn chunk_list(&self, archetype: ArchetypeId) -> Option<&ChunkList> {
        self.archetypes.get(&archetype).map(|&list| &self.lists[list])
    }

    /// Mutable variant of [`Self::chunk_list`].
    pub fn chunk_list_mut(&mut self, archetype: ArchetypeId) -> Option<&mut ChunkList> {
        self.archetypes
            .get(&archetype)
            .map(|&list| &mut self.lists[list])
    }

    /// Iterates over all chunk lists in creation order.
    pub fn chunk_lists(&self) -> impl Iterator<Item = &ChunkList> + '_ {
        self.lists.iter()
    }

    /// Returns the number of alive entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.directory.lock().len()
    }

    /// Checks if no entity is alive.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the shared entity directory.
    #[inline]
    #[must_use]
    pub const fn directory(&self) -> &SharedDirectory {
        &self.directory
    }

    /// Returns the world configuration.
    #[inline]
    #[must_use]
    pub const fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Moves `id` from the row at `from` into the archetype of `layout`.
    fn migrate(
        &mut self,
        id: EntityId,
        from: EntityAddress,
        layout: ComponentLayout,
    ) -> StorageResult<EntityAddress> {
        let target = self.list_for(layout)?;
        let source = self.list_index(from.chunk.archetype)?;
        let (source, target) = pair_mut(&mut self.lists, source, target);

        let to = target.add_entity(id, Some(source.row(from)?))?;
        source.remove_entity(from)?;
        tracing::trace!(
            entity = id.to_bits(),
            from = from.chunk.archetype.raw(),
            to = to.chunk.archetype.raw(),
            "entity migrated"
        );
        Ok(to)
    }

    /// Returns the list for `layout`, creating it on first use.
    fn list_for(&mut self, mut layout: ComponentLayout) -> StorageResult<usize> {
        if !layout.contains(EntityRecord::id()) {
            layout.add::<EntityRecord>();
        }
        let archetype = layout.hash();
        if let Some(&list) = self.archetypes.get(&archetype) {
            return Ok(list);
        }

        let list = ChunkList::new(layout, EntityDirectory::observer(&self.directory))?;
        let index = self.lists.len();
        self.lists.push(list);
        self.archetypes.insert(archetype, index);
        tracing::debug!(archetype = archetype.raw(), index, "archetype created");
        Ok(index)
    }

    fn list_index(&self, archetype: ArchetypeId) -> StorageResult<usize> {
        self.archetypes
            .get(&archetype)
            .copied()
            .ok_or(StorageError::NoSuchArchetype(archetype))
    }

    fn address(&self, id: EntityId) -> StorageResult<EntityAddress> {
        self.locate(id).ok_or(StorageError::NoSuchEntity(id))
    }
}

impl std::fmt::Debug for ArchetypeWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchetypeWorld")
            .field("config", &self.config)
            .field("archetypes", &self.lists.len())
            .field("entities", &self.len())
            .finish_non_exhaustive()
    }
}

/// Borrows two distinct lists mutably.
fn pair_mut(lists: &mut [ChunkList], a: usize, b: usize) -> (&mut ChunkList, &mut ChunkList) {
    assert_ne!(a, b, "Migration source and target are the same archetype");
    if a < b {
        let (left, right) = lists.split_at_mut(b);
        (&mut left[a], &mut right[0])
    } else {
        let (left, right) = lists.split_at_mut(a);
        (&mut right[0], &mut left[b])
    }
}

#[cfg(test)]
mod tests {
    use bytemuck::{Pod, Zeroable};

    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
    #[repr(C)]
    struct Hp(u32);

    impl Component for Hp {}

    #[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
    #[repr(C)]
    struct Armor(u16);

    impl Component for Armor {}

    fn world() -> ArchetypeWorld {
        ArchetypeWorld::new(StorageConfig::with_chunk_size(1024)).unwrap()
    }

    #[test]
    fn test_directory_recycles_with_new_generation() {
        let mut directory = EntityDirectory::new();
        let a = directory.allocate();
        assert!(directory.is_alive(a));
        assert!(directory.release(a));
        assert!(!directory.release(a));

        let b = directory.allocate();
        assert_eq!(b.index(), a.index());
        assert_eq!(b.generation(), a.generation() + 1);
        assert!(!directory.is_alive(a));
        assert_eq!(directory.len(), 1);
    }

    #[test]
    fn test_directory_ignores_dead_updates() {
        let mut directory = EntityDirectory::new();
        let id = directory.allocate();
        directory.release(id);
        let address = EntityAddress::new(
            crate::ecs::ChunkRef::new(ArchetypeId::from_raw(1), 0),
            0,
        );
        assert!(!directory.update(id, address));
        assert_eq!(directory.locate(id), None);
    }

    #[test]
    fn test_spawn_is_located() {
        let mut world = world();
        let id = world.spawn(&[(Hp::id(), Hp::size())]).unwrap();
        let address = world.locate(id).unwrap();
        assert_eq!(address.index, 0);
        assert_eq!(world.len(), 1);
        assert_eq!(world.archetype_of(id), Some(address.chunk.archetype));
    }

    #[test]
    fn test_despawn_keeps_directory_current() {
        let mut world = world();
        let ids: Vec<_> = (0..3)
            .map(|i| {
                let id = world.spawn(&[(Hp::id(), Hp::size())]).unwrap();
                assert!(world.set(id, Hp(i)).unwrap());
                id
            })
            .collect();

        world.despawn(ids[0]).unwrap();
        assert!(!world.is_alive(ids[0]));
        // The last row moved into the hole.
        assert_eq!(world.locate(ids[2]).unwrap().index, 0);
        assert_eq!(world.get::<Hp>(ids[2]), Some(Hp(2)));
        assert_eq!(world.get::<Hp>(ids[1]), Some(Hp(1)));
        assert_eq!(world.despawn(ids[0]), Err(StorageError::NoSuchEntity(ids[0])));
    }

    #[test]
    fn test_insert_and_remove_migrate() {
        let mut world = world();
        let id = world.spawn(&[(Hp::id(), Hp::size())]).unwrap();
        world.set(id, Hp(40)).unwrap();
        let narrow = world.archetype_of(id).unwrap();

        world.insert(id, Armor(3)).unwrap();
        let wide = world.archetype_of(id).unwrap();
        assert_ne!(narrow, wide);
        assert_eq!(world.get::<Hp>(id), Some(Hp(40)));
        assert_eq!(world.get::<Armor>(id), Some(Armor(3)));
        assert_eq!(world.chunk_list(narrow).unwrap().entity_count(), 0);

        assert!(world.remove::<Armor>(id).unwrap());
        assert!(!world.remove::<Armor>(id).unwrap());
        assert_eq!(world.archetype_of(id), Some(narrow));
        assert_eq!(world.get::<Armor>(id), None);
        assert_eq!(world.get::<Hp>(id), Some(Hp(40)));
        assert_eq!(world.archetype_count(), 2);
    }

    #[test]
    fn test_entity_record_cannot_be_removed() {
        let mut world = world();
        let id = world.spawn(&[]).unwrap();
        assert!(!world.remove::<EntityRecord>(id).unwrap());
        assert!(world.is_alive(id));
    }

    #[test]
    fn test_archetypes_are_deduplicated() {
        let mut world = world();
        let a = world.spawn(&[(Hp::id(), 4), (Armor::id(), 2)]).unwrap();
        let b = world.spawn(&[(Armor::id(), 2), (Hp::id(), 4)]).unwrap();
        assert_eq!(world.archetype_of(a), world.archetype_of(b));
        assert_eq!(world.archetype_count(), 1);
    }

    #[test]
    fn test_dead_entity_errors() {
        let mut world = world();
        let id = world.spawn(&[]).unwrap();
        world.despawn(id).unwrap();
        assert_eq!(world.insert(id, Hp(1)), Err(StorageError::NoSuchEntity(id)));
        assert_eq!(world.set(id, Hp(1)), Err(StorageError::NoSuchEntity(id)));
        assert_eq!(world.get::<Hp>(id), None);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let result = ArchetypeWorld::new(StorageConfig::with_chunk_size(0));
        assert!(matches!(result, Err(StorageError::InvalidConfig(_))));
    }
}
