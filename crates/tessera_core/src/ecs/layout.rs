//! # Component Layout
//!
//! Describes how one archetype's component arrays are packed inside a
//! fixed-size chunk.
//!
//! ## Memory Layout
//!
//! Structure of Arrays, one array per component kind in identity order,
//! each array holding `max_entity_count` tightly packed elements:
//!
//! ```text
//! offset 0                 A.size * N              + B.size * N
//! | A0 A1 A2 ... A(N-1) | B0 B1 B2 ... B(N-1) | C0 C1 ... C(N-1) | slack |
//! ```
//!
//! where `N = floor(chunk_size / row_size)` and `row_size` is the sum of all
//! component sizes.

use std::fmt::Display;

use super::component::{Component, ComponentId, EntityRecord};

/// Maximum number of distinct component kinds in one layout.
pub const MAX_COMPONENTS: usize = 16;

const FNV_PRIME: u64 = 0x0000_0100_0000_01B3;
const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;

/// Identifies an archetype: the hash of its sorted component identities.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct ArchetypeId(u64);

impl ArchetypeId {
    /// Wraps a raw hash value.
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw hash value.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl Display for ArchetypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ArchetypeId({:#018x})", self.0)
    }
}

/// Locates one component array inside a chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ComponentDescriptor {
    /// Component kind.
    pub id: ComponentId,
    /// Byte offset of the array from the start of the chunk.
    pub offset: u32,
    /// Byte size of one element.
    pub size: u32,
}

impl ComponentDescriptor {
    const EMPTY: Self = Self {
        id: ComponentId::from_raw(0),
        offset: 0,
        size: 0,
    };

    /// Byte offset of the element for row `index`.
    #[inline]
    #[must_use]
    pub const fn element_offset(&self, index: u32) -> usize {
        self.offset as usize + self.size as usize * index as usize
    }
}

/// Ordered, fixed-capacity set of component descriptors for one archetype.
///
/// Descriptors are kept sorted by identity after every mutation. Each
/// mutation re-derives `max_entity_count`, all offsets and the layout hash.
///
/// # Example
///
/// ```rust
/// use tessera_core::{ComponentId, ComponentLayout};
///
/// let mut layout = ComponentLayout::new(16 * 1024);
/// assert!(layout.add_component(ComponentId::from_raw(1), 4));
/// assert!(layout.add_component(ComponentId::from_raw(2), 8));
/// assert!(layout.add_component(ComponentId::from_raw(3), 16));
///
/// assert_eq!(layout.max_entity_count(), 585);
/// let offsets: Vec<u32> = layout.descriptors().iter().map(|d| d.offset).collect();
/// assert_eq!(offsets, [0, 2340, 6960]);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComponentLayout {
    /// Descriptor slots; `..count` are in use and sorted.
    descriptors: [ComponentDescriptor; MAX_COMPONENTS],
    /// Number of slots in use.
    count: usize,
    /// Byte size of every chunk built against this layout.
    chunk_size: u32,
    /// Rows that fit in one chunk.
    max_entity_count: u32,
    /// Fold of the sorted identities.
    hash: ArchetypeId,
}

impl ComponentLayout {
    /// Creates an empty layout for chunks of `chunk_size` bytes.
    ///
    /// # Panics
    ///
    /// Panics if `chunk_size` is zero or exceeds `u32::MAX`.
    #[must_use]
    pub fn new(chunk_size: usize) -> Self {
        assert!(chunk_size > 0, "Chunk size must be greater than zero");
        let chunk_size = u32::try_from(chunk_size).expect("Chunk size cannot exceed u32::MAX");
        Self {
            descriptors: [ComponentDescriptor::EMPTY; MAX_COMPONENTS],
            count: 0,
            chunk_size,
            max_entity_count: 0,
            hash: ArchetypeId(0),
        }
    }

    /// Creates a layout that already carries the [`EntityRecord`] component.
    #[must_use]
    pub fn with_entity_record(chunk_size: usize) -> Self {
        let mut layout = Self::new(chunk_size);
        layout.add::<EntityRecord>();
        layout
    }

    /// Builds a layout from several components, deriving offsets once.
    ///
    /// Identities already present are skipped.
    ///
    /// # Panics
    ///
    /// Panics on more than [`MAX_COMPONENTS`] distinct kinds or if the row
    /// does not fit in `chunk_size`.
    #[must_use]
    pub fn from_components(
        chunk_size: usize,
        components: impl IntoIterator<Item = (ComponentId, u32)>,
    ) -> Self {
        let mut layout = Self::new(chunk_size);
        for (id, size) in components {
            layout.insert_sorted(id, size);
        }
        layout.rebuild();
        layout
    }

    /// Adds a component kind.
    ///
    /// Returns `false` if `id` is already present.
    ///
    /// Must only be called before any chunk is built against this layout:
    /// every offset moves.
    ///
    /// # Panics
    ///
    /// Panics if the layout already holds [`MAX_COMPONENTS`] kinds or if the
    /// widened row no longer fits in one chunk.
    pub fn add_component(&mut self, id: ComponentId, size: u32) -> bool {
        if !self.insert_sorted(id, size) {
            return false;
        }
        self.rebuild();
        tracing::trace!(component = id.raw(), size, hash = self.hash.raw(), "component added to layout");
        true
    }

    /// Adds the component kind of `T`. See [`Self::add_component`].
    pub fn add<T: Component>(&mut self) -> bool {
        self.add_component(T::id(), T::size())
    }

    /// Removes a component kind.
    ///
    /// Returns `false` if `id` is not present.
    pub fn remove_component(&mut self, id: ComponentId) -> bool {
        let Ok(position) = self.descriptors().binary_search_by_key(&id, |d| d.id) else {
            return false;
        };
        self.descriptors.copy_within(position + 1..self.count, position);
        self.count -= 1;
        self.descriptors[self.count] = ComponentDescriptor::EMPTY;
        self.rebuild();
        tracing::trace!(component = id.raw(), hash = self.hash.raw(), "component removed from layout");
        true
    }

    /// Removes the component kind of `T`. See [`Self::remove_component`].
    pub fn remove<T: Component>(&mut self) -> bool {
        self.remove_component(T::id())
    }

    /// Looks up the descriptor for `id` by binary search.
    #[inline]
    #[must_use]
    pub fn component_descriptor(&self, id: ComponentId) -> Option<&ComponentDescriptor> {
        let descriptors = self.descriptors();
        descriptors
            .binary_search_by_key(&id, |d| d.id)
            .ok()
            .map(|position| &descriptors[position])
    }

    /// Checks if the layout holds `id`.
    #[inline]
    #[must_use]
    pub fn contains(&self, id: ComponentId) -> bool {
        self.component_descriptor(id).is_some()
    }

    /// Returns the descriptors in identity order.
    #[inline]
    #[must_use]
    pub fn descriptors(&self) -> &[ComponentDescriptor] {
        &self.descriptors[..self.count]
    }

    /// Iterates over the component identities in order.
    pub fn component_ids(&self) -> impl Iterator<Item = ComponentId> + '_ {
        self.descriptors().iter().map(|d| d.id)
    }

    /// Returns the number of component kinds.
    #[inline]
    #[must_use]
    pub const fn component_count(&self) -> usize {
        self.count
    }

    /// Checks if the layout holds no component kinds.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Returns the chunk size in bytes.
    #[inline]
    #[must_use]
    pub const fn chunk_size(&self) -> usize {
        self.chunk_size as usize
    }

    /// Returns how many rows fit in one chunk (0 for an empty layout).
    #[inline]
    #[must_use]
    pub const fn max_entity_count(&self) -> u32 {
        self.max_entity_count
    }

    /// Returns the byte size of one row (all components of one entity).
    #[must_use]
    pub fn row_size(&self) -> u32 {
        // Bounded by chunk_size once the layout has been rebuilt.
        u32::try_from(self.row_bytes()).unwrap_or(u32::MAX)
    }

    /// Returns the layout hash identifying this archetype.
    #[inline]
    #[must_use]
    pub const fn hash(&self) -> ArchetypeId {
        self.hash
    }

    /// Inserts a descriptor in sorted position without re-deriving offsets.
    fn insert_sorted(&mut self, id: ComponentId, size: u32) -> bool {
        let Err(position) = self.descriptors().binary_search_by_key(&id, |d| d.id) else {
            return false;
        };
        assert!(
            self.count < MAX_COMPONENTS,
            "Layout cannot hold more than {MAX_COMPONENTS} component kinds"
        );
        self.descriptors.copy_within(position..self.count, position + 1);
        self.descriptors[position] = ComponentDescriptor { id, offset: 0, size };
        self.count += 1;
        true
    }

    /// Re-derives capacity, offsets and hash.
    fn rebuild(&mut self) {
        self.recalculate_offsets();
        self.update_hash();
    }

    /// Sum of all component sizes, without wrapping.
    fn row_bytes(&self) -> u64 {
        self.descriptors().iter().map(|d| u64::from(d.size)).sum()
    }

    fn recalculate_offsets(&mut self) {
        let row_size = self.row_bytes();
        if row_size == 0 {
            // No bytes per row yet: nothing can be placed.
            self.max_entity_count = 0;
            for descriptor in &mut self.descriptors[..self.count] {
                descriptor.offset = 0;
            }
            return;
        }

        let chunk_size = u64::from(self.chunk_size);
        assert!(
            row_size <= chunk_size,
            "Row of {row_size} bytes does not fit in a chunk of {chunk_size} bytes"
        );
        let max_entity_count = chunk_size / row_size;
        // At least 1 and bounded by chunk_size, which is a u32.
        self.max_entity_count = max_entity_count as u32;

        let mut offset = 0u64;
        for descriptor in &mut self.descriptors[..self.count] {
            // offset stays below chunk_size: max_entity_count * row_size <= chunk_size.
            descriptor.offset = offset as u32;
            offset += u64::from(descriptor.size) * max_entity_count;
        }
        debug_assert!(offset <= chunk_size);
    }

    fn update_hash(&mut self) {
        let mut hash = 0u64;
        for descriptor in self.descriptors() {
            hash = fold_pair(hash, descriptor.id.raw());
        }
        self.hash = ArchetypeId(hash);
    }
}

/// FNV-1a over the little-endian bytes of `(hash, id)`.
fn fold_pair(hash: u64, id: u64) -> u64 {
    let mut state = FNV_OFFSET;
    for byte in hash.to_le_bytes().into_iter().chain(id.to_le_bytes()) {
        state ^= u64::from(byte);
        state = state.wrapping_mul(FNV_PRIME);
    }
    state
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: u64) -> ComponentId {
        ComponentId::from_raw(raw)
    }

    fn assert_packed(layout: &ComponentLayout) {
        let descriptors = layout.descriptors();
        assert!(descriptors.windows(2).all(|w| w[0].id < w[1].id));
        let n = layout.max_entity_count();
        let mut expected = 0;
        for d in descriptors {
            assert_eq!(d.offset, expected);
            expected += d.size * n;
        }
        assert!(expected as usize <= layout.chunk_size());
    }

    #[test]
    fn test_reference_offsets() {
        let mut layout = ComponentLayout::new(16384);
        // Inserted out of order; sorted by identity.
        assert!(layout.add_component(id(30), 16));
        assert!(layout.add_component(id(10), 4));
        assert!(layout.add_component(id(20), 8));

        assert_eq!(layout.row_size(), 28);
        assert_eq!(layout.max_entity_count(), 585);
        let offsets: Vec<_> = layout.descriptors().iter().map(|d| (d.id, d.offset)).collect();
        assert_eq!(offsets, [(id(10), 0), (id(20), 2340), (id(30), 6960)]);
        assert_packed(&layout);
    }

    #[test]
    fn test_duplicate_and_missing() {
        let mut layout = ComponentLayout::new(1024);
        assert!(layout.add_component(id(1), 4));
        assert!(!layout.add_component(id(1), 8));
        assert!(!layout.remove_component(id(2)));
        assert_eq!(layout.component_count(), 1);
    }

    #[test]
    fn test_lookup() {
        let layout = ComponentLayout::from_components(1024, [(id(5), 4), (id(1), 2), (id(9), 8)]);
        let d = layout.component_descriptor(id(5)).unwrap();
        assert_eq!(d.size, 4);
        assert_eq!(d.offset, 2 * layout.max_entity_count());
        assert!(layout.component_descriptor(id(4)).is_none());
        assert!(layout.component_descriptor(id(10)).is_none());
    }

    #[test]
    fn test_hash_roundtrip() {
        let mut layout = ComponentLayout::from_components(4096, [(id(3), 4), (id(7), 12)]);
        let before = layout.hash();

        assert!(layout.add_component(id(5), 8));
        assert_ne!(layout.hash(), before);
        assert!(layout.remove_component(id(5)));
        assert_eq!(layout.hash(), before);
        assert_packed(&layout);
    }

    #[test]
    fn test_hash_ignores_insertion_order() {
        let a = ComponentLayout::from_components(4096, [(id(1), 4), (id(2), 4), (id(3), 4)]);
        let mut b = ComponentLayout::new(4096);
        b.add_component(id(3), 4);
        b.add_component(id(1), 4);
        b.add_component(id(2), 4);
        assert_eq!(a.hash(), b.hash());
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_layout() {
        let mut layout = ComponentLayout::new(64);
        assert_eq!(layout.hash(), ArchetypeId::from_raw(0));
        assert_eq!(layout.max_entity_count(), 0);

        layout.add_component(id(1), 8);
        layout.remove_component(id(1));
        assert!(layout.is_empty());
        assert_eq!(layout.max_entity_count(), 0);
        assert_eq!(layout.hash(), ArchetypeId::from_raw(0));
    }

    #[test]
    fn test_random_mutations_stay_packed() {
        let mut layout = ComponentLayout::new(16384);
        let mut state = 0x2545_F491_4F6C_DD1Du64;
        for _ in 0..500 {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            let raw = state % 24;
            let size = (state >> 8) as u32 % 32 + 1;
            if state & 1 == 0 || layout.component_count() == MAX_COMPONENTS {
                layout.remove_component(id(raw));
            } else {
                layout.add_component(id(raw), size);
            }
            assert_packed(&layout);
        }
    }

    #[test]
    #[should_panic(expected = "cannot hold more than 16")]
    fn test_seventeenth_component_panics() {
        let mut layout = ComponentLayout::new(16384);
        for raw in 0..17 {
            layout.add_component(id(raw), 1);
        }
    }

    #[test]
    #[should_panic(expected = "does not fit")]
    fn test_oversized_row_panics() {
        let mut layout = ComponentLayout::new(64);
        layout.add_component(id(1), 65);
    }

    #[test]
    #[should_panic(expected = "does not fit")]
    fn test_row_size_sum_does_not_wrap() {
        let mut layout = ComponentLayout::new(16384);
        assert!(layout.add_component(id(1), 24));
        layout.add_component(id(2), u32::MAX - 10);
    }

    #[test]
    fn test_row_size_reports_full_width() {
        let layout = ComponentLayout::from_components(16384, [(id(1), 24), (id(2), 40)]);
        assert_eq!(layout.row_size(), 64);
        assert_eq!(layout.max_entity_count(), 256);
        let offsets: Vec<_> = layout.descriptors().iter().map(|d| d.offset).collect();
        assert_eq!(offsets, [0, 24 * 256]);
    }

    #[test]
    fn test_entity_record_layout() {
        let layout = ComponentLayout::with_entity_record(16384);
        assert!(layout.contains(EntityRecord::id()));
        assert_eq!(layout.row_size(), 24);
    }
}
