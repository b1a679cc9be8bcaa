//! # Archetype Storage
//!
//! Entities with the same set of component kinds (an archetype) share one
//! [`ChunkList`]. Each list is a chain of fixed-size [`Chunk`]s holding the
//! component arrays in Structure of Arrays layout.
//!
//! ## Memory Layout
//!
//! ```text
//! ChunkList (archetype = hash of sorted component ids)
//! ├── Chunk 0: [records...] [A...] [B...]
//! ├── Chunk 1: [records...] [A...] [B...]
//! └── ...
//! ```
//!
//! Rows are moved on removal and migration; the [`AddressObserver`] handed
//! to each list is told every new address.

mod chunk;
mod chunk_list;
mod column;
mod component;
mod entity;
mod layout;
mod observer;
mod world;

pub use chunk::{Chunk, RowSource};
pub use chunk_list::ChunkList;
pub use column::{Column, ColumnMut};
pub use component::{Component, ComponentId, EntityRecord};
pub use entity::{ChunkRef, EntityAddress, EntityId};
pub use layout::{ArchetypeId, ComponentDescriptor, ComponentLayout, MAX_COMPONENTS};
pub use observer::AddressObserver;
pub use world::{ArchetypeWorld, EntityDirectory, SharedDirectory};
