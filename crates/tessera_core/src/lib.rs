//! # Tessera Core
//!
//! Archetype-based chunk storage for entity components.
//!
//! ## Architecture
//!
//! - **Layouts**: sorted component descriptors with packed array offsets
//! - **Chunks**: fixed-size blocks holding one archetype's rows
//! - **Chunk lists**: growable chains of chunks, one per archetype
//! - **Observers**: every row move is reported to the entity directory
//!
//! ## Safety
//!
//! The crate contains no `unsafe` code. Component bytes are read and
//! written through `bytemuck`, so components must be plain old data.
//!
//! ## Example
//!
//! ```rust
//! use tessera_core::{ChunkList, ComponentLayout, EntityAddress, EntityId, DEFAULT_CHUNK_SIZE};
//!
//! let layout = ComponentLayout::with_entity_record(DEFAULT_CHUNK_SIZE);
//! let mut list = ChunkList::new(layout, |id: EntityId, address: EntityAddress| {
//!     println!("{id:?} now at {address:?}");
//! })
//! .unwrap();
//!
//! let first = list.add_entity(EntityId::new(0, 0), None).unwrap();
//! list.add_entity(EntityId::new(1, 0), None).unwrap();
//! assert_eq!(list.remove_entity(first).unwrap(), Some(EntityId::new(1, 0)));
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod ecs;
pub mod error;
pub mod memory;

pub use config::{StorageConfig, DEFAULT_CHUNK_SIZE};
pub use ecs::{
    AddressObserver, ArchetypeId, ArchetypeWorld, Chunk, ChunkList, ChunkRef, Column, ColumnMut,
    Component, ComponentDescriptor, ComponentId, ComponentLayout, EntityAddress, EntityDirectory,
    EntityId, EntityRecord, RowSource, SharedDirectory, MAX_COMPONENTS,
};
pub use error::{StorageError, StorageResult};
