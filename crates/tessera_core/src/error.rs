//! # Storage Error Types
//!
//! Recoverable failures of the chunk storage.
//!
//! Capacity violations (a 17th component kind, a row wider than its chunk) and
//! entity identity mismatches are programming errors and panic instead.

use thiserror::Error;

use crate::ecs::{ArchetypeId, EntityId};

/// Errors that can occur in the chunk storage.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Chunk memory could not be acquired.
    #[error("chunk allocation failed: {bytes} bytes")]
    AllocationFailed {
        /// Size of the block that was requested.
        bytes: usize,
    },

    /// An address belonging to another chunk list was handed to this one.
    #[error("address belongs to archetype {found}, expected {expected}")]
    ForeignAddress {
        /// Archetype of the chunk list that received the address.
        expected: ArchetypeId,
        /// Archetype recorded in the address.
        found: ArchetypeId,
    },

    /// The address does not point at an occupied row.
    #[error("stale address: chunk {position}, row {index}")]
    StaleAddress {
        /// Chunk position in the chain.
        position: u32,
        /// Row index inside the chunk.
        index: u32,
    },

    /// The entity is not alive in the directory.
    #[error("no such entity: {0:?}")]
    NoSuchEntity(EntityId),

    /// No chunk list exists for the archetype.
    #[error("no such archetype: {0}")]
    NoSuchArchetype(ArchetypeId),

    /// Invalid configuration file.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
