//! # Address Notification
//!
//! The storage moves rows around (placement, migration, swap-remove). Every
//! time an entity's row moves, the observer handed to its chunk list is told
//! the new address, synchronously, before the mutating call returns.

use super::entity::{EntityAddress, EntityId};

/// Receives address changes from a chunk list.
///
/// Implemented for any `FnMut(EntityId, EntityAddress) + Send + Sync`.
pub trait AddressObserver: Send + Sync {
    /// Called once per affected entity with its new address.
    fn address_changed(&mut self, id: EntityId, address: EntityAddress);
}

impl<F> AddressObserver for F
where
    F: FnMut(EntityId, EntityAddress) + Send + Sync,
{
    #[inline]
    fn address_changed(&mut self, id: EntityId, address: EntityAddress) {
        self(id, address);
    }
}
