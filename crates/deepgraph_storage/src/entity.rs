//! Entity lifecycle management with never-reused identities.
//!
//! The `EntityStore` allocates identities from a monotonically increasing
//! counter and records which entity type each live identity belongs to.

use std::sync::Arc;

use deepgraph_foundation::{EntityId, Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Manages entity allocation and type membership.
///
/// Deleted identities are never handed out again, so a stale reference can
/// only ever fail to resolve; it cannot point at a different entity.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EntityStore {
    /// Next raw identity to hand out. Identity 0 is never allocated.
    next: u64,
    /// Live entities and their type names.
    live: im::OrdMap<EntityId, Arc<str>>,
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityStore {
    /// Creates a new empty entity store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next: 1,
            live: im::OrdMap::new(),
        }
    }

    /// Spawns a new entity of `entity_type`, returns its ID.
    pub fn spawn(&mut self, entity_type: &str) -> EntityId {
        let id = EntityId::new(self.next);
        self.next += 1;
        self.live.insert(id, Arc::from(entity_type));
        id
    }

    /// Destroys an entity.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is not live.
    pub fn destroy(&mut self, id: EntityId) -> Result<()> {
        self.live
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| Error::entity_not_found(id))
    }

    /// Checks if an entity is live.
    #[must_use]
    pub fn exists(&self, id: EntityId) -> bool {
        self.live.contains_key(&id)
    }

    /// Validates that an entity is live.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity was never allocated or was destroyed.
    pub fn validate(&self, id: EntityId) -> Result<()> {
        if self.exists(id) {
            Ok(())
        } else {
            Err(Error::entity_not_found(id))
        }
    }

    /// Returns the type name of a live entity.
    #[must_use]
    pub fn type_of(&self, id: EntityId) -> Option<&Arc<str>> {
        self.live.get(&id)
    }

    /// Returns the total number of live entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live.len()
    }

    /// Returns true if there are no live entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Iterates over all live entity IDs in allocation order.
    pub fn iter(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.live.keys().copied()
    }

    /// Iterates over live entities of one type in allocation order.
    pub fn iter_type<'a>(&'a self, entity_type: &'a str) -> impl Iterator<Item = EntityId> + 'a {
        self.live
            .iter()
            .filter(move |(_, t)| t.as_ref() == entity_type)
            .map(|(id, _)| *id)
    }

    /// Returns the raw value the next spawn will use.
    #[must_use]
    pub fn next_raw(&self) -> u64 {
        self.next
    }
}
