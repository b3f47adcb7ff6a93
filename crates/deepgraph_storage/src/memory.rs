//! In-memory store backed by immutable [`World`] snapshots.

use std::sync::Arc;

use deepgraph_foundation::{EntityId, Error, ErrorKind, Result};

use crate::adapter::EntityStoreAdapter;
use crate::registry::SchemaRegistry;
use crate::world::{Fields, World};

/// Entity store holding its state in memory.
///
/// Opening a transaction keeps a clone of the current world; rolling back
/// restores it. Clones share structure, so this costs little regardless of
/// how much is stored.
#[derive(Clone, Debug)]
pub struct MemoryStore {
    current: World,
    savepoints: Vec<World>,
    key_mutation: bool,
}

impl MemoryStore {
    /// Creates an empty store over `registry`.
    #[must_use]
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        Self::from_world(World::new(registry))
    }

    /// Creates a store holding an existing world.
    #[must_use]
    pub fn from_world(world: World) -> Self {
        Self {
            current: world,
            savepoints: Vec::new(),
            key_mutation: false,
        }
    }

    /// Allows or forbids changing unique-key fields of existing entities.
    #[must_use]
    pub fn with_key_mutation(mut self, allowed: bool) -> Self {
        self.key_mutation = allowed;
        self
    }

    /// Returns the current world, including uncommitted writes.
    #[must_use]
    pub fn world(&self) -> &World {
        &self.current
    }

    /// Consumes the store, returning the current world.
    #[must_use]
    pub fn into_world(self) -> World {
        self.current
    }

    /// Returns how many transactions are open.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.savepoints.len()
    }
}

impl EntityStoreAdapter for MemoryStore {
    fn registry(&self) -> Arc<SchemaRegistry> {
        Arc::clone(self.current.registry())
    }

    fn type_of(&self, entity: EntityId) -> Result<String> {
        self.current.type_of(entity).map(str::to_string)
    }

    fn exists(&self, entity: EntityId) -> bool {
        self.current.exists(entity)
    }

    fn fields(&self, entity: EntityId) -> Result<Fields> {
        self.current.fields(entity)
    }

    fn lookup(&self, entity_type: &str, criteria: &Fields) -> Result<Option<EntityId>> {
        self.current.lookup(entity_type, criteria)
    }

    fn find(&self, entity_type: &str, criteria: &Fields) -> Result<Vec<EntityId>> {
        self.current.find(entity_type, criteria)
    }

    fn create(&mut self, entity_type: &str, fields: &Fields) -> Result<EntityId> {
        let (world, id) = self.current.create(entity_type, fields)?;
        self.current = world;
        Ok(id)
    }

    fn update(&mut self, entity: EntityId, fields: &Fields) -> Result<()> {
        self.current = self.current.update(entity, fields)?;
        Ok(())
    }

    fn delete(&mut self, entity: EntityId) -> Result<Vec<EntityId>> {
        let (world, deleted) = self.current.delete(entity)?;
        self.current = world;
        Ok(deleted)
    }

    fn link(&mut self, entity: EntityId, relationship: &str, target: EntityId) -> Result<()> {
        self.current = self.current.link(entity, relationship, target)?;
        Ok(())
    }

    fn unlink(&mut self, entity: EntityId, relationship: &str, target: EntityId) -> Result<()> {
        self.current = self.current.unlink(entity, relationship, target)?;
        Ok(())
    }

    fn related(&self, entity: EntityId, relationship: &str) -> Result<Vec<EntityId>> {
        self.current.related(entity, relationship)
    }

    fn supports_key_mutation(&self) -> bool {
        self.key_mutation
    }

    fn begin(&mut self) -> Result<()> {
        self.savepoints.push(self.current.clone());
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.savepoints
            .pop()
            .map(|_| ())
            .ok_or_else(|| no_transaction("commit"))
    }

    fn rollback(&mut self) -> Result<()> {
        self.current = self.savepoints.pop().ok_or_else(|| no_transaction("rollback"))?;
        Ok(())
    }
}

fn no_transaction(operation: &str) -> Error {
    Error::new(ErrorKind::Transaction(format!(
        "{operation} without an open transaction"
    )))
}
