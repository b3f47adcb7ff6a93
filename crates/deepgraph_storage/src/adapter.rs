//! The persistence boundary the engine writes through.

use std::sync::Arc;

use deepgraph_foundation::{EntityId, Result};

use crate::registry::SchemaRegistry;
use crate::world::Fields;

/// Abstract capabilities a store must offer to host deep writes.
///
/// All mutations between [`begin`](Self::begin) and
/// [`commit`](Self::commit) must become visible together, or not at all
/// after [`rollback`](Self::rollback). Reads inside a transaction see the
/// transaction's own writes.
pub trait EntityStoreAdapter {
    /// Returns the schema the store conforms to.
    fn registry(&self) -> Arc<SchemaRegistry>;

    /// Returns the type name of an entity.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity does not exist.
    fn type_of(&self, entity: EntityId) -> Result<String>;

    /// Checks whether an entity exists.
    fn exists(&self, entity: EntityId) -> bool;

    /// Reads the primary key, fields and foreign keys of an entity.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity does not exist.
    fn fields(&self, entity: EntityId) -> Result<Fields>;

    /// Finds the entity identified by `criteria`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the type or a criterion name is unknown.
    fn lookup(&self, entity_type: &str, criteria: &Fields) -> Result<Option<EntityId>>;

    /// Finds every entity matching `criteria`, in creation order.
    ///
    /// # Errors
    ///
    /// Returns an error if the type or a criterion name is unknown.
    fn find(&self, entity_type: &str, criteria: &Fields) -> Result<Vec<EntityId>>;

    /// Creates an entity and returns its store-assigned identity.
    ///
    /// # Errors
    ///
    /// Returns an error on invalid fields, missing required values, or a
    /// unique-key collision.
    fn create(&mut self, entity_type: &str, fields: &Fields) -> Result<EntityId>;

    /// Updates the supplied fields of an entity.
    ///
    /// # Errors
    ///
    /// Returns an error on invalid fields or a unique-key collision.
    fn update(&mut self, entity: EntityId, fields: &Fields) -> Result<()>;

    /// Deletes an entity and returns every identity removed with it.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is protected by a remaining reference.
    fn delete(&mut self, entity: EntityId) -> Result<Vec<EntityId>>;

    /// Links `target` to `entity` through `relationship`.
    ///
    /// # Errors
    ///
    /// Returns an error if either entity is missing or of the wrong type.
    fn link(&mut self, entity: EntityId, relationship: &str, target: EntityId) -> Result<()>;

    /// Removes the link between `entity` and `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if the link may not be removed.
    fn unlink(&mut self, entity: EntityId, relationship: &str, target: EntityId) -> Result<()>;

    /// Lists entities related to `entity` through `relationship`, in link order.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity or relationship is unknown.
    fn related(&self, entity: EntityId, relationship: &str) -> Result<Vec<EntityId>>;

    /// Whether unique-key fields of an existing entity may change.
    fn supports_key_mutation(&self) -> bool;

    /// Opens a transaction. Transactions nest.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot open a transaction.
    fn begin(&mut self) -> Result<()>;

    /// Makes the innermost transaction's writes permanent.
    ///
    /// # Errors
    ///
    /// Returns an error if no transaction is open.
    fn commit(&mut self) -> Result<()>;

    /// Discards the innermost transaction's writes.
    ///
    /// # Errors
    ///
    /// Returns an error if no transaction is open.
    fn rollback(&mut self) -> Result<()>;
}
