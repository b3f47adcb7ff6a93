//! World state management with immutable snapshots.
//!
//! The `World` is the unified interface to entity, field and relationship
//! storage. It uses persistent data structures for cheap cloning and
//! structural sharing, so every mutation returns a new `World` and leaves
//! the receiver untouched. Transactions are built on top of that: keeping a
//! clone is all it takes to roll back.

use std::collections::BTreeMap;
use std::sync::Arc;

use deepgraph_foundation::{EntityId, Error, ErrorKind, Result, Type, Value};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::entity::EntityStore;
use crate::registry::{edge_key, SchemaRegistry};
use crate::relationship::RelationshipStore;
use crate::schema::{EntityType, Member, OnDelete, RelationshipDescriptor};

/// Named values written to or read from one entity.
///
/// Keys are field names, the primary key, or foreign-key relationship
/// names. Foreign keys carry [`Value::EntityRef`] (or an integer key) and
/// [`Value::Null`] for an empty link.
pub type Fields = BTreeMap<String, Value>;

type Records = im::HashMap<EntityId, im::OrdMap<String, Value>>;

/// Immutable snapshot of stored state.
///
/// Clone is O(1) due to structural sharing via `Arc`.
/// All mutation methods return a new `World` instance.
#[derive(Clone, Debug)]
pub struct World {
    /// Entity types the state conforms to.
    registry: Arc<SchemaRegistry>,
    /// Entity lifecycle management.
    entities: Arc<EntityStore>,
    /// Scalar field values per entity.
    records: Arc<Records>,
    /// Relationship edges, including foreign keys.
    relationships: Arc<RelationshipStore>,
}

/// Validated scalar and foreign-key writes for one entity.
struct Prepared<'a> {
    scalars: Vec<(String, Value)>,
    links: Vec<(&'a RelationshipDescriptor, Option<EntityId>)>,
}

impl World {
    /// Creates a new empty world over `registry`.
    #[must_use]
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        Self {
            registry,
            entities: Arc::new(EntityStore::new()),
            records: Arc::new(Records::new()),
            relationships: Arc::new(RelationshipStore::new()),
        }
    }

    /// Returns the schema registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    /// Returns the number of live entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Returns the number of stored edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.relationships.len()
    }

    /// Checks if an entity exists.
    #[must_use]
    pub fn exists(&self, entity: EntityId) -> bool {
        self.entities.exists(entity)
    }

    /// Iterates all live entity IDs.
    pub fn entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities.iter()
    }

    /// Iterates live entities of one type in creation order.
    pub fn entities_of<'a>(&'a self, entity_type: &'a str) -> impl Iterator<Item = EntityId> + 'a {
        self.entities.iter_type(entity_type)
    }

    /// Returns the type name of an entity.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity does not exist.
    pub fn type_of(&self, entity: EntityId) -> Result<&str> {
        self.entities
            .type_of(entity)
            .map(|name| &**name)
            .ok_or_else(|| Error::entity_not_found(entity))
    }

    fn entity_type(&self, entity: EntityId) -> Result<&EntityType> {
        self.registry.get(self.type_of(entity)?)
    }

    // --- Reads ---

    /// Reads one member of an entity: the primary key, a field, or a
    /// foreign key.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity does not exist or `name` is not a
    /// single-valued member of its type.
    pub fn get(&self, entity: EntityId, name: &str) -> Result<Value> {
        let ty = self.entity_type(entity)?;
        match ty.member(name) {
            Some(Member::PrimaryKey) => Ok(Value::Int(entity.key())),
            Some(Member::Field(_)) => Ok(self
                .records
                .get(&entity)
                .and_then(|r| r.get(name))
                .cloned()
                .unwrap_or(Value::Null)),
            Some(Member::Relationship(r)) if r.is_foreign_key() => {
                Ok(self.foreign_key(entity, &ty.name, &r.name))
            }
            Some(Member::Relationship(_)) => Err(Error::schema(format!(
                "{}.{name} is a collection, read it with related()",
                ty.name
            ))),
            None => Err(Error::unknown_field(&ty.name, name)),
        }
    }

    /// Reads the primary key, every field and every foreign key of an entity.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity does not exist.
    pub fn fields(&self, entity: EntityId) -> Result<Fields> {
        let ty = self.entity_type(entity)?;
        let mut fields = Fields::new();
        fields.insert(ty.primary_key.clone(), Value::Int(entity.key()));
        if let Some(record) = self.records.get(&entity) {
            for (name, value) in record {
                fields.insert(name.clone(), value.clone());
            }
        }
        for relationship in ty.foreign_keys() {
            fields.insert(
                relationship.name.clone(),
                self.foreign_key(entity, &ty.name, &relationship.name),
            );
        }
        Ok(fields)
    }

    fn foreign_key(&self, entity: EntityId, owner: &str, relationship: &str) -> Value {
        self.relationships
            .targets(entity, &edge_key(owner, relationship))
            .next()
            .map_or(Value::Null, Value::EntityRef)
    }

    /// Lists the entities related to `entity` through `relationship`, in
    /// link order. Works for forward relationships and reverse views alike.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity or relationship is unknown.
    pub fn related(&self, entity: EntityId, relationship: &str) -> Result<Vec<EntityId>> {
        let edge = self.registry.edge(self.type_of(entity)?, relationship)?;
        let key = edge.key();
        Ok(if edge.reversed {
            self.relationships.sources(entity, &key).collect()
        } else {
            self.relationships.targets(entity, &key).collect()
        })
    }

    /// Finds every entity of `entity_type` whose members equal `criteria`.
    ///
    /// Criteria may name the primary key, fields and foreign keys. Results
    /// are in creation order.
    ///
    /// # Errors
    ///
    /// Returns an error if the type is unknown or a criterion names
    /// something that is not a single-valued member.
    pub fn find(&self, entity_type: &str, criteria: &Fields) -> Result<Vec<EntityId>> {
        let ty = self.registry.get(entity_type)?;
        let mut wanted = Vec::with_capacity(criteria.len());
        for (name, value) in criteria {
            let normalized = match ty.member(name) {
                Some(Member::PrimaryKey) => match as_reference(value) {
                    Some(id) => Value::Int(id.key()),
                    None => return Ok(Vec::new()),
                },
                Some(Member::Field(field)) => coerce(field.ty, value.clone()),
                Some(Member::Relationship(r)) if r.is_foreign_key() => {
                    if value.is_null() {
                        Value::Null
                    } else {
                        match as_reference(value) {
                            Some(id) => Value::EntityRef(id),
                            None => return Ok(Vec::new()),
                        }
                    }
                }
                Some(Member::Relationship(_)) => {
                    return Err(Error::schema(format!(
                        "{}.{name} is a collection and cannot be matched on",
                        ty.name
                    )));
                }
                None => return Err(Error::unknown_field(&ty.name, name)),
            };
            wanted.push((name.as_str(), normalized));
        }

        Ok(self
            .entities
            .iter_type(&ty.name)
            .filter(|id| {
                wanted
                    .iter()
                    .all(|(name, value)| self.get(*id, name).is_ok_and(|v| v == *value))
            })
            .collect())
    }

    /// Finds the first entity of `entity_type` whose members equal `criteria`.
    ///
    /// # Errors
    ///
    /// Returns an error under the same conditions as [`World::find`].
    pub fn lookup(&self, entity_type: &str, criteria: &Fields) -> Result<Option<EntityId>> {
        Ok(self.find(entity_type, criteria)?.into_iter().next())
    }

    // --- Writes ---

    /// Creates an entity.
    ///
    /// Unsupplied fields take their default, or null when nullable.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The type is unknown or a name is not one of its members
    /// - A value does not fit its field, or a reference does not resolve
    /// - A required field or foreign key is missing
    /// - A unique key would be shared with another entity
    pub fn create(&self, entity_type: &str, fields: &Fields) -> Result<(World, EntityId)> {
        let ty = self.registry.get(entity_type)?;
        let Prepared { mut scalars, links } = self.prepare(ty, fields, None)?;

        for field in &ty.fields {
            if fields.contains_key(&field.name) {
                continue;
            }
            match &field.default {
                Some(default) => scalars.push((field.name.clone(), default.clone())),
                None if field.nullable => scalars.push((field.name.clone(), Value::Null)),
                None => return Err(Error::missing_field(&ty.name, &field.name)),
            }
        }
        if let Some(missing) = ty
            .foreign_keys()
            .find(|r| !r.nullable && !fields.contains_key(&r.name))
        {
            return Err(Error::missing_field(&ty.name, &missing.name));
        }

        let mut entities = (*self.entities).clone();
        let id = entities.spawn(&ty.name);

        let mut records = (*self.records).clone();
        records.insert(id, scalars.into_iter().collect());

        let mut relationships = (*self.relationships).clone();
        for (relationship, target) in links {
            if let Some(target) = target {
                relationships.link(id, &edge_key(&ty.name, &relationship.name), target, relationship.kind);
            }
        }

        let world = World {
            registry: Arc::clone(&self.registry),
            entities: Arc::new(entities),
            records: Arc::new(records),
            relationships: Arc::new(relationships),
        };
        world.check_unique(id)?;
        Ok((world, id))
    }

    /// Updates the supplied fields and foreign keys of an entity.
    ///
    /// The primary key may be supplied only with its current value.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity does not exist, or under the same
    /// validation conditions as [`World::create`].
    pub fn update(&self, entity: EntityId, fields: &Fields) -> Result<World> {
        let ty = self.entity_type(entity)?;
        let Prepared { scalars, links } = self.prepare(ty, fields, Some(entity))?;

        let mut records = (*self.records).clone();
        let mut record = records.get(&entity).cloned().unwrap_or_default();
        for (name, value) in scalars {
            record.insert(name, value);
        }
        records.insert(entity, record);

        let mut relationships = (*self.relationships).clone();
        for (relationship, target) in links {
            let key = edge_key(&ty.name, &relationship.name);
            match target {
                Some(target) => {
                    relationships.link(entity, &key, target, relationship.kind);
                }
                None => {
                    let old: Vec<_> = relationships.targets(entity, &key).collect();
                    for target in old {
                        relationships.unlink(entity, &key, target);
                    }
                }
            }
        }

        let world = World {
            records: Arc::new(records),
            relationships: Arc::new(relationships),
            ..self.clone()
        };
        world.check_unique(entity)?;
        Ok(world)
    }

    /// Deletes an entity along with everything that cascades from it.
    ///
    /// Returns the new world and every deleted identity, the requested one
    /// first. Nothing is deleted if any of them is protected.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity does not exist or a protecting
    /// reference from outside the deleted set remains.
    pub fn delete(&self, entity: EntityId) -> Result<(World, Vec<EntityId>)> {
        self.entities.validate(entity)?;
        let victims = self.cascade_set(entity)?;
        self.check_protected(&victims)?;

        let mut entities = (*self.entities).clone();
        let mut records = (*self.records).clone();
        let mut relationships = (*self.relationships).clone();
        for victim in &victims {
            relationships.remove_entity(*victim);
            records.remove(victim);
            entities.destroy(*victim)?;
        }

        let world = World {
            registry: Arc::clone(&self.registry),
            entities: Arc::new(entities),
            records: Arc::new(records),
            relationships: Arc::new(relationships),
        };
        Ok((world, victims))
    }

    fn cascade_set(&self, root: EntityId) -> Result<Vec<EntityId>> {
        let mut victims = vec![root];
        let mut next = 0;
        while next < victims.len() {
            let victim = victims[next];
            next += 1;
            let ty = self.type_of(victim)?;
            for (owner, relationship) in self.registry.referrers(ty) {
                if relationship.on_target_delete != OnDelete::Cascade {
                    continue;
                }
                let key = edge_key(&owner.name, &relationship.name);
                for source in self.relationships.sources(victim, &key) {
                    if !victims.contains(&source) {
                        victims.push(source);
                    }
                }
            }
        }
        Ok(victims)
    }

    fn check_protected(&self, victims: &[EntityId]) -> Result<()> {
        for victim in victims {
            let ty = self.type_of(*victim)?;
            for (owner, relationship) in self.registry.referrers(ty) {
                if relationship.on_target_delete != OnDelete::Protect {
                    continue;
                }
                let key = edge_key(&owner.name, &relationship.name);
                if let Some(referrer) = self
                    .relationships
                    .sources(*victim, &key)
                    .find(|s| !victims.contains(s))
                {
                    return Err(Error::new(ErrorKind::ProtectedReference {
                        entity: *victim,
                        referrer,
                        relationship: key,
                    }));
                }
            }
        }
        Ok(())
    }

    /// Links `target` to `entity` through `relationship`.
    ///
    /// Reverse views store the edge on the owning side. Links that the
    /// relationship's cardinality no longer allows are replaced.
    ///
    /// # Errors
    ///
    /// Returns an error if either entity is missing, `target` has the wrong
    /// type, or the new link breaks a unique key.
    pub fn link(&self, entity: EntityId, relationship: &str, target: EntityId) -> Result<World> {
        let ty = self.type_of(entity)?;
        let descriptor = self.registry.relationship(ty, relationship)?;
        self.check_target(relationship, &descriptor.target, target)?;

        let edge = self.registry.edge(ty, relationship)?;
        let (source, destination) = if edge.reversed {
            (target, entity)
        } else {
            (entity, target)
        };

        let mut relationships = (*self.relationships).clone();
        relationships.link(source, &edge.key(), destination, edge.forward.kind);

        let world = World {
            relationships: Arc::new(relationships),
            ..self.clone()
        };
        if edge.forward.is_foreign_key() {
            world.check_unique(source)?;
        }
        Ok(world)
    }

    /// Removes the link between `entity` and `target`. Missing links are a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity or relationship is unknown, or the
    /// link is a foreign key that may not be null.
    pub fn unlink(&self, entity: EntityId, relationship: &str, target: EntityId) -> Result<World> {
        let edge = self.registry.edge(self.type_of(entity)?, relationship)?;
        let (source, destination) = if edge.reversed {
            (target, entity)
        } else {
            (entity, target)
        };
        let key = edge.key();

        if !self.relationships.has_edge(source, &key, destination) {
            return Ok(self.clone());
        }
        if edge.forward.is_foreign_key() && !edge.forward.nullable {
            return Err(Error::missing_field(self.type_of(source)?, &edge.forward.name));
        }

        let mut relationships = (*self.relationships).clone();
        relationships.unlink(source, &key, destination);
        Ok(World {
            relationships: Arc::new(relationships),
            ..self.clone()
        })
    }

    // --- Validation ---

    fn prepare<'a>(
        &self,
        ty: &'a EntityType,
        fields: &Fields,
        existing: Option<EntityId>,
    ) -> Result<Prepared<'a>> {
        let mut prepared = Prepared {
            scalars: Vec::new(),
            links: Vec::new(),
        };
        for (name, value) in fields {
            match ty.member(name) {
                Some(Member::PrimaryKey) => {
                    let unchanged = existing.is_some_and(|id| as_reference(value) == Some(id));
                    if !unchanged {
                        return Err(Error::schema(format!(
                            "{}.{name} is assigned by the store and cannot be written",
                            ty.name
                        )));
                    }
                }
                Some(Member::Field(field)) => {
                    let value = coerce(field.ty, value.clone());
                    if !field.accepts(&value) {
                        return Err(Error::type_mismatch(name, field.ty, value.value_type()));
                    }
                    prepared.scalars.push((name.clone(), value));
                }
                Some(Member::Relationship(relationship)) if relationship.is_foreign_key() => {
                    let target = if value.is_null() {
                        if !relationship.nullable {
                            return Err(Error::type_mismatch(name, Type::EntityRef, None));
                        }
                        None
                    } else {
                        let target = as_reference(value).ok_or_else(|| {
                            Error::type_mismatch(name, Type::EntityRef, value.value_type())
                        })?;
                        self.check_target(name, &relationship.target, target)?;
                        Some(target)
                    };
                    prepared.links.push((relationship, target));
                }
                Some(Member::Relationship(_)) => {
                    return Err(Error::schema(format!(
                        "{}.{name} is a collection and cannot be written as a field",
                        ty.name
                    )));
                }
                None => return Err(Error::unknown_field(&ty.name, name)),
            }
        }
        Ok(prepared)
    }

    fn check_target(&self, relationship: &str, expected: &str, target: EntityId) -> Result<()> {
        let actual = self.type_of(target)?;
        if actual == expected {
            Ok(())
        } else {
            Err(Error::new(ErrorKind::WrongTarget {
                relationship: relationship.to_string(),
                expected: expected.to_string(),
                actual: actual.to_string(),
            }))
        }
    }

    fn check_unique(&self, entity: EntityId) -> Result<()> {
        let ty = self.entity_type(entity)?;
        for key in &ty.unique_keys {
            let values = key
                .iter()
                .map(|name| self.get(entity, name))
                .collect::<Result<Vec<_>>>()?;
            // SQL semantics: a null part never collides
            if values.iter().any(Value::is_null) {
                continue;
            }
            let clash = self.entities.iter_type(&ty.name).find(|other| {
                *other != entity
                    && key
                        .iter()
                        .zip(&values)
                        .all(|(name, value)| self.get(*other, name).is_ok_and(|v| v == *value))
            });
            if let Some(existing) = clash {
                return Err(Error::new(ErrorKind::UniqueViolation {
                    entity_type: ty.name.clone(),
                    fields: key.clone(),
                    existing,
                }));
            }
        }
        Ok(())
    }

    // --- Snapshots ---

    /// Captures the stored state, without the registry.
    #[must_use]
    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            entities: (*self.entities).clone(),
            records: (*self.records).clone(),
            relationships: (*self.relationships).clone(),
        }
    }

    /// Rebuilds a world from a snapshot taken under a compatible registry.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot holds entities of unregistered types.
    pub fn restore(registry: Arc<SchemaRegistry>, snapshot: WorldSnapshot) -> Result<World> {
        for id in snapshot.entities.iter() {
            if let Some(name) = snapshot.entities.type_of(id) {
                registry.get(name)?;
            }
        }
        Ok(World {
            registry,
            entities: Arc::new(snapshot.entities),
            records: Arc::new(snapshot.records),
            relationships: Arc::new(snapshot.relationships),
        })
    }
}

/// Stored state of a [`World`], detached from its registry.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WorldSnapshot {
    entities: EntityStore,
    records: Records,
    relationships: RelationshipStore,
}

impl WorldSnapshot {
    /// Returns the number of entities in the snapshot.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }
}

/// Interprets a value as a reference: an entity ref or a primary-key number.
fn as_reference(value: &Value) -> Option<EntityId> {
    match value {
        Value::EntityRef(id) => Some(*id),
        Value::Int(key) => EntityId::from_key(*key),
        _ => None,
    }
}

/// Stores integers written to float fields as floats, so equal numbers match.
#[allow(clippy::cast_precision_loss)]
fn coerce(ty: Type, value: Value) -> Value {
    match (ty, value) {
        (Type::Float, Value::Int(n)) => Value::Float(n as f64),
        (_, value) => value,
    }
}
