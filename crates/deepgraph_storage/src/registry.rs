//! The schema registry.
//!
//! Entity types are registered once through a [`RegistryBuilder`], which
//! validates them, pairs up relationships declared on both sides, and
//! derives reverse views from forward declarations. The resulting
//! [`SchemaRegistry`] is immutable and meant to be shared behind an `Arc`.

use std::collections::{BTreeMap, HashSet};

use deepgraph_foundation::{Error, Result};

use crate::schema::{EntityType, Member, RelationKind, RelationshipDescriptor};

/// Collects entity types before they are validated and frozen.
#[derive(Clone, Debug, Default)]
pub struct RegistryBuilder {
    types: Vec<EntityType>,
}

impl RegistryBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an entity type.
    ///
    /// # Errors
    ///
    /// Returns an error if a type with the same name is already registered.
    pub fn register(&mut self, entity_type: EntityType) -> Result<()> {
        if self.types.iter().any(|t| t.name == entity_type.name) {
            return Err(Error::schema(format!(
                "entity type already registered: {}",
                entity_type.name
            )));
        }
        self.types.push(entity_type);
        Ok(())
    }

    /// Registers an entity type, builder style.
    ///
    /// # Errors
    ///
    /// Returns an error if a type with the same name is already registered.
    pub fn with_type(mut self, entity_type: EntityType) -> Result<Self> {
        self.register(entity_type)?;
        Ok(self)
    }

    /// Validates the registered types and freezes them.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - A relationship targets an unregistered type
    /// - A name is used twice on one type
    /// - Two sides of a relationship disagree on its inverse cardinality
    /// - A key names something other than a field or a foreign key
    pub fn build(self) -> Result<SchemaRegistry> {
        let mut types: BTreeMap<String, EntityType> = self
            .types
            .into_iter()
            .map(|t| (t.name.clone(), t))
            .collect();

        for entity_type in types.values() {
            validate_members(entity_type, &types)?;
        }
        pair_declared_inverses(&mut types)?;
        derive_reverse_views(&mut types)?;
        for entity_type in types.values() {
            validate_members(entity_type, &types)?;
            validate_reverse_views(entity_type, &types)?;
            validate_keys(entity_type)?;
        }

        Ok(SchemaRegistry { types })
    }
}

/// The owning side of a relationship, as stored.
///
/// Edges are stored once, under the forward relationship that declares
/// them. A reverse view resolves to the same edge with `reversed` set.
#[derive(Clone, Copy, Debug)]
pub struct Edge<'a> {
    /// Type declaring the forward relationship.
    pub owner: &'a EntityType,
    /// The forward relationship.
    pub forward: &'a RelationshipDescriptor,
    /// True when the edge was reached through a reverse view.
    pub reversed: bool,
}

impl Edge<'_> {
    /// Returns the storage key of the edge set, unique across types.
    #[must_use]
    pub fn key(&self) -> String {
        edge_key(&self.owner.name, &self.forward.name)
    }
}

/// Builds the storage key of a forward relationship.
#[must_use]
pub fn edge_key(owner: &str, relationship: &str) -> String {
    format!("{owner}.{relationship}")
}

/// Validated, immutable set of entity types.
#[derive(Clone, Debug, Default)]
pub struct SchemaRegistry {
    types: BTreeMap<String, EntityType>,
}

impl SchemaRegistry {
    /// Starts building a registry.
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Gets an entity type by name.
    #[must_use]
    pub fn entity_type(&self, name: &str) -> Option<&EntityType> {
        self.types.get(name)
    }

    /// Gets an entity type by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the type is not registered.
    pub fn get(&self, name: &str) -> Result<&EntityType> {
        self.entity_type(name)
            .ok_or_else(|| Error::unknown_type(name))
    }

    /// Gets a relationship descriptor.
    ///
    /// # Errors
    ///
    /// Returns an error if the type or relationship is unknown.
    pub fn relationship(&self, entity_type: &str, name: &str) -> Result<&RelationshipDescriptor> {
        self.get(entity_type)?
            .relationship(name)
            .ok_or_else(|| Error::unknown_relationship(entity_type, name))
    }

    /// Resolves a relationship to the edge set it reads and writes.
    ///
    /// # Errors
    ///
    /// Returns an error if the type or relationship is unknown.
    pub fn edge(&self, entity_type: &str, name: &str) -> Result<Edge<'_>> {
        let descriptor = self.relationship(entity_type, name)?;
        if !descriptor.kind.is_reverse() {
            return Ok(Edge {
                owner: self.get(entity_type)?,
                forward: descriptor,
                reversed: false,
            });
        }
        let owner = self.get(&descriptor.target)?;
        let forward_name = descriptor.reverse_name.as_deref().unwrap_or_default();
        let forward = owner
            .relationship(forward_name)
            .ok_or_else(|| Error::unknown_relationship(&owner.name, forward_name))?;
        Ok(Edge {
            owner,
            forward,
            reversed: true,
        })
    }

    /// Iterates forward relationships pointing at `target`, with their owner.
    pub fn referrers<'a>(
        &'a self,
        target: &'a str,
    ) -> impl Iterator<Item = (&'a EntityType, &'a RelationshipDescriptor)> + 'a {
        self.types.values().flat_map(move |owner| {
            owner
                .relationships
                .iter()
                .filter(move |r| !r.kind.is_reverse() && r.target == target)
                .map(move |r| (owner, r))
        })
    }

    /// Iterates all entity types in name order.
    pub fn types(&self) -> impl Iterator<Item = &EntityType> {
        self.types.values()
    }

    /// Returns the number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns true if no types are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

fn validate_members(entity_type: &EntityType, types: &BTreeMap<String, EntityType>) -> Result<()> {
    let mut seen = HashSet::new();
    seen.insert(entity_type.primary_key.as_str());
    let names = entity_type
        .fields
        .iter()
        .map(|f| f.name.as_str())
        .chain(entity_type.relationships.iter().map(|r| r.name.as_str()));
    for name in names {
        if !seen.insert(name) {
            return Err(Error::schema(format!(
                "{} declares {name} more than once",
                entity_type.name
            )));
        }
    }

    for relationship in &entity_type.relationships {
        if !types.contains_key(&relationship.target) {
            return Err(Error::schema(format!(
                "{}.{} targets unregistered type {}",
                entity_type.name, relationship.name, relationship.target
            )));
        }
        if relationship.kind.is_reverse() && relationship.reverse_name.is_none() {
            return Err(Error::schema(format!(
                "reverse view {}.{} does not name its forward relationship",
                entity_type.name, relationship.name
            )));
        }
    }
    Ok(())
}

/// A `OneToMany` declared as the inverse of a `ManyToOne` describes the
/// same edges twice. The `ManyToOne` keeps ownership and the `OneToMany`
/// becomes a reverse view.
fn pair_declared_inverses(types: &mut BTreeMap<String, EntityType>) -> Result<()> {
    // (declaring type, view name, owner type, forward name)
    let mut pairs = Vec::new();
    for entity_type in types.values() {
        for relationship in &entity_type.relationships {
            if relationship.kind != RelationKind::OneToMany {
                continue;
            }
            let Some(inverse_name) = &relationship.reverse_name else {
                continue;
            };
            let Some(inverse) = types
                .get(&relationship.target)
                .and_then(|t| t.relationship(inverse_name))
            else {
                continue;
            };
            if inverse.kind != RelationKind::ManyToOne || inverse.target != entity_type.name {
                continue;
            }
            if inverse
                .reverse_name
                .as_deref()
                .is_some_and(|n| n != relationship.name)
            {
                return Err(Error::schema(format!(
                    "{}.{} and {}.{} name different inverses",
                    entity_type.name, relationship.name, relationship.target, inverse_name
                )));
            }
            pairs.push((
                entity_type.name.clone(),
                relationship.name.clone(),
                relationship.target.clone(),
                inverse_name.clone(),
            ));
        }
    }

    for (declaring, view, owner, forward) in pairs {
        if let Some(descriptor) = types
            .get_mut(&declaring)
            .and_then(|t| t.relationships.iter_mut().find(|r| r.name == view))
        {
            *descriptor =
                RelationshipDescriptor::reverse(view.clone(), RelationKind::ReverseMany, owner.clone(), forward.clone());
        }
        if let Some(descriptor) = types
            .get_mut(&owner)
            .and_then(|t| t.relationships.iter_mut().find(|r| r.name == forward))
        {
            descriptor.reverse_name = Some(view);
        }
    }
    Ok(())
}

fn derive_reverse_views(types: &mut BTreeMap<String, EntityType>) -> Result<()> {
    // (type receiving the view, view)
    let mut derived: Vec<(String, RelationshipDescriptor)> = Vec::new();
    for entity_type in types.values() {
        for relationship in entity_type.relationships.iter().filter(|r| !r.kind.is_reverse()) {
            let (Some(view_name), Some(view_kind)) =
                (&relationship.reverse_name, relationship.kind.derived_reverse())
            else {
                continue;
            };
            let target = types
                .get(&relationship.target)
                .ok_or_else(|| Error::unknown_type(&relationship.target))?;

            match target.member(view_name) {
                None => {
                    if derived
                        .iter()
                        .any(|(t, d)| *t == relationship.target && d.name == *view_name)
                    {
                        return Err(Error::schema(format!(
                            "two relationships derive {}.{view_name}",
                            relationship.target
                        )));
                    }
                    derived.push((
                        relationship.target.clone(),
                        RelationshipDescriptor::reverse(
                            view_name.clone(),
                            view_kind,
                            entity_type.name.clone(),
                            relationship.name.clone(),
                        ),
                    ));
                }
                Some(Member::Relationship(existing)) => {
                    let agrees = existing.kind.is_reverse()
                        && relationship.kind.agrees_with_inverse(existing.kind)
                        && existing.target == entity_type.name
                        && existing
                            .reverse_name
                            .as_deref()
                            .is_none_or(|n| n == relationship.name);
                    if !agrees {
                        return Err(Error::schema(format!(
                            "{}.{} ({:?}) and {}.{view_name} ({:?}) disagree on inverse cardinality",
                            entity_type.name,
                            relationship.name,
                            relationship.kind,
                            target.name,
                            existing.kind
                        )));
                    }
                }
                Some(_) => {
                    return Err(Error::schema(format!(
                        "{}.{view_name} is not a relationship and cannot be the inverse of {}.{}",
                        target.name, entity_type.name, relationship.name
                    )));
                }
            }
        }
    }

    for (target, view) in derived {
        if let Some(entity_type) = types.get_mut(&target) {
            entity_type.relationships.push(view);
        }
    }
    Ok(())
}

fn validate_reverse_views(
    entity_type: &EntityType,
    types: &BTreeMap<String, EntityType>,
) -> Result<()> {
    for view in entity_type.relationships.iter().filter(|r| r.kind.is_reverse()) {
        let forward_name = view.reverse_name.as_deref().unwrap_or_default();
        let forward = types
            .get(&view.target)
            .and_then(|owner| owner.relationship(forward_name))
            .ok_or_else(|| {
                Error::schema(format!(
                    "reverse view {}.{} names missing relationship {}.{forward_name}",
                    entity_type.name, view.name, view.target
                ))
            })?;
        if forward.kind.is_reverse()
            || forward.target != entity_type.name
            || forward.kind.derived_reverse() != Some(view.kind)
        {
            return Err(Error::schema(format!(
                "reverse view {}.{} ({:?}) does not agree with {}.{forward_name} ({:?})",
                entity_type.name, view.name, view.kind, view.target, forward.kind
            )));
        }
    }
    Ok(())
}

fn validate_keys(entity_type: &EntityType) -> Result<()> {
    for key in entity_type.unique_keys.iter().chain(&entity_type.match_hints) {
        if key.is_empty() {
            return Err(Error::schema(format!(
                "{} declares an empty key",
                entity_type.name
            )));
        }
        for name in key {
            let valid = match entity_type.member(name) {
                Some(Member::Field(_)) => true,
                Some(Member::Relationship(r)) => r.is_foreign_key(),
                Some(Member::PrimaryKey) | None => false,
            };
            if !valid {
                return Err(Error::schema(format!(
                    "key of {} names {name}, which is neither a field nor a foreign key",
                    entity_type.name
                )));
            }
        }
    }
    Ok(())
}
