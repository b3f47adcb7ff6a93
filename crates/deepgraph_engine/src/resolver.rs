//! Node resolution: mapping one document node onto one persisted entity.
//!
//! A node is resolved in four steps:
//! 1. Its entries are classified into fields, foreign keys (single-valued
//!    forward relationships) and relationships walked after the node.
//! 2. Foreign keys are resolved first, since the node needs them to be
//!    created or matched.
//! 3. The node is identified through its primary key, unique keys, or
//!    match hints, then created, updated, or reused.
//! 4. Its remaining relationships are walked.
//!
//! The node's result slot is reserved before step 2 so results stay in
//! pre-order.

use std::sync::Arc;

use deepgraph_foundation::{Document, EntityId, Field, Type, Value};
use deepgraph_storage::{
    Cardinality, EntityStoreAdapter, EntityType, Fields, Member, RelationshipDescriptor,
};

use crate::collector::Slot;
use crate::operation::{as_key, complete_keys, criteria, At, Back, Operation, Resolution};
use crate::profile::Profile;
use crate::result::{Action, ErrorCode, NodeError};

/// A node's entries, sorted by how they are written.
struct Classified<'d, 'r> {
    /// Primary key, fields and foreign keys, as stored.
    known: Fields,
    /// Foreign keys still to resolve.
    foreign: Vec<(&'r RelationshipDescriptor, &'d Field)>,
    /// Relationships walked after the node.
    walked: Vec<(&'r RelationshipDescriptor, &'d Field)>,
}

/// A foreign key pointing at an ancestor that is created after this node.
struct PendingLink<'r> {
    relationship: &'r str,
    frame: usize,
    slot: Slot,
}

impl<S: EntityStoreAdapter + ?Sized> Operation<'_, S> {
    // =========================================================================
    // Entry points
    // =========================================================================

    /// Resolves a root document.
    pub(crate) fn resolve_root(&mut self, entity_type: &str, document: &Document, path: String) -> Resolution {
        let at = At {
            path,
            depth: 0,
            must_exist: false,
            back: None,
        };
        let slot = self.collector.reserve(at.path.clone(), entity_type, 0);
        self.resolve_document(entity_type, document, slot, &at)
    }

    /// Resolves an entry found in a relationship position.
    pub(crate) fn resolve(&mut self, entity_type: &str, entry: &Field, at: &At<'_>) -> (Slot, Resolution) {
        let slot = self.collector.reserve(at.path.clone(), entity_type, at.depth);
        if at.depth > self.config.max_depth {
            let error = NodeError::new(
                ErrorCode::DepthLimitExceeded,
                format!("nesting exceeds {} levels", self.config.max_depth),
            );
            return (slot, self.fail(slot, error));
        }
        let resolution = match entry {
            Field::Node(document) => self.resolve_document(entity_type, document, slot, at),
            Field::Scalar(value) => self.resolve_reference(entity_type, value, slot),
            Field::List(_) => self.fail(
                slot,
                NodeError::new(
                    ErrorCode::InvalidShape,
                    format!("expected an object or a key for {entity_type}, got a list"),
                ),
            ),
        };
        (slot, resolution)
    }

    pub(crate) fn fail(&mut self, slot: Slot, error: NodeError) -> Resolution {
        self.collector.fail(slot, error.clone());
        Resolution::Failed(error)
    }

    /// A bare scalar in a relationship position names an existing entity by
    /// primary key.
    fn resolve_reference(&mut self, entity_type: &str, value: &Value, slot: Slot) -> Resolution {
        let registry = Arc::clone(&self.registry);
        let Ok(ty) = registry.get(entity_type) else {
            return self.fail(
                slot,
                NodeError::new(ErrorCode::StoreFailure, format!("unknown type {entity_type}")),
            );
        };
        let Some(identity) = as_key(value) else {
            return self.fail(
                slot,
                NodeError::new(
                    ErrorCode::TypeMismatch,
                    format!("{value} is not a {entity_type} key"),
                )
                .with_field(&ty.primary_key),
            );
        };
        let criteria = Fields::from([(ty.primary_key.clone(), Value::Int(identity.key()))]);
        match self.store.lookup(entity_type, &criteria) {
            Ok(Some(found)) => {
                self.resolved(slot, entity_type, found, Action::Reused);
                Resolution::Done(found)
            }
            Ok(None) => self.fail(
                slot,
                NodeError::new(
                    ErrorCode::ReferenceNotFound,
                    format!("no {entity_type} with {} {}", ty.primary_key, identity.key()),
                )
                .with_field(&ty.primary_key),
            ),
            Err(e) => self.fail(slot, NodeError::from_store(&e)),
        }
    }

    // =========================================================================
    // Documents
    // =========================================================================

    fn resolve_document(&mut self, entity_type: &str, document: &Document, slot: Slot, at: &At<'_>) -> Resolution {
        let registry = Arc::clone(&self.registry);
        let Ok(ty) = registry.get(entity_type) else {
            return self.fail(
                slot,
                NodeError::new(ErrorCode::StoreFailure, format!("unknown type {entity_type}")),
            );
        };
        let profiles = self.profiles;
        let profile = profiles.resolve(entity_type, &self.config.use_case);

        let mut node = match classify(ty, document, profile) {
            Ok(node) => node,
            Err(error) => return self.fail(slot, error),
        };
        if let Some(back) = at.back {
            if let Err(error) = self.apply_back(ty, &mut node, back) {
                return self.fail(slot, error);
            }
        }

        // Cycles: a node naming an ancestor is linked, never walked again.
        let keys = complete_keys(ty, &node.known);
        let early = self.identify_by_keys(ty, &keys).ok().flatten();
        if let Some(identity) = early.filter(|id| self.is_ancestor(*id)) {
            self.resolved(slot, entity_type, identity, Action::Reused);
            return Resolution::Done(identity);
        }
        if early.is_none() {
            if let Some(frame) = self.pending_ancestor(entity_type, &keys) {
                return Resolution::Pending(frame);
            }
        }

        let frame = self.push_frame(entity_type, early, keys);
        let resolution = self.resolve_entity(ty, profile, node, slot, frame, at);
        self.pop_frame();
        resolution
    }

    fn resolve_entity(
        &mut self,
        ty: &EntityType,
        profile: &Profile,
        node: Classified<'_, '_>,
        slot: Slot,
        frame: usize,
        at: &At<'_>,
    ) -> Resolution {
        let Classified {
            mut known,
            foreign,
            walked,
        } = node;

        let mut pending = Vec::new();
        let mut failure = None;
        for (relationship, entry) in foreign {
            if let Err(error) =
                self.resolve_foreign_key(relationship, entry, profile, at, &mut known, &mut pending)
            {
                failure.get_or_insert(error);
            }
        }
        if let Some(error) = failure {
            self.abandon(&pending, &error);
            return self.fail(slot, error);
        }

        let (identity, action) = match self.persist(ty, profile, &known, at) {
            Ok(persisted) => persisted,
            Err(error) => {
                self.abandon(&pending, &error);
                return self.fail(slot, error);
            }
        };
        self.resolved(slot, &ty.name, identity, action);
        for link in pending {
            self.defer(link.frame, identity, link.relationship, link.slot);
        }
        self.settle(frame, identity);

        let revisit = self.ancestors[..frame]
            .iter()
            .any(|f| f.identity == Some(identity));
        if !revisit {
            for (relationship, entry) in walked {
                if let Some(error) = self.walk(identity, relationship, entry, profile, at) {
                    self.collector.fail(slot, error);
                }
            }
        }

        match self.collector.get(slot).and_then(|r| r.error()) {
            Some(error) => Resolution::Failed(error.clone()),
            None => Resolution::Done(identity),
        }
    }

    /// Fails the slots of foreign keys that waited for a node that will not
    /// be created.
    fn abandon(&mut self, pending: &[PendingLink<'_>], error: &NodeError) {
        for link in pending {
            self.collector.fail(
                link.slot,
                NodeError::new(error.code, "the node holding this reference failed")
                    .with_field(link.relationship),
            );
        }
    }

    /// Checks a child's own reference to its parent and supplies it when the
    /// child stores it.
    fn apply_back(&mut self, ty: &EntityType, node: &mut Classified<'_, '_>, back: Back<'_>) -> Result<(), NodeError> {
        let explicit = node
            .foreign
            .iter()
            .chain(node.walked.iter())
            .find(|(r, _)| r.name == back.name)
            .map(|(r, entry)| (*r, *entry));
        if let Some((relationship, entry)) = explicit {
            let named = match entry {
                Field::Scalar(value) if value.is_null() => None,
                Field::Scalar(value) => as_key(value),
                Field::Node(document) => self.peek_identity(&relationship.target, document),
                Field::List(_) => {
                    return Err(NodeError::new(
                        ErrorCode::InvalidShape,
                        format!("{}.{} takes one object, got a list", ty.name, back.name),
                    )
                    .with_field(back.name));
                }
            };
            if named != Some(back.parent) {
                return Err(NodeError::new(
                    ErrorCode::ReverseMismatch,
                    format!(
                        "nested under {} but names a different {}",
                        back.parent, back.name
                    ),
                )
                .with_field(back.name));
            }
            node.foreign.retain(|(r, _)| r.name != back.name);
            node.walked.retain(|(r, _)| r.name != back.name);
        }
        if back.foreign_key {
            node.known
                .insert(back.name.to_string(), Value::EntityRef(back.parent));
        }
        Ok(())
    }

    /// Finds the entity a document names, without writing anything.
    fn peek_identity(&self, entity_type: &str, document: &Document) -> Option<EntityId> {
        let ty = self.registry.entity_type(entity_type)?;
        let mut known = Fields::new();
        for (name, entry) in document.iter() {
            let Some(value) = entry.as_scalar() else {
                continue;
            };
            match ty.member(name) {
                Some(Member::PrimaryKey) => {
                    known.insert(name.to_string(), value.clone());
                }
                Some(Member::Field(field)) => {
                    known.insert(name.to_string(), coerce(field.ty, value.clone()));
                }
                Some(Member::Relationship(r)) if r.is_foreign_key() => {
                    if let Some(id) = as_key(value) {
                        known.insert(name.to_string(), Value::EntityRef(id));
                    }
                }
                _ => {}
            }
        }
        self.identify_by_keys(ty, &complete_keys(ty, &known))
            .ok()
            .flatten()
    }

    fn resolve_foreign_key<'r>(
        &mut self,
        relationship: &'r RelationshipDescriptor,
        entry: &Field,
        profile: &Profile,
        at: &At<'_>,
        known: &mut Fields,
        pending: &mut Vec<PendingLink<'r>>,
    ) -> Result<(), NodeError> {
        if entry.is_null() {
            if relationship.nullable {
                known.insert(relationship.name.clone(), Value::Null);
                return Ok(());
            }
            return Err(NodeError::new(
                ErrorCode::MissingRequiredField,
                format!("{} may not be null", relationship.name),
            )
            .with_field(&relationship.name));
        }

        let child_at = At {
            path: format!("{}.{}", at.path, relationship.name),
            depth: at.depth + 1,
            must_exist: profile.requires_existing(relationship),
            back: None,
        };
        match self.resolve(&relationship.target, entry, &child_at) {
            (_, Resolution::Done(target)) => {
                known.insert(relationship.name.clone(), Value::EntityRef(target));
                Ok(())
            }
            (slot, Resolution::Pending(frame)) if relationship.nullable => {
                known.insert(relationship.name.clone(), Value::Null);
                pending.push(PendingLink {
                    relationship: &relationship.name,
                    frame,
                    slot,
                });
                Ok(())
            }
            (slot, Resolution::Pending(_)) => {
                let error = NodeError::new(
                    ErrorCode::MissingRequiredField,
                    format!("{} closes a cycle through a required relationship", relationship.name),
                )
                .with_field(&relationship.name);
                self.collector.fail(slot, error.clone());
                Err(error)
            }
            (_, Resolution::Failed(child)) if relationship.required => Err(NodeError::new(
                child.code,
                format!("required {} failed: {}", relationship.name, child.reason),
            )
            .with_field(&relationship.name)),
            (_, Resolution::Failed(_)) => Ok(()),
        }
    }

    // =========================================================================
    // Identification
    // =========================================================================

    /// Looks a node up by its complete keys. Keys pointing at different
    /// entities are ambiguous.
    fn identify_by_keys(&self, ty: &EntityType, keys: &[Fields]) -> Result<Option<EntityId>, NodeError> {
        let mut found: Option<EntityId> = None;
        for criteria in keys {
            let hit = self
                .store
                .lookup(&ty.name, criteria)
                .map_err(|e| NodeError::from_store(&e))?;
            match (found, hit) {
                (Some(a), Some(b)) if a != b => {
                    return Err(NodeError::new(
                        ErrorCode::AmbiguousMatch,
                        format!("keys of {} identify both {a} and {b}", ty.name),
                    ));
                }
                (None, Some(b)) => found = Some(b),
                _ => {}
            }
        }
        Ok(found)
    }

    fn identify(&self, ty: &EntityType, known: &Fields) -> Result<Option<EntityId>, NodeError> {
        if let Some(pk) = known.get(&ty.primary_key) {
            let criteria = Fields::from([(ty.primary_key.clone(), pk.clone())]);
            let hit = self
                .store
                .lookup(&ty.name, &criteria)
                .map_err(|e| NodeError::from_store(&e))?;
            if hit.is_none() {
                return Err(NodeError::new(
                    ErrorCode::ReferenceNotFound,
                    format!("no {} with {} {pk}", ty.name, ty.primary_key),
                )
                .with_field(&ty.primary_key));
            }
        }

        let keys = complete_keys(ty, known);
        if let Some(found) = self.identify_by_keys(ty, &keys)? {
            return Ok(Some(found));
        }
        // a complete unique key that matches nothing names a new entity
        if !keys.is_empty() {
            return Ok(None);
        }

        for hint in &ty.match_hints {
            let Some(criteria) = criteria(hint, known) else {
                continue;
            };
            let hits = self
                .store
                .find(&ty.name, &criteria)
                .map_err(|e| NodeError::from_store(&e))?;
            match hits.as_slice() {
                [] => {}
                [one] => return Ok(Some(*one)),
                many => {
                    return Err(NodeError::new(
                        ErrorCode::AmbiguousMatch,
                        format!("{} existing {} match {}", many.len(), ty.name, hint.join(", ")),
                    )
                    .with_field(hint.join(",")));
                }
            }
        }
        Ok(None)
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    fn persist(&mut self, ty: &EntityType, profile: &Profile, known: &Fields, at: &At<'_>) -> Result<(EntityId, Action), NodeError> {
        match self.identify(ty, known)? {
            Some(identity) => self.update_existing(ty, identity, known),
            None => self.create_new(ty, profile, known, at),
        }
    }

    fn create_new(&mut self, ty: &EntityType, profile: &Profile, known: &Fields, at: &At<'_>) -> Result<(EntityId, Action), NodeError> {
        if at.must_exist || profile.existing_only {
            return Err(NodeError::new(
                ErrorCode::ReferenceNotFound,
                format!("no existing {} matches and none may be created here", ty.name),
            ));
        }

        for key in &ty.unique_keys {
            let present = |part: &String| known.get(part).is_some_and(|v| !v.is_null());
            if key.iter().any(present) {
                if let Some(missing) = key.iter().find(|part| !present(*part)) {
                    return Err(NodeError::new(
                        ErrorCode::IncompleteKey,
                        format!("unique key ({}) lacks {missing}", key.join(", ")),
                    )
                    .with_field(missing.as_str()));
                }
            }
        }

        let missing_field = ty
            .fields
            .iter()
            .filter(|f| f.is_required())
            .map(|f| &f.name)
            .chain(ty.foreign_keys().filter(|r| !r.nullable).map(|r| &r.name))
            .find(|name| !known.contains_key(*name));
        if let Some(name) = missing_field {
            return Err(NodeError::new(
                ErrorCode::MissingRequiredField,
                format!("{} needs {name} to be created", ty.name),
            )
            .with_field(name));
        }

        let identity = self
            .store
            .create(&ty.name, known)
            .map_err(|e| NodeError::from_store(&e))?;
        Ok((identity, Action::Created))
    }

    fn update_existing(&mut self, ty: &EntityType, identity: EntityId, known: &Fields) -> Result<(EntityId, Action), NodeError> {
        let stored = self
            .store
            .fields(identity)
            .map_err(|e| NodeError::from_store(&e))?;

        let changes: Fields = known
            .iter()
            .filter(|(name, value)| **name != ty.primary_key && stored.get(*name) != Some(*value))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        if changes.is_empty() {
            return Ok((identity, Action::Reused));
        }

        let mutable_keys = self.config.allow_key_mutation && self.store.supports_key_mutation();
        if !mutable_keys {
            if let Some(name) = changes.keys().find(|name| ty.is_key_field(name)) {
                return Err(NodeError::new(
                    ErrorCode::KeyImmutable,
                    format!("{}.{name} is part of a unique key and cannot change", ty.name),
                )
                .with_field(name));
            }
        }

        for relationship in ty.foreign_keys() {
            if changes.contains_key(&relationship.name) {
                if let Some(Value::EntityRef(old)) = stored.get(&relationship.name) {
                    self.record_candidates(&relationship.target, &[*old]);
                }
            }
        }

        self.store
            .update(identity, &changes)
            .map_err(|e| NodeError::from_store(&e))?;
        Ok((identity, Action::Updated))
    }
}

// =============================================================================
// Classification
// =============================================================================

fn classify<'d, 'r>(ty: &'r EntityType, document: &'d Document, profile: &Profile) -> Result<Classified<'d, 'r>, NodeError> {
    let mut node = Classified {
        known: Fields::new(),
        foreign: Vec::new(),
        walked: Vec::new(),
    };
    for (name, entry) in document.iter() {
        match ty.member(name) {
            None => {
                return Err(NodeError::new(
                    ErrorCode::UnknownField,
                    format!("{} has no member {name}", ty.name),
                )
                .with_field(name));
            }
            Some(Member::Relationship(r)) if profile.is_excluded(&r.name) => {
                return Err(NodeError::new(
                    ErrorCode::UnknownField,
                    format!("{}.{name} is not writable here", ty.name),
                )
                .with_field(name));
            }
            Some(Member::PrimaryKey) => match entry {
                Field::Scalar(Value::Null) => {}
                Field::Scalar(value) => {
                    let key = as_key(value).ok_or_else(|| {
                        NodeError::new(
                            ErrorCode::TypeMismatch,
                            format!("{value} is not a {} key", ty.name),
                        )
                        .with_field(name)
                    })?;
                    node.known.insert(name.to_string(), Value::Int(key.key()));
                }
                _ => return Err(shape_error(ty, name, entry)),
            },
            Some(Member::Field(field)) => {
                let Field::Scalar(value) = entry else {
                    return Err(shape_error(ty, name, entry));
                };
                let value = coerce(field.ty, value.clone());
                if value.is_null() && !field.nullable {
                    return Err(NodeError::new(
                        ErrorCode::MissingRequiredField,
                        format!("{}.{name} may not be null", ty.name),
                    )
                    .with_field(name));
                }
                if !field.accepts(&value) {
                    return Err(NodeError::new(
                        ErrorCode::TypeMismatch,
                        format!("{}.{name} expects {}, got {value}", ty.name, field.ty),
                    )
                    .with_field(name));
                }
                node.known.insert(name.to_string(), value);
            }
            Some(Member::Relationship(_)) => {}
        }
    }
    // relationships are handled in declaration order, not document order
    for r in &ty.relationships {
        let Some(entry) = document.get(&r.name) else {
            continue;
        };
        if r.is_foreign_key() {
            node.foreign.push((r, entry));
        } else {
            node.walked.push((r, entry));
        }
    }
    Ok(node)
}

fn shape_error(ty: &EntityType, name: &str, entry: &Field) -> NodeError {
    NodeError::new(
        ErrorCode::InvalidShape,
        format!("{}.{name} takes a scalar, got {}", ty.name, entry.shape()),
    )
    .with_field(name)
}

/// Promotes integers written to float fields, matching what the store keeps.
#[allow(clippy::cast_precision_loss)]
fn coerce(ty: Type, value: Value) -> Value {
    match (ty, value) {
        (Type::Float, Value::Int(n)) => Value::Float(n as f64),
        (_, value) => value,
    }
}

/// The single-valued relationship on `relationship`'s target pointing back
/// at the declaring type, if there is one.
pub(crate) fn back_relationship<'r>(
    target: &'r EntityType,
    relationship: &RelationshipDescriptor,
) -> Option<&'r RelationshipDescriptor> {
    let name = relationship.reverse_name.as_deref()?;
    target
        .relationship(name)
        .filter(|r| r.cardinality == Cardinality::Single)
}
