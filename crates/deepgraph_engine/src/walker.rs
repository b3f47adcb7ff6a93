//! Relationship walking: resolving and linking the children of a node.

use std::sync::Arc;

use deepgraph_foundation::{EntityId, Field};
use deepgraph_storage::{Cardinality, EntityStoreAdapter, RelationKind, RelationshipDescriptor};

use crate::operation::{At, Back, Operation, Resolution};
use crate::profile::Profile;
use crate::resolver::back_relationship;
use crate::result::{ErrorCode, NodeError};

impl<S: EntityStoreAdapter + ?Sized> Operation<'_, S> {
    /// Resolves and links the children a node holds through `relationship`.
    ///
    /// Returns the error the parent takes on: a failed child of a required
    /// relationship, or a store failure while linking.
    pub(crate) fn walk(
        &mut self,
        parent: EntityId,
        relationship: &RelationshipDescriptor,
        entry: &Field,
        profile: &Profile,
        at: &At<'_>,
    ) -> Option<NodeError> {
        let registry = Arc::clone(&self.registry);
        let back = registry
            .entity_type(&relationship.target)
            .and_then(|target| back_relationship(target, relationship))
            .map(|r| Back {
                parent,
                name: &r.name,
                foreign_key: r.is_foreign_key(),
            });
        let child_at = At {
            path: format!("{}.{}", at.path, relationship.name),
            depth: at.depth + 1,
            must_exist: profile.requires_existing(relationship),
            back,
        };

        let prior = match self.store.related(parent, &relationship.name) {
            Ok(prior) => prior,
            Err(e) => return Some(NodeError::from_store(&e).with_field(&relationship.name)),
        };
        self.record_candidates(&relationship.target, &prior);

        match relationship.cardinality {
            Cardinality::Collection => self.walk_collection(parent, relationship, entry, &prior, child_at),
            Cardinality::Single => self.walk_single(parent, relationship, entry, &prior, &child_at),
        }
    }

    fn walk_collection(
        &mut self,
        parent: EntityId,
        relationship: &RelationshipDescriptor,
        entry: &Field,
        prior: &[EntityId],
        at: At<'_>,
    ) -> Option<NodeError> {
        let items: &[Field] = match entry {
            Field::List(items) => items,
            Field::Scalar(value) if value.is_null() => &[],
            other => {
                let error = NodeError::new(
                    ErrorCode::InvalidShape,
                    format!("{} takes a list, got {}", relationship.name, other.shape()),
                )
                .with_field(&relationship.name);
                let slot = self
                    .collector
                    .reserve(at.path.clone(), &relationship.target, at.depth);
                self.collector.fail(slot, error.clone());
                return Some(error);
            }
        };

        let mut kept = Vec::with_capacity(items.len());
        let mut failure = None;
        for (index, item) in items.iter().enumerate() {
            let item_at = At {
                path: format!("{}[{index}]", at.path),
                ..at.clone()
            };
            if let Some(error) = self.resolve_and_link(parent, relationship, item, &item_at, &mut kept) {
                failure.get_or_insert(error);
            }
        }

        if self.unlinks_stale(relationship) {
            for stale in prior.iter().filter(|id| !kept.contains(id)) {
                if let Err(e) = self.store.unlink(parent, &relationship.name, *stale) {
                    return Some(NodeError::from_store(&e).with_field(&relationship.name));
                }
            }
        }
        failure
    }

    fn walk_single(
        &mut self,
        parent: EntityId,
        relationship: &RelationshipDescriptor,
        entry: &Field,
        prior: &[EntityId],
        at: &At<'_>,
    ) -> Option<NodeError> {
        if entry.is_null() {
            if !self.clears(relationship) {
                return Some(
                    NodeError::new(
                        ErrorCode::MissingRequiredField,
                        format!("{} may not be null", relationship.name),
                    )
                    .with_field(&relationship.name),
                );
            }
            for old in prior {
                if let Err(e) = self.store.unlink(parent, &relationship.name, *old) {
                    return Some(NodeError::from_store(&e).with_field(&relationship.name));
                }
            }
            return None;
        }
        let mut kept = Vec::with_capacity(1);
        self.resolve_and_link(parent, relationship, entry, at, &mut kept)
    }

    fn resolve_and_link(
        &mut self,
        parent: EntityId,
        relationship: &RelationshipDescriptor,
        entry: &Field,
        at: &At<'_>,
        kept: &mut Vec<EntityId>,
    ) -> Option<NodeError> {
        match self.resolve(&relationship.target, entry, at) {
            (slot, Resolution::Done(child)) => {
                if let Err(e) = self.store.link(parent, &relationship.name, child) {
                    let error = NodeError::from_store(&e).with_field(&relationship.name);
                    self.collector.fail(slot, error.clone());
                    return required_failure(relationship, &error);
                }
                kept.push(child);
                None
            }
            (slot, Resolution::Pending(frame)) => {
                self.defer(frame, parent, &relationship.name, slot);
                None
            }
            (_, Resolution::Failed(error)) => required_failure(relationship, &error),
        }
    }

    /// Whether a single relationship may be set to null.
    ///
    /// A reverse view cannot be cleared when the target holds it as a
    /// required foreign key.
    fn clears(&self, relationship: &RelationshipDescriptor) -> bool {
        match relationship.kind {
            RelationKind::ReverseOneToOne => self
                .registry
                .relationship(&relationship.target, relationship.reverse_name.as_deref().unwrap_or_default())
                .is_ok_and(|forward| !forward.is_foreign_key() || forward.nullable),
            _ => relationship.nullable,
        }
    }

    /// Whether links missing from a submitted collection are removed.
    ///
    /// A child held by a required foreign key cannot be unlinked; it stays
    /// with its parent unless the sweep deletes it.
    fn unlinks_stale(&self, relationship: &RelationshipDescriptor) -> bool {
        match relationship.kind {
            RelationKind::ManyToMany | RelationKind::OneToMany => true,
            RelationKind::ReverseMany => self
                .registry
                .relationship(&relationship.target, relationship.reverse_name.as_deref().unwrap_or_default())
                .is_ok_and(|forward| forward.kind == RelationKind::ManyToMany || forward.nullable),
            RelationKind::OneToOne | RelationKind::ManyToOne | RelationKind::ReverseOneToOne => false,
        }
    }
}

fn required_failure(relationship: &RelationshipDescriptor, child: &NodeError) -> Option<NodeError> {
    relationship.required.then(|| {
        NodeError::new(
            child.code,
            format!("required {} failed: {}", relationship.name, child.reason),
        )
        .with_field(&relationship.name)
    })
}
