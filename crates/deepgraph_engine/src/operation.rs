//! State owned by one deep write while it runs.

use std::collections::BTreeSet;
use std::sync::Arc;

use deepgraph_foundation::{EntityId, Value};
use deepgraph_storage::{EntityStoreAdapter, EntityType, Fields, SchemaRegistry};

use crate::collector::{ResultCollector, Slot};
use crate::config::EngineConfig;
use crate::profile::ProfileRegistry;
use crate::result::{Action, ErrorCode, NodeError, NodeResult, ResolutionResult};
use crate::tracker::{SweepCandidates, TouchedSet};

/// Everything one operation reads and accumulates.
///
/// Nothing here outlives the operation; the store is borrowed for its
/// duration and the registry is shared read-only.
pub(crate) struct Operation<'a, S: EntityStoreAdapter + ?Sized> {
    pub(crate) store: &'a mut S,
    pub(crate) registry: Arc<SchemaRegistry>,
    pub(crate) config: &'a EngineConfig,
    pub(crate) profiles: &'a ProfileRegistry,
    pub(crate) sweep_types: BTreeSet<String>,
    pub(crate) touched: TouchedSet,
    pub(crate) candidates: SweepCandidates,
    pub(crate) collector: ResultCollector,
    pub(crate) ancestors: Vec<Frame>,
}

/// A node on the current resolution path.
#[derive(Debug)]
pub(crate) struct Frame {
    pub(crate) entity_type: String,
    /// Known once the node is identified or created.
    pub(crate) identity: Option<EntityId>,
    /// Complete unique-key criteria the node was submitted with.
    pub(crate) keys: Vec<Fields>,
    /// Links waiting for this node to be created.
    pub(crate) deferred: Vec<Deferred>,
}

/// A link from `holder` through `relationship` to a node that did not
/// exist yet when the link was reached.
#[derive(Debug)]
pub(crate) struct Deferred {
    pub(crate) holder: EntityId,
    pub(crate) relationship: String,
    pub(crate) slot: Slot,
}

/// How a node resolved, as seen by the node that reached it.
#[derive(Debug)]
pub(crate) enum Resolution {
    /// The node maps to this entity.
    Done(EntityId),
    /// The node names the ancestor at this stack index, which is not
    /// created yet.
    Pending(usize),
    /// The node failed.
    Failed(NodeError),
}

/// Where a node sits in the document.
#[derive(Clone, Debug)]
pub(crate) struct At<'r> {
    pub(crate) path: String,
    pub(crate) depth: usize,
    /// The node must resolve to an existing entity.
    pub(crate) must_exist: bool,
    /// The parent the node is nested under, when its type points back.
    pub(crate) back: Option<Back<'r>>,
}

/// A single-valued relationship on a child pointing back at its parent.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Back<'r> {
    pub(crate) parent: EntityId,
    pub(crate) name: &'r str,
    pub(crate) foreign_key: bool,
}

impl<'a, S: EntityStoreAdapter + ?Sized> Operation<'a, S> {
    pub(crate) fn new(
        store: &'a mut S,
        registry: Arc<SchemaRegistry>,
        config: &'a EngineConfig,
        profiles: &'a ProfileRegistry,
        sweep_types: &[&str],
    ) -> Self {
        Self {
            store,
            registry,
            config,
            profiles,
            sweep_types: sweep_types.iter().map(|t| (*t).to_string()).collect(),
            touched: TouchedSet::new(),
            candidates: SweepCandidates::new(),
            collector: ResultCollector::new(),
            ancestors: Vec::new(),
        }
    }

    pub(crate) fn is_swept(&self, entity_type: &str) -> bool {
        self.sweep_types.contains(entity_type)
    }

    pub(crate) fn record_candidates(&mut self, entity_type: &str, identities: &[EntityId]) {
        if self.is_swept(entity_type) {
            for identity in identities {
                self.candidates.record(entity_type, *identity);
            }
        }
    }

    pub(crate) fn resolved(&mut self, slot: Slot, entity_type: &str, identity: EntityId, action: Action) {
        self.touched.insert(entity_type, identity);
        self.collector
            .fill(slot, ResolutionResult::Resolved { identity, action });
    }

    pub(crate) fn is_ancestor(&self, identity: EntityId) -> bool {
        self.ancestors.iter().any(|f| f.identity == Some(identity))
    }

    /// Finds an ancestor that is not created yet and was submitted with one
    /// of `keys`.
    pub(crate) fn pending_ancestor(&self, entity_type: &str, keys: &[Fields]) -> Option<usize> {
        self.ancestors.iter().position(|frame| {
            frame.identity.is_none()
                && frame.entity_type == entity_type
                && frame.keys.iter().any(|k| keys.contains(k))
        })
    }

    pub(crate) fn push_frame(&mut self, entity_type: &str, identity: Option<EntityId>, keys: Vec<Fields>) -> usize {
        self.ancestors.push(Frame {
            entity_type: entity_type.to_string(),
            identity,
            keys,
            deferred: Vec::new(),
        });
        self.ancestors.len() - 1
    }

    pub(crate) fn defer(&mut self, frame: usize, holder: EntityId, relationship: &str, slot: Slot) {
        if let Some(frame) = self.ancestors.get_mut(frame) {
            frame.deferred.push(Deferred {
                holder,
                relationship: relationship.to_string(),
                slot,
            });
        }
    }

    /// Records the identity of a frame and performs the links that waited
    /// for it.
    pub(crate) fn settle(&mut self, frame: usize, identity: EntityId) {
        let Some(entry) = self.ancestors.get_mut(frame) else {
            return;
        };
        entry.identity = Some(identity);
        let entity_type = entry.entity_type.clone();
        let deferred = std::mem::take(&mut entry.deferred);
        for link in deferred {
            match self.store.link(link.holder, &link.relationship, identity) {
                Ok(()) => self.resolved(link.slot, &entity_type, identity, Action::Reused),
                Err(e) => self.collector.fail(
                    link.slot,
                    NodeError::from_store(&e).with_field(link.relationship),
                ),
            }
        }
    }

    /// Leaves a node. Links still waiting for it fail.
    pub(crate) fn pop_frame(&mut self) {
        let Some(frame) = self.ancestors.pop() else {
            return;
        };
        for link in frame.deferred {
            self.collector.fail(
                link.slot,
                NodeError::new(
                    ErrorCode::ReferenceNotFound,
                    format!("{} it refers to was not resolved", frame.entity_type),
                )
                .with_field(link.relationship),
            );
        }
    }

    pub(crate) fn has_errors(&self) -> bool {
        self.collector.has_errors()
    }

    pub(crate) fn finish(self) -> Vec<NodeResult> {
        self.collector.finish()
    }
}

/// Complete unique-key criteria present in `known`, primary key first.
pub(crate) fn complete_keys(ty: &EntityType, known: &Fields) -> Vec<Fields> {
    let mut keys = Vec::new();
    if let Some(pk) = known.get(&ty.primary_key) {
        keys.push(Fields::from([(ty.primary_key.clone(), pk.clone())]));
    }
    for key in &ty.unique_keys {
        if let Some(criteria) = criteria(key, known) {
            keys.push(criteria);
        }
    }
    keys
}

/// Criteria for a field-set, if every part has a non-null value.
pub(crate) fn criteria(parts: &[String], known: &Fields) -> Option<Fields> {
    parts
        .iter()
        .map(|part| match known.get(part) {
            Some(value) if !value.is_null() => Some((part.clone(), value.clone())),
            _ => None,
        })
        .collect()
}

/// Reads a primary-key reference.
pub(crate) fn as_key(value: &Value) -> Option<EntityId> {
    match value {
        Value::EntityRef(id) => Some(*id),
        Value::Int(key) => EntityId::from_key(*key),
        _ => None,
    }
}
