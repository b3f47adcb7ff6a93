//! Relationship storage with bidirectional indices.
//!
//! Relationships connect entities with typed edges. Each edge set is keyed
//! by the forward relationship that owns it (`Owner.name`); reverse views
//! read the same set through the reverse index. Both indices keep edges in
//! link order so collections can be rendered in the order they were given.

use std::sync::Arc;

use deepgraph_foundation::EntityId;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::schema::RelationKind;

type Index = im::HashMap<EntityId, im::HashMap<Arc<str>, im::Vector<EntityId>>>;

/// Stores relationship edges between entities.
///
/// Maintains bidirectional indices for efficient traversal:
/// - Forward: source -> edge set -> targets
/// - Reverse: target -> edge set -> sources
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RelationshipStore {
    forward: Index,
    reverse: Index,
}

impl RelationshipStore {
    /// Creates a new empty relationship store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an edge, enforcing the cardinality of the owning relationship.
    ///
    /// Linking an existing edge is idempotent. Edges that would violate the
    /// cardinality of `kind` are replaced, and the replaced `(source, target)`
    /// pairs are returned.
    pub fn link(
        &mut self,
        source: EntityId,
        edge: &str,
        target: EntityId,
        kind: RelationKind,
    ) -> Vec<(EntityId, EntityId)> {
        if self.has_edge(source, edge, target) {
            return Vec::new();
        }

        let single_target = matches!(kind, RelationKind::OneToOne | RelationKind::ManyToOne);
        let single_source = matches!(kind, RelationKind::OneToOne | RelationKind::OneToMany);

        let mut replaced = Vec::new();
        if single_target {
            replaced.extend(self.targets(source, edge).map(|old| (source, old)));
        }
        if single_source {
            replaced.extend(self.sources(target, edge).map(|old| (old, target)));
        }
        for (old_source, old_target) in &replaced {
            self.unlink(*old_source, edge, *old_target);
        }

        let edge: Arc<str> = Arc::from(edge);
        push(&mut self.forward, source, &edge, target);
        push(&mut self.reverse, target, &edge, source);
        replaced
    }

    /// Removes an edge. Returns true if it existed.
    pub fn unlink(&mut self, source: EntityId, edge: &str, target: EntityId) -> bool {
        let removed = remove(&mut self.forward, source, edge, target);
        remove(&mut self.reverse, target, edge, source);
        removed
    }

    /// Gets targets of an edge set from a source (forward traversal), in link order.
    pub fn targets<'a>(&'a self, source: EntityId, edge: &str) -> impl Iterator<Item = EntityId> + 'a {
        lookup(&self.forward, source, edge)
    }

    /// Gets sources pointing to a target (reverse traversal), in link order.
    pub fn sources<'a>(&'a self, target: EntityId, edge: &str) -> impl Iterator<Item = EntityId> + 'a {
        lookup(&self.reverse, target, edge)
    }

    /// Checks if a specific edge exists.
    #[must_use]
    pub fn has_edge(&self, source: EntityId, edge: &str, target: EntityId) -> bool {
        self.forward
            .get(&source)
            .and_then(|m| m.get(edge))
            .is_some_and(|targets| targets.contains(&target))
    }

    /// Removes every edge touching `entity`, in both directions.
    pub fn remove_entity(&mut self, entity: EntityId) {
        if let Some(outgoing) = self.forward.remove(&entity) {
            for (edge, targets) in outgoing {
                for target in targets {
                    remove(&mut self.reverse, target, &edge, entity);
                }
            }
        }
        if let Some(incoming) = self.reverse.remove(&entity) {
            for (edge, sources) in incoming {
                for source in sources {
                    remove(&mut self.forward, source, &edge, entity);
                }
            }
        }
    }

    /// Returns all edges leaving or entering an entity as
    /// `(edge set, other entity, outgoing)`.
    #[must_use]
    pub fn edges_of(&self, entity: EntityId) -> Vec<(Arc<str>, EntityId, bool)> {
        let mut result = Vec::new();
        if let Some(outgoing) = self.forward.get(&entity) {
            for (edge, targets) in outgoing {
                result.extend(targets.iter().map(|t| (Arc::clone(edge), *t, true)));
            }
        }
        if let Some(incoming) = self.reverse.get(&entity) {
            for (edge, sources) in incoming {
                result.extend(sources.iter().map(|s| (Arc::clone(edge), *s, false)));
            }
        }
        result
    }

    /// Returns the total number of edges.
    #[must_use]
    pub fn len(&self) -> usize {
        self.forward
            .values()
            .flat_map(|edges| edges.values())
            .map(|list| list.len())
            .sum()
    }

    /// Returns true if there are no edges.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn lookup<'a>(index: &'a Index, from: EntityId, edge: &str) -> impl Iterator<Item = EntityId> + 'a {
    index
        .get(&from)
        .and_then(|m| m.get(edge))
        .into_iter()
        .flat_map(|list| list.iter().copied())
}

fn push(index: &mut Index, from: EntityId, edge: &Arc<str>, to: EntityId) {
    let mut edges = index.get(&from).cloned().unwrap_or_default();
    let mut list = edges.get(edge).cloned().unwrap_or_default();
    list.push_back(to);
    edges.insert(Arc::clone(edge), list);
    index.insert(from, edges);
}

fn remove(index: &mut Index, from: EntityId, edge: &str, to: EntityId) -> bool {
    let Some(edges) = index.get_mut(&from) else {
        return false;
    };
    let Some(list) = edges.get_mut(edge) else {
        return false;
    };
    let Some(position) = list.index_of(&to) else {
        return false;
    };
    list.remove(position);
    if list.is_empty() {
        edges.remove(edge);
    }
    if edges.is_empty() {
        index.remove(&from);
    }
    true
}
