//! Reconciliation tracking.
//!
//! [`TouchedSet`] records every entity a deep write resolved, per type.
//! [`SweepCandidates`] records the entities that were related to walked
//! nodes before the write changed them. Orphans are the candidates that
//! were never touched.

use std::collections::{BTreeMap, BTreeSet};

use deepgraph_foundation::EntityId;

/// Identities resolved (created, updated or reused) during one operation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TouchedSet {
    by_type: BTreeMap<String, BTreeSet<EntityId>>,
}

impl TouchedSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an identity. Returns true if it was not recorded yet.
    pub fn insert(&mut self, entity_type: &str, identity: EntityId) -> bool {
        self.by_type
            .entry(entity_type.to_string())
            .or_default()
            .insert(identity)
    }

    /// Checks whether an identity was touched.
    #[must_use]
    pub fn contains(&self, entity_type: &str, identity: EntityId) -> bool {
        self.by_type
            .get(entity_type)
            .is_some_and(|ids| ids.contains(&identity))
    }

    /// Checks whether an identity was touched under any type.
    #[must_use]
    pub fn contains_id(&self, identity: EntityId) -> bool {
        self.by_type.values().any(|ids| ids.contains(&identity))
    }

    /// Returns the identities touched for one type.
    pub fn of_type<'a>(&'a self, entity_type: &str) -> impl Iterator<Item = EntityId> + 'a {
        self.by_type
            .get(entity_type)
            .into_iter()
            .flat_map(|ids| ids.iter().copied())
    }

    /// Iterates every `(type, identity)` pair.
    pub fn iter(&self) -> impl Iterator<Item = (&str, EntityId)> {
        self.by_type
            .iter()
            .flat_map(|(t, ids)| ids.iter().map(move |id| (t.as_str(), *id)))
    }

    /// Returns the number of touched identities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_type.values().map(BTreeSet::len).sum()
    }

    /// Returns true if nothing was touched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Entities that were related to walked nodes before the walk, in the
/// order they were first seen.
#[derive(Clone, Debug, Default)]
pub struct SweepCandidates {
    entries: Vec<(String, EntityId)>,
    seen: BTreeSet<EntityId>,
}

impl SweepCandidates {
    /// Creates an empty candidate list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a candidate; repeats are ignored.
    pub fn record(&mut self, entity_type: &str, identity: EntityId) {
        if self.seen.insert(identity) {
            self.entries.push((entity_type.to_string(), identity));
        }
    }

    /// Returns the candidates that were never touched.
    #[must_use]
    pub fn orphans(&self, touched: &TouchedSet) -> Vec<(String, EntityId)> {
        self.entries
            .iter()
            .filter(|(t, id)| !touched.contains(t, *id))
            .cloned()
            .collect()
    }

    /// Returns the number of candidates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no candidates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
