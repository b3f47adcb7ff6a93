//! Result collection in traversal order.
//!
//! A node's slot is reserved when the resolver first reaches it, before
//! any of its foreign-key children are resolved, so the output stays in
//! pre-order even though those children are persisted first.

use tracing::{debug, warn};

use crate::result::{NodeError, NodeResult, ResolutionResult};

/// Index of a reserved result.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Slot(usize);

/// Accumulates node results for one operation.
#[derive(Debug, Default)]
pub struct ResultCollector {
    entries: Vec<(String, String, usize, Option<ResolutionResult>)>,
}

impl ResultCollector {
    /// Creates an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves the next slot in pre-order.
    pub fn reserve(&mut self, path: impl Into<String>, entity_type: &str, depth: usize) -> Slot {
        self.entries
            .push((path.into(), entity_type.to_string(), depth, None));
        Slot(self.entries.len() - 1)
    }

    /// Records the outcome of a slot.
    ///
    /// A slot may be filled twice: a parent that resolved can still fail
    /// later when one of its required relationships fails.
    pub fn fill(&mut self, slot: Slot, result: ResolutionResult) {
        let Some(entry) = self.entries.get_mut(slot.0) else {
            return;
        };
        match &result {
            ResolutionResult::Resolved { identity, action } => {
                debug!(path = %entry.0, entity_type = %entry.1, %identity, %action, "resolved");
            }
            ResolutionResult::Error(error) => {
                warn!(path = %entry.0, entity_type = %entry.1, %error, "node failed");
            }
        }
        entry.3 = Some(result);
    }

    /// Records a failure for a slot.
    pub fn fail(&mut self, slot: Slot, error: NodeError) {
        self.fill(slot, ResolutionResult::Error(error));
    }

    /// Returns the outcome recorded for a slot.
    #[must_use]
    pub fn get(&self, slot: Slot) -> Option<&ResolutionResult> {
        self.entries.get(slot.0).and_then(|e| e.3.as_ref())
    }

    /// Returns true if any slot holds an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.entries
            .iter()
            .any(|e| e.3.as_ref().is_some_and(ResolutionResult::is_error))
    }

    /// Returns the number of reserved slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing was reserved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Consumes the collector, returning results in pre-order.
    ///
    /// Only filled slots are returned.
    #[must_use]
    pub fn finish(self) -> Vec<NodeResult> {
        self.entries
            .into_iter()
            .filter_map(|(path, entity_type, depth, result)| {
                result.map(|result| NodeResult {
                    path,
                    entity_type,
                    depth,
                    result,
                })
            })
            .collect()
    }
}
