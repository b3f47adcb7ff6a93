//! Deletion of orphans left behind by a deep write.

use deepgraph_storage::EntityStoreAdapter;
use tracing::{debug, warn};

use crate::operation::Operation;
use crate::result::{DeletionResult, ErrorCode, NodeError};

impl<S: EntityStoreAdapter + ?Sized> Operation<'_, S> {
    /// Deletes every sweep candidate that was not touched.
    ///
    /// A failed deletion is recorded and the sweep moves on. A deletion
    /// whose cascade removes a touched entity is fatal: the operation can
    /// no longer report what it resolved.
    pub(crate) fn sweep(&mut self) -> Vec<DeletionResult> {
        let mut results = Vec::new();
        for (entity_type, identity) in self.candidates.orphans(&self.touched) {
            // already removed by an earlier cascade
            if !self.store.exists(identity) {
                continue;
            }
            let result = match self.store.delete(identity) {
                Ok(deleted) => match deleted.iter().find(|id| self.touched.contains_id(**id)) {
                    Some(lost) => {
                        let error = NodeError::new(
                            ErrorCode::DeleteFailed,
                            format!("deleting {identity} would also delete {lost}, which this operation resolved"),
                        );
                        warn!(%entity_type, %identity, %error, "sweep removed a resolved entity");
                        DeletionResult {
                            entity_type,
                            identity,
                            deleted: Vec::new(),
                            error: Some(error),
                            fatal: true,
                        }
                    }
                    None => {
                        debug!(%entity_type, %identity, cascaded = deleted.len().saturating_sub(1), "orphan deleted");
                        DeletionResult {
                            entity_type,
                            identity,
                            deleted,
                            error: None,
                            fatal: false,
                        }
                    }
                },
                Err(e) => {
                    let error = NodeError::new(ErrorCode::DeleteFailed, e.to_string());
                    warn!(%entity_type, %identity, %error, "orphan not deleted");
                    DeletionResult {
                        entity_type,
                        identity,
                        deleted: Vec::new(),
                        error: Some(error),
                        fatal: false,
                    }
                }
            };
            let fatal = result.fatal;
            results.push(result);
            if fatal {
                break;
            }
        }
        results
    }
}
