//! The deep update-or-create entry points.

use deepgraph_foundation::{Document, Result};
use deepgraph_storage::EntityStoreAdapter;
use tracing::{info, info_span};

use crate::config::{EngineConfig, SweepPolicy};
use crate::operation::Operation;
use crate::profile::ProfileRegistry;
use crate::result::{OperationReport, Outcome};

/// Reconciles nested documents against an entity store.
///
/// Each call runs in one store transaction: either every create, update,
/// link and deletion it performs is committed, or none is.
#[derive(Clone, Debug, Default)]
pub struct DeepWriter {
    config: EngineConfig,
    profiles: ProfileRegistry,
}

impl DeepWriter {
    /// Creates a writer with unrestricted profiles.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            profiles: ProfileRegistry::new(),
        }
    }

    /// Sets the write profiles.
    #[must_use]
    pub fn with_profiles(mut self, profiles: ProfileRegistry) -> Self {
        self.profiles = profiles;
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns the write profiles.
    #[must_use]
    pub fn profiles(&self) -> &ProfileRegistry {
        &self.profiles
    }

    /// Resolves `document` as an entity of type `root`, creating, updating
    /// and linking whatever it describes, then deletes entities of
    /// `delete_types` that were related to the walked nodes and are no
    /// longer mentioned.
    ///
    /// Node failures do not raise: they are reported in the result and
    /// the transaction is rolled back.
    ///
    /// # Errors
    ///
    /// Returns an error if `root` or a delete type is not registered, or
    /// the store cannot open, commit or roll back the transaction.
    pub fn deep_update_or_create<S>(
        &self,
        store: &mut S,
        root: &str,
        document: &Document,
        delete_types: &[&str],
    ) -> Result<OperationReport>
    where
        S: EntityStoreAdapter + ?Sized,
    {
        self.run(store, root, &[("$".to_string(), document)], delete_types, true)
    }

    /// Resolves several root documents in one transaction.
    ///
    /// Results are paths `$[0]`, `$[1]`, ... in submission order.
    ///
    /// # Errors
    ///
    /// Same as [`deep_update_or_create`](Self::deep_update_or_create).
    pub fn deep_update_or_create_batch<S>(
        &self,
        store: &mut S,
        root: &str,
        documents: &[Document],
        delete_types: &[&str],
    ) -> Result<OperationReport>
    where
        S: EntityStoreAdapter + ?Sized,
    {
        let roots: Vec<_> = documents
            .iter()
            .enumerate()
            .map(|(index, document)| (format!("$[{index}]"), document))
            .collect();
        self.run(store, root, &roots, delete_types, true)
    }

    /// Resolves `document` without deleting anything.
    ///
    /// # Errors
    ///
    /// Same as [`deep_update_or_create`](Self::deep_update_or_create).
    pub fn deep_create<S>(&self, store: &mut S, root: &str, document: &Document) -> Result<OperationReport>
    where
        S: EntityStoreAdapter + ?Sized,
    {
        self.run(store, root, &[("$".to_string(), document)], &[], false)
    }

    fn run<S>(
        &self,
        store: &mut S,
        root: &str,
        documents: &[(String, &Document)],
        delete_types: &[&str],
        sweep: bool,
    ) -> Result<OperationReport>
    where
        S: EntityStoreAdapter + ?Sized,
    {
        let registry = store.registry();
        registry.get(root)?;
        for entity_type in delete_types {
            registry.get(entity_type)?;
        }

        let span = info_span!("deep_update_or_create", root, use_case = %self.config.use_case);
        let _enter = span.enter();

        store.begin()?;
        let mut operation = Operation::new(store, registry, &self.config, &self.profiles, delete_types);
        for (path, document) in documents {
            operation.resolve_root(root, document, path.clone());
        }

        let node_errors = operation.has_errors();
        let deletions = if sweep && !node_errors {
            operation.sweep()
        } else {
            Vec::new()
        };
        let results = operation.finish();

        let fatal = deletions.iter().any(|d| d.fatal);
        let failed = deletions.iter().filter(|d| !d.is_ok()).count();
        let outcome = if node_errors || fatal {
            Outcome::Conflict
        } else if failed > 0 {
            match self.config.sweep_policy {
                SweepPolicy::BestEffort => Outcome::SweepIncomplete,
                SweepPolicy::Strict => Outcome::Conflict,
            }
        } else {
            Outcome::Success
        };

        let committed = outcome != Outcome::Conflict;
        if committed {
            store.commit()?;
            info!(nodes = results.len(), deleted = deletions.len() - failed, %outcome, "committed");
        } else {
            store.rollback()?;
            info!(nodes = results.len(), sweep_failures = failed, %outcome, "rolled back");
        }

        Ok(OperationReport {
            outcome,
            committed,
            results,
            deletions,
        })
    }
}
