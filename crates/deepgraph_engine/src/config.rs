//! Engine configuration.

/// What to do when the deletion sweep cannot remove an orphan.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SweepPolicy {
    /// Commit the update phase and report the failed deletions.
    #[default]
    BestEffort,
    /// Roll the whole operation back on any failed deletion.
    Strict,
}

/// Options for one [`DeepWriter`](crate::DeepWriter).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Use case selecting write profiles (empty for the default).
    pub use_case: String,
    /// Sweep failure policy.
    pub sweep_policy: SweepPolicy,
    /// Whether unique-key fields may change when the store supports it.
    pub allow_key_mutation: bool,
    /// Maximum nesting depth before a node fails with `DepthLimitExceeded`.
    pub max_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            use_case: String::new(),
            sweep_policy: SweepPolicy::BestEffort,
            allow_key_mutation: true,
            max_depth: 64,
        }
    }
}

impl EngineConfig {
    /// Default configuration: best-effort sweep, key mutation left to the store.
    #[must_use]
    pub fn best_effort() -> Self {
        Self::default()
    }

    /// Strict configuration: any sweep failure rolls back, keys never change.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            sweep_policy: SweepPolicy::Strict,
            allow_key_mutation: false,
            ..Self::default()
        }
    }

    /// Sets the use case.
    #[must_use]
    pub fn with_use_case(mut self, use_case: impl Into<String>) -> Self {
        self.use_case = use_case.into();
        self
    }

    /// Sets the sweep policy.
    #[must_use]
    pub fn with_sweep_policy(mut self, policy: SweepPolicy) -> Self {
        self.sweep_policy = policy;
        self
    }

    /// Allows or forbids unique-key mutation.
    #[must_use]
    pub fn with_key_mutation(mut self, allowed: bool) -> Self {
        self.allow_key_mutation = allowed;
        self
    }

    /// Sets the maximum nesting depth.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}
