//! Write profiles per entity type and use case.
//!
//! A profile narrows what a document may do to one entity type: some
//! relationships can be closed to writing, some can be restricted to
//! already-existing targets, and a type can refuse creation altogether.
//! Profiles are looked up by `(type, use case)`, falling back to the type's
//! default profile and then to the registry-wide default.

use std::collections::{BTreeSet, HashMap};

use deepgraph_storage::RelationshipDescriptor;

/// Write restrictions for one entity type.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Profile {
    /// Relationships a document may not write.
    pub excluded: BTreeSet<String>,
    /// Relationships whose targets must already exist.
    pub must_exist: BTreeSet<String>,
    /// Whether nodes of this type must already exist.
    pub existing_only: bool,
}

impl Profile {
    /// Creates an unrestricted profile.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Closes a relationship to writing.
    #[must_use]
    pub fn exclude(mut self, relationship: impl Into<String>) -> Self {
        self.excluded.insert(relationship.into());
        self
    }

    /// Requires the targets of a relationship to exist already.
    #[must_use]
    pub fn require_existing(mut self, relationship: impl Into<String>) -> Self {
        self.must_exist.insert(relationship.into());
        self
    }

    /// Refuses to create nodes of this type.
    #[must_use]
    pub fn existing_only(mut self) -> Self {
        self.existing_only = true;
        self
    }

    /// Returns true if a document may not write `relationship`.
    #[must_use]
    pub fn is_excluded(&self, relationship: &str) -> bool {
        self.excluded.contains(relationship)
    }

    /// Returns true if targets of `relationship` must exist already.
    #[must_use]
    pub fn requires_existing(&self, relationship: &RelationshipDescriptor) -> bool {
        relationship.must_exist || self.must_exist.contains(&relationship.name)
    }
}

/// Injected mapping from `(entity type, use case)` to [`Profile`].
#[derive(Clone, Debug, Default)]
pub struct ProfileRegistry {
    profiles: HashMap<(String, String), Profile>,
    default: Profile,
}

impl ProfileRegistry {
    /// Creates a registry where every type uses an unrestricted profile.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the profile used when nothing more specific is registered.
    #[must_use]
    pub fn with_default(mut self, profile: Profile) -> Self {
        self.default = profile;
        self
    }

    /// Registers a profile. An empty use case makes it the type's default.
    pub fn register(&mut self, entity_type: impl Into<String>, use_case: impl Into<String>, profile: Profile) {
        self.profiles
            .insert((entity_type.into(), use_case.into()), profile);
    }

    /// Registers a profile, builder style.
    #[must_use]
    pub fn with_profile(
        mut self,
        entity_type: impl Into<String>,
        use_case: impl Into<String>,
        profile: Profile,
    ) -> Self {
        self.register(entity_type, use_case, profile);
        self
    }

    /// Resolves the profile for a type under a use case.
    #[must_use]
    pub fn resolve(&self, entity_type: &str, use_case: &str) -> &Profile {
        let key = |use_case: &str| (entity_type.to_string(), use_case.to_string());
        self.profiles
            .get(&key(use_case))
            .or_else(|| self.profiles.get(&key("")))
            .unwrap_or(&self.default)
    }

    /// Returns the number of registered profiles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// Returns true if no profiles are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
