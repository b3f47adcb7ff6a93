//! Store-assigned entity identities.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Opaque handle to a persisted entity.
///
/// Identities are allocated by the store from a monotonically increasing
/// sequence and are never reused, so an identity that once named a deleted
/// entity can never silently start naming a different one. The raw number
/// doubles as the entity's primary-key value in documents.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EntityId(u64);

impl EntityId {
    /// Creates an entity ID from its raw sequence number.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw sequence number.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Interprets a primary-key value from a document.
    ///
    /// Returns `None` for negative keys, which can never be allocated.
    #[must_use]
    pub fn from_key(key: i64) -> Option<Self> {
        u64::try_from(key).ok().map(Self)
    }

    /// Returns the primary-key value exposed in documents.
    ///
    /// Sequence numbers above `i64::MAX` are saturated; a store would have to
    /// allocate 2^63 entities to reach them.
    #[must_use]
    pub fn key(self) -> i64 {
        i64::try_from(self.0).unwrap_or(i64::MAX)
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
