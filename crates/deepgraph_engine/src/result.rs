//! Per-node results and the aggregated operation report.

use std::fmt;

use deepgraph_foundation::{EntityId, Error, ErrorKind};

// =============================================================================
// Node Results
// =============================================================================

/// What happened to a resolved node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    /// A new entity was created.
    Created,
    /// An existing entity had at least one value changed.
    Updated,
    /// An existing entity was matched and left as it was.
    Reused,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Reused => "reused",
        };
        f.write_str(name)
    }
}

/// Why a node failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// A name is not a member of the type, or is closed to writing.
    UnknownField,
    /// A required field or relationship has no value.
    MissingRequiredField,
    /// A create would leave a unique key partially specified.
    IncompleteKey,
    /// A reference names an entity that does not exist and may not be created.
    ReferenceNotFound,
    /// A unique-key field would change and the store does not allow it.
    KeyImmutable,
    /// A nested child names a different parent than the one it is nested under.
    ReverseMismatch,
    /// An orphan could not be deleted, or the sweep removed a touched entity.
    DeleteFailed,
    /// Several existing entities match where exactly one is expected.
    AmbiguousMatch,
    /// A scalar does not fit its declared type.
    TypeMismatch,
    /// A relationship value has the wrong shape.
    InvalidShape,
    /// The document nests deeper than the configured limit.
    DepthLimitExceeded,
    /// The store failed for a reason outside the other codes.
    StoreFailure,
}

impl ErrorCode {
    /// Returns the stable name used in reports.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::UnknownField => "UnknownFieldError",
            Self::MissingRequiredField => "MissingRequiredField",
            Self::IncompleteKey => "IncompleteKeyError",
            Self::ReferenceNotFound => "ReferenceNotFound",
            Self::KeyImmutable => "KeyImmutable",
            Self::ReverseMismatch => "ReverseMismatch",
            Self::DeleteFailed => "DeleteFailed",
            Self::AmbiguousMatch => "AmbiguousMatch",
            Self::TypeMismatch => "TypeMismatch",
            Self::InvalidShape => "InvalidShape",
            Self::DepthLimitExceeded => "DepthLimitExceeded",
            Self::StoreFailure => "StoreFailure",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A node-level failure, reported as a value rather than raised.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeError {
    /// Failure category.
    pub code: ErrorCode,
    /// Human-readable explanation.
    pub reason: String,
    /// Offending field or relationship name, if any.
    pub field: Option<String>,
}

impl NodeError {
    /// Creates a node error without a field.
    #[must_use]
    pub fn new(code: ErrorCode, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
            field: None,
        }
    }

    /// Names the offending field or relationship.
    #[must_use]
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// Translates a store error raised while resolving a node.
    #[must_use]
    pub fn from_store(error: &Error) -> Self {
        let code = match &error.kind {
            ErrorKind::UniqueViolation { .. } => ErrorCode::AmbiguousMatch,
            ErrorKind::MissingField { .. } | ErrorKind::TypeMismatch { actual: None, .. } => {
                ErrorCode::MissingRequiredField
            }
            ErrorKind::TypeMismatch { .. } | ErrorKind::WrongTarget { .. } => ErrorCode::TypeMismatch,
            ErrorKind::UnknownField { .. } | ErrorKind::UnknownRelationship { .. } => {
                ErrorCode::UnknownField
            }
            ErrorKind::EntityNotFound(_) => ErrorCode::ReferenceNotFound,
            ErrorKind::ProtectedReference { .. } => ErrorCode::DeleteFailed,
            _ => ErrorCode::StoreFailure,
        };
        let field = match &error.kind {
            ErrorKind::TypeMismatch { field, .. } => Some(field.clone()),
            ErrorKind::MissingField { name, .. } | ErrorKind::UnknownField { name, .. } => {
                Some(name.clone())
            }
            ErrorKind::WrongTarget { relationship, .. } => Some(relationship.clone()),
            ErrorKind::UniqueViolation { fields, .. } => Some(fields.join(",")),
            _ => None,
        };
        Self {
            code,
            reason: error.to_string(),
            field,
        }
    }
}

impl fmt::Display for NodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code)?;
        if let Some(field) = &self.field {
            write!(f, " on {field}")?;
        }
        write!(f, ": {}", self.reason)
    }
}

/// Outcome of resolving one document node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResolutionResult {
    /// The node maps to a persisted entity.
    Resolved {
        /// The entity.
        identity: EntityId,
        /// What was done to it.
        action: Action,
    },
    /// The node failed.
    Error(NodeError),
}

impl ResolutionResult {
    /// Returns the resolved identity, if any.
    #[must_use]
    pub fn identity(&self) -> Option<EntityId> {
        match self {
            Self::Resolved { identity, .. } => Some(*identity),
            Self::Error(_) => None,
        }
    }

    /// Returns the action, if resolved.
    #[must_use]
    pub fn action(&self) -> Option<Action> {
        match self {
            Self::Resolved { action, .. } => Some(*action),
            Self::Error(_) => None,
        }
    }

    /// Returns the error, if failed.
    #[must_use]
    pub fn error(&self) -> Option<&NodeError> {
        match self {
            Self::Resolved { .. } => None,
            Self::Error(e) => Some(e),
        }
    }

    /// Returns true if the node failed.
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

/// One entry of the pre-order result sequence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeResult {
    /// Location in the document, e.g. `$.classes[1].students[0]`.
    pub path: String,
    /// Entity type the node was resolved against.
    pub entity_type: String,
    /// Nesting depth, 0 for a root.
    pub depth: usize,
    /// The outcome.
    pub result: ResolutionResult,
}

// =============================================================================
// Deletions
// =============================================================================

/// Outcome of deleting one orphan.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeletionResult {
    /// Entity type of the orphan.
    pub entity_type: String,
    /// The orphan.
    pub identity: EntityId,
    /// Every identity removed, cascades included. Empty on failure.
    pub deleted: Vec<EntityId>,
    /// Why the deletion failed, if it did.
    pub error: Option<NodeError>,
    /// Whether the failure forces a rollback regardless of policy.
    pub fatal: bool,
}

impl DeletionResult {
    /// Returns true if the orphan was deleted.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

// =============================================================================
// Operation Report
// =============================================================================

/// Overall outcome of a deep write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Every node resolved and every orphan was deleted.
    Success,
    /// Every node resolved; some orphans could not be deleted. Committed.
    SweepIncomplete,
    /// At least one node failed, or the sweep failed under a strict policy.
    /// Nothing was persisted.
    Conflict,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Success => "success",
            Self::SweepIncomplete => "sweep-incomplete",
            Self::Conflict => "conflict",
        };
        f.write_str(name)
    }
}

/// Everything a deep write did, in document order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperationReport {
    /// Overall outcome.
    pub outcome: Outcome,
    /// Whether the transaction was committed.
    pub committed: bool,
    /// Node results in pre-order.
    pub results: Vec<NodeResult>,
    /// Sweep results in deletion order.
    pub deletions: Vec<DeletionResult>,
}

impl OperationReport {
    /// Returns true if the outcome is [`Outcome::Success`].
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }

    /// Returns true if the outcome is [`Outcome::Conflict`].
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        self.outcome == Outcome::Conflict
    }

    /// Iterates node errors with their paths.
    pub fn errors(&self) -> impl Iterator<Item = (&str, &NodeError)> {
        self.results
            .iter()
            .filter_map(|r| r.result.error().map(|e| (r.path.as_str(), e)))
    }

    /// Returns the result at `path`.
    #[must_use]
    pub fn at(&self, path: &str) -> Option<&ResolutionResult> {
        self.results
            .iter()
            .find(|r| r.path == path)
            .map(|r| &r.result)
    }

    /// Returns the root results (depth 0), one per submitted document.
    pub fn roots(&self) -> impl Iterator<Item = &NodeResult> {
        self.results.iter().filter(|r| r.depth == 0)
    }

    /// Counts results with the given action.
    #[must_use]
    pub fn count(&self, action: Action) -> usize {
        self.results
            .iter()
            .filter(|r| r.result.action() == Some(action))
            .count()
    }

    /// Iterates every identity removed by the sweep.
    pub fn deleted(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.deletions.iter().flat_map(|d| d.deleted.iter().copied())
    }
}
