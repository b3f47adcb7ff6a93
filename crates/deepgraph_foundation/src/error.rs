//! Error types for the Deepgraph system.
//!
//! Uses `thiserror` for ergonomic error definition with rich context.
//! These errors are raised by the schema registry and the entity store;
//! per-node resolution failures are reported as values by the engine.

use std::fmt;

use thiserror::Error;

use crate::entity::EntityId;
use crate::types::Type;

/// The main error type for Deepgraph operations.
#[derive(Debug, Error)]
#[error("{kind}")]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
    /// Optional context about where the error occurred.
    pub context: Option<ErrorContext>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    /// Adds context to this error.
    #[must_use]
    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Creates a type mismatch error.
    #[must_use]
    pub fn type_mismatch(field: impl Into<String>, expected: Type, actual: Option<Type>) -> Self {
        Self::new(ErrorKind::TypeMismatch {
            field: field.into(),
            expected,
            actual,
        })
    }

    /// Creates an entity not found error.
    #[must_use]
    pub fn entity_not_found(id: EntityId) -> Self {
        Self::new(ErrorKind::EntityNotFound(id))
    }

    /// Creates an unknown entity type error.
    #[must_use]
    pub fn unknown_type(name: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnknownEntityType(name.into()))
    }

    /// Creates an unknown relationship error.
    #[must_use]
    pub fn unknown_relationship(entity_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnknownRelationship {
            entity_type: entity_type.into(),
            name: name.into(),
        })
    }

    /// Creates an unknown field error.
    #[must_use]
    pub fn unknown_field(entity_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnknownField {
            entity_type: entity_type.into(),
            name: name.into(),
        })
    }

    /// Creates a missing field error.
    #[must_use]
    pub fn missing_field(entity_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(ErrorKind::MissingField {
            entity_type: entity_type.into(),
            name: name.into(),
        })
    }

    /// Creates a schema error.
    #[must_use]
    pub fn schema(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Schema(message.into()))
    }

    /// Returns true if this error was caused by a uniqueness violation.
    #[must_use]
    pub fn is_unique_violation(&self) -> bool {
        matches!(self.kind, ErrorKind::UniqueViolation { .. })
    }

    /// Returns true if this error was caused by a protecting reference.
    #[must_use]
    pub fn is_protected(&self) -> bool {
        matches!(self.kind, ErrorKind::ProtectedReference { .. })
    }
}

/// Categorized error kinds for pattern matching.
#[derive(Debug, Error)]
pub enum ErrorKind {
    /// A value does not fit the declared field type.
    #[error("type mismatch on {field}: expected {expected}, got {}", display_actual(.actual))]
    TypeMismatch {
        /// The field being written.
        field: String,
        /// The declared type.
        expected: Type,
        /// The actual type encountered (`None` for null).
        actual: Option<Type>,
    },

    /// Entity was not found in storage.
    #[error("entity not found: {0:?}")]
    EntityNotFound(EntityId),

    /// Entity type is not registered.
    #[error("unknown entity type: {0}")]
    UnknownEntityType(String),

    /// Relationship is not declared on the entity type.
    #[error("unknown relationship {name} on {entity_type}")]
    UnknownRelationship {
        /// The entity type that was queried.
        entity_type: String,
        /// The relationship name that was not found.
        name: String,
    },

    /// Field is not declared on the entity type.
    #[error("unknown field {name} on {entity_type}")]
    UnknownField {
        /// The entity type that was queried.
        entity_type: String,
        /// The field name that was not found.
        name: String,
    },

    /// A required field or relationship was not supplied on create.
    #[error("missing required {name} on {entity_type}")]
    MissingField {
        /// The entity type being created.
        entity_type: String,
        /// The missing field or relationship.
        name: String,
    },

    /// A relationship was pointed at an entity of the wrong type.
    #[error("{relationship} expects {expected}, got {actual}")]
    WrongTarget {
        /// The relationship being written.
        relationship: String,
        /// The declared target type.
        expected: String,
        /// The type of the entity supplied.
        actual: String,
    },

    /// A write would give two entities the same unique key.
    #[error("unique key ({}) already used on {entity_type} by {existing:?}", .fields.join(", "))]
    UniqueViolation {
        /// The entity type.
        entity_type: String,
        /// The fields of the violated key.
        fields: Vec<String>,
        /// The entity already holding the key.
        existing: EntityId,
    },

    /// A delete was blocked by a remaining protecting reference.
    #[error("{entity:?} is still referenced by {referrer:?} through {relationship}")]
    ProtectedReference {
        /// The entity that could not be deleted.
        entity: EntityId,
        /// The entity holding the reference.
        referrer: EntityId,
        /// The protecting relationship.
        relationship: String,
    },

    /// Invalid schema registration.
    #[error("schema error: {0}")]
    Schema(String),

    /// Transaction misuse (commit without begin, ...).
    #[error("transaction error: {0}")]
    Transaction(String),

    /// Malformed input document.
    #[error("document error: {0}")]
    Document(String),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O failure.
    #[error("io error: {0}")]
    Io(String),

    /// Internal error (should not happen).
    #[error("internal error: {0}")]
    Internal(String),
}

fn display_actual(actual: &Option<Type>) -> String {
    actual.map_or_else(|| "null".to_string(), |t| t.to_string())
}

/// Context about where an error occurred.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// Document path of the node being resolved (e.g. `classes[1].students[0]`).
    pub path: Option<String>,
    /// Entity type being resolved.
    pub entity_type: Option<String>,
    /// Chain of operations leading to the error.
    pub stack: Vec<String>,
}

impl ErrorContext {
    /// Creates a new empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the document path.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Sets the entity type.
    #[must_use]
    pub fn with_entity_type(mut self, entity_type: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self
    }

    /// Adds a stack frame.
    #[must_use]
    pub fn with_frame(mut self, frame: impl Into<String>) -> Self {
        self.stack.push(frame.into());
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(entity_type) = &self.entity_type {
            write!(f, "{entity_type}")?;
        }
        if let Some(path) = &self.path {
            write!(f, " at {path}")?;
        }
        if !self.stack.is_empty() {
            writeln!(f)?;
            for frame in &self.stack {
                writeln!(f, "  in {frame}")?;
            }
        }
        Ok(())
    }
}
