//! Schema definitions for entity types and relationships.
//!
//! Schemas define the structure and constraints an entity type imposes on
//! the documents resolved against it. They are assembled once through the
//! [`RegistryBuilder`](crate::RegistryBuilder) and are immutable afterwards.

use deepgraph_foundation::{Type, Value};

/// Schema definition for an entity type.
#[derive(Clone, Debug, PartialEq)]
pub struct EntityType {
    /// Type name (e.g., `HighSchool`).
    pub name: String,
    /// Name under which the store-assigned identity appears in documents.
    pub primary_key: String,
    /// Scalar field definitions, in declaration order.
    pub fields: Vec<FieldSchema>,
    /// Relationship definitions, in declaration order.
    pub relationships: Vec<RelationshipDescriptor>,
    /// Field-sets whose values identify at most one entity.
    pub unique_keys: Vec<Vec<String>>,
    /// Non-unique field-sets used to match an existing entity.
    ///
    /// Matching more than one entity through a hint is an ambiguity, never
    /// a silent pick.
    pub match_hints: Vec<Vec<String>>,
}

/// What a name in a document refers to on an entity type.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Member<'a> {
    /// The primary key.
    PrimaryKey,
    /// A scalar field.
    Field(&'a FieldSchema),
    /// A relationship.
    Relationship(&'a RelationshipDescriptor),
}

impl EntityType {
    /// Creates a new entity type with an `id` primary key and no fields.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary_key: "id".to_string(),
            fields: Vec::new(),
            relationships: Vec::new(),
            unique_keys: Vec::new(),
            match_hints: Vec::new(),
        }
    }

    /// Renames the primary key.
    #[must_use]
    pub fn with_primary_key(mut self, name: impl Into<String>) -> Self {
        self.primary_key = name.into();
        self
    }

    /// Adds a field to the schema.
    #[must_use]
    pub fn with_field(mut self, field: FieldSchema) -> Self {
        self.fields.push(field);
        self
    }

    /// Adds a relationship to the schema.
    #[must_use]
    pub fn with_relationship(mut self, relationship: RelationshipDescriptor) -> Self {
        self.relationships.push(relationship);
        self
    }

    /// Adds a unique key made of the given fields.
    #[must_use]
    pub fn with_unique_key(mut self, fields: &[&str]) -> Self {
        self.unique_keys
            .push(fields.iter().map(|f| (*f).to_string()).collect());
        self
    }

    /// Adds a non-unique match hint made of the given fields.
    #[must_use]
    pub fn with_match_hint(mut self, fields: &[&str]) -> Self {
        self.match_hints
            .push(fields.iter().map(|f| (*f).to_string()).collect());
        self
    }

    /// Returns the field schema by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Returns the relationship descriptor by name.
    #[must_use]
    pub fn relationship(&self, name: &str) -> Option<&RelationshipDescriptor> {
        self.relationships.iter().find(|r| r.name == name)
    }

    /// Classifies a name used in a document.
    #[must_use]
    pub fn member(&self, name: &str) -> Option<Member<'_>> {
        if name == self.primary_key {
            return Some(Member::PrimaryKey);
        }
        self.field(name)
            .map(Member::Field)
            .or_else(|| self.relationship(name).map(Member::Relationship))
    }

    /// Returns true if `name` belongs to any unique key (or is the primary key).
    #[must_use]
    pub fn is_key_field(&self, name: &str) -> bool {
        name == self.primary_key
            || self
                .unique_keys
                .iter()
                .any(|key| key.iter().any(|f| f == name))
    }

    /// Iterates single-valued forward relationships (the ones carrying a
    /// foreign key on this type).
    pub fn foreign_keys(&self) -> impl Iterator<Item = &RelationshipDescriptor> {
        self.relationships.iter().filter(|r| r.is_foreign_key())
    }
}

/// Schema definition for a scalar field.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldSchema {
    /// Field name.
    pub name: String,
    /// Field type.
    pub ty: Type,
    /// Whether null is an accepted value.
    pub nullable: bool,
    /// Default value if not provided on create.
    pub default: Option<Value>,
}

impl FieldSchema {
    /// Creates a required field with no default.
    #[must_use]
    pub fn required(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
            nullable: false,
            default: None,
        }
    }

    /// Creates a field with a default value.
    #[must_use]
    pub fn optional(name: impl Into<String>, ty: Type, default: Value) -> Self {
        Self {
            name: name.into(),
            ty,
            nullable: false,
            default: Some(default),
        }
    }

    /// Creates a nullable field with no default (will be null).
    #[must_use]
    pub fn nullable(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
            nullable: true,
            default: None,
        }
    }

    /// Returns true if a create must supply this field.
    #[must_use]
    pub fn is_required(&self) -> bool {
        !self.nullable && self.default.is_none()
    }

    /// Checks whether `value` may be stored in this field.
    #[must_use]
    pub fn accepts(&self, value: &Value) -> bool {
        if value.is_null() {
            self.nullable
        } else {
            self.ty.accepts(value)
        }
    }
}

/// Kind of a relationship, seen from the type declaring it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RelationKind {
    /// Each source has at most one target, each target at most one source.
    OneToOne,
    /// Each source can have many targets, each target has at most one source.
    OneToMany,
    /// Each source has at most one target, targets can have many sources.
    ManyToOne,
    /// No cardinality constraints.
    ManyToMany,
    /// Single-valued view of a `OneToOne` or `OneToMany` declared on the target.
    ReverseOneToOne,
    /// Many-valued view of a `ManyToOne` or `ManyToMany` declared on the target.
    ReverseMany,
}

impl RelationKind {
    /// Returns true for views derived from a relationship declared elsewhere.
    #[must_use]
    pub const fn is_reverse(self) -> bool {
        matches!(self, Self::ReverseOneToOne | Self::ReverseMany)
    }

    /// Returns how many targets the declaring side sees.
    #[must_use]
    pub const fn cardinality(self) -> Cardinality {
        match self {
            Self::OneToOne | Self::ManyToOne | Self::ReverseOneToOne => Cardinality::Single,
            Self::OneToMany | Self::ManyToMany | Self::ReverseMany => Cardinality::Collection,
        }
    }

    /// Returns the reverse view derived from a forward kind.
    #[must_use]
    pub const fn derived_reverse(self) -> Option<RelationKind> {
        match self {
            Self::ManyToOne | Self::ManyToMany => Some(Self::ReverseMany),
            Self::OneToOne | Self::OneToMany => Some(Self::ReverseOneToOne),
            Self::ReverseOneToOne | Self::ReverseMany => None,
        }
    }

    /// Checks whether `other`, declared on the target, can describe the same
    /// edges from the other side.
    #[must_use]
    pub const fn agrees_with_inverse(self, other: RelationKind) -> bool {
        matches!(
            (self, other),
            (Self::ManyToOne, Self::OneToMany | Self::ReverseMany)
                | (Self::OneToMany, Self::ManyToOne | Self::ReverseOneToOne)
                | (Self::OneToOne, Self::ReverseOneToOne)
                | (Self::ManyToMany, Self::ReverseMany)
        )
    }
}

/// How many targets a relationship resolves to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Cardinality {
    /// One document node (or null).
    Single,
    /// An ordered sequence of document nodes.
    Collection,
}

/// What happens to the source when the target of a relationship is deleted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OnDelete {
    /// Remove the relationship edge.
    Remove,
    /// Delete the source entity as well (cascade).
    Cascade,
    /// Refuse to delete the target while the edge exists.
    Protect,
}

/// Schema definition for a relationship.
#[derive(Clone, Debug, PartialEq)]
pub struct RelationshipDescriptor {
    /// Relationship name (e.g., `classes`, `high_school`).
    pub name: String,
    /// Relationship kind.
    pub kind: RelationKind,
    /// Target entity type.
    pub target: String,
    /// Single or collection.
    pub cardinality: Cardinality,
    /// Whether the relationship may be empty (null for single).
    pub nullable: bool,
    /// Whether a failed child fails the parent node.
    pub required: bool,
    /// Whether targets must already exist (never created through this relationship).
    pub must_exist: bool,
    /// For forward kinds: the name of the derived view on the target.
    /// For reverse kinds: the name of the forward relationship on the target.
    pub reverse_name: Option<String>,
    /// What happens to the source when the target is deleted.
    pub on_target_delete: OnDelete,
}

impl RelationshipDescriptor {
    fn with_kind(name: impl Into<String>, kind: RelationKind, target: impl Into<String>) -> Self {
        let single_forward = matches!(kind, RelationKind::OneToOne | RelationKind::ManyToOne);
        Self {
            name: name.into(),
            kind,
            target: target.into(),
            cardinality: kind.cardinality(),
            nullable: !single_forward,
            required: single_forward,
            must_exist: false,
            reverse_name: None,
            on_target_delete: if single_forward {
                OnDelete::Cascade
            } else {
                OnDelete::Remove
            },
        }
    }

    /// Creates a required one-to-one relationship.
    #[must_use]
    pub fn one_to_one(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::with_kind(name, RelationKind::OneToOne, target)
    }

    /// Creates a required many-to-one relationship (a foreign key).
    #[must_use]
    pub fn many_to_one(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::with_kind(name, RelationKind::ManyToOne, target)
    }

    /// Creates a one-to-many relationship.
    #[must_use]
    pub fn one_to_many(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::with_kind(name, RelationKind::OneToMany, target)
    }

    /// Creates a many-to-many relationship.
    #[must_use]
    pub fn many_to_many(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::with_kind(name, RelationKind::ManyToMany, target)
    }

    /// Creates an explicit reverse view of `forward`, declared on `target`.
    ///
    /// Reverse views are normally derived from the forward declaration;
    /// declaring one explicitly lets the registry check that both sides agree.
    #[must_use]
    pub fn reverse(
        name: impl Into<String>,
        kind: RelationKind,
        target: impl Into<String>,
        forward: impl Into<String>,
    ) -> Self {
        let mut descriptor = Self::with_kind(name, kind, target);
        descriptor.nullable = true;
        descriptor.required = false;
        descriptor.on_target_delete = OnDelete::Remove;
        descriptor.reverse_name = Some(forward.into());
        descriptor
    }

    /// Sets the name of the view derived on the target.
    #[must_use]
    pub fn with_reverse_name(mut self, reverse_name: impl Into<String>) -> Self {
        self.reverse_name = Some(reverse_name.into());
        self
    }

    /// Allows the relationship to be empty; the parent no longer fails with it.
    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self.required = false;
        if self.on_target_delete == OnDelete::Cascade {
            self.on_target_delete = OnDelete::Remove;
        }
        self
    }

    /// Makes a failure of this relationship's children fail the parent.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Requires every target to exist before the operation.
    #[must_use]
    pub fn must_exist(mut self) -> Self {
        self.must_exist = true;
        self
    }

    /// Sets the on-delete behavior.
    #[must_use]
    pub fn with_on_delete(mut self, on_delete: OnDelete) -> Self {
        self.on_target_delete = on_delete;
        self
    }

    /// Returns true if this relationship is stored as a foreign key on the
    /// declaring type.
    #[must_use]
    pub fn is_foreign_key(&self) -> bool {
        !self.kind.is_reverse() && self.cardinality == Cardinality::Single
    }
}
