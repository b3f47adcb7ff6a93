//! Untyped nested documents.
//!
//! A [`Document`] is one node of the tree submitted by a caller: a mapping
//! from field or relationship name to a scalar, a nested document, or an
//! ordered sequence. Documents carry no schema; the engine decides what each
//! entry means by consulting the entity type it is resolving against.

use std::collections::BTreeMap;

use crate::error::{Error, ErrorKind};
use crate::value::Value;
use crate::Result;

/// One entry of a [`Document`].
#[derive(Clone, Debug, PartialEq)]
pub enum Field {
    /// A scalar (including null).
    Scalar(Value),
    /// A nested document.
    Node(Document),
    /// An ordered sequence of entries.
    List(Vec<Field>),
}

impl Field {
    /// Returns true if this entry is the null scalar.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Scalar(Value::Null))
    }

    /// Returns the scalar value, if this entry is one.
    #[must_use]
    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            Self::Scalar(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the nested document, if this entry is one.
    #[must_use]
    pub fn as_node(&self) -> Option<&Document> {
        match self {
            Self::Node(d) => Some(d),
            _ => None,
        }
    }

    /// Short description of the entry's shape, used in error reasons.
    #[must_use]
    pub fn shape(&self) -> &'static str {
        match self {
            Self::Scalar(Value::Null) => "null",
            Self::Scalar(_) => "scalar",
            Self::Node(_) => "object",
            Self::List(_) => "list",
        }
    }

    /// Converts a JSON value into a document entry.
    #[must_use]
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Object(map) => Self::Node(Document::from_json_map(map)),
            serde_json::Value::Array(items) => {
                Self::List(items.iter().map(Field::from_json).collect())
            }
            // from_json only refuses arrays and objects, handled above
            scalar => Self::Scalar(Value::from_json(scalar).unwrap_or(Value::Null)),
        }
    }

    /// Converts this entry back into JSON.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Scalar(v) => v.to_json(),
            Self::Node(d) => d.to_json(),
            Self::List(items) => serde_json::Value::Array(items.iter().map(Field::to_json).collect()),
        }
    }
}

impl From<Value> for Field {
    fn from(value: Value) -> Self {
        Self::Scalar(value)
    }
}

macro_rules! scalar_field_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Field {
                fn from(value: $ty) -> Self {
                    Self::Scalar(Value::from(value))
                }
            }
        )*
    };
}

scalar_field_from!(bool, i32, i64, f64, &str, String, crate::EntityId);

impl From<Document> for Field {
    fn from(document: Document) -> Self {
        Self::Node(document)
    }
}

impl From<Vec<Document>> for Field {
    fn from(documents: Vec<Document>) -> Self {
        Self::List(documents.into_iter().map(Field::Node).collect())
    }
}

/// A node of the nested input tree.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Document {
    fields: BTreeMap<String, Field>,
}

impl Document {
    /// Creates an empty document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry, builder style.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, field: impl Into<Field>) -> Self {
        self.fields.insert(name.into(), field.into());
        self
    }

    /// Adds or replaces an entry.
    pub fn insert(&mut self, name: impl Into<String>, field: impl Into<Field>) {
        self.fields.insert(name.into(), field.into());
    }

    /// Gets an entry by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    /// Checks if the document has an entry for `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Iterates entries in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the document has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Parses a document from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON value is not an object.
    pub fn from_json(json: &serde_json::Value) -> Result<Self> {
        match json {
            serde_json::Value::Object(map) => Ok(Self::from_json_map(map)),
            other => Err(Error::new(ErrorKind::Document(format!(
                "expected an object at the document root, got {}",
                json_kind(other)
            )))),
        }
    }

    /// Parses one or several root documents from JSON.
    ///
    /// An object yields one document; an array must contain only objects.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is neither an object nor an array of objects.
    pub fn batch_from_json(json: &serde_json::Value) -> Result<Vec<Self>> {
        match json {
            serde_json::Value::Array(items) => items.iter().map(Self::from_json).collect(),
            other => Self::from_json(other).map(|d| vec![d]),
        }
    }

    /// Parses a document from JSON text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid JSON or not an object.
    pub fn parse(text: &str) -> Result<Self> {
        let json: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| Error::new(ErrorKind::Document(e.to_string())))?;
        Self::from_json(&json)
    }

    /// Converts this document back into a JSON object.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.fields
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }

    fn from_json_map(map: &serde_json::Map<String, serde_json::Value>) -> Self {
        Self {
            fields: map
                .iter()
                .map(|(k, v)| (k.clone(), Field::from_json(v)))
                .collect(),
        }
    }
}

fn json_kind(json: &serde_json::Value) -> &'static str {
    match json {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
