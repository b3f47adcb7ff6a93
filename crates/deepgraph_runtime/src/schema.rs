//! JSON schema files.
//!
//! A schema file declares entity types and write profiles:
//!
//! ```json
//! {
//!   "types": [
//!     {
//!       "name": "HighSchool",
//!       "fields": [{ "name": "name", "type": "string" }],
//!       "unique_keys": [["name"]]
//!     },
//!     {
//!       "name": "Class",
//!       "fields": [{ "name": "name", "type": "string" }],
//!       "relationships": [
//!         { "name": "high_school", "kind": "many_to_one",
//!           "target": "HighSchool", "reverse_name": "classes" }
//!       ],
//!       "unique_keys": [["high_school", "name"]]
//!     }
//!   ],
//!   "profiles": [
//!     { "entity_type": "Class", "use_case": "public", "exclude": ["high_school"] }
//!   ]
//! }
//! ```

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

use deepgraph_engine::{Profile, ProfileRegistry};
use deepgraph_foundation::{Error, ErrorKind, Result, Type, Value};
use deepgraph_storage::{
    EntityType, FieldSchema, OnDelete, RegistryBuilder, RelationKind, RelationshipDescriptor,
    SchemaRegistry,
};

/// A loaded schema: the entity types and the write profiles.
#[derive(Clone, Debug)]
pub struct Schema {
    /// Validated entity types.
    pub registry: Arc<SchemaRegistry>,
    /// Write profiles.
    pub profiles: ProfileRegistry,
}

impl Schema {
    /// Parses a schema from JSON text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid schema file or the
    /// declared types do not form a valid registry.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let file: SchemaFile = serde_json::from_str(text)
            .map_err(|e| Error::new(ErrorKind::Serialization(format!("invalid schema file: {e}"))))?;
        file.build()
    }

    /// Loads a schema file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid schema.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::new(ErrorKind::Io(format!(
                "failed to read schema '{}': {e}",
                path.as_ref().display()
            )))
        })?;
        Self::from_json_str(&text)
    }
}

// =============================================================================
// File Format
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SchemaFile {
    types: Vec<TypeDef>,
    #[serde(default)]
    profiles: Vec<ProfileDef>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TypeDef {
    name: String,
    primary_key: Option<String>,
    #[serde(default)]
    fields: Vec<FieldDef>,
    #[serde(default)]
    relationships: Vec<RelationshipDef>,
    #[serde(default)]
    unique_keys: Vec<Vec<String>>,
    #[serde(default)]
    match_hints: Vec<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FieldDef {
    name: String,
    #[serde(rename = "type")]
    ty: Type,
    #[serde(default)]
    nullable: bool,
    default: Option<serde_json::Value>,
}

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum KindDef {
    OneToOne,
    OneToMany,
    ManyToOne,
    ManyToMany,
    ReverseOneToOne,
    ReverseMany,
}

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum OnDeleteDef {
    Remove,
    Cascade,
    Protect,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RelationshipDef {
    name: String,
    kind: KindDef,
    target: String,
    /// Forward kinds: the view derived on the target. Reverse kinds: the
    /// forward relationship on the target.
    reverse_name: Option<String>,
    nullable: Option<bool>,
    required: Option<bool>,
    #[serde(default)]
    must_exist: bool,
    on_delete: Option<OnDeleteDef>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ProfileDef {
    entity_type: String,
    #[serde(default)]
    use_case: String,
    #[serde(default)]
    exclude: Vec<String>,
    #[serde(default)]
    must_exist: Vec<String>,
    #[serde(default)]
    existing_only: bool,
}

impl SchemaFile {
    fn build(self) -> Result<Schema> {
        let mut builder = RegistryBuilder::new();
        for def in self.types {
            builder.register(def.into_entity_type()?)?;
        }
        let registry = builder.build()?;

        let mut profiles = ProfileRegistry::new();
        for def in self.profiles {
            registry.get(&def.entity_type)?;
            let mut profile = Profile::new();
            for name in def.exclude {
                profile = profile.exclude(name);
            }
            for name in def.must_exist {
                profile = profile.require_existing(name);
            }
            if def.existing_only {
                profile = profile.existing_only();
            }
            profiles.register(def.entity_type, def.use_case, profile);
        }

        Ok(Schema {
            registry: Arc::new(registry),
            profiles,
        })
    }
}

impl TypeDef {
    fn into_entity_type(self) -> Result<EntityType> {
        let mut entity_type = EntityType::new(&self.name);
        if let Some(primary_key) = self.primary_key {
            entity_type = entity_type.with_primary_key(primary_key);
        }
        for field in self.fields {
            entity_type = entity_type.with_field(field.into_schema(&self.name)?);
        }
        for relationship in self.relationships {
            entity_type = entity_type.with_relationship(relationship.into_descriptor(&self.name)?);
        }
        entity_type.unique_keys = self.unique_keys;
        entity_type.match_hints = self.match_hints;
        Ok(entity_type)
    }
}

impl FieldDef {
    fn into_schema(self, owner: &str) -> Result<FieldSchema> {
        let default = match &self.default {
            None => None,
            Some(json) => {
                let value = Value::from_json(json).ok_or_else(|| {
                    Error::schema(format!("{owner}.{}: default must be a scalar", self.name))
                })?;
                if !value.is_null() && !self.ty.accepts(&value) {
                    return Err(Error::type_mismatch(&self.name, self.ty, value.value_type()));
                }
                Some(value)
            }
        };
        Ok(match default {
            Some(value) => {
                let mut field = FieldSchema::optional(self.name, self.ty, value);
                field.nullable = self.nullable;
                field
            }
            None if self.nullable => FieldSchema::nullable(self.name, self.ty),
            None => FieldSchema::required(self.name, self.ty),
        })
    }
}

impl RelationshipDef {
    fn into_descriptor(self, owner: &str) -> Result<RelationshipDescriptor> {
        let mut descriptor = match self.kind {
            KindDef::OneToOne => RelationshipDescriptor::one_to_one(&self.name, &self.target),
            KindDef::OneToMany => RelationshipDescriptor::one_to_many(&self.name, &self.target),
            KindDef::ManyToOne => RelationshipDescriptor::many_to_one(&self.name, &self.target),
            KindDef::ManyToMany => RelationshipDescriptor::many_to_many(&self.name, &self.target),
            KindDef::ReverseOneToOne | KindDef::ReverseMany => {
                let kind = if matches!(self.kind, KindDef::ReverseMany) {
                    RelationKind::ReverseMany
                } else {
                    RelationKind::ReverseOneToOne
                };
                let forward = self.reverse_name.as_deref().ok_or_else(|| {
                    Error::schema(format!(
                        "{owner}.{}: a reverse relationship needs reverse_name",
                        self.name
                    ))
                })?;
                RelationshipDescriptor::reverse(&self.name, kind, &self.target, forward)
            }
        };
        let is_reverse = descriptor.kind.is_reverse();
        if let Some(reverse_name) = self.reverse_name.filter(|_| !is_reverse) {
            descriptor = descriptor.with_reverse_name(reverse_name);
        }
        if self.nullable == Some(true) {
            descriptor = descriptor.nullable();
        }
        if let Some(required) = self.required {
            descriptor.required = required;
        }
        if self.must_exist {
            descriptor = descriptor.must_exist();
        }
        if let Some(on_delete) = self.on_delete {
            descriptor = descriptor.with_on_delete(match on_delete {
                OnDeleteDef::Remove => OnDelete::Remove,
                OnDeleteDef::Cascade => OnDelete::Cascade,
                OnDeleteDef::Protect => OnDelete::Protect,
            });
        }
        Ok(descriptor)
    }
}
