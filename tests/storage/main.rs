//! Integration tests for Layer 1: Storage
//!
//! Tests for the schema registry, world state, and the entity store adapter.

mod adapter;
mod registry;

use std::sync::Arc;

use deepgraph_foundation::{Type, Value};
use deepgraph_storage::{
    EntityType, FieldSchema, Fields, OnDelete, RegistryBuilder, RelationshipDescriptor, SchemaRegistry,
};

/// Schools, classes, students and their report cards.
pub fn school_registry() -> Arc<SchemaRegistry> {
    let school = EntityType::new("HighSchool")
        .with_field(FieldSchema::required("name", Type::String))
        .with_field(FieldSchema::nullable("address", Type::String))
        .with_unique_key(&["name"]);
    let class = EntityType::new("Class")
        .with_field(FieldSchema::required("name", Type::String))
        .with_relationship(
            RelationshipDescriptor::many_to_one("high_school", "HighSchool").with_reverse_name("classes"),
        )
        .with_unique_key(&["high_school", "name"]);
    let student = EntityType::new("Student")
        .with_field(FieldSchema::required("email", Type::String))
        .with_field(FieldSchema::optional("year", Type::Int, Value::Int(1)))
        .with_relationship(
            RelationshipDescriptor::many_to_many("classes", "Class").with_reverse_name("students"),
        )
        .with_relationship(
            RelationshipDescriptor::many_to_one("school", "HighSchool")
                .nullable()
                .with_reverse_name("students"),
        )
        .with_unique_key(&["email"]);
    let card = EntityType::new("ReportCard")
        .with_field(FieldSchema::required("term", Type::String))
        .with_relationship(
            RelationshipDescriptor::one_to_one("student", "Student")
                .with_reverse_name("report_card")
                .with_on_delete(OnDelete::Protect),
        );

    let registry = RegistryBuilder::new()
        .with_type(school)
        .and_then(|b| b.with_type(class))
        .and_then(|b| b.with_type(student))
        .and_then(|b| b.with_type(card))
        .and_then(RegistryBuilder::build)
        .unwrap();
    Arc::new(registry)
}

/// Builds a field map from name/value pairs.
pub fn fields(pairs: &[(&str, Value)]) -> Fields {
    pairs
        .iter()
        .map(|(name, value)| ((*name).to_string(), value.clone()))
        .collect()
}
