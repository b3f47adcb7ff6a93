//! Integration tests for Layer 2: Engine
//!
//! Tests deep update-or-create against the in-memory store: the worked
//! school example, idempotence, atomicity, ordering, the orphan sweep,
//! back-references, cycles, and the node error taxonomy.

mod errors;
mod reverse;
mod sweep;

use std::sync::Arc;

use deepgraph_engine::{Action, DeepWriter, OperationReport};
use deepgraph_foundation::{Document, EntityId, Type, Value};
use deepgraph_storage::{
    EntityStoreAdapter, EntityType, FieldSchema, Fields, MemoryStore, OnDelete, RegistryBuilder,
    RelationshipDescriptor, SchemaRegistry,
};

/// Schools, classes, students and report cards.
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
        .with_field(FieldSchema::nullable("number", Type::Int))
        .with_field(FieldSchema::nullable("first_name", Type::String))
        .with_field(FieldSchema::nullable("last_name", Type::String))
        .with_relationship(
            RelationshipDescriptor::many_to_many("classes", "Class").with_reverse_name("students"),
        )
        .with_unique_key(&["email"])
        .with_unique_key(&["number"])
        .with_match_hint(&["first_name", "last_name"]);
    let card = EntityType::new("ReportCard")
        .with_field(FieldSchema::required("term", Type::String))
        .with_relationship(
            RelationshipDescriptor::one_to_one("student", "Student")
                .with_reverse_name("report_card")
                .with_on_delete(OnDelete::Protect),
        )
        .with_unique_key(&["student"]);

    let registry = RegistryBuilder::new()
        .with_type(school)
        .and_then(|b| b.with_type(class))
        .and_then(|b| b.with_type(student))
        .and_then(|b| b.with_type(card))
        .and_then(RegistryBuilder::build)
        .unwrap();
    Arc::new(registry)
}

pub fn store() -> MemoryStore {
    MemoryStore::new(school_registry())
}

/// Parses a document from JSON text.
pub fn doc(json: &str) -> Document {
    Document::parse(json).unwrap()
}

/// Applies `json` as a `root` document with the default writer.
pub fn apply(store: &mut MemoryStore, root: &str, json: &str, delete: &[&str]) -> OperationReport {
    DeepWriter::default()
        .deep_update_or_create(store, root, &doc(json), delete)
        .unwrap()
}

/// Identity resolved at `path`.
pub fn id_at(report: &OperationReport, path: &str) -> EntityId {
    report
        .at(path)
        .and_then(|r| r.identity())
        .unwrap_or_else(|| panic!("nothing resolved at {path}: {:?}", report.at(path)))
}

/// Action reported at `path`.
pub fn action_at(report: &OperationReport, path: &str) -> Option<Action> {
    report.at(path).and_then(|r| r.action())
}

/// Creates an entity directly in the store, bypassing the engine.
pub fn seed(store: &mut MemoryStore, entity_type: &str, pairs: &[(&str, Value)]) -> EntityId {
    let fields: Fields = pairs
        .iter()
        .map(|(name, value)| ((*name).to_string(), value.clone()))
        .collect();
    store.create(entity_type, &fields).unwrap()
}

/// Reads one stored value.
pub fn get(store: &MemoryStore, entity: EntityId, name: &str) -> Value {
    store.world().get(entity, name).unwrap()
}
