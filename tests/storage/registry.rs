//! Integration tests for the schema registry
//!
//! Tests derived reverse views, edge resolution, and schema validation.

use deepgraph_foundation::Type;
use deepgraph_storage::{
    Cardinality, EntityType, FieldSchema, OnDelete, RegistryBuilder, RelationKind, RelationshipDescriptor,
};

use crate::school_registry;

// =============================================================================
// Derived Views
// =============================================================================

#[test]
fn every_forward_relationship_gets_its_view() {
    let registry = school_registry();

    let classes = registry.relationship("HighSchool", "classes").unwrap();
    assert_eq!(classes.kind, RelationKind::ReverseMany);
    assert_eq!(classes.target, "Class");
    assert_eq!(classes.reverse_name.as_deref(), Some("high_school"));

    let students = registry.relationship("Class", "students").unwrap();
    assert_eq!(students.kind, RelationKind::ReverseMany);
    assert_eq!(students.cardinality, Cardinality::Collection);

    let card = registry.relationship("Student", "report_card").unwrap();
    assert_eq!(card.kind, RelationKind::ReverseOneToOne);
    assert_eq!(card.cardinality, Cardinality::Single);
}

#[test]
fn views_resolve_to_the_owning_edge() {
    let registry = school_registry();

    let forward = registry.edge("Student", "classes").unwrap();
    let reverse = registry.edge("Class", "students").unwrap();
    assert!(!forward.reversed);
    assert!(reverse.reversed);
    assert_eq!(forward.key(), "Student.classes");
    assert_eq!(reverse.key(), forward.key());
}

#[test]
fn referrers_lists_forward_relationships_only() {
    let registry = school_registry();
    let mut referrers: Vec<String> = registry
        .referrers("HighSchool")
        .map(|(owner, r)| format!("{}.{}", owner.name, r.name))
        .collect();
    referrers.sort();
    assert_eq!(referrers, vec!["Class.high_school", "Student.school"]);
}

#[test]
fn types_are_listed_by_name() {
    let registry = school_registry();
    let names: Vec<&str> = registry.types().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["Class", "HighSchool", "ReportCard", "Student"]);
    assert_eq!(registry.len(), 4);
}

// =============================================================================
// Relationship Defaults
// =============================================================================

#[test]
fn foreign_key_defaults() {
    let registry = school_registry();

    let required = registry.relationship("Class", "high_school").unwrap();
    assert!(required.required);
    assert!(!required.nullable);
    assert_eq!(required.on_target_delete, OnDelete::Cascade);
    assert!(required.is_foreign_key());

    let optional = registry.relationship("Student", "school").unwrap();
    assert!(!optional.required);
    assert!(optional.nullable);
    assert_eq!(optional.on_target_delete, OnDelete::Remove);
}

#[test]
fn views_are_never_foreign_keys() {
    let registry = school_registry();
    let card = registry.relationship("Student", "report_card").unwrap();
    assert!(!card.is_foreign_key());
    let card_type = registry.get("ReportCard").unwrap();
    assert!(card_type.foreign_keys().any(|r| r.name == "student"));
}

// =============================================================================
// Validation
// =============================================================================

#[test]
fn unknown_lookup_fails() {
    let registry = school_registry();
    assert!(registry.get("Campus").is_err());
    assert!(registry.relationship("HighSchool", "instructors").is_err());
    assert!(registry.entity_type("Campus").is_none());
}

#[test]
fn view_name_clash_is_rejected() {
    let school = EntityType::new("HighSchool").with_field(FieldSchema::required("classes", Type::Int));
    let class = EntityType::new("Class").with_relationship(
        RelationshipDescriptor::many_to_one("high_school", "HighSchool").with_reverse_name("classes"),
    );
    let result = RegistryBuilder::new()
        .with_type(school)
        .and_then(|b| b.with_type(class))
        .and_then(RegistryBuilder::build);
    assert!(result.is_err());
}

#[test]
fn unique_key_over_collection_is_rejected() {
    let school = EntityType::new("HighSchool").with_unique_key(&["classes"]);
    let class = EntityType::new("Class").with_relationship(
        RelationshipDescriptor::many_to_one("high_school", "HighSchool").with_reverse_name("classes"),
    );
    let result = RegistryBuilder::new()
        .with_type(school)
        .and_then(|b| b.with_type(class))
        .and_then(RegistryBuilder::build);
    assert!(result.is_err());
}

#[test]
fn declared_one_to_many_becomes_a_view() {
    let school = EntityType::new("HighSchool").with_relationship(
        RelationshipDescriptor::one_to_many("classes", "Class").with_reverse_name("high_school"),
    );
    let class = EntityType::new("Class")
        .with_relationship(RelationshipDescriptor::many_to_one("high_school", "HighSchool"));
    let registry = RegistryBuilder::new()
        .with_type(school)
        .and_then(|b| b.with_type(class))
        .and_then(RegistryBuilder::build)
        .unwrap();

    let classes = registry.relationship("HighSchool", "classes").unwrap();
    assert_eq!(classes.kind, RelationKind::ReverseMany);
    assert_eq!(registry.edge("HighSchool", "classes").unwrap().key(), "Class.high_school");
}
