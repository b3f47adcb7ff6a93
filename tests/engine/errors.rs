//! Node error taxonomy
//!
//! Tests each error code a node can fail with, and the field it names.

use deepgraph_engine::{Action, DeepWriter, EngineConfig, ErrorCode, OperationReport};
use deepgraph_foundation::Value;
use deepgraph_storage::{Fields, MemoryStore};

use crate::{action_at, apply, doc, seed, store};

/// The error at `path` as `(code, field)`.
fn error_at<'a>(report: &'a OperationReport, path: &str) -> (ErrorCode, Option<&'a str>) {
    let error = report
        .at(path)
        .and_then(|r| r.error())
        .unwrap_or_else(|| panic!("no error at {path}: {:?}", report.at(path)));
    (error.code, error.field.as_deref())
}

// =============================================================================
// Identification
// =============================================================================

#[test]
fn match_hint_with_several_hits_is_ambiguous() {
    let mut store = store();
    for email in ["ada@example.org", "ada.l@example.org"] {
        seed(
            &mut store,
            "Student",
            &[
                ("email", Value::from(email)),
                ("first_name", Value::from("Ada")),
                ("last_name", Value::from("Lovelace")),
            ],
        );
    }

    let report = apply(
        &mut store,
        "Student",
        r#"{"first_name": "Ada", "last_name": "Lovelace"}"#,
        &[],
    );
    assert!(report.is_conflict());
    assert_eq!(
        error_at(&report, "$"),
        (ErrorCode::AmbiguousMatch, Some("first_name,last_name"))
    );
}

#[test]
fn unmatched_unique_key_creates_despite_a_hint_match() {
    let mut store = store();
    seed(
        &mut store,
        "Student",
        &[
            ("email", Value::from("ada@example.org")),
            ("first_name", Value::from("Ada")),
            ("last_name", Value::from("Lovelace")),
        ],
    );

    let report = apply(
        &mut store,
        "Student",
        r#"{"email": "ada.l@example.org", "first_name": "Ada", "last_name": "Lovelace"}"#,
        &[],
    );
    assert!(report.is_success());
    assert_eq!(action_at(&report, "$"), Some(Action::Created));
    assert_eq!(store.world().entities_of("Student").count(), 2);
}

#[test]
fn keys_naming_different_entities_are_ambiguous() {
    let mut store = store();
    seed(&mut store, "Student", &[("email", Value::from("a@example.org")), ("number", Value::Int(1))]);
    seed(&mut store, "Student", &[("email", Value::from("b@example.org")), ("number", Value::Int(2))]);

    let report = apply(&mut store, "Student", r#"{"email": "a@example.org", "number": 2}"#, &[]);
    assert_eq!(error_at(&report, "$").0, ErrorCode::AmbiguousMatch);
    assert_eq!(store.world().entity_count(), 2);
}

#[test]
fn partial_unique_key_cannot_create() {
    let mut store = store();
    let report = apply(&mut store, "Class", r#"{"name": "1A"}"#, &[]);
    assert_eq!(error_at(&report, "$"), (ErrorCode::IncompleteKey, Some("high_school")));
}

#[test]
fn unknown_primary_key_is_not_found() {
    let mut store = store();
    let report = apply(&mut store, "HighSchool", r#"{"id": 999, "name": "Toulouse"}"#, &[]);
    assert_eq!(error_at(&report, "$"), (ErrorCode::ReferenceNotFound, Some("id")));
    assert_eq!(store.world().entity_count(), 0);
}

#[test]
fn bare_key_to_missing_entity_is_not_found() {
    let mut store = store();
    let report = apply(&mut store, "Class", r#"{"name": "1A", "high_school": 999}"#, &[]);

    assert_eq!(error_at(&report, "$.high_school"), (ErrorCode::ReferenceNotFound, Some("id")));
    assert_eq!(error_at(&report, "$"), (ErrorCode::ReferenceNotFound, Some("high_school")));
}

// =============================================================================
// Keys
// =============================================================================

fn seeded_student(store: &mut MemoryStore) -> String {
    let id = seed(store, "Student", &[("email", Value::from("old@example.org"))]);
    format!(r#"{{"id": {}, "email": "new@example.org"}}"#, id.key())
}

#[test]
fn key_change_is_refused_by_default_store() {
    let mut store = store();
    let json = seeded_student(&mut store);
    let report = apply(&mut store, "Student", &json, &[]);
    assert_eq!(error_at(&report, "$"), (ErrorCode::KeyImmutable, Some("email")));
}

#[test]
fn key_change_allowed_by_store() {
    let mut store = store().with_key_mutation(true);
    let json = seeded_student(&mut store);
    let report = apply(&mut store, "Student", &json, &[]);

    assert!(report.is_success());
    assert_eq!(action_at(&report, "$"), Some(Action::Updated));
    let criteria = Fields::from([("email".to_string(), Value::from("new@example.org"))]);
    assert_eq!(store.world().find("Student", &criteria).unwrap().len(), 1);
}

#[test]
fn key_change_refused_by_config() {
    let mut store = store().with_key_mutation(true);
    let json = seeded_student(&mut store);
    let report = DeepWriter::new(EngineConfig::default().with_key_mutation(false))
        .deep_update_or_create(&mut store, "Student", &doc(&json), &[])
        .unwrap();
    assert_eq!(error_at(&report, "$"), (ErrorCode::KeyImmutable, Some("email")));
}

// =============================================================================
// Fields and Shapes
// =============================================================================

#[test]
fn missing_required_field() {
    let mut store = store();
    let report = apply(&mut store, "HighSchool", r#"{"address": "Toulouse"}"#, &[]);
    assert_eq!(error_at(&report, "$"), (ErrorCode::MissingRequiredField, Some("name")));

    let report = apply(&mut store, "HighSchool", r#"{"name": null}"#, &[]);
    assert_eq!(error_at(&report, "$"), (ErrorCode::MissingRequiredField, Some("name")));
}

#[test]
fn wrong_scalar_type() {
    let mut store = store();
    let report = apply(&mut store, "HighSchool", r#"{"name": 5}"#, &[]);
    assert_eq!(error_at(&report, "$"), (ErrorCode::TypeMismatch, Some("name")));
}

#[test]
fn unknown_member() {
    let mut store = store();
    let report = apply(&mut store, "HighSchool", r#"{"name": "Toulouse", "mascot": "owl"}"#, &[]);
    assert_eq!(error_at(&report, "$"), (ErrorCode::UnknownField, Some("mascot")));
}

#[test]
fn object_where_a_list_belongs() {
    let mut store = store();
    let report = apply(
        &mut store,
        "HighSchool",
        r#"{"name": "Toulouse", "classes": {"name": "1A"}}"#,
        &[],
    );
    assert_eq!(error_at(&report, "$.classes"), (ErrorCode::InvalidShape, Some("classes")));
    assert!(report.is_conflict());

    let report = apply(&mut store, "HighSchool", r#"{"name": ["Toulouse"]}"#, &[]);
    assert_eq!(error_at(&report, "$"), (ErrorCode::InvalidShape, Some("name")));
}

#[test]
fn nesting_beyond_the_limit() {
    let mut store = store();
    let report = DeepWriter::new(EngineConfig::default().with_max_depth(1))
        .deep_update_or_create(
            &mut store,
            "HighSchool",
            &doc(r#"{"name": "Toulouse", "classes": [{"name": "1A", "students": [{"email": "ada@example.org"}]}]}"#),
            &[],
        )
        .unwrap();

    assert!(report.is_conflict());
    assert_eq!(error_at(&report, "$.classes[0].students[0]").0, ErrorCode::DepthLimitExceeded);
    assert_eq!(store.world().entity_count(), 0);
}
