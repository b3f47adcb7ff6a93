//! Back-references
//!
//! Tests children that name the parent they are nested under.

use deepgraph_engine::{Action, ErrorCode};
use deepgraph_foundation::Value;

use crate::{action_at, apply, get, id_at, seed, store};

#[test]
fn child_naming_another_parent_is_rejected() {
    let mut store = store();
    let toulouse = seed(&mut store, "HighSchool", &[("name", Value::from("Toulouse"))]);
    let albi = seed(&mut store, "HighSchool", &[("name", Value::from("Albi"))]);

    let report = apply(
        &mut store,
        "HighSchool",
        r#"{"name": "Toulouse", "classes": [{"name": "1A", "high_school": {"name": "Albi"}}]}"#,
        &[],
    );

    assert!(report.is_conflict());
    assert!(!report.committed);
    let error = report.at("$.classes[0]").and_then(|r| r.error()).unwrap();
    assert_eq!(error.code, ErrorCode::ReverseMismatch);
    assert_eq!(error.field.as_deref(), Some("high_school"));

    assert!(store.world().related(toulouse, "classes").unwrap().is_empty());
    assert!(store.world().related(albi, "classes").unwrap().is_empty());
    assert_eq!(store.world().entity_count(), 2);
}

#[test]
fn child_naming_its_parent_by_document() {
    let mut store = store();
    let report = apply(
        &mut store,
        "HighSchool",
        r#"{"name": "Toulouse", "classes": [{"name": "1A", "high_school": {"name": "Toulouse"}}]}"#,
        &[],
    );

    assert!(report.is_success());
    let school = id_at(&report, "$");
    let class = id_at(&report, "$.classes[0]");
    assert_eq!(get(&store, class, "high_school"), Value::EntityRef(school));
    assert_eq!(store.world().entity_count(), 2);
}

#[test]
fn child_naming_its_parent_by_key() {
    let mut store = store();
    let toulouse = seed(&mut store, "HighSchool", &[("name", Value::from("Toulouse"))]);

    let report = apply(
        &mut store,
        "HighSchool",
        &format!(
            r#"{{"name": "Toulouse", "classes": [{{"name": "1A", "high_school": {}}}]}}"#,
            toulouse.key()
        ),
        &[],
    );

    assert!(report.is_success());
    assert_eq!(action_at(&report, "$"), Some(Action::Reused));
    let class = id_at(&report, "$.classes[0]");
    assert_eq!(get(&store, class, "high_school"), Value::EntityRef(toulouse));
}

#[test]
fn single_view_supplies_the_back_reference() {
    let mut store = store();
    let report = apply(
        &mut store,
        "Student",
        r#"{"email": "ada@example.org", "report_card": {"term": "spring"}}"#,
        &[],
    );

    assert!(report.is_success());
    let student = id_at(&report, "$");
    let card = id_at(&report, "$.report_card");
    assert_eq!(get(&store, card, "student"), Value::EntityRef(student));
    assert_eq!(store.world().related(student, "report_card").unwrap(), vec![card]);
}

#[test]
fn single_view_held_by_a_required_key_cannot_be_cleared() {
    let mut store = store();
    let report = apply(
        &mut store,
        "Student",
        r#"{"email": "ada@example.org", "report_card": {"term": "spring"}}"#,
        &[],
    );
    let student = id_at(&report, "$");
    let card = id_at(&report, "$.report_card");

    let report = apply(&mut store, "Student", r#"{"email": "ada@example.org", "report_card": null}"#, &[]);
    assert!(report.is_conflict());
    let error = report.at("$").and_then(|r| r.error()).unwrap();
    assert_eq!(error.code, ErrorCode::MissingRequiredField);
    assert_eq!(error.field.as_deref(), Some("report_card"));

    assert_eq!(get(&store, card, "student"), Value::EntityRef(student));
    assert_eq!(store.world().related(student, "report_card").unwrap(), vec![card]);
}
