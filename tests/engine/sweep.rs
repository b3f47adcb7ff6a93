//! Orphan sweep
//!
//! Tests deletion of untouched related entities and the best-effort and
//! strict sweep policies.

use deepgraph_engine::{Action, DeepWriter, EngineConfig, ErrorCode, Outcome};
use deepgraph_foundation::Value;
use deepgraph_storage::MemoryStore;

use crate::{apply, doc, get, id_at, store};

const CLASSES_1_2: &str = r#"{"name": "Toulouse", "classes": [{"name": "c1"}, {"name": "c2"}]}"#;
const CLASSES_1_3: &str = r#"{"name": "Toulouse", "classes": [{"name": "c1"}, {"name": "c3"}]}"#;

#[test]
fn dropped_child_of_swept_type_is_deleted() {
    let mut store = store();
    let first = apply(&mut store, "HighSchool", CLASSES_1_2, &[]);
    let c1 = id_at(&first, "$.classes[0]");
    let c2 = id_at(&first, "$.classes[1]");

    let report = apply(&mut store, "HighSchool", CLASSES_1_3, &["Class"]);

    assert!(report.is_success());
    assert_eq!(id_at(&report, "$.classes[0]"), c1);
    assert_eq!(report.at("$.classes[0]").and_then(|r| r.action()), Some(Action::Reused));
    let c3 = id_at(&report, "$.classes[1]");

    assert_eq!(report.deleted().collect::<Vec<_>>(), vec![c2]);
    assert_eq!(report.deletions[0].entity_type, "Class");
    assert!(!store.world().exists(c2));

    let school = id_at(&report, "$");
    let mut remaining = store.world().related(school, "classes").unwrap();
    remaining.sort();
    let mut expected = vec![c1, c3];
    expected.sort();
    assert_eq!(remaining, expected);
}

#[test]
fn dropped_child_survives_without_sweep() {
    let mut store = store();
    let first = apply(&mut store, "HighSchool", CLASSES_1_2, &[]);
    let c2 = id_at(&first, "$.classes[1]");

    let report = apply(&mut store, "HighSchool", CLASSES_1_3, &[]);

    assert!(report.deletions.is_empty());
    assert!(store.world().exists(c2));
    assert_eq!(get(&store, c2, "high_school"), Value::EntityRef(id_at(&report, "$")));
}

#[test]
fn many_to_many_drop_unlinks_and_sweeps() {
    let mut store = store();
    let json = |students: &str| {
        format!(r#"{{"name": "Toulouse", "classes": [{{"name": "1A", "students": [{students}]}}]}}"#)
    };
    let first = apply(
        &mut store,
        "HighSchool",
        &json(r#"{"email": "ada@example.org"}, {"email": "bob@example.org"}"#),
        &[],
    );
    let class = id_at(&first, "$.classes[0]");
    let bob = id_at(&first, "$.classes[0].students[1]");

    // not swept: only the link goes
    apply(&mut store, "HighSchool", &json(r#"{"email": "ada@example.org"}"#), &[]);
    assert!(store.world().exists(bob));
    assert_eq!(store.world().related(class, "students").unwrap().len(), 1);

    // relink, then sweep
    apply(
        &mut store,
        "HighSchool",
        &json(r#"{"email": "ada@example.org"}, {"email": "bob@example.org"}"#),
        &[],
    );
    let report = apply(&mut store, "HighSchool", &json(r#"{"email": "ada@example.org"}"#), &["Student"]);
    assert_eq!(report.deleted().collect::<Vec<_>>(), vec![bob]);
    assert!(!store.world().exists(bob));
}

#[test]
fn entities_outside_the_walk_are_never_candidates() {
    let mut store = store();
    apply(&mut store, "HighSchool", CLASSES_1_2, &[]);
    let albi = apply(&mut store, "HighSchool", r#"{"name": "Albi", "classes": [{"name": "c9"}]}"#, &[]);
    let c9 = id_at(&albi, "$.classes[0]");

    let report = apply(&mut store, "HighSchool", r#"{"name": "Toulouse", "classes": []}"#, &["Class"]);

    assert_eq!(report.deleted().count(), 2);
    assert!(store.world().exists(c9));
}

// =============================================================================
// Sweep Policies
// =============================================================================

/// Ada and Bob in class 1A; Bob has a report card protecting him.
fn protected_setup() -> (MemoryStore, deepgraph_foundation::EntityId) {
    let mut store = store();
    let first = apply(
        &mut store,
        "HighSchool",
        r#"{"name": "Toulouse", "classes": [{"name": "1A", "students": [
            {"email": "ada@example.org"}, {"email": "bob@example.org"}
        ]}]}"#,
        &[],
    );
    let bob = id_at(&first, "$.classes[0].students[1]");
    let card = apply(
        &mut store,
        "ReportCard",
        r#"{"term": "spring", "student": {"email": "bob@example.org"}}"#,
        &[],
    );
    assert!(card.is_success());
    (store, bob)
}

const WITHOUT_BOB: &str = r#"{"name": "Toulouse", "classes": [{"name": "1A", "students": [
    {"email": "ada@example.org"}
]}]}"#;

#[test]
fn best_effort_commits_and_reports_blocked_deletion() {
    let (mut store, bob) = protected_setup();
    let writer = DeepWriter::new(EngineConfig::best_effort());
    let report = writer
        .deep_update_or_create(&mut store, "HighSchool", &doc(WITHOUT_BOB), &["Student"])
        .unwrap();

    assert_eq!(report.outcome, Outcome::SweepIncomplete);
    assert!(report.committed);
    assert_eq!(report.deletions.len(), 1);
    let failure = &report.deletions[0];
    assert_eq!(failure.identity, bob);
    assert!(!failure.fatal);
    assert_eq!(failure.error.as_ref().map(|e| e.code), Some(ErrorCode::DeleteFailed));

    let class = id_at(&report, "$.classes[0]");
    assert!(store.world().exists(bob));
    assert_eq!(store.world().related(class, "students").unwrap().len(), 1);
}

#[test]
fn strict_rolls_back_on_blocked_deletion() {
    let (mut store, bob) = protected_setup();
    let writer = DeepWriter::new(EngineConfig::strict());
    let report = writer
        .deep_update_or_create(&mut store, "HighSchool", &doc(WITHOUT_BOB), &["Student"])
        .unwrap();

    assert_eq!(report.outcome, Outcome::Conflict);
    assert!(!report.committed);
    assert!(report.errors().next().is_none());

    let class = id_at(&report, "$.classes[0]");
    assert_eq!(store.world().related(class, "students").unwrap().len(), 2);
    assert!(store.world().exists(bob));
}

#[test]
fn cascade_into_a_touched_entity_is_fatal() {
    let mut store = store().with_key_mutation(true);
    let first = apply(
        &mut store,
        "HighSchool",
        r#"{"name": "Toulouse", "classes": [{"name": "1A"}, {"name": "1B"}]}"#,
        &[],
    );
    apply(&mut store, "HighSchool", r#"{"name": "Albi"}"#, &[]);
    let moved = id_at(&first, "$.classes[0]");
    let stays = id_at(&first, "$.classes[1]");

    // 1A moves to Albi; 1B is only mentioned by key, so Toulouse is an orphan
    // whose deletion would cascade into 1B.
    let documents = vec![
        doc(&format!(
            r#"{{"id": {}, "name": "1A", "high_school": {{"name": "Albi"}}}}"#,
            moved.key()
        )),
        doc(&format!(r#"{{"id": {}}}"#, stays.key())),
    ];
    let report = DeepWriter::default()
        .deep_update_or_create_batch(&mut store, "Class", &documents, &["HighSchool"])
        .unwrap();

    assert_eq!(report.outcome, Outcome::Conflict);
    assert!(!report.committed);
    let fatal = report.deletions.iter().find(|d| d.fatal).unwrap();
    assert_eq!(fatal.error.as_ref().map(|e| e.code), Some(ErrorCode::DeleteFailed));
    assert!(fatal.deleted.is_empty());

    let toulouse = id_at(&first, "$");
    assert!(store.world().exists(toulouse));
    assert_eq!(get(&store, moved, "high_school"), Value::EntityRef(toulouse));
}
