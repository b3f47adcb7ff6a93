//! Integration tests for the entity store adapter
//!
//! Drives `MemoryStore` through the `EntityStoreAdapter` trait object,
//! the way the engine sees it.

use deepgraph_foundation::Value;
use deepgraph_storage::{EntityStoreAdapter, MemoryStore};

use crate::{fields, school_registry};

fn store() -> MemoryStore {
    MemoryStore::new(school_registry())
}

/// Creates a school through the trait, inside the caller's transaction.
fn create_school(store: &mut dyn EntityStoreAdapter, name: &str) -> deepgraph_foundation::EntityId {
    store
        .create("HighSchool", &fields(&[("name", Value::from(name))]))
        .unwrap()
}

#[test]
fn trait_object_reads_and_writes() {
    let mut store = store();
    let adapter: &mut dyn EntityStoreAdapter = &mut store;

    adapter.begin().unwrap();
    let school = create_school(adapter, "Toulouse");
    let class = adapter
        .create(
            "Class",
            &fields(&[("name", Value::from("1A")), ("high_school", Value::EntityRef(school))]),
        )
        .unwrap();
    adapter.commit().unwrap();

    assert_eq!(adapter.type_of(class).unwrap(), "Class");
    assert_eq!(adapter.related(school, "classes").unwrap(), vec![class]);
    assert_eq!(
        adapter
            .lookup("HighSchool", &fields(&[("name", Value::from("Toulouse"))]))
            .unwrap(),
        Some(school)
    );
    assert_eq!(adapter.registry().len(), 4);
}

#[test]
fn rollback_restores_links_and_deletions() {
    let mut store = store();
    store.begin().unwrap();
    let school = create_school(&mut store, "Toulouse");
    let student = store
        .create("Student", &fields(&[("email", Value::from("ada@example.org"))]))
        .unwrap();
    store.commit().unwrap();

    store.begin().unwrap();
    store.link(school, "students", student).unwrap();
    let deleted = store.delete(school).unwrap();
    assert_eq!(deleted, vec![school]);
    assert_eq!(store.fields(student).unwrap()["school"], Value::Null);
    store.rollback().unwrap();

    assert!(store.exists(school));
    assert!(store.related(school, "students").unwrap().is_empty());
    assert_eq!(store.depth(), 0);
}

#[test]
fn failed_update_keeps_previous_values() {
    let mut store = store();
    store.begin().unwrap();
    create_school(&mut store, "Toulouse");
    let albi = create_school(&mut store, "Albi");

    let clash = store.update(albi, &fields(&[("name", Value::from("Toulouse"))]));
    assert!(clash.unwrap_err().is_unique_violation());
    assert_eq!(store.fields(albi).unwrap()["name"], Value::from("Albi"));
    store.commit().unwrap();
}

#[test]
fn key_mutation_is_a_store_capability() {
    assert!(!store().supports_key_mutation());
    assert!(store().with_key_mutation(true).supports_key_mutation());
}

#[test]
fn unbalanced_transactions_fail() {
    let mut store = store();
    assert!(store.commit().is_err());
    assert!(store.rollback().is_err());

    store.begin().unwrap();
    store.begin().unwrap();
    store.commit().unwrap();
    assert_eq!(store.depth(), 1);
    store.rollback().unwrap();
    assert_eq!(store.depth(), 0);
}
