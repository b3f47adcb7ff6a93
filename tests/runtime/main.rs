//! Integration tests for Layer 3: Runtime
//!
//! Tests schema files driving deep writes, snapshots carried across
//! operations, and rendered reports.

use deepgraph_engine::{Action, DeepWriter, EngineConfig};
use deepgraph_foundation::{Document, Value};
use deepgraph_runtime::{ReportStyle, Schema, from_bytes, render, render_entities, to_bytes};
use deepgraph_storage::MemoryStore;

const SCHEMA: &str = r#"{
    "types": [
        {
            "name": "HighSchool",
            "fields": [
                { "name": "name", "type": "string" },
                { "name": "address", "type": "string", "nullable": true }
            ],
            "unique_keys": [["name"]]
        },
        {
            "name": "Class",
            "fields": [{ "name": "name", "type": "string" }],
            "relationships": [
                { "name": "high_school", "kind": "many_to_one",
                  "target": "HighSchool", "reverse_name": "classes" }
            ],
            "unique_keys": [["high_school", "name"]]
        },
        {
            "name": "Student",
            "fields": [
                { "name": "email", "type": "string" },
                { "name": "year", "type": "int", "default": 1 }
            ],
            "relationships": [
                { "name": "classes", "kind": "many_to_many",
                  "target": "Class", "reverse_name": "students" }
            ],
            "unique_keys": [["email"]]
        }
    ],
    "profiles": [
        { "entity_type": "HighSchool", "use_case": "public", "exclude": ["classes"] }
    ]
}"#;

const TOULOUSE: &str = r#"{
    "name": "Toulouse",
    "classes": [
        { "name": "1A", "students": [{ "email": "ada@example.org" }] },
        { "name": "1B" }
    ]
}"#;

fn writer(schema: &Schema, config: EngineConfig) -> DeepWriter {
    DeepWriter::new(config).with_profiles(schema.profiles.clone())
}

#[test]
fn schema_file_drives_a_deep_write() {
    let schema = Schema::from_json_str(SCHEMA).unwrap();
    let mut store = MemoryStore::new(schema.registry.clone());
    let report = writer(&schema, EngineConfig::default())
        .deep_update_or_create(&mut store, "HighSchool", &Document::parse(TOULOUSE).unwrap(), &[])
        .unwrap();

    assert!(report.is_success());
    assert_eq!(report.count(Action::Created), 4);
    let ada = report.at("$.classes[0].students[0]").and_then(|r| r.identity()).unwrap();
    assert_eq!(store.world().get(ada, "year").unwrap(), Value::Int(1));
}

#[test]
fn schema_profiles_apply_under_their_use_case() {
    let schema = Schema::from_json_str(SCHEMA).unwrap();
    let mut store = MemoryStore::new(schema.registry.clone());
    let report = writer(&schema, EngineConfig::default().with_use_case("public"))
        .deep_update_or_create(&mut store, "HighSchool", &Document::parse(TOULOUSE).unwrap(), &[])
        .unwrap();

    assert!(report.is_conflict());
    assert_eq!(store.world().entity_count(), 0);
}

#[test]
fn snapshot_carries_state_between_operations() {
    let schema = Schema::from_json_str(SCHEMA).unwrap();
    let mut store = MemoryStore::new(schema.registry.clone());
    let deep = writer(&schema, EngineConfig::default());
    deep.deep_update_or_create(&mut store, "HighSchool", &Document::parse(TOULOUSE).unwrap(), &[])
        .unwrap();
    let bytes = to_bytes(store.world()).unwrap();

    let world = from_bytes(schema.registry.clone(), &bytes).unwrap();
    let mut store = MemoryStore::from_world(world);
    let dropped = r#"{"name": "Toulouse", "classes": [{ "name": "1A" }]}"#;
    let report = deep
        .deep_update_or_create(&mut store, "HighSchool", &Document::parse(dropped).unwrap(), &["Class"])
        .unwrap();

    assert!(report.is_success());
    assert_eq!(report.count(Action::Created), 0);
    assert_eq!(report.deleted().count(), 1);
    assert_eq!(store.world().entities_of("Class").count(), 1);
    assert_eq!(store.world().entities_of("Student").count(), 1);
}

#[test]
fn rendered_report_and_entities() {
    let schema = Schema::from_json_str(SCHEMA).unwrap();
    let mut store = MemoryStore::new(schema.registry.clone());
    let report = writer(&schema, EngineConfig::default())
        .deep_update_or_create(&mut store, "HighSchool", &Document::parse(TOULOUSE).unwrap(), &[])
        .unwrap();

    let json = render(&report, store.world(), ReportStyle::Verbose);
    let paths: Vec<_> = json["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["path"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(
        paths,
        vec!["$", "$.classes[0]", "$.classes[0].students[0]", "$.classes[1]"]
    );
    assert_eq!(json["results"][1]["fields"]["high_school"], json["results"][0]["id"]);

    let students = render_entities(store.world(), Some("Student"));
    assert_eq!(students[0]["fields"]["email"], "ada@example.org");
    assert_eq!(students[0]["fields"]["year"], 1);
}
