//! Integration tests for Document
//!
//! Tests parsing nested JSON into documents, batches, and builder use.

use deepgraph_foundation::{Document, ErrorKind, Field, Value};
use serde_json::json;

#[test]
fn nested_objects_and_lists() {
    let doc = Document::parse(
        r#"{"name": "Toulouse", "classes": [{"name": "1A"}, {"name": "1B"}], "address": null}"#,
    )
    .unwrap();

    assert_eq!(doc.len(), 3);
    assert_eq!(doc.get("name").and_then(Field::as_scalar), Some(&Value::from("Toulouse")));
    assert!(doc.get("address").is_some_and(Field::is_null));

    let Some(Field::List(classes)) = doc.get("classes") else {
        panic!("classes should be a list");
    };
    assert_eq!(classes.len(), 2);
    let second = classes[1].as_node().unwrap();
    assert_eq!(second.get("name").and_then(Field::as_scalar), Some(&Value::from("1B")));
}

#[test]
fn shapes_are_named() {
    let doc = Document::parse(r#"{"a": 1, "b": {}, "c": [], "d": null}"#).unwrap();
    let shapes: Vec<_> = doc.iter().map(|(name, f)| (name, f.shape())).collect();
    assert_eq!(
        shapes,
        vec![("a", "scalar"), ("b", "object"), ("c", "list"), ("d", "null")]
    );
}

#[test]
fn root_must_be_an_object() {
    for text in ["[1, 2]", "\"school\"", "42", "null"] {
        let err = Document::parse(text).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Document(_)), "{text}");
    }
}

#[test]
fn invalid_json_is_a_document_error() {
    let err = Document::parse("{\"name\": ").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::Document(_)));
}

#[test]
fn batch_accepts_object_or_array_of_objects() {
    assert_eq!(Document::batch_from_json(&json!({"name": "A"})).unwrap().len(), 1);
    assert_eq!(
        Document::batch_from_json(&json!([{"name": "A"}, {"name": "B"}])).unwrap().len(),
        2
    );
    assert!(Document::batch_from_json(&json!([{"name": "A"}, 3])).is_err());
}

#[test]
fn builder_matches_parsed() {
    let built = Document::new()
        .with("name", "Toulouse")
        .with("classes", vec![Document::new().with("name", "1A")]);
    let parsed = Document::parse(r#"{"name": "Toulouse", "classes": [{"name": "1A"}]}"#).unwrap();
    assert_eq!(built, parsed);
    assert_eq!(built.to_json(), json!({"name": "Toulouse", "classes": [{"name": "1A"}]}));
}
