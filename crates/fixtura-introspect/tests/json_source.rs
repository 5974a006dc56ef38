use std::fs;
use std::path::PathBuf;

use fixtura_core::Error;
use fixtura_introspect::{InMemorySource, JsonDocumentSource, SchemaSource, resolve_model_by_path};

const CATALOG: &str = r#"{
  "schema_version": "0.1",
  "models": [
    { "name": "Author", "app": "blog", "fields": [{ "name": "email", "category": "text", "unique": true }] },
    {
      "name": "Post",
      "app": "blog",
      "fields": [
        { "name": "title", "category": "text", "max_length": 60 },
        { "name": "author_id", "category": "relational" }
      ],
      "relationships": [{ "name": "author", "kind": "to_one_required", "target": "Author" }]
    }
  ]
}"#;

fn write_catalog(contents: &str) -> PathBuf {
    let mut path = std::env::temp_dir();
    path.push(format!("fixtura_catalog_{}.json", uuid::Uuid::new_v4()));
    fs::write(&path, contents).expect("write catalog");
    path
}

#[tokio::test]
async fn json_source_loads_and_resolves_paths() {
    let source = JsonDocumentSource::new(write_catalog(CATALOG));
    assert_eq!(source.kind(), "json");

    let catalog = source.load().await.expect("load catalog");
    assert_eq!(catalog.models.len(), 2);

    let post = resolve_model_by_path(&source, "blog.Post").await.expect("resolve");
    assert_eq!(post.relationships.len(), 1);
}

#[tokio::test]
async fn unknown_path_is_an_unknown_model_error() {
    let source = JsonDocumentSource::new(write_catalog(CATALOG));
    let err = resolve_model_by_path(&source, "blog.Comment")
        .await
        .expect_err("missing model");
    assert!(matches!(err, Error::UnknownModel(path) if path == "blog.Comment"));
}

#[tokio::test]
async fn semantic_errors_surface_as_schema_validation() {
    let broken = CATALOG.replace("\"target\": \"Author\"", "\"target\": \"Writer\"");
    let source = JsonDocumentSource::new(write_catalog(&broken));
    assert!(matches!(source.load().await, Err(Error::SchemaValidation(_))));
}

#[tokio::test]
async fn missing_documents_are_io_errors() {
    let mut path = std::env::temp_dir();
    path.push(format!("fixtura_missing_{}.json", uuid::Uuid::new_v4()));
    let source = JsonDocumentSource::new(path);
    assert!(matches!(source.load().await, Err(Error::Io(_))));
}

#[tokio::test]
async fn memory_source_returns_its_catalog() {
    let catalog: fixtura_core::SchemaCatalog = serde_json::from_str(CATALOG).expect("parse");
    let source = InMemorySource::new(catalog.clone());
    assert_eq!(source.load().await.expect("load"), catalog);
}
