use std::path::{Path, PathBuf};

use async_trait::async_trait;
use jsonschema::JSONSchema;
use serde_json::Value;
use tracing::info;

use fixtura_core::{Error, Result, SCHEMA_VERSION, SchemaCatalog, catalog_json_schema, validate_catalog};

use crate::source::SchemaSource;

/// Source reading a catalog document (`schema.json`) from disk.
#[derive(Debug, Clone)]
pub struct JsonDocumentSource {
    path: PathBuf,
}

impl JsonDocumentSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SchemaSource for JsonDocumentSource {
    fn kind(&self) -> &'static str {
        "json"
    }

    async fn load(&self) -> Result<SchemaCatalog> {
        let contents = tokio::fs::read_to_string(&self.path).await?;
        let document: Value = serde_json::from_str(&contents)?;
        let catalog = parse_catalog_document(&document)?;
        info!(
            path = %self.path.display(),
            models = catalog.models.len(),
            "schema catalog loaded"
        );
        Ok(catalog)
    }
}

/// Validate a catalog document structurally (JSON Schema) and semantically.
pub fn parse_catalog_document(document: &Value) -> Result<SchemaCatalog> {
    let schema = serde_json::to_value(catalog_json_schema())?;
    let compiled = JSONSchema::compile(&schema)
        .map_err(|err| Error::Other(format!("catalog json schema: {err}")))?;

    if let Err(errors) = compiled.validate(document) {
        let messages: Vec<String> = errors
            .map(|error| {
                let path = error.instance_path.to_string();
                let path = if path.is_empty() { "/".to_string() } else { path };
                format!("{path}: {error}")
            })
            .collect();
        return Err(Error::SchemaValidation(messages.join("; ")));
    }

    let catalog: SchemaCatalog = serde_json::from_value(document.clone())?;
    if catalog.schema_version != SCHEMA_VERSION {
        return Err(Error::SchemaValidation(format!(
            "unsupported schema_version '{}' (expected '{SCHEMA_VERSION}')",
            catalog.schema_version
        )));
    }
    validate_catalog(&catalog)?;
    Ok(catalog)
}
