use async_trait::async_trait;

use fixtura_core::{ModelSpec, Result, SchemaCatalog};

/// Trait implemented by adapters that can extract a schema catalog.
#[async_trait]
pub trait SchemaSource: Send + Sync {
    /// Returns the source identifier (e.g. `json`).
    fn kind(&self) -> &'static str;

    /// Extract and validate the catalog.
    async fn load(&self) -> Result<SchemaCatalog>;
}

/// Load the catalog from `source` and resolve one model by `app.Name` path.
pub async fn resolve_model_by_path(source: &dyn SchemaSource, path: &str) -> Result<ModelSpec> {
    let catalog = source.load().await?;
    catalog.resolve_model_by_path(path).cloned()
}
