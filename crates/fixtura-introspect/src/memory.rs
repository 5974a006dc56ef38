use async_trait::async_trait;

use fixtura_core::{Result, SchemaCatalog, validate_catalog};

use crate::source::SchemaSource;

/// Source over a catalog that is already in memory.
#[derive(Debug, Clone)]
pub struct InMemorySource {
    catalog: SchemaCatalog,
}

impl InMemorySource {
    pub fn new(catalog: SchemaCatalog) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl SchemaSource for InMemorySource {
    fn kind(&self) -> &'static str {
        "memory"
    }

    async fn load(&self) -> Result<SchemaCatalog> {
        validate_catalog(&self.catalog)?;
        Ok(self.catalog.clone())
    }
}
