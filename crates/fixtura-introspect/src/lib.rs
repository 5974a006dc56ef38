//! Schema sources for the generation engine.
//!
//! The engine never inspects live framework objects; a source extracts a
//! validated `SchemaCatalog` and the engine works from that.

pub mod json;
pub mod memory;
pub mod source;

pub use json::{JsonDocumentSource, parse_catalog_document};
pub use memory::InMemorySource;
pub use source::{SchemaSource, resolve_model_by_path};

pub use fixtura_core::SchemaCatalog;
