//! Core contracts for Fixtura.
//!
//! This crate defines the normalized schema model the generation engine
//! consumes, the value type it produces, schema validation and the
//! dependency graph used to order required relationships.

pub mod error;
pub mod graph;
pub mod schema;
pub mod validation;
pub mod value;

pub use error::{Error, Result};
pub use graph::{DependencyGraph, DependencySummary};
pub use schema::{
    FieldCategory, FieldSpec, ModelSpec, RelationshipKind, RelationshipSpec, SchemaCatalog,
    catalog_json_schema,
};
pub use validation::{validate_catalog, validate_field, validate_model};
pub use value::Value;

/// Current contract version for schema catalog documents.
pub const SCHEMA_VERSION: &str = "0.1";
