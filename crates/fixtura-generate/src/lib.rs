//! Instance generation engine for Fixtura.
//!
//! Consumes a validated `SchemaCatalog` and produces coherent, seeded object
//! graphs: constraint-respecting field values, required dependencies built
//! before their dependents, optional and to-many links resolved afterwards.

pub mod assembler;
pub mod errors;
pub mod heuristics;
pub mod instance;
pub mod locales;
pub mod model;
pub mod output;
pub mod overrides;
pub mod persist;
pub mod provider;
pub mod resolver;
pub mod seed;
pub mod session;
pub mod strategies;
pub mod synth;

use std::collections::BTreeMap;

use fixtura_core::{ModelSpec, SchemaCatalog};

pub use errors::GenerationError;
pub use instance::{GeneratedBatch, GeneratedInstance, InstanceKey, Link};
pub use locales::LocaleKey;
pub use model::{Flavor, GenerationPolicy, GenerationReport, ModelReport, SessionConfig};
pub use overrides::Overrides;
pub use persist::{
    JsonLinesAdapter, MemoryAdapter, PersistError, PersistedHandle, PersistenceAdapter,
    persist_batch,
};
pub use provider::{FakeValueProvider, SemanticKind, ValueProvider};
pub use session::{GenerationOutcome, GenerationSession};
pub use synth::{SeenValues, Synthesizer};

/// Generate `count` instances of `model` with a fresh session.
pub fn generate(
    catalog: &SchemaCatalog,
    model: &ModelSpec,
    count: u64,
    config: SessionConfig,
) -> Result<Vec<GeneratedInstance>, GenerationError> {
    let outcome = GenerationSession::new(config).generate(catalog, model, count)?;
    Ok(outcome.instances_of(&model.name))
}

/// Generate `count` instances of every catalog model not named in `exclude`.
pub fn generate_for_all(
    catalog: &SchemaCatalog,
    count: u64,
    exclude: &[String],
    config: SessionConfig,
) -> Result<BTreeMap<String, Vec<GeneratedInstance>>, GenerationError> {
    let outcome = GenerationSession::new(config).generate_for_all(catalog, None, count, exclude)?;
    Ok(outcome.requested_instances())
}
