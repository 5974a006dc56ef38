use thiserror::Error;

use crate::persist::PersistError;

/// Errors emitted by the generation engine.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Schema validation, unknown model and cyclic relationship failures.
    #[error(transparent)]
    Core(#[from] fixtura_core::Error),
    #[error("constraint unsatisfiable for {model}.{field} (count {count}): {reason}")]
    ConstraintUnsatisfiable {
        model: String,
        field: String,
        count: u64,
        reason: String,
    },
    #[error("invalid override '{key}' for {model}: {reason}")]
    InvalidOverride {
        model: String,
        key: String,
        reason: String,
    },
    #[error("persistence error: {0}")]
    Persist(#[from] PersistError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

impl GenerationError {
    /// Stable name of the failure kind, used in CLI summaries and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            GenerationError::Core(fixtura_core::Error::SchemaValidation(_)) => "schema_validation",
            GenerationError::Core(fixtura_core::Error::UnknownModel(_)) => "unknown_model",
            GenerationError::Core(fixtura_core::Error::CyclicRelationship { .. }) => {
                "cyclic_relationship"
            }
            GenerationError::Core(fixtura_core::Error::Io(_)) | GenerationError::Io(_) => "io",
            GenerationError::Core(_) => "core",
            GenerationError::ConstraintUnsatisfiable { .. } => "constraint_unsatisfiable",
            GenerationError::InvalidOverride { .. } => "invalid_override",
            GenerationError::Persist(_) => "persistence",
            GenerationError::Json(_) => "json",
            GenerationError::Csv(_) => "csv",
        }
    }

    pub(crate) fn unsatisfiable(
        model: &str,
        field: &str,
        count: u64,
        reason: impl Into<String>,
    ) -> Self {
        GenerationError::ConstraintUnsatisfiable {
            model: model.to_string(),
            field: field.to_string(),
            count,
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_override(model: &str, key: &str, reason: impl Into<String>) -> Self {
        GenerationError::InvalidOverride {
            model: model.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}
