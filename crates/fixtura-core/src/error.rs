use thiserror::Error;

/// Core error type shared across Fixtura crates.
#[derive(Debug, Error)]
pub enum Error {
    /// A model or field description violates schema invariants.
    #[error("schema validation error: {0}")]
    SchemaValidation(String),
    /// A requested model name or path is not part of the catalog.
    #[error("unknown model: {0}")]
    UnknownModel(String),
    /// Required relationships form a cycle.
    #[error("cyclic required relationships: {}", format_cycle(.cycle))]
    CyclicRelationship { cycle: Vec<String> },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    /// Catch-all error for unexpected failures.
    #[error("other error: {0}")]
    Other(String),
}

/// Convenience alias for results returned by Fixtura crates.
pub type Result<T> = std::result::Result<T, Error>;

fn format_cycle(cycle: &[String]) -> String {
    match cycle.first() {
        Some(first) => format!("{} -> {first}", cycle.join(" -> ")),
        None => String::new(),
    }
}
