//! Writers for generated batches.

pub mod csv;
pub mod json;

pub use self::csv::{write_batch_csv, write_model_csv};
pub use self::json::{batch_to_json, write_batch_json};
