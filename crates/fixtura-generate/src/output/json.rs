use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde_json::{Map, Value as JsonValue};

use crate::errors::GenerationError;
use crate::instance::GeneratedBatch;

/// The batch as a JSON object of model name to instance array.
pub fn batch_to_json(batch: &GeneratedBatch) -> Result<JsonValue, GenerationError> {
    let mut grouped = Map::new();
    for (model, instances) in batch.grouped() {
        grouped.insert(model, serde_json::to_value(instances)?);
    }
    Ok(JsonValue::Object(grouped))
}

/// Pretty-printed grouped JSON document.
pub fn write_batch_json(path: &Path, batch: &GeneratedBatch) -> Result<(), GenerationError> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, &batch_to_json(batch)?)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}
