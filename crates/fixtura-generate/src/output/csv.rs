use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use fixtura_core::{ModelSpec, SchemaCatalog};

use crate::errors::GenerationError;
use crate::instance::{GeneratedBatch, GeneratedInstance, Link};

/// Write one model's instances as CSV.
///
/// Columns are `key`, the declared fields in order, then one column per
/// relationship holding linked keys separated by `;`. Returns bytes written.
pub fn write_model_csv(
    path: &Path,
    model: &ModelSpec,
    instances: &[&GeneratedInstance],
) -> Result<u64, ::csv::Error> {
    let writer = BufWriter::new(File::create(path).map_err(::csv::Error::from)?);
    let mut writer = ::csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(CountingWriter::new(writer));

    let mut header = vec!["key".to_string()];
    header.extend(model.fields.iter().map(|field| field.name.clone()));
    header.extend(model.relationships.iter().map(|rel| rel.name.clone()));
    writer.write_record(&header)?;

    for instance in instances {
        let mut record = vec![instance.key.to_string()];
        record.extend(model.fields.iter().map(|field| {
            instance
                .field(&field.name)
                .map(|value| value.to_csv())
                .unwrap_or_default()
        }));
        record.extend(
            model
                .relationships
                .iter()
                .map(|rel| instance.link(&rel.name).map(link_cell).unwrap_or_default()),
        );
        writer.write_record(&record)?;
    }

    writer.flush()?;
    let counting = writer.into_inner().map_err(|err| err.into_error())?;
    Ok(counting.bytes_written())
}

/// Write one CSV per model present in the batch into `dir`.
pub fn write_batch_csv(
    dir: &Path,
    catalog: &SchemaCatalog,
    batch: &GeneratedBatch,
) -> Result<Vec<PathBuf>, GenerationError> {
    let mut written = Vec::new();
    for model in &catalog.models {
        let instances: Vec<&GeneratedInstance> = batch.instances_of(&model.name).collect();
        if instances.is_empty() {
            continue;
        }
        let path = dir.join(format!("{}.csv", model.name));
        write_model_csv(&path, model, &instances)?;
        written.push(path);
    }
    Ok(written)
}

fn link_cell(link: &Link) -> String {
    link.targets()
        .iter()
        .map(|key| key.to_string())
        .collect::<Vec<_>>()
        .join(";")
}

struct CountingWriter<W: Write> {
    inner: W,
    bytes: u64,
}

impl<W: Write> CountingWriter<W> {
    fn new(inner: W) -> Self {
        Self { inner, bytes: 0 }
    }

    fn bytes_written(&self) -> u64 {
        self.bytes
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let size = self.inner.write(buf)?;
        self.bytes = self.bytes.saturating_add(size as u64);
        Ok(size)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}
