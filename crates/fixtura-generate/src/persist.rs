use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::instance::{GeneratedBatch, GeneratedInstance, InstanceKey};

/// Errors reported by persistence adapters.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("adapter rejected {key}: {reason}")]
    Rejected { key: String, reason: String },
}

/// Receipt for one stored instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedHandle {
    pub key: InstanceKey,
    /// Adapter-specific location, e.g. `instances.ndjson:3`.
    pub location: String,
}

/// External store for generated instances.
///
/// Called once per instance in dependency order. Transactions and rollback
/// belong to the adapter.
#[async_trait]
pub trait PersistenceAdapter: Send {
    fn name(&self) -> &'static str;

    async fn persist(&mut self, instance: &GeneratedInstance)
    -> Result<PersistedHandle, PersistError>;
}

/// Persist every instance of `batch` in creation order.
///
/// The first failure stops the walk; instances stored before it stay stored.
pub async fn persist_batch(
    batch: &GeneratedBatch,
    adapter: &mut dyn PersistenceAdapter,
) -> Result<Vec<PersistedHandle>, PersistError> {
    let mut handles = Vec::with_capacity(batch.len());
    for instance in batch.iter() {
        match adapter.persist(instance).await {
            Ok(handle) => {
                debug!(key = %handle.key, location = %handle.location, "instance persisted");
                handles.push(handle);
            }
            Err(err) => {
                warn!(
                    adapter = adapter.name(),
                    key = %instance.key,
                    persisted = handles.len(),
                    "persistence aborted"
                );
                return Err(err);
            }
        }
    }
    Ok(handles)
}

/// Appends one JSON object per instance to a file.
pub struct JsonLinesAdapter {
    path: PathBuf,
    writer: BufWriter<File>,
    lines: u64,
}

impl JsonLinesAdapter {
    pub fn create(path: impl AsRef<Path>) -> Result<Self, PersistError> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
            lines: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lines(&self) -> u64 {
        self.lines
    }
}

#[async_trait]
impl PersistenceAdapter for JsonLinesAdapter {
    fn name(&self) -> &'static str {
        "json_lines"
    }

    async fn persist(
        &mut self,
        instance: &GeneratedInstance,
    ) -> Result<PersistedHandle, PersistError> {
        serde_json::to_writer(&mut self.writer, instance)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        self.lines += 1;
        let file = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(PersistedHandle {
            key: instance.key.clone(),
            location: format!("{file}:{}", self.lines),
        })
    }
}

/// Keeps persisted instances in memory; can be told to reject one key.
#[derive(Debug, Default)]
pub struct MemoryAdapter {
    stored: Vec<GeneratedInstance>,
    reject: Option<InstanceKey>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting(key: InstanceKey) -> Self {
        Self {
            stored: Vec::new(),
            reject: Some(key),
        }
    }

    pub fn stored(&self) -> &[GeneratedInstance] {
        &self.stored
    }
}

#[async_trait]
impl PersistenceAdapter for MemoryAdapter {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn persist(
        &mut self,
        instance: &GeneratedInstance,
    ) -> Result<PersistedHandle, PersistError> {
        if self.reject.as_ref() == Some(&instance.key) {
            return Err(PersistError::Rejected {
                key: instance.key.to_string(),
                reason: "rejected by configuration".to_string(),
            });
        }
        self.stored.push(instance.clone());
        Ok(PersistedHandle {
            key: instance.key.clone(),
            location: format!("memory:{}", self.stored.len() - 1),
        })
    }
}
