use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::ArtifactError;

/// An append-only JSONL file guarded by a single mutex, per §5's
/// "serialize appends per-file via a mutex" instruction. Each `write`
/// serializes one record, appends a newline, and flushes before
/// returning — the durability guarantee a crash-tolerant reader depends
/// on (§4.14: "a crash mid-run leaves a valid prefix of each append
/// file").
pub struct JsonlWriter {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl JsonlWriter {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn open(&self) -> Result<(), ArtifactError> {
        let file = OpenOptions::new().create(true).append(true).open(&self.path).await?;
        *self.file.lock().await = Some(file);
        Ok(())
    }

    pub async fn write(&self, record: &impl Serialize) -> Result<(), ArtifactError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let mut guard = self.file.lock().await;
        let file = guard.as_mut().ok_or_else(|| ArtifactError::NotInitialized(self.path.display().to_string()))?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }

    pub async fn close(&self) {
        *self.file.lock().await = None;
    }
}
