use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::error::ArtifactError;
use crate::record::{AssertionRecord, InstanceRecord, RunManifest, RunSummary, StepRecord};

/// Reads back a run's artifact directory, used by the Replay Engine and
/// by the advisory `report`/`serve` CLI stubs.
///
/// Per §4.14/§6: "a crash mid-run leaves a valid prefix of each append
/// file; malformed trailing partial lines must be silently skipped by
/// readers." `read_jsonl` stops at the first line that fails to parse
/// rather than erroring the whole read.
pub struct ArtifactReader {
    run_path: PathBuf,
}

impl ArtifactReader {
    #[must_use]
    pub fn new(run_path: impl Into<PathBuf>) -> Self {
        Self { run_path: run_path.into() }
    }

    #[must_use]
    pub fn run_path(&self) -> &Path {
        &self.run_path
    }

    pub async fn manifest(&self) -> Result<RunManifest, ArtifactError> {
        let body = tokio::fs::read(self.run_path.join("manifest.json")).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    pub async fn summary(&self) -> Result<Option<RunSummary>, ArtifactError> {
        match tokio::fs::read(self.run_path.join("summary.json")).await {
            Ok(body) => Ok(Some(serde_json::from_slice(&body)?)),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    pub async fn instances(&self) -> Result<Vec<InstanceRecord>, ArtifactError> {
        read_jsonl(&self.run_path.join("instances.jsonl")).await
    }

    pub async fn steps(&self) -> Result<Vec<StepRecord>, ArtifactError> {
        read_jsonl(&self.run_path.join("steps.jsonl")).await
    }

    pub async fn assertions(&self) -> Result<Vec<AssertionRecord>, ArtifactError> {
        read_jsonl(&self.run_path.join("assertions.jsonl")).await
    }

    /// Find one instance's record by id, used by the Replay Engine's
    /// `load_instance` step.
    pub async fn find_instance(&self, instance_id: &str) -> Result<Option<InstanceRecord>, ArtifactError> {
        Ok(self.instances().await?.into_iter().find(|r| r.instance_id == instance_id))
    }
}

async fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, ArtifactError> {
    let file = match tokio::fs::File::open(path).await {
        Ok(file) => file,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(error) => return Err(error.into()),
    };

    let mut lines = BufReader::new(file).lines();
    let mut records = Vec::new();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<T>(&line) {
            Ok(record) => records.push(record),
            Err(error) => {
                tracing::warn!(%error, path = %path.display(), "stopping at malformed trailing jsonl line");
                break;
            }
        }
    }
    Ok(records)
}
