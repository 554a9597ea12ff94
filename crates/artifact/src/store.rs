use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use tempest_core::RunConfig;

use crate::error::ArtifactError;
use crate::jsonl::JsonlWriter;
use crate::record::{AssertionRecord, InstanceRecord, RunManifest, RunSummary, StepRecord};

/// Storage backend for a single run's artifacts (spec §4.14).
///
/// Grounded in `acteon-audit`'s `AuditStore` trait: an `#[async_trait]
/// pub trait .. : Send + Sync` with one production implementation. Unlike
/// `AuditStore`, a `Tempest` run has exactly one artifact destination, so
/// there is no multi-backend registry here — the trait exists so
/// `tempest-engine` and `tempest-replay` depend on an interface rather
/// than `FileArtifactStore` directly.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn initialize(&self) -> Result<(), ArtifactError>;
    async fn write_instance(&self, record: InstanceRecord) -> Result<(), ArtifactError>;
    async fn write_step(&self, record: StepRecord) -> Result<(), ArtifactError>;
    async fn write_assertion(&self, record: AssertionRecord) -> Result<(), ArtifactError>;
    async fn write_instance_artifact(&self, instance_id: &str, filename: &str, data: &[u8]) -> Result<PathBuf, ArtifactError>;
    async fn finalize(&self) -> Result<RunSummary, ArtifactError>;
    fn run_path(&self) -> &Path;
}

#[derive(Default)]
struct Tally {
    total_instances: AtomicU64,
    pass_count: AtomicU64,
    fail_count: AtomicU64,
    error_count: AtomicU64,
    total_steps: AtomicU64,
    total_assertions: AtomicU64,
    assertions_passed: AtomicU64,
    assertions_failed: AtomicU64,
}

/// File-backed `ArtifactStore`: `runs/<run_id>/` with `manifest.json`,
/// three append-only JSONL files (one `tokio::sync::Mutex<tokio::fs::File>`
/// each, via [`JsonlWriter`]), `summary.json`, and an `artifacts/` side
/// directory. Mirrors `ArtifactStore`/`JSONLWriter` in
/// `original_source/src/windtunnel/storage/{artifact,jsonl}.py`.
pub struct FileArtifactStore {
    run_id: String,
    run_path: PathBuf,
    sut_name: String,
    scenario_ids: Vec<String>,
    seed: u64,
    config: RunConfig,
    started_at: Mutex<Option<DateTime<Utc>>>,
    instances: JsonlWriter,
    steps: JsonlWriter,
    assertions: JsonlWriter,
    tally: Tally,
}

impl FileArtifactStore {
    #[must_use]
    pub fn new(base_path: impl AsRef<Path>, run_id: impl Into<String>, sut_name: impl Into<String>, scenario_ids: Vec<String>, seed: u64, config: RunConfig) -> Self {
        let run_id = run_id.into();
        let run_path = base_path.as_ref().join(&run_id);
        Self {
            instances: JsonlWriter::new(run_path.join("instances.jsonl")),
            steps: JsonlWriter::new(run_path.join("steps.jsonl")),
            assertions: JsonlWriter::new(run_path.join("assertions.jsonl")),
            run_path,
            run_id,
            sut_name: sut_name.into(),
            scenario_ids,
            seed,
            config,
            started_at: Mutex::new(None),
            tally: Tally::default(),
        }
    }

    #[must_use]
    pub fn manifest_path(&self) -> PathBuf {
        self.run_path.join("manifest.json")
    }

    #[must_use]
    pub fn summary_path(&self) -> PathBuf {
        self.run_path.join("summary.json")
    }

    #[must_use]
    pub fn artifacts_path(&self) -> PathBuf {
        self.run_path.join("artifacts")
    }
}

#[async_trait]
impl ArtifactStore for FileArtifactStore {
    async fn initialize(&self) -> Result<(), ArtifactError> {
        tokio::fs::create_dir_all(&self.run_path).await?;
        tokio::fs::create_dir_all(self.artifacts_path()).await?;

        let started_at = Utc::now();
        *self.started_at.lock().await = Some(started_at);

        let manifest = RunManifest {
            run_id: self.run_id.clone(),
            timestamp: started_at,
            sut_name: self.sut_name.clone(),
            scenario_ids: self.scenario_ids.clone(),
            seed: self.seed,
            config: self.config.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        };
        let body = serde_json::to_vec_pretty(&manifest)?;
        tokio::fs::write(self.manifest_path(), body).await?;

        self.instances.open().await?;
        self.steps.open().await?;
        self.assertions.open().await?;
        Ok(())
    }

    async fn write_instance(&self, record: InstanceRecord) -> Result<(), ArtifactError> {
        let passed = record.passed;
        let has_error = record.error.is_some();
        self.instances.write(&record).await?;

        self.tally.total_instances.fetch_add(1, Ordering::SeqCst);
        match passed {
            Some(true) => {
                self.tally.pass_count.fetch_add(1, Ordering::SeqCst);
            }
            Some(false) => {
                self.tally.fail_count.fetch_add(1, Ordering::SeqCst);
            }
            None => {}
        }
        if has_error {
            self.tally.error_count.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn write_step(&self, record: StepRecord) -> Result<(), ArtifactError> {
        self.steps.write(&record).await?;
        self.tally.total_steps.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn write_assertion(&self, record: AssertionRecord) -> Result<(), ArtifactError> {
        let passed = record.passed;
        self.assertions.write(&record).await?;

        self.tally.total_assertions.fetch_add(1, Ordering::SeqCst);
        if passed {
            self.tally.assertions_passed.fetch_add(1, Ordering::SeqCst);
        } else {
            self.tally.assertions_failed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn write_instance_artifact(&self, instance_id: &str, filename: &str, data: &[u8]) -> Result<PathBuf, ArtifactError> {
        let instance_dir = self.artifacts_path().join(instance_id);
        tokio::fs::create_dir_all(&instance_dir).await?;
        let artifact_path = instance_dir.join(filename);
        tokio::fs::write(&artifact_path, data).await?;
        Ok(artifact_path)
    }

    async fn finalize(&self) -> Result<RunSummary, ArtifactError> {
        self.instances.close().await;
        self.steps.close().await;
        self.assertions.close().await;

        let completed_at = Utc::now();
        let started_at = *self.started_at.lock().await;
        let duration_ms = started_at.map_or(0.0, |s| (completed_at - s).num_microseconds().unwrap_or(0) as f64 / 1000.0);

        let total_instances = self.tally.total_instances.load(Ordering::SeqCst);
        let pass_count = self.tally.pass_count.load(Ordering::SeqCst);
        let pass_rate = if total_instances > 0 { (pass_count as f64 / total_instances as f64) * 100.0 } else { 0.0 };

        let summary = RunSummary {
            run_id: self.run_id.clone(),
            completed_at: Some(completed_at),
            total_instances,
            pass_count,
            fail_count: self.tally.fail_count.load(Ordering::SeqCst),
            error_count: self.tally.error_count.load(Ordering::SeqCst),
            pass_rate,
            duration_ms,
            total_steps: self.tally.total_steps.load(Ordering::SeqCst),
            total_assertions: self.tally.total_assertions.load(Ordering::SeqCst),
            assertions_passed: self.tally.assertions_passed.load(Ordering::SeqCst),
            assertions_failed: self.tally.assertions_failed.load(Ordering::SeqCst),
        };

        let body = serde_json::to_vec_pretty(&summary)?;
        tokio::fs::write(self.summary_path(), body).await?;
        Ok(summary)
    }

    fn run_path(&self) -> &Path {
        &self.run_path
    }
}
