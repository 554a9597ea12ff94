use std::path::PathBuf;

use thiserror::Error;

/// Errors fatal to a single replay invocation (spec §4.13, §7's "Replay
/// miss"). Everything else a replay encounters while re-executing a flow
/// (a step that fails, a divergent observation) is data in the
/// `ReplayResult`, not an `Err` here.
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("instance '{instance_id}' not found in run '{run_id}' at {run_path}")]
    InstanceNotFound { run_id: String, instance_id: String, run_path: PathBuf },

    #[error("scenario '{scenario_id}' not found under {scenarios_dir}")]
    ScenarioNotFound { scenario_id: String, scenarios_dir: PathBuf },

    #[error("artifact error: {0}")]
    Artifact(#[from] tempest_artifact::ArtifactError),

    #[error("runner error: {0}")]
    Runner(#[from] tempest_runner::RunnerError),

    #[error("template error: {0}")]
    Template(#[from] tempest_core::TemplateError),

    #[error("failed to parse scenario file {path}: {source}")]
    ScenarioParse { path: PathBuf, source: serde_yaml_ng::Error },

    #[error("failed to parse scenario file {path}: {source}")]
    ScenarioParseJson { path: PathBuf, source: serde_json::Error },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to render action template: {0}")]
    Serialization(#[from] serde_json::Error),
}
