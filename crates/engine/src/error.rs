use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("runner error: {0}")]
    Runner(#[from] tempest_runner::RunnerError),

    #[error("artifact error: {0}")]
    Artifact(#[from] tempest_artifact::ArtifactError),

    #[error("template error: {0}")]
    Template(#[from] tempest_core::TemplateError),

    #[error("turbulence error: {0}")]
    Turbulence(#[from] tempest_turbulence::TurbulenceError),

    #[error("failed to render or serialize action: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("no scenarios supplied for this run")]
    NoScenarios,
}
