use thiserror::Error;

/// Errors raised by the artifact store itself, as distinct from the
/// content it persists — a failed instance is still a valid
/// `InstanceRecord` line, not an `Err` here.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("artifact store for run '{0}' has not been initialized")]
    NotInitialized(String),
}

impl From<std::io::Error> for ArtifactError {
    fn from(error: std::io::Error) -> Self {
        ArtifactError::Storage(error.to_string())
    }
}

impl From<serde_json::Error> for ArtifactError {
    fn from(error: serde_json::Error) -> Self {
        ArtifactError::Serialization(error.to_string())
    }
}
