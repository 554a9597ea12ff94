use thiserror::Error;

/// Errors the action runners raise themselves, as distinct from the
/// Observations their target actions produce (a failed HTTP call is
/// still a successful `Observation` with `ok: false`, not an `Err` here).
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("unknown service '{0}' referenced by action")]
    UnknownService(String),

    #[error("invalid JSON schema: {0}")]
    InvalidSchema(String),
}
