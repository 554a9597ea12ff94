use thiserror::Error;

/// Errors the parallel executor itself can raise. Failures inside an
/// individual instance producer never surface here — they are captured as
/// an error-typed instance result instead (spec §4.12: "one exception ...
/// never aborts other instances").
#[derive(Debug, Error)]
pub enum RetryError {
    #[error("run was cancelled before this instance started")]
    Cancelled,
}
