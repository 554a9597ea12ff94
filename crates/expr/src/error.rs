use thiserror::Error;

/// Expression evaluation failure taxonomy (spec §4.2, §7): security
/// violations and timeouts are distinguished from generic evaluation
/// failures so callers (the Assert runner) can report which kind of
/// sandbox rule fired.
#[derive(Debug, Error)]
pub enum ExpressionError {
    #[error("invalid expression syntax: {0}")]
    Syntax(String),

    #[error("expression security violation: {0}")]
    Security(String),

    #[error("expression evaluation timed out")]
    Timeout,

    #[error("expression evaluation failed: {0}")]
    Evaluation(String),
}

/// Extraction failures (spec §4.3). Invalid paths are never fatal at the
/// call site — the Extractor logs and skips — this error type exists for
/// callers that need to distinguish "skipped" from "bound" explicitly.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("malformed JSONPath expression '{path}': {reason}")]
    MalformedPath { path: String, reason: String },
}
