use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which selector produced an `AssertionResult` (spec §3, §4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonKind {
    Equals,
    Contains,
    StatusCode,
    Schema,
    Expression,
}

/// `{name, passed, expected, actual, message, path?, comparison}`
/// (spec §3, §4.9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssertionResult {
    pub name: String,
    pub passed: bool,
    pub expected: Option<Value>,
    pub actual: Option<Value>,
    pub message: String,
    pub path: Option<String>,
    pub comparison: ComparisonKind,
}
