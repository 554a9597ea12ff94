use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Comparator applied once an `Expectation`'s selector has resolved a
/// value (spec §3, §4.9, §4.11).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparator {
    Equals,
    Contains,
}

/// A disjoint selector over how to evaluate an expectation: exactly one
/// of the fields below should be set. An `Expectation` with no selector
/// is a usage error (spec §3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Expectation {
    pub status_code: Option<u16>,
    pub jsonpath: Option<String>,
    pub context_path: Option<String>,
    pub json_schema: Option<Value>,
    pub expression: Option<String>,
    #[serde(default)]
    pub equals: Option<Value>,
    #[serde(default)]
    pub contains: Option<Value>,
}

impl Expectation {
    /// Which comparator the caller supplied, if any.
    #[must_use]
    pub fn comparator(&self) -> Option<Comparator> {
        if self.equals.is_some() {
            Some(Comparator::Equals)
        } else if self.contains.is_some() {
            Some(Comparator::Contains)
        } else {
            None
        }
    }

    /// The expected value for whichever comparator is set.
    #[must_use]
    pub fn expected_value(&self) -> Option<&Value> {
        self.equals.as_ref().or(self.contains.as_ref())
    }

    /// True if this expectation has no selector configured — a usage
    /// error per spec §3.
    #[must_use]
    pub fn is_empty_selector(&self) -> bool {
        self.status_code.is_none()
            && self.jsonpath.is_none()
            && self.context_path.is_none()
            && self.json_schema.is_none()
            && self.expression.is_none()
    }
}
