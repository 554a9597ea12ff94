use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::expectation::Expectation;
use crate::retry::RetryConfig;

/// One HTTP request step: `{service, method, path, headers, query, body?,
/// extract, retry?}` (spec §3, §4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpAction {
    pub name: String,
    pub service: String,
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub query: HashMap<String, String>,
    #[serde(default)]
    pub body: Option<Value>,
    #[serde(default)]
    pub extract: HashMap<String, String>,
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

/// A polling step: `{service, method, path, interval, timeout, expect}`
/// (spec §3, §4.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitAction {
    pub name: String,
    pub service: String,
    pub method: String,
    pub path: String,
    /// Poll interval in seconds.
    pub interval: f64,
    /// Overall timeout in seconds.
    pub timeout: f64,
    pub expect: Expectation,
}

/// A standalone assertion step (spec §3, §4.9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssertAction {
    #[serde(default)]
    pub name: String,
    pub expect: Expectation,
}

/// Polymorphic Action (spec §3, §9): a tagged variant, not an inheritance
/// hierarchy. Dispatch by kind happens in exactly one place, the Scenario
/// Runner (spec §4.10).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "action_type")]
pub enum Action {
    Http(HttpAction),
    Wait(WaitAction),
    Assert(AssertAction),
}

impl Action {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Action::Http(a) => &a.name,
            Action::Wait(a) => &a.name,
            Action::Assert(a) => &a.name,
        }
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Action::Http(_) => "http",
            Action::Wait(_) => "wait",
            Action::Assert(_) => "assert",
        }
    }

    #[must_use]
    pub fn service(&self) -> Option<&str> {
        match self {
            Action::Http(a) => Some(&a.service),
            Action::Wait(a) => Some(&a.service),
            Action::Assert(_) => None,
        }
    }
}
