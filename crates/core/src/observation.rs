use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One HTTP retry attempt, recorded in `Observation.attempts` (spec §3,
/// §4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpAttempt {
    pub status_code: Option<u16>,
    pub ok: bool,
    pub latency_ms: f64,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub error: Option<String>,
}

/// One poll in a Wait action's polling loop (spec §3, §4.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitAttempt {
    pub attempt_number: u32,
    pub timestamp_ms_from_start: f64,
    pub latency_ms: f64,
    pub status_code: Option<u16>,
    pub body: Option<Value>,
    pub condition_met: bool,
    pub error: Option<String>,
}

/// Either kind of per-attempt log an Observation can carry (spec §3:
/// "For Wait actions ... For HTTP actions under retry ...").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttemptRecord {
    Http(HttpAttempt),
    Wait(WaitAttempt),
}

/// Per-attempt turbulence log entry plus the resolved policy parameters,
/// attached to `Observation.turbulence` (spec §4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurbulenceAttempt {
    pub ok: bool,
    pub status_code: Option<u16>,
    pub latency_ms: f64,
    pub injected_latency_ms: Option<u64>,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurbulenceInfo {
    pub service: String,
    pub action: String,
    pub retry_count: u32,
    pub timeout_after_ms: Option<u64>,
    pub latency_ms: Option<u64>,
    pub attempts: Vec<TurbulenceAttempt>,
}

/// The universal result of an Action (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub ok: bool,
    pub status_code: Option<u16>,
    pub latency_ms: f64,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub body: Option<Value>,
    #[serde(default)]
    pub errors: Vec<String>,
    pub action_name: String,
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub turbulence: Option<TurbulenceInfo>,
    #[serde(default)]
    pub attempts: Option<Vec<AttemptRecord>>,

    /// Wait-specific summary fields (spec §4.8): only set for
    /// `WaitAction` observations.
    #[serde(default)]
    pub total_attempts: Option<u32>,
    #[serde(default)]
    pub timed_out: Option<bool>,
}

impl Observation {
    #[must_use]
    pub fn failed(action_name: impl Into<String>, latency_ms: f64, error: impl Into<String>) -> Self {
        Self {
            ok: false,
            status_code: None,
            latency_ms,
            headers: HashMap::new(),
            body: None,
            errors: vec![error.into()],
            action_name: action_name.into(),
            service: None,
            turbulence: None,
            attempts: None,
            total_attempts: None,
            timed_out: None,
        }
    }
}
