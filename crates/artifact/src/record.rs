use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use tempest_core::RunConfig;

/// Written once at `initialize()`, per §6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: String,
    pub timestamp: DateTime<Utc>,
    pub sut_name: String,
    pub scenario_ids: Vec<String>,
    pub seed: u64,
    pub config: RunConfig,
    pub version: String,
}

/// One line of `instances.jsonl` per §6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceRecord {
    pub instance_id: String,
    pub run_id: String,
    pub correlation_id: String,
    pub scenario_id: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<f64>,
    pub passed: Option<bool>,
    #[serde(default)]
    pub entry_data: Map<String, Value>,
    pub error: Option<String>,
}

/// One line of `steps.jsonl` per §6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub instance_id: String,
    pub run_id: String,
    pub correlation_id: String,
    pub step_index: u32,
    pub step_name: String,
    pub step_type: String,
    pub timestamp: DateTime<Utc>,
    pub observation: Value,
}

/// One line of `assertions.jsonl` per §6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssertionRecord {
    pub instance_id: String,
    pub run_id: String,
    pub correlation_id: String,
    pub step_index: u32,
    pub assertion_name: String,
    pub passed: bool,
    pub expected: Option<Value>,
    pub actual: Option<Value>,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Written once at `finalize()`, per §6.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub completed_at: Option<DateTime<Utc>>,
    pub total_instances: u64,
    pub pass_count: u64,
    pub fail_count: u64,
    pub error_count: u64,
    pub pass_rate: f64,
    pub duration_ms: f64,
    pub total_steps: u64,
    pub total_assertions: u64,
    pub assertions_passed: u64,
    pub assertions_failed: u64,
}
