use serde_json::{Map, Value};

use crate::assertion::AssertionResult;

/// `{status_code, headers, body}`, updated after every HTTP or Wait
/// action (spec §3).
#[derive(Debug, Clone, Default)]
pub struct LastResponse {
    pub status_code: Option<u16>,
    pub headers: Map<String, Value>,
    pub body: Option<Value>,
}

impl LastResponse {
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Object(Map::from_iter([
            (
                "status_code".to_string(),
                self.status_code
                    .map(Value::from)
                    .unwrap_or(Value::Null),
            ),
            ("headers".to_string(), Value::Object(self.headers.clone())),
            ("body".to_string(), self.body.clone().unwrap_or(Value::Null)),
        ]))
    }
}

/// Per-instance state (spec §3). `run_id`/`instance_id`/`correlation_id`
/// are assigned once at construction and never mutated thereafter; `entry`
/// is read-only; extracted values are namespaced at the top level for
/// template access.
#[derive(Debug, Clone)]
pub struct WorkflowContext {
    pub run_id: String,
    pub instance_id: String,
    pub correlation_id: String,
    entry: Map<String, Value>,
    extracted: Map<String, Value>,
    pub last_response: Option<LastResponse>,
    pub scenario_path: Option<String>,
    pub assertion_results: Vec<AssertionResult>,
    pub last_assertion: Option<AssertionResult>,
    /// Sampled by the Variation Engine; consumed internally by the
    /// Scenario Runner, not exposed as scenario-author-facing contract
    /// (spec §4.5).
    pub step_delay_ms: Option<u64>,
    pub timing_jitter_ms: Option<u64>,
}

impl WorkflowContext {
    #[must_use]
    pub fn new(run_id: impl Into<String>, instance_id: impl Into<String>, correlation_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            instance_id: instance_id.into(),
            correlation_id: correlation_id.into(),
            entry: Map::new(),
            extracted: Map::new(),
            last_response: None,
            scenario_path: None,
            assertion_results: Vec::new(),
            last_assertion: None,
            step_delay_ms: None,
            timing_jitter_ms: None,
        }
    }

    pub fn set_entry(&mut self, entry: Map<String, Value>) {
        self.entry = entry;
    }

    #[must_use]
    pub fn entry(&self) -> &Map<String, Value> {
        &self.entry
    }

    /// Bind an extracted value at the top level of the context, per
    /// spec §3's "Extracted values are namespaced at the top level for
    /// template access."
    pub fn bind_extracted(&mut self, name: impl Into<String>, value: Value) {
        self.extracted.insert(name.into(), value);
    }

    pub fn record_assertion(&mut self, result: AssertionResult) {
        self.last_assertion = Some(result.clone());
        self.assertion_results.push(result);
    }

    /// Render the context as a JSON object for template rendering and
    /// expression evaluation: `entry` nested under its own key (matching
    /// `to_dict` in `windtunnel/engine/context.py`, so `{{
    /// entry.seed_data.customer }}` resolves), extracted values,
    /// identifiers, and `last_response` merged at the top level.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut map = self.extracted.clone();
        map.insert("entry".to_string(), Value::Object(self.entry.clone()));
        map.insert("run_id".to_string(), Value::String(self.run_id.clone()));
        map.insert("instance_id".to_string(), Value::String(self.instance_id.clone()));
        map.insert(
            "correlation_id".to_string(),
            Value::String(self.correlation_id.clone()),
        );
        map.insert(
            "last_response".to_string(),
            self.last_response
                .as_ref()
                .map(LastResponse::to_value)
                .unwrap_or(Value::Null),
        );
        if let Some(path) = &self.scenario_path {
            map.insert("_scenario_path".to_string(), Value::String(path.clone()));
        }
        Value::Object(map)
    }

    /// Resolve a dotted path (`a.b.c`) against the rendered context value,
    /// used by `context_path` expectations (spec §4.9). Distinguishes
    /// "missing" (`None`) from "present but null" (`Some(Value::Null)`).
    #[must_use]
    pub fn get_path(&self, path: &str) -> Option<Value> {
        let root = self.to_value();
        let mut current = &root;
        for segment in path.split('.') {
            match current.get(segment) {
                Some(next) => current = next,
                None => return None,
            }
        }
        Some(current.clone())
    }
}
