use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::action::{Action, AssertAction};
use crate::turbulence_config::TurbulenceConfig;
use crate::variation_config::VariationConfig;

/// Controls early termination of the flow and of post-flow assertions
/// (spec §3, §4.10).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StopWhen {
    #[serde(default)]
    pub any_action_fails: bool,
    #[serde(default)]
    pub any_assertion_fails: bool,
}

/// A declarative journey: entry seed data, flow of actions, post-flow
/// assertions, stop policy, optional turbulence and variation (spec §3,
/// GLOSSARY). Immutable after load; shared read-only across instances.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub id: String,
    #[serde(default)]
    pub entry: Map<String, Value>,
    pub flow: Vec<Action>,
    #[serde(default)]
    pub assertions: Vec<AssertAction>,
    #[serde(default)]
    pub stop_when: StopWhen,
    #[serde(default)]
    pub turbulence: Option<TurbulenceConfig>,
    #[serde(default)]
    pub variation: Option<VariationConfig>,

    /// Records the scenario's source file for `$ref` resolution in
    /// `json_schema` expectations (spec §3 `_scenario_path`). Not part of
    /// the serialized wire form — set by the loader after deserialization.
    #[serde(skip)]
    pub source_path: Option<String>,
}
