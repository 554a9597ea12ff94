use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single variation parameter: either a discrete `choice` or a
/// continuous `range` (spec §3, §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum VariationParameter {
    Choice { values: Vec<Value> },
    Range { min: f64, max: f64 },
}

/// A boolean flag sampled with a given probability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariationToggle {
    pub name: String,
    pub probability: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct JitterRange {
    pub min: u64,
    pub max: u64,
}

/// Timing variation: injected per-step delay and jitter, consumed
/// internally by the Scenario Runner (spec §4.5 — not a public scenario
/// contract).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimingVariation {
    #[serde(default)]
    pub jitter_ms: Option<JitterRange>,
    #[serde(default)]
    pub step_delay_ms: Option<JitterRange>,
}

/// `{parameters, toggles, timing}` (spec §3, §4.5). `parameters` is a
/// `BTreeMap` rather than a `HashMap` so the Variation Engine draws from
/// the RNG in a stable, sorted-key order -- required for the "bit-identical
/// across runs and platforms" determinism invariant (spec §4.5, §8).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VariationConfig {
    #[serde(default)]
    pub parameters: BTreeMap<String, VariationParameter>,
    #[serde(default)]
    pub toggles: Vec<VariationToggle>,
    #[serde(default)]
    pub timing: Option<TimingVariation>,
}

impl VariationConfig {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty() && self.toggles.is_empty() && self.timing.is_none()
    }
}
