use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{Map, Value};

use tempest_core::{VariationConfig, VariationParameter};

/// Produces the per-instance variation map consumed by template
/// rendering and by the Scenario Runner's internal timing hooks.
///
/// Mirrors `VariationEngine.apply` in
/// `turbulence/variation/engine.py`: one `StdRng` seeded per instance
/// (`base_seed + instance_index`), sampled in a fixed order — parameters,
/// then toggles, then timing — so the same config and seed always
/// produce the same map (spec §4.5's determinism invariant).
pub struct VariationEngine {
    config: VariationConfig,
    base_seed: u64,
}

impl VariationEngine {
    #[must_use]
    pub fn new(config: VariationConfig, base_seed: u64) -> Self {
        Self { config, base_seed }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !self.config.is_empty()
    }

    /// Generate the variation map for `instance_index`. `parameters` is a
    /// `BTreeMap`, so this iterates in sorted-key order rather than a
    /// `HashMap`'s per-process-randomized order -- the RNG draw sequence,
    /// and therefore the produced map, would otherwise differ run-to-run
    /// for the same seed. The two
    /// timing keys (`_step_delay_ms`, `_timing_jitter_ms`) are emitted
    /// with the underscore prefix the predecessor uses to mark them
    /// internal, and the Scenario Runner reads them back out by that
    /// exact name rather than exposing a typed field for them.
    #[must_use]
    pub fn apply(&self, instance_index: u64) -> Map<String, Value> {
        let seed = self.base_seed.wrapping_add(instance_index);
        let mut rng = StdRng::seed_from_u64(seed);
        let mut result = Map::new();

        for (name, param) in &self.config.parameters {
            match param {
                VariationParameter::Choice { values } => {
                    if !values.is_empty() {
                        let index = rng.gen_range(0..values.len());
                        result.insert(name.clone(), values[index].clone());
                    }
                }
                VariationParameter::Range { min, max } => {
                    let value = rng.gen_range(*min..=*max);
                    result.insert(name.clone(), Value::from(value));
                }
            }
        }

        for toggle in &self.config.toggles {
            let sampled: f64 = rng.gen();
            result.insert(toggle.name.clone(), Value::Bool(sampled < toggle.probability));
        }

        if let Some(timing) = &self.config.timing {
            if let Some(jitter) = timing.jitter_ms {
                result.insert("_timing_jitter_ms".to_string(), Value::from(rng.gen_range(jitter.min..=jitter.max)));
            }
            if let Some(delay) = timing.step_delay_ms {
                result.insert("_step_delay_ms".to_string(), Value::from(rng.gen_range(delay.min..=delay.max)));
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use serde_json::json;
    use tempest_core::{JitterRange, TimingVariation, VariationToggle};

    #[test]
    fn same_seed_and_config_produce_identical_maps() {
        let mut parameters = BTreeMap::new();
        parameters.insert(
            "tier".to_string(),
            VariationParameter::Choice {
                values: vec![json!("gold"), json!("silver"), json!("bronze")],
            },
        );
        parameters.insert("weight".to_string(), VariationParameter::Range { min: 0.0, max: 1.0 });
        let config = VariationConfig {
            parameters,
            toggles: vec![VariationToggle {
                name: "beta_enabled".to_string(),
                probability: 0.5,
            }],
            timing: Some(TimingVariation {
                jitter_ms: Some(JitterRange { min: 0, max: 100 }),
                step_delay_ms: Some(JitterRange { min: 10, max: 50 }),
            }),
        };

        let engine_a = VariationEngine::new(config.clone(), 100);
        let engine_b = VariationEngine::new(config, 100);
        assert_eq!(engine_a.apply(3), engine_b.apply(3));
    }

    #[test]
    fn different_instance_index_varies_output() {
        let mut parameters = BTreeMap::new();
        parameters.insert("weight".to_string(), VariationParameter::Range { min: 0.0, max: 1_000_000.0 });
        let config = VariationConfig {
            parameters,
            toggles: vec![],
            timing: None,
        };
        let engine = VariationEngine::new(config, 1);
        assert_ne!(engine.apply(0), engine.apply(1));
    }

    #[test]
    fn empty_config_is_not_enabled() {
        let engine = VariationEngine::new(VariationConfig::default(), 1);
        assert!(!engine.is_enabled());
        assert!(engine.apply(0).is_empty());
    }

    #[test]
    fn timing_keys_use_internal_underscore_names() {
        let config = VariationConfig {
            parameters: BTreeMap::new(),
            toggles: vec![],
            timing: Some(TimingVariation {
                jitter_ms: Some(JitterRange { min: 5, max: 5 }),
                step_delay_ms: Some(JitterRange { min: 7, max: 7 }),
            }),
        };
        let engine = VariationEngine::new(config, 1);
        let result = engine.apply(0);
        assert_eq!(result.get("_timing_jitter_ms"), Some(&json!(5)));
        assert_eq!(result.get("_step_delay_ms"), Some(&json!(7)));
    }
}
