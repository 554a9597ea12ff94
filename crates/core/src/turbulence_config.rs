use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Uniform latency injection range in milliseconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LatencyRange {
    pub min: u64,
    pub max: u64,
}

/// `{latency: {min,max}?, timeout_after?, retry_count?}` (spec §3, §4.6).
/// Every field is optional so policies merge per-field, not whole-object.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TurbulencePolicy {
    #[serde(default)]
    pub latency_ms: Option<LatencyRange>,
    #[serde(default)]
    pub timeout_after_ms: Option<u64>,
    #[serde(default)]
    pub retry_count: Option<u32>,
}

impl TurbulencePolicy {
    /// Overlay `other` onto `self`: fields present in `other` override;
    /// fields absent in `other` keep `self`'s value (spec §4.6 merge
    /// contract).
    #[must_use]
    pub fn merged_with(&self, other: &TurbulencePolicy) -> TurbulencePolicy {
        TurbulencePolicy {
            latency_ms: other.latency_ms.or(self.latency_ms),
            timeout_after_ms: other.timeout_after_ms.or(self.timeout_after_ms),
            retry_count: other.retry_count.or(self.retry_count),
        }
    }
}

/// Optional global policy plus per-service and per-action overrides
/// (spec §3, §4.6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TurbulenceConfig {
    #[serde(default)]
    pub global: Option<TurbulencePolicy>,
    #[serde(default)]
    pub services: HashMap<String, TurbulencePolicy>,
    #[serde(default)]
    pub actions: HashMap<String, TurbulencePolicy>,
}

impl TurbulenceConfig {
    /// Resolve the merged policy for a `(service, action)` pair: global →
    /// service → action, later scopes overriding individual fields.
    /// Returns `None` if no scope applies at all.
    #[must_use]
    pub fn resolve(&self, service: &str, action: &str) -> Option<TurbulencePolicy> {
        let mut resolved: Option<TurbulencePolicy> = self.global.clone();

        if let Some(service_policy) = self.services.get(service) {
            resolved = Some(match resolved {
                Some(base) => base.merged_with(service_policy),
                None => service_policy.clone(),
            });
        }

        if let Some(action_policy) = self.actions.get(action) {
            resolved = Some(match resolved {
                Some(base) => base.merged_with(action_policy),
                None => action_policy.clone(),
            });
        }

        resolved
    }
}
