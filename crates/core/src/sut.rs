use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A named service the engine can dispatch `HttpAction`/`WaitAction` steps
/// against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub base_url: String,
    #[serde(default)]
    pub default_headers: HashMap<String, String>,
    pub timeout_seconds: f64,
}

/// System Under Test: a named set of services with base URLs, default
/// headers, and timeouts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SutConfig {
    pub name: String,
    pub services: HashMap<String, ServiceConfig>,
    #[serde(default)]
    pub default_headers: HashMap<String, String>,
}

impl SutConfig {
    #[must_use]
    pub fn service(&self, name: &str) -> Option<&ServiceConfig> {
        self.services.get(name)
    }

    /// Clone this config and set the per-instance `X-Correlation-ID`
    /// default header, per §4.10's per-instance setup contract.
    #[must_use]
    pub fn with_correlation_id(&self, correlation_id: &str) -> Self {
        let mut cloned = self.clone();
        cloned
            .default_headers
            .insert("X-Correlation-ID".to_string(), correlation_id.to_string());
        cloned
    }
}

/// Snapshot of the run's concurrency/seed/timeout settings, embedded
/// verbatim into `manifest.json` (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub seed: u64,
    pub concurrency: usize,
    pub timeout_seconds: f64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            concurrency: 10,
            timeout_seconds: 30.0,
        }
    }
}
