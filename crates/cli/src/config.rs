//! Loading `SutConfig` and `Scenario` definitions from YAML files on disk,
//! and the `TEMPEST_*` environment-variable fallbacks for run settings
//! (spec §6 AMBIENT).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempest_core::{Scenario, SutConfig};

/// Load a single `SutConfig` from a YAML file.
pub fn load_sut(path: &Path) -> Result<SutConfig> {
    let body = std::fs::read_to_string(path).with_context(|| format!("reading SUT config at {}", path.display()))?;
    serde_yaml_ng::from_str(&body).with_context(|| format!("parsing SUT config at {}", path.display()))
}

/// Load one `Scenario` from each of `paths`, in order.
pub fn load_scenarios(paths: &[PathBuf]) -> Result<Vec<Scenario>> {
    paths.iter().map(|path| load_scenario(path)).collect()
}

fn load_scenario(path: &Path) -> Result<Scenario> {
    let body = std::fs::read_to_string(path).with_context(|| format!("reading scenario at {}", path.display()))?;
    let mut scenario: Scenario =
        serde_yaml_ng::from_str(&body).with_context(|| format!("parsing scenario at {}", path.display()))?;
    scenario.source_path = Some(path.display().to_string());
    Ok(scenario)
}

/// `TEMPEST_OUTPUT_DIR` fallback, defaulting to `./runs`.
pub fn output_dir_fallback() -> PathBuf {
    std::env::var("TEMPEST_OUTPUT_DIR").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("runs"))
}

/// `TEMPEST_SEED` fallback, defaulting to 0.
pub fn seed_fallback() -> u64 {
    std::env::var("TEMPEST_SEED").ok().and_then(|v| v.parse().ok()).unwrap_or(0)
}

/// `TEMPEST_PARALLEL` fallback, defaulting to 10.
pub fn parallel_fallback() -> usize {
    std::env::var("TEMPEST_PARALLEL").ok().and_then(|v| v.parse().ok()).unwrap_or(10)
}
