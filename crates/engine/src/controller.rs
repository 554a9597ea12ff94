use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use reqwest::Client;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use tempest_artifact::{ArtifactStore, FileArtifactStore, InstanceRecord, RunSummary};
use tempest_core::{RunConfig, Scenario, SutConfig, WorkflowContext};
use tempest_executor::{InstanceOutcome, OutcomeKind, ParallelExecutor};
use tempest_turbulence::{TurbulenceEngine, VariationEngine};

use crate::error::EngineError;
use crate::scenario_runner::ScenarioRunner;

/// Everything the Run Controller needs to run N instances of a scenario
/// set against a SUT.
pub struct RunOptions {
    pub run_id: Option<String>,
    pub sut: SutConfig,
    pub scenarios: Vec<Scenario>,
    pub instances: usize,
    pub config: RunConfig,
    pub output_dir: PathBuf,
    pub cancel: CancellationToken,
}

/// Picks a scenario per instance, clones per-instance state, drives the
/// `ScenarioRunner`, and streams the result to the artifact store — the
/// per-instance setup contract of spec §4.10, orchestrated across
/// instances by the bounded-concurrency executor of §4.12.
///
/// Mirrors `_run_instances` in `turbulence/commands/run.py`: the module
/// there is a free function closing over local state; here that state
/// lives on `RunController` so the same shape works from both the CLI
/// binary and the replay/report tooling.
#[derive(Default)]
pub struct RunController;

impl RunController {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Run `options.instances` instances and return the finalized
    /// `RunSummary`. Never returns an `Err` for a single bad instance —
    /// per-instance failures are captured in `InstanceRecord::error` and
    /// tallied into the summary, not propagated (spec §4.10's "on
    /// uncaught exception ... do not re-raise").
    pub async fn run(&self, options: RunOptions) -> Result<RunSummary, EngineError> {
        if options.scenarios.is_empty() {
            return Err(EngineError::NoScenarios);
        }

        let run_id = options.run_id.unwrap_or_else(|| format!("run_{}", Utc::now().format("%Y%m%d_%H%M%S")));
        let scenario_ids: Vec<String> = options.scenarios.iter().map(|s| s.id.clone()).collect();
        let seed = options.config.seed;
        let concurrency = options.config.concurrency;

        let store = Arc::new(FileArtifactStore::new(
            &options.output_dir,
            run_id.clone(),
            options.sut.name.clone(),
            scenario_ids,
            seed,
            options.config.clone(),
        ));
        store.initialize().await?;

        let executor = ParallelExecutor::new(concurrency, options.cancel);
        let client = Client::new();
        let scenarios = Arc::new(options.scenarios);
        let sut = Arc::new(options.sut);
        let run_id_for_instances = run_id.clone();

        let store_for_instances = Arc::clone(&store);
        let (_results, _stats) = executor
            .run(options.instances, move |index| {
                let scenarios = Arc::clone(&scenarios);
                let sut = Arc::clone(&sut);
                let client = client.clone();
                let store = Arc::clone(&store_for_instances);
                let run_id = run_id_for_instances.clone();

                async move {
                    let outcome = run_one_instance(&run_id, index, seed, &scenarios, &sut, client, store.as_ref()).await;
                    let kind = if outcome.error.is_some() {
                        OutcomeKind::Errored
                    } else if outcome.passed.unwrap_or(false) {
                        OutcomeKind::Passed
                    } else {
                        OutcomeKind::Failed
                    };
                    InstanceOutcome { index, kind, value: outcome }
                }
            })
            .await;

        Ok(store.finalize().await?)
    }
}

/// Pick one scenario for `instance_index`: the only one if there's
/// exactly one, otherwise uniformly at random from a PRNG seeded by
/// `base_seed + instance_index` (spec §4.10's "reproducible assignment").
fn pick_scenario<'a>(scenarios: &'a [Scenario], base_seed: u64, instance_index: u64) -> &'a Scenario {
    if scenarios.len() == 1 {
        return &scenarios[0];
    }
    let mut rng = StdRng::seed_from_u64(base_seed.wrapping_add(instance_index));
    let index = rng.gen_range(0..scenarios.len());
    &scenarios[index]
}

/// Inject the Variation Engine's sampled map into `entry.seed_data.variation`
/// so templates can reference it as `{{ entry.seed_data.variation.<name> }}`
/// (spec §4.5), mirroring `context["entry"]["seed_data"]["variation"]` in
/// `turbulence/engine/scenario_runner.py`. Creates `seed_data` if the
/// scenario's entry doesn't already have one; merges into it otherwise.
fn inject_variation(entry: &mut serde_json::Map<String, serde_json::Value>, variation: serde_json::Map<String, serde_json::Value>) {
    let seed_data = entry
        .entry("seed_data".to_string())
        .or_insert_with(|| serde_json::Value::Object(serde_json::Map::new()));
    if !seed_data.is_object() {
        *seed_data = serde_json::Value::Object(serde_json::Map::new());
    }
    seed_data
        .as_object_mut()
        .expect("just ensured seed_data is an object")
        .insert("variation".to_string(), serde_json::Value::Object(variation));
}

async fn run_one_instance(
    run_id: &str,
    instance_index: usize,
    base_seed: u64,
    scenarios: &[Scenario],
    sut: &SutConfig,
    client: Client,
    artifact: &dyn ArtifactStore,
) -> InstanceRecord {
    let scenario = pick_scenario(scenarios, base_seed, instance_index as u64);

    let instance_id = format!("inst_{}", short_uuid());
    let correlation_id = format!("corr_{}", short_uuid());

    let mut entry = scenario.entry.clone();
    let variation = VariationEngine::new(scenario.variation.clone().unwrap_or_default(), base_seed);
    let mut step_delay_ms = None;
    let mut timing_jitter_ms = None;

    if variation.is_enabled() {
        let mut map = variation.apply(instance_index as u64);
        step_delay_ms = map.remove("_step_delay_ms").and_then(|v| v.as_u64());
        timing_jitter_ms = map.remove("_timing_jitter_ms").and_then(|v| v.as_u64());
        inject_variation(&mut entry, map);
    }

    let mut context = WorkflowContext::new(run_id, instance_id.clone(), correlation_id.clone());
    context.set_entry(entry);
    context.scenario_path.clone_from(&scenario.source_path);
    context.step_delay_ms = step_delay_ms;
    context.timing_jitter_ms = timing_jitter_ms;

    let instance_sut = sut.with_correlation_id(&correlation_id);
    let turbulence = TurbulenceEngine::new(scenario.turbulence.clone(), base_seed);
    let runner = ScenarioRunner::new(instance_sut, client, turbulence);

    let started_at = Utc::now();
    let clock = Instant::now();

    let (passed, error) = match runner.run(scenario, &mut context, artifact).await {
        Ok(passed) => (Some(passed), None),
        Err(error) => (Some(false), Some(error.to_string())),
    };

    let completed_at = Utc::now();
    let duration_ms = clock.elapsed().as_secs_f64() * 1000.0;

    let record = InstanceRecord {
        instance_id,
        run_id: run_id.to_string(),
        correlation_id,
        scenario_id: scenario.id.clone(),
        started_at,
        completed_at: Some(completed_at),
        duration_ms: Some(duration_ms),
        passed,
        entry_data: scenario.entry.clone(),
        error,
    };

    if let Err(write_error) = artifact.write_instance(record.clone()).await {
        tracing::warn!(%write_error, instance_id = %record.instance_id, "failed to persist instance record");
    }

    record
}

fn short_uuid() -> String {
    Uuid::new_v4().simple().to_string()[..12].to_string()
}
