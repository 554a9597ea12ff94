use std::path::PathBuf;

use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

use tempest_artifact::{ArtifactReader, InstanceRecord};
use tempest_core::{Action, Observation, Scenario, SutConfig, WorkflowContext};
use tempest_runner::{run_assert_action, run_http_action, run_wait_action};

use crate::error::ReplayError;

/// One replayed step, paired with its originally-recorded observation
/// when available (spec §3: "Artifact records").
#[derive(Debug, Clone, Serialize)]
pub struct StepResult {
    pub step_number: u32,
    pub action_name: String,
    pub action_type: &'static str,
    pub observation: Observation,
    pub original_observation: Option<Value>,
    pub has_difference: bool,
    pub difference_details: Option<String>,
}

/// Outcome of replaying one instance (spec §4.13 step 7).
#[derive(Debug, Clone, Serialize)]
pub struct ReplayResult {
    pub instance_id: String,
    pub correlation_id: String,
    pub scenario_id: String,
    pub success: bool,
    pub steps: Vec<StepResult>,
    pub error: Option<String>,
}

impl ReplayResult {
    fn failed(instance_id: impl Into<String>, correlation_id: impl Into<String>, scenario_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            correlation_id: correlation_id.into(),
            scenario_id: scenario_id.into(),
            success: false,
            steps: Vec::new(),
            error: Some(error.into()),
        }
    }
}

/// Re-executes a recorded instance literally: same `run_id`,
/// `instance_id`, `correlation_id`, and `entry`, no turbulence, no
/// variation. Grounded on `ReplayEngine` in
/// `original_source/src/turbulence/engine/replay.py`.
pub struct ReplayEngine {
    runs_dir: PathBuf,
    scenarios_dir: Option<PathBuf>,
    sut_config: SutConfig,
    client: Client,
}

impl ReplayEngine {
    #[must_use]
    pub fn new(runs_dir: impl Into<PathBuf>, scenarios_dir: Option<PathBuf>, sut_config: SutConfig) -> Self {
        Self {
            runs_dir: runs_dir.into(),
            scenarios_dir,
            sut_config,
            client: Client::new(),
        }
    }

    /// Locate `instance_id`'s record in `runs/<run_id>/instances.jsonl`
    /// (spec §4.13 step 1).
    pub async fn load_instance(&self, run_id: &str, instance_id: &str) -> Result<InstanceRecord, ReplayError> {
        let run_path = self.runs_dir.join(run_id);
        let reader = ArtifactReader::new(&run_path);
        reader.find_instance(instance_id).await?.ok_or_else(|| ReplayError::InstanceNotFound {
            run_id: run_id.to_string(),
            instance_id: instance_id.to_string(),
            run_path,
        })
    }

    /// Load the originally-recorded per-step observations for `instance_id`,
    /// ordered by `step_index`, used as the diff baseline.
    async fn load_original_steps(&self, run_id: &str, instance_id: &str) -> Result<Vec<Value>, ReplayError> {
        let reader = ArtifactReader::new(self.runs_dir.join(run_id));
        let mut steps = reader.steps().await?;
        steps.retain(|s| s.instance_id == instance_id);
        steps.sort_by_key(|s| s.step_index);
        Ok(steps.into_iter().map(|s| s.observation).collect())
    }

    /// Load a scenario by id from `scenarios_dir`, trying `.yaml`, `.yml`,
    /// then `.json` (spec §4.13 step 2).
    pub async fn load_scenario(&self, scenario_id: &str) -> Result<Scenario, ReplayError> {
        let Some(scenarios_dir) = &self.scenarios_dir else {
            return Err(ReplayError::ScenarioNotFound {
                scenario_id: scenario_id.to_string(),
                scenarios_dir: PathBuf::new(),
            });
        };

        for ext in ["yaml", "yml", "json"] {
            let path = scenarios_dir.join(format!("{scenario_id}.{ext}"));
            if let Ok(body) = tokio::fs::read_to_string(&path).await {
                let mut scenario: Scenario = if ext == "json" {
                    serde_json::from_str(&body).map_err(|source| ReplayError::ScenarioParseJson { path: path.clone(), source })?
                } else {
                    serde_yaml_ng::from_str(&body).map_err(|source| ReplayError::ScenarioParse { path: path.clone(), source })?
                };
                scenario.source_path = Some(path.display().to_string());
                return Ok(scenario);
            }
        }

        Err(ReplayError::ScenarioNotFound {
            scenario_id: scenario_id.to_string(),
            scenarios_dir: scenarios_dir.clone(),
        })
    }

    /// Re-execute one recorded instance (spec §4.13, full contract).
    pub async fn replay(&self, run_id: &str, instance_id: &str, scenario: Option<Scenario>) -> ReplayResult {
        let instance = match self.load_instance(run_id, instance_id).await {
            Ok(instance) => instance,
            Err(error) => return ReplayResult::failed(instance_id, "", "", error.to_string()),
        };

        let scenario = match scenario {
            Some(scenario) => scenario,
            None => match self.load_scenario(&instance.scenario_id).await {
                Ok(scenario) => scenario,
                Err(error) => return ReplayResult::failed(instance_id, &instance.correlation_id, &instance.scenario_id, error.to_string()),
            },
        };

        let original_steps = self.load_original_steps(run_id, instance_id).await.unwrap_or_default();

        let mut context = WorkflowContext::new(instance.run_id.clone(), instance.instance_id.clone(), instance.correlation_id.clone());
        context.set_entry(instance.entry_data.clone());
        context.scenario_path.clone_from(&scenario.source_path);

        let sut = self.sut_config.with_correlation_id(&context.correlation_id);

        let mut steps = Vec::with_capacity(scenario.flow.len());
        let mut success = true;

        for (index, action) in scenario.flow.iter().enumerate() {
            let original_observation = original_steps.get(index).cloned();

            let observation = match self.execute_step(action, &mut context, &sut).await {
                Ok(observation) => observation,
                Err(error) => {
                    success = false;
                    Observation::failed(action.name(), 0.0, error.to_string())
                }
            };

            let (has_difference, difference_details) = compare_observations(&observation, original_observation.as_ref());

            let step_ok = observation.ok;
            steps.push(StepResult {
                step_number: u32::try_from(index + 1).unwrap_or(u32::MAX),
                action_name: action.name().to_string(),
                action_type: action.kind(),
                observation,
                original_observation,
                has_difference,
                difference_details,
            });

            if !step_ok {
                success = false;
                if scenario.stop_when.any_action_fails {
                    break;
                }
            }
        }

        ReplayResult {
            instance_id: instance.instance_id,
            correlation_id: context.correlation_id,
            scenario_id: scenario.id,
            success,
            steps,
            error: None,
        }
    }

    async fn execute_step(&self, action: &Action, context: &mut WorkflowContext, sut: &SutConfig) -> Result<Observation, ReplayError> {
        let rendered_value = tempest_core::template::render_value(&serde_json::to_value(action)?, &context.to_value())?;
        let rendered: Action = serde_json::from_value(rendered_value)?;

        let observation = match rendered {
            Action::Http(action) => run_http_action(&action, sut, context, &self.client).await?,
            Action::Wait(action) => run_wait_action(&action, sut, &self.client).await?,
            Action::Assert(action) => run_assert_action(&action, context)?,
        };

        if matches!(rendered_kind(&action), ActionKind::Http | ActionKind::Wait) {
            context.last_response = Some(tempest_core::LastResponse {
                status_code: observation.status_code,
                headers: observation.headers.iter().map(|(k, v)| (k.clone(), Value::String(v.clone()))).collect(),
                body: observation.body.clone(),
            });
        }

        Ok(observation)
    }
}

enum ActionKind {
    Http,
    Wait,
    Assert,
}

fn rendered_kind(action: &Action) -> ActionKind {
    match action {
        Action::Http(_) => ActionKind::Http,
        Action::Wait(_) => ActionKind::Wait,
        Action::Assert(_) => ActionKind::Assert,
    }
}

/// Compare a replayed `Observation` against its recorded original on
/// `status_code` and `ok` (spec §4.13 step 6).
fn compare_observations(current: &Observation, original: Option<&Value>) -> (bool, Option<String>) {
    let Some(original) = original else { return (false, None) };

    let mut differences = Vec::new();
    let original_status = original.get("status_code").cloned().unwrap_or(Value::Null);
    let current_status = current.status_code.map_or(Value::Null, Value::from);
    if original_status != current_status {
        differences.push(format!("status_code: original={original_status}, replay={current_status}"));
    }

    let original_ok = original.get("ok").and_then(Value::as_bool).unwrap_or(false);
    if original_ok != current.ok {
        differences.push(format!("ok: original={original_ok}, replay={}", current.ok));
    }

    if differences.is_empty() {
        (false, None)
    } else {
        (true, Some(differences.join("; ")))
    }
}

