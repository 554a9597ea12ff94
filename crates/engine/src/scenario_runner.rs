use chrono::Utc;
use reqwest::Client;

use tempest_artifact::{ArtifactStore, AssertionRecord, StepRecord};
use tempest_core::{Action, AssertionResult, HttpAction, Observation, Scenario, SutConfig, WorkflowContext};
use tempest_turbulence::{AttemptOutcome, TurbulenceEngine};

use crate::error::EngineError;

/// Drives one instance's flow and post-flow assertions, streaming every
/// step and assertion to the artifact store as it completes.
///
/// Mirrors `ScenarioRunner.execute_flow` / `_execute_action` in
/// `turbulence/engine/scenario_runner.py`, and the instance loop in
/// `turbulence/commands/run.py::_run_instances`, consolidated here so
/// that a live run and a replay share exactly one implementation of "what
/// does it mean to execute a rendered flow."
pub struct ScenarioRunner {
    sut: SutConfig,
    client: Client,
    turbulence: TurbulenceEngine,
}

impl ScenarioRunner {
    #[must_use]
    pub fn new(sut: SutConfig, client: Client, turbulence: TurbulenceEngine) -> Self {
        Self { sut, client, turbulence }
    }

    /// Execute `scenario`'s flow, then its post-flow assertions, against
    /// `context`. Returns whether every action and assertion observed
    /// passed (spec §4.10).
    pub async fn run(&self, scenario: &Scenario, context: &mut WorkflowContext, artifact: &dyn ArtifactStore) -> Result<bool, EngineError> {
        let mut passed = true;

        for (index, action) in scenario.flow.iter().enumerate() {
            if index > 0 {
                tempest_turbulence::apply_timing_variation(context).await;
            }

            let observation = self.execute_step(action, context).await?;
            let step_index = u32::try_from(index).unwrap_or(u32::MAX);
            let ok = observation.ok;

            self.stream_step(artifact, context, step_index, action.name(), action.kind(), &observation).await?;
            if matches!(action, Action::Assert(_)) {
                self.stream_last_assertion(artifact, context, step_index).await?;
            }

            if !ok {
                passed = false;
                if scenario.stop_when.any_action_fails {
                    return Ok(passed);
                }
            }
        }

        let offset = scenario.flow.len();
        for (index, assertion) in scenario.assertions.iter().enumerate() {
            let rendered = render_action(&Action::Assert(assertion.clone()), context)?;
            let Action::Assert(assert_action) = rendered else {
                unreachable!("rendering an AssertAction always yields an AssertAction")
            };

            let observation = tempest_runner::run_assert_action(&assert_action, context)?;
            let step_index = u32::try_from(offset + index).unwrap_or(u32::MAX);

            self.stream_step(artifact, context, step_index, &assert_action.name, "assert", &observation).await?;
            self.stream_last_assertion(artifact, context, step_index).await?;

            if !observation.ok {
                passed = false;
                if scenario.stop_when.any_assertion_fails {
                    break;
                }
            }
        }

        Ok(passed)
    }

    async fn execute_step(&self, action: &Action, context: &mut WorkflowContext) -> Result<Observation, EngineError> {
        let rendered = render_action(action, context)?;

        let observation = match rendered {
            Action::Http(http_action) => self.execute_http(&http_action, context).await?,
            Action::Wait(wait_action) => tempest_runner::run_wait_action(&wait_action, &self.sut, &self.client).await?,
            Action::Assert(assert_action) => tempest_runner::run_assert_action(&assert_action, context)?,
        };

        Ok(observation)
    }

    /// Execute one HTTP action, wrapping it in the Turbulence Engine when a
    /// policy resolves for its `(service, name)` pair (spec §4.10 step 3).
    async fn execute_http(&self, action: &HttpAction, context: &mut WorkflowContext) -> Result<Observation, EngineError> {
        let Some(policy) = self.turbulence.resolve_policy(&action.service, &action.name) else {
            return Ok(tempest_runner::run_http_action(action, &self.sut, context, &self.client).await?);
        };

        let instance_id = context.instance_id.clone();
        let sut = &self.sut;
        let client = &self.client;
        let mut captured: Option<Observation> = None;

        let (_outcome, info) = self
            .turbulence
            .apply(&policy, &action.service, &action.name, &instance_id, || async {
                let observation = match tempest_runner::run_http_action(action, sut, context, client).await {
                    Ok(observation) => observation,
                    Err(error) => Observation::failed(action.name.clone(), 0.0, error.to_string()),
                };
                let outcome = AttemptOutcome {
                    ok: observation.ok,
                    status_code: observation.status_code,
                    latency_ms: observation.latency_ms,
                    errors: observation.errors.clone(),
                };
                captured = Some(observation);
                outcome
            })
            .await?;

        let mut observation = captured.expect("turbulence apply always invokes execute at least once");
        observation.turbulence = Some(info);
        Ok(observation)
    }

    async fn stream_step(
        &self,
        artifact: &dyn ArtifactStore,
        context: &WorkflowContext,
        step_index: u32,
        step_name: &str,
        step_type: &str,
        observation: &Observation,
    ) -> Result<(), EngineError> {
        artifact
            .write_step(StepRecord {
                instance_id: context.instance_id.clone(),
                run_id: context.run_id.clone(),
                correlation_id: context.correlation_id.clone(),
                step_index,
                step_name: step_name.to_string(),
                step_type: step_type.to_string(),
                timestamp: Utc::now(),
                observation: serde_json::to_value(observation)?,
            })
            .await?;
        Ok(())
    }

    async fn stream_last_assertion(&self, artifact: &dyn ArtifactStore, context: &WorkflowContext, step_index: u32) -> Result<(), EngineError> {
        let Some(result) = context.last_assertion.clone() else { return Ok(()) };
        artifact.write_assertion(assertion_record(context, step_index, &result)).await?;
        Ok(())
    }
}

fn render_action(action: &Action, context: &WorkflowContext) -> Result<Action, EngineError> {
    let value = serde_json::to_value(action)?;
    let rendered_value = tempest_core::template::render_value(&value, &context.to_value())?;
    Ok(serde_json::from_value(rendered_value)?)
}

fn assertion_record(context: &WorkflowContext, step_index: u32, result: &AssertionResult) -> AssertionRecord {
    AssertionRecord {
        instance_id: context.instance_id.clone(),
        run_id: context.run_id.clone(),
        correlation_id: context.correlation_id.clone(),
        step_index,
        assertion_name: result.name.clone(),
        passed: result.passed,
        expected: result.expected.clone(),
        actual: result.actual.clone(),
        message: result.message.clone(),
        timestamp: Utc::now(),
    }
}
