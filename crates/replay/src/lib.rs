//! Re-execution of a recorded instance with its original identifiers and
//! entry data, for local reproduction of a failure (spec §4.13).

pub mod error;
pub mod replay;

pub use error::ReplayError;
pub use replay::{ReplayEngine, ReplayResult, StepResult};

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use tempest_artifact::{ArtifactStore, FileArtifactStore, InstanceRecord, StepRecord};
    use tempest_core::{RunConfig, ServiceConfig, SutConfig};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sut_config(base_url: &str) -> SutConfig {
        let mut services = HashMap::new();
        services.insert(
            "users".to_string(),
            ServiceConfig {
                base_url: base_url.to_string(),
                default_headers: HashMap::new(),
                timeout_seconds: 5.0,
            },
        );
        SutConfig {
            name: "demo".to_string(),
            services,
            default_headers: HashMap::new(),
        }
    }

    async fn write_fixture_run(runs_dir: &std::path::Path, run_id: &str, instance_id: &str, scenario_id: &str, original_status: u16) {
        let store = FileArtifactStore::new(
            runs_dir,
            run_id,
            "demo",
            vec![scenario_id.to_string()],
            7,
            RunConfig::default(),
        );
        store.initialize().await.unwrap();
        store
            .write_instance(InstanceRecord {
                instance_id: instance_id.to_string(),
                run_id: run_id.to_string(),
                correlation_id: "corr-original".to_string(),
                scenario_id: scenario_id.to_string(),
                started_at: chrono::Utc::now(),
                completed_at: Some(chrono::Utc::now()),
                duration_ms: Some(42.0),
                passed: Some(true),
                entry_data: serde_json::Map::new(),
                error: None,
            })
            .await
            .unwrap();
        store
            .write_step(StepRecord {
                instance_id: instance_id.to_string(),
                run_id: run_id.to_string(),
                correlation_id: "corr-original".to_string(),
                step_index: 0,
                step_name: "get_user".to_string(),
                step_type: "http".to_string(),
                timestamp: chrono::Utc::now(),
                observation: json!({"ok": true, "status_code": original_status}),
            })
            .await
            .unwrap();
        store.finalize().await.unwrap();
    }

    async fn write_fixture_scenario(scenarios_dir: &std::path::Path, scenario_id: &str) {
        tokio::fs::create_dir_all(scenarios_dir).await.unwrap();
        let scenario = json!({
            "id": scenario_id,
            "entry": {},
            "flow": [{
                "action_type": "http",
                "name": "get_user",
                "service": "users",
                "method": "GET",
                "path": "/users/1",
                "headers": {},
                "query": {},
                "extract": {},
            }],
            "assertions": [],
            "stop_when": {"any_action_fails": true, "any_assertion_fails": false},
        });
        tokio::fs::write(scenarios_dir.join(format!("{scenario_id}.json")), scenario.to_string())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn replay_matches_original_observation() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1})))
            .mount(&server)
            .await;

        let base = tempfile::tempdir().unwrap();
        let runs_dir = base.path().join("runs");
        let scenarios_dir = base.path().join("scenarios");
        write_fixture_run(&runs_dir, "run-1", "inst-1", "scenario-a", 200).await;
        write_fixture_scenario(&scenarios_dir, "scenario-a").await;

        let engine = ReplayEngine::new(runs_dir, Some(scenarios_dir), sut_config(&server.uri()));
        let result = engine.replay("run-1", "inst-1", None).await;

        assert!(result.success, "expected successful replay, got {result:?}");
        assert_eq!(result.steps.len(), 1);
        assert!(!result.steps[0].has_difference);
        assert_eq!(result.correlation_id, "corr-original");
    }

    #[tokio::test]
    async fn replay_reports_divergence_from_original() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/1"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let base = tempfile::tempdir().unwrap();
        let runs_dir = base.path().join("runs");
        let scenarios_dir = base.path().join("scenarios");
        write_fixture_run(&runs_dir, "run-1", "inst-1", "scenario-a", 200).await;
        write_fixture_scenario(&scenarios_dir, "scenario-a").await;

        let engine = ReplayEngine::new(runs_dir, Some(scenarios_dir), sut_config(&server.uri()));
        let result = engine.replay("run-1", "inst-1", None).await;

        assert!(!result.success);
        assert_eq!(result.steps.len(), 1);
        assert!(result.steps[0].has_difference);
    }

    #[tokio::test]
    async fn replay_fails_fast_on_missing_instance() {
        let base = tempfile::tempdir().unwrap();
        let runs_dir = base.path().join("runs");
        tokio::fs::create_dir_all(&runs_dir).await.unwrap();

        let engine = ReplayEngine::new(runs_dir, None, sut_config("http://127.0.0.1:0"));
        let result = engine.replay("run-missing", "inst-missing", None).await;

        assert!(!result.success);
        assert!(result.error.is_some());
        assert!(result.steps.is_empty());
    }
}
