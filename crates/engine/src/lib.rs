//! Wires the lower crates together into one runnable flow: pick a
//! scenario, set up per-instance state, drive the flow and its
//! assertions, stream the result to the artifact store, repeat across
//! `N` instances under bounded concurrency (spec §4.10, §4.12).

pub mod controller;
pub mod error;
pub mod scenario_runner;

pub use controller::{RunController, RunOptions};
pub use error::EngineError;
pub use scenario_runner::ScenarioRunner;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use tempest_artifact::ArtifactReader;
    use tempest_core::{RunConfig, ServiceConfig, SutConfig};
    use tokio_util::sync::CancellationToken;
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

    fn scenario(id: &str) -> tempest_core::Scenario {
        serde_json::from_value(json!({
            "id": id,
            "entry": {"user_id": 1},
            "flow": [{
                "action_type": "http",
                "name": "get_user",
                "service": "users",
                "method": "GET",
                "path": "/users/{{ entry.user_id }}",
                "headers": {},
                "query": {},
                "extract": {},
            }],
            "assertions": [{
                "name": "status_is_ok",
                "expect": {"status_code": 200},
            }],
            "stop_when": {"any_action_fails": false, "any_assertion_fails": false},
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn run_controller_drives_instances_and_finalizes_summary() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1})))
            .mount(&server)
            .await;

        let output = tempfile::tempdir().unwrap();
        let controller = RunController::new();

        let options = RunOptions {
            run_id: Some("run-test-1".to_string()),
            sut: sut_config(&server.uri()),
            scenarios: vec![scenario("scenario-a")],
            instances: 3,
            config: RunConfig { seed: 42, concurrency: 2, timeout_seconds: 5.0 },
            output_dir: output.path().to_path_buf(),
            cancel: CancellationToken::new(),
        };

        let summary = controller.run(options).await.unwrap();

        assert_eq!(summary.total_instances, 3);
        assert_eq!(summary.pass_count, 3, "expected every instance's assertion to pass, got {summary:?}");
        assert_eq!(summary.fail_count, 0);
        assert_eq!(summary.error_count, 0);

        let reader = ArtifactReader::new(output.path().join("run-test-1"));
        let instances = reader.instances().await.unwrap();
        assert_eq!(instances.len(), 3);
        for instance in &instances {
            assert_eq!(instance.passed, Some(true));
            assert!(instance.correlation_id.starts_with("corr_"));
        }

        let steps = reader.steps().await.unwrap();
        assert_eq!(steps.len(), 6, "2 steps (1 http + 1 assert) per instance across 3 instances");
    }

    #[tokio::test]
    async fn run_controller_reports_failed_instance_without_aborting_others() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/1"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let output = tempfile::tempdir().unwrap();
        let controller = RunController::new();

        let options = RunOptions {
            run_id: Some("run-test-2".to_string()),
            sut: sut_config(&server.uri()),
            scenarios: vec![scenario("scenario-a")],
            instances: 2,
            config: RunConfig { seed: 1, concurrency: 4, timeout_seconds: 5.0 },
            output_dir: output.path().to_path_buf(),
            cancel: CancellationToken::new(),
        };

        let summary = controller.run(options).await.unwrap();

        assert_eq!(summary.total_instances, 2);
        assert_eq!(summary.pass_count, 0);
        assert_eq!(summary.fail_count, 2);
        assert_eq!(summary.error_count, 0);
    }

    #[tokio::test]
    async fn run_controller_rejects_empty_scenario_set() {
        let output = tempfile::tempdir().unwrap();
        let controller = RunController::new();

        let options = RunOptions {
            run_id: None,
            sut: sut_config("http://127.0.0.1:0"),
            scenarios: vec![],
            instances: 1,
            config: RunConfig::default(),
            output_dir: output.path().to_path_buf(),
            cancel: CancellationToken::new(),
        };

        let result = controller.run(options).await;
        assert!(matches!(result, Err(EngineError::NoScenarios)));
    }
}
