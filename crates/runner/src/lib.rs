//! HTTP, Wait, and Assert action runners for Tempest scenario execution.
//!
//! Each runner takes a rendered `Action` variant and the services it needs
//! (an HTTP client, the target `SutConfig`, the instance's
//! `WorkflowContext`) and produces an `Observation` plus any context
//! mutation (extracted values, `last_response`, assertion results). None
//! of these runners know about retry composition across actions, turbulence
//! injection, or per-instance scheduling — that belongs to the Scenario
//! Runner, which wraps these calls.

pub mod assert;
pub mod error;
pub mod http;
pub mod wait;

pub use assert::run_assert_action;
pub use error::RunnerError;
pub use http::run_http_action;
pub use wait::run_wait_action;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::{HashMap, HashSet};
    use tempest_core::{AssertAction, Expectation, LastResponse, RunConfig, ServiceConfig, SutConfig, WorkflowContext};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sut_for(server: &MockServer) -> SutConfig {
        let mut services = HashMap::new();
        services.insert(
            "api".to_string(),
            ServiceConfig {
                base_url: server.uri(),
                default_headers: HashMap::new(),
                timeout_seconds: 5.0,
            },
        );
        SutConfig {
            name: "test-sut".to_string(),
            services,
            default_headers: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn http_action_succeeds_and_extracts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1, "name": "ada"})))
            .mount(&server)
            .await;

        let sut = sut_for(&server);
        let mut context = WorkflowContext::new("run-1", "instance-1", "corr-1");
        let client = reqwest::Client::new();

        let action = tempest_core::HttpAction {
            name: "get_user".to_string(),
            service: "api".to_string(),
            method: "GET".to_string(),
            path: "/users/1".to_string(),
            headers: HashMap::new(),
            query: HashMap::new(),
            body: None,
            extract: HashMap::from([("user_name".to_string(), "$.name".to_string())]),
            retry: None,
        };

        let observation = run_http_action(&action, &sut, &mut context, &client).await.unwrap();
        assert!(observation.ok);
        assert_eq!(observation.status_code, Some(200));
        assert_eq!(context.to_value().get("user_name"), Some(&json!("ada")));
        let _ = RunConfig::default();
    }

    #[tokio::test]
    async fn http_action_retries_on_configured_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET")).and(path("/flaky")).respond_with(ResponseTemplate::new(200)).mount(&server).await;

        let sut = sut_for(&server);
        let mut context = WorkflowContext::new("run-1", "instance-1", "corr-1");
        let client = reqwest::Client::new();

        let action = tempest_core::HttpAction {
            name: "flaky".to_string(),
            service: "api".to_string(),
            method: "GET".to_string(),
            path: "/flaky".to_string(),
            headers: HashMap::new(),
            query: HashMap::new(),
            body: None,
            extract: HashMap::new(),
            retry: Some(tempest_core::RetryConfig {
                max_attempts: 3,
                on_status: HashSet::from([503]),
                on_timeout: false,
                on_connection_error: false,
                backoff: tempest_core::Backoff::Fixed,
                delay_ms: 1,
                base_delay_ms: 1,
                max_delay_ms: 1,
            }),
        };

        let observation = run_http_action(&action, &sut, &mut context, &client).await.unwrap();
        assert!(observation.ok);
        assert_eq!(observation.attempts.as_ref().map(Vec::len), Some(3));
    }

    #[tokio::test]
    async fn wait_action_succeeds_once_condition_met() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"state": "ready"})))
            .mount(&server)
            .await;

        let sut = sut_for(&server);
        let client = reqwest::Client::new();

        let action = tempest_core::WaitAction {
            name: "wait_ready".to_string(),
            service: "api".to_string(),
            method: "GET".to_string(),
            path: "/status".to_string(),
            interval: 0.01,
            timeout: 1.0,
            expect: Expectation {
                status_code: Some(200),
                jsonpath: Some("$.state".to_string()),
                context_path: None,
                json_schema: None,
                expression: None,
                equals: Some(json!("ready")),
                contains: None,
            },
        };

        let observation = run_wait_action(&action, &sut, &client).await.unwrap();
        assert!(observation.ok);
        assert_eq!(observation.timed_out, Some(false));
    }

    #[tokio::test]
    async fn wait_action_times_out_when_condition_never_met() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"state": "pending"})))
            .mount(&server)
            .await;

        let sut = sut_for(&server);
        let client = reqwest::Client::new();

        let action = tempest_core::WaitAction {
            name: "wait_ready".to_string(),
            service: "api".to_string(),
            method: "GET".to_string(),
            path: "/status".to_string(),
            interval: 0.01,
            timeout: 0.05,
            expect: Expectation {
                status_code: None,
                jsonpath: Some("$.state".to_string()),
                context_path: None,
                json_schema: None,
                expression: None,
                equals: Some(json!("ready")),
                contains: None,
            },
        };

        let observation = run_wait_action(&action, &sut, &client).await.unwrap();
        assert!(!observation.ok);
        assert_eq!(observation.timed_out, Some(true));
    }

    #[test]
    fn assert_action_status_code_pass_and_fail() {
        let mut context = WorkflowContext::new("run-1", "instance-1", "corr-1");
        context.last_response = Some(LastResponse {
            status_code: Some(200),
            headers: serde_json::Map::new(),
            body: None,
        });

        let action = AssertAction {
            name: "check_status".to_string(),
            expect: Expectation {
                status_code: Some(200),
                ..Expectation::default()
            },
        };
        let observation = run_assert_action(&action, &mut context).unwrap();
        assert!(observation.ok);

        let action_fail = AssertAction {
            name: "check_status_wrong".to_string(),
            expect: Expectation {
                status_code: Some(404),
                ..Expectation::default()
            },
        };
        let observation = run_assert_action(&action_fail, &mut context).unwrap();
        assert!(!observation.ok);
        assert_eq!(context.assertion_results.len(), 2);
    }

    #[test]
    fn assert_action_json_schema() {
        let mut context = WorkflowContext::new("run-1", "instance-1", "corr-1");
        context.last_response = Some(LastResponse {
            status_code: Some(200),
            headers: serde_json::Map::new(),
            body: Some(json!({"id": 1})),
        });

        let action = AssertAction {
            name: "check_schema".to_string(),
            expect: Expectation {
                json_schema: Some(json!({"type": "object", "required": ["id"]})),
                ..Expectation::default()
            },
        };
        let observation = run_assert_action(&action, &mut context).unwrap();
        assert!(observation.ok);
    }

    #[test]
    fn assert_action_expression() {
        let mut context = WorkflowContext::new("run-1", "instance-1", "corr-1");
        context.last_response = Some(LastResponse {
            status_code: Some(200),
            headers: serde_json::Map::new(),
            body: Some(json!({"count": 3})),
        });

        let action = AssertAction {
            name: "check_expr".to_string(),
            expect: Expectation {
                expression: Some("body.count > 0".to_string()),
                ..Expectation::default()
            },
        };
        let observation = run_assert_action(&action, &mut context).unwrap();
        assert!(observation.ok);
    }
}
