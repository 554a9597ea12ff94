use std::collections::HashMap;

use chrono::Utc;
use reqwest::Client;
use serde_json::Value;

use tempest_core::{HttpAction, HttpAttempt, Observation, SutConfig, WorkflowContext};
use tempest_executor::with_retry;

use crate::error::RunnerError;

/// Network-level failure classification used to drive retry decisions
/// (spec §4.7 step 5: "true for timeout if `on_timeout`; true for
/// connection error if `on_connection_error`").
#[derive(Debug, Clone)]
enum HttpFailure {
    Timeout(String),
    Connection(String),
    Other(String),
}

impl HttpFailure {
    fn message(&self) -> String {
        match self {
            HttpFailure::Timeout(m) | HttpFailure::Connection(m) | HttpFailure::Other(m) => m.clone(),
        }
    }
}

/// Outcome of one HTTP attempt that reached a response (never a network
/// failure — those are the `Err` side of the retry loop below).
struct AttemptResult {
    status_code: u16,
    ok: bool,
    headers: HashMap<String, String>,
    body: Option<Value>,
    error: Option<String>,
}

/// Execute a rendered `HttpAction` against its target service, composing
/// the Retry Policy when the action has one, recording every attempt, and
/// binding any configured extractions into `context`.
///
/// Mirrors `HttpActionRunner.execute` in
/// `turbulence/actions/http.py`: header precedence (SUT defaults →
/// service → action, later wins), 2xx-is-ok classification, non-fatal
/// extraction misses appended to `errors` rather than failing the action.
pub async fn run_http_action(action: &HttpAction, sut: &SutConfig, context: &mut WorkflowContext, client: &Client) -> Result<Observation, RunnerError> {
    let service = sut.service(&action.service).ok_or_else(|| RunnerError::UnknownService(action.service.clone()))?;

    let mut headers = HashMap::new();
    headers.extend(sut.default_headers.clone());
    headers.extend(service.default_headers.clone());
    headers.extend(action.headers.clone());

    let url = format!("{}{}", service.base_url, action.path);
    let timeout = std::time::Duration::from_secs_f64(service.timeout_seconds);

    let mut attempt_log: Vec<HttpAttempt> = Vec::new();
    let retry = action.retry.clone().unwrap_or_else(one_shot_retry);

    let outcome = with_retry(
        &retry,
        |_attempt| execute_once(client, &action.method, &url, &headers, &action.query, action.body.as_ref(), timeout),
        |failure: &HttpFailure| match failure {
            HttpFailure::Timeout(_) => retry.on_timeout,
            HttpFailure::Connection(_) => retry.on_connection_error,
            HttpFailure::Other(_) => false,
        },
        |result: &AttemptResult| !result.ok && retry.on_status.contains(&result.status_code),
        |attempt, result, failure, duration_ms| {
            attempt_log.push(HttpAttempt {
                status_code: result.map(|r| r.status_code),
                ok: result.map_or(false, |r| r.ok),
                latency_ms: duration_ms,
                timestamp: Utc::now(),
                error: result.and_then(|r| r.error.clone()).or_else(|| failure.map(HttpFailure::message)),
            });
            let _ = attempt;
        },
    )
    .await;

    let mut observation = match outcome {
        Ok(result) => Observation {
            ok: result.ok,
            status_code: Some(result.status_code),
            latency_ms: attempt_log.iter().map(|a| a.latency_ms).sum(),
            headers: result.headers,
            body: result.body,
            errors: result.error.into_iter().collect(),
            action_name: action.name.clone(),
            service: Some(action.service.clone()),
            turbulence: None,
            attempts: Some(attempt_log.iter().cloned().map(tempest_core::AttemptRecord::Http).collect()),
            total_attempts: None,
            timed_out: None,
        },
        Err(failure) => Observation {
            ok: false,
            status_code: None,
            latency_ms: attempt_log.iter().map(|a| a.latency_ms).sum(),
            headers: HashMap::new(),
            body: None,
            errors: vec![failure.message()],
            action_name: action.name.clone(),
            service: Some(action.service.clone()),
            turbulence: None,
            attempts: Some(attempt_log.iter().cloned().map(tempest_core::AttemptRecord::Http).collect()),
            total_attempts: None,
            timed_out: None,
        },
    };

    if observation.ok {
        if let Some(body) = observation.body.clone() {
            if !action.extract.is_empty() {
                let extraction_map: std::collections::HashMap<String, String> = action.extract.clone();
                let extracted = tempest_expr::extract_values(&body, &extraction_map);
                for (name, value) in &extracted {
                    context.bind_extracted(name.clone(), value.clone());
                }
                for name in extraction_map.keys() {
                    if !extracted.contains_key(name) {
                        observation.errors.push(format!("extraction '{name}' matched no values"));
                    }
                }
            }
        }
    }

    context.last_response = Some(tempest_core::LastResponse {
        status_code: observation.status_code,
        headers: observation.headers.iter().map(|(k, v)| (k.clone(), Value::String(v.clone()))).collect(),
        body: observation.body.clone(),
    });

    Ok(observation)
}

fn one_shot_retry() -> tempest_core::RetryConfig {
    tempest_core::RetryConfig {
        max_attempts: 1,
        on_status: Default::default(),
        on_timeout: false,
        on_connection_error: false,
        backoff: tempest_core::Backoff::Fixed,
        delay_ms: 0,
        base_delay_ms: 0,
        max_delay_ms: 0,
    }
}

async fn execute_once(
    client: &Client,
    method: &str,
    url: &str,
    headers: &HashMap<String, String>,
    query: &HashMap<String, String>,
    body: Option<&Value>,
    timeout: std::time::Duration,
) -> Result<AttemptResult, HttpFailure> {
    let method = reqwest::Method::from_bytes(method.to_uppercase().as_bytes()).map_err(|e| HttpFailure::Other(e.to_string()))?;
    let mut request = client.request(method, url).timeout(timeout).query(query);
    for (key, value) in headers {
        request = request.header(key, value);
    }
    if let Some(body) = body {
        request = request.json(body);
    }

    let response = request.send().await.map_err(classify_send_error)?;
    let status_code = response.status().as_u16();
    let response_headers: HashMap<String, String> = response
        .headers()
        .iter()
        .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
        .collect();

    let reason = response.status().canonical_reason().unwrap_or("").to_string();
    let raw = response.text().await.unwrap_or_default();
    let parsed_body = serde_json::from_str::<Value>(&raw).ok().or(if raw.is_empty() { None } else { Some(Value::String(raw)) });

    let ok = (200..300).contains(&status_code);
    let error = if ok { None } else { Some(format!("HTTP {status_code}: {reason}")) };

    Ok(AttemptResult {
        status_code,
        ok,
        headers: response_headers,
        body: parsed_body,
        error,
    })
}

fn classify_send_error(error: reqwest::Error) -> HttpFailure {
    if error.is_timeout() {
        HttpFailure::Timeout(format!("Request timeout: {error}"))
    } else if error.is_connect() {
        HttpFailure::Connection(format!("Connection error: {error}"))
    } else {
        HttpFailure::Other(format!("Request error: {error}"))
    }
}
