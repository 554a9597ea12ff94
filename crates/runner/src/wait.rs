use std::collections::HashMap;
use std::time::{Duration, Instant};

use reqwest::Client;
use serde_json::Value;

use tempest_core::{value_cmp, Expectation, Observation, SutConfig, WaitAction, WaitAttempt};

use crate::error::RunnerError;

/// Poll a service until its response satisfies `action.expect` or the
/// action's timeout elapses, recording every poll.
///
/// Mirrors `WaitActionRunner.execute` in `turbulence/actions/wait.py`:
/// the timeout check happens before each request (so a timeout never
/// fires mid-flight on a slow response), the per-poll sleep is capped to
/// whatever time remains before the deadline, and a match on the very
/// last poll still counts even if it lands exactly at the deadline.
pub async fn run_wait_action(action: &WaitAction, sut: &SutConfig, client: &Client) -> Result<Observation, RunnerError> {
    let service = sut.service(&action.service).ok_or_else(|| RunnerError::UnknownService(action.service.clone()))?;

    let headers: HashMap<String, String> = sut
        .default_headers
        .iter()
        .chain(service.default_headers.iter())
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    let url = format!("{}{}", service.base_url, action.path);
    let request_timeout = Duration::from_secs_f64(service.timeout_seconds.min(action.timeout));

    let start = Instant::now();
    let mut attempts: Vec<WaitAttempt> = Vec::new();
    let mut condition_met = false;
    let mut last_status_code = None;
    let mut last_body = None;
    let mut errors = Vec::new();
    let mut timed_out = false;

    loop {
        let elapsed = start.elapsed().as_secs_f64();
        if elapsed >= action.timeout {
            timed_out = true;
            errors.push(format!("Timeout after {elapsed:.1}s ({} attempts)", attempts.len()));
            break;
        }

        let poll_start = Instant::now();
        let mut poll_status_code = None;
        let mut poll_body = None;
        let mut poll_error = None;

        let mut request = client.request(reqwest::Method::from_bytes(action.method.to_uppercase().as_bytes()).unwrap_or(reqwest::Method::GET), &url).timeout(request_timeout);
        for (key, value) in &headers {
            request = request.header(key, value);
        }

        match request.send().await {
            Ok(response) => {
                poll_status_code = Some(response.status().as_u16());
                let raw = response.text().await.unwrap_or_default();
                poll_body = serde_json::from_str::<Value>(&raw).ok().or(if raw.is_empty() { None } else { Some(Value::String(raw)) });
            }
            Err(error) => {
                poll_error = Some(if error.is_timeout() {
                    format!("Request timeout: {error}")
                } else {
                    format!("Request error: {error}")
                });
            }
        }

        last_status_code = poll_status_code.or(last_status_code);
        last_body = poll_body.clone().or(last_body);

        if poll_error.is_none() {
            condition_met = condition_met_for(poll_body.as_ref(), poll_status_code, &action.expect);
        }

        attempts.push(WaitAttempt {
            attempt_number: u32::try_from(attempts.len() + 1).unwrap_or(u32::MAX),
            timestamp_ms_from_start: poll_start.duration_since(start).as_secs_f64() * 1000.0,
            latency_ms: poll_start.elapsed().as_secs_f64() * 1000.0,
            status_code: poll_status_code,
            body: poll_body,
            condition_met,
            error: poll_error,
        });

        if condition_met {
            break;
        }

        let remaining = action.timeout - start.elapsed().as_secs_f64();
        let sleep_seconds = action.interval.min(remaining);
        if sleep_seconds <= 0.0 {
            timed_out = true;
            errors.push(format!("Timeout after {:.1}s ({} attempts)", start.elapsed().as_secs_f64(), attempts.len()));
            break;
        }
        tokio::time::sleep(Duration::from_secs_f64(sleep_seconds)).await;
    }

    let total_attempts = u32::try_from(attempts.len()).unwrap_or(u32::MAX);

    Ok(Observation {
        ok: condition_met,
        status_code: last_status_code,
        latency_ms: start.elapsed().as_secs_f64() * 1000.0,
        headers: HashMap::new(),
        body: last_body,
        errors,
        action_name: action.name.clone(),
        service: Some(action.service.clone()),
        turbulence: None,
        attempts: Some(attempts.into_iter().map(tempest_core::AttemptRecord::Wait).collect()),
        total_attempts: Some(total_attempts),
        timed_out: Some(timed_out),
    })
}

/// `status_code` and `jsonpath` are conjunctive: both must hold when
/// both are configured (spec §4.8). A missing/invalid jsonpath match is
/// a non-match rather than an error — the poll just keeps going.
fn condition_met_for(body: Option<&Value>, status_code: Option<u16>, expect: &Expectation) -> bool {
    if let Some(expected_status) = expect.status_code {
        if status_code != Some(expected_status) {
            return false;
        }
    }

    if let Some(path) = &expect.jsonpath {
        let Some(body) = body else { return false };
        let Ok(matches) = jsonpath_lib::select(body, path) else { return false };
        let Some(value) = matches.into_iter().next() else { return false };

        if let Some(expected) = &expect.equals {
            if !value_cmp::values_equal(value, expected) {
                return false;
            }
        }
        if let Some(expected) = &expect.contains {
            if !value_cmp::value_contains(value, expected) {
                return false;
            }
        }
    }

    true
}
