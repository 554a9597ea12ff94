use std::time::Instant;

use jsonschema::JSONSchema;
use serde_json::Value;

use tempest_core::{value_cmp, AssertAction, AssertionResult, ComparisonKind, Observation, WorkflowContext};

use crate::error::RunnerError;

/// Evaluate one `AssertAction`'s `Expectation` against `context` and
/// record the outcome on the context (`_assertion_results`,
/// `_last_assertion`) as well as in the returned `Observation`.
///
/// Mirrors `AssertActionRunner.execute`/`_evaluate_expectation` in
/// `windtunnel/actions/assert_.py`, extended with the `json_schema` and
/// `expression` selectors the predecessor's Turbulence rewrite added
/// (spec §4.9): the first configured selector, in
/// `status_code → jsonpath → context_path → json_schema → expression`
/// order, wins.
pub fn run_assert_action(action: &AssertAction, context: &mut WorkflowContext) -> Result<Observation, RunnerError> {
    let start = Instant::now();
    let expect = &action.expect;

    let result = if let Some(expected_status) = expect.status_code {
        evaluate_status_code(&action.name, expected_status, context)
    } else if let Some(path) = &expect.jsonpath {
        evaluate_jsonpath(&action.name, path, expect, context)
    } else if let Some(path) = &expect.context_path {
        evaluate_context_path(&action.name, path, expect, context)
    } else if let Some(schema) = &expect.json_schema {
        evaluate_json_schema(&action.name, schema, context)?
    } else if let Some(source) = &expect.expression {
        evaluate_expression(&action.name, source, context)
    } else {
        AssertionResult {
            name: action.name.clone(),
            passed: false,
            expected: None,
            actual: None,
            message: "no expectation selector specified (need status_code, jsonpath, context_path, json_schema, or expression)".to_string(),
            path: None,
            comparison: ComparisonKind::Equals,
        }
    };

    context.record_assertion(result.clone());

    Ok(Observation {
        ok: result.passed,
        status_code: None,
        latency_ms: start.elapsed().as_secs_f64() * 1000.0,
        headers: std::collections::HashMap::new(),
        body: None,
        errors: if result.passed { Vec::new() } else { vec![result.message.clone()] },
        action_name: action.name.clone(),
        service: None,
        turbulence: None,
        attempts: None,
        total_attempts: None,
        timed_out: None,
    })
}

fn evaluate_status_code(name: &str, expected: u16, context: &WorkflowContext) -> AssertionResult {
    let actual = context.last_response.as_ref().and_then(|r| r.status_code);
    match actual {
        None => AssertionResult {
            name: name.to_string(),
            passed: false,
            expected: Some(Value::from(expected)),
            actual: None,
            message: "no last_response in context or missing status_code".to_string(),
            path: None,
            comparison: ComparisonKind::StatusCode,
        },
        Some(actual_status) => {
            let passed = actual_status == expected;
            let message = if passed {
                format!("status code {actual_status} matches expected {expected}")
            } else {
                format!("status code mismatch: expected {expected}, got {actual_status}")
            };
            AssertionResult {
                name: name.to_string(),
                passed,
                expected: Some(Value::from(expected)),
                actual: Some(Value::from(actual_status)),
                message,
                path: None,
                comparison: ComparisonKind::StatusCode,
            }
        }
    }
}

fn evaluate_jsonpath(name: &str, path: &str, expect: &tempest_core::Expectation, context: &WorkflowContext) -> AssertionResult {
    let comparison = if expect.contains.is_some() { ComparisonKind::Contains } else { ComparisonKind::Equals };
    let Some(body) = context.last_response.as_ref().and_then(|r| r.body.as_ref()) else {
        return AssertionResult {
            name: name.to_string(),
            passed: false,
            expected: expect.expected_value().cloned(),
            actual: None,
            message: "no response body in context".to_string(),
            path: Some(path.to_string()),
            comparison,
        };
    };

    match jsonpath_lib::select(body, path) {
        Err(error) => AssertionResult {
            name: name.to_string(),
            passed: false,
            expected: None,
            actual: None,
            message: format!("invalid jsonpath expression '{path}': {error}"),
            path: Some(path.to_string()),
            comparison,
        },
        Ok(matches) if matches.is_empty() => AssertionResult {
            name: name.to_string(),
            passed: false,
            expected: expect.expected_value().cloned(),
            actual: None,
            message: format!("jsonpath '{path}' matched no values in response"),
            path: Some(path.to_string()),
            comparison,
        },
        Ok(matches) => compare_values(name, matches[0].clone(), expect, path),
    }
}

fn evaluate_context_path(name: &str, path: &str, expect: &tempest_core::Expectation, context: &WorkflowContext) -> AssertionResult {
    let comparison = if expect.contains.is_some() { ComparisonKind::Contains } else { ComparisonKind::Equals };
    match context.get_path(path) {
        None => AssertionResult {
            name: name.to_string(),
            passed: false,
            expected: expect.expected_value().cloned(),
            actual: None,
            message: format!("context path '{path}' not found in context"),
            path: Some(path.to_string()),
            comparison,
        },
        Some(actual) => compare_values(name, actual, expect, path),
    }
}

fn compare_values(name: &str, actual: Value, expect: &tempest_core::Expectation, path: &str) -> AssertionResult {
    if let Some(expected) = &expect.equals {
        let passed = value_cmp::values_equal(&actual, expected);
        let message = if passed {
            format!("value at '{path}' equals expected {expected}")
        } else {
            format!("value mismatch at '{path}': expected {expected}, got {actual}")
        };
        return AssertionResult {
            name: name.to_string(),
            passed,
            expected: Some(expected.clone()),
            actual: Some(actual),
            message,
            path: Some(path.to_string()),
            comparison: ComparisonKind::Equals,
        };
    }

    if let Some(expected) = &expect.contains {
        let passed = value_cmp::value_contains(&actual, expected);
        let message = if passed {
            format!("value at '{path}' contains {expected}")
        } else {
            format!("value at '{path}' does not contain {expected}, actual: {actual}")
        };
        return AssertionResult {
            name: name.to_string(),
            passed,
            expected: Some(expected.clone()),
            actual: Some(actual),
            message,
            path: Some(path.to_string()),
            comparison: ComparisonKind::Contains,
        };
    }

    AssertionResult {
        name: name.to_string(),
        passed: false,
        expected: None,
        actual: Some(actual),
        message: format!("no comparison specified for path '{path}' (need equals or contains)"),
        path: Some(path.to_string()),
        comparison: ComparisonKind::Equals,
    }
}

/// Give `schema` a `$id` derived from `scenario_path` when it doesn't
/// already declare one, so a relative `$ref` inside the schema resolves
/// against the scenario file's own location (spec §4.9 item 4) rather
/// than failing to resolve at all. `$id` is a JSON Schema keyword, not a
/// `jsonschema`-crate API, so this works regardless of the installed
/// crate version's resolver/builder surface.
fn schema_with_base_uri(schema: &Value, scenario_path: Option<&String>) -> Value {
    let Some(path) = scenario_path else {
        return schema.clone();
    };
    let Value::Object(object) = schema else {
        return schema.clone();
    };
    if object.contains_key("$id") {
        return schema.clone();
    }
    let mut object = object.clone();
    object.insert("$id".to_string(), Value::String(format!("file://{path}")));
    Value::Object(object)
}

fn evaluate_json_schema(name: &str, schema: &Value, context: &WorkflowContext) -> Result<AssertionResult, RunnerError> {
    let body = context.last_response.as_ref().and_then(|r| r.body.clone()).unwrap_or(Value::Null);
    let schema_with_id = schema_with_base_uri(schema, context.scenario_path.as_ref());
    let compiled = JSONSchema::compile(&schema_with_id).map_err(|e| RunnerError::InvalidSchema(e.to_string()))?;

    match compiled.validate(&body) {
        Ok(()) => Ok(AssertionResult {
            name: name.to_string(),
            passed: true,
            expected: Some(schema.clone()),
            actual: Some(body),
            message: "response body matches the configured schema".to_string(),
            path: None,
            comparison: ComparisonKind::Schema,
        }),
        Err(error) => {
            let message = error.to_string();
            Ok(AssertionResult {
                name: name.to_string(),
                passed: false,
                expected: Some(schema.clone()),
                actual: Some(body),
                message: format!("response body does not match schema: {message}"),
                path: None,
                comparison: ComparisonKind::Schema,
            })
        }
    }
}

fn evaluate_expression(name: &str, source: &str, context: &WorkflowContext) -> AssertionResult {
    let last_response = context.last_response.as_ref().map(tempest_core::LastResponse::to_value).unwrap_or(Value::Null);
    let body = last_response.get("body").cloned().unwrap_or(Value::Null);
    let headers = last_response.get("headers").cloned().unwrap_or(Value::Null);
    let context_value = context.to_value();

    match tempest_expr::evaluate(source, &body, &headers, &context_value, std::time::Duration::from_millis(250)) {
        Ok(value) => {
            let passed = tempest_expr::truthy(&value);
            AssertionResult {
                name: name.to_string(),
                passed,
                expected: Some(Value::Bool(true)),
                actual: Some(value),
                message: if passed {
                    format!("expression '{source}' evaluated truthy")
                } else {
                    format!("expression '{source}' evaluated falsy")
                },
                path: None,
                comparison: ComparisonKind::Expression,
            }
        }
        Err(error) => AssertionResult {
            name: name.to_string(),
            passed: false,
            expected: None,
            actual: None,
            message: format!("expression '{source}' failed to evaluate: {error}"),
            path: None,
            comparison: ComparisonKind::Expression,
        },
    }
}
