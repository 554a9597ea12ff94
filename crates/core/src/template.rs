use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::error::TemplateError;

static VAR_PATTERN: OnceLock<Regex> = OnceLock::new();

fn var_pattern() -> &'static Regex {
    VAR_PATTERN.get_or_init(|| Regex::new(r"\{\{\s*([A-Za-z0-9_]+(?:\.[A-Za-z0-9_]+)*)\s*\}\}").expect("static pattern"))
}

/// Navigate a dotted path (`a.b.c`) against a JSON value, following only
/// plain object-field access — array indexing and wildcards are the
/// Extractor's job (spec §4.3), not the Template Renderer's (spec §4.1).
fn navigate(root: &Value, path: &str) -> Option<Value> {
    let mut current = root;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current.clone())
}

/// Stringify a resolved value for string-interpolation mode (spec §4.1:
/// "non-string values are stringified by standard representation").
fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// `true` if `value` contains any `{{...}}` template reference, used to
/// short-circuit unchanged config trees (spec §4.1).
#[must_use]
pub fn has_templates(value: &Value) -> bool {
    match value {
        Value::String(s) => var_pattern().is_match(s),
        Value::Array(items) => items.iter().any(has_templates),
        Value::Object(map) => map.values().any(has_templates),
        _ => false,
    }
}

/// Render one string against `context`. Sole-variable mode preserves the
/// resolved value's runtime type; all other cases render to a string
/// (spec §4.1).
pub fn render_string(template: &str, context: &Value) -> Result<Value, TemplateError> {
    let pattern = var_pattern();
    let trimmed = template.trim();
    if let Some(captures) = pattern.captures(trimmed) {
        if captures.get(0).map(|m| m.as_str()) == Some(trimmed) {
            let path = &captures[1];
            return navigate(context, path).ok_or_else(|| TemplateError::MissingVariable {
                template: template.to_string(),
                missing_var: path.to_string(),
            });
        }
    }

    let mut result = String::with_capacity(template.len());
    let mut last_end = 0;
    for captures in pattern.captures_iter(template) {
        let whole = captures.get(0).unwrap();
        let path = &captures[1];
        let resolved = navigate(context, path).ok_or_else(|| TemplateError::MissingVariable {
            template: template.to_string(),
            missing_var: path.to_string(),
        })?;
        result.push_str(&template[last_end..whole.start()]);
        result.push_str(&stringify(&resolved));
        last_end = whole.end();
    }
    result.push_str(&template[last_end..]);
    Ok(Value::String(result))
}

/// Render templates recursively through maps and lists (spec §4.1).
/// `render(x, ctx) == x` whenever `has_templates(x) == false`.
pub fn render_value(value: &Value, context: &Value) -> Result<Value, TemplateError> {
    match value {
        Value::String(s) => render_string(s, context),
        Value::Array(items) => {
            let rendered: Result<Vec<_>, _> = items.iter().map(|item| render_value(item, context)).collect();
            Ok(Value::Array(rendered?))
        }
        Value::Object(map) => {
            let mut rendered = Map::with_capacity(map.len());
            for (k, v) in map {
                rendered.insert(k.clone(), render_value(v, context)?);
            }
            Ok(Value::Object(rendered))
        }
        other => Ok(other.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sole_variable_preserves_type() {
        let ctx = json!({"amount": 100});
        let rendered = render_string("{{amount}}", &ctx).unwrap();
        assert_eq!(rendered, json!(100));
    }

    #[test]
    fn sole_variable_preserves_bool_and_structured() {
        let ctx = json!({"flag": true, "items": [1, 2, 3]});
        assert_eq!(render_string("{{flag}}", &ctx).unwrap(), json!(true));
        assert_eq!(render_string("{{items}}", &ctx).unwrap(), json!([1, 2, 3]));
    }

    #[test]
    fn interpolation_mode_stringifies() {
        let ctx = json!({"amount": 100});
        let rendered = render_string("total: {{amount}}", &ctx).unwrap();
        assert_eq!(rendered, json!("total: 100"));
    }

    #[test]
    fn dotted_path_access() {
        let ctx = json!({"entry": {"seed_data": {"customer": "acme"}}});
        let rendered = render_string("{{entry.seed_data.customer}}", &ctx).unwrap();
        assert_eq!(rendered, json!("acme"));
    }

    #[test]
    fn missing_variable_errors() {
        let ctx = json!({});
        let err = render_string("{{missing}}", &ctx).unwrap_err();
        match err {
            TemplateError::MissingVariable { missing_var, .. } => assert_eq!(missing_var, "missing"),
            TemplateError::Malformed { .. } => panic!("expected MissingVariable"),
        }
    }

    #[test]
    fn no_templates_is_identity() {
        let ctx = json!({});
        let value = json!({"a": 1, "b": [1, 2, "x"]});
        assert!(!has_templates(&value));
        assert_eq!(render_value(&value, &ctx).unwrap(), value);
    }

    #[test]
    fn renders_recursively_through_maps_and_lists() {
        let ctx = json!({"name": "widget", "qty": 3});
        let value = json!({"body": {"name": "{{name}}", "tags": ["{{qty}}", "static"]}});
        let rendered = render_value(&value, &ctx).unwrap();
        assert_eq!(
            rendered,
            json!({"body": {"name": "widget", "tags": [3, "static"]}})
        );
    }
}
