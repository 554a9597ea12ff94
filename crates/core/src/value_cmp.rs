use serde_json::Value;

/// Deep structural equality using `serde_json`'s natural semantics:
/// numbers by value, maps unordered (object equality ignores key order),
/// lists ordered. No type coercion is performed — `100 != "100"`.
/// `Value::Null` compares equal only to itself (spec §4.11).
#[must_use]
pub fn values_equal(a: &Value, b: &Value) -> bool {
    a == b
}

/// `contains` semantics (spec §4.9, §4.11):
/// - array: membership (deep-equal to some element).
/// - string: substring, stringifying the expected value first.
/// - object: membership among its values.
/// - otherwise: false.
#[must_use]
pub fn value_contains(haystack: &Value, needle: &Value) -> bool {
    match haystack {
        Value::Array(items) => items.iter().any(|item| values_equal(item, needle)),
        Value::String(s) => {
            let needle_str = match needle {
                Value::String(n) => n.clone(),
                other => other.to_string(),
            };
            s.contains(&needle_str)
        }
        Value::Object(map) => map.values().any(|v| values_equal(v, needle)),
        _ => false,
    }
}
