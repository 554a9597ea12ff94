use std::collections::HashMap;

use serde_json::Value;

/// Resolve each `name -> jsonpath` entry in `extraction_map` against
/// `data`, binding only names whose path matches at least one value.
///
/// Matches the contract of `extract_values` in the predecessor's
/// `turbulence/utils/extractor.py`: a path that matches nothing is
/// silently skipped (the extraction is best-effort, never fatal to the
/// action it is attached to), a malformed path is logged and skipped,
/// and a path matching more than one value binds the first. This
/// function never returns an error; callers that need the invalid-path
/// case reported use [`crate::error::ExtractError`] only for their own
/// bookkeeping, not because this function raises it.
pub fn extract_values(data: &Value, extraction_map: &HashMap<String, String>) -> HashMap<String, Value> {
    let mut extracted = HashMap::with_capacity(extraction_map.len());
    for (name, path) in extraction_map {
        match jsonpath_lib::select(data, path) {
            Ok(matches) => {
                if let Some(first) = matches.into_iter().next() {
                    extracted.insert(name.clone(), first.clone());
                } else {
                    tracing::debug!(variable = %name, path = %path, "extraction path matched nothing, skipping");
                }
            }
            Err(error) => {
                tracing::warn!(variable = %name, path = %path, %error, "invalid extraction path, skipping");
            }
        }
    }
    extracted
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn binds_matching_paths() {
        let data = json!({"user": {"id": 42, "name": "ada"}});
        let mut map = HashMap::new();
        map.insert("user_id".to_string(), "$.user.id".to_string());
        let extracted = extract_values(&data, &map);
        assert_eq!(extracted.get("user_id"), Some(&json!(42)));
    }

    #[test]
    fn skips_non_matching_path() {
        let data = json!({"user": {"id": 42}});
        let mut map = HashMap::new();
        map.insert("missing".to_string(), "$.user.email".to_string());
        let extracted = extract_values(&data, &map);
        assert!(!extracted.contains_key("missing"));
    }

    #[test]
    fn skips_malformed_path() {
        let data = json!({"user": {"id": 42}});
        let mut map = HashMap::new();
        map.insert("broken".to_string(), "$[".to_string());
        let extracted = extract_values(&data, &map);
        assert!(!extracted.contains_key("broken"));
    }

    #[test]
    fn binds_first_of_multiple_matches() {
        let data = json!({"items": [{"id": 1}, {"id": 2}]});
        let mut map = HashMap::new();
        map.insert("first_id".to_string(), "$.items[*].id".to_string());
        let extracted = extract_values(&data, &map);
        assert_eq!(extracted.get("first_id"), Some(&json!(1)));
    }
}
