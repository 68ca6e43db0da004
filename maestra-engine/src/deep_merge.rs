// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Recursive deep merge and top-level change-key computation over
//! free-form JSON state. Merge is defined only at object-vs-object
//! pairs; everywhere else the incoming value replaces the stored one,
//! and `null` is a value, not a delete marker.

use serde_json::{Map, Value};

/// Merges `patch` into `base`, recursing into matching object keys and
/// letting `patch` win everywhere else.
#[must_use]
pub fn deep_merge(base: &Value, patch: &Value) -> Value {
    match (base, patch) {
        (Value::Object(base_map), Value::Object(patch_map)) => {
            let mut merged = base_map.clone();
            for (key, patch_value) in patch_map {
                let merged_value = match merged.get(key) {
                    Some(base_value) => deep_merge(base_value, patch_value),
                    None => patch_value.clone(),
                };
                merged.insert(key.clone(), merged_value);
            }
            Value::Object(merged)
        }
        _ => patch.clone(),
    }
}

/// Returns the top-level keys whose value differs between `previous` and
/// `current`, by deep equality. Keys present in only one side count as
/// changed. Both must be objects; a non-object state is treated as
/// holding no keys (so a type change at the root reports no per-key
/// diff — callers that need to know about a root type change should
/// check for that separately).
#[must_use]
pub fn changed_keys(previous: &Value, current: &Value) -> Vec<String> {
    let empty = Map::new();
    let previous_map = previous.as_object().unwrap_or(&empty);
    let current_map = current.as_object().unwrap_or(&empty);

    let mut keys: Vec<&String> = previous_map.keys().chain(current_map.keys()).collect();
    keys.sort();
    keys.dedup();

    keys.into_iter()
        .filter(|key| previous_map.get(*key) != current_map.get(*key))
        .cloned()
        .collect()
}

/// Projects `state` onto a set of dotted paths (e.g. `"a.b"`, `"c"`),
/// retaining each resolvable path as a top-level key in the result whose
/// value is the resolved nested value. Unresolved paths are omitted
/// rather than erroring.
#[must_use]
pub fn project_paths(state: &Value, paths: &[String]) -> Value {
    let mut result = Map::new();
    for path in paths {
        if let Some(value) = resolve_path(state, path) {
            result.insert(path.clone(), value.clone());
        }
    }
    Value::Object(result)
}

fn resolve_path<'a>(state: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = state;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deep_merge_recurses_into_nested_objects() {
        let base = json!({"a": {"x": 1, "y": 2}, "b": 3});
        let patch = json!({"a": {"y": 99}}, );
        assert_eq!(deep_merge(&base, &patch), json!({"a": {"x": 1, "y": 99}, "b": 3}));
    }

    #[test]
    fn deep_merge_non_object_patch_replaces() {
        let base = json!({"a": {"x": 1}});
        let patch = json!({"a": 5});
        assert_eq!(deep_merge(&base, &patch), json!({"a": 5}));
    }

    #[test]
    fn deep_merge_null_is_a_value_not_a_delete() {
        let base = json!({"a": 1, "b": 2});
        let patch = json!({"a": null});
        assert_eq!(deep_merge(&base, &patch), json!({"a": null, "b": 2}));
    }

    #[test]
    fn deep_merge_adds_new_top_level_keys() {
        let base = json!({"a": 1});
        let patch = json!({"b": 2});
        assert_eq!(deep_merge(&base, &patch), json!({"a": 1, "b": 2}));
    }

    #[test]
    fn changed_keys_reports_only_differing_top_level_keys() {
        let previous = json!({"a": 1, "b": {"x": 1}, "c": 3});
        let current = json!({"a": 1, "b": {"x": 2}, "c": 3});
        assert_eq!(changed_keys(&previous, &current), vec!["b".to_string()]);
    }

    #[test]
    fn changed_keys_empty_when_states_equal() {
        let state = json!({"a": 1});
        assert!(changed_keys(&state, &state).is_empty());
    }

    #[test]
    fn changed_keys_includes_added_and_removed_keys() {
        let previous = json!({"a": 1});
        let current = json!({"b": 2});
        let mut keys = changed_keys(&previous, &current);
        keys.sort();
        assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn project_paths_retains_resolved_and_omits_unresolved() {
        let state = json!({"a": {"b": 5}, "c": 1});
        let result = project_paths(&state, &["a.b".to_string(), "missing.path".to_string()]);
        assert_eq!(result, json!({"a.b": 5}));
    }
}
