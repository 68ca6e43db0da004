// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Variable definitions (`metadata.variables`) and their advisory
//! validation against an entity's current state. Validation never
//! mutates state; type mismatches become warnings, never rejections.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The declared type of an input/output variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableType {
    String,
    Number,
    Boolean,
    Array,
    Color,
    Vector2,
    Vector3,
    Range,
    Enum,
    Object,
}

/// Whether a variable flows into the entity or out of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Input,
    Output,
}

/// One entry in `metadata.variables.inputs`/`.outputs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub var_type: VariableType,
    pub direction: Direction,
    pub description: Option<String>,
    #[serde(rename = "defaultValue")]
    pub default_value: Option<Value>,
    pub required: bool,
    #[serde(default)]
    pub config: Value,
}

/// The parsed `metadata.variables` object: two ordered lists whose names
/// are unique across both.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VariableDefinitions {
    #[serde(default)]
    pub inputs: Vec<VariableDefinition>,
    #[serde(default)]
    pub outputs: Vec<VariableDefinition>,
}

impl VariableDefinitions {
    /// Parses `metadata.variables` from an entity's metadata object, if
    /// present. A missing or malformed `variables` key is treated as "no
    /// variables declared" rather than an error, since validation is
    /// advisory.
    #[must_use]
    pub fn from_metadata(metadata: &Value) -> Self {
        metadata
            .get("variables")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default()
    }

    fn all(&self) -> impl Iterator<Item = &VariableDefinition> {
        self.inputs.iter().chain(self.outputs.iter())
    }
}

/// One advisory mismatch between a declared variable's type and the
/// value actually present in state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Warning {
    pub name: String,
    pub expected: VariableType,
    pub message: String,
}

/// The result of validating an entity's state against its variable
/// definitions. Never causes a state write to fail.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationResult {
    pub warnings: Vec<Warning>,
    pub missing_required: Vec<String>,
    pub undefined_keys: Vec<String>,
}

/// Checks whether `value` satisfies the shape `expected` names. Numbers
/// exclude booleans (`serde_json`'s own `Value::Number` already never
/// matches `Value::Bool`, but we check explicitly since a caller could
/// hand in a bool and expect a JS-style numeric coercion); vector2/3
/// require `x`,`y`[,`z`] keys; enum accepts anything, since the set of
/// allowed values isn't modeled.
#[must_use]
pub fn matches_type(value: &Value, expected: VariableType) -> bool {
    match expected {
        VariableType::String => value.is_string(),
        VariableType::Number => value.is_number(),
        VariableType::Boolean => value.is_boolean(),
        VariableType::Array => value.is_array(),
        VariableType::Color => value.is_string() || value.is_object(),
        VariableType::Vector2 => has_keys(value, &["x", "y"]),
        VariableType::Vector3 => has_keys(value, &["x", "y", "z"]),
        VariableType::Range => value.is_number() || has_keys(value, &["min", "max"]),
        VariableType::Enum => true,
        VariableType::Object => value.is_object(),
    }
}

fn has_keys(value: &Value, keys: &[&str]) -> bool {
    let Some(map) = value.as_object() else { return false };
    keys.iter().all(|k| map.contains_key(*k))
}

/// Validates `state` against `definitions`. Produces warnings for
/// present-but-mismatched values, `missing_required` for required
/// variables absent from state, and `undefined_keys` for top-level state
/// keys that have no matching variable definition at all.
#[must_use]
pub fn validate(state: &Value, definitions: &VariableDefinitions) -> ValidationResult {
    let mut result = ValidationResult::default();
    let empty = serde_json::Map::new();
    let state_map = state.as_object().unwrap_or(&empty);

    for def in definitions.all() {
        match state_map.get(&def.name) {
            Some(value) => {
                if !matches_type(value, def.var_type) {
                    result.warnings.push(Warning {
                        name: def.name.clone(),
                        expected: def.var_type,
                        message: format!("expected {:?}, found a value that does not match", def.var_type),
                    });
                }
            }
            None if def.required => result.missing_required.push(def.name.clone()),
            None => {}
        }
    }

    let defined_names: std::collections::HashSet<&str> = definitions.all().map(|d| d.name.as_str()).collect();
    for key in state_map.keys() {
        if !defined_names.contains(key.as_str()) {
            result.undefined_keys.push(key.clone());
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    #[test_case(json!("red"), VariableType::String, true; "string matches string")]
    #[test_case(json!(5), VariableType::Number, true; "number matches number")]
    #[test_case(json!(true), VariableType::Number, false; "bool does not match number")]
    #[test_case(json!({"x": 1, "y": 2}), VariableType::Vector2, true; "object with x y matches vector2")]
    #[test_case(json!({"x": 1}), VariableType::Vector2, false; "object missing y fails vector2")]
    #[test_case(json!({"x": 1, "y": 2, "z": 3}), VariableType::Vector3, true; "object with xyz matches vector3")]
    #[test_case(json!("anything"), VariableType::Enum, true; "enum accepts anything")]
    fn type_matching(value: Value, expected: VariableType, matches: bool) {
        assert_eq!(matches_type(&value, expected), matches);
    }

    fn sample_definitions() -> VariableDefinitions {
        VariableDefinitions {
            inputs: vec![VariableDefinition {
                name: "brightness".to_string(),
                var_type: VariableType::Number,
                direction: Direction::Input,
                description: None,
                default_value: None,
                required: true,
                config: json!({}),
            }],
            outputs: vec![],
        }
    }

    #[test]
    fn validate_flags_missing_required() {
        let result = validate(&json!({}), &sample_definitions());
        assert_eq!(result.missing_required, vec!["brightness".to_string()]);
    }

    #[test]
    fn validate_warns_on_type_mismatch_without_rejecting() {
        let result = validate(&json!({"brightness": "bright"}), &sample_definitions());
        assert_eq!(result.warnings.len(), 1);
        assert!(result.missing_required.is_empty());
    }

    #[test]
    fn validate_reports_undefined_keys() {
        let result = validate(&json!({"brightness": 5, "color": "red"}), &sample_definitions());
        assert_eq!(result.undefined_keys, vec!["color".to_string()]);
    }

    #[test]
    fn from_metadata_defaults_when_variables_absent() {
        let definitions = VariableDefinitions::from_metadata(&json!({}));
        assert!(definitions.inputs.is_empty() && definitions.outputs.is_empty());
    }
}
