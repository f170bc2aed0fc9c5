//! Strict JSON-schema-subset argument validation.
//!
//! Supports the subset of JSON Schema the built-in tools actually declare:
//! `object`/`properties`/`required`/`type`. There is deliberately no coercion
//! — a string `"5"` does not satisfy an `integer` property, matching spec's
//! "no silent coercion" rule. Unknown fields are rejected unless the
//! descriptor opts into lenient mode.

use serde_json::Value;

/// Validate `args` against `schema`. Returns a human-readable reason on
/// failure; the gateway wraps it into a `ToolValidation` error.
pub fn validate(schema: &Value, args: &Value, lenient_unknown_fields: bool) -> Result<(), String> {
    let Some(obj) = args.as_object() else {
        return Err("arguments must be a JSON object".to_string());
    };

    let required = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(Value::as_str).collect::<Vec<_>>())
        .unwrap_or_default();
    for name in &required {
        if !obj.contains_key(*name) {
            return Err(format!("missing required field `{name}`"));
        }
    }

    let props = schema.get("properties").and_then(Value::as_object);
    match props {
        Some(props) => {
            for (key, value) in obj {
                match props.get(key) {
                    Some(prop_schema) => check_type(key, prop_schema, value)?,
                    None if lenient_unknown_fields => {}
                    None => return Err(format!("unknown field `{key}`")),
                }
            }
        }
        None if lenient_unknown_fields || obj.is_empty() => {}
        None => return Err("schema declares no properties but arguments were provided".to_string()),
    }

    Ok(())
}

fn check_type(key: &str, prop_schema: &Value, value: &Value) -> Result<(), String> {
    let Some(expected) = prop_schema.get("type").and_then(Value::as_str) else {
        return Ok(());
    };
    let matches = match expected {
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        "null" => value.is_null(),
        _ => true,
    };
    if matches {
        Ok(())
    } else {
        Err(format!("field `{key}` expected type `{expected}`, got `{}`", value_type_name(value)))
    }
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": {"type": "string"},
                "limit": {"type": "integer"}
            },
            "required": ["file_path"]
        })
    }

    #[test]
    fn valid_args_pass() {
        assert!(validate(&schema(), &json!({"file_path": "a.rs", "limit": 10}), false).is_ok());
    }

    #[test]
    fn missing_required_field_rejected() {
        assert!(validate(&schema(), &json!({"limit": 10}), false).is_err());
    }

    #[test]
    fn unknown_field_rejected_by_default() {
        assert!(validate(&schema(), &json!({"file_path": "a.rs", "extra": true}), false).is_err());
    }

    #[test]
    fn unknown_field_allowed_in_lenient_mode() {
        assert!(validate(&schema(), &json!({"file_path": "a.rs", "extra": true}), true).is_ok());
    }

    #[test]
    fn string_is_not_silently_coerced_to_integer() {
        let result = validate(&schema(), &json!({"file_path": "a.rs", "limit": "10"}), false);
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("expected type `integer`"));
    }

    #[test]
    fn non_object_args_rejected() {
        assert!(validate(&schema(), &json!("not an object"), false).is_err());
    }
}
