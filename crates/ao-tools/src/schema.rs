use serde_json::Value;

use ao_domain::error::{Error, Result};

/// Minimal JSON-Schema-shaped validator for tool parameters.
///
/// Only the subset of Draft-07 the orchestrator needs is enforced:
/// `type: object`, `properties`, `required`, and — critically —
/// `additionalProperties: false`, which is how an unknown argument key
/// from the model gets rejected rather than silently passed through.
pub fn validate(schema: &Value, arguments: &Value) -> Result<()> {
    let Value::Object(args) = arguments else {
        return Err(Error::Validation("arguments must be a JSON object".into()));
    };

    let properties = schema.get("properties").and_then(Value::as_object);
    let required = schema.get("required").and_then(Value::as_array).cloned().unwrap_or_default();
    let additional_allowed = schema.get("additionalProperties").and_then(Value::as_bool).unwrap_or(true);

    for req in &required {
        let Some(key) = req.as_str() else { continue };
        if !args.contains_key(key) {
            return Err(Error::Validation(format!("missing required argument: {key}")));
        }
    }

    if !additional_allowed {
        let known = properties.map(|p| p.keys().cloned().collect::<std::collections::HashSet<_>>()).unwrap_or_default();
        for key in args.keys() {
            if !known.contains(key) {
                return Err(Error::Validation(format!("unknown argument: {key}")));
            }
        }
    }

    if let Some(properties) = properties {
        for (key, value) in args {
            let Some(prop_schema) = properties.get(key) else { continue };
            if let Some(expected_type) = prop_schema.get("type").and_then(Value::as_str) {
                if !type_matches(expected_type, value) {
                    return Err(Error::Validation(format!("argument '{key}' does not match expected type '{expected_type}'")));
                }
            }
        }
    }

    Ok(())
}

fn type_matches(expected: &str, value: &Value) -> bool {
    match expected {
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        _ => true,
    }
}
