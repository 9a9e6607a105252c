//! Argument checks shared by the dispatcher and capability authors.
//!
//! Both checks report every problem at once instead of stopping at the first.

use crate::{
    errors::ErrorRecord,
    mcp::types::{Args, ParamType},
};
use serde_json::{json, Value};

/// JSON type name of a value. Integral numbers still report `number`;
/// `integer` is accepted for them separately in [`matches`].
pub fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

pub fn matches(value: &Value, expected: ParamType) -> bool {
    match expected {
        ParamType::Integer => value.as_i64().is_some() || value.as_u64().is_some(),
        other => json_type(value) == other.as_str(),
    }
}

/// A key is missing when absent or explicitly `null`.
pub fn validate_required(args: &Args, required: &[&str]) -> Result<(), ErrorRecord> {
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|k| args.get(*k).map_or(true, Value::is_null))
        .collect();
    if missing.is_empty() {
        return Ok(());
    }
    let provided: Vec<&String> = args.keys().collect();
    Err(ErrorRecord::validation(format!("Missing required parameters: {}", missing.join(", ")))
        .with_detail("missing", json!(missing))
        .with_detail("provided", json!(provided)))
}

/// Only keys present in both `args` and `schema` are compared; a `null`
/// counts as absent so optional parameters may be passed as null.
pub fn validate_types<'a>(
    args: &Args,
    schema: impl IntoIterator<Item = (&'a str, ParamType)>,
) -> Result<(), ErrorRecord> {
    let errors: Vec<String> = schema
        .into_iter()
        .filter_map(|(key, expected)| {
            let value = args.get(key).filter(|v| !v.is_null())?;
            (!matches(value, expected))
                .then(|| format!("{key}: expected {}, got {}", expected.as_str(), json_type(value)))
        })
        .collect();
    if errors.is_empty() {
        return Ok(());
    }
    Err(ErrorRecord::validation(format!("Type validation failed: {}", errors.join("; ")))
        .with_detail("errors", json!(errors)))
}
