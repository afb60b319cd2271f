use regex::{Captures, Regex};
use serde_json::Value;

use crate::{ReqflowError, Result};

/// Placeholder pattern for format strings
/// Format: `{key}`
const PLACEHOLDER_PATTERN: &str = r"\{([^{}]+)\}";

/// Render a value as plain text: strings as-is, scalars in their usual form,
/// maps and arrays as compact JSON.
pub fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Substitute `{key}` placeholders in `template`.
///
/// A map `value` supplies one placeholder per key. Any other value fills the
/// single placeholder named `scalar_key`. Unknown placeholders are left as written.
pub fn render(
    template: &str,
    value: &Value,
    scalar_key: &str,
) -> Result<String> {
    let re = Regex::new(PLACEHOLDER_PATTERN).map_err(|err| ReqflowError::Action(err.to_string()))?;

    let rendered = re.replace_all(template, |caps: &Captures| {
        let key = &caps[1];
        let found = match value {
            Value::Object(map) => map.get(key),
            other if key == scalar_key => Some(other),
            _ => None,
        };
        found.map(display).unwrap_or_else(|| caps[0].to_string())
    });

    Ok(rendered.into_owned())
}

/// Short name of a value's JSON kind, for error messages.
pub fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "map",
    }
}
