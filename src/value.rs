//! The grammar document value type.
//!
//! `Value` carries only the parsed grammar — verbs, keyword type configs,
//! alias tables, param rules. It is never used to hold request data; the
//! [`crate::request::Request`] model stores request values as plain
//! `String`s in their canonical form.

use crate::error::MarsError;

pub type Value = serde_json::Value;

/// Parse a YAML document (as bytes) into a [`Value`] tree.
pub fn from_yaml_str(path: &std::path::Path, text: &str) -> Result<Value, MarsError> {
    let yaml: serde_yaml::Value =
        serde_yaml::from_str(text).map_err(|e| MarsError::GrammarLoadError {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
    serde_json::to_value(yaml).map_err(|e| MarsError::GrammarLoadError {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })
}

/// Coerce a scalar `Value` to its string form the way the grammar documents
/// expect (numbers and bools render as their literal text, not JSON).
pub fn as_scalar_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Normalise a `Value` that may be a scalar or a list into a `Vec<String>`.
pub fn as_string_list(v: &Value) -> Vec<String> {
    match v {
        Value::Array(items) => items.iter().filter_map(as_scalar_string).collect(),
        other => as_scalar_string(other).into_iter().collect(),
    }
}
