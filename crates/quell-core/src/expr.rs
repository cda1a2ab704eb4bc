//! Selection-expression evaluation over decoded JSON payloads.
//!
//! # Purpose
//! The only consumer of the dynamic payload tree. Expressions are RFC 9535
//! JSONPath, compiled per evaluation; tenants store them as opaque strings.
//! Missing paths are a normal outcome (`None`), never an error — only a
//! malformed expression fails.
use serde_json::Value;
use serde_json_path::JsonPath;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("expression error: {0}")]
pub struct ExprError(String);

/// Evaluates `expr` against the payload and returns the first selected node.
/// An empty selection (missing path) is `Ok(None)`.
pub fn eval_any(expr: &str, payload: &Value) -> Result<Option<Value>, ExprError> {
    let path = JsonPath::parse(expr).map_err(|err| ExprError(err.to_string()))?;
    Ok(path.query(payload).first().cloned())
}

/// Coerces the selection to a string: strings come back as-is, any other
/// value is JSON-encoded. `null` and missing paths yield `Ok(None)`.
pub fn eval_string(expr: &str, payload: &Value) -> Result<Option<String>, ExprError> {
    match eval_any(expr, payload)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(other) => serde_json::to_string(&other)
            .map(Some)
            .map_err(|err| ExprError(err.to_string())),
    }
}

/// Boolean coercion: `true` only when the selection is the boolean `true`.
/// Missing paths, non-boolean values, and malformed expressions all count
/// as `false`.
pub fn eval_bool(expr: &str, payload: &Value) -> bool {
    matches!(eval_any(expr, payload), Ok(Some(Value::Bool(true))))
}
