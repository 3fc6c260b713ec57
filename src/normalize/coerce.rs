use serde_json::Value;

use crate::errors::CoercionError;

// ---------------------------------------------------------------------------
// Field coercion
//
// Devices are inconsistent about types: the same field arrives as a number
// on one firmware and as a quoted string on another. Each helper maps JSON
// null to `Ok(None)` and anything it cannot convert to a `CoercionError`,
// which the caller downgrades to NULL.
// ---------------------------------------------------------------------------

/// Numbers, numeric strings and booleans (`1.0` / `0.0`).
pub fn to_float(field: &'static str, value: &Value) -> Result<Option<f64>, CoercionError> {
    let parsed = match value {
        Value::Null => return Ok(None),
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Array(_) | Value::Object(_) => None,
    };
    parsed.map(Some).ok_or_else(|| invalid(field, value))
}

/// Integers, integer strings, booleans (`1` / `0`) and finite floats, which
/// are truncated toward zero. `"21.5"` is rejected.
pub fn to_integer(field: &'static str, value: &Value) -> Result<Option<i64>, CoercionError> {
    let parsed = match value {
        Value::Null => return Ok(None),
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(truncate)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        Value::Bool(b) => Some(i64::from(*b)),
        Value::Array(_) | Value::Object(_) => None,
    };
    parsed.map(Some).ok_or_else(|| invalid(field, value))
}

/// Textual form of any JSON value. Strings pass through unquoted; arrays and
/// objects become compact JSON. Never fails.
pub fn to_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}

fn truncate(f: f64) -> Option<i64> {
    // i64::MAX as f64 rounds up to 2^63, so the upper bound is exclusive.
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    let t = f.trunc();
    (t.is_finite() && t >= -LIMIT && t < LIMIT).then_some(t as i64)
}

fn invalid(field: &'static str, value: &Value) -> CoercionError {
    CoercionError {
        field,
        value: to_text(value).unwrap_or_else(|| "null".to_owned()),
    }
}
