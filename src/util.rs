//! Shared utility functions for the order tracker.
//!
//! Request bodies come from browser forms, so numbers frequently arrive as
//! strings. The helpers here coerce loosely typed JSON values the same way
//! everywhere.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Format a timestamp as ISO-8601 UTC with millisecond precision
/// (`2026-10-18T08:30:00.000Z`).
pub fn iso_timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Coerce a JSON value to an integer. Accepts numbers and numeric strings;
/// fractional values are accepted only when integral.
pub fn coerce_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| integral(n.as_f64()?)),
        Value::String(s) => parse_i64(s),
        _ => None,
    }
}

/// Parse an integer from text such as a path segment (`"7"`, `" 7 "`, `"7.0"`).
pub fn parse_i64(raw: &str) -> Option<i64> {
    let s = raw.trim();
    s.parse::<i64>()
        .ok()
        .or_else(|| integral(s.parse::<f64>().ok()?))
}

fn integral(f: f64) -> Option<i64> {
    (f.is_finite() && f.fract() == 0.0).then_some(f as i64)
}

/// Coerce a JSON value to a float. Accepts numbers and numeric strings.
pub fn coerce_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

/// JavaScript-style truthiness: `null`, `false`, `0`, and `""` are falsy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Parse an optional query-string ID. `None` means "no filter";
/// `Some(None)` means a filter was given but is not a number.
pub fn parse_id_filter(raw: Option<&str>) -> Option<Option<i64>> {
    match raw.map(str::trim) {
        None | Some("") => None,
        Some(s) => Some(parse_i64(s)),
    }
}

/// Deserialize an integer that may arrive as a number, a numeric string,
/// `null` or not at all. Anything unparsable becomes 0.
pub fn de_lenient_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(coerce_i64).unwrap_or(0))
}

/// Deserialize an optional ID that may arrive as a number or a numeric
/// string. Anything unparsable becomes `None`.
pub fn de_lenient_opt_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(coerce_i64))
}

pub fn de_lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(coerce_f64).unwrap_or(0.0))
}

/// Render a scalar as text: strings verbatim, `null` as empty, anything
/// else as its JSON form.
pub fn loose_string(value: Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    }
}

/// Deserialize a string field that may be missing, `null`, or a number.
pub fn de_loose_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.map(loose_string).unwrap_or_default())
}
