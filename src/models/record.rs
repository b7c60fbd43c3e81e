//! Helpers for reading loosely-typed Rally records.
//!
//! Rally returns every object as a JSON map whose fields may be missing,
//! `null`, strings, numbers or nested references. These helpers collapse that
//! variety into `Option<String>` so the typed models can apply their defaults.

use serde_json::{Map, Value};

/// A Rally record is only usable when it is a JSON object.
pub fn as_record(value: &Value) -> Option<&Map<String, Value>> {
    value.as_object()
}

/// Read a scalar field as text. Strings are returned as-is, numbers and
/// booleans are rendered; `null`, arrays and objects yield `None`.
pub fn text(record: &Map<String, Value>, key: &str) -> Option<String> {
    scalar_text(record.get(key)?)
}

/// Like [`text`] but treats empty or whitespace-only strings as absent.
pub fn non_empty_text(record: &Map<String, Value>, key: &str) -> Option<String> {
    text(record, key).filter(|s| !s.trim().is_empty())
}

/// Read `_refObjectName` from a nested reference object (Owner, Tester, ...).
pub fn ref_name(record: &Map<String, Value>, key: &str) -> Option<String> {
    record
        .get(key)?
        .as_object()
        .and_then(|nested| non_empty_text(nested, "_refObjectName"))
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Take the calendar-date portion of a timestamp (`2024-03-01T10:00:00Z` →
/// `2024-03-01`). Values without a time separator are returned unchanged.
pub fn date_portion(timestamp: &str) -> &str {
    timestamp
        .split(['T', ' '])
        .next()
        .unwrap_or(timestamp)
}
