//! Serialize response and error types to `application/x-www-form-urlencoded`
//! query strings, for use in redirect URLs.

use anyhow::{Result, anyhow};
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use serde::Serialize;
use serde_json::Value;

// Characters percent-encoded in query component values.
const QUERY: &AsciiSet =
    &CONTROLS.add(b' ').add(b'"').add(b'#').add(b'%').add(b'&').add(b'+').add(b'<').add(b'=').add(b'>');

/// Serialize a type to a query string of `key=value` pairs.
///
/// Nested objects and arrays are serialized as percent-encoded JSON.
///
/// # Errors
///
/// Returns an error if the value does not serialize to a JSON object.
pub fn to_string<T: Serialize>(value: &T) -> Result<String> {
    let Value::Object(map) = serde_json::to_value(value)? else {
        return Err(anyhow!("expected a JSON object"));
    };

    let mut pairs = vec![];
    for (key, value) in &map {
        let encoded = match value {
            Value::Null => continue,
            Value::String(s) => utf8_percent_encode(s, QUERY).to_string(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => utf8_percent_encode(&value.to_string(), QUERY).to_string(),
        };
        pairs.push(format!("{key}={encoded}"));
    }

    Ok(pairs.join("&"))
}
