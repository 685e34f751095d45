//! Canonical JSON serialization for model artifacts
//!
//! Object keys are sorted recursively so that the same fitted model always
//! produces the same bytes, and therefore the same Blake3 hash.

use serde::Serialize;
use serde_json::{map::Map, ser::PrettyFormatter, Serializer, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CanonicalError {
    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid UTF-8 in canonical output: {0}")]
    InvalidUtf8(String),
}

/// Recursively sort JSON object keys.
fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));

            let mut sorted = Map::with_capacity(entries.len());
            for (key, val) in entries {
                sorted.insert(key, canonicalize(val));
            }
            Value::Object(sorted)
        }
        Value::Array(elements) => Value::Array(elements.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

/// Serialize a value to canonical JSON (sorted keys, two-space indent)
pub fn to_canonical_json<T: Serialize>(value: &T) -> Result<String, CanonicalError> {
    let json_value =
        serde_json::to_value(value).map_err(|e| CanonicalError::SerializationError(e.to_string()))?;

    let mut buffer = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"  ");
    let mut serializer = Serializer::with_formatter(&mut buffer, formatter);
    canonicalize(json_value)
        .serialize(&mut serializer)
        .map_err(|e| CanonicalError::SerializationError(e.to_string()))?;

    String::from_utf8(buffer).map_err(|e| CanonicalError::InvalidUtf8(e.to_string()))
}

/// Blake3 hash of a canonical JSON string, hex encoded
pub fn hash_json_hex(json: &str) -> String {
    hex::encode(blake3::hash(json.as_bytes()).as_bytes())
}

/// Serialize canonically and hash in one step
pub fn hash_canonical_hex<T: Serialize>(value: &T) -> Result<String, CanonicalError> {
    let json = to_canonical_json(value)?;
    Ok(hash_json_hex(&json))
}
