//! Firestore typed values
//!
//! Firestore REST wraps every field in a one-key object naming its type
//! (`{"stringValue": "kilograms"}`, `{"integerValue": "12"}`). These helpers
//! convert between that encoding and plain JSON.

use crate::error::FirebaseError;
use pantry_core::Fields;
use serde_json::{json, Map, Number, Value};

/// Encode plain JSON fields as Firestore fields
#[must_use]
pub fn encode_fields(fields: &Fields) -> Map<String, Value> {
    fields
        .iter()
        .map(|(k, v)| (k.clone(), encode_value(v)))
        .collect()
}

/// Encode one JSON value as a Firestore value
#[must_use]
pub fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => match n.as_i64() {
            // 64-bit integers travel as strings
            Some(i) => json!({ "integerValue": i.to_string() }),
            None => json!({ "doubleValue": n.as_f64().unwrap_or_default() }),
        },
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => json!({
            "arrayValue": { "values": items.iter().map(encode_value).collect::<Vec<_>>() }
        }),
        Value::Object(map) => json!({ "mapValue": { "fields": encode_fields(map) } }),
    }
}

/// Decode Firestore fields into plain JSON
///
/// # Errors
/// - `FirebaseError::Value` if a field uses an unknown or malformed encoding
pub fn decode_fields(fields: &Map<String, Value>) -> Result<Fields, FirebaseError> {
    fields
        .iter()
        .map(|(k, v)| decode_value(v).map(|v| (k.clone(), v)))
        .collect()
}

/// Decode one Firestore value
///
/// Timestamps, references and bytes decode to their string form.
///
/// # Errors
/// - `FirebaseError::Value` if the value uses an unknown or malformed encoding
pub fn decode_value(value: &Value) -> Result<Value, FirebaseError> {
    let Some((kind, inner)) = value.as_object().and_then(|m| m.iter().next()) else {
        return Err(FirebaseError::Value(format!("expected typed value, got {value}")));
    };

    match (kind.as_str(), inner) {
        ("nullValue", _) => Ok(Value::Null),
        ("booleanValue", Value::Bool(b)) => Ok(Value::Bool(*b)),
        ("integerValue", Value::String(s)) => s
            .parse::<i64>()
            .map(Value::from)
            .map_err(|e| FirebaseError::Value(format!("integerValue {s:?}: {e}"))),
        ("integerValue", Value::Number(n)) => Ok(Value::Number(n.clone())),
        ("doubleValue", Value::Number(n)) => Ok(Value::Number(n.clone())),
        ("doubleValue", Value::String(s)) => special_double(s),
        (
            "stringValue" | "timestampValue" | "referenceValue" | "bytesValue",
            Value::String(s),
        ) => Ok(Value::String(s.clone())),
        ("geoPointValue", Value::Object(point)) => Ok(Value::Object(point.clone())),
        ("arrayValue", Value::Object(array)) => match array.get("values") {
            None => Ok(Value::Array(Vec::new())),
            Some(Value::Array(values)) => values
                .iter()
                .map(decode_value)
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Some(other) => Err(FirebaseError::Value(format!("arrayValue.values: {other}"))),
        },
        ("mapValue", Value::Object(map)) => match map.get("fields") {
            None => Ok(Value::Object(Map::new())),
            Some(Value::Object(fields)) => decode_fields(fields).map(Value::Object),
            Some(other) => Err(FirebaseError::Value(format!("mapValue.fields: {other}"))),
        },
        _ => Err(FirebaseError::Value(format!("{kind}: {inner}"))),
    }
}

// NaN and infinities arrive as strings and have no JSON number form.
fn special_double(s: &str) -> Result<Value, FirebaseError> {
    s.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| FirebaseError::Value(format!("doubleValue {s:?}")))
}
