//! JSON encoding of federated results.
//!
//! The payload is `{"columns": [...], "rows": [...]}`. Values carry no type
//! tags, so decoding uses the declared column types to restore dates,
//! datetimes and non-finite floats; keys without a declared column are
//! decoded by JSON shape. A result round-trips when every value already has
//! the form [`Value::conform`] gives it under its column type.

use crate::db::{CanonicalType, Column, FederatedResult, Row, Value};
use crate::error::Result;
use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;

#[derive(Deserialize)]
struct WireResult {
    #[serde(default)]
    columns: Vec<Column>,
    #[serde(default)]
    rows: Vec<Map<String, JsonValue>>,
}

/// Serializes a result to compact JSON.
pub fn encode(result: &FederatedResult) -> Result<String> {
    Ok(serde_json::to_string(result)?)
}

/// Serializes a result to indented JSON.
pub fn encode_pretty(result: &FederatedResult) -> Result<String> {
    Ok(serde_json::to_string_pretty(result)?)
}

/// Parses a result previously produced by [`encode`].
pub fn decode(payload: &str) -> Result<FederatedResult> {
    let wire: WireResult = serde_json::from_str(payload)?;

    let types: HashMap<&str, CanonicalType> = wire
        .columns
        .iter()
        .map(|c| (c.name.as_str(), c.column_type))
        .collect();

    let rows = wire
        .rows
        .into_iter()
        .map(|row| {
            row.into_iter()
                .map(|(key, json)| {
                    let hint = types.get(key.as_str()).copied().unwrap_or_default();
                    let value = decode_value(json, hint);
                    (key, value)
                })
                .collect::<Row>()
        })
        .collect();

    Ok(FederatedResult::with_data(wire.columns, rows))
}

fn decode_value(json: JsonValue, hint: CanonicalType) -> Value {
    from_json(json).conform(hint)
}

/// Converts a JSON value by shape alone.
fn from_json(json: JsonValue) -> Value {
    match json {
        JsonValue::Null => Value::Null,
        JsonValue::Bool(b) => Value::Bool(b),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
        },
        JsonValue::String(s) => Value::String(s),
        other => Value::String(other.to_string()),
    }
}
