//! Serialization integration tests.

use chrono::NaiveDate;
use db_shardquery::codec::{decode, encode};
use db_shardquery::db::{CanonicalType, Column, FederatedResult, Row, Value};
use pretty_assertions::assert_eq;

#[test]
fn test_decode_payload_from_another_producer() {
    let payload = r#"{
        "columns": [
            {"name": "database", "friendly_name": "database", "type": "string"},
            {"name": "created", "friendly_name": "Created", "type": "datetime"},
            {"name": "day", "friendly_name": "Day", "type": "date"},
            {"name": "total", "friendly_name": "Total", "type": "float"},
            {"name": "raw", "friendly_name": "raw", "type": null}
        ],
        "rows": [
            {"database": "s1", "created": "2024-03-01T10:00:00.500", "day": "2024-03-01", "total": 3, "raw": null}
        ]
    }"#;

    let result = decode(payload).unwrap();

    assert_eq!(result.columns[1].friendly_name, "Created");
    assert_eq!(result.columns[4].column_type, CanonicalType::Unknown);

    let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    let row = &result.rows[0];
    assert_eq!(
        row["created"],
        Value::DateTime(day.and_hms_milli_opt(10, 0, 0, 500).unwrap())
    );
    assert_eq!(row["day"], Value::Date(day));
    assert_eq!(row["total"], Value::Float(3.0));
    assert_eq!(row["raw"], Value::Null);
}

#[test]
fn test_round_trip_keeps_sparse_rows() {
    let result = FederatedResult::with_data(
        vec![
            Column::new("a", CanonicalType::Integer),
            Column::new("b", CanonicalType::String),
        ],
        vec![
            Row::from([("a".to_string(), Value::Int(1))]),
            Row::from([
                ("a".to_string(), Value::Int(-7)),
                ("b".to_string(), Value::from("x")),
            ]),
        ],
    );

    assert_eq!(decode(&encode(&result).unwrap()).unwrap(), result);
}

#[test]
fn test_round_trip_extreme_integers() {
    let result = FederatedResult::with_data(
        vec![
            Column::new("big", CanonicalType::Integer),
            Column::new("tiny", CanonicalType::Float),
        ],
        vec![Row::from([
            ("big".to_string(), Value::Int(i64::MIN)),
            ("tiny".to_string(), Value::Float(0.125)),
        ])],
    );

    assert_eq!(decode(&encode(&result).unwrap()).unwrap(), result);
}
