//! Federation integration tests.
//!
//! Runs whole federated queries through `QueryRunner` against the mock driver.

use chrono::NaiveDate;
use db_shardquery::codec;
use db_shardquery::config::ShardSourceConfig;
use db_shardquery::db::{
    mysql_codes, pg_oids, CanonicalType, Column, MockShard, MockShardDriver, PgTypeMapper,
    RawColumn, RawResultSet, Row, Value,
};
use db_shardquery::error::FederationError;
use db_shardquery::federation::Federator;
use db_shardquery::QueryRunner;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn source(params: &str, show_params: bool) -> ShardSourceConfig {
    let mut source = ShardSourceConfig::new("{param}");
    source.params = params.to_string();
    source.show_params = show_params;
    source
}

fn id_driver(shards: &[(&str, i64)]) -> MockShardDriver {
    shards.iter().fold(MockShardDriver::new(), |driver, (db, id)| {
        driver.with_rows(*db, &[("id", mysql_codes::LONG)], vec![vec![Value::Int(*id)]])
    })
}

#[tokio::test]
async fn test_tagged_federation_payload() {
    let runner = QueryRunner::new(
        source("s1, s2", true),
        Arc::new(id_driver(&[("s1", 1), ("s2", 2)])),
    );

    let (payload, error) = runner.run_query("SELECT id FROM t", None).await;
    assert_eq!(error, None);

    let json: serde_json::Value = serde_json::from_str(&payload).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "columns": [
                {"name": "database", "friendly_name": "database", "type": "string"},
                {"name": "id", "friendly_name": "id", "type": "integer"}
            ],
            "rows": [
                {"database": "s1", "id": 1},
                {"database": "s2", "id": 2}
            ]
        })
    );
}

#[tokio::test]
async fn test_row_count_is_sum_of_shards() {
    let driver = MockShardDriver::new()
        .with_rows(
            "a",
            &[("n", mysql_codes::LONG)],
            (0..3).map(|i| vec![Value::Int(i)]).collect(),
        )
        .with_rows(
            "b",
            &[("n", mysql_codes::LONG)],
            (0..5).map(|i| vec![Value::Int(i)]).collect(),
        );
    let runner = QueryRunner::new(source("a,b", false), Arc::new(driver));

    let outcome = runner
        .run("SELECT n FROM t", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.error, None);
    assert_eq!(outcome.result.row_count(), 8);
}

#[tokio::test]
async fn test_failed_shard_error_string() {
    let driver = id_driver(&[("s1", 1), ("s3", 3)]).with_shard(
        "s2",
        MockShard::QueryError("Unknown column 'idd' in 'field list'".to_string()),
    );
    let runner = QueryRunner::new(source("s1,s2,s3", true), Arc::new(driver));

    let (payload, error) = runner.run_query("SELECT idd FROM t", None).await;

    let result = codec::decode(&payload).unwrap();
    let shards: Vec<&Value> = result.rows.iter().map(|r| &r["database"]).collect();
    assert_eq!(shards, vec![&Value::from("s1"), &Value::from("s3")]);
    assert_eq!(
        error.as_deref(),
        Some("Query error on shard 's2': Unknown column 'idd' in 'field list'")
    );
}

#[tokio::test]
async fn test_templated_database_names() {
    let driver = id_driver(&[("app_eu", 1), ("app_us", 2)]);
    let stats = driver.stats();

    let mut src = ShardSourceConfig::new("app_{param}");
    src.params = "eu,us".to_string();

    let outcome = Federator::new(Arc::new(driver))
        .run(&src, "SELECT id FROM t", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.result.row_count(), 2);
    assert_eq!(
        stats.queries(),
        vec![
            ("app_eu".to_string(), "SELECT id FROM t".to_string()),
            ("app_us".to_string(), "SELECT id FROM t".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_postgres_type_codes() {
    let driver = MockShardDriver::new()
        .with_type_mapper(PgTypeMapper)
        .with_shard(
            "s1",
            MockShard::ResultSets(vec![RawResultSet::with_rows(
                vec![
                    RawColumn::new("id", pg_oids::INT8),
                    RawColumn::new("ok", pg_oids::BOOL),
                    RawColumn::new("at", pg_oids::TIMESTAMPTZ),
                    RawColumn::new("key", pg_oids::UUID),
                    RawColumn::new("doc", 3802),
                ],
                vec![vec![
                    Value::Int(1),
                    Value::Bool(true),
                    Value::Null,
                    Value::from("6f1c0a52-3a55-4a52-9a8f-1f0c8f5e2d11"),
                    Value::from("{}"),
                ]],
            )]),
        );
    let runner = QueryRunner::new(source("s1", false), Arc::new(driver));

    let outcome = runner
        .run("SELECT * FROM t", &CancellationToken::new())
        .await
        .unwrap();

    let types: Vec<CanonicalType> = outcome
        .result
        .columns
        .iter()
        .map(|c| c.column_type)
        .collect();
    assert_eq!(
        types,
        vec![
            CanonicalType::Integer,
            CanonicalType::Boolean,
            CanonicalType::Datetime,
            CanonicalType::String,
            CanonicalType::Unknown,
        ]
    );
}

#[tokio::test]
async fn test_parallel_shards_merge_in_token_order() {
    let driver = id_driver(&[("s1", 1), ("s2", 2), ("s3", 3), ("s4", 4)])
        .with_delay("s1", Duration::from_millis(80))
        .with_delay("s3", Duration::from_millis(40));
    let stats = driver.stats();

    let mut src = source("s1,s2,s3,s4", true);
    src.max_concurrency = 2;

    let outcome = Federator::new(Arc::new(driver))
        .run(&src, "SELECT id FROM t", &CancellationToken::new())
        .await
        .unwrap();

    let expected: Vec<Row> = (1..=4)
        .map(|i| {
            Row::from([
                ("database".to_string(), Value::from(format!("s{i}"))),
                ("id".to_string(), Value::Int(i)),
            ])
        })
        .collect();
    assert_eq!(outcome.result.rows, expected);
    assert_eq!(stats.opened(), 4);
    assert_eq!(stats.closed(), 4);
}

#[tokio::test]
async fn test_cancellation_closes_every_connection() {
    let driver = MockShardDriver::new()
        .with_shard("s1", MockShard::Hang)
        .with_shard("s2", MockShard::Hang);
    let stats = driver.stats();

    let mut src = source("s1,s2", false);
    src.max_concurrency = 2;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        trigger.cancel();
    });

    let outcome = Federator::new(Arc::new(driver))
        .run(&src, "SELECT SLEEP(600)", &cancel)
        .await
        .unwrap();

    assert!(outcome.result.is_empty());
    assert_eq!(outcome.error, Some(FederationError::cancelled("s2")));
    assert_eq!(stats.opened(), 2);
    assert_eq!(stats.closed(), 2);
}

#[tokio::test]
async fn test_no_data_shard_leaves_columns() {
    let driver = MockShardDriver::new()
        .with_rows("s1", &[("id", mysql_codes::LONG)], vec![vec![Value::Int(1)]])
        .with_shard(
            "s2",
            MockShard::ResultSets(vec![RawResultSet::no_description()]),
        );
    let runner = QueryRunner::new(source("s1,s2", false), Arc::new(driver));

    let outcome = runner
        .run("UPDATE t SET x = 1; SELECT id FROM t", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        outcome.result.columns,
        vec![Column::new("id", CanonicalType::Integer)]
    );
    assert_eq!(outcome.result.row_count(), 1);
    assert_eq!(outcome.error, Some(FederationError::no_data("s2")));
}

#[tokio::test]
async fn test_mixed_shard_schemas_survive_round_trip() {
    let day = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    let driver = MockShardDriver::new()
        .with_rows(
            "s1",
            &[("v", mysql_codes::VAR_STRING)],
            vec![vec![Value::from("x")]],
        )
        .with_rows(
            "s2",
            &[("v", mysql_codes::DATE), ("extra", mysql_codes::DATETIME)],
            vec![vec![
                Value::Date(day),
                Value::DateTime(day.and_hms_opt(1, 2, 3).unwrap()),
            ]],
        );

    let outcome = Federator::new(Arc::new(driver))
        .run(&source("s1,s2", false), "SELECT * FROM t", &CancellationToken::new())
        .await
        .unwrap();

    let back = codec::decode(&codec::encode(&outcome.result).unwrap()).unwrap();
    assert_eq!(back, outcome.result);
    assert_eq!(back.rows[1]["v"], Value::from("2024-01-02"));
    assert_eq!(back.rows[1]["extra"], Value::from("2024-01-02T01:02:03"));
}

#[tokio::test]
async fn test_postgres_infinity_reaches_payload() {
    let driver = MockShardDriver::new()
        .with_type_mapper(PgTypeMapper)
        .with_rows(
            "s1",
            &[("f", pg_oids::FLOAT8)],
            vec![vec![Value::Float(f64::INFINITY)], vec![Value::Null]],
        );
    let runner = QueryRunner::new(source("s1", false), Arc::new(driver));

    let (payload, error) = runner.run_query("SELECT f FROM t", None).await;

    assert_eq!(error, None);
    let result = codec::decode(&payload).unwrap();
    assert_eq!(result.rows[0]["f"], Value::Float(f64::INFINITY));
    assert_eq!(result.rows[1]["f"], Value::Null);
}
