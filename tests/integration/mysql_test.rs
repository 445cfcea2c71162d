//! Live MySQL integration tests.
//!
//! Every shard points at the same server and database, so these check the
//! driver and federation plumbing rather than real sharding.

use db_shardquery::config::ShardSourceConfig;
use db_shardquery::db::{CanonicalType, DatabaseBackend, Value};
use db_shardquery::error::FederationError;
use db_shardquery::QueryRunner;
use tokio_util::sync::CancellationToken;

/// Helper to build a source from SHARDQUERY_MYSQL_* variables.
fn get_test_source(params: &str) -> Option<ShardSourceConfig> {
    let host = std::env::var("SHARDQUERY_MYSQL_HOST").ok()?;

    let mut source = ShardSourceConfig::new(
        std::env::var("SHARDQUERY_MYSQL_DB").unwrap_or_else(|_| "mysql".to_string()),
    );
    source.backend = DatabaseBackend::Mysql;
    source.params = params.to_string();
    source.host = host;
    source.port = std::env::var("SHARDQUERY_MYSQL_PORT").ok();
    source.user = std::env::var("SHARDQUERY_MYSQL_USER").unwrap_or_else(|_| "root".to_string());
    source.passwd = std::env::var("SHARDQUERY_MYSQL_PASSWORD").ok();
    source.connect_timeout_secs = 5;
    Some(source)
}

#[tokio::test]
async fn test_select_across_shards() {
    let Some(mut source) = get_test_source("a, b") else {
        eprintln!("Skipping test: SHARDQUERY_MYSQL_HOST not set");
        return;
    };
    source.show_params = true;

    let outcome = QueryRunner::from_source(source)
        .run(
            "SELECT 1 AS n, 'x' AS s, DATE('2024-01-02') AS d",
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.error, None);
    let types: Vec<CanonicalType> = outcome
        .result
        .columns
        .iter()
        .map(|c| c.column_type)
        .collect();
    assert_eq!(
        types,
        vec![
            CanonicalType::String,
            CanonicalType::Integer,
            CanonicalType::String,
            CanonicalType::Date,
        ]
    );
    assert_eq!(outcome.result.row_count(), 2);
    assert_eq!(outcome.result.rows[1]["database"], Value::from("b"));
    assert_eq!(outcome.result.rows[0]["n"], Value::Int(1));
}

#[tokio::test]
async fn test_multi_statement_keeps_last_result_set() {
    let Some(source) = get_test_source("a") else {
        eprintln!("Skipping test: SHARDQUERY_MYSQL_HOST not set");
        return;
    };

    let outcome = QueryRunner::from_source(source)
        .run("SELECT 1 AS first; SELECT 2 AS second", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.error, None);
    assert_eq!(outcome.result.columns[0].name, "second");
    assert_eq!(outcome.result.rows[0]["second"], Value::Int(2));
}

#[tokio::test]
async fn test_statement_without_result_set_is_no_data() {
    let Some(source) = get_test_source("a") else {
        eprintln!("Skipping test: SHARDQUERY_MYSQL_HOST not set");
        return;
    };

    let outcome = QueryRunner::from_source(source)
        .run("DO 1", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.error, Some(FederationError::no_data("a")));
}

#[tokio::test]
async fn test_syntax_error_is_shard_query_error() {
    let Some(source) = get_test_source("a") else {
        eprintln!("Skipping test: SHARDQUERY_MYSQL_HOST not set");
        return;
    };

    let outcome = QueryRunner::from_source(source)
        .run("SELEC 1", &CancellationToken::new())
        .await
        .unwrap();

    assert!(matches!(
        outcome.error,
        Some(FederationError::ShardQuery { .. })
    ));
}

#[tokio::test(flavor = "current_thread")]
async fn test_connect_refused_is_connection_error() {
    let mut source = ShardSourceConfig::new("app_{param}");
    source.params = "a".to_string();
    source.host = "127.0.0.1".to_string();
    source.port = Some("1".to_string());
    source.connect_timeout_secs = 5;

    let (payload, error) = QueryRunner::from_source(source)
        .run_query("SELECT 1", None)
        .await;

    assert_eq!(payload, r#"{"columns":[],"rows":[]}"#);
    assert!(error.unwrap().starts_with("Connection error on shard 'a'"));
}

#[tokio::test]
async fn test_trailing_empty_select_keeps_earlier_rows() {
    let Some(source) = get_test_source("a") else {
        eprintln!("Skipping test: SHARDQUERY_MYSQL_HOST not set");
        return;
    };

    // The empty trailing set carries no column metadata, so the first set wins.
    let outcome = QueryRunner::from_source(source)
        .run(
            "SELECT 1 AS first; SELECT 2 AS second FROM DUAL WHERE 1 = 0",
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.error, None);
    assert_eq!(outcome.result.columns[0].name, "first");
    assert_eq!(outcome.result.rows[0]["first"], Value::Int(1));
}
