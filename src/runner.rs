//! Query invocation for one configured source.
//!
//! `run_query` is the outward-facing entry point: it never fails, always
//! returns a serialized result (possibly empty) and at most one error string.

use crate::codec;
use crate::config::ShardSourceConfig;
use crate::db::{driver_for, FederatedResult, ShardDriver};
use crate::error::Result;
use crate::federation::{FederationOutcome, Federator};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// Serialized form of an empty result, used when encoding itself fails.
const EMPTY_PAYLOAD: &str = r#"{"columns":[],"rows":[]}"#;

/// Runs queries against every shard of one source.
pub struct QueryRunner {
    source: ShardSourceConfig,
    federator: Federator,
}

impl QueryRunner {
    /// Creates a runner with an explicit driver.
    pub fn new(source: ShardSourceConfig, driver: Arc<dyn ShardDriver>) -> Self {
        Self {
            source,
            federator: Federator::new(driver),
        }
    }

    /// Creates a runner using the driver for the source's backend.
    pub fn from_source(source: ShardSourceConfig) -> Self {
        let driver = driver_for(source.backend);
        Self::new(source, driver)
    }

    /// Returns the source this runner queries.
    pub fn source(&self) -> &ShardSourceConfig {
        &self.source
    }

    /// Runs a query and returns the structured outcome.
    pub async fn run(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<FederationOutcome> {
        self.federator.run(&self.source, query, cancel).await
    }

    /// Runs a query and returns `(serialized_result, error)`.
    pub async fn run_query(&self, query: &str, user: Option<&str>) -> (String, Option<String>) {
        self.run_query_with_cancel(query, user, &CancellationToken::new())
            .await
    }

    /// Like [`run_query`](Self::run_query), interruptible through `cancel`.
    pub async fn run_query_with_cancel(
        &self,
        query: &str,
        user: Option<&str>,
        cancel: &CancellationToken,
    ) -> (String, Option<String>) {
        debug!(user = user.unwrap_or("-"), "Federated query requested");

        match self.run(query, cancel).await {
            Ok(outcome) => {
                let (payload, encode_error) = serialize(&outcome.result);
                let error = outcome.error.map(|e| e.to_string()).or(encode_error);
                (payload, error)
            }
            Err(e) => {
                error!("{}: {}", e.category(), e);
                let (payload, _) = serialize(&FederatedResult::new());
                (payload, Some(e.to_string()))
            }
        }
    }
}

fn serialize(result: &FederatedResult) -> (String, Option<String>) {
    match codec::encode(result) {
        Ok(payload) => (payload, None),
        Err(e) => {
            error!("Failed to encode result: {}", e);
            (EMPTY_PAYLOAD.to_string(), Some(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{mysql_codes, MockShard, MockShardDriver, Value};

    fn source(params: &str) -> ShardSourceConfig {
        let mut source = ShardSourceConfig::new("{param}");
        source.params = params.to_string();
        source
    }

    #[tokio::test]
    async fn test_run_query_success() {
        let driver = MockShardDriver::new().with_rows(
            "s1",
            &[("id", mysql_codes::LONG)],
            vec![vec![Value::Int(1)]],
        );
        let runner = QueryRunner::new(source("s1"), Arc::new(driver));

        let (payload, error) = runner.run_query("SELECT id FROM t", Some("alice")).await;

        assert_eq!(error, None);
        let decoded = codec::decode(&payload).unwrap();
        assert_eq!(decoded.row_count(), 1);
        assert_eq!(decoded.rows[0]["id"], Value::Int(1));
    }

    #[tokio::test]
    async fn test_run_query_partial_failure() {
        let driver = MockShardDriver::new()
            .with_rows("s1", &[("id", mysql_codes::LONG)], vec![vec![Value::Int(1)]])
            .with_shard("s2", MockShard::ConnectError("Unknown host".to_string()));
        let runner = QueryRunner::new(source("s1,s2"), Arc::new(driver));

        let (payload, error) = runner.run_query("SELECT id FROM t", None).await;

        assert_eq!(codec::decode(&payload).unwrap().row_count(), 1);
        assert_eq!(
            error.as_deref(),
            Some("Connection error on shard 's2': Unknown host")
        );
    }

    #[tokio::test]
    async fn test_run_query_config_error_returns_empty_result() {
        let runner = QueryRunner::new(source(""), Arc::new(MockShardDriver::new()));

        let (payload, error) = runner.run_query("SELECT 1", None).await;

        assert_eq!(payload, EMPTY_PAYLOAD);
        assert!(error.unwrap().starts_with("Configuration error"));
    }

    #[tokio::test]
    async fn test_run_query_with_cancel() {
        let driver = MockShardDriver::new().with_shard("s1", MockShard::Hang);
        let runner = QueryRunner::new(source("s1"), Arc::new(driver));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let (payload, error) = runner
            .run_query_with_cancel("SELECT SLEEP(10)", None, &cancel)
            .await;

        assert_eq!(payload, EMPTY_PAYLOAD);
        assert_eq!(
            error.as_deref(),
            Some("Query cancelled by user on shard 's1'.")
        );
    }

    #[test]
    fn test_empty_payload_matches_encoder() {
        assert_eq!(codec::encode(&FederatedResult::new()).unwrap(), EMPTY_PAYLOAD);
    }
}
