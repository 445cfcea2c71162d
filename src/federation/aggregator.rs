//! Result aggregation across shards.
//!
//! Every shard is resolved before any connection is opened. Shards then run
//! with bounded concurrency but are merged strictly in token order, and a
//! failing shard never stops the others.

use super::connection::build_all;
use super::executor::ShardExecutor;
use super::params::{expand, DEFAULT_DELIMITER};
use crate::config::ShardSourceConfig;
use crate::db::{CanonicalType, Column, FederatedResult, Row, ShardDriver, Value};
use crate::error::{FederationError, Result};
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Name of the column holding the shard token when tagging is enabled.
pub const SHARD_COLUMN: &str = "database";

/// Merged result of one federated query.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FederationOutcome {
    /// Rows from every successful shard, in token order.
    pub result: FederatedResult,
    /// The error from the last failing shard, if any.
    pub error: Option<FederationError>,
    /// Number of shards the query was sent to.
    pub shards: usize,
    /// Number of shards that failed.
    pub failed: usize,
}

impl FederationOutcome {
    /// Returns true if some shards failed but the result may still hold rows.
    pub fn is_partial(&self) -> bool {
        self.error.is_some()
    }
}

/// Fans a query out to every shard of a source and merges the results.
pub struct Federator {
    driver: Arc<dyn ShardDriver>,
}

impl Federator {
    pub fn new(driver: Arc<dyn ShardDriver>) -> Self {
        Self { driver }
    }

    /// Runs `query` on every shard of `source`.
    ///
    /// Only configuration problems are returned as `Err`, and those are
    /// detected before any connection is attempted. Per-shard failures are
    /// logged and the last one is carried in the outcome.
    pub async fn run(
        &self,
        source: &ShardSourceConfig,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<FederationOutcome> {
        source.validate()?;
        let tokens = expand(&source.params, DEFAULT_DELIMITER)?;
        let shard_params = build_all(source, &tokens)?;

        info!(
            shards = shard_params.len(),
            concurrency = source.max_concurrency,
            "Running federated query on {}",
            source.display_string()
        );

        let executor = ShardExecutor::new(self.driver.as_ref());
        let executor = &executor;

        // `buffered` yields in submission order regardless of completion order.
        let results: Vec<(String, Result<FederatedResult>)> = stream::iter(shard_params.iter())
            .map(|params| async move {
                let result = executor.execute(params, query, cancel).await;
                (params.shard.clone(), result)
            })
            .buffered(source.max_concurrency.max(1))
            .collect()
            .await;

        let mut merger = ResultMerger::new(source.show_params);
        for (shard, result) in results {
            merger.absorb(&shard, result);
        }
        let outcome = merger.finish();

        info!(
            shards = outcome.shards,
            failed = outcome.failed,
            rows = outcome.result.row_count(),
            "Federated query finished"
        );

        Ok(outcome)
    }
}

/// Accumulates shard results in token order.
struct ResultMerger {
    tag_rows: bool,
    columns: Option<Vec<Column>>,
    rows: Vec<Row>,
    last_error: Option<FederationError>,
    shards: usize,
    failed: usize,
}

impl ResultMerger {
    fn new(tag_rows: bool) -> Self {
        Self {
            tag_rows,
            columns: None,
            rows: Vec::new(),
            last_error: None,
            shards: 0,
            failed: 0,
        }
    }

    /// Folds one shard's outcome into the merged result.
    ///
    /// Row values are conformed to the declared column types so the merged
    /// result survives an encode/decode round trip when shard schemas differ.
    /// Keys with no declared column are conformed as `Unknown`.
    fn absorb(&mut self, shard: &str, result: Result<FederatedResult>) {
        self.shards += 1;

        match result {
            Ok(shard_result) => {
                debug!(shard, rows = shard_result.row_count(), "Shard succeeded");

                if self.columns.is_none() {
                    self.columns = Some(self.base_columns(shard_result.columns));
                }

                let types: HashMap<&str, CanonicalType> = self
                    .columns
                    .iter()
                    .flatten()
                    .map(|c| (c.name.as_str(), c.column_type))
                    .collect();
                let tag_rows = self.tag_rows;
                let tag = Value::String(shard.to_string());

                self.rows.extend(shard_result.rows.into_iter().map(|row| {
                    let mut row: Row = row
                        .into_iter()
                        .map(|(key, value)| {
                            let ty = types.get(key.as_str()).copied().unwrap_or_default();
                            (key, value.conform(ty))
                        })
                        .collect();
                    if tag_rows {
                        row.insert(SHARD_COLUMN.to_string(), tag.clone());
                    }
                    row
                }));
            }
            Err(e) => {
                warn!(shard, category = e.category(), "{}", e);
                self.failed += 1;
                self.last_error = Some(e);
            }
        }
    }

    /// The first successful shard's columns, with the tag column prepended.
    ///
    /// A shard column already named like the tag column is dropped so the
    /// tag appears exactly once.
    fn base_columns(&self, columns: Vec<Column>) -> Vec<Column> {
        if !self.tag_rows {
            return columns;
        }

        std::iter::once(Column::new(SHARD_COLUMN, CanonicalType::String))
            .chain(columns.into_iter().filter(|c| c.name != SHARD_COLUMN))
            .collect()
    }

    fn finish(self) -> FederationOutcome {
        FederationOutcome {
            result: FederatedResult::with_data(self.columns.unwrap_or_default(), self.rows),
            error: self.last_error,
            shards: self.shards,
            failed: self.failed,
        }
    }
}
