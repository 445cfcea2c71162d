//! Single-shard query execution.
//!
//! Opens one connection, runs the query, keeps the last result set that has
//! a description, and releases the connection on every exit path.

use crate::config::ConnectionParams;
use crate::db::{
    Column, FederatedResult, RawColumn, Row, ShardConnection, ShardDriver, TypeMapper, Value,
};
use crate::error::{FederationError, Result};
use std::collections::HashSet;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Upper bound on waiting for a connection to shut down.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Executes one query against one shard.
pub struct ShardExecutor<'a> {
    driver: &'a dyn ShardDriver,
}

impl<'a> ShardExecutor<'a> {
    /// Creates a new shard executor.
    pub fn new(driver: &'a dyn ShardDriver) -> Self {
        Self { driver }
    }

    /// Runs `query` on the shard described by `params`.
    ///
    /// Errors are shard-local: connection failures and timeouts become
    /// `Connection`, driver rejections `ShardQuery`, a query without any
    /// described result set `NoData`, and cancellation `Cancelled`.
    pub async fn execute(
        &self,
        params: &ConnectionParams,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<FederatedResult> {
        let shard = params.shard.as_str();

        if cancel.is_cancelled() {
            return Err(FederationError::cancelled(shard));
        }

        debug!(shard, ?params, "Opening shard connection");

        let connected = tokio::select! {
            biased;

            _ = cancel.cancelled() => return Err(FederationError::cancelled(shard)),
            result = tokio::time::timeout(params.connect_timeout, self.driver.connect(params)) => result,
        };

        let mut conn = match connected {
            Ok(Ok(conn)) => conn,
            Ok(Err(e)) => return Err(FederationError::connection(shard, e.message)),
            Err(_) => {
                return Err(FederationError::connection(
                    shard,
                    format!(
                        "Connection timed out after {} seconds",
                        params.connect_timeout.as_secs_f64()
                    ),
                ))
            }
        };

        let outcome = tokio::select! {
            biased;

            _ = cancel.cancelled() => Err(FederationError::cancelled(shard)),
            result = self.run_query(conn.as_mut(), shard, query) => result,
        };

        release(conn.as_mut(), shard).await;
        outcome
    }

    /// Submits the query and drains every result set.
    async fn run_query(
        &self,
        conn: &mut dyn ShardConnection,
        shard: &str,
        query: &str,
    ) -> Result<FederatedResult> {
        debug!(shard, "Running query: {}", query);

        conn.execute(query)
            .await
            .map_err(|e| FederationError::shard_query(shard, e.message))?;

        let mut last: Option<(Vec<RawColumn>, Vec<Vec<Value>>)> = None;
        let mut result_sets = 0usize;

        while let Some(set) = conn
            .next_result_set()
            .await
            .map_err(|e| FederationError::shard_query(shard, e.message))?
        {
            result_sets += 1;
            if let Some(description) = set.description {
                last = Some((description, set.rows));
            }
        }

        let Some((description, rows)) = last else {
            return Err(FederationError::no_data(shard));
        };

        debug!(shard, result_sets, rows = rows.len(), "Drained result sets");
        Ok(normalize(self.driver.type_mapper(), description, rows))
    }
}

/// Closes the connection, logging instead of failing.
async fn release(conn: &mut dyn ShardConnection, shard: &str) {
    match tokio::time::timeout(CLOSE_TIMEOUT, conn.close()).await {
        Ok(Ok(())) => debug!(shard, "Connection closed"),
        Ok(Err(e)) => warn!(shard, "Failed to close connection: {}", e),
        Err(_) => warn!(shard, "Timed out closing connection"),
    }
}

/// Builds canonical columns and keyed rows from a native result set.
///
/// Repeated column names get a running counter appended (`id`, `id1`, ...)
/// so every row key is unique. The counter skips suffixes that would collide
/// with a name already in use.
pub fn normalize(
    mapper: &dyn TypeMapper,
    description: Vec<RawColumn>,
    rows: Vec<Vec<Value>>,
) -> FederatedResult {
    let mut seen = HashSet::new();
    let mut duplicates = 1;

    let columns: Vec<Column> = description
        .into_iter()
        .map(|raw| {
            let mut name = raw.name.clone();
            while seen.contains(&name) {
                name = format!("{}{duplicates}", raw.name);
                duplicates += 1;
            }
            seen.insert(name.clone());
            Column::new(name, mapper.map(raw.type_code))
        })
        .collect();

    let rows = rows
        .into_iter()
        .map(|values| {
            columns
                .iter()
                .map(|c| c.name.clone())
                .zip(values)
                .collect::<Row>()
        })
        .collect();

    FederatedResult::with_data(columns, rows)
}
