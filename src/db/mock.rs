//! Mock shard driver for testing.
//!
//! Provides an in-memory driver whose shards are scripted by database name.
//! It counts opened and closed connections so tests can check that every
//! connection is released.

use super::{
    DriverError, MySqlTypeMapper, RawColumn, RawResultSet, ShardConnection, ShardDriver,
    TypeMapper, Value,
};
use crate::config::ConnectionParams;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Scripted behaviour of one mock shard.
#[derive(Debug, Clone)]
pub enum MockShard {
    /// Query succeeds and yields these result sets in order.
    ResultSets(Vec<RawResultSet>),
    /// Connecting fails with this message.
    ConnectError(String),
    /// Connecting succeeds, the query fails with this message.
    QueryError(String),
    /// The query never completes.
    Hang,
}

/// Connection counters shared between a driver and its connections.
#[derive(Debug, Default)]
pub struct MockConnectionStats {
    connects: AtomicUsize,
    opened: AtomicUsize,
    closed: AtomicUsize,
    queries: std::sync::Mutex<Vec<(String, String)>>,
}

impl MockConnectionStats {
    /// Number of connection attempts, successful or not.
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Number of connections opened.
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Number of connections closed.
    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    /// `(database, query)` pairs in submission order.
    pub fn queries(&self) -> Vec<(String, String)> {
        self.queries
            .lock()
            .map(|queries| queries.clone())
            .unwrap_or_default()
    }
}

/// A mock driver that returns predefined results per database name.
pub struct MockShardDriver {
    shards: HashMap<String, MockShard>,
    delays: HashMap<String, Duration>,
    connect_delays: HashMap<String, Duration>,
    stats: Arc<MockConnectionStats>,
    mapper: Box<dyn TypeMapper>,
}

impl MockShardDriver {
    /// Creates a mock driver with no shards, using MySQL type codes.
    pub fn new() -> Self {
        Self {
            shards: HashMap::new(),
            delays: HashMap::new(),
            connect_delays: HashMap::new(),
            stats: Arc::new(MockConnectionStats::default()),
            mapper: Box::new(MySqlTypeMapper),
        }
    }

    /// Uses a different type mapper.
    pub fn with_type_mapper(mut self, mapper: impl TypeMapper + 'static) -> Self {
        self.mapper = Box::new(mapper);
        self
    }

    /// Scripts the shard whose resolved database name is `database`.
    pub fn with_shard(mut self, database: impl Into<String>, shard: MockShard) -> Self {
        self.shards.insert(database.into(), shard);
        self
    }

    /// Scripts a shard returning a single result set.
    pub fn with_rows(
        self,
        database: impl Into<String>,
        columns: &[(&str, u32)],
        rows: Vec<Vec<Value>>,
    ) -> Self {
        let description = columns
            .iter()
            .map(|(name, code)| RawColumn::new(*name, *code))
            .collect();
        self.with_shard(
            database,
            MockShard::ResultSets(vec![RawResultSet::with_rows(description, rows)]),
        )
    }

    /// Delays the query on one shard.
    pub fn with_delay(mut self, database: impl Into<String>, delay: Duration) -> Self {
        self.delays.insert(database.into(), delay);
        self
    }

    /// Delays connecting to one shard.
    pub fn with_connect_delay(mut self, database: impl Into<String>, delay: Duration) -> Self {
        self.connect_delays.insert(database.into(), delay);
        self
    }

    /// Shared connection counters.
    pub fn stats(&self) -> Arc<MockConnectionStats> {
        Arc::clone(&self.stats)
    }
}

impl Default for MockShardDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ShardDriver for MockShardDriver {
    fn type_mapper(&self) -> &dyn TypeMapper {
        self.mapper.as_ref()
    }

    async fn connect(
        &self,
        params: &ConnectionParams,
    ) -> Result<Box<dyn ShardConnection>, DriverError> {
        self.stats.connects.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.connect_delays.get(&params.database) {
            tokio::time::sleep(*delay).await;
        }

        let shard = match self.shards.get(&params.database) {
            Some(MockShard::ConnectError(message)) => return Err(DriverError::new(message)),
            Some(shard) => shard.clone(),
            None => {
                return Err(DriverError::new(format!(
                    "Unknown database '{}'",
                    params.database
                )))
            }
        };

        self.stats.opened.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(MockConnection {
            database: params.database.clone(),
            shard,
            delay: self.delays.get(&params.database).copied(),
            pending: VecDeque::new(),
            stats: Arc::clone(&self.stats),
            open: true,
        }))
    }
}

struct MockConnection {
    database: String,
    shard: MockShard,
    delay: Option<Duration>,
    pending: VecDeque<RawResultSet>,
    stats: Arc<MockConnectionStats>,
    open: bool,
}

#[async_trait]
impl ShardConnection for MockConnection {
    async fn execute(&mut self, query: &str) -> Result<(), DriverError> {
        if let Ok(mut queries) = self.stats.queries.lock() {
            queries.push((self.database.clone(), query.to_string()));
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match &self.shard {
            MockShard::ResultSets(sets) => {
                self.pending = sets.iter().cloned().collect();
                Ok(())
            }
            MockShard::QueryError(message) => Err(DriverError::new(message)),
            MockShard::Hang => {
                std::future::pending::<()>().await;
                Ok(())
            }
            MockShard::ConnectError(message) => Err(DriverError::new(message)),
        }
    }

    async fn next_result_set(&mut self) -> Result<Option<RawResultSet>, DriverError> {
        Ok(self.pending.pop_front())
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        if self.open {
            self.open = false;
            self.stats.closed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}
