//! Database driver layer for shardquery.
//!
//! The federation engine needs only a narrow capability set from a driver:
//! open a connection, run a query and walk its result sets, close the
//! connection, and translate native type codes. Backends implement
//! `ShardDriver` / `ShardConnection`; `driver_for` picks one from config.

mod mock;
mod mysql;
mod postgres;
mod type_map;
mod types;

pub use mock::{MockConnectionStats, MockShard, MockShardDriver};
pub use mysql::MySqlDriver;
pub use postgres::PostgresDriver;
pub use type_map::{mysql_codes, pg_oids, MySqlTypeMapper, PgTypeMapper, TypeMapper};
pub use types::{CanonicalType, Column, FederatedResult, Row, Value, DATETIME_FORMAT, DATE_FORMAT};

use crate::config::ConnectionParams;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Supported database backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    #[default]
    Mysql,
    Postgres,
}

impl DatabaseBackend {
    /// Returns the backend as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mysql => "mysql",
            Self::Postgres => "postgres",
        }
    }

    /// Parses a backend from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "mysql" | "mariadb" => Some(Self::Mysql),
            "postgres" | "postgresql" => Some(Self::Postgres),
            _ => None,
        }
    }

    /// Returns the default port for this backend.
    pub fn default_port(&self) -> u16 {
        match self {
            Self::Mysql => 3306,
            Self::Postgres => 5432,
        }
    }

    /// Environment variable the backend's own client reads the password from.
    pub fn password_env_var(&self) -> &'static str {
        match self {
            Self::Mysql => "MYSQL_PWD",
            Self::Postgres => "PGPASSWORD",
        }
    }
}

impl std::str::FromStr for DatabaseBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("Unknown backend: {s}. Expected: mysql or postgres"))
    }
}

/// Creates the driver for the given backend.
pub fn driver_for(backend: DatabaseBackend) -> Arc<dyn ShardDriver> {
    match backend {
        DatabaseBackend::Mysql => Arc::new(MySqlDriver::new()),
        DatabaseBackend::Postgres => Arc::new(PostgresDriver::new()),
    }
}

/// Error reported by a driver. Carries the server's message only; the
/// executor attaches the shard token.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct DriverError {
    pub message: String,
}

impl DriverError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<sqlx::Error> for DriverError {
    fn from(e: sqlx::Error) -> Self {
        match e.as_database_error() {
            Some(db_error) => Self::new(db_error.message()),
            None => Self::new(e.to_string()),
        }
    }
}

/// Column metadata as reported by the driver.
#[derive(Debug, Clone, PartialEq)]
pub struct RawColumn {
    /// Column name (may repeat within a result set).
    pub name: String,

    /// Native type code in the driver's namespace.
    pub type_code: u32,
}

impl RawColumn {
    pub fn new(name: impl Into<String>, type_code: u32) -> Self {
        Self {
            name: name.into(),
            type_code,
        }
    }
}

/// One result set produced by one statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawResultSet {
    /// Column description; `None` for statements that produce no rows
    /// (INSERT, SET, ...).
    pub description: Option<Vec<RawColumn>>,

    /// Row tuples in description order.
    pub rows: Vec<Vec<Value>>,
}

impl RawResultSet {
    /// A result set with a description.
    pub fn with_rows(description: Vec<RawColumn>, rows: Vec<Vec<Value>>) -> Self {
        Self {
            description: Some(description),
            rows,
        }
    }

    /// A result set without a description.
    pub fn no_description() -> Self {
        Self::default()
    }
}

/// A database driver able to open shard connections.
#[async_trait]
pub trait ShardDriver: Send + Sync {
    /// Type mapper for this driver's native codes.
    fn type_mapper(&self) -> &dyn TypeMapper;

    /// Opens a fresh connection. Connections are never pooled.
    async fn connect(
        &self,
        params: &ConnectionParams,
    ) -> std::result::Result<Box<dyn ShardConnection>, DriverError>;
}

/// An open connection to one shard.
#[async_trait]
pub trait ShardConnection: Send {
    /// Submits the query unchanged.
    async fn execute(&mut self, query: &str) -> std::result::Result<(), DriverError>;

    /// Advances to the next result set of the last executed query.
    /// Returns `None` once all result sets are consumed.
    async fn next_result_set(&mut self) -> std::result::Result<Option<RawResultSet>, DriverError>;

    /// Closes the connection. Calling it twice is a no-op.
    async fn close(&mut self) -> std::result::Result<(), DriverError>;
}

/// Splits a sqlx `fetch_many` stream into per-statement row groups.
///
/// Every statement ends with a `Left` query result; rows before it belong to
/// that statement.
pub(crate) fn split_statements<Q, R>(items: Vec<sqlx::Either<Q, R>>) -> Vec<Vec<R>> {
    let mut statements = Vec::new();
    let mut current = Vec::new();

    for item in items {
        match item {
            sqlx::Either::Left(_) => statements.push(std::mem::take(&mut current)),
            sqlx::Either::Right(row) => current.push(row),
        }
    }

    if !current.is_empty() {
        statements.push(current);
    }

    statements
}
