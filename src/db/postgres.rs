//! PostgreSQL shard driver.
//!
//! Provides the `PostgresDriver` struct that implements `ShardDriver` using
//! sqlx. Queries without bind arguments go over the simple query protocol,
//! which accepts several statements and returns one result set each.

use crate::config::ConnectionParams;
use crate::db::type_map::pg_oids;
use crate::db::{
    split_statements, DriverError, PgTypeMapper, RawColumn, RawResultSet, ShardConnection,
    ShardDriver, TypeMapper, Value,
};
use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgRow, PgSslMode};
use sqlx::{Column, ConnectOptions, Connection, Executor, Row, TypeInfo};
use std::collections::VecDeque;
use tracing::debug;

/// OID reported for type names not listed in `native_type_code`.
const UNRECOGNISED_OID: u32 = 0;

/// PostgreSQL driver.
#[derive(Debug, Default)]
pub struct PostgresDriver {
    mapper: PgTypeMapper,
}

impl PostgresDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds sqlx connect options from resolved shard parameters.
    ///
    /// sqlx always negotiates UTF-8 as the client encoding, so the charset
    /// parameter needs no translation here.
    fn connect_options(params: &ConnectionParams) -> PgConnectOptions {
        let host = if params.host.is_empty() {
            "localhost"
        } else {
            params.host.as_str()
        };

        let mut options = PgConnectOptions::new()
            .host(host)
            .port(params.port)
            .username(&params.user)
            .database(&params.database);

        if !params.password.is_empty() {
            options = options.password(&params.password);
        }

        match &params.tls {
            Some(tls) => {
                let mode = if tls.ca_cert.is_some() {
                    PgSslMode::VerifyCa
                } else {
                    PgSslMode::Require
                };
                options = options.ssl_mode(mode);
                if let Some(ca) = &tls.ca_cert {
                    options = options.ssl_root_cert(ca);
                }
                if let Some(cert) = &tls.client_cert {
                    options = options.ssl_client_cert(cert);
                }
                if let Some(key) = &tls.client_key {
                    options = options.ssl_client_key(key);
                }
            }
            None => options = options.ssl_mode(PgSslMode::Disable),
        }

        options
    }
}

#[async_trait]
impl ShardDriver for PostgresDriver {
    fn type_mapper(&self) -> &dyn TypeMapper {
        &self.mapper
    }

    async fn connect(
        &self,
        params: &ConnectionParams,
    ) -> Result<Box<dyn ShardConnection>, DriverError> {
        let conn = Self::connect_options(params)
            .connect()
            .await
            .map_err(|e| map_connection_error(e, params))?;
        debug!(shard = %params.shard, "Connected to {}:{}", params.host, params.port);

        Ok(Box::new(PgShardConnection {
            conn: Some(conn),
            pending: VecDeque::new(),
        }))
    }
}

/// One open PostgreSQL connection.
struct PgShardConnection {
    conn: Option<PgConnection>,
    pending: VecDeque<RawResultSet>,
}

#[async_trait]
impl ShardConnection for PgShardConnection {
    async fn execute(&mut self, query: &str) -> Result<(), DriverError> {
        let conn = self
            .conn
            .as_mut()
            .ok_or_else(|| DriverError::new("connection is closed"))?;

        let items: Vec<_> = (&mut *conn)
            .fetch_many(query)
            .try_collect()
            .await
            .map_err(|e| DriverError::new(format_query_error(e)))?;

        let mut sets: VecDeque<RawResultSet> = split_statements(items)
            .iter()
            .map(|rows| to_result_set(rows))
            .collect();

        if sets.iter().all(|set| set.description.is_none()) {
            if let Some(description) = describe_columns(conn, query).await {
                sets.push_back(RawResultSet::with_rows(description, Vec::new()));
            }
        }

        self.pending = sets;
        Ok(())
    }

    async fn next_result_set(&mut self) -> Result<Option<RawResultSet>, DriverError> {
        Ok(self.pending.pop_front())
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        self.pending.clear();
        if let Some(conn) = self.conn.take() {
            conn.close().await?;
        }
        Ok(())
    }
}

/// Column metadata from a prepared statement, if the server can describe it.
async fn describe_columns(conn: &mut PgConnection, query: &str) -> Option<Vec<RawColumn>> {
    let describe = (&mut *conn).describe(query).await.ok()?;
    let columns: Vec<RawColumn> = describe
        .columns()
        .iter()
        .map(|col| RawColumn::new(col.name(), native_type_code(col.type_info().name())))
        .collect();

    if columns.is_empty() {
        None
    } else {
        Some(columns)
    }
}

/// Converts the rows of one statement into a result set.
fn to_result_set(rows: &[PgRow]) -> RawResultSet {
    let Some(first) = rows.first() else {
        return RawResultSet::no_description();
    };

    let description: Vec<RawColumn> = first
        .columns()
        .iter()
        .map(|col| RawColumn::new(col.name(), native_type_code(col.type_info().name())))
        .collect();

    let rows = rows
        .iter()
        .map(|row| {
            description
                .iter()
                .enumerate()
                .map(|(i, col)| convert_value(row, i, col.type_code))
                .collect()
        })
        .collect();

    RawResultSet::with_rows(description, rows)
}

/// Translates a sqlx PostgreSQL type name to its OID.
pub(crate) fn native_type_code(type_name: &str) -> u32 {
    use pg_oids::*;

    match type_name.to_uppercase().as_str() {
        "BOOL" | "BOOLEAN" => BOOL,
        "\"CHAR\"" => CHAR,
        "NAME" => NAME,
        "INT8" | "BIGINT" => INT8,
        "INT2" | "SMALLINT" => INT2,
        "INT4" | "INT" | "INTEGER" => INT4,
        "TEXT" => TEXT,
        "OID" => OID,
        "FLOAT4" | "REAL" => FLOAT4,
        "FLOAT8" | "DOUBLE PRECISION" => FLOAT8,
        "MONEY" => MONEY,
        "CHAR" | "BPCHAR" => BPCHAR,
        "VARCHAR" => VARCHAR,
        "DATE" => DATE,
        "TIMESTAMP" => TIMESTAMP,
        "TIMESTAMPTZ" => TIMESTAMPTZ,
        "NUMERIC" => NUMERIC,
        "UUID" => UUID,
        _ => UNRECOGNISED_OID,
    }
}

/// Converts a single column value from a PgRow to our Value type.
fn convert_value(row: &PgRow, index: usize, oid: u32) -> Value {
    use pg_oids::*;

    match oid {
        BOOL => row
            .try_get::<Option<bool>, _>(index)
            .map(Value::from)
            .unwrap_or_else(|_| decode_text(row, index)),

        INT2 => row
            .try_get::<Option<i16>, _>(index)
            .map(|v| v.map(|i| Value::Int(i as i64)).unwrap_or(Value::Null))
            .unwrap_or_else(|_| decode_text(row, index)),

        INT4 => row
            .try_get::<Option<i32>, _>(index)
            .map(Value::from)
            .unwrap_or_else(|_| decode_text(row, index)),

        INT8 => row
            .try_get::<Option<i64>, _>(index)
            .map(Value::from)
            .unwrap_or_else(|_| decode_text(row, index)),

        FLOAT4 => row
            .try_get::<Option<f32>, _>(index)
            .map(|v| v.map(f64::from).into())
            .unwrap_or_else(|_| decode_text(row, index)),

        FLOAT8 => row
            .try_get::<Option<f64>, _>(index)
            .map(Value::from)
            .unwrap_or_else(|_| decode_text(row, index)),

        NUMERIC | MONEY => match row.try_get_unchecked::<Option<String>, _>(index) {
            Ok(Some(s)) => parse_number(&s).map(Value::Float).unwrap_or(Value::String(s)),
            Ok(None) | Err(_) => Value::Null,
        },

        OID => match row.try_get_unchecked::<Option<String>, _>(index) {
            Ok(Some(s)) => s.parse::<i64>().map(Value::Int).unwrap_or(Value::String(s)),
            Ok(None) | Err(_) => Value::Null,
        },

        DATE => row
            .try_get::<Option<chrono::NaiveDate>, _>(index)
            .map(Value::from)
            .unwrap_or_else(|_| decode_text(row, index)),

        TIMESTAMP => row
            .try_get::<Option<chrono::NaiveDateTime>, _>(index)
            .map(Value::from)
            .unwrap_or_else(|_| decode_text(row, index)),

        TIMESTAMPTZ => row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(index)
            .map(|v| v.map(|dt| dt.naive_utc()).into())
            .unwrap_or_else(|_| decode_text(row, index)),

        _ => decode_text(row, index),
    }
}

/// Parses a textual number, dropping currency symbols and group separators.
fn parse_number(s: &str) -> Option<f64> {
    let cleaned: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | 'e' | 'E'))
        .collect();
    cleaned.parse::<f64>().ok()
}

/// Fallback: read the value as text.
fn decode_text(row: &PgRow, index: usize) -> Value {
    row.try_get_unchecked::<Option<String>, _>(index)
        .ok()
        .flatten()
        .map(Value::String)
        .unwrap_or(Value::Null)
}

/// Maps sqlx connection errors to user-friendly messages.
fn map_connection_error(error: sqlx::Error, params: &ConnectionParams) -> DriverError {
    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") || error_str.contains("could not connect") {
        DriverError::new(format!(
            "Cannot connect to {}:{}. Check that the server is running.",
            params.host, params.port
        ))
    } else if error_str.contains("password authentication failed")
        || error_str.contains("authentication failed")
    {
        DriverError::new(format!(
            "Authentication failed for user '{}'.",
            params.user
        ))
    } else if error_str.contains("does not exist") && error_str.contains("database") {
        DriverError::new(format!("Database '{}' does not exist.", params.database))
    } else {
        DriverError::from(error)
    }
}

/// Formats a query error with detail and hint if available.
fn format_query_error(error: sqlx::Error) -> String {
    let Some(db_error) = error.as_database_error() else {
        return error.to_string();
    };

    let mut result = db_error.message().to_string();

    if let Some(pg_error) = db_error.try_downcast_ref::<sqlx::postgres::PgDatabaseError>() {
        if let Some(detail) = pg_error.detail() {
            result.push_str("\n  DETAIL: ");
            result.push_str(detail);
        }
        if let Some(hint) = pg_error.hint() {
            result.push_str("\n  HINT: ");
            result.push_str(hint);
        }
    }

    result
}
