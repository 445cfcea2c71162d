//! MySQL shard driver.
//!
//! Provides `MySqlDriver`, which opens one unpooled sqlx connection per shard.
//! Queries go over the text protocol so a multi-statement query (or a stored
//! procedure call) yields one result set per statement.
//!
//! # Limitations
//!
//! sqlx reports no column metadata for a statement that returns zero rows.
//! Inside a multi-statement query such a statement is indistinguishable from
//! one with no result set, so a trailing empty `SELECT` does not supersede
//! an earlier statement's rows: the earlier result set is returned. A
//! single-statement query that returns zero rows recovers its columns through
//! `describe` and yields an empty result set.

use crate::config::ConnectionParams;
use crate::db::type_map::mysql_codes;
use crate::db::{
    split_statements, DriverError, MySqlTypeMapper, RawColumn, RawResultSet, ShardConnection,
    ShardDriver, TypeMapper, Value,
};
use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlRow, MySqlSslMode};
use sqlx::{Column, ConnectOptions, Connection, Executor, Row, TypeInfo};
use std::collections::VecDeque;
use tracing::debug;

/// Code used for type names sqlx reports that have no protocol counterpart.
const UNRECOGNISED_TYPE: u32 = u32::MAX;

/// MySQL driver.
///
/// See the module documentation for how zero-row statements inside a
/// multi-statement query are reported.
#[derive(Debug, Default)]
pub struct MySqlDriver {
    mapper: MySqlTypeMapper,
}

impl MySqlDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds sqlx connect options from resolved shard parameters.
    fn connect_options(params: &ConnectionParams) -> MySqlConnectOptions {
        let host = if params.host.is_empty() {
            "localhost"
        } else {
            params.host.as_str()
        };

        let mut options = MySqlConnectOptions::new()
            .host(host)
            .port(params.port)
            .username(&params.user)
            .database(&params.database)
            .charset(&params.charset);

        if !params.password.is_empty() {
            options = options.password(&params.password);
        }

        match &params.tls {
            Some(tls) => {
                let mode = if tls.ca_cert.is_some() {
                    MySqlSslMode::VerifyCa
                } else {
                    MySqlSslMode::Required
                };
                options = options.ssl_mode(mode);
                if let Some(ca) = &tls.ca_cert {
                    options = options.ssl_ca(ca);
                }
                if let Some(cert) = &tls.client_cert {
                    options = options.ssl_client_cert(cert);
                }
                if let Some(key) = &tls.client_key {
                    options = options.ssl_client_key(key);
                }
            }
            None => options = options.ssl_mode(MySqlSslMode::Disabled),
        }

        options
    }
}

#[async_trait]
impl ShardDriver for MySqlDriver {
    fn type_mapper(&self) -> &dyn TypeMapper {
        &self.mapper
    }

    async fn connect(
        &self,
        params: &ConnectionParams,
    ) -> Result<Box<dyn ShardConnection>, DriverError> {
        let conn = Self::connect_options(params).connect().await?;
        debug!(shard = %params.shard, "Connected to {}:{}", params.host, params.port);

        Ok(Box::new(MySqlShardConnection {
            conn: Some(conn),
            pending: VecDeque::new(),
        }))
    }
}

/// One open MySQL connection.
struct MySqlShardConnection {
    conn: Option<MySqlConnection>,
    pending: VecDeque<RawResultSet>,
}

#[async_trait]
impl ShardConnection for MySqlShardConnection {
    async fn execute(&mut self, query: &str) -> Result<(), DriverError> {
        let conn = self
            .conn
            .as_mut()
            .ok_or_else(|| DriverError::new("connection is closed"))?;

        let items: Vec<_> = (&mut *conn).fetch_many(query).try_collect().await?;

        let mut sets: VecDeque<RawResultSet> = split_statements(items)
            .iter()
            .map(|rows| to_result_set(rows))
            .collect();

        // Zero-row statements carry no column metadata; recover it for
        // single-statement queries.
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
async fn describe_columns(conn: &mut MySqlConnection, query: &str) -> Option<Vec<RawColumn>> {
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
fn to_result_set(rows: &[MySqlRow]) -> RawResultSet {
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

/// Translates a sqlx MySQL type name to the protocol field type code.
pub(crate) fn native_type_code(type_name: &str) -> u32 {
    use mysql_codes::*;

    let base = type_name.trim_end_matches(" UNSIGNED");
    match base.to_uppercase().as_str() {
        "NULL" => NULL,
        "BOOLEAN" | "TINYINT" => TINY,
        "SMALLINT" => SHORT,
        "INT" => LONG,
        "MEDIUMINT" => INT24,
        "BIGINT" => LONGLONG,
        "FLOAT" => FLOAT,
        "DOUBLE" => DOUBLE,
        "DECIMAL" => NEWDECIMAL,
        "DATE" => DATE,
        "TIME" => TIME,
        "DATETIME" => DATETIME,
        "TIMESTAMP" => TIMESTAMP,
        "YEAR" => YEAR,
        "BIT" => BIT,
        "ENUM" => ENUM,
        "SET" => SET,
        "JSON" => JSON,
        "GEOMETRY" => GEOMETRY,
        "CHAR" | "BINARY" => STRING,
        "VARCHAR" | "VARBINARY" => VAR_STRING,
        "TINYTEXT" | "TEXT" | "MEDIUMTEXT" | "LONGTEXT" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB"
        | "LONGBLOB" => BLOB,
        _ => UNRECOGNISED_TYPE,
    }
}

/// Converts a single column value from a MySqlRow to our Value type.
fn convert_value(row: &MySqlRow, index: usize, type_code: u32) -> Value {
    use mysql_codes::*;

    match type_code {
        TINY | SHORT | LONG | LONGLONG | INT24 | YEAR | BIT => decode_integer(row, index),

        FLOAT | DOUBLE => row
            .try_get::<Option<f64>, _>(index)
            .map(Value::from)
            .or_else(|_| row.try_get::<Option<f32>, _>(index).map(|v| v.map(f64::from).into()))
            .unwrap_or_else(|_| decode_text(row, index)),

        DECIMAL | NEWDECIMAL => match row.try_get_unchecked::<Option<String>, _>(index) {
            Ok(Some(s)) => s.parse::<f64>().map(Value::Float).unwrap_or(Value::String(s)),
            Ok(None) | Err(_) => Value::Null,
        },

        DATE => row
            .try_get::<Option<chrono::NaiveDate>, _>(index)
            .map(Value::from)
            .unwrap_or_else(|_| decode_text(row, index)),

        DATETIME | TIMESTAMP => row
            .try_get::<Option<chrono::NaiveDateTime>, _>(index)
            .map(Value::from)
            .or_else(|_| {
                row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(index)
                    .map(|v| v.map(|dt| dt.naive_utc()).into())
            })
            .unwrap_or_else(|_| decode_text(row, index)),

        TIME => row
            .try_get::<Option<chrono::NaiveTime>, _>(index)
            .map(|v| v.map(|t| t.format("%H:%M:%S").to_string()).into())
            .unwrap_or_else(|_| decode_text(row, index)),

        _ => decode_text(row, index),
    }
}

fn decode_integer(row: &MySqlRow, index: usize) -> Value {
    if let Ok(v) = row.try_get::<Option<i64>, _>(index) {
        return v.into();
    }
    if let Ok(v) = row.try_get::<Option<u64>, _>(index) {
        return match v {
            Some(u) => i64::try_from(u)
                .map(Value::Int)
                .unwrap_or(Value::Float(u as f64)),
            None => Value::Null,
        };
    }
    if let Ok(v) = row.try_get::<Option<bool>, _>(index) {
        return v.map(|b| Value::Int(b as i64)).unwrap_or(Value::Null);
    }
    decode_text(row, index)
}

/// Fallback: read the value as text, or as lossy UTF-8 from raw bytes.
fn decode_text(row: &MySqlRow, index: usize) -> Value {
    if let Ok(v) = row.try_get::<Option<String>, _>(index) {
        return v.into();
    }
    row.try_get_unchecked::<Option<Vec<u8>>, _>(index)
        .ok()
        .flatten()
        .map(|bytes| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        .unwrap_or(Value::Null)
}
