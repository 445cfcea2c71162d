//! Error types for shardquery.
//!
//! Defines the main error enum used throughout the federation engine. Shard-local
//! variants carry the shard token that produced them.

use thiserror::Error;

/// Main error type for federation operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FederationError {
    /// Configuration errors (empty shard list, unparseable port, missing database).
    /// Always fatal: raised before any connection is attempted.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A shard could not be reached or refused authentication.
    #[error("Connection error on shard '{shard}': {message}")]
    Connection { shard: String, message: String },

    /// The driver rejected the query on one shard.
    #[error("Query error on shard '{shard}': {message}")]
    ShardQuery { shard: String, message: String },

    /// The shard executed the query but returned no result set.
    #[error("No data was returned from shard '{shard}'.")]
    NoData { shard: String },

    /// Execution on the shard was interrupted from outside.
    #[error("Query cancelled by user on shard '{shard}'.")]
    Cancelled { shard: String },

    /// Encoding or decoding of the result payload failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl FederationError {
    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a connection error for a shard.
    pub fn connection(shard: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Connection {
            shard: shard.into(),
            message: msg.into(),
        }
    }

    /// Creates a query error for a shard.
    pub fn shard_query(shard: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::ShardQuery {
            shard: shard.into(),
            message: msg.into(),
        }
    }

    /// Creates a no-data error for a shard.
    pub fn no_data(shard: impl Into<String>) -> Self {
        Self::NoData {
            shard: shard.into(),
        }
    }

    /// Creates a cancellation error for a shard.
    pub fn cancelled(shard: impl Into<String>) -> Self {
        Self::Cancelled {
            shard: shard.into(),
        }
    }

    /// Creates a serialization error with the given message.
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) => "Configuration Error",
            Self::Connection { .. } => "Connection Error",
            Self::ShardQuery { .. } => "Query Error",
            Self::NoData { .. } => "No Data",
            Self::Cancelled { .. } => "Cancelled",
            Self::Serialization(_) => "Serialization Error",
        }
    }

    /// Returns the shard token this error belongs to, if it is shard-local.
    pub fn shard(&self) -> Option<&str> {
        match self {
            Self::Connection { shard, .. }
            | Self::ShardQuery { shard, .. }
            | Self::NoData { shard }
            | Self::Cancelled { shard } => Some(shard),
            Self::Config(_) | Self::Serialization(_) => None,
        }
    }
}

impl From<serde_json::Error> for FederationError {
    fn from(e: serde_json::Error) -> Self {
        Self::serialization(e.to_string())
    }
}

/// Result type alias using FederationError.
pub type Result<T> = std::result::Result<T, FederationError>;
