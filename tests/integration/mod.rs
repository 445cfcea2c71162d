//! Integration tests for shardquery.
//!
//! Live database tests require SHARDQUERY_MYSQL_HOST (and optionally
//! SHARDQUERY_MYSQL_PORT, SHARDQUERY_MYSQL_USER, SHARDQUERY_MYSQL_PASSWORD).

pub mod codec_test;
pub mod config_test;
pub mod federation_test;
pub mod mysql_test;
