//! shardquery - run one SQL query across every shard of a database.
//!
//! A source names a list of shard parameters and a connection template. The
//! query is sent to each shard and the results are merged into one table.

pub mod cli;
pub mod codec;
pub mod config;
pub mod db;
pub mod error;
pub mod federation;
pub mod logging;
pub mod output;
pub mod runner;

pub use runner::QueryRunner;
