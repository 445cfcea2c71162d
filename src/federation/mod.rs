//! Query federation across shards.
//!
//! A source's shard parameter list is expanded into tokens, each token is
//! resolved into connection parameters, the query runs once per shard, and
//! the per-shard results are merged into one `FederatedResult`.

mod aggregator;
mod connection;
mod executor;
mod params;

pub use aggregator::{FederationOutcome, Federator, SHARD_COLUMN};
pub use connection::{build, build_all};
pub use executor::{normalize, ShardExecutor};
pub use params::{expand, DEFAULT_DELIMITER};
