//! Command-line argument parsing for shardquery.
//!
//! Uses clap to parse CLI arguments and resolves the source to query with
//! precedence: command-line options, then the named or default source from the
//! config file, then environment variables.

use crate::config::{Config, ShardSourceConfig, SourceOverrides};
use crate::db::DatabaseBackend;
use crate::error::{FederationError, Result};
use crate::output::OutputFormat;
use clap::Parser;
use std::io::Read;
use std::path::PathBuf;

/// Run one SQL query on every shard of a database and merge the results.
#[derive(Parser, Debug)]
#[command(name = "shardquery")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// SQL query to run on every shard
    #[arg(value_name = "QUERY")]
    pub query: Option<String>,

    /// Read the query from a file (use "-" for stdin)
    #[arg(short = 'f', long, value_name = "PATH", conflicts_with = "query")]
    pub file: Option<String>,

    /// Use named source from config
    #[arg(short = 's', long, value_name = "NAME")]
    pub source: Option<String>,

    /// Config file path
    #[arg(long, value_name = "PATH", env = "SHARDQUERY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Comma-separated shard parameters (e.g., "eu1, eu2, us1")
    #[arg(long, value_name = "LIST")]
    pub params: Option<String>,

    /// Add a "database" column holding each row's shard parameter
    #[arg(long)]
    pub show_params: bool,

    /// Database host; may contain {param}
    #[arg(short = 'H', long, value_name = "HOST")]
    pub host: Option<String>,

    /// Database port; may contain {param}
    #[arg(short = 'P', long, value_name = "PORT")]
    pub port: Option<String>,

    /// Database name; may contain {param}
    #[arg(short = 'd', long, value_name = "DATABASE")]
    pub db: Option<String>,

    /// Database user; may contain {param}
    #[arg(short = 'U', long, value_name = "USER")]
    pub user: Option<String>,

    /// Database backend (mysql or postgres)
    #[arg(long, value_name = "BACKEND")]
    pub backend: Option<String>,

    /// Number of shards queried at the same time
    #[arg(long, value_name = "N")]
    pub concurrency: Option<usize>,

    /// Output format (table or json)
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    pub format: String,

    /// Write logs to the state directory instead of stderr
    #[arg(long)]
    pub log_file: bool,
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns the config file path to use.
    ///
    /// Uses the --config argument if provided, otherwise the default path.
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(Config::default_path)
    }

    /// Returns the named source to use, if specified.
    pub fn source_name(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Parses the output format from the --format argument.
    pub fn parse_output_format(&self) -> std::result::Result<OutputFormat, String> {
        self.format.parse()
    }

    /// Collects the source fields given on the command line.
    pub fn to_overrides(&self) -> Result<SourceOverrides> {
        let backend = self
            .backend
            .as_deref()
            .map(str::parse::<DatabaseBackend>)
            .transpose()
            .map_err(FederationError::config)?;

        Ok(SourceOverrides {
            backend,
            params: self.params.clone(),
            show_params: self.show_params,
            host: self.host.clone(),
            db: self.db.clone(),
            port: self.port.clone(),
            user: self.user.clone(),
            max_concurrency: self.concurrency,
        })
    }

    /// Resolves the final source from CLI args, config file, and environment.
    pub fn resolve_source(&self, config: &Config) -> Result<ShardSourceConfig> {
        let overrides = self.to_overrides()?;

        let mut source = match self.source_name() {
            Some(name) => config.get_source(Some(name)).cloned().ok_or_else(|| {
                FederationError::config(format!("Source '{name}' not found in config file"))
            })?,
            None => match config.get_source(None) {
                Some(source) => source.clone(),
                None if overrides.defines_source() => ShardSourceConfig::new(String::new()),
                None => {
                    return Err(FederationError::config(
                        "No source configured. Pass --db or add [sources.default] to the config file",
                    ))
                }
            },
        };

        source.merge(&overrides);
        source.apply_env_defaults();
        Ok(source)
    }

    /// Returns the query text from the argument, a file, or stdin.
    pub fn read_query(&self) -> Result<String> {
        let query = match (&self.query, self.file.as_deref()) {
            (Some(query), _) => query.clone(),
            (None, Some("-")) => {
                let mut buf = String::new();
                std::io::stdin()
                    .read_to_string(&mut buf)
                    .map_err(|e| FederationError::config(format!("Failed to read stdin: {e}")))?;
                buf
            }
            (None, Some(path)) => std::fs::read_to_string(path).map_err(|e| {
                FederationError::config(format!("Failed to read query file '{path}': {e}"))
            })?,
            (None, None) => {
                return Err(FederationError::config(
                    "No query given. Pass it as an argument or with --file",
                ))
            }
        };

        if query.trim().is_empty() {
            return Err(FederationError::config("Query is empty"));
        }
        Ok(query)
    }
}
