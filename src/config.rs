//! Configuration management for shardquery.
//!
//! Handles loading configuration from TOML files and environment variables.
//! A source describes one sharded database: the shard parameter list and a
//! connection template whose fields may contain the `{param}` placeholder.

use crate::db::DatabaseBackend;
use crate::error::{FederationError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Placeholder substituted with each shard token.
pub const PARAM_PLACEHOLDER: &str = "{param}";

/// Character set requested from every shard.
pub const DEFAULT_CHARSET: &str = "utf8";

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Named sharded sources.
    #[serde(default)]
    pub sources: HashMap<String, ShardSourceConfig>,
}

/// Connection template for a sharded source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShardSourceConfig {
    /// Database backend.
    #[serde(default)]
    pub backend: DatabaseBackend,

    /// Comma-separated shard tokens.
    #[serde(default = "default_params")]
    pub params: String,

    /// Tag every row with the shard token it came from.
    #[serde(default)]
    pub show_params: bool,

    /// Host template.
    #[serde(default = "default_host")]
    pub host: String,

    /// Database name template (required).
    pub db: String,

    /// Port template. Defaults to the backend's port.
    #[serde(default)]
    pub port: Option<String>,

    /// User template.
    #[serde(default)]
    pub user: String,

    /// Password template (not recommended to store in config).
    #[serde(default)]
    pub passwd: Option<String>,

    /// Connect over TLS.
    #[serde(default)]
    pub use_ssl: bool,

    /// Path to the CA certificate used to verify the server.
    #[serde(default)]
    pub ssl_cacert: Option<String>,

    /// Path to the client certificate.
    #[serde(default)]
    pub ssl_cert: Option<String>,

    /// Path to the client private key.
    #[serde(default)]
    pub ssl_key: Option<String>,

    /// Per-shard connect timeout.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Number of shards queried at the same time.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

fn default_params() -> String {
    "shard1, shard2, shard3".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    60
}

fn default_max_concurrency() -> usize {
    1
}

impl ShardSourceConfig {
    /// Creates a source with default settings and the given database template.
    pub fn new(db: impl Into<String>) -> Self {
        Self {
            backend: DatabaseBackend::default(),
            params: default_params(),
            show_params: false,
            host: default_host(),
            db: db.into(),
            port: None,
            user: String::new(),
            passwd: None,
            use_ssl: false,
            ssl_cacert: None,
            ssl_cert: None,
            ssl_key: None,
            connect_timeout_secs: default_connect_timeout_secs(),
            max_concurrency: default_max_concurrency(),
        }
    }

    /// Returns the port template, falling back to the backend's default port.
    pub fn port_template(&self) -> String {
        self.port
            .clone()
            .unwrap_or_else(|| self.backend.default_port().to_string())
    }

    /// Returns the connect timeout.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Checks fields that can be verified before any shard is resolved.
    pub fn validate(&self) -> Result<()> {
        if self.db.trim().is_empty() {
            return Err(FederationError::config("Database name (db) is required"));
        }
        if self.max_concurrency == 0 {
            return Err(FederationError::config("max_concurrency must be at least 1"));
        }
        if self.connect_timeout_secs == 0 {
            return Err(FederationError::config(
                "connect_timeout_secs must be at least 1",
            ));
        }
        Ok(())
    }

    /// Applies command-line overrides; set fields take precedence.
    pub fn merge(&mut self, other: &SourceOverrides) {
        if let Some(backend) = other.backend {
            self.backend = backend;
        }
        if let Some(params) = &other.params {
            self.params = params.clone();
        }
        if other.show_params {
            self.show_params = true;
        }
        if let Some(host) = &other.host {
            self.host = host.clone();
        }
        if let Some(db) = &other.db {
            self.db = db.clone();
        }
        if let Some(port) = &other.port {
            self.port = Some(port.clone());
        }
        if let Some(user) = &other.user {
            self.user = user.clone();
        }
        if let Some(concurrency) = other.max_concurrency {
            self.max_concurrency = concurrency;
        }
    }

    /// Falls back to the backend's password environment variable.
    pub fn apply_env_defaults(&mut self) {
        if self.passwd.is_none() {
            self.passwd = std::env::var(self.backend.password_env_var()).ok();
        }
    }

    /// Returns a display-safe string (no password) for log output.
    pub fn display_string(&self) -> String {
        format!(
            "{} {} @ {}:{} [{}]",
            self.backend.as_str(),
            self.db,
            self.host,
            self.port_template(),
            self.params
        )
    }
}

/// Source fields settable from the command line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceOverrides {
    pub backend: Option<DatabaseBackend>,
    pub params: Option<String>,
    pub show_params: bool,
    pub host: Option<String>,
    pub db: Option<String>,
    pub port: Option<String>,
    pub user: Option<String>,
    pub max_concurrency: Option<usize>,
}

impl SourceOverrides {
    /// Returns true if the overrides alone describe a source (a database was given).
    pub fn defines_source(&self) -> bool {
        self.db.is_some()
    }
}

/// TLS material for one connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsParams {
    pub ca_cert: Option<PathBuf>,
    pub client_cert: Option<PathBuf>,
    pub client_key: Option<PathBuf>,
}

/// Concrete, connection-ready parameters for one shard.
#[derive(Clone, PartialEq)]
pub struct ConnectionParams {
    /// Shard token these parameters were resolved for.
    pub shard: String,
    pub backend: DatabaseBackend,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    /// `None` when TLS is disabled.
    pub tls: Option<TlsParams>,
    pub charset: String,
    pub connect_timeout: Duration,
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("shard", &self.shard)
            .field("backend", &self.backend)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("tls", &self.tls)
            .field("charset", &self.charset)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

impl Config {
    /// Returns the default config file path for the current platform.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("db-shardquery")
            .join("config.toml")
    }

    /// Loads configuration from a TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| FederationError::config(format!("Failed to read config file: {e}")))?;

        Self::parse_toml(&content, path)
    }

    /// Parses configuration from a TOML string.
    fn parse_toml(content: &str, path: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            FederationError::config(format!(
                "Configuration error in {}:\n  {}",
                path.display(),
                e
            ))
        })
    }

    /// Gets a named source, or the default source if name is None.
    pub fn get_source(&self, name: Option<&str>) -> Option<&ShardSourceConfig> {
        let key = name.unwrap_or("default");
        self.sources.get(key)
    }
}
