//! Configuration integration tests.
//!
//! Loads TOML files from disk and resolves every shard of a source.

use db_shardquery::config::Config;
use db_shardquery::db::DatabaseBackend;
use db_shardquery::error::FederationError;
use db_shardquery::federation::{build_all, expand, DEFAULT_DELIMITER};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_and_resolve_every_shard() {
    let file = write_config(
        r#"
[sources.default]
backend = "postgres"
params = "eu, us"
show_params = true
host = "pg-{param}.internal"
db = "app_{param}"
user = "reader_{param}"
passwd = "secret"
use_ssl = true
ssl_cacert = "/etc/ssl/{param}.pem"
connect_timeout_secs = 5
"#,
    );

    let config = Config::load_from_file(file.path()).unwrap();
    let source = config.get_source(None).unwrap();
    source.validate().unwrap();

    let tokens = expand(&source.params, DEFAULT_DELIMITER).unwrap();
    let shards = build_all(source, &tokens).unwrap();

    assert_eq!(shards.len(), 2);
    assert_eq!(shards[0].shard, "eu");
    assert_eq!(shards[0].backend, DatabaseBackend::Postgres);
    assert_eq!(shards[0].host, "pg-eu.internal");
    assert_eq!(shards[0].port, 5432);
    assert_eq!(shards[0].database, "app_eu");
    assert_eq!(shards[0].user, "reader_eu");
    assert_eq!(shards[0].connect_timeout, Duration::from_secs(5));
    assert_eq!(
        shards[1].tls.as_ref().and_then(|t| t.ca_cert.clone()),
        Some(PathBuf::from("/etc/ssl/us.pem"))
    );
}

#[test]
fn test_password_never_logged() {
    let file = write_config(
        r#"
[sources.default]
db = "app"
params = "a"
passwd = "hunter2"
"#,
    );

    let config = Config::load_from_file(file.path()).unwrap();
    let source = config.get_source(None).unwrap();
    let shards = build_all(source, &["a".to_string()]).unwrap();

    let debug = format!("{:?}", shards[0]);
    assert!(!debug.contains("hunter2"));
    assert!(!source.display_string().contains("hunter2"));
}

#[test]
fn test_invalid_toml_is_config_error() {
    let file = write_config("[sources.default\ndb = ");
    let err = Config::load_from_file(file.path()).unwrap_err();
    assert!(matches!(err, FederationError::Config(_)));
}
