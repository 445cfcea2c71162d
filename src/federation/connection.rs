//! Per-shard connection parameter resolution.
//!
//! Turns a source template plus one shard token into concrete
//! `ConnectionParams`. Substitution is literal, never a pattern match, and
//! nothing here touches the network.

use crate::config::{
    ConnectionParams, ShardSourceConfig, TlsParams, DEFAULT_CHARSET, PARAM_PLACEHOLDER,
};
use crate::error::{FederationError, Result};
use std::path::PathBuf;

/// Replaces the placeholder in one templated field.
fn substitute(template: &str, token: &str) -> String {
    template.replace(PARAM_PLACEHOLDER, token)
}

/// Resolves the connection parameters for one shard.
pub fn build(template: &ShardSourceConfig, token: &str) -> Result<ConnectionParams> {
    let port_str = substitute(&template.port_template(), token);
    let port = parse_port(&port_str, token)?;

    let database = substitute(&template.db, token);
    if database.trim().is_empty() {
        return Err(FederationError::config(format!(
            "Database name resolves to an empty string for shard '{token}'"
        )));
    }

    let tls = template.use_ssl.then(|| {
        let path = |field: &Option<String>| {
            field
                .as_deref()
                .filter(|p| !p.is_empty())
                .map(|p| PathBuf::from(substitute(p, token)))
        };
        TlsParams {
            ca_cert: path(&template.ssl_cacert),
            client_cert: path(&template.ssl_cert),
            client_key: path(&template.ssl_key),
        }
    });

    Ok(ConnectionParams {
        shard: token.to_string(),
        backend: template.backend,
        host: substitute(&template.host, token),
        port,
        database,
        user: substitute(&template.user, token),
        password: template
            .passwd
            .as_deref()
            .map(|p| substitute(p, token))
            .unwrap_or_default(),
        tls,
        charset: DEFAULT_CHARSET.to_string(),
        connect_timeout: template.connect_timeout(),
    })
}

/// Resolves every shard up front, so a bad template fails before any
/// connection is attempted.
pub fn build_all(
    template: &ShardSourceConfig,
    tokens: &[String],
) -> Result<Vec<ConnectionParams>> {
    tokens.iter().map(|token| build(template, token)).collect()
}

fn parse_port(port_str: &str, token: &str) -> Result<u16> {
    match port_str.trim().parse::<u16>() {
        Ok(0) | Err(_) => Err(FederationError::config(format!(
            "Invalid port '{port_str}' for shard '{token}'"
        ))),
        Ok(port) => Ok(port),
    }
}
