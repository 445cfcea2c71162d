//! Shard parameter expansion.

use crate::error::{FederationError, Result};

/// Default shard token delimiter.
pub const DEFAULT_DELIMITER: &str = ",";

/// Splits a delimited shard parameter string into ordered tokens.
///
/// Tokens are trimmed and empty tokens are dropped. An empty result is a
/// configuration error.
pub fn expand(raw: &str, delimiter: &str) -> Result<Vec<String>> {
    if delimiter.is_empty() {
        return Err(FederationError::config("Shard parameter delimiter is empty"));
    }

    let tokens: Vec<String> = raw
        .split(delimiter)
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(String::from)
        .collect();

    if tokens.is_empty() {
        return Err(FederationError::config(format!(
            "No shard parameters in '{raw}'"
        )));
    }

    Ok(tokens)
}
