//! Configuration for the movies server.
//!
//! Every value has a compile-time default (see [`DatabaseConfig::default`])
//! and can be overridden at runtime via a dedicated environment variable.
//! The `--database-url` flag takes precedence over the environment.

use std::str::FromStr;
use std::time::Duration;

use movies_catalog::DatabaseConfig;

/// Connection string for the catalog database.
pub const DATABASE_URL_VAR: &str = "MOVIES_DATABASE_URL";

/// Upper bound on pooled connections.
pub const MAX_CONNECTIONS_VAR: &str = "MOVIES_DB_MAX_CONNECTIONS";

/// Seconds to wait for a pooled connection before failing.
pub const ACQUIRE_TIMEOUT_VAR: &str = "MOVIES_DB_ACQUIRE_TIMEOUT_SECS";

/// Resolve the database configuration from the process environment.
///
/// Priority, per value:
/// 1. The matching `MOVIES_*` env variable if set (numeric values fall back
///    to the default if they cannot be parsed)
/// 2. The compiled-in default
pub fn load_database_config() -> DatabaseConfig {
    database_config_from(|name| std::env::var(name).ok())
}

fn database_config_from(lookup: impl Fn(&str) -> Option<String>) -> DatabaseConfig {
    let mut config = DatabaseConfig::default();

    if let Some(url) = lookup(DATABASE_URL_VAR).filter(|url| !url.trim().is_empty()) {
        config.url = url;
    }

    if let Some(max) = parse_var::<u32>(&lookup, MAX_CONNECTIONS_VAR) {
        if max > 0 {
            config.max_connections = max;
        } else {
            tracing::warn!(var = MAX_CONNECTIONS_VAR, "Pool size must be positive, using default");
        }
    }

    if let Some(secs) = parse_var::<u64>(&lookup, ACQUIRE_TIMEOUT_VAR) {
        config.acquire_timeout = Duration::from_secs(secs);
    }

    config
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    let raw = lookup(name)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(var = name, value = %raw, "Ignoring unparseable override");
            None
        }
    }
}
