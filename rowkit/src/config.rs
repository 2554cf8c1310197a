//! Connection configuration.

use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Environment variable naming the database file (or `:memory:`).
pub const ENV_DATABASE: &str = "ROWKIT_DATABASE";
/// Environment variable selecting read-only connections.
pub const ENV_READ_ONLY: &str = "ROWKIT_READ_ONLY";
/// Environment variable allowing the database file to be created.
pub const ENV_CREATE: &str = "ROWKIT_CREATE";
/// Environment variable with the busy timeout in milliseconds.
pub const ENV_BUSY_TIMEOUT_MS: &str = "ROWKIT_BUSY_TIMEOUT_MS";

const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Settings used by [`SqliteProvider`](crate::SqliteProvider) to open
/// connections.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DbConfig {
    /// Path of the database file.
    pub database: String,
    /// Open connections read-only.
    #[serde(default)]
    pub read_only: bool,
    /// Create the database file when it does not exist.
    #[serde(default = "default_create")]
    pub create: bool,
    /// How long a connection waits on a locked database before failing.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

const fn default_create() -> bool {
    true
}

const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

impl DbConfig {
    /// Creates a read-write configuration for `database` with default settings.
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            read_only: false,
            create: default_create(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }

    /// Reads the configuration from the `ROWKIT_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `ROWKIT_DATABASE` is unset or a value
    /// does not parse.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`, keyed by the environment
    /// variable names.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the database is missing or a value does
    /// not parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let database = lookup(ENV_DATABASE)
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| Error::Config {
                key: ENV_DATABASE.to_string(),
                message: "must be set".to_string(),
            })?;
        let mut config = Self::new(database);
        if let Some(value) = lookup(ENV_READ_ONLY) {
            config.read_only = parse_flag(ENV_READ_ONLY, &value)?;
        }
        if let Some(value) = lookup(ENV_CREATE) {
            config.create = parse_flag(ENV_CREATE, &value)?;
        }
        if let Some(value) = lookup(ENV_BUSY_TIMEOUT_MS) {
            config.busy_timeout_ms = value.trim().parse().map_err(|err| Error::Config {
                key: ENV_BUSY_TIMEOUT_MS.to_string(),
                message: format!("{err}"),
            })?;
        }
        Ok(config)
    }

    /// Busy timeout as a [`Duration`].
    pub const fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(Error::Config {
            key: key.to_string(),
            message: format!("expected a boolean, got `{other}`"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = DbConfig::from_lookup(lookup(&[(ENV_DATABASE, "app.db")]))
            .expect("config");
        assert_eq!(config, DbConfig::new("app.db"));
        assert!(config.create);
        assert!(!config.read_only);
        assert_eq!(config.busy_timeout(), Duration::from_millis(5_000));
    }

    #[test]
    fn test_overrides() {
        let config = DbConfig::from_lookup(lookup(&[
            (ENV_DATABASE, "app.db"),
            (ENV_READ_ONLY, "yes"),
            (ENV_CREATE, "0"),
            (ENV_BUSY_TIMEOUT_MS, " 250 "),
        ]))
        .expect("config");
        assert!(config.read_only);
        assert!(!config.create);
        assert_eq!(config.busy_timeout_ms, 250);
    }

    #[test]
    fn test_missing_database() {
        let err = DbConfig::from_lookup(lookup(&[])).expect_err("must fail");
        assert!(matches!(err, Error::Config { ref key, .. } if key == ENV_DATABASE));
    }

    #[test]
    fn test_bad_values() {
        let err = DbConfig::from_lookup(lookup(&[
            (ENV_DATABASE, "app.db"),
            (ENV_READ_ONLY, "maybe"),
        ]))
        .expect_err("must fail");
        assert!(matches!(err, Error::Config { ref key, .. } if key == ENV_READ_ONLY));

        let err = DbConfig::from_lookup(lookup(&[
            (ENV_DATABASE, "app.db"),
            (ENV_BUSY_TIMEOUT_MS, "soon"),
        ]))
        .expect_err("must fail");
        assert!(matches!(err, Error::Config { ref key, .. } if key == ENV_BUSY_TIMEOUT_MS));
    }

    #[test]
    fn test_deserialize_applies_defaults() {
        let config: DbConfig =
            serde_json::from_str(r#"{"database": "app.db", "read_only": true}"#)
                .expect("deserialize");
        assert!(config.read_only);
        assert!(config.create);
        assert_eq!(config.busy_timeout_ms, 5_000);
    }
}
