//! Session configuration.
//!
//! A [`MimerConfig`] is built with the builder methods, parsed from a
//! framework data source name (`mimer:dbname=...;user=...`) or loaded from
//! JSON. [`MimerConfig::validate`] runs before every connect.

use mimer_pdo_core::{ConfigError, CursorKind, Error, Result, TransactionMode};
use serde::{Deserialize, Serialize};

/// Chunk size used for LOB transfer unless configured otherwise.
pub const DEFAULT_LOB_CHUNK_SIZE: usize = 8192;

/// DSN prefix naming this driver.
pub const DSN_PREFIX: &str = "mimer:";

/// Mimer SQL session configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MimerConfig {
    /// Database name; `None` connects to the default database
    pub database: Option<String>,
    /// Login identifier
    pub user: String,
    pub password: String,
    /// Access mode for transactions begun on the session
    pub transaction_mode: TransactionMode,
    /// Cursor kind for statements prepared without an explicit one
    pub cursor_kind: CursorKind,
    pub autocommit: bool,
    /// Maximum bytes sent or received per LOB chunk
    pub lob_chunk_size: usize,
}

impl Default for MimerConfig {
    fn default() -> Self {
        Self {
            database: None,
            user: String::new(),
            password: String::new(),
            transaction_mode: TransactionMode::default(),
            cursor_kind: CursorKind::default(),
            autocommit: true,
            lob_chunk_size: DEFAULT_LOB_CHUNK_SIZE,
        }
    }
}

impl MimerConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the database name.
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Set the login identifier.
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    /// Set the password.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    /// Set the transaction access mode.
    pub fn transaction_mode(mut self, mode: TransactionMode) -> Self {
        self.transaction_mode = mode;
        self
    }

    /// Set the default cursor kind.
    pub fn cursor_kind(mut self, kind: CursorKind) -> Self {
        self.cursor_kind = kind;
        self
    }

    /// Enable or disable autocommit.
    pub fn autocommit(mut self, enabled: bool) -> Self {
        self.autocommit = enabled;
        self
    }

    /// Set the LOB chunk size in bytes.
    pub fn lob_chunk_size(mut self, size: usize) -> Self {
        self.lob_chunk_size = size;
        self
    }

    /// Check the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        if self.lob_chunk_size == 0 {
            return Err(Error::config("lob_chunk_size must be greater than zero"));
        }
        if self.database.as_deref().is_some_and(|db| db.trim().is_empty()) {
            return Err(Error::config("database name must not be blank"));
        }
        Ok(())
    }

    /// Parse a data source name such as `mimer:dbname=testdb;user=SYSADM`.
    ///
    /// Recognized keys are `dbname`, `user`, `password` and `trans_option`.
    /// Unknown keys are ignored; an empty `dbname` selects the default
    /// database.
    pub fn from_dsn(dsn: &str) -> Result<Self> {
        let options = dsn
            .strip_prefix(DSN_PREFIX)
            .ok_or_else(|| Error::config(format!("DSN must start with '{}'", DSN_PREFIX)))?;

        let mut config = Self::default();
        for pair in options.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| Error::config(format!("malformed DSN option '{}'", pair)))?;
            let value = value.trim();
            match key.trim().to_ascii_lowercase().as_str() {
                "dbname" => {
                    config.database = (!value.is_empty()).then(|| value.to_string());
                }
                "user" => config.user = value.to_string(),
                "password" => config.password = value.to_string(),
                "trans_option" => config.transaction_mode = parse_transaction_mode(value)?,
                other => tracing::debug!(option = other, "ignoring unknown DSN option"),
            }
        }
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| {
            Error::Config(ConfigError {
                message: format!("invalid JSON configuration: {}", e),
                source: Some(Box::new(e)),
            })
        })?;
        config.validate()?;
        Ok(config)
    }
}

fn parse_transaction_mode(value: &str) -> Result<TransactionMode> {
    match value.to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
        "read_write" | "readwrite" | "rw" | "0" => Ok(TransactionMode::ReadWrite),
        "read_only" | "readonly" | "ro" | "1" => Ok(TransactionMode::ReadOnly),
        _ => Err(Error::config(format!("unknown trans_option '{}'", value))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = MimerConfig::new()
            .database("testdb")
            .user("SYSADM")
            .password("secret")
            .transaction_mode(TransactionMode::ReadOnly)
            .cursor_kind(CursorKind::Scrollable)
            .autocommit(false)
            .lob_chunk_size(5);

        assert_eq!(config.database.as_deref(), Some("testdb"));
        assert_eq!(config.user, "SYSADM");
        assert_eq!(config.password, "secret");
        assert_eq!(config.transaction_mode, TransactionMode::ReadOnly);
        assert_eq!(config.cursor_kind, CursorKind::Scrollable);
        assert!(!config.autocommit);
        assert_eq!(config.lob_chunk_size, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_defaults() {
        let config = MimerConfig::default();
        assert_eq!(config.database, None);
        assert_eq!(config.lob_chunk_size, DEFAULT_LOB_CHUNK_SIZE);
        assert!(config.autocommit);
        assert_eq!(config.cursor_kind, CursorKind::ForwardOnly);
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let err = MimerConfig::new().lob_chunk_size(0).validate().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_from_dsn() {
        let config =
            MimerConfig::from_dsn("mimer:dbname=testdb; user=SYSADM;password=pw;trans_option=read_only")
                .unwrap();
        assert_eq!(config.database.as_deref(), Some("testdb"));
        assert_eq!(config.user, "SYSADM");
        assert_eq!(config.password, "pw");
        assert_eq!(config.transaction_mode, TransactionMode::ReadOnly);
    }

    #[test]
    fn test_from_dsn_default_database() {
        let config = MimerConfig::from_dsn("mimer:dbname=;host=ignored").unwrap();
        assert_eq!(config.database, None);
        assert!(MimerConfig::from_dsn("mimer:").unwrap().database.is_none());
    }

    #[test]
    fn test_from_dsn_errors() {
        assert!(MimerConfig::from_dsn("mysql:dbname=x").is_err());
        assert!(MimerConfig::from_dsn("mimer:dbname").is_err());
        assert!(MimerConfig::from_dsn("mimer:trans_option=sometimes").is_err());
    }

    #[test]
    fn test_from_json() {
        let config = MimerConfig::from_json(
            r#"{"database": "testdb", "user": "SYSADM", "cursor_kind": "scrollable"}"#,
        )
        .unwrap();
        assert_eq!(config.database.as_deref(), Some("testdb"));
        assert_eq!(config.cursor_kind, CursorKind::Scrollable);
        assert_eq!(config.lob_chunk_size, DEFAULT_LOB_CHUNK_SIZE);

        let err = MimerConfig::from_json(r#"{"lob_chunk_size": 0}"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        let err = MimerConfig::from_json("not json").unwrap_err();
        assert!(std::error::Error::source(&err).is_some());
    }
}
