//! Database configuration
//!
//! Selects the dialect the engine impersonates and how much locking it does.

use crate::dialect::{Dialect, DialectKind};
use crate::error::{Result, SqlError};
use serde::{Deserialize, Serialize};

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    /// Vendor the engine impersonates
    pub dialect: DialectKind,

    /// Version label ("8.0", "15", "2019"); empty means the dialect default
    pub version: String,

    /// Serialize mutations and transaction control through one database lock
    pub thread_safe: bool,

    /// SELECT also takes the database lock (only when `thread_safe`)
    pub lock_reads: bool,

    /// Schema used for unqualified table names
    pub default_schema: String,

    /// Parsed-statement LRU capacity (0 disables the cache)
    pub parse_cache_size: usize,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            dialect: DialectKind::MySql,
            version: String::new(),
            thread_safe: true,
            lock_reads: false,
            default_schema: "default".to_string(),
            parse_cache_size: 256,
        }
    }
}

impl DbConfig {
    pub fn new(dialect: DialectKind, version: impl Into<String>) -> Self {
        Self {
            dialect,
            version: version.into(),
            ..Default::default()
        }
    }

    pub fn mysql(version: &str) -> Self {
        Self::new(DialectKind::MySql, version)
    }

    pub fn postgres(version: &str) -> Self {
        Self::new(DialectKind::Postgres, version)
    }

    pub fn sql_server(version: &str) -> Self {
        Self::new(DialectKind::SqlServer, version)
    }

    pub fn oracle(version: &str) -> Self {
        Self::new(DialectKind::Oracle, version)
    }

    pub fn sqlite(version: &str) -> Self {
        Self::new(DialectKind::Sqlite, version)
    }

    pub fn db2(version: &str) -> Self {
        Self::new(DialectKind::Db2, version)
    }

    /// Single-threaded test setup: no statement lock, no parse cache
    pub fn for_testing(dialect: DialectKind) -> Self {
        Self {
            dialect,
            thread_safe: false,
            parse_cache_size: 0,
            ..Default::default()
        }
    }

    pub fn thread_safe(mut self, enabled: bool) -> Self {
        self.thread_safe = enabled;
        self
    }

    pub fn lock_reads(mut self, enabled: bool) -> Self {
        self.lock_reads = enabled;
        self
    }

    pub fn default_schema(mut self, schema: impl Into<String>) -> Self {
        self.default_schema = schema.into();
        self
    }

    pub fn parse_cache_size(mut self, size: usize) -> Self {
        self.parse_cache_size = size;
        self
    }

    /// Build the configured dialect
    pub fn build_dialect(&self) -> Result<Dialect> {
        if self.version.trim().is_empty() {
            Ok(Dialect::latest(self.dialect))
        } else {
            Dialect::with_version_label(self.dialect, &self.version)
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| SqlError::invalid(format!("invalid configuration: {}", e)))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| SqlError::invalid(format!("cannot serialize configuration: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DbConfig::default();
        assert!(config.thread_safe);
        assert!(!config.lock_reads);
        assert_eq!(config.build_dialect().unwrap().kind(), DialectKind::MySql);
    }

    #[test]
    fn test_builders() {
        let config = DbConfig::postgres("9.5").thread_safe(false).parse_cache_size(0);
        assert!(!config.thread_safe);
        assert_eq!(config.build_dialect().unwrap().version(), 905);
    }

    #[test]
    fn test_json_round_trip() {
        let config = DbConfig::from_json(r#"{"dialect":"sqlserver","version":"2019"}"#).unwrap();
        assert_eq!(config.dialect, DialectKind::SqlServer);
        assert!(config.thread_safe);
        assert_eq!(config.build_dialect().unwrap().version(), 1500);

        let json = config.to_json().unwrap();
        let back = DbConfig::from_json(&json).unwrap();
        assert_eq!(back.version, "2019");
    }

    #[test]
    fn test_bad_json() {
        assert!(DbConfig::from_json("{not json").is_err());
        assert!(DbConfig::mysql("x.y").build_dialect().is_err());
    }
}
