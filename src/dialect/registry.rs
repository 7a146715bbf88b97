//! Dialect registry: static mapping from provider keys to dialect constructors

use super::{Dialect, DialectKind};
use crate::error::{Result, SqlError};

type Constructor = fn(&str) -> Result<Dialect>;

static REGISTRY: &[(&str, DialectKind, Constructor)] = &[
    ("mysql", DialectKind::MySql, Dialect::mysql),
    ("mariadb", DialectKind::MySql, Dialect::mysql),
    ("postgresql", DialectKind::Postgres, Dialect::postgres),
    ("postgres", DialectKind::Postgres, Dialect::postgres),
    ("npgsql", DialectKind::Postgres, Dialect::postgres),
    ("sqlserver", DialectKind::SqlServer, Dialect::sql_server),
    ("mssql", DialectKind::SqlServer, Dialect::sql_server),
    ("oracle", DialectKind::Oracle, Dialect::oracle),
    ("sqlite", DialectKind::Sqlite, Dialect::sqlite),
    ("db2", DialectKind::Db2, Dialect::db2),
];

/// Lookup of dialects by provider key
pub struct DialectRegistry;

impl DialectRegistry {
    /// Construct a dialect from a key such as "postgresql" and a version label
    pub fn create(key: &str, version: &str) -> Result<Dialect> {
        let (_, _, ctor) = Self::entry(key)?;
        ctor(version)
    }

    /// Dialect at its default version
    pub fn create_latest(key: &str) -> Result<Dialect> {
        let (_, kind, _) = Self::entry(key)?;
        Ok(Dialect::latest(kind))
    }

    pub fn kind_of(key: &str) -> Result<DialectKind> {
        Self::entry(key).map(|(_, kind, _)| kind)
    }

    pub fn keys() -> impl Iterator<Item = &'static str> {
        REGISTRY.iter().map(|(key, _, _)| *key)
    }

    fn entry(key: &str) -> Result<(&'static str, DialectKind, Constructor)> {
        let normalized = key.trim().to_ascii_lowercase();
        REGISTRY
            .iter()
            .find(|(k, _, _)| *k == normalized)
            .copied()
            .ok_or_else(|| {
                SqlError::NotImplemented(format!("no executor registered for dialect '{}'", key))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_known_keys() {
        let d = DialectRegistry::create("Npgsql", "9.5").unwrap();
        assert_eq!(d.kind(), DialectKind::Postgres);
        assert_eq!(d.version(), 905);

        let d = DialectRegistry::create("mssql", "2019").unwrap();
        assert_eq!(d.version(), 1500);
    }

    #[test]
    fn test_unknown_key() {
        let err = DialectRegistry::create("informix", "1.0").unwrap_err();
        assert!(matches!(err, SqlError::NotImplemented(_)));
    }

    #[test]
    fn test_every_key_resolves() {
        for key in DialectRegistry::keys() {
            assert!(DialectRegistry::create_latest(key).is_ok());
        }
    }
}
