//! SQL dialect capability model
//!
//! A `Dialect` is an immutable value built from a static per-vendor profile
//! plus a version number. Every version-sensitive decision in the parser and
//! executor is a lookup against the profile, so adding a dialect means adding
//! a table to `profiles.rs`, not new control flow.
//!
//! Versions are encoded as `major * 100 + minor` ("8.0" -> 800, "9.5" -> 905).

mod errors;
mod profiles;
pub mod registry;

pub use errors::ErrorCatalog;
pub use registry::DialectRegistry;

use crate::error::{Result, SqlError};
use crate::types::TypeCategory;
use profiles::DialectProfile;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported database vendors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialectKind {
    MySql,
    Postgres,
    SqlServer,
    Oracle,
    Sqlite,
    Db2,
}

impl DialectKind {
    pub fn all() -> [DialectKind; 6] {
        [
            DialectKind::MySql,
            DialectKind::Postgres,
            DialectKind::SqlServer,
            DialectKind::Oracle,
            DialectKind::Sqlite,
            DialectKind::Db2,
        ]
    }
}

/// Identifier quoting forms recognised by the lexer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteStyle {
    /// "name"
    Double,
    /// `name`
    Backtick,
    /// [name]
    Bracket,
}

/// How text values compare for equality and ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextComparison {
    /// Byte/char ordinal comparison
    Ordinal,
    /// Case-insensitive comparison (default collations of MySQL and SQL Server)
    CaseInsensitive,
}

/// UNION column compatibility rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnionCompat {
    /// Any pair of types may be combined
    Lenient,
    /// Types must belong to the same category (numeric, text, temporal, boolean)
    SameCategory,
    /// Like `SameCategory`, but booleans may mix with numerics
    NumericBoolean,
}

/// Result type of a zero-argument temporal built-in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemporalKind {
    Date,
    DateTime,
}

/// Zero-argument temporal function entry
#[derive(Debug, Clone, Copy)]
pub struct TemporalFunction {
    pub name: &'static str,
    pub kind: TemporalKind,
    /// Written without parentheses (`CURRENT_DATE`) rather than called (`NOW()`)
    pub bare: bool,
}

/// Window function entry: name, argument arity, ORDER BY requirement
#[derive(Debug, Clone, Copy)]
pub struct WindowFunctionSpec {
    pub name: &'static str,
    pub min_args: usize,
    pub max_args: usize,
    pub requires_order_by: bool,
}

/// Affected-row values reported for an upsert/merge row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertCounts {
    pub inserted: u64,
    pub updated: u64,
    /// Row matched but left unchanged (or DO NOTHING)
    pub unchanged: u64,
}

/// Immutable dialect + version capability object
#[derive(Clone)]
pub struct Dialect {
    kind: DialectKind,
    version: u32,
    profile: &'static DialectProfile,
}

impl fmt::Debug for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dialect")
            .field("name", &self.profile.name)
            .field("version", &self.version_label())
            .finish()
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.profile.name, self.version_label())
    }
}

impl Dialect {
    pub fn new(kind: DialectKind, version: u32) -> Self {
        Self {
            kind,
            version,
            profile: profiles::profile(kind),
        }
    }

    /// Dialect at its profile's default (latest modelled) version
    pub fn latest(kind: DialectKind) -> Self {
        let profile = profiles::profile(kind);
        Self {
            kind,
            version: profile.default_version,
            profile,
        }
    }

    /// Build from a version label such as "8.0", "15" or "2019"
    pub fn with_version_label(kind: DialectKind, label: &str) -> Result<Self> {
        Ok(Self::new(kind, parse_version(kind, label)?))
    }

    pub fn mysql(label: &str) -> Result<Self> {
        Self::with_version_label(DialectKind::MySql, label)
    }

    pub fn postgres(label: &str) -> Result<Self> {
        Self::with_version_label(DialectKind::Postgres, label)
    }

    pub fn sql_server(label: &str) -> Result<Self> {
        Self::with_version_label(DialectKind::SqlServer, label)
    }

    pub fn oracle(label: &str) -> Result<Self> {
        Self::with_version_label(DialectKind::Oracle, label)
    }

    pub fn sqlite(label: &str) -> Result<Self> {
        Self::with_version_label(DialectKind::Sqlite, label)
    }

    pub fn db2(label: &str) -> Result<Self> {
        Self::with_version_label(DialectKind::Db2, label)
    }

    pub fn kind(&self) -> DialectKind {
        self.kind
    }

    pub fn name(&self) -> &'static str {
        self.profile.name
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn version_label(&self) -> String {
        format_version(self.version)
    }

    // ----- minimum-version gates -----

    pub fn with_cte_min_version(&self) -> Option<u32> {
        self.profile.cte_min_version
    }

    pub fn merge_min_version(&self) -> Option<u32> {
        self.profile.merge_min_version
    }

    pub fn window_functions_min_version(&self) -> Option<u32> {
        self.profile.window_functions_min_version
    }

    pub fn on_conflict_min_version(&self) -> Option<u32> {
        self.profile.on_conflict_min_version
    }

    pub fn offset_fetch_min_version(&self) -> Option<u32> {
        self.profile.offset_fetch_min_version
    }

    fn gate_open(&self, min: Option<u32>) -> bool {
        min.map(|m| self.version >= m).unwrap_or(false)
    }

    pub fn supports_cte(&self) -> bool {
        self.gate_open(self.profile.cte_min_version)
    }

    pub fn supports_merge(&self) -> bool {
        self.gate_open(self.profile.merge_min_version)
    }

    pub fn supports_window_functions(&self) -> bool {
        self.gate_open(self.profile.window_functions_min_version)
    }

    pub fn supports_on_conflict(&self) -> bool {
        self.gate_open(self.profile.on_conflict_min_version)
    }

    pub fn supports_offset_fetch(&self) -> bool {
        self.gate_open(self.profile.offset_fetch_min_version)
    }

    /// Fail with a version-gate error unless `min` is reached
    pub fn require(&self, feature: &str, min: Option<u32>) -> Result<()> {
        match min {
            Some(m) if self.version >= m => Ok(()),
            Some(m) => Err(self.not_supported(&format!(
                "{} requires {} {} or later (current version {})",
                feature,
                self.profile.name,
                format_version(m),
                self.version_label()
            ))),
            None => Err(self.not_supported(&format!(
                "{} is not supported by {}",
                feature, self.profile.name
            ))),
        }
    }

    // ----- grammar capabilities -----

    pub fn supports_on_duplicate_key_update(&self) -> bool {
        self.profile.on_duplicate_key_update
    }

    pub fn supports_insert_ignore(&self) -> bool {
        self.profile.insert_ignore
    }

    pub fn supports_limit(&self) -> bool {
        self.profile.limit_offset
    }

    pub fn supports_top(&self) -> bool {
        self.profile.top
    }

    pub fn supports_table_hints(&self) -> bool {
        self.profile.table_hints
    }

    pub fn supports_option_clause(&self) -> bool {
        self.profile.option_clause
    }

    pub fn allows_quote_style(&self, style: QuoteStyle) -> bool {
        self.profile.identifier_quotes.contains(&style)
    }

    /// Double-quoted tokens are string literals rather than identifiers
    pub fn double_quote_is_string(&self) -> bool {
        self.profile.double_quote_is_string
    }

    pub fn backslash_escapes(&self) -> bool {
        self.profile.backslash_escapes
    }

    pub fn pipes_as_concat(&self) -> bool {
        self.profile.pipes_as_concat
    }

    pub fn quote_identifier(&self, name: &str) -> String {
        match self.profile.identifier_quotes.first() {
            Some(QuoteStyle::Backtick) => format!("`{}`", name.replace('`', "``")),
            Some(QuoteStyle::Bracket) => format!("[{}]", name.replace(']', "]]")),
            _ => format!("\"{}\"", name.replace('"', "\"\"")),
        }
    }

    // ----- window functions -----

    fn window_spec(&self, name: &str) -> Option<&'static WindowFunctionSpec> {
        self.profile
            .window_functions
            .iter()
            .find(|spec| spec.name.eq_ignore_ascii_case(name))
    }

    pub fn supports_window_function(&self, name: &str) -> bool {
        self.supports_window_functions() && self.window_spec(name).is_some()
    }

    pub fn requires_order_by_in_window_function(&self, name: &str) -> bool {
        self.window_spec(name)
            .map(|spec| spec.requires_order_by)
            .unwrap_or(false)
    }

    /// `(min, max)` argument count for a window function
    pub fn window_function_arity(&self, name: &str) -> Option<(usize, usize)> {
        self.window_spec(name).map(|spec| (spec.min_args, spec.max_args))
    }

    // ----- typing and comparison -----

    pub fn are_union_column_types_compatible(&self, a: TypeCategory, b: TypeCategory) -> bool {
        if a == b || a == TypeCategory::Null || b == TypeCategory::Null {
            return true;
        }
        match self.profile.union_compat {
            UnionCompat::Lenient => true,
            UnionCompat::SameCategory => false,
            UnionCompat::NumericBoolean => matches!(
                (a, b),
                (TypeCategory::Numeric, TypeCategory::Boolean)
                    | (TypeCategory::Boolean, TypeCategory::Numeric)
            ),
        }
    }

    pub fn is_integer_cast_type_name(&self, name: &str) -> bool {
        let normalized = name.trim().to_ascii_uppercase();
        self.profile
            .integer_cast_types
            .iter()
            .any(|t| *t == normalized)
    }

    pub fn like_is_case_insensitive(&self) -> bool {
        self.profile.like_case_insensitive
    }

    pub fn text_comparison(&self) -> TextComparison {
        self.profile.text_comparison
    }

    pub fn supports_implicit_numeric_string_comparison(&self) -> bool {
        self.profile.implicit_numeric_string_comparison
    }

    pub fn supports_triggers(&self) -> bool {
        self.profile.supports_triggers
    }

    pub fn temporal_function(&self, name: &str) -> Option<&'static TemporalFunction> {
        self.profile
            .temporal_functions
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
    }

    // ----- runtime semantics -----

    pub fn plus_concatenates_strings(&self) -> bool {
        self.profile.plus_concatenates
    }

    pub fn integer_division_truncates(&self) -> bool {
        self.profile.integer_division
    }

    pub fn division_by_zero_is_null(&self) -> bool {
        self.profile.division_by_zero_null
    }

    /// NULLs sort before non-NULL values in ascending order
    pub fn nulls_sort_first(&self) -> bool {
        self.profile.nulls_first
    }

    /// Unique indexes accept any number of rows with NULL keys
    pub fn unique_nulls_distinct(&self) -> bool {
        self.profile.unique_nulls_distinct
    }

    /// UPDATE reports changed rows rather than matched rows
    pub fn update_counts_changed_rows_only(&self) -> bool {
        self.profile.update_counts_changed_only
    }

    /// ON CONFLICT DO UPDATE may not touch one row twice in a statement
    pub fn upsert_rejects_repeat_update(&self) -> bool {
        self.profile.upsert_rejects_repeat_update
    }

    pub fn upsert_counts(&self) -> UpsertCounts {
        self.profile.upsert_counts
    }

    pub fn primary_key_name(&self, table: &str) -> String {
        self.profile.primary_key_name.replace("{table}", table)
    }

    /// Compare identifiers/text under the dialect's default collation
    pub fn text_equals(&self, a: &str, b: &str) -> bool {
        match self.text_comparison() {
            TextComparison::Ordinal => a == b,
            TextComparison::CaseInsensitive => a.to_lowercase() == b.to_lowercase(),
        }
    }

    pub fn errors(&self) -> &'static ErrorCatalog {
        self.profile.errors
    }
}

/// Encode a version label as `major * 100 + minor`
pub fn parse_version(kind: DialectKind, label: &str) -> Result<u32> {
    let label = label.trim();
    let mut parts = label.split('.');
    let major: u32 = parts
        .next()
        .and_then(|p| p.parse().ok())
        .ok_or_else(|| SqlError::invalid(format!("invalid version '{}'", label)))?;
    let minor: u32 = match parts.next() {
        Some(p) => p
            .parse()
            .map_err(|_| SqlError::invalid(format!("invalid version '{}'", label)))?,
        None => 0,
    };
    if minor >= 100 {
        return Err(SqlError::invalid(format!("invalid version '{}'", label)));
    }
    if kind == DialectKind::SqlServer && major >= 2000 {
        return profiles::sql_server_year_to_version(major)
            .ok_or_else(|| SqlError::invalid(format!("unknown SQL Server release '{}'", label)));
    }
    Ok(major * 100 + minor)
}

pub fn format_version(version: u32) -> String {
    format!("{}.{}", version / 100, version % 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_version() {
        assert_eq!(parse_version(DialectKind::MySql, "8.0").unwrap(), 800);
        assert_eq!(parse_version(DialectKind::Postgres, "9.5").unwrap(), 905);
        assert_eq!(parse_version(DialectKind::Postgres, "15").unwrap(), 1500);
        assert_eq!(parse_version(DialectKind::SqlServer, "2019").unwrap(), 1500);
        assert_eq!(parse_version(DialectKind::SqlServer, "2008").unwrap(), 1000);
        assert!(parse_version(DialectKind::MySql, "abc").is_err());
    }

    #[test]
    fn test_version_gates() {
        let old = Dialect::mysql("5.7").unwrap();
        let new = Dialect::mysql("8.0").unwrap();
        assert!(!old.supports_cte());
        assert!(new.supports_cte());
        assert!(!old.supports_window_functions());
        assert!(new.supports_window_functions());
        assert!(!new.supports_merge());

        let pg = Dialect::postgres("14").unwrap();
        assert!(!pg.supports_merge());
        assert!(Dialect::postgres("15").unwrap().supports_merge());
        assert!(!Dialect::postgres("9.4").unwrap().supports_on_conflict());
        assert!(Dialect::postgres("9.5").unwrap().supports_on_conflict());
    }

    #[test]
    fn test_require_messages() {
        let old = Dialect::mysql("5.7").unwrap();
        let err = old.require("WITH", old.with_cte_min_version()).unwrap_err();
        assert!(matches!(err, SqlError::NotSupported { .. }));
        assert!(err.to_string().contains("8.0"));

        let err = old.require("MERGE", old.merge_min_version()).unwrap_err();
        assert!(err.to_string().contains("not supported by MySQL"));
    }

    #[test]
    fn test_window_function_table() {
        let d = Dialect::latest(DialectKind::SqlServer);
        assert!(d.supports_window_function("row_number"));
        assert!(d.requires_order_by_in_window_function("ROW_NUMBER"));
        assert!(!d.requires_order_by_in_window_function("SUM"));
        assert_eq!(d.window_function_arity("LAG"), Some((1, 3)));
        assert!(!d.supports_window_function("NTH_VALUE"));
        assert!(Dialect::latest(DialectKind::Postgres).supports_window_function("NTH_VALUE"));
    }

    #[test]
    fn test_union_compatibility() {
        let pg = Dialect::latest(DialectKind::Postgres);
        let my = Dialect::latest(DialectKind::MySql);
        assert!(!pg.are_union_column_types_compatible(TypeCategory::Numeric, TypeCategory::Text));
        assert!(pg.are_union_column_types_compatible(TypeCategory::Null, TypeCategory::Text));
        assert!(my.are_union_column_types_compatible(TypeCategory::Numeric, TypeCategory::Text));
    }

    #[test]
    fn test_temporal_and_casts() {
        let my = Dialect::latest(DialectKind::MySql);
        assert_eq!(my.temporal_function("now").map(|f| f.kind), Some(TemporalKind::DateTime));
        assert!(my.temporal_function("CURRENT_DATE").unwrap().bare);
        assert!(my.is_integer_cast_type_name("signed"));
        assert!(!my.is_integer_cast_type_name("decimal"));
        let ms = Dialect::latest(DialectKind::SqlServer);
        assert!(ms.temporal_function("GETDATE").is_some());
        assert!(ms.temporal_function("NOW").is_none());
    }
}
