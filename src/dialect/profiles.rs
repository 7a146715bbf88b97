//! Static per-vendor capability tables

use super::errors::{
    ErrorCatalog, DB2_ERRORS, MYSQL_ERRORS, ORACLE_ERRORS, POSTGRES_ERRORS, SQLITE_ERRORS,
    SQLSERVER_ERRORS,
};
use super::{
    DialectKind, QuoteStyle, TemporalFunction, TemporalKind, TextComparison, UnionCompat,
    UpsertCounts, WindowFunctionSpec,
};

pub(crate) struct DialectProfile {
    pub name: &'static str,
    pub default_version: u32,

    // lexical
    /// First entry is the style used when printing identifiers
    pub identifier_quotes: &'static [QuoteStyle],
    pub double_quote_is_string: bool,
    pub backslash_escapes: bool,
    pub pipes_as_concat: bool,

    // version gates (None = never supported)
    pub cte_min_version: Option<u32>,
    pub merge_min_version: Option<u32>,
    pub window_functions_min_version: Option<u32>,
    pub on_conflict_min_version: Option<u32>,
    pub offset_fetch_min_version: Option<u32>,

    // grammar
    pub on_duplicate_key_update: bool,
    pub insert_ignore: bool,
    pub limit_offset: bool,
    pub top: bool,
    pub table_hints: bool,
    pub option_clause: bool,

    // typing
    pub window_functions: &'static [WindowFunctionSpec],
    pub union_compat: UnionCompat,
    pub integer_cast_types: &'static [&'static str],
    pub like_case_insensitive: bool,
    pub text_comparison: TextComparison,
    pub implicit_numeric_string_comparison: bool,
    pub supports_triggers: bool,
    pub temporal_functions: &'static [TemporalFunction],

    // runtime
    pub plus_concatenates: bool,
    pub integer_division: bool,
    pub division_by_zero_null: bool,
    pub nulls_first: bool,
    pub unique_nulls_distinct: bool,
    pub update_counts_changed_only: bool,
    /// ON CONFLICT DO UPDATE fails when two input rows hit the same target row
    pub upsert_rejects_repeat_update: bool,
    pub upsert_counts: UpsertCounts,
    /// `{table}` is replaced by the table name
    pub primary_key_name: &'static str,
    pub errors: &'static ErrorCatalog,
}

pub(crate) fn profile(kind: DialectKind) -> &'static DialectProfile {
    match kind {
        DialectKind::MySql => &MYSQL,
        DialectKind::Postgres => &POSTGRES,
        DialectKind::SqlServer => &SQLSERVER,
        DialectKind::Oracle => &ORACLE,
        DialectKind::Sqlite => &SQLITE,
        DialectKind::Db2 => &DB2,
    }
}

/// SQL Server product year -> internal major version
static SQLSERVER_RELEASES: &[(u32, u32)] = &[
    (2000, 800),
    (2005, 900),
    (2008, 1000),
    (2012, 1100),
    (2014, 1200),
    (2016, 1300),
    (2017, 1400),
    (2019, 1500),
    (2022, 1600),
];

pub(crate) fn sql_server_year_to_version(year: u32) -> Option<u32> {
    SQLSERVER_RELEASES
        .iter()
        .find(|(y, _)| *y == year)
        .map(|(_, v)| *v)
}

const fn window(
    name: &'static str,
    min_args: usize,
    max_args: usize,
    requires_order_by: bool,
) -> WindowFunctionSpec {
    WindowFunctionSpec {
        name,
        min_args,
        max_args,
        requires_order_by,
    }
}

const fn temporal(name: &'static str, kind: TemporalKind, bare: bool) -> TemporalFunction {
    TemporalFunction { name, kind, bare }
}

static STANDARD_WINDOW_FUNCTIONS: &[WindowFunctionSpec] = &[
    window("ROW_NUMBER", 0, 0, true),
    window("RANK", 0, 0, true),
    window("DENSE_RANK", 0, 0, true),
    window("PERCENT_RANK", 0, 0, true),
    window("CUME_DIST", 0, 0, true),
    window("NTILE", 1, 1, true),
    window("LAG", 1, 3, true),
    window("LEAD", 1, 3, true),
    window("FIRST_VALUE", 1, 1, false),
    window("LAST_VALUE", 1, 1, false),
    window("NTH_VALUE", 2, 2, false),
    window("COUNT", 0, 1, false),
    window("SUM", 1, 1, false),
    window("AVG", 1, 1, false),
    window("MIN", 1, 1, false),
    window("MAX", 1, 1, false),
];

// NTH_VALUE is absent from SQL Server and DB2
static NO_NTH_VALUE_WINDOW_FUNCTIONS: &[WindowFunctionSpec] = &[
    window("ROW_NUMBER", 0, 0, true),
    window("RANK", 0, 0, true),
    window("DENSE_RANK", 0, 0, true),
    window("PERCENT_RANK", 0, 0, true),
    window("CUME_DIST", 0, 0, true),
    window("NTILE", 1, 1, true),
    window("LAG", 1, 3, true),
    window("LEAD", 1, 3, true),
    window("FIRST_VALUE", 1, 1, false),
    window("LAST_VALUE", 1, 1, false),
    window("COUNT", 0, 1, false),
    window("SUM", 1, 1, false),
    window("AVG", 1, 1, false),
    window("MIN", 1, 1, false),
    window("MAX", 1, 1, false),
];

const ONE_PER_ROW: UpsertCounts = UpsertCounts {
    inserted: 1,
    updated: 1,
    unchanged: 1,
};

static MYSQL: DialectProfile = DialectProfile {
    name: "MySQL",
    default_version: 800,
    identifier_quotes: &[QuoteStyle::Backtick],
    double_quote_is_string: true,
    backslash_escapes: true,
    pipes_as_concat: false,
    cte_min_version: Some(800),
    merge_min_version: None,
    window_functions_min_version: Some(800),
    on_conflict_min_version: None,
    offset_fetch_min_version: None,
    on_duplicate_key_update: true,
    insert_ignore: true,
    limit_offset: true,
    top: false,
    table_hints: false,
    option_clause: false,
    window_functions: STANDARD_WINDOW_FUNCTIONS,
    union_compat: UnionCompat::Lenient,
    integer_cast_types: &["SIGNED", "UNSIGNED", "SIGNED INTEGER", "UNSIGNED INTEGER", "INTEGER"],
    like_case_insensitive: true,
    text_comparison: TextComparison::CaseInsensitive,
    implicit_numeric_string_comparison: true,
    supports_triggers: true,
    temporal_functions: &[
        temporal("CURRENT_DATE", TemporalKind::Date, true),
        temporal("CURDATE", TemporalKind::Date, false),
        temporal("UTC_DATE", TemporalKind::Date, false),
        temporal("NOW", TemporalKind::DateTime, false),
        temporal("SYSDATE", TemporalKind::DateTime, false),
        temporal("UTC_TIMESTAMP", TemporalKind::DateTime, false),
        temporal("CURRENT_TIMESTAMP", TemporalKind::DateTime, true),
        temporal("LOCALTIMESTAMP", TemporalKind::DateTime, true),
    ],
    plus_concatenates: false,
    integer_division: false,
    division_by_zero_null: true,
    nulls_first: true,
    unique_nulls_distinct: true,
    update_counts_changed_only: true,
    upsert_rejects_repeat_update: false,
    upsert_counts: UpsertCounts {
        inserted: 1,
        updated: 2,
        unchanged: 0,
    },
    primary_key_name: "PRIMARY",
    errors: &MYSQL_ERRORS,
};

static POSTGRES: DialectProfile = DialectProfile {
    name: "PostgreSQL",
    default_version: 1600,
    identifier_quotes: &[QuoteStyle::Double],
    double_quote_is_string: false,
    backslash_escapes: false,
    pipes_as_concat: true,
    cte_min_version: Some(804),
    merge_min_version: Some(1500),
    window_functions_min_version: Some(804),
    on_conflict_min_version: Some(905),
    offset_fetch_min_version: Some(804),
    on_duplicate_key_update: false,
    insert_ignore: false,
    limit_offset: true,
    top: false,
    table_hints: false,
    option_clause: false,
    window_functions: STANDARD_WINDOW_FUNCTIONS,
    union_compat: UnionCompat::SameCategory,
    integer_cast_types: &["INT", "INTEGER", "INT2", "INT4", "INT8", "SMALLINT", "BIGINT"],
    like_case_insensitive: false,
    text_comparison: TextComparison::Ordinal,
    implicit_numeric_string_comparison: false,
    supports_triggers: true,
    temporal_functions: &[
        temporal("CURRENT_DATE", TemporalKind::Date, true),
        temporal("CURRENT_TIMESTAMP", TemporalKind::DateTime, true),
        temporal("LOCALTIMESTAMP", TemporalKind::DateTime, true),
        temporal("NOW", TemporalKind::DateTime, false),
        temporal("CLOCK_TIMESTAMP", TemporalKind::DateTime, false),
        temporal("STATEMENT_TIMESTAMP", TemporalKind::DateTime, false),
        temporal("TRANSACTION_TIMESTAMP", TemporalKind::DateTime, false),
    ],
    plus_concatenates: false,
    integer_division: true,
    division_by_zero_null: false,
    nulls_first: false,
    unique_nulls_distinct: true,
    update_counts_changed_only: false,
    upsert_rejects_repeat_update: true,
    upsert_counts: ONE_PER_ROW,
    primary_key_name: "{table}_pkey",
    errors: &POSTGRES_ERRORS,
};

static SQLSERVER: DialectProfile = DialectProfile {
    name: "SQL Server",
    default_version: 1600,
    identifier_quotes: &[QuoteStyle::Bracket, QuoteStyle::Double],
    double_quote_is_string: false,
    backslash_escapes: false,
    pipes_as_concat: false,
    cte_min_version: Some(900),
    merge_min_version: Some(1000),
    window_functions_min_version: Some(900),
    on_conflict_min_version: None,
    offset_fetch_min_version: Some(1100),
    on_duplicate_key_update: false,
    insert_ignore: false,
    limit_offset: false,
    top: true,
    table_hints: true,
    option_clause: true,
    window_functions: NO_NTH_VALUE_WINDOW_FUNCTIONS,
    union_compat: UnionCompat::NumericBoolean,
    integer_cast_types: &["INT", "INTEGER", "BIGINT", "SMALLINT", "TINYINT"],
    like_case_insensitive: true,
    text_comparison: TextComparison::CaseInsensitive,
    implicit_numeric_string_comparison: true,
    supports_triggers: true,
    temporal_functions: &[
        temporal("GETDATE", TemporalKind::DateTime, false),
        temporal("GETUTCDATE", TemporalKind::DateTime, false),
        temporal("SYSDATETIME", TemporalKind::DateTime, false),
        temporal("SYSUTCDATETIME", TemporalKind::DateTime, false),
        temporal("CURRENT_TIMESTAMP", TemporalKind::DateTime, true),
    ],
    plus_concatenates: true,
    integer_division: true,
    division_by_zero_null: false,
    nulls_first: true,
    unique_nulls_distinct: false,
    update_counts_changed_only: false,
    upsert_rejects_repeat_update: false,
    upsert_counts: ONE_PER_ROW,
    primary_key_name: "PK_{table}",
    errors: &SQLSERVER_ERRORS,
};

static ORACLE: DialectProfile = DialectProfile {
    name: "Oracle",
    default_version: 1900,
    identifier_quotes: &[QuoteStyle::Double],
    double_quote_is_string: false,
    backslash_escapes: false,
    pipes_as_concat: true,
    cte_min_version: Some(902),
    merge_min_version: Some(900),
    window_functions_min_version: Some(801),
    on_conflict_min_version: None,
    offset_fetch_min_version: Some(1200),
    on_duplicate_key_update: false,
    insert_ignore: false,
    limit_offset: false,
    top: false,
    table_hints: false,
    option_clause: false,
    window_functions: STANDARD_WINDOW_FUNCTIONS,
    union_compat: UnionCompat::SameCategory,
    integer_cast_types: &["INT", "INTEGER", "SMALLINT"],
    like_case_insensitive: false,
    text_comparison: TextComparison::Ordinal,
    implicit_numeric_string_comparison: true,
    supports_triggers: true,
    temporal_functions: &[
        temporal("SYSDATE", TemporalKind::DateTime, true),
        temporal("SYSTIMESTAMP", TemporalKind::DateTime, true),
        temporal("CURRENT_DATE", TemporalKind::DateTime, true),
        temporal("CURRENT_TIMESTAMP", TemporalKind::DateTime, true),
        temporal("LOCALTIMESTAMP", TemporalKind::DateTime, true),
    ],
    plus_concatenates: false,
    integer_division: false,
    division_by_zero_null: false,
    nulls_first: false,
    unique_nulls_distinct: true,
    update_counts_changed_only: false,
    upsert_rejects_repeat_update: false,
    upsert_counts: ONE_PER_ROW,
    primary_key_name: "PK_{table}",
    errors: &ORACLE_ERRORS,
};

static SQLITE: DialectProfile = DialectProfile {
    name: "SQLite",
    default_version: 345,
    identifier_quotes: &[QuoteStyle::Double, QuoteStyle::Backtick, QuoteStyle::Bracket],
    double_quote_is_string: false,
    backslash_escapes: false,
    pipes_as_concat: true,
    cte_min_version: Some(308),
    merge_min_version: None,
    window_functions_min_version: Some(325),
    on_conflict_min_version: Some(324),
    offset_fetch_min_version: None,
    on_duplicate_key_update: false,
    insert_ignore: false,
    limit_offset: true,
    top: false,
    table_hints: false,
    option_clause: false,
    window_functions: STANDARD_WINDOW_FUNCTIONS,
    union_compat: UnionCompat::Lenient,
    integer_cast_types: &["INT", "INTEGER", "BIGINT"],
    like_case_insensitive: true,
    text_comparison: TextComparison::Ordinal,
    implicit_numeric_string_comparison: true,
    supports_triggers: true,
    temporal_functions: &[
        temporal("CURRENT_DATE", TemporalKind::Date, true),
        temporal("CURRENT_TIMESTAMP", TemporalKind::DateTime, true),
    ],
    plus_concatenates: false,
    integer_division: true,
    division_by_zero_null: true,
    nulls_first: true,
    unique_nulls_distinct: true,
    update_counts_changed_only: false,
    upsert_rejects_repeat_update: false,
    upsert_counts: ONE_PER_ROW,
    primary_key_name: "pk_{table}",
    errors: &SQLITE_ERRORS,
};

static DB2: DialectProfile = DialectProfile {
    name: "DB2",
    default_version: 1105,
    identifier_quotes: &[QuoteStyle::Double],
    double_quote_is_string: false,
    backslash_escapes: false,
    pipes_as_concat: true,
    cte_min_version: Some(800),
    merge_min_version: Some(901),
    window_functions_min_version: Some(800),
    on_conflict_min_version: None,
    offset_fetch_min_version: Some(1101),
    on_duplicate_key_update: false,
    insert_ignore: false,
    limit_offset: true,
    top: false,
    table_hints: false,
    option_clause: false,
    window_functions: NO_NTH_VALUE_WINDOW_FUNCTIONS,
    union_compat: UnionCompat::SameCategory,
    integer_cast_types: &["INT", "INTEGER", "BIGINT", "SMALLINT"],
    like_case_insensitive: false,
    text_comparison: TextComparison::Ordinal,
    implicit_numeric_string_comparison: true,
    supports_triggers: true,
    temporal_functions: &[
        temporal("CURRENT_DATE", TemporalKind::Date, true),
        temporal("CURRENT DATE", TemporalKind::Date, true),
        temporal("CURRENT_TIMESTAMP", TemporalKind::DateTime, true),
        temporal("CURRENT TIMESTAMP", TemporalKind::DateTime, true),
    ],
    plus_concatenates: false,
    integer_division: true,
    division_by_zero_null: false,
    nulls_first: false,
    unique_nulls_distinct: true,
    update_counts_changed_only: false,
    upsert_rejects_repeat_update: false,
    upsert_counts: ONE_PER_ROW,
    primary_key_name: "PK_{table}",
    errors: &DB2_ERRORS,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_kind_has_profile() {
        for kind in DialectKind::all() {
            let p = profile(kind);
            assert!(!p.name.is_empty());
            assert!(!p.identifier_quotes.is_empty());
            assert!(p.cte_min_version.is_some());
        }
    }

    #[test]
    fn test_sql_server_years() {
        assert_eq!(sql_server_year_to_version(2019), Some(1500));
        assert_eq!(sql_server_year_to_version(1999), None);
    }
}
