//! Vendor error catalogs
//!
//! Each dialect carries a table of `(code, message template)` pairs. Templates
//! use `{name}` placeholders filled by `render`. Postgres codes are the numeric
//! SQLSTATE where one exists and 0 otherwise; DB2 codes are SQLCODEs.

use super::Dialect;
use crate::error::SqlError;
use crate::types::Value;

#[derive(Debug, Clone, Copy)]
pub struct ErrorTemplate {
    pub code: i32,
    pub message: &'static str,
}

const fn t(code: i32, message: &'static str) -> ErrorTemplate {
    ErrorTemplate { code, message }
}

#[derive(Debug)]
pub struct ErrorCatalog {
    pub syntax: ErrorTemplate,
    pub not_supported: ErrorTemplate,
    pub duplicate_primary: ErrorTemplate,
    pub duplicate_unique: ErrorTemplate,
    pub not_null: ErrorTemplate,
    pub foreign_key_child: ErrorTemplate,
    pub foreign_key_parent: ErrorTemplate,
    pub too_long: ErrorTemplate,
    pub out_of_range: ErrorTemplate,
    pub invalid_member: ErrorTemplate,
    pub unknown_column: ErrorTemplate,
    pub unknown_table: ErrorTemplate,
    pub unknown_parameter: ErrorTemplate,
    pub already_exists: ErrorTemplate,
    pub type_mismatch: ErrorTemplate,
    pub division_by_zero: ErrorTemplate,
    pub union_column_count: ErrorTemplate,
    pub union_type_mismatch: ErrorTemplate,
    pub conflict_target: ErrorTemplate,
    /// `{statement}` is the statement that touched a target row twice
    pub row_affected_twice: ErrorTemplate,
}

pub(crate) static MYSQL_ERRORS: ErrorCatalog = ErrorCatalog {
    syntax: t(1064, "You have an error in your SQL syntax; {detail}"),
    not_supported: t(1235, "This version of MySQL doesn't yet support '{detail}'"),
    duplicate_primary: t(1062, "Duplicate entry '{value}' for key '{key}'"),
    duplicate_unique: t(1062, "Duplicate entry '{value}' for key '{key}'"),
    not_null: t(1048, "Column '{column}' cannot be null"),
    foreign_key_child: t(
        1452,
        "Cannot add or update a child row: a foreign key constraint fails (`{table}`, CONSTRAINT `{key}` FOREIGN KEY (`{column}`) REFERENCES `{ref_table}` (`{ref_column}`))",
    ),
    foreign_key_parent: t(
        1451,
        "Cannot delete or update a parent row: a foreign key constraint fails (`{table}`, CONSTRAINT `{key}` FOREIGN KEY (`{column}`) REFERENCES `{ref_table}` (`{ref_column}`))",
    ),
    too_long: t(1406, "Data too long for column '{column}' at row 1"),
    out_of_range: t(1264, "Out of range value for column '{column}' at row 1"),
    invalid_member: t(1265, "Data truncated for column '{column}' at row 1"),
    unknown_column: t(1054, "Unknown column '{name}' in 'field list'"),
    unknown_table: t(1146, "Table '{name}' doesn't exist"),
    unknown_parameter: t(0, "Parameter '{name}' must be defined."),
    already_exists: t(1050, "Table '{name}' already exists"),
    type_mismatch: t(1366, "Incorrect value: {detail}"),
    division_by_zero: t(1365, "Division by 0"),
    union_column_count: t(
        1222,
        "The used SELECT statements have a different number of columns",
    ),
    union_type_mismatch: t(1222, "Illegal mix of types {left} and {right} in UNION"),
    conflict_target: t(1064, "ON CONFLICT is not valid in MySQL"),
    row_affected_twice: t(1093, "{statement} cannot change the same row of the target table twice"),
};

pub(crate) static POSTGRES_ERRORS: ErrorCatalog = ErrorCatalog {
    syntax: t(42601, "syntax error: {detail}"),
    not_supported: t(0, "feature not supported: {detail}"),
    duplicate_primary: t(
        23505,
        "duplicate key value violates unique constraint \"{key}\" DETAIL: Key ({column})=({value}) already exists.",
    ),
    duplicate_unique: t(
        23505,
        "duplicate key value violates unique constraint \"{key}\" DETAIL: Key ({column})=({value}) already exists.",
    ),
    not_null: t(
        23502,
        "null value in column \"{column}\" of relation \"{table}\" violates not-null constraint",
    ),
    foreign_key_child: t(
        23503,
        "insert or update on table \"{table}\" violates foreign key constraint \"{key}\"",
    ),
    foreign_key_parent: t(
        23503,
        "update or delete on table \"{ref_table}\" violates foreign key constraint \"{key}\" on table \"{table}\"",
    ),
    too_long: t(22001, "value too long for type character varying({size})"),
    out_of_range: t(22003, "numeric field overflow"),
    invalid_member: t(0, "invalid input value for enum: \"{value}\""),
    unknown_column: t(42703, "column \"{name}\" does not exist"),
    unknown_table: t(0, "relation \"{name}\" does not exist"),
    unknown_parameter: t(0, "there is no parameter {name}"),
    already_exists: t(0, "relation \"{name}\" already exists"),
    type_mismatch: t(0, "operator does not exist: {detail}"),
    division_by_zero: t(22012, "division by zero"),
    union_column_count: t(42601, "each UNION query must have the same number of columns"),
    union_type_mismatch: t(42804, "UNION types {left} and {right} cannot be matched"),
    conflict_target: t(
        0,
        "there is no unique or exclusion constraint matching the ON CONFLICT specification",
    ),
    row_affected_twice: t(21000, "{statement} command cannot affect row a second time"),
};

pub(crate) static SQLSERVER_ERRORS: ErrorCatalog = ErrorCatalog {
    syntax: t(102, "Incorrect syntax: {detail}"),
    not_supported: t(0, "{detail}"),
    duplicate_primary: t(
        2627,
        "Violation of PRIMARY KEY constraint '{key}'. Cannot insert duplicate key in object 'dbo.{table}'. The duplicate key value is ({value}).",
    ),
    duplicate_unique: t(
        2601,
        "Cannot insert duplicate key row in object 'dbo.{table}' with unique index '{key}'. The duplicate key value is ({value}).",
    ),
    not_null: t(
        515,
        "Cannot insert the value NULL into column '{column}', table '{table}'; column does not allow nulls. INSERT fails.",
    ),
    foreign_key_child: t(
        547,
        "The INSERT statement conflicted with the FOREIGN KEY constraint \"{key}\". The conflict occurred in table \"dbo.{ref_table}\", column '{ref_column}'.",
    ),
    foreign_key_parent: t(
        547,
        "The DELETE statement conflicted with the REFERENCE constraint \"{key}\". The conflict occurred in table \"dbo.{table}\", column '{column}'.",
    ),
    too_long: t(
        2628,
        "String or binary data would be truncated in table '{table}', column '{column}'.",
    ),
    out_of_range: t(8115, "Arithmetic overflow error converting numeric to data type numeric."),
    invalid_member: t(
        547,
        "The INSERT statement conflicted with the CHECK constraint on column '{column}'.",
    ),
    unknown_column: t(207, "Invalid column name '{name}'."),
    unknown_table: t(208, "Invalid object name '{name}'."),
    unknown_parameter: t(137, "Must declare the scalar variable \"{name}\"."),
    already_exists: t(2714, "There is already an object named '{name}' in the database."),
    type_mismatch: t(245, "Conversion failed: {detail}"),
    division_by_zero: t(8134, "Divide by zero error encountered."),
    union_column_count: t(
        205,
        "All queries combined using a UNION, INTERSECT or EXCEPT operator must have an equal number of expressions in their target lists.",
    ),
    union_type_mismatch: t(245, "Conversion failed when converting {left} to {right}."),
    conflict_target: t(102, "Incorrect syntax near 'ON CONFLICT'."),
    row_affected_twice: t(
        8672,
        "The {statement} statement attempted to UPDATE or DELETE the same row more than once. A target row matched more than one source row.",
    ),
};

pub(crate) static ORACLE_ERRORS: ErrorCatalog = ErrorCatalog {
    syntax: t(900, "ORA-00900: invalid SQL statement: {detail}"),
    not_supported: t(3001, "ORA-03001: unimplemented feature: {detail}"),
    duplicate_primary: t(1, "ORA-00001: unique constraint ({key}) violated"),
    duplicate_unique: t(1, "ORA-00001: unique constraint ({key}) violated"),
    not_null: t(1400, "ORA-01400: cannot insert NULL into (\"{table}\".\"{column}\")"),
    foreign_key_child: t(
        2291,
        "ORA-02291: integrity constraint ({key}) violated - parent key not found",
    ),
    foreign_key_parent: t(
        2292,
        "ORA-02292: integrity constraint ({key}) violated - child record found",
    ),
    too_long: t(
        12899,
        "ORA-12899: value too large for column \"{table}\".\"{column}\" (actual: {actual}, maximum: {size})",
    ),
    out_of_range: t(
        1438,
        "ORA-01438: value larger than specified precision allowed for this column",
    ),
    invalid_member: t(2290, "ORA-02290: check constraint ({column}) violated"),
    unknown_column: t(904, "ORA-00904: \"{name}\": invalid identifier"),
    unknown_table: t(942, "ORA-00942: table or view does not exist"),
    unknown_parameter: t(1008, "ORA-01008: not all variables bound"),
    already_exists: t(955, "ORA-00955: name is already used by an existing object"),
    type_mismatch: t(932, "ORA-00932: inconsistent datatypes: {detail}"),
    division_by_zero: t(1476, "ORA-01476: divisor is equal to zero"),
    union_column_count: t(1789, "ORA-01789: query block has incorrect number of result columns"),
    union_type_mismatch: t(
        1790,
        "ORA-01790: expression must have same datatype as corresponding expression",
    ),
    conflict_target: t(933, "ORA-00933: SQL command not properly ended"),
    row_affected_twice: t(30926, "ORA-30926: unable to get a stable set of rows in the source tables"),
};

pub(crate) static SQLITE_ERRORS: ErrorCatalog = ErrorCatalog {
    syntax: t(1, "syntax error: {detail}"),
    not_supported: t(1, "{detail}"),
    duplicate_primary: t(1555, "UNIQUE constraint failed: {table}.{column}"),
    duplicate_unique: t(2067, "UNIQUE constraint failed: {table}.{column}"),
    not_null: t(1299, "NOT NULL constraint failed: {table}.{column}"),
    foreign_key_child: t(787, "FOREIGN KEY constraint failed"),
    foreign_key_parent: t(787, "FOREIGN KEY constraint failed"),
    too_long: t(275, "CHECK constraint failed: {column}"),
    out_of_range: t(275, "CHECK constraint failed: {column}"),
    invalid_member: t(275, "CHECK constraint failed: {column}"),
    unknown_column: t(1, "no such column: {name}"),
    unknown_table: t(1, "no such table: {name}"),
    unknown_parameter: t(25, "no value bound for parameter {name}"),
    already_exists: t(1, "table {name} already exists"),
    type_mismatch: t(20, "datatype mismatch: {detail}"),
    division_by_zero: t(1, "division by zero"),
    union_column_count: t(
        1,
        "SELECTs to the left and right of UNION do not have the same number of result columns",
    ),
    union_type_mismatch: t(20, "datatype mismatch: {left} and {right}"),
    conflict_target: t(
        1,
        "ON CONFLICT clause does not match any PRIMARY KEY or UNIQUE constraint",
    ),
    row_affected_twice: t(1, "{statement} would modify the same row more than once"),
};

pub(crate) static DB2_ERRORS: ErrorCatalog = ErrorCatalog {
    syntax: t(-104, "An unexpected token was found: {detail}. SQLSTATE=42601"),
    not_supported: t(-142, "The SQL statement is not supported: {detail}"),
    duplicate_primary: t(
        -803,
        "One or more values in the INSERT statement, UPDATE statement, or foreign key update caused by a DELETE statement are not valid because the primary key, unique constraint or unique index identified by \"{key}\" constrains table \"{table}\" from having duplicate values for the index key.",
    ),
    duplicate_unique: t(
        -803,
        "One or more values in the INSERT statement, UPDATE statement, or foreign key update caused by a DELETE statement are not valid because the primary key, unique constraint or unique index identified by \"{key}\" constrains table \"{table}\" from having duplicate values for the index key.",
    ),
    not_null: t(
        -407,
        "Assignment of a NULL value to a NOT NULL column \"{table}.{column}\" is not allowed.",
    ),
    foreign_key_child: t(
        -530,
        "The INSERT or UPDATE value of the FOREIGN KEY \"{key}\" is not equal to any value of the parent key of the parent table.",
    ),
    foreign_key_parent: t(
        -532,
        "A parent row cannot be deleted because the relationship \"{key}\" restricts the deletion.",
    ),
    too_long: t(-433, "Value \"{value}\" is too long for column \"{column}\"."),
    out_of_range: t(-413, "Overflow occurred during numeric data type conversion."),
    invalid_member: t(
        -545,
        "The requested operation is not allowed because a row does not satisfy the check constraint on column \"{column}\".",
    ),
    unknown_column: t(-206, "\"{name}\" is not valid in the context where it is used."),
    unknown_table: t(-204, "\"{name}\" is an undefined name."),
    unknown_parameter: t(-313, "The number of host variables is not equal to the number of parameter markers ({name})."),
    already_exists: t(-601, "The name of the object to be created is identical to the existing name \"{name}\" of type TABLE."),
    type_mismatch: t(-401, "The data types of the operands for the operation are not compatible: {detail}"),
    division_by_zero: t(-801, "Division by zero was attempted."),
    union_column_count: t(-421, "The operands of a set operator do not have the same number of columns."),
    union_type_mismatch: t(-415, "The corresponding columns, {left} and {right}, of the operands of a set operator are not compatible."),
    conflict_target: t(-104, "An unexpected token \"ON CONFLICT\" was found."),
    row_affected_twice: t(-788, "The same row of target table \"{table}\" was identified more than once for an update, delete or insert operation of the {statement} statement."),
};

/// Fill `{placeholder}` slots in a template
fn render(template: &str, args: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (key, value) in args {
        out = out.replace(&format!("{{{}}}", key), value);
    }
    out
}

/// Value text as it appears inside vendor duplicate-key messages
fn value_text(values: &[Value]) -> String {
    values
        .iter()
        .map(|v| match v {
            Value::Null => "NULL".to_string(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join("-")
}

impl Dialect {
    fn render_error(&self, pick: fn(&ErrorCatalog) -> ErrorTemplate, args: &[(&str, &str)]) -> (i32, String) {
        let template = pick(self.errors());
        (template.code, render(template.message, args))
    }

    pub fn syntax_error(&self, detail: &str) -> SqlError {
        let (code, message) = self.render_error(|c| c.syntax, &[("detail", detail)]);
        SqlError::Parse { code, message }
    }

    pub fn not_supported(&self, detail: &str) -> SqlError {
        let (code, message) = self.render_error(|c| c.not_supported, &[("detail", detail)]);
        SqlError::NotSupported { code, message }
    }

    /// Unique index violation; `primary` selects the primary-key wording
    pub fn duplicate_key(
        &self,
        table: &str,
        key: &str,
        columns: &[String],
        values: &[Value],
        primary: bool,
    ) -> SqlError {
        let value = value_text(values);
        let column = columns.join(", ");
        let args = [
            ("table", table),
            ("key", key),
            ("column", column.as_str()),
            ("value", value.as_str()),
        ];
        let (code, message) = if primary {
            self.render_error(|c| c.duplicate_primary, &args)
        } else {
            self.render_error(|c| c.duplicate_unique, &args)
        };
        SqlError::DuplicateKey {
            code,
            key: key.to_string(),
            value,
            message,
        }
    }

    pub fn not_null_violation(&self, table: &str, column: &str) -> SqlError {
        let (code, message) =
            self.render_error(|c| c.not_null, &[("table", table), ("column", column)]);
        SqlError::NotNull {
            code,
            column: column.to_string(),
            message,
        }
    }

    /// Child row references a missing parent
    pub fn foreign_key_child_violation(
        &self,
        table: &str,
        constraint: &str,
        column: &str,
        ref_table: &str,
        ref_column: &str,
    ) -> SqlError {
        let args = [
            ("table", table),
            ("key", constraint),
            ("column", column),
            ("ref_table", ref_table),
            ("ref_column", ref_column),
        ];
        let (code, message) = self.render_error(|c| c.foreign_key_child, &args);
        SqlError::ForeignKey {
            code,
            constraint: constraint.to_string(),
            message,
        }
    }

    /// Parent row is still referenced by `child_table`
    pub fn foreign_key_parent_violation(
        &self,
        child_table: &str,
        constraint: &str,
        column: &str,
        ref_table: &str,
        ref_column: &str,
    ) -> SqlError {
        let args = [
            ("table", child_table),
            ("key", constraint),
            ("column", column),
            ("ref_table", ref_table),
            ("ref_column", ref_column),
        ];
        let (code, message) = self.render_error(|c| c.foreign_key_parent, &args);
        SqlError::ForeignKey {
            code,
            constraint: constraint.to_string(),
            message,
        }
    }

    pub fn value_too_long(&self, table: &str, column: &str, size: u32, value: &str) -> SqlError {
        let size = size.to_string();
        let actual = value.chars().count().to_string();
        let args = [
            ("table", table),
            ("column", column),
            ("size", size.as_str()),
            ("actual", actual.as_str()),
            ("value", value),
        ];
        let (code, message) = self.render_error(|c| c.too_long, &args);
        SqlError::ValueOutOfRange {
            code,
            column: column.to_string(),
            message,
        }
    }

    pub fn value_out_of_range(&self, table: &str, column: &str) -> SqlError {
        let (code, message) =
            self.render_error(|c| c.out_of_range, &[("table", table), ("column", column)]);
        SqlError::ValueOutOfRange {
            code,
            column: column.to_string(),
            message,
        }
    }

    /// Value is not a member of an ENUM/SET column
    pub fn invalid_member(&self, table: &str, column: &str, value: &str) -> SqlError {
        let args = [("table", table), ("column", column), ("value", value)];
        let (code, message) = self.render_error(|c| c.invalid_member, &args);
        SqlError::ValueOutOfRange {
            code,
            column: column.to_string(),
            message,
        }
    }

    pub fn unknown_column(&self, name: &str) -> SqlError {
        let (code, message) = self.render_error(|c| c.unknown_column, &[("name", name)]);
        SqlError::UnknownColumn {
            code,
            name: name.to_string(),
            message,
        }
    }

    pub fn unknown_table(&self, name: &str) -> SqlError {
        let (code, message) = self.render_error(|c| c.unknown_table, &[("name", name)]);
        SqlError::UnknownTable {
            code,
            name: name.to_string(),
            message,
        }
    }

    pub fn unknown_parameter(&self, name: &str) -> SqlError {
        let (code, message) = self.render_error(|c| c.unknown_parameter, &[("name", name)]);
        SqlError::UnknownParameter {
            code,
            name: name.to_string(),
            message,
        }
    }

    pub fn already_exists(&self, name: &str) -> SqlError {
        let (code, message) = self.render_error(|c| c.already_exists, &[("name", name)]);
        SqlError::AlreadyExists {
            code,
            name: name.to_string(),
            message,
        }
    }

    pub fn type_mismatch(&self, detail: &str) -> SqlError {
        let (code, message) = self.render_error(|c| c.type_mismatch, &[("detail", detail)]);
        SqlError::TypeMismatch { code, message }
    }

    pub fn division_by_zero(&self) -> SqlError {
        let (code, message) = self.render_error(|c| c.division_by_zero, &[]);
        SqlError::DivisionByZero { code, message }
    }

    pub fn union_column_count_mismatch(&self) -> SqlError {
        let (code, message) = self.render_error(|c| c.union_column_count, &[]);
        SqlError::Parse { code, message }
    }

    pub fn union_type_mismatch(&self, left: &str, right: &str) -> SqlError {
        let (code, message) =
            self.render_error(|c| c.union_type_mismatch, &[("left", left), ("right", right)]);
        SqlError::TypeMismatch { code, message }
    }

    /// One statement changed the same target row more than once
    pub fn row_affected_twice(&self, statement: &str, table: &str) -> SqlError {
        let (code, message) = self.render_error(
            |c| c.row_affected_twice,
            &[("statement", statement), ("table", table)],
        );
        SqlError::Cardinality { code, message }
    }

    pub fn conflict_target_mismatch(&self) -> SqlError {
        let (code, message) = self.render_error(|c| c.conflict_target, &[]);
        SqlError::InvalidArgument(format!("{} (code {})", message, code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::DialectKind;

    #[test]
    fn test_mysql_duplicate_key() {
        let d = Dialect::latest(DialectKind::MySql);
        let err = d.duplicate_key("users", "PRIMARY", &["id".into()], &[Value::Integer(1)], true);
        assert_eq!(err.code(), 1062);
        assert_eq!(err.to_string(), "Duplicate entry '1' for key 'PRIMARY'");
    }

    #[test]
    fn test_sql_server_primary_vs_unique() {
        let d = Dialect::latest(DialectKind::SqlServer);
        let pk = d.duplicate_key("users", "PK_users", &["id".into()], &[Value::Integer(1)], true);
        let ux = d.duplicate_key("users", "ux_email", &["email".into()], &["a".into()], false);
        assert_eq!(pk.code(), 2627);
        assert_eq!(ux.code(), 2601);
        assert!(ux.to_string().contains("ux_email"));
    }

    #[test]
    fn test_codes_per_dialect() {
        let cases = [
            (DialectKind::MySql, 1054, 1048),
            (DialectKind::Postgres, 42703, 23502),
            (DialectKind::SqlServer, 207, 515),
            (DialectKind::Oracle, 904, 1400),
            (DialectKind::Sqlite, 1, 1299),
            (DialectKind::Db2, -206, -407),
        ];
        for (kind, unknown_col, not_null) in cases {
            let d = Dialect::latest(kind);
            assert_eq!(d.unknown_column("x").code(), unknown_col);
            assert_eq!(d.not_null_violation("t", "x").code(), not_null);
        }
    }

    #[test]
    fn test_foreign_key_messages() {
        let d = Dialect::latest(DialectKind::MySql);
        let err = d.foreign_key_parent_violation("orders", "fk_orders_user", "user_id", "users", "id");
        assert_eq!(err.code(), 1451);
        assert!(err.to_string().contains("`orders`"));
        let err = d.foreign_key_child_violation("orders", "fk_orders_user", "user_id", "users", "id");
        assert_eq!(err.code(), 1452);
    }

    #[test]
    fn test_row_affected_twice() {
        let pg = Dialect::latest(DialectKind::Postgres).row_affected_twice("ON CONFLICT DO UPDATE", "t");
        assert_eq!(pg.code(), 21000);
        assert_eq!(pg.sql_state(), "21000");
        assert_eq!(pg.to_string(), "ON CONFLICT DO UPDATE command cannot affect row a second time");

        let mssql = Dialect::latest(DialectKind::SqlServer).row_affected_twice("MERGE", "t");
        assert_eq!(mssql.code(), 8672);
        assert_eq!(Dialect::latest(DialectKind::Oracle).row_affected_twice("MERGE", "t").code(), 30926);
    }

    #[test]
    fn test_render_leaves_unknown_placeholders() {
        assert_eq!(render("a {x} {y}", &[("x", "1")]), "a 1 {y}");
    }
}
