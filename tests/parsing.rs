//! # Parser and Printer Test Suite
//!
//! Precedence, canonical negation, print/parse round trips, script splitting
//! and dialect version gating, exercised through the public entry points.
//!
//! ```sh
//! cargo test --test parsing
//! ```

use mockdb::sql::ast::{BinaryOperator, Expr};
use mockdb::{parse, parse_multi, parse_where, print_expr, split_statements, Dialect, DialectKind, SqlError};

fn mysql() -> Dialect {
    Dialect::latest(DialectKind::MySql)
}

// ============================================================================
// PRECEDENCE
// ============================================================================

mod precedence_tests {
    use super::*;

    #[test]
    fn and_binds_tighter_than_or() -> anyhow::Result<()> {
        let e = parse_where("id = 1 OR id = 2 AND name = 'Bob'", &mysql())?;
        let Expr::BinaryOp { op, left, right } = e else {
            panic!("expected a binary root");
        };
        assert_eq!(op, BinaryOperator::Or);
        assert!(matches!(*left, Expr::BinaryOp { op: BinaryOperator::Eq, .. }));
        assert!(matches!(*right, Expr::BinaryOp { op: BinaryOperator::And, .. }));
        Ok(())
    }

    #[test]
    fn parentheses_override_precedence() -> anyhow::Result<()> {
        let e = parse_where("(id = 1 OR id = 2) AND email IS NULL", &mysql())?;
        let Expr::BinaryOp { op, left, right } = e else {
            panic!("expected a binary root");
        };
        assert_eq!(op, BinaryOperator::And);
        assert!(matches!(*left, Expr::BinaryOp { op: BinaryOperator::Or, .. }));
        assert!(matches!(*right, Expr::IsNull { negated: false, .. }));
        Ok(())
    }

    #[test]
    fn is_not_null_is_a_negated_is_null() -> anyhow::Result<()> {
        let e = parse_where("email IS NOT NULL", &mysql())?;
        assert!(matches!(e, Expr::IsNull { negated: true, .. }));
        Ok(())
    }
}

// ============================================================================
// ROUND TRIP
// ============================================================================

mod round_trip_tests {
    use super::*;

    fn assert_stable(source: &str) {
        let dialect = mysql();
        let first = print_expr(&parse_where(source, &dialect).unwrap());
        let second = print_expr(&parse_where(&first, &dialect).unwrap());
        assert_eq!(first, second, "printing '{}' is not stable", source);
    }

    #[test]
    fn printed_expressions_reparse_to_the_same_text() {
        for source in [
            "id = 1 OR id = 2 AND name = 'Bob'",
            "(id = 1 OR id = 2) AND email IS NULL",
            "email IS NOT NULL",
            "NOT (a = 1)",
            "price * qty - discount / 2",
            "name LIKE 'A%' AND id NOT IN (1, 2, 3)",
            "amount BETWEEN 10 AND 20",
            "CASE WHEN a > 1 THEN 'big' ELSE 'small' END",
            "COALESCE(nickname, name, 'n/a')",
            "CAST(price AS DECIMAL(10,2)) > 3.5",
            "note = 'it''s'",
            "id = @id OR id = ?",
        ] {
            assert_stable(source);
        }
    }
}

// ============================================================================
// SCRIPT SPLITTING
// ============================================================================

mod splitting_tests {
    use super::*;

    #[test]
    fn semicolons_inside_literals_and_identifiers_do_not_split() -> anyhow::Result<()> {
        let sql = "SELECT ';' , CONCAT('a;','b') FROM `semi;table`; SELECT 2;";
        let parts = split_statements(sql, &mysql())?;
        assert_eq!(parts.len(), 2);
        assert!(parts[0].contains("`semi;table`"));
        assert!(parts[0].contains("CONCAT('a;','b')"));
        assert_eq!(parts[1].trim(), "SELECT 2");
        Ok(())
    }

    #[test]
    fn parse_multi_returns_one_statement_per_part() -> anyhow::Result<()> {
        let statements = parse_multi("SELECT 1; SELECT 2; SELECT 3", &mysql())?;
        assert_eq!(statements.len(), 3);
        Ok(())
    }
}

// ============================================================================
// VERSION GATING AND ERROR MESSAGES
// ============================================================================

mod gating_tests {
    use super::*;

    #[test]
    fn cte_requires_mysql_8() -> anyhow::Result<()> {
        let sql = "WITH x AS (SELECT 1 AS a) SELECT a FROM x";
        let err = parse(sql, &Dialect::mysql("5.7")?).unwrap_err();
        assert!(matches!(err, SqlError::NotSupported { .. }));
        assert!(parse(sql, &Dialect::mysql("8.0")?).is_ok());
        Ok(())
    }

    #[test]
    fn merge_requires_postgres_15() -> anyhow::Result<()> {
        let sql = "MERGE INTO t USING s ON t.id = s.id \
                   WHEN MATCHED THEN UPDATE SET name = s.name \
                   WHEN NOT MATCHED THEN INSERT (id, name) VALUES (s.id, s.name)";
        assert!(matches!(
            parse(sql, &Dialect::postgres("14")?).unwrap_err(),
            SqlError::NotSupported { .. }
        ));
        assert!(parse(sql, &Dialect::postgres("15")?).is_ok());
        Ok(())
    }

    #[test]
    fn window_functions_require_mysql_8() -> anyhow::Result<()> {
        let sql = "SELECT ROW_NUMBER() OVER (ORDER BY id) FROM t";
        assert!(matches!(
            parse(sql, &Dialect::mysql("5.7")?).unwrap_err(),
            SqlError::NotSupported { .. }
        ));
        assert!(parse(sql, &Dialect::mysql("8.0")?).is_ok());
        Ok(())
    }

    #[test]
    fn order_dependent_window_needs_order_by() {
        let err = parse("SELECT ROW_NUMBER() OVER () FROM t", &mysql()).unwrap_err();
        assert!(err.to_string().contains("ORDER BY"));
    }

    #[test]
    fn malformed_delete_names_the_expected_construct() {
        let err = parse("DELETE users WHERE id = 1", &mysql()).unwrap_err();
        assert!(err.to_string().contains("expected DELETE FROM"));
    }

    #[test]
    fn unsupported_statement_names_the_expected_statements() {
        let err = parse("GRANT ALL ON t TO bob", &mysql()).unwrap_err();
        assert!(err.to_string().contains("expected SELECT/INSERT/UPDATE/DELETE"));
    }
}
