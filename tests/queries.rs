//! # Query Execution Test Suite
//!
//! Grouping and aggregation, window functions, UNION, paging, joins,
//! subqueries, views, stored procedures and advisory plans.
//!
//! ```sh
//! cargo test --test queries
//! ```

use mockdb::{
    Connection, Database, DbConfig, DialectKind, Params, ProcedureDef, RowSet, SqlError, Value,
};

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn seeded(kind: DialectKind) -> Connection {
    let db = Database::new(DbConfig::for_testing(kind)).expect("database");
    let mut conn = db.connect();
    conn.execute_script(
        "CREATE TABLE t (id INT PRIMARY KEY, grp VARCHAR(5), amt INT); \
         INSERT INTO t VALUES (1, 'A', 10), (2, 'B', 20), (3, 'A', 30)",
        &Params::new(),
    )
    .expect("seed");
    conn
}

fn query(conn: &mut Connection, sql: &str) -> RowSet {
    conn.query(sql, &Params::new()).unwrap_or_else(|e| panic!("{}: {}", sql, e))
}

fn ints(rows: &RowSet, column: &str) -> Vec<i64> {
    rows.column_values(column)
        .iter()
        .map(|v| v.as_i64().unwrap_or_else(|| panic!("{:?} is not an integer", v)))
        .collect()
}

// ============================================================================
// GROUPING AND AGGREGATION
// ============================================================================

mod aggregate_tests {
    use super::*;

    #[test]
    fn group_by_produces_one_row_per_group() {
        let mut conn = seeded(DialectKind::MySql);
        let rows = query(
            &mut conn,
            "SELECT grp, COUNT(id) AS n, SUM(amt) AS total, AVG(amt) AS mean, MIN(amt) AS lo, MAX(amt) AS hi \
             FROM t GROUP BY grp ORDER BY grp",
        );
        assert_eq!(rows.len(), 2);
        assert_eq!(rows.get(0, "grp"), Some(&Value::Text("A".into())));
        assert_eq!(rows.get(0, "n"), Some(&Value::Integer(2)));
        assert_eq!(rows.get(0, "total").and_then(Value::as_i64), Some(40));
        assert_eq!(rows.get(0, "mean").and_then(Value::as_f64), Some(20.0));
        assert_eq!(rows.get(0, "lo").and_then(Value::as_i64), Some(10));
        assert_eq!(rows.get(0, "hi").and_then(Value::as_i64), Some(30));
        assert_eq!(rows.get(1, "n"), Some(&Value::Integer(1)));
    }

    #[test]
    fn having_filters_groups() {
        let mut conn = seeded(DialectKind::Postgres);
        let rows = query(
            &mut conn,
            "SELECT grp FROM t GROUP BY grp HAVING SUM(amt) > 25",
        );
        assert_eq!(rows.column_values("grp"), vec![Value::Text("A".into())]);
    }

    #[test]
    fn aggregate_without_group_by_over_empty_input() {
        let mut conn = seeded(DialectKind::Postgres);
        let rows = query(&mut conn, "SELECT COUNT(*) AS n, SUM(amt) AS s FROM t WHERE amt > 100");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows.get(0, "n"), Some(&Value::Integer(0)));
        assert_eq!(rows.get(0, "s"), Some(&Value::Null));
    }

    #[test]
    fn distinct_removes_duplicates() {
        let mut conn = seeded(DialectKind::Sqlite);
        let rows = query(&mut conn, "SELECT DISTINCT grp FROM t ORDER BY grp");
        assert_eq!(rows.len(), 2);
    }
}

// ============================================================================
// WINDOW FUNCTIONS
// ============================================================================

mod window_tests {
    use super::*;

    #[test]
    fn row_number_per_partition() {
        let mut conn = seeded(DialectKind::SqlServer);
        let rows = query(
            &mut conn,
            "SELECT id, ROW_NUMBER() OVER (PARTITION BY grp ORDER BY amt DESC) AS rn FROM t ORDER BY id",
        );
        assert_eq!(ints(&rows, "rn"), vec![2, 1, 1]);
    }

    #[test]
    fn running_total() {
        let mut conn = seeded(DialectKind::Postgres);
        let rows = query(
            &mut conn,
            "SELECT id, SUM(amt) OVER (ORDER BY id) AS running FROM t ORDER BY id",
        );
        assert_eq!(ints(&rows, "running"), vec![10, 30, 60]);
    }

    #[test]
    fn lag_reads_the_previous_row() {
        let mut conn = seeded(DialectKind::MySql);
        let rows = query(
            &mut conn,
            "SELECT id, LAG(amt, 1, 0) OVER (ORDER BY id) AS prev FROM t ORDER BY id",
        );
        assert_eq!(ints(&rows, "prev"), vec![0, 10, 20]);
    }

    #[test]
    fn window_functions_are_version_gated() {
        let db = Database::new(DbConfig::mysql("5.7")).unwrap();
        let mut conn = db.connect();
        conn.execute("CREATE TABLE t (id INT)", &Params::new()).unwrap();
        let err = conn
            .query("SELECT ROW_NUMBER() OVER (ORDER BY id) FROM t", &Params::new())
            .unwrap_err();
        assert!(matches!(err, SqlError::NotSupported { .. }));
    }
}

// ============================================================================
// UNION AND PAGING
// ============================================================================

mod union_paging_tests {
    use super::*;

    #[test]
    fn union_removes_duplicates_and_union_all_keeps_them() {
        let mut conn = seeded(DialectKind::MySql);
        let distinct = query(&mut conn, "SELECT grp FROM t UNION SELECT grp FROM t");
        assert_eq!(distinct.len(), 2);
        let all = query(&mut conn, "SELECT grp FROM t UNION ALL SELECT grp FROM t");
        assert_eq!(all.len(), 6);
    }

    #[test]
    fn union_column_count_must_match() {
        let mut conn = seeded(DialectKind::MySql);
        let err = conn
            .query("SELECT id, grp FROM t UNION SELECT id FROM t", &Params::new())
            .unwrap_err();
        assert_eq!(err.code(), 1222);
    }

    #[test]
    fn postgres_rejects_mixed_union_types() {
        let mut conn = seeded(DialectKind::Postgres);
        assert!(conn
            .query("SELECT id FROM t UNION SELECT grp FROM t", &Params::new())
            .is_err());
    }

    #[test]
    fn limit_offset_and_offset_fetch_select_the_same_rows() {
        let mut mysql = seeded(DialectKind::MySql);
        let limit = query(&mut mysql, "SELECT id FROM t ORDER BY id LIMIT 2 OFFSET 1");

        let mut mssql = seeded(DialectKind::SqlServer);
        let fetch = query(
            &mut mssql,
            "SELECT id FROM t ORDER BY id OFFSET 1 ROWS FETCH NEXT 2 ROWS ONLY",
        );
        assert_eq!(ints(&limit, "id"), vec![2, 3]);
        assert_eq!(ints(&limit, "id"), ints(&fetch, "id"));
    }

    #[test]
    fn top_limits_rows() {
        let mut conn = seeded(DialectKind::SqlServer);
        let rows = query(&mut conn, "SELECT TOP 1 id FROM t ORDER BY amt DESC");
        assert_eq!(ints(&rows, "id"), vec![3]);
    }
}

// ============================================================================
// JOINS, SUBQUERIES AND VIEWS
// ============================================================================

mod relational_tests {
    use super::*;

    fn with_groups(kind: DialectKind) -> Connection {
        let mut conn = seeded(kind);
        conn.execute_script(
            "CREATE TABLE categories (code VARCHAR(5) PRIMARY KEY, label VARCHAR(20)); \
             INSERT INTO categories VALUES ('A', 'alpha'), ('C', 'gamma')",
            &Params::new(),
        )
        .unwrap();
        conn
    }

    #[test]
    fn inner_and_left_joins() {
        let mut conn = with_groups(DialectKind::MySql);
        let inner = query(
            &mut conn,
            "SELECT t.id, g.label FROM t JOIN categories g ON g.code = t.grp ORDER BY t.id",
        );
        assert_eq!(ints(&inner, "id"), vec![1, 3]);

        let left = query(
            &mut conn,
            "SELECT t.id, g.label FROM t LEFT JOIN categories g ON g.code = t.grp ORDER BY t.id",
        );
        assert_eq!(left.len(), 3);
        assert_eq!(left.get(1, "label"), Some(&Value::Null));
    }

    #[test]
    fn correlated_exists() {
        let mut conn = with_groups(DialectKind::Postgres);
        let rows = query(
            &mut conn,
            "SELECT code FROM categories g WHERE EXISTS (SELECT 1 FROM t WHERE t.grp = g.code)",
        );
        assert_eq!(rows.column_values("code"), vec![Value::Text("A".into())]);
    }

    #[test]
    fn in_subquery_and_scalar_subquery() {
        let mut conn = with_groups(DialectKind::SqlServer);
        let rows = query(
            &mut conn,
            "SELECT id, (SELECT MAX(amt) FROM t) AS peak FROM t \
             WHERE grp IN (SELECT code FROM categories) ORDER BY id",
        );
        assert_eq!(ints(&rows, "id"), vec![1, 3]);
        assert_eq!(ints(&rows, "peak"), vec![30, 30]);
    }

    #[test]
    fn views_are_evaluated_on_every_read() {
        let mut conn = seeded(DialectKind::MySql);
        conn.execute(
            "CREATE VIEW big AS SELECT id FROM t WHERE amt >= 20; INSERT INTO t VALUES (4, 'B', 99)",
            &Params::new(),
        )
        .unwrap();
        let rows = query(&mut conn, "SELECT id FROM big ORDER BY id");
        assert_eq!(ints(&rows, "id"), vec![2, 3, 4]);
    }

    #[test]
    fn cte_is_visible_to_the_main_query() {
        let mut conn = seeded(DialectKind::Postgres);
        let rows = query(
            &mut conn,
            "WITH a_rows AS (SELECT id, amt FROM t WHERE grp = 'A') SELECT SUM(amt) AS s FROM a_rows",
        );
        assert_eq!(ints(&rows, "s"), vec![40]);
    }
}

// ============================================================================
// PARAMETERS, PROCEDURES AND PLANS
// ============================================================================

mod api_tests {
    use super::*;

    #[test]
    fn named_and_positional_parameters() {
        let mut conn = seeded(DialectKind::MySql);
        let rows = conn
            .query("SELECT id FROM t WHERE grp = @g AND amt > ?", &Params::new().bind("g", "A").push(15))
            .unwrap();
        assert_eq!(ints(&rows, "id"), vec![3]);

        let err = conn
            .query("SELECT id FROM t WHERE grp = @missing", &Params::new())
            .unwrap_err();
        assert!(matches!(err, SqlError::UnknownParameter { .. }));
    }

    #[test]
    fn in_list_parameter_and_null_binding() {
        let mut conn = seeded(DialectKind::Postgres);
        let rows = conn
            .query(
                "SELECT COUNT(*) AS n FROM t WHERE amt = :amt",
                &Params::new().bind("amt", Value::Null),
            )
            .unwrap();
        assert_eq!(rows.get(0, "n"), Some(&Value::Integer(0)));
    }

    #[test]
    fn stored_procedure_runs_with_bound_parameters() {
        let mut conn = seeded(DialectKind::SqlServer);
        conn.database()
            .add_procedure(ProcedureDef::new(
                "bump",
                ["id", "delta"],
                "UPDATE t SET amt = amt + @delta WHERE id = @id; SELECT amt FROM t WHERE id = @id",
            ))
            .unwrap();
        let result = conn
            .call_procedure("bump", &Params::new().bind("id", 2).bind("delta", 5))
            .unwrap();
        let rows = result.into_rows().expect("procedure returns rows");
        assert_eq!(ints(&rows, "amt"), vec![25]);

        let err = conn
            .call_procedure("bump", &Params::new().bind("id", 2))
            .unwrap_err();
        assert!(matches!(err, SqlError::UnknownParameter { .. }));
    }

    #[test]
    fn explain_reports_index_lookups() {
        let conn = seeded(DialectKind::MySql);
        let point = conn.explain("SELECT amt FROM t WHERE id = 2").unwrap();
        assert!(point.uses_index());
        let scan = conn.explain("SELECT amt FROM t WHERE amt = 20").unwrap();
        assert!(!scan.uses_index());
        assert!(scan.to_string().starts_with("Query Execution Plan:"));
    }

    #[test]
    fn update_counts_follow_the_dialect() {
        let mut mysql = seeded(DialectKind::MySql);
        let changed = mysql
            .execute_update("UPDATE t SET amt = 10 WHERE grp = 'A'", &Params::new())
            .unwrap();
        assert_eq!(changed, 1);

        let mut postgres = seeded(DialectKind::Postgres);
        let matched = postgres
            .execute_update("UPDATE t SET amt = 10 WHERE grp = 'A'", &Params::new())
            .unwrap();
        assert_eq!(matched, 2);
    }
}
