//! # Transaction and Connection Scoping Test Suite
//!
//! Rollback restores every table, commit keeps every change, savepoints
//! restore intermediate states, and temporary tables follow their scope.
//!
//! ```sh
//! cargo test --test transactions
//! ```

use mockdb::{Connection, Database, DbConfig, DialectKind, IsolationLevel, Params, SqlError, Value};
use std::sync::Arc;
use std::thread;

fn database(kind: DialectKind) -> Arc<Database> {
    let db = Database::new(DbConfig::for_testing(kind)).expect("database");
    let mut conn = db.connect();
    conn.execute_script(
        "CREATE TABLE accounts (id INT PRIMARY KEY, balance INT NOT NULL); \
         INSERT INTO accounts VALUES (1, 100), (2, 50)",
        &Params::new(),
    )
    .expect("setup");
    db
}

fn balances(conn: &mut Connection) -> Vec<i64> {
    conn.query("SELECT balance FROM accounts ORDER BY id", &Params::new())
        .expect("balances")
        .column_values("balance")
        .iter()
        .filter_map(Value::as_i64)
        .collect()
}

fn exec(conn: &mut Connection, sql: &str) {
    conn.execute(sql, &Params::new()).expect(sql);
}

// ============================================================================
// COMMIT AND ROLLBACK
// ============================================================================

mod commit_rollback_tests {
    use super::*;

    #[test]
    fn rollback_restores_pre_transaction_content() {
        let db = database(DialectKind::MySql);
        let mut conn = db.connect();

        conn.begin_transaction(IsolationLevel::ReadCommitted).unwrap();
        exec(&mut conn, "UPDATE accounts SET balance = balance - 30 WHERE id = 1");
        exec(&mut conn, "INSERT INTO accounts VALUES (3, 7)");
        exec(&mut conn, "DELETE FROM accounts WHERE id = 2");
        assert_eq!(balances(&mut conn), vec![70, 7]);

        conn.rollback().unwrap();
        assert_eq!(balances(&mut conn), vec![100, 50]);
        assert!(!conn.in_transaction());
    }

    #[test]
    fn rollback_undoes_structural_changes() {
        let db = database(DialectKind::Postgres);
        let mut conn = db.connect();

        conn.begin_transaction(IsolationLevel::Serializable).unwrap();
        exec(&mut conn, "CREATE TABLE audit (id INT)");
        exec(&mut conn, "DROP TABLE accounts");
        conn.rollback().unwrap();

        assert_eq!(db.table_names(), vec!["accounts".to_string()]);
        assert_eq!(balances(&mut conn), vec![100, 50]);
    }

    #[test]
    fn commit_keeps_every_change() {
        let db = database(DialectKind::SqlServer);
        let mut conn = db.connect();

        conn.begin_transaction(IsolationLevel::Snapshot).unwrap();
        assert_eq!(conn.isolation_level(), Some(IsolationLevel::Snapshot));
        exec(&mut conn, "UPDATE accounts SET balance = 0");
        conn.commit().unwrap();

        assert_eq!(balances(&mut conn), vec![0, 0]);
        assert!(matches!(conn.rollback(), Err(SqlError::Transaction(_))));
        assert_eq!(db.stats().transactions.total_committed, 1);
    }

    #[test]
    fn dropping_a_connection_rolls_back() {
        let db = database(DialectKind::MySql);
        {
            let mut conn = db.connect();
            conn.begin_transaction(IsolationLevel::default()).unwrap();
            exec(&mut conn, "DELETE FROM accounts");
        }
        assert_eq!(db.row_count("accounts").unwrap(), 2);
    }
}

// ============================================================================
// SAVEPOINTS
// ============================================================================

mod savepoint_tests {
    use super::*;

    #[test]
    fn rollback_to_savepoint_keeps_earlier_work() {
        let db = database(DialectKind::Postgres);
        let mut conn = db.connect();

        conn.begin_transaction(IsolationLevel::ReadCommitted).unwrap();
        exec(&mut conn, "UPDATE accounts SET balance = 90 WHERE id = 1");
        conn.savepoint("after_first").unwrap();
        exec(&mut conn, "UPDATE accounts SET balance = 40 WHERE id = 2");
        conn.savepoint("after_second").unwrap();
        exec(&mut conn, "DELETE FROM accounts");

        conn.rollback_to_savepoint("after_second").unwrap();
        assert_eq!(balances(&mut conn), vec![90, 40]);

        conn.rollback_to_savepoint("after_first").unwrap();
        assert_eq!(balances(&mut conn), vec![90, 50]);
        assert!(conn.rollback_to_savepoint("after_second").is_err());

        conn.commit().unwrap();
        assert_eq!(balances(&mut conn), vec![90, 50]);
    }

    #[test]
    fn released_savepoint_cannot_be_restored() {
        let db = database(DialectKind::Oracle);
        let mut conn = db.connect();

        conn.begin_transaction(IsolationLevel::ReadCommitted).unwrap();
        conn.savepoint("sp").unwrap();
        conn.release_savepoint("sp").unwrap();
        assert!(matches!(
            conn.rollback_to_savepoint("sp"),
            Err(SqlError::Transaction(_))
        ));
        conn.rollback().unwrap();
    }
}

// ============================================================================
// TEMPORARY TABLE SCOPING
// ============================================================================

mod temp_table_tests {
    use super::*;

    #[test]
    fn connection_local_temp_table_is_private() {
        let db = database(DialectKind::MySql);
        let mut first = db.connect();
        let mut second = db.connect();

        exec(&mut first, "CREATE TEMPORARY TABLE scratch (id INT)");
        exec(&mut first, "INSERT INTO scratch VALUES (1)");

        assert!(first.query("SELECT id FROM scratch", &Params::new()).is_ok());
        let err = second
            .query("SELECT id FROM scratch", &Params::new())
            .unwrap_err();
        assert!(matches!(err, SqlError::UnknownTable { .. }));
    }

    #[test]
    fn global_temp_table_is_shared() {
        let db = database(DialectKind::SqlServer);
        let mut first = db.connect();
        let mut second = db.connect();

        exec(&mut first, "CREATE TABLE ##shared (id INT)");
        exec(&mut first, "INSERT INTO ##shared VALUES (1)");
        let rows = second.query("SELECT id FROM ##shared", &Params::new()).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn temp_tables_disappear_with_their_connection() {
        let db = database(DialectKind::Postgres);
        let mut first = db.connect();
        exec(&mut first, "CREATE TEMPORARY TABLE scratch (id INT)");
        drop(first);

        // a later connection may reuse the name
        let mut second = db.connect();
        exec(&mut second, "CREATE TEMPORARY TABLE scratch (id INT)");
    }

    #[test]
    fn ctas_then_query_in_one_script() {
        let db = database(DialectKind::MySql);
        let mut conn = db.connect();
        let rows = conn
            .query(
                "CREATE TEMPORARY TABLE rich AS SELECT id FROM accounts WHERE balance > 60; \
                 SELECT COUNT(*) FROM rich",
                &Params::new(),
            )
            .unwrap();
        assert_eq!(rows.scalar(), Some(&Value::Integer(1)));
    }
}

// ============================================================================
// THREAD SAFETY
// ============================================================================

mod concurrency_tests {
    use super::*;

    #[test]
    fn concurrent_inserts_are_serialized() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let db = Database::new(DbConfig::mysql("8.0")).unwrap();
        db.connect()
            .execute("CREATE TABLE hits (id INT AUTO_INCREMENT PRIMARY KEY, worker INT)", &Params::new())
            .unwrap();

        let handles: Vec<_> = (0..4)
            .map(|worker| {
                let db = Arc::clone(&db);
                thread::spawn(move || {
                    let mut conn = db.connect();
                    for _ in 0..25 {
                        conn.execute(
                            "INSERT INTO hits (worker) VALUES (@w)",
                            &Params::new().bind("w", worker),
                        )
                        .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(db.row_count("hits").unwrap(), 100);
    }
}
