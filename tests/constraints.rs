//! # Constraint Enforcement Test Suite
//!
//! Unique keys, foreign keys, nullability, value validation and triggers.
//! Every rejected statement must leave the affected tables unchanged.
//!
//! ```sh
//! cargo test --test constraints
//! ```

use mockdb::{Connection, Database, DbConfig, DialectKind, Params, SqlError, TriggerEvent, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn connect(kind: DialectKind) -> (Arc<Database>, Connection) {
    let db = Database::new(DbConfig::for_testing(kind)).expect("database");
    let conn = db.connect();
    (db, conn)
}

fn run(conn: &mut Connection, sql: &str) -> mockdb::Result<u64> {
    conn.execute_update(sql, &Params::new())
}

fn count(conn: &mut Connection, table: &str) -> i64 {
    let rows = conn
        .query(&format!("SELECT COUNT(*) FROM {}", table), &Params::new())
        .expect("count query");
    rows.scalar().and_then(Value::as_i64).expect("integer count")
}

fn setup_parent_child(conn: &mut Connection) {
    run(conn, "CREATE TABLE users (id INT PRIMARY KEY, email VARCHAR(20) NOT NULL UNIQUE)").unwrap();
    run(
        conn,
        "CREATE TABLE orders (id INT PRIMARY KEY, user_id INT REFERENCES users(id), amount DECIMAL(10,2))",
    )
    .unwrap();
    run(conn, "INSERT INTO users VALUES (1, 'a@x.io'), (2, 'b@x.io')").unwrap();
    run(conn, "INSERT INTO orders VALUES (10, 1, 9.99)").unwrap();
}

// ============================================================================
// UNIQUENESS
// ============================================================================

mod unique_tests {
    use super::*;

    #[test]
    fn duplicate_primary_key_is_rejected_without_changes() {
        let (_db, mut conn) = connect(DialectKind::MySql);
        setup_parent_child(&mut conn);

        let err = run(&mut conn, "INSERT INTO users VALUES (1, 'c@x.io')").unwrap_err();
        match &err {
            SqlError::DuplicateKey { code, value, .. } => {
                assert_eq!(*code, 1062);
                assert_eq!(value, "1");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(count(&mut conn, "users"), 2);
    }

    #[test]
    fn duplicate_inside_one_statement_rejects_the_whole_statement() {
        let (_db, mut conn) = connect(DialectKind::Postgres);
        setup_parent_child(&mut conn);

        let err = run(&mut conn, "INSERT INTO users VALUES (3, 'c@x.io'), (4, 'c@x.io')").unwrap_err();
        assert_eq!(err.code(), 23505);
        assert_eq!(count(&mut conn, "users"), 2);
    }

    #[test]
    fn insert_ignore_skips_duplicates() {
        let (_db, mut conn) = connect(DialectKind::MySql);
        setup_parent_child(&mut conn);

        let affected = run(&mut conn, "INSERT IGNORE INTO users VALUES (2, 'dup@x.io'), (3, 'c@x.io')").unwrap();
        assert_eq!(affected, 1);
        assert_eq!(count(&mut conn, "users"), 3);
    }

    #[test]
    fn update_into_an_existing_key_is_rejected() {
        let (_db, mut conn) = connect(DialectKind::SqlServer);
        setup_parent_child(&mut conn);

        let err = run(&mut conn, "UPDATE users SET email = 'a@x.io' WHERE id = 2").unwrap_err();
        assert!(matches!(err, SqlError::DuplicateKey { .. }));
        let rows = conn
            .query("SELECT email FROM users WHERE id = 2", &Params::new())
            .unwrap();
        assert_eq!(rows.scalar(), Some(&Value::Text("b@x.io".into())));
    }
}

// ============================================================================
// REFERENTIAL INTEGRITY
// ============================================================================

mod foreign_key_tests {
    use super::*;

    #[test]
    fn deleting_a_referenced_parent_is_rejected() {
        let (_db, mut conn) = connect(DialectKind::MySql);
        setup_parent_child(&mut conn);

        let err = run(&mut conn, "DELETE FROM users WHERE id = 1").unwrap_err();
        assert!(matches!(err, SqlError::ForeignKey { code: 1451, .. }));
        assert_eq!(count(&mut conn, "users"), 2);
        assert_eq!(count(&mut conn, "orders"), 1);
    }

    #[test]
    fn unreferenced_parent_can_be_deleted() {
        let (_db, mut conn) = connect(DialectKind::MySql);
        setup_parent_child(&mut conn);

        assert_eq!(run(&mut conn, "DELETE FROM users WHERE id = 2").unwrap(), 1);
        assert_eq!(count(&mut conn, "users"), 1);
    }

    #[test]
    fn child_without_parent_is_rejected() {
        let (_db, mut conn) = connect(DialectKind::MySql);
        setup_parent_child(&mut conn);

        let err = run(&mut conn, "INSERT INTO orders VALUES (11, 99, 1.00)").unwrap_err();
        assert!(matches!(err, SqlError::ForeignKey { code: 1452, .. }));
        assert_eq!(count(&mut conn, "orders"), 1);
    }

    #[test]
    fn null_reference_is_allowed() {
        let (_db, mut conn) = connect(DialectKind::Postgres);
        setup_parent_child(&mut conn);

        assert_eq!(run(&mut conn, "INSERT INTO orders VALUES (11, NULL, 1.00)").unwrap(), 1);
    }

    #[test]
    fn setup_api_foreign_key() {
        let (db, mut conn) = connect(DialectKind::SqlServer);
        run(&mut conn, "CREATE TABLE dept (id INT PRIMARY KEY)").unwrap();
        run(&mut conn, "CREATE TABLE emp (id INT PRIMARY KEY, dept_id INT)").unwrap();
        db.create_foreign_key("emp", "dept_id", "dept", "id").unwrap();

        let err = run(&mut conn, "INSERT INTO emp VALUES (1, 5)").unwrap_err();
        assert!(matches!(err, SqlError::ForeignKey { .. }));
        run(&mut conn, "INSERT INTO dept VALUES (5)").unwrap();
        assert_eq!(run(&mut conn, "INSERT INTO emp VALUES (1, 5)").unwrap(), 1);
    }
}

// ============================================================================
// VALUE VALIDATION
// ============================================================================

mod validation_tests {
    use super::*;

    #[test]
    fn null_in_not_null_column() {
        let (_db, mut conn) = connect(DialectKind::MySql);
        setup_parent_child(&mut conn);

        let err = run(&mut conn, "INSERT INTO users (id, email) VALUES (3, NULL)").unwrap_err();
        assert!(matches!(err, SqlError::NotNull { code: 1048, .. }));
    }

    #[test]
    fn text_longer_than_the_column() {
        let (_db, mut conn) = connect(DialectKind::MySql);
        setup_parent_child(&mut conn);

        let err = run(
            &mut conn,
            "INSERT INTO users VALUES (3, 'a-very-long-address@example.com')",
        )
        .unwrap_err();
        assert!(matches!(err, SqlError::ValueOutOfRange { .. }));
        assert_eq!(count(&mut conn, "users"), 2);
    }

    #[test]
    fn enum_members_are_enforced() {
        let (_db, mut conn) = connect(DialectKind::MySql);
        run(&mut conn, "CREATE TABLE tickets (id INT, status ENUM('new','done'))").unwrap();
        assert_eq!(run(&mut conn, "INSERT INTO tickets VALUES (1, 'new')").unwrap(), 1);
        assert!(run(&mut conn, "INSERT INTO tickets VALUES (2, 'lost')").is_err());
    }

    #[test]
    fn unknown_column_uses_the_dialect_code() {
        let (_db, mut conn) = connect(DialectKind::MySql);
        setup_parent_child(&mut conn);

        let err = conn
            .query("SELECT missing FROM users", &Params::new())
            .unwrap_err();
        assert!(matches!(err, SqlError::UnknownColumn { code: 1054, .. }));
    }
}

// ============================================================================
// TRIGGERS
// ============================================================================

mod trigger_tests {
    use super::*;

    #[test]
    fn triggers_fire_before_and_after() {
        let (db, mut conn) = connect(DialectKind::MySql);
        setup_parent_child(&mut conn);

        let fired = Arc::new(AtomicUsize::new(0));
        let before = Arc::clone(&fired);
        db.add_trigger("users", "before_ins", TriggerEvent::BeforeInsert, move |ctx| {
            assert!(ctx.new_value("email").is_some());
            before.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();
        let after = Arc::clone(&fired);
        db.add_trigger("users", "after_ins", TriggerEvent::AfterInsert, move |_| {
            after.fetch_add(10, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();

        run(&mut conn, "INSERT INTO users VALUES (3, 'c@x.io')").unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 11);
    }

    #[test]
    fn failing_trigger_aborts_the_statement() {
        let (db, mut conn) = connect(DialectKind::Postgres);
        setup_parent_child(&mut conn);

        db.add_trigger("users", "no_deletes", TriggerEvent::BeforeDelete, |_| {
            Err(SqlError::InvalidArgument("deletes are disabled".into()))
        })
        .unwrap();

        assert!(run(&mut conn, "DELETE FROM users WHERE id = 2").is_err());
        assert_eq!(count(&mut conn, "users"), 2);
    }

    #[test]
    fn temporary_tables_never_fire_triggers() {
        let (db, mut conn) = connect(DialectKind::MySql);
        run(&mut conn, "CREATE TEMPORARY TABLE scratch (id INT)").unwrap();

        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        // Temporary tables are not visible to the setup API
        let result = db.add_trigger("scratch", "t", TriggerEvent::AfterInsert, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        assert!(result.is_err());

        run(&mut conn, "INSERT INTO scratch VALUES (1)").unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
