//! Database Core - shared engine state and the schema setup API
//!
//! A `Database` owns the catalog, the dialect it impersonates, the statement
//! lock used in thread-safe mode and the parsed-statement cache. Statements
//! are executed through a `Connection` obtained from `Database::connect`.

use super::connection::Connection;
use super::table::{Table, TriggerContext, TriggerFn};
use crate::catalog::{Catalog, ConnectionId, ProcedureDef, ViewDef};
use crate::config::DbConfig;
use crate::dialect::Dialect;
use crate::error::{Result, SqlError};
use crate::sql::ast::{ObjectName, Query, Statement};
use crate::sql::executor::{ExecContext, QueryExecutor, QueryResult, RowSet};
use crate::sql::mutation::{self, execute_statement, fold_case};
use crate::sql::{parse_multi, Params};
use crate::txn::{TransactionCoordinator, TransactionCoordinatorStats};
use crate::types::{ColumnDef, ForeignKeyDef, IndexDef, TriggerEvent, Value};
use lru::LruCache;
use parking_lot::{Mutex, ReentrantMutex, ReentrantMutexGuard, RwLock, RwLockReadGuard};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, trace};

/// Connection id used by the setup API; never handed to a connection
pub(crate) const SETUP_CONNECTION: ConnectionId = 0;

/// Database statistics
#[derive(Debug, Clone)]
pub struct DatabaseStats {
    pub tables: usize,
    pub views: usize,
    pub total_rows: usize,
    pub cached_statements: usize,
    pub transactions: TransactionCoordinatorStats,
}

/// In-process database instance
pub struct Database {
    pub(crate) config: DbConfig,

    pub(crate) dialect: Dialect,

    /// Tables, views, temporary tables and procedures
    pub(crate) catalog: RwLock<Catalog>,

    /// Serializes mutations and transaction control when `thread_safe`
    pub(crate) statement_lock: ReentrantMutex<()>,

    /// SQL text -> parsed statements
    parse_cache: Option<Mutex<LruCache<String, Arc<Vec<Statement>>>>>,

    pub(crate) txn_coordinator: TransactionCoordinator,

    next_connection_id: AtomicU64,
}

impl Database {
    /// Create an empty database impersonating the configured dialect
    pub fn new(config: DbConfig) -> Result<Arc<Self>> {
        let dialect = config.build_dialect()?;
        let parse_cache = NonZeroUsize::new(config.parse_cache_size).map(|cap| Mutex::new(LruCache::new(cap)));
        info!(
            dialect = dialect.name(),
            version = %dialect.version_label(),
            thread_safe = config.thread_safe,
            "database created"
        );
        Ok(Arc::new(Self {
            catalog: RwLock::new(Catalog::new(&config.default_schema)),
            dialect,
            config,
            statement_lock: ReentrantMutex::new(()),
            parse_cache,
            txn_coordinator: TransactionCoordinator::new(),
            next_connection_id: AtomicU64::new(SETUP_CONNECTION + 1),
        }))
    }

    /// Open a connection sharing this database
    pub fn connect(self: &Arc<Self>) -> Connection {
        let id = self.next_connection_id.fetch_add(1, Ordering::SeqCst);
        debug!(connection = id, "connection opened");
        Connection::new(Arc::clone(self), id)
    }

    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    /// Read access to the catalog; do not hold it across statement calls
    pub fn catalog(&self) -> RwLockReadGuard<'_, Catalog> {
        self.catalog.read()
    }

    // ----- schema setup -----

    /// Create a table in the default schema and seed it with `rows`
    pub fn add_table(&self, name: &str, columns: Vec<ColumnDef>, rows: Vec<Vec<Value>>) -> Result<u64> {
        self.add_table_in_schema(None, name, columns, rows)
    }

    /// Create a table in `schema` (default schema when `None`).
    ///
    /// Seed rows go through the regular insert path; when one is rejected the
    /// table is not created.
    pub fn add_table_in_schema(
        &self,
        schema: Option<&str>,
        name: &str,
        columns: Vec<ColumnDef>,
        rows: Vec<Vec<Value>>,
    ) -> Result<u64> {
        let _guard = self.statement_guard(true);
        let table = Table::new(name, columns, fold_case(&self.dialect))?;
        let mut catalog = self.catalog.write();
        let key = catalog.create_table(schema, table, &self.dialect)?;
        if rows.is_empty() {
            return Ok(0);
        }
        let params = Params::new();
        let ctx = ExecContext::new(&self.dialect, &params, SETUP_CONNECTION);
        match mutation::insert_rows(&mut catalog, &key, None, rows, false, ctx) {
            Ok(count) => Ok(count),
            Err(e) => {
                let object = ObjectName {
                    schema: schema.map(str::to_string),
                    name: name.to_string(),
                };
                catalog.drop_table(&object, SETUP_CONNECTION);
                Err(e)
            }
        }
    }

    /// Insert rows into an existing table, values in column order
    pub fn insert_rows(&self, table: &str, rows: Vec<Vec<Value>>) -> Result<u64> {
        let _guard = self.statement_guard(true);
        let mut catalog = self.catalog.write();
        let key = catalog.require_table(&ObjectName::new(table), SETUP_CONNECTION, &self.dialect)?;
        let params = Params::new();
        let ctx = ExecContext::new(&self.dialect, &params, SETUP_CONNECTION);
        mutation::insert_rows(&mut catalog, &key, None, rows, false, ctx)
    }

    pub fn add_column(&self, table: &str, column: ColumnDef) -> Result<()> {
        self.alter_table(table, |t, d| t.add_column(column, d).map(|_| ()))
    }

    pub fn set_primary_key(&self, table: &str, columns: &[&str]) -> Result<()> {
        let columns: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
        self.alter_table(table, |t, d| t.set_primary_key(&columns, d))
    }

    /// Create a (unique) index on `def.table`; existing rows must satisfy it
    pub fn create_index(&self, def: IndexDef) -> Result<()> {
        if def.columns.is_empty() {
            return Err(SqlError::invalid(format!("index '{}' has no columns", def.name)));
        }
        let table = def.table.clone();
        self.alter_table(&table, |t, d| t.create_index(def, d))
    }

    /// Declare `table.column` as referencing `ref_table.ref_column`
    pub fn create_foreign_key(&self, table: &str, column: &str, ref_table: &str, ref_column: &str) -> Result<()> {
        {
            let catalog = self.catalog.read();
            let (_, parent) = catalog
                .find_table(ref_table)
                .ok_or_else(|| self.dialect.unknown_table(ref_table))?;
            if parent.ordinal_of(ref_column).is_none() {
                return Err(self.dialect.unknown_column(ref_column));
            }
        }
        let fk = ForeignKeyDef {
            name: format!("fk_{}_{}", table, column),
            column: column.to_string(),
            ref_table: ref_table.to_string(),
            ref_column: ref_column.to_string(),
        };
        self.alter_table(table, |t, d| t.add_foreign_key(fk, d))
    }

    /// Register a trigger callback.
    ///
    /// Callbacks run while the catalog is locked for the statement and must
    /// not execute statements against this database.
    pub fn add_trigger<F>(&self, table: &str, name: &str, event: TriggerEvent, callback: F) -> Result<()>
    where
        F: Fn(&TriggerContext<'_>) -> Result<()> + Send + Sync + 'static,
    {
        let callback: TriggerFn = Arc::new(callback);
        self.alter_table(table, |t, _| {
            t.add_trigger(name, event, callback);
            Ok(())
        })
    }

    /// Register a view from its SELECT text
    pub fn add_view(&self, name: &str, sql: &str) -> Result<()> {
        let mut statements = parse_multi(sql, &self.dialect)?;
        match (statements.pop(), statements.is_empty()) {
            (Some(Statement::Query(query)), true) => self.add_view_query(name, query),
            _ => Err(SqlError::invalid(format!("view '{}' must be defined by a single SELECT", name))),
        }
    }

    /// Register a view from an already parsed query
    pub fn add_view_query(&self, name: &str, query: Query) -> Result<()> {
        let _guard = self.statement_guard(true);
        let view = ViewDef {
            name: name.to_string(),
            columns: Vec::new(),
            query,
        };
        self.catalog.write().add_view(None, view, true, &self.dialect)?;
        debug!(view = name, "view registered");
        Ok(())
    }

    pub fn add_procedure(&self, procedure: ProcedureDef) -> Result<()> {
        let _guard = self.statement_guard(true);
        debug!(procedure = %procedure.name, params = procedure.params.len(), "procedure registered");
        self.catalog.write().add_procedure(procedure)
    }

    fn alter_table<F>(&self, table: &str, change: F) -> Result<()>
    where
        F: FnOnce(&mut Table, &Dialect) -> Result<()>,
    {
        let _guard = self.statement_guard(true);
        let mut catalog = self.catalog.write();
        let key = catalog.require_table(&ObjectName::new(table), SETUP_CONNECTION, &self.dialect)?;
        let stored = catalog
            .table_mut(&key)
            .ok_or_else(|| self.dialect.unknown_table(table))?;
        change(stored, &self.dialect)
    }

    // ----- inspection -----

    pub fn table_names(&self) -> Vec<String> {
        self.catalog.read().table_names(None)
    }

    pub fn row_count(&self, table: &str) -> Result<usize> {
        let catalog = self.catalog.read();
        let key = catalog.require_table(&ObjectName::new(table), SETUP_CONNECTION, &self.dialect)?;
        Ok(catalog.table(&key).map(Table::len).unwrap_or(0))
    }

    pub fn stats(&self) -> DatabaseStats {
        let catalog = self.catalog.read();
        let (mut tables, mut views, mut total_rows) = (0, 0, 0);
        for schema_name in catalog.schema_names() {
            if let Some(schema) = catalog.schema(&schema_name) {
                let names = schema.table_names();
                tables += names.len();
                views += schema.view_names().len();
                total_rows += names
                    .iter()
                    .filter_map(|n| catalog.find_table(n))
                    .map(|(_, t)| t.len())
                    .sum::<usize>();
            }
        }
        DatabaseStats {
            tables,
            views,
            total_rows,
            cached_statements: self.parse_cache.as_ref().map(|c| c.lock().len()).unwrap_or(0),
            transactions: self.txn_coordinator.stats(),
        }
    }

    // ----- execution -----

    /// Statement lock guard for thread-safe mode; reads lock only with `lock_reads`
    pub(crate) fn statement_guard(&self, mutation: bool) -> Option<ReentrantMutexGuard<'_, ()>> {
        if self.config.thread_safe && (mutation || self.config.lock_reads) {
            Some(self.statement_lock.lock())
        } else {
            None
        }
    }

    /// Parse a script, reusing cached statements for repeated SQL text
    pub(crate) fn parse_script(&self, sql: &str) -> Result<Arc<Vec<Statement>>> {
        if let Some(cache) = &self.parse_cache {
            if let Some(hit) = cache.lock().get(sql) {
                trace!(sql, "parse cache hit");
                return Ok(Arc::clone(hit));
            }
        }
        let statements = Arc::new(parse_multi(sql, &self.dialect)?);
        if let Some(cache) = &self.parse_cache {
            cache.lock().put(sql.to_string(), Arc::clone(&statements));
        }
        Ok(statements)
    }

    /// Execute one parsed statement on behalf of `connection`
    pub(crate) fn run(&self, stmt: &Statement, params: &Params, connection: ConnectionId) -> Result<QueryResult> {
        let ctx = ExecContext::new(&self.dialect, params, connection);
        let _guard = self.statement_guard(!stmt.is_query());
        debug!(kind = stmt.kind(), connection, "executing statement");
        match stmt {
            Statement::Query(query) => {
                let catalog = self.catalog.read();
                QueryExecutor::new(&catalog, ctx).query(query).map(QueryResult::Rows)
            }
            _ => {
                let mut catalog = self.catalog.write();
                execute_statement(&mut catalog, stmt, ctx)
            }
        }
    }

    /// Rows of a SELECT evaluated outside any connection
    pub fn query(&self, sql: &str, params: &Params) -> Result<RowSet> {
        let statements = self.parse_script(sql)?;
        match statements.as_slice() {
            [stmt @ Statement::Query(_)] => match self.run(stmt, params, SETUP_CONNECTION)? {
                QueryResult::Rows(rows) => Ok(rows),
                _ => Err(SqlError::invalid("statement did not return rows")),
            },
            _ => Err(SqlError::invalid("expected a single SELECT statement")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::DialectKind;
    use crate::types::ColumnType;

    fn users(db: &Database) {
        db.add_table(
            "users",
            vec![
                ColumnDef::new("id", ColumnType::Integer),
                ColumnDef::new("name", ColumnType::Text).size(20),
            ],
            vec![],
        )
        .unwrap();
        db.set_primary_key("users", &["id"]).unwrap();
    }

    #[test]
    fn test_add_table_with_rows() {
        let db = Database::new(DbConfig::for_testing(DialectKind::MySql)).unwrap();
        users(&db);
        let count = db
            .insert_rows(
                "users",
                vec![
                    vec![Value::Integer(1), Value::Text("Ann".into())],
                    vec![Value::Integer(2), Value::Text("Bob".into())],
                ],
            )
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(db.row_count("users").unwrap(), 2);
        assert_eq!(db.table_names(), vec!["users".to_string()]);
    }

    #[test]
    fn test_rejected_seed_rows_leave_no_table() {
        let db = Database::new(DbConfig::for_testing(DialectKind::Postgres)).unwrap();
        let err = db
            .add_table(
                "t",
                vec![ColumnDef::new("id", ColumnType::Integer).not_null()],
                vec![vec![Value::Null]],
            )
            .unwrap_err();
        assert!(matches!(err, SqlError::NotNull { .. }));
        assert!(db.table_names().is_empty());
    }

    #[test]
    fn test_foreign_key_requires_parent_column() {
        let db = Database::new(DbConfig::for_testing(DialectKind::MySql)).unwrap();
        users(&db);
        db.add_table("orders", vec![ColumnDef::new("user_id", ColumnType::Integer)], vec![])
            .unwrap();
        assert!(matches!(
            db.create_foreign_key("orders", "user_id", "users", "missing").unwrap_err(),
            SqlError::UnknownColumn { .. }
        ));
        db.create_foreign_key("orders", "user_id", "users", "id").unwrap();
    }

    #[test]
    fn test_parse_cache_reuses_statements() {
        let db = Database::new(DbConfig::mysql("8.0")).unwrap();
        let first = db.parse_script("SELECT 1").unwrap();
        let second = db.parse_script("SELECT 1").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(db.stats().cached_statements, 1);
    }

    #[test]
    fn test_view_requires_select() {
        let db = Database::new(DbConfig::for_testing(DialectKind::MySql)).unwrap();
        users(&db);
        db.add_view("v_users", "SELECT id FROM users").unwrap();
        assert!(db.add_view("bad", "DELETE FROM users").is_err());
        let rows = db.query("SELECT * FROM v_users", &Params::new()).unwrap();
        assert_eq!(rows.columns(), &["id".to_string()]);
    }
}
