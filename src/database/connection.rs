//! Connection - per-caller session over a shared `Database`
//!
//! A connection owns its connection-local temporary tables and at most one
//! open transaction. Dropping a connection rolls back its open transaction
//! and removes its temporary tables.

use super::core::Database;
use crate::catalog::ConnectionId;
use crate::dialect::Dialect;
use crate::error::{Result, SqlError};
use crate::sql::ast::Statement;
use crate::sql::executor::{QueryResult, RowSet};
use crate::sql::plan::{QueryPlan, QueryPlanner};
use crate::sql::Params;
use crate::txn::{IsolationLevel, Transaction};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct Connection {
    db: Arc<Database>,
    id: ConnectionId,
    transaction: Option<Transaction>,
}

impl Connection {
    pub(crate) fn new(db: Arc<Database>, id: ConnectionId) -> Self {
        Self {
            db,
            id,
            transaction: None,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    pub fn dialect(&self) -> &Dialect {
        self.db.dialect()
    }

    // ----- statements -----

    /// Execute every statement of `sql` in order and return the last result.
    ///
    /// Later statements observe objects created by earlier ones. Execution
    /// stops at the first failing statement; statements before it stay applied.
    pub fn execute(&mut self, sql: &str, params: &Params) -> Result<QueryResult> {
        self.execute_script(sql, params)?
            .pop()
            .ok_or_else(|| SqlError::invalid("no statement to execute"))
    }

    /// Execute every statement of `sql`, returning one result per statement
    pub fn execute_script(&mut self, sql: &str, params: &Params) -> Result<Vec<QueryResult>> {
        let statements = self.db.parse_script(sql)?;
        statements
            .iter()
            .map(|stmt| self.db.run(stmt, params, self.id))
            .collect()
    }

    /// Execute an already parsed statement
    pub fn execute_statement(&mut self, stmt: &Statement, params: &Params) -> Result<QueryResult> {
        self.db.run(stmt, params, self.id)
    }

    /// Execute `sql` and return the rows of its last statement
    pub fn query(&mut self, sql: &str, params: &Params) -> Result<RowSet> {
        self.execute(sql, params)?
            .into_rows()
            .ok_or_else(|| SqlError::invalid("statement did not return rows"))
    }

    /// Affected-row count of a mutation
    pub fn execute_update(&mut self, sql: &str, params: &Params) -> Result<u64> {
        Ok(self.execute(sql, params)?.affected_rows())
    }

    /// Advisory plan for the last statement of `sql`
    pub fn explain(&self, sql: &str) -> Result<QueryPlan> {
        let statements = self.db.parse_script(sql)?;
        let stmt = statements
            .last()
            .ok_or_else(|| SqlError::invalid("no statement to explain"))?;
        let catalog = self.db.catalog.read();
        Ok(QueryPlanner::new(&catalog, self.id).plan_statement(stmt))
    }

    /// Run a stored procedure body with `params`.
    ///
    /// Every declared parameter must be bound; the body may hold several
    /// statements and the last result is returned.
    pub fn call_procedure(&mut self, name: &str, params: &Params) -> Result<QueryResult> {
        let procedure = self
            .db
            .catalog
            .read()
            .procedure(name)
            .cloned()
            .ok_or_else(|| SqlError::invalid(format!("procedure '{}' does not exist", name)))?;
        if let Some(missing) = procedure.params.iter().find(|p| params.get(p).is_none()) {
            return Err(self.dialect().unknown_parameter(missing));
        }
        debug!(procedure = %procedure.name, connection = self.id, "calling procedure");
        self.execute(&procedure.body, params)
    }

    // ----- transactions -----

    pub fn in_transaction(&self) -> bool {
        self.transaction.is_some()
    }

    pub fn isolation_level(&self) -> Option<IsolationLevel> {
        self.transaction.as_ref().map(Transaction::isolation_level)
    }

    /// Start a transaction; every later change can be undone by `rollback`
    pub fn begin_transaction(&mut self, isolation: IsolationLevel) -> Result<()> {
        if self.transaction.is_some() {
            return Err(SqlError::Transaction("a transaction is already active".into()));
        }
        let _guard = self.db.statement_guard(true);
        let catalog = self.db.catalog.read();
        self.transaction = Some(self.db.txn_coordinator.begin(isolation, &catalog));
        Ok(())
    }

    pub fn commit(&mut self) -> Result<()> {
        let txn = self.take_transaction()?;
        let _guard = self.db.statement_guard(true);
        self.db.txn_coordinator.commit(txn)
    }

    /// Undo every change made since `begin_transaction`
    pub fn rollback(&mut self) -> Result<()> {
        let txn = self.take_transaction()?;
        let _guard = self.db.statement_guard(true);
        let mut catalog = self.db.catalog.write();
        self.db.txn_coordinator.rollback(txn, &mut catalog)
    }

    pub fn savepoint(&mut self, name: &str) -> Result<()> {
        let _guard = self.db.statement_guard(true);
        let catalog = self.db.catalog.read();
        active(&mut self.transaction)?.savepoint(name, &catalog)
    }

    /// Undo changes made after `name` while keeping the transaction open
    pub fn rollback_to_savepoint(&mut self, name: &str) -> Result<()> {
        let _guard = self.db.statement_guard(true);
        let mut catalog = self.db.catalog.write();
        active(&mut self.transaction)?.rollback_to(name, &mut catalog)
    }

    pub fn release_savepoint(&mut self, name: &str) -> Result<()> {
        active(&mut self.transaction)?.release(name)
    }

    fn take_transaction(&mut self) -> Result<Transaction> {
        self.transaction
            .take()
            .ok_or_else(|| SqlError::Transaction("no active transaction".into()))
    }
}

fn active(transaction: &mut Option<Transaction>) -> Result<&mut Transaction> {
    transaction
        .as_mut()
        .ok_or_else(|| SqlError::Transaction("no active transaction".into()))
}

impl Drop for Connection {
    fn drop(&mut self) {
        if self.transaction.is_some() {
            warn!(connection = self.id, "connection closed with an open transaction, rolling back");
            if let Err(e) = self.rollback() {
                warn!(connection = self.id, error = %e, "rollback on close failed");
            }
        }
        let _guard = self.db.statement_guard(true);
        let dropped = self.db.catalog.write().drop_connection(self.id);
        debug!(connection = self.id, temp_tables = dropped, "connection closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DbConfig;
    use crate::dialect::DialectKind;

    fn connection(kind: DialectKind) -> Connection {
        let db = Database::new(DbConfig::for_testing(kind)).unwrap();
        db.connect()
    }

    #[test]
    fn test_script_returns_last_result() {
        let mut conn = connection(DialectKind::MySql);
        let result = conn
            .execute(
                "CREATE TABLE t (id INT PRIMARY KEY, name VARCHAR(10)); \
                 INSERT INTO t VALUES (1, 'a'), (2, 'b')",
                &Params::new(),
            )
            .unwrap();
        assert_eq!(result.affected_rows(), 2);
        let rows = conn.query("SELECT COUNT(*) FROM t", &Params::new()).unwrap();
        assert_eq!(rows.scalar(), Some(&crate::types::Value::Integer(2)));
    }

    #[test]
    fn test_nested_transaction_is_rejected() {
        let mut conn = connection(DialectKind::Postgres);
        conn.begin_transaction(IsolationLevel::ReadCommitted).unwrap();
        assert_eq!(conn.isolation_level(), Some(IsolationLevel::ReadCommitted));
        assert!(matches!(
            conn.begin_transaction(IsolationLevel::Serializable),
            Err(SqlError::Transaction(_))
        ));
        conn.commit().unwrap();
        assert!(conn.commit().is_err());
        assert!(!conn.in_transaction());
    }

    #[test]
    fn test_savepoint_outside_transaction() {
        let mut conn = connection(DialectKind::SqlServer);
        assert!(matches!(conn.savepoint("a"), Err(SqlError::Transaction(_))));
    }

    #[test]
    fn test_procedure_requires_parameters() {
        let mut conn = connection(DialectKind::SqlServer);
        conn.execute("CREATE TABLE t (id INT)", &Params::new()).unwrap();
        conn.database()
            .add_procedure(crate::catalog::ProcedureDef::new(
                "add_t",
                ["id"],
                "INSERT INTO t (id) VALUES (@id)",
            ))
            .unwrap();
        assert!(matches!(
            conn.call_procedure("add_t", &Params::new()),
            Err(SqlError::UnknownParameter { .. })
        ));
        let result = conn
            .call_procedure("add_t", &Params::new().bind("id", 7))
            .unwrap();
        assert_eq!(result.affected_rows(), 1);
    }
}
