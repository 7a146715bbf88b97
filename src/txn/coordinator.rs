//! Transaction Coordinator
//!
//! Manages transaction lifecycle: begin, commit, rollback, savepoints.
//! Rollback works by restoring a full catalog snapshot taken at begin (or at
//! the savepoint), so structural changes made inside the transaction are
//! undone along with row changes.

use crate::catalog::Catalog;
use crate::error::{Result, SqlError};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

pub type TransactionId = u64;

/// Transaction isolation level
///
/// Stored and reported only; every statement sees the latest committed or
/// uncommitted state of the shared catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IsolationLevel {
    ReadUncommitted = 0,
    #[default]
    ReadCommitted = 1,
    RepeatableRead = 2,
    Serializable = 3,
    Snapshot = 4,
}

impl IsolationLevel {
    pub fn as_sql(&self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
            IsolationLevel::Snapshot => "SNAPSHOT",
        }
    }
}

/// Transaction state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Active,
    Committed,
    Aborted,
}

/// Named snapshot nested inside a transaction
#[derive(Debug, Clone)]
struct Savepoint {
    name: String,
    snapshot: Catalog,
}

/// Open transaction owned by one connection
#[derive(Debug)]
pub struct Transaction {
    id: TransactionId,
    isolation: IsolationLevel,
    state: TransactionState,
    snapshot: Catalog,
    /// Most recent savepoint last
    savepoints: Vec<Savepoint>,
}

impl Transaction {
    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn isolation_level(&self) -> IsolationLevel {
        self.isolation
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn savepoint_names(&self) -> Vec<String> {
        self.savepoints.iter().map(|sp| sp.name.clone()).collect()
    }

    /// Record a savepoint; reusing a name replaces the older savepoint
    pub fn savepoint(&mut self, name: &str, catalog: &Catalog) -> Result<()> {
        self.ensure_active()?;
        if let Some(pos) = self.position(name) {
            warn!(txn_id = self.id, savepoint = name, "savepoint name reused, replacing");
            self.savepoints.remove(pos);
        }
        self.savepoints.push(Savepoint {
            name: name.to_string(),
            snapshot: catalog.clone(),
        });
        debug!(txn_id = self.id, savepoint = name, depth = self.savepoints.len(), "savepoint created");
        Ok(())
    }

    /// Restore the state captured by `name`.
    ///
    /// Savepoints created after it are discarded; `name` itself stays so it
    /// can be rolled back to again.
    pub fn rollback_to(&mut self, name: &str, catalog: &mut Catalog) -> Result<()> {
        self.ensure_active()?;
        let pos = self.require(name)?;
        self.savepoints.truncate(pos + 1);
        *catalog = self.savepoints[pos].snapshot.clone();
        debug!(txn_id = self.id, savepoint = name, "rolled back to savepoint");
        Ok(())
    }

    /// Forget `name` and every savepoint nested after it
    pub fn release(&mut self, name: &str) -> Result<()> {
        self.ensure_active()?;
        let pos = self.require(name)?;
        self.savepoints.truncate(pos);
        debug!(txn_id = self.id, savepoint = name, "savepoint released");
        Ok(())
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.savepoints
            .iter()
            .rposition(|sp| sp.name.eq_ignore_ascii_case(name))
    }

    fn require(&self, name: &str) -> Result<usize> {
        self.position(name)
            .ok_or_else(|| SqlError::Transaction(format!("savepoint '{}' does not exist", name)))
    }

    fn ensure_active(&self) -> Result<()> {
        if self.state != TransactionState::Active {
            return Err(SqlError::Transaction(format!(
                "transaction {} is no longer active",
                self.id
            )));
        }
        Ok(())
    }
}

/// Transaction coordinator statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionCoordinatorStats {
    pub active_transactions: u64,
    pub total_committed: u64,
    pub total_rolled_back: u64,
}

/// Allocates transaction ids and keeps lifecycle counters
#[derive(Debug)]
pub struct TransactionCoordinator {
    txn_id_gen: AtomicU64,
    active: AtomicU64,
    committed: AtomicU64,
    rolled_back: AtomicU64,
}

impl Default for TransactionCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionCoordinator {
    pub fn new() -> Self {
        Self {
            txn_id_gen: AtomicU64::new(1),
            active: AtomicU64::new(0),
            committed: AtomicU64::new(0),
            rolled_back: AtomicU64::new(0),
        }
    }

    /// Begin a new transaction, snapshotting the whole catalog
    pub fn begin(&self, isolation: IsolationLevel, catalog: &Catalog) -> Transaction {
        let id = self.txn_id_gen.fetch_add(1, Ordering::SeqCst);
        self.active.fetch_add(1, Ordering::SeqCst);
        debug!(txn_id = id, isolation = isolation.as_sql(), "transaction begin");
        Transaction {
            id,
            isolation,
            state: TransactionState::Active,
            snapshot: catalog.clone(),
            savepoints: Vec::new(),
        }
    }

    /// Keep every change; snapshots are discarded
    pub fn commit(&self, mut txn: Transaction) -> Result<()> {
        txn.ensure_active()?;
        txn.state = TransactionState::Committed;
        self.active.fetch_sub(1, Ordering::SeqCst);
        self.committed.fetch_add(1, Ordering::SeqCst);
        debug!(txn_id = txn.id, savepoints = txn.savepoints.len(), "transaction committed");
        Ok(())
    }

    /// Restore the catalog to its state at begin
    pub fn rollback(&self, mut txn: Transaction, catalog: &mut Catalog) -> Result<()> {
        txn.ensure_active()?;
        txn.state = TransactionState::Aborted;
        *catalog = txn.snapshot;
        self.active.fetch_sub(1, Ordering::SeqCst);
        self.rolled_back.fetch_add(1, Ordering::SeqCst);
        debug!(txn_id = txn.id, "transaction rolled back");
        Ok(())
    }

    pub fn stats(&self) -> TransactionCoordinatorStats {
        TransactionCoordinatorStats {
            active_transactions: self.active.load(Ordering::SeqCst),
            total_committed: self.committed.load(Ordering::SeqCst),
            total_rolled_back: self.rolled_back.load(Ordering::SeqCst),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{Dialect, DialectKind};
    use crate::types::{ColumnDef, ColumnType};
    use crate::database::Table;

    fn catalog_with(names: &[&str]) -> Catalog {
        let dialect = Dialect::latest(DialectKind::Postgres);
        let mut catalog = Catalog::new("public");
        for name in names {
            let table = Table::new(*name, vec![ColumnDef::new("id", ColumnType::Integer)], false).unwrap();
            catalog.create_table(None, table, &dialect).unwrap();
        }
        catalog
    }

    #[test]
    fn test_rollback_restores_catalog() {
        let coordinator = TransactionCoordinator::new();
        let mut catalog = catalog_with(&["a"]);
        let txn = coordinator.begin(IsolationLevel::Serializable, &catalog);
        assert_eq!(txn.isolation_level(), IsolationLevel::Serializable);

        catalog = catalog_with(&["a", "b"]);
        coordinator.rollback(txn, &mut catalog).unwrap();
        assert_eq!(catalog.table_names(None), vec!["a".to_string()]);

        let stats = coordinator.stats();
        assert_eq!(stats.active_transactions, 0);
        assert_eq!(stats.total_rolled_back, 1);
    }

    #[test]
    fn test_savepoint_stack() {
        let coordinator = TransactionCoordinator::new();
        let mut catalog = catalog_with(&[]);
        let mut txn = coordinator.begin(IsolationLevel::default(), &catalog);

        catalog = catalog_with(&["a"]);
        txn.savepoint("sp1", &catalog).unwrap();
        catalog = catalog_with(&["a", "b"]);
        txn.savepoint("sp2", &catalog).unwrap();
        catalog = catalog_with(&["a", "b", "c"]);

        txn.rollback_to("SP1", &mut catalog).unwrap();
        assert_eq!(catalog.table_names(None).len(), 1);
        assert_eq!(txn.savepoint_names(), vec!["sp1".to_string()]);

        txn.release("sp1").unwrap();
        assert!(txn.rollback_to("sp1", &mut catalog).is_err());

        coordinator.commit(txn).unwrap();
        assert_eq!(coordinator.stats().total_committed, 1);
    }
}
