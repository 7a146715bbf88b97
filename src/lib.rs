//! mockdb - in-process multi-dialect SQL engine
//!
//! Impersonates MySQL, PostgreSQL, SQL Server, Oracle, SQLite and DB2 closely
//! enough for data-access code to be tested without a database server.
//!
//! ## Architecture
//! - SQL layer: lexer, dialect-gated parser, canonical printer
//! - Execution layer: expression evaluator, SELECT pipeline, mutation paths
//! - Storage layer: tables with hash indexes, constraints and triggers
//! - Transaction layer: catalog snapshots for rollback and savepoints
//!
//! ```ignore
//! let db = Database::new(DbConfig::mysql("8.0"))?;
//! let mut conn = db.connect();
//! conn.execute("CREATE TABLE users (id INT PRIMARY KEY, name VARCHAR(50))", &Params::new())?;
//! conn.execute("INSERT INTO users VALUES (1, 'Ann')", &Params::new())?;
//! let rows = conn.query("SELECT name FROM users WHERE id = @id", &Params::new().bind("id", 1))?;
//! ```

pub mod config;
pub mod types;
pub mod dialect;
pub mod catalog;
pub mod sql;
pub mod txn;
pub mod database;

mod error;

pub use config::DbConfig;
pub use error::{Result, SqlError};

pub use catalog::{Catalog, ProcedureDef};
pub use database::{Connection, Database, DatabaseStats, Table, TriggerContext};
pub use dialect::{Dialect, DialectKind, DialectRegistry};
pub use sql::{
    parse, parse_multi, parse_scalar, parse_where, print_expr, split_statements, Params, QueryPlan,
    QueryResult, RowSet,
};
pub use txn::IsolationLevel;
pub use types::{ColumnDef, ColumnType, IndexDef, TempScope, TriggerEvent, Value};
