//! Database Module
//!
//! # Module Structure
//! - `core`: `Database` struct, schema setup API and statement dispatch
//! - `connection`: per-caller sessions, transactions and savepoints
//! - `table`: row storage with constraint checks and triggers
//! - `index`: hash indexes over row positions

pub mod core;
pub mod connection;
pub mod table;
pub mod index;

pub use self::core::{Database, DatabaseStats};
pub use connection::Connection;
pub use index::{IndexKey, TableIndex};
pub use table::{StagedKeys, Table, Trigger, TriggerContext, TriggerFn};
