//! Database catalog: schemas, tables, views, temporary tables and procedures

mod registry;

pub use registry::{Catalog, CatalogEntry, ConnectionId, ProcedureDef, Schema, TableKey, ViewDef};
