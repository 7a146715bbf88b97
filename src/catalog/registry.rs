/// Registry of every named object the engine can resolve
use crate::database::Table;
use crate::dialect::Dialect;
use crate::error::{Result, SqlError};
use crate::sql::ast::{ObjectName, Query};
use crate::types::{ForeignKeyDef, TempScope};
use ahash::AHashMap;

/// Identifies the connection that owns connection-local temporary tables
pub type ConnectionId = u64;

/// Stored view: the parsed query is re-evaluated on every read
#[derive(Debug, Clone)]
pub struct ViewDef {
    pub name: String,
    /// Optional output column names
    pub columns: Vec<String>,
    pub query: Query,
}

/// Stored procedure: named parameters bound into a SQL body
#[derive(Debug, Clone)]
pub struct ProcedureDef {
    pub name: String,
    pub params: Vec<String>,
    pub body: String,
}

impl ProcedureDef {
    pub fn new<I, S>(name: impl Into<String>, params: I, body: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            params: params.into_iter().map(Into::into).collect(),
            body: body.into(),
        }
    }
}

/// Named schema; keys are lowercase
#[derive(Debug, Clone, Default)]
pub struct Schema {
    tables: AHashMap<String, Table>,
    views: AHashMap<String, ViewDef>,
}

impl Schema {
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.values().map(|t| t.name().to_string()).collect();
        names.sort();
        names
    }

    pub fn view_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.views.values().map(|v| v.name.clone()).collect();
        names.sort();
        names
    }
}

/// Stable address of a table inside the catalog
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TableKey {
    Local(ConnectionId, String),
    Global(String),
    Schema(String, String),
}

/// Result of resolving a name in FROM
#[derive(Debug, Clone, Copy)]
pub enum CatalogEntry<'a> {
    Table(&'a Table),
    View(&'a ViewDef),
}

#[derive(Debug, Clone)]
pub struct Catalog {
    default_schema: String,
    schemas: AHashMap<String, Schema>,
    global_temps: AHashMap<String, Table>,
    local_temps: AHashMap<ConnectionId, AHashMap<String, Table>>,
    procedures: AHashMap<String, ProcedureDef>,
}

fn key(name: &str) -> String {
    name.to_lowercase()
}

impl Catalog {
    pub fn new(default_schema: &str) -> Self {
        let mut schemas = AHashMap::new();
        schemas.insert(key(default_schema), Schema::default());
        Self {
            default_schema: key(default_schema),
            schemas,
            global_temps: AHashMap::new(),
            local_temps: AHashMap::new(),
            procedures: AHashMap::new(),
        }
    }

    pub fn default_schema(&self) -> &str {
        &self.default_schema
    }

    fn schema_key(&self, schema: Option<&str>) -> String {
        schema.map(key).unwrap_or_else(|| self.default_schema.clone())
    }

    pub fn schema(&self, name: &str) -> Option<&Schema> {
        self.schemas.get(&key(name))
    }

    pub fn schema_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.schemas.keys().cloned().collect();
        names.sort();
        names
    }

    fn schema_mut(&mut self, schema: Option<&str>) -> &mut Schema {
        let k = self.schema_key(schema);
        self.schemas.entry(k).or_default()
    }

    // ----- tables -----

    /// Register a permanent table
    pub fn create_table(&mut self, schema: Option<&str>, table: Table, dialect: &Dialect) -> Result<TableKey> {
        let schema_key = self.schema_key(schema);
        let name = key(table.name());
        let target = self.schema_mut(schema);
        if target.tables.contains_key(&name) || target.views.contains_key(&name) {
            return Err(dialect.already_exists(table.name()));
        }
        target.tables.insert(name.clone(), table);
        Ok(TableKey::Schema(schema_key, name))
    }

    /// Register a temporary table in its scope
    pub fn create_temp_table(
        &mut self,
        connection: ConnectionId,
        scope: TempScope,
        mut table: Table,
        dialect: &Dialect,
    ) -> Result<TableKey> {
        table.set_temp_scope(Some(scope));
        let name = key(table.name());
        let (map, table_key) = match scope {
            TempScope::Connection => (
                self.local_temps.entry(connection).or_default(),
                TableKey::Local(connection, name.clone()),
            ),
            TempScope::Global => (&mut self.global_temps, TableKey::Global(name.clone())),
        };
        if map.contains_key(&name) {
            return Err(dialect.already_exists(table.name()));
        }
        map.insert(name, table);
        Ok(table_key)
    }

    pub fn table(&self, table_key: &TableKey) -> Option<&Table> {
        match table_key {
            TableKey::Local(conn, name) => self.local_temps.get(conn)?.get(name),
            TableKey::Global(name) => self.global_temps.get(name),
            TableKey::Schema(schema, name) => self.schemas.get(schema)?.tables.get(name),
        }
    }

    pub fn table_mut(&mut self, table_key: &TableKey) -> Option<&mut Table> {
        match table_key {
            TableKey::Local(conn, name) => self.local_temps.get_mut(conn)?.get_mut(name),
            TableKey::Global(name) => self.global_temps.get_mut(name),
            TableKey::Schema(schema, name) => self.schemas.get_mut(schema)?.tables.get_mut(name),
        }
    }

    pub fn replace_table(&mut self, table_key: &TableKey, table: Table) {
        if let Some(slot) = self.table_mut(table_key) {
            *slot = table;
        }
    }

    /// Resolve a table (not a view) visible to `connection`.
    ///
    /// Unqualified names look at the connection's temp tables, then global
    /// temp tables, then the default schema.
    pub fn resolve_table(&self, name: &ObjectName, connection: ConnectionId) -> Option<TableKey> {
        let table_name = key(&name.name);
        if name.schema.is_none() {
            if self
                .local_temps
                .get(&connection)
                .map(|m| m.contains_key(&table_name))
                .unwrap_or(false)
            {
                return Some(TableKey::Local(connection, table_name));
            }
            if self.global_temps.contains_key(&table_name) {
                return Some(TableKey::Global(table_name));
            }
        }
        let schema = self.schema_key(name.schema.as_deref());
        self.schemas
            .get(&schema)
            .filter(|s| s.tables.contains_key(&table_name))
            .map(|_| TableKey::Schema(schema, table_name))
    }

    pub fn require_table(&self, name: &ObjectName, connection: ConnectionId, dialect: &Dialect) -> Result<TableKey> {
        self.resolve_table(name, connection)
            .ok_or_else(|| dialect.unknown_table(&name.name))
    }

    /// Resolve a FROM item: temp tables, then views, then tables
    pub fn lookup(&self, name: &ObjectName, connection: ConnectionId) -> Option<CatalogEntry<'_>> {
        let table_name = key(&name.name);
        if name.schema.is_none() {
            if let Some(t) = self
                .local_temps
                .get(&connection)
                .and_then(|m| m.get(&table_name))
            {
                return Some(CatalogEntry::Table(t));
            }
            if let Some(t) = self.global_temps.get(&table_name) {
                return Some(CatalogEntry::Table(t));
            }
        }
        let schema = self.schemas.get(&self.schema_key(name.schema.as_deref()))?;
        if let Some(view) = schema.views.get(&table_name) {
            return Some(CatalogEntry::View(view));
        }
        schema.tables.get(&table_name).map(CatalogEntry::Table)
    }

    /// Permanent table by name, searching the default schema first
    pub fn find_table(&self, name: &str) -> Option<(TableKey, &Table)> {
        let name = key(name);
        if let Some(t) = self
            .schemas
            .get(&self.default_schema)
            .and_then(|s| s.tables.get(&name))
        {
            return Some((TableKey::Schema(self.default_schema.clone(), name), t));
        }
        self.schemas.iter().find_map(|(schema, s)| {
            s.tables
                .get(&name)
                .map(|t| (TableKey::Schema(schema.clone(), name.clone()), t))
        })
    }

    /// Permanent tables with a foreign key pointing at `table`
    pub fn referencing(&self, table: &str) -> Vec<(TableKey, ForeignKeyDef)> {
        let mut found = Vec::new();
        for (schema, s) in &self.schemas {
            for (name, t) in &s.tables {
                for fk in t.foreign_keys() {
                    if fk.ref_table.eq_ignore_ascii_case(table) {
                        found.push((TableKey::Schema(schema.clone(), name.clone()), fk.clone()));
                    }
                }
            }
        }
        found
    }

    /// Drop a table; returns false when it did not exist
    pub fn drop_table(&mut self, name: &ObjectName, connection: ConnectionId) -> bool {
        let Some(table_key) = self.resolve_table(name, connection) else {
            return false;
        };
        match &table_key {
            TableKey::Local(conn, n) => self
                .local_temps
                .get_mut(conn)
                .and_then(|m| m.remove(n))
                .is_some(),
            TableKey::Global(n) => self.global_temps.remove(n).is_some(),
            TableKey::Schema(schema, n) => self
                .schemas
                .get_mut(schema)
                .and_then(|s| s.tables.remove(n))
                .is_some(),
        }
    }

    /// Remove every temp table owned by a connection
    pub fn drop_connection(&mut self, connection: ConnectionId) -> usize {
        self.local_temps
            .remove(&connection)
            .map(|m| m.len())
            .unwrap_or(0)
    }

    pub fn table_names(&self, schema: Option<&str>) -> Vec<String> {
        self.schemas
            .get(&self.schema_key(schema))
            .map(|s| s.table_names())
            .unwrap_or_default()
    }

    // ----- views -----

    pub fn add_view(&mut self, schema: Option<&str>, view: ViewDef, replace: bool, dialect: &Dialect) -> Result<()> {
        let name = key(&view.name);
        let target = self.schema_mut(schema);
        if target.tables.contains_key(&name) && !replace {
            return Err(dialect.already_exists(&view.name));
        }
        if target.views.contains_key(&name) && !replace {
            return Err(dialect.already_exists(&view.name));
        }
        target.views.insert(name, view);
        Ok(())
    }

    pub fn view(&self, name: &ObjectName) -> Option<&ViewDef> {
        self.schemas
            .get(&self.schema_key(name.schema.as_deref()))?
            .views
            .get(&key(&name.name))
    }

    pub fn drop_view(&mut self, name: &ObjectName) -> bool {
        let schema = self.schema_key(name.schema.as_deref());
        self.schemas
            .get_mut(&schema)
            .and_then(|s| s.views.remove(&key(&name.name)))
            .is_some()
    }

    // ----- procedures -----

    pub fn add_procedure(&mut self, procedure: ProcedureDef) -> Result<()> {
        if procedure.name.trim().is_empty() {
            return Err(SqlError::invalid("procedure name must not be empty"));
        }
        self.procedures.insert(key(&procedure.name), procedure);
        Ok(())
    }

    pub fn procedure(&self, name: &str) -> Option<&ProcedureDef> {
        self.procedures.get(&key(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::DialectKind;
    use crate::sql::ast::SelectStmt;
    use crate::types::{ColumnDef, ColumnType};

    fn table(name: &str) -> Table {
        Table::new(name, vec![ColumnDef::new("id", ColumnType::Integer)], false).unwrap()
    }

    #[test]
    fn test_create_and_resolve_case_insensitive() {
        let dialect = Dialect::latest(DialectKind::MySql);
        let mut catalog = Catalog::new("default");
        catalog.create_table(None, table("Users"), &dialect).unwrap();
        let key = catalog.resolve_table(&ObjectName::new("USERS"), 1).unwrap();
        assert_eq!(catalog.table(&key).unwrap().name(), "Users");
        assert!(catalog.create_table(None, table("users"), &dialect).is_err());
        assert!(catalog.resolve_table(&ObjectName::qualified("other", "users"), 1).is_none());
    }

    #[test]
    fn test_temp_table_scopes() {
        let dialect = Dialect::latest(DialectKind::SqlServer);
        let mut catalog = Catalog::new("dbo");
        catalog
            .create_temp_table(1, TempScope::Connection, table("#work"), &dialect)
            .unwrap();
        catalog
            .create_temp_table(1, TempScope::Global, table("##shared"), &dialect)
            .unwrap();

        assert!(catalog.resolve_table(&ObjectName::new("#work"), 1).is_some());
        assert!(catalog.resolve_table(&ObjectName::new("#work"), 2).is_none());
        assert!(catalog.resolve_table(&ObjectName::new("##shared"), 2).is_some());

        assert_eq!(catalog.drop_connection(1), 1);
        assert!(catalog.resolve_table(&ObjectName::new("#work"), 1).is_none());
    }

    #[test]
    fn test_views_shadow_tables() {
        let dialect = Dialect::latest(DialectKind::Postgres);
        let mut catalog = Catalog::new("public");
        catalog.create_table(None, table("items"), &dialect).unwrap();
        let view = ViewDef {
            name: "items".into(),
            columns: Vec::new(),
            query: Query::from_select(SelectStmt::default()),
        };
        assert!(catalog.add_view(None, view.clone(), false, &dialect).is_err());
        catalog.add_view(None, view, true, &dialect).unwrap();
        assert!(matches!(
            catalog.lookup(&ObjectName::new("items"), 1),
            Some(CatalogEntry::View(_))
        ));
        assert!(catalog.drop_view(&ObjectName::new("items")));
        assert!(matches!(
            catalog.lookup(&ObjectName::new("items"), 1),
            Some(CatalogEntry::Table(_))
        ));
    }

    #[test]
    fn test_referencing_tables() {
        let dialect = Dialect::latest(DialectKind::MySql);
        let mut catalog = Catalog::new("default");
        catalog.create_table(None, table("parent"), &dialect).unwrap();
        let mut child = table("child");
        child
            .add_foreign_key(
                ForeignKeyDef {
                    name: "fk_child_parent".into(),
                    column: "id".into(),
                    ref_table: "parent".into(),
                    ref_column: "id".into(),
                },
                &dialect,
            )
            .unwrap();
        catalog.create_table(None, child, &dialect).unwrap();
        let refs = catalog.referencing("PARENT");
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].1.name, "fk_child_parent");
    }
}
