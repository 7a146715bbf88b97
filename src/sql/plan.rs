/// Advisory query plans for EXPLAIN
///
/// # Architecture
/// ```ignore
/// SELECT name FROM users WHERE id = 7 ORDER BY name
///              ↓
///      Planner walks the AST:
///       1. FROM users: index on (id) covers `id = 7` → index lookup
///       2. Remaining steps: filter, project, sort
///              ↓
///      Plan: IndexLookup(users.pk_users) → Filter → Project → Sort
/// ```
///
/// The executor never consults a plan; it makes the same index decision on
/// its own at run time.

use super::ast::{JoinType, Query, SelectColumn, SelectStmt, SetExpr, Statement, TableRef};
use super::executor::{column_belongs, indexable, split_conjuncts};
use crate::catalog::{Catalog, CatalogEntry, ConnectionId};
use crate::database::{Table, TableIndex};
use std::fmt;

/// Query execution plan
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    /// Steps in execution order
    pub steps: Vec<PlanStep>,
    /// Rough output estimate (rows)
    pub estimated_rows: usize,
}

/// Data access for one FROM item
#[derive(Debug, Clone, PartialEq)]
pub enum ScanMethod {
    /// Every stored row is visited
    FullScan { table: String, rows: usize },

    /// Equality/IN lookup through an index
    IndexLookup {
        table: String,
        index: String,
        column: String,
        keys: usize,
        estimated_rows: usize,
    },

    /// View body evaluated on reference
    View { name: String },

    /// Common table expression, materialized once per query
    Cte { name: String },

    /// Subquery in FROM
    Derived { alias: String },

    /// FROM-less SELECT or DUAL
    SingleRow,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlanStep {
    Scan(ScanMethod),
    Join { join_type: JoinType },
    Filter,
    Aggregate { group_keys: usize },
    Having,
    Window { functions: usize },
    Project,
    Distinct,
    Sort { keys: usize },
    Limit,
    Union { all: bool },
    Mutate { statement: &'static str, table: String },
    Define { statement: &'static str },
}

/// Index statistics for cost estimation
#[derive(Debug, Clone)]
pub struct IndexStats {
    /// Number of distinct keys
    pub cardinality: usize,
    /// Total number of rows indexed
    pub total_rows: usize,
    pub is_unique: bool,
}

impl IndexStats {
    pub fn of(index: &TableIndex, table: &Table) -> Self {
        Self {
            cardinality: index.cardinality(),
            total_rows: table.len(),
            is_unique: index.is_unique(),
        }
    }

    /// Fraction of rows matching one key
    pub fn selectivity(&self) -> f64 {
        if self.cardinality == 0 {
            1.0
        } else {
            1.0 / self.cardinality as f64
        }
    }

    /// Estimated rows for a point lookup
    pub fn estimate_point_query(&self) -> usize {
        if self.is_unique {
            1
        } else {
            (self.total_rows as f64 * self.selectivity()).ceil() as usize
        }
    }
}

/// Builds plans against the catalog a connection sees
pub struct QueryPlanner<'a> {
    catalog: &'a Catalog,
    connection: ConnectionId,
    ctes: Vec<String>,
}

impl<'a> QueryPlanner<'a> {
    pub fn new(catalog: &'a Catalog, connection: ConnectionId) -> Self {
        Self {
            catalog,
            connection,
            ctes: Vec::new(),
        }
    }

    pub fn plan_statement(&mut self, stmt: &Statement) -> QueryPlan {
        let mutate = |statement: &'static str, table: &str| QueryPlan {
            steps: vec![PlanStep::Mutate {
                statement,
                table: table.to_string(),
            }],
            estimated_rows: 0,
        };
        match stmt {
            Statement::Query(query) => self.plan_query(query),
            Statement::Insert(insert) => mutate("INSERT", &insert.table.name),
            Statement::Update(update) => mutate("UPDATE", &update.table.name),
            Statement::Delete(delete) => mutate("DELETE", &delete.table.name),
            Statement::Merge(merge) => mutate("MERGE", &merge.target.name),
            other => QueryPlan {
                steps: vec![PlanStep::Define {
                    statement: other.kind(),
                }],
                estimated_rows: 0,
            },
        }
    }

    pub fn plan_query(&mut self, query: &Query) -> QueryPlan {
        let depth = self.ctes.len();
        let mut steps = Vec::new();
        for cte in &query.ctes {
            steps.extend(self.plan_query(&cte.query).steps);
            self.ctes.push(cte.name.to_lowercase());
        }
        let estimated_rows = self.plan_set_expr(&query.body, &mut steps);
        if !query.order_by.is_empty() {
            steps.push(PlanStep::Sort {
                keys: query.order_by.len(),
            });
        }
        if query.limit.is_some() || query.offset.is_some() {
            steps.push(PlanStep::Limit);
        }
        self.ctes.truncate(depth);
        QueryPlan {
            steps,
            estimated_rows,
        }
    }

    fn plan_set_expr(&mut self, body: &SetExpr, steps: &mut Vec<PlanStep>) -> usize {
        match body {
            SetExpr::Select(select) => self.plan_select(select, steps),
            SetExpr::Query(query) => {
                let plan = self.plan_query(query);
                steps.extend(plan.steps);
                plan.estimated_rows
            }
            SetExpr::Union { left, right, all } => {
                let rows = self.plan_set_expr(left, steps) + self.plan_set_expr(right, steps);
                steps.push(PlanStep::Union { all: *all });
                rows
            }
        }
    }

    fn plan_select(&mut self, select: &SelectStmt, steps: &mut Vec<PlanStep>) -> usize {
        let mut rows = match &select.from {
            None => {
                steps.push(PlanStep::Scan(ScanMethod::SingleRow));
                1
            }
            Some(from) => self.plan_from(from, select, steps),
        };
        if select.where_clause.is_some() {
            steps.push(PlanStep::Filter);
        }
        let aggregated = !select.group_by.is_empty()
            || select.columns.iter().any(|c| match c {
                SelectColumn::Expr { expr, .. } => expr.contains_aggregate(),
                _ => false,
            });
        if aggregated {
            steps.push(PlanStep::Aggregate {
                group_keys: select.group_by.len(),
            });
            if select.group_by.is_empty() {
                rows = 1;
            }
        }
        if select.having.is_some() {
            steps.push(PlanStep::Having);
        }
        let windows = select
            .columns
            .iter()
            .filter(|c| matches!(c, SelectColumn::Expr { expr, .. } if expr.contains_window()))
            .count();
        if windows > 0 {
            steps.push(PlanStep::Window { functions: windows });
        }
        steps.push(PlanStep::Project);
        if select.distinct {
            steps.push(PlanStep::Distinct);
        }
        if select.top.is_some() {
            steps.push(PlanStep::Limit);
        }
        rows
    }

    fn plan_from(&mut self, from: &TableRef, select: &SelectStmt, steps: &mut Vec<PlanStep>) -> usize {
        match from {
            TableRef::Table { name, alias, .. } => {
                if name.schema.is_none() && self.ctes.iter().any(|c| c.eq_ignore_ascii_case(&name.name)) {
                    steps.push(PlanStep::Scan(ScanMethod::Cte {
                        name: name.name.clone(),
                    }));
                    return 0;
                }
                match self.catalog.lookup(name, self.connection) {
                    Some(CatalogEntry::Table(table)) => {
                        let qualifier = alias.as_deref().unwrap_or(&name.name);
                        let method = scan_method(table, qualifier, select);
                        let rows = match &method {
                            ScanMethod::IndexLookup { estimated_rows, .. } => *estimated_rows,
                            _ => table.len(),
                        };
                        steps.push(PlanStep::Scan(method));
                        rows
                    }
                    Some(CatalogEntry::View(view)) => {
                        steps.push(PlanStep::Scan(ScanMethod::View {
                            name: view.name.clone(),
                        }));
                        self.plan_query(&view.query).estimated_rows
                    }
                    None => {
                        steps.push(PlanStep::Scan(ScanMethod::SingleRow));
                        1
                    }
                }
            }
            TableRef::Subquery { query, alias } => {
                let plan = self.plan_query(query);
                steps.extend(plan.steps);
                steps.push(PlanStep::Scan(ScanMethod::Derived { alias: alias.clone() }));
                plan.estimated_rows
            }
            TableRef::Join {
                left,
                right,
                join_type,
                ..
            } => {
                let empty = SelectStmt::default();
                let l = self.plan_from(left, &empty, steps);
                let r = self.plan_from(right, &empty, steps);
                steps.push(PlanStep::Join { join_type: *join_type });
                match join_type {
                    JoinType::Cross => l * r,
                    _ => l.max(r),
                }
            }
        }
    }

    /// Human-readable plan
    pub fn explain(plan: &QueryPlan) -> String {
        plan.to_string()
    }
}

/// Index lookup when a WHERE conjunct pins an indexed column, else full scan
fn scan_method(table: &Table, qualifier: &str, select: &SelectStmt) -> ScanMethod {
    let full = ScanMethod::FullScan {
        table: table.name().to_string(),
        rows: table.len(),
    };
    let Some(filter) = &select.where_clause else {
        return full;
    };
    let mut conjuncts = Vec::new();
    split_conjuncts(filter, &mut conjuncts);
    for conjunct in conjuncts {
        let Some((column, keys)) = indexable(conjunct) else {
            continue;
        };
        if !column_belongs(column, table, qualifier) {
            continue;
        }
        let Some(ordinal) = table.ordinal_of(column.1) else {
            continue;
        };
        if let Some(index) = table.index_for_columns(&[ordinal]) {
            let stats = IndexStats::of(index, table);
            return ScanMethod::IndexLookup {
                table: table.name().to_string(),
                index: index.name().to_string(),
                column: table.columns()[ordinal].name.clone(),
                keys: keys.len(),
                estimated_rows: stats.estimate_point_query() * keys.len(),
            };
        }
    }
    full
}

impl fmt::Display for QueryPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Query Execution Plan:")?;
        writeln!(f, "====================")?;
        for (i, step) in self.steps.iter().enumerate() {
            write!(f, "{}. ", i + 1)?;
            match step {
                PlanStep::Scan(ScanMethod::FullScan { table, rows }) => {
                    writeln!(f, "Full Table Scan: {} ({} rows)", table, rows)?
                }
                PlanStep::Scan(ScanMethod::IndexLookup {
                    table,
                    index,
                    column,
                    keys,
                    estimated_rows,
                }) => writeln!(
                    f,
                    "Index Lookup: {}.{} via {} ({} keys, ~{} rows)",
                    table, column, index, keys, estimated_rows
                )?,
                PlanStep::Scan(ScanMethod::View { name }) => writeln!(f, "View: {}", name)?,
                PlanStep::Scan(ScanMethod::Cte { name }) => writeln!(f, "CTE Scan: {}", name)?,
                PlanStep::Scan(ScanMethod::Derived { alias }) => writeln!(f, "Derived Table: {}", alias)?,
                PlanStep::Scan(ScanMethod::SingleRow) => writeln!(f, "Single Row")?,
                PlanStep::Join { join_type } => writeln!(f, "Nested Loop Join ({:?})", join_type)?,
                PlanStep::Filter => writeln!(f, "Filter")?,
                PlanStep::Aggregate { group_keys } => writeln!(f, "Aggregate ({} group keys)", group_keys)?,
                PlanStep::Having => writeln!(f, "Having")?,
                PlanStep::Window { functions } => writeln!(f, "Window ({} functions)", functions)?,
                PlanStep::Project => writeln!(f, "Project")?,
                PlanStep::Distinct => writeln!(f, "Distinct")?,
                PlanStep::Sort { keys } => writeln!(f, "Sort ({} keys)", keys)?,
                PlanStep::Limit => writeln!(f, "Limit")?,
                PlanStep::Union { all } => writeln!(f, "Union{}", if *all { " All" } else { "" })?,
                PlanStep::Mutate { statement, table } => writeln!(f, "{} {}", statement, table)?,
                PlanStep::Define { statement } => writeln!(f, "{}", statement)?,
            }
        }
        writeln!(f, "Estimated Rows: {}", self.estimated_rows)
    }
}

impl QueryPlan {
    /// True when any FROM item is read through an index
    pub fn uses_index(&self) -> bool {
        self.steps
            .iter()
            .any(|s| matches!(s, PlanStep::Scan(ScanMethod::IndexLookup { .. })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{Dialect, DialectKind};
    use crate::sql::parser::Parser;
    use crate::types::{ColumnDef, ColumnType};

    fn catalog(dialect: &Dialect) -> Catalog {
        let mut catalog = Catalog::new("main");
        let mut users = Table::new(
            "users",
            vec![
                ColumnDef::new("id", ColumnType::Integer),
                ColumnDef::new("name", ColumnType::Text),
            ],
            false,
        )
        .unwrap();
        users.set_primary_key(&["id".to_string()], dialect).unwrap();
        catalog.create_table(None, users, dialect).unwrap();
        catalog
    }

    fn plan(sql: &str) -> QueryPlan {
        let dialect = Dialect::latest(DialectKind::Postgres);
        let catalog = catalog(&dialect);
        let stmt = Parser::new(sql, &dialect).unwrap().parse().unwrap();
        QueryPlanner::new(&catalog, 0).plan_statement(&stmt)
    }

    #[test]
    fn test_index_stats() {
        let stats = IndexStats {
            cardinality: 1000,
            total_rows: 10000,
            is_unique: false,
        };
        assert_eq!(stats.selectivity(), 0.001);
        assert_eq!(stats.estimate_point_query(), 10);
    }

    #[test]
    fn test_point_lookup_uses_primary_key() {
        let plan = plan("SELECT name FROM users WHERE id = 7");
        assert!(plan.uses_index());
        assert!(plan.to_string().contains("Index Lookup: users.id"));
    }

    #[test]
    fn test_non_indexed_predicate_scans() {
        let plan = plan("SELECT id FROM users WHERE name = 'a' ORDER BY id");
        assert!(!plan.uses_index());
        assert_eq!(plan.steps.last(), Some(&PlanStep::Sort { keys: 1 }));
    }
}
