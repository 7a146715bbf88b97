//! SELECT execution over the in-memory catalog
//!
//! Pipeline: FROM (tables, views, CTEs, derived tables, joins) -> WHERE ->
//! GROUP BY/aggregates -> HAVING -> window functions -> projection ->
//! DISTINCT -> ORDER BY -> TOP -> OFFSET/LIMIT.

use super::aggregate::Accumulator;
use super::ast::{
    is_aggregate_name, BinaryOperator, Expr, JoinType, ObjectName, OrderByExpr, Query,
    SelectColumn, SelectStmt, SetExpr, TableRef,
};
use super::evaluator::{expr_key, ColumnRef, ExprEvaluator, Scope, SubqueryRunner};
use super::params::Params;
use super::printer::ExprPrinter;
use super::window::{evaluate_window, WindowRow};
use crate::catalog::{Catalog, CatalogEntry, ConnectionId};
use crate::database::Table;
use crate::dialect::Dialect;
use crate::error::Result;
use crate::types::Value;
use ahash::{AHashMap, AHashSet};
use chrono::{Local, NaiveDateTime};
use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::rc::Rc;
use tracing::{debug, trace};

/// Rows returned by a query
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RowSet {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl RowSet {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Vec<Value>> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column, matched case-insensitively
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.eq_ignore_ascii_case(name))
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx)
    }

    /// First column of the first row
    pub fn scalar(&self) -> Option<&Value> {
        self.rows.first()?.first()
    }

    pub fn column_values(&self, column: &str) -> Vec<Value> {
        match self.column_index(column) {
            Some(idx) => self
                .rows
                .iter()
                .map(|r| r.get(idx).cloned().unwrap_or(Value::Null))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Rows as maps (column_name -> value)
    pub fn rows_as_maps(&self) -> Vec<HashMap<String, Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .zip(row.iter())
                    .map(|(col, val)| (col.clone(), val.clone()))
                    .collect()
            })
            .collect()
    }
}

/// Statement result
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    /// SELECT result
    Rows(RowSet),

    /// INSERT/UPDATE/DELETE/MERGE affected-row count under the dialect's convention
    Affected(u64),

    /// CREATE/DROP result
    Definition { message: String },
}

impl QueryResult {
    pub fn affected_rows(&self) -> u64 {
        match self {
            QueryResult::Affected(n) => *n,
            _ => 0,
        }
    }

    pub fn rows(&self) -> Option<&RowSet> {
        match self {
            QueryResult::Rows(rows) => Some(rows),
            _ => None,
        }
    }

    pub fn into_rows(self) -> Option<RowSet> {
        match self {
            QueryResult::Rows(rows) => Some(rows),
            _ => None,
        }
    }

    /// Row count for SELECT results, affected rows otherwise
    pub fn row_count(&self) -> usize {
        match self {
            QueryResult::Rows(rows) => rows.len(),
            QueryResult::Affected(n) => *n as usize,
            QueryResult::Definition { .. } => 0,
        }
    }
}

/// Per-statement execution settings
#[derive(Clone, Copy)]
pub struct ExecContext<'a> {
    pub dialect: &'a Dialect,
    pub params: &'a Params,
    pub connection: ConnectionId,
    /// Timestamp shared by every temporal function in the statement
    pub now: NaiveDateTime,
}

impl<'a> ExecContext<'a> {
    pub fn new(dialect: &'a Dialect, params: &'a Params, connection: ConnectionId) -> Self {
        Self {
            dialect,
            params,
            connection,
            now: Local::now().naive_local(),
        }
    }
}

/// Intermediate result: qualified columns plus materialized rows
#[derive(Debug, Clone, Default)]
pub(crate) struct Relation {
    pub columns: Vec<ColumnRef>,
    pub rows: Vec<Vec<Value>>,
}

impl Relation {
    /// FROM-less SELECT and DUAL: one row without columns
    fn single_row() -> Self {
        Self {
            columns: Vec::new(),
            rows: vec![Vec::new()],
        }
    }

    fn requalify(mut self, qualifier: &str) -> Self {
        for col in &mut self.columns {
            col.qualifier = Some(qualifier.to_string());
        }
        self
    }

    fn rename(mut self, names: &[String], dialect: &Dialect) -> Result<Self> {
        if names.is_empty() {
            return Ok(self);
        }
        if names.len() != self.columns.len() {
            return Err(dialect.syntax_error(&format!(
                "column list has {} names but the query returns {} columns",
                names.len(),
                self.columns.len()
            )));
        }
        for (col, name) in self.columns.iter_mut().zip(names) {
            col.name = name.clone();
        }
        Ok(self)
    }

    pub fn into_row_set(self) -> RowSet {
        RowSet::new(self.columns.into_iter().map(|c| c.name).collect(), self.rows)
    }
}

/// One row moving through the select pipeline
struct Item {
    /// Source row (the group's first row when grouped)
    values: Vec<Value>,
    /// Aggregate and window results keyed by `expr_key`
    computed: AHashMap<String, Value>,
}

/// Read-only query executor
pub struct QueryExecutor<'a> {
    catalog: &'a Catalog,
    ctx: ExecContext<'a>,
    /// Materialized CTEs visible to the query being executed, innermost last
    ctes: RefCell<Vec<(String, Rc<Relation>)>>,
}

impl<'a> QueryExecutor<'a> {
    pub fn new(catalog: &'a Catalog, ctx: ExecContext<'a>) -> Self {
        Self {
            catalog,
            ctx,
            ctes: RefCell::new(Vec::new()),
        }
    }

    pub fn catalog(&self) -> &'a Catalog {
        self.catalog
    }

    pub fn dialect(&self) -> &'a Dialect {
        self.ctx.dialect
    }

    pub fn evaluator(&self) -> ExprEvaluator<'_> {
        ExprEvaluator::new(self.ctx.dialect, self.ctx.params)
            .with_runner(self)
            .with_now(self.ctx.now)
    }

    /// Execute a query to completion
    pub fn query(&self, query: &Query) -> Result<RowSet> {
        Ok(self.execute_query(query, None)?.into_row_set())
    }

    pub(crate) fn execute_query(&self, query: &Query, outer: Option<&Scope<'_>>) -> Result<Relation> {
        let depth = self.ctes.borrow().len();
        let result = self
            .push_ctes(query, outer)
            .and_then(|_| self.execute_query_body(query, outer));
        self.ctes.borrow_mut().truncate(depth);
        result
    }

    fn push_ctes(&self, query: &Query, outer: Option<&Scope<'_>>) -> Result<()> {
        for cte in &query.ctes {
            let relation = self
                .execute_query(&cte.query, outer)?
                .rename(&cte.columns, self.ctx.dialect)?
                .requalify(&cte.name);
            trace!(cte = %cte.name, rows = relation.rows.len(), "materialized CTE");
            self.ctes
                .borrow_mut()
                .push((cte.name.to_lowercase(), Rc::new(relation)));
        }
        Ok(())
    }

    fn execute_query_body(&self, query: &Query, outer: Option<&Scope<'_>>) -> Result<Relation> {
        match &query.body {
            SetExpr::Select(select) => self.execute_select(
                select,
                &query.order_by,
                query.limit.as_ref(),
                query.offset.as_ref(),
                outer,
            ),
            body => {
                let evaluator = self.evaluator();
                let mut relation = self.execute_set_expr(body, outer)?;
                self.order_output(&evaluator, &mut relation, &query.order_by)?;
                let offset = self.paging_value(&evaluator, query.offset.as_ref(), "OFFSET")?;
                let limit = self.paging_value(&evaluator, query.limit.as_ref(), "LIMIT")?;
                apply_paging(&mut relation.rows, offset, limit);
                Ok(relation)
            }
        }
    }

    fn execute_set_expr(&self, body: &SetExpr, outer: Option<&Scope<'_>>) -> Result<Relation> {
        match body {
            SetExpr::Select(select) => self.execute_select(select, &[], None, None, outer),
            SetExpr::Query(query) => self.execute_query(query, outer),
            SetExpr::Union { left, right, all } => {
                let left = self.execute_set_expr(left, outer)?;
                let right = self.execute_set_expr(right, outer)?;
                self.union(left, right, *all)
            }
        }
    }

    /// Concatenate two UNION operands after validating their shapes
    fn union(&self, mut left: Relation, right: Relation, all: bool) -> Result<Relation> {
        let dialect = self.ctx.dialect;
        if left.columns.len() != right.columns.len() {
            return Err(dialect.union_column_count_mismatch());
        }
        for i in 0..left.columns.len() {
            let l = first_non_null(&left.rows, i);
            let r = first_non_null(&right.rows, i);
            if let (Some(l), Some(r)) = (l, r) {
                if !dialect.are_union_column_types_compatible(l.category(), r.category()) {
                    return Err(dialect.union_type_mismatch(l.type_name(), r.type_name()));
                }
            }
        }
        left.rows.extend(right.rows);
        if !all {
            let fold = self.evaluator().fold_case();
            let mut seen = AHashSet::with_capacity(left.rows.len());
            left.rows.retain(|row| seen.insert(row_key(row, fold)));
        }
        Ok(left)
    }

    /// ORDER BY over a finished relation (UNION results): names and positions
    /// refer to output columns
    fn order_output(&self, evaluator: &ExprEvaluator<'_>, relation: &mut Relation, order_by: &[OrderByExpr]) -> Result<()> {
        if order_by.is_empty() {
            return Ok(());
        }
        let columns: Vec<ColumnRef> = relation
            .columns
            .iter()
            .map(|c| ColumnRef::new(None, &c.name))
            .collect();
        let mut keyed = Vec::with_capacity(relation.rows.len());
        for row in relation.rows.drain(..) {
            let scope = Scope::new(&columns, &row);
            let mut keys = Vec::with_capacity(order_by.len());
            for item in order_by {
                keys.push(match ordinal_position(&item.expr, row.len(), self.ctx.dialect)? {
                    Some(i) => row[i].clone(),
                    None => evaluator.eval(&item.expr, &scope)?,
                });
            }
            keyed.push((keys, row));
        }
        keyed.sort_by(|a, b| evaluator.compare_sort_keys(&a.0, &b.0, order_by));
        relation.rows = keyed.into_iter().map(|(_, row)| row).collect();
        Ok(())
    }

    fn paging_value(&self, evaluator: &ExprEvaluator<'_>, expr: Option<&Expr>, what: &str) -> Result<Option<usize>> {
        let Some(expr) = expr else {
            return Ok(None);
        };
        let value = evaluator.eval_constant(expr)?;
        match value.as_i64() {
            Some(n) if n >= 0 => Ok(Some(n as usize)),
            _ => Err(self.ctx.dialect.syntax_error(&format!(
                "{} must be a non-negative integer, got '{}'",
                what, value
            ))),
        }
    }

    /// Materialize a FROM item (MERGE sources)
    pub(crate) fn relation(&self, from: &TableRef) -> Result<Relation> {
        let evaluator = self.evaluator();
        self.resolve_from(from, None, &evaluator, None)
    }

    // ----- SELECT -----

    fn execute_select(
        &self,
        select: &SelectStmt,
        order_by: &[OrderByExpr],
        limit: Option<&Expr>,
        offset: Option<&Expr>,
        outer: Option<&Scope<'_>>,
    ) -> Result<Relation> {
        let evaluator = self.evaluator();

        let source = match &select.from {
            None => Relation::single_row(),
            Some(from) => self.resolve_from(from, select.where_clause.as_ref(), &evaluator, outer)?,
        };

        let mut rows = Vec::with_capacity(source.rows.len());
        match &select.where_clause {
            Some(predicate) => {
                for row in source.rows.iter() {
                    let scope = Scope::new(&source.columns, row).with_outer(outer);
                    if evaluator.eval_predicate(predicate, &scope)? {
                        rows.push(row.clone());
                    }
                }
            }
            None => rows.extend(source.rows.iter().cloned()),
        }

        let aggregates = collect_aggregates(select, order_by);
        let mut items = if !select.group_by.is_empty() || !aggregates.is_empty() {
            self.group_rows(&evaluator, select, &source.columns, rows, &aggregates, outer)?
        } else {
            rows.into_iter()
                .map(|values| Item {
                    values,
                    computed: AHashMap::new(),
                })
                .collect()
        };

        if let Some(having) = &select.having {
            let mut kept = Vec::with_capacity(items.len());
            for item in items {
                let scope = item_scope(&source.columns, &item, outer);
                if evaluator.eval_predicate(having, &scope)? {
                    kept.push(item);
                }
            }
            items = kept;
        }

        self.compute_windows(&evaluator, select, order_by, &source.columns, &mut items, outer)?;

        let output_columns = self.output_columns(select, &source.columns)?;
        let mut keyed = Vec::with_capacity(items.len());
        for item in &items {
            let output = self.project(&evaluator, select, &source.columns, item, outer)?;
            let keys = if order_by.is_empty() {
                Vec::new()
            } else {
                self.order_keys(&evaluator, order_by, &output_columns, &output, &source.columns, item, outer)?
            };
            keyed.push((keys, output));
        }

        if select.distinct {
            let fold = evaluator.fold_case();
            let mut seen = AHashSet::with_capacity(keyed.len());
            keyed.retain(|(_, output)| seen.insert(row_key(output, fold)));
        }

        if !order_by.is_empty() {
            keyed.sort_by(|a, b| evaluator.compare_sort_keys(&a.0, &b.0, order_by));
        }

        let mut rows: Vec<Vec<Value>> = keyed.into_iter().map(|(_, output)| output).collect();
        if let Some(top) = self.paging_value(&evaluator, select.top.as_ref(), "TOP")? {
            rows.truncate(top);
        }
        let offset = self.paging_value(&evaluator, offset, "OFFSET")?;
        let limit = self.paging_value(&evaluator, limit, "LIMIT")?;
        apply_paging(&mut rows, offset, limit);

        Ok(Relation {
            columns: output_columns,
            rows,
        })
    }

    fn group_rows(
        &self,
        evaluator: &ExprEvaluator<'_>,
        select: &SelectStmt,
        columns: &[ColumnRef],
        rows: Vec<Vec<Value>>,
        aggregates: &[&Expr],
        outer: Option<&Scope<'_>>,
    ) -> Result<Vec<Item>> {
        let fold = evaluator.fold_case();
        let group_exprs: Vec<Expr> = select
            .group_by
            .iter()
            .map(|e| resolve_group_expr(e, select, columns))
            .collect();
        let new_accumulators = || -> Vec<Accumulator> {
            aggregates
                .iter()
                .filter_map(|call| match call {
                    Expr::Function { name, args, distinct } => {
                        Accumulator::for_call(name, args, *distinct, fold)
                    }
                    _ => None,
                })
                .collect()
        };

        let mut lookup: AHashMap<String, usize> = AHashMap::new();
        let mut groups: Vec<(Vec<Value>, Vec<Accumulator>)> = Vec::new();
        for row in rows {
            let scope = Scope::new(columns, &row).with_outer(outer);
            let mut key = String::new();
            for expr in &group_exprs {
                key.push_str(&evaluator.eval(expr, &scope)?.key_string(fold));
                key.push('\u{1f}');
            }
            let slot = match lookup.get(&key) {
                Some(&slot) => slot,
                None => {
                    groups.push((row.clone(), new_accumulators()));
                    lookup.insert(key, groups.len() - 1);
                    groups.len() - 1
                }
            };
            for (acc, call) in groups[slot].1.iter_mut().zip(aggregates) {
                let value = match call {
                    Expr::Function { args, .. } => match args.first() {
                        Some(arg) => evaluator.eval(arg, &scope)?,
                        None => Value::Null,
                    },
                    _ => Value::Null,
                };
                acc.add(value, evaluator)?;
            }
        }

        // aggregates without GROUP BY always produce one row
        if groups.is_empty() && select.group_by.is_empty() {
            groups.push((vec![Value::Null; columns.len()], new_accumulators()));
        }
        trace!(groups = groups.len(), "grouped rows");

        Ok(groups
            .into_iter()
            .map(|(values, accumulators)| Item {
                values,
                computed: aggregates
                    .iter()
                    .zip(accumulators.iter())
                    .map(|(call, acc)| (expr_key(call), acc.finish()))
                    .collect(),
            })
            .collect())
    }

    fn compute_windows(
        &self,
        evaluator: &ExprEvaluator<'_>,
        select: &SelectStmt,
        order_by: &[OrderByExpr],
        columns: &[ColumnRef],
        items: &mut [Item],
        outer: Option<&Scope<'_>>,
    ) -> Result<()> {
        let mut windows = Vec::new();
        let mut seen = AHashSet::new();
        let mut gather = |expr: &Expr| {
            expr.walk(&mut |e: &Expr| {
                if let Expr::Window(w) = e {
                    if seen.insert(expr_key(e)) {
                        windows.push((expr_key(e), w.as_ref().clone()));
                    }
                }
            });
        };
        for col in &select.columns {
            if let SelectColumn::Expr { expr, .. } = col {
                gather(expr);
            }
        }
        for item in order_by {
            gather(&item.expr);
        }

        for (key, window) in windows {
            let mut inputs = Vec::with_capacity(items.len());
            for item in items.iter() {
                let scope = item_scope(columns, item, outer);
                inputs.push(WindowRow {
                    partition: eval_list(evaluator, &window.partition_by, &scope)?,
                    order: eval_list(evaluator, window.order_by.iter().map(|o| &o.expr), &scope)?,
                    args: eval_list(evaluator, &window.args, &scope)?,
                });
            }
            let values = evaluate_window(evaluator, &window, &inputs)?;
            for (item, value) in items.iter_mut().zip(values) {
                item.computed.insert(key.clone(), value);
            }
        }
        Ok(())
    }

    fn output_columns(&self, select: &SelectStmt, columns: &[ColumnRef]) -> Result<Vec<ColumnRef>> {
        let mut output = Vec::new();
        for col in &select.columns {
            match col {
                SelectColumn::Star => output.extend(columns.iter().cloned()),
                SelectColumn::QualifiedStar(qualifier) => {
                    let matching = star_columns(columns, qualifier);
                    if matching.is_empty() {
                        return Err(self.ctx.dialect.unknown_table(qualifier));
                    }
                    output.extend(matching.into_iter().map(|i| columns[i].clone()));
                }
                SelectColumn::Expr { expr, alias } => {
                    output.push(ColumnRef::new(None, &output_name(expr, alias.as_deref())));
                }
            }
        }
        Ok(output)
    }

    fn project(
        &self,
        evaluator: &ExprEvaluator<'_>,
        select: &SelectStmt,
        columns: &[ColumnRef],
        item: &Item,
        outer: Option<&Scope<'_>>,
    ) -> Result<Vec<Value>> {
        let scope = item_scope(columns, item, outer);
        let mut output = Vec::with_capacity(select.columns.len());
        for col in &select.columns {
            match col {
                SelectColumn::Star => output.extend(item.values.iter().cloned()),
                SelectColumn::QualifiedStar(qualifier) => {
                    for i in star_columns(columns, qualifier) {
                        output.push(item.values[i].clone());
                    }
                }
                SelectColumn::Expr { expr, .. } => output.push(evaluator.eval(expr, &scope)?),
            }
        }
        Ok(output)
    }

    /// ORDER BY keys: output aliases and positions first, then source columns
    #[allow(clippy::too_many_arguments)]
    fn order_keys(
        &self,
        evaluator: &ExprEvaluator<'_>,
        order_by: &[OrderByExpr],
        output_columns: &[ColumnRef],
        output: &[Value],
        columns: &[ColumnRef],
        item: &Item,
        outer: Option<&Scope<'_>>,
    ) -> Result<Vec<Value>> {
        let names: Vec<ColumnRef> = output_columns
            .iter()
            .map(|c| ColumnRef::new(None, &c.name))
            .chain(columns.iter().cloned())
            .collect();
        let values: Vec<Value> = output.iter().chain(item.values.iter()).cloned().collect();
        let scope = Scope::new(&names, &values)
            .with_computed(&item.computed)
            .with_outer(outer);
        let mut keys = Vec::with_capacity(order_by.len());
        for entry in order_by {
            keys.push(match ordinal_position(&entry.expr, output.len(), self.ctx.dialect)? {
                Some(i) => output[i].clone(),
                None => evaluator.eval(&entry.expr, &scope)?,
            });
        }
        Ok(keys)
    }

    // ----- FROM -----

    fn resolve_from(
        &self,
        from: &TableRef,
        filter: Option<&Expr>,
        evaluator: &ExprEvaluator<'_>,
        outer: Option<&Scope<'_>>,
    ) -> Result<Relation> {
        match from {
            TableRef::Table { name, alias, .. } => self.scan_named(name, alias.as_deref(), filter, evaluator),
            TableRef::Subquery { query, alias } => Ok(self.execute_query(query, None)?.requalify(alias)),
            TableRef::Join {
                left,
                right,
                join_type,
                on_condition,
            } => {
                let left = self.resolve_from(left, None, evaluator, outer)?;
                let right = self.resolve_from(right, None, evaluator, outer)?;
                self.join(left, right, *join_type, on_condition.as_ref(), evaluator, outer)
            }
        }
    }

    /// Relation for a named FROM item: CTE, temp table, view or table
    fn scan_named(
        &self,
        name: &ObjectName,
        alias: Option<&str>,
        filter: Option<&Expr>,
        evaluator: &ExprEvaluator<'_>,
    ) -> Result<Relation> {
        let qualifier = alias.unwrap_or(&name.name);
        if name.schema.is_none() {
            let cte = self
                .ctes
                .borrow()
                .iter()
                .rev()
                .find(|(n, _)| n.eq_ignore_ascii_case(&name.name))
                .map(|(_, rel)| Rc::clone(rel));
            if let Some(relation) = cte {
                return Ok(relation.as_ref().clone().requalify(qualifier));
            }
        }

        match self.catalog.lookup(name, self.ctx.connection) {
            Some(CatalogEntry::Table(table)) => Ok(self.scan_table(table, qualifier, filter, evaluator)),
            Some(CatalogEntry::View(view)) => {
                debug!(view = %view.name, "expanding view");
                Ok(self
                    .execute_query(&view.query, None)?
                    .rename(&view.columns, self.ctx.dialect)?
                    .requalify(qualifier))
            }
            None if name.schema.is_none() && name.name.eq_ignore_ascii_case("dual") => {
                Ok(Relation::single_row())
            }
            None => Err(self.ctx.dialect.unknown_table(&name.name)),
        }
    }

    fn scan_table(&self, table: &Table, qualifier: &str, filter: Option<&Expr>, evaluator: &ExprEvaluator<'_>) -> Relation {
        let columns = table
            .columns()
            .iter()
            .map(|c| ColumnRef::new(Some(qualifier), &c.name))
            .collect();
        let rows = match filter.and_then(|f| self.index_candidates(table, qualifier, f, evaluator)) {
            Some(positions) => positions
                .into_iter()
                .filter_map(|p| table.row(p))
                .map(|row| table.row_values(row))
                .collect(),
            None => table.rows().iter().map(|row| table.row_values(row)).collect(),
        };
        Relation { columns, rows }
    }

    /// Row positions narrowed through an index by an equality or IN conjunct.
    ///
    /// The full predicate is still applied to the returned rows.
    pub(crate) fn index_candidates(
        &self,
        table: &Table,
        qualifier: &str,
        filter: &Expr,
        evaluator: &ExprEvaluator<'_>,
    ) -> Option<Vec<usize>> {
        let mut conjuncts = Vec::new();
        split_conjuncts(filter, &mut conjuncts);
        for conjunct in conjuncts {
            let Some((column, candidates)) = indexable(conjunct) else {
                continue;
            };
            if !column_belongs(column, table, qualifier) {
                continue;
            }
            let (_, name) = column;
            let Some(ordinal) = table.ordinal_of(name) else {
                continue;
            };
            let Some(index) = table.index_for_columns(&[ordinal]) else {
                continue;
            };
            let col = &table.columns()[ordinal];

            let mut positions = Vec::new();
            let mut usable = true;
            for expr in candidates {
                let Ok(value) = evaluator.eval_constant(expr) else {
                    usable = false;
                    break;
                };
                if value.is_null() {
                    continue;
                }
                // only probe when storage coercion preserves the compared value
                match table.coerce(col, value.clone(), self.ctx.dialect) {
                    Ok(stored) if matches!(evaluator.compare(&stored, &value), Ok(Some(Ordering::Equal))) => {
                        positions.extend(table.lookup_equal(index, &stored));
                    }
                    _ => {
                        usable = false;
                        break;
                    }
                }
            }
            if !usable {
                continue;
            }
            positions.sort_unstable();
            positions.dedup();
            debug!(
                table = %table.name(),
                index = %index.name(),
                candidates = positions.len(),
                "index lookup"
            );
            return Some(positions);
        }
        None
    }

    fn join(
        &self,
        left: Relation,
        right: Relation,
        join_type: JoinType,
        on: Option<&Expr>,
        evaluator: &ExprEvaluator<'_>,
        outer: Option<&Scope<'_>>,
    ) -> Result<Relation> {
        let left_width = left.columns.len();
        let right_width = right.columns.len();
        let mut columns = left.columns;
        columns.extend(right.columns);

        let matches = |l: &[Value], r: &[Value]| -> Result<(bool, Vec<Value>)> {
            let mut combined = Vec::with_capacity(l.len() + r.len());
            combined.extend_from_slice(l);
            combined.extend_from_slice(r);
            let ok = match on {
                None => true,
                Some(cond) => {
                    let scope = Scope::new(&columns, &combined).with_outer(outer);
                    evaluator.eval_predicate(cond, &scope)?
                }
            };
            Ok((ok, combined))
        };

        let mut rows = Vec::new();
        match join_type {
            JoinType::Inner | JoinType::Cross => {
                for l in &left.rows {
                    for r in &right.rows {
                        let (ok, combined) = matches(l, r)?;
                        if ok {
                            rows.push(combined);
                        }
                    }
                }
            }
            JoinType::Left | JoinType::Full => {
                let mut right_matched = vec![false; right.rows.len()];
                for l in &left.rows {
                    let mut any = false;
                    for (ri, r) in right.rows.iter().enumerate() {
                        let (ok, combined) = matches(l, r)?;
                        if ok {
                            any = true;
                            right_matched[ri] = true;
                            rows.push(combined);
                        }
                    }
                    if !any {
                        let mut padded = l.clone();
                        padded.extend(std::iter::repeat(Value::Null).take(right_width));
                        rows.push(padded);
                    }
                }
                if join_type == JoinType::Full {
                    for (r, matched) in right.rows.iter().zip(right_matched) {
                        if !matched {
                            let mut padded = vec![Value::Null; left_width];
                            padded.extend(r.iter().cloned());
                            rows.push(padded);
                        }
                    }
                }
            }
            JoinType::Right => {
                for r in &right.rows {
                    let mut any = false;
                    for l in &left.rows {
                        let (ok, combined) = matches(l, r)?;
                        if ok {
                            any = true;
                            rows.push(combined);
                        }
                    }
                    if !any {
                        let mut padded = vec![Value::Null; left_width];
                        padded.extend(r.iter().cloned());
                        rows.push(padded);
                    }
                }
            }
        }
        trace!(?join_type, rows = rows.len(), "joined");
        Ok(Relation { columns, rows })
    }
}

impl SubqueryRunner for QueryExecutor<'_> {
    fn run_subquery(&self, query: &Query, outer: &Scope<'_>) -> Result<Vec<Vec<Value>>> {
        Ok(self.execute_query(query, Some(outer))?.rows)
    }
}

fn item_scope<'s>(columns: &'s [ColumnRef], item: &'s Item, outer: Option<&'s Scope<'s>>) -> Scope<'s> {
    Scope::new(columns, &item.values)
        .with_computed(&item.computed)
        .with_outer(outer)
}

fn eval_list<'e>(
    evaluator: &ExprEvaluator<'_>,
    exprs: impl IntoIterator<Item = &'e Expr>,
    scope: &Scope<'_>,
) -> Result<Vec<Value>> {
    exprs.into_iter().map(|e| evaluator.eval(e, scope)).collect()
}

fn apply_paging(rows: &mut Vec<Vec<Value>>, offset: Option<usize>, limit: Option<usize>) {
    if let Some(offset) = offset {
        if offset >= rows.len() {
            rows.clear();
        } else {
            rows.drain(..offset);
        }
    }
    if let Some(limit) = limit {
        rows.truncate(limit);
    }
}

fn row_key(row: &[Value], fold_case: bool) -> String {
    let mut key = String::new();
    for value in row {
        key.push_str(&value.key_string(fold_case));
        key.push('\u{1f}');
    }
    key
}

fn first_non_null(rows: &[Vec<Value>], column: usize) -> Option<&Value> {
    rows.iter()
        .filter_map(|r| r.get(column))
        .find(|v| !v.is_null())
}

/// Output column name: alias, bare column name, or the expression text
fn output_name(expr: &Expr, alias: Option<&str>) -> String {
    match (alias, expr) {
        (Some(alias), _) => alias.to_string(),
        (None, Expr::Column { name, .. }) => name.clone(),
        (None, expr) => ExprPrinter::new().print(expr),
    }
}

fn star_columns(columns: &[ColumnRef], qualifier: &str) -> Vec<usize> {
    columns
        .iter()
        .enumerate()
        .filter(|(_, c)| {
            c.qualifier
                .as_deref()
                .map(|q| q.eq_ignore_ascii_case(qualifier))
                .unwrap_or(false)
        })
        .map(|(i, _)| i)
        .collect()
}

/// `ORDER BY 2`: zero-based output position
fn ordinal_position(expr: &Expr, width: usize, dialect: &Dialect) -> Result<Option<usize>> {
    match expr {
        Expr::Literal(Value::Integer(n)) => {
            if *n >= 1 && (*n as usize) <= width {
                Ok(Some(*n as usize - 1))
            } else {
                Err(dialect.syntax_error(&format!("ORDER BY position {} is not in select list", n)))
            }
        }
        _ => Ok(None),
    }
}

/// GROUP BY may name a select-list position or alias
fn resolve_group_expr(expr: &Expr, select: &SelectStmt, columns: &[ColumnRef]) -> Expr {
    let select_expr = |pred: &dyn Fn(&Expr, Option<&str>) -> bool| {
        select.columns.iter().find_map(|c| match c {
            SelectColumn::Expr { expr, alias } if pred(expr, alias.as_deref()) => Some(expr.clone()),
            _ => None,
        })
    };
    match expr {
        Expr::Literal(Value::Integer(n)) if *n >= 1 => {
            let target = select.columns.get(*n as usize - 1);
            match target {
                Some(SelectColumn::Expr { expr, .. }) => expr.clone(),
                _ => expr.clone(),
            }
        }
        Expr::Column { table: None, name } if !columns.iter().any(|c| c.matches(None, name)) => {
            select_expr(&|_, alias| alias.map(|a| a.eq_ignore_ascii_case(name)).unwrap_or(false))
                .unwrap_or_else(|| expr.clone())
        }
        _ => expr.clone(),
    }
}

/// Aggregate calls in the select list, HAVING and ORDER BY, deduplicated
fn collect_aggregates<'q>(select: &'q SelectStmt, order_by: &'q [OrderByExpr]) -> Vec<&'q Expr> {
    let mut found: Vec<&Expr> = Vec::new();
    let mut seen = AHashSet::new();
    let mut visit = |expr: &'q Expr| {
        expr.walk(&mut |e: &'q Expr| {
            if let Expr::Function { name, .. } = e {
                if is_aggregate_name(name) && seen.insert(expr_key(e)) {
                    found.push(e);
                }
            }
        });
    };
    for col in &select.columns {
        if let SelectColumn::Expr { expr, .. } = col {
            visit(expr);
        }
    }
    if let Some(having) = &select.having {
        visit(having);
    }
    for item in order_by {
        visit(&item.expr);
    }
    found
}

pub(crate) fn split_conjuncts<'e>(expr: &'e Expr, out: &mut Vec<&'e Expr>) {
    match expr {
        Expr::BinaryOp {
            left,
            op: BinaryOperator::And,
            right,
        } => {
            split_conjuncts(left, out);
            split_conjuncts(right, out);
        }
        other => out.push(other),
    }
}

fn is_constant(expr: &Expr) -> bool {
    matches!(expr, Expr::Literal(_) | Expr::Parameter(_))
}

/// `col = const`, `const = col` or `col IN (consts)`
pub(crate) fn indexable(expr: &Expr) -> Option<((Option<&str>, &str), Vec<&Expr>)> {
    match expr {
        Expr::BinaryOp {
            left,
            op: BinaryOperator::Eq,
            right,
        } => match (left.as_ref(), right.as_ref()) {
            (Expr::Column { table, name }, value) | (value, Expr::Column { table, name })
                if is_constant(value) =>
            {
                Some(((table.as_deref(), name.as_str()), vec![value]))
            }
            _ => None,
        },
        Expr::InList {
            expr,
            list,
            negated: false,
        } => match expr.as_ref() {
            Expr::Column { table, name } if list.iter().all(is_constant) => {
                Some(((table.as_deref(), name.as_str()), list.iter().collect()))
            }
            _ => None,
        },
        _ => None,
    }
}

pub(crate) fn column_belongs(column: (Option<&str>, &str), table: &Table, qualifier: &str) -> bool {
    match column.0 {
        Some(q) => q.eq_ignore_ascii_case(qualifier) || q.eq_ignore_ascii_case(table.name()),
        None => true,
    }
}
