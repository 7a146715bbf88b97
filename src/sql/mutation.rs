//! INSERT/UPDATE/DELETE/MERGE and DDL execution
//!
//! Plain INSERT, UPDATE and DELETE validate every row against the unchanged
//! catalog before touching storage. Upserts and MERGE interleave reads and
//! writes, so they run against a staged copy of the target table that replaces
//! the stored table only when the whole statement succeeded.

use super::ast::{
    Assignment, ConflictAction, CreateTableAsStmt, CreateTableStmt, CreateViewStmt, DeleteStmt,
    DropStmt, Expr, InsertSource, InsertStmt, MergeAction, MergeClause, MergeStmt, ObjectName,
    OnConflict, Statement, UpdateStmt,
};
use super::evaluator::{ColumnRef, ExprEvaluator, Scope, EXCLUDED};
use super::executor::{ExecContext, QueryExecutor, QueryResult};
use crate::catalog::{Catalog, TableKey, ViewDef};
use crate::database::{StagedKeys, Table, Trigger, TriggerContext};
use crate::dialect::{Dialect, TextComparison};
use crate::error::{Result, SqlError};
use crate::types::{
    ColumnDef, ColumnType, ForeignKeyDef, IndexDef, Row, TempScope, TriggerEvent, Value,
};
use ahash::AHashSet;
use tracing::debug;

/// Execute any statement against the catalog
pub fn execute_statement(catalog: &mut Catalog, stmt: &Statement, ctx: ExecContext<'_>) -> Result<QueryResult> {
    debug!(kind = stmt.kind(), dialect = ctx.dialect.name(), "executing statement");
    match stmt {
        Statement::Query(query) => Ok(QueryResult::Rows(QueryExecutor::new(catalog, ctx).query(query)?)),
        Statement::Insert(insert) => insert_statement(catalog, insert, ctx),
        Statement::Update(update) => update_statement(catalog, update, ctx),
        Statement::Delete(delete) => delete_statement(catalog, delete, ctx),
        Statement::Merge(merge) => merge_statement(catalog, merge, ctx),
        Statement::CreateTable(create) => create_table(catalog, create, ctx),
        Statement::CreateTableAs(create) => create_table_as(catalog, create, ctx),
        Statement::CreateView(create) => create_view(catalog, create, ctx),
        Statement::DropTable(drop) => drop_table(catalog, drop, ctx),
        Statement::DropView(drop) => drop_view(catalog, drop, ctx),
    }
}

fn stored<'c>(catalog: &'c Catalog, key: &TableKey, dialect: &Dialect, name: &str) -> Result<&'c Table> {
    catalog.table(key).ok_or_else(|| dialect.unknown_table(name))
}

fn qualified_columns(table: &Table, qualifier: &str) -> Vec<ColumnRef> {
    table
        .columns()
        .iter()
        .map(|c| ColumnRef::new(Some(qualifier), &c.name))
        .collect()
}

/// Ordinals targeted by an INSERT column list (all columns when absent)
fn insert_ordinals(table: &Table, columns: Option<&[String]>, dialect: &Dialect) -> Result<Vec<usize>> {
    match columns {
        Some(names) => names.iter().map(|n| table.require_ordinal(n, dialect)).collect(),
        None => Ok((0..table.columns().len()).collect()),
    }
}

fn assigned_row(ordinals: &[usize], values: Vec<Value>, row_number: usize, dialect: &Dialect) -> Result<Row> {
    if ordinals.len() != values.len() {
        return Err(dialect.syntax_error(&format!(
            "column count doesn't match value count at row {}",
            row_number + 1
        )));
    }
    Ok(ordinals.iter().copied().zip(values).collect())
}

fn assignment_ordinals(table: &Table, assignments: &[Assignment], dialect: &Dialect) -> Result<Vec<usize>> {
    assignments
        .iter()
        .map(|a| table.require_ordinal(&a.column, dialect))
        .collect()
}

fn evaluate_assignments(
    evaluator: &ExprEvaluator<'_>,
    ordinals: &[usize],
    assignments: &[Assignment],
    scope: &Scope<'_>,
) -> Result<Vec<(usize, Value)>> {
    ordinals
        .iter()
        .zip(assignments)
        .map(|(ord, a)| Ok((*ord, evaluator.eval(&a.value, scope)?)))
        .collect()
}

/// Source rows of an INSERT, fully evaluated
fn insert_source(executor: &QueryExecutor<'_>, source: &InsertSource) -> Result<Vec<Vec<Value>>> {
    match source {
        InsertSource::Values(rows) => {
            let evaluator = executor.evaluator();
            let scope = Scope::empty();
            rows.iter()
                .map(|row| row.iter().map(|e| evaluator.eval(e, &scope)).collect())
                .collect()
        }
        InsertSource::Query(query) => Ok(executor.query(query)?.into_rows()),
    }
}

// ----- triggers -----

struct Triggers {
    before: Vec<Trigger>,
    after: Vec<Trigger>,
}

impl Triggers {
    fn load(table: &Table, dialect: &Dialect, before: TriggerEvent, after: TriggerEvent) -> Self {
        if !dialect.supports_triggers() {
            return Self {
                before: Vec::new(),
                after: Vec::new(),
            };
        }
        Self {
            before: table.triggers_for(before),
            after: table.triggers_for(after),
        }
    }

    fn fire(list: &[Trigger], table: &Table, old: Option<&Row>, new: Option<&Row>) -> Result<()> {
        for trigger in list {
            trigger.fire(&TriggerContext {
                table: table.name(),
                event: trigger.event,
                columns: table.columns(),
                old,
                new,
            })?;
        }
        Ok(())
    }

    fn before(&self, table: &Table, old: Option<&Row>, new: Option<&Row>) -> Result<()> {
        Self::fire(&self.before, table, old, new)
    }

    fn after(&self, table: &Table, old: Option<&Row>, new: Option<&Row>) -> Result<()> {
        Self::fire(&self.after, table, old, new)
    }
}

/// Apply validated changes to the stored table. When AFTER triggers can still
/// fail, the prior table state is restored on error.
fn apply_stored<F>(catalog: &mut Catalog, key: &TableKey, has_after: bool, apply: F) -> Result<()>
where
    F: FnOnce(&mut Table) -> Result<()>,
{
    let table = catalog
        .table_mut(key)
        .ok_or_else(|| SqlError::invalid("table disappeared during statement"))?;
    let undo = has_after.then(|| table.clone());
    match apply(&mut *table) {
        Ok(()) => Ok(()),
        Err(e) => {
            if let Some(previous) = undo {
                *table = previous;
            }
            Err(e)
        }
    }
}

// ----- referential integrity -----

fn same_value(a: &Value, b: &Value) -> bool {
    a.key_string(false) == b.key_string(false)
}

/// Every non-NULL foreign key value of `row` must match a parent row.
///
/// `pending` holds rows of `table` staged by the same statement.
fn check_parents(catalog: &Catalog, table: &Table, row: &Row, pending: &[Row], dialect: &Dialect) -> Result<()> {
    for fk in table.foreign_keys() {
        let Some(ordinal) = table.ordinal_of(&fk.column) else {
            continue;
        };
        let Some(value) = row.get(&ordinal).filter(|v| !v.is_null()) else {
            continue;
        };
        let found = if fk.ref_table.eq_ignore_ascii_case(table.name()) {
            table.ordinal_of(&fk.ref_column).is_some_and(|parent_ord| {
                !table.positions_with_value(parent_ord, value).is_empty()
                    || pending
                        .iter()
                        .chain(std::iter::once(row))
                        .any(|p| p.get(&parent_ord).is_some_and(|v| same_value(v, value)))
            })
        } else {
            catalog.find_table(&fk.ref_table).is_some_and(|(_, parent)| {
                parent
                    .ordinal_of(&fk.ref_column)
                    .is_some_and(|parent_ord| !parent.positions_with_value(parent_ord, value).is_empty())
            })
        };
        if !found {
            return Err(dialect.foreign_key_child_violation(
                table.name(),
                &fk.name,
                &fk.column,
                &fk.ref_table,
                &fk.ref_column,
            ));
        }
    }
    Ok(())
}

/// Released parent values must not be referenced by any child row.
///
/// `released` rows hold only the parent columns that are going away;
/// `skip` lists rows of `table` removed by the same statement.
fn check_unreferenced(
    catalog: &Catalog,
    table: &Table,
    key: &TableKey,
    released: &[Row],
    skip: &AHashSet<usize>,
    dialect: &Dialect,
) -> Result<()> {
    if table.is_temporary() || released.is_empty() {
        return Ok(());
    }
    for (child_key, fk) in catalog.referencing(table.name()) {
        let Some(parent_ord) = table.ordinal_of(&fk.ref_column) else {
            continue;
        };
        let self_reference = &child_key == key;
        let child = if self_reference {
            table
        } else {
            match catalog.table(&child_key) {
                Some(child) => child,
                None => continue,
            }
        };
        let Some(child_ord) = child.ordinal_of(&fk.column) else {
            continue;
        };
        for row in released {
            let Some(value) = row.get(&parent_ord).filter(|v| !v.is_null()) else {
                continue;
            };
            let referenced = child
                .positions_with_value(child_ord, value)
                .into_iter()
                .any(|p| !(self_reference && skip.contains(&p)));
            if referenced {
                return Err(dialect.foreign_key_parent_violation(
                    child.name(),
                    &fk.name,
                    &fk.column,
                    &fk.ref_table,
                    &fk.ref_column,
                ));
            }
        }
    }
    Ok(())
}

/// Old values of the columns an update changes
fn changed_columns(old: &Row, new: &Row) -> Row {
    old.iter()
        .filter(|(ord, v)| new.get(ord) != Some(*v))
        .map(|(ord, v)| (*ord, v.clone()))
        .collect()
}

fn touches_foreign_key(table: &Table, old: &Row, new: &Row) -> bool {
    table.foreign_keys().iter().any(|fk| {
        table
            .ordinal_of(&fk.column)
            .is_some_and(|ord| old.get(&ord) != new.get(&ord))
    })
}

// ----- INSERT -----

fn insert_statement(catalog: &mut Catalog, stmt: &InsertStmt, ctx: ExecContext<'_>) -> Result<QueryResult> {
    let dialect = ctx.dialect;
    let key = catalog.require_table(&stmt.table, ctx.connection, dialect)?;
    let source = {
        let executor = QueryExecutor::new(catalog, ctx);
        insert_source(&executor, &stmt.source)?
    };
    let columns = stmt.columns.as_deref();
    let affected = if stmt.on_duplicate.is_some() || stmt.on_conflict.is_some() {
        upsert_rows(catalog, &key, stmt, source, ctx)?
    } else {
        insert_rows(catalog, &key, columns, source, stmt.ignore, ctx)?
    };
    Ok(QueryResult::Affected(affected))
}

/// Insert evaluated rows through the full constraint and trigger path.
///
/// With `ignore`, rows that would duplicate a unique key are skipped and not
/// counted.
pub(crate) fn insert_rows(
    catalog: &mut Catalog,
    key: &TableKey,
    columns: Option<&[String]>,
    source: Vec<Vec<Value>>,
    ignore: bool,
    ctx: ExecContext<'_>,
) -> Result<u64> {
    let dialect = ctx.dialect;
    let (prepared, identity, triggers) = {
        let table = stored(catalog, key, dialect, "table")?;
        let ordinals = insert_ordinals(table, columns, dialect)?;
        let mut identity = table.next_identity();
        let mut staged = StagedKeys::default();
        let mut prepared: Vec<Row> = Vec::with_capacity(source.len());
        for (i, values) in source.into_iter().enumerate() {
            let assigned = assigned_row(&ordinals, values, i, dialect)?;
            let row = table.prepare_insert(assigned, &mut identity, dialect)?;
            match table.check_insert_unique(&row, &mut staged, dialect) {
                Ok(()) => {}
                Err(SqlError::DuplicateKey { .. }) if ignore => continue,
                Err(e) => return Err(e),
            }
            check_parents(catalog, table, &row, &prepared, dialect)?;
            prepared.push(row);
        }
        let triggers = Triggers::load(table, dialect, TriggerEvent::BeforeInsert, TriggerEvent::AfterInsert);
        (prepared, identity, triggers)
    };

    let count = prepared.len() as u64;
    apply_stored(catalog, key, !triggers.after.is_empty(), |table| {
        for row in &prepared {
            triggers.before(table, None, Some(row))?;
        }
        for row in prepared {
            table.push_row(row.clone());
            triggers.after(table, None, Some(&row))?;
        }
        table.set_next_identity(identity);
        Ok(())
    })?;
    debug!(rows = count, "inserted rows");
    Ok(count)
}

/// Conflict position for an upserted row
fn upsert_conflict(table: &Table, row: &Row, conflict: Option<&OnConflict>, dialect: &Dialect) -> Result<Option<usize>> {
    match conflict {
        Some(OnConflict { target, .. }) if !target.is_empty() => {
            let ordinals = target
                .iter()
                .map(|c| table.require_ordinal(c, dialect))
                .collect::<Result<Vec<_>>>()?;
            if !table.has_unique_index_on(&ordinals) {
                return Err(dialect.conflict_target_mismatch());
            }
            Ok(table.find_conflict_on(row, &ordinals, dialect))
        }
        _ => Ok(table.find_conflict(row, None, dialect).map(|(_, pos)| pos)),
    }
}

/// ON DUPLICATE KEY UPDATE and ON CONFLICT, counted per the dialect's convention
fn upsert_rows(
    catalog: &mut Catalog,
    key: &TableKey,
    stmt: &InsertStmt,
    source: Vec<Vec<Value>>,
    ctx: ExecContext<'_>,
) -> Result<u64> {
    let dialect = ctx.dialect;
    let counts = dialect.upsert_counts();
    let (assignments, filter) = match (&stmt.on_duplicate, &stmt.on_conflict) {
        (Some(assignments), _) => (Some(assignments.as_slice()), None),
        (None, Some(conflict)) => match &conflict.action {
            ConflictAction::DoNothing => (None, None),
            ConflictAction::DoUpdate {
                assignments,
                where_clause,
            } => (Some(assignments.as_slice()), where_clause.as_ref()),
        },
        (None, None) => (None, None),
    };

    let (staged, affected) = {
        let executor = QueryExecutor::new(catalog, ctx);
        let evaluator = executor.evaluator();
        let table = stored(catalog, key, dialect, &stmt.table.name)?;
        let ordinals = insert_ordinals(table, stmt.columns.as_deref(), dialect)?;
        let set_ordinals = match assignments {
            Some(list) => assignment_ordinals(table, list, dialect)?,
            None => Vec::new(),
        };
        let insert_triggers = Triggers::load(table, dialect, TriggerEvent::BeforeInsert, TriggerEvent::AfterInsert);
        let update_triggers = Triggers::load(table, dialect, TriggerEvent::BeforeUpdate, TriggerEvent::AfterUpdate);
        let mut columns = qualified_columns(table, table.name());
        columns.extend(qualified_columns(table, EXCLUDED));

        // rows this statement inserted or updated, when a second touch is an error
        let single_touch =
            stmt.on_conflict.is_some() && assignments.is_some() && dialect.upsert_rejects_repeat_update();
        let mut touched: AHashSet<usize> = AHashSet::new();

        let mut staged = table.clone();
        let mut identity = staged.next_identity();
        let mut affected = 0u64;
        for (i, values) in source.into_iter().enumerate() {
            let assigned = assigned_row(&ordinals, values, i, dialect)?;
            let row = staged.prepare_insert(assigned, &mut identity, dialect)?;
            let Some(position) = upsert_conflict(&staged, &row, stmt.on_conflict.as_ref(), dialect)? else {
                staged.check_insert_unique(&row, &mut StagedKeys::default(), dialect)?;
                check_parents(catalog, &staged, &row, &[], dialect)?;
                insert_triggers.before(&staged, None, Some(&row))?;
                let inserted = staged.push_row(row.clone());
                if single_touch {
                    touched.insert(inserted);
                }
                insert_triggers.after(&staged, None, Some(&row))?;
                affected += counts.inserted;
                continue;
            };
            let Some(list) = assignments else {
                // DO NOTHING
                continue;
            };

            let current = staged
                .row(position)
                .cloned()
                .ok_or_else(|| SqlError::invalid("conflicting row vanished"))?;
            let mut values = staged.row_values(&current);
            values.extend(staged.row_values(&row));
            let scope = Scope::new(&columns, &values);
            if let Some(filter) = filter {
                if !evaluator.eval_predicate(filter, &scope)? {
                    continue;
                }
            }
            if single_touch && !touched.insert(position) {
                return Err(dialect.row_affected_twice("ON CONFLICT DO UPDATE", table.name()));
            }
            let changes = evaluate_assignments(&evaluator, &set_ordinals, list, &scope)?;
            let updated = staged.prepare_update(&current, changes, dialect)?;
            if updated == current {
                affected += counts.unchanged;
                continue;
            }
            staged.check_update_unique(&[(position, updated.clone())], dialect)?;
            if touches_foreign_key(&staged, &current, &updated) {
                check_parents(catalog, &staged, &updated, &[], dialect)?;
            }
            check_unreferenced(
                catalog,
                &staged,
                key,
                &[changed_columns(&current, &updated)],
                &AHashSet::new(),
                dialect,
            )?;
            update_triggers.before(&staged, Some(&current), Some(&updated))?;
            staged.replace_row(position, updated.clone());
            update_triggers.after(&staged, Some(&current), Some(&updated))?;
            affected += counts.updated;
        }
        staged.set_next_identity(identity);
        (staged, affected)
    };

    catalog.replace_table(key, staged);
    debug!(affected, "upsert finished");
    Ok(affected)
}

// ----- UPDATE -----

fn update_statement(catalog: &mut Catalog, stmt: &UpdateStmt, ctx: ExecContext<'_>) -> Result<QueryResult> {
    let dialect = ctx.dialect;
    let key = catalog.require_table(&stmt.table, ctx.connection, dialect)?;
    let (updates, changed, triggers) = {
        let executor = QueryExecutor::new(catalog, ctx);
        let evaluator = executor.evaluator();
        let table = stored(catalog, &key, dialect, &stmt.table.name)?;
        let qualifier = stmt.alias.as_deref().unwrap_or(&stmt.table.name);
        let columns = qualified_columns(table, qualifier);
        let ordinals = assignment_ordinals(table, &stmt.assignments, dialect)?;

        let mut updates: Vec<(usize, Row)> = Vec::new();
        for position in matching_positions(&executor, &evaluator, table, qualifier, stmt.where_clause.as_ref())? {
            let Some(old) = table.row(position) else {
                continue;
            };
            let values = table.row_values(old);
            let scope = Scope::new(&columns, &values);
            let changes = evaluate_assignments(&evaluator, &ordinals, &stmt.assignments, &scope)?;
            updates.push((position, table.prepare_update(old, changes, dialect)?));
        }

        table.check_update_unique(&updates, dialect)?;
        let mut released = Vec::new();
        let mut changed = 0u64;
        for (position, new) in &updates {
            let Some(old) = table.row(*position) else {
                continue;
            };
            if old != new {
                changed += 1;
                released.push(changed_columns(old, new));
            }
            if touches_foreign_key(table, old, new) {
                check_parents(catalog, table, new, &[], dialect)?;
            }
        }
        check_unreferenced(catalog, table, &key, &released, &AHashSet::new(), dialect)?;
        let triggers = Triggers::load(table, dialect, TriggerEvent::BeforeUpdate, TriggerEvent::AfterUpdate);
        (updates, changed, triggers)
    };

    let matched = updates.len() as u64;
    apply_stored(catalog, &key, !triggers.after.is_empty(), |table| {
        for (position, new) in &updates {
            let old = table.row(*position).cloned();
            triggers.before(table, old.as_ref(), Some(new))?;
        }
        for (position, new) in updates {
            let old = table.row(position).cloned();
            table.replace_row(position, new.clone());
            triggers.after(table, old.as_ref(), Some(&new))?;
        }
        Ok(())
    })?;

    let affected = if dialect.update_counts_changed_rows_only() {
        changed
    } else {
        matched
    };
    debug!(matched, changed, affected, "updated rows");
    Ok(QueryResult::Affected(affected))
}

/// Positions of rows satisfying `filter`, narrowed through an index when possible
fn matching_positions(
    executor: &QueryExecutor<'_>,
    evaluator: &ExprEvaluator<'_>,
    table: &Table,
    qualifier: &str,
    filter: Option<&Expr>,
) -> Result<Vec<usize>> {
    let Some(filter) = filter else {
        return Ok((0..table.len()).collect());
    };
    let candidates = executor
        .index_candidates(table, qualifier, filter, evaluator)
        .unwrap_or_else(|| (0..table.len()).collect());
    let columns = qualified_columns(table, qualifier);
    let mut matched = Vec::new();
    for position in candidates {
        let Some(row) = table.row(position) else {
            continue;
        };
        let values = table.row_values(row);
        if evaluator.eval_predicate(filter, &Scope::new(&columns, &values))? {
            matched.push(position);
        }
    }
    Ok(matched)
}

// ----- DELETE -----

fn delete_statement(catalog: &mut Catalog, stmt: &DeleteStmt, ctx: ExecContext<'_>) -> Result<QueryResult> {
    let dialect = ctx.dialect;
    let key = catalog.require_table(&stmt.table, ctx.connection, dialect)?;
    let (positions, triggers) = {
        let executor = QueryExecutor::new(catalog, ctx);
        let evaluator = executor.evaluator();
        let table = stored(catalog, &key, dialect, &stmt.table.name)?;
        let qualifier = stmt.alias.as_deref().unwrap_or(&stmt.table.name);
        let positions = matching_positions(&executor, &evaluator, table, qualifier, stmt.where_clause.as_ref())?;
        let doomed: AHashSet<usize> = positions.iter().copied().collect();
        let released: Vec<Row> = positions.iter().filter_map(|p| table.row(*p).cloned()).collect();
        check_unreferenced(catalog, table, &key, &released, &doomed, dialect)?;
        let triggers = Triggers::load(table, dialect, TriggerEvent::BeforeDelete, TriggerEvent::AfterDelete);
        (positions, triggers)
    };

    let count = positions.len() as u64;
    apply_stored(catalog, &key, !triggers.after.is_empty(), |table| {
        let removed: Vec<Row> = positions.iter().filter_map(|p| table.row(*p).cloned()).collect();
        for row in &removed {
            triggers.before(table, Some(row), None)?;
        }
        table.remove_rows(&positions);
        for row in &removed {
            triggers.after(table, Some(row), None)?;
        }
        Ok(())
    })?;
    debug!(rows = count, "deleted rows");
    Ok(QueryResult::Affected(count))
}

// ----- MERGE -----

fn merge_statement(catalog: &mut Catalog, stmt: &MergeStmt, ctx: ExecContext<'_>) -> Result<QueryResult> {
    let dialect = ctx.dialect;
    let key = catalog.require_table(&stmt.target, ctx.connection, dialect)?;
    let (staged, affected) = {
        let executor = QueryExecutor::new(catalog, ctx);
        let evaluator = executor.evaluator();
        let table = stored(catalog, &key, dialect, &stmt.target.name)?;
        let source = executor.relation(&stmt.source)?;
        let qualifier = stmt.target_alias.as_deref().unwrap_or(&stmt.target.name);
        let mut columns = qualified_columns(table, qualifier);
        columns.extend(source.columns.iter().cloned());

        let insert_triggers = Triggers::load(table, dialect, TriggerEvent::BeforeInsert, TriggerEvent::AfterInsert);
        let update_triggers = Triggers::load(table, dialect, TriggerEvent::BeforeUpdate, TriggerEvent::AfterUpdate);
        let delete_triggers = Triggers::load(table, dialect, TriggerEvent::BeforeDelete, TriggerEvent::AfterDelete);

        let original_len = table.len();
        let mut staged = table.clone();
        let mut identity = staged.next_identity();
        let mut deleted: Vec<usize> = Vec::new();
        let mut touched: AHashSet<usize> = AHashSet::new();
        let mut affected = 0u64;

        for source_row in &source.rows {
            // match against the target as it was before the statement
            let mut matches = Vec::new();
            for position in 0..original_len {
                let Some(original) = table.row(position) else {
                    continue;
                };
                let mut values = table.row_values(original);
                values.extend(source_row.iter().cloned());
                if evaluator.eval_predicate(&stmt.on_condition, &Scope::new(&columns, &values))? {
                    matches.push((position, values));
                }
            }

            if matches.is_empty() {
                let mut values = vec![Value::Null; staged.columns().len()];
                values.extend(source_row.iter().cloned());
                let scope = Scope::new(&columns, &values);
                let Some(clause) = first_clause(&evaluator, stmt, false, &scope)? else {
                    continue;
                };
                let MergeAction::Insert { columns: names, values: exprs } = &clause.action else {
                    return Err(dialect.syntax_error("WHEN NOT MATCHED only supports INSERT"));
                };
                let ordinals = insert_ordinals(&staged, names.as_deref(), dialect)?;
                let inserted: Vec<Value> = exprs
                    .iter()
                    .map(|e| evaluator.eval(e, &scope))
                    .collect::<Result<_>>()?;
                let assigned = assigned_row(&ordinals, inserted, 0, dialect)?;
                let row = staged.prepare_insert(assigned, &mut identity, dialect)?;
                staged.check_insert_unique(&row, &mut StagedKeys::default(), dialect)?;
                check_parents(catalog, &staged, &row, &[], dialect)?;
                insert_triggers.before(&staged, None, Some(&row))?;
                staged.push_row(row.clone());
                insert_triggers.after(&staged, None, Some(&row))?;
                affected += 1;
                continue;
            }

            for (position, values) in matches {
                let scope = Scope::new(&columns, &values);
                let Some(clause) = first_clause(&evaluator, stmt, true, &scope)? else {
                    continue;
                };
                if !touched.insert(position) {
                    return Err(dialect.row_affected_twice("MERGE", table.name()));
                }
                let current = staged
                    .row(position)
                    .cloned()
                    .ok_or_else(|| SqlError::invalid("matched row vanished"))?;
                match &clause.action {
                    MergeAction::Update(assignments) => {
                        let ordinals = assignment_ordinals(&staged, assignments, dialect)?;
                        let changes = evaluate_assignments(&evaluator, &ordinals, assignments, &scope)?;
                        let updated = staged.prepare_update(&current, changes, dialect)?;
                        staged.check_update_unique(&[(position, updated.clone())], dialect)?;
                        if touches_foreign_key(&staged, &current, &updated) {
                            check_parents(catalog, &staged, &updated, &[], dialect)?;
                        }
                        check_unreferenced(
                            catalog,
                            &staged,
                            &key,
                            &[changed_columns(&current, &updated)],
                            &AHashSet::new(),
                            dialect,
                        )?;
                        update_triggers.before(&staged, Some(&current), Some(&updated))?;
                        staged.replace_row(position, updated.clone());
                        update_triggers.after(&staged, Some(&current), Some(&updated))?;
                    }
                    MergeAction::Delete => {
                        let mut skip: AHashSet<usize> = deleted.iter().copied().collect();
                        skip.insert(position);
                        check_unreferenced(catalog, &staged, &key, &[current.clone()], &skip, dialect)?;
                        delete_triggers.before(&staged, Some(&current), None)?;
                        deleted.push(position);
                        delete_triggers.after(&staged, Some(&current), None)?;
                    }
                    MergeAction::Insert { .. } => {
                        return Err(dialect.syntax_error("WHEN MATCHED does not support INSERT"));
                    }
                }
                affected += 1;
            }
        }

        staged.remove_rows(&deleted);
        staged.set_next_identity(identity);
        (staged, affected)
    };

    catalog.replace_table(&key, staged);
    debug!(affected, "merge finished");
    Ok(QueryResult::Affected(affected))
}

fn first_clause<'m>(
    evaluator: &ExprEvaluator<'_>,
    stmt: &'m MergeStmt,
    matched: bool,
    scope: &Scope<'_>,
) -> Result<Option<&'m MergeClause>> {
    for clause in stmt.clauses.iter().filter(|c| c.matched == matched) {
        let applies = match &clause.condition {
            Some(condition) => evaluator.eval_predicate(condition, scope)?,
            None => true,
        };
        if applies {
            return Ok(Some(clause));
        }
    }
    Ok(None)
}

// ----- DDL -----

pub(crate) fn fold_case(dialect: &Dialect) -> bool {
    dialect.text_comparison() == TextComparison::CaseInsensitive
}

fn register_table(
    catalog: &mut Catalog,
    name: &ObjectName,
    temporary: Option<TempScope>,
    table: Table,
    ctx: ExecContext<'_>,
) -> Result<TableKey> {
    match temporary {
        Some(scope) => catalog.create_temp_table(ctx.connection, scope, table, ctx.dialect),
        None => catalog.create_table(name.schema.as_deref(), table, ctx.dialect),
    }
}

fn create_table(catalog: &mut Catalog, stmt: &CreateTableStmt, ctx: ExecContext<'_>) -> Result<QueryResult> {
    let dialect = ctx.dialect;
    if stmt.if_not_exists && catalog.resolve_table(&stmt.name, ctx.connection).is_some() {
        return Ok(QueryResult::Definition {
            message: format!("table '{}' already exists, skipped", stmt.name.name),
        });
    }

    let columns: Vec<ColumnDef> = stmt.columns.iter().map(|spec| spec.def.clone()).collect();
    let mut table = Table::new(stmt.name.name.clone(), columns, fold_case(dialect))?;

    let mut primary_key: Vec<String> = stmt
        .columns
        .iter()
        .filter(|spec| spec.primary_key)
        .map(|spec| spec.def.name.clone())
        .collect();
    if !stmt.primary_key.is_empty() {
        if !primary_key.is_empty() {
            return Err(dialect.syntax_error("multiple primary keys defined"));
        }
        primary_key = stmt.primary_key.clone();
    }
    if !primary_key.is_empty() {
        table.set_primary_key(&primary_key, dialect)?;
    }

    let unique_sets = stmt
        .columns
        .iter()
        .filter(|spec| spec.unique)
        .map(|spec| vec![spec.def.name.clone()])
        .chain(stmt.unique.iter().cloned());
    for columns in unique_sets {
        let name = format!("uq_{}_{}", stmt.name.name, columns.join("_"));
        table.create_index(IndexDef::new(name, stmt.name.name.clone(), columns).unique(), dialect)?;
    }

    for spec in &stmt.foreign_keys {
        let is_self = spec.ref_table.eq_ignore_ascii_case(&stmt.name.name);
        let parent_has_column = if is_self {
            table.ordinal_of(&spec.ref_column).is_some()
        } else {
            let (_, parent) = catalog
                .find_table(&spec.ref_table)
                .ok_or_else(|| dialect.unknown_table(&spec.ref_table))?;
            parent.ordinal_of(&spec.ref_column).is_some()
        };
        if !parent_has_column {
            return Err(dialect.unknown_column(&spec.ref_column));
        }
        let name = spec
            .name
            .clone()
            .unwrap_or_else(|| format!("fk_{}_{}", stmt.name.name, spec.column));
        table.add_foreign_key(
            ForeignKeyDef {
                name,
                column: spec.column.clone(),
                ref_table: spec.ref_table.clone(),
                ref_column: spec.ref_column.clone(),
            },
            dialect,
        )?;
    }

    register_table(catalog, &stmt.name, stmt.temporary, table, ctx)?;
    debug!(table = %stmt.name.name, temporary = stmt.temporary.is_some(), "created table");
    Ok(QueryResult::Definition {
        message: format!("table '{}' created", stmt.name.name),
    })
}

/// CREATE TABLE .. AS SELECT: column types come from the first non-NULL value
fn create_table_as(catalog: &mut Catalog, stmt: &CreateTableAsStmt, ctx: ExecContext<'_>) -> Result<QueryResult> {
    let dialect = ctx.dialect;
    let result = QueryExecutor::new(catalog, ctx).query(&stmt.query)?;
    let columns: Vec<ColumnDef> = result
        .columns()
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let sample = result.rows().iter().map(|r| &r[i]).find(|v| !v.is_null());
            let col_type = sample.map(ColumnType::infer).unwrap_or(ColumnType::Text);
            ColumnDef::new(name.clone(), col_type)
        })
        .collect();
    let mut table = Table::new(stmt.name.name.clone(), columns, fold_case(dialect))?;
    let mut identity = table.next_identity();
    let count = result.len();
    for values in result.into_rows() {
        let assigned: Row = values.into_iter().enumerate().collect();
        let row = table.prepare_insert(assigned, &mut identity, dialect)?;
        table.push_row(row);
    }
    register_table(catalog, &stmt.name, stmt.temporary, table, ctx)?;
    debug!(table = %stmt.name.name, rows = count, "created table from query");
    Ok(QueryResult::Affected(count as u64))
}

fn create_view(catalog: &mut Catalog, stmt: &CreateViewStmt, ctx: ExecContext<'_>) -> Result<QueryResult> {
    let view = ViewDef {
        name: stmt.name.name.clone(),
        columns: stmt.columns.clone(),
        query: (*stmt.query).clone(),
    };
    catalog.add_view(stmt.name.schema.as_deref(), view, stmt.or_replace, ctx.dialect)?;
    Ok(QueryResult::Definition {
        message: format!("view '{}' created", stmt.name.name),
    })
}

fn drop_table(catalog: &mut Catalog, stmt: &DropStmt, ctx: ExecContext<'_>) -> Result<QueryResult> {
    if !catalog.drop_table(&stmt.name, ctx.connection) && !stmt.if_exists {
        return Err(ctx.dialect.unknown_table(&stmt.name.name));
    }
    Ok(QueryResult::Definition {
        message: format!("table '{}' dropped", stmt.name.name),
    })
}

fn drop_view(catalog: &mut Catalog, stmt: &DropStmt, ctx: ExecContext<'_>) -> Result<QueryResult> {
    if !catalog.drop_view(&stmt.name) && !stmt.if_exists {
        return Err(ctx.dialect.unknown_table(&stmt.name.name));
    }
    Ok(QueryResult::Definition {
        message: format!("view '{}' dropped", stmt.name.name),
    })
}
