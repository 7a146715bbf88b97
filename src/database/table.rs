//! In-memory table: columns, rows, indexes, constraints and triggers
//!
//! A `Table` only knows about itself. Checks that need other tables (foreign
//! keys) and trigger dispatch live in the executor's mutation path, which
//! validates a whole statement before calling the mutating methods here.

use super::index::{IndexKey, TableIndex};
use crate::dialect::Dialect;
use crate::error::{Result, SqlError};
use crate::types::{
    parse_temporal, ColumnDef, ColumnType, ForeignKeyDef, IndexDef, Row, TempScope,
    TriggerEvent, Value,
};
use ahash::{AHashMap, AHashSet};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::fmt;
use std::sync::Arc;

/// Trigger callback; returning an error aborts the statement
pub type TriggerFn = Arc<dyn Fn(&TriggerContext<'_>) -> Result<()> + Send + Sync>;

/// Row images passed to a trigger
pub struct TriggerContext<'a> {
    pub table: &'a str,
    pub event: TriggerEvent,
    pub columns: &'a [ColumnDef],
    /// Row before the change (UPDATE, DELETE)
    pub old: Option<&'a Row>,
    /// Row after the change (INSERT, UPDATE)
    pub new: Option<&'a Row>,
}

impl<'a> TriggerContext<'a> {
    fn value_in(&self, row: Option<&'a Row>, column: &str) -> Option<&'a Value> {
        let col = self
            .columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(column))?;
        row.map(|r| r.get(&col.ordinal).unwrap_or(&Value::Null))
    }

    pub fn old_value(&self, column: &str) -> Option<&'a Value> {
        self.value_in(self.old, column)
    }

    pub fn new_value(&self, column: &str) -> Option<&'a Value> {
        self.value_in(self.new, column)
    }
}

#[derive(Clone)]
pub struct Trigger {
    pub name: String,
    pub event: TriggerEvent,
    callback: TriggerFn,
}

impl Trigger {
    pub fn fire(&self, ctx: &TriggerContext<'_>) -> Result<()> {
        (self.callback)(ctx)
    }
}

impl fmt::Debug for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trigger")
            .field("name", &self.name)
            .field("event", &self.event)
            .finish()
    }
}

/// Unique keys claimed by rows staged in the current statement but not stored yet
#[derive(Debug, Default)]
pub struct StagedKeys {
    claimed: AHashMap<usize, AHashSet<String>>,
}

#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    columns: Vec<ColumnDef>,
    /// Lowercase column name -> ordinal
    lookup: AHashMap<String, usize>,
    rows: Vec<Row>,
    next_identity: i64,
    primary_key: Vec<usize>,
    indexes: Vec<TableIndex>,
    foreign_keys: Vec<ForeignKeyDef>,
    triggers: Vec<Trigger>,
    temp_scope: Option<TempScope>,
    /// Index keys fold text case (case-insensitive collations)
    fold_case: bool,
}

impl Table {
    /// Create an empty table; ordinals are assigned in column order
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDef>, fold_case: bool) -> Result<Self> {
        let mut table = Self {
            name: name.into(),
            columns: Vec::with_capacity(columns.len()),
            lookup: AHashMap::new(),
            rows: Vec::new(),
            next_identity: 1,
            primary_key: Vec::new(),
            indexes: Vec::new(),
            foreign_keys: Vec::new(),
            triggers: Vec::new(),
            temp_scope: None,
            fold_case,
        };
        for col in columns {
            table.push_column(col)?;
        }
        Ok(table)
    }

    fn push_column(&mut self, mut col: ColumnDef) -> Result<usize> {
        let key = col.name.to_lowercase();
        if self.lookup.contains_key(&key) {
            return Err(SqlError::invalid(format!(
                "duplicate column name '{}' in table '{}'",
                col.name, self.name
            )));
        }
        let ordinal = self.columns.len();
        col.ordinal = ordinal;
        self.lookup.insert(key, ordinal);
        self.columns.push(col);
        Ok(ordinal)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn ordinal_of(&self, name: &str) -> Option<usize> {
        self.lookup.get(&name.to_lowercase()).copied()
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.ordinal_of(name).map(|ord| &self.columns[ord])
    }

    /// Resolve a column name or fail with the dialect's unknown-column error
    pub fn require_ordinal(&self, name: &str, dialect: &Dialect) -> Result<usize> {
        self.ordinal_of(name)
            .ok_or_else(|| dialect.unknown_column(name))
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row(&self, position: usize) -> Option<&Row> {
        self.rows.get(position)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Dense copy of a row in column order
    pub fn row_values(&self, row: &Row) -> Vec<Value> {
        (0..self.columns.len())
            .map(|ord| row.get(&ord).cloned().unwrap_or(Value::Null))
            .collect()
    }

    pub fn temp_scope(&self) -> Option<TempScope> {
        self.temp_scope
    }

    pub fn is_temporary(&self) -> bool {
        self.temp_scope.is_some()
    }

    pub(crate) fn set_temp_scope(&mut self, scope: Option<TempScope>) {
        self.temp_scope = scope;
    }

    pub fn next_identity(&self) -> i64 {
        self.next_identity
    }

    pub(crate) fn set_next_identity(&mut self, next: i64) {
        self.next_identity = self.next_identity.max(next);
    }

    pub fn primary_key(&self) -> &[usize] {
        &self.primary_key
    }

    pub fn indexes(&self) -> &[TableIndex] {
        &self.indexes
    }

    pub fn foreign_keys(&self) -> &[ForeignKeyDef] {
        &self.foreign_keys
    }

    pub fn triggers_for(&self, event: TriggerEvent) -> Vec<Trigger> {
        if self.is_temporary() {
            return Vec::new();
        }
        self.triggers
            .iter()
            .filter(|t| t.event == event)
            .cloned()
            .collect()
    }

    // ----- schema design -----

    /// Add a column; existing rows receive the default (or identity) value
    pub fn add_column(&mut self, col: ColumnDef, dialect: &Dialect) -> Result<usize> {
        if !self.rows.is_empty() && !col.nullable && col.default.is_none() && !col.identity {
            return Err(SqlError::invalid(format!(
                "cannot add NOT NULL column '{}' without a default to non-empty table '{}'",
                col.name, self.name
            )));
        }
        let default = match &col.default {
            Some(v) => self.coerce(&col, v.clone(), dialect)?,
            None => Value::Null,
        };
        let identity = col.identity;
        let ordinal = self.push_column(col)?;
        for row in self.rows.iter_mut() {
            let value = if identity {
                let id = self.next_identity;
                self.next_identity += 1;
                Value::Integer(id)
            } else {
                default.clone()
            };
            if !value.is_null() {
                row.insert(ordinal, value);
            }
        }
        Ok(ordinal)
    }

    /// Declare the primary key; backed by a unique index named per dialect
    pub fn set_primary_key(&mut self, columns: &[String], dialect: &Dialect) -> Result<()> {
        if !self.primary_key.is_empty() {
            return Err(SqlError::invalid(format!(
                "table '{}' already has a primary key",
                self.name
            )));
        }
        let def = IndexDef::new(dialect.primary_key_name(&self.name), self.name.clone(), columns.to_vec())
            .unique();
        let ordinals = self.resolve_ordinals(&def.columns, dialect)?;
        self.create_index(def, dialect)?;
        for ord in &ordinals {
            self.columns[*ord].nullable = false;
        }
        self.primary_key = ordinals;
        Ok(())
    }

    fn resolve_ordinals(&self, columns: &[String], dialect: &Dialect) -> Result<Vec<usize>> {
        if columns.is_empty() {
            return Err(SqlError::invalid("index requires at least one column"));
        }
        columns
            .iter()
            .map(|c| self.require_ordinal(c, dialect))
            .collect()
    }

    pub fn create_index(&mut self, def: IndexDef, dialect: &Dialect) -> Result<()> {
        if self
            .indexes
            .iter()
            .any(|ix| ix.name().eq_ignore_ascii_case(&def.name))
        {
            return Err(dialect.already_exists(&def.name));
        }
        let ordinals = self.resolve_ordinals(&def.columns, dialect)?;
        let mut index = TableIndex::new(def, ordinals, self.fold_case);
        index.rebuild(&self.rows);
        if index.is_unique() {
            let mut seen = AHashSet::new();
            for row in &self.rows {
                let key = index.key_for_row(row);
                if key.has_null && dialect.unique_nulls_distinct() {
                    continue;
                }
                if !seen.insert(key.text) {
                    return Err(self.duplicate_error(&index, row, dialect));
                }
            }
        }
        self.indexes.push(index);
        Ok(())
    }

    pub fn add_foreign_key(&mut self, fk: ForeignKeyDef, dialect: &Dialect) -> Result<()> {
        self.require_ordinal(&fk.column, dialect)?;
        if self
            .foreign_keys
            .iter()
            .any(|f| f.name.eq_ignore_ascii_case(&fk.name))
        {
            return Err(dialect.already_exists(&fk.name));
        }
        self.foreign_keys.push(fk);
        Ok(())
    }

    pub fn add_trigger(&mut self, name: impl Into<String>, event: TriggerEvent, callback: TriggerFn) {
        self.triggers.push(Trigger {
            name: name.into(),
            event,
            callback,
        });
    }

    // ----- value validation -----

    /// Convert `value` to the column's type, enforcing size, scale and members
    pub fn coerce(&self, col: &ColumnDef, value: Value, dialect: &Dialect) -> Result<Value> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        let mismatch = |value: &Value| {
            dialect.type_mismatch(&format!(
                "cannot store {} value '{}' in column '{}'",
                value.type_name(),
                value,
                col.name
            ))
        };
        if let Value::List(_) = value {
            return Err(mismatch(&value));
        }
        match col.col_type {
            ColumnType::Boolean => match &value {
                Value::Bool(b) => Ok(Value::Bool(*b)),
                Value::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                    "true" | "t" | "1" | "yes" => Ok(Value::Bool(true)),
                    "false" | "f" | "0" | "no" => Ok(Value::Bool(false)),
                    _ => Err(mismatch(&value)),
                },
                other => other
                    .as_i64()
                    .map(|i| Value::Bool(i != 0))
                    .ok_or_else(|| mismatch(&value)),
            },
            ColumnType::Integer => match &value {
                Value::Integer(i) => Ok(Value::Integer(*i)),
                Value::Float(f) if f.is_finite() => {
                    let rounded = f.round();
                    if rounded.abs() >= 9.2e18 {
                        return Err(dialect.value_out_of_range(&self.name, &col.name));
                    }
                    Ok(Value::Integer(rounded as i64))
                }
                Value::Decimal(d) => d
                    .round()
                    .to_i64()
                    .map(Value::Integer)
                    .ok_or_else(|| dialect.value_out_of_range(&self.name, &col.name)),
                other => other
                    .as_i64()
                    .map(Value::Integer)
                    .ok_or_else(|| mismatch(&value)),
            },
            ColumnType::Float => value
                .as_f64()
                .map(Value::Float)
                .ok_or_else(|| mismatch(&value)),
            ColumnType::Decimal => {
                let d = value.as_decimal().ok_or_else(|| mismatch(&value))?;
                self.fit_decimal(col, d, dialect).map(Value::Decimal)
            }
            ColumnType::Text => {
                let text = match value {
                    Value::Text(s) => s,
                    other => other.to_string(),
                };
                if let Some(size) = col.size {
                    if text.chars().count() > size as usize {
                        return Err(dialect.value_too_long(&self.name, &col.name, size, &text));
                    }
                }
                Ok(Value::Text(text))
            }
            ColumnType::Date => match value {
                Value::Date(_) => Ok(value),
                Value::DateTime(dt) => Ok(Value::Date(dt.date())),
                Value::Text(ref s) => match parse_temporal(s) {
                    Some(Value::DateTime(dt)) => Ok(Value::Date(dt.date())),
                    Some(v) => Ok(v),
                    None => Err(mismatch(&value)),
                },
                _ => Err(mismatch(&value)),
            },
            ColumnType::DateTime => match value {
                Value::DateTime(_) => Ok(value),
                Value::Date(d) => Ok(Value::DateTime(d.and_hms_opt(0, 0, 0).unwrap_or_default())),
                Value::Text(ref s) => match parse_temporal(s) {
                    Some(Value::Date(d)) => {
                        Ok(Value::DateTime(d.and_hms_opt(0, 0, 0).unwrap_or_default()))
                    }
                    Some(v) => Ok(v),
                    None => Err(mismatch(&value)),
                },
                _ => Err(mismatch(&value)),
            },
            ColumnType::Enum => {
                let text = value.to_string();
                self.member(col, text.trim())
                    .map(|m| Value::Text(m.to_string()))
                    .ok_or_else(|| dialect.invalid_member(&self.name, &col.name, &text))
            }
            ColumnType::Set => {
                let text = value.to_string();
                let mut members = Vec::new();
                for part in text.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                    let member = self
                        .member(col, part)
                        .ok_or_else(|| dialect.invalid_member(&self.name, &col.name, part))?;
                    if !members.contains(&member) {
                        members.push(member);
                    }
                }
                // stored in declaration order
                members.sort_by_key(|m| col.allowed_values.iter().position(|a| a == *m));
                Ok(Value::Text(members.join(",")))
            }
        }
    }

    fn member<'c>(&self, col: &'c ColumnDef, text: &str) -> Option<&'c str> {
        col.allowed_values
            .iter()
            .find(|m| m.eq_ignore_ascii_case(text))
            .map(|m| m.as_str())
    }

    fn fit_decimal(&self, col: &ColumnDef, d: Decimal, dialect: &Dialect) -> Result<Decimal> {
        let mut d = d;
        if let Some(scale) = col.scale {
            if d.normalize().scale() > scale {
                return Err(dialect.value_out_of_range(&self.name, &col.name));
            }
            d.rescale(scale);
        }
        if let Some(precision) = col.size {
            let scale = col.scale.unwrap_or(0);
            let integer_digits = d.trunc().abs().to_string().trim_start_matches('0').len() as u32;
            if integer_digits > precision.saturating_sub(scale) {
                return Err(dialect.value_out_of_range(&self.name, &col.name));
            }
        }
        Ok(d)
    }

    /// Build a complete row for insertion from explicitly assigned values.
    ///
    /// Missing columns take their default, identity columns draw from
    /// `identity` (the caller's running counter), and nullability is enforced.
    pub fn prepare_insert(&self, assigned: Row, identity: &mut i64, dialect: &Dialect) -> Result<Row> {
        let mut row = Row::new();
        for col in &self.columns {
            let explicit = assigned.get(&col.ordinal).cloned();
            let value = match explicit {
                Some(v) if !(v.is_null() && col.identity) => self.coerce(col, v, dialect)?,
                _ if col.identity => {
                    let id = *identity;
                    *identity += 1;
                    Value::Integer(id)
                }
                Some(v) => v,
                None => match &col.default {
                    Some(d) => self.coerce(col, d.clone(), dialect)?,
                    None => Value::Null,
                },
            };
            if col.identity {
                if let Value::Integer(i) = value {
                    if i >= *identity {
                        *identity = i + 1;
                    }
                }
            }
            if value.is_null() {
                if !col.nullable {
                    return Err(dialect.not_null_violation(&self.name, &col.name));
                }
                continue;
            }
            row.insert(col.ordinal, value);
        }
        Ok(row)
    }

    /// Apply column changes to a copy of `old`, validating each new value
    pub fn prepare_update(&self, old: &Row, changes: Vec<(usize, Value)>, dialect: &Dialect) -> Result<Row> {
        let mut row = old.clone();
        for (ordinal, value) in changes {
            let col = &self.columns[ordinal];
            let value = self.coerce(col, value, dialect)?;
            if value.is_null() {
                if !col.nullable {
                    return Err(dialect.not_null_violation(&self.name, &col.name));
                }
                row.remove(&ordinal);
            } else {
                row.insert(ordinal, value);
            }
        }
        Ok(row)
    }

    // ----- uniqueness -----

    fn skips_key(key: &IndexKey, dialect: &Dialect) -> bool {
        key.has_null && dialect.unique_nulls_distinct()
    }

    pub fn duplicate_error(&self, index: &TableIndex, row: &Row, dialect: &Dialect) -> SqlError {
        let values: Vec<Value> = index
            .ordinals()
            .iter()
            .map(|ord| row.get(ord).cloned().unwrap_or(Value::Null))
            .collect();
        let primary = !self.primary_key.is_empty() && index.ordinals() == self.primary_key.as_slice();
        dialect.duplicate_key(&self.name, index.name(), &index.def().columns, &values, primary)
    }

    /// First stored row clashing with `row` on a unique index, as (index, position)
    pub fn find_conflict(
        &self,
        row: &Row,
        skip: Option<usize>,
        dialect: &Dialect,
    ) -> Option<(usize, usize)> {
        for (i, index) in self.indexes.iter().enumerate() {
            if !index.is_unique() {
                continue;
            }
            let key = index.key_for_row(row);
            if Self::skips_key(&key, dialect) {
                continue;
            }
            if let Some(pos) = index.lookup(&key).iter().find(|p| Some(**p) != skip) {
                return Some((i, *pos));
            }
        }
        None
    }

    /// Conflict restricted to the unique index covering exactly `ordinals`
    pub fn find_conflict_on(&self, row: &Row, ordinals: &[usize], dialect: &Dialect) -> Option<usize> {
        let index = self
            .indexes
            .iter()
            .find(|ix| ix.is_unique() && same_columns(ix.ordinals(), ordinals))?;
        let key = index.key_for_row(row);
        if Self::skips_key(&key, dialect) {
            return None;
        }
        index.lookup(&key).first().copied()
    }

    pub fn has_unique_index_on(&self, ordinals: &[usize]) -> bool {
        self.indexes
            .iter()
            .any(|ix| ix.is_unique() && same_columns(ix.ordinals(), ordinals))
    }

    /// Check a row to be inserted against stored rows and rows staged earlier
    /// in the same statement, then claim its keys.
    pub fn check_insert_unique(&self, row: &Row, staged: &mut StagedKeys, dialect: &Dialect) -> Result<()> {
        let mut keys = Vec::new();
        for (i, index) in self.indexes.iter().enumerate() {
            if !index.is_unique() {
                continue;
            }
            let key = index.key_for_row(row);
            if Self::skips_key(&key, dialect) {
                continue;
            }
            let claimed = staged
                .claimed
                .get(&i)
                .map(|set| set.contains(&key.text))
                .unwrap_or(false);
            if claimed || !index.lookup(&key).is_empty() {
                return Err(self.duplicate_error(index, row, dialect));
            }
            keys.push((i, key.text));
        }
        for (i, text) in keys {
            staged.claimed.entry(i).or_default().insert(text);
        }
        Ok(())
    }

    /// Verify unique indexes over the table as it would look with `updates` applied
    pub fn check_update_unique(&self, updates: &[(usize, Row)], dialect: &Dialect) -> Result<()> {
        let replaced: AHashMap<usize, &Row> = updates.iter().map(|(p, r)| (*p, r)).collect();
        for index in self.indexes.iter().filter(|ix| ix.is_unique()) {
            let touched = updates.iter().any(|(pos, new)| {
                let old = &self.rows[*pos];
                index.ordinals().iter().any(|ord| old.get(ord) != new.get(ord))
            });
            if !touched {
                continue;
            }
            let mut seen = AHashSet::with_capacity(self.rows.len());
            for (pos, stored) in self.rows.iter().enumerate() {
                let row = replaced.get(&pos).copied().unwrap_or(stored);
                let key = index.key_for_row(row);
                if Self::skips_key(&key, dialect) {
                    continue;
                }
                if !seen.insert(key.text) {
                    return Err(self.duplicate_error(index, row, dialect));
                }
            }
        }
        Ok(())
    }

    // ----- row storage -----

    /// Store a validated row; returns its position
    pub fn push_row(&mut self, row: Row) -> usize {
        let position = self.rows.len();
        for index in self.indexes.iter_mut() {
            let key = index.key_for_row(&row);
            index.insert(&key, position);
        }
        self.rows.push(row);
        position
    }

    pub fn replace_row(&mut self, position: usize, row: Row) {
        let Some(old) = self.rows.get(position) else {
            return;
        };
        for index in self.indexes.iter_mut() {
            let old_key = index.key_for_row(old);
            let new_key = index.key_for_row(&row);
            if old_key != new_key {
                index.remove(&old_key, position);
                index.insert(&new_key, position);
            }
        }
        self.rows[position] = row;
    }

    /// Remove rows by position; remaining rows shift so indexes are rebuilt
    pub fn remove_rows(&mut self, positions: &[usize]) -> usize {
        if positions.is_empty() {
            return 0;
        }
        let doomed: AHashSet<usize> = positions.iter().copied().collect();
        let before = self.rows.len();
        let mut position = 0;
        self.rows.retain(|_| {
            let keep = !doomed.contains(&position);
            position += 1;
            keep
        });
        self.rebuild_indexes();
        before - self.rows.len()
    }

    pub fn truncate(&mut self) {
        self.rows.clear();
        self.rebuild_indexes();
    }

    pub fn rebuild_indexes(&mut self) {
        for index in self.indexes.iter_mut() {
            index.rebuild(&self.rows);
        }
    }

    /// Index whose key columns are exactly `ordinals` (in any order)
    pub fn index_for_columns(&self, ordinals: &[usize]) -> Option<&TableIndex> {
        self.indexes
            .iter()
            .filter(|ix| same_columns(ix.ordinals(), ordinals))
            .max_by_key(|ix| ix.is_unique())
    }

    /// Positions of rows whose `ordinal` equals `value` under index semantics
    pub fn lookup_equal(&self, index: &TableIndex, value: &Value) -> Vec<usize> {
        let key = index.key_for_values(&[value]);
        index.lookup(&key).to_vec()
    }

    /// Row positions whose `ordinal` column holds a value with `key`
    pub fn positions_with_value(&self, ordinal: usize, value: &Value) -> Vec<usize> {
        if let Some(index) = self.index_for_columns(&[ordinal]) {
            return self.lookup_equal(index, value);
        }
        let key = value.key_string(self.fold_case);
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, row)| {
                row.get(&ordinal)
                    .map(|v| v.key_string(self.fold_case) == key)
                    .unwrap_or(false)
            })
            .map(|(pos, _)| pos)
            .collect()
    }
}

fn same_columns(a: &[usize], b: &[usize]) -> bool {
    a.len() == b.len() && a.iter().all(|x| b.contains(x))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::DialectKind;

    fn users(dialect: &Dialect) -> Table {
        let mut table = Table::new(
            "users",
            vec![
                ColumnDef::new("id", ColumnType::Integer).identity(),
                ColumnDef::new("name", ColumnType::Text).size(5).not_null(),
                ColumnDef::new("email", ColumnType::Text),
            ],
            false,
        )
        .unwrap();
        table.set_primary_key(&["id".to_string()], dialect).unwrap();
        table
            .create_index(IndexDef::new("ux_email", "users", ["email"]).unique(), dialect)
            .unwrap();
        table
    }

    fn assigned(values: &[(usize, Value)]) -> Row {
        values.iter().cloned().collect()
    }

    #[test]
    fn test_prepare_insert_defaults_and_identity() {
        let dialect = Dialect::latest(DialectKind::MySql);
        let table = users(&dialect);
        let mut identity = table.next_identity();
        let row = table
            .prepare_insert(assigned(&[(1, Value::from("Bob"))]), &mut identity, &dialect)
            .unwrap();
        assert_eq!(row.get(&0), Some(&Value::Integer(1)));
        assert_eq!(identity, 2);
        assert!(row.get(&2).is_none());

        let err = table
            .prepare_insert(Row::new(), &mut identity, &dialect)
            .unwrap_err();
        assert_eq!(err.code(), 1048);

        let err = table
            .prepare_insert(assigned(&[(1, Value::from("Roberta"))]), &mut identity, &dialect)
            .unwrap_err();
        assert!(matches!(err, SqlError::ValueOutOfRange { .. }));
    }

    #[test]
    fn test_unique_checks_with_staging() {
        let dialect = Dialect::latest(DialectKind::MySql);
        let mut table = users(&dialect);
        let mut identity = 1;
        let row = table
            .prepare_insert(
                assigned(&[(1, Value::from("Bob")), (2, Value::from("b@x"))]),
                &mut identity,
                &dialect,
            )
            .unwrap();
        table.push_row(row);

        let mut staged = StagedKeys::default();
        let dup = assigned(&[(0, Value::Integer(1)), (1, Value::from("Al"))]);
        let err = table.check_insert_unique(&dup, &mut staged, &dialect).unwrap_err();
        assert_eq!(err.code(), 1062);

        let fresh = assigned(&[(0, Value::Integer(7)), (1, Value::from("Al"))]);
        table.check_insert_unique(&fresh, &mut staged, &dialect).unwrap();
        assert!(table.check_insert_unique(&fresh, &mut staged, &dialect).is_err());
    }

    #[test]
    fn test_null_keys_follow_dialect() {
        for (kind, allowed) in [(DialectKind::MySql, true), (DialectKind::SqlServer, false)] {
            let dialect = Dialect::latest(kind);
            let mut table = users(&dialect);
            table.push_row(assigned(&[(0, Value::Integer(1)), (1, Value::from("A"))]));
            let mut staged = StagedKeys::default();
            let row = assigned(&[(0, Value::Integer(2)), (1, Value::from("B"))]);
            assert_eq!(table.check_insert_unique(&row, &mut staged, &dialect).is_ok(), allowed);
        }
    }

    #[test]
    fn test_update_uniqueness_on_final_state() {
        let dialect = Dialect::latest(DialectKind::Postgres);
        let mut table = users(&dialect);
        table.push_row(assigned(&[(0, Value::Integer(1)), (1, Value::from("A"))]));
        table.push_row(assigned(&[(0, Value::Integer(2)), (1, Value::from("B"))]));

        // swapping keys is fine once both rows change
        let swap = vec![
            (0, assigned(&[(0, Value::Integer(2)), (1, Value::from("A"))])),
            (1, assigned(&[(0, Value::Integer(1)), (1, Value::from("B"))])),
        ];
        table.check_update_unique(&swap, &dialect).unwrap();

        let clash = vec![(1, assigned(&[(0, Value::Integer(1)), (1, Value::from("B"))]))];
        assert!(table.check_update_unique(&clash, &dialect).is_err());
    }

    #[test]
    fn test_remove_rows_rebuilds_indexes() {
        let dialect = Dialect::latest(DialectKind::Sqlite);
        let mut table = users(&dialect);
        for id in 1..=3 {
            table.push_row(assigned(&[(0, Value::Integer(id)), (1, Value::from("x"))]));
        }
        assert_eq!(table.remove_rows(&[0]), 1);
        assert_eq!(table.positions_with_value(0, &Value::Integer(3)), vec![1]);
        assert!(table.positions_with_value(0, &Value::Integer(1)).is_empty());
    }

    #[test]
    fn test_coerce_decimal_enum_set() {
        let dialect = Dialect::latest(DialectKind::MySql);
        let table = Table::new(
            "t",
            vec![
                ColumnDef::new("price", ColumnType::Decimal).decimal(5, 2),
                ColumnDef::new("size", ColumnType::Enum).allowed(["S", "M", "L"]),
                ColumnDef::new("tags", ColumnType::Set).allowed(["a", "b", "c"]),
            ],
            true,
        )
        .unwrap();
        let price = &table.columns()[0];
        assert_eq!(
            table.coerce(price, Value::from("12.5"), &dialect).unwrap(),
            Value::Decimal(Decimal::new(1250, 2))
        );
        assert!(table.coerce(price, Value::from("1.234"), &dialect).is_err());
        assert!(table.coerce(price, Value::from(1234), &dialect).is_err());

        let size = &table.columns()[1];
        assert_eq!(table.coerce(size, Value::from("m"), &dialect).unwrap(), Value::from("M"));
        assert!(table.coerce(size, Value::from("XL"), &dialect).is_err());

        let tags = &table.columns()[2];
        assert_eq!(table.coerce(tags, Value::from("c,a"), &dialect).unwrap(), Value::from("a,c"));
        assert!(table.coerce(tags, Value::from("a,z"), &dialect).is_err());
    }

    #[test]
    fn test_add_column_fills_default() {
        let dialect = Dialect::latest(DialectKind::MySql);
        let mut table = users(&dialect);
        table.push_row(assigned(&[(0, Value::Integer(1)), (1, Value::from("A"))]));
        let ord = table
            .add_column(
                ColumnDef::new("active", ColumnType::Boolean).not_null().default_value(true),
                &dialect,
            )
            .unwrap();
        assert_eq!(table.rows()[0].get(&ord), Some(&Value::Bool(true)));
        assert!(table
            .add_column(ColumnDef::new("age", ColumnType::Integer).not_null(), &dialect)
            .is_err());
    }
}
