//! Hash indexes over table rows
//!
//! Each index maps a composite key string to the positions of the rows
//! holding that key. Positions are row offsets in `Table::rows`, so any
//! operation that shifts rows must call `rebuild`.

use crate::types::{IndexDef, Row, Value};
use ahash::AHashMap;

/// Separator between key parts; cannot appear in a key part prefix
const KEY_SEPARATOR: char = '\u{1f}';

/// Composite key of one row for one index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexKey {
    pub text: String,
    /// At least one key column is NULL
    pub has_null: bool,
}

#[derive(Debug, Clone)]
pub struct TableIndex {
    def: IndexDef,
    ordinals: Vec<usize>,
    /// Text parts compare case-insensitively
    fold_case: bool,
    entries: AHashMap<String, Vec<usize>>,
}

impl TableIndex {
    pub fn new(def: IndexDef, ordinals: Vec<usize>, fold_case: bool) -> Self {
        Self {
            def,
            ordinals,
            fold_case,
            entries: AHashMap::new(),
        }
    }

    pub fn def(&self) -> &IndexDef {
        &self.def
    }

    pub fn name(&self) -> &str {
        &self.def.name
    }

    pub fn is_unique(&self) -> bool {
        self.def.unique
    }

    pub fn ordinals(&self) -> &[usize] {
        &self.ordinals
    }

    /// Number of distinct keys
    pub fn cardinality(&self) -> usize {
        self.entries.len()
    }

    pub fn key_for_row(&self, row: &Row) -> IndexKey {
        let values: Vec<&Value> = self
            .ordinals
            .iter()
            .map(|ord| row.get(ord).unwrap_or(&Value::Null))
            .collect();
        self.key_for_values(&values)
    }

    pub fn key_for_values(&self, values: &[&Value]) -> IndexKey {
        let mut text = String::new();
        let mut has_null = false;
        for (i, value) in values.iter().enumerate() {
            if i > 0 {
                text.push(KEY_SEPARATOR);
            }
            has_null |= value.is_null();
            text.push_str(&value.key_string(self.fold_case));
        }
        IndexKey { text, has_null }
    }

    pub fn insert(&mut self, key: &IndexKey, position: usize) {
        self.entries
            .entry(key.text.clone())
            .or_default()
            .push(position);
    }

    pub fn remove(&mut self, key: &IndexKey, position: usize) {
        if let Some(positions) = self.entries.get_mut(&key.text) {
            positions.retain(|p| *p != position);
            if positions.is_empty() {
                self.entries.remove(&key.text);
            }
        }
    }

    /// Row positions holding `key`
    pub fn lookup(&self, key: &IndexKey) -> &[usize] {
        self.entries
            .get(&key.text)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn rebuild(&mut self, rows: &[Row]) {
        self.entries.clear();
        for (position, row) in rows.iter().enumerate() {
            let key = self.key_for_row(row);
            self.insert(&key, position);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(values: &[(usize, Value)]) -> Row {
        values.iter().cloned().collect()
    }

    #[test]
    fn test_lookup_and_rebuild() {
        let def = IndexDef::new("ix_name", "users", ["name"]);
        let mut index = TableIndex::new(def, vec![1], true);
        let rows = vec![
            row(&[(0, Value::Integer(1)), (1, Value::from("Bob"))]),
            row(&[(0, Value::Integer(2)), (1, Value::from("alice"))]),
            row(&[(0, Value::Integer(3)), (1, Value::from("BOB"))]),
        ];
        index.rebuild(&rows);

        let key = index.key_for_values(&[&Value::from("bob")]);
        assert_eq!(index.lookup(&key), &[0, 2]);
        assert_eq!(index.cardinality(), 2);

        index.remove(&key, 0);
        assert_eq!(index.lookup(&key), &[2]);
    }

    #[test]
    fn test_composite_keys_and_nulls() {
        let def = IndexDef::new("ix", "t", ["a", "b"]).unique();
        let index = TableIndex::new(def, vec![0, 1], false);
        let a = index.key_for_row(&row(&[(0, Value::Integer(1)), (1, Value::from("x"))]));
        let b = index.key_for_row(&row(&[(0, Value::Integer(1))]));
        assert!(!a.has_null);
        assert!(b.has_null);
        assert_ne!(a, b);
        // 1 and 1.0 are the same key
        let c = index.key_for_values(&[&Value::Float(1.0), &Value::from("x")]);
        assert_eq!(a, c);
    }
}
