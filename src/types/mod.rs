//! Value and schema types shared by the parser, storage engine and executor

mod table;

pub use table::{
    ColumnDef, ColumnType, ForeignKeyDef, IndexDef, TempScope, TriggerEvent,
};

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Unified SQL value
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    /// Exact numeric; keeps the scale it was written or computed with
    Decimal(Decimal),
    Text(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    /// Only produced by parameter binding (a parameter expanding to an IN list)
    List(Vec<Value>),
}

/// Coarse type family used for UNION compatibility and coercion decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeCategory {
    Null,
    Boolean,
    Numeric,
    Text,
    Temporal,
    List,
}

/// A stored row: sparse mapping from column ordinal to value.
///
/// Missing ordinals read as NULL, which lets rows written before a column was
/// added stay valid.
pub type Row = BTreeMap<usize, Value>;

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn category(&self) -> TypeCategory {
        match self {
            Value::Null => TypeCategory::Null,
            Value::Bool(_) => TypeCategory::Boolean,
            Value::Integer(_) | Value::Float(_) | Value::Decimal(_) => TypeCategory::Numeric,
            Value::Text(_) => TypeCategory::Text,
            Value::Date(_) | Value::DateTime(_) => TypeCategory::Temporal,
            Value::List(_) => TypeCategory::List,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "double",
            Value::Decimal(_) => "decimal",
            Value::Text(_) => "text",
            Value::Date(_) => "date",
            Value::DateTime(_) => "datetime",
            Value::List(_) => "list",
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Bool(b) => Some(*b as i64),
            Value::Float(f) if f.fract() == 0.0 => f.to_i64(),
            Value::Decimal(d) if d.fract().is_zero() => d.to_i64(),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Decimal(d) => d.to_f64(),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Value::Integer(i) => Some(Decimal::from(*i)),
            Value::Decimal(d) => Some(*d),
            Value::Float(f) => Decimal::from_f64(*f),
            Value::Bool(b) => Some(Decimal::from(*b as i64)),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// SQL truthiness: NULL is unknown (None)
    pub fn truthy(&self) -> Option<bool> {
        match self {
            Value::Null => None,
            Value::Bool(b) => Some(*b),
            Value::Integer(i) => Some(*i != 0),
            Value::Float(f) => Some(*f != 0.0),
            Value::Decimal(d) => Some(!d.is_zero()),
            Value::Text(s) => Some(s.trim().parse::<f64>().map(|f| f != 0.0).unwrap_or(false)),
            Value::Date(_) | Value::DateTime(_) => Some(true),
            Value::List(items) => Some(!items.is_empty()),
        }
    }

    /// Canonical string used for hash keys (indexes, grouping, DISTINCT).
    ///
    /// Numerically equal values produce the same key regardless of their
    /// integer/decimal/float representation.
    pub fn key_string(&self, fold_case: bool) -> String {
        match self {
            Value::Null => "\u{0}null".to_string(),
            Value::Bool(b) => format!("n:{}", *b as i64),
            Value::Integer(i) => format!("n:{}", i),
            Value::Decimal(d) => format!("n:{}", d.normalize()),
            Value::Float(f) => match Decimal::from_f64(*f) {
                Some(d) => format!("n:{}", d.normalize()),
                None => format!("f:{}", f),
            },
            Value::Text(s) if fold_case => format!("s:{}", s.to_lowercase()),
            Value::Text(s) => format!("s:{}", s),
            Value::Date(d) => format!("t:{}", d.and_hms_opt(0, 0, 0).unwrap_or_default()),
            Value::DateTime(dt) => format!("t:{}", dt),
            Value::List(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.key_string(fold_case)).collect();
                format!("l:[{}]", parts.join(","))
            }
        }
    }

    /// Render as a SQL literal that re-parses to an equal value
    pub fn to_sql_literal(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Bool(true) => "TRUE".to_string(),
            Value::Bool(false) => "FALSE".to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Decimal(d) => d.to_string(),
            Value::Float(f) => format_float(*f),
            Value::Text(s) => format!("'{}'", s.replace('\'', "''")),
            Value::Date(d) => format!("'{}'", d.format("%Y-%m-%d")),
            Value::DateTime(dt) => format!("'{}'", dt.format("%Y-%m-%d %H:%M:%S%.f")),
            Value::List(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_sql_literal()).collect();
                format!("({})", parts.join(", "))
            }
        }
    }
}

fn format_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{:.1}", f)
    } else {
        format!("{}", f)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::Decimal(d) => write!(f, "{}", d),
            Value::Text(s) => write!(f, "{}", s),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
            Value::List(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "{}", parts.join(","))
            }
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Value::Decimal(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::DateTime(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Parse a textual date or datetime the way the engine accepts them in literals
pub fn parse_temporal(s: &str) -> Option<Value> {
    let s = s.trim();
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(Value::DateTime(dt));
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok().map(Value::Date)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_string_numeric_equivalence() {
        let a = Value::Integer(10);
        let b = Value::Decimal(Decimal::new(1000, 2));
        let c = Value::Float(10.0);
        assert_eq!(a.key_string(false), b.key_string(false));
        assert_eq!(a.key_string(false), c.key_string(false));
        assert_ne!(a.key_string(false), Value::Text("10".into()).key_string(false));
    }

    #[test]
    fn test_key_string_case_folding() {
        let a = Value::Text("Bob".into());
        let b = Value::Text("BOB".into());
        assert_eq!(a.key_string(true), b.key_string(true));
        assert_ne!(a.key_string(false), b.key_string(false));
    }

    #[test]
    fn test_sql_literal_escaping() {
        assert_eq!(Value::Text("O'Brien".into()).to_sql_literal(), "'O''Brien'");
        assert_eq!(Value::Float(2.0).to_sql_literal(), "2.0");
        assert_eq!(Value::Decimal(Decimal::new(1050, 2)).to_sql_literal(), "10.50");
    }

    #[test]
    fn test_parse_temporal() {
        assert!(matches!(parse_temporal("2024-01-31"), Some(Value::Date(_))));
        assert!(matches!(parse_temporal("2024-01-31 10:11:12"), Some(Value::DateTime(_))));
        assert!(parse_temporal("not a date").is_none());
    }
}
