//! Parameter values bound to `@name`, `:name`, `?` and `$n` markers

use super::ast::ParamRef;
use crate::dialect::Dialect;
use crate::error::Result;
use crate::types::Value;
use ahash::AHashMap;

/// Caller-supplied parameter collection
#[derive(Debug, Clone, Default)]
pub struct Params {
    /// Lowercase name (without prefix) -> value
    named: AHashMap<String, Value>,
    positional: Vec<Value>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a named parameter; a leading `@`, `:` or `$` is ignored
    pub fn bind(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Append a positional parameter
    pub fn push(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    pub fn set(&mut self, name: &str, value: impl Into<Value>) {
        self.named.insert(normalize(name), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.named.is_empty() && self.positional.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.named.get(&normalize(name))
    }

    /// Resolve a marker or fail with the dialect's unknown-parameter error
    pub fn resolve(&self, param: &ParamRef, dialect: &Dialect) -> Result<Value> {
        let found = match param {
            ParamRef::Named(name) => self.get(name),
            ParamRef::Positional(i) => self.positional.get(*i),
            ParamRef::Numbered(n) => n
                .checked_sub(1)
                .and_then(|i| self.positional.get(i))
                .or_else(|| self.named.get(&n.to_string())),
        };
        found.cloned().ok_or_else(|| dialect.unknown_parameter(&display(param)))
    }
}

fn normalize(name: &str) -> String {
    name.trim_start_matches(['@', ':', '$']).to_lowercase()
}

fn display(param: &ParamRef) -> String {
    match param {
        ParamRef::Named(name) => format!("@{}", name),
        ParamRef::Positional(i) => format!("?{}", i + 1),
        ParamRef::Numbered(n) => format!("${}", n),
    }
}

impl<K: AsRef<str>, V: Into<Value>> FromIterator<(K, V)> for Params {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut params = Params::new();
        for (k, v) in iter {
            params.set(k.as_ref(), v);
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::DialectKind;
    use crate::error::SqlError;

    #[test]
    fn test_resolve_markers() {
        let dialect = Dialect::latest(DialectKind::Postgres);
        let params = Params::new().bind("@Id", 7).push("first").push(Value::Null);
        assert_eq!(
            params.resolve(&ParamRef::Named("id".into()), &dialect).unwrap(),
            Value::Integer(7)
        );
        assert_eq!(
            params.resolve(&ParamRef::Positional(0), &dialect).unwrap(),
            Value::from("first")
        );
        assert_eq!(
            params.resolve(&ParamRef::Numbered(2), &dialect).unwrap(),
            Value::Null
        );
    }

    #[test]
    fn test_missing_parameter() {
        let dialect = Dialect::latest(DialectKind::MySql);
        let err = Params::new()
            .resolve(&ParamRef::Named("missing".into()), &dialect)
            .unwrap_err();
        assert!(matches!(err, SqlError::UnknownParameter { .. }));
    }

    #[test]
    fn test_from_iterator() {
        let params: Params = [("a", 1), ("b", 2)].into_iter().collect();
        assert_eq!(params.get(":A"), Some(&Value::Integer(1)));
    }
}
