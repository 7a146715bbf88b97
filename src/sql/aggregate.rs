//! Aggregate accumulators shared by GROUP BY and aggregate window functions

use super::ast::{BinaryOperator, Expr};
use super::evaluator::ExprEvaluator;
use crate::error::Result;
use crate::types::Value;
use ahash::AHashSet;
use rust_decimal::Decimal;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AggregateKind {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateKind {
    pub(crate) fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "COUNT" => Some(AggregateKind::Count),
            "SUM" => Some(AggregateKind::Sum),
            "AVG" => Some(AggregateKind::Avg),
            "MIN" => Some(AggregateKind::Min),
            "MAX" => Some(AggregateKind::Max),
            _ => None,
        }
    }
}

/// Running state of one aggregate call.
///
/// COUNT is always an integer. SUM, MIN and MAX keep the input's numeric
/// type; AVG over integers or decimals stays decimal.
#[derive(Debug, Clone)]
pub(crate) struct Accumulator {
    kind: AggregateKind,
    /// COUNT(*): every row counts, NULL or not
    count_rows: bool,
    distinct: Option<AHashSet<String>>,
    fold_case: bool,
    count: i64,
    sum: Option<Value>,
    best: Option<Value>,
}

impl Accumulator {
    pub(crate) fn new(kind: AggregateKind, count_rows: bool, distinct: bool, fold_case: bool) -> Self {
        Self {
            kind,
            count_rows,
            distinct: distinct.then(AHashSet::new),
            fold_case,
            count: 0,
            sum: None,
            best: None,
        }
    }

    /// Build the accumulator for an aggregate call expression
    pub(crate) fn for_call(name: &str, args: &[Expr], distinct: bool, fold_case: bool) -> Option<Self> {
        let kind = AggregateKind::from_name(name)?;
        Some(Self::new(kind, kind == AggregateKind::Count && args.is_empty(), distinct, fold_case))
    }

    pub(crate) fn add(&mut self, value: Value, evaluator: &ExprEvaluator<'_>) -> Result<()> {
        if self.count_rows {
            self.count += 1;
            return Ok(());
        }
        if value.is_null() {
            return Ok(());
        }
        if let Some(seen) = &mut self.distinct {
            if !seen.insert(value.key_string(self.fold_case)) {
                return Ok(());
            }
        }
        self.count += 1;
        match self.kind {
            AggregateKind::Count => {}
            AggregateKind::Sum | AggregateKind::Avg => {
                let value = numeric(value, evaluator)?;
                self.sum = Some(match self.sum.take() {
                    None => value,
                    Some(total) => evaluator.apply_binary(BinaryOperator::Add, total, value)?,
                });
            }
            AggregateKind::Min | AggregateKind::Max => {
                let wanted = if self.kind == AggregateKind::Min {
                    Ordering::Less
                } else {
                    Ordering::Greater
                };
                let replace = match &self.best {
                    None => true,
                    Some(current) => evaluator.sort_order(&value, current) == wanted,
                };
                if replace {
                    self.best = Some(value);
                }
            }
        }
        Ok(())
    }

    pub(crate) fn finish(&self) -> Value {
        match self.kind {
            AggregateKind::Count => Value::Integer(self.count),
            AggregateKind::Sum => self.sum.clone().unwrap_or(Value::Null),
            AggregateKind::Min | AggregateKind::Max => self.best.clone().unwrap_or(Value::Null),
            AggregateKind::Avg => match &self.sum {
                None => Value::Null,
                Some(Value::Float(f)) => Value::Float(f / self.count as f64),
                Some(total) => match total.as_decimal() {
                    Some(d) => d
                        .checked_div(Decimal::from(self.count))
                        .map(|avg| Value::Decimal(avg.normalize()))
                        .unwrap_or(Value::Null),
                    None => Value::Null,
                },
            },
        }
    }
}

/// Coerce an aggregate input to a number
fn numeric(value: Value, evaluator: &ExprEvaluator<'_>) -> Result<Value> {
    match value {
        Value::Integer(_) | Value::Float(_) | Value::Decimal(_) => Ok(value),
        Value::Bool(b) => Ok(Value::Integer(b as i64)),
        Value::Text(ref s) => {
            if let Some(i) = value.as_i64() {
                return Ok(Value::Integer(i));
            }
            value.as_decimal().map(Value::Decimal).ok_or_else(|| {
                evaluator
                    .dialect()
                    .type_mismatch(&format!("cannot aggregate non-numeric value '{}'", s))
            })
        }
        other => Err(evaluator
            .dialect()
            .type_mismatch(&format!("cannot aggregate {} value '{}'", other.type_name(), other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{Dialect, DialectKind};
    use crate::sql::params::Params;

    fn run(kind: AggregateKind, distinct: bool, values: Vec<Value>) -> Value {
        let dialect = Dialect::latest(DialectKind::Postgres);
        let params = Params::new();
        let evaluator = ExprEvaluator::new(&dialect, &params);
        let mut acc = Accumulator::new(kind, false, distinct, false);
        for v in values {
            acc.add(v, &evaluator).unwrap();
        }
        acc.finish()
    }

    #[test]
    fn test_sum_keeps_decimal_precision() {
        let values = vec![
            Value::Decimal(Decimal::new(1050, 2)),
            Value::Decimal(Decimal::new(225, 2)),
            Value::Null,
        ];
        assert_eq!(run(AggregateKind::Sum, false, values), Value::Decimal(Decimal::new(1275, 2)));
    }

    #[test]
    fn test_count_and_avg() {
        let values = vec![Value::Integer(1), Value::Integer(2), Value::Null, Value::Integer(2)];
        assert_eq!(run(AggregateKind::Count, false, values.clone()), Value::Integer(3));
        assert_eq!(run(AggregateKind::Count, true, values.clone()), Value::Integer(2));
        assert_eq!(
            run(AggregateKind::Avg, false, values),
            Value::Decimal(Decimal::new(5, 0) / Decimal::new(3, 0))
        );
        assert_eq!(run(AggregateKind::Avg, false, vec![Value::Null]), Value::Null);
    }

    #[test]
    fn test_min_max() {
        let values = vec![Value::from("pear"), Value::from("apple"), Value::Null];
        assert_eq!(run(AggregateKind::Min, false, values.clone()), Value::from("apple"));
        assert_eq!(run(AggregateKind::Max, false, values), Value::from("pear"));
        assert_eq!(run(AggregateKind::Max, false, vec![]), Value::Null);
    }
}
