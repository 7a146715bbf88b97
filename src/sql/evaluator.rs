/// Expression evaluator - evaluates expressions against a row scope
///
/// Every typing decision (text collation, implicit numeric conversion,
/// integer division, division by zero) is taken from the active `Dialect`.
use super::ast::{is_aggregate_name, BinaryOperator, Expr, OrderByExpr, Query, UnaryOperator};
use super::params::Params;
use super::pattern::CompiledPattern;
use super::printer::ExprPrinter;
use crate::dialect::{Dialect, TemporalFunction, TemporalKind, TextComparison};
use crate::error::Result;
use crate::types::{parse_temporal, ColumnType, TypeCategory, Value};
use ahash::AHashMap;
use chrono::{Local, NaiveDateTime};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::cell::RefCell;
use std::cmp::Ordering;

/// Qualifier under which an upsert's attempted row is visible
/// (`EXCLUDED.col`, MySQL `VALUES(col)`)
pub const EXCLUDED: &str = "excluded";

const PATTERN_CACHE_LIMIT: usize = 1000;

/// A column visible to expressions
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnRef {
    /// Table name or alias that qualifies the column
    pub qualifier: Option<String>,
    pub name: String,
}

impl ColumnRef {
    pub fn new(qualifier: Option<&str>, name: &str) -> Self {
        Self {
            qualifier: qualifier.map(str::to_string),
            name: name.to_string(),
        }
    }

    pub fn matches(&self, table: Option<&str>, name: &str) -> bool {
        if !self.name.eq_ignore_ascii_case(name) {
            return false;
        }
        match table {
            None => true,
            Some(t) => self
                .qualifier
                .as_deref()
                .map(|q| q.eq_ignore_ascii_case(t))
                .unwrap_or(false),
        }
    }
}

/// Values visible while evaluating one row.
///
/// `computed` holds aggregate and window results keyed by the printed
/// expression; `outer` links the enclosing query for correlated subqueries.
#[derive(Clone, Copy)]
pub struct Scope<'a> {
    pub columns: &'a [ColumnRef],
    pub values: &'a [Value],
    pub computed: Option<&'a AHashMap<String, Value>>,
    pub outer: Option<&'a Scope<'a>>,
}

impl<'a> Scope<'a> {
    pub fn new(columns: &'a [ColumnRef], values: &'a [Value]) -> Self {
        Self {
            columns,
            values,
            computed: None,
            outer: None,
        }
    }

    pub fn empty() -> Scope<'static> {
        Scope {
            columns: &[],
            values: &[],
            computed: None,
            outer: None,
        }
    }

    pub fn with_computed(mut self, computed: &'a AHashMap<String, Value>) -> Self {
        self.computed = Some(computed);
        self
    }

    pub fn with_outer(mut self, outer: Option<&'a Scope<'a>>) -> Self {
        self.outer = outer;
        self
    }

    /// Resolve a column here, then in enclosing scopes.
    ///
    /// An unqualified name matching several columns resolves to the first.
    pub fn lookup(&self, table: Option<&str>, name: &str) -> Option<&'a Value> {
        let here = self
            .columns
            .iter()
            .position(|c| c.matches(table, name))
            .and_then(|i| self.values.get(i));
        here.or_else(|| self.outer.and_then(|o| o.lookup(table, name)))
    }

    fn computed(&self, key: &str) -> Option<&'a Value> {
        self.computed
            .and_then(|m| m.get(key))
            .or_else(|| self.outer.and_then(|o| o.computed(key)))
    }
}

/// Runs nested queries on behalf of the evaluator
pub trait SubqueryRunner {
    /// Execute `query` with `outer` visible for correlated references
    fn run_subquery(&self, query: &Query, outer: &Scope<'_>) -> Result<Vec<Vec<Value>>>;
}

/// Key under which aggregate and window results are stored in a scope
pub fn expr_key(expr: &Expr) -> String {
    ExprPrinter::new().print(expr)
}

pub struct ExprEvaluator<'a> {
    dialect: &'a Dialect,
    params: &'a Params,
    runner: Option<&'a dyn SubqueryRunner>,
    /// Statement timestamp shared by every temporal function call
    now: NaiveDateTime,
    patterns: RefCell<AHashMap<String, CompiledPattern>>,
}

impl<'a> ExprEvaluator<'a> {
    pub fn new(dialect: &'a Dialect, params: &'a Params) -> Self {
        Self {
            dialect,
            params,
            runner: None,
            now: Local::now().naive_local(),
            patterns: RefCell::new(AHashMap::new()),
        }
    }

    pub fn with_runner(mut self, runner: &'a dyn SubqueryRunner) -> Self {
        self.runner = Some(runner);
        self
    }

    /// Pin the statement timestamp returned by NOW()/CURRENT_DATE
    pub fn with_now(mut self, now: NaiveDateTime) -> Self {
        self.now = now;
        self
    }

    pub fn dialect(&self) -> &'a Dialect {
        self.dialect
    }

    /// Evaluate an expression against a row
    pub fn eval(&self, expr: &Expr, scope: &Scope<'_>) -> Result<Value> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Column { table, name } => scope
                .lookup(table.as_deref(), name)
                .cloned()
                .ok_or_else(|| self.dialect.unknown_column(&qualified(table.as_deref(), name))),
            Expr::Parameter(param) => self.params.resolve(param, self.dialect),
            Expr::BinaryOp { left, op, right } => self.eval_binary(left, *op, right, scope),
            Expr::UnaryOp { op, expr } => {
                let value = self.eval(expr, scope)?;
                self.eval_unary(*op, value)
            }
            Expr::Function { name, args, .. } => {
                if is_aggregate_name(name) {
                    return self.computed(expr, scope);
                }
                self.eval_function(name, args, scope)
            }
            Expr::NiladicFunction(name) => match self.dialect.temporal_function(name) {
                Some(function) => Ok(self.temporal_value(function)),
                None => Err(self
                    .dialect
                    .not_supported(&format!("function {}", name))),
            },
            Expr::Window(_) => self.computed(expr, scope),
            Expr::InList {
                expr,
                list,
                negated,
            } => self.eval_in_list(expr, list, *negated, scope),
            Expr::InSubquery {
                expr,
                query,
                negated,
            } => self.eval_in_subquery(expr, query, *negated, scope),
            Expr::Tuple(_) => Err(self
                .dialect
                .syntax_error("row value (a, b, ...) is only supported before IN")),
            Expr::Between {
                expr,
                low,
                high,
                negated,
            } => {
                let value = self.eval(expr, scope)?;
                let low = self.eval(low, scope)?;
                let high = self.eval(high, scope)?;
                let above = self.compare(&value, &low)?.map(|o| o != Ordering::Less);
                let below = self.compare(&value, &high)?.map(|o| o != Ordering::Greater);
                let inside = match (above, below) {
                    (Some(false), _) | (_, Some(false)) => Some(false),
                    (Some(true), Some(true)) => Some(true),
                    _ => None,
                };
                Ok(negate(inside, *negated))
            }
            Expr::Like {
                expr,
                pattern,
                negated,
            } => {
                let value = self.eval(expr, scope)?;
                let pattern = self.eval(pattern, scope)?;
                if value.is_null() || pattern.is_null() {
                    return Ok(Value::Null);
                }
                let matched = self.like(&text_of(&value), &text_of(&pattern));
                Ok(Value::Bool(matched != *negated))
            }
            Expr::IsNull { expr, negated } => {
                let value = self.eval(expr, scope)?;
                Ok(Value::Bool(value.is_null() != *negated))
            }
            Expr::Exists { query, negated } => {
                let rows = self.runner()?.run_subquery(query, scope)?;
                Ok(Value::Bool(rows.is_empty() == *negated))
            }
            Expr::Subquery(query) => {
                let rows = self.runner()?.run_subquery(query, scope)?;
                match rows.len() {
                    0 => Ok(Value::Null),
                    1 => Ok(rows.into_iter().next().and_then(|r| r.into_iter().next()).unwrap_or(Value::Null)),
                    _ => Err(self
                        .dialect
                        .type_mismatch("scalar subquery returned more than one row")),
                }
            }
            Expr::Case {
                operand,
                branches,
                else_result,
            } => {
                let subject = match operand {
                    Some(op) => Some(self.eval(op, scope)?),
                    None => None,
                };
                for (when, then) in branches {
                    let hit = match &subject {
                        Some(subject) => {
                            let candidate = self.eval(when, scope)?;
                            self.compare(subject, &candidate)? == Some(Ordering::Equal)
                        }
                        None => self.eval_predicate(when, scope)?,
                    };
                    if hit {
                        return self.eval(then, scope);
                    }
                }
                match else_result {
                    Some(e) => self.eval(e, scope),
                    None => Ok(Value::Null),
                }
            }
            Expr::Cast { expr, type_name } => {
                let value = self.eval(expr, scope)?;
                self.cast(value, type_name)
            }
            Expr::InsertValue(name) => scope
                .lookup(Some(EXCLUDED), name)
                .cloned()
                .ok_or_else(|| self.dialect.unknown_column(name)),
        }
    }

    /// WHERE/HAVING/ON semantics: NULL counts as false
    pub fn eval_predicate(&self, expr: &Expr, scope: &Scope<'_>) -> Result<bool> {
        Ok(self.eval(expr, scope)?.truthy() == Some(true))
    }

    pub fn eval_constant(&self, expr: &Expr) -> Result<Value> {
        self.eval(expr, &Scope::empty())
    }

    fn runner(&self) -> Result<&'a dyn SubqueryRunner> {
        self.runner
            .ok_or_else(|| self.dialect.not_supported("subqueries in this context"))
    }

    fn computed(&self, expr: &Expr, scope: &Scope<'_>) -> Result<Value> {
        let key = expr_key(expr);
        scope.computed(&key).cloned().ok_or_else(|| {
            self.dialect
                .syntax_error(&format!("invalid use of aggregate or window function {}", key))
        })
    }

    // ----- operators -----

    fn eval_binary(&self, left: &Expr, op: BinaryOperator, right: &Expr, scope: &Scope<'_>) -> Result<Value> {
        match op {
            BinaryOperator::And => {
                let l = self.eval(left, scope)?.truthy();
                if l == Some(false) {
                    return Ok(Value::Bool(false));
                }
                let r = self.eval(right, scope)?.truthy();
                Ok(match (l, r) {
                    (_, Some(false)) => Value::Bool(false),
                    (Some(true), Some(true)) => Value::Bool(true),
                    _ => Value::Null,
                })
            }
            BinaryOperator::Or => {
                let l = self.eval(left, scope)?.truthy();
                if l == Some(true) {
                    return Ok(Value::Bool(true));
                }
                let r = self.eval(right, scope)?.truthy();
                Ok(match (l, r) {
                    (_, Some(true)) => Value::Bool(true),
                    (Some(false), Some(false)) => Value::Bool(false),
                    _ => Value::Null,
                })
            }
            _ => {
                let l = self.eval(left, scope)?;
                let r = self.eval(right, scope)?;
                self.apply_binary(op, l, r)
            }
        }
    }

    /// Apply a non-logical binary operator to evaluated operands
    pub fn apply_binary(&self, op: BinaryOperator, left: Value, right: Value) -> Result<Value> {
        if op.is_comparison() {
            let ordering = self.compare(&left, &right)?;
            return Ok(match ordering {
                None => Value::Null,
                Some(ord) => Value::Bool(match op {
                    BinaryOperator::Eq => ord == Ordering::Equal,
                    BinaryOperator::Ne => ord != Ordering::Equal,
                    BinaryOperator::Lt => ord == Ordering::Less,
                    BinaryOperator::Gt => ord == Ordering::Greater,
                    BinaryOperator::Le => ord != Ordering::Greater,
                    _ => ord != Ordering::Less,
                }),
            });
        }
        if left.is_null() || right.is_null() {
            return Ok(Value::Null);
        }
        match op {
            BinaryOperator::Concat => Ok(Value::Text(format!("{}{}", text_of(&left), text_of(&right)))),
            BinaryOperator::Add
                if self.dialect.plus_concatenates_strings()
                    && matches!(left, Value::Text(_))
                    && matches!(right, Value::Text(_)) =>
            {
                Ok(Value::Text(format!("{}{}", text_of(&left), text_of(&right))))
            }
            BinaryOperator::And | BinaryOperator::Or => {
                let (l, r) = (left.truthy(), right.truthy());
                let result = if op == BinaryOperator::And {
                    l.zip(r).map(|(a, b)| a && b)
                } else {
                    l.zip(r).map(|(a, b)| a || b)
                };
                Ok(result.map(Value::Bool).unwrap_or(Value::Null))
            }
            _ => {
                let l = self.numeric_operand(left)?;
                let r = self.numeric_operand(right)?;
                self.arithmetic(op, l, r)
            }
        }
    }

    fn eval_unary(&self, op: UnaryOperator, value: Value) -> Result<Value> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        match op {
            UnaryOperator::Not => Ok(value
                .truthy()
                .map(|b| Value::Bool(!b))
                .unwrap_or(Value::Null)),
            UnaryOperator::Plus => self.numeric_operand(value),
            UnaryOperator::Minus => match self.numeric_operand(value)? {
                Value::Integer(i) => Ok(i
                    .checked_neg()
                    .map(Value::Integer)
                    .unwrap_or_else(|| Value::Decimal(-Decimal::from(i)))),
                Value::Float(f) => Ok(Value::Float(-f)),
                Value::Decimal(d) => Ok(Value::Decimal(-d)),
                other => Ok(other),
            },
        }
    }

    /// Convert an arithmetic operand to a number
    fn numeric_operand(&self, value: Value) -> Result<Value> {
        match value {
            Value::Integer(_) | Value::Float(_) | Value::Decimal(_) | Value::Null => Ok(value),
            Value::Bool(b) => Ok(Value::Integer(b as i64)),
            Value::Text(ref s) => match parse_number(s) {
                Some(n) => Ok(n),
                None if self.dialect.supports_implicit_numeric_string_comparison() => {
                    Ok(Value::Integer(0))
                }
                None => Err(self
                    .dialect
                    .type_mismatch(&format!("invalid input syntax for type numeric: \"{}\"", s))),
            },
            other => Err(self.dialect.type_mismatch(&format!(
                "operator does not accept {} operand '{}'",
                other.type_name(),
                other
            ))),
        }
    }

    fn division_by_zero(&self) -> Result<Value> {
        if self.dialect.division_by_zero_is_null() {
            Ok(Value::Null)
        } else {
            Err(self.dialect.division_by_zero())
        }
    }

    fn arithmetic(&self, op: BinaryOperator, left: Value, right: Value) -> Result<Value> {
        match (&left, &right) {
            (Value::Integer(a), Value::Integer(b)) => {
                let (a, b) = (*a, *b);
                let result = match op {
                    BinaryOperator::Add => a.checked_add(b),
                    BinaryOperator::Sub => a.checked_sub(b),
                    BinaryOperator::Mul => a.checked_mul(b),
                    BinaryOperator::Div => {
                        if b == 0 {
                            return self.division_by_zero();
                        }
                        if !self.dialect.integer_division_truncates() {
                            return self.decimal_arithmetic(op, Decimal::from(a), Decimal::from(b));
                        }
                        a.checked_div(b)
                    }
                    BinaryOperator::Mod => {
                        if b == 0 {
                            return self.division_by_zero();
                        }
                        a.checked_rem(b)
                    }
                    _ => None,
                };
                match result {
                    Some(v) => Ok(Value::Integer(v)),
                    None => self.decimal_arithmetic(op, Decimal::from(a), Decimal::from(b)),
                }
            }
            (Value::Float(_), _) | (_, Value::Float(_)) => {
                let a = left.as_f64().unwrap_or(0.0);
                let b = right.as_f64().unwrap_or(0.0);
                match op {
                    BinaryOperator::Add => Ok(Value::Float(a + b)),
                    BinaryOperator::Sub => Ok(Value::Float(a - b)),
                    BinaryOperator::Mul => Ok(Value::Float(a * b)),
                    BinaryOperator::Div if b == 0.0 => self.division_by_zero(),
                    BinaryOperator::Div => Ok(Value::Float(a / b)),
                    BinaryOperator::Mod if b == 0.0 => self.division_by_zero(),
                    BinaryOperator::Mod => Ok(Value::Float(a % b)),
                    _ => Err(self.dialect.type_mismatch(&format!("invalid operator {}", op.symbol()))),
                }
            }
            _ => {
                let a = left.as_decimal().unwrap_or_default();
                let b = right.as_decimal().unwrap_or_default();
                self.decimal_arithmetic(op, a, b)
            }
        }
    }

    fn decimal_arithmetic(&self, op: BinaryOperator, a: Decimal, b: Decimal) -> Result<Value> {
        let result = match op {
            BinaryOperator::Add => a.checked_add(b),
            BinaryOperator::Sub => a.checked_sub(b),
            BinaryOperator::Mul => a.checked_mul(b),
            BinaryOperator::Div => {
                if b.is_zero() {
                    return self.division_by_zero();
                }
                a.checked_div(b)
            }
            BinaryOperator::Mod => {
                if b.is_zero() {
                    return self.division_by_zero();
                }
                a.checked_rem(b)
            }
            _ => None,
        };
        match result {
            Some(d) => Ok(Value::Decimal(d)),
            None => {
                // beyond decimal range: fall back to floating point
                let (x, y) = (a.to_f64().unwrap_or(0.0), b.to_f64().unwrap_or(0.0));
                self.arithmetic(op, Value::Float(x), Value::Float(y))
            }
        }
    }

    // ----- comparison -----

    /// SQL comparison; `None` when either side is NULL
    pub fn compare(&self, a: &Value, b: &Value) -> Result<Option<Ordering>> {
        use TypeCategory as C;
        match (a.category(), b.category()) {
            (C::Null, _) | (_, C::Null) => Ok(None),
            (C::Text, C::Text) => Ok(Some(self.compare_text(&text_of(a), &text_of(b)))),
            (C::Numeric | C::Boolean, C::Numeric | C::Boolean) => Ok(compare_numbers(a, b)),
            (C::Temporal, C::Temporal) => Ok(Some(as_datetime(a).cmp(&as_datetime(b)))),
            (C::Temporal, C::Text) => Ok(Some(self.compare_temporal_text(a, b))),
            (C::Text, C::Temporal) => Ok(Some(self.compare_temporal_text(b, a).reverse())),
            (C::Numeric | C::Boolean, C::Text) => self.compare_number_text(a, b),
            (C::Text, C::Numeric | C::Boolean) => {
                Ok(self.compare_number_text(b, a)?.map(Ordering::reverse))
            }
            (C::List, C::List) => {
                let (Value::List(x), Value::List(y)) = (a, b) else {
                    return Ok(None);
                };
                self.compare_tuples(x, y)
            }
            _ => Err(self.dialect.type_mismatch(&format!(
                "cannot compare {} with {}",
                a.type_name(),
                b.type_name()
            ))),
        }
    }

    fn compare_text(&self, a: &str, b: &str) -> Ordering {
        match self.dialect.text_comparison() {
            TextComparison::Ordinal => a.cmp(b),
            TextComparison::CaseInsensitive => a.to_lowercase().cmp(&b.to_lowercase()),
        }
    }

    fn compare_temporal_text(&self, temporal: &Value, text: &Value) -> Ordering {
        match parse_temporal(&text_of(text)) {
            Some(parsed) => as_datetime(temporal).cmp(&as_datetime(&parsed)),
            None => self.compare_text(&temporal.to_string(), &text_of(text)),
        }
    }

    fn compare_number_text(&self, number: &Value, text: &Value) -> Result<Option<Ordering>> {
        let raw = text_of(text);
        match parse_number(&raw) {
            Some(parsed) => Ok(compare_numbers(number, &parsed)),
            None if self.dialect.supports_implicit_numeric_string_comparison() => {
                Ok(Some(self.compare_text(&number.to_string(), &raw)))
            }
            None => Err(self.dialect.type_mismatch(&format!(
                "invalid input syntax for type {}: \"{}\"",
                number.type_name(),
                raw
            ))),
        }
    }

    fn compare_tuples(&self, a: &[Value], b: &[Value]) -> Result<Option<Ordering>> {
        let mut unknown = false;
        for (x, y) in a.iter().zip(b) {
            match self.compare(x, y)? {
                Some(Ordering::Equal) => {}
                Some(other) => return Ok(Some(other)),
                None => unknown = true,
            }
        }
        Ok(if unknown { None } else { Some(a.len().cmp(&b.len())) })
    }

    /// Total order used by ORDER BY, GROUP BY and DISTINCT; NULL sorts lowest
    pub fn sort_order(&self, a: &Value, b: &Value) -> Ordering {
        match (a.is_null(), b.is_null()) {
            (true, true) => return Ordering::Equal,
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            _ => {}
        }
        match self.compare(a, b) {
            Ok(Some(ord)) => ord,
            _ => category_rank(a)
                .cmp(&category_rank(b))
                .then_with(|| a.to_string().cmp(&b.to_string())),
        }
    }

    /// Compare two ORDER BY key tuples, honouring direction and NULL placement
    pub fn compare_sort_keys(&self, a: &[Value], b: &[Value], order_by: &[OrderByExpr]) -> Ordering {
        for ((x, y), item) in a.iter().zip(b).zip(order_by) {
            let nulls_first = item
                .nulls_first
                .unwrap_or(self.dialect.nulls_sort_first() == item.asc);
            let ord = match (x.is_null(), y.is_null()) {
                (true, true) => Ordering::Equal,
                (true, false) if nulls_first => Ordering::Less,
                (true, false) => Ordering::Greater,
                (false, true) if nulls_first => Ordering::Greater,
                (false, true) => Ordering::Less,
                _ if item.asc => self.sort_order(x, y),
                _ => self.sort_order(y, x),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }

    /// Fold text case for grouping/distinct keys under this dialect
    pub fn fold_case(&self) -> bool {
        self.dialect.text_comparison() == TextComparison::CaseInsensitive
    }

    // ----- predicates -----

    fn like(&self, text: &str, pattern: &str) -> bool {
        let fold = self.dialect.like_is_case_insensitive();
        let mut cache = self.patterns.borrow_mut();
        if !cache.contains_key(pattern) && cache.len() >= PATTERN_CACHE_LIMIT {
            cache.clear();
        }
        let compiled = cache
            .entry(pattern.to_string())
            .or_insert_with(|| CompiledPattern::compile(pattern, fold));
        if fold {
            compiled.matches(&text.to_lowercase())
        } else {
            compiled.matches(text)
        }
    }

    fn eval_in_list(&self, expr: &Expr, list: &[Expr], negated: bool, scope: &Scope<'_>) -> Result<Value> {
        if let Expr::Tuple(items) = expr {
            let left = self.eval_all(items, scope)?;
            let mut unknown = false;
            for item in list {
                let right = match item {
                    Expr::Tuple(values) => self.eval_all(values, scope)?,
                    other => match self.eval(other, scope)? {
                        Value::List(values) => values,
                        v => vec![v],
                    },
                };
                if right.len() != left.len() {
                    return Err(self.dialect.syntax_error(&format!(
                        "row value IN list items must each have {} values",
                        left.len()
                    )));
                }
                match self.compare_tuples(&left, &right)? {
                    Some(Ordering::Equal) => return Ok(Value::Bool(!negated)),
                    None => unknown = true,
                    _ => {}
                }
            }
            return Ok(in_result(unknown, negated));
        }

        let value = self.eval(expr, scope)?;
        let mut candidates = Vec::with_capacity(list.len());
        for item in list {
            match self.eval(item, scope)? {
                Value::List(values) => candidates.extend(values),
                v => candidates.push(v),
            }
        }
        if candidates.is_empty() {
            return Ok(Value::Bool(negated));
        }
        if value.is_null() {
            return Ok(Value::Null);
        }
        let mut unknown = false;
        for candidate in &candidates {
            match self.compare(&value, candidate)? {
                Some(Ordering::Equal) => return Ok(Value::Bool(!negated)),
                None => unknown = true,
                _ => {}
            }
        }
        Ok(in_result(unknown, negated))
    }

    fn eval_in_subquery(&self, expr: &Expr, query: &Query, negated: bool, scope: &Scope<'_>) -> Result<Value> {
        let left = match expr {
            Expr::Tuple(items) => self.eval_all(items, scope)?,
            other => vec![self.eval(other, scope)?],
        };
        let rows = self.runner()?.run_subquery(query, scope)?;
        if rows.is_empty() {
            return Ok(Value::Bool(negated));
        }
        let mut unknown = false;
        for row in &rows {
            if row.len() != left.len() {
                return Err(self.dialect.syntax_error(&format!(
                    "subquery has {} columns but IN expects {}",
                    row.len(),
                    left.len()
                )));
            }
            match self.compare_tuples(&left, row)? {
                Some(Ordering::Equal) => return Ok(Value::Bool(!negated)),
                None => unknown = true,
                _ => {}
            }
        }
        Ok(in_result(unknown, negated))
    }

    fn eval_all(&self, exprs: &[Expr], scope: &Scope<'_>) -> Result<Vec<Value>> {
        exprs.iter().map(|e| self.eval(e, scope)).collect()
    }

    // ----- conversion -----

    /// CAST(value AS type_name)
    pub fn cast(&self, value: Value, type_name: &str) -> Result<Value> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        let base = type_name
            .split(['(', ' '])
            .next()
            .unwrap_or(type_name)
            .trim();
        let target = if self.dialect.is_integer_cast_type_name(base) {
            Some(ColumnType::Integer)
        } else {
            ColumnType::from_sql_name(type_name)
        };
        let Some(target) = target else {
            return Err(self.dialect.not_supported(&format!("CAST to {}", type_name)));
        };
        let fail = |value: &Value| {
            self.dialect
                .type_mismatch(&format!("cannot cast '{}' to {}", value, type_name))
        };
        match target {
            ColumnType::Integer => {
                let number = self.numeric_operand(value.clone()).map_err(|_| fail(&value))?;
                match number {
                    Value::Integer(i) => Ok(Value::Integer(i)),
                    Value::Float(f) => f
                        .round()
                        .to_i64()
                        .map(Value::Integer)
                        .ok_or_else(|| fail(&value)),
                    Value::Decimal(d) => d
                        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
                        .to_i64()
                        .map(Value::Integer)
                        .ok_or_else(|| fail(&value)),
                    _ => Err(fail(&value)),
                }
            }
            ColumnType::Float => value
                .as_f64()
                .map(Value::Float)
                .ok_or_else(|| fail(&value)),
            ColumnType::Decimal => {
                let mut d = value.as_decimal().ok_or_else(|| fail(&value))?;
                if let Some(scale) = type_scale(type_name) {
                    d = d.round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero);
                    d.rescale(scale);
                }
                Ok(Value::Decimal(d))
            }
            ColumnType::Boolean => value
                .truthy()
                .map(Value::Bool)
                .ok_or_else(|| fail(&value)),
            ColumnType::Date => match &value {
                Value::Date(_) => Ok(value),
                Value::DateTime(dt) => Ok(Value::Date(dt.date())),
                Value::Text(s) => match parse_temporal(s) {
                    Some(Value::DateTime(dt)) => Ok(Value::Date(dt.date())),
                    Some(v) => Ok(v),
                    None => Err(fail(&value)),
                },
                _ => Err(fail(&value)),
            },
            ColumnType::DateTime => match &value {
                Value::DateTime(_) => Ok(value),
                Value::Date(_) => Ok(Value::DateTime(as_datetime(&value))),
                Value::Text(s) => parse_temporal(s)
                    .map(|v| Value::DateTime(as_datetime(&v)))
                    .ok_or_else(|| fail(&value)),
                _ => Err(fail(&value)),
            },
            ColumnType::Text | ColumnType::Enum | ColumnType::Set => Ok(Value::Text(text_of(&value))),
        }
    }

    // ----- functions -----

    fn eval_function(&self, name: &str, args: &[Expr], scope: &Scope<'_>) -> Result<Value> {
        let upper = name.to_ascii_uppercase();
        match upper.as_str() {
            "COALESCE" | "IFNULL" | "NVL" => {
                for arg in args {
                    let value = self.eval(arg, scope)?;
                    if !value.is_null() {
                        return Ok(value);
                    }
                }
                return Ok(Value::Null);
            }
            "ISNULL" if args.len() == 2 => {
                let value = self.eval(&args[0], scope)?;
                if value.is_null() {
                    return self.eval(&args[1], scope);
                }
                return Ok(value);
            }
            "IIF" | "IF" => {
                self.expect_args(&upper, args.len(), 3, 3)?;
                let branch = if self.eval_predicate(&args[0], scope)? { 1 } else { 2 };
                return self.eval(&args[branch], scope);
            }
            _ => {}
        }
        let values = self.eval_all(args, scope)?;
        self.call_scalar(&upper, values)
    }

    fn expect_args(&self, name: &str, got: usize, min: usize, max: usize) -> Result<()> {
        if got < min || got > max {
            let expected = if min == max {
                min.to_string()
            } else {
                format!("{} to {}", min, max)
            };
            return Err(self.dialect.syntax_error(&format!(
                "{}() expects {} argument(s) but got {}",
                name, expected, got
            )));
        }
        Ok(())
    }

    /// Call a scalar built-in with evaluated arguments
    pub fn call_scalar(&self, name: &str, args: Vec<Value>) -> Result<Value> {
        if let Some(function) = self.dialect.temporal_function(name) {
            self.expect_args(name, args.len(), 0, 0)?;
            return Ok(self.temporal_value(function));
        }
        let arity = |min, max| self.expect_args(name, args.len(), min, max);
        match name {
            "RAND" | "RANDOM" => {
                arity(0, 1)?;
                return Ok(Value::Float(rand::random::<f64>()));
            }
            "CONCAT" => {
                let text: String = args
                    .iter()
                    .filter(|v| !v.is_null())
                    .map(text_of)
                    .collect();
                return Ok(Value::Text(text));
            }
            "ISNULL" => {
                arity(1, 1)?;
                return Ok(Value::Integer(args[0].is_null() as i64));
            }
            "NULLIF" => {
                arity(2, 2)?;
                let equal = self.compare(&args[0], &args[1])? == Some(Ordering::Equal);
                return Ok(if equal { Value::Null } else { args[0].clone() });
            }
            _ => {}
        }
        if args.iter().any(Value::is_null) {
            // remaining built-ins are NULL-strict
            if !known_scalar(name) {
                return Err(self.dialect.not_supported(&format!("function {}()", name)));
            }
            return Ok(Value::Null);
        }
        match name {
            "UPPER" | "UCASE" => {
                arity(1, 1)?;
                Ok(Value::Text(text_of(&args[0]).to_uppercase()))
            }
            "LOWER" | "LCASE" => {
                arity(1, 1)?;
                Ok(Value::Text(text_of(&args[0]).to_lowercase()))
            }
            "LENGTH" | "LEN" | "CHAR_LENGTH" | "CHARACTER_LENGTH" => {
                arity(1, 1)?;
                Ok(Value::Integer(text_of(&args[0]).chars().count() as i64))
            }
            "TRIM" | "LTRIM" | "RTRIM" => {
                arity(1, 1)?;
                let text = text_of(&args[0]);
                Ok(Value::Text(match name {
                    "LTRIM" => text.trim_start().to_string(),
                    "RTRIM" => text.trim_end().to_string(),
                    _ => text.trim().to_string(),
                }))
            }
            "SUBSTRING" | "SUBSTR" | "MID" => {
                arity(2, 3)?;
                let chars: Vec<char> = text_of(&args[0]).chars().collect();
                let start = self.integer_arg(name, &args[1])?.max(1) as usize - 1;
                let len = match args.get(2) {
                    Some(v) => self.integer_arg(name, v)?.max(0) as usize,
                    None => chars.len(),
                };
                Ok(Value::Text(chars.iter().skip(start).take(len).collect()))
            }
            "LEFT" | "RIGHT" => {
                arity(2, 2)?;
                let chars: Vec<char> = text_of(&args[0]).chars().collect();
                let n = (self.integer_arg(name, &args[1])?.max(0) as usize).min(chars.len());
                let slice = if name == "LEFT" {
                    &chars[..n]
                } else {
                    &chars[chars.len() - n..]
                };
                Ok(Value::Text(slice.iter().collect()))
            }
            "REPLACE" => {
                arity(3, 3)?;
                let from = text_of(&args[1]);
                if from.is_empty() {
                    return Ok(Value::Text(text_of(&args[0])));
                }
                Ok(Value::Text(text_of(&args[0]).replace(&from, &text_of(&args[2]))))
            }
            "ABS" => {
                arity(1, 1)?;
                match self.numeric_operand(args[0].clone())? {
                    Value::Integer(i) => Ok(i
                        .checked_abs()
                        .map(Value::Integer)
                        .unwrap_or_else(|| Value::Decimal(Decimal::from(i).abs()))),
                    Value::Float(f) => Ok(Value::Float(f.abs())),
                    Value::Decimal(d) => Ok(Value::Decimal(d.abs())),
                    other => Ok(other),
                }
            }
            "ROUND" => {
                arity(1, 2)?;
                let places = match args.get(1) {
                    Some(v) => self.integer_arg(name, v)?,
                    None => 0,
                };
                round_value(self.numeric_operand(args[0].clone())?, places)
                    .ok_or_else(|| self.dialect.type_mismatch("ROUND() argument out of range"))
            }
            "FLOOR" | "CEIL" | "CEILING" => {
                arity(1, 1)?;
                let up = name != "FLOOR";
                Ok(match self.numeric_operand(args[0].clone())? {
                    Value::Float(f) => Value::Float(if up { f.ceil() } else { f.floor() }),
                    Value::Decimal(d) => {
                        let r = if up { d.ceil() } else { d.floor() };
                        r.to_i64().map(Value::Integer).unwrap_or(Value::Decimal(r))
                    }
                    other => other,
                })
            }
            "MOD" => {
                arity(2, 2)?;
                self.apply_binary(BinaryOperator::Mod, args[0].clone(), args[1].clone())
            }
            "POWER" | "POW" => {
                arity(2, 2)?;
                let base = self.float_arg(&args[0])?;
                let exp = self.float_arg(&args[1])?;
                Ok(Value::Float(base.powf(exp)))
            }
            "SQRT" => {
                arity(1, 1)?;
                let x = self.float_arg(&args[0])?;
                Ok(if x < 0.0 { Value::Null } else { Value::Float(x.sqrt()) })
            }
            _ => Err(self.dialect.not_supported(&format!("function {}()", name))),
        }
    }

    fn integer_arg(&self, name: &str, value: &Value) -> Result<i64> {
        value.as_i64().ok_or_else(|| {
            self.dialect
                .type_mismatch(&format!("{}() expects an integer argument, got '{}'", name, value))
        })
    }

    fn float_arg(&self, value: &Value) -> Result<f64> {
        self.numeric_operand(value.clone())?
            .as_f64()
            .ok_or_else(|| self.dialect.type_mismatch(&format!("'{}' is not a number", value)))
    }

    fn temporal_value(&self, function: &TemporalFunction) -> Value {
        match function.kind {
            TemporalKind::Date => Value::Date(self.now.date()),
            TemporalKind::DateTime => Value::DateTime(self.now),
        }
    }
}

const NULL_STRICT_SCALARS: &[&str] = &[
    "UPPER", "UCASE", "LOWER", "LCASE", "LENGTH", "LEN", "CHAR_LENGTH", "CHARACTER_LENGTH",
    "TRIM", "LTRIM", "RTRIM", "SUBSTRING", "SUBSTR", "MID", "LEFT", "RIGHT", "REPLACE", "ABS",
    "ROUND", "FLOOR", "CEIL", "CEILING", "MOD", "POWER", "POW", "SQRT",
];

fn known_scalar(name: &str) -> bool {
    NULL_STRICT_SCALARS.contains(&name)
}

fn qualified(table: Option<&str>, name: &str) -> String {
    match table {
        Some(t) => format!("{}.{}", t, name),
        None => name.to_string(),
    }
}

fn negate(result: Option<bool>, negated: bool) -> Value {
    result
        .map(|b| Value::Bool(b != negated))
        .unwrap_or(Value::Null)
}

fn in_result(unknown: bool, negated: bool) -> Value {
    if unknown {
        Value::Null
    } else {
        Value::Bool(negated)
    }
}

/// Text form used by string functions and LIKE
pub fn text_of(value: &Value) -> String {
    match value {
        Value::Text(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Parse a numeric literal held in text
fn parse_number(text: &str) -> Option<Value> {
    let text = text.trim();
    if let Ok(i) = text.parse::<i64>() {
        return Some(Value::Integer(i));
    }
    if let Ok(d) = text.parse::<Decimal>() {
        return Some(Value::Decimal(d));
    }
    Decimal::from_scientific(text)
        .ok()
        .map(Value::Decimal)
        .or_else(|| text.parse::<f64>().ok().filter(|f| f.is_finite()).map(Value::Float))
}

fn compare_numbers(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => Some(x.cmp(y)),
        (Value::Float(_), _) | (_, Value::Float(_)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        _ => Some(a.as_decimal()?.cmp(&b.as_decimal()?)),
    }
}

fn as_datetime(value: &Value) -> NaiveDateTime {
    match value {
        Value::DateTime(dt) => *dt,
        Value::Date(d) => d.and_hms_opt(0, 0, 0).unwrap_or_default(),
        _ => NaiveDateTime::default(),
    }
}

fn category_rank(value: &Value) -> u8 {
    match value.category() {
        TypeCategory::Null => 0,
        TypeCategory::Boolean => 1,
        TypeCategory::Numeric => 2,
        TypeCategory::Temporal => 3,
        TypeCategory::Text => 4,
        TypeCategory::List => 5,
    }
}

/// Scale argument of a type such as DECIMAL(10,2)
fn type_scale(type_name: &str) -> Option<u32> {
    let args = type_name.split_once('(')?.1.trim_end_matches(')');
    args.split(',').nth(1)?.trim().parse().ok()
}

fn round_value(value: Value, places: i64) -> Option<Value> {
    match value {
        Value::Integer(i) if places >= 0 => Some(Value::Integer(i)),
        Value::Integer(i) => {
            let factor = 10_i64.checked_pow(places.unsigned_abs() as u32)?;
            let rounded = Decimal::from(i) / Decimal::from(factor);
            let rounded = rounded.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
            (rounded * Decimal::from(factor)).to_i64().map(Value::Integer)
        }
        Value::Decimal(d) if places >= 0 => Some(Value::Decimal(
            d.round_dp_with_strategy(places as u32, RoundingStrategy::MidpointAwayFromZero),
        )),
        Value::Decimal(d) => {
            let factor = Decimal::from(10_i64.checked_pow(places.unsigned_abs() as u32)?);
            let rounded = (d / factor).round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
            Some(Value::Decimal(rounded * factor))
        }
        Value::Float(f) => {
            let factor = 10f64.powi(places as i32);
            Some(Value::Float((f * factor).round() / factor))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::DialectKind;
    use crate::error::SqlError;
    use crate::sql::parser::Parser;

    fn eval_in(kind: DialectKind, sql: &str) -> Result<Value> {
        let dialect = Dialect::latest(kind);
        let params = Params::new();
        let expr = Parser::new(sql, &dialect)?.parse_standalone_expr()?;
        ExprEvaluator::new(&dialect, &params).eval_constant(&expr)
    }

    fn eval(sql: &str) -> Value {
        eval_in(DialectKind::MySql, sql).unwrap()
    }

    #[test]
    fn test_precedence_and_arithmetic() {
        assert_eq!(eval("1 + 2 * 3"), Value::Integer(7));
        assert_eq!(eval("(1 + 2) * 3"), Value::Integer(9));
        assert_eq!(eval("-2 * 3"), Value::Integer(-6));
        assert_eq!(eval("10 % 4"), Value::Integer(2));
        assert_eq!(eval("1.5 + 1"), Value::Decimal(Decimal::new(25, 1)));
    }

    #[test]
    fn test_integer_division_per_dialect() {
        assert_eq!(
            eval_in(DialectKind::MySql, "7 / 2").unwrap(),
            Value::Decimal(Decimal::new(35, 1))
        );
        assert_eq!(eval_in(DialectKind::Postgres, "7 / 2").unwrap(), Value::Integer(3));
    }

    #[test]
    fn test_division_by_zero_per_dialect() {
        assert_eq!(eval_in(DialectKind::MySql, "1 / 0").unwrap(), Value::Null);
        let err = eval_in(DialectKind::SqlServer, "1 / 0").unwrap_err();
        assert!(matches!(err, SqlError::DivisionByZero { .. }));
    }

    #[test]
    fn test_three_valued_logic() {
        assert_eq!(eval("NULL = NULL"), Value::Null);
        assert_eq!(eval("NULL AND 1 = 0"), Value::Bool(false));
        assert_eq!(eval("NULL OR 1 = 1"), Value::Bool(true));
        assert_eq!(eval("NOT NULL"), Value::Null);
        assert_eq!(eval("NULL IS NULL"), Value::Bool(true));
        assert_eq!(eval("1 IS NOT NULL"), Value::Bool(true));
    }

    #[test]
    fn test_text_comparison_collation() {
        assert_eq!(eval_in(DialectKind::MySql, "'Bob' = 'BOB'").unwrap(), Value::Bool(true));
        assert_eq!(eval_in(DialectKind::Postgres, "'Bob' = 'BOB'").unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_numeric_text_comparison() {
        assert_eq!(eval_in(DialectKind::MySql, "1 = '1'").unwrap(), Value::Bool(true));
        assert_eq!(eval_in(DialectKind::Postgres, "5 = '5'").unwrap(), Value::Bool(true));
        let err = eval_in(DialectKind::Postgres, "5 = 'five'").unwrap_err();
        assert!(matches!(err, SqlError::TypeMismatch { .. }));
    }

    #[test]
    fn test_like_case_sensitivity() {
        assert_eq!(eval_in(DialectKind::MySql, "'John' LIKE 'j%'").unwrap(), Value::Bool(true));
        assert_eq!(eval_in(DialectKind::Postgres, "'John' LIKE 'j%'").unwrap(), Value::Bool(false));
        assert_eq!(eval("'abc' NOT LIKE '_b_'"), Value::Bool(false));
    }

    #[test]
    fn test_in_between_case() {
        assert_eq!(eval("2 IN (1, 2, 3)"), Value::Bool(true));
        assert_eq!(eval("4 NOT IN (1, 2, 3)"), Value::Bool(true));
        assert_eq!(eval("4 IN (1, NULL)"), Value::Null);
        assert_eq!(eval("(1, 'a') IN ((2, 'b'), (1, 'a'))"), Value::Bool(true));
        assert_eq!(eval("5 BETWEEN 1 AND 10"), Value::Bool(true));
        assert_eq!(eval("5 NOT BETWEEN 1 AND 4"), Value::Bool(true));
        assert_eq!(eval("CASE WHEN 1 > 2 THEN 'a' ELSE 'b' END"), Value::from("b"));
        assert_eq!(eval("CASE 2 WHEN 1 THEN 'one' WHEN 2 THEN 'two' END"), Value::from("two"));
    }

    #[test]
    fn test_in_list_parameter_expansion() {
        let dialect = Dialect::latest(DialectKind::SqlServer);
        let params = Params::new().bind("ids", Value::List(vec![Value::Integer(1), Value::Integer(5)]));
        let expr = Parser::new("5 IN @ids", &dialect)
            .unwrap()
            .parse_standalone_expr()
            .unwrap();
        let result = ExprEvaluator::new(&dialect, &params).eval_constant(&expr).unwrap();
        assert_eq!(result, Value::Bool(true));
    }

    #[test]
    fn test_cast_and_functions() {
        assert_eq!(eval("CAST('42' AS SIGNED)"), Value::Integer(42));
        assert_eq!(eval("CAST(2.345 AS DECIMAL(10,2))"), Value::Decimal(Decimal::new(235, 2)));
        assert_eq!(eval("CAST(12 AS CHAR)"), Value::from("12"));
        assert_eq!(eval("COALESCE(NULL, NULL, 'x')"), Value::from("x"));
        assert_eq!(eval("NULLIF(1, 1)"), Value::Null);
        assert_eq!(eval("UPPER('abc')"), Value::from("ABC"));
        assert_eq!(eval("LENGTH(NULL)"), Value::Null);
        assert_eq!(eval("SUBSTRING('hello', 2, 3)"), Value::from("ell"));
        assert_eq!(eval("ROUND(2.5)"), Value::Decimal(Decimal::new(3, 0)));
        assert_eq!(eval("ABS(-3)"), Value::Integer(3));
        assert_eq!(eval("CONCAT('a', NULL, 'b')"), Value::from("ab"));
        assert!(matches!(eval("RAND()"), Value::Float(f) if (0.0..1.0).contains(&f)));
    }

    #[test]
    fn test_sql_server_plus_concatenates() {
        assert_eq!(eval_in(DialectKind::SqlServer, "'a' + 'b'").unwrap(), Value::from("ab"));
        assert_eq!(eval_in(DialectKind::SqlServer, "'1' + 1").unwrap(), Value::Integer(2));
    }

    #[test]
    fn test_unknown_function_and_column() {
        let err = eval_in(DialectKind::MySql, "FROBNICATE(1)").unwrap_err();
        assert!(matches!(err, SqlError::NotSupported { .. }));
        let err = eval_in(DialectKind::MySql, "missing + 1").unwrap_err();
        assert_eq!(err.code(), 1054);
    }

    #[test]
    fn test_scope_lookup_and_outer() {
        let dialect = Dialect::latest(DialectKind::MySql);
        let params = Params::new();
        let evaluator = ExprEvaluator::new(&dialect, &params);
        let outer_cols = vec![ColumnRef::new(Some("o"), "id")];
        let outer_vals = vec![Value::Integer(9)];
        let outer = Scope::new(&outer_cols, &outer_vals);
        let cols = vec![ColumnRef::new(Some("u"), "name")];
        let vals = vec![Value::from("Bob")];
        let scope = Scope::new(&cols, &vals).with_outer(Some(&outer));

        assert_eq!(evaluator.eval(&Expr::column("name"), &scope).unwrap(), Value::from("Bob"));
        assert_eq!(evaluator.eval(&Expr::qualified("o", "id"), &scope).unwrap(), Value::Integer(9));
        assert!(evaluator.eval(&Expr::qualified("x", "id"), &scope).is_err());
    }

    #[test]
    fn test_sort_order_nulls_lowest() {
        let dialect = Dialect::latest(DialectKind::Postgres);
        let params = Params::new();
        let evaluator = ExprEvaluator::new(&dialect, &params);
        assert_eq!(evaluator.sort_order(&Value::Null, &Value::Integer(1)), Ordering::Less);
        assert_eq!(
            evaluator.sort_order(&Value::Integer(2), &Value::Decimal(Decimal::new(15, 1))),
            Ordering::Greater
        );
    }
}
