//! Window functions evaluated over a materialized row set

use super::aggregate::Accumulator;
use super::ast::{FrameBound, WindowExpr};
use super::evaluator::ExprEvaluator;
use crate::error::Result;
use crate::types::Value;
use ahash::AHashMap;
use std::cmp::Ordering;

/// Per-row inputs of one window call, pre-evaluated by the executor
#[derive(Debug, Clone, Default)]
pub(crate) struct WindowRow {
    pub partition: Vec<Value>,
    pub order: Vec<Value>,
    pub args: Vec<Value>,
}

/// Compute `window` for every row; the result is aligned with `rows`
pub(crate) fn evaluate_window(
    evaluator: &ExprEvaluator<'_>,
    window: &WindowExpr,
    rows: &[WindowRow],
) -> Result<Vec<Value>> {
    let name = window.name.to_ascii_uppercase();
    if !evaluator.dialect().supports_window_function(&name) {
        return Err(evaluator
            .dialect()
            .not_supported(&format!("window function {}()", name)));
    }

    let mut output = vec![Value::Null; rows.len()];
    for mut partition in partitions(evaluator, rows) {
        partition.sort_by(|&a, &b| {
            evaluator.compare_sort_keys(&rows[a].order, &rows[b].order, &window.order_by)
        });
        let peers = peer_ranges(evaluator, window, rows, &partition);
        for pos in 0..partition.len() {
            let frame = frame_range(window, pos, partition.len(), &peers);
            let value = compute(evaluator, &name, window, rows, &partition, pos, &peers, frame)?;
            output[partition[pos]] = value;
        }
    }
    Ok(output)
}

/// Row indexes grouped by partition key, in first-seen order
fn partitions(evaluator: &ExprEvaluator<'_>, rows: &[WindowRow]) -> Vec<Vec<usize>> {
    let fold = evaluator.fold_case();
    let mut lookup: AHashMap<String, usize> = AHashMap::new();
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for (i, row) in rows.iter().enumerate() {
        let key: String = row
            .partition
            .iter()
            .map(|v| v.key_string(fold))
            .collect::<Vec<_>>()
            .join("\u{1f}");
        let slot = *lookup.entry(key).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(i);
    }
    groups
}

/// For each sorted position, the half-open range of its ORDER BY peers
fn peer_ranges(
    evaluator: &ExprEvaluator<'_>,
    window: &WindowExpr,
    rows: &[WindowRow],
    partition: &[usize],
) -> Vec<(usize, usize)> {
    let n = partition.len();
    let mut ranges = vec![(0, n); n];
    if window.order_by.is_empty() {
        return ranges;
    }
    let mut start = 0;
    while start < n {
        let mut end = start + 1;
        while end < n
            && evaluator.compare_sort_keys(
                &rows[partition[start]].order,
                &rows[partition[end]].order,
                &window.order_by,
            ) == Ordering::Equal
        {
            end += 1;
        }
        for range in &mut ranges[start..end] {
            *range = (start, end);
        }
        start = end;
    }
    ranges
}

/// Half-open frame for the row at `pos`.
///
/// Without a ROWS clause the frame runs from the partition start through the
/// current row's last peer when ordered, and covers the whole partition when not.
fn frame_range(window: &WindowExpr, pos: usize, len: usize, peers: &[(usize, usize)]) -> (usize, usize) {
    let Some(frame) = window.frame else {
        return if window.order_by.is_empty() {
            (0, len)
        } else {
            (0, peers[pos].1)
        };
    };
    let bound = |b: FrameBound, is_end: bool| -> usize {
        let at = match b {
            FrameBound::UnboundedPreceding => 0,
            FrameBound::UnboundedFollowing => len as i128,
            other => pos as i128 + other.offset() + is_end as i128,
        };
        at.clamp(0, len as i128) as usize
    };
    let start = bound(frame.start, false);
    let end = bound(frame.end, true);
    (start, end.max(start))
}

#[allow(clippy::too_many_arguments)]
fn compute(
    evaluator: &ExprEvaluator<'_>,
    name: &str,
    window: &WindowExpr,
    rows: &[WindowRow],
    partition: &[usize],
    pos: usize,
    peers: &[(usize, usize)],
    frame: (usize, usize),
) -> Result<Value> {
    let n = partition.len();
    let current = &rows[partition[pos]];
    let arg = |i: usize| current.args.get(i).cloned().unwrap_or(Value::Null);
    let value_at = |p: usize| {
        rows[partition[p]]
            .args
            .first()
            .cloned()
            .unwrap_or(Value::Null)
    };

    let value = match name {
        "ROW_NUMBER" => Value::Integer(pos as i64 + 1),
        "RANK" => Value::Integer(peers[pos].0 as i64 + 1),
        "DENSE_RANK" => {
            let mut rank = 0;
            let mut p = 0;
            while p <= pos {
                rank += 1;
                p = peers[p].1;
            }
            Value::Integer(rank)
        }
        "PERCENT_RANK" => {
            if n <= 1 {
                Value::Float(0.0)
            } else {
                Value::Float(peers[pos].0 as f64 / (n - 1) as f64)
            }
        }
        "CUME_DIST" => Value::Float(peers[pos].1 as f64 / n as f64),
        "NTILE" => {
            let buckets = positive(evaluator, name, &arg(0))? as usize;
            let base = n / buckets;
            let extra = n % buckets;
            let tile = if pos < extra * (base + 1) {
                pos / (base + 1)
            } else {
                extra + (pos - extra * (base + 1)) / base.max(1)
            };
            Value::Integer(tile as i64 + 1)
        }
        "LAG" | "LEAD" => {
            let offset = match current.args.get(1) {
                Some(v) if !v.is_null() => offset_arg(evaluator, name, v)?,
                _ => 1,
            };
            let target = if name == "LAG" {
                pos.checked_sub(offset)
            } else {
                pos.checked_add(offset).filter(|&t| t < n)
            };
            match target {
                Some(t) => value_at(t),
                None => arg(2),
            }
        }
        "FIRST_VALUE" => {
            if frame.0 < frame.1 {
                value_at(frame.0)
            } else {
                Value::Null
            }
        }
        "LAST_VALUE" => {
            if frame.0 < frame.1 {
                value_at(frame.1 - 1)
            } else {
                Value::Null
            }
        }
        "NTH_VALUE" => {
            let nth = positive(evaluator, name, &arg(1))? as usize;
            let target = frame.0 + nth - 1;
            if target < frame.1 {
                value_at(target)
            } else {
                Value::Null
            }
        }
        _ => {
            let mut acc = Accumulator::for_call(name, &window.args, false, evaluator.fold_case())
                .ok_or_else(|| {
                    evaluator
                        .dialect()
                        .not_supported(&format!("window function {}()", name))
                })?;
            for p in frame.0..frame.1 {
                acc.add(value_at(p), evaluator)?;
            }
            acc.finish()
        }
    };
    Ok(value)
}

fn positive(evaluator: &ExprEvaluator<'_>, name: &str, value: &Value) -> Result<i64> {
    match value.as_i64() {
        Some(n) if n > 0 => Ok(n),
        _ => Err(evaluator.dialect().syntax_error(&format!(
            "{}() argument must be a positive integer, got '{}'",
            name, value
        ))),
    }
}

fn offset_arg(evaluator: &ExprEvaluator<'_>, name: &str, value: &Value) -> Result<usize> {
    match value.as_i64() {
        Some(n) if n >= 0 => Ok(n as usize),
        _ => Err(evaluator.dialect().syntax_error(&format!(
            "{}() offset must be a non-negative integer, got '{}'",
            name, value
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{Dialect, DialectKind};
    use crate::sql::ast::Expr;
    use crate::sql::params::Params;
    use crate::sql::parser::Parser;

    fn window_of(sql: &str, dialect: &Dialect) -> WindowExpr {
        match Parser::new(sql, dialect).unwrap().parse_standalone_expr().unwrap() {
            Expr::Window(w) => *w,
            other => panic!("not a window: {:?}", other),
        }
    }

    fn rows(data: &[(&str, i64)]) -> Vec<WindowRow> {
        data.iter()
            .map(|(g, v)| WindowRow {
                partition: vec![Value::from(*g)],
                order: vec![Value::Integer(*v)],
                args: vec![Value::Integer(*v)],
            })
            .collect()
    }

    fn run(sql: &str, data: &[(&str, i64)]) -> Vec<Value> {
        let dialect = Dialect::latest(DialectKind::Postgres);
        let params = Params::new();
        let evaluator = ExprEvaluator::new(&dialect, &params);
        let window = window_of(sql, &dialect);
        let mut input = rows(data);
        if window.partition_by.is_empty() {
            for row in &mut input {
                row.partition.clear();
            }
        }
        evaluate_window(&evaluator, &window, &input).unwrap()
    }

    fn ints(values: &[i64]) -> Vec<Value> {
        values.iter().map(|v| Value::Integer(*v)).collect()
    }

    #[test]
    fn test_ranking_with_ties() {
        let data = [("a", 10), ("a", 20), ("a", 20), ("a", 30)];
        assert_eq!(run("ROW_NUMBER() OVER (ORDER BY v)", &data), ints(&[1, 2, 3, 4]));
        assert_eq!(run("RANK() OVER (ORDER BY v)", &data), ints(&[1, 2, 2, 4]));
        assert_eq!(run("DENSE_RANK() OVER (ORDER BY v)", &data), ints(&[1, 2, 2, 3]));
    }

    #[test]
    fn test_partitioned_row_number_keeps_input_alignment() {
        let data = [("b", 2), ("a", 5), ("b", 1), ("a", 3)];
        assert_eq!(
            run("ROW_NUMBER() OVER (PARTITION BY g ORDER BY v)", &data),
            ints(&[2, 2, 1, 1])
        );
    }

    #[test]
    fn test_lag_lead_and_ntile() {
        let data = [("a", 1), ("a", 2), ("a", 3), ("a", 4), ("a", 5)];
        assert_eq!(
            run("LAG(v) OVER (ORDER BY v)", &data),
            vec![Value::Null, Value::Integer(1), Value::Integer(2), Value::Integer(3), Value::Integer(4)]
        );
        assert_eq!(
            run("LEAD(v) OVER (ORDER BY v)", &data),
            vec![Value::Integer(2), Value::Integer(3), Value::Integer(4), Value::Integer(5), Value::Null]
        );
        assert_eq!(run("NTILE(2) OVER (ORDER BY v)", &data), ints(&[1, 1, 1, 2, 2]));
    }

    #[test]
    fn test_running_and_framed_sums() {
        let data = [("a", 1), ("a", 2), ("a", 3), ("a", 4)];
        assert_eq!(run("SUM(v) OVER (ORDER BY v)", &data), ints(&[1, 3, 6, 10]));
        assert_eq!(run("SUM(v) OVER ()", &data), ints(&[10, 10, 10, 10]));
        assert_eq!(
            run("SUM(v) OVER (ORDER BY v ROWS BETWEEN 1 PRECEDING AND CURRENT ROW)", &data),
            ints(&[1, 3, 5, 7])
        );
        assert_eq!(run("COUNT(*) OVER ()", &data), ints(&[4, 4, 4, 4]));
    }

    #[test]
    fn test_value_functions() {
        let data = [("a", 1), ("a", 2), ("a", 3)];
        assert_eq!(run("FIRST_VALUE(v) OVER (ORDER BY v)", &data), ints(&[1, 1, 1]));
        assert_eq!(run("LAST_VALUE(v) OVER (ORDER BY v)", &data), ints(&[1, 2, 3]));
        assert_eq!(
            run("NTH_VALUE(v, 2) OVER (ORDER BY v ROWS BETWEEN UNBOUNDED PRECEDING AND UNBOUNDED FOLLOWING)", &data),
            ints(&[2, 2, 2])
        );
        assert_eq!(
            run("CUME_DIST() OVER (ORDER BY v)", &data)[1],
            Value::Float(2.0 / 3.0)
        );
    }
}
