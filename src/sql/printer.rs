/// Canonical SQL text for expressions and queries
///
/// Output re-parses to an equivalent tree, and printing that tree again
/// yields identical text. Parentheses are emitted only where precedence
/// requires them.
use super::ast::*;
use super::token::TokenType;
use crate::dialect::Dialect;

/// Binding strength of atoms (literals, columns, calls)
const ATOM_PRECEDENCE: u8 = 100;

pub struct ExprPrinter<'a> {
    /// Quoting and paging syntax; ANSI when absent
    dialect: Option<&'a Dialect>,
}

impl Default for ExprPrinter<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> ExprPrinter<'a> {
    /// ANSI output: double-quoted identifiers, LIMIT/OFFSET paging
    pub fn new() -> Self {
        Self { dialect: None }
    }

    pub fn for_dialect(dialect: &'a Dialect) -> Self {
        Self {
            dialect: Some(dialect),
        }
    }

    pub fn print(&self, expr: &Expr) -> String {
        let mut out = String::new();
        self.write_expr(&mut out, expr);
        out
    }

    pub fn print_query(&self, query: &Query) -> String {
        let mut out = String::new();
        self.write_query(&mut out, query);
        out
    }

    fn ident(&self, name: &str) -> String {
        let plain = name
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '#')
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '#');
        if plain && TokenType::from_keyword(name).is_none() {
            return name.to_string();
        }
        match self.dialect {
            Some(dialect) => dialect.quote_identifier(name),
            None => format!("\"{}\"", name.replace('"', "\"\"")),
        }
    }

    fn precedence(expr: &Expr) -> u8 {
        match expr {
            Expr::BinaryOp { op, .. } => op.precedence(),
            Expr::IsNull { .. }
            | Expr::InList { .. }
            | Expr::InSubquery { .. }
            | Expr::Between { .. }
            | Expr::Like { .. } => PREDICATE_PRECEDENCE,
            Expr::UnaryOp {
                op: UnaryOperator::Not,
                ..
            } => NOT_PRECEDENCE,
            Expr::UnaryOp { .. } => UNARY_PRECEDENCE,
            // a negative literal behaves like a unary minus when printed
            Expr::Literal(v) if v.to_sql_literal().starts_with('-') => UNARY_PRECEDENCE,
            _ => ATOM_PRECEDENCE,
        }
    }

    /// Write `expr`, parenthesized when it binds looser than `min`
    fn write_operand(&self, out: &mut String, expr: &Expr, min: u8) {
        if Self::precedence(expr) < min {
            out.push('(');
            self.write_expr(out, expr);
            out.push(')');
        } else {
            self.write_expr(out, expr);
        }
    }

    fn write_list(&self, out: &mut String, exprs: &[Expr]) {
        for (i, e) in exprs.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            self.write_expr(out, e);
        }
    }

    fn write_expr(&self, out: &mut String, expr: &Expr) {
        match expr {
            Expr::Column { table, name } => {
                if let Some(t) = table {
                    out.push_str(&self.ident(t));
                    out.push('.');
                }
                out.push_str(&self.ident(name));
            }
            Expr::Literal(value) => out.push_str(&value.to_sql_literal()),
            Expr::Parameter(param) => match param {
                ParamRef::Named(name) => {
                    out.push('@');
                    out.push_str(name);
                }
                ParamRef::Positional(_) => out.push('?'),
                ParamRef::Numbered(n) => {
                    out.push('$');
                    out.push_str(&n.to_string());
                }
            },
            Expr::BinaryOp { left, op, right } => {
                let p = op.precedence();
                self.write_operand(out, left, p);
                out.push(' ');
                out.push_str(op.symbol());
                out.push(' ');
                // left associative: equal precedence on the right needs parens
                let mut rhs = String::new();
                self.write_operand(&mut rhs, right, p + 1);
                // "a - -1" would lex as a comment
                if *op == BinaryOperator::Sub && rhs.starts_with('-') {
                    out.push('(');
                    out.push_str(&rhs);
                    out.push(')');
                } else {
                    out.push_str(&rhs);
                }
            }
            Expr::UnaryOp { op, expr: inner } => match op {
                UnaryOperator::Not => {
                    out.push_str("NOT ");
                    self.write_operand(out, inner, NOT_PRECEDENCE);
                }
                UnaryOperator::Minus => {
                    out.push('-');
                    self.write_operand(out, inner, UNARY_PRECEDENCE + 1);
                }
                UnaryOperator::Plus => self.write_operand(out, inner, UNARY_PRECEDENCE),
            },
            Expr::Function {
                name,
                args,
                distinct,
            } => {
                out.push_str(name);
                out.push('(');
                if args.is_empty() && name.eq_ignore_ascii_case("COUNT") {
                    out.push('*');
                } else {
                    if *distinct {
                        out.push_str("DISTINCT ");
                    }
                    self.write_list(out, args);
                }
                out.push(')');
            }
            Expr::NiladicFunction(name) => out.push_str(name),
            Expr::Window(window) => self.write_window(out, window),
            Expr::InList {
                expr: inner,
                list,
                negated,
            } => {
                self.write_operand(out, inner, PREDICATE_PRECEDENCE);
                out.push_str(if *negated { " NOT IN (" } else { " IN (" });
                self.write_list(out, list);
                out.push(')');
            }
            Expr::InSubquery {
                expr: inner,
                query,
                negated,
            } => {
                self.write_operand(out, inner, PREDICATE_PRECEDENCE);
                out.push_str(if *negated { " NOT IN (" } else { " IN (" });
                self.write_query(out, query);
                out.push(')');
            }
            Expr::Tuple(items) => {
                out.push('(');
                self.write_list(out, items);
                out.push(')');
            }
            Expr::Between {
                expr: inner,
                low,
                high,
                negated,
            } => {
                self.write_operand(out, inner, PREDICATE_PRECEDENCE);
                out.push_str(if *negated { " NOT BETWEEN " } else { " BETWEEN " });
                self.write_operand(out, low, PREDICATE_PRECEDENCE + 1);
                out.push_str(" AND ");
                self.write_operand(out, high, PREDICATE_PRECEDENCE + 1);
            }
            Expr::Like {
                expr: inner,
                pattern,
                negated,
            } => {
                self.write_operand(out, inner, PREDICATE_PRECEDENCE);
                out.push_str(if *negated { " NOT LIKE " } else { " LIKE " });
                self.write_operand(out, pattern, PREDICATE_PRECEDENCE + 1);
            }
            Expr::IsNull {
                expr: inner,
                negated,
            } => {
                self.write_operand(out, inner, PREDICATE_PRECEDENCE);
                out.push_str(if *negated { " IS NOT NULL" } else { " IS NULL" });
            }
            Expr::Exists { query, negated } => {
                out.push_str(if *negated { "NOT EXISTS (" } else { "EXISTS (" });
                self.write_query(out, query);
                out.push(')');
            }
            Expr::Subquery(query) => {
                out.push('(');
                self.write_query(out, query);
                out.push(')');
            }
            Expr::Case {
                operand,
                branches,
                else_result,
            } => {
                out.push_str("CASE");
                if let Some(op) = operand {
                    out.push(' ');
                    self.write_expr(out, op);
                }
                for (when, then) in branches {
                    out.push_str(" WHEN ");
                    self.write_expr(out, when);
                    out.push_str(" THEN ");
                    self.write_expr(out, then);
                }
                if let Some(e) = else_result {
                    out.push_str(" ELSE ");
                    self.write_expr(out, e);
                }
                out.push_str(" END");
            }
            Expr::Cast {
                expr: inner,
                type_name,
            } => {
                out.push_str("CAST(");
                self.write_expr(out, inner);
                out.push_str(" AS ");
                out.push_str(type_name);
                out.push(')');
            }
            Expr::InsertValue(column) => {
                out.push_str("VALUES(");
                out.push_str(&self.ident(column));
                out.push(')');
            }
        }
    }

    fn write_window(&self, out: &mut String, window: &WindowExpr) {
        out.push_str(&window.name);
        out.push('(');
        self.write_list(out, &window.args);
        out.push_str(") OVER (");
        let mut need_space = false;
        if !window.partition_by.is_empty() {
            out.push_str("PARTITION BY ");
            self.write_list(out, &window.partition_by);
            need_space = true;
        }
        if !window.order_by.is_empty() {
            if need_space {
                out.push(' ');
            }
            out.push_str("ORDER BY ");
            self.write_order_by(out, &window.order_by);
            need_space = true;
        }
        if let Some(frame) = &window.frame {
            if need_space {
                out.push(' ');
            }
            out.push_str("ROWS BETWEEN ");
            out.push_str(&frame_bound_text(frame.start));
            out.push_str(" AND ");
            out.push_str(&frame_bound_text(frame.end));
        }
        out.push(')');
    }

    fn write_order_by(&self, out: &mut String, items: &[OrderByExpr]) {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            self.write_expr(out, &item.expr);
            if !item.asc {
                out.push_str(" DESC");
            }
            match item.nulls_first {
                Some(true) => out.push_str(" NULLS FIRST"),
                Some(false) => out.push_str(" NULLS LAST"),
                None => {}
            }
        }
    }

    fn write_query(&self, out: &mut String, query: &Query) {
        if !query.ctes.is_empty() {
            out.push_str("WITH ");
            for (i, cte) in query.ctes.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str(&self.ident(&cte.name));
                if !cte.columns.is_empty() {
                    let cols: Vec<String> = cte.columns.iter().map(|c| self.ident(c)).collect();
                    out.push_str(&format!(" ({})", cols.join(", ")));
                }
                out.push_str(" AS (");
                self.write_query(out, &cte.query);
                out.push(')');
            }
            out.push(' ');
        }

        self.write_set_expr(out, &query.body);

        if !query.order_by.is_empty() {
            out.push_str(" ORDER BY ");
            self.write_order_by(out, &query.order_by);
        }

        let limit_style = self.dialect.map_or(true, |d| d.supports_limit());
        if limit_style {
            if let Some(limit) = &query.limit {
                out.push_str(" LIMIT ");
                self.write_expr(out, limit);
            }
            if let Some(offset) = &query.offset {
                out.push_str(" OFFSET ");
                self.write_expr(out, offset);
            }
        } else if query.limit.is_some() || query.offset.is_some() {
            out.push_str(" OFFSET ");
            match &query.offset {
                Some(offset) => self.write_expr(out, offset),
                None => out.push('0'),
            }
            out.push_str(" ROWS");
            if let Some(limit) = &query.limit {
                out.push_str(" FETCH NEXT ");
                self.write_expr(out, limit);
                out.push_str(" ROWS ONLY");
            }
        }
    }

    fn write_set_expr(&self, out: &mut String, body: &SetExpr) {
        match body {
            SetExpr::Select(select) => self.write_select(out, select),
            SetExpr::Union { left, right, all } => {
                self.write_set_expr(out, left);
                out.push_str(if *all { " UNION ALL " } else { " UNION " });
                self.write_set_expr(out, right);
            }
            SetExpr::Query(query) => {
                out.push('(');
                self.write_query(out, query);
                out.push(')');
            }
        }
    }

    fn write_select(&self, out: &mut String, select: &SelectStmt) {
        out.push_str("SELECT ");
        if select.distinct {
            out.push_str("DISTINCT ");
        }
        if let Some(top) = &select.top {
            out.push_str("TOP (");
            self.write_expr(out, top);
            out.push_str(") ");
        }
        for (i, column) in select.columns.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            match column {
                SelectColumn::Star => out.push('*'),
                SelectColumn::QualifiedStar(q) => {
                    out.push_str(&self.ident(q));
                    out.push_str(".*");
                }
                SelectColumn::Expr { expr, alias } => {
                    self.write_expr(out, expr);
                    if let Some(a) = alias {
                        out.push_str(" AS ");
                        out.push_str(&self.ident(a));
                    }
                }
            }
        }
        if let Some(from) = &select.from {
            out.push_str(" FROM ");
            self.write_table_ref(out, from);
        }
        if let Some(w) = &select.where_clause {
            out.push_str(" WHERE ");
            self.write_expr(out, w);
        }
        if !select.group_by.is_empty() {
            out.push_str(" GROUP BY ");
            self.write_list(out, &select.group_by);
        }
        if let Some(h) = &select.having {
            out.push_str(" HAVING ");
            self.write_expr(out, h);
        }
    }

    fn write_table_ref(&self, out: &mut String, table_ref: &TableRef) {
        match table_ref {
            TableRef::Table { name, alias, hints } => {
                if let Some(schema) = &name.schema {
                    out.push_str(&self.ident(schema));
                    out.push('.');
                }
                out.push_str(&self.ident(&name.name));
                if let Some(a) = alias {
                    out.push_str(" AS ");
                    out.push_str(&self.ident(a));
                }
                if !hints.is_empty() {
                    out.push_str(&format!(" WITH ({})", hints.join(", ")));
                }
            }
            TableRef::Join {
                left,
                right,
                join_type,
                on_condition,
            } => {
                self.write_table_ref(out, left);
                out.push_str(match join_type {
                    JoinType::Inner => " INNER JOIN ",
                    JoinType::Left => " LEFT JOIN ",
                    JoinType::Right => " RIGHT JOIN ",
                    JoinType::Full => " FULL JOIN ",
                    JoinType::Cross => " CROSS JOIN ",
                });
                // right-nested joins keep their grouping
                if matches!(**right, TableRef::Join { .. }) {
                    out.push('(');
                    self.write_table_ref(out, right);
                    out.push(')');
                } else {
                    self.write_table_ref(out, right);
                }
                if let Some(on) = on_condition {
                    out.push_str(" ON ");
                    self.write_expr(out, on);
                }
            }
            TableRef::Subquery { query, alias } => {
                out.push('(');
                self.write_query(out, query);
                out.push_str(") AS ");
                out.push_str(&self.ident(alias));
            }
        }
    }
}

fn frame_bound_text(bound: FrameBound) -> String {
    match bound {
        FrameBound::UnboundedPreceding => "UNBOUNDED PRECEDING".to_string(),
        FrameBound::Preceding(n) => format!("{} PRECEDING", n),
        FrameBound::CurrentRow => "CURRENT ROW".to_string(),
        FrameBound::Following(n) => format!("{} FOLLOWING", n),
        FrameBound::UnboundedFollowing => "UNBOUNDED FOLLOWING".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::DialectKind;
    use crate::sql::parser::Parser;

    fn round_trip(sql: &str, kind: DialectKind) -> (String, String) {
        let dialect = Dialect::latest(kind);
        let printer = ExprPrinter::new();
        let first = printer.print(&Parser::new(sql, &dialect).unwrap().parse_standalone_expr().unwrap());
        let second = printer.print(
            &Parser::new(&first, &dialect)
                .unwrap()
                .parse_standalone_expr()
                .unwrap(),
        );
        (first, second)
    }

    #[test]
    fn test_round_trip_is_stable() {
        let cases = [
            "a = 1 OR b = 2 AND c = 3",
            "(a = 1 OR b = 2) AND c = 3",
            "NOT (a = 1 AND b = 2)",
            "x IS NOT NULL AND y IS NULL",
            "a - (b - c)",
            "a - -1",
            "-(a + b) * 2",
            "x BETWEEN 1 + 1 AND 10 AND y NOT LIKE 'a%'",
            "(a, b) IN ((1, 2), (3, 4))",
            "id IN (SELECT user_id FROM orders WHERE total > 10)",
            "EXISTS (SELECT 1 FROM t WHERE t.id = u.id)",
            "CASE WHEN a > 1 THEN 'big' ELSE 'small' END",
            "CAST(price AS DECIMAL(10,2)) * 1.5",
            "COUNT(*) + COUNT(DISTINCT x)",
            "SUM(x) OVER (PARTITION BY g ORDER BY t DESC ROWS BETWEEN 1 PRECEDING AND CURRENT ROW)",
            "name = 'O''Brien' AND code = @code",
            "\"select\" = 1",
        ];
        for case in cases {
            let (first, second) = round_trip(case, DialectKind::Postgres);
            assert_eq!(first, second, "unstable printing for {}", case);
        }
    }

    #[test]
    fn test_minimal_parentheses() {
        let (printed, _) = round_trip("((a + b)) * (c)", DialectKind::Postgres);
        assert_eq!(printed, "(a + b) * c");
        let (printed, _) = round_trip("a + (b * c)", DialectKind::Postgres);
        assert_eq!(printed, "a + b * c");
        let (printed, _) = round_trip("NOT a IS NULL", DialectKind::Postgres);
        assert_eq!(printed, "NOT a IS NULL");
    }

    #[test]
    fn test_print_query_for_dialect() {
        let dialect = Dialect::latest(DialectKind::SqlServer);
        let stmt = Parser::new(
            "SELECT [order].id FROM [order] ORDER BY id OFFSET 5 ROWS FETCH NEXT 10 ROWS ONLY",
            &dialect,
        )
        .unwrap()
        .parse()
        .unwrap();
        let Statement::Query(query) = stmt else {
            panic!("expected query");
        };
        let printed = ExprPrinter::for_dialect(&dialect).print_query(&query);
        assert_eq!(
            printed,
            "SELECT [order].id FROM [order] ORDER BY id OFFSET 5 ROWS FETCH NEXT 10 ROWS ONLY"
        );
    }
}
