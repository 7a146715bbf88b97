/// Expression parsing: precedence climbing over the token stream
///
/// Binding strength, loosest first: OR, AND, NOT, comparisons and
/// IS/IN/LIKE/BETWEEN, additive and `||`, multiplicative, unary sign.
use super::ast::*;
use super::parser::Parser;
use super::token::TokenType;
use crate::error::Result;
use crate::types::Value;
use rust_decimal::Decimal;

impl<'a> Parser<'a> {
    /// Parse expression with operator precedence (Pratt parser)
    pub(super) fn parse_expr(&mut self, min_precedence: u8) -> Result<Expr> {
        let mut left = self.parse_prefix_expr()?;

        loop {
            if min_precedence <= PREDICATE_PRECEDENCE && self.at_predicate() {
                left = self.parse_predicate(left)?;
                continue;
            }

            let Some(op) = self.peek_binary_op() else {
                break;
            };
            let precedence = op.precedence();
            if precedence < min_precedence {
                break;
            }
            self.advance();
            let right = self.parse_expr(precedence + 1)?;
            left = Expr::binary(left, op, right);
        }

        Ok(left)
    }

    fn peek_binary_op(&self) -> Option<BinaryOperator> {
        let op = match &self.current().token_type {
            TokenType::Eq => BinaryOperator::Eq,
            TokenType::Ne => BinaryOperator::Ne,
            TokenType::Lt => BinaryOperator::Lt,
            TokenType::Gt => BinaryOperator::Gt,
            TokenType::Le => BinaryOperator::Le,
            TokenType::Ge => BinaryOperator::Ge,
            TokenType::Plus => BinaryOperator::Add,
            TokenType::Minus => BinaryOperator::Sub,
            TokenType::Star => BinaryOperator::Mul,
            TokenType::Slash => BinaryOperator::Div,
            TokenType::Percent => BinaryOperator::Mod,
            TokenType::And => BinaryOperator::And,
            TokenType::Or => BinaryOperator::Or,
            // MySQL treats || as logical OR
            TokenType::Concat if self.dialect.pipes_as_concat() => BinaryOperator::Concat,
            TokenType::Concat => BinaryOperator::Or,
            _ => return None,
        };
        Some(op)
    }

    fn at_predicate(&self) -> bool {
        match self.current().token_type {
            TokenType::Is | TokenType::In | TokenType::Like | TokenType::Between => true,
            TokenType::Not => matches!(
                self.peek(1),
                TokenType::In | TokenType::Like | TokenType::Between
            ),
            _ => false,
        }
    }

    /// IS [NOT] NULL, [NOT] IN, [NOT] LIKE, [NOT] BETWEEN
    fn parse_predicate(&mut self, left: Expr) -> Result<Expr> {
        if self.match_token(TokenType::Is) {
            let negated = self.match_token(TokenType::Not);
            if !self.match_token(TokenType::Null) {
                return Err(self.error("expected NULL after IS"));
            }
            return Ok(Expr::IsNull {
                expr: Box::new(left),
                negated,
            });
        }

        let negated = self.match_token(TokenType::Not);

        if self.match_token(TokenType::In) {
            return self.parse_in(left, negated);
        }

        if self.match_token(TokenType::Like) {
            let pattern = self.parse_expr(PREDICATE_PRECEDENCE + 1)?;
            return Ok(Expr::Like {
                expr: Box::new(left),
                pattern: Box::new(pattern),
                negated,
            });
        }

        if self.match_token(TokenType::Between) {
            let low = self.parse_expr(PREDICATE_PRECEDENCE + 1)?;
            self.expect(TokenType::And)?;
            let high = self.parse_expr(PREDICATE_PRECEDENCE + 1)?;
            return Ok(Expr::Between {
                expr: Box::new(left),
                low: Box::new(low),
                high: Box::new(high),
                negated,
            });
        }

        Err(self.error("expected IN, LIKE or BETWEEN after NOT"))
    }

    fn parse_in(&mut self, left: Expr, negated: bool) -> Result<Expr> {
        // `IN @ids`: a parameter bound to a list
        if matches!(
            self.current().token_type,
            TokenType::NamedParam(_) | TokenType::Placeholder | TokenType::NumberedParam(_)
        ) {
            let param = self.parse_prefix_expr()?;
            return Ok(Expr::InList {
                expr: Box::new(left),
                list: vec![param],
                negated,
            });
        }

        self.expect(TokenType::LParen)?;

        if self.check(&TokenType::Select) || self.check(&TokenType::With) {
            let query = self.parse_query()?;
            self.expect(TokenType::RParen)?;
            return Ok(Expr::InSubquery {
                expr: Box::new(left),
                query: Box::new(query),
                negated,
            });
        }

        let mut list = Vec::new();
        loop {
            list.push(self.parse_in_item()?);
            if !self.match_token(TokenType::Comma) {
                break;
            }
        }
        self.expect(TokenType::RParen)?;

        if let Expr::Tuple(items) = &left {
            let width = items.len();
            for item in &list {
                let ok = match item {
                    Expr::Tuple(values) => values.len() == width,
                    Expr::Parameter(_) => true,
                    _ => false,
                };
                if !ok {
                    return Err(self.error(&format!(
                        "row value IN list items must each have {} values",
                        width
                    )));
                }
            }
        }

        Ok(Expr::InList {
            expr: Box::new(left),
            list,
            negated,
        })
    }

    /// IN list element; a parenthesized list is a row value here
    fn parse_in_item(&mut self) -> Result<Expr> {
        if self.check(&TokenType::LParen)
            && !self.peek_is(1, &TokenType::Select)
            && !self.peek_is(1, &TokenType::With)
        {
            self.advance();
            let items = self.parse_expr_list()?;
            self.expect(TokenType::RParen)?;
            return Ok(if items.len() == 1 {
                items.into_iter().next().unwrap_or(Expr::Literal(Value::Null))
            } else {
                Expr::Tuple(items)
            });
        }
        self.parse_expr(0)
    }

    /// Prefix and primary expressions
    pub(super) fn parse_prefix_expr(&mut self) -> Result<Expr> {
        let expr = self.parse_primary()?;
        self.parse_cast_suffix(expr)
    }

    /// Postgres `expr::type`
    fn parse_cast_suffix(&mut self, mut expr: Expr) -> Result<Expr> {
        while self.match_token(TokenType::DoubleColon) {
            let type_name = self.parse_type_name()?;
            expr = Expr::Cast {
                expr: Box::new(expr),
                type_name,
            };
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let token_type = self.current().token_type.clone();
        match token_type {
            TokenType::Number(text) => {
                self.advance();
                Ok(Expr::Literal(self.number_literal(&text)?))
            }
            TokenType::String(s) => {
                self.advance();
                Ok(Expr::Literal(Value::Text(s)))
            }
            TokenType::Null => {
                self.advance();
                Ok(Expr::Literal(Value::Null))
            }
            TokenType::True => {
                self.advance();
                Ok(Expr::Literal(Value::Bool(true)))
            }
            TokenType::False => {
                self.advance();
                Ok(Expr::Literal(Value::Bool(false)))
            }
            TokenType::NamedParam(name) => {
                self.advance();
                Ok(Expr::Parameter(ParamRef::Named(name)))
            }
            TokenType::Placeholder => {
                self.advance();
                let index = self.positional_params;
                self.positional_params += 1;
                Ok(Expr::Parameter(ParamRef::Positional(index)))
            }
            TokenType::NumberedParam(n) => {
                self.advance();
                Ok(Expr::Parameter(ParamRef::Numbered(n)))
            }
            TokenType::Not => {
                self.advance();
                if self.check(&TokenType::Exists) {
                    return self.parse_exists(true);
                }
                let operand = self.parse_expr(NOT_PRECEDENCE)?;
                Ok(Expr::UnaryOp {
                    op: UnaryOperator::Not,
                    expr: Box::new(operand),
                })
            }
            TokenType::Minus | TokenType::Plus => {
                self.advance();
                let operand = self.parse_expr(UNARY_PRECEDENCE)?;
                if token_type == TokenType::Plus {
                    return Ok(operand);
                }
                Ok(match operand {
                    Expr::Literal(Value::Integer(i)) if i != i64::MIN => {
                        Expr::Literal(Value::Integer(-i))
                    }
                    Expr::Literal(Value::Decimal(d)) => Expr::Literal(Value::Decimal(-d)),
                    Expr::Literal(Value::Float(f)) => Expr::Literal(Value::Float(-f)),
                    other => Expr::UnaryOp {
                        op: UnaryOperator::Minus,
                        expr: Box::new(other),
                    },
                })
            }
            TokenType::Exists => self.parse_exists(false),
            TokenType::Case => self.parse_case(),
            TokenType::LParen => self.parse_parenthesized(),
            TokenType::Values if self.peek_is(1, &TokenType::LParen) => {
                // VALUES(col) inside ON DUPLICATE KEY UPDATE
                self.advance();
                self.advance();
                let column = self.parse_identifier()?;
                self.expect(TokenType::RParen)?;
                Ok(Expr::InsertValue(column))
            }
            TokenType::Left | TokenType::Right if self.peek_is(1, &TokenType::LParen) => {
                let name = if token_type == TokenType::Left {
                    "LEFT"
                } else {
                    "RIGHT"
                };
                self.advance();
                self.parse_function_call(name.to_string())
            }
            TokenType::Identifier(name) => self.parse_identifier_expr(name),
            TokenType::QuotedIdentifier(..) => self.parse_column_ref(),
            _ => Err(self.error("expected expression")),
        }
    }

    fn parse_parenthesized(&mut self) -> Result<Expr> {
        self.expect(TokenType::LParen)?;
        if self.check(&TokenType::Select) || self.check(&TokenType::With) {
            let query = self.parse_query()?;
            self.expect(TokenType::RParen)?;
            return Ok(Expr::Subquery(Box::new(query)));
        }

        let mut items = self.parse_expr_list()?;
        self.expect(TokenType::RParen)?;
        if items.len() == 1 {
            return Ok(items.remove(0));
        }

        // (a, b) IN (...)
        let before_in = self.check(&TokenType::In)
            || (self.check(&TokenType::Not) && self.peek_is(1, &TokenType::In));
        if !before_in {
            return Err(self.error("row value (a, b, ...) is only supported before IN"));
        }
        Ok(Expr::Tuple(items))
    }

    fn parse_exists(&mut self, negated: bool) -> Result<Expr> {
        self.expect(TokenType::Exists)?;
        self.expect(TokenType::LParen)?;
        let query = self.parse_query()?;
        self.expect(TokenType::RParen)?;
        Ok(Expr::Exists {
            query: Box::new(query),
            negated,
        })
    }

    fn parse_case(&mut self) -> Result<Expr> {
        self.expect(TokenType::Case)?;
        let operand = if self.check(&TokenType::When) {
            None
        } else {
            Some(Box::new(self.parse_expr(0)?))
        };

        let mut branches = Vec::new();
        while self.match_token(TokenType::When) {
            let condition = self.parse_expr(0)?;
            self.expect(TokenType::Then)?;
            let result = self.parse_expr(0)?;
            branches.push((condition, result));
        }
        if branches.is_empty() {
            return Err(self.error("expected WHEN in CASE expression"));
        }

        let else_result = if self.match_token(TokenType::Else) {
            Some(Box::new(self.parse_expr(0)?))
        } else {
            None
        };
        self.expect(TokenType::End)?;

        Ok(Expr::Case {
            operand,
            branches,
            else_result,
        })
    }

    /// Unquoted identifier at expression start: function, CAST, niladic
    /// temporal built-in or column reference
    fn parse_identifier_expr(&mut self, name: String) -> Result<Expr> {
        let upper = name.to_ascii_uppercase();

        if self.peek_is(1, &TokenType::LParen) {
            self.advance();
            if upper == "CAST" || upper == "TRY_CAST" {
                return self.parse_cast();
            }
            return self.parse_function_call(upper);
        }

        // DB2 CURRENT DATE / CURRENT TIMESTAMP
        if upper == "CURRENT" {
            if let TokenType::Identifier(next) = self.peek(1) {
                let two_words = format!("CURRENT {}", next.to_ascii_uppercase());
                if self.dialect.temporal_function(&two_words).is_some() {
                    self.advance();
                    self.advance();
                    return Ok(Expr::NiladicFunction(two_words));
                }
            }
        }

        if !self.peek_is(1, &TokenType::Dot) {
            if let Some(function) = self.dialect.temporal_function(&upper) {
                if function.bare {
                    self.advance();
                    return Ok(Expr::NiladicFunction(function.name.to_string()));
                }
            }
        }

        self.parse_column_ref()
    }

    /// column | table.column | schema.table.column
    fn parse_column_ref(&mut self) -> Result<Expr> {
        let first = self.parse_identifier()?;
        if !self.match_token(TokenType::Dot) {
            return Ok(Expr::Column {
                table: None,
                name: first,
            });
        }
        let mut table = first;
        let mut name = self.parse_identifier()?;
        while self.match_token(TokenType::Dot) {
            table = name;
            name = self.parse_identifier()?;
        }
        Ok(Expr::Column {
            table: Some(table),
            name,
        })
    }

    /// CAST(expr AS type); the CAST keyword is already consumed
    fn parse_cast(&mut self) -> Result<Expr> {
        self.expect(TokenType::LParen)?;
        let expr = self.parse_expr(0)?;
        self.expect(TokenType::As)?;
        let type_name = self.parse_type_name()?;
        self.expect(TokenType::RParen)?;
        Ok(Expr::Cast {
            expr: Box::new(expr),
            type_name,
        })
    }

    /// name(args) [OVER (...)]; the name is already consumed
    fn parse_function_call(&mut self, name: String) -> Result<Expr> {
        self.expect(TokenType::LParen)?;

        let mut distinct = false;
        let args = if self.match_token(TokenType::Star) {
            if name != "COUNT" {
                return Err(self.error(&format!("'*' argument is only valid for COUNT, not {}", name)));
            }
            Vec::new()
        } else if self.check(&TokenType::RParen) {
            Vec::new()
        } else {
            distinct = self.match_token(TokenType::Distinct);
            self.parse_expr_list()?
        };
        self.expect(TokenType::RParen)?;

        if self.check(&TokenType::Over) {
            if distinct {
                return Err(self.error("DISTINCT is not allowed in a window function"));
            }
            return self.parse_window(name, args);
        }

        Ok(Expr::Function {
            name,
            args,
            distinct,
        })
    }

    fn parse_window(&mut self, name: String, args: Vec<Expr>) -> Result<Expr> {
        self.expect(TokenType::Over)?;
        self.dialect.require(
            "window functions",
            self.dialect.window_functions_min_version(),
        )?;
        if !self.dialect.supports_window_function(&name) {
            return Err(self.dialect.not_supported(&format!(
                "window function {} is not supported by {}",
                name,
                self.dialect.name()
            )));
        }

        if !self.match_token(TokenType::LParen) {
            return Err(self.error(&format!("expected '(' after {}() OVER", name)));
        }

        let partition_by = if self.match_token(TokenType::Partition) {
            self.expect(TokenType::By)?;
            self.parse_expr_list()?
        } else {
            Vec::new()
        };

        let order_by = if self.match_token(TokenType::Order) {
            self.expect(TokenType::By)?;
            self.parse_order_by_list()?
        } else {
            Vec::new()
        };

        let frame = if self.match_keyword("ROWS") {
            Some(self.parse_window_frame()?)
        } else if self.check_keyword("RANGE") || self.check_keyword("GROUPS") {
            return Err(self.error("only ROWS window frames are supported; RANGE and GROUPS are not"));
        } else {
            None
        };

        self.expect(TokenType::RParen)?;

        let window = WindowExpr {
            name,
            args,
            partition_by,
            order_by,
            frame,
        };
        self.validate_window(&window)?;
        Ok(Expr::Window(Box::new(window)))
    }

    /// ROWS BETWEEN start AND end | ROWS start
    fn parse_window_frame(&mut self) -> Result<WindowFrame> {
        if self.match_token(TokenType::Between) {
            let start = self.parse_frame_bound()?;
            self.expect(TokenType::And)?;
            let end = self.parse_frame_bound()?;
            Ok(WindowFrame { start, end })
        } else {
            let start = self.parse_frame_bound()?;
            Ok(WindowFrame {
                start,
                end: FrameBound::CurrentRow,
            })
        }
    }

    fn parse_frame_bound(&mut self) -> Result<FrameBound> {
        if self.match_keyword("UNBOUNDED") {
            if self.match_keyword("PRECEDING") {
                return Ok(FrameBound::UnboundedPreceding);
            }
            if self.match_keyword("FOLLOWING") {
                return Ok(FrameBound::UnboundedFollowing);
            }
            return Err(self.error("expected PRECEDING or FOLLOWING after UNBOUNDED"));
        }
        if self.match_keyword("CURRENT") {
            self.expect_keyword("ROW")?;
            return Ok(FrameBound::CurrentRow);
        }
        let offset = match &self.current().token_type {
            TokenType::Number(n) => n
                .parse::<u64>()
                .map_err(|_| self.error("window frame offset must be a non-negative integer"))?,
            _ => return Err(self.error("expected UNBOUNDED, CURRENT ROW or a row count in window frame")),
        };
        self.advance();
        if self.match_keyword("PRECEDING") {
            Ok(FrameBound::Preceding(offset))
        } else if self.match_keyword("FOLLOWING") {
            Ok(FrameBound::Following(offset))
        } else {
            Err(self.error("expected PRECEDING or FOLLOWING after frame offset"))
        }
    }

    fn validate_window(&self, window: &WindowExpr) -> Result<()> {
        let name = window.name.as_str();

        if let Some((min, max)) = self.dialect.window_function_arity(name) {
            let count = window.args.len();
            if count < min || count > max {
                let expected = if min == max {
                    format!("{}", min)
                } else {
                    format!("{} to {}", min, max)
                };
                return Err(self.error(&format!(
                    "{}() expects {} argument(s) but got {}",
                    name, expected, count
                )));
            }
        }

        if window.order_by.is_empty() && self.dialect.requires_order_by_in_window_function(name) {
            return Err(self.error(&format!(
                "{name}() requires ORDER BY in its OVER clause, e.g. {name}() OVER (ORDER BY <column>)"
            )));
        }

        let literal_arg = |index: usize| match window.args.get(index) {
            Some(Expr::Literal(Value::Integer(i))) => Some(*i),
            _ => None,
        };
        match name {
            "NTILE" => {
                if matches!(literal_arg(0), Some(n) if n <= 0) {
                    return Err(self.error("NTILE bucket count must be a positive integer"));
                }
            }
            "LAG" | "LEAD" => {
                if matches!(literal_arg(1), Some(n) if n < 0) {
                    return Err(self.error(&format!("{} offset must be a non-negative integer", name)));
                }
            }
            "NTH_VALUE" => {
                if matches!(literal_arg(1), Some(n) if n <= 0) {
                    return Err(self.error("NTH_VALUE position must be a positive integer"));
                }
            }
            _ => {}
        }

        if let Some(frame) = &window.frame {
            if frame.start == FrameBound::UnboundedFollowing
                || frame.end == FrameBound::UnboundedPreceding
                || frame.start.offset() > frame.end.offset()
            {
                return Err(self.error("window frame start must not come after the frame end"));
            }
        }

        Ok(())
    }

    /// Integer when it fits, exact decimal for fractions, float for exponents
    fn number_literal(&self, text: &str) -> Result<Value> {
        if text.contains(['e', 'E']) {
            return text
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| self.error(&format!("invalid number '{}'", text)));
        }
        if !text.contains('.') {
            if let Ok(i) = text.parse::<i64>() {
                return Ok(Value::Integer(i));
            }
        }
        text.parse::<Decimal>()
            .map(Value::Decimal)
            .map_err(|_| self.error(&format!("invalid number '{}'", text)))
    }
}

#[cfg(test)]
mod tests {
    use crate::dialect::{Dialect, DialectKind};
    use crate::error::SqlError;
    use crate::sql::ast::*;
    use crate::sql::parser::Parser;
    use crate::types::Value;

    fn expr_with(sql: &str, kind: DialectKind) -> crate::error::Result<Expr> {
        let dialect = Dialect::latest(kind);
        Parser::new(sql, &dialect)?.parse_standalone_expr()
    }

    fn expr(sql: &str) -> Expr {
        expr_with(sql, DialectKind::Postgres).unwrap()
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let e = expr("a = 1 OR b = 2 AND c = 3");
        match e {
            Expr::BinaryOp { op, right, .. } => {
                assert_eq!(op, BinaryOperator::Or);
                assert!(matches!(*right, Expr::BinaryOp { op: BinaryOperator::And, .. }));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_not_binds_looser_than_comparison() {
        let e = expr("NOT a = 1 AND b = 2");
        match e {
            Expr::BinaryOp { op, left, .. } => {
                assert_eq!(op, BinaryOperator::And);
                match *left {
                    Expr::UnaryOp { op: UnaryOperator::Not, expr } => {
                        assert!(matches!(*expr, Expr::BinaryOp { op: BinaryOperator::Eq, .. }))
                    }
                    other => panic!("unexpected {:?}", other),
                }
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_arithmetic_precedence() {
        let e = expr("1 + 2 * 3");
        assert_eq!(
            e,
            Expr::binary(
                Expr::literal(1),
                BinaryOperator::Add,
                Expr::binary(Expr::literal(2), BinaryOperator::Mul, Expr::literal(3)),
            )
        );
        assert_eq!(expr("-5"), Expr::literal(-5));
    }

    #[test]
    fn test_is_not_null_is_canonical() {
        assert_eq!(
            expr("name IS NOT NULL"),
            Expr::IsNull {
                expr: Box::new(Expr::column("name")),
                negated: true,
            }
        );
    }

    #[test]
    fn test_between_and_in() {
        let e = expr("x BETWEEN 1 AND 5 AND y NOT IN (1, 2)");
        match e {
            Expr::BinaryOp { op, left, right } => {
                assert_eq!(op, BinaryOperator::And);
                assert!(matches!(*left, Expr::Between { negated: false, .. }));
                assert!(matches!(*right, Expr::InList { negated: true, .. }));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_tuple_in() {
        let e = expr("(a, b) IN ((1, 2), (3, 4))");
        match e {
            Expr::InList { expr, list, .. } => {
                assert!(matches!(*expr, Expr::Tuple(ref items) if items.len() == 2));
                assert_eq!(list.len(), 2);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(expr_with("(a, b) = 1", DialectKind::Postgres).is_err());
        assert!(expr_with("(a, b) IN ((1, 2, 3))", DialectKind::Postgres).is_err());
    }

    #[test]
    fn test_parameters() {
        let dialect = Dialect::latest(DialectKind::MySql);
        let e = Parser::new("a = ? AND b = ? AND c = @c", &dialect)
            .unwrap()
            .parse_standalone_expr()
            .unwrap();
        let mut params = Vec::new();
        e.walk(&mut |x: &Expr| {
            if let Expr::Parameter(p) = x {
                params.push(p.clone());
            }
        });
        assert_eq!(
            params,
            vec![
                ParamRef::Positional(0),
                ParamRef::Positional(1),
                ParamRef::Named("c".into())
            ]
        );
    }

    #[test]
    fn test_number_literals() {
        assert!(matches!(expr("1.50"), Expr::Literal(Value::Decimal(_))));
        assert!(matches!(expr("1e3"), Expr::Literal(Value::Float(_))));
        assert!(matches!(
            expr("99999999999999999999"),
            Expr::Literal(Value::Decimal(_))
        ));
    }

    #[test]
    fn test_mysql_pipes_are_or() {
        match expr_with("a || b", DialectKind::MySql).unwrap() {
            Expr::BinaryOp { op, .. } => assert_eq!(op, BinaryOperator::Or),
            other => panic!("unexpected {:?}", other),
        }
        match expr("a || b") {
            Expr::BinaryOp { op, .. } => assert_eq!(op, BinaryOperator::Concat),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_niladic_temporal() {
        assert_eq!(
            expr("CURRENT_DATE"),
            Expr::NiladicFunction("CURRENT_DATE".into())
        );
        assert_eq!(
            expr_with("CURRENT DATE", DialectKind::Db2).unwrap(),
            Expr::NiladicFunction("CURRENT DATE".into())
        );
        assert!(matches!(
            expr_with("GETDATE()", DialectKind::SqlServer).unwrap(),
            Expr::Function { ref name, .. } if name == "GETDATE"
        ));
    }

    #[test]
    fn test_case_and_cast() {
        assert!(matches!(
            expr("CASE WHEN a > 1 THEN 'x' ELSE 'y' END"),
            Expr::Case { operand: None, .. }
        ));
        assert!(matches!(
            expr("CAST(a AS DECIMAL(10,2))"),
            Expr::Cast { ref type_name, .. } if type_name == "DECIMAL(10,2)"
        ));
        assert!(matches!(
            expr("a::int"),
            Expr::Cast { ref type_name, .. } if type_name == "INT"
        ));
    }

    #[test]
    fn test_window_requires_order_by() {
        let err = expr_with("ROW_NUMBER() OVER (PARTITION BY a)", DialectKind::Postgres).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("requires ORDER BY"));
        assert!(message.contains("ROW_NUMBER() OVER (ORDER BY"));
    }

    #[test]
    fn test_window_validation() {
        assert!(expr_with("SUM(x) OVER (PARTITION BY g ORDER BY t ROWS BETWEEN 2 PRECEDING AND CURRENT ROW)", DialectKind::Postgres).is_ok());
        assert!(expr_with("NTILE(0) OVER (ORDER BY a)", DialectKind::Postgres).is_err());
        assert!(expr_with("LAG(a, -1) OVER (ORDER BY a)", DialectKind::Postgres).is_err());
        assert!(expr_with("NTH_VALUE(a, 0) OVER (ORDER BY a)", DialectKind::Postgres).is_err());
        assert!(expr_with("RANK(a) OVER (ORDER BY a)", DialectKind::Postgres).is_err());
        assert!(expr_with(
            "SUM(x) OVER (ORDER BY t ROWS BETWEEN CURRENT ROW AND 1 PRECEDING)",
            DialectKind::Postgres
        )
        .is_err());
        let err = expr_with("SUM(x) OVER (ORDER BY t RANGE BETWEEN 1 PRECEDING AND CURRENT ROW)", DialectKind::Postgres).unwrap_err();
        assert!(err.to_string().contains("RANGE"));
    }

    #[test]
    fn test_window_dialect_gates() {
        let dialect = Dialect::mysql("5.7").unwrap();
        let err = Parser::new("ROW_NUMBER() OVER (ORDER BY a)", &dialect)
            .unwrap()
            .parse_standalone_expr()
            .unwrap_err();
        assert!(matches!(err, SqlError::NotSupported { .. }));
        assert!(err.to_string().contains("8.0"));

        let err = expr_with("NTH_VALUE(a, 2) OVER (ORDER BY a)", DialectKind::SqlServer).unwrap_err();
        assert!(matches!(err, SqlError::NotSupported { .. }));
    }

    #[test]
    fn test_insert_value_reference() {
        assert_eq!(
            expr_with("VALUES(name)", DialectKind::MySql).unwrap(),
            Expr::InsertValue("name".into())
        );
    }
}
