/// SQL Parser - converts tokens into AST
///
/// Statement-level recursive descent lives here; expressions are parsed by
/// the precedence climber in `expr_parser.rs`.
use super::ast::*;
use super::lexer::Lexer;
use super::token::{Token, TokenType};
use crate::dialect::{Dialect, QuoteStyle};
use crate::error::{Result, SqlError};
use crate::types::{ColumnDef, ColumnType, TempScope, Value};

/// Table hints accepted inside `WITH (...)`
const TABLE_HINTS: &[&str] = &[
    "NOLOCK",
    "READUNCOMMITTED",
    "READCOMMITTED",
    "REPEATABLEREAD",
    "SERIALIZABLE",
    "HOLDLOCK",
    "UPDLOCK",
    "XLOCK",
    "ROWLOCK",
    "PAGLOCK",
    "TABLOCK",
    "TABLOCKX",
    "READPAST",
    "NOWAIT",
    "NOEXPAND",
];

/// Identifiers that end a FROM item or select item instead of naming an alias
const NON_ALIAS_WORDS: &[&str] = &[
    "FETCH",
    "OPTION",
    "RETURNING",
    "FOR",
    "WINDOW",
    "ROWS",
    "ROW",
    "NATURAL",
    "TABLESAMPLE",
];

pub struct Parser<'a> {
    pub(super) tokens: Vec<Token>,
    pub(super) position: usize,
    pub(super) dialect: &'a Dialect,
    /// Next index handed to a `?` marker
    pub(super) positional_params: usize,
}

impl<'a> Parser<'a> {
    pub fn new(sql: &str, dialect: &'a Dialect) -> Result<Self> {
        let tokens = Lexer::new(sql, dialect).tokenize()?;
        Ok(Self::from_tokens(tokens, dialect))
    }

    pub fn from_tokens(tokens: Vec<Token>, dialect: &'a Dialect) -> Self {
        Self {
            tokens,
            position: 0,
            dialect,
            positional_params: 0,
        }
    }

    /// Parse exactly one statement (a trailing semicolon is allowed)
    pub fn parse(&mut self) -> Result<Statement> {
        let stmt = self.parse_statement()?;
        self.match_token(TokenType::Semicolon);
        if !self.check(&TokenType::Eof) {
            return Err(self.error(
                "unexpected input after end of statement; use parse_multi for several statements",
            ));
        }
        Ok(stmt)
    }

    /// Parse every semicolon-separated statement
    pub fn parse_all(&mut self) -> Result<Vec<Statement>> {
        let mut statements = Vec::new();
        loop {
            while self.match_token(TokenType::Semicolon) {}
            if self.check(&TokenType::Eof) {
                break;
            }
            statements.push(self.parse_statement()?);
            if !self.check(&TokenType::Semicolon) && !self.check(&TokenType::Eof) {
                return Err(self.error("expected ';' between statements"));
            }
        }
        Ok(statements)
    }

    /// Parse a standalone expression (WHERE fragment or scalar)
    pub fn parse_standalone_expr(&mut self) -> Result<Expr> {
        let expr = self.parse_expr(0)?;
        if !self.check(&TokenType::Eof) {
            return Err(self.error("unexpected input after expression"));
        }
        Ok(expr)
    }

    fn parse_statement(&mut self) -> Result<Statement> {
        match &self.current().token_type {
            TokenType::Select | TokenType::With | TokenType::LParen => {
                Ok(Statement::Query(self.parse_query()?))
            }
            TokenType::Insert => Ok(Statement::Insert(self.parse_insert()?)),
            TokenType::Update => Ok(Statement::Update(self.parse_update()?)),
            TokenType::Delete => Ok(Statement::Delete(self.parse_delete()?)),
            TokenType::Merge => Ok(Statement::Merge(self.parse_merge()?)),
            TokenType::Create => self.parse_create(),
            TokenType::Drop => self.parse_drop(),
            _ => Err(self.error(
                "Unsupported statement: expected SELECT/INSERT/UPDATE/DELETE/MERGE/CREATE/DROP",
            )),
        }
    }

    // ----- queries -----

    pub(super) fn parse_query(&mut self) -> Result<Query> {
        let ctes = if self.check(&TokenType::With) {
            self.parse_ctes()?
        } else {
            Vec::new()
        };

        let body = self.parse_set_expr()?;

        let order_by = if self.match_token(TokenType::Order) {
            self.expect(TokenType::By)?;
            self.parse_order_by_list()?
        } else {
            Vec::new()
        };

        let (limit, offset) = self.parse_paging()?;
        self.parse_option_clause()?;

        Ok(Query {
            ctes,
            body,
            order_by,
            limit,
            offset,
        })
    }

    fn parse_ctes(&mut self) -> Result<Vec<Cte>> {
        self.expect(TokenType::With)?;
        self.dialect.require(
            "WITH (common table expressions)",
            self.dialect.with_cte_min_version(),
        )?;
        if self.check_keyword("RECURSIVE") {
            return Err(self.error("recursive common table expressions are not supported by the parser"));
        }

        let mut ctes = Vec::new();
        loop {
            let name = self.parse_identifier()?;
            let columns = if self.check(&TokenType::LParen) {
                self.parse_paren_identifier_list()?
            } else {
                Vec::new()
            };
            self.expect(TokenType::As)?;
            self.expect(TokenType::LParen)?;
            let query = self.parse_query()?;
            self.expect(TokenType::RParen)?;
            ctes.push(Cte {
                name,
                columns,
                query: Box::new(query),
            });
            if !self.match_token(TokenType::Comma) {
                break;
            }
        }
        Ok(ctes)
    }

    fn parse_set_expr(&mut self) -> Result<SetExpr> {
        let mut left = self.parse_set_operand()?;
        while self.match_token(TokenType::Union) {
            let all = self.match_token(TokenType::All);
            if !all {
                self.match_token(TokenType::Distinct);
            }
            let right = self.parse_set_operand()?;
            left = SetExpr::Union {
                left: Box::new(left),
                right: Box::new(right),
                all,
            };
        }
        Ok(left)
    }

    fn parse_set_operand(&mut self) -> Result<SetExpr> {
        if self.check(&TokenType::LParen) {
            self.advance();
            let query = self.parse_query()?;
            self.expect(TokenType::RParen)?;
            return Ok(SetExpr::Query(Box::new(query)));
        }
        if !self.check(&TokenType::Select) {
            return Err(self.error("expected SELECT"));
        }
        Ok(SetExpr::Select(Box::new(self.parse_select()?)))
    }

    fn parse_select(&mut self) -> Result<SelectStmt> {
        self.expect(TokenType::Select)?;

        let distinct = self.match_token(TokenType::Distinct);
        if !distinct {
            self.match_token(TokenType::All);
        }

        let top = if self.check_keyword("TOP") {
            if !self.dialect.supports_top() {
                return Err(self.dialect.not_supported(&format!(
                    "SELECT TOP is not supported by {}; use LIMIT or FETCH FIRST",
                    self.dialect.name()
                )));
            }
            self.advance();
            if self.match_token(TokenType::LParen) {
                let expr = self.parse_expr(0)?;
                self.expect(TokenType::RParen)?;
                Some(expr)
            } else {
                Some(self.parse_prefix_expr()?)
            }
        } else {
            None
        };

        let columns = self.parse_select_columns()?;

        let from = if self.match_token(TokenType::From) {
            Some(self.parse_table_ref()?)
        } else {
            None
        };

        let where_clause = if self.match_token(TokenType::Where) {
            Some(self.parse_expr(0)?)
        } else {
            None
        };

        let group_by = if self.match_token(TokenType::Group) {
            self.expect(TokenType::By)?;
            self.parse_expr_list()?
        } else {
            Vec::new()
        };

        let having = if self.match_token(TokenType::Having) {
            Some(self.parse_expr(0)?)
        } else {
            None
        };

        Ok(SelectStmt {
            distinct,
            top,
            columns,
            from,
            where_clause,
            group_by,
            having,
        })
    }

    fn parse_select_columns(&mut self) -> Result<Vec<SelectColumn>> {
        let mut columns = Vec::new();
        loop {
            if self.match_token(TokenType::Star) {
                columns.push(SelectColumn::Star);
            } else if self.is_identifier_token(0)
                && self.peek_is(1, &TokenType::Dot)
                && self.peek_is(2, &TokenType::Star)
            {
                let qualifier = self.parse_identifier()?;
                self.advance(); // .
                self.advance(); // *
                columns.push(SelectColumn::QualifiedStar(qualifier));
            } else {
                let expr = self.parse_expr(0)?;
                let alias = self.parse_optional_alias(true)?;
                columns.push(SelectColumn::Expr { expr, alias });
            }
            if !self.match_token(TokenType::Comma) {
                break;
            }
        }
        Ok(columns)
    }

    /// `[AS] alias`; string aliases are accepted for select items
    fn parse_optional_alias(&mut self, allow_string: bool) -> Result<Option<String>> {
        if self.match_token(TokenType::As) {
            if allow_string {
                if let TokenType::String(s) = &self.current().token_type {
                    let alias = s.clone();
                    self.advance();
                    return Ok(Some(alias));
                }
            }
            return Ok(Some(self.parse_identifier()?));
        }
        match &self.current().token_type {
            TokenType::Identifier(name)
                if !NON_ALIAS_WORDS.iter().any(|w| w.eq_ignore_ascii_case(name)) =>
            {
                Ok(Some(self.parse_identifier()?))
            }
            TokenType::QuotedIdentifier(..) => Ok(Some(self.parse_identifier()?)),
            _ => Ok(None),
        }
    }

    pub(super) fn parse_order_by_list(&mut self) -> Result<Vec<OrderByExpr>> {
        let mut items = Vec::new();
        loop {
            let expr = self.parse_expr(0)?;
            let asc = if self.match_token(TokenType::Desc) {
                false
            } else {
                self.match_token(TokenType::Asc);
                true
            };
            let nulls_first = if self.match_keyword("NULLS") {
                if self.match_keyword("FIRST") {
                    Some(true)
                } else if self.match_keyword("LAST") {
                    Some(false)
                } else {
                    return Err(self.error("expected FIRST or LAST after NULLS"));
                }
            } else {
                None
            };
            items.push(OrderByExpr {
                expr,
                asc,
                nulls_first,
            });
            if !self.match_token(TokenType::Comma) {
                break;
            }
        }
        Ok(items)
    }

    /// LIMIT n [OFFSET m] | LIMIT m, n | OFFSET m ROWS [FETCH NEXT n ROWS ONLY] | FETCH FIRST n ROWS ONLY
    fn parse_paging(&mut self) -> Result<(Option<Expr>, Option<Expr>)> {
        let mut limit = None;
        let mut offset = None;

        if self.match_token(TokenType::Limit) {
            if !self.dialect.supports_limit() {
                return Err(self.dialect.not_supported(&format!(
                    "LIMIT is not supported by {}; use OFFSET ... FETCH",
                    self.dialect.name()
                )));
            }
            let first = self.parse_expr(0)?;
            if self.match_token(TokenType::Comma) {
                // MySQL LIMIT offset, count
                offset = Some(first);
                limit = Some(self.parse_expr(0)?);
            } else {
                limit = Some(first);
            }
        }

        if self.match_token(TokenType::Offset) {
            let value = self.parse_expr(0)?;
            let fetch_style = self.match_keyword("ROWS") || self.match_keyword("ROW");
            if fetch_style {
                self.dialect.require(
                    "OFFSET ... FETCH",
                    self.dialect.offset_fetch_min_version(),
                )?;
            } else if !self.dialect.supports_limit() {
                return Err(self.error("expected ROWS after OFFSET value"));
            }
            offset = Some(value);
        }

        if self.match_keyword("FETCH") {
            self.dialect.require(
                "OFFSET ... FETCH",
                self.dialect.offset_fetch_min_version(),
            )?;
            if !self.match_keyword("FIRST") && !self.match_keyword("NEXT") {
                return Err(self.error("expected FIRST or NEXT after FETCH"));
            }
            let count = self.parse_expr(0)?;
            if !self.match_keyword("ROWS") && !self.match_keyword("ROW") {
                return Err(self.error("expected ROWS after FETCH count"));
            }
            self.expect_keyword("ONLY")?;
            limit = Some(count);
        }

        Ok((limit, offset))
    }

    /// SQL Server `OPTION (...)` query hints; accepted and ignored
    fn parse_option_clause(&mut self) -> Result<()> {
        if !self.check_keyword("OPTION") {
            return Ok(());
        }
        if !self.dialect.supports_option_clause() {
            return Err(self.error(&format!(
                "OPTION (...) query hints are not supported by {}",
                self.dialect.name()
            )));
        }
        self.advance();
        if !self.check(&TokenType::LParen) {
            return Err(self.error("expected '(' after OPTION"));
        }
        self.skip_parenthesized()
    }

    // ----- FROM -----

    pub(super) fn parse_table_ref(&mut self) -> Result<TableRef> {
        let mut left = self.parse_table_factor()?;

        loop {
            let join_type = if self.match_token(TokenType::Comma) {
                JoinType::Cross
            } else if let Some(join_type) = self.parse_join_keyword()? {
                join_type
            } else {
                break;
            };

            let right = self.parse_table_factor()?;
            let on_condition = if join_type == JoinType::Cross {
                None
            } else {
                if !self.match_token(TokenType::On) {
                    return Err(self.error("expected ON after JOIN table"));
                }
                Some(self.parse_expr(0)?)
            };

            left = TableRef::Join {
                left: Box::new(left),
                right: Box::new(right),
                join_type,
                on_condition,
            };
        }

        Ok(left)
    }

    fn parse_join_keyword(&mut self) -> Result<Option<JoinType>> {
        let join_type = match self.current().token_type {
            TokenType::Join => JoinType::Inner,
            TokenType::Inner => {
                self.advance();
                JoinType::Inner
            }
            TokenType::Left => {
                self.advance();
                self.match_token(TokenType::Outer);
                JoinType::Left
            }
            TokenType::Right => {
                self.advance();
                self.match_token(TokenType::Outer);
                JoinType::Right
            }
            TokenType::Full => {
                self.advance();
                self.match_token(TokenType::Outer);
                JoinType::Full
            }
            TokenType::Cross => {
                self.advance();
                JoinType::Cross
            }
            _ => return Ok(None),
        };
        self.expect(TokenType::Join)?;
        Ok(Some(join_type))
    }

    pub(super) fn parse_table_factor(&mut self) -> Result<TableRef> {
        if self.match_token(TokenType::LParen) {
            if self.check(&TokenType::Select) || self.check(&TokenType::With) {
                let query = self.parse_query()?;
                self.expect(TokenType::RParen)?;
                let alias = self
                    .parse_optional_alias(false)?
                    .ok_or_else(|| self.error("subquery in FROM requires an alias"))?;
                return Ok(TableRef::Subquery {
                    query: Box::new(query),
                    alias,
                });
            }
            let inner = self.parse_table_ref()?;
            self.expect(TokenType::RParen)?;
            return Ok(inner);
        }

        let name = self.parse_object_name()?;
        let mut hints = self.parse_table_hints()?;
        let alias = self.parse_optional_alias(false)?;
        if hints.is_empty() {
            hints = self.parse_table_hints()?;
        }
        Ok(TableRef::Table { name, alias, hints })
    }

    /// SQL Server `WITH (NOLOCK, ...)`
    fn parse_table_hints(&mut self) -> Result<Vec<String>> {
        if !self.check(&TokenType::With) {
            return Ok(Vec::new());
        }
        if !self.dialect.supports_table_hints() {
            return Err(self.error(&format!(
                "table hints WITH (...) are not supported by {}",
                self.dialect.name()
            )));
        }
        self.advance();
        if !self.match_token(TokenType::LParen) {
            return Err(self.error("expected '(' after WITH in table hint, e.g. WITH (NOLOCK)"));
        }
        let mut hints = Vec::new();
        loop {
            let hint = match &self.current().token_type {
                TokenType::Identifier(name) => name.to_ascii_uppercase(),
                _ => return Err(self.error("expected a table hint such as NOLOCK")),
            };
            if !TABLE_HINTS.contains(&hint.as_str()) {
                return Err(self.error(&format!(
                    "unknown table hint '{}'; expected a table hint such as NOLOCK",
                    hint
                )));
            }
            self.advance();
            hints.push(hint);
            if !self.match_token(TokenType::Comma) {
                break;
            }
        }
        self.expect(TokenType::RParen)?;
        Ok(hints)
    }

    // ----- DML -----

    fn parse_insert(&mut self) -> Result<InsertStmt> {
        self.expect(TokenType::Insert)?;

        let ignore = self.match_keyword("IGNORE");
        if ignore && !self.dialect.supports_insert_ignore() {
            return Err(self.dialect.not_supported(&format!(
                "INSERT IGNORE is not supported by {}",
                self.dialect.name()
            )));
        }

        self.match_token(TokenType::Into);
        let table = self.parse_object_name()?;

        let columns = if self.check(&TokenType::LParen)
            && !self.peek_is(1, &TokenType::Select)
            && !self.peek_is(1, &TokenType::With)
        {
            Some(self.parse_paren_identifier_list()?)
        } else {
            None
        };

        let source = if self.match_token(TokenType::Values) || self.match_keyword("VALUE") {
            let mut rows = Vec::new();
            loop {
                self.expect(TokenType::LParen)?;
                let row = if self.check(&TokenType::RParen) {
                    Vec::new()
                } else {
                    self.parse_expr_list()?
                };
                self.expect(TokenType::RParen)?;
                rows.push(row);
                if !self.match_token(TokenType::Comma) {
                    break;
                }
            }
            InsertSource::Values(rows)
        } else if self.check(&TokenType::Select)
            || self.check(&TokenType::With)
            || self.check(&TokenType::LParen)
        {
            InsertSource::Query(Box::new(self.parse_query()?))
        } else {
            return Err(self.error("expected VALUES or SELECT in INSERT"));
        };

        let mut on_duplicate = None;
        let mut on_conflict = None;
        if self.match_token(TokenType::On) {
            if self.match_keyword("DUPLICATE") {
                if !self.dialect.supports_on_duplicate_key_update() {
                    return Err(self.dialect.not_supported(&format!(
                        "ON DUPLICATE KEY UPDATE is not supported by {}",
                        self.dialect.name()
                    )));
                }
                self.expect_keyword("KEY")?;
                self.expect(TokenType::Update)?;
                on_duplicate = Some(self.parse_assignments()?);
            } else if self.match_keyword("CONFLICT") {
                self.dialect
                    .require("ON CONFLICT", self.dialect.on_conflict_min_version())?;
                on_conflict = Some(self.parse_on_conflict()?);
            } else {
                return Err(self.error("expected DUPLICATE KEY UPDATE or CONFLICT after ON"));
            }
        }

        Ok(InsertStmt {
            table,
            columns,
            source,
            ignore,
            on_duplicate,
            on_conflict,
        })
    }

    fn parse_on_conflict(&mut self) -> Result<OnConflict> {
        let target = if self.check(&TokenType::LParen) {
            self.parse_paren_identifier_list()?
        } else {
            Vec::new()
        };
        self.expect_keyword("DO")?;
        let action = if self.match_keyword("NOTHING") {
            ConflictAction::DoNothing
        } else if self.match_token(TokenType::Update) {
            self.expect(TokenType::Set)?;
            let assignments = self.parse_assignment_list()?;
            let where_clause = if self.match_token(TokenType::Where) {
                Some(self.parse_expr(0)?)
            } else {
                None
            };
            ConflictAction::DoUpdate {
                assignments,
                where_clause,
            }
        } else {
            return Err(self.error("expected NOTHING or UPDATE after ON CONFLICT ... DO"));
        };
        Ok(OnConflict { target, action })
    }

    /// `col = expr, ...` without a leading SET
    fn parse_assignments(&mut self) -> Result<Vec<Assignment>> {
        self.parse_assignment_list()
    }

    fn parse_assignment_list(&mut self) -> Result<Vec<Assignment>> {
        let mut assignments = Vec::new();
        loop {
            let mut column = self.parse_identifier()?;
            // t.col = ... targets the column of the statement's table
            while self.match_token(TokenType::Dot) {
                column = self.parse_identifier()?;
            }
            self.expect(TokenType::Eq)?;
            let value = self.parse_expr(0)?;
            assignments.push(Assignment { column, value });
            if !self.match_token(TokenType::Comma) {
                break;
            }
        }
        Ok(assignments)
    }

    fn parse_update(&mut self) -> Result<UpdateStmt> {
        self.expect(TokenType::Update)?;
        let table = self.parse_object_name()?;
        self.parse_table_hints()?;
        let alias = self.parse_optional_alias(false)?;
        self.expect(TokenType::Set)?;
        let assignments = self.parse_assignment_list()?;
        let where_clause = if self.match_token(TokenType::Where) {
            Some(self.parse_expr(0)?)
        } else {
            None
        };
        Ok(UpdateStmt {
            table,
            alias,
            assignments,
            where_clause,
        })
    }

    fn parse_delete(&mut self) -> Result<DeleteStmt> {
        self.expect(TokenType::Delete)?;
        if !self.match_token(TokenType::From) {
            return Err(self.error("expected DELETE FROM <table>"));
        }
        let table = self.parse_object_name()?;
        self.parse_table_hints()?;
        let alias = self.parse_optional_alias(false)?;
        let where_clause = if self.match_token(TokenType::Where) {
            Some(self.parse_expr(0)?)
        } else {
            None
        };
        Ok(DeleteStmt {
            table,
            alias,
            where_clause,
        })
    }

    fn parse_merge(&mut self) -> Result<MergeStmt> {
        self.expect(TokenType::Merge)?;
        self.dialect
            .require("MERGE", self.dialect.merge_min_version())?;
        self.match_token(TokenType::Into);

        let target = self.parse_object_name()?;
        self.parse_table_hints()?;
        let target_alias = self.parse_optional_alias(false)?;

        self.expect(TokenType::Using)?;
        let source = self.parse_table_factor()?;
        self.expect(TokenType::On)?;
        let on_condition = self.parse_expr(0)?;

        let mut clauses = Vec::new();
        while self.match_token(TokenType::When) {
            let matched = if self.match_token(TokenType::Not) {
                self.expect(TokenType::Matched)?;
                if self.match_token(TokenType::By) {
                    self.expect_keyword("TARGET")?;
                }
                false
            } else {
                self.expect(TokenType::Matched)?;
                true
            };

            let condition = if self.match_token(TokenType::And) {
                Some(self.parse_expr(0)?)
            } else {
                None
            };
            self.expect(TokenType::Then)?;

            let action = if matched {
                if self.match_token(TokenType::Update) {
                    self.expect(TokenType::Set)?;
                    MergeAction::Update(self.parse_assignment_list()?)
                } else if self.match_token(TokenType::Delete) {
                    MergeAction::Delete
                } else {
                    return Err(self.error("expected UPDATE or DELETE after WHEN MATCHED THEN"));
                }
            } else {
                if !self.match_token(TokenType::Insert) {
                    return Err(self.error("expected INSERT after WHEN NOT MATCHED THEN"));
                }
                let columns = if self.check(&TokenType::LParen) {
                    Some(self.parse_paren_identifier_list()?)
                } else {
                    None
                };
                self.expect(TokenType::Values)?;
                self.expect(TokenType::LParen)?;
                let values = self.parse_expr_list()?;
                self.expect(TokenType::RParen)?;
                MergeAction::Insert { columns, values }
            };

            clauses.push(MergeClause {
                matched,
                condition,
                action,
            });
        }

        if clauses.is_empty() {
            return Err(self.error("expected WHEN MATCHED or WHEN NOT MATCHED in MERGE"));
        }

        Ok(MergeStmt {
            target,
            target_alias,
            source,
            on_condition,
            clauses,
        })
    }

    // ----- DDL -----

    fn parse_create(&mut self) -> Result<Statement> {
        self.expect(TokenType::Create)?;

        let or_replace = if self.match_token(TokenType::Or) {
            self.expect_keyword("REPLACE")?;
            true
        } else {
            false
        };

        let mut temporary = if self.match_keyword("GLOBAL") {
            if !self.match_keyword("TEMPORARY") && !self.match_keyword("TEMP") {
                return Err(self.error("expected TEMPORARY after GLOBAL"));
            }
            Some(TempScope::Global)
        } else {
            self.match_keyword("LOCAL");
            if self.match_keyword("TEMPORARY") || self.match_keyword("TEMP") {
                Some(TempScope::Connection)
            } else {
                None
            }
        };

        if self.match_token(TokenType::View) {
            if temporary.is_some() {
                return Err(self.error("temporary views are not supported by the parser"));
            }
            return self.parse_create_view(or_replace);
        }
        if or_replace {
            return Err(self.error("expected VIEW after CREATE OR REPLACE"));
        }

        if !self.match_token(TokenType::Table) {
            return Err(self.error("expected TABLE or VIEW after CREATE"));
        }

        let if_not_exists = if self.match_keyword("IF") {
            self.expect(TokenType::Not)?;
            self.expect(TokenType::Exists)?;
            true
        } else {
            false
        };

        let name = self.parse_object_name()?;
        if temporary.is_none() {
            temporary = temp_scope_from_name(&name.name);
        }

        if self.match_token(TokenType::As) {
            let query = self.parse_query()?;
            return Ok(Statement::CreateTableAs(CreateTableAsStmt {
                name,
                temporary,
                query: Box::new(query),
            }));
        }

        self.expect(TokenType::LParen)?;
        let mut stmt = CreateTableStmt {
            name,
            temporary,
            if_not_exists,
            columns: Vec::new(),
            primary_key: Vec::new(),
            unique: Vec::new(),
            foreign_keys: Vec::new(),
        };

        loop {
            if !self.parse_table_constraint(&mut stmt)? {
                let (spec, fk) = self.parse_column_spec(stmt.columns.len())?;
                if let Some(fk) = fk {
                    stmt.foreign_keys.push(fk);
                }
                stmt.columns.push(spec);
            }
            if !self.match_token(TokenType::Comma) {
                break;
            }
        }
        self.expect(TokenType::RParen)?;

        // Table options (ENGINE=..., CHARSET=...) are accepted and ignored
        while !self.check(&TokenType::Semicolon) && !self.check(&TokenType::Eof) {
            if self.check(&TokenType::LParen) {
                self.skip_parenthesized()?;
            } else {
                self.advance();
            }
        }

        if stmt.columns.is_empty() {
            return Err(self.error("CREATE TABLE requires at least one column"));
        }

        Ok(Statement::CreateTable(stmt))
    }

    /// Table-level constraint; returns false when the item is a column
    fn parse_table_constraint(&mut self, stmt: &mut CreateTableStmt) -> Result<bool> {
        let constraint_name = if self.match_keyword("CONSTRAINT") {
            Some(self.parse_identifier()?)
        } else {
            None
        };

        if self.match_keyword("PRIMARY") {
            self.expect_keyword("KEY")?;
            stmt.primary_key = self.parse_paren_identifier_list()?;
            return Ok(true);
        }
        if self.match_keyword("UNIQUE") {
            if !self.match_keyword("KEY") {
                self.match_keyword("INDEX");
            }
            if !self.check(&TokenType::LParen) {
                self.parse_identifier()?;
            }
            stmt.unique.push(self.parse_paren_identifier_list()?);
            return Ok(true);
        }
        if self.match_keyword("FOREIGN") {
            self.expect_keyword("KEY")?;
            let columns = self.parse_paren_identifier_list()?;
            let (ref_table, ref_column) = self.parse_references()?;
            let column = match columns.as_slice() {
                [single] => single.clone(),
                _ => return Err(self.error("FOREIGN KEY must name exactly one column")),
            };
            stmt.foreign_keys.push(ForeignKeySpec {
                name: constraint_name,
                column,
                ref_table,
                ref_column,
            });
            return Ok(true);
        }
        if constraint_name.is_some() {
            return Err(self.error("expected PRIMARY KEY, UNIQUE or FOREIGN KEY after CONSTRAINT name"));
        }
        // MySQL inline KEY/INDEX definitions carry no constraint
        if (self.check_keyword("KEY") || self.check_keyword("INDEX"))
            && !self.peek_is_type_name(1)
        {
            self.advance();
            if !self.check(&TokenType::LParen) {
                self.parse_identifier()?;
            }
            self.parse_paren_identifier_list()?;
            return Ok(true);
        }
        Ok(false)
    }

    fn parse_references(&mut self) -> Result<(String, String)> {
        self.expect_keyword("REFERENCES")?;
        let ref_table = self.parse_object_name()?.name;
        let columns = self.parse_paren_identifier_list()?;
        let ref_column = match columns.as_slice() {
            [single] => single.clone(),
            _ => return Err(self.error("REFERENCES must name exactly one column")),
        };
        Ok((ref_table, ref_column))
    }

    fn parse_column_spec(&mut self, ordinal: usize) -> Result<(ColumnSpec, Option<ForeignKeySpec>)> {
        let name = self.parse_identifier()?;
        let type_name = self.parse_type_name()?;
        let base = type_name.split('(').next().unwrap_or("").trim().to_string();
        let col_type = ColumnType::from_sql_name(&base)
            .ok_or_else(|| self.error(&format!("unknown data type '{}'", base)))?;

        let mut def = ColumnDef::new(name.clone(), col_type);
        def.ordinal = ordinal;
        let (size, scale, members) = split_type_arguments(&type_name);
        match col_type {
            ColumnType::Text => def.size = size,
            ColumnType::Decimal => {
                def.size = size;
                def.scale = scale.or(size.map(|_| 0));
            }
            ColumnType::Enum | ColumnType::Set => def.allowed_values = members,
            _ => {}
        }
        if matches!(base.to_ascii_uppercase().as_str(), "SERIAL" | "BIGSERIAL") {
            def = def.identity();
        }

        let mut spec = ColumnSpec {
            def,
            primary_key: false,
            unique: false,
        };
        let mut foreign_key = None;

        loop {
            if self.match_token(TokenType::Not) {
                self.expect(TokenType::Null)?;
                spec.def.nullable = false;
            } else if self.match_token(TokenType::Null) {
                spec.def.nullable = true;
            } else if self.match_keyword("PRIMARY") {
                self.expect_keyword("KEY")?;
                spec.primary_key = true;
                spec.def.nullable = false;
            } else if self.match_keyword("UNIQUE") {
                self.match_keyword("KEY");
                spec.unique = true;
            } else if self.match_keyword("DEFAULT") {
                let expr = self.parse_prefix_expr()?;
                spec.def.default = Some(self.constant_value(&expr)?);
            } else if self.match_keyword("AUTO_INCREMENT") || self.match_keyword("AUTOINCREMENT") {
                spec.def = spec.def.clone().identity();
            } else if self.match_keyword("IDENTITY") {
                if self.check(&TokenType::LParen) {
                    self.skip_parenthesized()?;
                }
                spec.def = spec.def.clone().identity();
            } else if self.match_keyword("GENERATED") {
                // GENERATED { ALWAYS | BY DEFAULT } AS IDENTITY
                while !self.match_keyword("IDENTITY") {
                    if self.check(&TokenType::Eof) {
                        return Err(self.error("expected AS IDENTITY after GENERATED"));
                    }
                    self.advance();
                }
                spec.def = spec.def.clone().identity();
            } else if self.check_keyword("REFERENCES") {
                let (ref_table, ref_column) = self.parse_references()?;
                foreign_key = Some(ForeignKeySpec {
                    name: None,
                    column: name.clone(),
                    ref_table,
                    ref_column,
                });
            } else if self.match_keyword("CHECK") {
                self.skip_parenthesized()?;
            } else if self.match_keyword("COLLATE") || self.match_keyword("COMMENT") {
                self.advance();
            } else if self.match_keyword("UNSIGNED") || self.match_keyword("SIGNED") {
                // integer signedness is not modelled
            } else {
                break;
            }
        }

        Ok((spec, foreign_key))
    }

    /// Type name with its argument list, e.g. `VARCHAR(20)`, `DECIMAL(10,2)`, `ENUM('a','b')`
    pub(super) fn parse_type_name(&mut self) -> Result<String> {
        let mut words = Vec::new();
        loop {
            match &self.current().token_type {
                TokenType::Identifier(w) => {
                    let upper = w.to_ascii_uppercase();
                    // multi-word names: DOUBLE PRECISION, CHARACTER VARYING, SIGNED INTEGER
                    if !words.is_empty()
                        && !matches!(upper.as_str(), "PRECISION" | "VARYING" | "INTEGER" | "INT")
                    {
                        break;
                    }
                    words.push(upper);
                    self.advance();
                }
                TokenType::Set if words.is_empty() => {
                    words.push("SET".to_string());
                    self.advance();
                }
                _ => break,
            }
        }
        if words.is_empty() {
            return Err(self.error("expected data type"));
        }
        let mut name = words.join(" ");

        if self.match_token(TokenType::LParen) {
            let mut args = Vec::new();
            loop {
                match &self.current().token_type {
                    TokenType::Number(n) => args.push(n.clone()),
                    TokenType::String(s) => args.push(Value::Text(s.clone()).to_sql_literal()),
                    TokenType::Identifier(w) if w.eq_ignore_ascii_case("MAX") => {
                        args.push("MAX".to_string())
                    }
                    _ => return Err(self.error("expected type argument")),
                }
                self.advance();
                if !self.match_token(TokenType::Comma) {
                    break;
                }
            }
            self.expect(TokenType::RParen)?;
            name = format!("{}({})", name, args.join(","));
        }
        Ok(name)
    }

    fn parse_create_view(&mut self, or_replace: bool) -> Result<Statement> {
        let name = self.parse_object_name()?;
        let columns = if self.check(&TokenType::LParen) {
            self.parse_paren_identifier_list()?
        } else {
            Vec::new()
        };
        self.expect(TokenType::As)?;
        let query = self.parse_query()?;
        Ok(Statement::CreateView(CreateViewStmt {
            name,
            or_replace,
            columns,
            query: Box::new(query),
        }))
    }

    fn parse_drop(&mut self) -> Result<Statement> {
        self.expect(TokenType::Drop)?;
        let is_view = if self.match_token(TokenType::View) {
            true
        } else if self.match_token(TokenType::Table) {
            false
        } else {
            return Err(self.error("expected TABLE or VIEW after DROP"));
        };
        let if_exists = if self.match_keyword("IF") {
            self.expect(TokenType::Exists)?;
            true
        } else {
            false
        };
        let name = self.parse_object_name()?;
        let stmt = DropStmt { name, if_exists };
        Ok(if is_view {
            Statement::DropView(stmt)
        } else {
            Statement::DropTable(stmt)
        })
    }

    // ----- helpers -----

    pub(super) fn parse_object_name(&mut self) -> Result<ObjectName> {
        let first = self.parse_identifier()?;
        if self.match_token(TokenType::Dot) {
            let mut name = self.parse_identifier()?;
            let mut schema = first;
            // db.schema.table: keep the last two parts
            while self.match_token(TokenType::Dot) {
                schema = name;
                name = self.parse_identifier()?;
            }
            Ok(ObjectName::qualified(schema, name))
        } else {
            Ok(ObjectName::new(first))
        }
    }

    pub(super) fn parse_identifier(&mut self) -> Result<String> {
        match &self.current().token_type {
            TokenType::Identifier(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            TokenType::QuotedIdentifier(name, style) => {
                let (name, style) = (name.clone(), *style);
                self.check_quote_style(style)?;
                self.advance();
                Ok(name)
            }
            _ => Err(self.error("expected identifier")),
        }
    }

    pub(super) fn check_quote_style(&self, style: QuoteStyle) -> Result<()> {
        if self.dialect.allows_quote_style(style) {
            return Ok(());
        }
        let label = match style {
            QuoteStyle::Double => "double-quoted",
            QuoteStyle::Backtick => "backtick-quoted",
            QuoteStyle::Bracket => "bracket-quoted",
        };
        Err(self.error(&format!(
            "{} identifiers are not supported by {}",
            label,
            self.dialect.name()
        )))
    }

    fn parse_paren_identifier_list(&mut self) -> Result<Vec<String>> {
        self.expect(TokenType::LParen)?;
        let mut list = Vec::new();
        loop {
            list.push(self.parse_identifier()?);
            if !self.match_token(TokenType::Comma) {
                break;
            }
        }
        self.expect(TokenType::RParen)?;
        Ok(list)
    }

    pub(super) fn parse_expr_list(&mut self) -> Result<Vec<Expr>> {
        let mut list = Vec::new();
        loop {
            list.push(self.parse_expr(0)?);
            if !self.match_token(TokenType::Comma) {
                break;
            }
        }
        Ok(list)
    }

    /// Skip a balanced `( ... )` group starting at the current token
    fn skip_parenthesized(&mut self) -> Result<()> {
        self.expect(TokenType::LParen)?;
        let mut depth = 1;
        while depth > 0 {
            match self.current().token_type {
                TokenType::LParen => depth += 1,
                TokenType::RParen => depth -= 1,
                TokenType::Eof => return Err(self.error("expected ')'")),
                _ => {}
            }
            self.advance();
        }
        Ok(())
    }

    /// Evaluate a DEFAULT expression that must be constant
    fn constant_value(&self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal(v) => Ok(v.clone()),
            _ => Err(self.error("DEFAULT must be a literal value")),
        }
    }

    fn peek_is_type_name(&self, n: usize) -> bool {
        match self.peek(n) {
            TokenType::Identifier(w) => ColumnType::from_sql_name(w).is_some(),
            _ => false,
        }
    }

    pub(super) fn current(&self) -> &Token {
        &self.tokens[self.position]
    }

    pub(super) fn peek(&self, n: usize) -> &TokenType {
        let idx = (self.position + n).min(self.tokens.len() - 1);
        &self.tokens[idx].token_type
    }

    pub(super) fn peek_is(&self, n: usize, token_type: &TokenType) -> bool {
        std::mem::discriminant(self.peek(n)) == std::mem::discriminant(token_type)
    }

    pub(super) fn is_identifier_token(&self, n: usize) -> bool {
        matches!(
            self.peek(n),
            TokenType::Identifier(_) | TokenType::QuotedIdentifier(..)
        )
    }

    pub(super) fn advance(&mut self) {
        if self.position < self.tokens.len() - 1 {
            self.position += 1;
        }
    }

    pub(super) fn check(&self, token_type: &TokenType) -> bool {
        self.peek_is(0, token_type)
    }

    pub(super) fn match_token(&mut self, token_type: TokenType) -> bool {
        if self.check(&token_type) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(super) fn expect(&mut self, token_type: TokenType) -> Result<()> {
        if self.match_token(token_type.clone()) {
            Ok(())
        } else {
            Err(self.error(&format!("expected {}", token_type.describe())))
        }
    }

    /// Contextual (non-reserved) keyword test
    pub(super) fn check_keyword(&self, keyword: &str) -> bool {
        matches!(&self.current().token_type, TokenType::Identifier(w) if w.eq_ignore_ascii_case(keyword))
    }

    pub(super) fn match_keyword(&mut self, keyword: &str) -> bool {
        if self.check_keyword(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(super) fn expect_keyword(&mut self, keyword: &str) -> Result<()> {
        if self.match_keyword(keyword) {
            Ok(())
        } else {
            Err(self.error(&format!("expected {}", keyword)))
        }
    }

    pub(super) fn error(&self, msg: &str) -> SqlError {
        let token = self.current();
        self.dialect.syntax_error(&format!(
            "{} near '{}' at line {} column {}",
            msg,
            token.token_type.describe(),
            token.line,
            token.column
        ))
    }
}

/// `#name` is a connection temp table, `##name` a global one (SQL Server)
fn temp_scope_from_name(name: &str) -> Option<TempScope> {
    if name.starts_with("##") {
        Some(TempScope::Global)
    } else if name.starts_with('#') {
        Some(TempScope::Connection)
    } else {
        None
    }
}

/// Split `DECIMAL(10,2)` / `ENUM('a','b')` arguments into (size, scale, members)
fn split_type_arguments(type_name: &str) -> (Option<u32>, Option<u32>, Vec<String>) {
    let Some(open) = type_name.find('(') else {
        return (None, None, Vec::new());
    };
    let inner = type_name[open + 1..].trim_end_matches(')');
    if inner.starts_with('\'') {
        let members = split_quoted_list(inner);
        return (None, None, members);
    }
    let mut parts = inner.split(',').map(|p| p.trim().parse::<u32>().ok());
    let size = parts.next().flatten();
    let scale = parts.next().flatten();
    (size, scale, Vec::new())
}

fn split_quoted_list(inner: &str) -> Vec<String> {
    let mut members = Vec::new();
    let mut current = String::new();
    let mut in_quote = false;
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\'' if in_quote && chars.peek() == Some(&'\'') => {
                current.push('\'');
                chars.next();
            }
            '\'' => {
                if in_quote {
                    members.push(std::mem::take(&mut current));
                }
                in_quote = !in_quote;
            }
            _ if in_quote => current.push(c),
            _ => {}
        }
    }
    members
}
