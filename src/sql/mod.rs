/// Multi-dialect SQL front end and executor
///
/// Architecture:
/// - Lexer: tokenizes SQL text and splits scripts into statements
/// - Parser: builds the AST, consulting the dialect for every gated construct
/// - Printer: canonical SQL text for expressions and queries
/// - Evaluator: expression semantics (three-valued logic, coercion, functions)
/// - Executor: SELECT pipeline over the catalog
/// - Mutation: INSERT/UPDATE/DELETE/MERGE and DDL
/// - Plan: advisory EXPLAIN output

pub mod token;
pub mod lexer;
pub mod ast;
pub mod parser;
mod expr_parser;
pub mod printer;
pub mod params;
mod pattern;
pub mod evaluator;
mod aggregate;
mod window;
pub mod executor;
pub mod mutation;
pub mod plan;

pub use token::{Token, TokenType};
pub use lexer::{split_statements, Lexer};
pub use ast::{BinaryOperator, Expr, Query, SelectStmt, Statement};
pub use parser::Parser;
pub use printer::ExprPrinter;
pub use params::Params;
pub use evaluator::ExprEvaluator;
pub use executor::{ExecContext, QueryExecutor, QueryResult, RowSet};
pub use mutation::execute_statement;
pub use plan::{QueryPlan, QueryPlanner, ScanMethod};

use crate::dialect::Dialect;
use crate::error::Result;

/// Parse exactly one statement
pub fn parse(sql: &str, dialect: &Dialect) -> Result<Statement> {
    Parser::new(sql, dialect)?.parse()
}

/// Parse every top-level statement of a script
pub fn parse_multi(sql: &str, dialect: &Dialect) -> Result<Vec<Statement>> {
    Parser::new(sql, dialect)?.parse_all()
}

/// Parse a WHERE fragment such as `id = 1 OR name = 'Bob'`
pub fn parse_where(expr: &str, dialect: &Dialect) -> Result<Expr> {
    Parser::new(expr, dialect)?.parse_standalone_expr()
}

/// Parse a scalar expression such as `price * qty`
pub fn parse_scalar(expr: &str, dialect: &Dialect) -> Result<Expr> {
    Parser::new(expr, dialect)?.parse_standalone_expr()
}

/// Canonical text of an expression; re-parsing and re-printing is stable
pub fn print_expr(expr: &Expr) -> String {
    ExprPrinter::new().print(expr)
}
