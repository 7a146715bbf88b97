/// Abstract Syntax Tree for SQL statements
use crate::types::{ColumnDef, TempScope, Value};

/// Top-level SQL statement
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Query(Query),
    Insert(InsertStmt),
    Update(UpdateStmt),
    Delete(DeleteStmt),
    Merge(MergeStmt),
    CreateTable(CreateTableStmt),
    /// CREATE [TEMPORARY] TABLE name AS SELECT ...
    CreateTableAs(CreateTableAsStmt),
    CreateView(CreateViewStmt),
    DropTable(DropStmt),
    DropView(DropStmt),
}

impl Statement {
    /// Statements that only read data
    pub fn is_query(&self) -> bool {
        matches!(self, Statement::Query(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Statement::Query(_) => "SELECT",
            Statement::Insert(_) => "INSERT",
            Statement::Update(_) => "UPDATE",
            Statement::Delete(_) => "DELETE",
            Statement::Merge(_) => "MERGE",
            Statement::CreateTable(_) | Statement::CreateTableAs(_) => "CREATE TABLE",
            Statement::CreateView(_) => "CREATE VIEW",
            Statement::DropTable(_) => "DROP TABLE",
            Statement::DropView(_) => "DROP VIEW",
        }
    }
}

/// Possibly schema-qualified object name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectName {
    pub schema: Option<String>,
    pub name: String,
}

impl ObjectName {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            schema: None,
            name: name.into(),
        }
    }

    pub fn qualified(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: Some(schema.into()),
            name: name.into(),
        }
    }
}

/// A full query: optional CTEs, a SELECT or UNION body, ordering and paging
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub ctes: Vec<Cte>,
    pub body: SetExpr,
    pub order_by: Vec<OrderByExpr>,
    pub limit: Option<Expr>,
    pub offset: Option<Expr>,
}

impl Query {
    pub fn from_select(select: SelectStmt) -> Self {
        Self {
            ctes: Vec::new(),
            body: SetExpr::Select(Box::new(select)),
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }
}

/// Common table expression: name [(columns)] AS (query)
#[derive(Debug, Clone, PartialEq)]
pub struct Cte {
    pub name: String,
    pub columns: Vec<String>,
    pub query: Box<Query>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SetExpr {
    Select(Box<SelectStmt>),
    /// left UNION [ALL] right
    Union {
        left: Box<SetExpr>,
        right: Box<SetExpr>,
        all: bool,
    },
    /// Parenthesized query inside a UNION
    Query(Box<Query>),
}

/// SELECT statement
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectStmt {
    pub distinct: bool,
    /// SQL Server TOP n
    pub top: Option<Expr>,
    pub columns: Vec<SelectColumn>,
    /// None for FROM-less SELECT
    pub from: Option<TableRef>,
    pub where_clause: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub having: Option<Expr>,
}

/// Table reference in FROM clause (supports JOINs and subqueries)
#[derive(Debug, Clone, PartialEq)]
pub enum TableRef {
    /// Single table: table_name [AS alias] [WITH (hints)]
    Table {
        name: ObjectName,
        alias: Option<String>,
        hints: Vec<String>,
    },
    /// JOIN: left JOIN_TYPE right [ON condition]
    Join {
        left: Box<TableRef>,
        right: Box<TableRef>,
        join_type: JoinType,
        on_condition: Option<Expr>,
    },
    /// Subquery in FROM: (SELECT ...) AS alias
    Subquery { query: Box<Query>, alias: String },
}

/// JOIN types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectColumn {
    /// *
    Star,
    /// alias.*
    QualifiedStar(String),
    /// expression [AS alias]
    Expr { expr: Expr, alias: Option<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderByExpr {
    pub expr: Expr,
    pub asc: bool,
    /// Explicit NULLS FIRST/LAST; None uses the dialect default
    pub nulls_first: Option<bool>,
}

/// INSERT statement
#[derive(Debug, Clone, PartialEq)]
pub struct InsertStmt {
    pub table: ObjectName,
    /// None means all columns in ordinal order
    pub columns: Option<Vec<String>>,
    pub source: InsertSource,
    /// MySQL INSERT IGNORE
    pub ignore: bool,
    /// MySQL ON DUPLICATE KEY UPDATE
    pub on_duplicate: Option<Vec<Assignment>>,
    /// Postgres/SQLite ON CONFLICT
    pub on_conflict: Option<OnConflict>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InsertSource {
    Values(Vec<Vec<Expr>>),
    Query(Box<Query>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct OnConflict {
    /// Conflict target columns; empty matches any unique index
    pub target: Vec<String>,
    pub action: ConflictAction,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConflictAction {
    DoNothing,
    DoUpdate {
        assignments: Vec<Assignment>,
        where_clause: Option<Expr>,
    },
}

/// column = expr
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub column: String,
    pub value: Expr,
}

/// UPDATE statement
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStmt {
    pub table: ObjectName,
    pub alias: Option<String>,
    pub assignments: Vec<Assignment>,
    pub where_clause: Option<Expr>,
}

/// DELETE statement
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteStmt {
    pub table: ObjectName,
    pub alias: Option<String>,
    pub where_clause: Option<Expr>,
}

/// MERGE INTO target USING source ON cond WHEN ...
#[derive(Debug, Clone, PartialEq)]
pub struct MergeStmt {
    pub target: ObjectName,
    pub target_alias: Option<String>,
    pub source: TableRef,
    pub on_condition: Expr,
    pub clauses: Vec<MergeClause>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergeClause {
    /// WHEN MATCHED (true) or WHEN NOT MATCHED (false)
    pub matched: bool,
    /// Extra AND condition
    pub condition: Option<Expr>,
    pub action: MergeAction,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MergeAction {
    Update(Vec<Assignment>),
    Delete,
    Insert {
        columns: Option<Vec<String>>,
        values: Vec<Expr>,
    },
}

/// CREATE TABLE statement
#[derive(Debug, Clone, PartialEq)]
pub struct CreateTableStmt {
    pub name: ObjectName,
    pub temporary: Option<TempScope>,
    pub if_not_exists: bool,
    pub columns: Vec<ColumnSpec>,
    /// Table-level PRIMARY KEY (..)
    pub primary_key: Vec<String>,
    /// Table-level UNIQUE (..)
    pub unique: Vec<Vec<String>>,
    pub foreign_keys: Vec<ForeignKeySpec>,
}

/// Column definition as written in DDL
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSpec {
    pub def: ColumnDef,
    pub primary_key: bool,
    pub unique: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKeySpec {
    pub name: Option<String>,
    pub column: String,
    pub ref_table: String,
    pub ref_column: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateTableAsStmt {
    pub name: ObjectName,
    pub temporary: Option<TempScope>,
    pub query: Box<Query>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateViewStmt {
    pub name: ObjectName,
    pub or_replace: bool,
    pub columns: Vec<String>,
    pub query: Box<Query>,
}

/// DROP TABLE / DROP VIEW
#[derive(Debug, Clone, PartialEq)]
pub struct DropStmt {
    pub name: ObjectName,
    pub if_exists: bool,
}

/// Parameter marker
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParamRef {
    /// @name or :name
    Named(String),
    /// `?`, numbered left to right from 0
    Positional(usize),
    /// $n (1-based)
    Numbered(usize),
}

/// Expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Column reference, optionally qualified by a table alias
    Column { table: Option<String>, name: String },

    Literal(Value),

    Parameter(ParamRef),

    BinaryOp {
        left: Box<Expr>,
        op: BinaryOperator,
        right: Box<Expr>,
    },

    UnaryOp { op: UnaryOperator, expr: Box<Expr> },

    /// Function call; COUNT(*) has no arguments
    Function {
        name: String,
        args: Vec<Expr>,
        distinct: bool,
    },

    /// Zero-argument built-in written without parentheses (CURRENT_DATE)
    NiladicFunction(String),

    /// function(args) OVER (...)
    Window(Box<WindowExpr>),

    /// expr [NOT] IN (v1, v2, ...)
    InList {
        expr: Box<Expr>,
        list: Vec<Expr>,
        negated: bool,
    },

    /// expr [NOT] IN (SELECT ...)
    InSubquery {
        expr: Box<Expr>,
        query: Box<Query>,
        negated: bool,
    },

    /// (a, b) row value; only valid as an IN operand
    Tuple(Vec<Expr>),

    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
        negated: bool,
    },

    Like {
        expr: Box<Expr>,
        pattern: Box<Expr>,
        negated: bool,
    },

    /// IS [NOT] NULL; `IS NOT NULL` is always `negated: true`, never a NOT node
    IsNull { expr: Box<Expr>, negated: bool },

    Exists { query: Box<Query>, negated: bool },

    /// Scalar subquery
    Subquery(Box<Query>),

    Case {
        operand: Option<Box<Expr>>,
        branches: Vec<(Expr, Expr)>,
        else_result: Option<Box<Expr>>,
    },

    Cast { expr: Box<Expr>, type_name: String },

    /// MySQL VALUES(col) inside ON DUPLICATE KEY UPDATE
    InsertValue(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    // Comparison
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,

    // Logical
    And,
    Or,

    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,

    /// ||
    Concat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
    Minus,
    Plus,
}

/// Binding strength of NOT as a prefix operator
pub const NOT_PRECEDENCE: u8 = 3;
/// Binding strength of IS/IN/LIKE/BETWEEN postfix forms
pub const PREDICATE_PRECEDENCE: u8 = 4;
/// Binding strength of unary minus/plus
pub const UNARY_PRECEDENCE: u8 = 7;

impl BinaryOperator {
    /// Operator precedence (higher = tighter binding)
    pub fn precedence(&self) -> u8 {
        match self {
            BinaryOperator::Or => 1,
            BinaryOperator::And => 2,
            BinaryOperator::Eq
            | BinaryOperator::Ne
            | BinaryOperator::Lt
            | BinaryOperator::Gt
            | BinaryOperator::Le
            | BinaryOperator::Ge => PREDICATE_PRECEDENCE,
            BinaryOperator::Add | BinaryOperator::Sub | BinaryOperator::Concat => 5,
            BinaryOperator::Mul | BinaryOperator::Div | BinaryOperator::Mod => 6,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOperator::Eq => "=",
            BinaryOperator::Ne => "<>",
            BinaryOperator::Lt => "<",
            BinaryOperator::Gt => ">",
            BinaryOperator::Le => "<=",
            BinaryOperator::Ge => ">=",
            BinaryOperator::And => "AND",
            BinaryOperator::Or => "OR",
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::Mod => "%",
            BinaryOperator::Concat => "||",
        }
    }

    pub fn is_comparison(&self) -> bool {
        self.precedence() == PREDICATE_PRECEDENCE
    }
}

/// Window function call
#[derive(Debug, Clone, PartialEq)]
pub struct WindowExpr {
    pub name: String,
    pub args: Vec<Expr>,
    pub partition_by: Vec<Expr>,
    pub order_by: Vec<OrderByExpr>,
    pub frame: Option<WindowFrame>,
}

/// ROWS BETWEEN start AND end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowFrame {
    pub start: FrameBound,
    pub end: FrameBound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameBound {
    UnboundedPreceding,
    Preceding(u64),
    CurrentRow,
    Following(u64),
    UnboundedFollowing,
}

impl FrameBound {
    /// Signed row offset relative to the current row, used to order bounds
    pub fn offset(&self) -> i128 {
        match self {
            FrameBound::UnboundedPreceding => i128::MIN,
            FrameBound::Preceding(n) => -(*n as i128),
            FrameBound::CurrentRow => 0,
            FrameBound::Following(n) => *n as i128,
            FrameBound::UnboundedFollowing => i128::MAX,
        }
    }
}

pub const AGGREGATE_FUNCTIONS: &[&str] = &["COUNT", "SUM", "AVG", "MIN", "MAX"];

pub fn is_aggregate_name(name: &str) -> bool {
    AGGREGATE_FUNCTIONS
        .iter()
        .any(|f| f.eq_ignore_ascii_case(name))
}

impl Expr {
    pub fn column(name: impl Into<String>) -> Self {
        Expr::Column {
            table: None,
            name: name.into(),
        }
    }

    pub fn qualified(table: impl Into<String>, name: impl Into<String>) -> Self {
        Expr::Column {
            table: Some(table.into()),
            name: name.into(),
        }
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        Expr::Literal(value.into())
    }

    pub fn binary(left: Expr, op: BinaryOperator, right: Expr) -> Self {
        Expr::BinaryOp {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    /// Pre-order walk over this expression and its children.
    ///
    /// Subqueries are not entered; they are separate scopes.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a Expr)) {
        visit(self);
        match self {
            Expr::BinaryOp { left, right, .. } => {
                left.walk(visit);
                right.walk(visit);
            }
            Expr::UnaryOp { expr, .. }
            | Expr::IsNull { expr, .. }
            | Expr::Cast { expr, .. }
            | Expr::InSubquery { expr, .. } => expr.walk(visit),
            Expr::Function { args, .. } | Expr::Tuple(args) => {
                for arg in args {
                    arg.walk(visit);
                }
            }
            Expr::Window(window) => {
                for arg in &window.args {
                    arg.walk(visit);
                }
                for p in &window.partition_by {
                    p.walk(visit);
                }
                for o in &window.order_by {
                    o.expr.walk(visit);
                }
            }
            Expr::InList { expr, list, .. } => {
                expr.walk(visit);
                for item in list {
                    item.walk(visit);
                }
            }
            Expr::Between {
                expr, low, high, ..
            } => {
                expr.walk(visit);
                low.walk(visit);
                high.walk(visit);
            }
            Expr::Like { expr, pattern, .. } => {
                expr.walk(visit);
                pattern.walk(visit);
            }
            Expr::Case {
                operand,
                branches,
                else_result,
            } => {
                if let Some(op) = operand {
                    op.walk(visit);
                }
                for (when, then) in branches {
                    when.walk(visit);
                    then.walk(visit);
                }
                if let Some(e) = else_result {
                    e.walk(visit);
                }
            }
            Expr::Column { .. }
            | Expr::Literal(_)
            | Expr::Parameter(_)
            | Expr::NiladicFunction(_)
            | Expr::Exists { .. }
            | Expr::Subquery(_)
            | Expr::InsertValue(_) => {}
        }
    }

    /// True if an aggregate call appears outside any window
    pub fn contains_aggregate(&self) -> bool {
        let mut found = false;
        self.walk(&mut |e: &Expr| {
            if let Expr::Function { name, .. } = e {
                if is_aggregate_name(name) {
                    found = true;
                }
            }
        });
        found
    }

    pub fn contains_window(&self) -> bool {
        let mut found = false;
        self.walk(&mut |e: &Expr| {
            if matches!(e, Expr::Window(_)) {
                found = true;
            }
        });
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence_order() {
        assert!(BinaryOperator::Or.precedence() < BinaryOperator::And.precedence());
        assert!(BinaryOperator::And.precedence() < NOT_PRECEDENCE);
        assert!(NOT_PRECEDENCE < BinaryOperator::Eq.precedence());
        assert!(BinaryOperator::Eq.precedence() < BinaryOperator::Add.precedence());
        assert!(BinaryOperator::Add.precedence() < BinaryOperator::Mul.precedence());
        assert!(BinaryOperator::Mul.precedence() < UNARY_PRECEDENCE);
    }

    #[test]
    fn test_contains_aggregate() {
        let e = Expr::binary(
            Expr::Function {
                name: "sum".into(),
                args: vec![Expr::column("amt")],
                distinct: false,
            },
            BinaryOperator::Gt,
            Expr::literal(10),
        );
        assert!(e.contains_aggregate());
        assert!(!Expr::column("amt").contains_aggregate());
    }

    #[test]
    fn test_frame_bound_ordering() {
        assert!(FrameBound::UnboundedPreceding.offset() < FrameBound::Preceding(5).offset());
        assert!(FrameBound::Preceding(1).offset() < FrameBound::CurrentRow.offset());
        assert!(FrameBound::Following(2).offset() < FrameBound::UnboundedFollowing.offset());
    }
}
