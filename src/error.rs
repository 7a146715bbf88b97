//! Error types for the mockdb engine
//!
//! Constraint and identifier errors carry the numeric code and message wording
//! of the dialect that raised them, so callers asserting on vendor codes see
//! the same values a real server would report.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SqlError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SqlError {
    /// Malformed SQL, or syntax the parser does not handle at all
    #[error("{message}")]
    Parse { code: i32, message: String },

    /// Syntax or feature the active dialect/version does not support
    #[error("{message}")]
    NotSupported { code: i32, message: String },

    #[error("{message}")]
    DuplicateKey {
        code: i32,
        key: String,
        value: String,
        message: String,
    },

    #[error("{message}")]
    NotNull {
        code: i32,
        column: String,
        message: String,
    },

    /// Foreign-key violation on insert/update of a child or delete of a parent
    #[error("{message}")]
    ForeignKey {
        code: i32,
        constraint: String,
        message: String,
    },

    /// Value too long, out of precision/scale, or not an allowed enum/set member
    #[error("{message}")]
    ValueOutOfRange {
        code: i32,
        column: String,
        message: String,
    },

    #[error("{message}")]
    UnknownColumn {
        code: i32,
        name: String,
        message: String,
    },

    #[error("{message}")]
    UnknownTable {
        code: i32,
        name: String,
        message: String,
    },

    #[error("{message}")]
    UnknownParameter {
        code: i32,
        name: String,
        message: String,
    },

    #[error("{message}")]
    AlreadyExists {
        code: i32,
        name: String,
        message: String,
    },

    #[error("{message}")]
    TypeMismatch { code: i32, message: String },

    #[error("{message}")]
    DivisionByZero { code: i32, message: String },

    /// MERGE or ON CONFLICT touched the same target row more than once
    #[error("{message}")]
    Cardinality { code: i32, message: String },

    /// No executor is registered for the requested dialect
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Malformed setup input (index definitions, column lists, ...)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl SqlError {
    /// Vendor numeric error code (0 when the error has none)
    pub fn code(&self) -> i32 {
        match self {
            SqlError::Parse { code, .. }
            | SqlError::NotSupported { code, .. }
            | SqlError::DuplicateKey { code, .. }
            | SqlError::NotNull { code, .. }
            | SqlError::ForeignKey { code, .. }
            | SqlError::ValueOutOfRange { code, .. }
            | SqlError::UnknownColumn { code, .. }
            | SqlError::UnknownTable { code, .. }
            | SqlError::UnknownParameter { code, .. }
            | SqlError::AlreadyExists { code, .. }
            | SqlError::TypeMismatch { code, .. }
            | SqlError::DivisionByZero { code, .. }
            | SqlError::Cardinality { code, .. } => *code,
            SqlError::NotImplemented(_)
            | SqlError::Transaction(_)
            | SqlError::InvalidArgument(_) => 0,
        }
    }

    /// ANSI SQLSTATE class for the error
    pub fn sql_state(&self) -> &'static str {
        match self {
            SqlError::Parse { .. } => "42000",
            SqlError::NotSupported { .. } | SqlError::NotImplemented(_) => "0A000",
            SqlError::DuplicateKey { .. }
            | SqlError::NotNull { .. }
            | SqlError::ForeignKey { .. } => "23000",
            SqlError::ValueOutOfRange { .. } => "22001",
            SqlError::UnknownColumn { .. } => "42S22",
            SqlError::UnknownTable { .. } => "42S02",
            SqlError::UnknownParameter { .. } => "07001",
            SqlError::AlreadyExists { .. } => "42S01",
            SqlError::TypeMismatch { .. } => "22018",
            SqlError::DivisionByZero { .. } => "22012",
            SqlError::Cardinality { .. } => "21000",
            SqlError::Transaction(_) => "25000",
            SqlError::InvalidArgument(_) => "HY024",
        }
    }

    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            SqlError::DuplicateKey { .. }
                | SqlError::NotNull { .. }
                | SqlError::ForeignKey { .. }
                | SqlError::ValueOutOfRange { .. }
        )
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        SqlError::InvalidArgument(msg.into())
    }
}
