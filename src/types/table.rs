/// Column, index and constraint definitions used by the storage engine
use super::Value;
use serde::{Deserialize, Serialize};

/// Semantic column type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    Boolean,
    Integer,
    Float,
    /// Exact numeric; precision lives in `ColumnDef::size`, scale in `ColumnDef::scale`
    Decimal,
    Text,
    Date,
    DateTime,
    /// Single member of `ColumnDef::allowed_values`
    Enum,
    /// Comma separated subset of `ColumnDef::allowed_values`
    Set,
}

impl ColumnType {
    /// Map a SQL type name (as written in DDL or CAST) to a column type
    pub fn from_sql_name(name: &str) -> Option<Self> {
        let upper = name.to_ascii_uppercase();
        let base = upper.split(['(', ' ']).next().unwrap_or("");
        let ty = match base {
            "BOOL" | "BOOLEAN" | "BIT" => ColumnType::Boolean,
            "INT" | "INTEGER" | "BIGINT" | "SMALLINT" | "TINYINT" | "MEDIUMINT" | "INT2"
            | "INT4" | "INT8" | "SERIAL" | "BIGSERIAL" | "SIGNED" | "UNSIGNED" => {
                ColumnType::Integer
            }
            "FLOAT" | "REAL" | "DOUBLE" | "FLOAT4" | "FLOAT8" | "BINARY_DOUBLE"
            | "BINARY_FLOAT" => ColumnType::Float,
            "DECIMAL" | "NUMERIC" | "NUMBER" | "MONEY" | "DEC" => ColumnType::Decimal,
            "CHAR" | "VARCHAR" | "NCHAR" | "NVARCHAR" | "VARCHAR2" | "NVARCHAR2" | "TEXT"
            | "NTEXT" | "CLOB" | "STRING" | "CHARACTER" | "LONGTEXT" | "MEDIUMTEXT"
            | "UUID" | "UNIQUEIDENTIFIER" => ColumnType::Text,
            "DATE" => ColumnType::Date,
            "DATETIME" | "DATETIME2" | "TIMESTAMP" | "SMALLDATETIME" | "TIMESTAMPTZ" => {
                ColumnType::DateTime
            }
            "ENUM" => ColumnType::Enum,
            "SET" => ColumnType::Set,
            _ => return None,
        };
        Some(ty)
    }

    /// Column type able to hold `value` (used for CREATE TABLE ... AS SELECT)
    pub fn infer(value: &Value) -> Self {
        match value {
            Value::Bool(_) => ColumnType::Boolean,
            Value::Integer(_) => ColumnType::Integer,
            Value::Float(_) => ColumnType::Float,
            Value::Decimal(_) => ColumnType::Decimal,
            Value::Date(_) => ColumnType::Date,
            Value::DateTime(_) => ColumnType::DateTime,
            Value::Null | Value::Text(_) | Value::List(_) => ColumnType::Text,
        }
    }
}

/// Column definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub col_type: ColumnType,
    /// Position in the table; stable once assigned
    pub ordinal: usize,
    pub nullable: bool,
    /// Max characters for text, precision for decimals
    pub size: Option<u32>,
    /// Decimal scale
    pub scale: Option<u32>,
    pub identity: bool,
    pub default: Option<Value>,
    /// Allowed members for ENUM/SET columns
    pub allowed_values: Vec<String>,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, col_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            col_type,
            ordinal: 0,
            nullable: true,
            size: None,
            scale: None,
            identity: false,
            default: None,
            allowed_values: Vec::new(),
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    pub fn decimal(mut self, precision: u32, scale: u32) -> Self {
        self.size = Some(precision);
        self.scale = Some(scale);
        self
    }

    /// Auto-increment column; implies NOT NULL
    pub fn identity(mut self) -> Self {
        self.identity = true;
        self.nullable = false;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn allowed<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_values = values.into_iter().map(Into::into).collect();
        self
    }
}

/// Secondary (or primary) index definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexDef {
    pub name: String,
    pub table: String,
    /// Ordered key columns
    pub columns: Vec<String>,
    pub unique: bool,
}

impl IndexDef {
    pub fn new<I, S>(name: impl Into<String>, table: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            table: table.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            unique: false,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

/// Foreign key from a local column to a column of another table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignKeyDef {
    pub name: String,
    pub column: String,
    pub ref_table: String,
    pub ref_column: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriggerEvent {
    BeforeInsert,
    AfterInsert,
    BeforeUpdate,
    AfterUpdate,
    BeforeDelete,
    AfterDelete,
}

/// Visibility of a temporary table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TempScope {
    /// Visible only to the connection that created it
    Connection,
    /// Visible to every connection sharing the database
    Global,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_def_builders() {
        let col = ColumnDef::new("price", ColumnType::Decimal).decimal(10, 2).not_null();
        assert_eq!(col.size, Some(10));
        assert_eq!(col.scale, Some(2));
        assert!(!col.nullable);

        let id = ColumnDef::new("id", ColumnType::Integer).identity();
        assert!(id.identity);
        assert!(!id.nullable);
    }

    #[test]
    fn test_type_names() {
        assert_eq!(ColumnType::from_sql_name("varchar(20)"), Some(ColumnType::Text));
        assert_eq!(ColumnType::from_sql_name("DECIMAL(10,2)"), Some(ColumnType::Decimal));
        assert_eq!(ColumnType::from_sql_name("datetime2"), Some(ColumnType::DateTime));
        assert_eq!(ColumnType::from_sql_name("geometry"), None);
    }
}
