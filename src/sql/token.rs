/// Token types for the SQL lexer
use crate::dialect::QuoteStyle;
use phf::phf_map;

// Reserved words. Everything else (TOP, FETCH, CONFLICT, TEMPORARY, ...) is
// an identifier the parser matches contextually.
static KEYWORDS: phf::Map<&'static str, TokenType> = phf_map! {
    "select" => TokenType::Select,
    "from" => TokenType::From,
    "where" => TokenType::Where,
    "insert" => TokenType::Insert,
    "into" => TokenType::Into,
    "values" => TokenType::Values,
    "update" => TokenType::Update,
    "set" => TokenType::Set,
    "delete" => TokenType::Delete,
    "create" => TokenType::Create,
    "table" => TokenType::Table,
    "view" => TokenType::View,
    "drop" => TokenType::Drop,
    "and" => TokenType::And,
    "or" => TokenType::Or,
    "not" => TokenType::Not,
    "like" => TokenType::Like,
    "in" => TokenType::In,
    "between" => TokenType::Between,
    "is" => TokenType::Is,
    "null" => TokenType::Null,
    "as" => TokenType::As,
    "order" => TokenType::Order,
    "by" => TokenType::By,
    "asc" => TokenType::Asc,
    "desc" => TokenType::Desc,
    "limit" => TokenType::Limit,
    "offset" => TokenType::Offset,
    "distinct" => TokenType::Distinct,
    "all" => TokenType::All,
    "group" => TokenType::Group,
    "having" => TokenType::Having,
    "join" => TokenType::Join,
    "left" => TokenType::Left,
    "right" => TokenType::Right,
    "inner" => TokenType::Inner,
    "outer" => TokenType::Outer,
    "full" => TokenType::Full,
    "cross" => TokenType::Cross,
    "on" => TokenType::On,
    "union" => TokenType::Union,
    "exists" => TokenType::Exists,
    "case" => TokenType::Case,
    "when" => TokenType::When,
    "then" => TokenType::Then,
    "else" => TokenType::Else,
    "end" => TokenType::End,
    "with" => TokenType::With,
    "merge" => TokenType::Merge,
    "using" => TokenType::Using,
    "matched" => TokenType::Matched,
    "over" => TokenType::Over,
    "partition" => TokenType::Partition,
    "true" => TokenType::True,
    "false" => TokenType::False,
};

#[derive(Debug, Clone, PartialEq)]
pub enum TokenType {
    // Keywords
    Select,
    From,
    Where,
    Insert,
    Into,
    Values,
    Update,
    Set,
    Delete,
    Create,
    Table,
    View,
    Drop,
    And,
    Or,
    Not,
    Like,
    In,
    Between,
    Is,
    Null,
    As,
    Order,
    By,
    Asc,
    Desc,
    Limit,
    Offset,
    Distinct,
    All,
    Group,
    Having,
    Join,
    Left,
    Right,
    Inner,
    Outer,
    Full,
    Cross,
    On,
    Union,
    Exists,
    Case,
    When,
    Then,
    Else,
    End,
    With,
    Merge,
    Using,
    Matched,
    Over,
    Partition,
    True,
    False,

    // Operators
    Eq,          // =
    Ne,          // != or <>
    Lt,          // <
    Gt,          // >
    Le,          // <=
    Ge,          // >=
    Plus,        // +
    Minus,       // -
    Star,        // *
    Slash,       // /
    Percent,     // %
    Concat,      // ||
    DoubleColon, // ::

    // Delimiters
    LParen,
    RParen,
    Comma,
    Semicolon,
    Dot,

    // Literals
    /// Raw numeric text; the parser decides integer/decimal/float
    Number(String),
    String(String),
    Identifier(String),
    QuotedIdentifier(String, QuoteStyle),

    // Parameter markers
    /// `@name` or `:name` (name without the sigil)
    NamedParam(String),
    /// `?`
    Placeholder,
    /// `$1`
    NumberedParam(usize),

    Eof,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub token_type: TokenType,
    pub line: usize,
    pub column: usize,
    /// Byte range of the token in the source text
    pub start: usize,
    pub end: usize,
}

impl Token {
    pub fn new(token_type: TokenType, line: usize, column: usize, start: usize, end: usize) -> Self {
        Self {
            token_type,
            line,
            column,
            start,
            end,
        }
    }
}

impl TokenType {
    /// Reserved keyword lookup (case-insensitive)
    pub fn from_keyword(s: &str) -> Option<Self> {
        let lowercase = s.to_ascii_lowercase();
        KEYWORDS.get(lowercase.as_str()).cloned()
    }

    pub fn is_keyword(&self) -> bool {
        !matches!(
            self,
            TokenType::Eq
                | TokenType::Ne
                | TokenType::Lt
                | TokenType::Gt
                | TokenType::Le
                | TokenType::Ge
                | TokenType::Plus
                | TokenType::Minus
                | TokenType::Star
                | TokenType::Slash
                | TokenType::Percent
                | TokenType::Concat
                | TokenType::DoubleColon
                | TokenType::LParen
                | TokenType::RParen
                | TokenType::Comma
                | TokenType::Semicolon
                | TokenType::Dot
                | TokenType::Number(_)
                | TokenType::String(_)
                | TokenType::Identifier(_)
                | TokenType::QuotedIdentifier(..)
                | TokenType::NamedParam(_)
                | TokenType::Placeholder
                | TokenType::NumberedParam(_)
                | TokenType::Eof
        )
    }

    /// Text used when naming the token in error messages
    pub fn describe(&self) -> String {
        match self {
            TokenType::Number(n) => n.clone(),
            TokenType::String(s) => format!("'{}'", s),
            TokenType::Identifier(s) => s.clone(),
            TokenType::QuotedIdentifier(s, _) => format!("\"{}\"", s),
            TokenType::NamedParam(s) => format!("@{}", s),
            TokenType::Placeholder => "?".to_string(),
            TokenType::NumberedParam(n) => format!("${}", n),
            TokenType::Eof => "end of input".to_string(),
            TokenType::Eq => "=".to_string(),
            TokenType::Ne => "<>".to_string(),
            TokenType::Lt => "<".to_string(),
            TokenType::Gt => ">".to_string(),
            TokenType::Le => "<=".to_string(),
            TokenType::Ge => ">=".to_string(),
            TokenType::Plus => "+".to_string(),
            TokenType::Minus => "-".to_string(),
            TokenType::Star => "*".to_string(),
            TokenType::Slash => "/".to_string(),
            TokenType::Percent => "%".to_string(),
            TokenType::Concat => "||".to_string(),
            TokenType::DoubleColon => "::".to_string(),
            TokenType::LParen => "(".to_string(),
            TokenType::RParen => ")".to_string(),
            TokenType::Comma => ",".to_string(),
            TokenType::Semicolon => ";".to_string(),
            TokenType::Dot => ".".to_string(),
            keyword => format!("{:?}", keyword).to_uppercase(),
        }
    }
}
