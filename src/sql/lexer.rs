/// SQL Lexer - converts SQL text into tokens, and splits scripts into statements

use super::token::{Token, TokenType};
use crate::dialect::{Dialect, QuoteStyle};
use crate::error::{Result, SqlError};

pub struct Lexer<'a> {
    input: Vec<char>,
    dialect: &'a Dialect,
    position: usize,
    /// Byte offset of `position` in the source text
    offset: usize,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &str, dialect: &'a Dialect) -> Self {
        Self {
            input: input.chars().collect(),
            dialect,
            position: 0,
            offset: 0,
            line: 1,
            column: 1,
        }
    }

    pub fn tokenize(&mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();

        loop {
            let token = self.next_token()?;
            let is_eof = matches!(token.token_type, TokenType::Eof);
            tokens.push(token);
            if is_eof {
                break;
            }
        }

        Ok(tokens)
    }

    pub fn next_token(&mut self) -> Result<Token> {
        loop {
            self.skip_whitespace();
            if self.current_char() == '-' && self.peek_char() == Some('-') {
                self.skip_line_comment();
            } else if self.current_char() == '/' && self.peek_char() == Some('*') {
                self.skip_block_comment()?;
            } else {
                break;
            }
        }

        let line = self.line;
        let column = self.column;
        let start = self.offset;

        if self.is_eof() {
            return Ok(Token::new(TokenType::Eof, line, column, start, start));
        }

        let ch = self.current_char();

        let token_type = match ch {
            '\'' => TokenType::String(self.read_string('\'')?),
            '"' if self.dialect.double_quote_is_string() => TokenType::String(self.read_string('"')?),
            '"' => self.read_quoted_identifier('"', QuoteStyle::Double)?,
            '`' => self.read_quoted_identifier('`', QuoteStyle::Backtick)?,
            '[' => self.read_quoted_identifier(']', QuoteStyle::Bracket)?,

            '0'..='9' => self.read_number()?,
            '.' if self.peek_char().map_or(false, |c| c.is_ascii_digit()) => self.read_number()?,

            'N' | 'n' | 'E' | 'e' if self.peek_char() == Some('\'') => {
                // N'unicode' / E'escaped' string prefixes
                self.advance();
                TokenType::String(self.read_string('\'')?)
            }

            c if c.is_alphabetic() || c == '_' || c == '#' => self.read_identifier(),

            '@' => {
                self.advance();
                // @@ROWCOUNT style system variables keep one '@'
                if self.current_char() == '@' {
                    self.advance();
                    TokenType::NamedParam(format!("@{}", self.read_word()))
                } else {
                    let name = self.read_word();
                    if name.is_empty() {
                        return Err(self.error("expected parameter name after '@'", line, column));
                    }
                    TokenType::NamedParam(name)
                }
            }
            ':' => {
                self.advance();
                if self.current_char() == ':' {
                    self.advance();
                    TokenType::DoubleColon
                } else {
                    let name = self.read_word();
                    if name.is_empty() {
                        return Err(self.error("expected parameter name after ':'", line, column));
                    }
                    TokenType::NamedParam(name)
                }
            }
            '?' => {
                self.advance();
                TokenType::Placeholder
            }
            '$' if self.peek_char().map_or(false, |c| c.is_ascii_digit()) => {
                self.advance();
                let digits = self.read_word();
                let n = digits
                    .parse()
                    .map_err(|_| self.error(&format!("invalid parameter ${}", digits), line, column))?;
                TokenType::NumberedParam(n)
            }

            '=' => {
                self.advance();
                // tolerate C-style '=='
                if self.current_char() == '=' {
                    self.advance();
                }
                TokenType::Eq
            }
            '!' => {
                self.advance();
                if self.current_char() == '=' {
                    self.advance();
                    TokenType::Ne
                } else {
                    return Err(self.error("unexpected character '!'", line, column));
                }
            }
            '<' => {
                self.advance();
                if self.current_char() == '=' {
                    self.advance();
                    TokenType::Le
                } else if self.current_char() == '>' {
                    self.advance();
                    TokenType::Ne
                } else {
                    TokenType::Lt
                }
            }
            '>' => {
                self.advance();
                if self.current_char() == '=' {
                    self.advance();
                    TokenType::Ge
                } else {
                    TokenType::Gt
                }
            }
            '|' => {
                self.advance();
                if self.current_char() == '|' {
                    self.advance();
                    TokenType::Concat
                } else {
                    return Err(self.error("unexpected character '|'", line, column));
                }
            }
            '+' => self.single(TokenType::Plus),
            '-' => self.single(TokenType::Minus),
            '*' => self.single(TokenType::Star),
            '/' => self.single(TokenType::Slash),
            '%' => self.single(TokenType::Percent),
            '(' => self.single(TokenType::LParen),
            ')' => self.single(TokenType::RParen),
            ',' => self.single(TokenType::Comma),
            ';' => self.single(TokenType::Semicolon),
            '.' => self.single(TokenType::Dot),
            _ => {
                return Err(self.error(&format!("unexpected character '{}'", ch), line, column));
            }
        };

        Ok(Token::new(token_type, line, column, start, self.offset))
    }

    fn single(&mut self, token_type: TokenType) -> TokenType {
        self.advance();
        token_type
    }

    fn error(&self, msg: &str, line: usize, column: usize) -> SqlError {
        self.dialect
            .syntax_error(&format!("{} at line {} column {}", msg, line, column))
    }

    fn current_char(&self) -> char {
        if self.is_eof() {
            '\0'
        } else {
            self.input[self.position]
        }
    }

    fn peek_char(&self) -> Option<char> {
        self.input.get(self.position + 1).copied()
    }

    fn advance(&mut self) {
        if !self.is_eof() {
            let ch = self.input[self.position];
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
            self.offset += ch.len_utf8();
            self.position += 1;
        }
    }

    fn is_eof(&self) -> bool {
        self.position >= self.input.len()
    }

    fn skip_whitespace(&mut self) {
        while !self.is_eof() && self.current_char().is_whitespace() {
            self.advance();
        }
    }

    fn skip_line_comment(&mut self) {
        while !self.is_eof() && self.current_char() != '\n' {
            self.advance();
        }
    }

    fn skip_block_comment(&mut self) -> Result<()> {
        let (line, column) = (self.line, self.column);
        self.advance(); // '/'
        self.advance(); // '*'

        while !self.is_eof() {
            if self.current_char() == '*' && self.peek_char() == Some('/') {
                self.advance();
                self.advance();
                return Ok(());
            }
            self.advance();
        }

        Err(self.error("unterminated block comment", line, column))
    }

    /// Quoted string; the quote character doubles as its own escape
    fn read_string(&mut self, quote: char) -> Result<String> {
        let (line, column) = (self.line, self.column);
        self.advance(); // opening quote
        let mut value = String::new();

        loop {
            if self.is_eof() {
                return Err(self.error("unterminated string literal", line, column));
            }
            let ch = self.current_char();
            if ch == quote {
                if self.peek_char() == Some(quote) {
                    value.push(quote);
                    self.advance();
                    self.advance();
                    continue;
                }
                self.advance();
                return Ok(value);
            }
            if ch == '\\' && self.dialect.backslash_escapes() {
                self.advance();
                if self.is_eof() {
                    return Err(self.error("unterminated string literal", line, column));
                }
                let escaped = match self.current_char() {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    '0' => '\0',
                    c => c,
                };
                value.push(escaped);
            } else {
                value.push(ch);
            }
            self.advance();
        }
    }

    fn read_quoted_identifier(&mut self, close: char, style: QuoteStyle) -> Result<TokenType> {
        let (line, column) = (self.line, self.column);
        self.advance(); // opening quote
        let mut value = String::new();

        loop {
            if self.is_eof() {
                return Err(self.error("unterminated quoted identifier", line, column));
            }
            let ch = self.current_char();
            if ch == close {
                if self.peek_char() == Some(close) {
                    value.push(close);
                    self.advance();
                    self.advance();
                    continue;
                }
                self.advance();
                return Ok(TokenType::QuotedIdentifier(value, style));
            }
            value.push(ch);
            self.advance();
        }
    }

    fn read_number(&mut self) -> Result<TokenType> {
        let mut value = String::new();
        let mut seen_dot = false;

        while !self.is_eof() {
            let ch = self.current_char();
            if ch.is_ascii_digit() {
                value.push(ch);
            } else if ch == '.' && !seen_dot {
                seen_dot = true;
                value.push(ch);
            } else {
                break;
            }
            self.advance();
        }

        // Scientific notation (1.5e10)
        if matches!(self.current_char(), 'e' | 'E')
            && self
                .peek_char()
                .map_or(false, |c| c.is_ascii_digit() || c == '+' || c == '-')
        {
            value.push(self.current_char());
            self.advance();
            if matches!(self.current_char(), '+' | '-') {
                value.push(self.current_char());
                self.advance();
            }
            while !self.is_eof() && self.current_char().is_ascii_digit() {
                value.push(self.current_char());
                self.advance();
            }
        }

        Ok(TokenType::Number(value))
    }

    fn read_word(&mut self) -> String {
        let mut value = String::new();
        while !self.is_eof() {
            let ch = self.current_char();
            if ch.is_alphanumeric() || ch == '_' || ch == '$' || ch == '#' {
                value.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        value
    }

    fn read_identifier(&mut self) -> TokenType {
        let value = self.read_word();
        TokenType::from_keyword(&value).unwrap_or(TokenType::Identifier(value))
    }
}

/// Split a script into top-level statements.
///
/// Works on tokens, so semicolons inside string literals, quoted identifiers,
/// comments or parentheses never split. Returns the statement texts trimmed,
/// empty statements dropped.
pub fn split_statements(sql: &str, dialect: &Dialect) -> Result<Vec<String>> {
    let tokens = Lexer::new(sql, dialect).tokenize()?;
    let mut statements = Vec::new();
    let mut depth: usize = 0;
    let mut open_parens: Vec<&Token> = Vec::new();
    let mut stmt_start = 0;

    for token in &tokens {
        match token.token_type {
            TokenType::LParen => {
                depth += 1;
                open_parens.push(token);
            }
            TokenType::RParen => {
                if depth == 0 {
                    return Err(dialect.syntax_error(&format!(
                        "unbalanced ')' at line {} column {}",
                        token.line, token.column
                    )));
                }
                depth -= 1;
                open_parens.pop();
            }
            TokenType::Semicolon if depth == 0 => {
                push_statement(&mut statements, &sql[stmt_start..token.start]);
                stmt_start = token.end;
            }
            TokenType::Eof => {
                if let Some(open) = open_parens.last() {
                    return Err(dialect.syntax_error(&format!(
                        "unclosed '(' opened at line {} column {}",
                        open.line, open.column
                    )));
                }
                push_statement(&mut statements, &sql[stmt_start..token.start]);
            }
            _ => {}
        }
    }

    Ok(statements)
}

fn push_statement(statements: &mut Vec<String>, text: &str) {
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        statements.push(trimmed.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::DialectKind;

    fn lex(sql: &str, kind: DialectKind) -> Vec<TokenType> {
        let dialect = Dialect::latest(kind);
        Lexer::new(sql, &dialect)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.token_type)
            .collect()
    }

    #[test]
    fn test_lexer_simple_select() {
        let tokens = lex("SELECT * FROM users", DialectKind::MySql);
        assert_eq!(tokens.len(), 5);
        assert_eq!(tokens[0], TokenType::Select);
        assert_eq!(tokens[1], TokenType::Star);
        assert_eq!(tokens[2], TokenType::From);
        assert_eq!(tokens[3], TokenType::Identifier("users".into()));
        assert_eq!(tokens[4], TokenType::Eof);
    }

    #[test]
    fn test_lexer_quoted_identifiers() {
        let tokens = lex("SELECT [order id], \"x\"\"y\" FROM `t`", DialectKind::Sqlite);
        assert_eq!(tokens[1], TokenType::QuotedIdentifier("order id".into(), QuoteStyle::Bracket));
        assert_eq!(tokens[3], TokenType::QuotedIdentifier("x\"y".into(), QuoteStyle::Double));
        assert_eq!(tokens[5], TokenType::QuotedIdentifier("t".into(), QuoteStyle::Backtick));
    }

    #[test]
    fn test_lexer_strings() {
        let tokens = lex("'it''s' 'a\\nb'", DialectKind::MySql);
        assert_eq!(tokens[0], TokenType::String("it's".into()));
        assert_eq!(tokens[1], TokenType::String("a\nb".into()));

        let tokens = lex("'a\\nb'", DialectKind::Postgres);
        assert_eq!(tokens[0], TokenType::String("a\\nb".into()));

        // MySQL treats double quotes as strings
        let tokens = lex("\"hi\"", DialectKind::MySql);
        assert_eq!(tokens[0], TokenType::String("hi".into()));
    }

    #[test]
    fn test_lexer_parameters() {
        let tokens = lex("@id :name ? $2", DialectKind::Postgres);
        assert_eq!(tokens[0], TokenType::NamedParam("id".into()));
        assert_eq!(tokens[1], TokenType::NamedParam("name".into()));
        assert_eq!(tokens[2], TokenType::Placeholder);
        assert_eq!(tokens[3], TokenType::NumberedParam(2));
    }

    #[test]
    fn test_lexer_operators_and_comments() {
        let tokens = lex("a <> b -- trailing\n /* block */ || c::int", DialectKind::Postgres);
        assert_eq!(tokens[1], TokenType::Ne);
        assert_eq!(tokens[3], TokenType::Concat);
        assert_eq!(tokens[5], TokenType::DoubleColon);
    }

    #[test]
    fn test_temp_table_names() {
        let tokens = lex("SELECT * FROM #tmp JOIN ##global", DialectKind::SqlServer);
        assert_eq!(tokens[3], TokenType::Identifier("#tmp".into()));
        assert_eq!(tokens[5], TokenType::Identifier("##global".into()));
    }

    #[test]
    fn test_unterminated_string() {
        let dialect = Dialect::latest(DialectKind::MySql);
        let err = Lexer::new("SELECT 'abc", &dialect).tokenize().unwrap_err();
        assert!(err.to_string().contains("unterminated string literal"));
        let err = Lexer::new("SELECT `abc", &dialect).tokenize().unwrap_err();
        assert!(err.to_string().contains("unterminated quoted identifier"));
    }

    #[test]
    fn test_split_respects_quotes() {
        let dialect = Dialect::latest(DialectKind::MySql);
        let parts = split_statements(
            "SELECT ';' , CONCAT('a;','b') FROM `semi;table`; SELECT 2;",
            &dialect,
        )
        .unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0], "SELECT ';' , CONCAT('a;','b') FROM `semi;table`");
        assert_eq!(parts[1], "SELECT 2");
    }

    #[test]
    fn test_split_errors() {
        let dialect = Dialect::latest(DialectKind::MySql);
        let err = split_statements("SELECT (1; SELECT 2", &dialect).unwrap_err();
        assert!(err.to_string().contains("unclosed '('"));
        let err = split_statements("SELECT 1); SELECT 2", &dialect).unwrap_err();
        assert!(err.to_string().contains("unbalanced ')'"));
    }
}
