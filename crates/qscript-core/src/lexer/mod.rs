//! QBC source lexer.
//!
//! Splits source text into [`Token`]s for the compiler. Characters are fed
//! into a partial-token buffer, and every boundary (whitespace, punctuation,
//! a string delimiter, a comment start) finalizes the buffer into a typed
//! token.
//!
//! ## Failures
//!
//! Lexing stops at the first problem. The returned [`Error::Lex`] carries a
//! three line diagnostic:
//!
//! ```text
//! [Ln 2, Col 5, @14] QBC LEXER FAIL: Local argument found opened, but not closed: '<' found, but not '>'.
//!     foo <bar
//!         ^
//! ```

mod token;

use crate::error::{Error, Result};
use crate::key::parse_key_string;
use tracing::{debug, trace};

pub use token::{Keyword, Token, TokenKind};

/// Comment context the scanner is in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum CommentMode {
    #[default]
    None,
    Line,
    Block,
}

/// Tokenize source text in one call
pub fn tokenize(source: &str) -> Result<Vec<Token>> {
    Lexer::new(source).read()
}

/// Character-level scanner producing [`Token`]s
#[derive(Debug)]
pub struct Lexer<'a> {
    source: &'a str,
    offset: usize,
    buffer: String,
    buffer_start: usize,
    in_string: bool,
    in_wide_string: bool,
    ignore_spaces: bool,
    in_long_key: bool,
    comment: CommentMode,
    script_depth: usize,
    script_stack: Vec<usize>,
    tokens: Vec<Token>,
}

/// Characters that may appear in a name
fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn is_int_string(text: &str) -> bool {
    text.chars().all(|c| c == '-' || c.is_ascii_digit())
}

fn is_float_string(text: &str) -> bool {
    text.chars().all(|c| c == '.' || c == '-' || c.is_ascii_digit())
}

/// 1-based line and column of a byte offset
fn line_and_column(source: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(source.len());
    let before = &source[..offset];
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map_or(0, |i| i + 1);
    let column = source[line_start..offset].chars().count() + 1;
    (line, column)
}

impl<'a> Lexer<'a> {
    /// Creates a lexer over `source`
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            offset: 0,
            buffer: String::new(),
            buffer_start: 0,
            in_string: false,
            in_wide_string: false,
            ignore_spaces: false,
            in_long_key: false,
            comment: CommentMode::None,
            script_depth: 0,
            script_stack: Vec::new(),
            tokens: Vec::new(),
        }
    }

    /// Number of `script` blocks currently open
    pub fn script_depth(&self) -> usize {
        self.script_depth
    }

    /// Tokens produced so far
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Lex the whole source
    pub fn read(mut self) -> Result<Vec<Token>> {
        if self.source.trim().is_empty() {
            return Ok(Vec::new());
        }

        let chars: Vec<(usize, char)> = self.source.char_indices().collect();
        let mut i = 0;
        while i < chars.len() {
            let (offset, c) = chars[i];
            let next = chars.get(i + 1).map(|&(_, c)| c);
            self.offset = offset;
            i += self.read_char(c, next)?;
        }
        self.offset = self.source.len();

        self.post_read()?;
        debug!("Lexed {} token(s)", self.tokens.len());
        Ok(self.tokens)
    }

    /// Handle one character and return how many characters were consumed
    fn read_char(&mut self, c: char, next: Option<char>) -> Result<usize> {
        match self.comment {
            CommentMode::Line => {
                if c == '\n' {
                    self.comment = CommentMode::None;
                    self.push(TokenKind::NewLine, self.offset);
                }
                return Ok(1);
            }
            CommentMode::Block => {
                if c == '*' && next == Some('/') {
                    self.comment = CommentMode::None;
                    return Ok(2);
                }
                return Ok(1);
            }
            CommentMode::None => {}
        }

        if self.in_long_key {
            if c == '"' {
                self.finalize_long_key()?;
            } else {
                self.buffer.push(c);
            }
            return Ok(1);
        }

        if self.in_string {
            return self.read_string_char(c, next);
        }

        let consumed = match c {
            '/' if next == Some('/') => {
                self.finalize_token()?;
                self.comment = CommentMode::Line;
                2
            }
            '/' if next == Some('*') => {
                self.finalize_token()?;
                self.comment = CommentMode::Block;
                2
            }
            '\'' | '"' => {
                self.finalize_token()?;
                self.in_string = true;
                self.in_wide_string = c == '"';
                self.ignore_spaces = true;
                self.buffer_start = self.offset;
                1
            }
            '#' if next == Some('"') => {
                self.finalize_token()?;
                self.in_long_key = true;
                self.ignore_spaces = true;
                self.buffer_start = self.offset;
                2
            }
            '\n' => {
                self.finalize_token()?;
                self.push(TokenKind::NewLine, self.offset);
                1
            }
            ' ' | '\t' | '\r' => {
                self.finalize_token()?;
                1
            }
            '<' if self.buffer.is_empty()
                && next.is_some_and(|n| is_identifier_char(n) || n == '.') =>
            {
                self.start_buffer('<');
                1
            }
            '>' if !self.buffer.is_empty() => {
                self.buffer.push('>');
                self.finalize_token()?;
                1
            }
            '.' if self.continues_number(next) => {
                self.extend_buffer('.');
                1
            }
            '-' if self.buffer.is_empty() && next.is_some_and(|n| n.is_ascii_digit() || n == '.') => {
                self.start_buffer('-');
                1
            }
            '\\' if next == Some('{') => self.operator(TokenKind::InlinePackStruct, 2)?,
            '<' => match next {
                Some('=') => self.operator(TokenKind::LessThanEqual, 2)?,
                Some('<') => self.operator(TokenKind::ShiftLeft, 2)?,
                _ => self.operator(TokenKind::LessThan, 1)?,
            },
            '>' => match next {
                Some('=') => self.operator(TokenKind::GreaterThanEqual, 2)?,
                Some('>') => self.operator(TokenKind::ShiftRight, 2)?,
                _ => self.operator(TokenKind::GreaterThan, 1)?,
            },
            '!' if next == Some('=') => self.operator(TokenKind::NotEqual, 2)?,
            '|' if next == Some('|') => self.operator(TokenKind::Or, 2)?,
            ':' if next == Some(':') => self.operator(TokenKind::Colon, 2)?,
            '=' => self.operator(TokenKind::Equals, 1)?,
            '.' => self.operator(TokenKind::Dot, 1)?,
            ',' => self.operator(TokenKind::Comma, 1)?,
            '+' => self.operator(TokenKind::Plus, 1)?,
            '-' => self.operator(TokenKind::Minus, 1)?,
            '*' => self.operator(TokenKind::Multiply, 1)?,
            '/' => self.operator(TokenKind::Divide, 1)?,
            '(' => self.operator(TokenKind::OpenParen, 1)?,
            ')' => self.operator(TokenKind::CloseParen, 1)?,
            '{' => self.operator(TokenKind::OpenBrace, 1)?,
            '}' => self.operator(TokenKind::CloseBrace, 1)?,
            '[' => self.operator(TokenKind::OpenBracket, 1)?,
            ']' => self.operator(TokenKind::CloseBracket, 1)?,
            '&' => self.operator(TokenKind::And, 1)?,
            '$' => self.operator(TokenKind::Dollar, 1)?,
            c if is_identifier_char(c) => {
                self.extend_buffer(c);
                1
            }
            other => return Err(self.fail(self.offset, format!("Unexpected character '{other}'."))),
        };

        Ok(consumed)
    }

    fn read_string_char(&mut self, c: char, next: Option<char>) -> Result<usize> {
        if self.in_wide_string {
            if c == '"' {
                self.close_string()?;
            } else {
                self.buffer.push(c);
            }
            return Ok(1);
        }

        match (c, next) {
            ('\\', Some('\'')) | ('\'', Some('\'')) => {
                self.buffer.push('\'');
                Ok(2)
            }
            ('\'', _) => {
                self.close_string()?;
                Ok(1)
            }
            _ => {
                self.buffer.push(c);
                Ok(1)
            }
        }
    }

    /// Returns true if a `.` at the current position belongs to the buffer
    fn continues_number(&self, next: Option<char>) -> bool {
        if self.buffer.is_empty() {
            return next.is_some_and(|n| n.is_ascii_digit());
        }
        self.buffer.starts_with('<') || is_int_string(&self.buffer)
    }

    fn start_buffer(&mut self, c: char) {
        self.buffer_start = self.offset;
        self.buffer.push(c);
    }

    fn extend_buffer(&mut self, c: char) {
        if self.buffer.is_empty() {
            self.buffer_start = self.offset;
        }
        self.buffer.push(c);
    }

    fn push(&mut self, kind: TokenKind, offset: usize) {
        trace!("Token {:?} at {}", kind, offset);
        self.tokens.push(Token::new(kind, offset));
    }

    fn operator(&mut self, kind: TokenKind, length: usize) -> Result<usize> {
        self.finalize_token()?;
        self.push(kind, self.offset);
        Ok(length)
    }

    fn close_string(&mut self) -> Result<()> {
        self.finalize_token()?;
        self.in_string = false;
        self.in_wide_string = false;
        self.ignore_spaces = false;
        Ok(())
    }

    fn finalize_long_key(&mut self) -> Result<()> {
        let text = std::mem::take(&mut self.buffer);
        let start = self.buffer_start;
        self.in_long_key = false;
        self.ignore_spaces = false;

        match parse_key_string(text.trim()) {
            Some(key) => {
                self.push(TokenKind::RawKey(key), start);
                Ok(())
            }
            None => Err(self.fail(start, format!("Malformed raw key #\"{text}\"."))),
        }
    }

    /// Turn the partial-token buffer into a token.
    ///
    /// Inside a string the buffer becomes a (wide) string token, even when
    /// empty. Otherwise it is tried as a float, then an integer, then matched
    /// against the reserved words, and finally kept as a name or a local
    /// argument.
    pub fn finalize_token(&mut self) -> Result<()> {
        if self.buffer.is_empty() && !self.in_string {
            return Ok(());
        }

        let text: String = std::mem::take(&mut self.buffer)
            .chars()
            .filter(|&c| c != '\n' && c != '\r')
            .collect();
        let start = self.buffer_start;

        if self.in_string {
            if text.contains('"') {
                let (what, replacement) = if self.in_wide_string {
                    ("wide string", "''")
                } else {
                    ("string", "\\'\\'")
                };
                return Err(self.fail(
                    start,
                    format!(
                        "Illegal use of quotation marks in {what}; use double apostrophes ({replacement}) to emulate a quotation mark. -> ({text})"
                    ),
                ));
            }
            let kind = if self.in_wide_string {
                TokenKind::WideString(text)
            } else {
                TokenKind::String(text)
            };
            self.push(kind, start);
            return Ok(());
        }

        if !self.ignore_spaces {
            if text.contains('.') && is_float_string(&text) {
                if let Ok(value) = text.parse::<f32>() {
                    self.push(TokenKind::Float(value), start);
                    return Ok(());
                }
            }
            if is_int_string(&text) {
                if let Ok(value) = text.parse::<i32>() {
                    self.push(TokenKind::Int(value), start);
                    return Ok(());
                }
            }
        }

        // A bare `<` or `>` never reaches the buffer, so any run of two or
        // more characters is checked
        if text.chars().count() > 1 {
            let opened = text.starts_with('<');
            let closed = text.ends_with('>');
            if opened && !closed {
                return Err(self.fail(
                    start,
                    "Local argument found opened, but not closed: '<' found, but not '>'.",
                ));
            }
            if closed && !opened {
                return Err(self.fail(
                    start,
                    "Local argument found closed, but not opened: '>' found, but not '<'.",
                ));
            }
        }

        let kind = match Keyword::parse(&text) {
            Some(Keyword::Script) => {
                self.script_depth += 1;
                self.script_stack.push(self.tokens.len());
                TokenKind::Keyword(Keyword::Script)
            }
            Some(Keyword::EndScript) => {
                if self.script_stack.pop().is_none() {
                    return Err(self.fail(start, "endscript found without a matching script."));
                }
                self.script_depth -= 1;
                TokenKind::Keyword(Keyword::EndScript)
            }
            Some(keyword) => TokenKind::Keyword(keyword),
            None if text.len() > 2 && text.starts_with('<') && text.ends_with('>') => {
                TokenKind::Argument(text[1..text.len() - 1].to_string())
            }
            None => TokenKind::Name(text),
        };
        self.push(kind, start);
        Ok(())
    }

    fn post_read(&mut self) -> Result<()> {
        if self.in_string {
            let what = if self.in_wide_string { "wide string" } else { "string" };
            return Err(self.fail(self.buffer_start, format!("Unterminated {what}.")));
        }
        if self.in_long_key {
            return Err(self.fail(self.buffer_start, "Unterminated raw key."));
        }
        if self.comment == CommentMode::Block {
            return Err(self.fail(self.offset, "Unterminated block comment."));
        }

        self.finalize_token()?;

        if let Some(&index) = self.script_stack.last() {
            let offset = self.tokens.get(index).map_or(self.offset, |t| t.offset);
            return Err(self.fail(offset, "script opened, but never closed with endscript."));
        }
        Ok(())
    }

    /// Build the failure for a problem at `offset`
    fn fail(&self, offset: usize, message: impl Into<String>) -> Error {
        let message = message.into();
        let (line, column) = line_and_column(self.source, offset);
        let line_text = self.source.split('\n').nth(line - 1).unwrap_or("");
        let line_text = line_text.trim_end_matches('\r');
        let caret = format!("{}^", " ".repeat(column - 1));
        let diagnostic = format!(
            "[Ln {line}, Col {column}, @{offset}] QBC LEXER FAIL: {message}\n    {line_text}\n    {caret}"
        );
        debug!("Lexer failed at {}:{}: {}", line, column, message);

        Error::Lex {
            line,
            column,
            offset,
            message,
            diagnostic,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    fn lex_message(source: &str) -> String {
        match tokenize(source) {
            Err(Error::Lex { message, .. }) => message,
            other => panic!("expected lex failure, got {other:?}"),
        }
    }

    #[test]
    fn test_local_argument_brackets() {
        assert!(lex_message("<abc").contains("opened, but not closed"));
        assert!(lex_message("abc>").contains("closed, but not opened"));
        assert_eq!(kinds("<abc>"), vec![TokenKind::Argument("abc".into())]);
    }

    #[test]
    fn test_all_args_keyword() {
        assert_eq!(
            kinds("foo <...>"),
            vec![
                TokenKind::Name("foo".into()),
                TokenKind::Keyword(Keyword::AllArgs),
            ]
        );
    }

    #[test]
    fn test_string_quotation_marks() {
        let message = lex_message("x = 'say \"hi\"'");
        assert!(message.contains("Illegal use of quotation marks in string"));

        assert_eq!(
            kinds("'it''s'"),
            vec![TokenKind::String("it's".into())]
        );
        assert_eq!(
            kinds("'it\\'s' ''"),
            vec![
                TokenKind::String("it's".into()),
                TokenKind::String(String::new()),
            ]
        );
    }

    #[test]
    fn test_scan_script() {
        let source = "script foo\n\tbar x = <x> y = -1.5 // note\n\tbaz 'a b' \"w\" #\"0xD16B61E6\"\nendscript\n";
        assert_eq!(
            kinds(source),
            vec![
                TokenKind::Keyword(Keyword::Script),
                TokenKind::Name("foo".into()),
                TokenKind::NewLine,
                TokenKind::Name("bar".into()),
                TokenKind::Name("x".into()),
                TokenKind::Equals,
                TokenKind::Argument("x".into()),
                TokenKind::Name("y".into()),
                TokenKind::Equals,
                TokenKind::Float(-1.5),
                TokenKind::NewLine,
                TokenKind::Name("baz".into()),
                TokenKind::String("a b".into()),
                TokenKind::WideString("w".into()),
                TokenKind::RawKey(0xD16B_61E6),
                TokenKind::NewLine,
                TokenKind::Keyword(Keyword::EndScript),
                TokenKind::NewLine,
            ]
        );
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds("a<=b >= c != d || e & f :: $g \\{ } (1, 2) [3] a.b 4 - 5"),
            vec![
                TokenKind::Name("a".into()),
                TokenKind::LessThanEqual,
                TokenKind::Name("b".into()),
                TokenKind::GreaterThanEqual,
                TokenKind::Name("c".into()),
                TokenKind::NotEqual,
                TokenKind::Name("d".into()),
                TokenKind::Or,
                TokenKind::Name("e".into()),
                TokenKind::And,
                TokenKind::Name("f".into()),
                TokenKind::Colon,
                TokenKind::Dollar,
                TokenKind::Name("g".into()),
                TokenKind::InlinePackStruct,
                TokenKind::CloseBrace,
                TokenKind::OpenParen,
                TokenKind::Int(1),
                TokenKind::Comma,
                TokenKind::Int(2),
                TokenKind::CloseParen,
                TokenKind::OpenBracket,
                TokenKind::Int(3),
                TokenKind::CloseBracket,
                TokenKind::Name("a".into()),
                TokenKind::Dot,
                TokenKind::Name("b".into()),
                TokenKind::Int(4),
                TokenKind::Minus,
                TokenKind::Int(5),
            ]
        );
    }

    #[test]
    fn test_keywords_are_case_insensitive() {
        assert_eq!(
            kinds("If NOT Begin"),
            vec![
                TokenKind::Keyword(Keyword::If),
                TokenKind::Keyword(Keyword::Not),
                TokenKind::Keyword(Keyword::Begin),
            ]
        );
    }

    #[test]
    fn test_block_comment() {
        assert_eq!(
            kinds("a /* b\nc */ d"),
            vec![TokenKind::Name("a".into()), TokenKind::Name("d".into())]
        );
        assert!(lex_message("a /* b").contains("Unterminated block comment"));
    }

    #[test]
    fn test_unbalanced_scripts() {
        assert!(lex_message("script foo\n").contains("never closed"));
        assert!(lex_message("endscript").contains("without a matching script"));
    }

    #[test]
    fn test_unterminated_string() {
        assert!(lex_message("x = 'abc").contains("Unterminated string"));
        assert!(lex_message("x = #\"0x1234").contains("Unterminated raw key"));
    }

    #[test]
    fn test_diagnostic_layout() {
        let err = tokenize("a = 1\n  <bad").unwrap_err();
        let Error::Lex {
            line,
            column,
            offset,
            diagnostic,
            ..
        } = err
        else {
            panic!("expected lex failure");
        };

        assert_eq!((line, column, offset), (2, 3, 8));
        assert_eq!(
            diagnostic,
            "[Ln 2, Col 3, @8] QBC LEXER FAIL: Local argument found opened, but not closed: '<' found, but not '>'.\n      <bad\n      ^"
        );
    }

    #[test]
    fn test_token_offsets() {
        let tokens = tokenize("ab = 12").unwrap();
        let offsets: Vec<usize> = tokens.iter().map(|t| t.offset).collect();
        assert_eq!(offsets, vec![0, 3, 5]);
    }

    #[test]
    fn test_empty_source() {
        assert!(tokenize("  \n ").unwrap().is_empty());
    }

    #[test]
    fn test_line_and_column() {
        assert_eq!(line_and_column("abc\ndef", 0), (1, 1));
        assert_eq!(line_and_column("abc\ndef", 5), (2, 2));
        assert_eq!(line_and_column("abc\ndef", 100), (2, 4));
    }
}
