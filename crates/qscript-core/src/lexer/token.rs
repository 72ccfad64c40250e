//! Lexer token types.

use crate::opcode::Opcode;

/// Reserved words, matched case-insensitively
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    /// `script`
    Script,
    /// `endscript`
    EndScript,
    /// `if`
    If,
    /// `else`
    Else,
    /// `elseif`
    ElseIf,
    /// `endif`
    EndIf,
    /// `begin`
    Begin,
    /// `repeat`
    Repeat,
    /// `break`
    Break,
    /// `switch`
    Switch,
    /// `case`
    Case,
    /// `default`
    Default,
    /// `endswitch`
    EndSwitch,
    /// `qs`
    Qs,
    /// `random`
    Random,
    /// `random2`
    Random2,
    /// `randomrange`
    RandomRange,
    /// `randomrange2`
    RandomRange2,
    /// `randomnorepeat`
    RandomNoRepeat,
    /// `randompermute`
    RandomPermute,
    /// `randomfloat`
    RandomFloat,
    /// `randominteger`
    RandomInteger,
    /// `return`
    Return,
    /// `not`
    Not,
    /// `<...>`
    AllArgs,
}

impl Keyword {
    /// Look up a reserved word, ignoring case
    pub fn parse(word: &str) -> Option<Self> {
        let keyword = match word.to_ascii_lowercase().as_str() {
            "script" => Self::Script,
            "endscript" => Self::EndScript,
            "if" => Self::If,
            "else" => Self::Else,
            "elseif" => Self::ElseIf,
            "endif" => Self::EndIf,
            "begin" => Self::Begin,
            "repeat" => Self::Repeat,
            "break" => Self::Break,
            "switch" => Self::Switch,
            "case" => Self::Case,
            "default" => Self::Default,
            "endswitch" => Self::EndSwitch,
            "qs" => Self::Qs,
            "random" => Self::Random,
            "random2" => Self::Random2,
            "randomrange" => Self::RandomRange,
            "randomrange2" => Self::RandomRange2,
            "randomnorepeat" => Self::RandomNoRepeat,
            "randompermute" => Self::RandomPermute,
            "randomfloat" => Self::RandomFloat,
            "randominteger" => Self::RandomInteger,
            "return" => Self::Return,
            "not" => Self::Not,
            "<...>" => Self::AllArgs,
            _ => return None,
        };
        Some(keyword)
    }

    /// Script token emitted for this keyword. `qs` has no token of its own.
    pub fn opcode(self) -> Option<Opcode> {
        let opcode = match self {
            Self::Script => Opcode::Script,
            Self::EndScript => Opcode::EndScript,
            Self::If => Opcode::If,
            Self::Else => Opcode::Else,
            Self::ElseIf => Opcode::ElseIf,
            Self::EndIf => Opcode::EndIf,
            Self::Begin => Opcode::Begin,
            Self::Repeat => Opcode::Repeat,
            Self::Break => Opcode::Break,
            Self::Switch => Opcode::Switch,
            Self::Case => Opcode::Case,
            Self::Default => Opcode::Default,
            Self::EndSwitch => Opcode::EndSwitch,
            Self::Qs => return None,
            Self::Random => Opcode::Random,
            Self::Random2 => Opcode::Random2,
            Self::RandomRange => Opcode::RandomRange,
            Self::RandomRange2 => Opcode::RandomRange2,
            Self::RandomNoRepeat => Opcode::RandomNoRepeat,
            Self::RandomPermute => Opcode::RandomPermute,
            Self::RandomFloat => Opcode::RandomFloat,
            Self::RandomInteger => Opcode::RandomInteger,
            Self::Return => Opcode::Return,
            Self::Not => Opcode::Not,
            Self::AllArgs => Opcode::AllArgs,
        };
        Some(opcode)
    }
}

/// What a token is, with its typed payload
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Integer literal
    Int(i32),
    /// Float literal
    Float(f32),
    /// `'...'` string, escapes resolved
    String(String),
    /// `"..."` wide string
    WideString(String),
    /// Bare identifier
    Name(String),
    /// `<name>` local argument, without the brackets
    Argument(String),
    /// `#"0xHHHHHHHH"` raw key
    RawKey(u32),
    /// Reserved word
    Keyword(Keyword),
    /// `=`
    Equals,
    /// `.`
    Dot,
    /// `,`
    Comma,
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Multiply,
    /// `/`
    Divide,
    /// `(`
    OpenParen,
    /// `)`
    CloseParen,
    /// `{`
    OpenBrace,
    /// `}`
    CloseBrace,
    /// `[`
    OpenBracket,
    /// `]`
    CloseBracket,
    /// `<`
    LessThan,
    /// `<=`
    LessThanEqual,
    /// `<<`
    ShiftLeft,
    /// `>`
    GreaterThan,
    /// `>=`
    GreaterThanEqual,
    /// `>>`
    ShiftRight,
    /// `!=`
    NotEqual,
    /// `||`
    Or,
    /// `&`
    And,
    /// `::`
    Colon,
    /// `$`
    Dollar,
    /// `\{`
    InlinePackStruct,
    /// Line break
    NewLine,
}

impl TokenKind {
    /// Returns true for `script`
    pub fn is_script_start(&self) -> bool {
        matches!(self, Self::Keyword(Keyword::Script))
    }

    /// Returns true for `endscript`
    pub fn is_script_end(&self) -> bool {
        matches!(self, Self::Keyword(Keyword::EndScript))
    }
}

/// A lexed token and where it started in the source
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// Token kind and payload
    pub kind: TokenKind,
    /// Byte offset of the token's first character
    pub offset: usize,
}

impl Token {
    /// Creates a new token
    pub fn new(kind: TokenKind, offset: usize) -> Self {
        Self { kind, offset }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keywords_ignore_case() {
        assert_eq!(Keyword::parse("EndScript"), Some(Keyword::EndScript));
        assert_eq!(Keyword::parse("RANDOMRANGE2"), Some(Keyword::RandomRange2));
        assert_eq!(Keyword::parse("<...>"), Some(Keyword::AllArgs));
        assert_eq!(Keyword::parse("scripts"), None);
    }

    #[test]
    fn test_keyword_opcodes() {
        assert_eq!(Keyword::Begin.opcode(), Some(Opcode::Begin));
        assert_eq!(Keyword::Not.opcode(), Some(Opcode::Not));
        assert_eq!(Keyword::Qs.opcode(), None);
    }
}
