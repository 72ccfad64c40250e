//! Script token opcodes.
//!
//! A compiled script body is a stream of one-byte tags, each optionally
//! followed by an operand:
//!
//! - `Name`, `HexInteger`, `LocalString`, `StringQs`: 4-byte key
//! - `Integer`: 4-byte signed integer
//! - `Float`: 4-byte float; `Pair`/`Vector`: 2/3 floats
//! - `String`, `WideString`: 4-byte length + bytes
//! - `FastIf`, `FastElse`, `ShortJump`: 2-byte offset
//! - `Jump`: 4-byte offset
//!
//! Everything else is a bare tag.

/// Script token tag byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    /// End of file (ignored)
    EndOfFile = 0x00,
    /// End of line
    EndOfLine = 0x01,
    /// End of line carrying a line number (debug builds)
    EndOfLineNumber = 0x02,
    /// `{`
    StartStruct = 0x03,
    /// `}`
    EndStruct = 0x04,
    /// `[`
    StartArray = 0x05,
    /// `]`
    EndArray = 0x06,
    /// Assignment `=`
    Equals = 0x07,
    /// Member access `.`
    Dot = 0x08,
    /// `,`
    Comma = 0x09,
    /// `-`
    Minus = 0x0A,
    /// `+`
    Add = 0x0B,
    /// `/`
    Divide = 0x0C,
    /// `*`
    Multiply = 0x0D,
    /// `(`
    OpenParenth = 0x0E,
    /// `)`
    CloseParenth = 0x0F,
    /// Debug information (ignored)
    DebugInfo = 0x10,
    /// Comparison `=`
    SameAs = 0x11,
    /// `<`
    LessThan = 0x12,
    /// `<=`
    LessThanEqual = 0x13,
    /// `>`
    GreaterThan = 0x14,
    /// `>=`
    GreaterThanEqual = 0x15,
    /// Name key
    Name = 0x16,
    /// Signed 32-bit integer
    Integer = 0x17,
    /// Raw hex integer
    HexInteger = 0x18,
    /// Enum (unused)
    Enum = 0x19,
    /// 32-bit float
    Float = 0x1A,
    /// `'...'` string
    String = 0x1B,
    /// Localized string key
    LocalString = 0x1C,
    /// Array (unused in scripts)
    Array = 0x1D,
    /// Three floats
    Vector = 0x1E,
    /// Two floats
    Pair = 0x1F,
    /// `begin`
    Begin = 0x20,
    /// `repeat`
    Repeat = 0x21,
    /// `break`
    Break = 0x22,
    /// `script`
    Script = 0x23,
    /// `endscript`
    EndScript = 0x24,
    /// `if`
    If = 0x25,
    /// `else`
    Else = 0x26,
    /// `elseif`
    ElseIf = 0x27,
    /// `endif`
    EndIf = 0x28,
    /// `return`
    Return = 0x29,
    /// Undefined (ignored)
    Undefined = 0x2A,
    /// Checksum name debug entry (ignored)
    ChecksumName = 0x2B,
    /// `<...>`
    AllArgs = 0x2C,
    /// Local argument marker, applies to the following name
    Arg = 0x2D,
    /// Jump with a 4-byte offset
    Jump = 0x2E,
    /// `Random`
    Random = 0x2F,
    /// `RandomRange`
    RandomRange = 0x30,
    /// `@` (ignored)
    At = 0x31,
    /// `||`
    Or = 0x32,
    /// `&`
    And = 0x33,
    /// Bitwise xor (unused)
    Xor = 0x34,
    /// `<<`
    ShiftLeft = 0x35,
    /// `>>`
    ShiftRight = 0x36,
    /// `Random2`
    Random2 = 0x37,
    /// `RandomRange2`
    RandomRange2 = 0x38,
    /// `NOT`
    Not = 0x39,
    /// Keyword `&`
    KeywordAnd = 0x3A,
    /// Keyword `||`
    KeywordOr = 0x3B,
    /// `switch`
    Switch = 0x3C,
    /// `endswitch`
    EndSwitch = 0x3D,
    /// `case`
    Case = 0x3E,
    /// `default`
    Default = 0x3F,
    /// `RandomNoRepeat`
    RandomNoRepeat = 0x40,
    /// `RandomPermute`
    RandomPermute = 0x41,
    /// `::`
    Colon = 0x42,
    /// Runtime C function (unused)
    RuntimeCFunction = 0x43,
    /// Runtime member function (unused)
    RuntimeMemberFunction = 0x44,
    /// `useheap` (unused)
    UseHeap = 0x45,
    /// Unknown keyword (unused)
    Unknown = 0x46,
    /// `if` with a 2-byte skip offset
    FastIf = 0x47,
    /// `else` with a 2-byte skip offset
    FastElse = 0x48,
    /// Short jump with a 2-byte offset
    ShortJump = 0x49,
    /// `\{`
    InlinePackStruct = 0x4A,
    /// `$`
    ArgumentPack = 0x4B,
    /// `"..."` string
    WideString = 0x4C,
    /// `!=`
    NotEqual = 0x4D,
    /// `qs(...)` key
    StringQs = 0x4E,
    /// `RandomFloat`
    RandomFloat = 0x4F,
    /// `RandomInteger`
    RandomInteger = 0x50,
}

impl TryFrom<u8> for Opcode {
    type Error = u8;

    fn try_from(value: u8) -> std::result::Result<Self, u8> {
        use Opcode::*;

        const TABLE: [Opcode; 0x51] = [
            EndOfFile, EndOfLine, EndOfLineNumber, StartStruct, EndStruct, StartArray, EndArray,
            Equals, Dot, Comma, Minus, Add, Divide, Multiply, OpenParenth, CloseParenth,
            DebugInfo, SameAs, LessThan, LessThanEqual, GreaterThan, GreaterThanEqual, Name,
            Integer, HexInteger, Enum, Float, String, LocalString, Array, Vector, Pair, Begin,
            Repeat, Break, Script, EndScript, If, Else, ElseIf, EndIf, Return, Undefined,
            ChecksumName, AllArgs, Arg, Jump, Random, RandomRange, At, Or, And, Xor, ShiftLeft,
            ShiftRight, Random2, RandomRange2, Not, KeywordAnd, KeywordOr, Switch, EndSwitch,
            Case, Default, RandomNoRepeat, RandomPermute, Colon, RuntimeCFunction,
            RuntimeMemberFunction, UseHeap, Unknown, FastIf, FastElse, ShortJump,
            InlinePackStruct, ArgumentPack, WideString, NotEqual, StringQs, RandomFloat,
            RandomInteger,
        ];

        TABLE.get(value as usize).copied().ok_or(value)
    }
}

impl From<Opcode> for u8 {
    fn from(opcode: Opcode) -> u8 {
        opcode as u8
    }
}

impl Opcode {
    /// Text emitted for tags that always render the same way
    pub fn fragment(self) -> Option<&'static str> {
        use Opcode::*;

        let text = match self {
            EndOfLine | EndOfLineNumber => "\n",
            StartStruct => "{",
            EndStruct => "}",
            StartArray => "[",
            EndArray => "]",
            Equals | SameAs => " = ",
            Dot => ".",
            Comma => ",",
            Minus => " - ",
            Add => " + ",
            Divide => " / ",
            Multiply => " * ",
            OpenParenth => "(",
            CloseParenth => ")",
            LessThan => " < ",
            LessThanEqual => " <= ",
            GreaterThan => " > ",
            GreaterThanEqual => " >= ",
            Begin => "begin",
            Repeat => "repeat ",
            Break => "break",
            Return => "return ",
            AllArgs => "<...>",
            Random => "Random",
            RandomRange => "RandomRange",
            Or => " || ",
            And => " & ",
            ShiftLeft => " << ",
            ShiftRight => " >> ",
            Random2 => "Random2",
            RandomRange2 => "RandomRange2",
            Not => "NOT",
            KeywordAnd => "&",
            KeywordOr => "||",
            RandomNoRepeat => "RandomNoRepeat",
            RandomPermute => "RandomPermute",
            Colon => "::",
            InlinePackStruct => "\\{",
            ArgumentPack => "$",
            NotEqual => " != ",
            RandomFloat => "RandomFloat",
            RandomInteger => "RandomInteger",
            _ => return None,
        };
        Some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_table_matches_discriminants() {
        for byte in 0..=0x50u8 {
            let opcode = Opcode::try_from(byte).unwrap();
            assert_eq!(u8::from(opcode), byte);
        }
    }

    #[test]
    fn test_unknown_opcode() {
        assert_eq!(Opcode::try_from(0x51), Err(0x51));
        assert_eq!(Opcode::try_from(0xFF), Err(0xFF));
    }

    #[test]
    fn test_fragments() {
        assert_eq!(Opcode::Equals.fragment(), Some(" = "));
        assert_eq!(Opcode::SameAs.fragment(), Some(" = "));
        assert_eq!(Opcode::InlinePackStruct.fragment(), Some("\\{"));
        assert_eq!(Opcode::Name.fragment(), None);
        assert_eq!(Opcode::EndOfFile.fragment(), None);
    }
}
