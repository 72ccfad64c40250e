//! QB encoder.
//!
//! Turns the token list produced by the [`lexer`](crate::lexer) into a QB
//! file. Supported top-level statements:
//!
//! - `name = <integer>` becomes an Integer item
//! - `script NAME ... endscript` becomes a Script item
//!
//! Script bodies are stored uncompressed, with the body CRC filled in, so the
//! decompiler never needs to decompress them.

use crate::binary::{BinaryWriter, Endian};
use crate::decompile::{ItemType, HEADER_SIZE};
use crate::error::{Error, Result};
use crate::job::GameTarget;
use crate::key::{is_canonical_key, parse_key_string, qb_key, qs_key, KeyRegistry};
use crate::lexer::{Keyword, Token, TokenKind};
use crate::opcode::Opcode;
use tracing::{debug, trace};

/// Flags byte written into every item's type quad
const ITEM_FLAGS: u8 = 0x20;

/// Script token for a punctuation or operator token
fn punctuation_opcode(kind: &TokenKind, in_parentheses: bool) -> Option<Opcode> {
    let opcode = match kind {
        TokenKind::NewLine => Opcode::EndOfLine,
        TokenKind::Equals if in_parentheses => Opcode::SameAs,
        TokenKind::Equals => Opcode::Equals,
        TokenKind::Dot => Opcode::Dot,
        TokenKind::Comma => Opcode::Comma,
        TokenKind::Plus => Opcode::Add,
        TokenKind::Minus => Opcode::Minus,
        TokenKind::Multiply => Opcode::Multiply,
        TokenKind::Divide => Opcode::Divide,
        TokenKind::OpenBrace => Opcode::StartStruct,
        TokenKind::CloseBrace => Opcode::EndStruct,
        TokenKind::OpenBracket => Opcode::StartArray,
        TokenKind::CloseBracket => Opcode::EndArray,
        TokenKind::LessThan => Opcode::LessThan,
        TokenKind::LessThanEqual => Opcode::LessThanEqual,
        TokenKind::ShiftLeft => Opcode::ShiftLeft,
        TokenKind::GreaterThan => Opcode::GreaterThan,
        TokenKind::GreaterThanEqual => Opcode::GreaterThanEqual,
        TokenKind::ShiftRight => Opcode::ShiftRight,
        TokenKind::NotEqual => Opcode::NotEqual,
        TokenKind::Or => Opcode::Or,
        TokenKind::And => Opcode::And,
        TokenKind::Colon => Opcode::Colon,
        TokenKind::Dollar => Opcode::ArgumentPack,
        TokenKind::InlinePackStruct => Opcode::InlinePackStruct,
        _ => return None,
    };
    Some(opcode)
}

/// Numeric value of an `Int` or `Float` token
fn numeric(kind: &TokenKind) -> Option<f32> {
    match kind {
        TokenKind::Int(value) => Some(*value as f32),
        TokenKind::Float(value) => Some(*value),
        _ => None,
    }
}

/// Match `( n , n )` or `( n , n , n )` starting at an open parenthesis.
///
/// Returns the components and the number of tokens the tuple spans.
fn numeric_tuple(tokens: &[Token]) -> Option<(Vec<f32>, usize)> {
    let mut values = Vec::with_capacity(3);
    let mut index = 1;

    loop {
        values.push(numeric(&tokens.get(index)?.kind)?);
        index += 1;
        match tokens.get(index)?.kind {
            TokenKind::Comma if values.len() < 3 => index += 1,
            TokenKind::CloseParen if values.len() >= 2 => return Some((values, index + 1)),
            _ => return None,
        }
    }
}

/// Encodes token lists into QB files
#[derive(Debug)]
pub struct Encoder<'a> {
    registry: &'a mut KeyRegistry,
    endian: Endian,
    target: GameTarget,
    container: u32,
}

impl<'a> Encoder<'a> {
    /// Creates an encoder for the file `file_name`.
    ///
    /// Every name the encoder hashes is added to `registry`.
    pub fn new(registry: &'a mut KeyRegistry, file_name: &str) -> Self {
        Self {
            registry,
            endian: Endian::Big,
            target: GameTarget::default(),
            container: qb_key(file_name),
        }
    }

    /// Sets the byte order of the output file
    pub fn endian(mut self, endian: Endian) -> Self {
        self.endian = endian;
        self
    }

    /// Sets the target game
    pub fn target(mut self, target: GameTarget) -> Self {
        self.target = target;
        self
    }

    /// Encode a complete token list into a QB file
    pub fn encode(mut self, tokens: &[Token]) -> Result<Vec<u8>> {
        let mut out = BinaryWriter::new(self.endian);
        out.write_u32(0);
        out.write_u32(0);
        out.pad(HEADER_SIZE - 8, 0);

        let mut index = 0;
        let mut items = 0usize;
        while index < tokens.len() {
            let token = &tokens[index];
            index = match &token.kind {
                TokenKind::NewLine => index + 1,
                TokenKind::Keyword(Keyword::Script) => {
                    items += 1;
                    self.encode_script(tokens, index, &mut out)?
                }
                TokenKind::Name(_) | TokenKind::RawKey(_) => {
                    items += 1;
                    self.encode_integer(tokens, index, &mut out)?
                }
                other => {
                    return Err(Error::compile(format!(
                        "unexpected {:?} at offset {} outside of a script",
                        other, token.offset
                    )))
                }
            };
        }

        let size = out.tell() as u32;
        out.patch_u32_at(4, size);
        debug!("Encoded {} item(s), {} bytes", items, size);
        Ok(out.into_bytes())
    }

    /// Key for a name as written in source. Unresolved names come back from
    /// the decompiler as `0xHHHHHHHH` and keep that key as is.
    fn literal_key(&mut self, name: &str) -> u32 {
        match parse_key_string(name) {
            Some(key) if is_canonical_key(name) => key,
            _ => self.registry.add(name),
        }
    }

    fn name_key(&mut self, token: &Token) -> Result<u32> {
        match &token.kind {
            TokenKind::Name(name) => Ok(self.literal_key(name)),
            TokenKind::RawKey(key) => Ok(*key),
            other => Err(Error::compile(format!(
                "expected a name at offset {}, found {:?}",
                token.offset, other
            ))),
        }
    }

    fn write_item_quad(out: &mut BinaryWriter, item_type: ItemType) {
        out.write_bytes(&[0, ITEM_FLAGS, item_type as u8, 0]);
    }

    /// `name = value`, returns the index after the statement
    fn encode_integer(
        &mut self,
        tokens: &[Token],
        start: usize,
        out: &mut BinaryWriter,
    ) -> Result<usize> {
        let name = self.name_key(&tokens[start])?;
        let statement = tokens.get(start + 1..start + 3).map(|t| (&t[0].kind, &t[1].kind));
        let Some((TokenKind::Equals, TokenKind::Int(value))) = statement else {
            return Err(Error::compile(format!(
                "expected `= <integer>` after the name at offset {}",
                tokens[start].offset
            )));
        };

        trace!("Integer item {:#010X} = {}", name, value);
        Self::write_item_quad(out, ItemType::Integer);
        out.write_u32(name);
        out.write_u32(self.container);
        out.write_i32(*value);
        Ok(start + 3)
    }

    /// `script NAME ... endscript`, returns the index after `endscript`
    fn encode_script(
        &mut self,
        tokens: &[Token],
        start: usize,
        out: &mut BinaryWriter,
    ) -> Result<usize> {
        let name_token = tokens.get(start + 1).ok_or_else(|| {
            Error::compile(format!("script at offset {} has no name", tokens[start].offset))
        })?;
        let name = self.name_key(name_token)?;

        let end = tokens[start + 2..]
            .iter()
            .position(|t| t.kind.is_script_end())
            .map(|p| start + 2 + p)
            .ok_or_else(|| {
                Error::compile(format!(
                    "script at offset {} has no endscript",
                    tokens[start].offset
                ))
            })?;

        let body = self.encode_body(&tokens[start + 2..end])?;
        trace!("Script item {:#010X}: {} byte body", name, body.len());

        Self::write_item_quad(out, ItemType::Script);
        out.write_u32(name);
        out.write_u32(self.container);
        out.write_i32(0);
        out.write_u32(0);
        out.write_u32(crc32fast::hash(&body));
        out.write_u32(body.len() as u32);
        out.write_u32(body.len() as u32);
        out.write_bytes(&body);
        out.pad_to_nearest(4, 0);

        Ok(end + 1)
    }

    /// Encode a script body, stored in the opposite byte order of the file
    fn encode_body(&mut self, tokens: &[Token]) -> Result<Vec<u8>> {
        let mut body = BinaryWriter::new(self.endian.inverse());
        let mut parentheses = 0usize;
        let mut index = 0;

        while index < tokens.len() {
            let token = &tokens[index];
            index += 1;

            match &token.kind {
                TokenKind::Int(value) => {
                    body.write_u8(Opcode::Integer.into());
                    body.write_i32(*value);
                }
                TokenKind::Float(value) => {
                    body.write_u8(Opcode::Float.into());
                    body.write_f32(*value);
                }
                TokenKind::String(text) => {
                    body.write_u8(Opcode::String.into());
                    body.write_u32(text.len() as u32 + 1);
                    body.write_term_string(text);
                }
                TokenKind::WideString(text) => {
                    body.write_u8(Opcode::WideString.into());
                    body.invert_endian();
                    body.write_u32(text.len() as u32 + 1);
                    body.invert_endian();
                    body.write_term_string(text);
                }
                TokenKind::Name(_) | TokenKind::RawKey(_) => {
                    let key = self.name_key(token)?;
                    body.write_u8(Opcode::Name.into());
                    body.write_u32(key);
                }
                TokenKind::Argument(name) => {
                    let key = self.literal_key(name);
                    body.write_u8(Opcode::Arg.into());
                    body.write_u8(Opcode::Name.into());
                    body.write_u32(key);
                }
                TokenKind::Keyword(Keyword::Qs) => {
                    index += self.encode_qs(&tokens[index - 1..], &mut body)?;
                }
                TokenKind::Keyword(Keyword::Script) => {
                    return Err(Error::compile(format!(
                        "script at offset {} is nested in another script",
                        token.offset
                    )));
                }
                TokenKind::Keyword(keyword) => {
                    // Every keyword other than `qs` has its own token
                    if let Some(opcode) = keyword.opcode() {
                        body.write_u8(opcode.into());
                    }
                }
                TokenKind::OpenParen => {
                    if let Some((values, span)) = numeric_tuple(&tokens[index - 1..]) {
                        let opcode = if values.len() == 3 {
                            Opcode::Vector
                        } else {
                            Opcode::Pair
                        };
                        body.write_u8(opcode.into());
                        for value in values {
                            body.write_f32(value);
                        }
                        index += span - 1;
                    } else {
                        parentheses += 1;
                        body.write_u8(Opcode::OpenParenth.into());
                    }
                }
                TokenKind::CloseParen => {
                    parentheses = parentheses.saturating_sub(1);
                    body.write_u8(Opcode::CloseParenth.into());
                }
                other => match punctuation_opcode(other, parentheses > 0) {
                    Some(opcode) => body.write_u8(opcode.into()),
                    None => {
                        return Err(Error::compile(format!(
                            "cannot encode {:?} at offset {}",
                            other, token.offset
                        )))
                    }
                },
            }
        }

        body.write_u8(Opcode::EndScript.into());
        Ok(body.into_bytes())
    }

    /// `qs ( key-or-string )`, returns how many tokens after `qs` were used
    fn encode_qs(&mut self, tokens: &[Token], body: &mut BinaryWriter) -> Result<usize> {
        let key = match tokens.get(1..4).map(|t| [&t[0].kind, &t[1].kind, &t[2].kind]) {
            Some([TokenKind::OpenParen, TokenKind::RawKey(key), TokenKind::CloseParen]) => *key,
            Some([TokenKind::OpenParen, TokenKind::String(text), TokenKind::CloseParen])
            | Some([TokenKind::OpenParen, TokenKind::WideString(text), TokenKind::CloseParen]) => {
                qs_key(text)
            }
            _ => {
                return Err(Error::compile(format!(
                    "expected qs(#\"0x...\") or qs('text') at offset {}",
                    tokens[0].offset
                )))
            }
        };

        body.write_u8(self.target.qs_opcode().into());
        body.write_u32(key);
        Ok(3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decompile::Decompiler;
    use crate::lexer::tokenize;
    use pretty_assertions::assert_eq;

    fn compile(source: &str, registry: &mut KeyRegistry) -> Vec<u8> {
        let tokens = tokenize(source).unwrap();
        Encoder::new(registry, "test.q").encode(&tokens).unwrap()
    }

    #[test]
    fn test_integer_item_layout() {
        let mut registry = KeyRegistry::new();
        let bytes = compile("answer = 42\n", &mut registry);

        assert_eq!(bytes.len(), HEADER_SIZE + 16);
        assert_eq!(&bytes[4..8], &(bytes.len() as u32).to_be_bytes());
        assert_eq!(&bytes[28..32], &[0x00, 0x20, 0x01, 0x00]);
        assert_eq!(&bytes[32..36], &qb_key("answer").to_be_bytes());
        assert_eq!(&bytes[36..40], &qb_key("test.q").to_be_bytes());
        assert_eq!(&bytes[40..44], &42i32.to_be_bytes());
        assert_eq!(registry.resolve(qb_key("answer")), Some("answer"));
    }

    #[test]
    fn test_script_body_bytes() {
        let mut registry = KeyRegistry::new();
        let bytes = compile("script foo\n\tbar = <bar>\nendscript", &mut registry);

        let mut expected_body = vec![0x01, 0x16];
        expected_body.extend(qb_key("bar").to_le_bytes());
        expected_body.extend([0x07, 0x2D, 0x16]);
        expected_body.extend(qb_key("bar").to_le_bytes());
        expected_body.extend([0x01, 0x24]);

        let body_start = HEADER_SIZE + 32;
        let sizes = &bytes[HEADER_SIZE + 24..body_start];
        assert_eq!(&sizes[0..4], &(expected_body.len() as u32).to_be_bytes());
        assert_eq!(&sizes[4..8], &(expected_body.len() as u32).to_be_bytes());
        assert_eq!(
            &bytes[body_start..body_start + expected_body.len()],
            expected_body.as_slice()
        );
        assert_eq!(
            &bytes[HEADER_SIZE + 20..HEADER_SIZE + 24],
            &crc32fast::hash(&expected_body).to_be_bytes()
        );
        assert_eq!(bytes.len() % 4, 0);
    }

    #[test]
    fn test_unresolved_names_keep_their_key() {
        let mut registry = KeyRegistry::new();
        let original = compile("#\"0xABCDEF12\" = 5\n", &mut registry);
        assert_eq!(&original[32..36], &[0xAB, 0xCD, 0xEF, 0x12]);

        let text = Decompiler::new(&KeyRegistry::new())
            .decompile(original.as_slice())
            .unwrap();
        assert_eq!(text, "0xABCDEF12 = 5\n");

        let mut registry = KeyRegistry::new();
        let recompiled = compile(&text, &mut registry);
        assert_eq!(&recompiled[32..36], &[0xAB, 0xCD, 0xEF, 0x12]);
        assert_eq!(recompiled, original);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_unresolved_argument_keeps_its_key() {
        let mut registry = KeyRegistry::new();
        let tokens = tokenize("<0x0000BEEF>").unwrap();
        let body = Encoder::new(&mut registry, "test.q")
            .encode_body(&tokens)
            .unwrap();

        assert_eq!(body, vec![0x2D, 0x16, 0xEF, 0xBE, 0x00, 0x00, 0x24]);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_vectors_and_comparisons() {
        let mut registry = KeyRegistry::new();
        let tokens = tokenize("(1.0, 2) (1, 2, 3.5) (<a> = 1)").unwrap();
        let body = Encoder::new(&mut registry, "test.q")
            .encode_body(&tokens)
            .unwrap();

        let mut expected = vec![0x1F];
        expected.extend(1.0f32.to_le_bytes());
        expected.extend(2.0f32.to_le_bytes());
        expected.push(0x1E);
        expected.extend(1.0f32.to_le_bytes());
        expected.extend(2.0f32.to_le_bytes());
        expected.extend(3.5f32.to_le_bytes());
        expected.extend([0x0E, 0x2D, 0x16]);
        expected.extend(qb_key("a").to_le_bytes());
        expected.extend([0x11, 0x17, 1, 0, 0, 0, 0x0F, 0x24]);
        assert_eq!(body, expected);
    }

    #[test]
    fn test_qs_opcode_follows_target() {
        let tokens = tokenize("qs(#\"0xC84BFF60\")").unwrap();

        let mut registry = KeyRegistry::new();
        let body = Encoder::new(&mut registry, "test.q")
            .encode_body(&tokens)
            .unwrap();
        assert_eq!(body, vec![0x4E, 0x60, 0xFF, 0x4B, 0xC8, 0x24]);

        let body = Encoder::new(&mut registry, "test.q")
            .target(GameTarget::Gh3)
            .encode_body(&tokens)
            .unwrap();
        assert_eq!(body[0], 0x1C);
    }

    #[test]
    fn test_round_trip_through_decompiler() {
        let source = "script print_answer\n\
                      \tanswer = <x>\n\
                      \tif (<x> = 1)\n\
                      \t\tfoo 'it''s' (1.0, 2.0)\n\
                      \telse\n\
                      \t\tbegin\n\
                      \t\t\tbreak\n\
                      \t\trepeat 3\n\
                      \tendif\n\
                      endscript\n\
                      answer = -7\n";

        let mut registry = KeyRegistry::new();
        let bytes = compile(source, &mut registry);
        let text = Decompiler::new(&registry).decompile(bytes).unwrap();

        let expected = "script print_answer \n\
                        \tanswer = <x>\n\
                        \tif (<x> = 1)\n\
                        \t\tfoo 'it\\'s' (1.0, 2.0)\n\
                        \telse\n\
                        \t\tbegin\n\
                        \t\t\tbreak\n\
                        \t\trepeat 3\n\
                        \tendif\n\
                        endscript\n\
                        answer = -7\n";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_rejects_unsupported_statements() {
        let mut registry = KeyRegistry::new();
        let tokens = tokenize("answer = 'text'").unwrap();
        let err = Encoder::new(&mut registry, "test.q")
            .encode(&tokens)
            .unwrap_err();
        assert!(matches!(err, Error::Compile(_)));

        let tokens = tokenize("= 1").unwrap();
        let err = Encoder::new(&mut registry, "test.q")
            .encode(&tokens)
            .unwrap_err();
        assert!(matches!(err, Error::Compile(_)));
    }
}
