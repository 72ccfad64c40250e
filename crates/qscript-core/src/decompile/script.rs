//! Translation of compiled script bodies back into QBC text.

use super::writer::{Block, Fragment, ScriptWriter};
use crate::binary::{BinaryCursor, Endian};
use crate::error::Result;
use crate::key::{format_key, KeyRegistry};
use crate::opcode::Opcode;
use tracing::{trace, warn};

/// Render a key as its literal, or as a raw `#"0xHHHHHHHH"` key if unresolved
pub(crate) fn render_key(registry: &KeyRegistry, key: u32) -> String {
    match registry.resolve(key) {
        Some(literal) => literal.to_string(),
        None => raw_key(key),
    }
}

fn raw_key(key: u32) -> String {
    format!("#\"{}\"", format_key(key))
}

/// Render a float so it reads back as a float (`1.0`, never `1`)
pub(crate) fn format_float(value: f32) -> String {
    let text = value.to_string();
    if value.is_finite() && !text.contains('.') {
        format!("{text}.0")
    } else {
        text
    }
}

/// Spacing class of a tag with a fixed text fragment
fn fragment_kind(opcode: Opcode) -> Fragment {
    use Opcode::*;

    match opcode {
        Equals | SameAs | Minus | Add | Divide | Multiply | LessThan | LessThanEqual
        | GreaterThan | GreaterThanEqual | Or | And | ShiftLeft | ShiftRight | NotEqual => {
            Fragment::Spaced
        }
        Dot | Colon => Fragment::Joiner,
        Comma => Fragment::Separator,
        OpenParenth => Fragment::Open,
        CloseParenth => Fragment::Close,
        ArgumentPack => Fragment::Prefix,
        _ => Fragment::Word,
    }
}

/// Walks a script token stream and renders it through a [`ScriptWriter`]
pub(crate) struct ScriptTranslator<'a> {
    cursor: BinaryCursor,
    writer: ScriptWriter<'a>,
    registry: &'a KeyRegistry,
    argument_pending: bool,
}

impl<'a> ScriptTranslator<'a> {
    /// Creates a translator for a body taken from a file of `outer` endianness.
    ///
    /// Script bodies are stored in the opposite byte order of their file.
    pub(crate) fn new(
        body: Vec<u8>,
        outer: Endian,
        registry: &'a KeyRegistry,
        indent_str: &'a str,
    ) -> Self {
        Self {
            cursor: BinaryCursor::new(body, outer.inverse()),
            writer: ScriptWriter::new(indent_str, 1),
            registry,
            argument_pending: false,
        }
    }

    /// Translate the whole body.
    ///
    /// Stops at the end-of-script tag or when the buffer runs out. A value
    /// whose operand is cut short also ends translation, keeping the text
    /// produced so far.
    pub(crate) fn translate(mut self) -> String {
        while !self.cursor.is_exhausted() {
            let offset = self.cursor.tell();
            let Ok(tag) = self.cursor.read_u8() else {
                break;
            };
            if tag == u8::from(Opcode::EndScript) {
                break;
            }

            if let Err(e) = self.translate_tag(tag) {
                warn!("Script body truncated at tag {:#04X} (offset {}): {}", tag, offset, e);
                break;
            }
        }

        self.writer.finish()
    }

    fn translate_tag(&mut self, tag: u8) -> Result<()> {
        use Opcode::*;

        let Ok(opcode) = Opcode::try_from(tag) else {
            warn!(
                "Unknown script token {:#04X} at offset {}, skipping",
                tag,
                self.cursor.tell() - 1
            );
            return Ok(());
        };
        trace!("Token {:?}", opcode);

        match opcode {
            EndOfFile | DebugInfo | Enum | At | Undefined | ChecksumName | EndScript => {}
            EndOfLine | EndOfLineNumber => self.writer.newline(),
            Arg => self.argument_pending = true,
            Jump => {
                self.cursor.read_u32()?;
            }
            ShortJump => {
                self.cursor.read_u16()?;
            }

            Name => {
                let key = self.cursor.read_u32()?;
                let name = render_key(self.registry, key);
                let text = if std::mem::take(&mut self.argument_pending) {
                    format!("<{name}>")
                } else {
                    name
                };
                self.writer.push(Fragment::Word, &text);
            }
            Integer => {
                let value = self.cursor.read_i32()?;
                self.writer.push(Fragment::Word, &value.to_string());
            }
            HexInteger => {
                let value = self.cursor.read_u32()?;
                self.writer.push(Fragment::Word, &raw_key(value));
            }
            Float => {
                let value = self.cursor.read_f32()?;
                self.writer.push(Fragment::Word, &format_float(value));
            }
            String => {
                let value = self.cursor.read_num_string()?;
                let escaped = value.trim_end_matches('\0').replace('\'', "\\'");
                self.writer.push(Fragment::Word, &format!("'{escaped}'"));
            }
            WideString => {
                // Wide strings keep the file's byte order
                self.cursor.invert_endian();
                let value = self.cursor.read_num_string();
                self.cursor.invert_endian();
                let value = value?;
                let value = value.trim_end_matches('\0');
                self.writer.push(Fragment::Word, &format!("\"{value}\""));
            }
            LocalString | StringQs => {
                let key = self.cursor.read_u32()?;
                self.writer.push(Fragment::Word, &format!("qs({})", raw_key(key)));
            }
            Vector => {
                let (x, y, z) = (
                    self.cursor.read_f32()?,
                    self.cursor.read_f32()?,
                    self.cursor.read_f32()?,
                );
                let text = format!(
                    "({}, {}, {})",
                    format_float(x),
                    format_float(y),
                    format_float(z)
                );
                self.writer.push(Fragment::Word, &text);
            }
            Pair => {
                let (x, y) = (self.cursor.read_f32()?, self.cursor.read_f32()?);
                let text = format!("({}, {})", format_float(x), format_float(y));
                self.writer.push(Fragment::Word, &text);
            }

            StartStruct | InlinePackStruct => {
                let text = if opcode == StartStruct { "{" } else { "\\{" };
                self.writer.push(Fragment::BlockOpen, text);
                self.writer.open(Block::Struct);
            }
            EndStruct => {
                self.writer.close(Block::Struct);
                self.writer.push(Fragment::BlockClose, "}");
            }
            StartArray => {
                self.writer.push(Fragment::Open, "[");
                self.writer.open(Block::Array);
            }
            EndArray => {
                self.writer.close(Block::Array);
                self.writer.push(Fragment::Close, "]");
            }

            Begin => {
                self.writer.push(Fragment::Word, "begin");
                self.writer.open(Block::Loop);
            }
            Repeat => {
                self.writer.close(Block::Loop);
                self.writer.push(Fragment::Word, "repeat ");
            }

            If | FastIf => {
                if opcode == FastIf {
                    self.cursor.read_u16()?;
                }
                self.writer.push(Fragment::Word, "if");
                self.writer.open(Block::If);
            }
            Else | FastElse => {
                if opcode == FastElse {
                    self.cursor.read_u16()?;
                }
                self.writer.push_outdented(Fragment::Word, "else");
            }
            ElseIf => self.writer.push_outdented(Fragment::Word, "elseif"),
            EndIf => {
                self.writer.close(Block::If);
                self.writer.push(Fragment::Word, "endif");
            }

            Switch => {
                self.writer.push(Fragment::Word, "switch");
                self.writer.open(Block::Switch);
            }
            Case | Default => {
                if self.writer.top() == Some(Block::Case) {
                    self.writer.close(Block::Case);
                }
                let text = if opcode == Case { "case" } else { "default" };
                self.writer.push(Fragment::Word, text);
                self.writer.open(Block::Case);
            }
            EndSwitch => {
                if self.writer.top() == Some(Block::Case) {
                    self.writer.close(Block::Case);
                }
                self.writer.close(Block::Switch);
                self.writer.push(Fragment::Word, "endswitch");
            }

            Array | Script | Xor | RuntimeCFunction | RuntimeMemberFunction | UseHeap
            | Unknown => {
                warn!("Unsupported script token {:?}, skipping", opcode);
            }

            _ => match opcode.fragment() {
                Some(text) => self.writer.push(fragment_kind(opcode), text),
                None => warn!("No rendering for script token {:?}", opcode),
            },
        }

        Ok(())
    }
}

/// Translate a script body using `indent_str` for each nesting level
pub(crate) fn translate_script(
    body: Vec<u8>,
    outer: Endian,
    registry: &KeyRegistry,
    indent_str: &str,
) -> String {
    ScriptTranslator::new(body, outer, registry, indent_str).translate()
}
