//! QB decompiler.
//!
//! Turns a compiled QB file back into QBC source text.
//!
//! ## File Layout
//!
//! ```text
//! [28-byte header][item][item]...
//!
//! item   = [0, flags, type tag, 0][payload]
//! Integer (1)        name key, container key, i32 value
//! Script (7)         name key, container key, unknown i32, dummy u32,
//!                    CRC, uncompressed size, compressed size,
//!                    body bytes, padding to 4
//! GlobalPointer (26) name key, container key, target key
//! ```
//!
//! Script bodies are compiled token streams, see [`crate::opcode`]. They are
//! stored in the opposite byte order of the surrounding file.
//!
//! ## Extensibility
//!
//! Compressed script bodies go through a [`Decompressor`], so the bundled
//! [`Lzss`] decoder can be replaced:
//!
//! ```no_run
//! use qscript_core::compress::Decompressor;
//! use qscript_core::decompile::Decompiler;
//! use qscript_core::{KeyRegistry, Result};
//!
//! struct Passthrough;
//!
//! impl Decompressor for Passthrough {
//!     fn decompress(&self, data: &[u8], _expected_len: usize) -> Result<Vec<u8>> {
//!         Ok(data.to_vec())
//!     }
//! }
//!
//! let registry = KeyRegistry::with_bundled_bank();
//! let decompiler = Decompiler::new(&registry).with_decompressor(Passthrough);
//! ```

mod script;
mod writer;

use crate::binary::{BinaryCursor, Endian};
use crate::compress::{Decompressor, Lzss};
use crate::error::{Error, Result};
use crate::key::KeyRegistry;
use std::path::Path;
use tracing::{debug, trace};

use script::{render_key, translate_script};

/// Size of the opaque header in front of the first item
pub const HEADER_SIZE: usize = 28;

/// Top-level item type tags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ItemType {
    /// Named integer value
    Integer = 1,
    /// Script
    Script = 7,
    /// Pointer to another global
    GlobalPointer = 26,
}

impl TryFrom<u8> for ItemType {
    type Error = u8;

    fn try_from(value: u8) -> std::result::Result<Self, u8> {
        match value {
            1 => Ok(Self::Integer),
            7 => Ok(Self::Script),
            26 => Ok(Self::GlobalPointer),
            other => Err(other),
        }
    }
}

/// Configuration for the decompiler
#[derive(Debug, Clone)]
pub struct DecompilerConfig {
    /// Byte order of the outer file
    pub endian: Endian,
    /// Bytes skipped before the first item
    pub header_size: usize,
    /// Text used for one level of indentation
    pub indent_str: String,
}

impl Default for DecompilerConfig {
    fn default() -> Self {
        Self {
            endian: Endian::Big,
            header_size: HEADER_SIZE,
            indent_str: "\t".to_string(),
        }
    }
}

impl DecompilerConfig {
    /// Creates a new decompiler config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the byte order of the outer file
    pub fn endian(mut self, endian: Endian) -> Self {
        self.endian = endian;
        self
    }

    /// Sets the header size
    pub fn header_size(mut self, size: usize) -> Self {
        self.header_size = size;
        self
    }

    /// Sets the indentation string
    pub fn indent_str(mut self, indent: impl Into<String>) -> Self {
        self.indent_str = indent.into();
        self
    }
}

/// Decompiler for QB files
pub struct Decompiler<'a> {
    registry: &'a KeyRegistry,
    config: DecompilerConfig,
    decompressor: Box<dyn Decompressor + 'a>,
}

impl<'a> Decompiler<'a> {
    /// Creates a decompiler with default configuration
    pub fn new(registry: &'a KeyRegistry) -> Self {
        Self::with_config(registry, DecompilerConfig::default())
    }

    /// Creates a decompiler with custom configuration
    pub fn with_config(registry: &'a KeyRegistry, config: DecompilerConfig) -> Self {
        Self {
            registry,
            config,
            decompressor: Box::new(Lzss),
        }
    }

    /// Replaces the decompressor used for compressed script bodies
    pub fn with_decompressor(mut self, decompressor: impl Decompressor + 'a) -> Self {
        self.decompressor = Box::new(decompressor);
        self
    }

    /// Returns the active configuration
    pub fn config(&self) -> &DecompilerConfig {
        &self.config
    }

    /// Decompile a QB file on disk
    pub fn decompile_file(&self, path: impl AsRef<Path>) -> Result<String> {
        let path = path.as_ref();
        debug!("Decompiling {}", path.display());
        let cursor = BinaryCursor::from_path(path, self.config.endian)?;
        self.decompile_cursor(cursor)
    }

    /// Decompile QB bytes into source text
    pub fn decompile(&self, data: impl Into<Vec<u8>>) -> Result<String> {
        self.decompile_cursor(BinaryCursor::new(data, self.config.endian))
    }

    fn decompile_cursor(&self, mut cursor: BinaryCursor) -> Result<String> {
        if cursor.len() < self.config.header_size {
            return Err(Error::MalformedHeader {
                expected: self.config.header_size,
                len: cursor.len(),
            });
        }
        cursor.seek(self.config.header_size)?;

        let mut output = String::new();
        let mut items = 0usize;

        while !cursor.is_exhausted() {
            let offset = cursor.tell();
            let quad = cursor.read_chunk(4)?;
            let item_type =
                ItemType::try_from(quad[2]).map_err(|tag| Error::unknown_item_type(tag, offset))?;
            trace!("Item {:?} at offset {}", item_type, offset);

            let text = match item_type {
                ItemType::Integer => self.read_integer(&mut cursor)?,
                ItemType::Script => self.read_script(&mut cursor)?,
                ItemType::GlobalPointer => self.read_global_pointer(&mut cursor)?,
            };
            output.push_str(&text);
            output.push('\n');
            items += 1;
        }

        debug!("Decompiled {} item(s)", items);
        Ok(output)
    }

    fn read_integer(&self, cursor: &mut BinaryCursor) -> Result<String> {
        let name = cursor.read_qb_key(self.registry)?;
        let _container = cursor.read_u32()?;
        let value = cursor.read_i32()?;
        Ok(format!("{name} = {value}"))
    }

    fn read_script(&self, cursor: &mut BinaryCursor) -> Result<String> {
        let name = render_key(self.registry, cursor.read_u32()?);
        let _container = cursor.read_u32()?;
        let _unknown = cursor.read_i32()?;
        let _dummy = cursor.read_u32()?;

        let crc = cursor.read_u32()?;
        let uncompressed_size = cursor.read_u32()? as usize;
        let compressed_size = cursor.read_u32()? as usize;
        trace!(
            "Script {} at offset {}: crc {:#010X}, {} -> {} bytes",
            name,
            cursor.tell(),
            crc,
            compressed_size,
            uncompressed_size
        );

        let mut body = cursor.read_chunk(compressed_size)?;
        if uncompressed_size != compressed_size {
            body = self.decompressor.decompress(&body, uncompressed_size)?;
        }
        cursor.skip_to_nearest(4);

        let translated = translate_script(
            body,
            self.config.endian,
            self.registry,
            &self.config.indent_str,
        );
        Ok(format!("script {name} {translated}\nendscript"))
    }

    fn read_global_pointer(&self, cursor: &mut BinaryCursor) -> Result<String> {
        let name = render_key(self.registry, cursor.read_u32()?);
        let _container = cursor.read_u32()?;
        let target = render_key(self.registry, cursor.read_u32()?);
        Ok(format!("{name} = ${target}"))
    }
}

impl std::fmt::Debug for Decompiler<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Decompiler")
            .field("config", &self.config)
            .field("keys", &self.registry.len())
            .finish_non_exhaustive()
    }
}
