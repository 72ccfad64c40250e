//! Error types for the qscript-core library.
//!
//! This module provides error handling using the `thiserror` crate, with
//! variants for each failure mode of decompiling, lexing and compiling.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for qscript operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for all qscript operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Input file does not exist
    #[error("source not found: '{path}'")]
    SourceNotFound {
        /// Path that was requested
        path: PathBuf,
    },

    /// Failed to read input file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        /// Path to the file that failed to read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to write output file
    #[error("failed to write file '{path}': {source}")]
    FileWrite {
        /// Path to the file that failed to write
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to create output directory
    #[error("failed to create directory '{path}': {source}")]
    DirectoryCreate {
        /// Path to the directory that failed to create
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to read from an in-memory stream
    #[error("failed to read stream: {0}")]
    StreamRead(#[source] std::io::Error),

    /// A read ran past the end of the buffer
    #[error("unexpected end of data at offset {offset}: needed {needed} byte(s), {available} available")]
    UnexpectedEof {
        /// Cursor offset when the read was attempted
        offset: usize,
        /// Number of bytes the read required
        needed: usize,
        /// Number of bytes left in the buffer
        available: usize,
    },

    /// File is too short to hold the QB header
    #[error("malformed QB header: expected {expected} bytes, file holds {len}")]
    MalformedHeader {
        /// Header size the decompiler expects
        expected: usize,
        /// Actual length of the input
        len: usize,
    },

    /// Top-level item carries a type tag we cannot decompile
    #[error("unexpected item type {tag:#04X} at offset {offset}")]
    UnknownItemType {
        /// The type tag byte
        tag: u8,
        /// Offset of the item's type quad
        offset: usize,
    },

    /// String bytes were not valid UTF-8
    #[error("invalid UTF-8 string at offset {offset}")]
    InvalidUtf8 {
        /// Offset where the string started
        offset: usize,
    },

    /// Decompression of a script body failed
    #[error("decompression failed: {0}")]
    Decompression(String),

    /// Lexer rejected the source text
    #[error("{diagnostic}")]
    Lex {
        /// 1-based line number
        line: usize,
        /// 1-based column number
        column: usize,
        /// Absolute character offset into the source
        offset: usize,
        /// Short failure reason
        message: String,
        /// Formatted three-line diagnostic
        diagnostic: String,
    },

    /// Token list could not be encoded
    #[error("compile error: {0}")]
    Compile(String),

    /// Job was aborted with a caller supplied reason
    #[error("job aborted: {0}")]
    JobAborted(String),
}

impl Error {
    /// Creates a new source-not-found error
    pub fn source_not_found(path: impl Into<PathBuf>) -> Self {
        Self::SourceNotFound { path: path.into() }
    }

    /// Creates a new file read error
    pub fn file_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }

    /// Creates a new file write error
    pub fn file_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileWrite {
            path: path.into(),
            source,
        }
    }

    /// Creates a new directory creation error
    pub fn directory_create(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::DirectoryCreate {
            path: path.into(),
            source,
        }
    }

    /// Creates a new end-of-data error
    pub fn unexpected_eof(offset: usize, needed: usize, available: usize) -> Self {
        Self::UnexpectedEof {
            offset,
            needed,
            available,
        }
    }

    /// Creates a new unknown item type error
    pub fn unknown_item_type(tag: u8, offset: usize) -> Self {
        Self::UnknownItemType { tag, offset }
    }

    /// Creates a new decompression error
    pub fn decompression(msg: impl Into<String>) -> Self {
        Self::Decompression(msg.into())
    }

    /// Creates a new compile error
    pub fn compile(msg: impl Into<String>) -> Self {
        Self::Compile(msg.into())
    }

    /// Creates a new job aborted error
    pub fn job_aborted(reason: impl Into<String>) -> Self {
        Self::JobAborted(reason.into())
    }

    /// Returns true if this error only affects the current file and a batch
    /// run may continue with the next one
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::UnexpectedEof { .. }
                | Self::MalformedHeader { .. }
                | Self::UnknownItemType { .. }
                | Self::InvalidUtf8 { .. }
                | Self::Decompression(_)
                | Self::Lex { .. }
                | Self::Compile(_)
                | Self::JobAborted(_)
        )
    }
}
