//! # qscript-core
//!
//! A library for converting Neversoft QB script bytecode to QBC source text
//! and back.
//!
//! This crate provides the core functionality for:
//! - Reading and writing QB binary data in either byte order
//! - Hashing names into QBKeys and resolving them back through a key bank
//! - Decompiling QB files, including script bodies, into QBC text
//! - Lexing QBC text and encoding it into QB files
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`binary`]: Endian-aware cursor and writer
//! - [`key`]: QBKey hashing and the [`KeyRegistry`]
//! - [`opcode`]: Script token tags shared by both directions
//! - [`compress`]: Script body decompression
//! - [`decompile`]: QB to QBC
//! - [`lexer`]: QBC source to tokens
//! - [`compile`]: Tokens to QB
//! - [`job`]: Per-file compile and decompile jobs
//! - [`error`]: Error types and handling
//!
//! ## Example
//!
//! ```no_run
//! use qscript_core::{Decompiler, KeyRegistry};
//!
//! // Seed the registry so script names resolve
//! let registry = KeyRegistry::with_bundled_bank();
//!
//! let text = Decompiler::new(&registry).decompile_file("guitar.qb")?;
//! println!("{}", text);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Extensibility
//!
//! - [`Decompressor`]: Plug in another decompressor for compressed scripts
//! - [`Job`]: Common interface over compile and decompile work
//!

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod binary;
pub mod compile;
pub mod compress;
pub mod decompile;
pub mod error;
pub mod job;
pub mod key;
pub mod lexer;
pub mod opcode;

// Re-export primary types for convenience
pub use binary::{BinaryCursor, BinaryWriter, Endian};
pub use compile::Encoder;
pub use compress::{Decompressor, Lzss};
pub use decompile::{Decompiler, DecompilerConfig};
pub use error::{Error, Result};
pub use job::{CompileJob, DecompileJob, GameTarget, Job, JobOptions};
pub use key::{qb_key, qb_key_string, qs_key, KeyRegistry};
pub use lexer::{tokenize, Lexer, Token, TokenKind};
pub use opcode::Opcode;

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
