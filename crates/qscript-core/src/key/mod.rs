//! QBKey hashing and the key registry.
//!
//! Compiled QB data never stores names, only their 32-bit QBKeys. The
//! [`KeyRegistry`] maps those keys back to literal text so decompiled output
//! stays readable. It is built once by the caller (usually seeded from the
//! bundled key bank) and then handed to the decompiler and compiler by
//! reference.
//!
//! ## Bank format
//!
//! One entry per line, the hash first and the literal in quotes:
//!
//! ```text
//! 0xD16B61E6 "starttime"
//! 0x28DDB24A "GetTrueElapsedTime"
//! ```

mod hash;

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, trace};

pub use hash::{format_key, is_canonical_key, parse_key_string, qb_key, qb_key_string, qs_key};

/// Key bank shipped with the crate
const BUNDLED_BANK: &str = include_str!("../../keys/qbkeys.txt");

/// Bidirectional QBKey lookup table
#[derive(Debug, Clone, Default)]
pub struct KeyRegistry {
    /// key -> literal
    entries: HashMap<u32, String>,
    /// literal -> number of keys currently mapping to it
    literals: HashMap<String, usize>,
}

impl KeyRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry seeded from the bundled key bank
    pub fn with_bundled_bank() -> Self {
        let mut registry = Self::new();
        let count = registry.register(BUNDLED_BANK);
        debug!("Registered {} bundled key(s)", count);
        registry
    }

    /// Number of keys in the registry
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no keys are registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns true if `literal` is the translation of any registered key
    pub fn contains_literal(&self, literal: &str) -> bool {
        self.literals.contains_key(literal)
    }

    /// Register every entry of a key bank and return how many were inserted.
    ///
    /// Lines that are blank or whose hash does not parse are skipped.
    pub fn register(&mut self, bank_text: &str) -> usize {
        let mut inserted = 0;

        for line in bank_text.lines() {
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }

            // The literal may itself contain whitespace, so split by position
            // rather than on the first space
            let hash_len = if line.starts_with("0x") || line.starts_with("0X") {
                10
            } else {
                8
            };
            let (Some(hash_text), Some(rest)) = (line.get(..hash_len), line.get(hash_len..))
            else {
                trace!("Skipping short key bank line: {:?}", line);
                continue;
            };

            let Some(key) = parse_key_string(hash_text) else {
                trace!("Skipping malformed key bank line: {:?}", line);
                continue;
            };

            let literal = rest.trim().trim_matches('"');
            self.add_key(key, literal);
            inserted += 1;
        }

        inserted
    }

    /// Register a key bank stored on disk
    pub fn register_file(&mut self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::source_not_found(path));
        }
        let text = std::fs::read_to_string(path).map_err(|e| Error::file_read(path, e))?;
        let count = self.register(&text);
        debug!("Registered {} key(s) from {}", count, path.display());
        Ok(count)
    }

    /// Hash `literal` and register it, returning its key
    pub fn add(&mut self, literal: &str) -> u32 {
        let key = qb_key(literal);
        self.add_key(key, literal);
        key
    }

    /// Register a literal under an explicit key. The last write for a key wins.
    pub fn add_key(&mut self, key: u32, literal: &str) {
        if let Some(previous) = self.entries.insert(key, literal.to_string()) {
            if previous == literal {
                return;
            }
            trace!(
                "Key {} overwritten: {:?} -> {:?}",
                format_key(key),
                previous,
                literal
            );
            if let Some(count) = self.literals.get_mut(&previous) {
                *count -= 1;
                if *count == 0 {
                    self.literals.remove(&previous);
                }
            }
        }
        *self.literals.entry(literal.to_string()).or_insert(0) += 1;
    }

    /// Returns the literal registered for `key`, if any
    pub fn resolve(&self, key: u32) -> Option<&str> {
        self.entries.get(&key).map(String::as_str)
    }

    /// Look up a key by its numeric value, falling back to the canonical hex string
    pub fn lookup_key(&self, key: u32) -> String {
        match self.resolve(key) {
            Some(literal) => literal.to_string(),
            None => format_key(key),
        }
    }

    /// Look up a key given as text.
    ///
    /// Input that is already a registered literal comes back unchanged, so
    /// looking up an already decoded name is harmless. A miss returns the
    /// canonicalized input.
    pub fn lookup(&self, text: &str) -> String {
        if self.contains_literal(text) {
            return text.to_string();
        }

        let canonical = canonicalize(text);
        match parse_key_string(&canonical).and_then(|key| self.resolve(key)) {
            Some(literal) if canonical.starts_with("0x") => literal.to_string(),
            _ => canonical,
        }
    }
}

/// Uppercase the hex digits while keeping a lowercase `0x` prefix.
/// Text that is not hex prefixed passes through untouched.
fn canonicalize(text: &str) -> String {
    match text.get(..2) {
        Some("0x" | "0X") => format!("0x{}", text[2..].to_uppercase()),
        _ => text.to_string(),
    }
}
