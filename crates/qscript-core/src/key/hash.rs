//! QBKey and QS string hashing.
//!
//! Both hashes run the reflected CRC32 (poly `0xEDB88320`, init `0xFFFFFFFF`)
//! but keep the raw register instead of the usual final complement, which is
//! why the result is `!crc32fast::hash(..)`.

/// Hash a literal name into its 32-bit QBKey.
///
/// The literal is lowercased and forward slashes become backslashes before
/// hashing, so `"Foo/Bar"` and `"foo\\bar"` produce the same key.
pub fn qb_key(literal: &str) -> u32 {
    let normalized = literal.to_lowercase().replace('/', "\\");
    !crc32fast::hash(normalized.as_bytes())
}

/// Hash a literal name and return its canonical `0xHHHHHHHH` form
pub fn qb_key_string(literal: &str) -> String {
    format_key(qb_key(literal))
}

/// Hash a localized string into its QS key.
///
/// Unlike [`qb_key`] the text is hashed verbatim as UTF-16LE.
pub fn qs_key(literal: &str) -> u32 {
    let bytes: Vec<u8> = literal.encode_utf16().flat_map(u16::to_le_bytes).collect();
    !crc32fast::hash(&bytes)
}

/// Format a key as `0x` followed by 8 uppercase hex digits
pub fn format_key(key: u32) -> String {
    format!("0x{key:08X}")
}

/// Returns true if `text` is already a canonical key string
/// (`0x` followed by exactly 8 uppercase hex digits)
pub fn is_canonical_key(text: &str) -> bool {
    text.len() == 10
        && text.starts_with("0x")
        && text[2..]
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'A'..=b'F').contains(&b))
}

/// Parse a key string, accepting `0x`/`0X` prefixes and either hex case
pub fn parse_key_string(text: &str) -> Option<u32> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    if digits.is_empty() || digits.len() > 8 {
        return None;
    }
    u32::from_str_radix(digits, 16).ok()
}
