//! Script body decompression.
//!
//! Compressed script bodies use the classic LZSS scheme: a 4096-byte ring
//! buffer, flag bytes read least significant bit first (1 = literal byte,
//! 0 = back reference), and 2-byte references holding a 12-bit ring position
//! and a 4-bit length biased by [`THRESHOLD`] + 1.
//!
//! The decompiler only talks to the [`Decompressor`] trait, so callers can
//! swap in another implementation (or a recording stub in tests).

use crate::error::{Error, Result};
use tracing::trace;

/// Ring buffer size
pub const RING_SIZE: usize = 4096;

/// Longest match a reference can encode
pub const MAX_MATCH: usize = 18;

/// Matches of this length or shorter are stored as literals
pub const THRESHOLD: usize = 2;

/// Decompression primitive used for compressed script bodies
pub trait Decompressor {
    /// Decompress `data`. `expected_len` is the uncompressed size recorded in
    /// the item header and may be used as a capacity hint or stop condition.
    fn decompress(&self, data: &[u8], expected_len: usize) -> Result<Vec<u8>>;
}

/// LZSS decoder
#[derive(Debug, Clone, Copy, Default)]
pub struct Lzss;

impl Decompressor for Lzss {
    fn decompress(&self, data: &[u8], expected_len: usize) -> Result<Vec<u8>> {
        let mut ring = [0u8; RING_SIZE];
        let mut ring_pos = RING_SIZE - MAX_MATCH;
        let mut output = Vec::with_capacity(expected_len);
        let mut input = data.iter().copied();

        'outer: while output.len() < expected_len {
            let Some(flags) = input.next() else {
                break;
            };

            for bit in 0..8 {
                if output.len() >= expected_len {
                    break 'outer;
                }

                if flags & (1 << bit) != 0 {
                    let Some(byte) = input.next() else {
                        break 'outer;
                    };
                    output.push(byte);
                    ring[ring_pos] = byte;
                    ring_pos = (ring_pos + 1) % RING_SIZE;
                    continue;
                }

                let (Some(low), Some(high)) = (input.next(), input.next()) else {
                    break 'outer;
                };
                let position = usize::from(low) | (usize::from(high & 0xF0) << 4);
                let length = usize::from(high & 0x0F) + THRESHOLD + 1;

                for k in 0..length {
                    let byte = ring[(position + k) % RING_SIZE];
                    output.push(byte);
                    ring[ring_pos] = byte;
                    ring_pos = (ring_pos + 1) % RING_SIZE;
                }
            }
        }

        if output.len() < expected_len {
            return Err(Error::decompression(format!(
                "LZSS stream ended early: produced {} of {} bytes",
                output.len(),
                expected_len
            )));
        }

        output.truncate(expected_len);
        trace!("LZSS: {} -> {} bytes", data.len(), output.len());
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literals_only() {
        let data = [0xFF, b'h', b'e', b'l', b'l', b'o', b'!', b'!', b'!'];
        let output = Lzss.decompress(&data, 8).unwrap();
        assert_eq!(output, b"hello!!!");
    }

    #[test]
    fn test_back_reference_overlaps_output() {
        // Three literals, then a 6-byte reference to ring position 0xFEE
        let data = [0x07, b'a', b'b', b'c', 0xEE, 0xF3];
        let output = Lzss.decompress(&data, 9).unwrap();
        assert_eq!(output, b"abcabcabc");
    }

    #[test]
    fn test_truncated_stream_fails() {
        let data = [0xFF, b'a'];
        let err = Lzss.decompress(&data, 4).unwrap_err();
        assert!(matches!(err, Error::Decompression(_)));
    }
}
