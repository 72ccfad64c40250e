//! Endian-aware binary cursor and writer.
//!
//! [`BinaryCursor`] is a sequential view over a byte buffer with typed reads;
//! [`BinaryWriter`] is its growable output counterpart. Both decode and encode
//! multi-byte values with an explicit byte order, so a writer and a reader
//! configured with the same [`Endian`] always agree regardless of the host.
//!
//! Every read is bounds checked: running past the end of the buffer yields
//! [`Error::UnexpectedEof`] rather than a panic.

mod writer;

use crate::error::{Error, Result};
use crate::key::KeyRegistry;
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use std::io::Read;
use std::path::Path;

pub use writer::BinaryWriter;

/// Byte order of multi-byte values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endian {
    /// Most significant byte first (QB files on console targets)
    #[default]
    Big,
    /// Least significant byte first
    Little,
}

impl Endian {
    /// Returns the opposite byte order
    pub fn inverse(self) -> Self {
        match self {
            Endian::Big => Endian::Little,
            Endian::Little => Endian::Big,
        }
    }
}

/// Dispatch a `byteorder` read on a runtime [`Endian`]
macro_rules! read_ordered {
    ($endian:expr, $method:ident, $bytes:expr) => {
        match $endian {
            Endian::Big => BigEndian::$method($bytes),
            Endian::Little => LittleEndian::$method($bytes),
        }
    };
}

/// Sequential reader over an owned byte buffer
#[derive(Debug, Clone)]
pub struct BinaryCursor {
    data: Vec<u8>,
    offset: usize,
    endian: Endian,
}

impl BinaryCursor {
    /// Creates a cursor at offset 0
    pub fn new(data: impl Into<Vec<u8>>, endian: Endian) -> Self {
        Self::with_offset(data, endian, 0)
    }

    /// Creates a cursor starting at `offset` (clamped to the buffer length)
    pub fn with_offset(data: impl Into<Vec<u8>>, endian: Endian, offset: usize) -> Self {
        let data = data.into();
        let offset = offset.min(data.len());
        Self {
            data,
            offset,
            endian,
        }
    }

    /// Reads a whole file into memory and creates a cursor over it
    pub fn from_path(path: impl AsRef<Path>, endian: Endian) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::source_not_found(path));
        }
        let data = std::fs::read(path).map_err(|e| Error::file_read(path, e))?;
        Ok(Self::new(data, endian))
    }

    /// Drains a stream into memory and creates a cursor over it
    pub fn from_reader(mut reader: impl Read, endian: Endian) -> Result<Self> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data).map_err(Error::StreamRead)?;
        Ok(Self::new(data, endian))
    }

    /// The underlying buffer
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Buffer length in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Current byte order
    pub fn endian(&self) -> Endian {
        self.endian
    }

    /// Changes the byte order used by subsequent reads
    pub fn set_endian(&mut self, endian: Endian) {
        self.endian = endian;
    }

    /// Flips the byte order used by subsequent reads
    pub fn invert_endian(&mut self) {
        self.endian = self.endian.inverse();
    }

    /// Current offset
    pub fn tell(&self) -> usize {
        self.offset
    }

    /// Moves to an absolute offset
    pub fn seek(&mut self, offset: usize) -> Result<()> {
        if offset > self.data.len() {
            return Err(Error::unexpected_eof(self.offset, offset - self.offset, self.remaining()));
        }
        self.offset = offset;
        Ok(())
    }

    /// Moves forward (or backward, for negative `delta`) relative to the current offset
    pub fn advance(&mut self, delta: isize) -> Result<()> {
        let target = self
            .offset
            .checked_add_signed(delta)
            .ok_or_else(|| Error::unexpected_eof(self.offset, 0, self.remaining()))?;
        self.seek(target)
    }

    /// Bytes left between the offset and the end of the buffer
    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    /// Returns true once the offset has reached the end of the buffer
    pub fn exceeded_bounds(&self) -> bool {
        self.offset >= self.data.len()
    }

    /// Alias for [`exceeded_bounds`](Self::exceeded_bounds)
    pub fn is_exhausted(&self) -> bool {
        self.exceeded_bounds()
    }

    /// Advances to the next multiple of `alignment`. Never moves backwards.
    pub fn skip_to_nearest(&mut self, alignment: usize) {
        if alignment <= 1 {
            return;
        }
        let remainder = self.offset % alignment;
        if remainder != 0 {
            // Padding may run past the end of the final item
            self.offset = (self.offset + alignment - remainder).min(self.data.len());
        }
    }

    fn take(&mut self, count: usize) -> Result<&[u8]> {
        if count > self.remaining() {
            return Err(Error::unexpected_eof(self.offset, count, self.remaining()));
        }
        let start = self.offset;
        self.offset += count;
        Ok(&self.data[start..self.offset])
    }

    /// Reads `length` raw bytes
    pub fn read_chunk(&mut self, length: usize) -> Result<Vec<u8>> {
        self.take(length).map(<[u8]>::to_vec)
    }

    /// Reads an unsigned byte
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    /// Reads a signed byte
    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    /// Reads a byte and treats any non-zero value as true
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    /// Reads an unsigned 16-bit integer
    pub fn read_u16(&mut self) -> Result<u16> {
        let endian = self.endian;
        let bytes = self.take(2)?;
        Ok(read_ordered!(endian, read_u16, bytes))
    }

    /// Reads a signed 16-bit integer
    pub fn read_i16(&mut self) -> Result<i16> {
        let endian = self.endian;
        let bytes = self.take(2)?;
        Ok(read_ordered!(endian, read_i16, bytes))
    }

    /// Reads an unsigned 32-bit integer
    pub fn read_u32(&mut self) -> Result<u32> {
        let endian = self.endian;
        let bytes = self.take(4)?;
        Ok(read_ordered!(endian, read_u32, bytes))
    }

    /// Reads a signed 32-bit integer
    pub fn read_i32(&mut self) -> Result<i32> {
        let endian = self.endian;
        let bytes = self.take(4)?;
        Ok(read_ordered!(endian, read_i32, bytes))
    }

    /// Reads an unsigned 64-bit integer
    pub fn read_u64(&mut self) -> Result<u64> {
        let endian = self.endian;
        let bytes = self.take(8)?;
        Ok(read_ordered!(endian, read_u64, bytes))
    }

    /// Reads a signed 64-bit integer
    pub fn read_i64(&mut self) -> Result<i64> {
        let endian = self.endian;
        let bytes = self.take(8)?;
        Ok(read_ordered!(endian, read_i64, bytes))
    }

    /// Reads a single precision float
    pub fn read_f32(&mut self) -> Result<f32> {
        let endian = self.endian;
        let bytes = self.take(4)?;
        Ok(read_ordered!(endian, read_f32, bytes))
    }

    /// Reads a double precision float
    pub fn read_f64(&mut self) -> Result<f64> {
        let endian = self.endian;
        let bytes = self.take(8)?;
        Ok(read_ordered!(endian, read_f64, bytes))
    }

    /// Reads `length` bytes as UTF-8
    pub fn read_string(&mut self, length: usize) -> Result<String> {
        let start = self.offset;
        let bytes = self.take(length)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| Error::InvalidUtf8 { offset: start })
    }

    /// Reads a 4-byte length followed by that many bytes of UTF-8
    pub fn read_num_string(&mut self) -> Result<String> {
        let length = self.read_u32()? as usize;
        self.read_string(length)
    }

    /// Reads bytes up to (and consuming) a null terminator
    pub fn read_term_string(&mut self) -> Result<String> {
        let start = self.offset;
        let end = self.data[start..]
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| Error::unexpected_eof(start, self.remaining() + 1, self.remaining()))?;
        let text = self.read_string(end)?;
        self.offset += 1;
        Ok(text)
    }

    /// Reads a 32-bit QBKey and resolves it through the registry.
    ///
    /// Unknown keys come back as their canonical `0xHHHHHHHH` string.
    pub fn read_qb_key(&mut self, registry: &KeyRegistry) -> Result<String> {
        Ok(registry.lookup_key(self.read_u32()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_respects_endian() {
        let mut big = BinaryCursor::new(vec![0x00, 0x00, 0x00, 0x2A], Endian::Big);
        assert_eq!(big.read_u32().unwrap(), 42);

        let mut little = BinaryCursor::new(vec![0x2A, 0x00, 0x00, 0x00], Endian::Little);
        assert_eq!(little.read_i32().unwrap(), 42);
    }

    #[test]
    fn test_scalar_round_trip_both_endians() {
        for endian in [Endian::Big, Endian::Little] {
            let mut writer = BinaryWriter::new(endian);
            writer.write_u8(0xAB);
            writer.write_i8(-5);
            writer.write_u16(0xBEEF);
            writer.write_i16(-1234);
            writer.write_u32(0xDEAD_BEEF);
            writer.write_i32(-42);
            writer.write_u64(0x0123_4567_89AB_CDEF);
            writer.write_i64(-9_000_000_000);
            writer.write_f32(1.5);
            writer.write_f64(-0.25);
            writer.write_bool(true);

            let mut cursor = BinaryCursor::new(writer.into_bytes(), endian);
            assert_eq!(cursor.read_u8().unwrap(), 0xAB);
            assert_eq!(cursor.read_i8().unwrap(), -5);
            assert_eq!(cursor.read_u16().unwrap(), 0xBEEF);
            assert_eq!(cursor.read_i16().unwrap(), -1234);
            assert_eq!(cursor.read_u32().unwrap(), 0xDEAD_BEEF);
            assert_eq!(cursor.read_i32().unwrap(), -42);
            assert_eq!(cursor.read_u64().unwrap(), 0x0123_4567_89AB_CDEF);
            assert_eq!(cursor.read_i64().unwrap(), -9_000_000_000);
            assert_eq!(cursor.read_f32().unwrap(), 1.5);
            assert_eq!(cursor.read_f64().unwrap(), -0.25);
            assert!(cursor.read_bool().unwrap());
            assert!(cursor.is_exhausted());
        }
    }

    #[test]
    fn test_strings() {
        let mut writer = BinaryWriter::new(Endian::Big);
        writer.write_num_string("hello");
        writer.write_term_string("world");

        let mut cursor = BinaryCursor::new(writer.into_bytes(), Endian::Big);
        assert_eq!(cursor.read_num_string().unwrap(), "hello");
        assert_eq!(cursor.read_term_string().unwrap(), "world");
        assert!(cursor.is_exhausted());
    }

    #[test]
    fn test_read_past_end_is_an_error() {
        let mut cursor = BinaryCursor::new(vec![0x01, 0x02], Endian::Big);
        let err = cursor.read_u32().unwrap_err();
        assert!(matches!(
            err,
            Error::UnexpectedEof {
                offset: 0,
                needed: 4,
                available: 2
            }
        ));
        // A failed read does not move the cursor
        assert_eq!(cursor.tell(), 0);
    }

    #[test]
    fn test_skip_to_nearest() {
        let mut cursor = BinaryCursor::new(vec![0u8; 32], Endian::Big);
        for start in 0..=32 {
            cursor.seek(start).unwrap();
            cursor.skip_to_nearest(4);
            assert!(cursor.tell() >= start);
            assert_eq!(cursor.tell() % 4, 0);
        }
    }

    #[test]
    fn test_skip_to_nearest_stops_at_end() {
        let mut cursor = BinaryCursor::new(vec![0u8; 30], Endian::Big);
        cursor.seek(27).unwrap();
        cursor.skip_to_nearest(4);
        assert_eq!(cursor.tell(), 28);

        cursor.seek(29).unwrap();
        cursor.skip_to_nearest(4);
        assert_eq!(cursor.tell(), 30);
        assert!(cursor.is_exhausted());

        cursor.skip_to_nearest(4);
        assert_eq!(cursor.tell(), 30);
    }

    #[test]
    fn test_seek_and_advance() {
        let mut cursor = BinaryCursor::new(vec![0u8; 8], Endian::Big);
        cursor.advance(6).unwrap();
        assert_eq!(cursor.tell(), 6);
        cursor.advance(-2).unwrap();
        assert_eq!(cursor.tell(), 4);
        assert!(cursor.advance(5).is_err());
        assert!(cursor.seek(9).is_err());
        cursor.seek(8).unwrap();
        assert!(cursor.exceeded_bounds());
    }

    #[test]
    fn test_read_qb_key_resolves() {
        let mut registry = KeyRegistry::new();
        registry.add("starttime");

        let mut cursor = BinaryCursor::new(
            vec![0xD1, 0x6B, 0x61, 0xE6, 0x00, 0x00, 0x00, 0x01],
            Endian::Big,
        );
        assert_eq!(cursor.read_qb_key(&registry).unwrap(), "starttime");
        assert_eq!(cursor.read_qb_key(&registry).unwrap(), "0x00000001");
    }

    #[test]
    fn test_from_path_missing() {
        let err = BinaryCursor::from_path("/definitely/not/here.qb", Endian::Big).unwrap_err();
        assert!(matches!(err, Error::SourceNotFound { .. }));
    }

    #[test]
    fn test_from_reader() {
        let cursor = BinaryCursor::from_reader(&[1u8, 2, 3][..], Endian::Little).unwrap();
        assert_eq!(cursor.len(), 3);
        assert_eq!(cursor.endian(), Endian::Little);
    }
}
