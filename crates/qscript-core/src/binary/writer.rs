//! Growable binary output stream.

use super::Endian;
use crate::key::{is_canonical_key, parse_key_string, qb_key};
use bytes::{BufMut, BytesMut};

/// Dispatch a `bytes` put on a runtime [`Endian`]
macro_rules! put_ordered {
    ($buf:expr, $endian:expr, $big:ident, $little:ident, $value:expr) => {
        match $endian {
            Endian::Big => $buf.$big($value),
            Endian::Little => $buf.$little($value),
        }
    };
}

/// Append-only writer with endian-aware scalar writes
#[derive(Debug, Clone, Default)]
pub struct BinaryWriter {
    data: BytesMut,
    endian: Endian,
}

impl BinaryWriter {
    /// Creates an empty writer
    pub fn new(endian: Endian) -> Self {
        Self {
            data: BytesMut::new(),
            endian,
        }
    }

    /// Current byte order
    pub fn endian(&self) -> Endian {
        self.endian
    }

    /// Changes the byte order used by subsequent writes
    pub fn set_endian(&mut self, endian: Endian) {
        self.endian = endian;
    }

    /// Flips the byte order used by subsequent writes
    pub fn invert_endian(&mut self) {
        self.endian = self.endian.inverse();
    }

    /// Number of bytes written so far
    pub fn tell(&self) -> usize {
        self.data.len()
    }

    /// Bytes written so far
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Consumes the writer and returns its bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.data.to_vec()
    }

    /// Writes an unsigned byte
    pub fn write_u8(&mut self, value: u8) {
        self.data.put_u8(value);
    }

    /// Writes a signed byte
    pub fn write_i8(&mut self, value: i8) {
        self.data.put_i8(value);
    }

    /// Writes a boolean as a single byte
    pub fn write_bool(&mut self, value: bool) {
        self.data.put_u8(u8::from(value));
    }

    /// Writes an unsigned 16-bit integer
    pub fn write_u16(&mut self, value: u16) {
        put_ordered!(self.data, self.endian, put_u16, put_u16_le, value);
    }

    /// Writes a signed 16-bit integer
    pub fn write_i16(&mut self, value: i16) {
        put_ordered!(self.data, self.endian, put_i16, put_i16_le, value);
    }

    /// Writes an unsigned 32-bit integer
    pub fn write_u32(&mut self, value: u32) {
        put_ordered!(self.data, self.endian, put_u32, put_u32_le, value);
    }

    /// Writes a signed 32-bit integer
    pub fn write_i32(&mut self, value: i32) {
        put_ordered!(self.data, self.endian, put_i32, put_i32_le, value);
    }

    /// Writes an unsigned 64-bit integer
    pub fn write_u64(&mut self, value: u64) {
        put_ordered!(self.data, self.endian, put_u64, put_u64_le, value);
    }

    /// Writes a signed 64-bit integer
    pub fn write_i64(&mut self, value: i64) {
        put_ordered!(self.data, self.endian, put_i64, put_i64_le, value);
    }

    /// Writes a single precision float
    pub fn write_f32(&mut self, value: f32) {
        put_ordered!(self.data, self.endian, put_f32, put_f32_le, value);
    }

    /// Writes a double precision float
    pub fn write_f64(&mut self, value: f64) {
        put_ordered!(self.data, self.endian, put_f64, put_f64_le, value);
    }

    /// Writes raw bytes
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.data.put_slice(bytes);
    }

    /// Writes a 4-byte length followed by the UTF-8 bytes of `value`
    pub fn write_num_string(&mut self, value: &str) {
        self.write_u32(value.len() as u32);
        self.write_bytes(value.as_bytes());
    }

    /// Writes the UTF-8 bytes of `value` and a null terminator
    pub fn write_term_string(&mut self, value: &str) {
        self.write_bytes(value.as_bytes());
        self.write_u8(0);
    }

    /// Writes a QBKey.
    ///
    /// A canonical `0xHHHHHHHH` string is written as the number it spells,
    /// anything else is hashed first.
    pub fn write_qb_key(&mut self, key: &str) {
        let value = if is_canonical_key(key) {
            parse_key_string(key).unwrap_or_else(|| qb_key(key))
        } else {
            qb_key(key)
        };
        self.write_u32(value);
    }

    /// Writes `count` copies of `byte`
    pub fn pad(&mut self, count: usize, byte: u8) {
        self.data.put_bytes(byte, count);
    }

    /// Pads to the next multiple of `alignment`, returning how many bytes were added
    pub fn pad_to_nearest(&mut self, alignment: usize, byte: u8) -> usize {
        if alignment <= 1 {
            return 0;
        }
        let extra = self.tell() % alignment;
        if extra == 0 {
            return 0;
        }
        let count = alignment - extra;
        self.pad(count, byte);
        count
    }

    /// Overwrites four already written bytes at `offset`
    pub fn patch_u32_at(&mut self, offset: usize, value: u32) {
        let bytes = match self.endian {
            Endian::Big => value.to_be_bytes(),
            Endian::Little => value.to_le_bytes(),
        };
        self.data[offset..offset + 4].copy_from_slice(&bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_endianness() {
        let mut big = BinaryWriter::new(Endian::Big);
        big.write_u32(42);
        assert_eq!(big.as_bytes(), &[0, 0, 0, 42]);

        let mut little = BinaryWriter::new(Endian::Little);
        little.write_u32(42);
        assert_eq!(little.as_bytes(), &[42, 0, 0, 0]);
    }

    #[test]
    fn test_write_qb_key_detects_canonical_hex() {
        let mut writer = BinaryWriter::new(Endian::Big);
        writer.write_qb_key("0xD16B61E6");
        writer.write_qb_key("starttime");
        writer.write_qb_key("0xd16b61e6");

        let bytes = writer.into_bytes();
        assert_eq!(&bytes[0..4], &[0xD1, 0x6B, 0x61, 0xE6]);
        assert_eq!(&bytes[4..8], &[0xD1, 0x6B, 0x61, 0xE6]);
        // Lowercase hex is not canonical, so it gets hashed as a literal
        assert_ne!(&bytes[8..12], &[0xD1, 0x6B, 0x61, 0xE6]);
    }

    #[test]
    fn test_pad_to_nearest() {
        let mut writer = BinaryWriter::new(Endian::Big);
        writer.write_u8(1);
        assert_eq!(writer.pad_to_nearest(4, 0), 3);
        assert_eq!(writer.tell(), 4);
        assert_eq!(writer.pad_to_nearest(4, 0), 0);
    }

    #[test]
    fn test_patch_u32_at() {
        let mut writer = BinaryWriter::new(Endian::Little);
        writer.write_u32(0);
        writer.write_u8(7);
        writer.patch_u32_at(0, 5);
        assert_eq!(writer.as_bytes(), &[5, 0, 0, 0, 7]);
    }
}
