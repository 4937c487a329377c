//! Positioned binary reader and writer used by every extension payload.
//!
//! Fixed-width integers are little-endian. Counts, lengths and indices are
//! LEB128 varints. Every read failure is reported as a format error carrying
//! the byte offset where it happened.

use std::io::{self, Read, Write};

use crate::codec::varint::{self, VarintErrorKind};
use crate::core::errors::{LibsiftError, Result};

/// Upper bound on any decoded string length.
pub const MAX_STRING_LEN: usize = 16 * 1024 * 1024;

/// Upper bound on any decoded collection length.
pub const MAX_COLLECTION_LEN: usize = 1 << 28;

/// Deepest allowed nesting of typed constants inside one another.
pub const MAX_NESTING: usize = 64;

/// Binary writer tracking the number of bytes emitted.
pub struct ProfileWriter<'a> {
    inner: &'a mut dyn Write,
    position: u64,
}

impl<'a> ProfileWriter<'a> {
    /// Wrap a writer.
    pub fn new(inner: &'a mut dyn Write) -> Self {
        Self { inner, position: 0 }
    }

    /// Bytes written so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Write raw bytes.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner
            .write_all(bytes)
            .map_err(|e| LibsiftError::io("Failed to write profile data", e))?;
        self.position += bytes.len() as u64;
        Ok(())
    }

    /// Write a fixed-width little-endian `i32`.
    pub fn write_i32(&mut self, value: i32) -> Result<()> {
        self.write_bytes(&value.to_le_bytes())
    }

    /// Write a fixed-width little-endian `u32`.
    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        self.write_bytes(&value.to_le_bytes())
    }

    /// Write a fixed-width little-endian `u64`.
    pub fn write_u64(&mut self, value: u64) -> Result<()> {
        self.write_bytes(&value.to_le_bytes())
    }

    /// Write a fixed-width little-endian `i64`.
    pub fn write_i64(&mut self, value: i64) -> Result<()> {
        self.write_bytes(&value.to_le_bytes())
    }

    /// Write a little-endian IEEE-754 `f64`.
    pub fn write_f64(&mut self, value: f64) -> Result<()> {
        self.write_bytes(&value.to_le_bytes())
    }

    /// Write a single byte.
    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.write_bytes(&[value])
    }

    /// Write a boolean as one byte.
    pub fn write_bool(&mut self, value: bool) -> Result<()> {
        self.write_u8(u8::from(value))
    }

    /// Write an unsigned varint.
    pub fn write_varint(&mut self, value: u64) -> Result<()> {
        let written = varint::write_u64(&mut *self.inner, value)
            .map_err(|e| LibsiftError::io("Failed to write profile data", e))?;
        self.position += written as u64;
        Ok(())
    }

    /// Write a length or index as a varint.
    pub fn write_len(&mut self, value: usize) -> Result<()> {
        self.write_varint(value as u64)
    }

    /// Write a zig-zag encoded signed varint.
    pub fn write_signed(&mut self, value: i64) -> Result<()> {
        self.write_varint(varint::zigzag_encode(value))
    }

    /// Write a length-prefixed UTF-8 string.
    pub fn write_str(&mut self, value: &str) -> Result<()> {
        self.write_len(value.len())?;
        self.write_bytes(value.as_bytes())
    }
}

/// Binary reader tracking the number of bytes consumed.
pub struct ProfileReader<'a> {
    inner: &'a mut dyn Read,
    position: u64,
    depth: usize,
}

impl<'a> ProfileReader<'a> {
    /// Wrap a reader.
    pub fn new(inner: &'a mut dyn Read) -> Self {
        Self {
            inner,
            position: 0,
            depth: 0,
        }
    }

    /// Descend into a nested typed constant; fails past [`MAX_NESTING`].
    pub fn enter_nested(&mut self) -> Result<()> {
        if self.depth >= MAX_NESTING {
            return Err(self.error("typed value nesting exceeds limit"));
        }
        self.depth += 1;
        Ok(())
    }

    /// Leave a nested typed constant entered with [`Self::enter_nested`].
    pub fn exit_nested(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Build a format error at the current position.
    pub fn error(&self, message: impl Into<String>) -> LibsiftError {
        LibsiftError::format_at(message, self.position)
    }

    /// Fill `buf` completely.
    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.inner.read_exact(buf).map_err(|e| self.map_io(e))?;
        self.position += buf.len() as u64;
        Ok(())
    }

    fn map_io(&self, err: io::Error) -> LibsiftError {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            self.error("truncated stream")
        } else {
            LibsiftError::io("Failed to read profile data", err)
        }
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Read a fixed-width little-endian `i32`.
    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    /// Read a fixed-width little-endian `u32`.
    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    /// Read a fixed-width little-endian `u64`.
    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    /// Read a fixed-width little-endian `i64`.
    pub fn read_i64(&mut self) -> Result<i64> {
        Ok(i64::from_le_bytes(self.read_array()?))
    }

    /// Read a little-endian IEEE-754 `f64`.
    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_le_bytes(self.read_array()?))
    }

    /// Read a single byte.
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    /// Read a boolean byte; anything other than 0 or 1 is malformed.
    pub fn read_bool(&mut self) -> Result<bool> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(self.error(format!("invalid boolean byte {other:#04x}"))),
        }
    }

    /// Read an unsigned varint.
    pub fn read_varint(&mut self) -> Result<u64> {
        match varint::read_u64(&mut *self.inner) {
            Ok((value, consumed)) => {
                self.position += consumed as u64;
                Ok(value)
            }
            Err(err) => {
                self.position += err.consumed as u64;
                match (err.kind, err.source) {
                    (_, Some(io_err)) => Err(self.map_io(io_err)),
                    (VarintErrorKind::Truncated, None) => Err(self.error("truncated varint")),
                    (VarintErrorKind::Overflow, None) => {
                        Err(self.error("varint overflows 64 bits"))
                    }
                }
            }
        }
    }

    /// Read a collection length, rejecting implausible sizes.
    pub fn read_len(&mut self) -> Result<usize> {
        let value = self.read_varint()?;
        usize::try_from(value)
            .ok()
            .filter(|len| *len <= MAX_COLLECTION_LEN)
            .ok_or_else(|| self.error(format!("collection length {value} exceeds limit")))
    }

    /// Read an index that must fit in `u32`.
    pub fn read_index(&mut self) -> Result<u32> {
        let value = self.read_varint()?;
        u32::try_from(value).map_err(|_| self.error(format!("index {value} exceeds u32")))
    }

    /// Read a zig-zag encoded signed varint.
    pub fn read_signed(&mut self) -> Result<i64> {
        Ok(varint::zigzag_decode(self.read_varint()?))
    }

    /// Read a length-prefixed UTF-8 string.
    pub fn read_string(&mut self) -> Result<String> {
        let len = self.read_varint()?;
        let len = usize::try_from(len)
            .ok()
            .filter(|len| *len <= MAX_STRING_LEN)
            .ok_or_else(|| self.error(format!("string length {len} exceeds limit")))?;
        let mut buf = vec![0u8; len];
        self.read_exact(&mut buf)?;
        String::from_utf8(buf).map_err(|e| self.error(format!("invalid UTF-8 string: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_tracks_position() {
        let mut buf = Vec::new();
        let mut writer = ProfileWriter::new(&mut buf);
        writer.write_i32(-7).unwrap();
        writer.write_varint(300).unwrap();
        writer.write_str("Lcom/example/Foo;").unwrap();
        assert_eq!(writer.position(), 4 + 2 + 1 + 17);
        assert_eq!(buf.len(), 24);
        assert_eq!(&buf[..4], &(-7i32).to_le_bytes());
    }

    #[test]
    fn test_reader_decodes_mixed_fields() {
        let mut buf = Vec::new();
        {
            let mut writer = ProfileWriter::new(&mut buf);
            writer.write_u32(0xcafe_babe).unwrap();
            writer.write_signed(-42).unwrap();
            writer.write_f64(0.25).unwrap();
            writer.write_bool(true).unwrap();
            writer.write_str("()V").unwrap();
        }

        let mut cursor = &buf[..];
        let mut reader = ProfileReader::new(&mut cursor);
        assert_eq!(reader.read_u32().unwrap(), 0xcafe_babe);
        assert_eq!(reader.read_signed().unwrap(), -42);
        assert_eq!(reader.read_f64().unwrap(), 0.25);
        assert!(reader.read_bool().unwrap());
        assert_eq!(reader.read_string().unwrap(), "()V");
        assert_eq!(reader.position(), buf.len() as u64);
    }

    #[test]
    fn test_truncated_fixed_width_read_reports_offset() {
        let buf = [1u8, 2, 3];
        let mut cursor = &buf[..];
        let mut reader = ProfileReader::new(&mut cursor);
        let err = reader.read_i32().unwrap_err();
        match err {
            LibsiftError::Format { offset, .. } => assert_eq!(offset, Some(0)),
            other => panic!("Expected Format error, got {other:?}"),
        }
    }

    #[test]
    fn test_truncated_string_payload() {
        let mut buf = Vec::new();
        ProfileWriter::new(&mut buf).write_len(10).unwrap();
        buf.extend_from_slice(b"abc");

        let mut cursor = &buf[..];
        let mut reader = ProfileReader::new(&mut cursor);
        assert!(reader.read_string().unwrap_err().is_format());
    }

    #[test]
    fn test_truncated_varint_reports_offset_after_consumed_bytes() {
        let buf = [9u8, 0x80, 0x80];
        let mut cursor = &buf[..];
        let mut reader = ProfileReader::new(&mut cursor);
        reader.read_u8().unwrap();
        match reader.read_varint().unwrap_err() {
            LibsiftError::Format { offset, .. } => assert_eq!(offset, Some(3)),
            other => panic!("Expected Format error, got {other:?}"),
        }
    }

    #[test]
    fn test_nesting_depth_is_bounded_and_restored() {
        let buf: [u8; 0] = [];
        let mut cursor = &buf[..];
        let mut reader = ProfileReader::new(&mut cursor);
        for _ in 0..MAX_NESTING {
            reader.enter_nested().unwrap();
        }
        assert!(reader.enter_nested().unwrap_err().is_format());
        reader.exit_nested();
        reader.enter_nested().unwrap();
    }

    #[test]
    fn test_invalid_bool_byte() {
        let buf = [7u8];
        let mut cursor = &buf[..];
        let mut reader = ProfileReader::new(&mut cursor);
        assert!(reader.read_bool().unwrap_err().is_format());
    }
}
