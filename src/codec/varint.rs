//! LEB128 variable-length integers.
//!
//! Counts and descriptor indices are overwhelmingly small, so every one of
//! them goes through this encoding. Signed values are zig-zag mapped first.

use std::io::{self, Read, Write};

/// Longest encoding of a `u64`.
pub const MAX_VARINT_LEN: usize = 10;

/// Number of bytes `value` occupies once encoded.
pub fn encoded_len(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    bits.max(1).div_ceil(7)
}

/// Append the encoding of `value` to `out`.
pub fn encode_u64(mut value: u64, out: &mut Vec<u8>) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

/// Write `value` and return the number of bytes written.
pub fn write_u64<W: Write + ?Sized>(writer: &mut W, value: u64) -> io::Result<usize> {
    let mut buf = Vec::with_capacity(MAX_VARINT_LEN);
    encode_u64(value, &mut buf);
    writer.write_all(&buf)?;
    Ok(buf.len())
}

/// Why a varint could not be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarintErrorKind {
    /// Stream ended inside the encoding
    Truncated,
    /// More than ten bytes, or bits beyond 64
    Overflow,
}

/// Failed varint read.
#[derive(Debug)]
pub struct VarintError {
    /// What went wrong
    pub kind: VarintErrorKind,
    /// Bytes taken from the reader before the failure
    pub consumed: usize,
    /// Underlying I/O failure other than end of stream
    pub source: Option<io::Error>,
}

impl VarintError {
    fn new(kind: VarintErrorKind, consumed: usize) -> Self {
        Self {
            kind,
            consumed,
            source: None,
        }
    }
}

/// Read one varint, returning the value and the number of bytes consumed.
pub fn read_u64<R: Read + ?Sized>(
    reader: &mut R,
) -> std::result::Result<(u64, usize), VarintError> {
    let mut value: u64 = 0;
    let mut byte = [0u8; 1];

    for index in 0..MAX_VARINT_LEN {
        match reader.read_exact(&mut byte) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                return Err(VarintError::new(VarintErrorKind::Truncated, index))
            }
            Err(e) => {
                return Err(VarintError {
                    source: Some(e),
                    ..VarintError::new(VarintErrorKind::Truncated, index)
                })
            }
        }

        let payload = u64::from(byte[0] & 0x7f);
        let shift = 7 * index as u32;
        // The tenth byte may only carry the single remaining bit.
        if index == MAX_VARINT_LEN - 1 && payload > 1 {
            return Err(VarintError::new(VarintErrorKind::Overflow, index + 1));
        }
        value |= payload << shift;

        if byte[0] & 0x80 == 0 {
            return Ok((value, index + 1));
        }
    }

    Err(VarintError::new(VarintErrorKind::Overflow, MAX_VARINT_LEN))
}

/// Map a signed value onto the unsigned range so small magnitudes stay short.
pub fn zigzag_encode(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

/// Inverse of [`zigzag_encode`].
pub fn zigzag_decode(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}
