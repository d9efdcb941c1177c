//! Varint encoder.

use crate::{MAX_PAYLOAD_BYTES, MAX_SHORT, MAX_VARINT_LEN};
use std::io::{self, Write};

/// Encodes `value` into `buf` and returns the encoded slice.
///
/// Values up to `0x7F` take one byte. Larger values are written as a prefix
/// byte holding the negated byte count followed by the minimal big-endian
/// representation of the value.
///
/// # Example
///
/// ```
/// use msglog_codec::{encode_uint, MAX_VARINT_LEN};
///
/// let mut buf = [0u8; MAX_VARINT_LEN];
/// assert_eq!(encode_uint(0x7F, &mut buf), &[0x7F]);
/// assert_eq!(encode_uint(0x100, &mut buf), &[0xFE, 0x01, 0x00]);
/// ```
pub fn encode_uint(value: u64, buf: &mut [u8; MAX_VARINT_LEN]) -> &[u8] {
    if value <= MAX_SHORT {
        buf[0] = value as u8;
        return &buf[..1];
    }

    let n = payload_bytes(value);
    let start = MAX_VARINT_LEN - n;
    buf[start..].copy_from_slice(&value.to_be_bytes()[MAX_PAYLOAD_BYTES - n..]);
    // n is 1..=8, so the negated count always has the high bit set
    buf[start - 1] = (n as u8).wrapping_neg();
    &buf[start - 1..]
}

/// Returns the number of bytes [`encode_uint`] produces for `value`.
#[must_use]
pub const fn encoded_len(value: u64) -> usize {
    if value <= MAX_SHORT {
        1
    } else {
        1 + payload_bytes(value)
    }
}

/// Writes the encoding of `value` to `writer`, returning the bytes written.
///
/// # Errors
///
/// Returns any error from the underlying writer.
pub fn write_uint<W: Write + ?Sized>(writer: &mut W, value: u64) -> io::Result<usize> {
    let mut buf = [0u8; MAX_VARINT_LEN];
    let encoded = encode_uint(value, &mut buf);
    writer.write_all(encoded)?;
    Ok(encoded.len())
}

/// Minimal number of big-endian bytes needed to hold a non-zero value.
const fn payload_bytes(value: u64) -> usize {
    MAX_PAYLOAD_BYTES - (value.leading_zeros() / 8) as usize
}

/// A growable buffer that varints are appended to.
///
/// Used to assemble a whole record, header and payload, before it is handed
/// to storage in a single write.
#[derive(Debug, Default, Clone)]
pub struct VarintEncoder {
    buffer: Vec<u8>,
}

impl VarintEncoder {
    /// Creates an empty encoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an encoder with room for `capacity` bytes.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Appends one varint.
    pub fn put_uint(&mut self, value: u64) -> &mut Self {
        let mut buf = [0u8; MAX_VARINT_LEN];
        self.buffer.extend_from_slice(encode_uint(value, &mut buf));
        self
    }

    /// Appends raw bytes after the varints encoded so far.
    pub fn put_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.buffer.extend_from_slice(bytes);
        self
    }

    /// Returns the bytes encoded so far.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Number of bytes encoded so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns true if nothing has been encoded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Clears the buffer, keeping its allocation.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Consumes the encoder and returns the encoded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }
}
