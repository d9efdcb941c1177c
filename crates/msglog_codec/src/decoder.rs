//! Varint decoder.

use crate::error::{CodecError, CodecResult};
use crate::{MAX_PAYLOAD_BYTES, MAX_SHORT};
use std::io::Read;

/// Reads one varint from `reader`.
///
/// # Errors
///
/// - [`CodecError::Truncated`] if the reader runs out mid-value
/// - [`CodecError::Malformed`] if the prefix announces more than 8 bytes
/// - [`CodecError::Io`] for any other read failure
pub fn read_uint<R: Read + ?Sized>(reader: &mut R) -> CodecResult<u64> {
    let mut first = [0u8; 1];
    reader.read_exact(&mut first).map_err(CodecError::from_read)?;

    let n = match long_form_width(first[0])? {
        None => return Ok(u64::from(first[0])),
        Some(n) => n,
    };

    let mut be = [0u8; MAX_PAYLOAD_BYTES];
    reader
        .read_exact(&mut be[MAX_PAYLOAD_BYTES - n..])
        .map_err(CodecError::from_read)?;
    Ok(u64::from_be_bytes(be))
}

/// Decodes one varint from the front of `bytes`.
///
/// Returns the value and the number of bytes consumed.
///
/// # Example
///
/// ```
/// use msglog_codec::decode_uint;
///
/// assert_eq!(decode_uint(&[0xFE, 0x01, 0x00, 0xAA]).unwrap(), (0x100, 3));
/// ```
///
/// # Errors
///
/// Same as [`read_uint`], minus I/O failures.
pub fn decode_uint(bytes: &[u8]) -> CodecResult<(u64, usize)> {
    let mut decoder = VarintDecoder::new(bytes);
    let value = decoder.read_uint()?;
    Ok((value, decoder.position()))
}

/// Interprets a prefix byte.
///
/// Returns `None` for the single-byte form, otherwise the number of payload
/// bytes that follow.
fn long_form_width(prefix: u8) -> CodecResult<Option<usize>> {
    if u64::from(prefix) <= MAX_SHORT {
        return Ok(None);
    }
    let width = usize::from((prefix as i8).unsigned_abs());
    if width > MAX_PAYLOAD_BYTES {
        return Err(CodecError::Malformed { width });
    }
    Ok(Some(width))
}

/// A cursor that decodes consecutive varints from a byte slice.
#[derive(Debug, Clone)]
pub struct VarintDecoder<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> VarintDecoder<'a> {
    /// Creates a decoder positioned at the start of `data`.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Decodes the next varint.
    ///
    /// On error the position is left unchanged.
    ///
    /// # Errors
    ///
    /// See [`read_uint`].
    pub fn read_uint(&mut self) -> CodecResult<u64> {
        let prefix = *self.data.get(self.pos).ok_or(CodecError::Truncated)?;
        let n = match long_form_width(prefix)? {
            None => {
                self.pos += 1;
                return Ok(u64::from(prefix));
            }
            Some(n) => n,
        };

        let start = self.pos + 1;
        let body = self
            .data
            .get(start..start + n)
            .ok_or(CodecError::Truncated)?;
        let value = body.iter().fold(0u64, |acc, &b| acc << 8 | u64::from(b));
        self.pos = start + n;
        Ok(value)
    }

    /// Returns the number of bytes consumed so far.
    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Returns true if all bytes have been consumed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Returns the bytes not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos.min(self.data.len())..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{encode_uint, encoded_len, MAX_VARINT_LEN};
    use proptest::prelude::*;
    use std::io::Cursor;

    #[test]
    fn decode_short_form() {
        assert_eq!(decode_uint(&[0x00]).unwrap(), (0, 1));
        assert_eq!(decode_uint(&[0x7F]).unwrap(), (0x7F, 1));
    }

    #[test]
    fn decode_long_form() {
        assert_eq!(decode_uint(&[0xFF, 0x80]).unwrap(), (0x80, 2));
        assert_eq!(decode_uint(&[0xFE, 0x01, 0x2C]).unwrap(), (300, 3));
    }

    #[test]
    fn oversized_prefix_is_malformed() {
        // 0xF7 announces nine bytes
        let err = decode_uint(&[0xF7, 0, 0, 0, 0, 0, 0, 0, 0, 1]).unwrap_err();
        assert!(matches!(err, CodecError::Malformed { width: 9 }));

        let err = decode_uint(&[0x80]).unwrap_err();
        assert!(matches!(err, CodecError::Malformed { width: 128 }));
    }

    #[test]
    fn empty_input_is_truncated() {
        assert!(decode_uint(&[]).unwrap_err().is_truncated());
    }

    #[test]
    fn missing_body_is_truncated() {
        assert!(decode_uint(&[0xFD, 0x01]).unwrap_err().is_truncated());

        let mut reader = Cursor::new(vec![0xFD, 0x01]);
        assert!(read_uint(&mut reader).unwrap_err().is_truncated());
    }

    #[test]
    fn decoder_walks_sequence() {
        let bytes = [0x05, 0xFF, 0x80, 0xFE, 0x01, 0x00];
        let mut decoder = VarintDecoder::new(&bytes);
        assert_eq!(decoder.read_uint().unwrap(), 5);
        assert_eq!(decoder.read_uint().unwrap(), 0x80);
        assert_eq!(decoder.read_uint().unwrap(), 0x100);
        assert!(decoder.is_empty());
        assert!(decoder.read_uint().unwrap_err().is_truncated());
    }

    #[test]
    fn failed_decode_keeps_position() {
        let bytes = [0x01, 0xFE, 0x01];
        let mut decoder = VarintDecoder::new(&bytes);
        decoder.read_uint().unwrap();
        assert!(decoder.read_uint().is_err());
        assert_eq!(decoder.position(), 1);
        assert_eq!(decoder.remaining(), &[0xFE, 0x01]);
    }

    proptest! {
        #[test]
        fn stream_and_slice_agree(value in any::<u64>()) {
            let mut buf = [0u8; MAX_VARINT_LEN];
            let encoded = encode_uint(value, &mut buf).to_vec();

            prop_assert_eq!(encoded.len(), encoded_len(value));
            prop_assert_eq!(decode_uint(&encoded).unwrap(), (value, encoded.len()));
            prop_assert_eq!(read_uint(&mut Cursor::new(&encoded)).unwrap(), value);
        }

        #[test]
        fn width_is_minimal(value in 0x80u64..) {
            let mut buf = [0u8; MAX_VARINT_LEN];
            let encoded = encode_uint(value, &mut buf);
            // the first payload byte is never a leading zero
            prop_assert_ne!(encoded[1], 0);
            prop_assert_eq!(encoded.len(), 1 + (64 - value.leading_zeros() as usize + 7) / 8);
        }
    }
}
