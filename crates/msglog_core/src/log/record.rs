//! Record header type and its on-disk encoding.

use msglog_codec::{encoded_len, read_uint, CodecResult, VarintDecoder, VarintEncoder, MAX_VARINT_LEN};
use std::fmt;
use std::io::{self, Read, Write};

/// Number of varint fields in a record header.
pub const HEADER_FIELDS: usize = 7;

/// Largest possible encoded header.
pub const MAX_HEADER_LEN: usize = HEADER_FIELDS * MAX_VARINT_LEN;

/// A record header.
///
/// On disk a header is seven varints back to back, in field order, followed
/// by `length` payload bytes. `seq`, `time`, `pos` and `prev_pos` are
/// assigned by the writer; callers of [`crate::Log::push`] only supply
/// `from`, `id` and optionally `length`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Msg {
    /// Sequence number, dense from 0.
    pub seq: u64,
    /// Wall-clock time of the append, nanoseconds since the Unix epoch.
    pub time: u64,
    /// Caller-defined source identifier.
    pub from: u64,
    /// Byte offset of this record in the log.
    pub pos: u64,
    /// Byte offset of the previous record (0 for the first).
    pub prev_pos: u64,
    /// Caller-defined message identifier.
    pub id: u64,
    /// Payload length in bytes.
    pub length: u64,
}

impl Msg {
    /// Creates a header for [`crate::Log::push`].
    ///
    /// The length is left at 0, which makes the writer take it from the
    /// payload.
    #[must_use]
    pub const fn new(from: u64, id: u64) -> Self {
        Self {
            seq: 0,
            time: 0,
            from,
            pos: 0,
            prev_pos: 0,
            id,
            length: 0,
        }
    }

    /// Declares an explicit payload length.
    #[must_use]
    pub const fn with_length(mut self, length: u64) -> Self {
        self.length = length;
        self
    }

    const fn fields(&self) -> [u64; HEADER_FIELDS] {
        [
            self.seq,
            self.time,
            self.from,
            self.pos,
            self.prev_pos,
            self.id,
            self.length,
        ]
    }

    /// Returns the encoded size of the header alone.
    #[must_use]
    pub fn header_size(&self) -> u64 {
        self.fields().iter().map(|&f| encoded_len(f) as u64).sum()
    }

    /// Returns the encoded size of the header plus the payload.
    ///
    /// Saturates at `u64::MAX` for a decoded `length` no log can hold.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.header_size().saturating_add(self.length)
    }

    /// Returns the offset just past this record, where the next one starts.
    ///
    /// Saturates like [`Msg::total_size`]; use [`Msg::checked_end_pos`] on
    /// headers read from untrusted bytes.
    #[must_use]
    pub fn end_pos(&self) -> u64 {
        self.pos.saturating_add(self.total_size())
    }

    /// Returns the offset just past this record, or `None` if it does not
    /// fit in a `u64`.
    #[must_use]
    pub fn checked_end_pos(&self) -> Option<u64> {
        self.header_size()
            .checked_add(self.length)
            .and_then(|size| self.pos.checked_add(size))
    }

    /// Appends the encoded header to `encoder`.
    pub fn encode_header(&self, encoder: &mut VarintEncoder) {
        for field in self.fields() {
            encoder.put_uint(field);
        }
    }

    /// Writes the encoded header and returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns any error from the underlying writer.
    pub fn write_header<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<usize> {
        let mut encoder = VarintEncoder::with_capacity(MAX_HEADER_LEN);
        self.encode_header(&mut encoder);
        writer.write_all(encoder.as_bytes())?;
        Ok(encoder.len())
    }

    /// Reads one header.
    ///
    /// Returns the header and the number of bytes it occupied.
    ///
    /// # Errors
    ///
    /// Returns a codec error if any field is truncated or malformed.
    pub fn read_header<R: Read + ?Sized>(reader: &mut R) -> CodecResult<(Self, u64)> {
        let mut tally = Tally {
            inner: reader,
            count: 0,
        };
        let mut fields = [0u64; HEADER_FIELDS];
        for field in &mut fields {
            *field = read_uint(&mut tally)?;
        }
        Ok((Self::from_fields(fields), tally.count))
    }

    /// Decodes one header from the front of `bytes`.
    ///
    /// Returns the header and the number of bytes it occupied.
    ///
    /// # Errors
    ///
    /// Returns a codec error if any field is truncated or malformed.
    pub fn decode_header(bytes: &[u8]) -> CodecResult<(Self, usize)> {
        let mut decoder = VarintDecoder::new(bytes);
        let mut fields = [0u64; HEADER_FIELDS];
        for field in &mut fields {
            *field = decoder.read_uint()?;
        }
        Ok((Self::from_fields(fields), decoder.position()))
    }

    const fn from_fields(f: [u64; HEADER_FIELDS]) -> Self {
        Self {
            seq: f[0],
            time: f[1],
            from: f[2],
            pos: f[3],
            prev_pos: f[4],
            id: f[5],
            length: f[6],
        }
    }
}

impl fmt::Display for Msg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seq:{} pos:{} len:{}", self.seq, self.pos, self.length)
    }
}

/// Counts the bytes pulled through a reader.
struct Tally<'a, R: ?Sized> {
    inner: &'a mut R,
    count: u64,
}

impl<R: Read + ?Sized> Read for Tally<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.count += n as u64;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use msglog_codec::CodecError;
    use std::io::Cursor;

    fn sample() -> Msg {
        Msg {
            seq: 300,
            time: 1_700_000_000_000_000_000,
            from: 7,
            pos: 4096,
            prev_pos: 4000,
            id: 42,
            length: 5,
        }
    }

    #[test]
    fn new_leaves_writer_fields_zero() {
        let msg = Msg::new(3, 9).with_length(12);
        assert_eq!(msg.from, 3);
        assert_eq!(msg.id, 9);
        assert_eq!(msg.length, 12);
        assert_eq!(msg.seq, 0);
        assert_eq!(msg.pos, 0);
    }

    #[test]
    fn header_size_is_sum_of_field_widths() {
        // 0 fits the short form, so an all-zero header is seven bytes
        assert_eq!(Msg::default().header_size(), 7);
        assert_eq!(Msg::default().total_size(), 7);

        let msg = sample();
        let expected: u64 = [3, 9, 1, 3, 3, 1, 1].iter().sum();
        assert_eq!(msg.header_size(), expected);
        assert_eq!(msg.total_size(), expected + 5);
        assert_eq!(msg.end_pos(), 4096 + expected + 5);
    }

    #[test]
    fn write_then_read_header() {
        let msg = sample();
        let mut buf = Vec::new();
        let written = msg.write_header(&mut buf).unwrap();
        assert_eq!(written as u64, msg.header_size());

        let (decoded, consumed) = Msg::read_header(&mut Cursor::new(&buf)).unwrap();
        assert_eq!(decoded, msg);
        assert_eq!(consumed, msg.header_size());

        let (decoded, consumed) = Msg::decode_header(&buf).unwrap();
        assert_eq!(decoded, msg);
        assert_eq!(consumed, buf.len());
    }

    #[test]
    fn encode_header_matches_write_header() {
        let msg = sample();
        let mut encoder = VarintEncoder::new();
        msg.encode_header(&mut encoder);

        let mut written = Vec::new();
        msg.write_header(&mut written).unwrap();
        assert_eq!(encoder.as_bytes(), written.as_slice());
    }

    #[test]
    fn read_header_truncated() {
        let mut buf = Vec::new();
        sample().write_header(&mut buf).unwrap();
        buf.truncate(buf.len() - 1);

        let err = Msg::read_header(&mut Cursor::new(&buf)).unwrap_err();
        assert!(matches!(err, CodecError::Truncated));
    }

    #[test]
    fn read_header_malformed_prefix() {
        // 0xF0 announces 16 bytes
        let err = Msg::read_header(&mut Cursor::new(&[0xF0u8, 0, 0])).unwrap_err();
        assert!(matches!(err, CodecError::Malformed { .. }));
    }

    #[test]
    fn oversized_length_does_not_overflow() {
        let msg = Msg {
            pos: 14,
            length: u64::MAX,
            ..Msg::default()
        };
        assert_eq!(msg.checked_end_pos(), None);
        assert_eq!(msg.total_size(), u64::MAX);
        assert_eq!(msg.end_pos(), u64::MAX);

        assert_eq!(sample().checked_end_pos(), Some(sample().end_pos()));
    }

    #[test]
    fn display() {
        assert_eq!(sample().to_string(), "seq:300 pos:4096 len:5");
    }
}
