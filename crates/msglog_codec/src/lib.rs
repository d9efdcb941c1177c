//! # MsgLog Codec
//!
//! Self-describing unsigned varint encoding used by every MsgLog record
//! header field.
//!
//! ## Wire Format
//!
//! ```text
//! value <= 0x7F   | value (1) |
//! value >  0x7F   | -n (1) | big-endian value (n, 1..=8) |
//! ```
//!
//! The prefix of the long form is the byte count negated as an `i8`, so its
//! high bit is always set and the two forms can be told apart from the first
//! byte alone. The encoding must stay byte-identical: existing log files are
//! read with these exact rules.
//!
//! ## Usage
//!
//! ```
//! use msglog_codec::{decode_uint, encode_uint, MAX_VARINT_LEN};
//!
//! let mut buf = [0u8; MAX_VARINT_LEN];
//! let bytes = encode_uint(1_000_000, &mut buf);
//! assert_eq!(decode_uint(bytes).unwrap(), (1_000_000, bytes.len()));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod encoder;
mod error;

pub use decoder::{decode_uint, read_uint, VarintDecoder};
pub use encoder::{encode_uint, encoded_len, write_uint, VarintEncoder};
pub use error::{CodecError, CodecResult};

/// Largest value stored in the single-byte form.
pub const MAX_SHORT: u64 = 0x7F;

/// Maximum number of big-endian bytes after the prefix.
pub const MAX_PAYLOAD_BYTES: usize = std::mem::size_of::<u64>();

/// Maximum encoded width of one varint (prefix plus eight bytes).
pub const MAX_VARINT_LEN: usize = MAX_PAYLOAD_BYTES + 1;
