//! Error types for the codec crate.

use std::io;
use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while decoding varints.
#[derive(Error, Debug)]
pub enum CodecError {
    /// The length prefix announces more bytes than a `u64` can hold.
    #[error("malformed varint: length prefix announces {width} bytes (max {max})", max = crate::MAX_PAYLOAD_BYTES)]
    Malformed {
        /// Byte count derived from the prefix.
        width: usize,
    },

    /// Input ended before the varint was complete.
    #[error("truncated varint: unexpected end of input")]
    Truncated,

    /// The underlying reader failed.
    #[error("I/O error while decoding: {0}")]
    Io(#[from] io::Error),
}

impl CodecError {
    /// Maps a reader error, folding `UnexpectedEof` into [`CodecError::Truncated`].
    pub fn from_read(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            Self::Truncated
        } else {
            Self::Io(err)
        }
    }

    /// Returns true if the error means the input simply ran out.
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        matches!(self, Self::Truncated)
    }
}
