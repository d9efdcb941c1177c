//! Error types for MsgLog core.

use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in MsgLog core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error (create, open, flush, truncate).
    #[error("storage error: {0}")]
    Storage(#[from] msglog_storage::StorageError),

    /// Varint decoding error (malformed prefix or truncated field).
    #[error("codec error: {0}")]
    Codec(#[from] msglog_codec::CodecError),

    /// I/O error on a consumer's read handle.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The caller supplied fewer payload bytes than the header declares.
    #[error("short payload: header declares {declared} bytes, got {actual}")]
    ShortPayload {
        /// Length declared in the header.
        declared: u64,
        /// Bytes actually supplied.
        actual: u64,
    },

    /// A record's payload ends past the end of the file.
    #[error("truncated payload at offset {pos}: expected {expected} bytes, read {actual}")]
    TruncatedPayload {
        /// Position of the record the payload belongs to.
        pos: u64,
        /// Declared payload length.
        expected: u64,
        /// Bytes available.
        actual: u64,
    },

    /// A back-link points at a record with the wrong sequence number.
    #[error("broken back-link at offset {pos}: expected seq {expected}, found {found}")]
    BrokenChain {
        /// Offset the back-link pointed to.
        pos: u64,
        /// Sequence number the link should lead to.
        expected: u64,
        /// Sequence number decoded there.
        found: u64,
    },

    /// A back-link leads to a record that does not end where its successor
    /// starts.
    #[error("broken back-link: record at offset {pos} ends at {end}, successor starts at {next_pos}")]
    ChainGap {
        /// Offset the back-link pointed to.
        pos: u64,
        /// Where the record found there ends (saturated on overflow).
        end: u64,
        /// Offset of the record holding the back-link.
        next_pos: u64,
    },

    /// A consumer's wait was cancelled.
    #[error("consumer cancelled")]
    Cancelled,

    /// The log has been closed.
    #[error("log is closed")]
    LogClosed,

    /// The writer thread panicked.
    #[error("writer thread panicked")]
    WriterPanicked,

    /// The writer stopped accepting records after a torn append.
    ///
    /// Records committed before the failure stay readable. Reopen the log
    /// with recovery to continue appending.
    #[error("writer stopped after a torn append")]
    WriterFailed,
}

impl CoreError {
    /// Returns true if the bytes themselves could not be decoded as a record.
    ///
    /// Recovery treats these as the end of the valid log. I/O failures are
    /// not decode failures.
    #[must_use]
    pub fn is_decode_failure(&self) -> bool {
        match self {
            Self::Codec(msglog_codec::CodecError::Io(_)) => false,
            Self::Codec(_) | Self::TruncatedPayload { .. } => true,
            _ => false,
        }
    }
}
