//! The message log: record format, writer, consumers and recovery.
//!
//! ## Record Format
//!
//! ```text
//! | seq | time | from | pos | prev_pos | id | length | payload (length) |
//! ```
//!
//! Every header field is a varint (see `msglog_codec`). Records are packed
//! back to back with no file header, padding or checksum; `pos` of record
//! `n + 1` equals `pos + total_size` of record `n`, and `prev_pos` points
//! back at record `n`.
//!
//! ## Visibility
//!
//! The writer thread publishes the committed count only after the bytes of
//! every counted record have been flushed. Consumers never read past it, so
//! they never observe a partially written record.
//!
//! ## Recovery
//!
//! [`Log::recover`] keeps the longest intact, correctly linked prefix of the
//! file and truncates the rest before the writer resumes.

mod consumer;
mod cursor;
mod record;
pub mod recovery;
mod writer;

pub use consumer::{CancelHandle, Consumer};
pub use record::{Msg, HEADER_FIELDS, MAX_HEADER_LEN};
pub use recovery::{RecoveryReport, ScanStop};
pub use writer::Log;
