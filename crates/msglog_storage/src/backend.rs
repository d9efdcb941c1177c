//! Storage backend trait definition.

use crate::error::StorageResult;
use std::io::{Read, Seek};
use std::sync::Arc;

/// An independent read cursor over a backend's durable bytes.
///
/// Every reader owns its own offset; seeking one reader never moves another.
pub trait LogReader: Read + Seek + Send {}

impl<T: Read + Seek + Send> LogReader for T {}

/// Opens readers over a backend's bytes.
///
/// Split from [`StorageBackend`] so readers can still be opened after the
/// backend itself has moved into the writer thread.
pub trait ReaderSource: Send + Sync {
    /// Opens a new independent reader positioned at offset 0.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage cannot be opened for
    /// reading.
    fn open_reader(&self) -> StorageResult<Box<dyn LogReader>>;
}

/// A low-level append-only storage backend.
///
/// # Invariants
///
/// - `append` returns the offset where the data will live
/// - appended bytes reach durable storage only after a successful `flush`
/// - a failed `flush` keeps every unflushed byte queued
/// - readers returned by `open_reader` never observe bytes past the last
///   successful flush for the in-memory backend, and never observe torn
///   data that is later rewritten for any backend
///
/// # Implementors
///
/// - [`super::FileBackend`] - For persistent storage
/// - [`super::InMemoryBackend`] - For testing
pub trait StorageBackend: Send {
    /// Appends data to the write buffer.
    ///
    /// Returns the offset where the data was placed.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs while spilling the buffer.
    /// Bytes of `data` accepted before the failure still count towards
    /// [`StorageBackend::size`], so callers can tell a rejected append from a
    /// torn one.
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Pushes every buffered byte to durable storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the write or sync fails. Unwritten bytes stay
    /// buffered and the next call retries them.
    fn flush(&mut self) -> StorageResult<()>;

    /// Returns the logical size, including buffered bytes.
    ///
    /// This is the offset where the next `append` will write.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn size(&self) -> StorageResult<u64>;

    /// Returns the number of bytes known to be durable.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn durable_size(&self) -> StorageResult<u64>;

    /// Truncates the storage to `new_size` bytes.
    ///
    /// Used by recovery to cut off a torn trailing write.
    ///
    /// # Errors
    ///
    /// Returns an error if `new_size` exceeds the current size or the
    /// truncation fails.
    fn truncate(&mut self, new_size: u64) -> StorageResult<()>;

    /// Returns a shareable handle that opens readers over this backend.
    fn reader_source(&self) -> Arc<dyn ReaderSource>;

    /// Opens a new independent reader positioned at offset 0.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage cannot be opened for
    /// reading.
    fn open_reader(&self) -> StorageResult<Box<dyn LogReader>> {
        self.reader_source().open_reader()
    }
}
