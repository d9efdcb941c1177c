//! In-memory storage backend for testing.

use crate::backend::{LogReader, ReaderSource, StorageBackend};
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;

/// An in-memory storage backend.
///
/// Appended bytes sit in a private pending buffer until `flush` moves them
/// into the shared flushed buffer. Readers only ever see flushed bytes, which
/// makes this backend a faithful model of durability for tests.
///
/// Clones share the flushed buffer, so a clone kept by a test can inspect
/// what a log wrote after the log itself is gone.
///
/// # Example
///
/// ```rust
/// use msglog_storage::{InMemoryBackend, StorageBackend};
///
/// let mut backend = InMemoryBackend::new();
/// let view = backend.clone();
/// backend.append(b"test data").unwrap();
/// assert!(view.data().is_empty());
///
/// backend.flush().unwrap();
/// assert_eq!(view.data(), b"test data");
/// ```
#[derive(Debug, Default, Clone)]
pub struct InMemoryBackend {
    flushed: Arc<RwLock<Vec<u8>>>,
    pending: Vec<u8>,
}

impl InMemoryBackend {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend whose durable contents are `data`.
    ///
    /// Useful for testing recovery scenarios.
    #[must_use]
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            flushed: Arc::new(RwLock::new(data)),
            pending: Vec::new(),
        }
    }

    /// Returns a copy of the flushed bytes.
    #[must_use]
    pub fn data(&self) -> Vec<u8> {
        self.flushed.read().clone()
    }

    /// Appends bytes straight to the flushed buffer, bypassing the writer.
    ///
    /// Simulates a torn write left behind by a crash.
    pub fn inject(&self, bytes: &[u8]) {
        self.flushed.write().extend_from_slice(bytes);
    }
}

impl StorageBackend for InMemoryBackend {
    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        let offset = self.size()?;
        self.pending.extend_from_slice(data);
        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        if !self.pending.is_empty() {
            self.flushed.write().append(&mut self.pending);
        }
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok((self.flushed.read().len() + self.pending.len()) as u64)
    }

    fn durable_size(&self) -> StorageResult<u64> {
        Ok(self.flushed.read().len() as u64)
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        let size = self.size()?;
        if new_size > size {
            return Err(StorageError::TruncateBeyondEnd {
                requested: new_size,
                size,
            });
        }

        let mut flushed = self.flushed.write();
        flushed.append(&mut self.pending);
        flushed.truncate(new_size as usize);
        Ok(())
    }

    fn reader_source(&self) -> Arc<dyn ReaderSource> {
        Arc::new(MemorySource {
            data: Arc::clone(&self.flushed),
        })
    }
}

/// Opens cursors over the flushed buffer.
#[derive(Debug)]
struct MemorySource {
    data: Arc<RwLock<Vec<u8>>>,
}

impl ReaderSource for MemorySource {
    fn open_reader(&self) -> StorageResult<Box<dyn LogReader>> {
        Ok(Box::new(MemoryReader {
            data: Arc::clone(&self.data),
            pos: 0,
        }))
    }
}

/// Read cursor over the flushed buffer of an [`InMemoryBackend`].
#[derive(Debug)]
struct MemoryReader {
    data: Arc<RwLock<Vec<u8>>>,
    pos: u64,
}

impl Read for MemoryReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let data = self.data.read();
        let start = usize::try_from(self.pos).unwrap_or(usize::MAX);
        if start >= data.len() {
            return Ok(0);
        }
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for MemoryReader {
    fn seek(&mut self, from: SeekFrom) -> io::Result<u64> {
        let (base, offset) = match from {
            SeekFrom::Start(pos) => {
                self.pos = pos;
                return Ok(pos);
            }
            SeekFrom::End(offset) => (self.data.read().len() as u64, offset),
            SeekFrom::Current(offset) => (self.pos, offset),
        };

        match base.checked_add_signed(offset) {
            Some(pos) => {
                self.pos = pos;
                Ok(pos)
            }
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek to a negative or overflowing position",
            )),
        }
    }
}
