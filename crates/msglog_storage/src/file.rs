//! File-based storage backend for persistent logs.

use crate::backend::{LogReader, ReaderSource, StorageBackend};
use crate::error::{StorageError, StorageResult};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Tuning knobs for [`FileBackend`].
#[derive(Debug, Clone, Copy)]
pub struct FileOptions {
    /// Capacity of the in-process write buffer.
    pub buffer_capacity: usize,
    /// Whether `flush` also calls `sync_data`.
    pub sync_on_flush: bool,
}

impl Default for FileOptions {
    fn default() -> Self {
        Self {
            buffer_capacity: 64 * 1024,
            sync_on_flush: true,
        }
    }
}

/// A file-based storage backend.
///
/// Appends go through a `BufWriter`, so small record writes do not each cost
/// a system call. The file is locked exclusively for the lifetime of the
/// backend; readers open their own read-only handles and are not affected by
/// the advisory lock.
///
/// # Durability
///
/// - `flush()` drains the buffer to the OS and, when `sync_on_flush` is set,
///   calls `File::sync_data()`
/// - `truncate()` always syncs
///
/// # Example
///
/// ```no_run
/// use msglog_storage::{FileBackend, FileOptions, StorageBackend};
/// use std::path::Path;
///
/// let mut backend = FileBackend::create(Path::new("events.log"), FileOptions::default()).unwrap();
/// backend.append(b"persistent data").unwrap();
/// backend.flush().unwrap();
/// ```
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    writer: BufWriter<File>,
    size: u64,
    durable: u64,
    sync_on_flush: bool,
}

impl FileBackend {
    /// Creates a new, empty log file, discarding any previous contents.
    ///
    /// The lock is taken before the old contents are discarded, so a file
    /// owned by a live writer is never clobbered.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Locked`] if another writer holds the file,
    /// or an I/O error if it cannot be created.
    pub fn create(path: &Path, options: FileOptions) -> StorageResult<Self> {
        let file = Self::open_locked(path, true)?;
        file.set_len(0)?;
        Self::from_locked(path, file, options)
    }

    /// Opens an existing log file for appending at its end.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Locked`] if another writer holds the file,
    /// or an I/O error if it does not exist or cannot be opened.
    pub fn open(path: &Path, options: FileOptions) -> StorageResult<Self> {
        let file = Self::open_locked(path, false)?;
        Self::from_locked(path, file, options)
    }

    /// Returns the path to the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open_locked(path: &Path, create: bool) -> StorageResult<File> {
        if create {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(create)
            .truncate(false)
            .open(path)?;

        // Non-blocking: a second writer must fail fast
        if file.try_lock_exclusive().is_err() {
            return Err(StorageError::Locked {
                path: path.to_path_buf(),
            });
        }
        Ok(file)
    }

    fn from_locked(path: &Path, mut file: File, options: FileOptions) -> StorageResult<Self> {
        let size = file.seek(SeekFrom::End(0))?;
        tracing::debug!(path = %path.display(), size, "log file opened for append");

        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::with_capacity(options.buffer_capacity, file),
            size,
            durable: size,
            sync_on_flush: options.sync_on_flush,
        })
    }
}

impl StorageBackend for FileBackend {
    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        let offset = self.size;
        let mut rest = data;

        // write_all, keeping count of what the buffer took before a failure
        while !rest.is_empty() {
            match self.writer.write(rest) {
                Ok(0) => return Err(io::Error::from(io::ErrorKind::WriteZero).into()),
                Ok(n) => {
                    self.size += n as u64;
                    rest = &rest[n..];
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        self.writer.flush()?;
        if self.sync_on_flush {
            self.writer.get_ref().sync_data()?;
        }
        self.durable = self.size;
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.size)
    }

    fn durable_size(&self) -> StorageResult<u64> {
        Ok(self.durable)
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        if new_size > self.size {
            return Err(StorageError::TruncateBeyondEnd {
                requested: new_size,
                size: self.size,
            });
        }

        self.writer.flush()?;
        let file = self.writer.get_mut();
        file.set_len(new_size)?;
        file.sync_all()?;
        file.seek(SeekFrom::End(0))?;

        self.size = new_size;
        self.durable = new_size;
        Ok(())
    }

    fn reader_source(&self) -> Arc<dyn ReaderSource> {
        Arc::new(FileSource {
            path: self.path.clone(),
        })
    }
}

/// Opens read-only handles on a log file.
#[derive(Debug)]
struct FileSource {
    path: PathBuf,
}

impl ReaderSource for FileSource {
    fn open_reader(&self) -> StorageResult<Box<dyn LogReader>> {
        Ok(Box::new(File::open(&self.path)?))
    }
}
