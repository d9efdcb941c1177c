//! Crash simulation for MsgLog.
//!
//! A crash can leave a log file ending in a partial record. These helpers
//! produce such files directly, or fail the writer's storage on demand, so
//! tests can check what recovery keeps.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use msglog_testkit::crash::{tear_last_record, FlakyBackend};
//!
//! tear_last_record(&path, 3)?;
//! let log = Log::recover(&path)?;
//! ```

use msglog_storage::{ReaderSource, StorageBackend, StorageError, StorageResult};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Appends raw bytes to the end of a log file, as a torn write would.
///
/// The log must not be open for writing.
pub fn append_garbage(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = OpenOptions::new().append(true).open(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

/// Cuts `bytes` off the end of a log file, tearing its last record.
///
/// Returns the new file length.
pub fn tear_last_record(path: &Path, bytes: u64) -> io::Result<u64> {
    let file = OpenOptions::new().write(true).open(path)?;
    let len = file.metadata()?.len();
    let new_len = len.saturating_sub(bytes);
    file.set_len(new_len)?;
    file.sync_all()?;
    Ok(new_len)
}

/// Shared switches controlling a [`FlakyBackend`].
///
/// Clones control the same backend, so a test keeps one after handing the
/// backend to a log.
#[derive(Debug, Clone)]
pub struct FaultSwitch {
    fail_on_flush: Arc<AtomicBool>,
    reject_appends: Arc<AtomicU64>,
    crash_after_bytes: Arc<AtomicU64>,
    bytes_written: Arc<AtomicU64>,
    failed_flushes: Arc<AtomicU64>,
    crashed: Arc<AtomicBool>,
}

impl Default for FaultSwitch {
    fn default() -> Self {
        Self {
            fail_on_flush: Arc::default(),
            reject_appends: Arc::default(),
            crash_after_bytes: Arc::new(AtomicU64::new(u64::MAX)),
            bytes_written: Arc::default(),
            failed_flushes: Arc::default(),
            crashed: Arc::default(),
        }
    }
}

impl FaultSwitch {
    /// Sets whether flush should fail.
    pub fn set_fail_on_flush(&self, fail: bool) {
        self.fail_on_flush.store(fail, Ordering::SeqCst);
    }

    /// Makes the next `count` appends fail without storing any byte.
    pub fn reject_next_appends(&self, count: u64) {
        self.reject_appends.store(count, Ordering::SeqCst);
    }

    /// Makes appends fail once `bytes` bytes have been written in total.
    ///
    /// The append that crosses the threshold writes its bytes up to the
    /// threshold and then fails, leaving a torn record behind.
    pub fn crash_after(&self, bytes: u64) {
        self.crash_after_bytes.store(bytes, Ordering::SeqCst);
    }

    /// Returns how many flushes have been failed on purpose.
    pub fn failed_flushes(&self) -> u64 {
        self.failed_flushes.load(Ordering::SeqCst)
    }

    /// Returns whether an append has crashed.
    pub fn has_crashed(&self) -> bool {
        self.crashed.load(Ordering::SeqCst)
    }

    /// Clears every fault.
    pub fn reset(&self) {
        self.fail_on_flush.store(false, Ordering::SeqCst);
        self.reject_appends.store(0, Ordering::SeqCst);
        self.crash_after_bytes.store(u64::MAX, Ordering::SeqCst);
        self.crashed.store(false, Ordering::SeqCst);
    }
}

/// A storage backend wrapper with switchable faults.
pub struct FlakyBackend {
    inner: Box<dyn StorageBackend>,
    switch: FaultSwitch,
}

impl FlakyBackend {
    /// Wraps `inner`; no faults are active until switched on.
    pub fn new(inner: Box<dyn StorageBackend>) -> Self {
        Self {
            inner,
            switch: FaultSwitch::default(),
        }
    }

    /// Returns a handle to this backend's fault switches.
    pub fn switch(&self) -> FaultSwitch {
        self.switch.clone()
    }
}

fn simulated(what: &str) -> StorageError {
    StorageError::Io(io::Error::new(io::ErrorKind::Other, format!("simulated {what}")))
}

impl StorageBackend for FlakyBackend {
    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        let rejected = self
            .switch
            .reject_appends
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if rejected.is_ok() {
            return Err(simulated("rejected write"));
        }

        let len = data.len() as u64;
        let current = self.switch.bytes_written.load(Ordering::SeqCst);
        let threshold = self.switch.crash_after_bytes.load(Ordering::SeqCst);

        if current.saturating_add(len) > threshold {
            self.switch.crashed.store(true, Ordering::SeqCst);
            let partial = threshold.saturating_sub(current) as usize;
            if partial > 0 {
                self.inner.append(&data[..partial])?;
                self.switch.bytes_written.fetch_add(partial as u64, Ordering::SeqCst);
            }
            return Err(simulated("crash during write"));
        }

        let offset = self.inner.append(data)?;
        self.switch.bytes_written.fetch_add(len, Ordering::SeqCst);
        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        if self.switch.fail_on_flush.load(Ordering::SeqCst) {
            self.switch.failed_flushes.fetch_add(1, Ordering::SeqCst);
            return Err(simulated("flush failure"));
        }
        self.inner.flush()
    }

    fn size(&self) -> StorageResult<u64> {
        self.inner.size()
    }

    fn durable_size(&self) -> StorageResult<u64> {
        self.inner.durable_size()
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        self.inner.truncate(new_size)
    }

    fn reader_source(&self) -> Arc<dyn ReaderSource> {
        self.inner.reader_source()
    }
}
