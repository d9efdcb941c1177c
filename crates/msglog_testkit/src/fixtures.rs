//! Test fixtures and log helpers.
//!
//! Provides convenience functions for setting up test logs and waiting on
//! the writer.

use msglog_core::{CoreResult, Log, LogConfig};
use msglog_storage::InMemoryBackend;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// File name used for fixture logs.
pub const LOG_FILE: &str = "test.log";

/// A file-backed test log with automatic cleanup.
pub struct TempLog {
    /// The log instance.
    pub log: Log,
    path: PathBuf,
    // Kept alive so the directory outlives the log
    _temp_dir: TempDir,
}

impl TempLog {
    /// Creates a new empty log in a fresh temporary directory.
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    /// Creates a new empty log with explicit configuration.
    pub fn with_config(config: LogConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join(LOG_FILE);
        let log = Log::open_with_config(&path, config).expect("Failed to open log");

        Self {
            log,
            path,
            _temp_dir: temp_dir,
        }
    }

    /// Returns the log file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Closes the log and reopens it through recovery.
    ///
    /// Anything written to the file between the two, such as a simulated
    /// torn tail, is seen by recovery.
    pub fn reopen(self) -> CoreResult<Self> {
        let config = self.log.config().clone();
        self.reopen_with(config, |_| Ok(()))
    }

    /// Closes the log, runs `damage` on the file, then recovers it.
    pub fn reopen_with<F>(self, config: LogConfig, damage: F) -> CoreResult<Self>
    where
        F: FnOnce(&Path) -> std::io::Result<()>,
    {
        let Self {
            log,
            path,
            _temp_dir,
        } = self;
        log.close()?;
        drop(log);

        damage(&path)?;
        let log = Log::recover_with_config(&path, config)?;
        Ok(Self {
            log,
            path,
            _temp_dir,
        })
    }
}

impl Default for TempLog {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TempLog {
    type Target = Log;

    fn deref(&self) -> &Self::Target {
        &self.log
    }
}

/// Configuration for fast tests: no device sync on flush.
pub fn test_config() -> LogConfig {
    LogConfig::new().sync_on_flush(false)
}

/// Creates an in-memory log plus a view of its flushed bytes.
pub fn memory_log() -> (Log, InMemoryBackend) {
    let backend = InMemoryBackend::new();
    let log = Log::with_backend(Box::new(backend.clone()), test_config())
        .expect("Failed to open in-memory log");
    (log, backend)
}

/// Waits until `log` has committed at least `count` records.
///
/// Returns false if `timeout` passes first.
pub fn wait_for_committed(log: &Log, count: u64, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while log.committed() < count {
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(1));
    }
    true
}
