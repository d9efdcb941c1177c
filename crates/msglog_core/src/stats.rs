//! Log statistics.
//!
//! Counters are updated by the writer thread and can be read from any thread
//! while the log is running.
//!
//! # Usage
//!
//! ```rust,ignore
//! let log = Log::open("events.log")?;
//! log.push(Msg::new(1, 7), b"hello".to_vec());
//!
//! let stats = log.stats();
//! println!("Appended: {}", stats.appended);
//! println!("Dropped: {}", stats.dropped);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Writer-side counters.
///
/// All counters are monotonically increasing.
#[derive(Debug, Default)]
pub struct LogStats {
    appended: AtomicU64,
    dropped: AtomicU64,
    flushes: AtomicU64,
    flush_errors: AtomicU64,
    bytes_written: AtomicU64,
}

impl LogStats {
    /// Creates a new stats instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a record accepted into the write buffer.
    pub(crate) fn record_append(&self, bytes: u64) {
        self.appended.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Records a push that was dropped.
    pub(crate) fn record_drop(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a successful flush.
    pub(crate) fn record_flush(&self) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a failed flush.
    pub(crate) fn record_flush_error(&self) {
        self.flush_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of records accepted by the writer.
    pub fn appended(&self) -> u64 {
        self.appended.load(Ordering::Relaxed)
    }

    /// Returns the number of pushes dropped for a short payload or a closed log.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Returns the number of successful flushes.
    pub fn flushes(&self) -> u64 {
        self.flushes.load(Ordering::Relaxed)
    }

    /// Returns the number of failed flushes.
    ///
    /// A growing value with a flat `flushes` means durability is lagging.
    pub fn flush_errors(&self) -> u64 {
        self.flush_errors.load(Ordering::Relaxed)
    }

    /// Returns the total encoded bytes handed to storage.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Relaxed)
    }

    /// Returns a snapshot of all stats.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            appended: self.appended(),
            dropped: self.dropped(),
            flushes: self.flushes(),
            flush_errors: self.flush_errors(),
            bytes_written: self.bytes_written(),
        }
    }
}

/// A point-in-time snapshot of log statistics.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Records accepted by the writer.
    pub appended: u64,
    /// Pushes dropped.
    pub dropped: u64,
    /// Successful flushes.
    pub flushes: u64,
    /// Failed flushes.
    pub flush_errors: u64,
    /// Encoded bytes handed to storage.
    pub bytes_written: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_stats_are_zero() {
        let stats = LogStats::new();
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
    }

    #[test]
    fn record_operations() {
        let stats = LogStats::new();

        stats.record_append(10);
        stats.record_append(15);
        stats.record_drop();
        stats.record_flush();
        stats.record_flush_error();

        let snap = stats.snapshot();
        assert_eq!(snap.appended, 2);
        assert_eq!(snap.bytes_written, 25);
        assert_eq!(snap.dropped, 1);
        assert_eq!(snap.flushes, 1);
        assert_eq!(snap.flush_errors, 1);
    }
}
