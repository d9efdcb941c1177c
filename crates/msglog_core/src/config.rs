//! Log configuration.

use msglog_storage::FileOptions;
use std::time::Duration;

/// Configuration for opening a log.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Period of the writer's flush tick.
    ///
    /// Bounds how long an accepted record can stay undurable.
    pub flush_interval: Duration,

    /// How often a blocked consumer re-checks the committed counter.
    pub poll_interval: Duration,

    /// Capacity of the writer's buffered writer (file logs only).
    pub write_buffer_size: usize,

    /// Whether each flush also syncs file data to the device.
    pub sync_on_flush: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            flush_interval: Duration::from_millis(1),
            poll_interval: Duration::from_millis(1),
            write_buffer_size: 64 * 1024, // 64 KB
            sync_on_flush: true,
        }
    }
}

impl LogConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the writer flush period.
    #[must_use]
    pub const fn flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    /// Sets the consumer polling period.
    #[must_use]
    pub const fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the write buffer capacity.
    #[must_use]
    pub const fn write_buffer_size(mut self, size: usize) -> Self {
        self.write_buffer_size = size;
        self
    }

    /// Sets whether flushes sync to the device.
    #[must_use]
    pub const fn sync_on_flush(mut self, value: bool) -> Self {
        self.sync_on_flush = value;
        self
    }

    pub(crate) fn file_options(&self) -> FileOptions {
        FileOptions {
            buffer_capacity: self.write_buffer_size,
            sync_on_flush: self.sync_on_flush,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = LogConfig::default();
        assert_eq!(config.flush_interval, Duration::from_millis(1));
        assert_eq!(config.poll_interval, Duration::from_millis(1));
        assert!(config.sync_on_flush);
    }

    #[test]
    fn builder_pattern() {
        let config = LogConfig::new()
            .flush_interval(Duration::from_millis(5))
            .sync_on_flush(false)
            .write_buffer_size(1024);

        assert_eq!(config.flush_interval, Duration::from_millis(5));
        assert!(!config.sync_on_flush);

        let options = config.file_options();
        assert_eq!(options.buffer_capacity, 1024);
        assert!(!options.sync_on_flush);
    }
}
