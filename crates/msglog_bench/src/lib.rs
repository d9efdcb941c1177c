//! Benchmark utilities.

#![warn(missing_docs)]

use msglog_core::{Log, LogConfig, Msg};
use std::path::Path;

/// Deterministic payload of `size` bytes.
#[must_use]
pub fn payload(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 251) as u8).collect()
}

/// Writes `count` records of `size` bytes to a fresh log at `path` and closes it.
///
/// # Panics
///
/// Panics if the log cannot be created or closed.
pub fn filled_log(path: &Path, count: u64, size: usize) -> Log {
    let log = Log::open_with_config(path, LogConfig::new().sync_on_flush(false))
        .expect("create bench log");
    let data = payload(size);
    for id in 0..count {
        log.push(Msg::new(1, id), data.clone());
    }
    log.close().expect("close bench log");
    log
}
