//! # MsgLog Core
//!
//! An embedded, append-only message log.
//!
//! This crate provides:
//! - [`Log`]: a single-writer log fed by any number of producer threads
//! - [`Consumer`]: tailing readers with lazy payloads and seq-based seeking
//! - crash recovery that truncates a torn tail
//!
//! ## Example
//!
//! ```no_run
//! use msglog_core::{Log, Msg};
//!
//! let log = Log::recover("events.log")?;
//! log.push(Msg::new(1, 7), &b"hello"[..]);
//!
//! let mut consumer = log.consumer()?;
//! while let Some(msg) = consumer.try_next()? {
//!     println!("{msg}: {:?}", consumer.payload()?);
//! }
//! log.close()?;
//! # Ok::<(), msglog_core::CoreError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
pub mod log;
mod stats;

pub use config::LogConfig;
pub use error::{CoreError, CoreResult};
pub use log::{CancelHandle, Consumer, Log, Msg, RecoveryReport, ScanStop};
pub use stats::{LogStats, StatsSnapshot};

/// Crate version, as recorded in `Cargo.toml`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
