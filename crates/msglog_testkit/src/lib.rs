//! # MsgLog Testkit
//!
//! Test utilities for MsgLog.
//!
//! This crate provides:
//! - Temporary log fixtures that clean up after themselves
//! - Crash simulation: torn tails and a backend with injectable faults
//! - A concurrent producer/consumer stress runner
//! - Property-based test generators using proptest
//! - Golden varint and header vectors
//!
//! ## Usage
//!
//! ```rust,ignore
//! use msglog_testkit::prelude::*;
//!
//! #[test]
//! fn survives_torn_tail() {
//!     let log = TempLog::new();
//!     log.push(Msg::new(1, 1), &b"kept"[..]);
//!     append_garbage(log.path(), &[0xFE, 0x01]).unwrap();
//!     let log = log.reopen().unwrap();
//!     assert_eq!(log.committed(), 1);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod crash;
pub mod fixtures;
pub mod generators;
pub mod stress;
pub mod vectors;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::crash::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
    pub use crate::vectors::*;
    pub use msglog_core::{Log, LogConfig, Msg};
}

pub use crash::*;
pub use fixtures::*;
pub use generators::*;
pub use stress::*;
pub use vectors::*;
