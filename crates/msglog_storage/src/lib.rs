//! # MsgLog Storage
//!
//! Storage backends for the MsgLog append-only log.
//!
//! Backends are **opaque byte stores**: they buffer appends, push them to
//! durable storage on `flush`, and hand out independent read cursors. They
//! know nothing about records, sequence numbers or varints.
//!
//! ## Design Principles
//!
//! - Exactly one owner appends; any number of readers read
//! - Readers never share a cursor with each other or with the writer
//! - A failed `flush` keeps the buffered bytes for the next attempt
//!
//! ## Available Backends
//!
//! - [`FileBackend`] - Persistent storage using OS file APIs
//! - [`InMemoryBackend`] - For testing; readers only see flushed bytes
//!
//! ## Example
//!
//! ```rust
//! use msglog_storage::{InMemoryBackend, StorageBackend};
//! use std::io::Read;
//!
//! let mut backend = InMemoryBackend::new();
//! backend.append(b"hello").unwrap();
//! backend.flush().unwrap();
//!
//! let mut reader = backend.open_reader().unwrap();
//! let mut buf = String::new();
//! reader.read_to_string(&mut buf).unwrap();
//! assert_eq!(buf, "hello");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::{LogReader, ReaderSource, StorageBackend};
pub use error::{StorageError, StorageResult};
pub use file::{FileBackend, FileOptions};
pub use memory::InMemoryBackend;
