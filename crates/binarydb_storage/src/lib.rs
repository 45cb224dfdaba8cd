//! # BinaryDB Storage
//!
//! Storage backend trait and implementations for BinaryDB.
//!
//! Backends are **opaque byte stores**. They know nothing about the id
//! table, the position index, the data log, the write-ahead log or the
//! size ledger; `binarydb_core` owns every file format.
//!
//! ## Design Principles
//!
//! - Backends are simple random-access byte stores (read, append, overwrite, flush)
//! - Must be `Send + Sync` so a database can be shared across threads
//! - A backend's physical size may run ahead of the logical length the
//!   database trusts; trimming the tail is the caller's decision
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For testing and ephemeral databases
//! - [`FileBackend`] - For persistent storage using OS file APIs
//!
//! ## Example
//!
//! ```rust
//! use binarydb_storage::{StorageBackend, InMemoryBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"hello world").unwrap();
//! let data = backend.read_at(offset, 11).unwrap();
//! assert_eq!(&data, b"hello world");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
