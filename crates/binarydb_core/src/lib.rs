//! # BinaryDB Core
//!
//! Core engine for BinaryDB, an embedded record database.
//!
//! This crate provides:
//! - Record graphs with typed fields and owned attachments
//! - Per-field-type partial updates merged onto stored state
//! - A write-ahead log compacted into the data file in the background
//! - A crash-atomic size ledger deciding which bytes of every file count
//! - Per-record serialization of reads, writes and compaction
//!
//! ```rust
//! use binarydb_core::{Database, Field, Record, RecordId};
//!
//! let db = Database::open_in_memory().unwrap();
//! db.write(Record::full(
//!     RecordId::external("r1", Some(1)),
//!     vec![Field::data(2, vec![1, 2])],
//! ))
//! .unwrap();
//! db.write(Record::partial(
//!     RecordId::external("r1", Some(1)),
//!     vec![Field::data(3, vec![2, 3])],
//! ))
//! .unwrap();
//!
//! let record = db.read_external("r1", Some(1)).unwrap().unwrap();
//! assert_eq!(record.fields.len(), 2);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod compaction;
mod config;
mod database;
mod dir;
mod engine;
mod error;
mod files;
mod ids;
mod queue;
pub mod record;
mod stats;
mod wa_queue;

pub use config::{Config, ErrorHook};
pub use database::Database;
pub use error::{CoreError, CoreResult};
pub use files::Backends;
pub use record::{
    collect_reachable_ids, merge, merge_fields, Field, FieldState, Record, RecordId, RecordState,
    TypeExtKey,
};
pub use stats::{DatabaseStats, StatsSnapshot};
