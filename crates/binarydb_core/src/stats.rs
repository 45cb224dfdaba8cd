//! Database statistics.
//!
//! Counters are updated by the write, read and compaction paths; gauges are
//! sampled from the live in-memory tables when a snapshot is taken.
//!
//! # Usage
//!
//! ```rust
//! use binarydb_core::Database;
//!
//! let db = Database::open_in_memory().unwrap();
//! let stats = db.stats();
//! assert_eq!(stats.writes, 0);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Database statistics counters.
///
/// All counters are atomic and can be read while operations are in progress.
#[derive(Debug, Default)]
pub struct DatabaseStats {
    reads: AtomicU64,
    writes: AtomicU64,
    deletes: AtomicU64,
    compactions: AtomicU64,
    compaction_failures: AtomicU64,
    bytes_written: AtomicU64,
    bytes_read: AtomicU64,
}

impl DatabaseStats {
    /// Creates a new stats instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a read operation.
    pub(crate) fn record_read(&self, bytes: u64) {
        self.reads.fetch_add(1, Ordering::Relaxed);
        self.bytes_read.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Records a write call and the bytes it appended to the log.
    pub(crate) fn record_write(&self, bytes: u64) {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Records a delete operation.
    pub(crate) fn record_delete(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a compacted batch and the bytes it appended to the data file.
    pub(crate) fn record_compaction(&self, bytes: u64) {
        self.compactions.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Records a failed compaction.
    pub(crate) fn record_compaction_failure(&self) {
        self.compaction_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the total number of read operations.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Returns the total number of write operations.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Returns the total number of delete operations.
    pub fn deletes(&self) -> u64 {
        self.deletes.load(Ordering::Relaxed)
    }

    /// Returns the number of batches compacted into the data file.
    pub fn compactions(&self) -> u64 {
        self.compactions.load(Ordering::Relaxed)
    }

    /// Returns the number of failed compactions.
    pub fn compaction_failures(&self) -> u64 {
        self.compaction_failures.load(Ordering::Relaxed)
    }

    /// Returns the total bytes written.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Relaxed)
    }

    /// Returns the total bytes read.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read.load(Ordering::Relaxed)
    }

    /// Returns a snapshot of the counters together with the given gauges.
    pub(crate) fn snapshot(&self, gauges: Gauges) -> StatsSnapshot {
        StatsSnapshot {
            reads: self.reads(),
            writes: self.writes(),
            deletes: self.deletes(),
            compactions: self.compactions(),
            compaction_failures: self.compaction_failures(),
            bytes_written: self.bytes_written(),
            bytes_read: self.bytes_read(),
            known_ids: gauges.known_ids,
            indexed_records: gauges.indexed_records,
            pending_wal_records: gauges.pending_wal_records,
        }
    }
}

/// Point-in-time sizes of the in-memory tables.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Gauges {
    pub known_ids: u64,
    pub indexed_records: u64,
    pub pending_wal_records: u64,
}

/// A point-in-time snapshot of database statistics.
///
/// Unlike `DatabaseStats`, this is a plain struct that can be compared or
/// passed across threads without atomics.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Total number of read operations.
    pub reads: u64,
    /// Total number of write operations.
    pub writes: u64,
    /// Total number of delete operations.
    pub deletes: u64,
    /// Batches moved from the write-ahead log into the data file.
    pub compactions: u64,
    /// Compactions that failed.
    pub compaction_failures: u64,
    /// Total bytes appended to the write-ahead log and data file.
    pub bytes_written: u64,
    /// Total bytes read from the data file.
    pub bytes_read: u64,
    /// Internal ids known to the id table.
    pub known_ids: u64,
    /// Records with a position in the data file.
    pub indexed_records: u64,
    /// Records in the write-ahead log awaiting compaction.
    pub pending_wal_records: u64,
}
