//! Queue of write-ahead records awaiting compaction.

use crate::error::{CoreError, CoreResult};
use crate::record::Record;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// A record appended to the write-ahead log but not yet compacted.
#[derive(Debug)]
pub(crate) struct WaEntry {
    /// Submission order; strictly increasing.
    pub seq: u64,
    /// Byte offset of the record in the write-ahead file.
    pub start: u64,
    /// Byte offset just past the record.
    pub end: u64,
    /// The record as written.
    pub record: Record,
}

/// Immutable view of the queue taken by readers.
pub(crate) type WaSnapshot = Arc<Vec<Arc<WaEntry>>>;

#[derive(Debug, Default)]
struct WaQueueInner {
    entries: VecDeque<Arc<WaEntry>>,
    snapshot: WaSnapshot,
    next_seq: u64,
}

impl WaQueueInner {
    fn publish(&mut self) {
        self.snapshot = Arc::new(self.entries.iter().cloned().collect());
    }
}

/// FIFO of pending write-ahead entries.
///
/// Every mutation publishes a fresh snapshot, so readers never hold the
/// lock while they work.
#[derive(Debug, Default)]
pub(crate) struct WaQueue {
    inner: Mutex<WaQueueInner>,
}

impl WaQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends records in submission order and returns the new entries.
    pub fn push(&self, records: Vec<(u64, u64, Record)>) -> Vec<Arc<WaEntry>> {
        let mut inner = self.inner.lock();
        let mut pushed = Vec::with_capacity(records.len());
        for (start, end, record) in records {
            let entry = Arc::new(WaEntry {
                seq: inner.next_seq,
                start,
                end,
                record,
            });
            inner.next_seq += 1;
            inner.entries.push_back(Arc::clone(&entry));
            pushed.push(entry);
        }
        inner.publish();
        pushed
    }

    /// Returns the current snapshot.
    pub fn snapshot(&self) -> WaSnapshot {
        Arc::clone(&self.inner.lock().snapshot)
    }

    /// Checks that `batch` sits at the head of the queue, in order.
    ///
    /// # Errors
    ///
    /// Returns `InvariantViolation` if it does not.
    pub fn check_head(&self, batch: &[Arc<WaEntry>]) -> CoreResult<()> {
        let inner = self.inner.lock();
        check_head(&inner.entries, batch)
    }

    /// Removes `batch` from the head of the queue.
    ///
    /// # Errors
    ///
    /// Returns `InvariantViolation`, leaving the queue unchanged, if the
    /// batch is not the head of the queue.
    pub fn pop_batch(&self, batch: &[Arc<WaEntry>]) -> CoreResult<()> {
        let mut inner = self.inner.lock();
        check_head(&inner.entries, batch)?;
        inner.entries.drain(..batch.len());
        inner.publish();
        Ok(())
    }

    /// Number of queued entries.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }
}

fn check_head(entries: &VecDeque<Arc<WaEntry>>, batch: &[Arc<WaEntry>]) -> CoreResult<()> {
    if batch.len() > entries.len() {
        return Err(CoreError::invariant_violation(format!(
            "batch of {} entries but only {} queued",
            batch.len(),
            entries.len()
        )));
    }
    for (queued, expected) in entries.iter().zip(batch) {
        if queued.seq != expected.seq {
            return Err(CoreError::invariant_violation(format!(
                "write-ahead head is seq {} but compacted batch expected seq {}",
                queued.seq, expected.seq
            )));
        }
    }
    Ok(())
}
