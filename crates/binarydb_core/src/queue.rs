//! Per-id serialization queue.
//!
//! Every durability-affecting operation runs as a job that declares the ids
//! it touches. Jobs sharing an id are mutually exclusive; jobs over disjoint
//! id sets run concurrently. Negative ids name pipeline stages so that each
//! stage is serialized with itself without blocking record-level jobs.
//!
//! Locks are created lazily, never removed, and always acquired in
//! ascending id order, so two jobs with overlapping id sets cannot deadlock.
//! Stage ids sort below every record id; a running job may only nest a
//! [`LEDGER_STAGE`] job, and ledger jobs never nest anything.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Appending to the id table and write-ahead log.
pub(crate) const WAL_STAGE: i64 = -1;
/// Moving write-ahead records into the data file.
pub(crate) const COMPACTION_STAGE: i64 = -2;
/// Publishing the size ledger.
pub(crate) const LEDGER_STAGE: i64 = -3;

#[derive(Debug, Default)]
pub(crate) struct JobQueue {
    locks: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `job` while holding the lock of every id in `ids`.
    ///
    /// Locks are released when the job returns, fails or panics.
    pub fn run<T>(&self, ids: &[i64], job: impl FnOnce() -> T) -> T {
        let mut ids = ids.to_vec();
        ids.sort_unstable();
        ids.dedup();

        let locks: Vec<Arc<Mutex<()>>> = {
            let mut map = self.locks.lock();
            ids.iter()
                .map(|id| Arc::clone(map.entry(*id).or_default()))
                .collect()
        };
        let _guards: Vec<_> = locks.iter().map(|lock| lock.lock()).collect();

        job()
    }
}
