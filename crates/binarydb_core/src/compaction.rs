//! Background compaction of the write-ahead log into the data file.
//!
//! A single worker thread consumes batches in the order the write-ahead
//! stage produced them. For each batch it merges the records onto their
//! compacted state, appends the results to the data file and index,
//! publishes the ledger and finally drops the batch from the head of the
//! write-ahead queue.
//!
//! Failures are never returned to a caller. They go to the configured
//! error hook, and the worker stops touching the data file for the rest of
//! the session; the affected records stay in the write-ahead log and are
//! replayed on the next open.

use crate::engine::Engine;
use crate::error::{CoreError, CoreResult};
use crate::files::FilePos;
use crate::queue::{COMPACTION_STAGE, LEDGER_STAGE};
use crate::record::{merge, Record};
use crate::wa_queue::WaEntry;
use parking_lot::Mutex;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Work item for the compaction worker.
pub(crate) enum CompactionJob {
    /// Entries appended by one write-ahead stage.
    Batch(Vec<Arc<WaEntry>>),
    /// Acknowledged once every earlier job has been processed.
    Barrier(Sender<()>),
}

/// Handle to the compaction worker thread.
pub(crate) struct Compactor {
    sender: Mutex<Option<Sender<CompactionJob>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Compactor {
    /// Spawns the worker.
    pub fn spawn(engine: Arc<Engine>) -> CoreResult<Self> {
        let (sender, receiver) = mpsc::channel();
        let handle = thread::Builder::new()
            .name("binarydb-compactor".into())
            .spawn(move || run(&engine, &receiver))?;

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Queues a batch. Batches sent after shutdown are dropped; their
    /// records remain in the write-ahead log.
    pub fn submit(&self, batch: Vec<Arc<WaEntry>>) {
        if batch.is_empty() {
            return;
        }
        let sent = self
            .sender
            .lock()
            .as_ref()
            .is_some_and(|sender| sender.send(CompactionJob::Batch(batch)).is_ok());
        if !sent {
            tracing::debug!("compactor stopped, batch left in write-ahead log");
        }
    }

    /// Blocks until every batch submitted so far has been processed.
    pub fn barrier(&self) -> CoreResult<()> {
        let (done, wait) = mpsc::channel();
        {
            let sender = self.sender.lock();
            let sender = sender.as_ref().ok_or(CoreError::DatabaseClosed)?;
            sender
                .send(CompactionJob::Barrier(done))
                .map_err(|_| CoreError::DatabaseClosed)?;
        }
        wait.recv().map_err(|_| CoreError::DatabaseClosed)
    }

    /// Stops accepting work, drains the queue and joins the worker.
    pub fn shutdown(&self) {
        drop(self.sender.lock().take());
        if let Some(handle) = self.handle.lock().take() {
            if handle.join().is_err() {
                tracing::error!("compaction worker panicked");
            }
        }
    }
}

fn run(engine: &Engine, jobs: &Receiver<CompactionJob>) {
    tracing::debug!("compaction worker started");
    while let Ok(job) = jobs.recv() {
        match job {
            CompactionJob::Batch(batch) => engine.compact_batch(&batch),
            CompactionJob::Barrier(done) => {
                let _ = done.send(());
            }
        }
    }
    tracing::debug!("compaction worker stopped");
}

impl Engine {
    /// Compacts one batch, reporting any failure to the error hook.
    pub(crate) fn compact_batch(&self, batch: &[Arc<WaEntry>]) {
        if batch.is_empty() {
            return;
        }
        if self.poisoned.load(Ordering::Acquire) {
            tracing::debug!(
                entries = batch.len(),
                "compaction halted after earlier failure, batch left in write-ahead log"
            );
            return;
        }

        let mut ids: Vec<i64> = batch.iter().map(|entry| entry.record.id.id).collect();
        ids.push(COMPACTION_STAGE);

        match self.queue.run(&ids, || self.compact(batch)) {
            Ok(bytes) => self.stats.record_compaction(bytes),
            Err(error) => {
                self.poisoned.store(true, Ordering::Release);
                let error = match error {
                    violation @ CoreError::InvariantViolation { .. } => violation,
                    other => CoreError::compaction_failed(other),
                };
                tracing::error!(
                    %error,
                    entries = batch.len(),
                    "compaction failed, records stay in the write-ahead log"
                );
                self.stats.record_compaction_failure();
                self.config.report_background_error(&error);
            }
        }
    }

    /// Moves `batch` into the data file. Returns the bytes appended.
    ///
    /// Must run with the compaction stage and every id in the batch locked.
    fn compact(&self, batch: &[Arc<WaEntry>]) -> CoreResult<u64> {
        self.wa_queue.check_head(batch)?;
        let sync = self.config.sync_on_write;

        // Several records for one id merge in a chain.
        let mut latest: HashMap<i64, Option<Record>> = HashMap::new();
        let mut merged = Vec::with_capacity(batch.len());
        for entry in batch {
            let incoming = &entry.record;
            let base = match latest.entry(incoming.id.id) {
                Entry::Occupied(slot) => slot.into_mut(),
                Entry::Vacant(slot) => {
                    slot.insert(self.read_committed(incoming.id.id)?.map(|(_, r)| r))
                }
            };
            let next = match base.as_ref() {
                Some(base) => merge(base, incoming),
                None => incoming.clone(),
            };
            *base = Some(next.clone());
            merged.push(next);
        }

        let data_before = self.ledger.current().data_length;
        let positions = self.data_file.append(&merged)?;
        let entries: Vec<(i64, FilePos)> = merged
            .iter()
            .map(|record| record.id.id)
            .zip(positions)
            .collect();
        let index_length = self.index_file.append(&entries)?;
        let data_length = self.data_file.size()?;
        self.data_file.persist(sync)?;
        self.index_file.persist(sync)?;

        let wa_from = batch.first().map_or(0, |entry| entry.start);
        let wa_start = batch.last().map_or(0, |entry| entry.end);
        let published = self.queue.run(&[LEDGER_STAGE], || {
            self.ledger.publish(sync, |sizes| {
                sizes.wa_start = wa_start;
                sizes.index_length = index_length;
                sizes.data_length = data_length;
            })
        });
        if let Err(error) = published {
            // A switched but unpersisted ledger already names the new data.
            if self.ledger.current().wa_start == wa_start {
                self.install_compacted(&entries, batch)?;
            }
            return Err(error);
        }
        self.install_compacted(&entries, batch)?;

        let bytes = data_length - data_before;
        tracing::debug!(
            records = merged.len(),
            bytes,
            wa_from,
            wa_start,
            "compacted batch"
        );
        Ok(bytes)
    }

    /// Points reads at the compacted copies and drops `batch` from the queue.
    fn install_compacted(
        &self,
        entries: &[(i64, FilePos)],
        batch: &[Arc<WaEntry>],
    ) -> CoreResult<()> {
        {
            let mut table = self.positions.write();
            for (id, pos) in entries {
                table.insert(*id, *pos);
            }
        }
        self.wa_queue.pop_batch(batch)
    }
}
