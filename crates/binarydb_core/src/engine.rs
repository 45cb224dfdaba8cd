//! Shared engine state and the write-ahead and read paths.
//!
//! The engine is shared between caller threads and the compaction worker.
//! Every durability-affecting step runs inside a [`JobQueue`] job; the
//! in-memory tables are only touched in short critical sections.

use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::files::{
    Backends, DataFile, FilePos, FileSizes, IdFile, IndexFile, Ledger, WaFile, INDEX_START,
};
use crate::ids::IdTable;
use crate::queue::{JobQueue, LEDGER_STAGE, WAL_STAGE};
use crate::record::{collect_reachable_ids, merge, FieldState, Record, RecordId, RecordState};
use crate::stats::{DatabaseStats, Gauges};
use crate::wa_queue::{WaEntry, WaQueue};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

pub(crate) struct Engine {
    pub(crate) config: Config,
    pub(crate) ids: IdTable,
    pub(crate) positions: RwLock<HashMap<i64, FilePos>>,
    pub(crate) wa_queue: WaQueue,
    pub(crate) queue: JobQueue,
    pub(crate) ledger: Ledger,
    pub(crate) id_file: IdFile,
    pub(crate) index_file: IndexFile,
    pub(crate) data_file: DataFile,
    pub(crate) wa_file: WaFile,
    pub(crate) stats: DatabaseStats,
    /// Set after a failed compaction; no further batches touch the data file.
    pub(crate) poisoned: AtomicBool,
}

impl Engine {
    /// Loads the engine from its five files.
    ///
    /// Returns the engine together with the write-ahead entries that were
    /// published but not yet compacted.
    pub fn load(config: Config, backends: Backends) -> CoreResult<(Self, Vec<Arc<WaEntry>>)> {
        let fresh = backends.id.size()? == 0
            && backends.index.size()? <= INDEX_START
            && backends.data.size()? == 0
            && backends.wa.size()? == 0;

        let ledger = Ledger::open(backends.fs, fresh)?;
        let sizes = ledger.current();

        let (id_file, entries) = IdFile::open(backends.id, sizes.id_length)?;
        let (index_file, positions) = IndexFile::open(backends.index, sizes.index_length)?;
        let data_file = DataFile::open(backends.data, sizes.data_length)?;
        let wa_file = WaFile::open(backends.wa, sizes.wa_end)?;

        if let Some((id, pos)) = positions
            .iter()
            .find(|(_, pos)| pos.position + u64::from(pos.length) > sizes.data_length)
        {
            return Err(CoreError::corruption(format!(
                "index places rec:{id} at {}..{} past data length {}",
                pos.position,
                pos.position + u64::from(pos.length),
                sizes.data_length
            )));
        }

        let wa_queue = WaQueue::new();
        let recovered = wa_queue.push(wa_file.load(sizes.wa_start, sizes.wa_end)?);
        let ids = IdTable::from_entries(entries);

        tracing::info!(
            known_ids = ids.len(),
            indexed_records = positions.len(),
            recovered = recovered.len(),
            "database loaded"
        );

        let engine = Self {
            config,
            ids,
            positions: RwLock::new(positions),
            wa_queue,
            queue: JobQueue::new(),
            ledger,
            id_file,
            index_file,
            data_file,
            wa_file,
            stats: DatabaseStats::new(),
            poisoned: AtomicBool::new(false),
        };
        Ok((engine, recovered))
    }

    /// Turns a record graph into independently persistable records.
    ///
    /// Walks the graph breadth first. Every record gets a resolved id and
    /// every nested record is replaced by a reference to that id, turning
    /// attachment fields into reference fields. Records in `Reference`
    /// state are resolved but not returned.
    pub fn flatten(&self, record: Record) -> CoreResult<Vec<Record>> {
        let mut flattened = Vec::new();
        let mut queue = VecDeque::from([record]);

        while let Some(mut current) = queue.pop_front() {
            current.id = self.ids.resolve_or_mint(&current.id)?;
            for field in &mut current.fields {
                if let Some(child) = field.record.take() {
                    let child = *child;
                    let child_id = self.ids.resolve_or_mint(&child.id)?;
                    field.record = Some(Box::new(Record::reference(child_id)));
                    if field.state == FieldState::Attachment {
                        field.state = FieldState::Reference;
                    }
                    queue.push_back(child);
                }
            }
            if current.state != RecordState::Reference {
                flattened.push(current);
            }
        }

        Ok(flattened)
    }

    /// Runs the write-ahead stage for already flattened records.
    ///
    /// Appends pending ids and the records, publishes the ledger, queues
    /// the entries and hands them to `submit` while still inside the stage,
    /// so compaction sees batches in write order.
    ///
    /// On failure the id and write-ahead files are cut back to whatever the
    /// ledger currently covers. If the ledger already switched to the new
    /// sizes before the failure, the entries are queued as if the stage had
    /// succeeded and the error is still returned.
    pub fn write_ahead(
        &self,
        records: &[Record],
        submit: impl FnOnce(Vec<Arc<WaEntry>>),
    ) -> CoreResult<()> {
        self.queue.run(&[WAL_STAGE], || {
            let pending = self.ids.take_pending();
            let before = self.ledger.current();

            let appended = self.append_write_ahead(&pending, records, before);
            let (bounds, id_length) = match appended {
                Ok(appended) => appended,
                Err(error) => return Err(self.roll_back_write_ahead(pending, error)),
            };
            let wa_end = bounds.last().map_or(before.wa_end, |b| b.1);

            let published = self.queue.run(&[LEDGER_STAGE], || {
                self.ledger.publish(self.config.sync_on_write, |sizes| {
                    sizes.wa_end = wa_end;
                    sizes.id_length = id_length;
                })
            });
            if let Err(error) = published {
                let current = self.ledger.current();
                if current.wa_end != wa_end || current.id_length != id_length {
                    return Err(self.roll_back_write_ahead(pending, error));
                }
                tracing::warn!(%error, "ledger switched slots but did not persist");
                self.queue_write_ahead(records, bounds, pending.len(), before, submit);
                return Err(CoreError::write_failed(error));
            }

            self.queue_write_ahead(records, bounds, pending.len(), before, submit);
            Ok(())
        })
    }

    /// Appends and persists pending ids and records. Returns the record
    /// bounds and the new id file length.
    fn append_write_ahead(
        &self,
        pending: &[RecordId],
        records: &[Record],
        before: FileSizes,
    ) -> CoreResult<(Vec<(u64, u64)>, u64)> {
        let sync = self.config.sync_on_write;
        self.id_file.reset_to(before.id_length)?;
        self.wa_file.reset_to(before.wa_end)?;

        let id_length = if pending.is_empty() {
            before.id_length
        } else {
            self.id_file.append(pending)?
        };
        let bounds = self.wa_file.append(records)?;

        self.id_file.persist(sync)?;
        self.wa_file.persist(sync)?;
        Ok((bounds, id_length))
    }

    fn queue_write_ahead(
        &self,
        records: &[Record],
        bounds: Vec<(u64, u64)>,
        new_ids: usize,
        before: FileSizes,
        submit: impl FnOnce(Vec<Arc<WaEntry>>),
    ) {
        let written = bounds.last().map_or(0, |b| b.1 - before.wa_end);
        let entries = self.wa_queue.push(
            bounds
                .into_iter()
                .zip(records.iter().cloned())
                .map(|((start, end), record)| (start, end, record))
                .collect(),
        );
        tracing::debug!(
            records = records.len(),
            new_ids,
            bytes = written,
            "write-ahead stage complete"
        );
        self.stats.record_write(written);
        submit(entries);
    }

    /// Cuts the id and write-ahead files back to the published lengths and
    /// returns the pending ids to the table.
    fn roll_back_write_ahead(&self, pending: Vec<RecordId>, error: CoreError) -> CoreError {
        tracing::warn!(%error, "write-ahead stage failed, rolling back");
        let published = self.ledger.current();
        if let Err(rollback) = self
            .wa_file
            .reset_to(published.wa_end)
            .and_then(|()| self.id_file.reset_to(published.id_length))
        {
            tracing::error!(error = %rollback, "write-ahead rollback failed");
        }
        self.ids.restore_pending(pending);
        CoreError::write_failed(error)
    }

    /// Reads the compacted copy of a record, ignoring the write-ahead log.
    ///
    /// Callers must hold the queue lock for `id`.
    pub fn read_committed(&self, id: i64) -> CoreResult<Option<(FilePos, Record)>> {
        let Some(pos) = self.positions.read().get(&id).copied() else {
            return Ok(None);
        };
        Ok(Some((pos, self.data_file.read(pos)?)))
    }

    /// Reads a record, folding in write-ahead entries that are not yet
    /// compacted. Tombstones read as `None`.
    ///
    /// The committed copy and the write-ahead snapshot are both taken under
    /// the lock for `id`, so a compaction of `id` is either fully visible or
    /// not at all.
    pub fn read(&self, id: i64) -> CoreResult<Option<Record>> {
        if self.ids.get(id).is_none() {
            return Ok(None);
        }

        self.queue.run(&[id], || {
            let snapshot = self.wa_queue.snapshot();
            let committed = self.read_committed(id)?;
            let bytes = committed.as_ref().map_or(0, |(pos, _)| u64::from(pos.length));

            let record = match committed {
                Some((_, mut record)) => {
                    if !snapshot.is_empty() {
                        let reachable: HashSet<i64> =
                            collect_reachable_ids(&record).into_iter().collect();
                        for entry in snapshot
                            .iter()
                            .filter(|e| reachable.contains(&e.record.id.id))
                        {
                            record.apply(&entry.record);
                        }
                    }
                    Some(record)
                }
                None => snapshot
                    .iter()
                    .filter(|e| e.record.id.id == id)
                    .fold(None, |acc: Option<Record>, entry| {
                        Some(match acc {
                            Some(base) => merge(&base, &entry.record),
                            None => entry.record.clone(),
                        })
                    }),
            };

            self.stats.record_read(bytes);
            Ok(record.filter(|r| !r.is_deleted()))
        })
    }

    pub fn gauges(&self) -> Gauges {
        Gauges {
            known_ids: self.ids.len() as u64,
            indexed_records: self.positions.read().len() as u64,
            pending_wal_records: self.wa_queue.len() as u64,
        }
    }

    /// Syncs every file to durable storage.
    pub fn sync_all(&self) -> CoreResult<()> {
        self.id_file.persist(true)?;
        self.wa_file.persist(true)?;
        self.data_file.persist(true)?;
        self.index_file.persist(true)?;
        self.ledger.sync()
    }
}
