//! Database facade.

use crate::compaction::Compactor;
use crate::config::Config;
use crate::dir::{self, DatabaseDir};
use crate::engine::Engine;
use crate::error::{CoreError, CoreResult};
use crate::files::Backends;
use crate::record::{Record, RecordId};
use crate::stats::StatsSnapshot;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// The main database handle.
///
/// A `Database` stores record graphs in five append-only files. Writes are
/// durable once they return: they sit in the write-ahead log and are moved
/// into the data file by a background worker. Reads see both.
///
/// # Opening a Database
///
/// ```rust,no_run
/// use binarydb_core::{Database, Field, Record, RecordId};
///
/// let db = Database::load_or_create("people", "/var/lib/people")?;
///
/// let written = db.write(Record::full(
///     RecordId::external("alice", Some(1)),
///     vec![Field::data(2, b"Alice".to_vec())],
/// ))?;
/// let alice = db.read(written[0].id.id)?;
/// assert!(alice.is_some());
///
/// db.close()?;
/// # Ok::<(), binarydb_core::CoreError>(())
/// ```
///
/// # In-Memory Databases
///
/// For testing, use `Database::open_in_memory()`:
///
/// ```rust
/// let db = binarydb_core::Database::open_in_memory().unwrap();
/// assert!(db.is_open());
/// ```
pub struct Database {
    engine: Arc<Engine>,
    compactor: Compactor,
    /// Folder and lock. None for databases over caller-supplied backends.
    dir: Mutex<Option<DatabaseDir>>,
    name: Option<String>,
    is_open: RwLock<bool>,
}

impl Database {
    /// Opens the database `name` in an existing `folder`, creating its
    /// files on first use. Uses the default configuration.
    ///
    /// # Errors
    ///
    /// See [`Database::open`].
    pub fn load_or_create(name: &str, folder: impl AsRef<Path>) -> CoreResult<Self> {
        Self::open(name, folder, Config::default())
    }

    /// Opens the database `name` in an existing `folder`.
    ///
    /// Loads the id table and index, trims every file to the length the
    /// size ledger publishes, and replays write-ahead entries that were not
    /// yet compacted.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `folder` does not exist (`DirectoryNotFound`)
    /// - another handle has the database open (`DatabaseLocked`)
    /// - the ledger is malformed (`InvalidFormat`)
    /// - a file is shorter than its published length (`Corruption`)
    pub fn open(name: &str, folder: impl AsRef<Path>, config: Config) -> CoreResult<Self> {
        let dir = DatabaseDir::open(name, folder.as_ref(), config.lock_database)?;
        let backends = Backends::open_files(dir.names())?;
        tracing::info!(name, folder = %dir.folder().display(), "opening database");
        Self::start(config, backends, Some(dir), Some(name.to_string()))
    }

    /// Opens a database over caller-supplied backends.
    ///
    /// No lock file is taken. Useful for tests that inspect or damage the
    /// raw bytes between opens.
    ///
    /// # Errors
    ///
    /// Returns an error if the backends do not hold a valid database.
    pub fn open_with_backends(config: Config, backends: Backends) -> CoreResult<Self> {
        Self::start(config, backends, None, None)
    }

    /// Opens an empty in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if the compaction worker cannot be spawned.
    pub fn open_in_memory() -> CoreResult<Self> {
        Self::open_with_backends(Config::default(), Backends::in_memory())
    }

    fn start(
        config: Config,
        backends: Backends,
        dir: Option<DatabaseDir>,
        name: Option<String>,
    ) -> CoreResult<Self> {
        let (engine, recovered) = Engine::load(config, backends)?;
        let engine = Arc::new(engine);
        let compactor = Compactor::spawn(Arc::clone(&engine))?;

        if !recovered.is_empty() {
            tracing::info!(
                entries = recovered.len(),
                "replaying write-ahead log into data file"
            );
            compactor.submit(recovered);
        }

        Ok(Self {
            engine,
            compactor,
            dir: Mutex::new(dir),
            name,
            is_open: RwLock::new(true),
        })
    }

    /// Writes a record graph.
    ///
    /// Owned attachments are split into independent records and replaced
    /// in their parent by a reference. Returns the flattened records with
    /// their resolved ids, parent first. The call returns once the records
    /// are in the write-ahead log.
    ///
    /// # Errors
    ///
    /// - `DatabaseClosed` after [`Database::dispose`]
    /// - `InvalidRecord` if a record has neither an id nor an external id,
    ///   or its external id is bound to a different id
    /// - `WriteFailed` if the write-ahead stage failed; nothing from this
    ///   call is durable
    pub fn write(&self, record: Record) -> CoreResult<Vec<Record>> {
        self.ensure_open()?;
        let records = self.engine.flatten(record)?;
        if records.is_empty() {
            return Ok(records);
        }
        self.engine
            .write_ahead(&records, |batch| self.compactor.submit(batch))?;
        Ok(records)
    }

    /// Reads a record by internal id.
    ///
    /// Returns `None` for unknown or deleted ids. Nested records come back
    /// as references; read them by their own id.
    pub fn read(&self, id: i64) -> CoreResult<Option<Record>> {
        self.ensure_open()?;
        if id <= 0 {
            return Ok(None);
        }
        self.engine.read(id)
    }

    /// Reads a record by external id and type.
    pub fn read_external(&self, ext_id: &str, record_type: Option<i32>) -> CoreResult<Option<Record>> {
        self.ensure_open()?;
        match self.engine.ids.lookup(record_type, ext_id) {
            Some(id) => self.engine.read(id),
            None => Ok(None),
        }
    }

    /// Returns the internal id bound to an external id, without reading the
    /// record.
    pub fn id_for(&self, record_type: Option<i32>, ext_id: &str) -> CoreResult<Option<i64>> {
        self.ensure_open()?;
        Ok(self.engine.ids.lookup(record_type, ext_id))
    }

    /// Deletes a record by writing a tombstone for it.
    ///
    /// Returns the tombstone, or nothing if the id is unknown. Attachments
    /// of the deleted record are left alone.
    pub fn delete(&self, id: i64) -> CoreResult<Vec<Record>> {
        self.ensure_open()?;
        match self.engine.ids.get(id) {
            Some(record_id) => self.delete_resolved(record_id),
            None => Ok(Vec::new()),
        }
    }

    /// Deletes a record by external id and type.
    pub fn delete_external(&self, ext_id: &str, record_type: Option<i32>) -> CoreResult<Vec<Record>> {
        self.ensure_open()?;
        match self.engine.ids.resolve(&RecordId::external(ext_id, record_type)) {
            Some(record_id) => self.delete_resolved(record_id),
            None => Ok(Vec::new()),
        }
    }

    fn delete_resolved(&self, id: RecordId) -> CoreResult<Vec<Record>> {
        let deleted = self.write(Record::deleted(id))?;
        self.engine.stats.record_delete();
        Ok(deleted)
    }

    /// Blocks until every write made so far has been compacted (or skipped
    /// after a compaction failure).
    pub fn flush(&self) -> CoreResult<()> {
        self.ensure_open()?;
        self.compactor.barrier()
    }

    /// Returns a snapshot of the counters and table sizes.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.engine.stats.snapshot(self.engine.gauges())
    }

    /// The name passed to [`Database::open`], if any.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Checks if the database is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        *self.is_open.read()
    }

    fn ensure_open(&self) -> CoreResult<()> {
        if *self.is_open.read() {
            Ok(())
        } else {
            Err(CoreError::DatabaseClosed)
        }
    }

    /// Closes the database.
    ///
    /// Waits for the compaction worker to finish queued batches, syncs
    /// every file and releases the lock. Calling it again is a no-op; every
    /// other operation fails with `DatabaseClosed` afterwards.
    pub fn dispose(&self) -> CoreResult<()> {
        let mut is_open = self.is_open.write();
        if !*is_open {
            return Ok(());
        }
        *is_open = false;

        self.compactor.shutdown();
        let synced = self.engine.sync_all();
        if let Some(mut dir) = self.dir.lock().take() {
            dir.unlock();
        }

        tracing::info!(name = self.name.as_deref().unwrap_or("<unnamed>"), "database closed");
        synced
    }

    /// Consumes the handle and closes the database.
    pub fn close(self) -> CoreResult<()> {
        self.dispose()
    }

    /// Deletes the files of database `name` in `folder`.
    ///
    /// The database must not be open. Missing files are ignored.
    pub fn delete_db(name: &str, folder: impl AsRef<Path>) -> CoreResult<()> {
        dir::delete_files(name, folder.as_ref())
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.name)
            .field("is_open", &self.is_open())
            .field("known_ids", &self.engine.ids.len())
            .finish_non_exhaustive()
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        if let Err(error) = self.dispose() {
            tracing::error!(%error, "failed to close database");
        }
    }
}
