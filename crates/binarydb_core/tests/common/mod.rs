//! Shared helpers for integration tests.

#![allow(dead_code)]

use binarydb_core::{Backends, Field, Record, RecordId};
use binarydb_storage::{InMemoryBackend, StorageBackend, StorageError, StorageResult};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Installs a test-friendly subscriber once per test binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A full record keyed by external id and type with one data field per
/// `(type, bytes)` pair.
pub fn full(ext_id: &str, record_type: i32, fields: &[(i32, &[u8])]) -> Record {
    Record::full(
        RecordId::external(ext_id, Some(record_type)),
        fields.iter().map(|(t, d)| Field::data(*t, d.to_vec())).collect(),
    )
}

/// Like [`full`] but a partial update.
pub fn partial(ext_id: &str, record_type: i32, fields: &[(i32, &[u8])]) -> Record {
    Record::partial(
        RecordId::external(ext_id, Some(record_type)),
        fields.iter().map(|(t, d)| Field::data(*t, d.to_vec())).collect(),
    )
}

/// Payload of the first field of `field_type`.
pub fn data(record: &Record, field_type: i32) -> Option<Vec<u8>> {
    record.field(field_type).and_then(|f| f.data.clone())
}

/// In-memory backends whose buffers stay reachable after the database
/// that used them is gone.
#[derive(Clone, Default)]
pub struct SharedFiles {
    pub id: InMemoryBackend,
    pub index: InMemoryBackend,
    pub data: InMemoryBackend,
    pub wa: InMemoryBackend,
    pub fs: InMemoryBackend,
}

impl SharedFiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn backends(&self) -> Backends {
        Backends {
            id: Box::new(self.id.clone()),
            index: Box::new(self.index.clone()),
            data: Box::new(self.data.clone()),
            wa: Box::new(self.wa.clone()),
            fs: Box::new(self.fs.clone()),
        }
    }

    /// Backends whose data file rejects appends while `fail` is set.
    pub fn backends_with_failing_data(&self, fail: Arc<AtomicBool>) -> Backends {
        let mut backends = self.backends();
        backends.data = Box::new(FailingBackend {
            inner: self.data.clone(),
            fail,
        });
        backends
    }

    /// Backends whose ledger fails to persist the `countdown`-th header
    /// switch from now on. The header byte itself is written.
    pub fn backends_with_failing_ledger(&self, countdown: Arc<AtomicUsize>) -> Backends {
        let mut backends = self.backends();
        backends.fs = Box::new(LedgerFault {
            inner: self.fs.clone(),
            countdown,
            header_dirty: false,
        });
        backends
    }
}

/// Wraps a backend and fails appends on demand.
pub struct FailingBackend {
    inner: InMemoryBackend,
    fail: Arc<AtomicBool>,
}

impl StorageBackend for FailingBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        self.inner.read_at(offset, len)
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(StorageError::Io(io::Error::new(
                io::ErrorKind::Other,
                "injected append failure",
            )));
        }
        self.inner.append(data)
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> StorageResult<()> {
        self.inner.write_at(offset, data)
    }

    fn flush(&mut self) -> StorageResult<()> {
        self.inner.flush()
    }

    fn size(&self) -> StorageResult<u64> {
        self.inner.size()
    }

    fn sync(&mut self) -> StorageResult<()> {
        self.inner.sync()
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        self.inner.truncate(new_size)
    }
}

/// Wraps a ledger backend and fails one persist that follows a header write.
pub struct LedgerFault {
    inner: InMemoryBackend,
    countdown: Arc<AtomicUsize>,
    header_dirty: bool,
}

impl LedgerFault {
    fn persist(&mut self) -> StorageResult<()> {
        if !std::mem::take(&mut self.header_dirty) {
            return Ok(());
        }
        let fired = self
            .countdown
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            == Ok(1);
        if fired {
            return Err(StorageError::Io(io::Error::new(
                io::ErrorKind::Other,
                "injected ledger sync failure",
            )));
        }
        Ok(())
    }
}

impl StorageBackend for LedgerFault {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        self.inner.read_at(offset, len)
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        self.inner.append(data)
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> StorageResult<()> {
        self.header_dirty |= offset == 0;
        self.inner.write_at(offset, data)
    }

    fn flush(&mut self) -> StorageResult<()> {
        self.persist()
    }

    fn size(&self) -> StorageResult<u64> {
        self.inner.size()
    }

    fn sync(&mut self) -> StorageResult<()> {
        self.persist()
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        self.inner.truncate(new_size)
    }
}
