//! On-disk file layout.
//!
//! A database named `NAME` in a folder consists of five files:
//!
//! ```text
//! <folder>/
//! ├─ NAME_ID.bdb      # id table: (internal id, type, external id) entries
//! ├─ NAME_INDEX.bdb   # header byte, then (id, position, length) entries
//! ├─ NAME_DATA.bdb    # compacted records, located through the index
//! ├─ NAME_WA.bdb      # write-ahead log of records not yet compacted
//! ├─ NAME_FS.bdb      # size ledger: valid length of every other file
//! └─ NAME_LOCK.bdb    # advisory lock held while the database is open
//! ```
//!
//! Every file except the ledger is append-only and valid only up to the
//! length the ledger publishes. Bytes past that length are discarded when
//! the database is opened.

mod data_file;
mod id_file;
mod index_file;
mod ledger;
mod wa_file;

pub(crate) use data_file::DataFile;
pub(crate) use id_file::IdFile;
pub(crate) use index_file::{IndexFile, INDEX_START};
pub(crate) use ledger::{FileSizes, Ledger};
pub(crate) use wa_file::WaFile;

use crate::error::{CoreError, CoreResult};
use binarydb_storage::{FileBackend, InMemoryBackend, StorageBackend};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};

const SUFFIX: &str = "bdb";

/// Paths of the files making up one database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FileNames {
    pub id: PathBuf,
    pub index: PathBuf,
    pub data: PathBuf,
    pub wa: PathBuf,
    pub fs: PathBuf,
    pub lock: PathBuf,
}

impl FileNames {
    /// Builds the paths for `name` (upper-cased) inside `folder`.
    pub fn new(name: &str, folder: &Path) -> Self {
        let name = name.to_uppercase();
        let path = |kind: &str| folder.join(format!("{name}_{kind}.{SUFFIX}"));
        Self {
            id: path("ID"),
            index: path("INDEX"),
            data: path("DATA"),
            wa: path("WA"),
            fs: path("FS"),
            lock: path("LOCK"),
        }
    }

    /// The five data files, in a fixed order.
    pub fn data_files(&self) -> [&Path; 5] {
        [&self.id, &self.index, &self.data, &self.wa, &self.fs]
    }
}

/// Backends for the five database files.
pub struct Backends {
    /// Id table.
    pub id: Box<dyn StorageBackend>,
    /// Position index.
    pub index: Box<dyn StorageBackend>,
    /// Data log.
    pub data: Box<dyn StorageBackend>,
    /// Write-ahead log.
    pub wa: Box<dyn StorageBackend>,
    /// Size ledger.
    pub fs: Box<dyn StorageBackend>,
}

impl Backends {
    /// Fresh in-memory backends.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            id: Box::new(InMemoryBackend::new()),
            index: Box::new(InMemoryBackend::new()),
            data: Box::new(InMemoryBackend::new()),
            wa: Box::new(InMemoryBackend::new()),
            fs: Box::new(InMemoryBackend::new()),
        }
    }

    /// File backends at the given paths, created if missing.
    pub(crate) fn open_files(names: &FileNames) -> CoreResult<Self> {
        Ok(Self {
            id: Box::new(FileBackend::open(&names.id)?),
            index: Box::new(FileBackend::open(&names.index)?),
            data: Box::new(FileBackend::open(&names.data)?),
            wa: Box::new(FileBackend::open(&names.wa)?),
            fs: Box::new(FileBackend::open(&names.fs)?),
        })
    }
}

/// Byte range of a record in the data file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FilePos {
    pub position: u64,
    pub length: u32,
}

/// An append-only file whose valid length is owned by the ledger.
pub(crate) struct LogFile {
    name: &'static str,
    backend: Mutex<Box<dyn StorageBackend>>,
}

impl LogFile {
    /// Wraps `backend` and discards anything past `valid_len`.
    ///
    /// # Errors
    ///
    /// Returns `Corruption` if the file is shorter than `valid_len`.
    pub fn open(name: &'static str, backend: Box<dyn StorageBackend>, valid_len: u64) -> CoreResult<Self> {
        let file = Self {
            name,
            backend: Mutex::new(backend),
        };
        file.reset_to(valid_len)?;
        Ok(file)
    }

    /// Truncates the file to `len`, the length the ledger vouches for.
    ///
    /// # Errors
    ///
    /// Returns `Corruption` if the file is shorter than `len`.
    pub fn reset_to(&self, len: u64) -> CoreResult<()> {
        let mut backend = self.backend.lock();
        let size = backend.size()?;
        if size < len {
            return Err(CoreError::corruption(format!(
                "{} file is {size} bytes but the ledger publishes {len}",
                self.name
            )));
        }
        if size > len {
            tracing::warn!(file = self.name, size, len, "discarding unpublished tail");
            backend.truncate(len)?;
        }
        Ok(())
    }

    pub fn read(&self, offset: u64, len: usize) -> CoreResult<Vec<u8>> {
        Ok(self.backend.lock().read_at(offset, len)?)
    }

    /// Appends `data` and returns the offset it was written at.
    pub fn append(&self, data: &[u8]) -> CoreResult<u64> {
        Ok(self.backend.lock().append(data)?)
    }

    pub fn size(&self) -> CoreResult<u64> {
        Ok(self.backend.lock().size()?)
    }

    /// Syncs to durable storage, or only flushes when `sync` is false.
    pub fn persist(&self, sync: bool) -> CoreResult<()> {
        let mut backend = self.backend.lock();
        if sync {
            backend.sync()?;
        } else {
            backend.flush()?;
        }
        Ok(())
    }
}
