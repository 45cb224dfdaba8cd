//! Database folder management and file locking.
//!
//! A database lives in an existing folder next to a `NAME_LOCK.bdb` file.
//! While a [`DatabaseDir`] is alive it holds an exclusive advisory lock on
//! that file, so a second open of the same database fails fast with
//! `DatabaseLocked` instead of interleaving appends.

use crate::error::{CoreError, CoreResult};
use crate::files::FileNames;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

/// Owns the file names of one database and, optionally, its lock.
#[derive(Debug)]
pub(crate) struct DatabaseDir {
    folder: PathBuf,
    names: FileNames,
    lock_file: Option<File>,
}

impl DatabaseDir {
    /// Opens the database `name` inside `folder`.
    ///
    /// The folder must already exist. When `lock` is set the lock file is
    /// created if needed and locked without blocking.
    ///
    /// # Errors
    ///
    /// - `DirectoryNotFound` if `folder` is not a directory
    /// - `DatabaseLocked` if another handle holds the lock
    pub fn open(name: &str, folder: &Path, lock: bool) -> CoreResult<Self> {
        if !folder.is_dir() {
            return Err(CoreError::DirectoryNotFound {
                path: folder.to_path_buf(),
            });
        }

        let names = FileNames::new(name, folder);
        let lock_file = if lock {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(&names.lock)?;
            if file.try_lock_exclusive().is_err() {
                return Err(CoreError::DatabaseLocked);
            }
            Some(file)
        } else {
            None
        };

        Ok(Self {
            folder: folder.to_path_buf(),
            names,
            lock_file,
        })
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn names(&self) -> &FileNames {
        &self.names
    }

    /// Releases the lock early. Dropping the handle has the same effect.
    pub fn unlock(&mut self) {
        if let Some(file) = self.lock_file.take() {
            if let Err(error) = FileExt::unlock(&file) {
                tracing::warn!(%error, path = %self.names.lock.display(), "failed to release lock");
            }
        }
    }
}

/// Removes every file of the database `name` in `folder`.
///
/// Missing files are ignored.
pub(crate) fn delete_files(name: &str, folder: &Path) -> CoreResult<()> {
    let names = FileNames::new(name, folder);
    for path in names.data_files().into_iter().chain([names.lock.as_path()]) {
        match fs::remove_file(path) {
            Ok(()) => tracing::debug!(path = %path.display(), "removed database file"),
            Err(error) if error.kind() == io::ErrorKind::NotFound => {}
            Err(error) => return Err(error.into()),
        }
    }
    Ok(())
}
