//! Error types for BinaryDB core.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in BinaryDB core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] binarydb_storage::StorageError),

    /// Binary codec error.
    #[error("codec error: {0}")]
    Codec(#[from] binarydb_codec::CodecError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The database was disposed.
    #[error("database is closed")]
    DatabaseClosed,

    /// The folder passed to open does not exist.
    #[error("database directory does not exist: {}", path.display())]
    DirectoryNotFound {
        /// The missing directory.
        path: PathBuf,
    },

    /// Another handle holds the database lock file.
    #[error("database locked: another handle has exclusive access")]
    DatabaseLocked,

    /// The record graph passed to a write is not persistable.
    #[error("invalid record: {message}")]
    InvalidRecord {
        /// Description of the problem.
        message: String,
    },

    /// The write-ahead stage failed. Nothing from the write is visible unless
    /// the ledger had already switched to cover it before the failure.
    #[error("write failed: {source}")]
    WriteFailed {
        /// The underlying failure.
        source: Box<CoreError>,
    },

    /// Moving a batch from the write-ahead log into the data file failed.
    #[error("compaction failed: {source}")]
    CompactionFailed {
        /// The underlying failure.
        source: Box<CoreError>,
    },

    /// An internal ordering invariant does not hold.
    #[error("invariant violation: {message}")]
    InvariantViolation {
        /// Description of the violated invariant.
        message: String,
    },

    /// Invalid database format.
    #[error("invalid database format: {message}")]
    InvalidFormat {
        /// Description of the format issue.
        message: String,
    },

    /// A file disagrees with the size ledger or holds undecodable bytes.
    #[error("corruption: {message}")]
    Corruption {
        /// Description of the corruption.
        message: String,
    },
}

impl CoreError {
    /// Creates an invalid record error.
    pub fn invalid_record(message: impl Into<String>) -> Self {
        Self::InvalidRecord {
            message: message.into(),
        }
    }

    /// Wraps an error raised during the write-ahead stage.
    pub fn write_failed(source: CoreError) -> Self {
        Self::WriteFailed {
            source: Box::new(source),
        }
    }

    /// Wraps an error raised during compaction.
    pub fn compaction_failed(source: CoreError) -> Self {
        Self::CompactionFailed {
            source: Box::new(source),
        }
    }

    /// Creates an invariant violation error.
    pub fn invariant_violation(message: impl Into<String>) -> Self {
        Self::InvariantViolation {
            message: message.into(),
        }
    }

    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Creates a corruption error.
    pub fn corruption(message: impl Into<String>) -> Self {
        Self::Corruption {
            message: message.into(),
        }
    }
}
