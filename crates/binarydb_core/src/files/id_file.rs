//! Id table file.

use super::LogFile;
use crate::error::{CoreError, CoreResult};
use crate::record::RecordId;
use binarydb_codec::{Decode, Decoder, Encode, Encoder};
use binarydb_storage::StorageBackend;
use std::ops::Deref;

/// Append-only list of `(internal id, type, external id)` entries.
pub(crate) struct IdFile(LogFile);

impl IdFile {
    /// Opens the file and returns every entry within `length`.
    pub fn open(backend: Box<dyn StorageBackend>, length: u64) -> CoreResult<(Self, Vec<RecordId>)> {
        let file = LogFile::open("id", backend, length)?;
        let bytes = file.read(0, to_usize(length)?)?;

        let mut decoder = Decoder::new(&bytes);
        let mut entries = Vec::new();
        while !decoder.is_empty() {
            let offset = decoder.position();
            let entry = RecordId::decode(&mut decoder).map_err(|e| {
                CoreError::corruption(format!("id entry at offset {offset}: {e}"))
            })?;
            entries.push(entry);
        }

        Ok((Self(file), entries))
    }

    /// Appends entries and returns the new file length.
    pub fn append(&self, ids: &[RecordId]) -> CoreResult<u64> {
        let mut encoder = Encoder::new();
        for id in ids {
            id.encode(&mut encoder)?;
        }
        let offset = self.0.append(encoder.as_bytes())?;
        Ok(offset + encoder.len() as u64)
    }
}

impl Deref for IdFile {
    type Target = LogFile;

    fn deref(&self) -> &LogFile {
        &self.0
    }
}

pub(super) fn to_usize(length: u64) -> CoreResult<usize> {
    usize::try_from(length)
        .map_err(|_| CoreError::corruption(format!("length {length} does not fit in memory")))
}
