//! Position index file.

use super::id_file::to_usize;
use super::{FilePos, LogFile};
use crate::error::{CoreError, CoreResult};
use binarydb_codec::{Decoder, Encoder};
use binarydb_storage::StorageBackend;
use std::collections::HashMap;
use std::ops::Deref;

/// Offset of the first entry; byte 0 is reserved.
pub(crate) const INDEX_START: u64 = 1;
/// Size of one `(id, position, length)` entry.
pub(crate) const INDEX_ENTRY_SIZE: u64 = 20;

/// Append-only `(id, position, length)` entries locating records in the
/// data file. Later entries supersede earlier ones for the same id.
pub(crate) struct IndexFile(LogFile);

impl IndexFile {
    /// Opens the file and rebuilds the position table from the first
    /// `length` bytes after the header.
    pub fn open(
        mut backend: Box<dyn StorageBackend>,
        length: u64,
    ) -> CoreResult<(Self, HashMap<i64, FilePos>)> {
        if backend.size()? == 0 {
            backend.append(&[0])?;
        }
        let file = LogFile::open("index", backend, INDEX_START + length)?;
        let bytes = file.read(INDEX_START, to_usize(length)?)?;

        let mut decoder = Decoder::new(&bytes);
        let mut positions = HashMap::new();
        while decoder.remaining() as u64 >= INDEX_ENTRY_SIZE {
            let id = decoder.read_i64()?;
            let position = decoder.read_i64()?;
            let len = decoder.read_i32()?;
            let (Ok(position), Ok(length)) = (u64::try_from(position), u32::try_from(len)) else {
                return Err(CoreError::corruption(format!(
                    "index entry for rec:{id} has position {position} and length {len}"
                )));
            };
            positions.insert(id, FilePos { position, length });
        }

        Ok((Self(file), positions))
    }

    /// Appends entries and returns the new index length (excluding the
    /// header byte).
    pub fn append(&self, entries: &[(i64, FilePos)]) -> CoreResult<u64> {
        let mut encoder = Encoder::with_capacity(entries.len() * INDEX_ENTRY_SIZE as usize);
        for (id, pos) in entries {
            encoder.write_i64(*id);
            encoder.write_i64(pos.position as i64);
            encoder.write_i32(pos.length as i32);
        }
        let offset = self.0.append(encoder.as_bytes())?;
        Ok(offset + encoder.len() as u64 - INDEX_START)
    }
}

impl Deref for IndexFile {
    type Target = LogFile;

    fn deref(&self) -> &LogFile {
        &self.0
    }
}
