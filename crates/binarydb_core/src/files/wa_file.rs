//! Write-ahead log file.

use super::id_file::to_usize;
use super::LogFile;
use crate::error::{CoreError, CoreResult};
use crate::record::Record;
use binarydb_codec::{Decode, Decoder, Encode, Encoder};
use binarydb_storage::StorageBackend;
use std::ops::Deref;

/// Append-only log of records written but not yet compacted.
///
/// Only the region between the ledger's `wa_start` and `wa_end` is live;
/// bytes before `wa_start` have already been compacted.
pub(crate) struct WaFile(LogFile);

impl WaFile {
    pub fn open(backend: Box<dyn StorageBackend>, end: u64) -> CoreResult<Self> {
        Ok(Self(LogFile::open("write-ahead", backend, end)?))
    }

    /// Reads every record in `start..end` with its byte range.
    pub fn load(&self, start: u64, end: u64) -> CoreResult<Vec<(u64, u64, Record)>> {
        let bytes = self.0.read(start, to_usize(end - start)?)?;
        let mut decoder = Decoder::new(&bytes);
        let mut records = Vec::new();
        while !decoder.is_empty() {
            let from = start + decoder.position() as u64;
            let record = Record::decode(&mut decoder).map_err(|e| {
                CoreError::corruption(format!("write-ahead record at offset {from}: {e}"))
            })?;
            records.push((from, start + decoder.position() as u64, record));
        }
        Ok(records)
    }

    /// Appends records and returns each one's byte range.
    pub fn append(&self, records: &[Record]) -> CoreResult<Vec<(u64, u64)>> {
        let mut encoder = Encoder::new();
        let mut bounds = Vec::with_capacity(records.len());
        for record in records {
            let before = encoder.len();
            record.encode(&mut encoder)?;
            bounds.push((before as u64, encoder.len() as u64));
        }
        let offset = self.0.append(encoder.as_bytes())?;
        Ok(bounds
            .into_iter()
            .map(|(from, to)| (offset + from, offset + to))
            .collect())
    }
}

impl Deref for WaFile {
    type Target = LogFile;

    fn deref(&self) -> &LogFile {
        &self.0
    }
}
