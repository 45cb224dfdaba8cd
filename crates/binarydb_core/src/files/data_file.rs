//! Data log file.

use super::{FilePos, LogFile};
use crate::error::{CoreError, CoreResult};
use crate::record::Record;
use binarydb_codec::{Decode, Encode, Encoder};
use binarydb_storage::StorageBackend;
use std::ops::Deref;

/// Append-only log of compacted records. Never rewritten in place; stale
/// copies stay behind when a record is compacted again.
pub(crate) struct DataFile(LogFile);

impl DataFile {
    pub fn open(backend: Box<dyn StorageBackend>, length: u64) -> CoreResult<Self> {
        Ok(Self(LogFile::open("data", backend, length)?))
    }

    /// Reads the record stored at `pos`.
    pub fn read(&self, pos: FilePos) -> CoreResult<Record> {
        let bytes = self.0.read(pos.position, pos.length as usize)?;
        Record::from_bytes(&bytes).map_err(|e| {
            CoreError::corruption(format!("data record at offset {}: {e}", pos.position))
        })
    }

    /// Appends records in order and returns where each one landed.
    pub fn append(&self, records: &[Record]) -> CoreResult<Vec<FilePos>> {
        let mut encoder = Encoder::new();
        let mut lengths = Vec::with_capacity(records.len());
        for record in records {
            let before = encoder.len();
            record.encode(&mut encoder)?;
            let length = u32::try_from(encoder.len() - before)
                .map_err(|_| CoreError::invalid_record(format!("{} is too large", record.id)))?;
            lengths.push(length);
        }

        let mut position = self.0.append(encoder.as_bytes())?;
        Ok(lengths
            .into_iter()
            .map(|length| {
                let pos = FilePos { position, length };
                position += u64::from(length);
                pos
            })
            .collect())
    }
}

impl Deref for DataFile {
    type Target = LogFile;

    fn deref(&self) -> &LogFile {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Field, RecordId};
    use binarydb_storage::InMemoryBackend;

    #[test]
    fn records_are_located_by_position() {
        let file = DataFile::open(Box::new(InMemoryBackend::new()), 0).unwrap();
        let a = Record::full(RecordId::new(1), vec![Field::data(1, [1u8])]);
        let b = Record::deleted(RecordId::new(2));

        let positions = file.append(&[a.clone(), b.clone()]).unwrap();

        assert_eq!(positions[0].position, 0);
        assert_eq!(positions[1].position, u64::from(positions[0].length));
        assert_eq!(file.read(positions[0]).unwrap(), a);
        assert_eq!(file.read(positions[1]).unwrap(), b);
    }

    #[test]
    fn appends_continue_after_existing_data() {
        let backend = InMemoryBackend::with_data(vec![0; 7]);
        let file = DataFile::open(Box::new(backend), 7).unwrap();
        let positions = file
            .append(&[Record::full(RecordId::new(1), vec![])])
            .unwrap();
        assert_eq!(positions[0].position, 7);
    }
}
