//! Size ledger.
//!
//! The ledger records the valid length of every other file. It is a fixed
//! 81-byte file: one header byte naming the active slot, followed by two
//! 40-byte slots.
//!
//! ```text
//! offset 0   header: 1 or 41, the offset of the active slot
//! offset 1   slot A: wa_start, wa_end, id_length, index_length, data_length (i64 LE)
//! offset 41  slot B: same layout
//! ```
//!
//! An update writes the inactive slot in full, syncs, then flips the header
//! byte and syncs again. A crash at any point leaves either the old or the
//! new slot active, never a half-written one.
//!
//! Only header values 1 and 41 are accepted. Ledgers written with a 21-byte
//! slot offset are rejected as [`CoreError::InvalidFormat`] and cannot be
//! opened by this crate.

use crate::error::{CoreError, CoreResult};
use binarydb_codec::{Decoder, Encoder};
use binarydb_storage::StorageBackend;
use parking_lot::Mutex;

/// Total size of the ledger file.
pub(crate) const LEDGER_SIZE: u64 = 81;

const SLOT_A: u8 = 1;
const SLOT_B: u8 = 41;
const SLOT_SIZE: usize = 40;

/// Valid lengths of the other files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct FileSizes {
    /// Start of the uncompacted region of the write-ahead log.
    pub wa_start: u64,
    /// End of the write-ahead log.
    pub wa_end: u64,
    /// Length of the id table.
    pub id_length: u64,
    /// Length of the index, excluding its header byte.
    pub index_length: u64,
    /// Length of the data log.
    pub data_length: u64,
}

impl FileSizes {
    fn encode(&self) -> Vec<u8> {
        let mut encoder = Encoder::with_capacity(SLOT_SIZE);
        for value in self.values() {
            encoder.write_i64(value as i64);
        }
        encoder.into_bytes()
    }

    fn decode(bytes: &[u8]) -> CoreResult<Self> {
        let mut decoder = Decoder::new(bytes);
        let mut values = [0u64; 5];
        for value in &mut values {
            let raw = decoder.read_i64()?;
            *value = u64::try_from(raw).map_err(|_| {
                CoreError::invalid_format(format!("negative length {raw} in size ledger"))
            })?;
        }
        let [wa_start, wa_end, id_length, index_length, data_length] = values;
        if wa_start > wa_end {
            return Err(CoreError::invalid_format(format!(
                "write-ahead start {wa_start} is past its end {wa_end}"
            )));
        }
        Ok(Self {
            wa_start,
            wa_end,
            id_length,
            index_length,
            data_length,
        })
    }

    fn values(&self) -> [u64; 5] {
        [
            self.wa_start,
            self.wa_end,
            self.id_length,
            self.index_length,
            self.data_length,
        ]
    }
}

struct LedgerState {
    active: u8,
    sizes: FileSizes,
}

/// Crash-atomic record of file lengths.
pub(crate) struct Ledger {
    backend: Mutex<Box<dyn StorageBackend>>,
    state: Mutex<LedgerState>,
}

impl Ledger {
    /// Opens the ledger, initializing it when `fresh` is true and the file
    /// is shorter than a full ledger.
    ///
    /// `fresh` must only be true when no other file holds data; a partly
    /// written ledger next to existing data cannot be trusted.
    ///
    /// # Errors
    ///
    /// Returns `InvalidFormat` if the file has the wrong length or an
    /// unexpected header byte.
    pub fn open(mut backend: Box<dyn StorageBackend>, fresh: bool) -> CoreResult<Self> {
        let size = backend.size()?;
        if size < LEDGER_SIZE && fresh {
            tracing::debug!(size, "initializing size ledger");
            backend.truncate(0)?;
            let mut image = vec![0u8; LEDGER_SIZE as usize];
            image[0] = SLOT_A;
            backend.append(&image)?;
            backend.sync()?;
        }

        let size = backend.size()?;
        if size != LEDGER_SIZE {
            return Err(CoreError::invalid_format(format!(
                "size ledger is {size} bytes, expected {LEDGER_SIZE}"
            )));
        }

        let active = backend.read_at(0, 1)?[0];
        if active != SLOT_A && active != SLOT_B {
            return Err(CoreError::invalid_format(format!(
                "size ledger header byte is {active}, expected {SLOT_A} or {SLOT_B}"
            )));
        }
        let sizes = FileSizes::decode(&backend.read_at(u64::from(active), SLOT_SIZE)?)?;

        Ok(Self {
            backend: Mutex::new(backend),
            state: Mutex::new(LedgerState { active, sizes }),
        })
    }

    /// The last published sizes.
    pub fn current(&self) -> FileSizes {
        self.state.lock().sizes
    }

    /// Applies `update` to the current sizes and publishes the result.
    ///
    /// In-memory state follows the header byte: it switches as soon as the
    /// header is written, even if persisting it afterwards fails. Callers
    /// compare [`Ledger::current`] with the sizes they asked for to tell the
    /// two failure cases apart. With `sync` false the writes are flushed but
    /// not synced.
    pub fn publish(&self, sync: bool, update: impl FnOnce(&mut FileSizes)) -> CoreResult<FileSizes> {
        let mut state = self.state.lock();
        let mut next = state.sizes;
        update(&mut next);

        let target = if state.active == SLOT_A { SLOT_B } else { SLOT_A };
        let mut backend = self.backend.lock();
        backend.write_at(u64::from(target), &next.encode())?;
        persist(&mut **backend, sync)?;
        backend.write_at(0, &[target])?;
        state.active = target;
        state.sizes = next;
        persist(&mut **backend, sync)?;

        tracing::debug!(
            slot = target,
            wa_start = next.wa_start,
            wa_end = next.wa_end,
            id_length = next.id_length,
            index_length = next.index_length,
            data_length = next.data_length,
            "published size ledger"
        );
        Ok(next)
    }

    /// Syncs the ledger file to durable storage.
    pub fn sync(&self) -> CoreResult<()> {
        Ok(self.backend.lock().sync()?)
    }
}

fn persist(backend: &mut dyn StorageBackend, sync: bool) -> CoreResult<()> {
    if sync {
        backend.sync()?;
    } else {
        backend.flush()?;
    }
    Ok(())
}
