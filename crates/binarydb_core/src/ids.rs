//! In-memory id table.
//!
//! Maps internal ids to their full [`RecordId`] and `(type, external id)`
//! keys to internal ids. Ids minted or adopted since the last write-ahead
//! stage are kept as pending until that stage appends them to the id file.

use crate::error::{CoreError, CoreResult};
use crate::record::{RecordId, TypeExtKey};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug)]
struct IdTableInner {
    by_id: HashMap<i64, RecordId>,
    by_ext: HashMap<TypeExtKey, i64>,
    pending: BTreeMap<i64, RecordId>,
    next_id: i64,
}

/// Thread-safe id table guarded by one short-lived lock.
#[derive(Debug)]
pub(crate) struct IdTable {
    inner: Mutex<IdTableInner>,
}

impl IdTable {
    /// Builds the table from id file entries. Later entries win.
    pub fn from_entries(entries: impl IntoIterator<Item = RecordId>) -> Self {
        let mut by_id = HashMap::new();
        let mut by_ext = HashMap::new();
        let mut next_id = 1;

        for entry in entries {
            if let Some(key) = entry.type_ext_key() {
                by_ext.insert(key, entry.id);
            }
            next_id = next_id.max(entry.id + 1);
            by_id.insert(entry.id, entry);
        }

        Self {
            inner: Mutex::new(IdTableInner {
                by_id,
                by_ext,
                pending: BTreeMap::new(),
                next_id,
            }),
        }
    }

    /// Returns the stored id for an internal id.
    pub fn get(&self, id: i64) -> Option<RecordId> {
        self.inner.lock().by_id.get(&id).cloned()
    }

    /// Returns the internal id bound to an external id.
    pub fn lookup(&self, record_type: Option<i32>, ext_id: &str) -> Option<i64> {
        self.inner
            .lock()
            .by_ext
            .get(&TypeExtKey::new(record_type, ext_id))
            .copied()
    }

    /// Resolves an id without minting: by internal id when assigned,
    /// otherwise by external id.
    pub fn resolve(&self, id: &RecordId) -> Option<RecordId> {
        let inner = self.inner.lock();
        if id.is_assigned() {
            return inner.by_id.get(&id.id).cloned();
        }
        let key = id.type_ext_key()?;
        let internal = inner.by_ext.get(&key)?;
        inner.by_id.get(internal).cloned()
    }

    /// Resolves an id, minting or adopting one if it is unknown.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRecord` if the id has neither an internal nor an
    /// external id, or if its external id is bound to a different
    /// internal id.
    pub fn resolve_or_mint(&self, id: &RecordId) -> CoreResult<RecordId> {
        let mut inner = self.inner.lock();
        let key = id.type_ext_key();
        let bound = key.as_ref().and_then(|k| inner.by_ext.get(k).copied());

        if id.is_assigned() {
            if let Some(other) = bound.filter(|other| *other != id.id) {
                return Err(CoreError::invalid_record(format!(
                    "{} is bound to rec:{other}, not rec:{}",
                    key.map(|k| k.ext_id).unwrap_or_default(),
                    id.id
                )));
            }
            if let Some(known) = inner.by_id.get(&id.id) {
                return Ok(known.clone());
            }
            let adopted = id.clone();
            inner.next_id = inner.next_id.max(adopted.id + 1);
            inner.insert(adopted.clone());
            return Ok(adopted);
        }

        let Some(key) = key else {
            return Err(CoreError::invalid_record(
                "record has neither an internal nor an external id",
            ));
        };

        if let Some(internal) = bound {
            if let Some(known) = inner.by_id.get(&internal) {
                return Ok(known.clone());
            }
        }

        let minted = RecordId {
            id: inner.next_id,
            record_type: key.record_type,
            ext_id: Some(key.ext_id),
        };
        inner.next_id += 1;
        inner.insert(minted.clone());
        Ok(minted)
    }

    /// Removes and returns every pending id, in id order.
    pub fn take_pending(&self) -> Vec<RecordId> {
        let mut inner = self.inner.lock();
        std::mem::take(&mut inner.pending).into_values().collect()
    }

    /// Puts ids back into the pending set after a failed append.
    pub fn restore_pending(&self, ids: Vec<RecordId>) {
        let mut inner = self.inner.lock();
        for id in ids {
            inner.pending.insert(id.id, id);
        }
    }

    /// Number of known internal ids.
    pub fn len(&self) -> usize {
        self.inner.lock().by_id.len()
    }
}

impl IdTableInner {
    fn insert(&mut self, id: RecordId) {
        if let Some(key) = id.type_ext_key() {
            self.by_ext.insert(key, id.id);
        }
        self.pending.insert(id.id, id.clone());
        self.by_id.insert(id.id, id);
    }
}
