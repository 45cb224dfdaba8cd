//! Record identifier.

use binarydb_codec::{CodecResult, Decode, Decoder, Encode, Encoder};
use std::fmt;

/// Identity of a record.
///
/// A record is addressed either by its internal id (minted by the database,
/// positive, never reused) or by an external id scoped to an optional
/// record type. Once a record is written, both forms resolve to the same
/// internal id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct RecordId {
    /// Internal id. Zero or negative means "not assigned yet".
    pub id: i64,
    /// Optional record type scoping the external id.
    pub record_type: Option<i32>,
    /// Optional caller-supplied identifier.
    pub ext_id: Option<String>,
}

impl RecordId {
    /// Creates an id addressing a record by internal id.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self {
            id,
            record_type: None,
            ext_id: None,
        }
    }

    /// Creates an id addressing a record by external id and type.
    #[must_use]
    pub fn external(ext_id: impl Into<String>, record_type: Option<i32>) -> Self {
        Self {
            id: 0,
            record_type,
            ext_id: Some(ext_id.into()),
        }
    }

    /// Returns true if an internal id has been assigned.
    #[must_use]
    pub const fn is_assigned(&self) -> bool {
        self.id > 0
    }

    /// Returns the `(type, external id)` key, if an external id is set.
    #[must_use]
    pub fn type_ext_key(&self) -> Option<TypeExtKey> {
        self.ext_id.as_ref().map(|ext_id| TypeExtKey {
            record_type: self.record_type,
            ext_id: ext_id.clone(),
        })
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.ext_id, self.record_type) {
            _ if self.is_assigned() => write!(f, "rec:{}", self.id),
            (Some(ext), Some(t)) => write!(f, "rec:{t}/{ext}"),
            (Some(ext), None) => write!(f, "rec:/{ext}"),
            (None, _) => write!(f, "rec:?"),
        }
    }
}

impl Encode for RecordId {
    fn encode(&self, encoder: &mut Encoder) -> CodecResult<()> {
        encoder.write_i64(self.id);
        encoder.write_opt_i32(self.record_type);
        encoder.write_string(self.ext_id.as_deref())
    }
}

impl Decode for RecordId {
    fn decode(decoder: &mut Decoder<'_>) -> CodecResult<Self> {
        Ok(Self {
            id: decoder.read_i64()?,
            record_type: decoder.read_opt_i32()?,
            ext_id: decoder.read_string()?,
        })
    }
}

/// Composite lookup key for external ids.
///
/// The same external id may be used by records of different types.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeExtKey {
    /// Record type, if any.
    pub record_type: Option<i32>,
    /// External id.
    pub ext_id: String,
}

impl TypeExtKey {
    /// Creates a new key.
    #[must_use]
    pub fn new(record_type: Option<i32>, ext_id: impl Into<String>) -> Self {
        Self {
            record_type,
            ext_id: ext_id.into(),
        }
    }
}
