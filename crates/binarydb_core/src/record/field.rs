//! Record fields.

use super::{Record, RecordId};
use binarydb_codec::{CodecError, CodecResult, Decode, Decoder, Encode, Encoder};

/// Lifecycle state of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldState {
    /// The field owns its payload and, if present, its nested record.
    Attachment,
    /// The field points at a record owned elsewhere.
    Reference,
    /// The field removes every field of its type when merged.
    Deleted,
}

impl FieldState {
    /// Returns the on-disk code.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Attachment => 0,
            Self::Reference => 1,
            Self::Deleted => 2,
        }
    }

    /// Parses an on-disk code.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown code.
    pub fn from_code(code: i32) -> CodecResult<Self> {
        match code {
            0 => Ok(Self::Attachment),
            1 => Ok(Self::Reference),
            2 => Ok(Self::Deleted),
            other => Err(CodecError::invalid_value(format!(
                "unknown field state {other}"
            ))),
        }
    }
}

/// A typed attribute of a record.
///
/// Several fields may share a type; they are replaced together when a
/// partial update carries that type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Field type.
    pub field_type: i32,
    /// Field state.
    pub state: FieldState,
    /// Raw payload.
    pub data: Option<Vec<u8>>,
    /// Nested record. Owned for attachments, an id-only reference otherwise.
    pub record: Option<Box<Record>>,
}

impl Field {
    /// Creates a plain data field.
    #[must_use]
    pub fn data(field_type: i32, data: impl Into<Vec<u8>>) -> Self {
        Self {
            field_type,
            state: FieldState::Attachment,
            data: Some(data.into()),
            record: None,
        }
    }

    /// Creates a field owning a nested record.
    ///
    /// On write the nested record is persisted on its own and this field is
    /// stored as a reference to it.
    #[must_use]
    pub fn attachment(field_type: i32, record: Record) -> Self {
        Self {
            field_type,
            state: FieldState::Attachment,
            data: None,
            record: Some(Box::new(record)),
        }
    }

    /// Creates a field pointing at an existing record.
    #[must_use]
    pub fn reference(field_type: i32, id: RecordId) -> Self {
        Self {
            field_type,
            state: FieldState::Reference,
            data: None,
            record: Some(Box::new(Record::reference(id))),
        }
    }

    /// Creates a field that deletes every field of `field_type` on merge.
    #[must_use]
    pub fn deleted(field_type: i32) -> Self {
        Self {
            field_type,
            state: FieldState::Deleted,
            data: None,
            record: None,
        }
    }

    /// Internal id of the nested record, if any.
    #[must_use]
    pub fn nested_id(&self) -> Option<i64> {
        self.record.as_ref().map(|r| r.id.id)
    }
}

impl Encode for Field {
    fn encode(&self, encoder: &mut Encoder) -> CodecResult<()> {
        encoder.write_i32(self.field_type);
        encoder.write_i32(self.state.code());
        encoder.write_blob(self.data.as_deref())?;
        match &self.record {
            None => encoder.write_bool(false),
            Some(record) => {
                if !record.id.is_assigned() {
                    return Err(CodecError::encoding_failed(format!(
                        "nested record {} has no internal id",
                        record.id
                    )));
                }
                encoder.write_bool(true);
                encoder.write_i64(record.id.id);
            }
        }
        Ok(())
    }
}

impl Decode for Field {
    fn decode(decoder: &mut Decoder<'_>) -> CodecResult<Self> {
        let field_type = decoder.read_i32()?;
        let state = FieldState::from_code(decoder.read_i32()?)?;
        let data = decoder.read_blob()?;
        let record = if decoder.read_bool()? {
            Some(Box::new(Record::reference(RecordId::new(decoder.read_i64()?))))
        } else {
            None
        };
        Ok(Self {
            field_type,
            state,
            data,
            record,
        })
    }
}
