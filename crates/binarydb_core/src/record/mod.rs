//! Record model.
//!
//! A [`Record`] is an id, a lifecycle state and an ordered list of
//! [`Field`]s. Fields may own nested records; those are persisted as
//! separate top-level records when written.

mod field;
mod id;
mod merge;

pub use field::{Field, FieldState};
pub use id::{RecordId, TypeExtKey};
pub use merge::{collect_reachable_ids, merge, merge_fields};

use binarydb_codec::{CodecError, CodecResult, Decode, Decoder, Encode, Encoder};

/// Lifecycle state of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordState {
    /// Complete content; replaces whatever was stored.
    Full,
    /// Per-field-type update merged onto the stored content.
    Partial,
    /// Points at an existing record without changing it.
    Reference,
    /// Tombstone.
    Deleted,
}

impl RecordState {
    /// Returns the on-disk code.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Full => 0,
            Self::Partial => 1,
            Self::Reference => 2,
            Self::Deleted => 3,
        }
    }

    /// Parses an on-disk code.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown code.
    pub fn from_code(code: i32) -> CodecResult<Self> {
        match code {
            0 => Ok(Self::Full),
            1 => Ok(Self::Partial),
            2 => Ok(Self::Reference),
            3 => Ok(Self::Deleted),
            other => Err(CodecError::invalid_value(format!(
                "unknown record state {other}"
            ))),
        }
    }
}

/// A persisted entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Record identity.
    pub id: RecordId,
    /// Lifecycle state.
    pub state: RecordState,
    /// Ordered fields.
    pub fields: Vec<Field>,
}

impl Record {
    /// Creates a record with the given state and fields.
    #[must_use]
    pub fn new(id: RecordId, state: RecordState, fields: Vec<Field>) -> Self {
        Self { id, state, fields }
    }

    /// Creates a full record.
    #[must_use]
    pub fn full(id: RecordId, fields: Vec<Field>) -> Self {
        Self::new(id, RecordState::Full, fields)
    }

    /// Creates a partial update.
    #[must_use]
    pub fn partial(id: RecordId, fields: Vec<Field>) -> Self {
        Self::new(id, RecordState::Partial, fields)
    }

    /// Creates a field-less reference to an existing record.
    #[must_use]
    pub fn reference(id: RecordId) -> Self {
        Self::new(id, RecordState::Reference, Vec::new())
    }

    /// Creates a tombstone.
    #[must_use]
    pub fn deleted(id: RecordId) -> Self {
        Self::new(id, RecordState::Deleted, Vec::new())
    }

    /// Returns true for tombstones.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.state == RecordState::Deleted
    }

    /// Returns the first field of the given type.
    #[must_use]
    pub fn field(&self, field_type: i32) -> Option<&Field> {
        self.fields.iter().find(|f| f.field_type == field_type)
    }

    /// Returns every field of the given type, in order.
    pub fn fields_of_type(&self, field_type: i32) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(move |f| f.field_type == field_type)
    }

    /// Merges `incoming` onto every record in this graph with the same
    /// internal id.
    pub fn apply(&mut self, incoming: &Record) {
        if self.id.id == incoming.id.id {
            *self = merge(self, incoming);
        }
        for field in &mut self.fields {
            if let Some(nested) = field.record.as_deref_mut() {
                nested.apply(incoming);
            }
        }
    }
}

impl Encode for Record {
    fn encode(&self, encoder: &mut Encoder) -> CodecResult<()> {
        self.id.encode(encoder)?;
        encoder.write_i32(self.state.code());
        let count = i32::try_from(self.fields.len())
            .map_err(|_| CodecError::encoding_failed("too many fields"))?;
        encoder.write_i32(count);
        for field in &self.fields {
            field.encode(encoder)?;
        }
        Ok(())
    }
}

impl Decode for Record {
    fn decode(decoder: &mut Decoder<'_>) -> CodecResult<Self> {
        let id = RecordId::decode(decoder)?;
        let state = RecordState::from_code(decoder.read_i32()?)?;
        let count = decoder.read_i32()?;
        let count =
            usize::try_from(count).map_err(|_| CodecError::InvalidLength { length: count })?;
        // Each field takes at least 13 bytes, so a count beyond that is corrupt.
        if count > decoder.remaining() / 13 {
            return Err(CodecError::UnexpectedEof {
                needed: count * 13,
                remaining: decoder.remaining(),
            });
        }
        let mut fields = Vec::with_capacity(count);
        for _ in 0..count {
            fields.push(Field::decode(decoder)?);
        }
        Ok(Self { id, state, fields })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample() -> Record {
        Record::full(
            RecordId {
                id: 3,
                record_type: Some(1),
                ext_id: Some("r1".into()),
            },
            vec![
                Field::data(2, [1u8, 2]),
                Field::reference(5, RecordId::new(4)),
                Field::deleted(6),
            ],
        )
    }

    #[test]
    fn record_roundtrip() {
        let record = sample();
        let decoded = Record::from_bytes(&record.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn record_state_codes() {
        for state in [
            RecordState::Full,
            RecordState::Partial,
            RecordState::Reference,
            RecordState::Deleted,
        ] {
            assert_eq!(RecordState::from_code(state.code()).unwrap(), state);
        }
        assert!(RecordState::from_code(4).is_err());
    }

    #[test]
    fn truncated_record_fails() {
        let bytes = sample().to_bytes().unwrap();
        assert!(Record::from_bytes(&bytes[..bytes.len() - 1]).is_err());
    }

    #[test]
    fn huge_field_count_fails_fast() {
        let mut enc = Encoder::new();
        RecordId::new(1).encode(&mut enc).unwrap();
        enc.write_i32(0);
        enc.write_i32(i32::MAX);
        assert!(Record::from_bytes(enc.as_bytes()).is_err());
    }

    #[test]
    fn apply_reaches_matching_id_only() {
        let mut record = sample();
        record.apply(&Record::partial(
            RecordId::new(3),
            vec![Field::data(2, [9u8])],
        ));
        assert_eq!(record.field(2).unwrap().data.as_deref(), Some(&[9u8][..]));

        // References ignore merges, so the nested id-only record is untouched.
        record.apply(&Record::full(RecordId::new(4), vec![Field::data(1, [1u8])]));
        let nested = record.field(5).unwrap().record.as_deref().unwrap();
        assert_eq!(nested.state, RecordState::Reference);
        assert!(nested.fields.is_empty());
    }

    fn arb_field(depth: u32) -> BoxedStrategy<Field> {
        let data = (
            any::<i32>(),
            proptest::option::of(proptest::collection::vec(any::<u8>(), 0..8)),
        )
            .prop_map(|(t, data)| Field {
                field_type: t,
                state: FieldState::Attachment,
                data,
                record: None,
            });
        if depth == 0 {
            return data.boxed();
        }
        let nested = (any::<i32>(), arb_record(depth - 1))
            .prop_map(|(t, r)| Field::attachment(t, r));
        prop_oneof![data, nested, any::<i32>().prop_map(Field::deleted)].boxed()
    }

    fn arb_record(depth: u32) -> BoxedStrategy<Record> {
        (
            1i64..1000,
            proptest::option::of(any::<i32>()),
            proptest::option::of("[a-z]{0,6}"),
            proptest::collection::vec(arb_field(depth), 0..4),
        )
            .prop_map(|(id, record_type, ext_id, fields)| {
                Record::full(
                    RecordId {
                        id,
                        record_type,
                        ext_id,
                    },
                    fields,
                )
            })
            .boxed()
    }

    proptest! {
        #[test]
        fn graph_roundtrip_keeps_nested_ids(record in arb_record(3)) {
            let decoded = Record::from_bytes(&record.to_bytes().unwrap()).unwrap();
            prop_assert_eq!(&decoded.id, &record.id);
            prop_assert_eq!(decoded.state, record.state);
            prop_assert_eq!(decoded.fields.len(), record.fields.len());
            for (got, want) in decoded.fields.iter().zip(&record.fields) {
                prop_assert_eq!(got.field_type, want.field_type);
                prop_assert_eq!(got.state, want.state);
                prop_assert_eq!(&got.data, &want.data);
                prop_assert_eq!(got.nested_id(), want.nested_id());
            }
        }
    }
}
