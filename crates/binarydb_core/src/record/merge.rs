//! Merging partial updates onto stored records.

use super::{Field, FieldState, Record, RecordState};
use std::collections::{HashSet, VecDeque};

/// Merges `incoming` onto `base`.
///
/// - A `Reference` base is never overwritten.
/// - A non-`Partial` incoming record replaces the base outright.
/// - A `Partial` incoming record yields a `Full` record with the base id
///   and the fields produced by [`merge_fields`].
#[must_use]
pub fn merge(base: &Record, incoming: &Record) -> Record {
    if base.state == RecordState::Reference {
        return base.clone();
    }
    if incoming.state != RecordState::Partial {
        return incoming.clone();
    }
    Record::full(base.id.clone(), merge_fields(&base.fields, &incoming.fields))
}

/// Replaces fields per type.
///
/// Every type present in `incoming` drops all base fields of that type;
/// incoming fields are then appended unless their state is `Deleted`.
/// Types absent from `incoming` keep their base fields in order.
#[must_use]
pub fn merge_fields(base: &[Field], incoming: &[Field]) -> Vec<Field> {
    let replaced: HashSet<i32> = incoming.iter().map(|f| f.field_type).collect();

    base.iter()
        .filter(|f| !replaced.contains(&f.field_type))
        .chain(incoming.iter().filter(|f| f.state != FieldState::Deleted))
        .cloned()
        .collect()
}

/// Collects the internal ids of `record` and every nested record reachable
/// from it, breadth first, without duplicates. Unassigned ids are skipped.
#[must_use]
pub fn collect_reachable_ids(record: &Record) -> Vec<i64> {
    let mut seen = HashSet::new();
    let mut ids = Vec::new();
    let mut queue = VecDeque::from([record]);

    while let Some(current) = queue.pop_front() {
        if current.id.is_assigned() && seen.insert(current.id.id) {
            ids.push(current.id.id);
        }
        queue.extend(current.fields.iter().filter_map(|f| f.record.as_deref()));
    }

    ids
}
