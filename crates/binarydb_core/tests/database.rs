//! End-to-end behavior of the database over real files.

mod common;

use binarydb_codec::{CodecError, MAX_BLOB_LENGTH};
use binarydb_core::{CoreError, Database, Field, FieldState, Record, RecordId, RecordState};
use common::{data, full, init_tracing, partial};
use tempfile::tempdir;

#[test]
fn scenario_full_then_partial_across_reopens() {
    init_tracing();
    let temp = tempdir().unwrap();

    {
        let db = Database::load_or_create("scenario", temp.path()).unwrap();
        let written = db.write(full("r1", 1, &[(2, &[1, 2])])).unwrap();
        assert_eq!(written[0].id.id, 1);
        db.close().unwrap();
    }

    {
        let db = Database::load_or_create("scenario", temp.path()).unwrap();
        let record = db.read_external("r1", Some(1)).unwrap().unwrap();
        assert_eq!(record.id.id, 1);
        assert_eq!(data(&record, 2), Some(vec![1, 2]));

        db.write(partial("r1", 1, &[(3, &[2, 3])])).unwrap();
        db.close().unwrap();
    }

    let db = Database::load_or_create("scenario", temp.path()).unwrap();
    let record = db.read_external("r1", Some(1)).unwrap().unwrap();
    assert_eq!(record.state, RecordState::Full);
    assert_eq!(data(&record, 2), Some(vec![1, 2]));
    assert_eq!(data(&record, 3), Some(vec![2, 3]));
}

#[test]
fn files_are_named_after_database() {
    let temp = tempdir().unwrap();
    let db = Database::load_or_create("people", temp.path()).unwrap();
    assert_eq!(db.name(), Some("people"));

    for kind in ["ID", "INDEX", "DATA", "WA", "FS", "LOCK"] {
        assert!(temp.path().join(format!("PEOPLE_{kind}.bdb")).exists(), "{kind}");
    }
}

#[test]
fn durable_without_compaction() {
    let temp = tempdir().unwrap();
    let db = Database::load_or_create("db", temp.path()).unwrap();
    for i in 0..20u8 {
        db.write(full(&format!("k{i}"), 1, &[(1, &[i])])).unwrap();
    }
    // Read before and after compaction must agree.
    let early = db.read_external("k7", Some(1)).unwrap().unwrap();
    db.flush().unwrap();
    let late = db.read_external("k7", Some(1)).unwrap().unwrap();
    assert_eq!(early, late);
    db.close().unwrap();

    let db = Database::load_or_create("db", temp.path()).unwrap();
    for i in 0..20u8 {
        let record = db.read_external(&format!("k{i}"), Some(1)).unwrap().unwrap();
        assert_eq!(data(&record, 1), Some(vec![i]));
    }
    assert_eq!(db.stats().known_ids, 20);
}

#[test]
fn partial_update_replaces_field_types() {
    let db = Database::open_in_memory().unwrap();
    db.write(full("a", 1, &[(1, b"A"), (2, b"B")])).unwrap();
    db.write(partial("a", 1, &[(2, b"C")])).unwrap();

    let record = db.read_external("a", Some(1)).unwrap().unwrap();
    assert_eq!(data(&record, 1), Some(b"A".to_vec()));
    assert_eq!(data(&record, 2), Some(b"C".to_vec()));
    assert_eq!(record.fields.len(), 2);

    // Same update again is a no-op.
    db.write(partial("a", 1, &[(2, b"C")])).unwrap();
    db.flush().unwrap();
    assert_eq!(db.read_external("a", Some(1)).unwrap().unwrap(), record);
}

#[test]
fn deleted_field_drops_type() {
    let db = Database::open_in_memory().unwrap();
    db.write(full("a", 1, &[(1, b"A"), (2, b"B"), (2, b"B2")])).unwrap();
    db.flush().unwrap();
    db.write(Record::partial(
        RecordId::external("a", Some(1)),
        vec![Field::deleted(2)],
    ))
    .unwrap();

    let record = db.read_external("a", Some(1)).unwrap().unwrap();
    assert_eq!(record.fields.len(), 1);
    assert!(record.field(2).is_none());
}

#[test]
fn delete_suppresses_reads_across_reopen() {
    let temp = tempdir().unwrap();
    let id = {
        let db = Database::load_or_create("db", temp.path()).unwrap();
        let id = db.write(full("gone", 1, &[(1, b"x")])).unwrap()[0].id.id;
        db.flush().unwrap();
        let tombstone = db.delete(id).unwrap();
        assert_eq!(tombstone[0].state, RecordState::Deleted);
        assert!(db.read(id).unwrap().is_none());
        id
    };

    let db = Database::load_or_create("db", temp.path()).unwrap();
    assert!(db.read(id).unwrap().is_none());
    assert!(db.read_external("gone", Some(1)).unwrap().is_none());
    // The id stays bound to its external id.
    assert_eq!(db.id_for(Some(1), "gone").unwrap(), Some(id));

    // A later full write brings the record back.
    db.write(full("gone", 1, &[(1, b"y")])).unwrap();
    let record = db.read(id).unwrap().unwrap();
    assert_eq!(data(&record, 1), Some(b"y".to_vec()));
}

#[test]
fn attachment_is_flattened_into_two_records() {
    let db = Database::open_in_memory().unwrap();
    let child = full("child", 2, &[(1, b"inner")]);
    let parent = Record::full(
        RecordId::external("parent", Some(1)),
        vec![Field::data(1, b"outer".to_vec()), Field::attachment(5, child)],
    );

    let written = db.write(parent).unwrap();
    assert_eq!(written.len(), 2);
    let (parent_id, child_id) = (written[0].id.id, written[1].id.id);
    assert_ne!(parent_id, child_id);

    let parent = db.read(parent_id).unwrap().unwrap();
    let link = parent.field(5).unwrap();
    assert_eq!(link.state, FieldState::Reference);
    assert_eq!(link.nested_id(), Some(child_id));
    let nested = link.record.as_ref().unwrap();
    assert_eq!(nested.state, RecordState::Reference);
    assert!(nested.fields.is_empty());

    let child = db.read(child_id).unwrap().unwrap();
    assert_eq!(data(&child, 1), Some(b"inner".to_vec()));
    assert_eq!(db.id_for(Some(2), "child").unwrap(), Some(child_id));
}

#[test]
fn oversized_field_is_rejected_without_side_effects() {
    let temp = tempdir().unwrap();
    {
        let db = Database::load_or_create("db", temp.path()).unwrap();
        db.write(full("small", 1, &[(1, b"ok")])).unwrap();

        let huge = vec![0u8; MAX_BLOB_LENGTH + 1];
        let result = db.write(full("huge", 1, &[(1, &huge)]));
        assert!(matches!(
            result,
            Err(CoreError::WriteFailed { ref source })
                if matches!(**source, CoreError::Codec(CodecError::SizeLimitExceeded { .. }))
        ));
        assert_eq!(db.stats().writes, 1);
        assert!(db.read_external("huge", Some(1)).unwrap().is_none());
        db.close().unwrap();
    }

    let db = Database::load_or_create("db", temp.path()).unwrap();
    let small = db.read_external("small", Some(1)).unwrap().unwrap();
    assert_eq!(data(&small, 1), Some(b"ok".to_vec()));
    assert!(db.read_external("huge", Some(1)).unwrap().is_none());
}

#[test]
fn reference_field_keeps_target_untouched() {
    let db = Database::open_in_memory().unwrap();
    db.write(full("target", 1, &[(1, b"t")])).unwrap();
    let written = db
        .write(Record::full(
            RecordId::external("source", Some(1)),
            vec![Field::reference(3, RecordId::external("target", Some(1)))],
        ))
        .unwrap();
    assert_eq!(written.len(), 1);

    let target = db.read_external("target", Some(1)).unwrap().unwrap();
    assert_eq!(data(&target, 1), Some(b"t".to_vec()));
    let source = db.read(written[0].id.id).unwrap().unwrap();
    assert_eq!(source.field(3).unwrap().nested_id(), Some(target.id.id));
}

#[test]
fn anonymous_record_is_rejected() {
    let db = Database::open_in_memory().unwrap();
    let result = db.write(Record::full(RecordId::default(), vec![]));
    assert!(matches!(result, Err(CoreError::InvalidRecord { .. })));
}

#[test]
fn missing_folder_is_rejected() {
    let temp = tempdir().unwrap();
    let result = Database::load_or_create("db", temp.path().join("missing"));
    assert!(matches!(result, Err(CoreError::DirectoryNotFound { .. })));
}

#[test]
fn second_open_is_locked_until_close() {
    let temp = tempdir().unwrap();
    let db = Database::load_or_create("db", temp.path()).unwrap();
    assert!(matches!(
        Database::load_or_create("db", temp.path()),
        Err(CoreError::DatabaseLocked)
    ));

    db.close().unwrap();
    assert!(Database::load_or_create("db", temp.path()).is_ok());
}

#[test]
fn disposed_database_rejects_calls() {
    let temp = tempdir().unwrap();
    let db = Database::load_or_create("db", temp.path()).unwrap();
    db.dispose().unwrap();

    assert!(matches!(db.read(1), Err(CoreError::DatabaseClosed)));
    assert!(matches!(db.delete(1), Err(CoreError::DatabaseClosed)));
    assert!(matches!(
        db.write(full("x", 1, &[])),
        Err(CoreError::DatabaseClosed)
    ));
    assert!(db.dispose().is_ok());
}

#[test]
fn delete_db_removes_files() {
    let temp = tempdir().unwrap();
    Database::load_or_create("db", temp.path())
        .unwrap()
        .close()
        .unwrap();

    Database::delete_db("db", temp.path()).unwrap();
    assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);

    // Deleting again is fine.
    Database::delete_db("db", temp.path()).unwrap();
}

#[test]
fn stats_track_activity() {
    let db = Database::open_in_memory().unwrap();
    db.write(full("a", 1, &[(1, b"abc")])).unwrap();
    db.read_external("a", Some(1)).unwrap();
    db.flush().unwrap();

    let stats = db.stats();
    assert_eq!(stats.writes, 1);
    assert_eq!(stats.reads, 1);
    assert_eq!(stats.compactions, 1);
    assert!(stats.bytes_written > 0);
    assert_eq!(stats.pending_wal_records, 0);
}
