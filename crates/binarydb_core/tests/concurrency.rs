//! Concurrent writers and readers sharing one database.

mod common;

use binarydb_core::Database;
use common::{data, full, init_tracing, partial};
use std::sync::{Arc, Barrier};
use std::thread;
use tempfile::tempdir;

const THREADS: usize = 8;
const WRITES: usize = 25;

#[test]
fn disjoint_writers_all_land() {
    init_tracing();
    let temp = tempdir().unwrap();
    let db = Arc::new(Database::load_or_create("db", temp.path()).unwrap());
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let db = Arc::clone(&db);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for i in 0..WRITES {
                    let key = format!("t{t}-{i}");
                    db.write(full(&key, 1, &[(1, key.as_bytes())])).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    db.flush().unwrap();
    let stats = db.stats();
    assert_eq!(stats.known_ids, (THREADS * WRITES) as u64);
    assert_eq!(stats.indexed_records, (THREADS * WRITES) as u64);
    assert_eq!(stats.pending_wal_records, 0);

    for t in 0..THREADS {
        for i in 0..WRITES {
            let key = format!("t{t}-{i}");
            let record = db.read_external(&key, Some(1)).unwrap().unwrap();
            assert_eq!(data(&record, 1), Some(key.into_bytes()));
        }
    }
}

#[test]
fn same_record_updates_are_serialized() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    db.write(full("shared", 1, &[])).unwrap();

    // Each thread owns one field type, so every update must survive.
    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let db = Arc::clone(&db);
            thread::spawn(move || {
                let field_type = t as i32 + 1;
                for i in 0..WRITES {
                    db.write(partial("shared", 1, &[(field_type, &[i as u8])]))
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let check = |db: &Database| {
        let record = db.read_external("shared", Some(1)).unwrap().unwrap();
        assert_eq!(record.fields.len(), THREADS);
        for t in 0..THREADS {
            assert_eq!(data(&record, t as i32 + 1), Some(vec![(WRITES - 1) as u8]));
        }
    };
    check(&db);
    db.flush().unwrap();
    check(&db);
    assert_eq!(db.stats().known_ids, 1);
}

#[test]
fn readers_see_consistent_records_during_writes() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    db.write(full("doc", 1, &[(1, &[0]), (2, &[0])])).unwrap();

    let writer = {
        let db = Arc::clone(&db);
        thread::spawn(move || {
            for i in 1..=100u8 {
                // Both fields always change together.
                db.write(partial("doc", 1, &[(1, &[i]), (2, &[i])])).unwrap();
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let db = Arc::clone(&db);
            thread::spawn(move || {
                for _ in 0..100 {
                    let record = db.read_external("doc", Some(1)).unwrap().unwrap();
                    assert_eq!(data(&record, 1), data(&record, 2));
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }

    let record = db.read_external("doc", Some(1)).unwrap().unwrap();
    assert_eq!(data(&record, 1), Some(vec![100]));
}
