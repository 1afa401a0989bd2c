//! Cursor ordering and duplicate-sort behavior.

use lmkv_core::{
    Comparator, Cursor, Database, DatabaseFlags, Environment, Status, WriteFlags,
};
use lmkv_testkit::prelude::*;
use lmkv_testkit::scenarios::{key_at, populated_table, value_at};
use std::cmp::Ordering;

/// Orders keys by length first, then bytewise.
struct ShortestFirst;

impl Comparator for ShortestFirst {
    fn compare(a: &[u8], b: &[u8]) -> Ordering {
        a.len().cmp(&b.len()).then_with(|| a.cmp(b))
    }
}

#[test]
fn forward_scan_is_sorted() {
    let (test_env, db) = populated_table("t", 50);
    let txn = test_env.begin_ro_txn().unwrap();
    let mut cursor = Cursor::ro(&txn, &db).unwrap();

    let keys: Vec<String> = cursor
        .iter::<String, String>()
        .map(|entry| entry.unwrap().0)
        .collect();
    let expected: Vec<String> = (0..50).map(key_at).collect();
    assert_eq!(keys, expected);
}

#[test]
fn backward_scan_is_reverse_sorted() {
    let (test_env, db) = populated_table("t", 20);
    let txn = test_env.begin_ro_txn().unwrap();
    let mut cursor = Cursor::ro(&txn, &db).unwrap();

    let mut keys = vec![cursor.last_key::<String>().unwrap()];
    while let Ok(key) = cursor.prev_key::<String>() {
        keys.push(key);
    }
    let expected: Vec<String> = (0..20).rev().map(key_at).collect();
    assert_eq!(keys, expected);
}

#[test]
fn boundaries_report_not_found() {
    let (test_env, db) = populated_table("t", 3);
    let txn = test_env.begin_ro_txn().unwrap();
    let mut cursor = Cursor::ro(&txn, &db).unwrap();

    cursor.first_key::<String>().unwrap();
    assert_eq!(cursor.prev_key::<String>(), Err(Status::NOT_FOUND));

    cursor.last_key::<String>().unwrap();
    assert_eq!(cursor.next_key::<String>(), Err(Status::NOT_FOUND));

    // Still usable after hitting either end.
    let (key, value): (String, String) = cursor.first().unwrap();
    assert_eq!((key, value), (key_at(0), value_at(0)));
}

#[test]
fn cursor_reusable_after_seek() {
    let (test_env, db) = populated_table("t", 10);
    let txn = test_env.begin_ro_txn().unwrap();
    let mut cursor = Cursor::ro(&txn, &db).unwrap();

    cursor.seek(&key_at(5)).unwrap();
    let (key, _): (String, String) = cursor.next().unwrap();
    assert_eq!(key, key_at(6));

    let (key, value): (String, String) = cursor.search("key_000007x").unwrap();
    assert_eq!((key, value), (key_at(8), value_at(8)));

    let key: String = cursor.last_key().unwrap();
    assert_eq!(key, key_at(9));
}

#[test]
fn iter_from_starts_at_lower_bound() {
    let (test_env, db) = populated_table("t", 10);
    let txn = test_env.begin_ro_txn().unwrap();
    let mut cursor = Cursor::ro(&txn, &db).unwrap();

    let keys: Vec<String> = cursor
        .iter_from::<String, String, str>(&key_at(7))
        .map(|entry| entry.unwrap().0)
        .collect();
    assert_eq!(keys, [key_at(7), key_at(8), key_at(9)]);
}

#[test]
fn record_keys_use_native_byte_order() {
    let test_env = TestEnv::new();
    let db = test_env
        .write(|txn| {
            let db = Database::open_with(
                txn,
                "ints",
                DatabaseFlags::CREATE | DatabaseFlags::INTEGER_KEY,
            )?;
            for i in [300u64, 2, 70_000, 1] {
                db.put(txn, &i, &(i * 2), WriteFlags::empty())?;
            }
            Ok(db)
        })
        .unwrap();

    let txn = test_env.begin_ro_txn().unwrap();
    let mut cursor = Cursor::ro(&txn, &db).unwrap();
    let entries: Vec<(u64, u64)> = cursor
        .iter::<u64, u64>()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(entries, [(1, 2), (2, 4), (300, 600), (70_000, 140_000)]);
}

#[test]
fn custom_comparator_orders_scan() {
    let test_env = TestEnv::new();
    let db = test_env
        .write(|txn| {
            let db = Database::open_with(txn, "bylen", DatabaseFlags::CREATE)?;
            db.set_key_comparator::<ShortestFirst>(txn)?;
            for key in ["ccc", "a", "bb", "aa"] {
                db.put(txn, key, "", WriteFlags::empty())?;
            }
            Ok(db)
        })
        .unwrap();

    let txn = test_env.begin_ro_txn().unwrap();
    let mut cursor = Cursor::ro(&txn, &db).unwrap();
    let keys: Vec<String> = cursor
        .iter::<String, Vec<u8>>()
        .map(|entry| entry.unwrap().0)
        .collect();
    assert_eq!(keys, ["a", "aa", "bb", "ccc"]);
}

fn fruit_table(env: &Environment) -> Database {
    env.write(|txn| {
        let db = Database::open_with(
            txn,
            "fruit",
            DatabaseFlags::CREATE | DatabaseFlags::DUP_SORT,
        )?;
        for (key, value) in [
            ("red", "strawberry"),
            ("red", "apple"),
            ("yellow", "lemon"),
            ("red", "cherry"),
            ("yellow", "banana"),
        ] {
            db.put(txn, key, value, WriteFlags::empty())?;
        }
        Ok(db)
    })
    .unwrap()
}

#[test]
fn duplicates_are_sorted_by_value() {
    let test_env = TestEnv::new();
    let db = fruit_table(&test_env);
    let txn = test_env.begin_ro_txn().unwrap();
    let mut cursor = Cursor::ro(&txn, &db).unwrap();

    let entries: Vec<(String, String)> = cursor
        .iter::<String, String>()
        .collect::<Result<_, _>>()
        .unwrap();
    let as_str: Vec<(&str, &str)> = entries
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    assert_eq!(
        as_str,
        [
            ("red", "apple"),
            ("red", "cherry"),
            ("red", "strawberry"),
            ("yellow", "banana"),
            ("yellow", "lemon"),
        ]
    );
}

#[test]
fn two_duplicates_walk_in_order() {
    let test_env = TestEnv::new();
    let db = test_env
        .write(|txn| {
            let db = Database::open_with(
                txn,
                "pair",
                DatabaseFlags::CREATE | DatabaseFlags::DUP_SORT,
            )?;
            db.put(txn, "k", "v2", WriteFlags::empty())?;
            db.put(txn, "k", "v1", WriteFlags::empty())?;
            Ok(db)
        })
        .unwrap();

    let txn = test_env.begin_ro_txn().unwrap();
    let mut cursor = Cursor::ro(&txn, &db).unwrap();
    cursor.seek("k").unwrap();
    assert_eq!(cursor.count(), Ok(2));

    let first: String = cursor.first_dup().unwrap();
    assert_eq!(first, "v1");
    let (_, second): (String, String) = cursor.next_dup().unwrap();
    assert_eq!(second, "v2");
    assert_eq!(cursor.next_dup::<String, String>(), Err(Status::NOT_FOUND));
}

#[test]
fn skipping_between_keys() {
    let test_env = TestEnv::new();
    let db = fruit_table(&test_env);
    let txn = test_env.begin_ro_txn().unwrap();
    let mut cursor = Cursor::ro(&txn, &db).unwrap();

    let mut keys = vec![cursor.first_key::<String>().unwrap()];
    while let Ok((key, _)) = cursor.next_nodup::<String, String>() {
        keys.push(key);
    }
    assert_eq!(keys, ["red", "yellow"]);
}

#[test]
fn duplicate_pair_deletion() {
    let test_env = TestEnv::new();
    let db = fruit_table(&test_env);

    let mut txn = test_env.begin_rw_txn().unwrap();
    db.delete_value(&mut txn, "red", "cherry").unwrap();
    assert_eq!(
        db.delete_value(&mut txn, "red", "cherry"),
        Err(Status::NOT_FOUND)
    );
    {
        let mut cursor = Cursor::rw(&mut txn, &db).unwrap();
        cursor.find_pair("yellow", "lemon").unwrap();
        cursor.del().unwrap();
    }
    assert_eq!(db.entries(&txn).unwrap(), 3);
    txn.commit().unwrap();

    let txn = test_env.begin_ro_txn().unwrap();
    let mut cursor = Cursor::ro(&txn, &db).unwrap();
    cursor.seek("red").unwrap();
    assert_eq!(cursor.count(), Ok(2));
    let last: String = cursor.last_dup().unwrap();
    assert_eq!(last, "strawberry");

    cursor.seek("yellow").unwrap();
    assert_eq!(cursor.count(), Ok(1));
    let only: String = cursor.first_dup().unwrap();
    assert_eq!(only, "banana");
}

#[test]
fn compare_helpers_follow_table_order() {
    let test_env = TestEnv::new();
    let db = fruit_table(&test_env);
    let txn = test_env.begin_ro_txn().unwrap();

    assert_eq!(db.compare_keys(&txn, "red", "yellow"), Ok(Ordering::Less));
    assert_eq!(
        db.compare_values(&txn, "lemon", "banana"),
        Ok(Ordering::Greater)
    );
}
