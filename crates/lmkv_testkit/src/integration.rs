//! Model-checking harness.
//!
//! Mirrors one table in a `BTreeMap` and verifies that point reads and
//! cursor scans agree with the model after every change.

use crate::fixtures::TestEnv;
use crate::generators::Operation;
use lmkv_core::{Cursor, Database, DatabaseFlags, OptionalExt, Status, WriteFlags};
use std::collections::BTreeMap;

/// A test harness that tracks every write in an in-memory model.
pub struct ModelHarness {
    /// The environment instance.
    pub env: TestEnv,
    /// The table under test.
    pub db: Database,
    model: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl ModelHarness {
    /// Creates a harness with an empty table named `name`.
    pub fn new(name: &str) -> Self {
        let env = TestEnv::new();
        let db = env
            .write(|txn| Database::open_with(txn, name, DatabaseFlags::CREATE))
            .expect("Failed to open table");
        Self {
            env,
            db,
            model: BTreeMap::new(),
        }
    }

    /// Stores a value and tracks it.
    pub fn put(&mut self, key: &[u8], value: &[u8]) {
        let db = &self.db;
        self.env
            .write(|txn| db.put(txn, key, value, WriteFlags::empty()))
            .expect("Failed to put entry");
        self.model.insert(key.to_vec(), value.to_vec());
    }

    /// Stores a value only if the key is absent; returns whether it was stored.
    pub fn insert(&mut self, key: &[u8], value: &[u8]) -> bool {
        let db = &self.db;
        let result = self
            .env
            .write(|txn| db.put(txn, key, value, WriteFlags::NO_OVERWRITE));
        match result {
            Ok(()) => {
                assert!(
                    !self.model.contains_key(key),
                    "NO_OVERWRITE accepted existing key {key:?}"
                );
                self.model.insert(key.to_vec(), value.to_vec());
                true
            }
            Err(status) => {
                assert_eq!(status, Status::KEY_EXIST);
                assert!(self.model.contains_key(key), "KEY_EXIST for absent key {key:?}");
                false
            }
        }
    }

    /// Deletes a key; returns whether it was present.
    pub fn delete(&mut self, key: &[u8]) -> bool {
        let db = &self.db;
        let deleted = self
            .env
            .write(|txn| db.delete(txn, key).optional())
            .expect("Failed to delete entry")
            .is_some();
        assert_eq!(
            deleted,
            self.model.remove(key).is_some(),
            "delete disagrees with model for {key:?}"
        );
        deleted
    }

    /// Reads a key and verifies it matches the model.
    pub fn get_and_verify(&self, key: &[u8]) -> Option<Vec<u8>> {
        let db = &self.db;
        let actual = self
            .env
            .read(|txn| db.get::<[u8], Vec<u8>>(txn, key).optional())
            .expect("Failed to get entry");
        assert_eq!(
            actual.as_ref(),
            self.model.get(key),
            "Entry mismatch for {key:?}"
        );
        actual
    }

    /// Applies a generated operation.
    pub fn apply(&mut self, op: &Operation) {
        match op {
            Operation::Put { key, value } => self.put(key, value),
            Operation::Insert { key, value } => {
                self.insert(key, value);
            }
            Operation::Delete { key } => {
                self.delete(key);
            }
            Operation::Get { key } => {
                self.get_and_verify(key);
            }
        }
    }

    /// Verifies point reads, entry count and cursor order against the model.
    pub fn verify_all(&self) {
        let txn = self.env.begin_ro_txn().expect("Failed to begin read");

        for (key, expected) in &self.model {
            let actual: &[u8] = self.db.get(&txn, key.as_slice()).expect("Failed to get entry");
            assert_eq!(actual, expected.as_slice(), "Entry mismatch for {key:?}");
        }

        let entries = self.db.entries(&txn).expect("Failed to read stat");
        assert_eq!(entries, self.model.len() as u64, "Entry count mismatch");

        let mut cursor = Cursor::ro(&txn, &self.db).expect("Failed to open cursor");
        let scanned: Vec<(Vec<u8>, Vec<u8>)> = cursor
            .iter::<Vec<u8>, Vec<u8>>()
            .collect::<Result<_, _>>()
            .expect("Failed to scan table");
        let expected: Vec<(Vec<u8>, Vec<u8>)> = self
            .model
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        assert_eq!(scanned, expected, "Cursor order disagrees with model");
    }

    /// Returns the count of tracked entries.
    pub fn tracked_count(&self) -> usize {
        self.model.len()
    }
}
