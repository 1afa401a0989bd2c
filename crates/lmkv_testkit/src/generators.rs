//! Property-based test generators using proptest.
//!
//! Provides strategies for generating keys, values and operation sequences
//! that respect LMDB's limits.

use proptest::prelude::*;

/// Largest key generated; well below LMDB's default maximum key size.
pub const MAX_TEST_KEY_LEN: usize = 64;

/// Strategy for generating non-empty binary keys.
pub fn key_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 1..=MAX_TEST_KEY_LEN)
}

/// Strategy for generating keys from a small alphabet, so operations on the
/// same key collide often.
pub fn dense_key_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(b'a'..=b'd', 1..=3)
}

/// Strategy for generating values (arbitrary bytes, possibly empty).
pub fn value_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..512)
}

/// Strategy for generating table names.
pub fn table_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,15}").expect("Invalid regex")
}

/// Strategy for generating a batch of key/value entries.
pub fn entries_strategy(max_entries: usize) -> impl Strategy<Value = Vec<(Vec<u8>, Vec<u8>)>> {
    prop::collection::vec((key_strategy(), value_strategy()), 0..max_entries)
}

/// An operation against a single table.
#[derive(Debug, Clone)]
pub enum Operation {
    /// Store a value, replacing any previous one.
    Put {
        /// Key
        key: Vec<u8>,
        /// Value
        value: Vec<u8>,
    },
    /// Store a value only if the key is absent.
    Insert {
        /// Key
        key: Vec<u8>,
        /// Value
        value: Vec<u8>,
    },
    /// Delete a key.
    Delete {
        /// Key
        key: Vec<u8>,
    },
    /// Read a key.
    Get {
        /// Key
        key: Vec<u8>,
    },
}

/// Strategy for generating single operations.
pub fn operation_strategy() -> impl Strategy<Value = Operation> {
    prop_oneof![
        3 => (dense_key_strategy(), value_strategy())
            .prop_map(|(key, value)| Operation::Put { key, value }),
        1 => (dense_key_strategy(), value_strategy())
            .prop_map(|(key, value)| Operation::Insert { key, value }),
        1 => dense_key_strategy().prop_map(|key| Operation::Delete { key }),
        2 => dense_key_strategy().prop_map(|key| Operation::Get { key }),
    ]
}

/// Strategy for generating a sequence of operations.
pub fn operation_sequence_strategy(
    min_ops: usize,
    max_ops: usize,
) -> impl Strategy<Value = Vec<Operation>> {
    prop::collection::vec(operation_strategy(), min_ops..max_ops)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
