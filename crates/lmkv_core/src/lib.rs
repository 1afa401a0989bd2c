//! # lmkv Core
//!
//! Typed, resource-safe wrapper over the LMDB embedded key-value store.
//!
//! This crate provides:
//! - Environment lifecycle with configurable capacity limits and flags
//! - Transactions with an explicit state machine (begin, commit, abort, reset, renew)
//! - Named tables with optional duplicate-sorted values
//! - Cursors for ordered and duplicate-aware navigation
//! - Typed key/value marshaling for records, text and byte buffers
//!
//! ## Example
//!
//! ```rust,no_run
//! use lmkv_core::{Cursor, Database, DatabaseFlags, EnvConfig, Environment, WriteFlags};
//!
//! let env = Environment::open_with(EnvConfig::new().path("/tmp/lmkv"))?;
//!
//! let db = env.write(|txn| {
//!     let db = Database::open_with(txn, "fruit", DatabaseFlags::CREATE)?;
//!     db.put(txn, "apple", "red", WriteFlags::empty())?;
//!     db.put(txn, "banana", "yellow", WriteFlags::empty())?;
//!     Ok(db)
//! })?;
//!
//! let txn = env.begin_ro_txn()?;
//! let mut cursor = Cursor::ro(&txn, &db)?;
//! for entry in cursor.iter::<String, String>() {
//!     let (name, colour) = entry?;
//!     println!("{name}: {colour}");
//! }
//! # Ok::<(), lmkv_core::Status>(())
//! ```

mod config;
mod cursor;
mod database;
mod env;
mod error;
mod flags;
mod marshal;
mod stat;
mod transaction;

pub use config::{
    EnvConfig, DEFAULT_MAP_SIZE, DEFAULT_MAX_READERS, DEFAULT_MAX_TABLES, DEFAULT_MODE,
};
pub use cursor::{Cursor, DecodeOwned, Iter};
pub use database::{Comparator, Database};
pub use env::{
    Environment, DATA_FILE_NAME, DEFAULT_FILE_NAME, LOCK_FILE_NAME, LOCK_FILE_SUFFIX,
};
pub use error::{CoreResult, OptionalExt, Status};
pub use flags::{DatabaseFlags, EnvFlags, WriteFlags};
pub use marshal::{kind_of, ByteView, Decode, Encode, Kind, Record};
pub use stat::{EnvInfo, Stat};
pub use transaction::{Transaction, TransactionKind, TransactionState};

/// Returns the version of the linked LMDB library as `(major, minor, patch)`.
#[must_use]
pub fn lmdb_version() -> (i32, i32, i32) {
    let (mut major, mut minor, mut patch) = (0, 0, 0);
    // SAFETY: valid out pointers; the returned string is ignored.
    unsafe { lmdb_master_sys::mdb_version(&mut major, &mut minor, &mut patch) };
    (major, minor, patch)
}
