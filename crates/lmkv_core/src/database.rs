//! Named tables.
//!
//! A [`Database`] is a handle to one table (LMDB "database") inside an
//! environment. It is opened inside a transaction and stays valid across
//! later transactions once that transaction commits. If it aborts instead,
//! LMDB may hand the slot to another table; the stale handle then fails
//! every operation with `INVALID_STATE` rather than reaching that table.

use crate::env::Environment;
use crate::error::{lmdb_result, CoreResult, Status};
use crate::flags::{DatabaseFlags, WriteFlags};
use crate::marshal::{ByteView, Decode, Encode};
use crate::stat::Stat;
use crate::transaction::Transaction;
use lmdb_master_sys as ffi;
use std::cmp::Ordering;
use std::ffi::CString;
use std::mem::MaybeUninit;
use std::os::raw::{c_int, c_uint};
use std::ptr;
use tracing::debug;

/// A three-way byte comparator installable on a table.
///
/// The same comparator must be installed by every user of the table, every
/// time it is opened, before any data is accessed.
pub trait Comparator {
    /// Compares two keys (or two duplicate values).
    fn compare(a: &[u8], b: &[u8]) -> Ordering;
}

unsafe extern "C" fn compare_trampoline<C: Comparator>(
    a: *const ffi::MDB_val,
    b: *const ffi::MDB_val,
) -> c_int {
    // SAFETY: LMDB passes two valid values for the duration of the call.
    let (a, b) = unsafe { (ByteView::from_raw(&*a), ByteView::from_raw(&*b)) };
    match C::compare(a.as_bytes(), b.as_bytes()) {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    }
}

/// Handle to a table.
#[derive(Debug, Default)]
pub struct Database {
    dbi: ffi::MDB_dbi,
    /// Registry epoch of the slot when this handle opened it.
    epoch: u64,
    open: bool,
    flags: DatabaseFlags,
    name: Option<String>,
}

impl Database {
    /// Creates a closed handle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a table and returns its handle.
    pub fn open_with(
        txn: &mut Transaction<'_>,
        name: &str,
        flags: DatabaseFlags,
    ) -> CoreResult<Self> {
        let mut db = Self::new();
        db.open(txn, name, flags)?;
        Ok(db)
    }

    /// Opens the table `name`; an empty name selects the unnamed table.
    ///
    /// Without [`DatabaseFlags::CREATE`] a missing table fails with
    /// `NOT_FOUND`. If `txn` is later aborted, LMDB closes the handle again
    /// and the table must be reopened; a stale handle may be passed here
    /// again for that.
    pub fn open(
        &mut self,
        txn: &mut Transaction<'_>,
        name: &str,
        flags: DatabaseFlags,
    ) -> CoreResult<()> {
        if self.open && txn.env().table_is_live(self.dbi, self.epoch) {
            return Err(Status::ALREADY_OPEN);
        }
        let raw_txn = txn.live()?;

        let c_name = if name.is_empty() {
            None
        } else {
            Some(CString::new(name).map_err(|_| Status::INVALID_ARGUMENT)?)
        };
        let name_ptr = c_name.as_ref().map_or(ptr::null(), |name| name.as_ptr());

        let mut dbi: ffi::MDB_dbi = 0;
        let mut stored: c_uint = 0;
        // SAFETY: active transaction, NUL-terminated (or null) name and valid
        // out pointers.
        unsafe {
            lmdb_result(ffi::mdb_dbi_open(raw_txn, name_ptr, flags.bits(), &mut dbi))?;
            lmdb_result(ffi::mdb_dbi_flags(raw_txn, dbi, &mut stored))?;
        }

        let (epoch, fresh) = txn.env().claim_table(dbi);
        if fresh && c_name.is_some() {
            txn.track_new_table(dbi);
        }

        self.dbi = dbi;
        self.epoch = epoch;
        self.open = true;
        self.flags = DatabaseFlags::from_bits_truncate(stored);
        self.name = c_name.map(|_| name.to_string());
        debug!(table = name, dbi, flags = ?self.flags, "table opened");
        Ok(())
    }

    /// Stores `value` under `key`.
    ///
    /// [`WriteFlags::NO_OVERWRITE`] turns an existing key into `KEY_EXIST`;
    /// in duplicate-sort tables [`WriteFlags::NO_DUP_DATA`] does the same for
    /// an identical key/value pair.
    pub fn put<K, V>(
        &self,
        txn: &mut Transaction<'_>,
        key: &K,
        value: &V,
        flags: WriteFlags,
    ) -> CoreResult<()>
    where
        K: Encode + ?Sized,
        V: Encode + ?Sized,
    {
        let dbi = self.ensure_open(txn.env())?;
        let raw_txn = txn.live()?;
        let mut key = key.encode().to_raw();
        let mut value = value.encode().to_raw();
        // SAFETY: active transaction; the views outlive the call.
        lmdb_result(unsafe { ffi::mdb_put(raw_txn, dbi, &mut key, &mut value, flags.bits()) })
    }

    /// Looks up the value stored under `key`.
    ///
    /// In duplicate-sort tables the first duplicate is returned; use a
    /// [`Cursor`](crate::Cursor) to reach the others.
    pub fn get<'t, K, V>(&self, txn: &'t Transaction<'_>, key: &K) -> CoreResult<V>
    where
        K: Encode + ?Sized,
        V: Decode<'t>,
    {
        let dbi = self.ensure_open(txn.env())?;
        let raw_txn = txn.live()?;
        let mut key = key.encode().to_raw();
        let mut data = ByteView::empty().to_raw();
        // SAFETY: active transaction; on success `data` points into the map
        // and stays valid while `txn` is borrowed, since every write needs
        // `&mut Transaction`.
        unsafe {
            lmdb_result(ffi::mdb_get(raw_txn, dbi, &mut key, &mut data))?;
            V::decode(ByteView::from_raw(&data))
        }
    }

    /// Returns true if `key` is present.
    pub fn contains<K>(&self, txn: &Transaction<'_>, key: &K) -> CoreResult<bool>
    where
        K: Encode + ?Sized,
    {
        match self.get::<K, &[u8]>(txn, key) {
            Ok(_) => Ok(true),
            Err(status) if status.is_not_found() => Ok(false),
            Err(status) => Err(status),
        }
    }

    /// Deletes `key` together with all of its duplicate values.
    pub fn delete<K>(&self, txn: &mut Transaction<'_>, key: &K) -> CoreResult<()>
    where
        K: Encode + ?Sized,
    {
        let dbi = self.ensure_open(txn.env())?;
        let raw_txn = txn.live()?;
        let mut key = key.encode().to_raw();
        // SAFETY: active transaction; a null data pointer deletes all values.
        lmdb_result(unsafe { ffi::mdb_del(raw_txn, dbi, &mut key, ptr::null_mut()) })
    }

    /// Deletes only the exact `key`/`value` pair.
    ///
    /// Fails with `NOT_FOUND` if the pair is absent, including when a
    /// non-duplicate table holds a different value under `key`.
    pub fn delete_value<K, V>(&self, txn: &mut Transaction<'_>, key: &K, value: &V) -> CoreResult<()>
    where
        K: Encode + ?Sized,
        V: Encode + ?Sized,
    {
        let dbi = self.ensure_open(txn.env())?;
        if !self.is_dup_sort() {
            // LMDB ignores the value outside duplicate-sort tables.
            let stored: &[u8] = self.get(txn, key)?;
            if stored != value.encode().as_bytes() {
                return Err(Status::NOT_FOUND);
            }
        }
        let raw_txn = txn.live()?;
        let mut key = key.encode().to_raw();
        let mut value = value.encode().to_raw();
        // SAFETY: active transaction; the views outlive the call.
        lmdb_result(unsafe { ffi::mdb_del(raw_txn, dbi, &mut key, &mut value) })
    }

    /// Removes every entry; the handle stays open.
    pub fn erase(&self, txn: &mut Transaction<'_>) -> CoreResult<()> {
        let dbi = self.ensure_open(txn.env())?;
        let raw_txn = txn.live()?;
        // SAFETY: active transaction and open table.
        lmdb_result(unsafe { ffi::mdb_drop(raw_txn, dbi, 0) })?;
        debug!(table = self.name(), "table erased");
        Ok(())
    }

    /// Deletes the table from the environment and closes the handle.
    pub fn drop_table(&mut self, txn: &mut Transaction<'_>) -> CoreResult<()> {
        let dbi = self.ensure_open(txn.env())?;
        let raw_txn = txn.live()?;
        // SAFETY: active transaction and open table; LMDB closes the handle.
        lmdb_result(unsafe { ffi::mdb_drop(raw_txn, dbi, 1) })?;
        if self.name.is_some() {
            // The unnamed table is only emptied and keeps its slot.
            txn.env().release_tables(&[dbi]);
        }
        debug!(table = self.name(), "table dropped");
        self.dbi = 0;
        self.open = false;
        Ok(())
    }

    /// Returns B-tree statistics.
    pub fn stat(&self, txn: &Transaction<'_>) -> CoreResult<Stat> {
        let dbi = self.ensure_open(txn.env())?;
        let raw_txn = txn.live()?;
        let mut raw = MaybeUninit::<ffi::MDB_stat>::uninit();
        // SAFETY: active transaction; on success LMDB initializes `raw`.
        unsafe {
            lmdb_result(ffi::mdb_stat(raw_txn, dbi, raw.as_mut_ptr()))?;
            Ok(Stat::from(raw.assume_init()))
        }
    }

    /// Returns the number of entries, counting each duplicate.
    pub fn entries(&self, txn: &Transaction<'_>) -> CoreResult<u64> {
        self.stat(txn).map(|stat| stat.entries)
    }

    /// Compares two keys with the table's key comparator.
    pub fn compare_keys<K>(&self, txn: &Transaction<'_>, a: &K, b: &K) -> CoreResult<Ordering>
    where
        K: Encode + ?Sized,
    {
        let dbi = self.ensure_open(txn.env())?;
        let raw_txn = txn.live()?;
        let (a, b) = (a.encode().to_raw(), b.encode().to_raw());
        // SAFETY: active transaction and open table.
        Ok(unsafe { ffi::mdb_cmp(raw_txn, dbi, &a, &b) }.cmp(&0))
    }

    /// Compares two values with the table's duplicate comparator.
    ///
    /// Only duplicate-sort tables have one; others fail with `INCOMPATIBLE`.
    pub fn compare_values<V>(&self, txn: &Transaction<'_>, a: &V, b: &V) -> CoreResult<Ordering>
    where
        V: Encode + ?Sized,
    {
        let dbi = self.ensure_open(txn.env())?;
        if !self.is_dup_sort() {
            return Err(Status::INCOMPATIBLE);
        }
        let raw_txn = txn.live()?;
        let (a, b) = (a.encode().to_raw(), b.encode().to_raw());
        // SAFETY: active transaction and open duplicate-sort table.
        Ok(unsafe { ffi::mdb_dcmp(raw_txn, dbi, &a, &b) }.cmp(&0))
    }

    /// Installs `C` as the key comparator.
    ///
    /// Must run right after the table is opened, before any read or write.
    pub fn set_key_comparator<C: Comparator>(&self, txn: &mut Transaction<'_>) -> CoreResult<()> {
        let dbi = self.ensure_open(txn.env())?;
        let raw_txn = txn.live()?;
        // SAFETY: active transaction; the trampoline is a plain function.
        lmdb_result(unsafe { ffi::mdb_set_compare(raw_txn, dbi, Some(compare_trampoline::<C>)) })
    }

    /// Installs `C` as the duplicate value comparator.
    ///
    /// Same ordering rules as [`Database::set_key_comparator`].
    pub fn set_value_comparator<C: Comparator>(&self, txn: &mut Transaction<'_>) -> CoreResult<()> {
        let dbi = self.ensure_open(txn.env())?;
        let raw_txn = txn.live()?;
        // SAFETY: as in `set_key_comparator`.
        lmdb_result(unsafe { ffi::mdb_set_dupsort(raw_txn, dbi, Some(compare_trampoline::<C>)) })
    }

    /// Returns true if the handle is open.
    ///
    /// A handle whose opening transaction aborted still reports true; use
    /// [`Database::is_live`] to tell it apart.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.open
    }

    /// Returns the flags stored with the table.
    #[must_use]
    pub const fn flags(&self) -> DatabaseFlags {
        self.flags
    }

    /// Returns true if the table keeps several values per key.
    #[must_use]
    pub const fn is_dup_sort(&self) -> bool {
        self.flags.contains(DatabaseFlags::DUP_SORT)
    }

    /// Returns the table name; `None` for the unnamed table.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns the raw table identifier.
    #[must_use]
    pub const fn dbi(&self) -> ffi::MDB_dbi {
        self.dbi
    }

    /// Returns true if the handle is open and its slot still belongs to it.
    #[must_use]
    pub fn is_live(&self, env: &Environment) -> bool {
        self.open && env.table_is_live(self.dbi, self.epoch)
    }

    pub(crate) fn ensure_open(&self, env: &Environment) -> CoreResult<ffi::MDB_dbi> {
        if self.is_live(env) {
            Ok(self.dbi)
        } else {
            Err(Status::INVALID_STATE)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnvConfig;
    use tempfile::{tempdir, TempDir};

    fn open_env() -> (TempDir, Environment) {
        let dir = tempdir().unwrap();
        let config = EnvConfig::new()
            .path(dir.path())
            .map_size(10 * 1024 * 1024)
            .max_tables(8);
        let env = Environment::open_with(config).unwrap();
        (dir, env)
    }

    struct Descending;

    impl Comparator for Descending {
        fn compare(a: &[u8], b: &[u8]) -> Ordering {
            b.cmp(a)
        }
    }

    #[test]
    fn put_get_text() {
        let (_dir, env) = open_env();
        let mut txn = env.begin_rw_txn().unwrap();
        let db = Database::open_with(&mut txn, "t", DatabaseFlags::CREATE).unwrap();
        db.put(&mut txn, "first", "first record", WriteFlags::empty())
            .unwrap();
        txn.commit().unwrap();

        let txn = env.begin_ro_txn().unwrap();
        let value: String = db.get(&txn, "first").unwrap();
        assert_eq!(value, "first record");
        let borrowed: &str = db.get(&txn, "first").unwrap();
        assert_eq!(borrowed, "first record");
    }

    #[test]
    fn open_twice_fails() {
        let (_dir, env) = open_env();
        let mut txn = env.begin_rw_txn().unwrap();
        let mut db = Database::open_with(&mut txn, "t", DatabaseFlags::CREATE).unwrap();
        assert_eq!(
            db.open(&mut txn, "t", DatabaseFlags::CREATE),
            Err(Status::ALREADY_OPEN)
        );
    }

    #[test]
    fn open_missing_without_create() {
        let (_dir, env) = open_env();
        let mut txn = env.begin_rw_txn().unwrap();
        let mut db = Database::new();
        assert_eq!(
            db.open(&mut txn, "missing", DatabaseFlags::empty()),
            Err(Status::NOT_FOUND)
        );
        assert!(!db.is_open());
    }

    #[test]
    fn open_requires_pending_transaction() {
        let (_dir, env) = open_env();
        let mut txn = Transaction::read_write(&env);
        let mut db = Database::new();
        assert_eq!(
            db.open(&mut txn, "t", DatabaseFlags::CREATE),
            Err(Status::INVALID_STATE)
        );
    }

    #[test]
    fn unnamed_table() {
        let (_dir, env) = open_env();
        let mut txn = env.begin_rw_txn().unwrap();
        let db = Database::open_with(&mut txn, "", DatabaseFlags::empty()).unwrap();
        assert_eq!(db.name(), None);
        db.put(&mut txn, "k", "v", WriteFlags::empty()).unwrap();
        let value: String = db.get(&txn, "k").unwrap();
        assert_eq!(value, "v");
    }

    #[test]
    fn closed_handle_is_invalid_state() {
        let (_dir, env) = open_env();
        let mut txn = env.begin_rw_txn().unwrap();
        let db = Database::new();
        assert_eq!(
            db.put(&mut txn, "k", "v", WriteFlags::empty()),
            Err(Status::INVALID_STATE)
        );
        assert_eq!(db.get::<str, String>(&txn, "k"), Err(Status::INVALID_STATE));
        assert_eq!(db.delete(&mut txn, "k"), Err(Status::INVALID_STATE));
        assert_eq!(db.stat(&txn).unwrap_err(), Status::INVALID_STATE);
    }

    #[test]
    fn handle_survives_commit() {
        let (_dir, env) = open_env();
        let mut txn = env.begin_rw_txn().unwrap();
        let db = Database::open_with(&mut txn, "t", DatabaseFlags::CREATE).unwrap();
        txn.commit().unwrap();

        txn.begin().unwrap();
        db.put(&mut txn, "k", "v", WriteFlags::empty()).unwrap();
        txn.commit().unwrap();

        // Committed transactions reject further use.
        assert_eq!(
            db.put(&mut txn, "k", "w", WriteFlags::empty()),
            Err(Status::INVALID_STATE)
        );
    }

    #[test]
    fn no_overwrite_reports_key_exist() {
        let (_dir, env) = open_env();
        let mut txn = env.begin_rw_txn().unwrap();
        let db = Database::open_with(&mut txn, "t", DatabaseFlags::CREATE).unwrap();
        db.put(&mut txn, "k", "v1", WriteFlags::empty()).unwrap();
        assert_eq!(
            db.put(&mut txn, "k", "v2", WriteFlags::NO_OVERWRITE),
            Err(Status::KEY_EXIST)
        );
        let value: String = db.get(&txn, "k").unwrap();
        assert_eq!(value, "v1");
    }

    #[test]
    fn record_values_and_mismatch() {
        let (_dir, env) = open_env();
        let mut txn = env.begin_rw_txn().unwrap();
        let db = Database::open_with(&mut txn, "t", DatabaseFlags::CREATE).unwrap();
        db.put(&mut txn, &42u32, &1.5f64, WriteFlags::empty()).unwrap();
        db.put(&mut txn, "text", "abc", WriteFlags::empty()).unwrap();

        let value: f64 = db.get(&txn, &42u32).unwrap();
        assert_eq!(value, 1.5);
        assert_eq!(db.get::<str, u64>(&txn, "text"), Err(Status::TYPE_MISMATCH));
    }

    #[test]
    fn delete_key_and_pair() {
        let (_dir, env) = open_env();
        let mut txn = env.begin_rw_txn().unwrap();
        let db = Database::open_with(&mut txn, "t", DatabaseFlags::CREATE).unwrap();
        db.put(&mut txn, "a", "1", WriteFlags::empty()).unwrap();
        db.put(&mut txn, "b", "2", WriteFlags::empty()).unwrap();

        db.delete(&mut txn, "a").unwrap();
        assert_eq!(db.get::<str, String>(&txn, "a"), Err(Status::NOT_FOUND));
        assert_eq!(db.delete(&mut txn, "a"), Err(Status::NOT_FOUND));

        assert_eq!(db.delete_value(&mut txn, "b", "9"), Err(Status::NOT_FOUND));
        assert!(db.contains(&txn, "b").unwrap());
        db.delete_value(&mut txn, "b", "2").unwrap();
        assert!(!db.contains(&txn, "b").unwrap());
    }

    #[test]
    fn dup_sort_delete() {
        let (_dir, env) = open_env();
        let mut txn = env.begin_rw_txn().unwrap();
        let db = Database::open_with(
            &mut txn,
            "d",
            DatabaseFlags::CREATE | DatabaseFlags::DUP_SORT,
        )
        .unwrap();
        assert!(db.is_dup_sort());

        for value in ["apple", "banana", "cherry"] {
            db.put(&mut txn, "fruit", value, WriteFlags::NO_DUP_DATA)
                .unwrap();
        }
        assert_eq!(
            db.put(&mut txn, "fruit", "apple", WriteFlags::NO_DUP_DATA),
            Err(Status::KEY_EXIST)
        );
        assert_eq!(db.entries(&txn).unwrap(), 3);

        db.delete_value(&mut txn, "fruit", "banana").unwrap();
        assert_eq!(db.entries(&txn).unwrap(), 2);
        assert_eq!(
            db.delete_value(&mut txn, "fruit", "banana"),
            Err(Status::NOT_FOUND)
        );

        let first: String = db.get(&txn, "fruit").unwrap();
        assert_eq!(first, "apple");

        db.delete(&mut txn, "fruit").unwrap();
        assert_eq!(db.entries(&txn).unwrap(), 0);
    }

    #[test]
    fn erase_keeps_handle_open() {
        let (_dir, env) = open_env();
        let mut txn = env.begin_rw_txn().unwrap();
        let db = Database::open_with(&mut txn, "t", DatabaseFlags::CREATE).unwrap();
        db.put(&mut txn, "k", "v", WriteFlags::empty()).unwrap();
        db.erase(&mut txn).unwrap();

        assert!(db.is_open());
        assert_eq!(db.entries(&txn).unwrap(), 0);
        db.put(&mut txn, "k2", "v2", WriteFlags::empty()).unwrap();
        assert_eq!(db.entries(&txn).unwrap(), 1);
    }

    #[test]
    fn drop_table_closes_handle() {
        let (_dir, env) = open_env();
        let mut txn = env.begin_rw_txn().unwrap();
        let mut db = Database::open_with(&mut txn, "t", DatabaseFlags::CREATE).unwrap();
        db.put(&mut txn, "k", "v", WriteFlags::empty()).unwrap();
        db.drop_table(&mut txn).unwrap();
        assert!(!db.is_open());
        assert_eq!(
            db.put(&mut txn, "k", "v", WriteFlags::empty()),
            Err(Status::INVALID_STATE)
        );
        txn.commit().unwrap();

        txn.begin().unwrap();
        assert_eq!(
            db.open(&mut txn, "t", DatabaseFlags::empty()),
            Err(Status::NOT_FOUND)
        );
    }

    #[test]
    fn default_comparators() {
        let (_dir, env) = open_env();
        let mut txn = env.begin_rw_txn().unwrap();
        let db = Database::open_with(&mut txn, "t", DatabaseFlags::CREATE).unwrap();
        let dups = Database::open_with(
            &mut txn,
            "d",
            DatabaseFlags::CREATE | DatabaseFlags::DUP_SORT,
        )
        .unwrap();

        assert_eq!(db.compare_keys(&txn, "a", "b"), Ok(Ordering::Less));
        assert_eq!(db.compare_keys(&txn, "b", "b"), Ok(Ordering::Equal));
        assert_eq!(db.compare_keys(&txn, "ba", "b"), Ok(Ordering::Greater));
        assert_eq!(dups.compare_values(&txn, "x", "y"), Ok(Ordering::Less));
        assert_eq!(db.compare_values(&txn, "x", "y"), Err(Status::INCOMPATIBLE));
    }

    #[test]
    fn custom_key_comparator() {
        let (_dir, env) = open_env();
        let mut txn = env.begin_rw_txn().unwrap();
        let db = Database::open_with(&mut txn, "desc", DatabaseFlags::CREATE).unwrap();
        db.set_key_comparator::<Descending>(&mut txn).unwrap();

        assert_eq!(db.compare_keys(&txn, "a", "b"), Ok(Ordering::Greater));
        for key in ["a", "b", "c"] {
            db.put(&mut txn, key, key, WriteFlags::empty()).unwrap();
        }

        let mut cursor = crate::Cursor::ro(&txn, &db).unwrap();
        let first: String = cursor.first_key().unwrap();
        assert_eq!(first, "c");
    }

    #[test]
    fn stat_counts_entries() {
        let (_dir, env) = open_env();
        let mut txn = env.begin_rw_txn().unwrap();
        let db = Database::open_with(&mut txn, "t", DatabaseFlags::CREATE).unwrap();
        for i in 0u32..10 {
            db.put(&mut txn, &i, &i, WriteFlags::empty()).unwrap();
        }
        let stat = db.stat(&txn).unwrap();
        assert_eq!(stat.entries, 10);
        assert_eq!(stat.depth, 1);
        assert!(stat.page_size > 0);
    }

    #[test]
    fn aborted_open_cannot_alias_the_next_table() {
        let (_dir, env) = open_env();
        let mut txn = env.begin_rw_txn().unwrap();
        let mut stale = Database::open_with(&mut txn, "b", DatabaseFlags::CREATE).unwrap();
        txn.abort().unwrap();
        assert!(stale.is_open());
        assert!(!stale.is_live(&env));

        // LMDB hands the freed slot to the next table opened.
        txn.begin().unwrap();
        let c = Database::open_with(&mut txn, "c", DatabaseFlags::CREATE).unwrap();
        assert_eq!(c.dbi(), stale.dbi());
        assert_eq!(
            stale.put(&mut txn, "k", "oops", WriteFlags::empty()),
            Err(Status::INVALID_STATE)
        );
        assert_eq!(stale.get::<str, String>(&txn, "k"), Err(Status::INVALID_STATE));
        assert_eq!(stale.entries(&txn), Err(Status::INVALID_STATE));
        assert_eq!(
            crate::Cursor::ro(&txn, &stale).err(),
            Some(Status::INVALID_STATE)
        );
        assert!(!c.contains(&txn, "k").unwrap());
        txn.commit().unwrap();

        // The stale handle can be opened again.
        txn.begin().unwrap();
        stale.open(&mut txn, "b", DatabaseFlags::CREATE).unwrap();
        assert_ne!(stale.dbi(), c.dbi());
        stale.put(&mut txn, "k", "b", WriteFlags::empty()).unwrap();
        txn.commit().unwrap();

        let txn = env.begin_ro_txn().unwrap();
        assert!(!c.contains(&txn, "k").unwrap());
        let value: String = stale.get(&txn, "k").unwrap();
        assert_eq!(value, "b");
    }

    #[test]
    fn table_opened_in_read_closure_stays_bound() {
        let (_dir, mut env) = open_env();
        env.write(|txn| {
            let db = Database::open_with(txn, "a", DatabaseFlags::CREATE)?;
            db.put(txn, "k", "from a", WriteFlags::empty())
        })
        .unwrap();
        // Start from a fresh process view so "a" has no slot yet.
        env.close();
        env.open().unwrap();

        let a = env
            .read(|txn| Database::open_with(txn, "a", DatabaseFlags::empty()))
            .unwrap();
        assert!(a.is_live(&env));
        env.write(|txn| {
            let c = Database::open_with(txn, "c", DatabaseFlags::CREATE)?;
            c.put(txn, "k", "from c", WriteFlags::empty())
        })
        .unwrap();

        let txn = env.begin_ro_txn().unwrap();
        let value: String = a.get(&txn, "k").unwrap();
        assert_eq!(value, "from a");
    }

    #[test]
    fn failed_read_closure_releases_new_tables() {
        let (_dir, mut env) = open_env();
        env.write(|txn| Database::open_with(txn, "a", DatabaseFlags::CREATE).map(|_| ()))
            .unwrap();
        env.close();
        env.open().unwrap();

        let mut escaped = Database::new();
        let err = env
            .read(|txn| {
                escaped.open(txn, "a", DatabaseFlags::empty())?;
                Err::<(), _>(Status::NOT_FOUND)
            })
            .unwrap_err();
        assert_eq!(err, Status::NOT_FOUND);
        assert!(!escaped.is_live(&env));

        let txn = env.begin_ro_txn().unwrap();
        assert_eq!(escaped.entries(&txn), Err(Status::INVALID_STATE));
    }

    #[test]
    fn dropping_one_handle_stales_its_twins() {
        let (_dir, env) = open_env();
        let mut txn = env.begin_rw_txn().unwrap();
        let mut db = Database::open_with(&mut txn, "t", DatabaseFlags::CREATE).unwrap();
        let twin = Database::open_with(&mut txn, "t", DatabaseFlags::empty()).unwrap();
        assert_eq!(twin.dbi(), db.dbi());
        db.drop_table(&mut txn).unwrap();
        assert!(twin.is_open());
        assert_eq!(twin.entries(&txn), Err(Status::INVALID_STATE));
    }
}
