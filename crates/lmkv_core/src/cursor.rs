//! Cursors over a table.
//!
//! A [`Cursor`] is bound to one transaction and one table. Read-only cursors
//! borrow the transaction shared, so several can be open at once alongside
//! plain [`Database::get`] calls. Cursors that write borrow it exclusively.
//!
//! Values returned by navigation borrow the cursor: moving or writing through
//! the cursor ends the borrow, which is what keeps the returned slices valid.

use crate::database::Database;
use crate::error::{lmdb_result, CoreResult, Status};
use crate::flags::WriteFlags;
use crate::marshal::{ByteView, Decode, Encode};
use crate::transaction::Transaction;
use lmdb_master_sys as ffi;
use std::marker::PhantomData;
use std::os::raw::c_uint;
use std::ptr::{self, NonNull};
use tracing::trace;

/// Types decodable without borrowing from LMDB memory.
pub trait DecodeOwned: for<'a> Decode<'a> {}

impl<T> DecodeOwned for T where T: for<'a> Decode<'a> {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CursorOp {
    First,
    FirstDup,
    GetBoth,
    GetBothRange,
    GetCurrent,
    Last,
    LastDup,
    Next,
    NextDup,
    NextNoDup,
    Prev,
    PrevDup,
    PrevNoDup,
    Set,
    SetKey,
    SetRange,
}

impl CursorOp {
    fn to_raw(self) -> ffi::MDB_cursor_op {
        match self {
            Self::First => ffi::MDB_FIRST,
            Self::FirstDup => ffi::MDB_FIRST_DUP,
            Self::GetBoth => ffi::MDB_GET_BOTH,
            Self::GetBothRange => ffi::MDB_GET_BOTH_RANGE,
            Self::GetCurrent => ffi::MDB_GET_CURRENT,
            Self::Last => ffi::MDB_LAST,
            Self::LastDup => ffi::MDB_LAST_DUP,
            Self::Next => ffi::MDB_NEXT,
            Self::NextDup => ffi::MDB_NEXT_DUP,
            Self::NextNoDup => ffi::MDB_NEXT_NODUP,
            Self::Prev => ffi::MDB_PREV,
            Self::PrevDup => ffi::MDB_PREV_DUP,
            Self::PrevNoDup => ffi::MDB_PREV_NODUP,
            Self::Set => ffi::MDB_SET,
            Self::SetKey => ffi::MDB_SET_KEY,
            Self::SetRange => ffi::MDB_SET_RANGE,
        }
    }
}

/// A cursor over one table within one transaction.
///
/// An unbound cursor rejects every operation with `NOT_OPEN`. Dropping a
/// bound cursor closes it.
pub struct Cursor<'txn> {
    raw: Option<NonNull<ffi::MDB_cursor>>,
    writable: bool,
    _txn: PhantomData<&'txn ()>,
}

impl<'txn> Cursor<'txn> {
    /// Creates an unbound cursor.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            raw: None,
            writable: false,
            _txn: PhantomData,
        }
    }

    /// Opens a read-only cursor on `db`.
    pub fn ro(txn: &'txn Transaction<'_>, db: &Database) -> CoreResult<Self> {
        let mut cursor = Self::new();
        cursor.open(txn, db)?;
        Ok(cursor)
    }

    /// Opens a cursor that can also write to `db`.
    pub fn rw(txn: &'txn mut Transaction<'_>, db: &Database) -> CoreResult<Self> {
        let mut cursor = Self::new();
        cursor.open_mut(txn, db)?;
        Ok(cursor)
    }

    /// Binds the cursor to `db` for reading.
    ///
    /// Fails with `ALREADY_OPEN` if bound and with `INVALID_STATE` if the
    /// transaction is not pending or the table handle is closed.
    pub fn open(&mut self, txn: &'txn Transaction<'_>, db: &Database) -> CoreResult<()> {
        self.bind(txn, db, false)
    }

    /// Binds the cursor to `db` for reading and writing.
    pub fn open_mut(&mut self, txn: &'txn mut Transaction<'_>, db: &Database) -> CoreResult<()> {
        self.bind(txn, db, true)
    }

    fn bind(&mut self, txn: &Transaction<'_>, db: &Database, writable: bool) -> CoreResult<()> {
        if self.raw.is_some() {
            return Err(Status::ALREADY_OPEN);
        }
        let raw_txn = txn.live()?;
        let dbi = db.ensure_open(txn.env())?;

        let mut raw: *mut ffi::MDB_cursor = ptr::null_mut();
        // SAFETY: active transaction, open table and a valid out pointer.
        lmdb_result(unsafe { ffi::mdb_cursor_open(raw_txn, dbi, &mut raw) })?;
        self.raw = Some(NonNull::new(raw).ok_or(Status::NULL_HANDLE)?);
        self.writable = writable;
        trace!(dbi, writable, "cursor opened");
        Ok(())
    }

    /// Closes the cursor. Closing an unbound cursor does nothing.
    pub fn close(&mut self) {
        if let Some(raw) = self.raw.take() {
            // SAFETY: the handle is owned by this cursor and its transaction
            // is still borrowed.
            unsafe { ffi::mdb_cursor_close(raw.as_ptr()) };
            trace!("cursor closed");
        }
        self.writable = false;
    }

    /// Returns true if the cursor is bound.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.raw.is_some()
    }

    /// Returns true if the cursor was opened for writing.
    #[must_use]
    pub const fn is_writable(&self) -> bool {
        self.writable
    }

    /// Moves to the first entry.
    pub fn first<'c, K: Decode<'c>, V: Decode<'c>>(&'c mut self) -> CoreResult<(K, V)> {
        self.entry(CursorOp::First, None, None)
    }

    /// Moves to the first entry and returns its key.
    pub fn first_key<'c, K: Decode<'c>>(&'c mut self) -> CoreResult<K> {
        self.key(CursorOp::First, None)
    }

    /// Moves to the last entry.
    pub fn last<'c, K: Decode<'c>, V: Decode<'c>>(&'c mut self) -> CoreResult<(K, V)> {
        self.entry(CursorOp::Last, None, None)
    }

    /// Moves to the last entry and returns its key.
    pub fn last_key<'c, K: Decode<'c>>(&'c mut self) -> CoreResult<K> {
        self.key(CursorOp::Last, None)
    }

    /// Moves to the next entry, including further duplicates of the current
    /// key. An unpositioned cursor moves to the first entry.
    pub fn next<'c, K: Decode<'c>, V: Decode<'c>>(&'c mut self) -> CoreResult<(K, V)> {
        self.entry(CursorOp::Next, None, None)
    }

    /// Moves to the next entry and returns its key.
    pub fn next_key<'c, K: Decode<'c>>(&'c mut self) -> CoreResult<K> {
        self.key(CursorOp::Next, None)
    }

    /// Moves to the previous entry. An unpositioned cursor moves to the last
    /// entry.
    pub fn prev<'c, K: Decode<'c>, V: Decode<'c>>(&'c mut self) -> CoreResult<(K, V)> {
        self.entry(CursorOp::Prev, None, None)
    }

    /// Moves to the previous entry and returns its key.
    pub fn prev_key<'c, K: Decode<'c>>(&'c mut self) -> CoreResult<K> {
        self.key(CursorOp::Prev, None)
    }

    /// Positions at exactly `key` without returning data.
    pub fn seek<Q: Encode + ?Sized>(&mut self, key: &Q) -> CoreResult<()> {
        self.position(CursorOp::Set, Some(key.encode()), None)
            .map(|_| ())
    }

    /// Positions at exactly `key` and returns the entry.
    pub fn find<'c, Q, K, V>(&'c mut self, key: &Q) -> CoreResult<(K, V)>
    where
        Q: Encode + ?Sized,
        K: Decode<'c>,
        V: Decode<'c>,
    {
        self.entry(CursorOp::SetKey, Some(key.encode()), None)
    }

    /// Positions at the first key greater than or equal to `key`.
    pub fn search<'c, Q, K, V>(&'c mut self, key: &Q) -> CoreResult<(K, V)>
    where
        Q: Encode + ?Sized,
        K: Decode<'c>,
        V: Decode<'c>,
    {
        self.entry(CursorOp::SetRange, Some(key.encode()), None)
    }

    /// Returns the entry at the current position.
    ///
    /// Fails with `INVALID_STATE` if the cursor has not been positioned.
    pub fn current<'c, K: Decode<'c>, V: Decode<'c>>(&'c mut self) -> CoreResult<(K, V)> {
        self.entry(CursorOp::GetCurrent, None, None)
    }

    /// Returns the key at the current position.
    pub fn current_key<'c, K: Decode<'c>>(&'c mut self) -> CoreResult<K> {
        self.key(CursorOp::GetCurrent, None)
    }

    /// Moves to the first duplicate of the current key.
    pub fn first_dup<'c, V: Decode<'c>>(&'c mut self) -> CoreResult<V> {
        self.value(CursorOp::FirstDup)
    }

    /// Moves to the last duplicate of the current key.
    pub fn last_dup<'c, V: Decode<'c>>(&'c mut self) -> CoreResult<V> {
        self.value(CursorOp::LastDup)
    }

    /// Moves to the next duplicate of the current key.
    pub fn next_dup<'c, K: Decode<'c>, V: Decode<'c>>(&'c mut self) -> CoreResult<(K, V)> {
        self.entry(CursorOp::NextDup, None, None)
    }

    /// Moves to the previous duplicate of the current key.
    pub fn prev_dup<'c, K: Decode<'c>, V: Decode<'c>>(&'c mut self) -> CoreResult<(K, V)> {
        self.entry(CursorOp::PrevDup, None, None)
    }

    /// Moves to the first value of the next key.
    pub fn next_nodup<'c, K: Decode<'c>, V: Decode<'c>>(&'c mut self) -> CoreResult<(K, V)> {
        self.entry(CursorOp::NextNoDup, None, None)
    }

    /// Moves to the last value of the previous key.
    pub fn prev_nodup<'c, K: Decode<'c>, V: Decode<'c>>(&'c mut self) -> CoreResult<(K, V)> {
        self.entry(CursorOp::PrevNoDup, None, None)
    }

    /// Positions at the exact `key`/`value` pair of a duplicate-sort table.
    pub fn find_pair<Q, P>(&mut self, key: &Q, value: &P) -> CoreResult<()>
    where
        Q: Encode + ?Sized,
        P: Encode + ?Sized,
    {
        self.position(CursorOp::GetBoth, Some(key.encode()), Some(value.encode()))
            .map(|_| ())
    }

    /// Positions at `key` and its first duplicate greater than or equal to
    /// `value`, returning that duplicate.
    pub fn search_pair<'c, Q, P, V>(&'c mut self, key: &Q, value: &P) -> CoreResult<V>
    where
        Q: Encode + ?Sized,
        P: Encode + ?Sized,
        V: Decode<'c>,
    {
        let (_, data) = self.position(
            CursorOp::GetBothRange,
            Some(key.encode()),
            Some(value.encode()),
        )?;
        // SAFETY: see `entry`.
        V::decode(unsafe { ByteView::from_raw(&data) })
    }

    /// Returns the number of duplicates of the current key.
    ///
    /// Only duplicate-sort tables support this; others fail with
    /// `INCOMPATIBLE`. An unpositioned cursor fails with `INVALID_STATE`.
    pub fn count(&self) -> CoreResult<usize> {
        let cursor = self.live()?;
        let mut count = 0;
        // SAFETY: bound cursor and a valid out pointer.
        lmdb_result(unsafe { ffi::mdb_cursor_count(cursor, &mut count) }).map_err(unpositioned)?;
        Ok(count as usize)
    }

    /// Stores `value` under `key` through the cursor and positions on it.
    ///
    /// [`WriteFlags::CURRENT`] replaces the entry at the current position;
    /// the key must then match it.
    pub fn put<K, V>(&mut self, key: &K, value: &V, flags: WriteFlags) -> CoreResult<()>
    where
        K: Encode + ?Sized,
        V: Encode + ?Sized,
    {
        let cursor = self.writer()?;
        let mut key = key.encode().to_raw();
        let mut value = value.encode().to_raw();
        // SAFETY: bound cursor of a write-borrowed transaction.
        lmdb_result(unsafe { ffi::mdb_cursor_put(cursor, &mut key, &mut value, flags.bits()) })
    }

    /// Deletes the entry at the current position.
    pub fn del(&mut self) -> CoreResult<()> {
        self.delete_current(0)
    }

    /// Deletes every duplicate of the current key.
    pub fn del_all_dups(&mut self) -> CoreResult<()> {
        self.delete_current(ffi::MDB_NODUPDATA as c_uint)
    }

    /// Iterates from the first entry in key order.
    ///
    /// The iterator yields owned values since each step moves the cursor.
    pub fn iter<K: DecodeOwned, V: DecodeOwned>(&mut self) -> Iter<'_, 'txn, K, V> {
        Iter::new(self, CursorOp::First, None)
    }

    /// Iterates from the first key greater than or equal to `key`.
    pub fn iter_from<K, V, Q>(&mut self, key: &Q) -> Iter<'_, 'txn, K, V>
    where
        K: DecodeOwned,
        V: DecodeOwned,
        Q: Encode + ?Sized,
    {
        Iter::new(self, CursorOp::SetRange, Some(key.encode().as_bytes().to_vec()))
    }

    /// Returns the raw `MDB_cursor` pointer, or null if unbound.
    #[must_use]
    pub fn as_raw(&self) -> *mut ffi::MDB_cursor {
        self.raw.map_or(ptr::null_mut(), NonNull::as_ptr)
    }

    fn live(&self) -> CoreResult<*mut ffi::MDB_cursor> {
        self.raw.map(NonNull::as_ptr).ok_or(Status::NOT_OPEN)
    }

    fn writer(&self) -> CoreResult<*mut ffi::MDB_cursor> {
        let cursor = self.live()?;
        if self.writable {
            Ok(cursor)
        } else {
            Err(Status::INVALID_STATE)
        }
    }

    fn delete_current(&mut self, flags: c_uint) -> CoreResult<()> {
        let cursor = self.writer()?;
        // SAFETY: bound cursor of a write-borrowed transaction.
        lmdb_result(unsafe { ffi::mdb_cursor_del(cursor, flags) })
    }

    fn position(
        &mut self,
        op: CursorOp,
        key: Option<ByteView<'_>>,
        value: Option<ByteView<'_>>,
    ) -> CoreResult<(ffi::MDB_val, ffi::MDB_val)> {
        let cursor = self.live()?;
        let mut key = key.unwrap_or_else(ByteView::empty).to_raw();
        let mut value = value.unwrap_or_else(ByteView::empty).to_raw();
        // SAFETY: bound cursor; input views outlive the call.
        let result = lmdb_result(unsafe { ffi::mdb_cursor_get(cursor, &mut key, &mut value, op.to_raw()) });
        match op {
            CursorOp::GetCurrent => result.map_err(unpositioned)?,
            _ => result?,
        }
        Ok((key, value))
    }

    fn entry<'c, K: Decode<'c>, V: Decode<'c>>(
        &'c mut self,
        op: CursorOp,
        key: Option<ByteView<'_>>,
        value: Option<ByteView<'_>>,
    ) -> CoreResult<(K, V)> {
        let (key, value) = self.position(op, key, value)?;
        // SAFETY: LMDB memory stays valid until the next write in the
        // transaction. Writes need either this cursor (`&mut self`, held for
        // 'c) or the transaction exclusively, which the cursor borrow blocks.
        unsafe {
            Ok((
                K::decode(ByteView::from_raw(&key))?,
                V::decode(ByteView::from_raw(&value))?,
            ))
        }
    }

    fn key<'c, K: Decode<'c>>(&'c mut self, op: CursorOp, key: Option<ByteView<'_>>) -> CoreResult<K> {
        let (key, _) = self.position(op, key, None)?;
        // SAFETY: see `entry`.
        K::decode(unsafe { ByteView::from_raw(&key) })
    }

    fn value<'c, V: Decode<'c>>(&'c mut self, op: CursorOp) -> CoreResult<V> {
        let (_, value) = self.position(op, None, None)?;
        // SAFETY: see `entry`.
        V::decode(unsafe { ByteView::from_raw(&value) })
    }
}

/// LMDB reports reads at no position as `EINVAL`; for a bound cursor that
/// only means it was never positioned.
fn unpositioned(status: Status) -> Status {
    if status == Status::INVALID_ARGUMENT {
        Status::INVALID_STATE
    } else {
        status
    }
}

impl Default for Cursor<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Cursor<'_> {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Cursor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cursor")
            .field("open", &self.is_open())
            .field("writable", &self.writable)
            .finish()
    }
}

/// Iterator over the entries of a cursor in key order.
///
/// Stops at the end of the table. A failure other than `NOT_FOUND` is
/// yielded once and ends the iteration.
pub struct Iter<'c, 'txn, K, V> {
    cursor: &'c mut Cursor<'txn>,
    op: CursorOp,
    start: Option<Vec<u8>>,
    done: bool,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<'c, 'txn, K, V> Iter<'c, 'txn, K, V> {
    fn new(cursor: &'c mut Cursor<'txn>, op: CursorOp, start: Option<Vec<u8>>) -> Self {
        Self {
            cursor,
            op,
            start,
            done: false,
            _marker: PhantomData,
        }
    }
}

impl<K: DecodeOwned, V: DecodeOwned> Iterator for Iter<'_, '_, K, V> {
    type Item = CoreResult<(K, V)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let start = self.start.take();
        let key = start.as_deref().map(ByteView::new);
        let result = self.cursor.entry::<K, V>(self.op, key, None);
        self.op = CursorOp::Next;
        match result {
            Ok(entry) => Some(Ok(entry)),
            Err(status) if status.is_not_found() => {
                self.done = true;
                None
            }
            Err(status) => {
                self.done = true;
                Some(Err(status))
            }
        }
    }
}
