//! Transactions.
//!
//! A [`Transaction`] borrows its [`Environment`] and owns at most one native
//! `MDB_txn` at a time. It starts inactive and moves through the states
//! below. Read-write transactions only use the first row.
//!
//! ```text
//! Inactive --begin--> Active --commit|abort--> Inactive
//!                     Active --reset--> Reset --renew--> Active   (read-only)
//!                                       Reset --abort--> Inactive (read-only)
//! ```
//!
//! Tables first opened by a transaction only outlive it if it commits. On
//! abort or reset LMDB closes their slots, and every [`Database`] handle
//! opened on them turns stale.
//!
//! [`Database`]: crate::Database

use crate::env::Environment;
use crate::error::{lmdb_result, CoreResult, Status};
use lmdb_master_sys as ffi;
use std::os::raw::c_uint;
use std::ptr::{self, NonNull};
use tracing::{debug, trace, warn};

/// Kind of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionKind {
    /// Snapshot reads; may run concurrently with other transactions.
    ReadOnly,
    /// Reads and writes; at most one per environment.
    ReadWrite,
}

/// Lifecycle state of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionState {
    /// No native transaction is held.
    Inactive,
    /// Begun and not yet committed or aborted.
    Active,
    /// Read-only transaction whose snapshot was released by `reset`.
    Reset,
}

/// A transaction against one [`Environment`].
///
/// Reads borrow the transaction shared; writes borrow it exclusively, so
/// values borrowed from a read cannot be held across a write or commit.
/// Dropping a transaction that still holds a native handle aborts it.
pub struct Transaction<'env> {
    env: &'env Environment,
    raw: Option<NonNull<ffi::MDB_txn>>,
    kind: TransactionKind,
    state: TransactionState,
    /// Table slots first opened by this transaction.
    opened: Vec<ffi::MDB_dbi>,
}

impl<'env> Transaction<'env> {
    /// Creates an inactive transaction of the given kind.
    #[must_use]
    pub const fn new(env: &'env Environment, kind: TransactionKind) -> Self {
        Self {
            env,
            raw: None,
            kind,
            state: TransactionState::Inactive,
            opened: Vec::new(),
        }
    }

    /// Creates an inactive read-only transaction.
    #[must_use]
    pub const fn read_only(env: &'env Environment) -> Self {
        Self::new(env, TransactionKind::ReadOnly)
    }

    /// Creates an inactive read-write transaction.
    #[must_use]
    pub const fn read_write(env: &'env Environment) -> Self {
        Self::new(env, TransactionKind::ReadWrite)
    }

    /// Begins the transaction.
    ///
    /// Fails with `INVALID_STATE` if the environment is not open and with
    /// `ALREADY_ACTIVE` if this transaction already holds a native handle or,
    /// for read-write, if another read-write transaction is pending on the
    /// same environment.
    pub fn begin(&mut self) -> CoreResult<()> {
        let env = self.env.live().map_err(|_| Status::INVALID_STATE)?;
        if self.raw.is_some() {
            return Err(Status::ALREADY_ACTIVE);
        }

        let flags: c_uint = match self.kind {
            TransactionKind::ReadOnly => ffi::MDB_RDONLY as c_uint,
            TransactionKind::ReadWrite => {
                if !self.env.acquire_writer() {
                    return Err(Status::ALREADY_ACTIVE);
                }
                0
            }
        };

        let mut raw: *mut ffi::MDB_txn = ptr::null_mut();
        // SAFETY: `env` is open and `raw` is a valid out pointer.
        let result = lmdb_result(unsafe { ffi::mdb_txn_begin(env, ptr::null_mut(), flags, &mut raw) })
            .and_then(|()| NonNull::new(raw).ok_or(Status::NULL_HANDLE));

        match result {
            Ok(raw) => {
                self.raw = Some(raw);
                self.state = TransactionState::Active;
                debug!(kind = ?self.kind, "transaction started");
                Ok(())
            }
            Err(status) => {
                self.release_writer();
                Err(status)
            }
        }
    }

    /// Commits the transaction.
    ///
    /// Fails with `NULL_HANDLE` if not pending. The native handle is released
    /// whether or not LMDB reports success; a failed commit cannot be retried.
    pub fn commit(&mut self) -> CoreResult<()> {
        if self.state != TransactionState::Active {
            return Err(Status::NULL_HANDLE);
        }
        let raw = self.raw.take().ok_or(Status::NULL_HANDLE)?;
        self.state = TransactionState::Inactive;

        // SAFETY: `raw` is an active transaction; LMDB frees it in every case.
        let result = lmdb_result(unsafe { ffi::mdb_txn_commit(raw.as_ptr()) });
        self.release_writer();

        match result {
            Ok(()) => {
                self.opened.clear();
                debug!(kind = ?self.kind, "transaction committed");
            }
            Err(status) => {
                self.release_tables();
                warn!(code = status.code(), "transaction commit failed: {status}");
            }
        }
        result
    }

    /// Aborts the transaction, discarding its writes.
    ///
    /// Fails with `NULL_HANDLE` if no native handle is held. A reset
    /// read-only transaction can be aborted to release it.
    pub fn abort(&mut self) -> CoreResult<()> {
        let raw = self.raw.take().ok_or(Status::NULL_HANDLE)?;
        self.state = TransactionState::Inactive;
        // SAFETY: `raw` is a live (active or reset) transaction.
        unsafe { ffi::mdb_txn_abort(raw.as_ptr()) };
        self.release_writer();
        self.release_tables();
        debug!(kind = ?self.kind, "transaction aborted");
        Ok(())
    }

    /// Releases the snapshot of a read-only transaction, keeping the handle
    /// for a later [`renew`](Self::renew).
    pub fn reset(&mut self) -> CoreResult<()> {
        if self.kind != TransactionKind::ReadOnly {
            return Err(Status::INVALID_TYPE);
        }
        let raw = match (self.state, self.raw) {
            (TransactionState::Active, Some(raw)) => raw,
            _ => return Err(Status::INVALID_STATE),
        };
        // SAFETY: `raw` is an active read-only transaction.
        unsafe { ffi::mdb_txn_reset(raw.as_ptr()) };
        self.state = TransactionState::Reset;
        self.release_tables();
        trace!("transaction reset");
        Ok(())
    }

    /// Acquires a fresh snapshot for a reset read-only transaction.
    pub fn renew(&mut self) -> CoreResult<()> {
        if self.kind != TransactionKind::ReadOnly {
            return Err(Status::INVALID_TYPE);
        }
        let raw = match (self.state, self.raw) {
            (TransactionState::Reset, Some(raw)) => raw,
            _ => return Err(Status::INVALID_STATE),
        };
        // SAFETY: `raw` is a reset read-only transaction.
        lmdb_result(unsafe { ffi::mdb_txn_renew(raw.as_ptr()) })?;
        self.state = TransactionState::Active;
        trace!("transaction renewed");
        Ok(())
    }

    /// Returns true if the transaction is active and uncommitted.
    #[must_use]
    pub fn pending(&self) -> bool {
        self.state == TransactionState::Active
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub const fn state(&self) -> TransactionState {
        self.state
    }

    /// Returns the transaction kind.
    #[must_use]
    pub const fn kind(&self) -> TransactionKind {
        self.kind
    }

    /// Returns true for read-only transactions.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.kind == TransactionKind::ReadOnly
    }

    /// Returns LMDB's id for the active transaction.
    #[must_use]
    pub fn id(&self) -> Option<u64> {
        let raw = self.live().ok()?;
        // SAFETY: active transaction.
        Some(unsafe { ffi::mdb_txn_id(raw) } as u64)
    }

    /// Returns the environment this transaction belongs to.
    #[must_use]
    pub const fn env(&self) -> &'env Environment {
        self.env
    }

    /// Returns the raw `MDB_txn` pointer, or null if none is held.
    #[must_use]
    pub fn as_raw(&self) -> *mut ffi::MDB_txn {
        self.raw.map_or(ptr::null_mut(), NonNull::as_ptr)
    }

    /// Returns the active native handle or `INVALID_STATE`.
    pub(crate) fn live(&self) -> CoreResult<*mut ffi::MDB_txn> {
        match self.raw {
            Some(raw) if self.state == TransactionState::Active => Ok(raw.as_ptr()),
            _ => Err(Status::INVALID_STATE),
        }
    }

    /// Records a table slot this transaction opened for the first time.
    pub(crate) fn track_new_table(&mut self, dbi: ffi::MDB_dbi) {
        self.opened.push(dbi);
    }

    fn release_writer(&self) {
        if self.kind == TransactionKind::ReadWrite {
            self.env.release_writer();
        }
    }

    fn release_tables(&mut self) {
        let opened = std::mem::take(&mut self.opened);
        self.env.release_tables(&opened);
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if let Some(raw) = self.raw.take() {
            // SAFETY: the handle is live and owned by this transaction.
            unsafe { ffi::mdb_txn_abort(raw.as_ptr()) };
            self.release_writer();
            self.release_tables();
            trace!(kind = ?self.kind, "pending transaction aborted on drop");
        }
    }
}

impl std::fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("kind", &self.kind)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
