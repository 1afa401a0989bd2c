//! Status codes for lmkv operations.
//!
//! Every fallible call returns a [`Status`] on failure. A status is a plain
//! integer code: LMDB return codes, errno values, and a small block of
//! wrapper-defined codes for lifecycle violations detected before LMDB is
//! ever reached.

use lmdb_master_sys as ffi;
use std::ffi::CStr;
use std::fmt;
use std::io;
use std::os::raw::c_int;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, Status>;

// Wrapper-defined codes. LMDB reserves -30799..=-30780 and errno values are
// positive, so this block cannot collide with either.
const ALREADY_OPEN: c_int = -30600;
const NOT_OPEN: c_int = -30601;
const NULL_HANDLE: c_int = -30602;
const ALREADY_ACTIVE: c_int = -30603;
const INVALID_TYPE: c_int = -30604;
const INVALID_STATE: c_int = -30605;
const TYPE_MISMATCH: c_int = -30606;

const EINVAL: c_int = 22;

/// Outcome code of an lmkv or LMDB operation.
///
/// Two statuses are equal when their codes are equal. The default status is
/// success.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Error)]
#[error("{}", describe(.0))]
pub struct Status(c_int);

impl Status {
    /// Successful completion.
    pub const SUCCESS: Self = Self(0);
    /// Key or table not found, or a cursor moved past either end.
    pub const NOT_FOUND: Self = Self(ffi::MDB_NOTFOUND as c_int);
    /// Key/data pair already exists.
    pub const KEY_EXIST: Self = Self(ffi::MDB_KEYEXIST as c_int);
    /// The environment map is full.
    pub const MAP_FULL: Self = Self(ffi::MDB_MAP_FULL as c_int);
    /// The maximum number of named tables has been reached.
    pub const DBS_FULL: Self = Self(ffi::MDB_DBS_FULL as c_int);
    /// The reader lock table is full.
    pub const READERS_FULL: Self = Self(ffi::MDB_READERS_FULL as c_int);
    /// Table flags are incompatible with the existing table.
    pub const INCOMPATIBLE: Self = Self(ffi::MDB_INCOMPATIBLE as c_int);
    /// Key or data size is out of range.
    pub const BAD_VALSIZE: Self = Self(ffi::MDB_BAD_VALSIZE as c_int);
    /// Invalid argument (`EINVAL`).
    pub const INVALID_ARGUMENT: Self = Self(EINVAL);

    /// The handle is already open.
    pub const ALREADY_OPEN: Self = Self(ALREADY_OPEN);
    /// The handle is not open.
    pub const NOT_OPEN: Self = Self(NOT_OPEN);
    /// No native transaction is held.
    pub const NULL_HANDLE: Self = Self(NULL_HANDLE);
    /// A transaction has already been started.
    pub const ALREADY_ACTIVE: Self = Self(ALREADY_ACTIVE);
    /// The operation is not valid for this transaction type.
    pub const INVALID_TYPE: Self = Self(INVALID_TYPE);
    /// The operation is not valid in the current lifecycle state.
    pub const INVALID_STATE: Self = Self(INVALID_STATE);
    /// A stored value does not have the size of the requested type.
    pub const TYPE_MISMATCH: Self = Self(TYPE_MISMATCH);

    /// Creates a status from a raw code.
    #[must_use]
    pub const fn new(code: c_int) -> Self {
        Self(code)
    }

    /// Returns the raw code.
    #[must_use]
    pub const fn code(self) -> c_int {
        self.0
    }

    /// Returns true for success.
    #[must_use]
    pub const fn is_ok(self) -> bool {
        self.0 == 0
    }

    /// Returns true for any failure.
    #[must_use]
    pub const fn is_err(self) -> bool {
        self.0 != 0
    }

    /// Returns true for [`Status::NOT_FOUND`].
    #[must_use]
    pub const fn is_not_found(self) -> bool {
        self.0 == Self::NOT_FOUND.0
    }

    /// Returns true for [`Status::KEY_EXIST`].
    #[must_use]
    pub const fn is_key_exist(self) -> bool {
        self.0 == Self::KEY_EXIST.0
    }

    /// Returns true for one of the wrapper-defined lifecycle codes.
    #[must_use]
    pub const fn is_state_violation(self) -> bool {
        matches!(
            self.0,
            ALREADY_OPEN | NOT_OPEN | NULL_HANDLE | ALREADY_ACTIVE | INVALID_TYPE | INVALID_STATE
        )
    }

    /// Returns a human-readable description of the code.
    #[must_use]
    pub fn message(self) -> String {
        describe(&self.0)
    }

    /// Converts the status into a `Result`, `Ok(())` on success.
    pub const fn into_result(self) -> CoreResult<()> {
        if self.is_ok() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Debug for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Status")
            .field("code", &self.0)
            .field("message", &self.message())
            .finish()
    }
}

impl From<io::Error> for Status {
    fn from(err: io::Error) -> Self {
        err.raw_os_error().map_or(Self::INVALID_ARGUMENT, Self)
    }
}

impl From<Status> for io::Error {
    fn from(status: Status) -> Self {
        io::Error::other(status)
    }
}

fn describe(code: &c_int) -> String {
    match *code {
        ALREADY_OPEN => "handle already open".to_string(),
        NOT_OPEN => "handle not open".to_string(),
        NULL_HANDLE => "no active transaction handle".to_string(),
        ALREADY_ACTIVE => "transaction already started".to_string(),
        INVALID_TYPE => "operation invalid for this transaction type".to_string(),
        INVALID_STATE => "operation invalid in the current state".to_string(),
        TYPE_MISMATCH => "stored value size does not match the requested type".to_string(),
        other => {
            // SAFETY: mdb_strerror returns a pointer to a static or
            // thread-local NUL-terminated string (it falls back to strerror).
            let ptr = unsafe { ffi::mdb_strerror(other) };
            if ptr.is_null() {
                format!("unknown error {other}")
            } else {
                unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
            }
        }
    }
}

/// Maps an LMDB return code to a result.
pub(crate) fn lmdb_result(rc: c_int) -> CoreResult<()> {
    Status::new(rc).into_result()
}

/// Extension for treating not-found as an absent value.
pub trait OptionalExt<T> {
    /// Maps `Err(NOT_FOUND)` to `Ok(None)` and `Ok(v)` to `Ok(Some(v))`.
    fn optional(self) -> CoreResult<Option<T>>;
}

impl<T> OptionalExt<T> for CoreResult<T> {
    fn optional(self) -> CoreResult<Option<T>> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(status) if status.is_not_found() => Ok(None),
            Err(status) => Err(status),
        }
    }
}
