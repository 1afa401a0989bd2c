//! Typed flag sets for environments, tables and writes.
//!
//! Flags combine with `|`, and can be collected from an iterator:
//!
//! ```rust
//! use lmkv_core::{DatabaseFlags, EnvFlags};
//!
//! let env = EnvFlags::NO_SUB_DIR | EnvFlags::NO_SYNC;
//! let db: DatabaseFlags = [DatabaseFlags::CREATE, DatabaseFlags::DUP_SORT]
//!     .into_iter()
//!     .collect();
//! assert!(env.contains(EnvFlags::NO_SYNC));
//! assert!(db.contains(DatabaseFlags::DUP_SORT));
//! ```

use lmdb_master_sys as ffi;
use std::os::raw::c_uint;

bitflags::bitflags! {
    /// Environment flags applied at open time.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EnvFlags: u32 {
        /// Map at a fixed address (experimental in LMDB).
        const FIXED_MAP = ffi::MDB_FIXEDMAP as u32;
        /// Use a single file at the given path instead of a directory.
        const NO_SUB_DIR = ffi::MDB_NOSUBDIR as u32;
        /// Open the environment read-only.
        const READ_ONLY = ffi::MDB_RDONLY as u32;
        /// Use a writeable memory map.
        const WRITE_MAP = ffi::MDB_WRITEMAP as u32;
        /// Skip the metapage flush after commit.
        const NO_META_SYNC = ffi::MDB_NOMETASYNC as u32;
        /// Skip flushing buffers after commit.
        const NO_SYNC = ffi::MDB_NOSYNC as u32;
        /// Flush asynchronously when using a writeable map.
        const MAP_ASYNC = ffi::MDB_MAPASYNC as u32;
        /// Do not tie reader slots to threads.
        const NO_TLS = ffi::MDB_NOTLS as u32;
        /// Disable LMDB's own locking.
        const NO_LOCK = ffi::MDB_NOLOCK as u32;
        /// Turn off OS readahead.
        const NO_READAHEAD = ffi::MDB_NORDAHEAD as u32;
        /// Do not zero malloc'd pages before writing them.
        const NO_MEM_INIT = ffi::MDB_NOMEMINIT as u32;
        /// Delete the backing files when the environment is closed.
        ///
        /// Never passed to LMDB.
        const EPHEMERAL = 0x1000_0000;
    }
}

impl EnvFlags {
    /// Returns the bits LMDB understands, with wrapper-only bits removed.
    #[must_use]
    pub fn native(self) -> c_uint {
        self.difference(Self::EPHEMERAL).bits()
    }
}

bitflags::bitflags! {
    /// Table flags applied when a table is opened.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DatabaseFlags: u32 {
        /// Compare keys from the end towards the beginning.
        const REVERSE_KEY = ffi::MDB_REVERSEKEY as u32;
        /// Allow several sorted values per key.
        const DUP_SORT = ffi::MDB_DUPSORT as u32;
        /// Keys are native unsigned integers of equal size.
        const INTEGER_KEY = ffi::MDB_INTEGERKEY as u32;
        /// Duplicate values all have the same size.
        const DUP_FIXED = ffi::MDB_DUPFIXED as u32;
        /// Duplicate values are native unsigned integers.
        const INTEGER_DUP = ffi::MDB_INTEGERDUP as u32;
        /// Compare duplicate values from the end towards the beginning.
        const REVERSE_DUP = ffi::MDB_REVERSEDUP as u32;
        /// Create the table if it does not exist.
        const CREATE = ffi::MDB_CREATE as u32;
    }
}

bitflags::bitflags! {
    /// Flags for put operations.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct WriteFlags: u32 {
        /// Fail with `KEY_EXIST` instead of overwriting an existing key.
        const NO_OVERWRITE = ffi::MDB_NOOVERWRITE as u32;
        /// Fail with `KEY_EXIST` if the exact key/value pair exists.
        const NO_DUP_DATA = ffi::MDB_NODUPDATA as u32;
        /// Replace the item at the cursor position.
        const CURRENT = ffi::MDB_CURRENT as u32;
        /// Append at the end of the table; keys must be in order.
        const APPEND = ffi::MDB_APPEND as u32;
        /// Append a duplicate value at the end of its key.
        const APPEND_DUP = ffi::MDB_APPENDDUP as u32;
    }
}
