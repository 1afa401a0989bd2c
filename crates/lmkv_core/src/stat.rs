//! Table and environment statistics.

use lmdb_master_sys as ffi;

/// B-tree statistics of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Stat {
    /// Size of a database page in bytes.
    pub page_size: u32,
    /// Depth of the B-tree.
    pub depth: u32,
    /// Number of internal (non-leaf) pages.
    pub branch_pages: u64,
    /// Number of leaf pages.
    pub leaf_pages: u64,
    /// Number of overflow pages.
    pub overflow_pages: u64,
    /// Number of data items.
    pub entries: u64,
}

impl Stat {
    /// Total number of pages used by the table.
    #[must_use]
    pub const fn total_pages(&self) -> u64 {
        self.branch_pages + self.leaf_pages + self.overflow_pages
    }
}

impl From<ffi::MDB_stat> for Stat {
    fn from(raw: ffi::MDB_stat) -> Self {
        Self {
            page_size: raw.ms_psize as u32,
            depth: raw.ms_depth as u32,
            branch_pages: raw.ms_branch_pages as u64,
            leaf_pages: raw.ms_leaf_pages as u64,
            overflow_pages: raw.ms_overflow_pages as u64,
            entries: raw.ms_entries as u64,
        }
    }
}

/// Runtime information about an open environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EnvInfo {
    /// Size of the memory map in bytes.
    pub map_size: u64,
    /// Last used page number.
    pub last_page: u64,
    /// Id of the last committed transaction.
    pub last_txn_id: u64,
    /// Maximum number of reader slots.
    pub max_readers: u32,
    /// Number of reader slots in use.
    pub num_readers: u32,
}

impl From<ffi::MDB_envinfo> for EnvInfo {
    fn from(raw: ffi::MDB_envinfo) -> Self {
        Self {
            map_size: raw.me_mapsize as u64,
            last_page: raw.me_last_pgno as u64,
            last_txn_id: raw.me_last_txnid as u64,
            max_readers: raw.me_maxreaders as u32,
            num_readers: raw.me_numreaders as u32,
        }
    }
}
