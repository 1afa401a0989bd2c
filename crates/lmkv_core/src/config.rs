//! Environment configuration.

use crate::flags::EnvFlags;
use std::path::PathBuf;

/// Default maximum number of named tables.
pub const DEFAULT_MAX_TABLES: u32 = 128;

/// Default maximum number of concurrent readers.
pub const DEFAULT_MAX_READERS: u32 = 512;

/// Default map size (2 GiB).
pub const DEFAULT_MAP_SIZE: usize = 2 * 1024 * 1024 * 1024;

/// Default file mode for created files (`-rw-r--r--`).
pub const DEFAULT_MODE: u32 = 0o644;

/// Configuration for an [`Environment`](crate::Environment).
///
/// All values are applied when the environment is opened and are frozen
/// afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvConfig {
    /// Maximum number of named tables, not counting the unnamed one.
    pub max_tables: u32,

    /// Maximum number of concurrent read transactions.
    pub max_readers: u32,

    /// Size of the memory map in bytes; also the maximum size of the data.
    pub map_size: usize,

    /// Permission bits for the data and lock files.
    pub mode: u32,

    /// Flags passed to the environment on open.
    pub flags: EnvFlags,

    /// Directory (or file, with `NO_SUB_DIR`) of the environment.
    ///
    /// Empty means the current working directory.
    pub path: PathBuf,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            max_tables: DEFAULT_MAX_TABLES,
            max_readers: DEFAULT_MAX_READERS,
            map_size: DEFAULT_MAP_SIZE,
            mode: DEFAULT_MODE,
            flags: EnvFlags::empty(),
            path: PathBuf::new(),
        }
    }
}

impl EnvConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of named tables.
    #[must_use]
    pub fn max_tables(mut self, count: u32) -> Self {
        self.max_tables = count;
        self
    }

    /// Sets the maximum number of concurrent readers.
    #[must_use]
    pub fn max_readers(mut self, count: u32) -> Self {
        self.max_readers = count;
        self
    }

    /// Sets the map size in bytes.
    #[must_use]
    pub fn map_size(mut self, size: usize) -> Self {
        self.map_size = size;
        self
    }

    /// Sets the file mode.
    #[must_use]
    pub fn mode(mut self, mode: u32) -> Self {
        self.mode = mode;
        self
    }

    /// Replaces the environment flags.
    #[must_use]
    pub fn flags(mut self, flags: EnvFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Sets the environment path.
    #[must_use]
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    /// Returns true if the environment lives in a single file.
    #[must_use]
    pub const fn is_single_file(&self) -> bool {
        self.flags.contains(EnvFlags::NO_SUB_DIR)
    }

    /// Returns true if the backing files are deleted on close.
    #[must_use]
    pub const fn is_ephemeral(&self) -> bool {
        self.flags.contains(EnvFlags::EPHEMERAL)
    }
}
