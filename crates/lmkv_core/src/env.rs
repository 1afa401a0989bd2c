//! LMDB environment lifecycle.
//!
//! An [`Environment`] owns one `MDB_env` handle. The handle is allocated when
//! the environment is constructed, mapped by [`Environment::open`] and
//! released by [`Environment::close`] or on drop.
//!
//! ## File layout
//!
//! ```text
//! <path>/
//! ├── data.mdb     # Data file
//! └── lock.mdb     # Reader lock table
//! ```
//!
//! With [`EnvFlags::NO_SUB_DIR`] the path names the data file itself and the
//! lock table lives next to it as `<path>-lock`.

use crate::config::EnvConfig;
use crate::error::{lmdb_result, CoreResult, Status};
use crate::flags::EnvFlags;
use crate::stat::{EnvInfo, Stat};
use crate::transaction::{Transaction, TransactionKind};
use lmdb_master_sys as ffi;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::ffi::CString;
use std::fs;
use std::io;
use std::mem::MaybeUninit;
use std::os::raw::{c_int, c_uint};
use std::path::{Path, PathBuf};
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, Ordering};
use tracing::{debug, trace, warn};

/// Data file name inside an environment directory.
pub const DATA_FILE_NAME: &str = "data.mdb";

/// Lock file name inside an environment directory.
pub const LOCK_FILE_NAME: &str = "lock.mdb";

/// File name used in single-file mode when no path is configured.
pub const DEFAULT_FILE_NAME: &str = "lmdb.mdb";

/// Suffix of the lock file in single-file mode.
pub const LOCK_FILE_SUFFIX: &str = "-lock";

/// An LMDB environment.
///
/// Capacity limits, mode, flags and path can only change while the
/// environment is closed. The environment can be shared by reference across
/// threads; each thread runs its own [`Transaction`]s.
///
/// # Example
///
/// ```rust,no_run
/// use lmkv_core::{DatabaseFlags, Environment, EnvConfig, WriteFlags};
///
/// let mut env = Environment::with_config(EnvConfig::new().path("/tmp/lmkv"))?;
/// env.open()?;
///
/// env.write(|txn| {
///     let db = lmkv_core::Database::open_with(txn, "t", DatabaseFlags::CREATE)?;
///     db.put(txn, "first", "first record", WriteFlags::empty())
/// })?;
/// # Ok::<(), lmkv_core::Status>(())
/// ```
pub struct Environment {
    raw: Option<NonNull<ffi::MDB_env>>,
    config: EnvConfig,
    /// Resolved path; empty until the first successful open.
    path: PathBuf,
    open: bool,
    last_status: AtomicI32,
    writer_active: AtomicBool,
    /// Live table slots and the epoch each was opened under.
    tables: Mutex<HashMap<ffi::MDB_dbi, u64>>,
    next_epoch: AtomicU64,
}

// SAFETY: an MDB_env may be used from any thread. Transactions, which carry
// thread affinity, are not Send.
unsafe impl Send for Environment {}
unsafe impl Sync for Environment {}

impl Environment {
    /// Creates an unopened environment with default configuration.
    pub fn new() -> CoreResult<Self> {
        Self::with_config(EnvConfig::default())
    }

    /// Creates an unopened environment with the given configuration.
    pub fn with_config(config: EnvConfig) -> CoreResult<Self> {
        Ok(Self {
            raw: Some(create_handle()?),
            config,
            path: PathBuf::new(),
            open: false,
            last_status: AtomicI32::new(0),
            writer_active: AtomicBool::new(false),
            tables: Mutex::default(),
            next_epoch: AtomicU64::new(1),
        })
    }

    /// Creates an environment from `config` and opens it.
    pub fn open_with(config: EnvConfig) -> CoreResult<Self> {
        let mut env = Self::with_config(config)?;
        env.open()?;
        Ok(env)
    }

    /// Opens the environment at the configured path.
    ///
    /// Without a configured path the current working directory is used, with
    /// [`DEFAULT_FILE_NAME`] appended in single-file mode. If LMDB refuses to
    /// open, the native handle is replaced by a fresh one so the call can be
    /// retried after fixing the cause.
    pub fn open(&mut self) -> CoreResult<()> {
        let result = self.open_inner();
        self.track(result)
    }

    /// Sets the path and opens the environment.
    ///
    /// Fails with `ALREADY_OPEN` without touching the path if already open.
    pub fn open_at(&mut self, path: impl AsRef<Path>) -> CoreResult<()> {
        if self.open {
            return self.track(Err(Status::ALREADY_OPEN));
        }
        self.config.path = path.as_ref().to_path_buf();
        self.open()
    }

    fn open_inner(&mut self) -> CoreResult<()> {
        if self.open {
            return Err(Status::ALREADY_OPEN);
        }

        let path = self.resolve_path()?;
        let c_path = path_to_cstring(&path)?;
        let raw = match self.raw {
            Some(raw) => raw,
            None => {
                let raw = create_handle()?;
                self.raw = Some(raw);
                raw
            }
        };

        // SAFETY: `raw` is a live handle created by mdb_env_create that has
        // not been opened yet.
        let result = unsafe {
            let env = raw.as_ptr();
            lmdb_result(ffi::mdb_env_set_maxdbs(env, self.config.max_tables))
                .and_then(|()| lmdb_result(ffi::mdb_env_set_maxreaders(env, self.config.max_readers)))
                .and_then(|()| lmdb_result(ffi::mdb_env_set_mapsize(env, self.config.map_size)))
                .and_then(|()| {
                    lmdb_result(ffi::mdb_env_open(
                        env,
                        c_path.as_ptr(),
                        self.config.flags.native(),
                        self.config.mode as ffi::mdb_mode_t,
                    ))
                })
        };

        if let Err(status) = result {
            warn!(
                path = %path.display(),
                code = status.code(),
                "failed to open environment: {status}"
            );
            self.recreate_handle();
            return Err(status);
        }

        self.path = path;
        self.open = true;
        debug!(
            path = %self.path.display(),
            flags = ?self.config.flags,
            map_size = self.config.map_size,
            "environment opened"
        );
        Ok(())
    }

    fn resolve_path(&self) -> CoreResult<PathBuf> {
        if !self.config.path.as_os_str().is_empty() {
            return Ok(self.config.path.clone());
        }
        let cwd = std::env::current_dir()?;
        if self.config.is_single_file() {
            Ok(cwd.join(DEFAULT_FILE_NAME))
        } else {
            Ok(cwd)
        }
    }

    fn recreate_handle(&mut self) {
        if let Some(raw) = self.raw.take() {
            // SAFETY: the handle is owned by this environment and no
            // transaction can borrow it while we hold `&mut self`.
            unsafe { ffi::mdb_env_close(raw.as_ptr()) };
        }
        match create_handle() {
            Ok(raw) => self.raw = Some(raw),
            Err(status) => warn!(code = status.code(), "failed to recreate environment handle"),
        }
    }

    /// Closes the environment.
    ///
    /// Releases the native handle. If [`EnvFlags::EPHEMERAL`] is set, the
    /// backing files are deleted afterwards on a best-effort basis. Calling
    /// `close` again is a no-op.
    pub fn close(&mut self) {
        if let Some(raw) = self.raw.take() {
            // SAFETY: as in `recreate_handle`.
            unsafe { ffi::mdb_env_close(raw.as_ptr()) };
        }
        self.tables.get_mut().clear();
        let was_open = std::mem::replace(&mut self.open, false);
        if !was_open {
            return;
        }
        debug!(path = %self.path.display(), "environment closed");

        if self.config.is_ephemeral() && !self.remove() {
            warn!(path = %self.path.display(), "failed to remove ephemeral environment files");
        }
    }

    /// Flushes buffers to disk.
    ///
    /// With `force` false, the flush is skipped unless the environment was
    /// opened with `NO_SYNC` or `NO_META_SYNC`, mirroring `mdb_env_sync`.
    pub fn flush(&self, force: bool) -> CoreResult<()> {
        let result = self.live().and_then(|env| {
            // SAFETY: `env` is an open handle.
            lmdb_result(unsafe { ffi::mdb_env_sync(env, c_int::from(force)) })
        });
        self.track(result)
    }

    /// Clears reader slots left behind by dead processes.
    ///
    /// Returns the number of slots cleared. Best called from a single
    /// process at a time; concurrent callers may observe partial results.
    pub fn check_stale_readers(&self) -> CoreResult<u32> {
        let result = self.live().and_then(|env| {
            let mut dead: c_int = 0;
            // SAFETY: `env` is an open handle and `dead` is a valid out pointer.
            lmdb_result(unsafe { ffi::mdb_reader_check(env, &mut dead) })?;
            Ok(u32::try_from(dead).unwrap_or(0))
        });
        self.track(result)
    }

    /// Returns true if the backing files are present.
    ///
    /// In directory mode both `data.mdb` and `lock.mdb` must exist.
    /// Filesystem errors yield `false`, as does an environment that has
    /// neither been opened nor been given a path.
    #[must_use]
    pub fn exists(&self) -> bool {
        let Ok(path) = self.backing_path() else {
            return false;
        };
        if self.config.is_single_file() {
            path.is_file()
        } else {
            path.is_dir() && path.join(DATA_FILE_NAME).is_file() && path.join(LOCK_FILE_NAME).is_file()
        }
    }

    /// Deletes the backing files of a closed environment.
    ///
    /// Returns true if the files were removed. Returns false while open, if
    /// the files do not exist, or on any filesystem error.
    pub fn remove(&self) -> bool {
        if self.open || !self.exists() {
            return false;
        }
        let Ok(path) = self.backing_path() else {
            return false;
        };

        let result = if self.config.is_single_file() {
            fs::remove_file(&path).and_then(|()| remove_if_present(&lock_sidecar(&path)))
        } else {
            fs::remove_file(path.join(DATA_FILE_NAME))
                .and_then(|()| fs::remove_file(path.join(LOCK_FILE_NAME)))
        };

        match result {
            Ok(()) => {
                debug!(path = %path.display(), "environment files removed");
                true
            }
            Err(err) => {
                debug!(path = %path.display(), error = %err, "failed to remove environment files");
                false
            }
        }
    }

    /// Path the backing files live at, once known.
    ///
    /// Never falls back to the working directory: that default is only
    /// picked by `open`.
    fn backing_path(&self) -> CoreResult<PathBuf> {
        if !self.path.as_os_str().is_empty() {
            Ok(self.path.clone())
        } else if !self.config.path.as_os_str().is_empty() {
            self.resolve_path()
        } else {
            Err(Status::INVALID_STATE)
        }
    }

    /// Grows (or shrinks) the memory map.
    ///
    /// On an open environment the new size is applied immediately; LMDB
    /// requires that no transaction of this process is active, which holding
    /// `&mut self` guarantees. On a closed environment the size is stored
    /// for the next open.
    pub fn grow_map_size(&mut self, size: usize) -> CoreResult<()> {
        if self.open {
            let result = self.live().and_then(|env| {
                // SAFETY: open handle, no live transactions (exclusive borrow).
                lmdb_result(unsafe { ffi::mdb_env_set_mapsize(env, size) })
            });
            self.track(result)?;
            debug!(map_size = size, "environment map resized");
        }
        self.config.map_size = size;
        Ok(())
    }

    /// Returns statistics of the unnamed main table.
    pub fn stat(&self) -> CoreResult<Stat> {
        let env = self.live()?;
        let mut raw = MaybeUninit::<ffi::MDB_stat>::uninit();
        // SAFETY: open handle; on success LMDB fully initializes `raw`.
        unsafe {
            lmdb_result(ffi::mdb_env_stat(env, raw.as_mut_ptr()))?;
            Ok(Stat::from(raw.assume_init()))
        }
    }

    /// Returns runtime information about the environment.
    pub fn info(&self) -> CoreResult<EnvInfo> {
        let env = self.live()?;
        let mut raw = MaybeUninit::<ffi::MDB_envinfo>::uninit();
        // SAFETY: open handle; on success LMDB fully initializes `raw`.
        unsafe {
            lmdb_result(ffi::mdb_env_info(env, raw.as_mut_ptr()))?;
            Ok(EnvInfo::from(raw.assume_init()))
        }
    }

    /// Copies the environment to `path` while it stays in use.
    ///
    /// `path` must be an existing empty directory, or a file path when the
    /// environment is in single-file mode. With `compact`, free pages are
    /// omitted and pages are renumbered.
    pub fn copy_to(&self, path: impl AsRef<Path>, compact: bool) -> CoreResult<()> {
        let path = path.as_ref();
        let result = self.live().and_then(|env| {
            let c_path = path_to_cstring(path)?;
            let flags: c_uint = if compact {
                ffi::MDB_CP_COMPACT as c_uint
            } else {
                0
            };
            // SAFETY: open handle and a NUL-terminated path.
            lmdb_result(unsafe { ffi::mdb_env_copy2(env, c_path.as_ptr(), flags) })
        });
        if result.is_ok() {
            debug!(target_path = %path.display(), compact, "environment copied");
        }
        self.track(result)
    }

    /// Begins a read-only transaction.
    pub fn begin_ro_txn(&self) -> CoreResult<Transaction<'_>> {
        let mut txn = Transaction::new(self, TransactionKind::ReadOnly);
        txn.begin()?;
        Ok(txn)
    }

    /// Begins a read-write transaction.
    pub fn begin_rw_txn(&self) -> CoreResult<Transaction<'_>> {
        let mut txn = Transaction::new(self, TransactionKind::ReadWrite);
        txn.begin()?;
        Ok(txn)
    }

    /// Runs `f` inside a read-only transaction.
    ///
    /// Ends the transaction with a commit if `f` returns `Ok`, so tables
    /// opened inside `f` stay usable afterwards; aborts if `f` fails.
    pub fn read<F, T>(&self, f: F) -> CoreResult<T>
    where
        F: FnOnce(&mut Transaction<'_>) -> CoreResult<T>,
    {
        let mut txn = self.begin_ro_txn()?;
        let value = f(&mut txn)?;
        if txn.pending() {
            txn.commit()?;
        }
        Ok(value)
    }

    /// Runs `f` inside a read-write transaction.
    ///
    /// Commits if `f` returns `Ok` and the transaction is still pending;
    /// aborts if `f` returns an error.
    pub fn write<F, T>(&self, f: F) -> CoreResult<T>
    where
        F: FnOnce(&mut Transaction<'_>) -> CoreResult<T>,
    {
        let mut txn = self.begin_rw_txn()?;
        let value = f(&mut txn)?;
        if txn.pending() {
            txn.commit()?;
        }
        Ok(value)
    }

    /// Sets the maximum number of named tables.
    pub fn set_max_tables(&mut self, count: u32) -> CoreResult<()> {
        self.ensure_closed()?;
        self.config.max_tables = count;
        Ok(())
    }

    /// Sets the maximum number of concurrent readers.
    pub fn set_max_readers(&mut self, count: u32) -> CoreResult<()> {
        self.ensure_closed()?;
        self.config.max_readers = count;
        Ok(())
    }

    /// Sets the map size used at the next open.
    ///
    /// See [`Environment::grow_map_size`] for resizing an open environment.
    pub fn set_map_size(&mut self, size: usize) -> CoreResult<()> {
        self.ensure_closed()?;
        self.config.map_size = size;
        Ok(())
    }

    /// Sets the file mode used when creating the backing files.
    pub fn set_mode(&mut self, mode: u32) -> CoreResult<()> {
        self.ensure_closed()?;
        self.config.mode = mode;
        Ok(())
    }

    /// Replaces the environment flags.
    pub fn set_flags(&mut self, flags: EnvFlags) -> CoreResult<()> {
        self.ensure_closed()?;
        self.config.flags = flags;
        Ok(())
    }

    /// Sets the path used at the next open.
    pub fn set_path(&mut self, path: impl Into<PathBuf>) -> CoreResult<()> {
        self.ensure_closed()?;
        self.config.path = path.into();
        Ok(())
    }

    fn ensure_closed(&self) -> CoreResult<()> {
        let result = if self.open {
            Err(Status::INVALID_STATE)
        } else {
            Ok(())
        };
        self.track(result)
    }

    /// Returns true if the environment is open.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.open
    }

    /// Returns the resolved path, empty before the first open.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &EnvConfig {
        &self.config
    }

    /// Returns the maximum number of named tables.
    #[must_use]
    pub const fn max_tables(&self) -> u32 {
        self.config.max_tables
    }

    /// Returns the maximum number of readers.
    #[must_use]
    pub const fn max_readers(&self) -> u32 {
        self.config.max_readers
    }

    /// Returns the configured map size.
    #[must_use]
    pub const fn map_size(&self) -> usize {
        self.config.map_size
    }

    /// Returns the file mode.
    #[must_use]
    pub const fn mode(&self) -> u32 {
        self.config.mode
    }

    /// Returns the environment flags.
    #[must_use]
    pub const fn flags(&self) -> EnvFlags {
        self.config.flags
    }

    /// Returns the maximum key size, once open.
    #[must_use]
    pub fn max_key_size(&self) -> Option<usize> {
        let env = self.live().ok()?;
        // SAFETY: open handle.
        let size = unsafe { ffi::mdb_env_get_maxkeysize(env) };
        usize::try_from(size).ok()
    }

    /// Returns the status of the last tracked environment operation.
    #[must_use]
    pub fn last_status(&self) -> Status {
        Status::new(self.last_status.load(Ordering::Relaxed))
    }

    /// Returns the raw `MDB_env` pointer, or null if no handle exists.
    #[must_use]
    pub fn as_raw(&self) -> *mut ffi::MDB_env {
        self.raw.map_or(ptr::null_mut(), NonNull::as_ptr)
    }

    /// Returns the open native handle or `NOT_OPEN`.
    pub(crate) fn live(&self) -> CoreResult<*mut ffi::MDB_env> {
        match self.raw {
            Some(raw) if self.open => Ok(raw.as_ptr()),
            _ => Err(Status::NOT_OPEN),
        }
    }

    /// Claims the single writer slot. Returns false if a writer is pending.
    pub(crate) fn acquire_writer(&self) -> bool {
        self.writer_active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn release_writer(&self) {
        self.writer_active.store(false, Ordering::Release);
    }

    /// Registers an opened table slot and returns its epoch.
    ///
    /// The flag is true if the slot was not live yet. LMDB closes such a
    /// slot again unless the transaction that opened it commits.
    pub(crate) fn claim_table(&self, dbi: ffi::MDB_dbi) -> (u64, bool) {
        let mut tables = self.tables.lock();
        if let Some(&epoch) = tables.get(&dbi) {
            return (epoch, false);
        }
        let epoch = self.next_epoch.fetch_add(1, Ordering::Relaxed);
        tables.insert(dbi, epoch);
        (epoch, true)
    }

    /// Returns true if `dbi` is still the slot that was opened under `epoch`.
    pub(crate) fn table_is_live(&self, dbi: ffi::MDB_dbi, epoch: u64) -> bool {
        let tables = self.tables.lock();
        tables.get(&dbi) == Some(&epoch)
    }

    /// Forgets slots LMDB has closed; handles on them turn stale.
    pub(crate) fn release_tables(&self, dbis: &[ffi::MDB_dbi]) {
        if dbis.is_empty() {
            return;
        }
        let mut tables = self.tables.lock();
        for dbi in dbis {
            tables.remove(dbi);
        }
        trace!(?dbis, "table slots released");
    }

    fn track<T>(&self, result: CoreResult<T>) -> CoreResult<T> {
        let code = result.as_ref().err().map_or(0, |status| status.code());
        self.last_status.store(code, Ordering::Relaxed);
        result
    }
}

impl Drop for Environment {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("path", &self.path)
            .field("open", &self.open)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn create_handle() -> CoreResult<NonNull<ffi::MDB_env>> {
    let mut raw: *mut ffi::MDB_env = ptr::null_mut();
    // SAFETY: `raw` is a valid out pointer.
    lmdb_result(unsafe { ffi::mdb_env_create(&mut raw) })?;
    NonNull::new(raw).ok_or(Status::NULL_HANDLE)
}

#[cfg(unix)]
fn path_to_cstring(path: &Path) -> CoreResult<CString> {
    use std::os::unix::ffi::OsStrExt;
    CString::new(path.as_os_str().as_bytes()).map_err(|_| Status::INVALID_ARGUMENT)
}

#[cfg(not(unix))]
fn path_to_cstring(path: &Path) -> CoreResult<CString> {
    let text = path.to_str().ok_or(Status::INVALID_ARGUMENT)?;
    CString::new(text).map_err(|_| Status::INVALID_ARGUMENT)
}

fn lock_sidecar(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(LOCK_FILE_SUFFIX);
    PathBuf::from(name)
}

fn remove_if_present(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
