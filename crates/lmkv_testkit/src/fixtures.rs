//! Test fixtures and environment helpers.
//!
//! Provides convenience functions for setting up temporary environments
//! and common test scenarios.

use lmkv_core::{EnvConfig, EnvFlags, Environment};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Map size used by test environments (16 MiB).
pub const TEST_MAP_SIZE: usize = 16 * 1024 * 1024;

/// Named tables available in test environments.
pub const TEST_MAX_TABLES: u32 = 16;

/// An open test environment with automatic cleanup.
pub struct TestEnv {
    /// The environment instance.
    pub env: Environment,
    /// The temporary directory (kept alive to prevent cleanup).
    temp_dir: TempDir,
    path: PathBuf,
}

impl TestEnv {
    /// Opens a directory-mode environment in a fresh temporary directory.
    pub fn new() -> Self {
        Self::with_config(|config| config)
    }

    /// Opens a single-file environment inside a fresh temporary directory.
    pub fn single_file() -> Self {
        Self::build(true, |config| config)
    }

    /// Opens a directory-mode environment after adjusting the test defaults.
    pub fn with_config<F>(adjust: F) -> Self
    where
        F: FnOnce(EnvConfig) -> EnvConfig,
    {
        Self::build(false, adjust)
    }

    fn build<F>(single_file: bool, adjust: F) -> Self
    where
        F: FnOnce(EnvConfig) -> EnvConfig,
    {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = if single_file {
            temp_dir.path().join("test.mdb")
        } else {
            temp_dir.path().to_path_buf()
        };

        let mut config = test_config(&path);
        if single_file {
            config = config.flags(EnvFlags::NO_SUB_DIR);
        }
        let env = Environment::open_with(adjust(config)).expect("Failed to open test environment");

        Self {
            env,
            temp_dir,
            path,
        }
    }

    /// Returns the path the environment was opened at.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the temporary directory holding the environment.
    pub fn dir(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Closes and reopens the environment with its current configuration.
    pub fn reopen(&mut self) {
        self.env.close();
        self.env.open().expect("Failed to reopen test environment");
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestEnv {
    type Target = Environment;

    fn deref(&self) -> &Self::Target {
        &self.env
    }
}

impl std::ops::DerefMut for TestEnv {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.env
    }
}

/// Returns the configuration used by [`TestEnv`] for `path`.
pub fn test_config(path: &Path) -> EnvConfig {
    EnvConfig::new()
        .path(path)
        .map_size(TEST_MAP_SIZE)
        .max_tables(TEST_MAX_TABLES)
}

/// Runs a test with a temporary open environment.
///
/// # Example
///
/// ```rust,ignore
/// use lmkv_testkit::with_temp_env;
///
/// #[test]
/// fn my_test() {
///     with_temp_env(|env| {
///         let txn = env.begin_rw_txn().unwrap();
///         // ... test operations
///     });
/// }
/// ```
pub fn with_temp_env<F, R>(f: F) -> R
where
    F: FnOnce(&Environment) -> R,
{
    let test_env = TestEnv::new();
    f(&test_env.env)
}

/// Runs a mutable test with a temporary open environment.
pub fn with_temp_env_mut<F, R>(f: F) -> R
where
    F: FnOnce(&mut Environment) -> R,
{
    let mut test_env = TestEnv::new();
    f(&mut test_env.env)
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;
    use lmkv_core::{Database, DatabaseFlags, WriteFlags};

    /// Returns the key stored at `index` by [`populated_table`].
    pub fn key_at(index: usize) -> String {
        format!("key_{index:06}")
    }

    /// Returns the value stored at `index` by [`populated_table`].
    pub fn value_at(index: usize) -> String {
        format!("value_{index}")
    }

    /// Creates an environment with table `name` holding `count` text entries.
    pub fn populated_table(name: &str, count: usize) -> (TestEnv, Database) {
        let test_env = TestEnv::new();
        let db = test_env
            .write(|txn| {
                let db = Database::open_with(txn, name, DatabaseFlags::CREATE)?;
                for i in 0..count {
                    db.put(txn, &key_at(i), &value_at(i), WriteFlags::empty())?;
                }
                Ok(db)
            })
            .expect("Failed to populate table");
        (test_env, db)
    }

    /// Creates an environment with a duplicate-sort table where each key in
    /// `keys` holds `dups` values.
    pub fn duplicate_table(name: &str, keys: &[&str], dups: usize) -> (TestEnv, Database) {
        let test_env = TestEnv::new();
        let db = test_env
            .write(|txn| {
                let db = Database::open_with(
                    txn,
                    name,
                    DatabaseFlags::CREATE | DatabaseFlags::DUP_SORT,
                )?;
                for key in keys {
                    for i in 0..dups {
                        db.put(txn, *key, &value_at(i), WriteFlags::empty())?;
                    }
                }
                Ok(db)
            })
            .expect("Failed to populate duplicate table");
        (test_env, db)
    }
}
