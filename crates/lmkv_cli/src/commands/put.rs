//! Put command - store a record, creating the environment and table if needed.

use super::Target;
use crate::error::CliResult;
use lmkv_core::{Database, DatabaseFlags, WriteFlags};
use tracing::info;

/// How to store the record.
#[derive(Debug, Default, Clone, Copy)]
pub struct PutOptions {
    /// Keep the existing value instead of overwriting it.
    pub no_overwrite: bool,
    /// Create the table with sorted duplicates.
    pub dup_sort: bool,
}

/// Stores `value` under `key` in `table`.
pub fn run(target: &Target, table: &str, key: &[u8], value: &[u8], options: PutOptions) -> CliResult<()> {
    let env = target.open_or_create()?;

    let mut table_flags = DatabaseFlags::CREATE;
    if options.dup_sort {
        table_flags |= DatabaseFlags::DUP_SORT;
    }
    let mut write_flags = WriteFlags::empty();
    if options.no_overwrite {
        write_flags |= WriteFlags::NO_OVERWRITE;
    }

    env.write(|txn| {
        let db = Database::open_with(txn, table, table_flags)?;
        db.put(txn, key, value, write_flags)
    })?;

    info!(table, key_len = key.len(), value_len = value.len(), "record stored");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CliError;
    use lmkv_core::Status;
    use tempfile::TempDir;

    #[test]
    fn creates_environment_and_table() {
        let dir = TempDir::new().unwrap();
        let target = Target::new(dir.path().join("fresh"), false);

        run(&target, "t", b"k", b"v", PutOptions::default()).unwrap();

        let env = target.open_read().unwrap();
        let mut txn = env.begin_ro_txn().unwrap();
        let db = Database::open_with(&mut txn, "t", DatabaseFlags::empty()).unwrap();
        let value: &str = db.get(&txn, "k").unwrap();
        assert_eq!(value, "v");
    }

    #[test]
    fn no_overwrite_keeps_existing() {
        let dir = TempDir::new().unwrap();
        let target = Target::new(dir.path().join("env"), false);
        let guarded = PutOptions {
            no_overwrite: true,
            ..Default::default()
        };

        run(&target, "t", b"k", b"first", guarded).unwrap();
        let err = run(&target, "t", b"k", b"second", guarded).unwrap_err();
        assert!(matches!(err, CliError::Status(Status::KEY_EXIST)));
    }

    #[test]
    fn duplicate_values_accumulate() {
        let dir = TempDir::new().unwrap();
        let target = Target::new(dir.path().join("env"), false);
        let dups = PutOptions {
            dup_sort: true,
            ..Default::default()
        };

        run(&target, "tags", b"k", b"b", dups).unwrap();
        run(&target, "tags", b"k", b"a", dups).unwrap();

        let env = target.open_read().unwrap();
        let mut txn = env.begin_ro_txn().unwrap();
        let db = Database::open_with(&mut txn, "tags", DatabaseFlags::empty()).unwrap();
        assert!(db.is_dup_sort());
        assert_eq!(db.entries(&txn).unwrap(), 2);
    }
}
