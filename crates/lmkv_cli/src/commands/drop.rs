//! Drop command - empty or delete a table.

use super::{open_table, Target};
use crate::error::CliResult;
use lmkv_core::DatabaseFlags;
use tracing::info;

/// Empties `table`, and deletes it from the environment unless `keep` is set.
///
/// Returns the number of records that were removed.
pub fn run(target: &Target, table: &str, keep: bool) -> CliResult<u64> {
    let env = target.open_write()?;
    let mut txn = env.begin_rw_txn()?;
    let mut db = open_table(&mut txn, table, DatabaseFlags::empty())?;
    let removed = db.entries(&txn)?;

    if keep {
        db.erase(&mut txn)?;
    } else {
        db.drop_table(&mut txn)?;
    }
    txn.commit()?;

    info!(table, removed, keep, "table cleared");
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CliError;
    use lmkv_core::{Database, WriteFlags};
    use tempfile::TempDir;

    fn seeded(dir: &TempDir) -> Target {
        let target = Target::new(dir.path().join("env"), false);
        let env = target.open_or_create().unwrap();
        env.write(|txn| {
            let db = Database::open_with(txn, "t", DatabaseFlags::CREATE)?;
            db.put(txn, "a", "1", WriteFlags::empty())?;
            db.put(txn, "b", "2", WriteFlags::empty())
        })
        .unwrap();
        target
    }

    #[test]
    fn erase_keeps_the_table() {
        let dir = TempDir::new().unwrap();
        let target = seeded(&dir);

        assert_eq!(run(&target, "t", true).unwrap(), 2);

        let env = target.open_read().unwrap();
        let mut txn = env.begin_ro_txn().unwrap();
        let db = Database::open_with(&mut txn, "t", DatabaseFlags::empty()).unwrap();
        assert_eq!(db.entries(&txn).unwrap(), 0);
    }

    #[test]
    fn drop_removes_the_table() {
        let dir = TempDir::new().unwrap();
        let target = seeded(&dir);

        assert_eq!(run(&target, "t", false).unwrap(), 2);
        assert!(matches!(
            run(&target, "t", false),
            Err(CliError::TableNotFound(_))
        ));
    }
}
