//! Copy command - write a consistent backup of an environment.

use super::Target;
use crate::error::CliResult;
use std::fs;
use std::path::Path;
use tracing::info;

/// Copies the environment at `target` to `dest`.
///
/// In directory mode `dest` is created if missing and must be empty. With
/// `compact`, free pages are left out of the copy.
pub fn run(target: &Target, dest: &Path, compact: bool) -> CliResult<()> {
    let env = target.open_read()?;
    if !target.no_subdir {
        fs::create_dir_all(dest)?;
    }
    env.copy_to(dest, compact)?;

    info!(from = %target.path.display(), to = %dest.display(), compact, "environment copied");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lmkv_core::{Database, DatabaseFlags, WriteFlags};
    use tempfile::TempDir;

    #[test]
    fn compact_copy_keeps_records() {
        let dir = TempDir::new().unwrap();
        let source = Target::new(dir.path().join("source"), false);
        let env = source.open_or_create().unwrap();
        env.write(|txn| {
            let db = Database::open_with(txn, "t", DatabaseFlags::CREATE)?;
            db.put(txn, "k", "v", WriteFlags::empty())
        })
        .unwrap();
        drop(env);

        let dest = dir.path().join("backup");
        run(&source, &dest, true).unwrap();

        // The copy holds a data file only; readers must still accept it.
        assert!(!dest.join(lmkv_core::LOCK_FILE_NAME).exists());
        let backup = Target::new(&dest, false).open_read().unwrap();
        let mut txn = backup.begin_ro_txn().unwrap();
        let db = Database::open_with(&mut txn, "t", DatabaseFlags::empty()).unwrap();
        let value: &str = db.get(&txn, "k").unwrap();
        assert_eq!(value, "v");
    }
}
