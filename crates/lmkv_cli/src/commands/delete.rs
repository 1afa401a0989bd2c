//! Delete command - remove a key, or a single key/value pair.

use super::{open_table, render_bytes, Target};
use crate::error::{CliError, CliResult};
use lmkv_core::DatabaseFlags;
use tracing::info;

/// Deletes `key` from `table`.
///
/// With `value`, only that pair is removed; in duplicate-sort tables the
/// other duplicates stay.
pub fn run(target: &Target, table: &str, key: &[u8], value: Option<&[u8]>) -> CliResult<()> {
    let env = target.open_write()?;
    let mut txn = env.begin_rw_txn()?;
    let db = open_table(&mut txn, table, DatabaseFlags::empty())?;

    let result = match value {
        Some(value) => db.delete_value(&mut txn, key, value),
        None => db.delete(&mut txn, key),
    };
    match result {
        Ok(()) => {}
        Err(status) if status.is_not_found() => {
            return Err(CliError::KeyNotFound(render_bytes(key)));
        }
        Err(status) => return Err(status.into()),
    }
    txn.commit()?;

    info!(table, key = %render_bytes(key), "record deleted");
    Ok(())
}
