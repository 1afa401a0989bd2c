//! Get command - look up the values stored under a key.

use super::{open_table, render_bytes, OutputFormat, Target};
use crate::error::{CliError, CliResult};
use lmkv_core::{Cursor, DatabaseFlags, OptionalExt};
use serde::Serialize;

/// Result of a lookup.
#[derive(Debug, Serialize)]
pub struct GetReport {
    pub table: String,
    pub key: String,
    /// The stored value, or every duplicate in a duplicate-sort table.
    pub values: Vec<String>,
}

/// Looks up `key` in `table`.
pub fn collect(target: &Target, table: &str, key: &[u8]) -> CliResult<GetReport> {
    let env = target.open_read()?;
    let mut txn = env.begin_ro_txn()?;
    let db = open_table(&mut txn, table, DatabaseFlags::empty())?;

    let mut values = Vec::new();
    if db.is_dup_sort() {
        let mut cursor = Cursor::ro(&txn, &db)?;
        if cursor.seek(key).optional()?.is_some() {
            values.push(render_bytes(cursor.first_dup::<&[u8]>()?));
            while let Some((_, value)) = cursor.next_dup::<&[u8], &[u8]>().optional()? {
                values.push(render_bytes(value));
            }
        }
    } else if let Some(value) = db.get::<[u8], &[u8]>(&txn, key).optional()? {
        values.push(render_bytes(value));
    }

    if values.is_empty() {
        return Err(CliError::KeyNotFound(render_bytes(key)));
    }
    Ok(GetReport {
        table: table.to_string(),
        key: render_bytes(key),
        values,
    })
}

/// Runs the get command.
pub fn run(target: &Target, table: &str, key: &[u8], format: OutputFormat) -> CliResult<()> {
    let report = collect(target, table, key)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => {
            for value in &report.values {
                println!("{value}");
            }
        }
    }

    Ok(())
}
