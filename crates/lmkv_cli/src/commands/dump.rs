//! Dump command - print the records of a table in key order.

use super::{open_table, render_bytes, OutputFormat, Target};
use crate::error::CliResult;
use lmkv_core::{Cursor, DatabaseFlags};
use serde::Serialize;

/// One dumped record.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct DumpEntry {
    pub key: String,
    pub value: String,
}

/// What to dump.
#[derive(Debug, Default)]
pub struct DumpOptions {
    /// Table name; empty for the unnamed table.
    pub table: String,
    /// First key to include.
    pub from: Option<Vec<u8>>,
    /// Maximum number of records.
    pub limit: Option<usize>,
}

/// Reads the selected records.
pub fn collect(target: &Target, options: &DumpOptions) -> CliResult<Vec<DumpEntry>> {
    let env = target.open_read()?;
    let mut txn = env.begin_ro_txn()?;
    let db = open_table(&mut txn, &options.table, DatabaseFlags::empty())?;

    let mut cursor = Cursor::ro(&txn, &db)?;
    let records = match &options.from {
        Some(start) => cursor.iter_from::<Vec<u8>, Vec<u8>, [u8]>(start),
        None => cursor.iter::<Vec<u8>, Vec<u8>>(),
    };

    let mut entries = Vec::new();
    for record in records.take(options.limit.unwrap_or(usize::MAX)) {
        let (key, value) = record?;
        entries.push(DumpEntry {
            key: render_bytes(&key),
            value: render_bytes(&value),
        });
    }
    Ok(entries)
}

/// Runs the dump command.
pub fn run(target: &Target, options: &DumpOptions, format: OutputFormat) -> CliResult<()> {
    let entries = collect(target, options)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
        OutputFormat::Text => {
            for entry in &entries {
                println!("{}\t{}", entry.key, entry.value);
            }
            tracing::debug!(count = entries.len(), "records dumped");
        }
    }

    Ok(())
}
