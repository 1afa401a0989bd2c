//! Stat command - show environment and table statistics.

use super::{OutputFormat, Target};
use crate::error::CliResult;
use lmkv_core::{lmdb_version, Cursor, Database, DatabaseFlags, Stat, Status};
use serde::Serialize;

/// Environment-wide statistics.
#[derive(Debug, Serialize)]
pub struct StatReport {
    pub path: String,
    pub lmdb_version: String,
    pub page_size: u32,
    pub map_size: u64,
    pub last_page: u64,
    pub last_txn_id: u64,
    pub max_readers: u32,
    pub num_readers: u32,
    pub main: TableReport,
    /// Named tables, when requested.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tables: Vec<TableReport>,
}

/// Statistics of a single table.
#[derive(Debug, Serialize)]
pub struct TableReport {
    pub name: String,
    pub entries: u64,
    pub depth: u32,
    pub branch_pages: u64,
    pub leaf_pages: u64,
    pub overflow_pages: u64,
    pub dup_sort: bool,
}

impl TableReport {
    fn new(name: &str, stat: Stat, dup_sort: bool) -> Self {
        Self {
            name: name.to_string(),
            entries: stat.entries,
            depth: stat.depth,
            branch_pages: stat.branch_pages,
            leaf_pages: stat.leaf_pages,
            overflow_pages: stat.overflow_pages,
            dup_sort,
        }
    }
}

/// Gathers statistics, listing named tables when `tables` is set.
pub fn collect(target: &Target, tables: bool) -> CliResult<StatReport> {
    let env = target.open_read()?;
    let info = env.info()?;
    let env_stat = env.stat()?;
    let (major, minor, patch) = lmdb_version();

    let mut txn = env.begin_ro_txn()?;
    let main = Database::open_with(&mut txn, "", DatabaseFlags::empty())?;
    let main_report = TableReport::new("", main.stat(&txn)?, main.is_dup_sort());

    let mut named = Vec::new();
    if tables {
        // Named tables are stored as keys of the unnamed table.
        let names: Vec<String> = {
            let mut cursor = Cursor::ro(&txn, &main)?;
            cursor
                .iter::<Vec<u8>, Vec<u8>>()
                .filter_map(|entry| match entry {
                    Ok((key, _)) => String::from_utf8(key).ok().map(Ok),
                    Err(status) => Some(Err(status)),
                })
                .collect::<Result<_, _>>()?
        };
        for name in names {
            match Database::open_with(&mut txn, &name, DatabaseFlags::empty()) {
                Ok(db) => named.push(TableReport::new(&name, db.stat(&txn)?, db.is_dup_sort())),
                // A plain record in the unnamed table, not a table.
                Err(Status::INCOMPATIBLE) => {}
                Err(status) => return Err(status.into()),
            }
        }
    }

    Ok(StatReport {
        path: target.path.display().to_string(),
        lmdb_version: format!("{major}.{minor}.{patch}"),
        page_size: env_stat.page_size,
        map_size: info.map_size,
        last_page: info.last_page,
        last_txn_id: info.last_txn_id,
        max_readers: info.max_readers,
        num_readers: info.num_readers,
        main: main_report,
        tables: named,
    })
}

/// Runs the stat command.
pub fn run(target: &Target, tables: bool, format: OutputFormat) -> CliResult<()> {
    let report = collect(target, tables)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => {
            println!("Environment: {}", report.path);
            println!("LMDB version: {}", report.lmdb_version);
            println!();
            println!("Page size:     {} bytes", report.page_size);
            println!("Map size:      {} bytes", report.map_size);
            println!("Last page:     {}", report.last_page);
            println!("Last txn id:   {}", report.last_txn_id);
            println!("Readers:       {} / {}", report.num_readers, report.max_readers);
            println!("Main entries:  {}", report.main.entries);
            if !report.tables.is_empty() {
                println!();
                println!("{:<24} {:>10} {:>6} {:>8}", "TABLE", "ENTRIES", "DEPTH", "DUPSORT");
                for table in &report.tables {
                    println!(
                        "{:<24} {:>10} {:>6} {:>8}",
                        table.name, table.entries, table.depth, table.dup_sort
                    );
                }
            }
        }
    }

    Ok(())
}
