//! Readers command - report reader slots and clear stale ones.

use super::{OutputFormat, Target};
use crate::error::CliResult;
use serde::Serialize;

/// Reader slot usage.
#[derive(Debug, Serialize)]
pub struct ReadersReport {
    pub max_readers: u32,
    pub num_readers: u32,
    /// Slots freed from dead processes.
    pub cleared: u32,
}

/// Clears stale reader slots and reports the table usage.
pub fn collect(target: &Target) -> CliResult<ReadersReport> {
    let env = target.open_write()?;
    let cleared = env.check_stale_readers()?;
    let info = env.info()?;

    Ok(ReadersReport {
        max_readers: info.max_readers,
        num_readers: info.num_readers,
        cleared,
    })
}

/// Runs the readers command.
pub fn run(target: &Target, format: OutputFormat) -> CliResult<()> {
    let report = collect(target)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => {
            println!("Reader slots: {} / {}", report.num_readers, report.max_readers);
            println!("Stale slots cleared: {}", report.cleared);
        }
    }

    Ok(())
}
