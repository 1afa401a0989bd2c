//! lmkv CLI
//!
//! Command-line tools for LMDB environments.
//!
//! # Commands
//!
//! - `stat` - Display environment and table statistics
//! - `dump` - Print the records of a table in key order
//! - `get` / `put` / `delete` - Read and edit single records
//! - `drop` - Empty or delete a table
//! - `readers` - Clear stale reader slots
//! - `copy` - Write a backup of the environment

mod commands;
mod error;

use clap::{Parser, Subcommand};
use commands::{parse_bytes, OutputFormat, Target};
use error::{CliError, CliResult};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// lmkv command-line environment tools.
#[derive(Parser)]
#[command(name = "lmkv")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the environment directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// The path names a single data file instead of a directory
    #[arg(global = true, long)]
    no_subdir: bool,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display environment statistics
    Stat {
        /// List named tables
        #[arg(short, long)]
        tables: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Print the records of a table in key order
    Dump {
        /// Table name (the unnamed table if omitted)
        #[arg(short, long, default_value = "")]
        table: String,

        /// Start at the first key greater than or equal to this one
        #[arg(long)]
        from: Option<String>,

        /// Maximum number of records to dump
        #[arg(short, long)]
        limit: Option<usize>,

        /// Keys are given as hex
        #[arg(short = 'x', long)]
        hex: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Print the value (or duplicates) stored under a key
    Get {
        /// Key to look up
        key: String,

        /// Table name (the unnamed table if omitted)
        #[arg(short, long, default_value = "")]
        table: String,

        /// Key is given as hex
        #[arg(short = 'x', long)]
        hex: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Store a record, creating the environment and table if needed
    Put {
        /// Key to store
        key: String,

        /// Value to store
        value: String,

        /// Table name (the unnamed table if omitted)
        #[arg(short, long, default_value = "")]
        table: String,

        /// Fail instead of overwriting an existing key
        #[arg(short, long)]
        no_overwrite: bool,

        /// Create the table with sorted duplicate values
        #[arg(short, long)]
        dup_sort: bool,

        /// Key and value are given as hex
        #[arg(short = 'x', long)]
        hex: bool,
    },

    /// Delete a key, or one key/value pair
    Delete {
        /// Key to delete
        key: String,

        /// Only delete this value
        value: Option<String>,

        /// Table name (the unnamed table if omitted)
        #[arg(short, long, default_value = "")]
        table: String,

        /// Key and value are given as hex
        #[arg(short = 'x', long)]
        hex: bool,
    },

    /// Delete a table, or only its records
    Drop {
        /// Table name
        table: String,

        /// Keep the empty table
        #[arg(short, long)]
        keep: bool,
    },

    /// Clear stale reader slots
    Readers {
        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Copy the environment to a backup location
    Copy {
        /// Destination directory (or file with --no-subdir)
        dest: PathBuf,

        /// Omit free pages from the copy
        #[arg(short, long)]
        compact: bool,
    },

    /// Show version information
    Version,
}

impl Cli {
    fn target(&self, command: &'static str) -> CliResult<Target> {
        let path = self.path.clone().ok_or(CliError::MissingPath(command))?;
        Ok(Target::new(path, self.no_subdir))
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match &cli.command {
        Commands::Stat { tables, format } => {
            commands::stat::run(&cli.target("stat")?, *tables, *format)?;
        }
        Commands::Dump {
            table,
            from,
            limit,
            hex,
            format,
        } => {
            let target = cli.target("dump")?;
            let options = commands::dump::DumpOptions {
                table: table.clone(),
                from: from.as_deref().map(|key| parse_bytes(key, *hex)).transpose()?,
                limit: *limit,
            };
            commands::dump::run(&target, &options, *format)?;
        }
        Commands::Get {
            key,
            table,
            hex,
            format,
        } => {
            let target = cli.target("get")?;
            commands::get::run(&target, table, &parse_bytes(key, *hex)?, *format)?;
        }
        Commands::Put {
            key,
            value,
            table,
            no_overwrite,
            dup_sort,
            hex,
        } => {
            let target = cli.target("put")?;
            let options = commands::put::PutOptions {
                no_overwrite: *no_overwrite,
                dup_sort: *dup_sort,
            };
            commands::put::run(
                &target,
                table,
                &parse_bytes(key, *hex)?,
                &parse_bytes(value, *hex)?,
                options,
            )?;
        }
        Commands::Delete {
            key,
            value,
            table,
            hex,
        } => {
            let target = cli.target("delete")?;
            let value = value.as_deref().map(|v| parse_bytes(v, *hex)).transpose()?;
            commands::delete::run(&target, table, &parse_bytes(key, *hex)?, value.as_deref())?;
        }
        Commands::Drop { table, keep } => {
            let removed = commands::drop::run(&cli.target("drop")?, table, *keep)?;
            println!("Removed {removed} records from {table}");
        }
        Commands::Readers { format } => {
            commands::readers::run(&cli.target("readers")?, *format)?;
        }
        Commands::Copy { dest, compact } => {
            commands::copy::run(&cli.target("copy")?, dest, *compact)?;
        }
        Commands::Version => {
            let (major, minor, patch) = lmkv_core::lmdb_version();
            println!("lmkv CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("LMDB v{major}.{minor}.{patch}");
        }
    }

    Ok(())
}
