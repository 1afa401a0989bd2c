//! CLI command implementations.

pub mod copy;
pub mod delete;
pub mod drop;
pub mod dump;
pub mod get;
pub mod put;
pub mod readers;
pub mod stat;

use crate::error::{CliError, CliResult};
use lmkv_core::{
    Database, DatabaseFlags, EnvConfig, EnvFlags, Environment, Transaction, DATA_FILE_NAME,
};
use std::fs;
use std::path::PathBuf;
use tracing::debug;

/// Output format of reporting commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// Pretty-printed JSON
    Json,
}

/// Location and layout of the environment a command works on.
#[derive(Debug, Clone)]
pub struct Target {
    /// Environment directory, or data file with `no_subdir`.
    pub path: PathBuf,
    /// Single-file layout.
    pub no_subdir: bool,
}

impl Target {
    /// Creates a target.
    pub fn new(path: impl Into<PathBuf>, no_subdir: bool) -> Self {
        Self {
            path: path.into(),
            no_subdir,
        }
    }

    fn config(&self, read_only: bool) -> EnvConfig {
        let mut flags = EnvFlags::empty();
        if self.no_subdir {
            flags |= EnvFlags::NO_SUB_DIR;
        }
        if read_only {
            flags |= EnvFlags::READ_ONLY;
        }
        EnvConfig::new().path(&self.path).flags(flags)
    }

    /// Opens an existing environment read-only.
    pub fn open_read(&self) -> CliResult<Environment> {
        self.open_existing(true)
    }

    /// Opens an existing environment for writing.
    pub fn open_write(&self) -> CliResult<Environment> {
        self.open_existing(false)
    }

    /// Opens the environment for writing, creating it if missing.
    pub fn open_or_create(&self) -> CliResult<Environment> {
        if !self.no_subdir {
            fs::create_dir_all(&self.path)?;
        } else if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let env = Environment::open_with(self.config(false))?;
        debug!(path = %self.path.display(), "environment ready");
        Ok(env)
    }

    /// Data file of the target; its lock file is recreated by LMDB when
    /// missing, as it is for backups written by `copy`.
    fn data_file(&self) -> PathBuf {
        if self.no_subdir {
            self.path.clone()
        } else {
            self.path.join(DATA_FILE_NAME)
        }
    }

    fn open_existing(&self, read_only: bool) -> CliResult<Environment> {
        if !self.data_file().is_file() {
            return Err(CliError::NoEnvironment(self.path.display().to_string()));
        }
        Ok(Environment::open_with(self.config(read_only))?)
    }
}

/// Opens `name` (empty for the unnamed table), mapping a missing table to
/// [`CliError::TableNotFound`].
pub fn open_table(txn: &mut Transaction<'_>, name: &str, flags: DatabaseFlags) -> CliResult<Database> {
    match Database::open_with(txn, name, flags) {
        Ok(db) => Ok(db),
        Err(status) if status.is_not_found() => Err(CliError::TableNotFound(name.to_string())),
        Err(status) => Err(status.into()),
    }
}

/// Renders bytes as text when they are printable UTF-8, else as hex.
pub fn render_bytes(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) if !text.chars().any(char::is_control) => text.to_string(),
        _ => format!("0x{}", to_hex(bytes)),
    }
}

/// Turns a command-line argument into bytes, decoding hex when `hex` is set.
pub fn parse_bytes(input: &str, hex: bool) -> CliResult<Vec<u8>> {
    if !hex {
        return Ok(input.as_bytes().to_vec());
    }
    let digits = input.strip_prefix("0x").unwrap_or(input);
    if digits.len() % 2 != 0 {
        return Err(CliError::InvalidHex(input.to_string()));
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| {
            digits
                .get(i..i + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| CliError::InvalidHex(input.to_string()))
        })
        .collect()
}

/// Lowercase hex encoding.
pub fn to_hex(bytes: &[u8]) -> String {
    use std::fmt::Write;

    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}
