//! CLI error type.

use lmkv_core::Status;
use std::io;
use thiserror::Error;

/// Errors reported by `lmkv` commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// The command needs `--path`.
    #[error("environment path required for {0}")]
    MissingPath(&'static str),

    /// No environment files at the given path.
    #[error("no environment found at {0}")]
    NoEnvironment(String),

    /// The key is not in the table.
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// The table does not exist.
    #[error("table not found: {0}")]
    TableNotFound(String),

    /// A `--hex` argument is not valid hex.
    #[error("invalid hex input: {0}")]
    InvalidHex(String),

    /// LMDB or wrapper failure.
    #[error("lmdb: {0}")]
    Status(#[from] Status),

    /// Filesystem failure.
    #[error("io: {0}")]
    Io(#[from] io::Error),

    /// JSON output failure.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for CLI commands.
pub type CliResult<T> = Result<T, CliError>;
