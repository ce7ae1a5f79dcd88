//! CLI command implementations.

pub mod check_config;
pub mod get;
pub mod list;
pub mod put;
pub mod rm;
pub mod stat;
pub mod verify;

use blockstore_backend::BackendError;
use std::io;
use thiserror::Error;

/// Result type for CLI commands.
pub type CliResult<T> = Result<T, CliError>;

/// Errors reported by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// The backend failed.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Reading input or writing output failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON output could not be produced.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Blocks whose content does not match their ID.
    #[error("{corrupt} of {checked} blocks failed verification")]
    VerificationFailed {
        /// Blocks checked.
        checked: usize,
        /// Blocks that failed.
        corrupt: usize,
    },
}

/// Output format of reporting commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// Pretty-printed JSON
    Json,
}
