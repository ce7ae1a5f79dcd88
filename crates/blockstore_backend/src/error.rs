//! Error types for block backend operations.

use crate::block_id::BlockId;
use crate::handle::OpenMode;
use std::fmt;
use std::io;
use thiserror::Error;

/// Result type for block backend operations.
pub type BackendResult<T> = Result<T, BackendError>;

/// Result type for configuration handling.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// The backend operation an error is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Opening a handle.
    Open,
    /// Reading from a read handle.
    Read,
    /// Writing to a write handle.
    Write,
    /// Publishing a write session.
    Commit,
    /// Releasing a handle.
    Close,
    /// Checking for a block.
    Exists,
    /// Deleting a block.
    Remove,
    /// Fetching block metadata.
    Stat,
    /// Enumerating stored blocks.
    Foreach,
}

impl Operation {
    /// Returns the lowercase name used in diagnostics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Read => "read",
            Self::Write => "write",
            Self::Commit => "commit",
            Self::Close => "close",
            Self::Exists => "exists",
            Self::Remove => "remove",
            Self::Stat => "stat",
            Self::Foreach => "foreach",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while reading configuration or selecting a backend.
///
/// All of these are fatal to startup: a process must not run with a
/// partially configured backend.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A parameter required by the selected backend is absent or empty.
    #[error("missing configuration parameter [{section}] {key}")]
    MissingParameter {
        /// Configuration section.
        section: String,
        /// Key within the section.
        key: String,
    },

    /// The configured backend name matches no known variant.
    #[error("unknown block backend: {0:?}")]
    UnknownBackend(String),

    /// A parameter is present but its value is not usable.
    #[error("invalid value for [{section}] {key}: {reason}")]
    InvalidValue {
        /// Configuration section.
        section: String,
        /// Key within the section.
        key: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// The configuration document could not be parsed.
    #[error("configuration parse error: {0}")]
    Parse(String),

    /// The configuration file could not be read.
    #[error("I/O error reading configuration: {0}")]
    Io(#[from] io::Error),
}

impl ConfigError {
    /// Creates a missing-parameter error.
    pub fn missing(section: impl Into<String>, key: impl Into<String>) -> Self {
        Self::MissingParameter {
            section: section.into(),
            key: key.into(),
        }
    }
}

/// Errors that can occur during block backend operations.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Configuration or backend selection failed.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A block identifier is not 40 lowercase hex characters.
    #[error("invalid block id: {0:?}")]
    InvalidBlockId(String),

    /// The handle was opened for the other I/O direction.
    #[error("cannot {operation} block {id} through a {mode} handle")]
    ModeMismatch {
        /// Block the handle is bound to.
        id: BlockId,
        /// Mode the handle was opened with.
        mode: OpenMode,
        /// The rejected operation.
        operation: Operation,
    },

    /// The block does not exist.
    #[error("block not found: {0}")]
    NotFound(BlockId),

    /// The handle was already closed.
    #[error("cannot {operation} block {id}: handle is closed")]
    HandleClosed {
        /// Block the handle was bound to.
        id: BlockId,
        /// The rejected operation.
        operation: Operation,
    },

    /// The write session was already committed.
    #[error("block {0} already committed through this handle")]
    AlreadyCommitted(BlockId),

    /// The underlying medium failed.
    #[error("storage error during {operation}: {source}")]
    Storage {
        /// The operation that failed.
        operation: Operation,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// A remote object service answered with an error status.
    #[error("remote error during {operation}: status {status}: {message}")]
    Remote {
        /// The operation that failed.
        operation: Operation,
        /// HTTP-style status code.
        status: u16,
        /// Response body or reason phrase.
        message: String,
    },

    /// A driver could not be constructed.
    #[error("failed to initialize {backend} backend: {reason}")]
    DriverInit {
        /// Name of the backend variant.
        backend: &'static str,
        /// Why construction failed.
        reason: String,
    },
}

impl BackendError {
    /// Wraps an I/O error from the storage medium.
    pub fn storage(operation: Operation, source: io::Error) -> Self {
        Self::Storage { operation, source }
    }

    /// Returns true if this error reports an absent block.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns true if this error came from configuration handling.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}
