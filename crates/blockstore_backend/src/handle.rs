//! Block handles and their lifecycle.
//!
//! A handle binds one block ID to one I/O direction for a single session:
//!
//! ```text
//! Opened(Read)  --read*-------------------------> Closed
//! Opened(Write) --write*--> Committed ----------> Closed
//!               \---------------------(discard)-> Closed
//! ```
//!
//! Every backend validates the transition before touching its medium, so
//! misuse surfaces as an error rather than as undefined driver behavior.

use crate::block_id::BlockId;
use crate::error::{BackendError, BackendResult, Operation};
use bytes::Bytes;
use std::fmt;
use std::fs::File;
use tempfile::NamedTempFile;

/// The I/O direction a handle was opened for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpenMode {
    /// The handle reads committed content.
    Read,
    /// The handle stages new content for commit.
    Write,
}

impl fmt::Display for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => f.write_str("read"),
            Self::Write => f.write_str("write"),
        }
    }
}

/// Lifecycle state of a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    /// Open for reads or writes.
    Opened,
    /// Written content has been published. Write handles only.
    Committed,
    /// Released. Every further operation fails.
    Closed,
}

/// Driver-side state carried by a handle between calls.
pub(crate) enum Session {
    /// Nothing acquired yet, or everything released.
    Idle,
    /// Filesystem read session.
    File(File),
    /// Filesystem write session staged in the temp directory.
    Staged {
        file: NamedTempFile,
        written: u64,
    },
    /// Object-store write session buffered in memory.
    Buffer(Vec<u8>),
    /// Object-store read session over a fetched object.
    Fetched { data: Bytes, pos: usize },
    /// A write failed partway; the staged bytes were discarded.
    Poisoned,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("Idle"),
            Self::Poisoned => f.write_str("Poisoned"),
            Self::File(_) => f.write_str("File"),
            Self::Staged { file, written } => f
                .debug_struct("Staged")
                .field("path", &file.path())
                .field("written", written)
                .finish(),
            Self::Buffer(buf) => f.debug_struct("Buffer").field("len", &buf.len()).finish(),
            Self::Fetched { data, pos } => f
                .debug_struct("Fetched")
                .field("len", &data.len())
                .field("pos", pos)
                .finish(),
        }
    }
}

/// An open block, bound to one block ID and one I/O direction.
///
/// Handles are issued by [`crate::BlockBackend::open`] and passed back by
/// mutable reference to every subsequent operation on that block. They are
/// owned by the code path that opened them and are never shared between
/// concurrent callers.
///
/// Dropping a handle without closing it releases its resources as well;
/// an uncommitted write session is discarded either way.
#[derive(Debug)]
pub struct BlockHandle {
    id: BlockId,
    mode: OpenMode,
    state: HandleState,
    pub(crate) session: Session,
}

impl BlockHandle {
    pub(crate) fn new(id: BlockId, mode: OpenMode) -> Self {
        Self {
            id,
            mode,
            state: HandleState::Opened,
            session: Session::Idle,
        }
    }

    /// Returns the block this handle is bound to.
    #[must_use]
    pub fn id(&self) -> &BlockId {
        &self.id
    }

    /// Returns the I/O direction of this handle.
    #[must_use]
    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> HandleState {
        self.state
    }

    /// Returns true once the handle has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state == HandleState::Closed
    }

    fn ensure_open(&self, operation: Operation) -> BackendResult<()> {
        if self.is_closed() {
            return Err(BackendError::HandleClosed {
                id: self.id,
                operation,
            });
        }
        Ok(())
    }

    fn ensure_mode(&self, expected: OpenMode, operation: Operation) -> BackendResult<()> {
        if self.mode != expected {
            return Err(BackendError::ModeMismatch {
                id: self.id,
                mode: self.mode,
                operation,
            });
        }
        Ok(())
    }

    /// Validates that a read is allowed.
    pub(crate) fn check_read(&self) -> BackendResult<()> {
        self.ensure_open(Operation::Read)?;
        self.ensure_mode(OpenMode::Read, Operation::Read)
    }

    /// Validates that a write is allowed.
    pub(crate) fn check_write(&self) -> BackendResult<()> {
        self.ensure_open(Operation::Write)?;
        self.ensure_mode(OpenMode::Write, Operation::Write)?;
        if self.state == HandleState::Committed {
            return Err(BackendError::AlreadyCommitted(self.id));
        }
        Ok(())
    }

    /// Validates a commit. Returns `false` if the session was already
    /// committed, in which case the commit is a no-op.
    pub(crate) fn check_commit(&self) -> BackendResult<bool> {
        self.ensure_open(Operation::Commit)?;
        self.ensure_mode(OpenMode::Write, Operation::Commit)?;
        Ok(self.state == HandleState::Opened)
    }

    /// Validates a stat through this handle.
    pub(crate) fn check_stat(&self) -> BackendResult<()> {
        self.ensure_open(Operation::Stat)
    }

    pub(crate) fn mark_committed(&mut self) {
        self.state = HandleState::Committed;
    }

    /// Error for a session that does not belong to the driver serving it.
    pub(crate) fn foreign_session(&self, operation: Operation) -> BackendError {
        BackendError::storage(
            operation,
            std::io::Error::other(format!(
                "handle for block {} carries a session from another backend",
                self.id
            )),
        )
    }

    /// Discards the write session so nothing staged so far can be committed.
    pub(crate) fn poison(&mut self) {
        self.session = Session::Poisoned;
    }

    pub(crate) fn poisoned_session(&self, operation: Operation) -> BackendError {
        BackendError::storage(
            operation,
            std::io::Error::other(format!(
                "an earlier write to block {} failed; reopen the handle",
                self.id
            )),
        )
    }

    /// Moves the handle to `Closed` and hands back its session for cleanup.
    ///
    /// Closing twice yields [`Session::Idle`] the second time.
    pub(crate) fn release(&mut self) -> Session {
        self.state = HandleState::Closed;
        std::mem::replace(&mut self.session, Session::Idle)
    }
}
