//! Object-store block backend.
//!
//! Object stores (distributed object pools, S3 buckets) only offer atomic
//! replacement of whole objects. [`ObjectBackend`] therefore buffers a write
//! session in memory and publishes it with a single `put` on commit, and
//! fetches a whole object on the first read of a read session.

use crate::backend::{BlockBackend, BlockVisitor};
use crate::block_id::BlockId;
use crate::error::{BackendError, BackendResult, Operation};
use crate::handle::{BlockHandle, HandleState, OpenMode, Session};
use crate::metadata::BlockMetadata;
use bytes::Bytes;
use std::io;
use std::sync::Arc;
use std::time::SystemTime;
use thiserror::Error;
use tracing::debug;

/// Result type for object client calls.
pub type ObjectResult<T> = Result<T, ObjectError>;

/// Errors reported by an [`ObjectClient`].
#[derive(Debug, Error)]
pub enum ObjectError {
    /// Transport or local I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The service answered with an error status.
    #[error("status {status}: {message}")]
    Status {
        /// HTTP-style status code.
        status: u16,
        /// Response body or reason phrase.
        message: String,
    },
}

impl ObjectError {
    /// Attributes the error to a backend operation.
    pub fn into_backend(self, operation: Operation) -> BackendError {
        match self {
            Self::Io(source) => BackendError::Storage { operation, source },
            Self::Status { status, message } => BackendError::Remote {
                operation,
                status,
                message,
            },
        }
    }
}

/// Size and timestamp of a stored object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectInfo {
    /// Object size in bytes.
    pub size: u64,
    /// Last modification time, if known.
    pub modified: Option<SystemTime>,
}

/// Minimal client for a flat, whole-object key/value store.
///
/// Implemented by pool clients of a distributed object cluster and by the
/// S3 client. Every call may block on the network.
pub trait ObjectClient: Send + Sync {
    /// Fetches an object. `Ok(None)` if it does not exist.
    fn get(&self, key: &str) -> ObjectResult<Option<Bytes>>;

    /// Fetches object metadata. `Ok(None)` if it does not exist.
    fn head(&self, key: &str) -> ObjectResult<Option<ObjectInfo>>;

    /// Atomically creates or replaces an object.
    fn put(&self, key: &str, data: Bytes) -> ObjectResult<()>;

    /// Deletes an object. Deleting an absent object succeeds.
    fn delete(&self, key: &str) -> ObjectResult<()>;

    /// Calls `visit` with every object key until it returns `false`.
    fn list(&self, visit: &mut dyn FnMut(&str) -> bool) -> ObjectResult<()>;
}

/// A block backend over an [`ObjectClient`], one object per block.
///
/// Object keys are the 40-character block ID renderings.
pub struct ObjectBackend {
    variant: &'static str,
    client: Arc<dyn ObjectClient>,
}

impl ObjectBackend {
    /// Creates a backend named `variant` over `client`.
    pub fn new(variant: &'static str, client: Arc<dyn ObjectClient>) -> Self {
        Self { variant, client }
    }

    /// Returns the variant name this backend was built for.
    #[must_use]
    pub fn variant(&self) -> &'static str {
        self.variant
    }

    /// Returns the underlying object client.
    #[must_use]
    pub fn client(&self) -> &Arc<dyn ObjectClient> {
        &self.client
    }

    fn info(&self, id: &BlockId, operation: Operation) -> BackendResult<Option<ObjectInfo>> {
        self.client
            .head(&id.to_hex())
            .map_err(|e| e.into_backend(operation))
    }
}

impl std::fmt::Debug for ObjectBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectBackend")
            .field("variant", &self.variant)
            .finish()
    }
}

impl BlockBackend for ObjectBackend {
    fn open(&self, id: &BlockId, mode: OpenMode) -> BlockHandle {
        BlockHandle::new(*id, mode)
    }

    fn read(&self, handle: &mut BlockHandle, buf: &mut [u8]) -> BackendResult<usize> {
        handle.check_read()?;

        if matches!(handle.session, Session::Idle) {
            let data = self
                .client
                .get(&handle.id().to_hex())
                .map_err(|e| e.into_backend(Operation::Read))?
                .ok_or(BackendError::NotFound(*handle.id()))?;
            handle.session = Session::Fetched { data, pos: 0 };
        }

        let Session::Fetched { data, pos } = &mut handle.session else {
            return Err(handle.foreign_session(Operation::Read));
        };
        let n = buf.len().min(data.len() - *pos);
        buf[..n].copy_from_slice(&data[*pos..*pos + n]);
        *pos += n;
        Ok(n)
    }

    fn write(&self, handle: &mut BlockHandle, data: &[u8]) -> BackendResult<usize> {
        handle.check_write()?;

        if matches!(handle.session, Session::Idle) {
            handle.session = Session::Buffer(Vec::new());
        }

        let Session::Buffer(buffer) = &mut handle.session else {
            return Err(handle.foreign_session(Operation::Write));
        };
        buffer.extend_from_slice(data);
        Ok(data.len())
    }

    fn commit(&self, handle: &mut BlockHandle) -> BackendResult<()> {
        if !handle.check_commit()? {
            return Ok(());
        }

        let buffer = match std::mem::replace(&mut handle.session, Session::Idle) {
            Session::Idle => Vec::new(),
            Session::Buffer(buffer) => buffer,
            other => {
                handle.session = other;
                return Err(handle.foreign_session(Operation::Commit));
            }
        };

        let id = *handle.id();
        let data = Bytes::from(buffer);
        let size = data.len();
        if let Err(e) = self.client.put(&id.to_hex(), data.clone()) {
            handle.session = Session::Buffer(Vec::from(data));
            return Err(e.into_backend(Operation::Commit));
        }

        handle.mark_committed();
        debug!(backend = self.variant, block = %id, size, "committed block");
        Ok(())
    }

    fn close(&self, handle: &mut BlockHandle) {
        // Buffered sessions hold no remote resources; dropping them discards
        // the uncommitted data.
        drop(handle.release());
    }

    fn exists(&self, id: &BlockId) -> BackendResult<bool> {
        Ok(self.info(id, Operation::Exists)?.is_some())
    }

    fn remove(&self, id: &BlockId) -> BackendResult<()> {
        self.client
            .delete(&id.to_hex())
            .map_err(|e| e.into_backend(Operation::Remove))?;
        debug!(backend = self.variant, block = %id, "removed block");
        Ok(())
    }

    fn stat(&self, id: &BlockId) -> BackendResult<BlockMetadata> {
        let info = self
            .info(id, Operation::Stat)?
            .ok_or(BackendError::NotFound(*id))?;
        Ok(BlockMetadata::committed(info.size).with_modified(info.modified))
    }

    fn stat_by_handle(&self, handle: &BlockHandle) -> BackendResult<BlockMetadata> {
        handle.check_stat()?;

        match (handle.mode(), &handle.session) {
            (OpenMode::Write, Session::Buffer(buffer)) => {
                Ok(BlockMetadata::staged(buffer.len() as u64))
            }
            (OpenMode::Write, _) if handle.state() == HandleState::Opened => {
                Ok(BlockMetadata::staged(0))
            }
            _ => self.stat(handle.id()),
        }
    }

    fn foreach(&self, visitor: BlockVisitor<'_>) -> BackendResult<()> {
        let mut failure = None;
        self.client
            .list(&mut |key| match BlockId::parse(key) {
                Ok(id) => match visitor(&id) {
                    Ok(()) => true,
                    Err(e) => {
                        failure = Some(e);
                        false
                    }
                },
                Err(_) => {
                    debug!(backend = self.variant, key, "skipping non-block object");
                    true
                }
            })
            .map_err(|e| e.into_backend(Operation::Foreach))?;

        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
