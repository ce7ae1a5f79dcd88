//! Block backend trait definition.

use crate::block_id::BlockId;
use crate::error::BackendResult;
use crate::handle::{BlockHandle, OpenMode};
use crate::metadata::BlockMetadata;

/// Callback invoked once per stored block by [`BlockBackend::foreach`].
///
/// Returning an error stops the iteration; the error is handed back to the
/// caller of `foreach`.
pub type BlockVisitor<'a> = &'a mut dyn FnMut(&BlockId) -> BackendResult<()>;

/// Size of the chunks used by the provided whole-block helpers.
const COPY_CHUNK: usize = 64 * 1024;

/// A content-addressed block store on one storage medium.
///
/// Backends treat blocks as **opaque bytes** named by their [`BlockId`].
/// Writes are staged through a handle and become visible only when the
/// handle is committed.
///
/// # Invariants
///
/// - `open` never fails; absence is detected by the first `read`
/// - A read handle never writes and a write handle never reads
/// - A block is either absent or holds exactly the bytes written before
///   a successful `commit`; partial content is never observable
/// - `close` always succeeds and may be called more than once
/// - Backends must be `Send + Sync`: one instance serves every concurrent
///   handle lifecycle in the process
///
/// # Implementors
///
/// - [`crate::FsBackend`] - local directory tree
/// - [`crate::ObjectBackend`] - distributed object pools and S3 buckets
/// - [`crate::Backend`] - the factory's closed set of the above
pub trait BlockBackend: Send + Sync {
    /// Opens a handle bound to `id` for one I/O direction.
    ///
    /// Opening performs no I/O and succeeds even if the block does not
    /// exist yet.
    fn open(&self, id: &BlockId, mode: OpenMode) -> BlockHandle;

    /// Reads up to `buf.len()` bytes from the block.
    ///
    /// Returns the number of bytes copied, `0` at end of data.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The handle was opened for writing (`ModeMismatch`)
    /// - The block does not exist (`NotFound`)
    /// - The handle is closed (`HandleClosed`)
    /// - The medium fails
    fn read(&self, handle: &mut BlockHandle, buf: &mut [u8]) -> BackendResult<usize>;

    /// Appends `data` to the handle's write session.
    ///
    /// Returns the number of bytes accepted. Nothing is visible to readers
    /// until [`commit`](Self::commit) succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The handle was opened for reading (`ModeMismatch`)
    /// - The session was already committed or the handle is closed
    /// - The medium fails
    fn write(&self, handle: &mut BlockHandle, data: &[u8]) -> BackendResult<usize>;

    /// Atomically publishes everything written through the handle.
    ///
    /// Committing an already committed handle is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle is not a write handle, is closed, or
    /// the medium fails. On failure the previous state of the block (absent
    /// or previously committed content) remains observable.
    fn commit(&self, handle: &mut BlockHandle) -> BackendResult<()>;

    /// Releases the handle.
    ///
    /// Never fails: cleanup problems are logged. An uncommitted write
    /// session is discarded. Calling `close` again is a no-op.
    fn close(&self, handle: &mut BlockHandle);

    /// Returns whether a committed block exists.
    ///
    /// # Errors
    ///
    /// Only a failure of the medium is an error; absence is `Ok(false)`.
    fn exists(&self, id: &BlockId) -> BackendResult<bool>;

    /// Deletes a block. Succeeds if the block is already absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the medium fails.
    fn remove(&self, id: &BlockId) -> BackendResult<()>;

    /// Returns metadata for a committed block.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the block is absent, or a storage error.
    fn stat(&self, id: &BlockId) -> BackendResult<BlockMetadata>;

    /// Returns metadata through an open handle.
    ///
    /// For a read handle this is the stored block's metadata. For a write
    /// handle it reports the bytes staged so far; `exists` turns true once
    /// the session is committed.
    ///
    /// # Errors
    ///
    /// Returns `HandleClosed` for a closed handle, `NotFound` for a read
    /// handle on an absent block, or a storage error.
    fn stat_by_handle(&self, handle: &BlockHandle) -> BackendResult<BlockMetadata>;

    /// Invokes `visitor` once for every committed block, in no particular
    /// order.
    ///
    /// # Errors
    ///
    /// Returns the visitor's first error, or a storage error that aborted
    /// the enumeration.
    fn foreach(&self, visitor: BlockVisitor<'_>) -> BackendResult<()>;

    /// Reads a whole block into memory.
    ///
    /// # Errors
    ///
    /// Same as [`read`](Self::read).
    fn read_block(&self, id: &BlockId) -> BackendResult<Vec<u8>> {
        let mut handle = self.open(id, OpenMode::Read);
        let mut content = Vec::new();
        let mut chunk = vec![0u8; COPY_CHUNK];
        let result = loop {
            match self.read(&mut handle, &mut chunk) {
                Ok(0) => break Ok(content),
                Ok(n) => content.extend_from_slice(&chunk[..n]),
                Err(e) => break Err(e),
            }
        };
        self.close(&mut handle);
        result
    }

    /// Writes and commits a whole block in one session.
    ///
    /// # Errors
    ///
    /// Same as [`write`](Self::write) and [`commit`](Self::commit).
    fn write_block(&self, id: &BlockId, data: &[u8]) -> BackendResult<()> {
        let mut handle = self.open(id, OpenMode::Write);
        let result = data
            .chunks(COPY_CHUNK)
            .try_for_each(|chunk| self.write(&mut handle, chunk).map(|_| ()))
            .and_then(|()| self.commit(&mut handle));
        self.close(&mut handle);
        result
    }
}
