//! Filesystem block backend.

use crate::backend::{BlockBackend, BlockVisitor};
use crate::block_id::BlockId;
use crate::error::{BackendError, BackendResult, Operation};
use crate::handle::{BlockHandle, HandleState, OpenMode, Session};
use crate::metadata::BlockMetadata;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Name of the filesystem variant in configuration and diagnostics.
pub const FILESYSTEM_BACKEND: &str = "filesystem";

/// A block backend storing one file per block under a local directory.
///
/// # Layout
///
/// ```text
/// <block_dir>/
/// ├─ 3a/
/// │  └─ 7bd3e2360a3d29eea436fcfb7e44c735d117c4   # block 3a7bd3e2...
/// └─ da/
///    └─ 39a3ee5e6b4b0d3255bfef95601890afd80709
/// <tmp_dir>/
/// └─ <block_id>.XXXXXX                            # in-progress writes
/// ```
///
/// # Durability
///
/// Writes are staged in a uniquely named file inside `tmp_dir`. `commit`
/// syncs the staged file and renames it over the final path, so readers
/// see either the previous state or the complete new content. `tmp_dir`
/// must live on the same filesystem as `block_dir` for the rename to be
/// atomic.
///
/// # Thread Safety
///
/// The backend holds no mutable state of its own and can be shared across
/// threads; all per-session state lives in the handle.
#[derive(Debug)]
pub struct FsBackend {
    block_dir: PathBuf,
    tmp_dir: PathBuf,
}

impl FsBackend {
    /// Creates a backend over `block_dir`, staging writes in `tmp_dir`.
    ///
    /// Both directories are created if missing.
    ///
    /// # Errors
    ///
    /// Returns `DriverInit` if either directory cannot be created.
    pub fn new(block_dir: impl Into<PathBuf>, tmp_dir: impl Into<PathBuf>) -> BackendResult<Self> {
        let block_dir = block_dir.into();
        let tmp_dir = tmp_dir.into();

        for dir in [&block_dir, &tmp_dir] {
            fs::create_dir_all(dir).map_err(|e| BackendError::DriverInit {
                backend: FILESYSTEM_BACKEND,
                reason: format!("cannot create directory {}: {e}", dir.display()),
            })?;
        }

        debug!(
            block_dir = %block_dir.display(),
            tmp_dir = %tmp_dir.display(),
            "opened filesystem backend"
        );
        Ok(Self { block_dir, tmp_dir })
    }

    /// Returns the primary block directory.
    #[must_use]
    pub fn block_dir(&self) -> &Path {
        &self.block_dir
    }

    /// Returns the staging directory.
    #[must_use]
    pub fn tmp_dir(&self) -> &Path {
        &self.tmp_dir
    }

    /// Returns the path a committed block lives at.
    #[must_use]
    pub fn block_path(&self, id: &BlockId) -> PathBuf {
        let hex = id.to_hex();
        self.block_dir.join(&hex[..2]).join(&hex[2..])
    }

    fn stage(&self, id: &BlockId, operation: Operation) -> BackendResult<Session> {
        let file = tempfile::Builder::new()
            .prefix(&format!("{id}."))
            .tempfile_in(&self.tmp_dir)
            .map_err(|e| BackendError::storage(operation, e))?;
        Ok(Session::Staged { file, written: 0 })
    }

    fn visit_prefix_dir(
        &self,
        dir: &Path,
        prefix: &str,
        visitor: BlockVisitor<'_>,
    ) -> BackendResult<()> {
        let entries =
            fs::read_dir(dir).map_err(|e| BackendError::storage(Operation::Foreach, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| BackendError::storage(Operation::Foreach, e))?;
            let name = entry.file_name();
            let Some(rest) = name.to_str() else {
                continue;
            };
            match BlockId::parse(&format!("{prefix}{rest}")) {
                Ok(id) => visitor(&id)?,
                Err(_) => debug!(path = %entry.path().display(), "skipping non-block entry"),
            }
        }
        Ok(())
    }
}

fn not_found_or(id: &BlockId, operation: Operation, e: io::Error) -> BackendError {
    if e.kind() == io::ErrorKind::NotFound {
        BackendError::NotFound(*id)
    } else {
        BackendError::storage(operation, e)
    }
}

impl BlockBackend for FsBackend {
    fn open(&self, id: &BlockId, mode: OpenMode) -> BlockHandle {
        BlockHandle::new(*id, mode)
    }

    fn read(&self, handle: &mut BlockHandle, buf: &mut [u8]) -> BackendResult<usize> {
        handle.check_read()?;

        if matches!(handle.session, Session::Idle) {
            let path = self.block_path(handle.id());
            let file =
                File::open(&path).map_err(|e| not_found_or(handle.id(), Operation::Read, e))?;
            handle.session = Session::File(file);
        }

        let Session::File(file) = &mut handle.session else {
            return Err(handle.foreign_session(Operation::Read));
        };
        loop {
            match file.read(buf) {
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(BackendError::storage(Operation::Read, e)),
            }
        }
    }

    fn write(&self, handle: &mut BlockHandle, data: &[u8]) -> BackendResult<usize> {
        handle.check_write()?;

        if matches!(handle.session, Session::Idle) {
            handle.session = self.stage(handle.id(), Operation::Write)?;
        }

        let id = *handle.id();
        let result = match &mut handle.session {
            Session::Staged { file, written } => file
                .as_file_mut()
                .write_all(data)
                .map(|()| *written += data.len() as u64),
            Session::Poisoned => return Err(handle.poisoned_session(Operation::Write)),
            _ => return Err(handle.foreign_session(Operation::Write)),
        };
        if let Err(e) = result {
            // part of `data` may already be staged
            handle.poison();
            warn!(block = %id, error = %e, "discarded staged block after failed write");
            return Err(BackendError::storage(Operation::Write, e));
        }

        debug!(block = %id, len = data.len(), "staged block data");
        Ok(data.len())
    }

    fn commit(&self, handle: &mut BlockHandle) -> BackendResult<()> {
        if !handle.check_commit()? {
            return Ok(());
        }

        let id = *handle.id();
        let session = match std::mem::replace(&mut handle.session, Session::Idle) {
            Session::Idle => self.stage(&id, Operation::Commit)?,
            session => session,
        };
        let (file, written) = match session {
            Session::Staged { file, written } => (file, written),
            Session::Poisoned => {
                handle.session = Session::Poisoned;
                return Err(handle.poisoned_session(Operation::Commit));
            }
            other => {
                handle.session = other;
                return Err(handle.foreign_session(Operation::Commit));
            }
        };

        if let Err(e) = file.as_file().sync_all() {
            handle.session = Session::Staged { file, written };
            return Err(BackendError::storage(Operation::Commit, e));
        }

        let dest = self.block_path(&id);
        if let Some(parent) = dest.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                handle.session = Session::Staged { file, written };
                return Err(BackendError::storage(Operation::Commit, e));
            }
        }

        match file.persist(&dest) {
            Ok(_) => {
                handle.mark_committed();
                debug!(block = %id, size = written, "committed block");
                Ok(())
            }
            Err(e) => {
                handle.session = Session::Staged {
                    file: e.file,
                    written,
                };
                Err(BackendError::storage(Operation::Commit, e.error))
            }
        }
    }

    fn close(&self, handle: &mut BlockHandle) {
        let id = *handle.id();
        if let Session::Staged { file, .. } = handle.release() {
            let path = file.path().to_path_buf();
            if let Err(e) = file.close() {
                warn!(
                    block = %id,
                    path = %path.display(),
                    error = %e,
                    "failed to discard staged block"
                );
            }
        }
    }

    fn exists(&self, id: &BlockId) -> BackendResult<bool> {
        match fs::metadata(self.block_path(id)) {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(BackendError::storage(Operation::Exists, e)),
        }
    }

    fn remove(&self, id: &BlockId) -> BackendResult<()> {
        match fs::remove_file(self.block_path(id)) {
            Ok(()) => {
                debug!(block = %id, "removed block");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BackendError::storage(Operation::Remove, e)),
        }
    }

    fn stat(&self, id: &BlockId) -> BackendResult<BlockMetadata> {
        let meta = fs::metadata(self.block_path(id))
            .map_err(|e| not_found_or(id, Operation::Stat, e))?;
        Ok(BlockMetadata::committed(meta.len()).with_modified(meta.modified().ok()))
    }

    fn stat_by_handle(&self, handle: &BlockHandle) -> BackendResult<BlockMetadata> {
        handle.check_stat()?;

        match (handle.mode(), &handle.session) {
            (_, Session::Poisoned) => Err(handle.poisoned_session(Operation::Stat)),
            (OpenMode::Write, Session::Staged { written, .. }) => {
                Ok(BlockMetadata::staged(*written))
            }
            (OpenMode::Write, _) if handle.state() == HandleState::Opened => {
                Ok(BlockMetadata::staged(0))
            }
            _ => self.stat(handle.id()),
        }
    }

    fn foreach(&self, visitor: BlockVisitor<'_>) -> BackendResult<()> {
        let entries = match fs::read_dir(&self.block_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(BackendError::storage(Operation::Foreach, e)),
        };

        for entry in entries {
            let entry = entry.map_err(|e| BackendError::storage(Operation::Foreach, e))?;
            let name = entry.file_name();
            let is_prefix_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false)
                && name.to_str().is_some_and(|n| n.len() == 2);
            if !is_prefix_dir {
                continue;
            }
            if let Some(prefix) = name.to_str() {
                self.visit_prefix_dir(&entry.path(), prefix, visitor)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BackendError;
    use std::collections::HashSet;
    use tempfile::{tempdir, TempDir};

    fn backend() -> (TempDir, FsBackend) {
        let dir = tempdir().unwrap();
        let backend = FsBackend::new(dir.path().join("blocks"), dir.path().join("tmp")).unwrap();
        (dir, backend)
    }

    fn tmp_entries(backend: &FsBackend) -> usize {
        fs::read_dir(backend.tmp_dir()).unwrap().count()
    }

    #[test]
    fn fs_creates_directories() {
        let (_dir, backend) = backend();
        assert!(backend.block_dir().is_dir());
        assert!(backend.tmp_dir().is_dir());
    }

    #[test]
    fn fs_block_path_layout() {
        let (_dir, backend) = backend();
        let id = BlockId::for_content(b"");
        let path = backend.block_path(&id);
        assert!(path.ends_with("da/39a3ee5e6b4b0d3255bfef95601890afd80709"));
    }

    #[test]
    fn fs_write_commit_read() {
        let (_dir, backend) = backend();
        let id = BlockId::for_content(b"hello world");

        let mut handle = backend.open(&id, OpenMode::Write);
        assert_eq!(backend.write(&mut handle, b"hello").unwrap(), 5);
        assert_eq!(backend.write(&mut handle, b" world").unwrap(), 6);
        assert!(!backend.exists(&id).unwrap());
        backend.commit(&mut handle).unwrap();
        backend.close(&mut handle);

        assert!(backend.exists(&id).unwrap());
        assert_eq!(backend.read_block(&id).unwrap(), b"hello world");
        assert_eq!(backend.stat(&id).unwrap().size, 11);
        assert!(backend.block_path(&id).is_file());
    }

    #[test]
    fn fs_commit_without_writes_creates_empty_block() {
        let (_dir, backend) = backend();
        let id = BlockId::for_content(b"");

        let mut handle = backend.open(&id, OpenMode::Write);
        backend.commit(&mut handle).unwrap();
        backend.close(&mut handle);

        assert_eq!(backend.stat(&id).unwrap().size, 0);
        assert!(backend.read_block(&id).unwrap().is_empty());
    }

    #[test]
    fn fs_staged_file_lives_in_tmp_dir_until_commit() {
        let (_dir, backend) = backend();
        let id = BlockId::for_content(b"staged");

        let mut handle = backend.open(&id, OpenMode::Write);
        backend.write(&mut handle, b"staged").unwrap();
        assert_eq!(tmp_entries(&backend), 1);

        backend.commit(&mut handle).unwrap();
        assert_eq!(tmp_entries(&backend), 0);
        backend.close(&mut handle);
    }

    #[test]
    fn fs_close_discards_uncommitted_write() {
        let (_dir, backend) = backend();
        let id = BlockId::for_content(b"abandoned");

        let mut handle = backend.open(&id, OpenMode::Write);
        backend.write(&mut handle, b"abandoned").unwrap();
        backend.close(&mut handle);
        backend.close(&mut handle);

        assert_eq!(tmp_entries(&backend), 0);
        assert!(!backend.exists(&id).unwrap());
    }

    #[test]
    fn fs_read_missing_block_fails() {
        let (_dir, backend) = backend();
        let id = BlockId::for_content(b"missing");

        let mut handle = backend.open(&id, OpenMode::Read);
        let mut buf = [0u8; 8];
        assert!(matches!(
            backend.read(&mut handle, &mut buf),
            Err(BackendError::NotFound(_))
        ));
        assert!(matches!(backend.stat(&id), Err(BackendError::NotFound(_))));
        assert!(matches!(
            backend.stat_by_handle(&handle),
            Err(BackendError::NotFound(_))
        ));
    }

    #[test]
    fn fs_read_in_small_chunks() {
        let (_dir, backend) = backend();
        let id = BlockId::for_content(b"0123456789");
        backend.write_block(&id, b"0123456789").unwrap();

        let mut handle = backend.open(&id, OpenMode::Read);
        let mut buf = [0u8; 4];
        let mut out = Vec::new();
        loop {
            let n = backend.read(&mut handle, &mut buf).unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        assert_eq!(out, b"0123456789");
        assert_eq!(backend.stat_by_handle(&handle).unwrap().size, 10);
        backend.close(&mut handle);
    }

    #[test]
    fn fs_stat_by_write_handle_reports_staged_bytes() {
        let (_dir, backend) = backend();
        let id = BlockId::for_content(b"abc");

        let mut handle = backend.open(&id, OpenMode::Write);
        assert_eq!(backend.stat_by_handle(&handle).unwrap(), BlockMetadata::staged(0));
        backend.write(&mut handle, b"abc").unwrap();
        assert_eq!(backend.stat_by_handle(&handle).unwrap(), BlockMetadata::staged(3));

        backend.commit(&mut handle).unwrap();
        let meta = backend.stat_by_handle(&handle).unwrap();
        assert!(meta.exists);
        assert_eq!(meta.size, 3);
        assert!(meta.modified.is_some());
        backend.close(&mut handle);
    }

    #[test]
    fn fs_failed_write_is_never_committed() {
        let (_dir, backend) = backend();
        let id = BlockId::for_content(b"partial");

        let mut handle = backend.open(&id, OpenMode::Write);
        backend.write(&mut handle, b"part").unwrap();
        assert_eq!(tmp_entries(&backend), 1);

        // what the write path does when write_all stops partway
        handle.poison();
        assert_eq!(tmp_entries(&backend), 0);

        assert!(backend.write(&mut handle, b"ial").is_err());
        assert!(backend.stat_by_handle(&handle).is_err());
        assert!(matches!(
            backend.commit(&mut handle),
            Err(BackendError::Storage { .. })
        ));
        assert!(backend.commit(&mut handle).is_err());
        assert!(!backend.exists(&id).unwrap());

        backend.close(&mut handle);
        assert_eq!(handle.state(), HandleState::Closed);
        assert!(!backend.exists(&id).unwrap());
    }

    #[test]
    fn fs_commit_replaces_existing_content() {
        let (_dir, backend) = backend();
        let id = BlockId::for_content(b"v1");

        backend.write_block(&id, b"first").unwrap();
        backend.write_block(&id, b"second version").unwrap();
        assert_eq!(backend.read_block(&id).unwrap(), b"second version");
    }

    #[test]
    fn fs_remove_is_idempotent() {
        let (_dir, backend) = backend();
        let id = BlockId::for_content(b"gone");

        backend.remove(&id).unwrap();
        backend.write_block(&id, b"gone").unwrap();
        backend.remove(&id).unwrap();
        assert!(!backend.exists(&id).unwrap());
        backend.remove(&id).unwrap();
    }

    #[test]
    fn fs_foreach_visits_committed_blocks_only() {
        let (_dir, backend) = backend();
        let committed: HashSet<BlockId> = (0..5u8)
            .map(|i| {
                let id = BlockId::for_content(&[i]);
                backend.write_block(&id, &[i]).unwrap();
                id
            })
            .collect();

        let pending = BlockId::for_content(b"pending");
        let mut handle = backend.open(&pending, OpenMode::Write);
        backend.write(&mut handle, b"pending").unwrap();

        fs::write(backend.block_dir().join("README"), b"not a block").unwrap();
        fs::create_dir_all(backend.block_dir().join("zz")).unwrap();
        fs::write(backend.block_dir().join("zz").join("junk"), b"").unwrap();

        let mut seen = HashSet::new();
        backend
            .foreach(&mut |id| {
                assert!(seen.insert(*id), "visited {id} twice");
                Ok(())
            })
            .unwrap();
        assert_eq!(seen, committed);
        backend.close(&mut handle);
    }

    #[test]
    fn fs_foreach_stops_on_visitor_error() {
        let (_dir, backend) = backend();
        for i in 0..4u8 {
            backend.write_block(&BlockId::for_content(&[i]), &[i]).unwrap();
        }

        let mut visits = 0;
        let result = backend.foreach(&mut |id| {
            visits += 1;
            Err(BackendError::NotFound(*id))
        });
        assert!(matches!(result, Err(BackendError::NotFound(_))));
        assert_eq!(visits, 1);
    }

    #[test]
    fn fs_data_survives_reopen() {
        let dir = tempdir().unwrap();
        let id = BlockId::for_content(b"persistent data");

        {
            let backend = FsBackend::new(dir.path().join("b"), dir.path().join("t")).unwrap();
            backend.write_block(&id, b"persistent data").unwrap();
        }

        let backend = FsBackend::new(dir.path().join("b"), dir.path().join("t")).unwrap();
        assert_eq!(backend.read_block(&id).unwrap(), b"persistent data");
    }

    #[test]
    fn fs_new_fails_when_directory_is_a_file() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("occupied");
        fs::write(&file, b"x").unwrap();

        let result = FsBackend::new(file.join("blocks"), dir.path().join("tmp"));
        assert!(matches!(result, Err(BackendError::DriverInit { .. })));
    }
}
