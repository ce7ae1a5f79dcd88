//! Block metadata.

use std::time::SystemTime;

/// Size and existence information about a block.
///
/// Metadata is produced on demand by [`crate::BlockBackend::stat`] and
/// [`crate::BlockBackend::stat_by_handle`]; it is never cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockMetadata {
    /// Size of the block content in bytes.
    pub size: u64,
    /// Whether the content is committed and visible.
    pub exists: bool,
    /// Last modification time, if the medium reports one.
    pub modified: Option<SystemTime>,
}

impl BlockMetadata {
    /// Metadata for a committed block.
    #[must_use]
    pub const fn committed(size: u64) -> Self {
        Self {
            size,
            exists: true,
            modified: None,
        }
    }

    /// Metadata for bytes staged in a write session that is not yet visible.
    #[must_use]
    pub const fn staged(size: u64) -> Self {
        Self {
            size,
            exists: false,
            modified: None,
        }
    }

    /// Attaches a modification time.
    #[must_use]
    pub const fn with_modified(mut self, modified: Option<SystemTime>) -> Self {
        self.modified = modified;
        self
    }
}
