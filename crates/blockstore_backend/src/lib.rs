//! # Blockstore Backend
//!
//! Block storage backends for a deduplicating file-sync service.
//!
//! Callers split files into blocks, name each block by the SHA-1 of its
//! content and persist or retrieve them through [`BlockBackend`]. Backends
//! are **opaque byte stores** keyed by [`BlockId`]; they never interpret
//! block content.
//!
//! ## Design Principles
//!
//! - One backend instance per process, selected from configuration
//! - Writes are staged through a handle and published atomically on commit
//! - Backends are `Send + Sync`; handles are owned by one code path
//! - Network clients are set up by an explicit process-wide init step
//!
//! ## Available Backends
//!
//! - [`FsBackend`] - two-level directory tree on a local filesystem
//! - [`ObjectBackend`] over a [`ClusterConnector`] pool - distributed object cluster
//! - [`ObjectBackend`] over an [`S3Client`] - S3-compatible bucket
//!
//! ## Example
//!
//! ```rust
//! use blockstore_backend::{BlockBackend, BlockId, FsBackend};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let backend = FsBackend::new(dir.path().join("blocks"), dir.path().join("tmp")).unwrap();
//!
//! let id = BlockId::for_content(b"hello world");
//! backend.write_block(&id, b"hello world").unwrap();
//! assert!(backend.exists(&id).unwrap());
//! assert_eq!(backend.read_block(&id).unwrap(), b"hello world");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod block_id;
mod cluster;
mod config;
mod error;
mod factory;
mod fs;
mod handle;
mod memory;
mod metadata;
pub mod network;
mod object;
pub mod s3;

pub use backend::{BlockBackend, BlockVisitor};
pub use block_id::{BlockId, BLOCK_ID_LEN};
pub use cluster::{ClusterConnector, MemoryCluster, DISTRIBUTED_OBJECT_BACKEND};
pub use config::{
    BackendConfig, BLOCK_BACKEND_SECTION, KEY_BLOCK_DIR, KEY_BUCKET_NAME, KEY_CLUSTER_CONFIG,
    KEY_HOST, KEY_KEY, KEY_KEY_ID, KEY_NAME, KEY_POOL, KEY_TMP_DIR, KEY_USE_HTTPS, S3_SECTION,
};
pub use error::{BackendError, BackendResult, ConfigError, ConfigResult, Operation};
pub use factory::{load_block_backend, Backend, BackendFactory, BackendKind};
pub use fs::{FsBackend, FILESYSTEM_BACKEND};
pub use handle::{BlockHandle, HandleState, OpenMode};
pub use memory::InMemoryObjectStore;
pub use metadata::BlockMetadata;
pub use object::{ObjectBackend, ObjectClient, ObjectError, ObjectInfo, ObjectResult};
pub use s3::{S3Client, S3Config, CLOUD_OBJECT_BACKEND};
