//! Test fixtures for every backend variant.
//!
//! Each fixture is built through [`BackendFactory`] from a configuration,
//! the same way a service builds its backend, but on disposable media:
//! temp directories, an in-process cluster, an in-process S3 bucket.

use blockstore_backend::s3::InMemoryS3;
use blockstore_backend::{
    Backend, BackendConfig, BackendFactory, BackendKind, InMemoryObjectStore, MemoryCluster,
    BLOCK_BACKEND_SECTION, KEY_BLOCK_DIR, KEY_BUCKET_NAME, KEY_CLUSTER_CONFIG, KEY_KEY, KEY_KEY_ID,
    KEY_NAME, KEY_POOL, KEY_TMP_DIR, KEY_USE_HTTPS, S3_SECTION,
};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// Pool used by distributed-object fixtures.
pub const TEST_POOL: &str = "blocks";
/// Bucket used by cloud-object fixtures.
pub const TEST_BUCKET: &str = "test-blocks";
/// Access key ID accepted by the fixture bucket.
pub const TEST_KEY_ID: &str = "AKIDTESTKIT";
/// Secret key accepted by the fixture bucket.
pub const TEST_SECRET: &str = "testkit-secret";

/// The medium behind a fixture, kept alive as long as the backend.
#[derive(Debug)]
pub enum TestMedium {
    /// Temp directory holding `blocks/` and `tmp/`.
    Directory(TempDir),
    /// In-process cluster.
    Cluster(Arc<MemoryCluster>),
    /// In-process S3 endpoint.
    Bucket(Arc<InMemoryS3>),
}

/// A backend with automatic cleanup of its medium.
#[derive(Debug)]
pub struct TestBackend {
    /// The backend instance.
    pub backend: Backend,
    medium: TestMedium,
}

impl TestBackend {
    /// Creates a filesystem backend in a fresh temp directory.
    pub fn filesystem() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let backend = BackendFactory::new()
            .load(&filesystem_config(temp_dir.path()))
            .expect("Failed to load filesystem backend");

        Self {
            backend,
            medium: TestMedium::Directory(temp_dir),
        }
    }

    /// Creates a distributed-object backend on a fresh in-process cluster.
    pub fn distributed() -> Self {
        let cluster = Arc::new(MemoryCluster::new());
        let backend = BackendFactory::new()
            .with_cluster_connector(cluster.clone())
            .load(&distributed_config())
            .expect("Failed to load distributed-object backend");

        Self {
            backend,
            medium: TestMedium::Cluster(cluster),
        }
    }

    /// Creates a cloud-object backend on a fresh in-process bucket.
    pub fn cloud() -> Self {
        Self::cloud_with_page_size(1000)
    }

    /// Like [`cloud`](Self::cloud), with listings paginated every
    /// `page_size` keys.
    pub fn cloud_with_page_size(page_size: usize) -> Self {
        let bucket = Arc::new(
            InMemoryS3::new(TEST_BUCKET, TEST_KEY_ID, TEST_SECRET).with_page_size(page_size),
        );
        let backend = BackendFactory::new()
            .with_http_transport(bucket.clone())
            .load(&cloud_config())
            .expect("Failed to load cloud-object backend");

        Self {
            backend,
            medium: TestMedium::Bucket(bucket),
        }
    }

    /// Creates a fixture of the given variant.
    pub fn of_kind(kind: BackendKind) -> Self {
        match kind {
            BackendKind::Filesystem => Self::filesystem(),
            BackendKind::DistributedObject => Self::distributed(),
            BackendKind::CloudObject => Self::cloud(),
        }
    }

    /// Creates one fixture per variant.
    pub fn all() -> Vec<Self> {
        BackendKind::ALL.into_iter().map(Self::of_kind).collect()
    }

    /// Returns the medium.
    pub fn medium(&self) -> &TestMedium {
        &self.medium
    }

    /// Returns the block directory of a filesystem fixture.
    pub fn block_dir(&self) -> Option<std::path::PathBuf> {
        match &self.medium {
            TestMedium::Directory(dir) => Some(dir.path().join("blocks")),
            _ => None,
        }
    }

    /// Returns the pool of a distributed-object fixture.
    pub fn pool(&self) -> Option<Arc<InMemoryObjectStore>> {
        match &self.medium {
            TestMedium::Cluster(cluster) => Some(cluster.pool(TEST_POOL)),
            _ => None,
        }
    }

    /// Returns the bucket of a cloud-object fixture.
    pub fn bucket(&self) -> Option<&Arc<InMemoryS3>> {
        match &self.medium {
            TestMedium::Bucket(bucket) => Some(bucket),
            _ => None,
        }
    }

    /// Makes every write to the medium fail until reset.
    ///
    /// Filesystem fixtures are not affected.
    pub fn set_fail_writes(&self, fail: bool) {
        match &self.medium {
            TestMedium::Directory(_) => {}
            TestMedium::Cluster(cluster) => cluster.pool(TEST_POOL).set_fail_writes(fail),
            TestMedium::Bucket(bucket) => bucket.set_fail_writes(fail),
        }
    }
}

impl std::ops::Deref for TestBackend {
    type Target = Backend;

    fn deref(&self) -> &Self::Target {
        &self.backend
    }
}

/// Configuration of a filesystem backend rooted at `root`.
pub fn filesystem_config(root: &Path) -> BackendConfig {
    BackendConfig::new()
        .with(BLOCK_BACKEND_SECTION, KEY_NAME, "filesystem")
        .with(
            BLOCK_BACKEND_SECTION,
            KEY_BLOCK_DIR,
            root.join("blocks").display().to_string(),
        )
        .with(
            BLOCK_BACKEND_SECTION,
            KEY_TMP_DIR,
            root.join("tmp").display().to_string(),
        )
}

/// Configuration of a distributed-object backend on [`TEST_POOL`].
pub fn distributed_config() -> BackendConfig {
    BackendConfig::new()
        .with(BLOCK_BACKEND_SECTION, KEY_NAME, "distributed-object")
        .with(BLOCK_BACKEND_SECTION, KEY_CLUSTER_CONFIG, "memory://testkit")
        .with(BLOCK_BACKEND_SECTION, KEY_POOL, TEST_POOL)
}

/// Configuration of a cloud-object backend on [`TEST_BUCKET`], over plain
/// HTTP.
pub fn cloud_config() -> BackendConfig {
    BackendConfig::new()
        .with(BLOCK_BACKEND_SECTION, KEY_NAME, "cloud-object")
        .with(S3_SECTION, KEY_BUCKET_NAME, TEST_BUCKET)
        .with(S3_SECTION, KEY_KEY_ID, TEST_KEY_ID)
        .with(S3_SECTION, KEY_KEY, TEST_SECRET)
        .with(S3_SECTION, KEY_USE_HTTPS, "false")
}

/// Runs a test with a temporary filesystem backend.
///
/// # Example
///
/// ```rust
/// use blockstore_backend::{BlockBackend, BlockId};
/// use blockstore_testkit::with_temp_backend;
///
/// with_temp_backend(|backend| {
///     let id = BlockId::for_content(b"data");
///     backend.write_block(&id, b"data").unwrap();
///     assert!(backend.exists(&id).unwrap());
/// });
/// ```
pub fn with_temp_backend<F, R>(f: F) -> R
where
    F: FnOnce(&Backend) -> R,
{
    let fixture = TestBackend::filesystem();
    f(&fixture.backend)
}

/// Runs a test once against every backend variant.
pub fn with_each_backend<F>(mut f: F)
where
    F: FnMut(&TestBackend),
{
    for fixture in TestBackend::all() {
        f(&fixture);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockstore_backend::{BlockBackend, BlockId};

    #[test]
    fn fixtures_have_expected_kinds() {
        let kinds: Vec<BackendKind> = TestBackend::all().iter().map(|f| f.kind()).collect();
        assert_eq!(kinds, BackendKind::ALL.to_vec());
    }

    #[test]
    fn filesystem_fixture_exposes_block_dir() {
        let fixture = TestBackend::filesystem();
        let id = BlockId::for_content(b"fixture");
        fixture.write_block(&id, b"fixture").unwrap();

        let hex = id.to_hex();
        let path = fixture.block_dir().unwrap().join(&hex[..2]).join(&hex[2..]);
        assert!(path.is_file());
    }

    #[test]
    fn object_fixtures_expose_media() {
        let distributed = TestBackend::distributed();
        let id = BlockId::for_content(b"pool");
        distributed.write_block(&id, b"pool").unwrap();
        assert_eq!(distributed.pool().unwrap().len(), 1);

        let cloud = TestBackend::cloud();
        cloud.write_block(&id, b"pool").unwrap();
        assert_eq!(cloud.bucket().unwrap().len(), 1);
    }

    #[test]
    fn temp_backend_is_filesystem() {
        with_temp_backend(|backend| assert_eq!(backend.kind(), BackendKind::Filesystem));
    }
}
