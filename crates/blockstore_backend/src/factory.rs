//! Configuration-driven backend selection.
//!
//! The factory reads `[block_backend] name`, selects exactly one variant
//! from a closed set, validates that variant's required parameters and
//! constructs it. Any failure aborts the whole load: the caller gets either
//! a ready backend or an error, never a partially initialized one.

use crate::backend::{BlockBackend, BlockVisitor};
use crate::block_id::BlockId;
use crate::cluster::{ClusterConnector, DISTRIBUTED_OBJECT_BACKEND};
use crate::config::{
    BackendConfig, BLOCK_BACKEND_SECTION, KEY_BLOCK_DIR, KEY_BUCKET_NAME, KEY_CLUSTER_CONFIG,
    KEY_HOST, KEY_KEY, KEY_KEY_ID, KEY_NAME, KEY_POOL, KEY_TMP_DIR, KEY_USE_HTTPS, S3_SECTION,
};
use crate::error::{BackendError, BackendResult, ConfigError};
use crate::fs::{FsBackend, FILESYSTEM_BACKEND};
use crate::handle::{BlockHandle, OpenMode};
use crate::metadata::BlockMetadata;
use crate::network;
use crate::object::ObjectBackend;
use crate::s3::{HttpTransport, ReqwestTransport, S3Client, S3Config, CLOUD_OBJECT_BACKEND};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// The closed set of backend variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Local directory tree.
    Filesystem,
    /// Pool of a distributed object cluster.
    DistributedObject,
    /// S3-compatible bucket.
    CloudObject,
}

impl BackendKind {
    /// All variants, in configuration order.
    pub const ALL: [BackendKind; 3] = [
        BackendKind::Filesystem,
        BackendKind::DistributedObject,
        BackendKind::CloudObject,
    ];

    /// Looks up a variant by its exact configuration name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Returns the configuration name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Filesystem => FILESYSTEM_BACKEND,
            Self::DistributedObject => DISTRIBUTED_OBJECT_BACKEND,
            Self::CloudObject => CLOUD_OBJECT_BACKEND,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A backend built by the factory.
///
/// One instance is created at startup and shared, typically behind an
/// `Arc`, by every caller for the lifetime of the process.
#[derive(Debug)]
pub enum Backend {
    /// See [`FsBackend`].
    Filesystem(FsBackend),
    /// [`ObjectBackend`] over a cluster pool.
    DistributedObject(ObjectBackend),
    /// [`ObjectBackend`] over an S3 bucket.
    CloudObject(ObjectBackend),
}

impl Backend {
    /// Returns which variant this is.
    #[must_use]
    pub fn kind(&self) -> BackendKind {
        match self {
            Self::Filesystem(_) => BackendKind::Filesystem,
            Self::DistributedObject(_) => BackendKind::DistributedObject,
            Self::CloudObject(_) => BackendKind::CloudObject,
        }
    }

    fn driver(&self) -> &dyn BlockBackend {
        match self {
            Self::Filesystem(backend) => backend,
            Self::DistributedObject(backend) | Self::CloudObject(backend) => backend,
        }
    }
}

impl BlockBackend for Backend {
    fn open(&self, id: &BlockId, mode: OpenMode) -> BlockHandle {
        self.driver().open(id, mode)
    }

    fn read(&self, handle: &mut BlockHandle, buf: &mut [u8]) -> BackendResult<usize> {
        self.driver().read(handle, buf)
    }

    fn write(&self, handle: &mut BlockHandle, data: &[u8]) -> BackendResult<usize> {
        self.driver().write(handle, data)
    }

    fn commit(&self, handle: &mut BlockHandle) -> BackendResult<()> {
        self.driver().commit(handle)
    }

    fn close(&self, handle: &mut BlockHandle) {
        self.driver().close(handle);
    }

    fn exists(&self, id: &BlockId) -> BackendResult<bool> {
        self.driver().exists(id)
    }

    fn remove(&self, id: &BlockId) -> BackendResult<()> {
        self.driver().remove(id)
    }

    fn stat(&self, id: &BlockId) -> BackendResult<BlockMetadata> {
        self.driver().stat(id)
    }

    fn stat_by_handle(&self, handle: &BlockHandle) -> BackendResult<BlockMetadata> {
        self.driver().stat_by_handle(handle)
    }

    fn foreach(&self, visitor: BlockVisitor<'_>) -> BackendResult<()> {
        self.driver().foreach(visitor)
    }
}

/// Builds backends from configuration.
///
/// Collaborators that reach outside the process can be injected:
/// - a [`ClusterConnector`] for the distributed-object variant (required
///   for that variant; there is no built-in cluster client)
/// - a [`HttpTransport`] for the cloud-object variant (defaults to
///   [`ReqwestTransport`] on the process-wide network context)
///
/// # Example
///
/// ```rust
/// use blockstore_backend::{BackendConfig, BackendFactory, BackendKind};
///
/// let dir = tempfile::tempdir().unwrap();
/// let config = BackendConfig::new()
///     .with("block_backend", "name", "filesystem")
///     .with("block_backend", "block_dir", dir.path().join("blocks").display().to_string())
///     .with("block_backend", "tmp_dir", dir.path().join("tmp").display().to_string());
///
/// let backend = BackendFactory::new().load(&config).unwrap();
/// assert_eq!(backend.kind(), BackendKind::Filesystem);
/// ```
#[derive(Default, Clone)]
pub struct BackendFactory {
    cluster: Option<Arc<dyn ClusterConnector>>,
    transport: Option<Arc<dyn HttpTransport>>,
}

impl BackendFactory {
    /// Creates a factory with default collaborators.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the connector used for the distributed-object variant.
    #[must_use]
    pub fn with_cluster_connector(mut self, connector: Arc<dyn ClusterConnector>) -> Self {
        self.cluster = Some(connector);
        self
    }

    /// Sets the HTTP transport used for the cloud-object variant.
    #[must_use]
    pub fn with_http_transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Selects, validates and constructs the configured backend.
    ///
    /// # Errors
    ///
    /// Returns:
    /// - `Config(MissingParameter)` for the first required parameter that is
    ///   absent, including `[block_backend] name`
    /// - `Config(UnknownBackend)` if the name matches no variant
    /// - `Config(InvalidValue)` for malformed optional parameters
    /// - `DriverInit` if the driver itself cannot be constructed
    pub fn load(&self, config: &BackendConfig) -> BackendResult<Backend> {
        let result = self.build(config);
        match &result {
            Ok(backend) => info!(backend = %backend.kind(), "block backend ready"),
            Err(e) => warn!(error = %e, "failed to load block backend"),
        }
        result
    }

    fn build(&self, config: &BackendConfig) -> BackendResult<Backend> {
        let name = config.require(BLOCK_BACKEND_SECTION, KEY_NAME)?;
        let kind = BackendKind::from_name(name)
            .ok_or_else(|| ConfigError::UnknownBackend(name.to_string()))?;

        match kind {
            BackendKind::Filesystem => self.build_filesystem(config),
            BackendKind::DistributedObject => self.build_distributed(config),
            BackendKind::CloudObject => self.build_cloud(config),
        }
    }

    fn build_filesystem(&self, config: &BackendConfig) -> BackendResult<Backend> {
        let block_dir = config.require(BLOCK_BACKEND_SECTION, KEY_BLOCK_DIR)?;
        let tmp_dir = config.require(BLOCK_BACKEND_SECTION, KEY_TMP_DIR)?;

        Ok(Backend::Filesystem(FsBackend::new(block_dir, tmp_dir)?))
    }

    fn build_distributed(&self, config: &BackendConfig) -> BackendResult<Backend> {
        let cluster_config = config.require(BLOCK_BACKEND_SECTION, KEY_CLUSTER_CONFIG)?;
        let pool = config.require(BLOCK_BACKEND_SECTION, KEY_POOL)?;

        let connector = self.cluster.as_ref().ok_or_else(|| BackendError::DriverInit {
            backend: DISTRIBUTED_OBJECT_BACKEND,
            reason: "no cluster connector is registered".to_string(),
        })?;
        let client = connector
            .connect(cluster_config, pool)
            .map_err(|e| BackendError::DriverInit {
                backend: DISTRIBUTED_OBJECT_BACKEND,
                reason: format!("cannot connect to pool {pool:?}: {e}"),
            })?;

        Ok(Backend::DistributedObject(ObjectBackend::new(
            DISTRIBUTED_OBJECT_BACKEND,
            client,
        )))
    }

    fn build_cloud(&self, config: &BackendConfig) -> BackendResult<Backend> {
        let bucket = config.require(S3_SECTION, KEY_BUCKET_NAME)?;
        let key_id = config.require(S3_SECTION, KEY_KEY_ID)?;
        let secret_key = config.require(S3_SECTION, KEY_KEY)?;

        let mut s3 = S3Config::new(bucket, key_id, secret_key)
            .with_https(config.get_bool(S3_SECTION, KEY_USE_HTTPS, true)?);
        if let Some(host) = config.get(S3_SECTION, KEY_HOST).filter(|h| !h.trim().is_empty()) {
            s3 = s3.with_host(host.trim());
        }

        let transport: Arc<dyn HttpTransport> = match &self.transport {
            Some(transport) => Arc::clone(transport),
            None => Arc::new(ReqwestTransport::new(network::init()?)),
        };

        let client = S3Client::new(s3, transport);
        Ok(Backend::CloudObject(ObjectBackend::new(
            CLOUD_OBJECT_BACKEND,
            Arc::new(client),
        )))
    }
}

impl fmt::Debug for BackendFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendFactory")
            .field("cluster_connector", &self.cluster.is_some())
            .field("http_transport", &self.transport.is_some())
            .finish()
    }
}

/// Builds the configured backend with a default [`BackendFactory`].
///
/// # Errors
///
/// See [`BackendFactory::load`].
pub fn load_block_backend(config: &BackendConfig) -> BackendResult<Backend> {
    BackendFactory::new().load(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::MemoryCluster;
    use crate::s3::InMemoryS3;
    use tempfile::tempdir;

    fn fs_config(dir: &std::path::Path) -> BackendConfig {
        BackendConfig::new()
            .with(BLOCK_BACKEND_SECTION, KEY_NAME, "filesystem")
            .with(
                BLOCK_BACKEND_SECTION,
                KEY_BLOCK_DIR,
                dir.join("blocks").display().to_string(),
            )
            .with(
                BLOCK_BACKEND_SECTION,
                KEY_TMP_DIR,
                dir.join("tmp").display().to_string(),
            )
    }

    fn missing_key(err: BackendError) -> String {
        match err {
            BackendError::Config(ConfigError::MissingParameter { key, .. }) => key,
            other => panic!("expected missing parameter, got {other:?}"),
        }
    }

    #[test]
    fn kind_names_round_trip() {
        for kind in BackendKind::ALL {
            assert_eq!(BackendKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(BackendKind::from_name("Filesystem"), None);
        assert_eq!(BackendKind::from_name("ceph"), None);
    }

    #[test]
    fn missing_name_fails() {
        let err = load_block_backend(&BackendConfig::new()).unwrap_err();
        assert_eq!(missing_key(err), KEY_NAME);
    }

    #[test]
    fn unknown_name_is_reported() {
        let config = BackendConfig::new().with(BLOCK_BACKEND_SECTION, KEY_NAME, "tape-library");
        let err = load_block_backend(&config).unwrap_err();
        assert!(err.is_configuration());
        assert!(matches!(
            &err,
            BackendError::Config(ConfigError::UnknownBackend(name)) if name == "tape-library"
        ));
        assert!(err.to_string().contains("tape-library"));
    }

    #[test]
    fn filesystem_loads() {
        let dir = tempdir().unwrap();
        let backend = load_block_backend(&fs_config(dir.path())).unwrap();
        assert_eq!(backend.kind(), BackendKind::Filesystem);
        assert!(dir.path().join("blocks").is_dir());
        assert!(dir.path().join("tmp").is_dir());
    }

    #[test]
    fn filesystem_requires_block_dir_first() {
        let config = BackendConfig::new().with(BLOCK_BACKEND_SECTION, KEY_NAME, "filesystem");
        assert_eq!(missing_key(load_block_backend(&config).unwrap_err()), KEY_BLOCK_DIR);

        let config = config.with(BLOCK_BACKEND_SECTION, KEY_BLOCK_DIR, "/nonexistent/blocks");
        assert_eq!(missing_key(load_block_backend(&config).unwrap_err()), KEY_TMP_DIR);
    }

    #[test]
    fn filesystem_missing_tmp_dir_creates_nothing() {
        let dir = tempdir().unwrap();
        let config = BackendConfig::new()
            .with(BLOCK_BACKEND_SECTION, KEY_NAME, "filesystem")
            .with(
                BLOCK_BACKEND_SECTION,
                KEY_BLOCK_DIR,
                dir.path().join("blocks").display().to_string(),
            );

        assert!(load_block_backend(&config).is_err());
        assert!(!dir.path().join("blocks").exists());
    }

    #[test]
    fn distributed_requires_parameters_in_order() {
        let config =
            BackendConfig::new().with(BLOCK_BACKEND_SECTION, KEY_NAME, "distributed-object");
        assert_eq!(
            missing_key(load_block_backend(&config).unwrap_err()),
            KEY_CLUSTER_CONFIG
        );

        let config = config.with(BLOCK_BACKEND_SECTION, KEY_CLUSTER_CONFIG, "/etc/cluster.conf");
        assert_eq!(missing_key(load_block_backend(&config).unwrap_err()), KEY_POOL);
    }

    #[test]
    fn distributed_without_connector_fails_to_initialize() {
        let config = BackendConfig::new()
            .with(BLOCK_BACKEND_SECTION, KEY_NAME, "distributed-object")
            .with(BLOCK_BACKEND_SECTION, KEY_CLUSTER_CONFIG, "/etc/cluster.conf")
            .with(BLOCK_BACKEND_SECTION, KEY_POOL, "blocks");

        let err = load_block_backend(&config).unwrap_err();
        assert!(matches!(
            err,
            BackendError::DriverInit {
                backend: DISTRIBUTED_OBJECT_BACKEND,
                ..
            }
        ));
    }

    #[test]
    fn distributed_loads_with_connector() {
        let cluster = Arc::new(MemoryCluster::new());
        let config = BackendConfig::new()
            .with(BLOCK_BACKEND_SECTION, KEY_NAME, "distributed-object")
            .with(BLOCK_BACKEND_SECTION, KEY_CLUSTER_CONFIG, "/etc/cluster.conf")
            .with(BLOCK_BACKEND_SECTION, KEY_POOL, "blocks");

        let backend = BackendFactory::new()
            .with_cluster_connector(cluster.clone())
            .load(&config)
            .unwrap();
        assert_eq!(backend.kind(), BackendKind::DistributedObject);

        let id = BlockId::for_content(b"pooled");
        backend.write_block(&id, b"pooled").unwrap();
        assert_eq!(cluster.pool("blocks").keys(), vec![id.to_hex()]);
    }

    #[test]
    fn cloud_requires_parameters_in_order() {
        let config = BackendConfig::new().with(BLOCK_BACKEND_SECTION, KEY_NAME, "cloud-object");
        assert_eq!(
            missing_key(load_block_backend(&config).unwrap_err()),
            KEY_BUCKET_NAME
        );

        let config = config.with(S3_SECTION, KEY_BUCKET_NAME, "blocks");
        assert_eq!(missing_key(load_block_backend(&config).unwrap_err()), KEY_KEY_ID);

        let config = config.with(S3_SECTION, KEY_KEY_ID, "AKID");
        assert_eq!(missing_key(load_block_backend(&config).unwrap_err()), KEY_KEY);
    }

    #[test]
    fn cloud_parameters_in_wrong_section_are_missing() {
        let config = BackendConfig::new()
            .with(BLOCK_BACKEND_SECTION, KEY_NAME, "cloud-object")
            .with(BLOCK_BACKEND_SECTION, KEY_BUCKET_NAME, "blocks");
        assert_eq!(
            missing_key(load_block_backend(&config).unwrap_err()),
            KEY_BUCKET_NAME
        );
    }

    #[test]
    fn cloud_rejects_bad_https_flag() {
        let config = BackendConfig::new()
            .with(BLOCK_BACKEND_SECTION, KEY_NAME, "cloud-object")
            .with(S3_SECTION, KEY_BUCKET_NAME, "blocks")
            .with(S3_SECTION, KEY_KEY_ID, "AKID")
            .with(S3_SECTION, KEY_KEY, "secret")
            .with(S3_SECTION, KEY_USE_HTTPS, "maybe");

        let err = load_block_backend(&config).unwrap_err();
        assert!(matches!(
            err,
            BackendError::Config(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn cloud_loads_with_transport() {
        let server = Arc::new(InMemoryS3::new("blocks", "AKID", "secret"));
        let config = BackendConfig::new()
            .with(BLOCK_BACKEND_SECTION, KEY_NAME, "cloud-object")
            .with(S3_SECTION, KEY_BUCKET_NAME, "blocks")
            .with(S3_SECTION, KEY_KEY_ID, "AKID")
            .with(S3_SECTION, KEY_KEY, "secret")
            .with(S3_SECTION, KEY_HOST, "objects.internal")
            .with(S3_SECTION, KEY_USE_HTTPS, "false");

        let backend = BackendFactory::new()
            .with_http_transport(server.clone())
            .load(&config)
            .unwrap();
        assert_eq!(backend.kind(), BackendKind::CloudObject);

        let id = BlockId::for_content(b"cloud");
        backend.write_block(&id, b"cloud").unwrap();
        assert_eq!(server.len(), 1);

        let request = server.last_request().unwrap();
        assert!(request.url.starts_with("http://blocks.objects.internal/"));
    }

    #[test]
    fn cloud_default_transport_initializes_network() {
        let config = BackendConfig::new()
            .with(BLOCK_BACKEND_SECTION, KEY_NAME, "cloud-object")
            .with(S3_SECTION, KEY_BUCKET_NAME, "blocks")
            .with(S3_SECTION, KEY_KEY_ID, "AKID")
            .with(S3_SECTION, KEY_KEY, "secret");

        let backend = load_block_backend(&config).unwrap();
        assert_eq!(backend.kind(), BackendKind::CloudObject);
        assert!(network::is_initialized());
    }
}
