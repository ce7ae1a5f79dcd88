//! Contract tests run against every backend variant.

use blockstore_backend::s3::{HttpMethod, InMemoryS3};
use blockstore_backend::{
    BackendConfig, BackendError, BackendFactory, BackendKind, BlockBackend, BlockId,
    ConfigError, MemoryCluster, OpenMode,
};
use blockstore_testkit::prelude::*;
use proptest::prelude::*;
use std::sync::Arc;

#[test]
fn filesystem_contract() {
    run_contract_suite(&*TestBackend::filesystem());
}

#[test]
fn distributed_object_contract() {
    run_contract_suite(&*TestBackend::distributed());
}

#[test]
fn cloud_object_contract() {
    run_contract_suite(&*TestBackend::cloud());
}

#[test]
fn cloud_object_contract_with_paginated_listing() {
    run_contract_suite(&*TestBackend::cloud_with_page_size(2));
}

#[test]
fn contract_holds_alongside_existing_blocks() {
    with_each_backend(|fixture| {
        let resident = BlockId::for_content(b"resident");
        fixture.write_block(&resident, b"resident").unwrap();

        run_contract_suite(&**fixture);

        assert_eq!(fixture.read_block(&resident).unwrap(), b"resident");
    });
}

#[test]
fn same_id_writers_never_mix_on_any_backend() {
    with_each_backend(|fixture| {
        let torn = stress_same_id_writers(&**fixture, &StressConfig::quick());
        assert_eq!(torn, 0, "torn block on {}", fixture.kind());
    });
}

#[test]
fn mixed_workload_on_any_backend() {
    with_each_backend(|fixture| {
        let config = StressConfig::quick();
        let result = stress_mixed_operations(&**fixture, &config);
        assert_eq!(result.failed_ops, 0, "failures on {}", fixture.kind());
        assert_eq!(result.total_ops, config.threads * config.operations);
    });
}

#[test]
fn failed_commit_keeps_previous_version() {
    for fixture in [TestBackend::distributed(), TestBackend::cloud()] {
        let id = BlockId::for_content(b"stable");
        fixture.write_block(&id, b"stable").unwrap();

        fixture.set_fail_writes(true);
        let mut writer = fixture.open(&id, OpenMode::Write);
        fixture.write(&mut writer, b"replacement").unwrap();
        assert!(fixture.commit(&mut writer).is_err());
        fixture.close(&mut writer);
        fixture.set_fail_writes(false);

        assert_eq!(fixture.read_block(&id).unwrap(), b"stable");
    }
}

#[test]
fn cloud_requests_are_signed() {
    let fixture = TestBackend::cloud();
    let id = BlockId::for_content(b"signed");
    fixture.write_block(&id, b"signed").unwrap();

    let bucket = fixture.bucket().unwrap();
    let request = bucket.last_request().unwrap();
    assert_eq!(request.method, HttpMethod::Put);
    assert_eq!(request.url, format!("http://{TEST_BUCKET}.s3.amazonaws.com/{id}"));

    let date = request.header("Date").unwrap();
    let expected = blockstore_backend::s3::sign::sign(
        TEST_SECRET,
        &blockstore_backend::s3::sign::string_to_sign(
            "PUT",
            "",
            request.header("Content-Type").unwrap_or(""),
            date,
            &format!("/{TEST_BUCKET}/{id}"),
        ),
    )
    .unwrap();
    assert_eq!(
        request.header("Authorization").unwrap(),
        format!("AWS {TEST_KEY_ID}:{expected}")
    );
}

#[test]
fn cloud_rejects_wrong_credentials() {
    let bucket = Arc::new(InMemoryS3::new(TEST_BUCKET, TEST_KEY_ID, "a different secret"));
    let backend = BackendFactory::new()
        .with_http_transport(bucket.clone())
        .load(&cloud_config())
        .unwrap();

    let id = BlockId::for_content(b"denied");
    let err = backend.write_block(&id, b"denied").unwrap_err();
    assert!(matches!(err, BackendError::Remote { status: 403, .. }));
    assert!(bucket.is_empty());
}

#[test]
fn distributed_backends_share_a_pool() {
    let cluster = Arc::new(MemoryCluster::new());
    let factory = BackendFactory::new().with_cluster_connector(cluster.clone());
    let first = factory.load(&distributed_config()).unwrap();
    let second = factory.load(&distributed_config()).unwrap();

    let id = BlockId::for_content(b"shared");
    first.write_block(&id, b"shared").unwrap();
    assert_eq!(second.read_block(&id).unwrap(), b"shared");
    assert_eq!(cluster.pool_names(), vec![TEST_POOL.to_string()]);
}

#[test]
fn filesystem_factory_reports_missing_block_dir() {
    let config = BackendConfig::new().with("block_backend", "name", "filesystem");
    let err = BackendFactory::new().load(&config).unwrap_err();
    assert!(matches!(
        err,
        BackendError::Config(ConfigError::MissingParameter { ref key, .. }) if key == "block_dir"
    ));
}

#[test]
fn config_file_round_trip_through_factory() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("blockstore.toml");
    std::fs::write(
        &path,
        format!(
            "[block_backend]\nname = \"filesystem\"\nblock_dir = {:?}\ntmp_dir = {:?}\n",
            dir.path().join("blocks").display().to_string(),
            dir.path().join("tmp").display().to_string(),
        ),
    )
    .unwrap();

    let backend = BackendFactory::new()
        .load(&BackendConfig::load(&path).unwrap())
        .unwrap();
    assert_eq!(backend.kind(), BackendKind::Filesystem);
    run_contract_suite(&backend);
}

proptest! {
    #![proptest_config(PropTestConfig::quick().to_proptest_config())]

    #[test]
    fn operation_sequences_match_model(ops in operation_sequence_strategy(1, 40)) {
        for fixture in TestBackend::all() {
            check_operation_sequence(&*fixture, ops.clone());
        }
    }

    #[test]
    fn blocks_round_trip((id, data) in addressed_block_strategy()) {
        let fixture = TestBackend::filesystem();
        fixture.write_block(&id, &data).unwrap();
        prop_assert_eq!(fixture.read_block(&id).unwrap(), data);
    }
}
