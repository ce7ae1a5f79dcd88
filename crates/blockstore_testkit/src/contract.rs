//! Behavioral contract of [`BlockBackend`].
//!
//! Every backend variant must pass [`run_contract_suite`]. Each check uses
//! block IDs of its own, so the suite can run against a backend that
//! already holds unrelated blocks, but not concurrently with other writers.

use blockstore_backend::{BackendError, BlockBackend, BlockId, HandleState, OpenMode};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// A single named contract check.
pub type ContractCheck = fn(&dyn BlockBackend);

/// All checks, in the order [`run_contract_suite`] runs them.
pub const CONTRACT_CHECKS: &[(&str, ContractCheck)] = &[
    ("round_trip", check_round_trip),
    ("empty_block", check_empty_block),
    ("chunked_write_and_read", check_chunked_write_and_read),
    ("invisible_before_commit", check_invisible_before_commit),
    ("abandoned_write_is_discarded", check_abandoned_write_is_discarded),
    ("remove", check_remove),
    ("remove_absent", check_remove_absent),
    ("mode_mismatch", check_mode_mismatch),
    ("closed_handle", check_closed_handle),
    ("commit_idempotent", check_commit_idempotent),
    ("overwrite", check_overwrite),
    ("stat_by_handle", check_stat_by_handle),
    ("foreach_visits_committed", check_foreach_visits_committed),
    ("foreach_stops_on_error", check_foreach_stops_on_error),
];

/// Runs every contract check against `backend`, panicking on the first
/// violation.
pub fn run_contract_suite(backend: &dyn BlockBackend) {
    for (name, check) in CONTRACT_CHECKS {
        debug!(check = name, "running contract check");
        check(backend);
    }
}

/// Returns a block ID unique to `label`.
pub fn contract_id(label: &str) -> BlockId {
    BlockId::for_content(format!("contract:{label}").as_bytes())
}

fn stored_ids(backend: &dyn BlockBackend) -> BTreeSet<BlockId> {
    let mut ids = BTreeSet::new();
    backend
        .foreach(&mut |id| {
            assert!(ids.insert(*id), "foreach visited {id} twice");
            Ok(())
        })
        .expect("foreach failed");
    ids
}

/// write + commit, then read returns exactly the content.
pub fn check_round_trip(backend: &dyn BlockBackend) {
    let id = contract_id("round_trip");
    let data = b"the quick brown fox jumps over the lazy dog".to_vec();

    assert!(!backend.exists(&id).unwrap());
    backend.write_block(&id, &data).unwrap();

    assert!(backend.exists(&id).unwrap());
    assert_eq!(backend.read_block(&id).unwrap(), data);

    let meta = backend.stat(&id).unwrap();
    assert!(meta.exists);
    assert_eq!(meta.size, data.len() as u64);

    backend.remove(&id).unwrap();
}

/// A committed empty block exists and reads as empty.
pub fn check_empty_block(backend: &dyn BlockBackend) {
    let id = contract_id("empty_block");

    backend.write_block(&id, &[]).unwrap();
    assert!(backend.exists(&id).unwrap());
    assert!(backend.read_block(&id).unwrap().is_empty());
    assert_eq!(backend.stat(&id).unwrap().size, 0);

    backend.remove(&id).unwrap();
}

/// Several writes accumulate; small reads see the bytes in order.
pub fn check_chunked_write_and_read(backend: &dyn BlockBackend) {
    let id = contract_id("chunked");
    let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();

    let mut handle = backend.open(&id, OpenMode::Write);
    for chunk in data.chunks(777) {
        assert_eq!(backend.write(&mut handle, chunk).unwrap(), chunk.len());
    }
    backend.commit(&mut handle).unwrap();
    backend.close(&mut handle);

    let mut handle = backend.open(&id, OpenMode::Read);
    let mut content = Vec::new();
    let mut buf = [0u8; 100];
    loop {
        let n = backend.read(&mut handle, &mut buf).unwrap();
        if n == 0 {
            break;
        }
        content.extend_from_slice(&buf[..n]);
    }
    assert_eq!(backend.read(&mut handle, &mut buf).unwrap(), 0);
    backend.close(&mut handle);
    assert_eq!(content, data);

    backend.remove(&id).unwrap();
}

/// Before commit: exists is false, read and stat report not found.
pub fn check_invisible_before_commit(backend: &dyn BlockBackend) {
    let id = contract_id("invisible");

    let mut writer = backend.open(&id, OpenMode::Write);
    backend.write(&mut writer, b"staged").unwrap();

    assert!(!backend.exists(&id).unwrap());
    assert!(backend.stat(&id).unwrap_err().is_not_found());
    assert!(backend.read_block(&id).unwrap_err().is_not_found());
    assert!(!stored_ids(backend).contains(&id));

    backend.commit(&mut writer).unwrap();
    assert!(backend.exists(&id).unwrap());
    backend.close(&mut writer);

    backend.remove(&id).unwrap();
}

/// Closing an uncommitted write handle publishes nothing.
pub fn check_abandoned_write_is_discarded(backend: &dyn BlockBackend) {
    let id = contract_id("abandoned");

    let mut writer = backend.open(&id, OpenMode::Write);
    backend.write(&mut writer, b"never committed").unwrap();
    backend.close(&mut writer);

    assert!(!backend.exists(&id).unwrap());
    assert!(!stored_ids(backend).contains(&id));
}

/// remove then exists is false.
pub fn check_remove(backend: &dyn BlockBackend) {
    let id = contract_id("remove");

    backend.write_block(&id, b"doomed").unwrap();
    backend.remove(&id).unwrap();

    assert!(!backend.exists(&id).unwrap());
    assert!(backend.stat(&id).unwrap_err().is_not_found());
}

/// Removing an absent block succeeds.
pub fn check_remove_absent(backend: &dyn BlockBackend) {
    let id = contract_id("remove_absent");

    backend.remove(&id).unwrap();
    backend.remove(&id).unwrap();
    assert!(!backend.exists(&id).unwrap());
}

/// Writes on read handles and reads on write handles are rejected.
pub fn check_mode_mismatch(backend: &dyn BlockBackend) {
    let id = contract_id("mode_mismatch");
    backend.write_block(&id, b"content").unwrap();

    let mut reader = backend.open(&id, OpenMode::Read);
    assert!(matches!(
        backend.write(&mut reader, b"x"),
        Err(BackendError::ModeMismatch {
            mode: OpenMode::Read,
            ..
        })
    ));
    assert!(matches!(
        backend.commit(&mut reader),
        Err(BackendError::ModeMismatch { .. })
    ));
    backend.close(&mut reader);

    let mut writer = backend.open(&id, OpenMode::Write);
    let mut buf = [0u8; 8];
    assert!(matches!(
        backend.read(&mut writer, &mut buf),
        Err(BackendError::ModeMismatch {
            mode: OpenMode::Write,
            ..
        })
    ));
    backend.close(&mut writer);

    assert_eq!(backend.read_block(&id).unwrap(), b"content");
    backend.remove(&id).unwrap();
}

/// Every operation on a closed handle fails; close is idempotent.
pub fn check_closed_handle(backend: &dyn BlockBackend) {
    let id = contract_id("closed_handle");
    backend.write_block(&id, b"content").unwrap();

    let mut reader = backend.open(&id, OpenMode::Read);
    backend.close(&mut reader);
    backend.close(&mut reader);
    assert_eq!(reader.state(), HandleState::Closed);

    let mut buf = [0u8; 8];
    assert!(matches!(
        backend.read(&mut reader, &mut buf),
        Err(BackendError::HandleClosed { .. })
    ));
    assert!(matches!(
        backend.stat_by_handle(&reader),
        Err(BackendError::HandleClosed { .. })
    ));

    let mut writer = backend.open(&id, OpenMode::Write);
    backend.close(&mut writer);
    assert!(matches!(
        backend.write(&mut writer, b"late"),
        Err(BackendError::HandleClosed { .. })
    ));
    assert!(matches!(
        backend.commit(&mut writer),
        Err(BackendError::HandleClosed { .. })
    ));

    assert_eq!(backend.read_block(&id).unwrap(), b"content");
    backend.remove(&id).unwrap();
}

/// A second commit is a no-op; writing after commit fails.
pub fn check_commit_idempotent(backend: &dyn BlockBackend) {
    let id = contract_id("commit_idempotent");

    let mut writer = backend.open(&id, OpenMode::Write);
    backend.write(&mut writer, b"once").unwrap();
    backend.commit(&mut writer).unwrap();
    assert_eq!(writer.state(), HandleState::Committed);
    backend.commit(&mut writer).unwrap();
    assert!(matches!(
        backend.write(&mut writer, b"twice"),
        Err(BackendError::AlreadyCommitted(committed)) if committed == id
    ));
    backend.close(&mut writer);

    assert_eq!(backend.read_block(&id).unwrap(), b"once");
    backend.remove(&id).unwrap();
}

/// A later commit replaces the whole block.
pub fn check_overwrite(backend: &dyn BlockBackend) {
    let id = contract_id("overwrite");

    backend.write_block(&id, b"a longer first version").unwrap();
    backend.write_block(&id, b"short").unwrap();

    assert_eq!(backend.read_block(&id).unwrap(), b"short");
    assert_eq!(backend.stat(&id).unwrap().size, 5);
    backend.remove(&id).unwrap();
}

/// stat_by_handle reports staged bytes on write handles and stored
/// metadata on read handles.
pub fn check_stat_by_handle(backend: &dyn BlockBackend) {
    let id = contract_id("stat_by_handle");

    let mut writer = backend.open(&id, OpenMode::Write);
    let meta = backend.stat_by_handle(&writer).unwrap();
    assert_eq!((meta.size, meta.exists), (0, false));

    backend.write(&mut writer, b"12345").unwrap();
    backend.write(&mut writer, b"678").unwrap();
    let meta = backend.stat_by_handle(&writer).unwrap();
    assert_eq!((meta.size, meta.exists), (8, false));

    backend.commit(&mut writer).unwrap();
    let meta = backend.stat_by_handle(&writer).unwrap();
    assert_eq!((meta.size, meta.exists), (8, true));
    backend.close(&mut writer);

    let mut reader = backend.open(&id, OpenMode::Read);
    let meta = backend.stat_by_handle(&reader).unwrap();
    assert_eq!((meta.size, meta.exists), (8, true));
    assert_eq!(meta, backend.stat(&id).unwrap());

    // a read session in progress must not pin the metadata
    let mut buf = [0u8; 2];
    assert_eq!(backend.read(&mut reader, &mut buf).unwrap(), 2);
    assert_eq!(backend.stat_by_handle(&reader).unwrap(), backend.stat(&id).unwrap());

    backend.remove(&id).unwrap();
    assert!(!backend.exists(&id).unwrap());
    assert!(backend.stat_by_handle(&reader).unwrap_err().is_not_found());
    backend.close(&mut reader);
}

/// foreach visits exactly the committed blocks, once each.
pub fn check_foreach_visits_committed(backend: &dyn BlockBackend) {
    let before = stored_ids(backend);
    let ids: Vec<BlockId> = (1..=3).map(|n| contract_id(&format!("foreach:{n}"))).collect();
    for id in &ids {
        backend.write_block(id, id.to_hex().as_bytes()).unwrap();
    }

    let mut pending = backend.open(&contract_id("foreach:pending"), OpenMode::Write);
    backend.write(&mut pending, b"pending").unwrap();

    let mut visits: HashMap<BlockId, usize> = HashMap::new();
    backend
        .foreach(&mut |id| {
            *visits.entry(*id).or_default() += 1;
            Ok(())
        })
        .unwrap();
    backend.close(&mut pending);

    assert!(visits.values().all(|&count| count == 1));
    let visited: BTreeSet<BlockId> = visits.into_keys().collect();
    let expected: BTreeSet<BlockId> = before.iter().chain(&ids).copied().collect();
    assert_eq!(visited, expected);

    for id in &ids {
        backend.remove(id).unwrap();
    }
    assert_eq!(stored_ids(backend), before);
}

/// A visitor error stops the iteration and is returned.
pub fn check_foreach_stops_on_error(backend: &dyn BlockBackend) {
    let ids: Vec<BlockId> = (1..=3).map(|n| contract_id(&format!("stop:{n}"))).collect();
    for id in &ids {
        backend.write_block(id, b"x").unwrap();
    }

    let mut calls = 0;
    let result = backend.foreach(&mut |id| {
        calls += 1;
        Err(BackendError::NotFound(*id))
    });
    assert!(matches!(result, Err(BackendError::NotFound(_))));
    assert_eq!(calls, 1);

    for id in &ids {
        backend.remove(id).unwrap();
    }
}
