//! Stress tests for blockstore backends.
//!
//! These helpers verify behavior under load and concurrent access to a
//! shared backend.

use blockstore_backend::{BlockBackend, BlockId, OpenMode};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Barrier;
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        Self {
            total_ops: successful + failed,
            successful_ops: successful,
            failed_ops: failed,
            duration,
        }
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of operations per thread.
    pub operations: usize,
    /// Number of concurrent threads.
    pub threads: usize,
    /// Size of each block in bytes.
    pub block_size: usize,
    /// Number of distinct block IDs.
    pub block_count: usize,
}

impl StressConfig {
    /// A configuration small enough for unit tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            operations: 20,
            threads: 4,
            block_size: 512,
            block_count: 8,
        }
    }
}

fn stress_id(n: usize) -> BlockId {
    BlockId::for_content(format!("stress:{n}").as_bytes())
}

/// Content thread `writer` commits in round `round`: one repeated byte, so a
/// mixture of two writes is detectable.
fn writer_content(writer: usize, round: usize, size: usize) -> Vec<u8> {
    vec![(writer * 31 + round) as u8 | 1; size]
}

/// Run a sequential write stress test.
pub fn stress_sequential_writes(
    backend: &dyn BlockBackend,
    config: &StressConfig,
) -> StressTestResult {
    let data = vec![0xABu8; config.block_size];

    let start = Instant::now();
    let mut successful = 0usize;
    let mut failed = 0usize;

    for i in 0..config.operations {
        match backend.write_block(&stress_id(i % config.block_count), &data) {
            Ok(()) => successful += 1,
            Err(_) => failed += 1,
        }
    }

    StressTestResult::new(successful, failed, start.elapsed())
}

/// Run a mixed write/read/remove workload from several threads.
pub fn stress_mixed_operations(
    backend: &dyn BlockBackend,
    config: &StressConfig,
) -> StressTestResult {
    let successful = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);
    let start = Instant::now();

    thread::scope(|scope| {
        for t in 0..config.threads {
            let successful = &successful;
            let failed = &failed;
            scope.spawn(move || {
                let data = vec![t as u8; config.block_size];
                for i in 0..config.operations {
                    let id = stress_id((t + i) % config.block_count);
                    let ok = match i % 4 {
                        0 | 1 => backend.write_block(&id, &data).is_ok(),
                        2 => match backend.read_block(&id) {
                            Ok(_) => true,
                            Err(e) => e.is_not_found(),
                        },
                        _ => backend.remove(&id).is_ok(),
                    };
                    if ok {
                        successful.fetch_add(1, Ordering::Relaxed);
                    } else {
                        failed.fetch_add(1, Ordering::Relaxed);
                    }
                }
            });
        }
    });

    StressTestResult::new(
        successful.into_inner(),
        failed.into_inner(),
        start.elapsed(),
    )
}

/// Commits different contents to one block from several threads at once
/// and checks that every observed version is exactly one writer's content.
///
/// Readers run alongside the writers. Returns the number of torn reads and
/// torn final states found, which must be zero.
pub fn stress_same_id_writers(backend: &dyn BlockBackend, config: &StressConfig) -> usize {
    let id = stress_id(usize::MAX);
    let torn = AtomicUsize::new(0);
    let barrier = Barrier::new(config.threads * 2);

    let is_whole = |content: &[u8]| {
        content.len() == config.block_size
            && content.first().map_or(true, |&b| content.iter().all(|&x| x == b))
    };

    thread::scope(|scope| {
        for writer in 0..config.threads {
            let barrier = &barrier;
            scope.spawn(move || {
                barrier.wait();
                for round in 0..config.operations {
                    let content = writer_content(writer, round, config.block_size);
                    let mut handle = backend.open(&id, OpenMode::Write);
                    // two halves, so a concurrent reader could see a partial block
                    let (head, tail) = content.split_at(content.len() / 2);
                    let result = backend
                        .write(&mut handle, head)
                        .and_then(|_| backend.write(&mut handle, tail))
                        .and_then(|_| backend.commit(&mut handle));
                    backend.close(&mut handle);
                    result.expect("Concurrent commit failed");
                }
            });
        }
        for _ in 0..config.threads {
            let barrier = &barrier;
            let torn = &torn;
            scope.spawn(move || {
                barrier.wait();
                for _ in 0..config.operations {
                    match backend.read_block(&id) {
                        Ok(content) if !is_whole(&content) => {
                            torn.fetch_add(1, Ordering::Relaxed);
                        }
                        Ok(_) => {}
                        Err(e) if e.is_not_found() => {}
                        Err(e) => panic!("Concurrent read failed: {e}"),
                    }
                }
            });
        }
    });

    let final_content = backend.read_block(&id).expect("Block missing after writers");
    if !is_whole(&final_content) {
        torn.fetch_add(1, Ordering::Relaxed);
    }
    let _ = backend.remove(&id);

    torn.into_inner()
}
