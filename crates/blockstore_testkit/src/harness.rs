//! Model-checking harness for backends.
//!
//! [`BlockHarness`] drives a backend while tracking the content every block
//! should hold, and asserts after each step that the backend agrees.

use crate::generators::BlockOperation;
use blockstore_backend::{BlockBackend, BlockId, OpenMode};
use std::collections::{BTreeSet, HashMap};

/// A test harness tracking expected block contents.
pub struct BlockHarness<'a> {
    /// The backend under test.
    pub backend: &'a dyn BlockBackend,
    blocks: HashMap<BlockId, Vec<u8>>,
}

impl<'a> BlockHarness<'a> {
    /// Creates a harness over a backend assumed to be empty.
    pub fn new(backend: &'a dyn BlockBackend) -> Self {
        Self {
            backend,
            blocks: HashMap::new(),
        }
    }

    /// Writes and commits a block, and tracks it.
    pub fn put(&mut self, id: BlockId, data: Vec<u8>) {
        self.backend
            .write_block(&id, &data)
            .expect("Failed to write block");
        self.blocks.insert(id, data);
    }

    /// Writes a block and closes the handle without committing.
    pub fn abandon(&mut self, id: BlockId, data: &[u8]) {
        let mut handle = self.backend.open(&id, OpenMode::Write);
        self.backend
            .write(&mut handle, data)
            .expect("Failed to stage block");
        self.backend.close(&mut handle);
    }

    /// Removes a block and updates tracking.
    pub fn remove(&mut self, id: BlockId) {
        self.backend.remove(&id).expect("Failed to remove block");
        self.blocks.remove(&id);
    }

    /// Reads a block and verifies it matches the tracked content.
    pub fn get_and_verify(&self, id: BlockId) -> Option<Vec<u8>> {
        let actual = match self.backend.read_block(&id) {
            Ok(content) => Some(content),
            Err(e) if e.is_not_found() => None,
            Err(e) => panic!("Failed to read block {id}: {e}"),
        };
        assert_eq!(
            actual.as_ref(),
            self.blocks.get(&id),
            "Block content mismatch for {id}"
        );
        actual
    }

    /// Applies one generated operation.
    pub fn apply(&mut self, operation: BlockOperation) {
        match operation {
            BlockOperation::Put { id, data } => self.put(id, data),
            BlockOperation::Abandon { id, data } => self.abandon(id, &data),
            BlockOperation::Remove { id } => self.remove(id),
            BlockOperation::Get { id } => {
                self.get_and_verify(id);
            }
        }
    }

    /// Verifies every tracked block and that nothing else is stored.
    pub fn verify_all(&self) {
        for (id, expected) in &self.blocks {
            let actual = self.backend.read_block(id).expect("Failed to read block");
            assert_eq!(&actual, expected, "Block content mismatch for {id}");

            let meta = self.backend.stat(id).expect("Failed to stat block");
            assert!(meta.exists);
            assert_eq!(meta.size, expected.len() as u64);
        }

        let mut listed = BTreeSet::new();
        self.backend
            .foreach(&mut |id| {
                assert!(listed.insert(*id), "Block {id} visited twice");
                Ok(())
            })
            .expect("Failed to enumerate blocks");
        let tracked: BTreeSet<BlockId> = self.blocks.keys().copied().collect();
        assert_eq!(listed, tracked, "Enumerated blocks differ from tracked blocks");
    }

    /// Returns the count of tracked blocks.
    pub fn tracked_count(&self) -> usize {
        self.blocks.len()
    }
}

/// Applies `operations` to an empty backend, verifying as it goes.
pub fn check_operation_sequence(backend: &dyn BlockBackend, operations: Vec<BlockOperation>) {
    let mut harness = BlockHarness::new(backend);
    for operation in operations {
        harness.apply(operation);
    }
    harness.verify_all();
}
