//! Property-based test generators using proptest.
//!
//! Provides strategies for block ids, block contents and operation
//! sequences.

use blockstore_backend::BlockId;
use proptest::prelude::*;

/// Strategy for generating arbitrary block IDs.
pub fn block_id_strategy() -> impl Strategy<Value = BlockId> {
    prop::array::uniform20(any::<u8>()).prop_map(BlockId::from_digest)
}

/// Strategy for generating well-formed block ID renderings.
pub fn block_id_hex_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[0-9a-f]{40}").expect("Invalid regex")
}

/// Strategy for generating strings that are not valid block IDs.
pub fn invalid_block_id_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        // wrong length
        prop::string::string_regex("[0-9a-f]{0,39}").expect("Invalid regex"),
        prop::string::string_regex("[0-9a-f]{41,60}").expect("Invalid regex"),
        // right length, at least one character outside [0-9a-f]
        (
            prop::string::string_regex("[0-9a-f]{39}").expect("Invalid regex"),
            prop::string::string_regex("[g-zA-Z_./ -]").expect("Invalid regex"),
            0usize..40,
        )
            .prop_map(|(mut hex, bad, at)| {
                hex.insert_str(at, &bad);
                hex
            }),
    ]
}

/// Strategy for generating block content.
///
/// Includes empty blocks and blocks spanning several copy chunks.
pub fn block_data_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![
        4 => prop::collection::vec(any::<u8>(), 0..1024),
        1 => prop::collection::vec(any::<u8>(), 64 * 1024..160 * 1024),
    ]
}

/// Strategy for generating block content together with its content ID.
pub fn addressed_block_strategy() -> impl Strategy<Value = (BlockId, Vec<u8>)> {
    block_data_strategy().prop_map(|data| (BlockId::for_content(&data), data))
}

/// A single operation against a backend.
#[derive(Debug, Clone)]
pub enum BlockOperation {
    /// Write and commit a block.
    Put {
        /// Block ID
        id: BlockId,
        /// Block content
        data: Vec<u8>,
    },
    /// Write a block and close without committing.
    Abandon {
        /// Block ID
        id: BlockId,
        /// Block content
        data: Vec<u8>,
    },
    /// Remove a block.
    Remove {
        /// Block ID
        id: BlockId,
    },
    /// Read a block.
    Get {
        /// Block ID
        id: BlockId,
    },
}

/// Strategy for generating operations over a small set of IDs, so that
/// overwrites and removals of existing blocks are common.
pub fn block_operation_strategy() -> impl Strategy<Value = BlockOperation> {
    let id = (0u8..8).prop_map(|n| BlockId::from_digest([n; 20]));
    let data = || prop::collection::vec(any::<u8>(), 0..256);
    prop_oneof![
        3 => (id.clone(), data()).prop_map(|(id, data)| BlockOperation::Put { id, data }),
        1 => (id.clone(), data()).prop_map(|(id, data)| BlockOperation::Abandon { id, data }),
        1 => id.clone().prop_map(|id| BlockOperation::Remove { id }),
        2 => id.prop_map(|id| BlockOperation::Get { id }),
    ]
}

/// Strategy for generating a sequence of operations.
pub fn operation_sequence_strategy(
    min_ops: usize,
    max_ops: usize,
) -> impl Strategy<Value = Vec<BlockOperation>> {
    prop::collection::vec(block_operation_strategy(), min_ops..max_ops)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #![proptest_config(PropTestConfig::quick().to_proptest_config())]

        #[test]
        fn hex_strategy_parses(hex in block_id_hex_strategy()) {
            let id = BlockId::parse(&hex).unwrap();
            prop_assert_eq!(id.to_hex(), hex);
        }

        #[test]
        fn invalid_strategy_never_parses(s in invalid_block_id_strategy()) {
            prop_assert!(BlockId::parse(&s).is_err());
        }

        #[test]
        fn addressed_blocks_match_content((id, data) in addressed_block_strategy()) {
            prop_assert_eq!(id, BlockId::for_content(&data));
        }
    }
}
