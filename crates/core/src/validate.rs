// Copyright 2024 RISC Zero, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Header and holistic block validation.
//!
//! Both validators collect their full error sets instead of stopping at the
//! first failure, so callers see every divergence at once.

use std::collections::{BTreeSet, HashMap};

use alloy_primitives::B256;
use etherite_primitives::block::{Block, Header};
use etherite_trie::KvStore;
use thiserror::Error as ThisError;
use tracing::debug;

use crate::{
    builder::{BlockBuilder, BlockParams},
    chain_spec::{ChainSpec, MAX_EXTRA_DATA_BYTES},
    difficulty::next_difficulty,
};

/// A single header validation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, ThisError)]
pub enum HeaderError {
    #[error("invalid difficulty")]
    InvalidDifficulty,
    #[error("gas used exceeds gas limit")]
    ExceededGasLimit,
    #[error("invalid gas limit")]
    InvalidGasLimit,
    #[error("timestamp not after parent")]
    ChildTimestampInvalid,
    #[error("number does not follow parent")]
    ChildNumberInvalid,
    #[error("extra data too large")]
    ExtraDataTooLarge,
}

/// A holistic-validity mismatch between a block and its reconstruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, ThisError)]
pub enum BlockError {
    #[error("state root mismatch")]
    StateRootMismatch,
    #[error("transactions root mismatch")]
    TransactionsRootMismatch,
    #[error("receipts root mismatch")]
    ReceiptsRootMismatch,
    #[error("ommers hash mismatch")]
    OmmersHashMismatch,
}

/// Validates `header` against its parent, collecting every failure.
///
/// A genesis header is validated with `parent` absent: it must carry number
/// zero and the chain's initial difficulty.
pub fn validate_header(
    spec: &ChainSpec,
    header: &Header,
    parent: Option<&Header>,
) -> Result<(), BTreeSet<HeaderError>> {
    let mut errors = BTreeSet::new();

    let expected_difficulty = match parent {
        Some(parent) => next_difficulty(spec, parent, header.timestamp),
        None => spec.initial_difficulty,
    };
    if header.difficulty != expected_difficulty {
        errors.insert(HeaderError::InvalidDifficulty);
    }

    if header.gas_used > header.gas_limit {
        errors.insert(HeaderError::ExceededGasLimit);
    }

    let band_violation = parent.is_some_and(|parent| {
        header.gas_limit.abs_diff(parent.gas_limit) >= parent.gas_limit / spec.gas_limit_bound_divisor
    });
    if band_violation || header.gas_limit <= spec.min_gas_limit {
        errors.insert(HeaderError::InvalidGasLimit);
    }

    if parent.is_some_and(|parent| header.timestamp <= parent.timestamp) {
        errors.insert(HeaderError::ChildTimestampInvalid);
    }

    let number_valid = match parent {
        Some(parent) => header.number == parent.number + 1,
        None => header.number == 0,
    };
    if !number_valid {
        errors.insert(HeaderError::ChildNumberInvalid);
    }

    if header.extra_data.len() > MAX_EXTRA_DATA_BYTES {
        errors.insert(HeaderError::ExtraDataTooLarge);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Checks the holistic validity of `block` against `parent`: the block is
/// reconstructed from its transactions on top of the parent state, and the
/// four derived roots are compared against the incoming header.
///
/// Returns the set of mismatches, empty for a valid block. Structurally
/// invalid transactions (which no valid block can contain) are hard errors.
pub fn validate_block<S: KvStore>(
    spec: &ChainSpec,
    db: &mut S,
    parent: &Header,
    block: &Block,
    ancestors: HashMap<u64, B256>,
) -> anyhow::Result<BTreeSet<BlockError>> {
    let mut builder = BlockBuilder::new(
        spec,
        db,
        parent,
        BlockParams {
            beneficiary: block.header.beneficiary,
            timestamp: block.header.timestamp,
            extra_data: block.header.extra_data.clone(),
            gas_limit: Some(block.header.gas_limit),
        },
        ancestors,
    );
    // the reconstruction mirrors the incoming header exactly; whether its
    // gas limit is acceptable is the header validator's concern
    builder.header.gas_limit = block.header.gas_limit;
    builder.block_env.gas_limit = block.header.gas_limit;

    for tx in &block.transactions {
        builder.execute_transaction(tx.clone())?;
    }
    let rebuilt = builder.finalize(block.ommers.clone())?;

    let mut errors = BTreeSet::new();
    if rebuilt.header.state_root != block.header.state_root {
        errors.insert(BlockError::StateRootMismatch);
    }
    if rebuilt.header.transactions_root != block.header.transactions_root {
        errors.insert(BlockError::TransactionsRootMismatch);
    }
    if rebuilt.header.receipts_root != block.header.receipts_root {
        errors.insert(BlockError::ReceiptsRootMismatch);
    }
    if rebuilt.header.ommers_hash != block.header.ommers_hash {
        errors.insert(BlockError::OmmersHashMismatch);
    }

    debug!(
        number = block.header.number,
        mismatches = errors.len(),
        "validated block"
    );
    Ok(errors)
}

#[cfg(test)]
mod tests {
    use alloy_primitives::U256;

    use super::*;
    use crate::chain_spec::MAINNET;

    fn parent() -> Header {
        Header {
            number: 0,
            difficulty: U256::from(131_072),
            gas_limit: 200_000,
            timestamp: 55,
            ..Default::default()
        }
    }

    fn child() -> Header {
        Header {
            number: 1,
            difficulty: U256::from(131_136),
            gas_limit: 200_000,
            timestamp: 65,
            ..Default::default()
        }
    }

    #[test]
    fn valid_child_header() {
        assert_eq!(validate_header(&MAINNET, &child(), Some(&parent())), Ok(()));
    }

    #[test]
    fn gas_limit_band() {
        let parent = Header {
            gas_limit: 1_000_000,
            ..parent()
        };
        let mut header = child();
        header.difficulty = next_difficulty(&MAINNET, &parent, header.timestamp);

        header.gas_limit = 999_500;
        assert_eq!(validate_header(&MAINNET, &header, Some(&parent)), Ok(()));

        header.gas_limit = 999_000;
        let errors = validate_header(&MAINNET, &header, Some(&parent)).unwrap_err();
        assert!(errors.contains(&HeaderError::InvalidGasLimit));
    }

    #[test]
    fn errors_are_collected_not_short_circuited() {
        let header = Header {
            number: 5,                       // wrong
            difficulty: U256::from(1),       // wrong
            gas_limit: 200_000,
            gas_used: 300_000,               // exceeds the limit
            timestamp: 55,                   // not after the parent
            extra_data: vec![0u8; 33].into(), // too large
            ..Default::default()
        };
        let errors = validate_header(&MAINNET, &header, Some(&parent())).unwrap_err();
        assert_eq!(
            errors,
            BTreeSet::from([
                HeaderError::InvalidDifficulty,
                HeaderError::ExceededGasLimit,
                HeaderError::ChildTimestampInvalid,
                HeaderError::ChildNumberInvalid,
                HeaderError::ExtraDataTooLarge,
            ])
        );
    }

    #[test]
    fn genesis_header() {
        let genesis = Header {
            number: 0,
            difficulty: MAINNET.initial_difficulty,
            gas_limit: 200_000,
            ..Default::default()
        };
        assert_eq!(validate_header(&MAINNET, &genesis, None), Ok(()));

        let bad = Header {
            number: 1,
            ..genesis
        };
        let errors = validate_header(&MAINNET, &bad, None).unwrap_err();
        assert!(errors.contains(&HeaderError::ChildNumberInvalid));
    }

    #[test]
    fn minimum_gas_limit() {
        let mut header = child();
        let parent = Header {
            gas_limit: 125_050,
            ..parent()
        };
        header.gas_limit = 125_000;
        let errors = validate_header(&MAINNET, &header, Some(&parent)).unwrap_err();
        assert!(errors.contains(&HeaderError::InvalidGasLimit));
    }
}
