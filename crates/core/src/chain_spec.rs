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

//! Chain configuration constants.

use alloy_primitives::{uint, U256};
use etherite_primitives::{BlockNumber, ChainId};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Maximum size of the header's extra data.
pub const MAX_EXTRA_DATA_BYTES: usize = 32;

/// Specification of a specific chain.
///
/// The chain configuration is the only design-level global; it is passed as
/// an explicit context through every call rather than read from process-wide
/// state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainSpec {
    /// EIP-155 chain ID used in signing hashes; `None` selects the
    /// pre-EIP-155 signing scheme.
    pub chain_id: Option<ChainId>,
    /// The reward credited to the beneficiary of each block.
    pub block_reward: U256,
    /// First block of the Homestead difficulty rules.
    pub homestead_block: BlockNumber,
    /// Difficulty of the genesis block.
    pub initial_difficulty: U256,
    /// The difficulty never drops below this value.
    pub minimum_difficulty: U256,
    /// Divisor bounding per-block difficulty adjustments.
    pub difficulty_bound_divisor: U256,
    /// Divisor bounding per-block gas-limit adjustments.
    pub gas_limit_bound_divisor: u64,
    /// The gas limit never drops to or below this value.
    pub min_gas_limit: u64,
    /// Bootstrap node URLs for the peer-to-peer layer.
    pub bootnodes: Vec<String>,
}

/// The Ethereum mainnet specification with Frontier-era parameters.
pub static MAINNET: Lazy<ChainSpec> = Lazy::new(|| ChainSpec {
    chain_id: None,
    block_reward: uint!(5_000_000_000_000_000_000_U256),
    homestead_block: 1_150_000,
    initial_difficulty: uint!(131072_U256),
    minimum_difficulty: uint!(131072_U256),
    difficulty_bound_divisor: uint!(2048_U256),
    gas_limit_bound_divisor: 1024,
    min_gas_limit: 125_000,
    bootnodes: vec![
        "enode://a979fb575495b8d6db44f750317d0f4622bf4c2aa3365d6af7c284339968eef29b69ad0dce72a4d8db5ebb4968de0e3bec910127f134779fbcb0cb6d3331163c@52.16.188.185:30303".into(),
        "enode://de471bccee3d042261d52e9bff31458daecc406142b401d4cd848f677479f73104b9fdeb090af9583d3391b7f10cb2ba9e26865dd5fca4fcdc0fb1e3b723c786@54.94.239.50:30303".into(),
    ],
});

impl ChainSpec {
    /// Returns whether the Homestead rules are active at `block_number`.
    pub fn is_homestead(&self, block_number: BlockNumber) -> bool {
        block_number >= self.homestead_block
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mainnet_defaults() {
        assert_eq!(MAINNET.initial_difficulty, U256::from(131_072));
        assert_eq!(MAINNET.min_gas_limit, 125_000);
        assert!(!MAINNET.is_homestead(1_149_999));
        assert!(MAINNET.is_homestead(1_150_000));
    }
}
