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

//! Assembly of a child block on top of a parent state.

use std::collections::HashMap;

use alloy_primitives::{Bytes, B256, U256};
use anyhow::ensure;
use etherite_evm::BlockEnv;
use etherite_primitives::{
    block::{Block, Header},
    keccak::keccak,
    receipt::Receipt,
    rlp,
    transaction::Transaction,
    Address,
};
use etherite_trie::{KvStore, MemoryDb, Trie};
use tracing::debug;

use crate::{
    chain_spec::ChainSpec, difficulty::next_difficulty, execute::apply_transaction,
    state::TrieState,
};

/// Caller-supplied parameters of a new block.
#[derive(Debug, Clone, Default)]
pub struct BlockParams {
    /// Address credited with the block reward and all transaction fees.
    pub beneficiary: Address,
    /// Timestamp of the new block.
    pub timestamp: u64,
    /// Arbitrary extra data, at most 32 bytes.
    pub extra_data: Bytes,
    /// Target gas limit; clamped into the parent-determined band. Defaults
    /// to the parent's gas limit.
    pub gas_limit: Option<u64>,
}

/// Builds a block by applying transactions in order to the parent state.
///
/// The pipeline is: construct (derives the header fields determined by the
/// parent), execute each transaction, then finalize (rewards and roots).
#[derive(Debug)]
pub struct BlockBuilder<'a, S: KvStore> {
    spec: &'a ChainSpec,
    state: TrieState<'a, S>,
    pub(crate) header: Header,
    pub(crate) block_env: BlockEnv,
    ancestors: HashMap<u64, B256>,
    transactions: Vec<Transaction>,
    receipts: Vec<Receipt>,
    cumulative_gas: u64,
}

impl<'a, S: KvStore> BlockBuilder<'a, S> {
    /// Starts a child block of `parent`.
    ///
    /// `ancestors` maps the numbers of up to 256 recent blocks to their
    /// header hashes for the BLOCKHASH instruction; the parent itself is
    /// added automatically.
    pub fn new(
        spec: &'a ChainSpec,
        db: &'a mut S,
        parent: &Header,
        params: BlockParams,
        mut ancestors: HashMap<u64, B256>,
    ) -> Self {
        ancestors.insert(parent.number, parent.hash());

        let gas_limit = clamp_gas_limit(
            spec,
            parent.gas_limit,
            params.gas_limit.unwrap_or(parent.gas_limit),
        );
        let header = Header {
            parent_hash: parent.hash(),
            beneficiary: params.beneficiary,
            difficulty: next_difficulty(spec, parent, params.timestamp),
            number: parent.number + 1,
            gas_limit,
            timestamp: params.timestamp,
            extra_data: params.extra_data,
            ..Default::default()
        };
        let block_env = BlockEnv {
            number: header.number,
            beneficiary: header.beneficiary,
            timestamp: header.timestamp,
            difficulty: header.difficulty,
            gas_limit: header.gas_limit,
        };
        debug!(number = header.number, gas_limit, "building block");

        BlockBuilder {
            spec,
            state: TrieState::open(db, parent.state_root),
            header,
            block_env,
            ancestors,
            transactions: Vec::new(),
            receipts: Vec::new(),
            cumulative_gas: 0,
        }
    }

    /// Applies the next transaction, accumulating its receipt.
    pub fn execute_transaction(&mut self, tx: Transaction) -> anyhow::Result<&Receipt> {
        ensure!(
            self.cumulative_gas + tx.essence.gas_limit <= self.header.gas_limit,
            "transaction gas exceeds the remaining block gas limit",
        );
        let applied = apply_transaction(
            self.spec,
            &mut self.state,
            &self.block_env,
            &self.ancestors,
            &tx,
            self.cumulative_gas,
        )?;
        self.cumulative_gas += applied.gas_used;
        self.header
            .logs_bloom
            .accrue_bloom(&applied.receipt.logs_bloom);
        self.transactions.push(tx);
        self.receipts.push(applied.receipt);
        Ok(self.receipts.last().expect("just pushed"))
    }

    /// Read access to the in-progress state, for inspection between
    /// transactions.
    pub fn state_mut(&mut self) -> &mut TrieState<'a, S> {
        &mut self.state
    }

    /// Credits the block and ommer rewards, computes the four roots, and
    /// returns the assembled block.
    pub fn finalize(mut self, ommers: Vec<Header>) -> anyhow::Result<Block> {
        use etherite_evm::WorldState;

        let reward = self.spec.block_reward;
        self.state.add_balance(
            self.header.beneficiary,
            reward + reward / U256::from(32) * U256::from(ommers.len() as u64),
        );
        for ommer in &ommers {
            // ommers older than eight generations earn nothing
            let depth = self.header.number.saturating_sub(ommer.number);
            let ommer_reward = reward * U256::from(8u64.saturating_sub(depth)) / U256::from(8);
            self.state.add_balance(ommer.beneficiary, ommer_reward);
        }
        self.header.state_root = self.state.commit()?;

        // ephemeral tries keyed by rlp(index)
        let scratch = MemoryDb::new();
        let mut tx_trie = Trie::new();
        let mut receipt_trie = Trie::new();
        for (index, tx) in self.transactions.iter().enumerate() {
            let key = rlp::encode(&index);
            tx_trie.insert_rlp(&scratch, &key, tx)?;
            receipt_trie.insert_rlp(&scratch, &key, &self.receipts[index])?;
        }
        self.header.transactions_root = tx_trie.hash();
        self.header.receipts_root = receipt_trie.hash();

        let mut ommers_rlp = Vec::new();
        rlp::encode_list(&ommers, &mut ommers_rlp);
        self.header.ommers_hash = keccak(ommers_rlp).into();
        self.header.gas_used = self.cumulative_gas;

        debug!(
            number = self.header.number,
            gas_used = self.header.gas_used,
            transactions = self.transactions.len(),
            "finalized block"
        );
        Ok(Block {
            header: self.header,
            transactions: self.transactions,
            ommers,
        })
    }
}

/// Clamps a target gas limit into the open band determined by the parent:
/// `|limit − parent| < ⌊parent/divisor⌋` and `limit > min_gas_limit`.
fn clamp_gas_limit(spec: &ChainSpec, parent_gas_limit: u64, target: u64) -> u64 {
    let bound = parent_gas_limit / spec.gas_limit_bound_divisor;
    target
        .min(parent_gas_limit + bound - 1)
        .max(parent_gas_limit.saturating_sub(bound) + 1)
        .max(spec.min_gas_limit + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain_spec::MAINNET;

    #[test]
    fn gas_limit_clamping() {
        // parent at 1_000_000 allows ±976 exclusive
        assert_eq!(clamp_gas_limit(&MAINNET, 1_000_000, 1_000_000), 1_000_000);
        assert_eq!(clamp_gas_limit(&MAINNET, 1_000_000, 2_000_000), 1_000_975);
        assert_eq!(clamp_gas_limit(&MAINNET, 1_000_000, 100), 999_025);
        // never at or below the minimum
        assert_eq!(clamp_gas_limit(&MAINNET, 125_100, 1), 125_001);
    }
}
