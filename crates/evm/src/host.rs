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

use std::collections::HashMap;

use alloy_primitives::{Address, Bytes, B256, U256};

/// The world-state interface consumed by the EVM.
///
/// Implementations back it with the state trie (see `etherite-core`) or with
/// a plain map for tests. All accessors take `&mut self` so that trie-backed
/// implementations can load accounts lazily.
pub trait WorldState {
    /// An opaque value restoring the state to an earlier point.
    type Snapshot;

    /// Whether an account exists at `address`.
    fn exists(&mut self, address: Address) -> bool;
    /// The balance of `address` in Wei; zero for non-existent accounts.
    fn balance(&mut self, address: Address) -> U256;
    /// The nonce of `address`; zero for non-existent accounts.
    fn nonce(&mut self, address: Address) -> u64;
    /// The code of `address`; empty for non-existent accounts.
    fn code(&mut self, address: Address) -> Bytes;
    /// The 256-bit value of the given storage slot; zero when unset.
    fn storage(&mut self, address: Address, slot: U256) -> U256;
    /// Writes a storage slot; writing zero clears the slot.
    fn set_storage(&mut self, address: Address, slot: U256, value: U256);
    /// Credits `amount` Wei, creating the account if needed.
    fn add_balance(&mut self, address: Address, amount: U256);
    /// Debits `amount` Wei. Returns false without any effect when the
    /// balance is insufficient.
    fn sub_balance(&mut self, address: Address, amount: U256) -> bool;
    /// Moves `value` Wei, creating the recipient if needed. Returns false
    /// without any effect when the sender's balance is insufficient.
    fn transfer(&mut self, from: Address, to: Address, value: U256) -> bool;
    /// Increments the nonce, creating the account if needed.
    fn increment_nonce(&mut self, address: Address);
    /// Installs code at `address`.
    fn set_code(&mut self, address: Address, code: Bytes);
    /// Removes the account and its storage entirely.
    fn delete_account(&mut self, address: Address);

    /// Captures the current state for a later [WorldState::revert].
    fn snapshot(&self) -> Self::Snapshot;
    /// Restores the state captured by `snapshot`.
    fn revert(&mut self, snapshot: Self::Snapshot);
}

/// Lookup of ancestor header hashes for the BLOCKHASH instruction.
pub trait BlockHashes {
    /// The header hash of block `number`, if known.
    fn block_hash(&self, number: u64) -> Option<B256>;
}

impl BlockHashes for HashMap<u64, B256> {
    fn block_hash(&self, number: u64) -> Option<B256> {
        self.get(&number).copied()
    }
}

/// No ancestors known; BLOCKHASH always pushes zero.
impl BlockHashes for () {
    fn block_hash(&self, _number: u64) -> Option<B256> {
        None
    }
}
