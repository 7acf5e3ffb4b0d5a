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

use alloy_primitives::{Address, Bytes, U256};

use crate::host::WorldState;

/// An account held by [MemoryState].
#[derive(Debug, Clone, Default)]
pub struct MemAccount {
    pub nonce: u64,
    pub balance: U256,
    pub code: Bytes,
    pub storage: HashMap<U256, U256>,
}

/// In-memory world state for tests and stand-alone execution.
///
/// Snapshots are full clones of the account map; frames are shallow and the
/// maps small, so this is the simplest correct rollback mechanism.
#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    accounts: HashMap<Address, MemAccount>,
}

impl MemoryState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the account if absent and returns it.
    fn entry(&mut self, address: Address) -> &mut MemAccount {
        self.accounts.entry(address).or_default()
    }

    /// Inserts an account with the given balance and nonce.
    pub fn insert_account(&mut self, address: Address, balance: U256, nonce: u64) {
        self.accounts.insert(
            address,
            MemAccount {
                nonce,
                balance,
                ..Default::default()
            },
        );
    }

    /// Installs code at `address`, creating the account if needed.
    pub fn insert_code(&mut self, address: Address, code: Bytes) {
        self.entry(address).code = code;
    }

    /// Direct access to an account, if it exists.
    pub fn account(&self, address: &Address) -> Option<&MemAccount> {
        self.accounts.get(address)
    }
}

impl WorldState for MemoryState {
    type Snapshot = HashMap<Address, MemAccount>;

    fn exists(&mut self, address: Address) -> bool {
        self.accounts.contains_key(&address)
    }

    fn balance(&mut self, address: Address) -> U256 {
        self.accounts
            .get(&address)
            .map(|acc| acc.balance)
            .unwrap_or_default()
    }

    fn nonce(&mut self, address: Address) -> u64 {
        self.accounts
            .get(&address)
            .map(|acc| acc.nonce)
            .unwrap_or_default()
    }

    fn code(&mut self, address: Address) -> Bytes {
        self.accounts
            .get(&address)
            .map(|acc| acc.code.clone())
            .unwrap_or_default()
    }

    fn storage(&mut self, address: Address, slot: U256) -> U256 {
        self.accounts
            .get(&address)
            .and_then(|acc| acc.storage.get(&slot).copied())
            .unwrap_or_default()
    }

    fn set_storage(&mut self, address: Address, slot: U256, value: U256) {
        let account = self.entry(address);
        if value.is_zero() {
            account.storage.remove(&slot);
        } else {
            account.storage.insert(slot, value);
        }
    }

    fn add_balance(&mut self, address: Address, amount: U256) {
        let account = self.entry(address);
        account.balance = account.balance.checked_add(amount).expect("balance overflow");
    }

    fn sub_balance(&mut self, address: Address, amount: U256) -> bool {
        if self.balance(address) < amount {
            return false;
        }
        self.entry(address).balance -= amount;
        true
    }

    fn transfer(&mut self, from: Address, to: Address, value: U256) -> bool {
        if self.balance(from) < value {
            return false;
        }
        if from == to {
            // touch the account without moving anything
            self.entry(to);
            return true;
        }
        {
            let sender = self.entry(from);
            sender.balance -= value;
        }
        let recipient = self.entry(to);
        recipient.balance += value;
        true
    }

    fn increment_nonce(&mut self, address: Address) {
        self.entry(address).nonce += 1;
    }

    fn set_code(&mut self, address: Address, code: Bytes) {
        self.entry(address).code = code;
    }

    fn delete_account(&mut self, address: Address) {
        self.accounts.remove(&address);
    }

    fn snapshot(&self) -> Self::Snapshot {
        self.accounts.clone()
    }

    fn revert(&mut self, snapshot: Self::Snapshot) {
        self.accounts = snapshot;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_checks_balance() {
        let mut state = MemoryState::new();
        let a = Address::repeat_byte(1);
        let b = Address::repeat_byte(2);
        state.insert_account(a, U256::from(100), 0);

        assert!(!state.transfer(a, b, U256::from(101)));
        assert!(state.transfer(a, b, U256::from(40)));
        assert_eq!(state.balance(a), U256::from(60));
        assert_eq!(state.balance(b), U256::from(40));
    }

    #[test]
    fn snapshot_revert() {
        let mut state = MemoryState::new();
        let a = Address::repeat_byte(1);
        state.insert_account(a, U256::from(100), 0);

        let snapshot = state.snapshot();
        state.add_balance(a, U256::from(50));
        state.set_storage(a, U256::from(1), U256::from(2));
        state.revert(snapshot);

        assert_eq!(state.balance(a), U256::from(100));
        assert!(state.storage(a, U256::from(1)).is_zero());
    }

    #[test]
    fn zero_storage_is_absent() {
        let mut state = MemoryState::new();
        let a = Address::repeat_byte(1);
        state.set_storage(a, U256::from(1), U256::from(2));
        state.set_storage(a, U256::from(1), U256::ZERO);
        assert!(state.account(&a).unwrap().storage.is_empty());
    }
}
