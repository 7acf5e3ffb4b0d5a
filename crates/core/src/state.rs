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

//! The trie-backed realization of the EVM's world-state interface.

use std::collections::HashMap;

use alloy_primitives::{Address, Bytes, B256, U256};
use etherite_evm::WorldState;
use etherite_primitives::{
    account::StateAccount,
    keccak::{keccak, KECCAK_EMPTY},
};
use etherite_trie::{KvStore, Trie};

/// An account cached by [TrieState], with its pending storage writes.
#[derive(Debug, Clone)]
pub struct AccountEntry {
    nonce: u64,
    balance: U256,
    code: Bytes,
    storage_trie: Trie,
    /// Pending storage writes; folded into the trie at commit. A zero value
    /// is a pending removal.
    storage: HashMap<U256, U256>,
}

impl AccountEntry {
    fn empty() -> Self {
        AccountEntry {
            nonce: 0,
            balance: U256::ZERO,
            code: Bytes::new(),
            storage_trie: Trie::new(),
            storage: HashMap::new(),
        }
    }
}

/// World state backed by the state trie inside a content-addressed store.
///
/// Accounts are loaded lazily from the trie into a cache; all mutation
/// happens in the cache, which [TrieState::commit] folds back into the state
/// and storage tries. Snapshots clone the cache, which the state and storage
/// tries are never mutated between, so reverting a snapshot restores the
/// full pre-image.
///
/// A node or code hash missing from the store aborts: the embedding host has
/// handed over an inconsistent database, which is not recoverable.
#[derive(Debug)]
pub struct TrieState<'a, S: KvStore> {
    db: &'a mut S,
    state_trie: Trie,
    accounts: HashMap<Address, Option<AccountEntry>>,
}

impl<'a, S: KvStore> TrieState<'a, S> {
    /// Opens the world state rooted at `state_root`.
    pub fn open(db: &'a mut S, state_root: B256) -> Self {
        TrieState {
            db,
            state_trie: Trie::open(state_root),
            accounts: HashMap::new(),
        }
    }

    /// Creates an account with the given balance and nonce, for genesis
    /// construction and tests.
    pub fn create_account(&mut self, address: Address, balance: U256, nonce: u64) {
        self.accounts.insert(
            address,
            Some(AccountEntry {
                nonce,
                balance,
                ..AccountEntry::empty()
            }),
        );
    }

    /// Loads the account at `address` into the cache and returns it.
    fn load(&mut self, address: Address) -> &mut Option<AccountEntry> {
        if !self.accounts.contains_key(&address) {
            let stored: Option<StateAccount> = self
                .state_trie
                .get_rlp(&*self.db, &keccak(address))
                .expect("inconsistent state database");
            let entry = stored.map(|account| AccountEntry {
                nonce: account.nonce,
                balance: account.balance,
                code: load_code(&*self.db, account.code_hash),
                storage_trie: Trie::open(account.storage_root),
                storage: HashMap::new(),
            });
            self.accounts.insert(address, entry);
        }
        self.accounts.get_mut(&address).expect("just inserted")
    }

    /// Loads the account, creating an empty one if it does not exist.
    fn load_or_create(&mut self, address: Address) -> &mut AccountEntry {
        self.load(address).get_or_insert_with(AccountEntry::empty)
    }

    /// Folds every cached change back into the tries, writes all new nodes
    /// and code to the store, and returns the new state root.
    pub fn commit(&mut self) -> anyhow::Result<B256> {
        let addresses: Vec<Address> = self.accounts.keys().copied().collect();
        for address in addresses {
            let trie_key = keccak(address);
            let Some(entry) = self.accounts.get_mut(&address) else {
                unreachable!()
            };
            match entry {
                None => {
                    self.state_trie.delete(&*self.db, &trie_key)?;
                }
                Some(account) => {
                    // apply insertions before removals so that branch
                    // collapsing never hits an unresolved orphan
                    let mut removals = vec![];
                    for (slot, value) in std::mem::take(&mut account.storage) {
                        let slot_key = keccak(B256::from(slot));
                        if value.is_zero() {
                            removals.push(slot_key);
                        } else {
                            account.storage_trie.insert_rlp(&*self.db, &slot_key, value)?;
                        }
                    }
                    for slot_key in removals {
                        account.storage_trie.delete(&*self.db, &slot_key)?;
                    }
                    let storage_root = account.storage_trie.commit(&mut *self.db);

                    let code_hash = if account.code.is_empty() {
                        KECCAK_EMPTY
                    } else {
                        let code_hash = keccak(&account.code);
                        self.db.put(&code_hash, account.code.to_vec());
                        code_hash.into()
                    };
                    let state_account = StateAccount {
                        nonce: account.nonce,
                        balance: account.balance,
                        storage_root,
                        code_hash,
                    };
                    self.state_trie
                        .insert_rlp(&*self.db, &trie_key, state_account)?;
                }
            }
        }
        Ok(self.state_trie.commit(&mut *self.db))
    }
}

fn load_code(db: &impl KvStore, code_hash: B256) -> Bytes {
    if code_hash == KECCAK_EMPTY {
        Bytes::new()
    } else {
        db.get(code_hash.as_slice())
            .expect("missing contract code")
            .into()
    }
}

impl<S: KvStore> WorldState for TrieState<'_, S> {
    type Snapshot = HashMap<Address, Option<AccountEntry>>;

    fn exists(&mut self, address: Address) -> bool {
        self.load(address).is_some()
    }

    fn balance(&mut self, address: Address) -> U256 {
        self.load(address)
            .as_ref()
            .map(|account| account.balance)
            .unwrap_or_default()
    }

    fn nonce(&mut self, address: Address) -> u64 {
        self.load(address)
            .as_ref()
            .map(|account| account.nonce)
            .unwrap_or_default()
    }

    fn code(&mut self, address: Address) -> Bytes {
        self.load(address)
            .as_ref()
            .map(|account| account.code.clone())
            .unwrap_or_default()
    }

    fn storage(&mut self, address: Address, slot: U256) -> U256 {
        self.load(address);
        let db = &*self.db;
        let Some(account) = self.accounts.get_mut(&address).expect("just loaded") else {
            return U256::ZERO;
        };
        if let Some(value) = account.storage.get(&slot) {
            return *value;
        }
        let stored: Option<U256> = account
            .storage_trie
            .get_rlp(db, &keccak(B256::from(slot)))
            .expect("inconsistent state database");
        stored.unwrap_or_default()
    }

    fn set_storage(&mut self, address: Address, slot: U256, value: U256) {
        self.load_or_create(address).storage.insert(slot, value);
    }

    fn add_balance(&mut self, address: Address, amount: U256) {
        let account = self.load_or_create(address);
        account.balance = account
            .balance
            .checked_add(amount)
            .expect("balance overflow");
    }

    fn sub_balance(&mut self, address: Address, amount: U256) -> bool {
        if self.balance(address) < amount {
            return false;
        }
        let account = self.load_or_create(address);
        account.balance -= amount;
        true
    }

    fn transfer(&mut self, from: Address, to: Address, value: U256) -> bool {
        if self.balance(from) < value {
            return false;
        }
        if from == to {
            self.load_or_create(to);
            return true;
        }
        self.load_or_create(from).balance -= value;
        let recipient = self.load_or_create(to);
        recipient.balance = recipient
            .balance
            .checked_add(value)
            .expect("balance overflow");
        true
    }

    fn increment_nonce(&mut self, address: Address) {
        self.load_or_create(address).nonce += 1;
    }

    fn set_code(&mut self, address: Address, code: Bytes) {
        self.load_or_create(address).code = code;
    }

    fn delete_account(&mut self, address: Address) {
        self.accounts.insert(address, None);
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
    use etherite_trie::MemoryDb;

    use super::*;

    #[test]
    fn commit_and_reload() {
        let mut db = MemoryDb::new();
        let a = Address::repeat_byte(0x11);

        let root = {
            let mut state = TrieState::open(&mut db, etherite_trie::EMPTY_ROOT);
            state.create_account(a, U256::from(1000), 7);
            state.set_storage(a, U256::from(1), U256::from(42));
            state.set_code(a, Bytes::copy_from_slice(&[0x00]));
            state.commit().unwrap()
        };

        let mut state = TrieState::open(&mut db, root);
        assert!(state.exists(a));
        assert_eq!(state.balance(a), U256::from(1000));
        assert_eq!(state.nonce(a), 7);
        assert_eq!(state.code(a).as_ref(), &[0x00]);
        assert_eq!(state.storage(a, U256::from(1)), U256::from(42));
        assert_eq!(state.storage(a, U256::from(2)), U256::ZERO);
    }

    #[test]
    fn deletion_removes_from_trie() {
        let mut db = MemoryDb::new();
        let a = Address::repeat_byte(0x11);
        let b = Address::repeat_byte(0x22);

        let root = {
            let mut state = TrieState::open(&mut db, etherite_trie::EMPTY_ROOT);
            state.create_account(a, U256::from(1), 0);
            state.commit().unwrap()
        };
        let root_with_b = {
            let mut state = TrieState::open(&mut db, root);
            state.create_account(b, U256::from(2), 0);
            state.commit().unwrap()
        };
        // deleting b must restore the exact previous root
        let mut state = TrieState::open(&mut db, root_with_b);
        state.delete_account(b);
        assert_eq!(state.commit().unwrap(), root);
    }

    #[test]
    fn snapshot_rolls_back_storage() {
        let mut db = MemoryDb::new();
        let a = Address::repeat_byte(0x11);
        let mut state = TrieState::open(&mut db, etherite_trie::EMPTY_ROOT);
        state.create_account(a, U256::from(10), 0);

        let snapshot = state.snapshot();
        state.set_storage(a, U256::from(1), U256::from(9));
        state.sub_balance(a, U256::from(4));
        state.revert(snapshot);

        assert_eq!(state.storage(a, U256::from(1)), U256::ZERO);
        assert_eq!(state.balance(a), U256::from(10));
    }
}
