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

use alloy_primitives::{B256, U256};
use serde::{Deserialize, Serialize};

use crate::{
    keccak::{EMPTY_ROOT, KECCAK_EMPTY},
    rlp::{self, Decodable, Encodable},
    TxNumber,
};

/// Represents an Ethereum account within the state trie.
///
/// The `StateAccount` struct encapsulates key details of an Ethereum account:
/// its nonce, balance, storage root, and the hash of its associated bytecode.
/// This representation is used when interacting with or querying the state
/// trie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateAccount {
    /// The number of transactions sent from this account's address.
    pub nonce: TxNumber,
    /// The current balance of the account in Wei.
    pub balance: U256,
    /// The root of the account's storage trie, representing all stored
    /// contract data.
    pub storage_root: B256,
    /// The Keccak-256 hash of the account's associated bytecode (if it's a
    /// contract).
    pub code_hash: B256,
}

impl Default for StateAccount {
    /// Provides default values for a [StateAccount].
    ///
    /// The default account has a nonce of 0, a balance of 0 Wei, an empty
    /// storage root, and an empty bytecode hash.
    fn default() -> Self {
        Self {
            nonce: 0,
            balance: U256::ZERO,
            storage_root: EMPTY_ROOT,
            code_hash: KECCAK_EMPTY,
        }
    }
}

impl StateAccount {
    fn payload_length(&self) -> usize {
        self.nonce.length()
            + self.balance.length()
            + self.storage_root.length()
            + self.code_hash.length()
    }
}

impl Encodable for StateAccount {
    fn encode(&self, out: &mut Vec<u8>) {
        rlp::Header {
            list: true,
            payload_length: self.payload_length(),
        }
        .encode(out);
        self.nonce.encode(out);
        self.balance.encode(out);
        self.storage_root.encode(out);
        self.code_hash.encode(out);
    }

    fn length(&self) -> usize {
        let payload_length = self.payload_length();
        rlp::length_of_length(payload_length) + payload_length
    }
}

impl Decodable for StateAccount {
    fn decode(buf: &mut &[u8]) -> Result<Self, rlp::Error> {
        let header = rlp::Header::decode(buf)?;
        if !header.list {
            return Err(rlp::Error::UnexpectedString);
        }
        Ok(StateAccount {
            nonce: Decodable::decode(buf)?,
            balance: Decodable::decode(buf)?,
            storage_root: Decodable::decode(buf)?,
            code_hash: Decodable::decode(buf)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use super::*;
    use crate::rlp::RlpBytes;

    #[test]
    fn empty_account() {
        let account = StateAccount::default();
        // [0x80, 0x80, storage_root, code_hash]
        let encoded = account.to_rlp();
        assert_eq!(encoded[0], 0xf8);
        assert_eq!(
            &encoded[5..37],
            hex!("56e81f171bcc55a6ff8345e692c0f86e5b48e01b996cadc001622fb5e363b421")
        );
        assert_eq!(rlp::decode::<StateAccount>(&encoded).unwrap(), account);
    }

    #[test]
    fn round_trip() {
        let account = StateAccount {
            nonce: 6,
            balance: U256::from(240_983u64),
            ..Default::default()
        };
        assert_eq!(
            rlp::decode::<StateAccount>(&account.to_rlp()).unwrap(),
            account
        );
    }
}
