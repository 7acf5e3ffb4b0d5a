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

//! Wire-level primitives shared by every etherite crate: the RLP codec,
//! Keccak-256, and the consensus data types (accounts, transactions, headers,
//! blocks, receipts).

pub mod account;
pub mod block;
pub mod keccak;
pub mod receipt;
pub mod rlp;
pub mod signature;
pub mod transaction;

pub use alloy_primitives::{Address, Bloom, BloomInput, Bytes, B256, B64, I256, U256};

/// A block number.
pub type BlockNumber = u64;
/// An EIP-155 chain ID.
pub type ChainId = u64;
/// An account nonce / transaction count.
pub type TxNumber = u64;
