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

//! The authenticated key-value store of the Ethereum state: a Merkle-Patricia
//! trie whose nodes live in a content-addressed key-value store.
//!
//! Nodes shorter than 32 bytes of RLP are inlined into their parent; all
//! others are referenced by Keccak hash and written to the store on
//! [Trie::commit]. The store is append-only, so every committed root remains
//! openable as an independent view of the trie at that point.

use alloy_primitives::B256;
use thiserror::Error as ThisError;

mod node;
mod store;
mod trie;

pub use node::{to_nibs, to_prefix, MptNode, MptNodeData, MptNodeReference};
pub use store::{KvStore, MemoryDb};
pub use trie::Trie;

pub use etherite_primitives::keccak::EMPTY_ROOT;

/// Errors raised by trie operations.
///
/// A key that is simply absent is not an error; [Error::MissingNode] means
/// the store is missing a node that the trie structure references, which is a
/// fatal consistency failure of the underlying database.
#[derive(Debug, ThisError)]
pub enum Error {
    /// A node reference could not be resolved from the store.
    #[error("missing trie node {0}")]
    MissingNode(B256),
    /// A node or value failed to decode.
    #[error("RLP error")]
    Rlp(#[from] etherite_primitives::rlp::Error),
}
