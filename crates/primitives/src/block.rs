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

use alloy_primitives::{b256, Address, Bloom, Bytes, B256, B64, U256};
use serde::{Deserialize, Serialize};

use crate::{
    keccak::{keccak, EMPTY_ROOT},
    rlp::{self, Decodable, Encodable},
    transaction::Transaction,
    BlockNumber,
};

/// Keccak-256 hash of the RLP of an empty list, `keccak256("\xc0")`.
pub const EMPTY_LIST_HASH: B256 =
    b256!("1dcc4de8dec75d7aab85b567b6ccd41ad312451b948a7413f0a142fd40d49347");

/// A block header.
///
/// The fifteen fields appear in the fixed wire order; the block hash is the
/// Keccak of the RLP-encoded header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Hash of the parent block's header.
    pub parent_hash: B256,
    /// Keccak of the RLP of this block's ommer header list.
    pub ommers_hash: B256,
    /// Address to which block rewards and transaction fees are transferred.
    pub beneficiary: Address,
    /// Hash of the root node of the state trie, after all transactions are
    /// executed.
    pub state_root: B256,
    /// Hash of the root node of the trie populated with each transaction in
    /// the block.
    pub transactions_root: B256,
    /// Hash of the root node of the trie populated with the receipts of each
    /// transaction.
    pub receipts_root: B256,
    /// Bloom filter composed from indexable information contained in each log
    /// entry.
    pub logs_bloom: Bloom,
    /// Scalar corresponding to the difficulty level of this block.
    pub difficulty: U256,
    /// Number of ancestor blocks in the chain.
    pub number: BlockNumber,
    /// Scalar equal to the current limit of gas expenditure per block.
    pub gas_limit: u64,
    /// Scalar equal to the total gas used in transactions in this block.
    pub gas_used: u64,
    /// Scalar corresponding to the seconds since Epoch at this block's
    /// inception.
    pub timestamp: u64,
    /// Arbitrary byte array containing data relevant for this block.
    pub extra_data: Bytes,
    /// Hash used by the proof-of-work seal, carried opaquely.
    pub mix_hash: B256,
    /// 64-bit value used by the proof-of-work seal, carried opaquely.
    pub nonce: B64,
}

impl Default for Header {
    fn default() -> Self {
        Header {
            parent_hash: B256::ZERO,
            ommers_hash: EMPTY_LIST_HASH,
            beneficiary: Address::ZERO,
            state_root: EMPTY_ROOT,
            transactions_root: EMPTY_ROOT,
            receipts_root: EMPTY_ROOT,
            logs_bloom: Bloom::default(),
            difficulty: U256::ZERO,
            number: 0,
            gas_limit: 0,
            gas_used: 0,
            timestamp: 0,
            extra_data: Bytes::new(),
            mix_hash: B256::ZERO,
            nonce: B64::ZERO,
        }
    }
}

impl Header {
    fn payload_length(&self) -> usize {
        self.parent_hash.length()
            + self.ommers_hash.length()
            + self.beneficiary.length()
            + self.state_root.length()
            + self.transactions_root.length()
            + self.receipts_root.length()
            + self.logs_bloom.length()
            + self.difficulty.length()
            + self.number.length()
            + self.gas_limit.length()
            + self.gas_used.length()
            + self.timestamp.length()
            + self.extra_data.length()
            + self.mix_hash.length()
            + self.nonce.length()
    }

    /// Calculates the block hash.
    pub fn hash(&self) -> B256 {
        keccak(rlp::encode(self)).into()
    }
}

impl Encodable for Header {
    fn encode(&self, out: &mut Vec<u8>) {
        rlp::Header {
            list: true,
            payload_length: self.payload_length(),
        }
        .encode(out);
        self.parent_hash.encode(out);
        self.ommers_hash.encode(out);
        self.beneficiary.encode(out);
        self.state_root.encode(out);
        self.transactions_root.encode(out);
        self.receipts_root.encode(out);
        self.logs_bloom.encode(out);
        self.difficulty.encode(out);
        self.number.encode(out);
        self.gas_limit.encode(out);
        self.gas_used.encode(out);
        self.timestamp.encode(out);
        self.extra_data.encode(out);
        self.mix_hash.encode(out);
        self.nonce.encode(out);
    }

    fn length(&self) -> usize {
        let payload_length = self.payload_length();
        rlp::length_of_length(payload_length) + payload_length
    }
}

impl Decodable for Header {
    fn decode(buf: &mut &[u8]) -> Result<Self, rlp::Error> {
        let header = rlp::Header::decode(buf)?;
        if !header.list {
            return Err(rlp::Error::UnexpectedString);
        }
        Ok(Header {
            parent_hash: Decodable::decode(buf)?,
            ommers_hash: Decodable::decode(buf)?,
            beneficiary: Decodable::decode(buf)?,
            state_root: Decodable::decode(buf)?,
            transactions_root: Decodable::decode(buf)?,
            receipts_root: Decodable::decode(buf)?,
            logs_bloom: Decodable::decode(buf)?,
            difficulty: Decodable::decode(buf)?,
            number: Decodable::decode(buf)?,
            gas_limit: Decodable::decode(buf)?,
            gas_used: Decodable::decode(buf)?,
            timestamp: Decodable::decode(buf)?,
            extra_data: Decodable::decode(buf)?,
            mix_hash: Decodable::decode(buf)?,
            nonce: Decodable::decode(buf)?,
        })
    }
}

/// A block: a header, the ordered transactions, and the included ommer
/// headers.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Block {
    pub header: Header,
    pub transactions: Vec<Transaction>,
    pub ommers: Vec<Header>,
}

impl Block {
    /// The hash of the block, which is the hash of its header.
    #[inline]
    pub fn hash(&self) -> B256 {
        self.header.hash()
    }

    fn payload_length(&self) -> usize {
        self.header.length()
            + rlp::list_length(&self.transactions)
            + rlp::list_length(&self.ommers)
    }
}

impl Encodable for Block {
    fn encode(&self, out: &mut Vec<u8>) {
        rlp::Header {
            list: true,
            payload_length: self.payload_length(),
        }
        .encode(out);
        self.header.encode(out);
        rlp::encode_list(&self.transactions, out);
        rlp::encode_list(&self.ommers, out);
    }

    fn length(&self) -> usize {
        let payload_length = self.payload_length();
        rlp::length_of_length(payload_length) + payload_length
    }
}

impl Decodable for Block {
    fn decode(buf: &mut &[u8]) -> Result<Self, rlp::Error> {
        let outer = rlp::Header::decode(buf)?;
        if !outer.list {
            return Err(rlp::Error::UnexpectedString);
        }
        let header = Decodable::decode(buf)?;

        let mut transactions = vec![];
        let tx_list = rlp::Header::decode(buf)?;
        if !tx_list.list {
            return Err(rlp::Error::UnexpectedString);
        }
        let (mut tx_buf, rest) = buf.split_at(tx_list.payload_length);
        *buf = rest;
        while !tx_buf.is_empty() {
            transactions.push(Decodable::decode(&mut tx_buf)?);
        }

        let mut ommers = vec![];
        let ommer_list = rlp::Header::decode(buf)?;
        if !ommer_list.list {
            return Err(rlp::Error::UnexpectedString);
        }
        let (mut ommer_buf, rest) = buf.split_at(ommer_list.payload_length);
        *buf = rest;
        while !ommer_buf.is_empty() {
            ommers.push(Decodable::decode(&mut ommer_buf)?);
        }

        Ok(Block {
            header,
            transactions,
            ommers,
        })
    }
}
