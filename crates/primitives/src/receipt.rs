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

use alloy_primitives::{Address, Bloom, BloomInput, Bytes, B256};
use serde::{Deserialize, Serialize};

use crate::rlp::{self, Decodable, Encodable};

/// Represents an Ethereum log entry.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Log {
    /// Contract that emitted this log.
    pub address: Address,
    /// Topics of the log. The number of topics depends on which `LOG` opcode
    /// was used.
    pub topics: Vec<B256>,
    /// Arbitrary length data.
    pub data: Bytes,
}

impl Log {
    fn payload_length(&self) -> usize {
        self.address.length() + rlp::list_length(&self.topics) + self.data.length()
    }
}

impl Encodable for Log {
    fn encode(&self, out: &mut Vec<u8>) {
        rlp::Header {
            list: true,
            payload_length: self.payload_length(),
        }
        .encode(out);
        self.address.encode(out);
        rlp::encode_list(&self.topics, out);
        self.data.encode(out);
    }

    fn length(&self) -> usize {
        let payload_length = self.payload_length();
        rlp::length_of_length(payload_length) + payload_length
    }
}

impl Decodable for Log {
    fn decode(buf: &mut &[u8]) -> Result<Self, rlp::Error> {
        let header = rlp::Header::decode(buf)?;
        if !header.list {
            return Err(rlp::Error::UnexpectedString);
        }
        let address = Decodable::decode(buf)?;

        let topic_list = rlp::Header::decode(buf)?;
        if !topic_list.list {
            return Err(rlp::Error::UnexpectedString);
        }
        let (mut topic_buf, rest) = buf.split_at(topic_list.payload_length);
        *buf = rest;
        let mut topics = vec![];
        while !topic_buf.is_empty() {
            topics.push(Decodable::decode(&mut topic_buf)?);
        }

        Ok(Log {
            address,
            topics,
            data: Decodable::decode(buf)?,
        })
    }
}

/// Receipt containing the result of a transaction's execution.
///
/// This is the pre-Byzantium form carrying the post-transaction state root
/// rather than a status code.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Receipt {
    /// Root of the state trie after this transaction was applied.
    pub state_root: B256,
    /// Total gas used by the block up to and including this transaction.
    pub cumulative_gas_used: u64,
    /// Bloom filter over the indexable information of `logs`.
    pub logs_bloom: Bloom,
    /// Logs generated during the execution of the transaction.
    pub logs: Vec<Log>,
}

impl Receipt {
    /// Constructs a new [Receipt], folding the `logs_bloom` from the provided
    /// logs.
    pub fn new(state_root: B256, cumulative_gas_used: u64, logs: Vec<Log>) -> Receipt {
        let mut logs_bloom = Bloom::default();
        for log in &logs {
            logs_bloom.accrue(BloomInput::Raw(log.address.as_slice()));
            for topic in &log.topics {
                logs_bloom.accrue(BloomInput::Raw(topic.as_slice()));
            }
        }

        Receipt {
            state_root,
            cumulative_gas_used,
            logs_bloom,
            logs,
        }
    }

    fn payload_length(&self) -> usize {
        self.state_root.length()
            + self.cumulative_gas_used.length()
            + self.logs_bloom.length()
            + rlp::list_length(&self.logs)
    }
}

impl Encodable for Receipt {
    fn encode(&self, out: &mut Vec<u8>) {
        rlp::Header {
            list: true,
            payload_length: self.payload_length(),
        }
        .encode(out);
        self.state_root.encode(out);
        self.cumulative_gas_used.encode(out);
        self.logs_bloom.encode(out);
        rlp::encode_list(&self.logs, out);
    }

    fn length(&self) -> usize {
        let payload_length = self.payload_length();
        rlp::length_of_length(payload_length) + payload_length
    }
}

impl Decodable for Receipt {
    fn decode(buf: &mut &[u8]) -> Result<Self, rlp::Error> {
        let header = rlp::Header::decode(buf)?;
        if !header.list {
            return Err(rlp::Error::UnexpectedString);
        }
        let state_root = Decodable::decode(buf)?;
        let cumulative_gas_used = Decodable::decode(buf)?;
        let logs_bloom = Decodable::decode(buf)?;

        let log_list = rlp::Header::decode(buf)?;
        if !log_list.list {
            return Err(rlp::Error::UnexpectedString);
        }
        let (mut log_buf, rest) = buf.split_at(log_list.payload_length);
        *buf = rest;
        let mut logs = vec![];
        while !log_buf.is_empty() {
            logs.push(Decodable::decode(&mut log_buf)?);
        }

        Ok(Receipt {
            state_root,
            cumulative_gas_used,
            logs_bloom,
            logs,
        })
    }
}
