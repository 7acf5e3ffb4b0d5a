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

use alloy_primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};

use crate::{
    keccak::keccak,
    rlp::{self, Decodable, Encodable, EMPTY_STRING_CODE},
    signature::TxSignature,
    ChainId, TxNumber,
};

/// Represents the recipient of a transaction: either a contract creation or a
/// call to an existing account.
///
/// This enum is used to distinguish between the two primary types of
/// transactions. It avoids using an [Option] for this purpose because the
/// wire form of a creation is the empty byte string, not a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TransactionKind {
    /// The transaction creates a new contract.
    #[default]
    Create,
    /// The transaction calls the account with the given 160-bit address.
    Call(Address),
}

impl From<TransactionKind> for Option<Address> {
    fn from(value: TransactionKind) -> Self {
        match value {
            TransactionKind::Create => None,
            TransactionKind::Call(addr) => Some(addr),
        }
    }
}

impl Encodable for TransactionKind {
    #[inline]
    fn encode(&self, out: &mut Vec<u8>) {
        match self {
            TransactionKind::Call(addr) => addr.encode(out),
            TransactionKind::Create => out.push(EMPTY_STRING_CODE),
        }
    }

    #[inline]
    fn length(&self) -> usize {
        match self {
            TransactionKind::Call(addr) => addr.length(),
            TransactionKind::Create => 1,
        }
    }
}

impl Decodable for TransactionKind {
    fn decode(buf: &mut &[u8]) -> Result<Self, rlp::Error> {
        let bytes = rlp::decode_bytes(buf)?;
        match bytes.len() {
            0 => Ok(TransactionKind::Create),
            20 => Ok(TransactionKind::Call(Address::from_slice(bytes))),
            _ => Err(rlp::Error::UnexpectedLength),
        }
    }
}

/// The unsigned core of a transaction.
///
/// These are the fields covered by the signature. For a message call, `data`
/// is the call input; for a contract creation, it is the init code.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TxEssence {
    /// A numeric value equal to the number of transactions previously sent by
    /// the sender.
    pub nonce: TxNumber,
    /// The price, in Wei, the sender is willing to pay per unit of gas.
    pub gas_price: U256,
    /// The maximum amount of gas allocated for the transaction's execution.
    pub gas_limit: u64,
    /// The recipient of the message call, or [TransactionKind::Create].
    pub to: TransactionKind,
    /// The amount, in Wei, transferred to the recipient (or endowed to the
    /// created contract).
    pub value: U256,
    /// The call data, or the init code for a creation.
    pub data: Bytes,
}

impl TxEssence {
    /// Computes the length of the RLP-encoded payload in bytes.
    pub fn payload_length(&self) -> usize {
        self.nonce.length()
            + self.gas_price.length()
            + self.gas_limit.length()
            + self.to.length()
            + self.value.length()
            + self.data.length()
    }

    fn encode_fields(&self, out: &mut Vec<u8>) {
        self.nonce.encode(out);
        self.gas_price.encode(out);
        self.gas_limit.encode(out);
        self.to.encode(out);
        self.value.encode(out);
        self.data.encode(out);
    }

    /// Encodes the essence for the purpose of signing.
    ///
    /// Without a chain ID this is the plain six-field list. With a chain ID,
    /// the encoding appends `[chain_id, 0, 0]` as set out in
    /// [EIP-155](https://eips.ethereum.org/EIPS/eip-155).
    pub fn signing_encode(&self, chain_id: Option<ChainId>, out: &mut Vec<u8>) {
        let mut payload_length = self.payload_length();
        if let Some(chain_id) = chain_id {
            payload_length += chain_id.length() + 1 + 1;
        }
        rlp::Header {
            list: true,
            payload_length,
        }
        .encode(out);
        self.encode_fields(out);
        if let Some(chain_id) = chain_id {
            chain_id.encode(out);
            out.push(EMPTY_STRING_CODE);
            out.push(EMPTY_STRING_CODE);
        }
    }

    /// The hash signed by the sender.
    pub fn signing_hash(&self, chain_id: Option<ChainId>) -> B256 {
        let mut out = Vec::with_capacity(self.payload_length() + 16);
        self.signing_encode(chain_id, &mut out);
        keccak(out).into()
    }
}

/// A signed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Transaction {
    /// The signed fields.
    pub essence: TxEssence,
    /// The recoverable signature over the signing hash of the essence.
    pub signature: TxSignature,
}

impl Transaction {
    fn payload_length(&self) -> usize {
        self.essence.payload_length() + self.signature.payload_length()
    }

    /// Calculates the transaction hash, the Keccak of the nine-field RLP.
    pub fn hash(&self) -> B256 {
        keccak(rlp::encode(self)).into()
    }
}

impl Encodable for Transaction {
    /// Encodes the transaction as the canonical nine-field list.
    fn encode(&self, out: &mut Vec<u8>) {
        rlp::Header {
            list: true,
            payload_length: self.payload_length(),
        }
        .encode(out);
        self.essence.encode_fields(out);
        self.signature.encode_fields(out);
    }

    fn length(&self) -> usize {
        let payload_length = self.payload_length();
        rlp::length_of_length(payload_length) + payload_length
    }
}

impl Decodable for Transaction {
    fn decode(buf: &mut &[u8]) -> Result<Self, rlp::Error> {
        let header = rlp::Header::decode(buf)?;
        if !header.list {
            return Err(rlp::Error::UnexpectedString);
        }
        Ok(Transaction {
            essence: TxEssence {
                nonce: Decodable::decode(buf)?,
                gas_price: Decodable::decode(buf)?,
                gas_limit: Decodable::decode(buf)?,
                to: Decodable::decode(buf)?,
                value: Decodable::decode(buf)?,
                data: Decodable::decode(buf)?,
            },
            signature: TxSignature {
                v: Decodable::decode(buf)?,
                r: Decodable::decode(buf)?,
                s: Decodable::decode(buf)?,
            },
        })
    }
}
