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

use alloy_primitives::{Address, U256};
use anyhow::Context;
use k256::{
    ecdsa::{RecoveryId, Signature as K256Signature, VerifyingKey as K256VerifyingKey},
    elliptic_curve::sec1::ToEncodedPoint,
    PublicKey as K256PublicKey,
};
use serde::{Deserialize, Serialize};

use crate::{keccak::keccak, rlp::Encodable, transaction::Transaction, ChainId};

/// A signature that can be used to recover the signing public key.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TxSignature {
    pub v: u64,
    pub r: U256,
    pub s: U256,
}

impl TxSignature {
    pub(crate) fn payload_length(&self) -> usize {
        self.v.length() + self.r.length() + self.s.length()
    }

    pub(crate) fn encode_fields(&self, out: &mut Vec<u8>) {
        self.v.encode(out);
        self.r.encode(out);
        self.s.encode(out);
    }
}

impl Transaction {
    /// Recovers the sending party of the transaction.
    ///
    /// Pre-EIP-155 signatures carry `v` of 27 or 28; when the chain ID is
    /// configured, `v` of `35 + 2·chain_id` or one above is also accepted and
    /// the signing hash covers the chain ID.
    pub fn recover_from(&self, chain_id: Option<ChainId>) -> anyhow::Result<Address> {
        let is_y_odd = self.is_y_odd(chain_id).context("v invalid")?;
        let signature = K256Signature::from_scalars(
            self.signature.r.to_be_bytes::<32>(),
            self.signature.s.to_be_bytes::<32>(),
        )
        .context("r, s invalid")?;

        let verify_key = K256VerifyingKey::recover_from_prehash(
            self.essence.signing_hash(chain_id).as_slice(),
            &signature,
            RecoveryId::new(is_y_odd, false),
        )
        .context("invalid signature")?;

        let public_key = K256PublicKey::from(&verify_key);
        let public_key = public_key.to_encoded_point(false);
        let public_key = public_key.as_bytes();
        debug_assert_eq!(public_key[0], 0x04);
        let hash = keccak(&public_key[1..]);

        Ok(Address::from_slice(&hash[12..]))
    }

    fn is_y_odd(&self, chain_id: Option<ChainId>) -> Option<bool> {
        match chain_id {
            None => checked_bool(self.signature.v.checked_sub(27)?),
            Some(chain_id) => {
                checked_bool(self.signature.v.checked_sub(35 + 2 * chain_id)?)
            }
        }
    }
}

#[inline]
fn checked_bool(v: u64) -> Option<bool> {
    match v {
        0 => Some(false),
        1 => Some(true),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{address, Bytes};
    use k256::ecdsa::SigningKey;

    use super::*;
    use crate::transaction::{TransactionKind, TxEssence};

    fn sign(essence: TxEssence, key: &SigningKey, chain_id: Option<ChainId>) -> Transaction {
        let hash = essence.signing_hash(chain_id);
        let (signature, recid) = key.sign_prehash_recoverable(hash.as_slice()).unwrap();
        let v = match chain_id {
            None => 27 + recid.to_byte() as u64,
            Some(chain_id) => 35 + 2 * chain_id + recid.to_byte() as u64,
        };
        Transaction {
            essence,
            signature: TxSignature {
                v,
                r: U256::from_be_slice(signature.r().to_bytes().as_slice()),
                s: U256::from_be_slice(signature.s().to_bytes().as_slice()),
            },
        }
    }

    fn signer_address(key: &SigningKey) -> Address {
        let public_key = key.verifying_key().to_encoded_point(false);
        let hash = keccak(&public_key.as_bytes()[1..]);
        Address::from_slice(&hash[12..])
    }

    #[test]
    fn recover_pre_eip155() {
        let key = SigningKey::from_bytes((&[0x42u8; 32]).into()).unwrap();
        let tx = sign(
            TxEssence {
                nonce: 0,
                gas_price: U256::from(10),
                gas_limit: 21_000,
                to: TransactionKind::Call(address!("0000000000000000000000000000000000000005")),
                value: U256::from(100),
                data: Bytes::new(),
            },
            &key,
            None,
        );
        assert_eq!(tx.recover_from(None).unwrap(), signer_address(&key));
    }

    #[test]
    fn recover_eip155() {
        let key = SigningKey::from_bytes((&[0x01u8; 32]).into()).unwrap();
        let tx = sign(TxEssence::default(), &key, Some(1));
        assert_eq!(tx.recover_from(Some(1)).unwrap(), signer_address(&key));
        // the wrong replay-protection domain must not recover the signer
        assert!(tx
            .recover_from(None)
            .map(|addr| addr != signer_address(&key))
            .unwrap_or(true));
    }
}
