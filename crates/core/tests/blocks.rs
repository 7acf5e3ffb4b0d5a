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

use std::collections::{BTreeSet, HashMap};

use alloy_primitives::{address, Address, Bytes, B256, U256};
use etherite_core::{
    validate_block, validate_header, BlockBuilder, BlockError, BlockParams, TrieState, MAINNET,
};
use etherite_evm::{new_contract_address, WorldState};
use etherite_primitives::{
    block::Header,
    keccak::keccak,
    transaction::{Transaction, TransactionKind, TxEssence},
    signature::TxSignature,
};
use etherite_trie::{MemoryDb, Trie, EMPTY_ROOT};
use hex_literal::hex;
use k256::{ecdsa::SigningKey, elliptic_curve::sec1::ToEncodedPoint};

const BENEFICIARY: Address = address!("0000000000000000000000000000000000000005");

fn signing_key() -> SigningKey {
    SigningKey::from_bytes((&[0x42u8; 32]).into()).unwrap()
}

fn signer_address(key: &SigningKey) -> Address {
    let public_key = key.verifying_key().to_encoded_point(false);
    let hash = keccak(&public_key.as_bytes()[1..]);
    Address::from_slice(&hash[12..])
}

fn sign_tx(essence: TxEssence, key: &SigningKey) -> Transaction {
    let hash = essence.signing_hash(None);
    let (signature, recid) = key.sign_prehash_recoverable(hash.as_slice()).unwrap();
    Transaction {
        essence,
        signature: TxSignature {
            v: 27 + recid.to_byte() as u64,
            r: U256::from_be_slice(signature.r().to_bytes().as_slice()),
            s: U256::from_be_slice(signature.s().to_bytes().as_slice()),
        },
    }
}

/// Commits the given balances/nonces and returns a genesis header over the
/// resulting state root.
fn genesis(db: &mut MemoryDb, accounts: &[(Address, U256, u64)]) -> Header {
    let mut state = TrieState::open(db, EMPTY_ROOT);
    for (address, balance, nonce) in accounts {
        state.create_account(*address, *balance, *nonce);
    }
    let state_root = state.commit().unwrap();
    Header {
        number: 0,
        state_root,
        difficulty: U256::from(131_072),
        gas_limit: 200_000,
        timestamp: 55,
        ..Default::default()
    }
}

#[test]
fn empty_trie_root() {
    assert_eq!(
        Trie::new().hash(),
        B256::from(hex!(
            "56e81f171bcc55a6ff8345e692c0f86e5b48e01b996cadc001622fb5e363b421"
        ))
    );
}

#[test]
fn stop_only_creation() {
    let key = signing_key();
    let sender = signer_address(&key);
    let mut db = MemoryDb::new();
    let parent = genesis(&mut db, &[(sender, U256::from(400_000), 5)]);

    let tx = sign_tx(
        TxEssence {
            nonce: 5,
            gas_price: U256::from(3),
            gas_limit: 100_000,
            to: TransactionKind::Create,
            value: U256::from(5),
            data: Bytes::copy_from_slice(&[0x00]), // STOP
        },
        &key,
    );

    let mut builder = BlockBuilder::new(
        &MAINNET,
        &mut db,
        &parent,
        BlockParams {
            beneficiary: BENEFICIARY,
            timestamp: 65,
            ..Default::default()
        },
        HashMap::new(),
    );
    let receipt = builder.execute_transaction(tx).unwrap();
    assert_eq!(receipt.cumulative_gas_used, 53_004);
    assert!(receipt.logs.is_empty());

    let contract = new_contract_address(sender, 5);
    let state = builder.state_mut();
    assert_eq!(state.balance(sender), U256::from(240_983));
    assert_eq!(state.nonce(sender), 6);
    assert_eq!(state.balance(BENEFICIARY), U256::from(159_012));
    assert_eq!(state.balance(contract), U256::from(5));
}

#[test]
fn add_contract_creation() {
    let key = signing_key();
    let sender = signer_address(&key);
    let mut db = MemoryDb::new();
    let parent = genesis(&mut db, &[(sender, U256::from(10_000_000), 0)]);

    // PUSH1 3; PUSH1 5; ADD; PUSH1 0; MSTORE; PUSH1 32; PUSH1 0; RETURN
    let init = hex!("600360050160005260206000f3");
    let tx = sign_tx(
        TxEssence {
            nonce: 0,
            gas_price: U256::from(1),
            gas_limit: 100_000,
            to: TransactionKind::Create,
            value: U256::ZERO,
            data: Bytes::copy_from_slice(&init),
        },
        &key,
    );

    let mut builder = BlockBuilder::new(
        &MAINNET,
        &mut db,
        &parent,
        BlockParams {
            beneficiary: BENEFICIARY,
            timestamp: 65,
            ..Default::default()
        },
        HashMap::new(),
    );
    builder.execute_transaction(tx).unwrap();

    // the installed code is the 32-byte big-endian integer 8
    let contract = new_contract_address(sender, 0);
    let code = builder.state_mut().code(contract);
    assert_eq!(code.len(), 32);
    assert_eq!(U256::from_be_slice(code.as_ref()), U256::from(8));
}

#[test]
fn holistic_validity_reports_every_mismatch() {
    let mut db = MemoryDb::new();
    let parent = genesis(&mut db, &[]);

    let block = BlockBuilder::new(
        &MAINNET,
        &mut db,
        &parent,
        BlockParams {
            beneficiary: BENEFICIARY,
            timestamp: 65,
            ..Default::default()
        },
        HashMap::new(),
    )
    .finalize(vec![])
    .unwrap();

    // the constructed header matches the scenario and is valid
    assert_eq!(block.header.number, 1);
    assert_eq!(block.header.difficulty, U256::from(131_136));
    assert_eq!(block.header.gas_limit, 200_000);
    assert_eq!(validate_header(&MAINNET, &block.header, Some(&parent)), Ok(()));
    assert!(validate_block(&MAINNET, &mut db, &parent, &block, HashMap::new())
        .unwrap()
        .is_empty());

    // corrupt all four roots at once: all four mismatches are reported
    let mut bad = block.clone();
    bad.header.state_root = B256::repeat_byte(0x01);
    bad.header.transactions_root = B256::repeat_byte(0x02);
    bad.header.receipts_root = B256::repeat_byte(0x03);
    bad.header.ommers_hash = B256::repeat_byte(0x04);
    let errors = validate_block(&MAINNET, &mut db, &parent, &bad, HashMap::new()).unwrap();
    assert_eq!(
        errors,
        BTreeSet::from([
            BlockError::StateRootMismatch,
            BlockError::TransactionsRootMismatch,
            BlockError::ReceiptsRootMismatch,
            BlockError::OmmersHashMismatch,
        ])
    );
}

#[test]
fn block_and_ommer_rewards() {
    let ommer_beneficiary = address!("00000000000000000000000000000000000000aa");
    let mut db = MemoryDb::new();
    let parent = genesis(&mut db, &[]);

    let ommer = Header {
        number: 0,
        beneficiary: ommer_beneficiary,
        ..Default::default()
    };
    let block = BlockBuilder::new(
        &MAINNET,
        &mut db,
        &parent,
        BlockParams {
            beneficiary: BENEFICIARY,
            timestamp: 65,
            ..Default::default()
        },
        HashMap::new(),
    )
    .finalize(vec![ommer])
    .unwrap();

    let reward = MAINNET.block_reward;
    let mut state = TrieState::open(&mut db, block.header.state_root);
    // R + R/32 for the including beneficiary
    assert_eq!(
        state.balance(BENEFICIARY),
        reward + reward / U256::from(32)
    );
    // R·(8-1)/8 for the depth-one ommer's beneficiary
    assert_eq!(
        state.balance(ommer_beneficiary),
        reward * U256::from(7) / U256::from(8)
    );
}

#[test]
fn failed_call_consumes_all_gas() {
    let key = signing_key();
    let sender = signer_address(&key);
    let sink = address!("00000000000000000000000000000000000000bb");
    let mut db = MemoryDb::new();

    let parent = {
        let mut state = TrieState::open(&mut db, EMPTY_ROOT);
        state.create_account(sender, U256::from(1_000_000), 0);
        state.create_account(sink, U256::ZERO, 0);
        // JUMPDEST; PUSH1 0; JUMP — burns gas until it runs out
        state.set_code(sink, Bytes::copy_from_slice(&hex!("5b600056")));
        let state_root = state.commit().unwrap();
        Header {
            number: 0,
            state_root,
            difficulty: U256::from(131_072),
            gas_limit: 200_000,
            timestamp: 55,
            ..Default::default()
        }
    };

    let tx = sign_tx(
        TxEssence {
            nonce: 0,
            gas_price: U256::from(2),
            gas_limit: 30_000,
            to: TransactionKind::Call(sink),
            value: U256::from(7),
            data: Bytes::new(),
        },
        &key,
    );

    let mut builder = BlockBuilder::new(
        &MAINNET,
        &mut db,
        &parent,
        BlockParams {
            beneficiary: BENEFICIARY,
            timestamp: 65,
            ..Default::default()
        },
        HashMap::new(),
    );
    let receipt = builder.execute_transaction(tx).unwrap();
    assert_eq!(receipt.cumulative_gas_used, 30_000);

    let state = builder.state_mut();
    // all gas is consumed, the nonce bump survives, the transfer does not
    assert_eq!(state.balance(sender), U256::from(1_000_000 - 30_000 * 2));
    assert_eq!(state.nonce(sender), 1);
    assert_eq!(state.balance(sink), U256::ZERO);
    assert_eq!(state.balance(BENEFICIARY), U256::from(30_000 * 2));
}

#[test]
fn reapplication_is_deterministic() {
    let key = signing_key();
    let sender = signer_address(&key);
    let recipient = address!("00000000000000000000000000000000000000cc");

    let build = || {
        let mut db = MemoryDb::new();
        let parent = genesis(&mut db, &[(sender, U256::from(10_000_000), 0)]);
        let transfer = sign_tx(
            TxEssence {
                nonce: 0,
                gas_price: U256::from(1),
                gas_limit: 21_000,
                to: TransactionKind::Call(recipient),
                value: U256::from(1234),
                data: Bytes::new(),
            },
            &key,
        );
        let creation = sign_tx(
            TxEssence {
                nonce: 1,
                gas_price: U256::from(1),
                gas_limit: 100_000,
                to: TransactionKind::Create,
                value: U256::ZERO,
                data: Bytes::copy_from_slice(&hex!("600360050160005260206000f3")),
            },
            &key,
        );

        let mut builder = BlockBuilder::new(
            &MAINNET,
            &mut db,
            &parent,
            BlockParams {
                beneficiary: BENEFICIARY,
                timestamp: 65,
                ..Default::default()
            },
            HashMap::new(),
        );
        builder.execute_transaction(transfer).unwrap();
        builder.execute_transaction(creation).unwrap();
        builder.finalize(vec![]).unwrap()
    };

    let first = build();
    let second = build();
    assert_eq!(first.header, second.header);
    assert_eq!(first.hash(), second.hash());
}
