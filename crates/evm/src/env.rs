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

use alloy_primitives::{Address, Bytes, U256};

/// The block-level execution environment visible to bytecode.
#[derive(Debug, Clone, Default)]
pub struct BlockEnv {
    /// Number of the block being executed.
    pub number: u64,
    /// Address receiving this block's rewards and fees.
    pub beneficiary: Address,
    /// Timestamp of the block.
    pub timestamp: u64,
    /// Difficulty of the block.
    pub difficulty: U256,
    /// Gas limit of the block.
    pub gas_limit: u64,
}

/// The transaction-level execution environment.
#[derive(Debug, Clone, Default)]
pub struct TxEnv {
    /// The externally-owned account that initiated the outermost call.
    pub origin: Address,
    /// The effective gas price paid by the origin.
    pub gas_price: U256,
}

/// A message call into an account.
#[derive(Debug, Clone)]
pub struct CallMessage {
    /// The immediate caller visible to the callee.
    pub caller: Address,
    /// The account whose storage and balance the frame operates on.
    pub address: Address,
    /// The account whose code is executed.
    pub code_address: Address,
    /// The apparent value of the call.
    pub value: U256,
    /// Whether `value` is actually moved from `caller` to `address`.
    /// DELEGATECALL carries the parent's value without a transfer.
    pub transfer: bool,
    /// The call data.
    pub data: Bytes,
    /// Gas made available to the callee.
    pub gas: u64,
}

impl CallMessage {
    /// A plain value-bearing CALL from `caller` to `to`.
    pub fn transact(caller: Address, to: Address, value: U256, data: Bytes, gas: u64) -> Self {
        CallMessage {
            caller,
            address: to,
            code_address: to,
            value,
            transfer: true,
            data,
            gas,
        }
    }
}

/// A contract-creation message.
#[derive(Debug, Clone)]
pub struct CreateMessage {
    /// The creating account.
    pub caller: Address,
    /// The address of the new contract, computed by the caller via
    /// [crate::new_contract_address].
    pub address: Address,
    /// The endowment transferred to the new contract.
    pub value: U256,
    /// The init code; its return value becomes the deployed code.
    pub init_code: Bytes,
    /// Gas made available to the init-code execution.
    pub gas: u64,
}
