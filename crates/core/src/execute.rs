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

//! Application of a single transaction to the world state.

use alloy_primitives::{Address, U256};
use anyhow::{ensure, Context};
use etherite_evm::{
    gas, new_contract_address, BlockEnv, BlockHashes, CallMessage, CreateMessage, Evm, TxEnv,
    WorldState,
};
use etherite_primitives::{
    receipt::Receipt,
    transaction::{Transaction, TransactionKind, TxEssence},
};
use etherite_trie::KvStore;
use tracing::debug;

use crate::{chain_spec::ChainSpec, state::TrieState};

/// The outcome of a successfully applied transaction.
///
/// "Applied" includes executions that halted: a revert or out-of-gas still
/// produces a receipt. Only structurally invalid transactions (bad
/// signature, wrong nonce, unaffordable upfront cost) are hard errors that
/// leave the state untouched.
#[derive(Debug)]
pub struct AppliedTransaction {
    /// The recovered sender.
    pub sender: Address,
    /// The address of the created contract for creation transactions.
    pub contract_address: Option<Address>,
    /// Whether the top-level call or creation succeeded.
    pub success: bool,
    /// Total gas charged to the sender, after refunds.
    pub gas_used: u64,
    /// The receipt, carrying the post-transaction state root.
    pub receipt: Receipt,
}

/// The fixed pre-execution charge of a transaction:
/// `21000 + 68·|nonzero data bytes| + 4·|zero data bytes|`, plus `32000`
/// for a contract creation.
pub fn intrinsic_gas(essence: &TxEssence) -> u64 {
    let zero_bytes = essence.data.iter().filter(|byte| **byte == 0).count() as u64;
    let nonzero_bytes = essence.data.len() as u64 - zero_bytes;
    let mut intrinsic_gas =
        gas::TX + gas::TX_DATA_ZERO * zero_bytes + gas::TX_DATA_NONZERO * nonzero_bytes;
    if essence.to == TransactionKind::Create {
        intrinsic_gas += gas::TX_CREATE;
    }
    intrinsic_gas
}

/// Applies `tx` to the state, following the canonical sequence: recover the
/// sender, check nonce and upfront affordability, buy gas, bump the nonce,
/// execute, refund (capped at half the gas used), pay the beneficiary,
/// sweep self-destructed accounts, and emit the receipt.
pub fn apply_transaction<S: KvStore, H: BlockHashes>(
    spec: &ChainSpec,
    state: &mut TrieState<'_, S>,
    block: &BlockEnv,
    hashes: &H,
    tx: &Transaction,
    cumulative_gas: u64,
) -> anyhow::Result<AppliedTransaction> {
    let sender = tx
        .recover_from(spec.chain_id)
        .context("signature recovery failed")?;
    let essence = &tx.essence;

    let intrinsic_gas = intrinsic_gas(essence);
    ensure!(
        essence.gas_limit >= intrinsic_gas,
        "gas limit {} below intrinsic gas {}",
        essence.gas_limit,
        intrinsic_gas,
    );
    let nonce = state.nonce(sender);
    ensure!(
        nonce == essence.nonce,
        "nonce mismatch: expected {}, got {}",
        nonce,
        essence.nonce,
    );
    let gas_cost = U256::from(essence.gas_limit) * essence.gas_price;
    let upfront = gas_cost + essence.value;
    ensure!(
        state.balance(sender) >= upfront,
        "insufficient balance for upfront cost {}",
        upfront,
    );

    // buy gas and bump the nonce; both survive a failed execution
    state.sub_balance(sender, gas_cost);
    state.increment_nonce(sender);

    let tx_env = TxEnv {
        origin: sender,
        gas_price: essence.gas_price,
    };
    let execution_gas = essence.gas_limit - intrinsic_gas;
    let mut evm = Evm::new(state, block, &tx_env, hashes);
    let (success, gas_left, contract_address) = match essence.to {
        TransactionKind::Create => {
            let address = new_contract_address(sender, essence.nonce);
            let outcome = evm.create(CreateMessage {
                caller: sender,
                address,
                value: essence.value,
                init_code: essence.data.clone(),
                gas: execution_gas,
            });
            (outcome.success(), outcome.gas_left, outcome.address)
        }
        TransactionKind::Call(to) => {
            let outcome = evm.call(CallMessage::transact(
                sender,
                to,
                essence.value,
                essence.data.clone(),
                execution_gas,
            ));
            (outcome.success, outcome.gas_left, None)
        }
    };
    let substate = std::mem::take(&mut evm.substate);
    drop(evm);

    // the refund counter is capped at half of the gas used
    let refund = substate.refund.min((essence.gas_limit - gas_left) / 2);
    let remaining = gas_left + refund;
    let gas_used = essence.gas_limit - remaining;

    state.add_balance(sender, U256::from(remaining) * essence.gas_price);
    state.add_balance(block.beneficiary, U256::from(gas_used) * essence.gas_price);

    for address in &substate.selfdestructs {
        state.delete_account(*address);
    }

    let state_root = state.commit()?;
    debug!(
        sender = %sender,
        gas_used,
        success,
        logs = substate.logs.len(),
        "applied transaction"
    );

    Ok(AppliedTransaction {
        sender,
        contract_address,
        success,
        gas_used,
        receipt: Receipt::new(state_root, cumulative_gas + gas_used, substate.logs),
    })
}
