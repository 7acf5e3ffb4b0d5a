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

use alloy_primitives::{Address, Bytes, B256, I256, U256};
use etherite_primitives::{
    keccak::keccak,
    receipt::Log,
    rlp::{self, Encodable},
};
use tracing::trace;

use crate::{
    env::{BlockEnv, CallMessage, CreateMessage, TxEnv},
    gas,
    host::{BlockHashes, WorldState},
    memory::Memory,
    opcode::{self, OPCODES},
    result::{CallOutcome, CreateOutcome, Halt},
    stack::{Stack, STACK_LIMIT},
    substate::Substate,
};

/// Maximum depth of nested message calls.
pub const CALL_STACK_LIMIT: usize = 1024;

/// Computes the address of a contract created by `sender` with the given
/// account nonce: `keccak(rlp([sender, nonce]))[12..32]`.
pub fn new_contract_address(sender: Address, nonce: u64) -> Address {
    let mut out = Vec::with_capacity(24);
    rlp::Header {
        list: true,
        payload_length: sender.length() + nonce.length(),
    }
    .encode(&mut out);
    sender.encode(&mut out);
    nonce.encode(&mut out);
    Address::from_slice(&keccak(out)[12..])
}

/// The execution environment of a single frame.
struct FrameEnv {
    /// Account whose storage and balance the frame operates on.
    address: Address,
    /// The immediate caller.
    caller: Address,
    /// The apparent value of the call.
    value: U256,
    /// The code being executed.
    code: Bytes,
    /// The call data.
    input: Bytes,
    /// Gas available to the frame.
    gas: u64,
}

/// The outcome of one executed frame.
struct FrameResult {
    halt: Halt,
    gas_left: u64,
    output: Vec<u8>,
}

impl FrameResult {
    fn halted(halt: Halt) -> Self {
        FrameResult {
            halt,
            gas_left: 0,
            output: vec![],
        }
    }
}

/// The EVM executor: runs message calls and contract creations against a
/// [WorldState], accruing a [Substate] of logs, deletions and refunds.
#[derive(Debug)]
pub struct Evm<'a, W: WorldState, H: BlockHashes> {
    state: &'a mut W,
    block: &'a BlockEnv,
    tx: &'a TxEnv,
    hashes: &'a H,
    /// The sub-state accrued by the current transaction.
    pub substate: Substate,
    depth: usize,
}

impl<'a, W: WorldState, H: BlockHashes> Evm<'a, W, H> {
    pub fn new(state: &'a mut W, block: &'a BlockEnv, tx: &'a TxEnv, hashes: &'a H) -> Self {
        Evm {
            state,
            block,
            tx,
            hashes,
            substate: Substate::new(),
            depth: 0,
        }
    }

    /// Executes a message call.
    ///
    /// On success the callee's state writes and sub-state are kept; on
    /// failure both are rolled back and only the gas bookkeeping remains.
    pub fn call(&mut self, msg: CallMessage) -> CallOutcome {
        if self.depth >= CALL_STACK_LIMIT {
            return CallOutcome::not_executed(msg.gas, Some(Halt::CallDepthExceeded));
        }
        let snapshot = self.state.snapshot();
        let checkpoint = self.substate.checkpoint();
        if msg.transfer && !self.state.transfer(msg.caller, msg.address, msg.value) {
            return CallOutcome::not_executed(msg.gas, None);
        }
        trace!(
            depth = self.depth,
            to = %msg.address,
            gas = msg.gas,
            "message call"
        );

        let code = self.state.code(msg.code_address);
        self.depth += 1;
        let result = self.run_frame(&FrameEnv {
            address: msg.address,
            caller: msg.caller,
            value: msg.value,
            code,
            input: msg.data,
            gas: msg.gas,
        });
        self.depth -= 1;

        if result.halt.is_success() {
            CallOutcome {
                success: true,
                gas_left: result.gas_left,
                output: result.output.into(),
                halt: Some(result.halt),
            }
        } else {
            self.state.revert(snapshot);
            self.substate.revert(checkpoint);
            CallOutcome {
                success: false,
                gas_left: result.gas_left,
                output: Bytes::new(),
                halt: Some(result.halt),
            }
        }
    }

    /// Executes a contract creation.
    ///
    /// The init code runs with the new account already endowed; its return
    /// value becomes the deployed code, charged at 200 gas per byte. The
    /// creation fails on a collision with an account that has a nonzero
    /// nonce or nonempty code.
    pub fn create(&mut self, msg: CreateMessage) -> CreateOutcome {
        if self.depth >= CALL_STACK_LIMIT {
            return CreateOutcome {
                address: None,
                gas_left: msg.gas,
                halt: Some(Halt::CallDepthExceeded),
            };
        }
        if self.state.nonce(msg.address) != 0 || !self.state.code(msg.address).is_empty() {
            // address collision consumes all gas
            return CreateOutcome {
                address: None,
                gas_left: 0,
                halt: None,
            };
        }
        let snapshot = self.state.snapshot();
        let checkpoint = self.substate.checkpoint();
        if !self.state.transfer(msg.caller, msg.address, msg.value) {
            return CreateOutcome {
                address: None,
                gas_left: msg.gas,
                halt: None,
            };
        }
        trace!(
            depth = self.depth,
            address = %msg.address,
            gas = msg.gas,
            "contract creation"
        );

        self.depth += 1;
        let result = self.run_frame(&FrameEnv {
            address: msg.address,
            caller: msg.caller,
            value: msg.value,
            code: msg.init_code,
            input: Bytes::new(),
            gas: msg.gas,
        });
        self.depth -= 1;

        if result.halt.is_success() {
            let deposit = gas::CREATE_DATA * result.output.len() as u64;
            if result.gas_left >= deposit {
                self.state.set_code(msg.address, result.output.into());
                return CreateOutcome {
                    address: Some(msg.address),
                    gas_left: result.gas_left - deposit,
                    halt: Some(Halt::Normal),
                };
            }
            // the code deposit cannot be paid
            self.state.revert(snapshot);
            self.substate.revert(checkpoint);
            return CreateOutcome {
                address: None,
                gas_left: 0,
                halt: Some(Halt::OutOfGas),
            };
        }

        self.state.revert(snapshot);
        self.substate.revert(checkpoint);
        CreateOutcome {
            address: None,
            gas_left: 0,
            halt: Some(result.halt),
        }
    }

    /// Interprets one frame of bytecode to completion.
    fn run_frame(&mut self, frame: &FrameEnv) -> FrameResult {
        let code = frame.code.as_ref();
        let jumpdests = opcode::analyze_jumpdests(code);
        let mut stack = Stack::new();
        let mut memory = Memory::new();
        let mut gas = frame.gas;
        let mut pc: usize = 0;

        macro_rules! halt {
            ($reason:expr) => {
                return FrameResult::halted($reason)
            };
        }
        macro_rules! charge {
            ($cost:expr) => {{
                let cost: u128 = $cost as u128;
                if (gas as u128) < cost {
                    halt!(Halt::OutOfGas)
                }
                gas -= cost as u64;
            }};
        }
        // charges the expansion of `offset..offset+len` and grows the memory,
        // yielding the region as `(usize, usize)`
        macro_rules! expand {
            ($offset:expr, $len:expr) => {{
                let (offset, len) = match region($offset, $len) {
                    Some(region) => region,
                    None => halt!(Halt::OutOfGas),
                };
                match memory.expansion_cost(offset, len) {
                    Some(cost) => charge!(cost),
                    None => halt!(Halt::OutOfGas),
                }
                memory.grow(offset as usize, len as usize);
                (offset as usize, len as usize)
            }};
        }

        loop {
            let op = if pc < code.len() {
                code[pc]
            } else {
                opcode::STOP
            };
            let info = match OPCODES[op as usize] {
                Some(info) => info,
                None => halt!(Halt::InvalidInstruction),
            };
            if stack.len() < info.inputs as usize {
                halt!(Halt::StackUnderflow);
            }
            if stack.len() - info.inputs as usize + info.outputs as usize > STACK_LIMIT {
                halt!(Halt::StackOverflow);
            }
            charge!(info.base_gas);

            match op {
                opcode::STOP => {
                    return FrameResult {
                        halt: Halt::Normal,
                        gas_left: gas,
                        output: vec![],
                    }
                }

                opcode::ADD => {
                    let (a, b) = (stack.pop(), stack.pop());
                    stack.push(a.wrapping_add(b));
                }
                opcode::MUL => {
                    let (a, b) = (stack.pop(), stack.pop());
                    stack.push(a.wrapping_mul(b));
                }
                opcode::SUB => {
                    let (a, b) = (stack.pop(), stack.pop());
                    stack.push(a.wrapping_sub(b));
                }
                opcode::DIV => {
                    let (a, b) = (stack.pop(), stack.pop());
                    stack.push(a.checked_div(b).unwrap_or_default());
                }
                opcode::SDIV => {
                    let (a, b) = (I256::from_raw(stack.pop()), I256::from_raw(stack.pop()));
                    let quotient = if b == I256::ZERO {
                        I256::ZERO
                    } else if a == I256::MIN && b == I256::MINUS_ONE {
                        I256::MIN
                    } else {
                        a / b
                    };
                    stack.push(quotient.into_raw());
                }
                opcode::MOD => {
                    let (a, b) = (stack.pop(), stack.pop());
                    stack.push(a.checked_rem(b).unwrap_or_default());
                }
                opcode::SMOD => {
                    let (a, b) = (I256::from_raw(stack.pop()), I256::from_raw(stack.pop()));
                    let remainder = if b == I256::ZERO || b == I256::MINUS_ONE {
                        I256::ZERO
                    } else {
                        a % b
                    };
                    stack.push(remainder.into_raw());
                }
                opcode::ADDMOD => {
                    let (a, b, n) = (stack.pop(), stack.pop(), stack.pop());
                    stack.push(a.add_mod(b, n));
                }
                opcode::MULMOD => {
                    let (a, b, n) = (stack.pop(), stack.pop(), stack.pop());
                    stack.push(a.mul_mod(b, n));
                }
                opcode::EXP => {
                    let (base, exponent) = (stack.pop(), stack.pop());
                    charge!(gas::EXP_BYTE * gas::exp_byte_length(&exponent));
                    stack.push(base.pow(exponent));
                }
                opcode::SIGNEXTEND => {
                    let (k, x) = (stack.pop(), stack.pop());
                    let extended = if k < U256::from(31) {
                        let bit_index = 8 * usize::try_from(k).expect("k < 31") + 7;
                        let mask = (U256::ONE << (bit_index + 1)).wrapping_sub(U256::ONE);
                        if x.bit(bit_index) {
                            x | !mask
                        } else {
                            x & mask
                        }
                    } else {
                        x
                    };
                    stack.push(extended);
                }

                opcode::LT => {
                    let (a, b) = (stack.pop(), stack.pop());
                    stack.push(bool_word(a < b));
                }
                opcode::GT => {
                    let (a, b) = (stack.pop(), stack.pop());
                    stack.push(bool_word(a > b));
                }
                opcode::SLT => {
                    let (a, b) = (I256::from_raw(stack.pop()), I256::from_raw(stack.pop()));
                    stack.push(bool_word(a < b));
                }
                opcode::SGT => {
                    let (a, b) = (I256::from_raw(stack.pop()), I256::from_raw(stack.pop()));
                    stack.push(bool_word(a > b));
                }
                opcode::EQ => {
                    let (a, b) = (stack.pop(), stack.pop());
                    stack.push(bool_word(a == b));
                }
                opcode::ISZERO => {
                    let a = stack.pop();
                    stack.push(bool_word(a.is_zero()));
                }
                opcode::AND => {
                    let (a, b) = (stack.pop(), stack.pop());
                    stack.push(a & b);
                }
                opcode::OR => {
                    let (a, b) = (stack.pop(), stack.pop());
                    stack.push(a | b);
                }
                opcode::XOR => {
                    let (a, b) = (stack.pop(), stack.pop());
                    stack.push(a ^ b);
                }
                opcode::NOT => {
                    let a = stack.pop();
                    stack.push(!a);
                }
                opcode::BYTE => {
                    let (i, x) = (stack.pop(), stack.pop());
                    let byte = if i < U256::from(32) {
                        // the stack index is big-endian
                        x.byte(31 - usize::try_from(i).expect("i < 32"))
                    } else {
                        0
                    };
                    stack.push(U256::from(byte));
                }

                opcode::SHA3 => {
                    let (offset, len) = (stack.pop(), stack.pop());
                    let (offset, len) = expand!(offset, len);
                    charge!(gas::SHA3_WORD * gas::to_words(len as u64));
                    let hash = keccak(memory.slice(offset, len));
                    stack.push(U256::from_be_bytes(hash));
                }

                opcode::ADDRESS => stack.push(address_word(frame.address)),
                opcode::BALANCE => {
                    let address = word_address(stack.pop());
                    let balance = self.state.balance(address);
                    stack.push(balance);
                }
                opcode::ORIGIN => stack.push(address_word(self.tx.origin)),
                opcode::CALLER => stack.push(address_word(frame.caller)),
                opcode::CALLVALUE => stack.push(frame.value),
                opcode::CALLDATALOAD => {
                    let index = stack.pop();
                    let mut word = [0u8; 32];
                    if let Ok(index) = usize::try_from(index) {
                        if index < frame.input.len() {
                            let end = (index + 32).min(frame.input.len());
                            word[..end - index].copy_from_slice(&frame.input[index..end]);
                        }
                    }
                    stack.push(U256::from_be_bytes(word));
                }
                opcode::CALLDATASIZE => stack.push(U256::from(frame.input.len())),
                opcode::CALLDATACOPY => {
                    let (dest, src, len) = (stack.pop(), stack.pop(), stack.pop());
                    let (dest, len) = expand!(dest, len);
                    charge!(gas::COPY_WORD * gas::to_words(len as u64));
                    memory.store_padded(dest, tail(&frame.input, src), len);
                }
                opcode::CODESIZE => stack.push(U256::from(code.len())),
                opcode::CODECOPY => {
                    let (dest, src, len) = (stack.pop(), stack.pop(), stack.pop());
                    let (dest, len) = expand!(dest, len);
                    charge!(gas::COPY_WORD * gas::to_words(len as u64));
                    memory.store_padded(dest, tail(code, src), len);
                }
                opcode::GASPRICE => stack.push(self.tx.gas_price),
                opcode::EXTCODESIZE => {
                    let address = word_address(stack.pop());
                    let size = self.state.code(address).len();
                    stack.push(U256::from(size));
                }
                opcode::EXTCODECOPY => {
                    let address = word_address(stack.pop());
                    let (dest, src, len) = (stack.pop(), stack.pop(), stack.pop());
                    let (dest, len) = expand!(dest, len);
                    charge!(gas::COPY_WORD * gas::to_words(len as u64));
                    let ext_code = self.state.code(address);
                    memory.store_padded(dest, tail(&ext_code, src), len);
                }

                opcode::BLOCKHASH => {
                    let number = stack.pop();
                    let hash = u64::try_from(number)
                        .ok()
                        .filter(|n| *n < self.block.number && self.block.number - n <= 256)
                        .and_then(|n| self.hashes.block_hash(n))
                        .unwrap_or(B256::ZERO);
                    stack.push(U256::from_be_bytes(hash.0));
                }
                opcode::COINBASE => stack.push(address_word(self.block.beneficiary)),
                opcode::TIMESTAMP => stack.push(U256::from(self.block.timestamp)),
                opcode::NUMBER => stack.push(U256::from(self.block.number)),
                opcode::DIFFICULTY => stack.push(self.block.difficulty),
                opcode::GASLIMIT => stack.push(U256::from(self.block.gas_limit)),

                opcode::POP => {
                    stack.pop();
                }
                opcode::MLOAD => {
                    let offset = stack.pop();
                    let (offset, _) = expand!(offset, U256::from(32));
                    stack.push(memory.load_word(offset));
                }
                opcode::MSTORE => {
                    let (offset, value) = (stack.pop(), stack.pop());
                    let (offset, _) = expand!(offset, U256::from(32));
                    memory.store_word(offset, value);
                }
                opcode::MSTORE8 => {
                    let (offset, value) = (stack.pop(), stack.pop());
                    let (offset, _) = expand!(offset, U256::from(1));
                    memory.store_byte(offset, value.byte(0));
                }
                opcode::SLOAD => {
                    let slot = stack.pop();
                    let value = self.state.storage(frame.address, slot);
                    stack.push(value);
                }
                opcode::SSTORE => {
                    let (slot, value) = (stack.pop(), stack.pop());
                    let current = self.state.storage(frame.address, slot);
                    if current.is_zero() && !value.is_zero() {
                        charge!(gas::SSTORE_SET);
                    } else {
                        charge!(gas::SSTORE_RESET);
                    }
                    if !current.is_zero() && value.is_zero() {
                        self.substate.add_refund(gas::SSTORE_CLEAR_REFUND);
                    }
                    self.state.set_storage(frame.address, slot, value);
                }
                opcode::JUMP => {
                    let dest = stack.pop();
                    match jump_target(&jumpdests, dest) {
                        Some(dest) => {
                            pc = dest;
                            continue;
                        }
                        None => halt!(Halt::BadJumpDestination),
                    }
                }
                opcode::JUMPI => {
                    let (dest, condition) = (stack.pop(), stack.pop());
                    if !condition.is_zero() {
                        match jump_target(&jumpdests, dest) {
                            Some(dest) => {
                                pc = dest;
                                continue;
                            }
                            None => halt!(Halt::BadJumpDestination),
                        }
                    }
                }
                opcode::PC => stack.push(U256::from(pc)),
                opcode::MSIZE => stack.push(U256::from(memory.len())),
                opcode::GAS => stack.push(U256::from(gas)),
                opcode::JUMPDEST => {}

                opcode::PUSH1..=opcode::PUSH32 => {
                    let n = opcode::immediate_size(op);
                    let mut word = [0u8; 32];
                    let start = (pc + 1).min(code.len());
                    let end = (pc + 1 + n).min(code.len());
                    // bytes past the end of code read as zero
                    word[32 - n..32 - n + (end - start)].copy_from_slice(&code[start..end]);
                    stack.push(U256::from_be_bytes(word));
                    pc += 1 + n;
                    continue;
                }
                opcode::DUP1..=opcode::DUP16 => {
                    stack.dup((op - opcode::DUP1) as usize + 1);
                }
                opcode::SWAP1..=opcode::SWAP16 => {
                    stack.swap((op - opcode::SWAP1) as usize + 1);
                }

                opcode::LOG0..=opcode::LOG4 => {
                    let topic_count = (op - opcode::LOG0) as usize;
                    let (offset, len) = (stack.pop(), stack.pop());
                    let (offset, len) = expand!(offset, len);
                    charge!(
                        gas::LOG_TOPIC * topic_count as u64 + gas::LOG_DATA * len as u64
                    );
                    let mut topics = Vec::with_capacity(topic_count);
                    for _ in 0..topic_count {
                        topics.push(B256::from(stack.pop().to_be_bytes::<32>()));
                    }
                    self.substate.append_log(Log {
                        address: frame.address,
                        topics,
                        data: Bytes::copy_from_slice(memory.slice(offset, len)),
                    });
                }

                opcode::CREATE => {
                    let (value, offset, len) = (stack.pop(), stack.pop(), stack.pop());
                    let (offset, len) = expand!(offset, len);
                    let init_code = Bytes::copy_from_slice(memory.slice(offset, len));

                    if self.depth >= CALL_STACK_LIMIT
                        || self.state.balance(frame.address) < value
                    {
                        stack.push(U256::ZERO);
                    } else {
                        let nonce = self.state.nonce(frame.address);
                        let address = new_contract_address(frame.address, nonce);
                        self.state.increment_nonce(frame.address);

                        // the init code runs on all remaining gas
                        let forwarded = gas;
                        gas = 0;
                        let outcome = self.create(CreateMessage {
                            caller: frame.address,
                            address,
                            value,
                            init_code,
                            gas: forwarded,
                        });
                        gas += outcome.gas_left;
                        match outcome.address {
                            Some(address) => stack.push(address_word(address)),
                            None => stack.push(U256::ZERO),
                        }
                    }
                }
                opcode::CALL | opcode::CALLCODE => {
                    let (requested, to, value) = (stack.pop(), stack.pop(), stack.pop());
                    let to = word_address(to);
                    let (in_offset, in_len) = (stack.pop(), stack.pop());
                    let (out_offset, out_len) = (stack.pop(), stack.pop());
                    let (in_offset, in_len) = expand!(in_offset, in_len);
                    let (out_offset, out_len) = expand!(out_offset, out_len);

                    if !value.is_zero() {
                        charge!(gas::CALL_VALUE);
                    }
                    if op == opcode::CALL && !self.state.exists(to) {
                        charge!(gas::NEW_ACCOUNT);
                    }
                    // the forwarded gas is part of the operation's cost
                    let requested = u64::try_from(requested).unwrap_or(u64::MAX);
                    charge!(requested);
                    let stipend = if value.is_zero() { 0 } else { gas::CALL_STIPEND };

                    let data = Bytes::copy_from_slice(memory.slice(in_offset, in_len));
                    let message = if op == opcode::CALL {
                        CallMessage {
                            caller: frame.address,
                            address: to,
                            code_address: to,
                            value,
                            transfer: true,
                            data,
                            gas: requested + stipend,
                        }
                    } else {
                        CallMessage {
                            caller: frame.address,
                            address: frame.address,
                            code_address: to,
                            value,
                            transfer: true,
                            data,
                            gas: requested + stipend,
                        }
                    };
                    let outcome = self.call(message);
                    gas += outcome.gas_left;
                    let copy_len = out_len.min(outcome.output.len());
                    memory.store(out_offset, &outcome.output[..copy_len]);
                    stack.push(bool_word(outcome.success));
                }
                opcode::DELEGATECALL => {
                    let (requested, to) = (stack.pop(), stack.pop());
                    let to = word_address(to);
                    let (in_offset, in_len) = (stack.pop(), stack.pop());
                    let (out_offset, out_len) = (stack.pop(), stack.pop());
                    let (in_offset, in_len) = expand!(in_offset, in_len);
                    let (out_offset, out_len) = expand!(out_offset, out_len);

                    let requested = u64::try_from(requested).unwrap_or(u64::MAX);
                    charge!(requested);

                    // the parent's caller and value are carried through
                    let outcome = self.call(CallMessage {
                        caller: frame.caller,
                        address: frame.address,
                        code_address: to,
                        value: frame.value,
                        transfer: false,
                        data: Bytes::copy_from_slice(memory.slice(in_offset, in_len)),
                        gas: requested,
                    });
                    gas += outcome.gas_left;
                    let copy_len = out_len.min(outcome.output.len());
                    memory.store(out_offset, &outcome.output[..copy_len]);
                    stack.push(bool_word(outcome.success));
                }
                opcode::RETURN => {
                    let (offset, len) = (stack.pop(), stack.pop());
                    let (offset, len) = expand!(offset, len);
                    return FrameResult {
                        halt: Halt::Normal,
                        gas_left: gas,
                        output: memory.slice(offset, len).to_vec(),
                    };
                }
                opcode::SELFDESTRUCT => {
                    let target = word_address(stack.pop());
                    if self.substate.mark_for_deletion(frame.address) {
                        self.substate.add_refund(gas::SELFDESTRUCT_REFUND);
                    }
                    // move the whole balance, even if that creates the target
                    let balance = self.state.balance(frame.address);
                    self.state.transfer(frame.address, target, balance);
                    return FrameResult {
                        halt: Halt::Normal,
                        gas_left: gas,
                        output: vec![],
                    };
                }

                _ => halt!(Halt::InvalidInstruction),
            }
            pc += 1;
        }
    }
}

/// Converts a memory region given as 256-bit words into `(offset, len)`,
/// rejecting regions that cannot be addressed.
fn region(offset: U256, len: U256) -> Option<(u64, u64)> {
    let len = u64::try_from(len).ok()?;
    if len == 0 {
        return Some((0, 0));
    }
    let offset = u64::try_from(offset).ok()?;
    Some((offset, len))
}

/// The slice of `source` starting at `offset`, empty when out of range.
fn tail(source: &[u8], offset: U256) -> &[u8] {
    match usize::try_from(offset) {
        Ok(offset) if offset < source.len() => &source[offset..],
        _ => &[],
    }
}

/// Validates a jump destination against the analyzed code.
fn jump_target(jumpdests: &[bool], dest: U256) -> Option<usize> {
    usize::try_from(dest)
        .ok()
        .filter(|dest| jumpdests.get(*dest).copied().unwrap_or(false))
}

#[inline]
fn bool_word(value: bool) -> U256 {
    U256::from(value as u64)
}

#[inline]
fn address_word(address: Address) -> U256 {
    U256::from_be_bytes(address.into_word().0)
}

#[inline]
fn word_address(word: U256) -> Address {
    Address::from_word(B256::from(word.to_be_bytes::<32>()))
}

#[cfg(test)]
mod tests {
    use alloy_primitives::address;
    use hex_literal::hex;

    use super::*;
    use crate::state::MemoryState;

    const CALLER: Address = address!("000000000000000000000000000000000000c417");

    fn run(code: &[u8], gas: u64) -> (CallOutcome, MemoryState, Substate) {
        run_with_state(MemoryState::new(), code, gas)
    }

    fn run_with_state(
        mut state: MemoryState,
        code: &[u8],
        gas: u64,
    ) -> (CallOutcome, MemoryState, Substate) {
        let contract = address!("00000000000000000000000000000000000000aa");
        state.insert_code(contract, Bytes::copy_from_slice(code));
        let block = BlockEnv {
            number: 100,
            timestamp: 30,
            gas_limit: 1_000_000,
            ..Default::default()
        };
        let tx = TxEnv {
            origin: CALLER,
            gas_price: U256::from(3),
        };
        let mut evm = Evm::new(&mut state, &block, &tx, &());
        let outcome = evm.call(CallMessage::transact(
            CALLER,
            contract,
            U256::ZERO,
            Bytes::new(),
            gas,
        ));
        let substate = core::mem::take(&mut evm.substate);
        drop(evm);
        (outcome, state, substate)
    }

    #[test]
    fn creation_address() {
        // the classic example: sender 0x6ac7ea33f8831ea9dcc53393aaa88b25a785dbf0
        let sender = address!("6ac7ea33f8831ea9dcc53393aaa88b25a785dbf0");
        assert_eq!(
            new_contract_address(sender, 0),
            address!("cd234a471b72ba2f1ccf0a70fcaba648a5eecd8d")
        );
        assert_eq!(
            new_contract_address(sender, 1),
            address!("343c43a37d37dff08ae8c4a11544c718abb4fcf8")
        );
    }

    #[test]
    fn add_and_return() {
        // PUSH1 3; PUSH1 5; ADD; PUSH1 0; MSTORE; PUSH1 32; PUSH1 0; RETURN
        let code = hex!("600360050160005260206000f3");
        let (outcome, _, _) = run(&code, 100_000);
        assert!(outcome.success);
        assert_eq!(outcome.output.len(), 32);
        assert_eq!(outcome.output[31], 8);
    }

    #[test]
    fn out_of_gas_consumes_everything() {
        // PUSH1 1; PUSH1 0; SSTORE costs far more than 10 gas
        let code = hex!("6001600055");
        let (outcome, _, _) = run(&code, 10);
        assert!(!outcome.success);
        assert_eq!(outcome.gas_left, 0);
        assert_eq!(outcome.halt, Some(Halt::OutOfGas));
    }

    #[test]
    fn stack_underflow() {
        let code = [opcode::ADD];
        let (outcome, _, _) = run(&code, 100_000);
        assert_eq!(outcome.halt, Some(Halt::StackUnderflow));
    }

    #[test]
    fn invalid_instruction() {
        let code = [0xfe];
        let (outcome, _, _) = run(&code, 100_000);
        assert_eq!(outcome.halt, Some(Halt::InvalidInstruction));
    }

    #[test]
    fn bad_jump_into_push_immediate() {
        // PUSH1 2; JUMP — the target is not a JUMPDEST
        let code = hex!("600256");
        let (outcome, _, _) = run(&code, 100_000);
        assert_eq!(outcome.halt, Some(Halt::BadJumpDestination));
    }

    #[test]
    fn jumpi_taken_and_fallthrough() {
        // PUSH1 1; PUSH1 6; JUMPI; STOP; ... JUMPDEST; PUSH1 7; PUSH1 0; MSTORE;
        // PUSH1 32; PUSH1 0; RETURN
        let code = hex!("6001600657005b600760005260206000f3");
        let (outcome, _, _) = run(&code, 100_000);
        assert!(outcome.success);
        assert_eq!(outcome.output[31], 7);
    }

    #[test]
    fn sstore_gas_and_refund() {
        // PUSH1 1; PUSH1 0; SSTORE (set) ; PUSH1 0; PUSH1 0; SSTORE (clear)
        let code = hex!("60016000556000600055");
        let (outcome, state, substate) = run(&code, 100_000);
        assert!(outcome.success);
        // 4 pushes at 3 + 20000 set + 5000 clear
        assert_eq!(outcome.gas_left, 100_000 - 4 * 3 - 20_000 - 5_000);
        assert_eq!(substate.refund, gas::SSTORE_CLEAR_REFUND);
        let contract = address!("00000000000000000000000000000000000000aa");
        assert!(state
            .account(&contract)
            .unwrap()
            .storage
            .is_empty());
    }

    #[test]
    fn exp_dynamic_gas() {
        // PUSH2 0x0101; PUSH1 2; EXP; POP; STOP
        let code = hex!("61010160020a5000");
        let (outcome, _, _) = run(&code, 100_000);
        assert!(outcome.success);
        // 2 pushes, EXP 10 + 10*2 (two exponent bytes), POP 2
        assert_eq!(outcome.gas_left, 100_000 - 3 - 3 - 10 - 20 - 2);
    }

    #[test]
    fn memory_expansion_charged_once() {
        // MSTORE at 0 then MLOAD at 0: second op pays no expansion
        // PUSH1 1; PUSH1 0; MSTORE; PUSH1 0; MLOAD; POP
        let code = hex!("60016000526000515000");
        let (outcome, _, _) = run(&code, 100_000);
        assert!(outcome.success);
        // 3+3+3(+3 mem) +3+3 +2
        assert_eq!(outcome.gas_left, 100_000 - 3 - 3 - 3 - 3 - 3 - 3 - 2);
    }

    #[test]
    fn logs_accrue_in_order() {
        // LOG0 over memory[0..2] twice
        // PUSH1 2; PUSH1 0; LOG0; PUSH1 1; PUSH1 0; LOG0
        let code = hex!("60026000a060016000a0");
        let (outcome, _, substate) = run(&code, 100_000);
        assert!(outcome.success);
        assert_eq!(substate.logs.len(), 2);
        assert_eq!(substate.logs[0].data.len(), 2);
        assert_eq!(substate.logs[1].data.len(), 1);
    }

    #[test]
    fn selfdestruct_moves_balance_and_refunds() {
        let contract = address!("00000000000000000000000000000000000000aa");
        let heir = address!("0000000000000000000000000000000000000099");
        let mut state = MemoryState::new();
        state.insert_account(contract, U256::from(1000), 0);
        // PUSH20 heir; SELFDESTRUCT
        let mut code = vec![0x73];
        code.extend_from_slice(heir.as_slice());
        code.push(opcode::SELFDESTRUCT);

        let (outcome, state, substate) = run_with_state(state, &code, 100_000);
        assert!(outcome.success);
        assert!(substate.selfdestructs.contains(&contract));
        assert_eq!(substate.refund, gas::SELFDESTRUCT_REFUND);
        assert_eq!(state.account(&heir).unwrap().balance, U256::from(1000));
        assert_eq!(state.account(&contract).unwrap().balance, U256::ZERO);
    }

    #[test]
    fn call_failure_rolls_back_callee_state() {
        let contract = address!("00000000000000000000000000000000000000aa");
        let callee = address!("00000000000000000000000000000000000000bb");
        let mut state = MemoryState::new();
        // callee writes storage and then hits an invalid instruction
        state.insert_code(callee, Bytes::copy_from_slice(&hex!("6001600055fe")));
        state.insert_account(contract, U256::ZERO, 0);

        // PUSH1 0 ×5 (ret/args/value); PUSH20 callee; PUSH2 0x4000 gas; CALL
        let mut code = vec![];
        code.extend_from_slice(&hex!("6000600060006000600073"));
        code.extend_from_slice(callee.as_slice());
        code.extend_from_slice(&hex!("614000f1"));
        let (outcome, state, _) = run_with_state(state, &code, 100_000);
        assert!(outcome.success, "the caller itself succeeds");
        assert!(
            state.account(&callee).unwrap().storage.is_empty(),
            "failed callee's storage write must be rolled back"
        );
    }

    #[test]
    fn call_pushes_result_and_returns_unused_gas() {
        let contract = address!("00000000000000000000000000000000000000aa");
        let callee = address!("00000000000000000000000000000000000000bb");
        let mut state = MemoryState::new();
        // callee: RETURN 32 bytes from memory 0 (all zeros)
        state.insert_code(callee, Bytes::copy_from_slice(&hex!("60206000f3")));
        state.insert_account(contract, U256::ZERO, 0);

        // out_len 32, out_off 0, in 0/0, value 0, callee, gas 0x4000; CALL;
        // then return the call's status word
        let mut code = vec![];
        code.extend_from_slice(&hex!("6020600060006000600073"));
        code.extend_from_slice(callee.as_slice());
        code.extend_from_slice(&hex!("614000f1"));
        code.extend_from_slice(&hex!("60005260206000f3"));
        let (outcome, _, _) = run_with_state(state, &code, 100_000);
        assert!(outcome.success);
        assert_eq!(outcome.output[31], 1, "CALL pushes 1 on success");
    }

    #[test]
    fn create_deploys_returned_code() {
        let contract = address!("00000000000000000000000000000000000000aa");
        let mut state = MemoryState::new();
        state.insert_account(contract, U256::from(10), 0);

        // init code returning the single byte 0x00 (STOP):
        //   PUSH1 0; PUSH1 0; MSTORE8; PUSH1 1; PUSH1 0; RETURN
        let init = hex!("600060005360016000f3");

        // store the init code to memory via CODECOPY of the trailing bytes,
        // then CREATE(value=1, offset=0, len)
        let src = 15usize; // length of the dispatch code ahead of the init code
        let mut code = vec![];
        // PUSH1 len; PUSH1 src; PUSH1 0; CODECOPY
        code.extend_from_slice(&[0x60, init.len() as u8, 0x60, src as u8, 0x60, 0x00, 0x39]);
        // PUSH1 len; PUSH1 0; PUSH1 1; CREATE; STOP
        code.extend_from_slice(&[0x60, init.len() as u8, 0x60, 0x00, 0x60, 0x01, 0xf0, 0x00]);
        assert_eq!(code.len(), src);
        code.extend_from_slice(&init);

        let (outcome, mut state, _) = run_with_state(state, &code, 200_000);
        assert!(outcome.success);
        let created = new_contract_address(contract, 0);
        assert_eq!(state.code(created).as_ref(), &[0x00]);
        assert_eq!(state.balance(created), U256::from(1));
        assert_eq!(state.nonce(contract), 1);
    }

    #[test]
    fn delegatecall_runs_in_caller_context() {
        let contract = address!("00000000000000000000000000000000000000aa");
        let library = address!("00000000000000000000000000000000000000cc");
        let mut state = MemoryState::new();
        // library writes 1 to slot 0 of whoever calls it
        state.insert_code(library, Bytes::copy_from_slice(&hex!("600160005500")));
        state.insert_account(contract, U256::ZERO, 0);

        // PUSH1 0 ×4; PUSH20 library; PUSH2 0x4000; DELEGATECALL; STOP
        let mut code = vec![];
        code.extend_from_slice(&hex!("600060006000600073"));
        code.extend_from_slice(library.as_slice());
        code.extend_from_slice(&hex!("614000f400"));
        let (outcome, state, _) = run_with_state(state, &code, 100_000);
        assert!(outcome.success);
        assert_eq!(
            state.account(&contract).unwrap().storage.get(&U256::ZERO),
            Some(&U256::from(1)),
            "the write lands in the caller's storage"
        );
        assert!(state
            .account(&library)
            .unwrap()
            .storage
            .is_empty());
    }

    #[test]
    fn call_depth_limit() {
        let contract = address!("00000000000000000000000000000000000000aa");
        let mut state = MemoryState::new();
        state.insert_account(contract, U256::ZERO, 0);
        // recursive: CALL self, forwarding all remaining gas
        // PUSH1 0 ×5; ADDRESS; GAS; CALL; STOP
        let code = hex!("60006000600060006000305af100");
        let (outcome, _, _) = run_with_state(state, &code, 10_000_000);
        // the recursion bottoms out at depth 1024 rather than diverging
        assert!(outcome.success);
    }
}
