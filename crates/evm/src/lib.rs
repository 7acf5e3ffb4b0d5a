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

//! A deterministic interpreter for EVM bytecode with Homestead gas
//! semantics.
//!
//! The interpreter operates on a machine state of program counter, gas,
//! 256-bit word stack and byte-addressable memory, mutating the world state
//! only through the [WorldState] interface. Every halt is data, not an
//! error: two implementations must agree on each one.

pub mod env;
pub mod evm;
pub mod gas;
pub mod host;
pub mod memory;
pub mod opcode;
pub mod result;
pub mod stack;
pub mod state;
pub mod substate;

pub use env::{BlockEnv, CallMessage, CreateMessage, TxEnv};
pub use evm::{new_contract_address, Evm, CALL_STACK_LIMIT};
pub use host::{BlockHashes, WorldState};
pub use result::{CallOutcome, CreateOutcome, Halt};
pub use state::MemoryState;
pub use substate::Substate;
