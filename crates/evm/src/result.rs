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

use alloy_primitives::{Address, Bytes};
use serde::{Deserialize, Serialize};

/// The reason an execution frame halted.
///
/// Halts are consensus data, not errors: only [Halt::Normal] (and
/// [Halt::Revert] under post-Byzantium semantics) return data; every other
/// reason returns empty data and consumes all remaining frame gas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Halt {
    /// Execution reached STOP, RETURN, SELFDESTRUCT or the end of code.
    Normal,
    /// Reserved for post-Byzantium REVERT semantics.
    Revert,
    /// The next operation's cost exceeded the remaining gas.
    OutOfGas,
    /// An operation required more stack items than present.
    StackUnderflow,
    /// An operation would have grown the stack beyond 1024 words.
    StackOverflow,
    /// The opcode is not defined.
    InvalidInstruction,
    /// A JUMP or JUMPI target is not a valid JUMPDEST.
    BadJumpDestination,
    /// Reserved for post-Byzantium STATICCALL semantics.
    StaticViolation,
    /// The call stack depth of 1024 was exceeded.
    CallDepthExceeded,
}

impl Halt {
    /// Whether the frame completed successfully.
    #[inline]
    pub fn is_success(&self) -> bool {
        matches!(self, Halt::Normal)
    }
}

/// The result of a message call.
#[derive(Debug, Clone)]
pub struct CallOutcome {
    /// Whether the call succeeded and its sub-state was merged.
    pub success: bool,
    /// Gas left over for the caller.
    pub gas_left: u64,
    /// The returned data; empty unless the frame halted normally.
    pub output: Bytes,
    /// The halt reason of the executed frame, absent when the frame never
    /// ran (insufficient balance for the transfer).
    pub halt: Option<Halt>,
}

impl CallOutcome {
    /// A call that failed before its frame was entered, returning the full
    /// gas to the caller.
    pub(crate) fn not_executed(gas: u64, halt: Option<Halt>) -> Self {
        CallOutcome {
            success: false,
            gas_left: gas,
            output: Bytes::new(),
            halt,
        }
    }
}

/// The result of a contract creation.
#[derive(Debug, Clone)]
pub struct CreateOutcome {
    /// The address of the deployed contract on success.
    pub address: Option<Address>,
    /// Gas left over for the caller.
    pub gas_left: u64,
    /// The halt reason of the init-code frame, absent when it never ran.
    pub halt: Option<Halt>,
}

impl CreateOutcome {
    #[inline]
    pub fn success(&self) -> bool {
        self.address.is_some()
    }
}
