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

//! The Homestead gas schedule.

pub const ZERO: u64 = 0;
pub const BASE: u64 = 2;
pub const VERYLOW: u64 = 3;
pub const LOW: u64 = 5;
pub const MID: u64 = 8;
pub const HIGH: u64 = 10;

pub const EXP: u64 = 10;
/// Per-byte cost of the EXP exponent.
pub const EXP_BYTE: u64 = 10;

pub const SHA3: u64 = 30;
/// Per-word cost of SHA3 input.
pub const SHA3_WORD: u64 = 6;
/// Per-word cost of copy operations.
pub const COPY_WORD: u64 = 3;

pub const BALANCE: u64 = 20;
pub const EXTCODE: u64 = 20;
pub const BLOCKHASH: u64 = 20;
pub const SLOAD: u64 = 50;
pub const JUMPDEST: u64 = 1;

/// Cost of an SSTORE setting a zero slot to non-zero.
pub const SSTORE_SET: u64 = 20_000;
/// Cost of any other SSTORE.
pub const SSTORE_RESET: u64 = 5_000;
/// Refund for clearing a non-zero slot to zero.
pub const SSTORE_CLEAR_REFUND: u64 = 15_000;

pub const LOG: u64 = 375;
/// Per-topic cost of LOG.
pub const LOG_TOPIC: u64 = 375;
/// Per-byte cost of LOG data.
pub const LOG_DATA: u64 = 8;

pub const CREATE: u64 = 32_000;
/// Per-byte charge for depositing created contract code.
pub const CREATE_DATA: u64 = 200;

pub const CALL: u64 = 40;
/// Extra charge when a call transfers value.
pub const CALL_VALUE: u64 = 9_000;
/// Gas added to the callee when a call transfers value.
pub const CALL_STIPEND: u64 = 2_300;
/// Extra charge when a call touches a non-existent account.
pub const NEW_ACCOUNT: u64 = 25_000;

/// Refund for the first SELFDESTRUCT of an account.
pub const SELFDESTRUCT_REFUND: u64 = 24_000;

/// Base charge of any transaction.
pub const TX: u64 = 21_000;
/// Additional charge of a contract-creating transaction.
pub const TX_CREATE: u64 = 32_000;
/// Per-byte charge for zero bytes of transaction data.
pub const TX_DATA_ZERO: u64 = 4;
/// Per-byte charge for non-zero bytes of transaction data.
pub const TX_DATA_NONZERO: u64 = 68;

/// Total cost of `words` 32-byte words of active memory: `3·w + ⌊w²/512⌋`.
///
/// Computed in 128 bits; the value only matters below the gas limit, far
/// from overflow.
pub fn memory_gas(words: u64) -> u128 {
    let words = words as u128;
    3 * words + words * words / 512
}

/// The number of 32-byte words needed to hold `bytes` bytes.
#[inline]
pub fn to_words(bytes: u64) -> u64 {
    bytes.div_ceil(32)
}

/// The big-endian byte length of a 256-bit exponent.
#[inline]
pub fn exp_byte_length(exponent: &alloy_primitives::U256) -> u64 {
    ((exponent.bit_len() as u64) + 7) / 8
}

#[cfg(test)]
mod tests {
    use alloy_primitives::U256;

    use super::*;

    #[test]
    fn memory_quadratic() {
        assert_eq!(memory_gas(0), 0);
        assert_eq!(memory_gas(1), 3);
        assert_eq!(memory_gas(2), 6);
        // at 32 words the quadratic term kicks in
        assert_eq!(memory_gas(32), 32 * 3 + 2);
        assert_eq!(memory_gas(1024), 1024 * 3 + 2048);
    }

    #[test]
    fn exp_bytes() {
        assert_eq!(exp_byte_length(&U256::ZERO), 0);
        assert_eq!(exp_byte_length(&U256::from(0xff)), 1);
        assert_eq!(exp_byte_length(&U256::from(0x100)), 2);
        assert_eq!(exp_byte_length(&U256::MAX), 32);
    }
}
