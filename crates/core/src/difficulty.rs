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

//! The canonical difficulty function.

use alloy_primitives::U256;
use etherite_primitives::block::Header;

use crate::chain_spec::ChainSpec;

/// Computes the canonical difficulty of the block following `parent` with
/// the given timestamp.
///
/// `D(n) = max(minimum_difficulty, D(n-1) + x·ς + ε)` with
/// `x = ⌊D(n-1)/divisor⌋`; ς is the timestamp adjustment (one-step before
/// Homestead, graded afterwards) and ε the exponential subsidy reduction.
pub fn next_difficulty(spec: &ChainSpec, parent: &Header, timestamp: u64) -> U256 {
    let number = parent.number + 1;
    let x = parent.difficulty / spec.difficulty_bound_divisor;

    let adjusted = if !spec.is_homestead(number) {
        if timestamp < parent.timestamp + 13 {
            parent.difficulty + x
        } else {
            parent.difficulty.saturating_sub(x)
        }
    } else {
        // ς = max(1 - ⌊(T(n) - T(n-1)) / 10⌋, -99)
        let elapsed = timestamp.saturating_sub(parent.timestamp) / 10;
        let sigma = (1i64 - elapsed as i64).max(-99);
        if sigma >= 0 {
            parent.difficulty + x * U256::from(sigma as u64)
        } else {
            parent
                .difficulty
                .saturating_sub(x * U256::from(-sigma as u64))
        }
    };

    // ε = ⌊2^(⌊n/100000⌋ - 2)⌋, the difficulty bomb
    let period = number / 100_000;
    let bomb = if period >= 2 {
        U256::ONE << (period - 2)
    } else {
        U256::ZERO
    };

    spec.minimum_difficulty.max(adjusted + bomb)
}
