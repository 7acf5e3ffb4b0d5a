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

use alloy_primitives::U256;

use crate::gas;

/// The linear byte memory of the machine state.
///
/// Memory grows in 32-byte words; the quadratic expansion cost is charged by
/// the interpreter whenever a new high-water mark is reached.
#[derive(Debug, Clone, Default)]
pub struct Memory {
    data: Vec<u8>,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current size in bytes, always a multiple of 32.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The expansion cost of covering `offset..offset+len`, zero when the
    /// region is already active. `None` signals an unpayable (overflowing)
    /// expansion.
    pub fn expansion_cost(&self, offset: u64, len: u64) -> Option<u128> {
        if len == 0 {
            return Some(0);
        }
        let end = (offset as u128).checked_add(len as u128)?;
        if end > u64::MAX as u128 {
            return None;
        }
        let new_words = gas::to_words(end as u64);
        let cur_words = (self.data.len() / 32) as u64;
        if new_words <= cur_words {
            return Some(0);
        }
        Some(gas::memory_gas(new_words) - gas::memory_gas(cur_words))
    }

    /// Grows the memory to cover `offset..offset+len`. The cost must have
    /// been charged beforehand.
    pub fn grow(&mut self, offset: usize, len: usize) {
        if len == 0 {
            return;
        }
        let end = offset + len;
        if end > self.data.len() {
            self.data.resize(gas::to_words(end as u64) as usize * 32, 0);
        }
    }

    /// Reads the 32-byte word at `offset`.
    pub fn load_word(&self, offset: usize) -> U256 {
        U256::from_be_slice(&self.data[offset..offset + 32])
    }

    /// Writes a 32-byte word at `offset`.
    pub fn store_word(&mut self, offset: usize, value: U256) {
        self.data[offset..offset + 32].copy_from_slice(&value.to_be_bytes::<32>());
    }

    /// Writes a single byte at `offset`.
    pub fn store_byte(&mut self, offset: usize, value: u8) {
        self.data[offset] = value;
    }

    /// Returns the bytes in `offset..offset+len`.
    pub fn slice(&self, offset: usize, len: usize) -> &[u8] {
        &self.data[offset..offset + len]
    }

    /// Copies `src` into memory at `offset`. The region must be active.
    pub fn store(&mut self, offset: usize, src: &[u8]) {
        self.data[offset..offset + src.len()].copy_from_slice(src);
    }

    /// Copies `src` into memory at `offset`, zero-filling when `src` is
    /// shorter than `len`.
    pub fn store_padded(&mut self, offset: usize, src: &[u8], len: usize) {
        let copy_len = src.len().min(len);
        self.data[offset..offset + copy_len].copy_from_slice(&src[..copy_len]);
        self.data[offset + copy_len..offset + len].fill(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_in_words() {
        let mut memory = Memory::new();
        assert_eq!(memory.expansion_cost(0, 1), Some(3));
        memory.grow(0, 1);
        assert_eq!(memory.len(), 32);
        assert_eq!(memory.expansion_cost(0, 32), Some(0));
        assert_eq!(memory.expansion_cost(32, 32), Some(3));
    }

    #[test]
    fn word_round_trip() {
        let mut memory = Memory::new();
        memory.grow(0, 64);
        let value = U256::from(0xdeadbeefu64);
        memory.store_word(32, value);
        assert_eq!(memory.load_word(32), value);
        memory.store_byte(63, 0xff);
        assert_eq!(memory.slice(63, 1), &[0xff]);
    }

    #[test]
    fn padded_store() {
        let mut memory = Memory::new();
        memory.grow(0, 32);
        memory.store_padded(0, &[1, 2, 3], 8);
        assert_eq!(memory.slice(0, 8), &[1, 2, 3, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn overflowing_expansion_unpayable() {
        let memory = Memory::new();
        assert_eq!(memory.expansion_cost(u64::MAX, 2), None);
    }
}
