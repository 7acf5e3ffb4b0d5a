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

use std::collections::BTreeSet;

use alloy_primitives::Address;
use etherite_primitives::receipt::Log;

/// The accrued transaction sub-state: accounts scheduled for deletion,
/// ordered log entries, and the refund counter.
///
/// A checkpoint is taken at every call frame; it is dropped when the frame
/// succeeds (merging the accrual into the caller) and restored when it
/// fails.
#[derive(Debug, Clone, Default)]
pub struct Substate {
    /// Addresses scheduled for deletion at transaction end.
    pub selfdestructs: BTreeSet<Address>,
    /// Log entries in execution order.
    pub logs: Vec<Log>,
    /// Accumulated gas refund, applied (capped) at transaction end.
    pub refund: u64,
}

/// A point to which a [Substate] can be rolled back.
#[derive(Debug)]
pub struct SubstateCheckpoint {
    selfdestructs: BTreeSet<Address>,
    logs: usize,
    refund: u64,
}

impl Substate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the current accrual for a later [Substate::revert].
    pub fn checkpoint(&self) -> SubstateCheckpoint {
        SubstateCheckpoint {
            selfdestructs: self.selfdestructs.clone(),
            logs: self.logs.len(),
            refund: self.refund,
        }
    }

    /// Discards everything accrued since `checkpoint`.
    pub fn revert(&mut self, checkpoint: SubstateCheckpoint) {
        self.selfdestructs = checkpoint.selfdestructs;
        self.logs.truncate(checkpoint.logs);
        self.refund = checkpoint.refund;
    }

    /// Schedules `address` for deletion, returning whether it was newly
    /// marked. Already-marked accounts do not re-accumulate the refund.
    pub fn mark_for_deletion(&mut self, address: Address) -> bool {
        self.selfdestructs.insert(address)
    }

    /// Appends a log entry.
    pub fn append_log(&mut self, log: Log) {
        self.logs.push(log);
    }

    /// Adds to the refund counter.
    pub fn add_refund(&mut self, amount: u64) {
        self.refund += amount;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkpoint_revert() {
        let mut substate = Substate::new();
        substate.mark_for_deletion(Address::repeat_byte(1));
        substate.add_refund(100);

        let checkpoint = substate.checkpoint();
        substate.mark_for_deletion(Address::repeat_byte(2));
        substate.append_log(Log::default());
        substate.add_refund(50);

        substate.revert(checkpoint);
        assert_eq!(substate.selfdestructs.len(), 1);
        assert!(substate.logs.is_empty());
        assert_eq!(substate.refund, 100);
    }

    #[test]
    fn deletion_marked_once() {
        let mut substate = Substate::new();
        assert!(substate.mark_for_deletion(Address::repeat_byte(1)));
        assert!(!substate.mark_for_deletion(Address::repeat_byte(1)));
    }
}
