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

//! The state-transition function: applying ordered transactions to a parent
//! state, assembling blocks, and validating incoming blocks against the
//! holistic-validity equations.

pub mod builder;
pub mod chain_spec;
pub mod difficulty;
pub mod execute;
pub mod state;
pub mod validate;

pub use builder::{BlockBuilder, BlockParams};
pub use chain_spec::{ChainSpec, MAINNET, MAX_EXTRA_DATA_BYTES};
pub use difficulty::next_difficulty;
pub use execute::{apply_transaction, intrinsic_gas, AppliedTransaction};
pub use state::TrieState;
pub use validate::{validate_block, validate_header, BlockError, HeaderError};
