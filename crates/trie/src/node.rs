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

use core::{cell::RefCell, mem};

use alloy_primitives::B256;
use etherite_primitives::{
    keccak::{keccak, EMPTY_ROOT},
    rlp::{self, Decodable, Encodable, RlpBytes, EMPTY_LIST_CODE, EMPTY_STRING_CODE},
};
use serde::{Deserialize, Serialize};

use crate::{Error, KvStore};

/// The type and data of a node in a Merkle-Patricia trie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MptNodeData {
    /// Empty trie node.
    Null,
    /// Node with up to 16 children and an optional value.
    Branch([Box<MptNode>; 16], Vec<u8>),
    /// Leaf node with a terminator-tagged path and a value.
    Leaf(Vec<u8>, Vec<u8>),
    /// Node with a shared path prefix and exactly one child.
    Extension(Vec<u8>, Box<MptNode>),
    /// Reference to a node by its hash, resolvable through the store.
    Digest(B256),
}

/// A node in a Merkle-Patricia trie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MptNode {
    data: MptNodeData,
    #[serde(skip)]
    cached_reference: RefCell<Option<MptNodeReference>>,
}

/// Reference of one node inside another node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MptNodeReference {
    /// Short encodings (less than 32 bytes), inlined into the parent.
    Bytes(Vec<u8>),
    /// Keccak hash of long encodings (not less than 32 bytes).
    Digest(B256),
}

impl Default for MptNode {
    fn default() -> Self {
        Self {
            data: MptNodeData::Null,
            cached_reference: RefCell::new(None),
        }
    }
}

impl From<MptNodeData> for MptNode {
    fn from(value: MptNodeData) -> Self {
        Self {
            data: value,
            cached_reference: RefCell::new(None),
        }
    }
}

impl Encodable for MptNode {
    /// Encodes the node into the `out` buffer.
    fn encode(&self, out: &mut Vec<u8>) {
        match &self.data {
            MptNodeData::Null => {
                out.push(EMPTY_STRING_CODE);
            }
            MptNodeData::Branch(nodes, value) => {
                let mut payload_length = 0;
                for node in nodes {
                    payload_length += node.pointer_length();
                }
                payload_length += value.as_slice().length();
                rlp::Header {
                    list: true,
                    payload_length,
                }
                .encode(out);
                for node in nodes {
                    node.pointer_encode(out);
                }
                value.as_slice().encode(out);
            }
            MptNodeData::Leaf(prefix, value) => {
                let payload_length = prefix.as_slice().length() + value.as_slice().length();
                rlp::Header {
                    list: true,
                    payload_length,
                }
                .encode(out);
                prefix.as_slice().encode(out);
                value.as_slice().encode(out);
            }
            MptNodeData::Extension(prefix, node) => {
                let payload_length = prefix.as_slice().length() + node.pointer_length();
                rlp::Header {
                    list: true,
                    payload_length,
                }
                .encode(out);
                prefix.as_slice().encode(out);
                node.pointer_encode(out);
            }
            MptNodeData::Digest(digest) => {
                digest.encode(out);
            }
        }
    }

    fn length(&self) -> usize {
        match &self.data {
            MptNodeData::Null => 1,
            MptNodeData::Digest(digest) => digest.length(),
            _ => {
                let payload_length = self.payload_length();
                rlp::length_of_length(payload_length) + payload_length
            }
        }
    }
}

impl Decodable for MptNode {
    fn decode(buf: &mut &[u8]) -> Result<Self, rlp::Error> {
        let &first = buf.first().ok_or(rlp::Error::Truncated)?;
        if first < EMPTY_LIST_CODE {
            // a byte string: either the empty node or a hash reference
            let bytes = rlp::decode_bytes(buf)?;
            return match bytes.len() {
                0 => Ok(MptNodeData::Null.into()),
                32 => Ok(MptNodeData::Digest(B256::from_slice(bytes)).into()),
                _ => Err(rlp::Error::UnexpectedLength),
            };
        }

        let header = rlp::Header::decode(buf)?;
        let (mut payload, rest) = buf.split_at(header.payload_length);
        *buf = rest;
        let mut items: Vec<&[u8]> = Vec::with_capacity(2);
        while !payload.is_empty() {
            items.push(split_item(&mut payload)?);
        }

        match items.len() {
            2 => {
                let path: Vec<u8> = rlp::decode(items[0])?;
                let prefix = *path.first().ok_or(rlp::Error::UnexpectedLength)?;
                if (prefix & (2 << 4)) == 0 {
                    let node: MptNode = rlp::decode(items[1])?;
                    Ok(MptNodeData::Extension(path, Box::new(node)).into())
                } else {
                    Ok(MptNodeData::Leaf(path, rlp::decode(items[1])?).into())
                }
            }
            17 => {
                let mut children: [Box<MptNode>; 16] = Default::default();
                for (child, item) in children.iter_mut().zip(&items[..16]) {
                    *child = Box::new(rlp::decode(item)?);
                }
                let value: Vec<u8> = rlp::decode(items[16])?;
                Ok(MptNodeData::Branch(children, value).into())
            }
            _ => Err(rlp::Error::UnexpectedLength),
        }
    }
}

/// Splits the next complete RLP item off the front of `buf`.
fn split_item<'a>(buf: &mut &'a [u8]) -> Result<&'a [u8], rlp::Error> {
    let start = *buf;
    let mut probe = *buf;
    let header = rlp::Header::decode(&mut probe)?;
    let total = (start.len() - probe.len()) + header.payload_length;
    let (item, rest) = start.split_at(total);
    *buf = rest;
    Ok(item)
}

impl MptNode {
    /// Decodes an RLP-encoded node, rejecting trailing data.
    pub fn decode(bytes: impl AsRef<[u8]>) -> Result<MptNode, Error> {
        Ok(rlp::decode(bytes.as_ref())?)
    }

    /// Returns the type and data of the node.
    pub fn as_data(&self) -> &MptNodeData {
        &self.data
    }

    /// Returns the 256-bit hash of the node.
    pub fn hash(&self) -> B256 {
        match self.data {
            MptNodeData::Null => EMPTY_ROOT,
            _ => match self.pointer() {
                MptNodeReference::Digest(digest) => digest,
                MptNodeReference::Bytes(bytes) => keccak(bytes).into(),
            },
        }
    }

    /// Returns the pointer of this node when referenced inside another node.
    pub fn pointer(&self) -> MptNodeReference {
        self.cached_reference
            .borrow_mut()
            .get_or_insert_with(|| self.calc_pointer())
            .clone()
    }

    /// Encodes the pointer for this node into the `out` buffer.
    fn pointer_encode(&self, out: &mut Vec<u8>) {
        match self
            .cached_reference
            .borrow_mut()
            .get_or_insert_with(|| self.calc_pointer())
        {
            MptNodeReference::Bytes(bytes) => out.extend_from_slice(bytes),
            MptNodeReference::Digest(digest) => digest.encode(out),
        }
    }

    /// Returns the length of the encoded pointer for this node.
    fn pointer_length(&self) -> usize {
        match self
            .cached_reference
            .borrow_mut()
            .get_or_insert_with(|| self.calc_pointer())
        {
            MptNodeReference::Bytes(bytes) => bytes.len(),
            MptNodeReference::Digest(digest) => digest.length(),
        }
    }

    fn payload_length(&self) -> usize {
        match &self.data {
            MptNodeData::Null => 0,
            MptNodeData::Branch(nodes, value) => {
                nodes
                    .iter()
                    .map(|node| node.pointer_length())
                    .sum::<usize>()
                    + value.as_slice().length()
            }
            MptNodeData::Leaf(prefix, value) => {
                prefix.as_slice().length() + value.as_slice().length()
            }
            MptNodeData::Extension(prefix, node) => {
                prefix.as_slice().length() + node.pointer_length()
            }
            MptNodeData::Digest(_) => 32,
        }
    }

    fn calc_pointer(&self) -> MptNodeReference {
        match &self.data {
            MptNodeData::Null => MptNodeReference::Bytes(vec![EMPTY_STRING_CODE]),
            MptNodeData::Digest(digest) => MptNodeReference::Digest(*digest),
            _ => {
                let encoded = self.to_rlp();
                if encoded.len() < 32 {
                    MptNodeReference::Bytes(encoded)
                } else {
                    MptNodeReference::Digest(keccak(encoded).into())
                }
            }
        }
    }

    /// Returns whether the node represents an empty trie.
    pub fn is_null(&self) -> bool {
        matches!(&self.data, MptNodeData::Null)
    }

    /// Returns whether the node is an unresolved hash reference.
    pub fn is_digest(&self) -> bool {
        matches!(&self.data, MptNodeData::Digest(_))
    }

    /// Replaces an unresolved hash reference with the node stored under it.
    ///
    /// Non-digest nodes are left untouched. Returns [Error::MissingNode] when
    /// the store does not hold the referenced node.
    fn resolve(&mut self, store: &impl KvStore) -> Result<(), Error> {
        if let MptNodeData::Digest(digest) = &self.data {
            let bytes = store
                .get(digest.as_slice())
                .ok_or(Error::MissingNode(*digest))?;
            let node = MptNode::decode(bytes)?;
            debug_assert_eq!(node.hash(), *digest);
            *self = node;
        }
        Ok(())
    }

    /// Returns the nibbles corresponding to the node's prefix.
    pub fn nibs(&self) -> Vec<u8> {
        match &self.data {
            MptNodeData::Null | MptNodeData::Branch(_, _) | MptNodeData::Digest(_) => Vec::new(),
            MptNodeData::Leaf(prefix, _) | MptNodeData::Extension(prefix, _) => {
                prefix_nibs(prefix)
            }
        }
    }

    /// Returns the value stored directly at this node.
    pub fn value(&self) -> Option<&[u8]> {
        match &self.data {
            MptNodeData::Null | MptNodeData::Extension(_, _) | MptNodeData::Digest(_) => None,
            MptNodeData::Branch(_, value) | MptNodeData::Leaf(_, value) => {
                if value.is_empty() {
                    None
                } else {
                    Some(value)
                }
            }
        }
    }

    fn invalidate_ref_cache(&mut self) {
        self.cached_reference.borrow_mut().take();
    }

    pub(crate) fn get_internal(
        &mut self,
        store: &impl KvStore,
        key_nibs: &[u8],
    ) -> Result<Option<Vec<u8>>, Error> {
        self.resolve(store)?;
        let self_nibs = self.nibs();
        match &mut self.data {
            MptNodeData::Null => Ok(None),
            MptNodeData::Branch(children, value) => {
                if key_nibs.is_empty() {
                    Ok(Some(value.clone()).filter(|v| !v.is_empty()))
                } else {
                    children[key_nibs[0] as usize].get_internal(store, &key_nibs[1..])
                }
            }
            MptNodeData::Leaf(_, value) => {
                if self_nibs == key_nibs {
                    Ok(Some(value.clone()))
                } else {
                    Ok(None)
                }
            }
            MptNodeData::Extension(_, child) => {
                if key_nibs.starts_with(&self_nibs) {
                    child.get_internal(store, &key_nibs[self_nibs.len()..])
                } else {
                    Ok(None)
                }
            }
            MptNodeData::Digest(_) => unreachable!("node resolved above"),
        }
    }

    pub(crate) fn insert_internal(
        &mut self,
        store: &impl KvStore,
        key_nibs: &[u8],
        value: Vec<u8>,
    ) -> Result<bool, Error> {
        self.resolve(store)?;
        let self_nibs = self.nibs();
        let value_updated = match &mut self.data {
            MptNodeData::Null => {
                self.data = MptNodeData::Leaf(to_prefix(key_nibs, true), value);
                true
            }
            MptNodeData::Branch(children, stored_value) => {
                if key_nibs.is_empty() {
                    let different_value = stored_value != &value;
                    if different_value {
                        *stored_value = value;
                    }
                    different_value
                } else {
                    children[key_nibs[0] as usize].insert_internal(store, &key_nibs[1..], value)?
                }
            }
            MptNodeData::Leaf(_, stored_value) => {
                let cpl = lcp(&self_nibs, key_nibs);
                if cpl == self_nibs.len() && cpl == key_nibs.len() {
                    // replace leaf data
                    let different_value = stored_value != &value;
                    if different_value {
                        *stored_value = value;
                    }
                    different_value
                } else {
                    let split_point = cpl + 1;
                    // create a branch with two children
                    let mut new_branch_children: [Box<MptNode>; 16] = Default::default();
                    let mut new_branch_value: Vec<u8> = Vec::new();
                    // insert the existing leaf data
                    if cpl == self_nibs.len() {
                        new_branch_value = mem::take(stored_value);
                    } else {
                        new_branch_children[self_nibs[cpl] as usize] = Box::new(
                            MptNodeData::Leaf(
                                to_prefix(&self_nibs[split_point..], true),
                                mem::take(stored_value),
                            )
                            .into(),
                        );
                    }
                    if cpl == key_nibs.len() {
                        new_branch_value = value;
                    } else {
                        new_branch_children[key_nibs[cpl] as usize] = Box::new(
                            MptNodeData::Leaf(to_prefix(&key_nibs[split_point..], true), value)
                                .into(),
                        );
                    }
                    let branch = MptNodeData::Branch(new_branch_children, new_branch_value);

                    if cpl > 0 {
                        // create a parent extension for the new branch
                        self.data = MptNodeData::Extension(
                            to_prefix(&self_nibs[..cpl], false),
                            Box::new(branch.into()),
                        );
                    } else {
                        self.data = branch;
                    }
                    true
                }
            }
            MptNodeData::Extension(_, existing_child) => {
                let cpl = lcp(&self_nibs, key_nibs);
                if cpl == self_nibs.len() {
                    // traverse down for the update
                    existing_child.insert_internal(store, &key_nibs[cpl..], value)?
                } else {
                    let split_point = cpl + 1;
                    // create a branch with two children
                    let mut new_branch_children: [Box<MptNode>; 16] = Default::default();
                    let mut new_branch_value: Vec<u8> = Vec::new();
                    // insert the existing extension
                    new_branch_children[self_nibs[cpl] as usize] = if self_nibs.len() > split_point
                    {
                        Box::new(
                            MptNodeData::Extension(
                                to_prefix(&self_nibs[split_point..], false),
                                mem::take(existing_child),
                            )
                            .into(),
                        )
                    } else {
                        mem::take(existing_child)
                    };
                    if cpl == key_nibs.len() {
                        new_branch_value = value;
                    } else {
                        new_branch_children[key_nibs[cpl] as usize] = Box::new(
                            MptNodeData::Leaf(to_prefix(&key_nibs[split_point..], true), value)
                                .into(),
                        );
                    }
                    let branch = MptNodeData::Branch(new_branch_children, new_branch_value);

                    if cpl > 0 {
                        // create a parent extension for the new branch
                        self.data = MptNodeData::Extension(
                            to_prefix(&self_nibs[..cpl], false),
                            Box::new(branch.into()),
                        );
                    } else {
                        self.data = branch;
                    }
                    true
                }
            }
            MptNodeData::Digest(_) => unreachable!("node resolved above"),
        };

        if value_updated {
            self.invalidate_ref_cache();
        }

        Ok(value_updated)
    }

    pub(crate) fn delete_internal(
        &mut self,
        store: &impl KvStore,
        key_nibs: &[u8],
    ) -> Result<bool, Error> {
        self.resolve(store)?;
        let self_nibs = self.nibs();
        let value_deleted = match &mut self.data {
            MptNodeData::Null => false,
            MptNodeData::Branch(children, stored_value) => {
                if key_nibs.is_empty() {
                    if stored_value.is_empty() {
                        return Ok(false);
                    }
                    stored_value.clear();
                } else {
                    let child = &mut children[key_nibs[0] as usize];
                    if !child.delete_internal(store, &key_nibs[1..])? {
                        return Ok(false);
                    }
                }

                // normalize so that the root hash stays a function of the map
                let remaining = children.iter().filter(|n| !n.is_null()).count();
                if remaining == 0 && stored_value.is_empty() {
                    self.data = MptNodeData::Null;
                } else if remaining == 0 {
                    // only the branch value is left
                    self.data = MptNodeData::Leaf(to_prefix(&[], true), mem::take(stored_value));
                } else if remaining == 1 && stored_value.is_empty() {
                    // a single orphan child collapses into its parent
                    let orphan_index = children.iter().position(|n| !n.is_null()).unwrap();
                    let mut orphan = mem::take(&mut children[orphan_index]);
                    // the orphan must be inspected to merge the paths
                    orphan.resolve(store)?;

                    let self_nibs = vec![orphan_index as u8];
                    let orphan_nibs = orphan.nibs();
                    match &mut orphan.data {
                        MptNodeData::Branch(_, _) => {
                            self.data =
                                MptNodeData::Extension(to_prefix(&self_nibs, false), orphan);
                        }
                        MptNodeData::Leaf(_, orphan_value) => {
                            let new_nibs = [self_nibs, orphan_nibs].concat();
                            self.data = MptNodeData::Leaf(
                                to_prefix(&new_nibs, true),
                                mem::take(orphan_value),
                            );
                        }
                        MptNodeData::Extension(_, orphan_child) => {
                            let new_nibs = [self_nibs, orphan_nibs].concat();
                            self.data = MptNodeData::Extension(
                                to_prefix(&new_nibs, false),
                                mem::take(orphan_child),
                            );
                        }
                        MptNodeData::Null | MptNodeData::Digest(_) => {
                            unreachable!("orphan resolved above")
                        }
                    }
                }
                true
            }
            MptNodeData::Leaf(_, _) => {
                if self_nibs != key_nibs {
                    return Ok(false);
                }
                self.data = MptNodeData::Null;
                true
            }
            MptNodeData::Extension(_, child) => {
                if !key_nibs.starts_with(&self_nibs) {
                    return Ok(false);
                }
                if !child.delete_internal(store, &key_nibs[self_nibs.len()..])? {
                    return Ok(false);
                }

                // an extension must not point at a collapsed child
                let child_nibs = child.nibs();
                match &mut child.data {
                    MptNodeData::Branch(_, _) | MptNodeData::Digest(_) => {}
                    MptNodeData::Null => {
                        self.data = MptNodeData::Null;
                    }
                    MptNodeData::Leaf(_, child_value) => {
                        let new_nibs = [self_nibs, child_nibs].concat();
                        self.data =
                            MptNodeData::Leaf(to_prefix(&new_nibs, true), mem::take(child_value));
                    }
                    MptNodeData::Extension(_, child_target) => {
                        let new_nibs = [self_nibs, child_nibs].concat();
                        self.data = MptNodeData::Extension(
                            to_prefix(&new_nibs, false),
                            mem::take(child_target),
                        );
                    }
                }
                true
            }
            MptNodeData::Digest(_) => unreachable!("node resolved above"),
        };

        if value_deleted {
            self.invalidate_ref_cache();
        }

        Ok(value_deleted)
    }

    /// Writes this node and all resolved descendants whose encoding is at
    /// least 32 bytes into the store, keyed by their Keccak hash.
    pub(crate) fn commit_internal(&self, store: &mut impl KvStore) {
        match &self.data {
            MptNodeData::Null | MptNodeData::Digest(_) => return,
            MptNodeData::Leaf(_, _) => {}
            MptNodeData::Extension(_, child) => child.commit_internal(store),
            MptNodeData::Branch(children, _) => {
                for child in children.iter() {
                    child.commit_internal(store);
                }
            }
        }
        if let MptNodeReference::Digest(digest) = self.pointer() {
            store.put(digest.as_slice(), self.to_rlp());
        }
    }
}

/// Returns the length of the common prefix.
pub(crate) fn lcp(a: &[u8], b: &[u8]) -> usize {
    let mut res = 0;
    while res < a.len() && res < b.len() {
        if a[res] != b[res] {
            break;
        }
        res += 1
    }
    res
}

/// Converts a byte slice into the corresponding nibble sequence.
pub fn to_nibs(slice: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(2 * slice.len());
    for nib in slice {
        result.push(nib >> 4);
        result.push(nib & 0xf);
    }
    result
}

/// Packs a nibble sequence into the hex-prefix path encoding.
pub fn to_prefix(nibs: &[u8], is_leaf: bool) -> Vec<u8> {
    let is_odd_nib_len = nibs.len() & 1 == 1;
    let prefix = ((is_odd_nib_len as u8) + ((is_leaf as u8) << 1)) << 4;
    let mut result = vec![prefix];
    for (i, nib) in nibs.iter().enumerate() {
        let is_odd_nib_index = i & 1 == 1;
        if is_odd_nib_len ^ is_odd_nib_index {
            // append to last byte
            *result.last_mut().unwrap() |= nib;
        } else {
            // append new byte
            result.push(nib << 4);
        }
    }
    result
}

/// Unpacks a hex-prefix path into its nibble sequence.
fn prefix_nibs(prefix: &[u8]) -> Vec<u8> {
    let (extension, tail) = prefix.split_first().expect("empty path");
    // the first bit of the first nibble denotes the parity
    let is_odd = extension & (1 << 4) != 0;

    let mut result = Vec::with_capacity(2 * tail.len() + is_odd as usize);
    if is_odd {
        result.push(extension & 0xf);
    }
    for nib in tail {
        result.push(nib >> 4);
        result.push(nib & 0xf);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryDb;

    #[test]
    fn trie_pointer_no_keccak() {
        let cases = [
            ("do", "verb"),
            ("dog", "puppy"),
            ("doge", "coin"),
            ("horse", "stallion"),
        ];
        for (k, v) in cases {
            let node: MptNode =
                MptNodeData::Leaf(k.as_bytes().to_vec(), v.as_bytes().to_vec()).into();
            assert!(
                matches!(node.pointer(), MptNodeReference::Bytes(bytes) if bytes == node.to_rlp())
            );
        }
    }

    #[test]
    fn lcp_cases() {
        let cases = [
            (vec![0xa, 0xb], vec![0xa, 0xc], 1),
            (vec![0xa, 0xb], vec![0xa, 0xb], 2),
            (vec![0xa, 0xb], vec![0xa, 0xb, 0xc], 2),
            (vec![0xa, 0xb, 0xc], vec![0xa, 0xb, 0xc], 3),
        ];
        for (a, b, cpl) in cases {
            assert_eq!(lcp(&a, &b), cpl)
        }
    }

    #[test]
    fn prefix_round_trip() {
        for nibs in [vec![], vec![0xa], vec![0xa, 0xb], vec![0x1, 0x2, 0x3]] {
            for is_leaf in [false, true] {
                let prefix = to_prefix(&nibs, is_leaf);
                assert_eq!(prefix_nibs(&prefix), nibs);
                assert_eq!(prefix[0] & 0x20 != 0, is_leaf);
            }
        }
    }

    #[test]
    fn node_rlp_round_trip() {
        let db = MemoryDb::new();
        let mut node = MptNode::default();
        for (key, value) in [("doe", "reindeer"), ("dog", "puppy"), ("dogglesworth", "cat")] {
            node.insert_internal(&db, &to_nibs(key.as_bytes()), value.as_bytes().to_vec())
                .unwrap();
        }
        let decoded = MptNode::decode(node.to_rlp()).unwrap();
        assert_eq!(decoded.hash(), node.hash());
    }
}
