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

use alloy_primitives::B256;
use etherite_primitives::{
    keccak::EMPTY_ROOT,
    rlp::{self, Decodable, Encodable},
};
use serde::{Deserialize, Serialize};

use crate::{
    node::{to_nibs, MptNode, MptNodeData, MptNodeReference},
    Error, KvStore,
};

/// A Merkle-Patricia trie view rooted at a single node.
///
/// Nodes referenced by hash are resolved lazily through the [KvStore] passed
/// into each operation and memoized in place, so repeated descents do not hit
/// the store twice. Mutations restructure the in-memory tree only; nothing is
/// written to the store until [Trie::commit].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Trie {
    root: MptNode,
}

impl Trie {
    /// Creates an empty trie.
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens the trie committed under `root`.
    ///
    /// The root node itself is resolved on first access; opening an unknown
    /// root only fails once the trie is read.
    pub fn open(root: B256) -> Self {
        if root == EMPTY_ROOT {
            Self::default()
        } else {
            Self {
                root: MptNodeData::Digest(root).into(),
            }
        }
    }

    /// Returns the root hash identifying the entire trie contents.
    pub fn hash(&self) -> B256 {
        self.root.hash()
    }

    /// Returns whether the trie holds no keys.
    pub fn is_empty(&self) -> bool {
        self.root.is_null()
    }

    /// Retrieves the value associated with `key`, if any.
    ///
    /// An absent key is `Ok(None)`; an unresolvable node reference is the
    /// fatal [Error::MissingNode].
    pub fn get(&mut self, store: &impl KvStore, key: &[u8]) -> Result<Option<Vec<u8>>, Error> {
        self.root.get_internal(store, &to_nibs(key))
    }

    /// Retrieves the RLP-decoded value corresponding to `key`.
    pub fn get_rlp<T: Decodable>(
        &mut self,
        store: &impl KvStore,
        key: &[u8],
    ) -> Result<Option<T>, Error> {
        match self.get(store, key)? {
            Some(bytes) => Ok(Some(rlp::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Inserts a key-value pair, returning whether the trie changed.
    pub fn insert(
        &mut self,
        store: &impl KvStore,
        key: &[u8],
        value: Vec<u8>,
    ) -> Result<bool, Error> {
        assert!(!value.is_empty(), "value must not be empty");
        self.root.insert_internal(store, &to_nibs(key), value)
    }

    /// Inserts an RLP-encoded value.
    pub fn insert_rlp(
        &mut self,
        store: &impl KvStore,
        key: &[u8],
        value: impl Encodable,
    ) -> Result<bool, Error> {
        self.insert(store, key, rlp::encode(&value))
    }

    /// Removes a key, returning whether it was present.
    pub fn delete(&mut self, store: &impl KvStore, key: &[u8]) -> Result<bool, Error> {
        self.root.delete_internal(store, &to_nibs(key))
    }

    /// Writes all new nodes into the store and returns the root hash.
    ///
    /// Every resolved node whose RLP is at least 32 bytes is stored under its
    /// Keccak hash; the root node is stored unconditionally so that the
    /// returned hash is always openable.
    pub fn commit(&self, store: &mut impl KvStore) -> B256 {
        self.root.commit_internal(store);
        let hash = self.root.hash();
        if !self.root.is_null() {
            if let MptNodeReference::Bytes(bytes) = self.root.pointer() {
                store.put(hash.as_slice(), bytes);
            }
        }
        hash
    }
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use super::*;
    use crate::MemoryDb;

    #[test]
    fn empty() {
        let trie = Trie::new();
        let expected = hex!("56e81f171bcc55a6ff8345e692c0f86e5b48e01b996cadc001622fb5e363b421");
        assert_eq!(expected, trie.hash().0);
    }

    #[test]
    fn tiny() {
        let db = MemoryDb::new();
        let mut trie = Trie::new();
        trie.insert(&db, b"dog", b"puppy".to_vec()).unwrap();

        let expected = hex!("ed6e08740e4a267eca9d4740f71f573e9aabbcc739b16a2fa6c1baed5ec21278");
        assert_eq!(expected, trie.hash().0);
    }

    #[test]
    fn update_branch_value() {
        let db = MemoryDb::new();
        let mut trie = Trie::new();
        let vals = [("do", "verb"), ("dog", "puppy")];
        for (key, value) in &vals {
            trie.insert(&db, key.as_bytes(), value.as_bytes().to_vec())
                .unwrap();
        }

        let expected = hex!("779db3986dd4f38416bfde49750ef7b13c6ecb3e2221620bcad9267e94604d36");
        assert_eq!(expected, trie.hash().0);
    }

    #[test]
    fn update_and_lookup() {
        let db = MemoryDb::new();
        let mut trie = Trie::new();
        let vals = vec![
            ("doe", "reindeer"),
            ("dog", "puppy"),
            ("dogglesworth", "cat"),
        ];
        for (key, value) in &vals {
            trie.insert(&db, key.as_bytes(), value.as_bytes().to_vec())
                .unwrap();
        }
        let expected = hex!("8aad789dff2f538bca5d8ea56e8abe10f4c7ba3a5dea95fea4cd6e7c3a1168d3");
        assert_eq!(expected, trie.hash().0);

        for (key, value) in &vals {
            assert_eq!(
                trie.get(&db, key.as_bytes()).unwrap().as_deref(),
                Some(value.as_bytes())
            );
        }
        assert_eq!(trie.get(&db, b"unknown").unwrap(), None);
    }

    #[test]
    fn delete_normalizes() {
        let db = MemoryDb::new();
        let mut trie = Trie::new();
        let vals = vec![
            ("do", "verb"),
            ("ether", "wookiedoo"),
            ("horse", "stallion"),
            ("shaman", "horse"),
            ("doge", "coin"),
            ("ether", ""),
            ("dog", "puppy"),
            ("shaman", ""),
        ];
        for (key, value) in vals {
            if value.is_empty() {
                trie.delete(&db, key.as_bytes()).unwrap();
            } else {
                trie.insert(&db, key.as_bytes(), value.as_bytes().to_vec())
                    .unwrap();
            }
        }

        let expected = hex!("5991bb8c6514148a29db676a14ac506cd2cd5775ace63c30a4fe457715e9ac84");
        assert_eq!(expected, trie.hash().0);
    }

    #[test]
    fn insertion_order_irrelevant() {
        let db = MemoryDb::new();
        let vals = [
            ("doe", "reindeer"),
            ("dog", "puppy"),
            ("dogglesworth", "cat"),
            ("do", "verb"),
        ];

        let mut forward = Trie::new();
        for (key, value) in vals {
            forward
                .insert(&db, key.as_bytes(), value.as_bytes().to_vec())
                .unwrap();
        }
        let mut backward = Trie::new();
        for (key, value) in vals.iter().rev() {
            backward
                .insert(&db, key.as_bytes(), value.as_bytes().to_vec())
                .unwrap();
        }
        assert_eq!(forward.hash(), backward.hash());
    }

    #[test]
    fn commit_and_reopen() {
        let mut db = MemoryDb::new();
        let mut trie = Trie::new();
        let vals = vec![
            ("doe", "reindeer"),
            ("dog", "puppy"),
            ("dogglesworth", "cat"),
        ];
        for (key, value) in &vals {
            trie.insert(&db, key.as_bytes(), value.as_bytes().to_vec())
                .unwrap();
        }
        let root = trie.commit(&mut db);

        let mut reopened = Trie::open(root);
        for (key, value) in &vals {
            assert_eq!(
                reopened.get(&db, key.as_bytes()).unwrap().as_deref(),
                Some(value.as_bytes())
            );
        }
        assert_eq!(reopened.hash(), root);

        // a view committed earlier remains openable after further writes
        trie.insert(&db, b"do", b"verb".to_vec()).unwrap();
        let root2 = trie.commit(&mut db);
        assert_ne!(root, root2);
        let mut old_view = Trie::open(root);
        assert_eq!(
            old_view.get(&db, b"dogglesworth").unwrap().as_deref(),
            Some(&b"cat"[..])
        );
    }

    #[test]
    fn missing_node_is_fatal() {
        let db = MemoryDb::new();
        let mut trie = Trie::open(B256::repeat_byte(0xee));
        assert!(matches!(
            trie.get(&db, b"dog"),
            Err(Error::MissingNode(_))
        ));
    }
}
