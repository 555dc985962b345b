//! Batch proofs over the ledger trie.
//!
//! A proof witnesses one register path: the payload at the leaf (or its
//! proven absence) plus the non-default sibling hashes along the path. A
//! batch proof is the unit shipped inside a chunk data pack.

use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};

use crate::hash::{interim_hash, leaf_hash, EMPTY_HASHES, TREE_DEPTH};
use crate::{LedgerError, Path, Value, PATH_LEN};

/// A Merkle inclusion/exclusion witness for a single path.
///
/// `flags` marks, per depth, whether the sibling at that depth is
/// non-default; `interims` carries exactly the flagged siblings, ordered
/// from the root down.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct TrieProof {
    /// The witnessed path.
    pub path: Path,
    /// The value at the path; empty for exclusion proofs.
    pub payload: Value,
    /// Whether the path holds an allocated register.
    pub inclusion: bool,
    /// Number of levels the proof spans; always the full tree depth.
    pub steps: u16,
    /// Bit per depth: set iff the sibling at that depth is non-default.
    pub flags: [u8; PATH_LEN],
    /// The non-default sibling hashes, root-to-leaf order.
    pub interims: Vec<[u8; 32]>,
}

impl TrieProof {
    /// Whether the flag for `depth` is set.
    #[inline]
    pub fn flag(&self, depth: usize) -> bool {
        (self.flags[depth / 8] >> (7 - depth % 8)) & 1 == 1
    }

    /// Recomputes the root committed by this proof and compares it to
    /// `root`.
    pub fn verify(&self, root: &[u8; 32]) -> bool {
        if self.steps as usize != TREE_DEPTH {
            return false;
        }
        if !self.inclusion && !self.payload.is_empty() {
            return false;
        }
        if self.interims.len() != (0..TREE_DEPTH).filter(|d| self.flag(*d)).count() {
            return false;
        }

        let mut hash = if self.inclusion {
            leaf_hash(&self.path, &self.payload)
        } else {
            EMPTY_HASHES[0]
        };
        // ascend from the leaf, consuming flagged siblings deepest-first
        let mut remaining = self.interims.len();
        for level in 0..TREE_DEPTH {
            let depth = TREE_DEPTH - 1 - level;
            let sibling = if self.flag(depth) {
                remaining -= 1;
                self.interims[remaining]
            } else {
                EMPTY_HASHES[level]
            };
            hash = if self.path.bit(depth) {
                interim_hash(&sibling, &hash)
            } else {
                interim_hash(&hash, &sibling)
            };
        }
        hash == *root
    }
}

/// A batch of per-path proofs against one trie version.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default, Encode, Decode)]
pub struct TrieBatchProof {
    /// One proof per requested path, in request order.
    pub proofs: Vec<TrieProof>,
}

impl TrieBatchProof {
    /// Serializes the batch proof for transport inside a chunk data pack.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.encode()
    }

    /// Deserializes a batch proof received from the network.
    pub fn from_bytes(bytes: &[u8]) -> Result<TrieBatchProof, LedgerError> {
        use parity_scale_codec::DecodeAll;
        TrieBatchProof::decode_all(&mut &*bytes)
            .map_err(|e| LedgerError::MalformedProof(e.to_string()))
    }

    /// Verifies every proof in the batch against `root`.
    pub fn verify(&self, root: &[u8; 32]) -> bool {
        self.proofs.iter().all(|p| p.verify(root))
    }
}
