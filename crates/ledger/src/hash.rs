//! Node hashing for the ledger trie.
//!
//! Leaf and interim hashes are domain-separated by a one-byte tag. Empty
//! subtrees hash to a precomputed ladder value per height, so sparse tries
//! never materialize their empty regions.

use once_cell::sync::Lazy;
use sha2::{Digest, Sha256};

use crate::{Path, Value, PATH_LEN};

/// Depth of the trie: one level per path bit.
pub const TREE_DEPTH: usize = PATH_LEN * 8;

const LEAF_TAG: u8 = 0x00;
const INTERIM_TAG: u8 = 0x01;

/// Default hashes of empty subtrees, indexed by height. `EMPTY_HASHES[0]`
/// is the empty leaf; `EMPTY_HASHES[TREE_DEPTH]` is the root of an empty
/// trie.
pub static EMPTY_HASHES: Lazy<[[u8; 32]; TREE_DEPTH + 1]> = Lazy::new(|| {
    let mut ladder = [[0u8; 32]; TREE_DEPTH + 1];
    let mut hasher = Sha256::new();
    hasher.update([LEAF_TAG]);
    ladder[0] = hasher.finalize().into();
    for h in 0..TREE_DEPTH {
        ladder[h + 1] = interim_hash(&ladder[h], &ladder[h]);
    }
    ladder
});

/// The root hash of a trie with no allocated registers.
pub fn empty_root_hash() -> [u8; 32] {
    EMPTY_HASHES[TREE_DEPTH]
}

/// Hash of a leaf holding `value` at `path`. Empty values hash as the
/// empty leaf: writing the empty value deallocates the register.
pub fn leaf_hash(path: &Path, value: &Value) -> [u8; 32] {
    if value.is_empty() {
        return EMPTY_HASHES[0];
    }
    let mut hasher = Sha256::new();
    hasher.update([LEAF_TAG]);
    hasher.update(path.0);
    hasher.update(value);
    hasher.finalize().into()
}

/// Hash of an interim node over its two children.
pub fn interim_hash(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update([INTERIM_TAG]);
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}
