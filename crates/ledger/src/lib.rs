#![forbid(unsafe_code)]

//! # Cascade Ledger
//!
//! The register ledger underpinning execution and verification. Registers
//! are addressed by fixed-length paths in a full-depth binary sparse Merkle
//! trie; a state commitment is the root hash of one trie version.
//!
//! Execution nodes hold complete tries (grouped in a bounded [`Forest`])
//! and extract batch proofs from them. Verification nodes rebuild a
//! [`PartialTrie`] from such a proof and replay a chunk's register reads
//! and writes against it without ever seeing the full ledger.

mod error;
mod forest;
mod hash;
mod partial;
mod proof;
mod trie;

pub use error::LedgerError;
pub use forest::Forest;
pub use hash::{empty_root_hash, EMPTY_HASHES, TREE_DEPTH};
pub use partial::PartialTrie;
pub use proof::{TrieBatchProof, TrieProof};
pub use trie::Trie;

use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};

use cascade_types::identifier::digest;
use cascade_types::StateCommitment;

/// Length of a register path in bytes.
pub const PATH_LEN: usize = 32;

/// A register value. Registers that were never written hold the empty
/// value.
pub type Value = Vec<u8>;

/// The location of a register in the ledger trie.
#[derive(
    Serialize,
    Deserialize,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    Encode,
    Decode,
)]
pub struct Path(pub [u8; PATH_LEN]);

impl Path {
    /// Returns the bit at `index`, counting from the most significant bit
    /// of the first byte. Bit order determines the trie's branching.
    #[inline]
    pub fn bit(&self, index: usize) -> bool {
        debug_assert!(index < PATH_LEN * 8);
        (self.0[index / 8] >> (7 - index % 8)) & 1 == 1
    }
}

impl std::fmt::Debug for Path {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(&self.0[..8]))
    }
}

impl std::fmt::Display for Path {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// A register key as the virtual machine sees it: an owner address plus a
/// register name within that owner's account.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Encode, Decode)]
pub struct RegisterKey {
    /// The account that owns the register.
    pub owner: Vec<u8>,
    /// The register's name within the account.
    pub key: Vec<u8>,
}

impl RegisterKey {
    /// Creates a register key.
    pub fn new(owner: impl Into<Vec<u8>>, key: impl Into<Vec<u8>>) -> Self {
        RegisterKey {
            owner: owner.into(),
            key: key.into(),
        }
    }

    /// Derives the trie path of this register.
    pub fn path(&self) -> Path {
        Path(digest(&self.encode()))
    }
}

impl std::fmt::Display for RegisterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", hex::encode(&self.owner), hex::encode(&self.key))
    }
}

/// A batch read against one trie version.
#[derive(Debug, Clone)]
pub struct Query {
    /// The trie version to read from.
    pub state: StateCommitment,
    /// The register paths to read.
    pub paths: Vec<Path>,
}

impl Query {
    /// Creates a batch read.
    pub fn new(state: StateCommitment, paths: Vec<Path>) -> Self {
        Query { state, paths }
    }
}

/// A batch write against one trie version.
#[derive(Debug, Clone)]
pub struct Update {
    /// The trie version to update.
    pub state: StateCommitment,
    /// The register paths to write.
    pub paths: Vec<Path>,
    /// The values to write, parallel to `paths`.
    pub values: Vec<Value>,
}

impl Update {
    /// Creates a batch write; path and value counts must match.
    pub fn new(
        state: StateCommitment,
        paths: Vec<Path>,
        values: Vec<Value>,
    ) -> Result<Self, LedgerError> {
        if paths.len() != values.len() {
            return Err(LedgerError::InvalidUpdate(format!(
                "{} paths but {} values",
                paths.len(),
                values.len()
            )));
        }
        Ok(Update {
            state,
            paths,
            values,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_bits_are_msb_first() {
        let mut bytes = [0u8; PATH_LEN];
        bytes[0] = 0b1000_0001;
        let path = Path(bytes);
        assert!(path.bit(0));
        assert!(!path.bit(1));
        assert!(path.bit(7));
        assert!(!path.bit(8));
    }

    #[test]
    fn register_key_paths_are_stable_and_distinct() {
        let a = RegisterKey::new(b"alice".to_vec(), b"balance".to_vec());
        let b = RegisterKey::new(b"alice".to_vec(), b"nonce".to_vec());
        assert_eq!(a.path(), RegisterKey::new(b"alice".to_vec(), b"balance".to_vec()).path());
        assert_ne!(a.path(), b.path());
    }

    #[test]
    fn update_rejects_length_mismatch() {
        let err = Update::new(StateCommitment::default(), vec![Path::default()], vec![]);
        assert!(err.is_err());
    }
}
