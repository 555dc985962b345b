//! Content-addressed identifiers.
//!
//! Every consensus-relevant entity in the kernel is addressed by the SHA-256
//! digest of its canonical SCALE encoding. Identifiers are opaque: nothing in
//! the kernel interprets their bytes beyond equality and ordering.

use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A 32-byte content-addressed identifier.
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
pub struct Identifier(pub [u8; 32]);

impl Identifier {
    /// The all-zero identifier, used as the parent of root entities.
    pub const ZERO: Identifier = Identifier([0u8; 32]);

    /// Computes the identifier of an entity from its canonical encoding.
    pub fn of<T: Encode>(entity: &T) -> Identifier {
        Identifier(digest(&entity.encode()))
    }

    /// Wraps raw digest bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Identifier {
        Identifier(bytes)
    }

    /// Returns the identifier's bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl std::fmt::Debug for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // short form keeps log lines readable
        write!(f, "{}", hex::encode(&self.0[..8]))
    }
}

impl From<[u8; 32]> for Identifier {
    fn from(bytes: [u8; 32]) -> Self {
        Identifier(bytes)
    }
}

/// A commitment to the full register state of the chain at some point of
/// execution, i.e. the root hash of the ledger trie.
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
pub struct StateCommitment(pub [u8; 32]);

impl StateCommitment {
    /// Returns the commitment's bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Display for StateCommitment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl std::fmt::Debug for StateCommitment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(&self.0[..8]))
    }
}

impl From<[u8; 32]> for StateCommitment {
    fn from(bytes: [u8; 32]) -> Self {
        StateCommitment(bytes)
    }
}

/// SHA-256 digest of arbitrary bytes.
pub fn digest(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}
