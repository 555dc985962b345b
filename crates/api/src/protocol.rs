//! The protocol state seam.
//!
//! Protocol state is the node's authoritative view of the finalized and
//! sealed chain. Reads are consistent within a single call; writes go
//! through the serializing `extend` mutation.

use thiserror::Error;

use cascade_types::error::{ErrorCode, StorageError};
use cascade_types::{Block, Header};

/// Errors raised by protocol state mutations.
#[derive(Error, Debug)]
pub enum StateError {
    /// The candidate does not validly extend the chain.
    #[error("invalid extension: {0}")]
    InvalidExtension(String),
    /// A storage dependency failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ErrorCode for StateError {
    fn code(&self) -> &'static str {
        match self {
            Self::InvalidExtension(_) => "STATE_INVALID_EXTENSION",
            Self::Storage(_) => "STATE_STORAGE_ERROR",
        }
    }
}

/// The protocol state consumed by the kernel's engines.
pub trait ProtocolState: Send + Sync {
    /// The header of the latest sealed block.
    fn sealed_head(&self) -> Result<Header, StorageError>;

    /// The header of the latest finalized block.
    fn finalized_head(&self) -> Result<Header, StorageError>;

    /// Extends the chain with a candidate block. Called exactly once per
    /// block built.
    fn extend(&self, block: &Block) -> Result<(), StateError>;
}
