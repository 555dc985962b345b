//! Storage seams.
//!
//! Absent entries surface as [`StorageError::NotFound`]; everything else
//! is a backend failure the caller treats as fatal for the operation in
//! progress.

use cascade_types::error::StorageError;
use cascade_types::{
    Block, ExecutionReceipt, ExecutionResult, Header, Identifier, Index, Seal,
};

/// Block headers by block ID.
pub trait Headers: Send + Sync {
    /// Stores a header under its block ID.
    fn store(&self, header: &Header) -> Result<(), StorageError>;
    /// Retrieves the header of the given block.
    fn by_block_id(&self, block_id: Identifier) -> Result<Header, StorageError>;
}

/// The latest seal as of a given block.
///
/// `by_block_id(b)` answers "what is the highest seal on the fork ending
/// at `b`?" — the index is maintained by the protocol state as blocks are
/// added.
pub trait Seals: Send + Sync {
    /// Indexes the latest seal as of the given block.
    fn index(&self, block_id: Identifier, seal: &Seal) -> Result<(), StorageError>;
    /// The latest seal on the fork ending at the given block.
    fn by_block_id(&self, block_id: Identifier) -> Result<Seal, StorageError>;
}

/// Per-block payload indexes.
pub trait PayloadIndexes: Send + Sync {
    /// Stores the payload index of a block.
    fn store(&self, block_id: Identifier, index: &Index) -> Result<(), StorageError>;
    /// Retrieves the payload index of a block.
    fn by_block_id(&self, block_id: Identifier) -> Result<Index, StorageError>;
}

/// Full blocks by ID.
pub trait Blocks: Send + Sync {
    /// Stores a block.
    fn store(&self, block: &Block) -> Result<(), StorageError>;
    /// Retrieves a block by its ID.
    fn by_id(&self, block_id: Identifier) -> Result<Block, StorageError>;
}

/// Execution results by ID.
pub trait ExecutionResults: Send + Sync {
    /// Stores a result.
    fn store(&self, result: &ExecutionResult) -> Result<(), StorageError>;
    /// Retrieves a result by its ID.
    fn by_id(&self, result_id: Identifier) -> Result<ExecutionResult, StorageError>;
}

/// Execution receipts, indexed by receipt ID and by executed block.
pub trait ExecutionReceipts: Send + Sync {
    /// Stores a receipt.
    fn store(&self, receipt: &ExecutionReceipt) -> Result<(), StorageError>;
    /// Retrieves a receipt by its ID.
    fn by_id(&self, receipt_id: Identifier) -> Result<ExecutionReceipt, StorageError>;
    /// All known receipts for the given executed block.
    fn by_block_id(&self, block_id: Identifier) -> Result<Vec<ExecutionReceipt>, StorageError>;
}
