//! In-memory storage, plus a reference protocol state.
//!
//! Every store keeps SCALE-canonical entities behind a `parking_lot`
//! read/write lock and reports absence with the `NotFound` sentinel.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use cascade_api::protocol::{ProtocolState, StateError};
use cascade_api::storage::{
    Blocks, ExecutionReceipts, ExecutionResults, Headers, PayloadIndexes, Seals,
};
use cascade_types::error::StorageError;
use cascade_types::{
    Block, ExecutionReceipt, ExecutionResult, Header, Identifier, Index, Seal,
};

/// Headers by block ID.
#[derive(Default)]
pub struct MemoryHeaders {
    entries: RwLock<HashMap<Identifier, Header>>,
}

impl Headers for MemoryHeaders {
    fn store(&self, header: &Header) -> Result<(), StorageError> {
        self.entries.write().insert(header.id(), header.clone());
        Ok(())
    }

    fn by_block_id(&self, block_id: Identifier) -> Result<Header, StorageError> {
        self.entries
            .read()
            .get(&block_id)
            .cloned()
            .ok_or(StorageError::NotFound)
    }
}

/// Latest-seal-as-of-block index.
#[derive(Default)]
pub struct MemorySeals {
    entries: RwLock<HashMap<Identifier, Seal>>,
}

impl Seals for MemorySeals {
    fn index(&self, block_id: Identifier, seal: &Seal) -> Result<(), StorageError> {
        self.entries.write().insert(block_id, seal.clone());
        Ok(())
    }

    fn by_block_id(&self, block_id: Identifier) -> Result<Seal, StorageError> {
        self.entries
            .read()
            .get(&block_id)
            .cloned()
            .ok_or(StorageError::NotFound)
    }
}

/// Payload indexes by block ID.
#[derive(Default)]
pub struct MemoryPayloadIndexes {
    entries: RwLock<HashMap<Identifier, Index>>,
}

impl PayloadIndexes for MemoryPayloadIndexes {
    fn store(&self, block_id: Identifier, index: &Index) -> Result<(), StorageError> {
        self.entries.write().insert(block_id, index.clone());
        Ok(())
    }

    fn by_block_id(&self, block_id: Identifier) -> Result<Index, StorageError> {
        self.entries
            .read()
            .get(&block_id)
            .cloned()
            .ok_or(StorageError::NotFound)
    }
}

/// Blocks by ID.
#[derive(Default)]
pub struct MemoryBlocks {
    entries: RwLock<HashMap<Identifier, Block>>,
}

impl Blocks for MemoryBlocks {
    fn store(&self, block: &Block) -> Result<(), StorageError> {
        self.entries.write().insert(block.id(), block.clone());
        Ok(())
    }

    fn by_id(&self, block_id: Identifier) -> Result<Block, StorageError> {
        self.entries
            .read()
            .get(&block_id)
            .cloned()
            .ok_or(StorageError::NotFound)
    }
}

/// Execution results by ID.
#[derive(Default)]
pub struct MemoryResults {
    entries: RwLock<HashMap<Identifier, ExecutionResult>>,
}

impl ExecutionResults for MemoryResults {
    fn store(&self, result: &ExecutionResult) -> Result<(), StorageError> {
        self.entries.write().insert(result.id(), result.clone());
        Ok(())
    }

    fn by_id(&self, result_id: Identifier) -> Result<ExecutionResult, StorageError> {
        self.entries
            .read()
            .get(&result_id)
            .cloned()
            .ok_or(StorageError::NotFound)
    }
}

/// Execution receipts by ID and by executed block.
#[derive(Default)]
pub struct MemoryReceipts {
    by_id: RwLock<HashMap<Identifier, ExecutionReceipt>>,
    by_block: RwLock<HashMap<Identifier, Vec<Identifier>>>,
}

impl ExecutionReceipts for MemoryReceipts {
    fn store(&self, receipt: &ExecutionReceipt) -> Result<(), StorageError> {
        let receipt_id = receipt.id();
        let block_id = receipt.execution_result.block_id;
        let mut by_id = self.by_id.write();
        if by_id.insert(receipt_id, receipt.clone()).is_none() {
            self.by_block.write().entry(block_id).or_default().push(receipt_id);
        }
        Ok(())
    }

    fn by_id(&self, receipt_id: Identifier) -> Result<ExecutionReceipt, StorageError> {
        self.by_id
            .read()
            .get(&receipt_id)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    fn by_block_id(&self, block_id: Identifier) -> Result<Vec<ExecutionReceipt>, StorageError> {
        let by_id = self.by_id.read();
        Ok(self
            .by_block
            .read()
            .get(&block_id)
            .map(|ids| ids.iter().filter_map(|id| by_id.get(id).cloned()).collect())
            .unwrap_or_default())
    }
}

/// A reference protocol state over the in-memory stores.
///
/// `extend` persists the candidate and maintains the latest-seal index;
/// finalization and sealing progress are driven by the surrounding node
/// logic through the explicit setters.
pub struct MemoryProtocolState {
    headers: Arc<MemoryHeaders>,
    blocks: Arc<MemoryBlocks>,
    indexes: Arc<MemoryPayloadIndexes>,
    seals: Arc<MemorySeals>,
    finalized: RwLock<Option<Header>>,
    sealed: RwLock<Option<Header>>,
}

impl MemoryProtocolState {
    /// Wires a protocol state over the given stores.
    pub fn new(
        headers: Arc<MemoryHeaders>,
        blocks: Arc<MemoryBlocks>,
        indexes: Arc<MemoryPayloadIndexes>,
        seals: Arc<MemorySeals>,
    ) -> MemoryProtocolState {
        MemoryProtocolState {
            headers,
            blocks,
            indexes,
            seals,
            finalized: RwLock::new(None),
            sealed: RwLock::new(None),
        }
    }

    /// Marks `header` as the latest finalized block.
    pub fn set_finalized(&self, header: Header) {
        *self.finalized.write() = Some(header);
    }

    /// Marks `header` as the latest sealed block.
    pub fn set_sealed(&self, header: Header) {
        *self.sealed.write() = Some(header);
    }
}

impl ProtocolState for MemoryProtocolState {
    fn sealed_head(&self) -> Result<Header, StorageError> {
        self.sealed.read().clone().ok_or(StorageError::NotFound)
    }

    fn finalized_head(&self) -> Result<Header, StorageError> {
        self.finalized.read().clone().ok_or(StorageError::NotFound)
    }

    fn extend(&self, block: &Block) -> Result<(), StateError> {
        let parent = self
            .headers
            .by_block_id(block.header.parent_id)
            .map_err(|_| {
                StateError::InvalidExtension(format!(
                    "unknown parent {:?}",
                    block.header.parent_id
                ))
            })?;
        if block.header.height != parent.height + 1 {
            return Err(StateError::InvalidExtension(format!(
                "height {} does not extend parent height {}",
                block.header.height, parent.height
            )));
        }
        if block.header.payload_hash != block.payload.hash() {
            return Err(StateError::InvalidExtension(
                "payload hash does not match payload".to_string(),
            ));
        }

        self.headers.store(&block.header)?;
        self.blocks.store(block)?;
        self.indexes.store(block.id(), &block.payload.index())?;

        // the candidate's latest seal: its own last seal, or the parent's
        let latest = match block.payload.seals.last() {
            Some(seal) => seal.clone(),
            None => self.seals.by_block_id(block.header.parent_id)?,
        };
        self.seals.index(block.id(), &latest)?;
        Ok(())
    }
}
