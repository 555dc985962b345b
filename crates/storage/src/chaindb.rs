//! The persisted chain index.
//!
//! A single `redb` file with four tables: the append-only block store,
//! the height→block-ID index (one entry per finalized height), and the
//! finalized/sealed/root height scalars. Multi-row writes share one
//! write transaction so the index never exposes a torn extension.

use std::path::Path;

use parity_scale_codec::{Decode, Encode};
use redb::{Database, ReadableTable, TableDefinition};

use cascade_types::error::StorageError;
use cascade_types::{Block, Identifier};

const BLOCKS: TableDefinition<&[u8; 32], &[u8]> = TableDefinition::new("blocks");
const HEIGHT_INDEX: TableDefinition<u64, &[u8; 32]> = TableDefinition::new("height_index");
const SCALARS: TableDefinition<&str, u64> = TableDefinition::new("scalars");

const FINALIZED_HEIGHT: &str = "finalized_height";
const SEALED_HEIGHT: &str = "sealed_height";
const ROOT_HEIGHT: &str = "root_height";

fn backend(e: impl std::fmt::Display) -> StorageError {
    StorageError::Backend(e.to_string())
}

/// The on-disk chain index.
pub struct ChainIndexDb {
    db: Database,
}

impl ChainIndexDb {
    /// Opens (or creates) the index at `path` and ensures all tables
    /// exist.
    pub fn open(path: impl AsRef<Path>) -> Result<ChainIndexDb, StorageError> {
        let db = Database::create(path).map_err(backend)?;
        let txn = db.begin_write().map_err(backend)?;
        {
            txn.open_table(BLOCKS).map_err(backend)?;
            txn.open_table(HEIGHT_INDEX).map_err(backend)?;
            txn.open_table(SCALARS).map_err(backend)?;
        }
        txn.commit().map_err(backend)?;
        Ok(ChainIndexDb { db })
    }

    /// Bootstraps the index from the root block: stores it, indexes its
    /// height, and initializes every scalar to the root height — all in
    /// one transaction.
    pub fn bootstrap(&self, root: &Block) -> Result<(), StorageError> {
        let height = root.header.height;
        let id = root.id();
        let encoded = root.encode();
        let txn = self.db.begin_write().map_err(backend)?;
        {
            let mut blocks = txn.open_table(BLOCKS).map_err(backend)?;
            blocks.insert(&id.0, encoded.as_slice()).map_err(backend)?;
            let mut heights = txn.open_table(HEIGHT_INDEX).map_err(backend)?;
            heights.insert(height, &id.0).map_err(backend)?;
            let mut scalars = txn.open_table(SCALARS).map_err(backend)?;
            scalars.insert(ROOT_HEIGHT, height).map_err(backend)?;
            scalars.insert(FINALIZED_HEIGHT, height).map_err(backend)?;
            scalars.insert(SEALED_HEIGHT, height).map_err(backend)?;
        }
        txn.commit().map_err(backend)?;
        tracing::info!(
            target: "storage",
            event = "chain_index_bootstrapped",
            height,
            block_id = ?id,
        );
        Ok(())
    }

    /// Appends a block to the block store. The store is append-only:
    /// re-inserting an existing ID with different content is a conflict.
    pub fn insert_block(&self, block: &Block) -> Result<(), StorageError> {
        let id = block.id();
        let encoded = block.encode();
        let txn = self.db.begin_write().map_err(backend)?;
        {
            let mut blocks = txn.open_table(BLOCKS).map_err(backend)?;
            if let Some(existing) = blocks.get(&id.0).map_err(backend)? {
                if existing.value() != encoded.as_slice() {
                    return Err(StorageError::AlreadyExists(id));
                }
            }
            blocks.insert(&id.0, encoded.as_slice()).map_err(backend)?;
        }
        txn.commit().map_err(backend)?;
        Ok(())
    }

    /// Retrieves a block by ID.
    pub fn block_by_id(&self, id: Identifier) -> Result<Block, StorageError> {
        let txn = self.db.begin_read().map_err(backend)?;
        let blocks = txn.open_table(BLOCKS).map_err(backend)?;
        let guard = blocks.get(&id.0).map_err(backend)?.ok_or(StorageError::NotFound)?;
        Block::decode(&mut guard.value()).map_err(|e| StorageError::Decode(e.to_string()))
    }

    /// Records a finalized block: height index entry plus the
    /// finalized-height scalar, in one transaction.
    pub fn finalize(&self, height: u64, block_id: Identifier) -> Result<(), StorageError> {
        let txn = self.db.begin_write().map_err(backend)?;
        {
            let mut heights = txn.open_table(HEIGHT_INDEX).map_err(backend)?;
            heights.insert(height, &block_id.0).map_err(backend)?;
            let mut scalars = txn.open_table(SCALARS).map_err(backend)?;
            scalars.insert(FINALIZED_HEIGHT, height).map_err(backend)?;
        }
        txn.commit().map_err(backend)?;
        Ok(())
    }

    /// The block ID finalized at `height`.
    pub fn block_id_at(&self, height: u64) -> Result<Identifier, StorageError> {
        let txn = self.db.begin_read().map_err(backend)?;
        let heights = txn.open_table(HEIGHT_INDEX).map_err(backend)?;
        let guard = heights
            .get(height)
            .map_err(backend)?
            .ok_or(StorageError::NotFound)?;
        Ok(Identifier(*guard.value()))
    }

    /// Updates the sealed-height scalar.
    pub fn set_sealed_height(&self, height: u64) -> Result<(), StorageError> {
        self.set_scalar(SEALED_HEIGHT, height)
    }

    /// The sealed-height scalar.
    pub fn sealed_height(&self) -> Result<u64, StorageError> {
        self.scalar(SEALED_HEIGHT)
    }

    /// The finalized-height scalar.
    pub fn finalized_height(&self) -> Result<u64, StorageError> {
        self.scalar(FINALIZED_HEIGHT)
    }

    /// The root-height scalar: the spork root below which no index data
    /// exists.
    pub fn root_height(&self) -> Result<u64, StorageError> {
        self.scalar(ROOT_HEIGHT)
    }

    fn set_scalar(&self, key: &str, value: u64) -> Result<(), StorageError> {
        let txn = self.db.begin_write().map_err(backend)?;
        {
            let mut scalars = txn.open_table(SCALARS).map_err(backend)?;
            scalars.insert(key, value).map_err(backend)?;
        }
        txn.commit().map_err(backend)?;
        Ok(())
    }

    fn scalar(&self, key: &str) -> Result<u64, StorageError> {
        let txn = self.db.begin_read().map_err(backend)?;
        let scalars = txn.open_table(SCALARS).map_err(backend)?;
        let guard = scalars.get(key).map_err(backend)?.ok_or(StorageError::NotFound)?;
        Ok(guard.value())
    }
}
