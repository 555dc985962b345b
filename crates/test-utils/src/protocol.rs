//! A scriptable protocol state double.

use parking_lot::Mutex;

use cascade_api::protocol::{ProtocolState, StateError};
use cascade_types::error::StorageError;
use cascade_types::{Block, Header};

/// A protocol state whose heads are set directly by the test, and which
/// records every extension for inspection.
pub struct StubProtocolState {
    sealed: Mutex<Option<Header>>,
    finalized: Mutex<Option<Header>>,
    extended: Mutex<Vec<Block>>,
    fail_extend: Mutex<Option<String>>,
}

impl StubProtocolState {
    /// A state with both heads at `head`.
    pub fn new(head: Header) -> StubProtocolState {
        StubProtocolState {
            sealed: Mutex::new(Some(head.clone())),
            finalized: Mutex::new(Some(head)),
            extended: Mutex::new(Vec::new()),
            fail_extend: Mutex::new(None),
        }
    }

    /// Overrides the sealed head.
    pub fn set_sealed(&self, header: Header) {
        *self.sealed.lock() = Some(header);
    }

    /// Overrides the finalized head.
    pub fn set_finalized(&self, header: Header) {
        *self.finalized.lock() = Some(header);
    }

    /// Makes every subsequent `extend` fail with `reason`.
    pub fn fail_extensions(&self, reason: impl Into<String>) {
        *self.fail_extend.lock() = Some(reason.into());
    }

    /// The blocks passed to `extend`, in order.
    pub fn extended(&self) -> Vec<Block> {
        self.extended.lock().clone()
    }

    /// The payload of the most recent extension, if any.
    pub fn last_extended(&self) -> Option<Block> {
        self.extended.lock().last().cloned()
    }
}

impl ProtocolState for StubProtocolState {
    fn sealed_head(&self) -> Result<Header, StorageError> {
        self.sealed.lock().clone().ok_or(StorageError::NotFound)
    }

    fn finalized_head(&self) -> Result<Header, StorageError> {
        self.finalized.lock().clone().ok_or(StorageError::NotFound)
    }

    fn extend(&self, block: &Block) -> Result<(), StateError> {
        if let Some(reason) = self.fail_extend.lock().clone() {
            return Err(StateError::InvalidExtension(reason));
        }
        self.extended.lock().push(block.clone());
        Ok(())
    }
}
