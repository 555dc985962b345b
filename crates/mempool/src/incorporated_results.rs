//! The incorporated-result pool.
//!
//! Holds every incorporated result the sealing core still considers
//! sealable, indexed by the pairing's identifier.

use ahash::AHashMap;
use parking_lot::Mutex;

use cascade_types::{Identifier, IncorporatedResult};

/// A set of incorporated results pending sealing.
#[derive(Default)]
pub struct IncorporatedResults {
    entries: Mutex<AHashMap<Identifier, IncorporatedResult>>,
}

impl IncorporatedResults {
    /// An empty pool.
    pub fn new() -> IncorporatedResults {
        IncorporatedResults::default()
    }

    /// Adds an incorporated result; returns whether it was new.
    pub fn add(&self, incorporated: IncorporatedResult) -> bool {
        self.entries
            .lock()
            .insert(incorporated.id(), incorporated)
            .is_none()
    }

    /// Snapshot of all pending incorporated results.
    pub fn all(&self) -> Vec<IncorporatedResult> {
        self.entries.lock().values().cloned().collect()
    }

    /// Retrieves a pending incorporated result by ID.
    pub fn by_id(&self, id: Identifier) -> Option<IncorporatedResult> {
        self.entries.lock().get(&id).cloned()
    }

    /// Removes a pending incorporated result; returns whether it was
    /// present.
    pub fn remove(&self, id: Identifier) -> bool {
        self.entries.lock().remove(&id).is_some()
    }

    /// Number of pending incorporated results.
    pub fn size(&self) -> usize {
        self.entries.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cascade_types::{Chunk, ExecutionResult, StateCommitment};

    fn incorporated(seed: u8) -> IncorporatedResult {
        let block_id = Identifier::of(&(seed, "block"));
        let result = ExecutionResult {
            previous_result_id: Identifier::ZERO,
            block_id,
            chunks: vec![Chunk {
                index: 0,
                collection_index: 0,
                start_state: StateCommitment([seed; 32]),
                event_collection: Identifier::ZERO,
                block_id,
                total_computation_used: 0,
                number_of_transactions: 1,
                end_state: StateCommitment([seed.wrapping_add(1); 32]),
            }],
            service_events: vec![],
        };
        IncorporatedResult::new(block_id, result)
    }

    #[test]
    fn add_lookup_remove_roundtrip() {
        let pool = IncorporatedResults::new();
        let entry = incorporated(1);
        let id = entry.id();
        assert!(pool.add(entry.clone()));
        assert!(!pool.add(entry));
        assert_eq!(pool.by_id(id).unwrap().id(), id);
        assert!(pool.remove(id));
        assert!(pool.by_id(id).is_none());
        assert_eq!(pool.size(), 0);
    }
}
