//! Candidate-seal pools.
//!
//! [`SealSet`] is the bounded base pool. [`MultiReceiptGatedSeals`] wraps
//! any candidate-seal pool with a temporary anti-equivocation measure: a
//! candidate is only handed out once the receipts store holds receipts
//! from at least two distinct executors committing to the sealed result.
//! The gate is a decorator so it can be removed once full approval
//! aggregation lands.

use std::collections::VecDeque;
use std::sync::Arc;

use ahash::{AHashMap, AHashSet};
use parking_lot::Mutex;

use cascade_api::mempool::{IncorporatedResultSeals, OnEjection};
use cascade_api::storage::ExecutionReceipts;
use cascade_types::error::MempoolError;
use cascade_types::{Identifier, IncorporatedResultSeal};

struct SealSetInner {
    entries: AHashMap<Identifier, IncorporatedResultSeal>,
    /// Insertion order, used to pick ejection victims.
    order: VecDeque<Identifier>,
}

/// A bounded set of candidate seals indexed by incorporated-result ID.
pub struct SealSet {
    inner: Mutex<SealSetInner>,
    callbacks: Mutex<Vec<OnEjection>>,
    capacity: usize,
}

impl SealSet {
    /// Creates a pool holding at most `capacity` candidates.
    pub fn new(capacity: usize) -> SealSet {
        SealSet {
            inner: Mutex::new(SealSetInner {
                entries: AHashMap::new(),
                order: VecDeque::new(),
            }),
            callbacks: Mutex::new(Vec::new()),
            capacity,
        }
    }

    fn eject(&self, ejected: IncorporatedResultSeal) {
        tracing::debug!(
            target: "mempool",
            event = "seal_ejected",
            seal_id = ?ejected.id(),
            block_id = ?ejected.seal.block_id,
        );
        for callback in self.callbacks.lock().iter() {
            callback(&ejected);
        }
    }
}

impl IncorporatedResultSeals for SealSet {
    fn add(&self, seal: IncorporatedResultSeal) -> Result<bool, MempoolError> {
        let id = seal.id();
        let ejected = {
            let mut inner = self.inner.lock();
            if inner.entries.contains_key(&id) {
                return Ok(false);
            }
            inner.entries.insert(id, seal);
            inner.order.push_back(id);
            if inner.entries.len() > self.capacity {
                let victim = inner.order.pop_front().expect("non-empty order");
                inner.entries.remove(&victim)
            } else {
                None
            }
        };
        if let Some(ejected) = ejected {
            self.eject(ejected);
        }
        Ok(true)
    }

    fn all(&self) -> Vec<IncorporatedResultSeal> {
        self.inner.lock().entries.values().cloned().collect()
    }

    fn by_id(&self, id: Identifier) -> Option<IncorporatedResultSeal> {
        self.inner.lock().entries.get(&id).cloned()
    }

    fn remove(&self, id: Identifier) -> bool {
        let mut inner = self.inner.lock();
        let removed = inner.entries.remove(&id).is_some();
        if removed {
            inner.order.retain(|entry| *entry != id);
        }
        removed
    }

    fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.order.clear();
    }

    fn register_ejection_callback(&self, callback: OnEjection) {
        self.callbacks.lock().push(callback);
    }

    fn size(&self) -> usize {
        self.inner.lock().entries.len()
    }
}

/// Decorator enforcing the two-executor admission gate on reads.
pub struct MultiReceiptGatedSeals<P> {
    pool: P,
    receipts: Arc<dyn ExecutionReceipts>,
}

impl<P: IncorporatedResultSeals> MultiReceiptGatedSeals<P> {
    /// Wraps `pool`, gating reads against `receipts`.
    pub fn new(pool: P, receipts: Arc<dyn ExecutionReceipts>) -> MultiReceiptGatedSeals<P> {
        MultiReceiptGatedSeals { pool, receipts }
    }

    /// Whether at least two distinct executors committed to the sealed
    /// result. Storage failures are logged and treated as "not yet".
    fn has_multiple_receipts(&self, candidate: &IncorporatedResultSeal) -> bool {
        let block_id = candidate.incorporated_result.result.block_id;
        let result_id = candidate.incorporated_result.result.id();
        let receipts = match self.receipts.by_block_id(block_id) {
            Ok(receipts) => receipts,
            Err(e) => {
                tracing::error!(
                    target: "mempool",
                    event = "receipt_lookup_failed",
                    block_id = ?block_id,
                    error = %e,
                );
                return false;
            }
        };
        let executors: AHashSet<Identifier> = receipts
            .iter()
            .filter(|r| r.execution_result.id() == result_id)
            .map(|r| r.executor_id)
            .collect();
        executors.len() >= 2
    }
}

impl<P: IncorporatedResultSeals> IncorporatedResultSeals for MultiReceiptGatedSeals<P> {
    fn add(&self, seal: IncorporatedResultSeal) -> Result<bool, MempoolError> {
        self.pool.add(seal)
    }

    fn all(&self) -> Vec<IncorporatedResultSeal> {
        self.pool.all()
    }

    fn by_id(&self, id: Identifier) -> Option<IncorporatedResultSeal> {
        let candidate = self.pool.by_id(id)?;
        if !self.has_multiple_receipts(&candidate) {
            return None;
        }
        Some(candidate)
    }

    fn remove(&self, id: Identifier) -> bool {
        self.pool.remove(id)
    }

    fn clear(&self) {
        self.pool.clear()
    }

    fn register_ejection_callback(&self, callback: OnEjection) {
        self.pool.register_ejection_callback(callback)
    }

    fn size(&self) -> usize {
        self.pool.size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use cascade_storage::memory::MemoryReceipts;
    use cascade_types::{
        Chunk, ExecutionReceipt, ExecutionResult, IncorporatedResult, Seal, StateCommitment,
    };

    fn sample_result(seed: u8) -> ExecutionResult {
        ExecutionResult {
            previous_result_id: Identifier::ZERO,
            block_id: Identifier::of(&(seed, "block")),
            chunks: vec![Chunk {
                index: 0,
                collection_index: 0,
                start_state: StateCommitment([seed; 32]),
                event_collection: Identifier::ZERO,
                block_id: Identifier::of(&(seed, "block")),
                total_computation_used: 0,
                number_of_transactions: 1,
                end_state: StateCommitment([seed.wrapping_add(1); 32]),
            }],
            service_events: vec![],
        }
    }

    fn candidate(seed: u8) -> IncorporatedResultSeal {
        let result = sample_result(seed);
        IncorporatedResultSeal {
            seal: Seal {
                block_id: result.block_id,
                result_id: result.id(),
                final_state: result.final_state().unwrap(),
                service_events: vec![],
            },
            incorporated_result: IncorporatedResult::new(result.block_id, result),
        }
    }

    fn receipt_for(result: &ExecutionResult, executor: u8) -> ExecutionReceipt {
        ExecutionReceipt {
            executor_id: Identifier::of(&(executor, "executor")),
            execution_result: result.clone(),
            spocks: vec![],
            executor_signature: vec![],
        }
    }

    #[test]
    fn add_is_idempotent_by_id() {
        let pool = SealSet::new(10);
        let c = candidate(1);
        assert!(pool.add(c.clone()).unwrap());
        assert!(!pool.add(c).unwrap());
        assert_eq!(pool.size(), 1);
    }

    #[test]
    fn over_capacity_ejects_and_notifies() {
        static EJECTED: AtomicUsize = AtomicUsize::new(0);
        let pool = SealSet::new(2);
        pool.register_ejection_callback(Box::new(|_| {
            EJECTED.fetch_add(1, Ordering::SeqCst);
        }));
        for seed in 0..3u8 {
            pool.add(candidate(seed)).unwrap();
        }
        assert_eq!(pool.size(), 2);
        assert_eq!(EJECTED.load(Ordering::SeqCst), 1);
        // the oldest entry was ejected
        assert!(pool.by_id(candidate(0).id()).is_none());
    }

    #[test]
    fn gate_requires_two_distinct_executors() {
        let receipts = Arc::new(MemoryReceipts::default());
        let pool = MultiReceiptGatedSeals::new(SealSet::new(10), receipts.clone());

        let c = candidate(1);
        let id = c.id();
        let result = c.incorporated_result.result.clone();
        pool.add(c).unwrap();

        // no receipts at all
        assert!(pool.by_id(id).is_none());

        // one executor, twice
        receipts.store(&receipt_for(&result, 1)).unwrap();
        receipts.store(&receipt_for(&result, 1)).unwrap();
        assert!(pool.by_id(id).is_none());

        // a second, distinct executor unlocks the candidate
        receipts.store(&receipt_for(&result, 2)).unwrap();
        assert!(pool.by_id(id).is_some());
    }

    #[test]
    fn gate_ignores_receipts_for_other_results() {
        let receipts = Arc::new(MemoryReceipts::default());
        let pool = MultiReceiptGatedSeals::new(SealSet::new(10), receipts.clone());

        let c = candidate(1);
        let id = c.id();
        let sealed_result = c.incorporated_result.result.clone();
        pool.add(c).unwrap();

        // two executors, but one committed to a conflicting result for
        // the same block
        let mut conflicting = sample_result(1);
        conflicting.chunks[0].end_state = StateCommitment([99; 32]);
        receipts.store(&receipt_for(&sealed_result, 1)).unwrap();
        receipts.store(&receipt_for(&conflicting, 2)).unwrap();
        assert!(pool.by_id(id).is_none());
    }

    #[test]
    fn all_is_not_gated() {
        let receipts = Arc::new(MemoryReceipts::default());
        let pool = MultiReceiptGatedSeals::new(SealSet::new(10), receipts);
        pool.add(candidate(1)).unwrap();
        assert_eq!(pool.all().len(), 1);
    }
}
