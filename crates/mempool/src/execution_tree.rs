//! The execution-tree mempool.
//!
//! Execution results form a forest keyed by result ID: each vertex points
//! to its parent via `previous_result_id` and may have many children
//! (competing execution forks of the same chain segment). Receipts hang
//! off the vertex of their result. The builder searches the forest from
//! the latest sealed result to select receipts for inclusion.

use std::collections::BTreeMap;

use ahash::{AHashMap, AHashSet};
use parking_lot::Mutex;

use cascade_api::mempool::{BlockFilter, ExecutionTree, ReceiptFilter};
use cascade_types::error::MempoolError;
use cascade_types::{ExecutionReceipt, ExecutionResult, Header, Identifier};

struct Vertex {
    result: ExecutionResult,
    block: Header,
    /// Receipts committing to this result, keyed by receipt ID so the
    /// yield order is deterministic.
    receipts: BTreeMap<Identifier, ExecutionReceipt>,
}

#[derive(Default)]
struct Inner {
    vertices: AHashMap<Identifier, Vertex>,
    receipt_count: usize,
}

impl Inner {
    fn children_of(&self, result_id: Identifier) -> Vec<Identifier> {
        let mut children: Vec<Identifier> = self
            .vertices
            .iter()
            .filter(|(_, v)| v.result.previous_result_id == result_id)
            .map(|(id, _)| *id)
            .collect();
        children.sort();
        children
    }
}

/// A bounded forest of execution results and their receipts.
pub struct ExecutionTreePool {
    inner: Mutex<Inner>,
    capacity: usize,
}

impl ExecutionTreePool {
    /// Creates a pool holding at most `capacity` receipts.
    pub fn new(capacity: usize) -> ExecutionTreePool {
        ExecutionTreePool {
            inner: Mutex::new(Inner::default()),
            capacity,
        }
    }

    fn ensure_vertex(inner: &mut Inner, result: &ExecutionResult, block: &Header) {
        let result_id = result.id();
        inner.vertices.entry(result_id).or_insert_with(|| Vertex {
            result: result.clone(),
            block: block.clone(),
            receipts: BTreeMap::new(),
        });
    }

    /// Evicts the receipts of the lowest vertices until the pool fits its
    /// capacity again. Low vertices are the least likely to still be
    /// reachable from the sealed root.
    fn enforce_capacity(inner: &mut Inner, capacity: usize) -> usize {
        let mut evicted = 0;
        while inner.receipt_count > capacity {
            let victim = inner
                .vertices
                .iter()
                .filter(|(_, v)| !v.receipts.is_empty())
                .min_by_key(|(id, v)| (v.block.height, **id))
                .map(|(id, _)| *id);
            let Some(victim) = victim else { break };
            if let Some(vertex) = inner.vertices.get_mut(&victim) {
                evicted += vertex.receipts.len();
                inner.receipt_count -= vertex.receipts.len();
                vertex.receipts.clear();
            }
        }
        evicted
    }
}

impl ExecutionTree for ExecutionTreePool {
    fn add_result(&self, result: &ExecutionResult, block: &Header) -> Result<(), MempoolError> {
        let mut inner = self.inner.lock();
        Self::ensure_vertex(&mut inner, result, block);
        Ok(())
    }

    fn add_receipt(
        &self,
        receipt: &ExecutionReceipt,
        block: &Header,
    ) -> Result<bool, MempoolError> {
        let mut inner = self.inner.lock();
        Self::ensure_vertex(&mut inner, &receipt.execution_result, block);
        let result_id = receipt.execution_result.id();
        let vertex = inner
            .vertices
            .get_mut(&result_id)
            .expect("vertex just ensured");
        if vertex.result != receipt.execution_result {
            return Err(MempoolError::Conflict(result_id));
        }
        let added = vertex
            .receipts
            .insert(receipt.id(), receipt.clone())
            .is_none();
        if added {
            inner.receipt_count += 1;
            if inner.receipt_count > self.capacity {
                let evicted = Self::enforce_capacity(&mut inner, self.capacity);
                tracing::debug!(
                    target: "mempool",
                    event = "execution_tree_eviction",
                    evicted,
                    capacity = self.capacity,
                );
            }
        }
        Ok(added)
    }

    fn reachable_receipts(
        &self,
        from_result_id: Identifier,
        block_filter: BlockFilter<'_>,
        receipt_filter: ReceiptFilter<'_>,
    ) -> Result<Vec<ExecutionReceipt>, MempoolError> {
        let inner = self.inner.lock();
        let mut yielded = Vec::new();
        if !inner.vertices.contains_key(&from_result_id) {
            return Ok(yielded);
        }

        // depth-first from the root; parents are always yielded before
        // their children, and an off-fork block prunes its whole subtree
        let mut stack = vec![from_result_id];
        let mut seen: AHashSet<Identifier> = AHashSet::new();
        while let Some(result_id) = stack.pop() {
            if !seen.insert(result_id) {
                continue;
            }
            let vertex = match inner.vertices.get(&result_id) {
                Some(v) => v,
                None => continue,
            };
            if !block_filter(&vertex.block) {
                continue;
            }
            for receipt in vertex.receipts.values() {
                if receipt_filter(receipt) {
                    yielded.push(receipt.clone());
                }
            }
            let mut children = inner.children_of(result_id);
            // reversed so the stack pops lowest child ID first
            children.reverse();
            stack.extend(children);
        }
        Ok(yielded)
    }

    fn prune_up_to(&self, sealed_height: u64) -> Result<(), MempoolError> {
        let mut inner = self.inner.lock();

        // live roots: the results executing blocks at the sealed height.
        // The sealed result is among them, and the builder searches from
        // it; everything reachable from these roots must survive.
        let roots: Vec<Identifier> = inner
            .vertices
            .iter()
            .filter(|(_, v)| v.block.height == sealed_height)
            .map(|(id, _)| *id)
            .collect();
        let mut live: AHashSet<Identifier> = AHashSet::new();
        let mut stack = roots;
        while let Some(id) = stack.pop() {
            if !live.insert(id) {
                continue;
            }
            stack.extend(inner.children_of(id));
        }

        // drop results at or below the sealed height that are no longer
        // reachable from the live roots
        let stale: Vec<Identifier> = inner
            .vertices
            .iter()
            .filter(|(id, v)| v.block.height <= sealed_height && !live.contains(id))
            .map(|(id, _)| *id)
            .collect();
        for id in stale {
            if let Some(vertex) = inner.vertices.remove(&id) {
                inner.receipt_count -= vertex.receipts.len();
            }
        }
        Ok(())
    }

    fn size(&self) -> usize {
        self.inner.lock().receipt_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(height: u64, seed: u8) -> Header {
        Header {
            chain_id: "cascade-test".into(),
            parent_id: Identifier::of(&(seed, height)),
            height,
            view: height,
            payload_hash: Identifier::ZERO,
            timestamp: 0,
            proposer_id: Identifier::ZERO,
            parent_voter_ids: vec![],
            parent_voter_sig: vec![],
            proposer_sig: vec![],
        }
    }

    fn result(previous: Identifier, block: &Header, seed: u8) -> ExecutionResult {
        ExecutionResult {
            previous_result_id: previous,
            block_id: block.id(),
            chunks: vec![cascade_types::Chunk {
                index: 0,
                collection_index: 0,
                start_state: cascade_types::StateCommitment([seed; 32]),
                event_collection: Identifier::ZERO,
                block_id: block.id(),
                total_computation_used: 0,
                number_of_transactions: 1,
                end_state: cascade_types::StateCommitment([seed.wrapping_add(1); 32]),
            }],
            service_events: vec![],
        }
    }

    fn receipt(result: &ExecutionResult, executor: u8) -> ExecutionReceipt {
        ExecutionReceipt {
            executor_id: Identifier::of(&executor),
            execution_result: result.clone(),
            spocks: vec![],
            executor_signature: vec![],
        }
    }

    fn pass_all() -> (
        impl Fn(&Header) -> bool + Send + Sync,
        impl Fn(&ExecutionReceipt) -> bool + Send + Sync,
    ) {
        (|_: &Header| true, |_: &ExecutionReceipt| true)
    }

    #[test]
    fn parents_are_yielded_before_children() {
        let pool = ExecutionTreePool::new(100);
        let h0 = header(1, 0);
        let h1 = header(2, 1);
        let h2 = header(3, 2);
        let r0 = result(Identifier::ZERO, &h0, 0);
        let r1 = result(r0.id(), &h1, 10);
        let r2 = result(r1.id(), &h2, 20);

        // insert out of order
        pool.add_receipt(&receipt(&r2, 3), &h2).unwrap();
        pool.add_receipt(&receipt(&r0, 1), &h0).unwrap();
        pool.add_receipt(&receipt(&r1, 2), &h1).unwrap();

        let (bf, rf) = pass_all();
        let receipts = pool.reachable_receipts(r0.id(), &bf, &rf).unwrap();
        let order: Vec<Identifier> = receipts
            .iter()
            .map(|r| r.execution_result.id())
            .collect();
        assert_eq!(order, vec![r0.id(), r1.id(), r2.id()]);
    }

    #[test]
    fn disconnected_descendants_are_not_yielded() {
        let pool = ExecutionTreePool::new(100);
        let h0 = header(1, 0);
        let h2 = header(3, 2);
        let r0 = result(Identifier::ZERO, &h0, 0);
        let r1 = result(r0.id(), &header(2, 1), 10);
        let r2 = result(r1.id(), &h2, 20);

        // r1 is never added: r2 dangles
        pool.add_receipt(&receipt(&r0, 1), &h0).unwrap();
        pool.add_receipt(&receipt(&r2, 3), &h2).unwrap();

        let (bf, rf) = pass_all();
        let receipts = pool.reachable_receipts(r0.id(), &bf, &rf).unwrap();
        assert_eq!(receipts.len(), 1);
        assert_eq!(receipts[0].execution_result.id(), r0.id());
    }

    #[test]
    fn block_filter_prunes_whole_subtrees() {
        let pool = ExecutionTreePool::new(100);
        let h0 = header(1, 0);
        let h1 = header(2, 1);
        let h2 = header(3, 2);
        let r0 = result(Identifier::ZERO, &h0, 0);
        let r1 = result(r0.id(), &h1, 10);
        let r2 = result(r1.id(), &h2, 20);
        pool.add_receipt(&receipt(&r0, 1), &h0).unwrap();
        pool.add_receipt(&receipt(&r1, 2), &h1).unwrap();
        pool.add_receipt(&receipt(&r2, 3), &h2).unwrap();

        let cutoff = h1.id();
        let bf = move |h: &Header| h.id() != cutoff;
        let (_, rf) = pass_all();
        let receipts = pool.reachable_receipts(r0.id(), &bf, &rf).unwrap();
        let ids: Vec<Identifier> = receipts.iter().map(|r| r.execution_result.id()).collect();
        assert_eq!(ids, vec![r0.id()]);
    }

    #[test]
    fn duplicate_receipts_are_not_double_counted() {
        let pool = ExecutionTreePool::new(100);
        let h0 = header(1, 0);
        let r0 = result(Identifier::ZERO, &h0, 0);
        assert!(pool.add_receipt(&receipt(&r0, 1), &h0).unwrap());
        assert!(!pool.add_receipt(&receipt(&r0, 1), &h0).unwrap());
        assert_eq!(pool.size(), 1);
    }

    #[test]
    fn pruning_removes_low_vertices_and_keeps_the_rest_reachable() {
        let pool = ExecutionTreePool::new(100);
        let h0 = header(1, 0);
        let h1 = header(2, 1);
        let h2 = header(3, 2);
        let r0 = result(Identifier::ZERO, &h0, 0);
        let r1 = result(r0.id(), &h1, 10);
        let r2 = result(r1.id(), &h2, 20);
        pool.add_receipt(&receipt(&r0, 1), &h0).unwrap();
        pool.add_receipt(&receipt(&r1, 2), &h1).unwrap();
        pool.add_receipt(&receipt(&r2, 3), &h2).unwrap();

        pool.prune_up_to(2).unwrap();
        assert_eq!(pool.size(), 2);

        let (bf, rf) = pass_all();
        let receipts = pool.reachable_receipts(r1.id(), &bf, &rf).unwrap();
        let ids: Vec<Identifier> = receipts.iter().map(|r| r.execution_result.id()).collect();
        assert_eq!(ids, vec![r1.id(), r2.id()]);
    }

    #[test]
    fn pruning_spares_live_roots_at_the_sealed_height() {
        let pool = ExecutionTreePool::new(100);
        let h0 = header(1, 0);
        let h1 = header(2, 1);
        let h2 = header(3, 2);
        let r0 = result(Identifier::ZERO, &h0, 0);
        let r1 = result(r0.id(), &h1, 10);
        // a competing execution of the sealed block, without descendants
        let r1b = result(r0.id(), &h1, 40);
        let r2 = result(r1.id(), &h2, 20);
        pool.add_receipt(&receipt(&r0, 1), &h0).unwrap();
        pool.add_receipt(&receipt(&r1, 2), &h1).unwrap();
        pool.add_receipt(&receipt(&r1b, 4), &h1).unwrap();
        pool.add_receipt(&receipt(&r2, 3), &h2).unwrap();

        pool.prune_up_to(2).unwrap();

        // both results at the sealed height stay as live roots; only the
        // superseded vertex below is dropped
        assert_eq!(pool.size(), 3);
        let (bf, rf) = pass_all();
        let receipts = pool.reachable_receipts(r1.id(), &bf, &rf).unwrap();
        let ids: Vec<Identifier> = receipts.iter().map(|r| r.execution_result.id()).collect();
        assert_eq!(ids, vec![r1.id(), r2.id()]);
        assert_eq!(
            pool.reachable_receipts(r1b.id(), &bf, &rf).unwrap().len(),
            1
        );
    }

    #[test]
    fn capacity_evicts_lowest_receipts_first() {
        let pool = ExecutionTreePool::new(2);
        let h0 = header(1, 0);
        let h1 = header(2, 1);
        let h2 = header(3, 2);
        let r0 = result(Identifier::ZERO, &h0, 0);
        let r1 = result(r0.id(), &h1, 10);
        let r2 = result(r1.id(), &h2, 20);
        pool.add_receipt(&receipt(&r0, 1), &h0).unwrap();
        pool.add_receipt(&receipt(&r1, 2), &h1).unwrap();
        pool.add_receipt(&receipt(&r2, 3), &h2).unwrap();

        assert!(pool.size() <= 2);
        let (bf, rf) = pass_all();
        let receipts = pool.reachable_receipts(r0.id(), &bf, &rf).unwrap();
        assert!(receipts.iter().all(|r| r.execution_result.id() != r0.id()));
    }

    #[test]
    fn second_executor_for_same_result_is_a_new_receipt() {
        let pool = ExecutionTreePool::new(100);
        let h0 = header(1, 0);
        let r0 = result(Identifier::ZERO, &h0, 0);
        assert!(pool.add_receipt(&receipt(&r0, 1), &h0).unwrap());
        assert!(pool.add_receipt(&receipt(&r0, 2), &h0).unwrap());
        assert_eq!(pool.size(), 2);
    }
}
