//! The result-approval pool.
//!
//! Approvals are indexed by (result, chunk, approver): a verifier gets at
//! most one voice per chunk, and the sealing core counts distinct
//! assigned approvers when deciding sealability.

use std::collections::BTreeMap;

use ahash::AHashMap;
use parking_lot::Mutex;

use cascade_types::{Identifier, ResultApproval};

type PerChunk = BTreeMap<u64, BTreeMap<Identifier, ResultApproval>>;

/// Approvals collected per execution result.
#[derive(Default)]
pub struct Approvals {
    by_result: Mutex<AHashMap<Identifier, PerChunk>>,
}

impl Approvals {
    /// An empty pool.
    pub fn new() -> Approvals {
        Approvals::default()
    }

    /// Adds an approval; returns whether it was new for its
    /// (result, chunk, approver) slot.
    pub fn add(&self, approval: ResultApproval) -> bool {
        let mut by_result = self.by_result.lock();
        by_result
            .entry(approval.attestation.execution_result_id)
            .or_default()
            .entry(approval.attestation.chunk_index)
            .or_default()
            .insert(approval.approver_id, approval)
            .is_none()
    }

    /// The approvers that signed off on the given chunk.
    pub fn approvers_for(&self, result_id: Identifier, chunk_index: u64) -> Vec<Identifier> {
        self.by_result
            .lock()
            .get(&result_id)
            .and_then(|chunks| chunks.get(&chunk_index))
            .map(|per_approver| per_approver.keys().copied().collect())
            .unwrap_or_default()
    }

    /// All approvals for the given chunk.
    pub fn by_chunk(&self, result_id: Identifier, chunk_index: u64) -> Vec<ResultApproval> {
        self.by_result
            .lock()
            .get(&result_id)
            .and_then(|chunks| chunks.get(&chunk_index))
            .map(|per_approver| per_approver.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Drops every approval for `result_id`; returns whether any were
    /// present.
    pub fn remove_result(&self, result_id: Identifier) -> bool {
        self.by_result.lock().remove(&result_id).is_some()
    }

    /// Number of approvals currently held.
    pub fn size(&self) -> usize {
        self.by_result
            .lock()
            .values()
            .flat_map(|chunks| chunks.values())
            .map(|per_approver| per_approver.len())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cascade_types::Attestation;

    fn approval(result: u8, chunk: u64, approver: u8) -> ResultApproval {
        ResultApproval {
            attestation: Attestation {
                block_id: Identifier::ZERO,
                execution_result_id: Identifier::of(&(result, "result")),
                chunk_index: chunk,
            },
            approver_id: Identifier::of(&(approver, "verifier")),
            attestation_signature: vec![],
            spock: vec![],
            verifier_signature: vec![],
        }
    }

    #[test]
    fn one_voice_per_approver_per_chunk() {
        let pool = Approvals::new();
        assert!(pool.add(approval(1, 0, 1)));
        assert!(!pool.add(approval(1, 0, 1)));
        assert!(pool.add(approval(1, 0, 2)));
        assert!(pool.add(approval(1, 1, 1)));
        assert_eq!(pool.size(), 3);
        assert_eq!(
            pool.approvers_for(Identifier::of(&(1u8, "result")), 0).len(),
            2
        );
    }

    #[test]
    fn removal_clears_all_chunks_of_a_result() {
        let pool = Approvals::new();
        pool.add(approval(1, 0, 1));
        pool.add(approval(1, 1, 1));
        pool.add(approval(2, 0, 1));
        assert!(pool.remove_result(Identifier::of(&(1u8, "result"))));
        assert_eq!(pool.size(), 1);
        assert!(!pool.remove_result(Identifier::of(&(1u8, "result"))));
    }
}
