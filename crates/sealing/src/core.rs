//! The sealing core.
//!
//! Consumes receipts and approvals, and constructs candidate seals once
//! an incorporated result satisfies the sealing rules:
//!
//! * every non-system chunk has at least the configured number of
//!   approvals from its assigned verifier committee, and
//! * at least two receipts from distinct executors commit to the result.
//!
//! The core retries nothing on its own: approvals for unknown results are
//! discarded (the network re-delivers after the matching receipt), and
//! receipts whose parent result is unknown wait in a bounded buffer until
//! the parent arrives.

use std::sync::Arc;

use ahash::{AHashMap, AHashSet};
use parking_lot::Mutex;

use cascade_api::mempool::{ExecutionTree, IncorporatedResultSeals};
use cascade_api::protocol::ProtocolState;
use cascade_api::storage::{ExecutionReceipts, ExecutionResults, Headers};
use cascade_api::validation::{ApprovalValidator, Assigner, ReceiptValidator};
use cascade_mempool::{Approvals, IncorporatedResults};
use cascade_types::error::{EngineError, StorageError};
use cascade_types::{
    ExecutionReceipt, Identifier, IncorporatedResult, IncorporatedResultSeal, ResultApproval, Seal,
};

/// Sealing parameters.
///
/// The approval threshold is configuration, not protocol: production
/// deployments tune it per network, tests use small constants.
#[derive(Debug, Clone)]
pub struct SealingConfig {
    /// Approvals required per non-system chunk before a seal may be
    /// constructed.
    pub required_approvals_for_seal_construction: usize,
    /// Whether emergency sealing is enabled.
    pub emergency_sealing_active: bool,
    /// Minimum number of finalized heights an unsealed result must lag
    /// behind before emergency sealing kicks in.
    pub emergency_sealing_depth: u64,
    /// Capacity of the unknown-parent receipt buffer.
    pub pending_receipts_capacity: usize,
}

impl Default for SealingConfig {
    fn default() -> Self {
        SealingConfig {
            required_approvals_for_seal_construction: 1,
            emergency_sealing_active: false,
            emergency_sealing_depth: 400,
            pending_receipts_capacity: 1_000,
        }
    }
}

/// The sealing state machine.
pub struct SealingCore {
    state: Arc<dyn ProtocolState>,
    headers: Arc<dyn Headers>,
    receipts_db: Arc<dyn ExecutionReceipts>,
    results_db: Arc<dyn ExecutionResults>,
    receipt_validator: Arc<dyn ReceiptValidator>,
    approval_validator: Arc<dyn ApprovalValidator>,
    assigner: Arc<dyn Assigner>,
    execution_tree: Arc<dyn ExecutionTree>,
    incorporated_results: IncorporatedResults,
    approvals: Approvals,
    seals: Arc<dyn IncorporatedResultSeals>,
    /// Receipts waiting for their parent result, keyed by the missing
    /// parent's ID.
    pending_receipts: Mutex<AHashMap<Identifier, Vec<ExecutionReceipt>>>,
    config: SealingConfig,
}

impl SealingCore {
    /// Wires a sealing core from its collaborators.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        state: Arc<dyn ProtocolState>,
        headers: Arc<dyn Headers>,
        receipts_db: Arc<dyn ExecutionReceipts>,
        results_db: Arc<dyn ExecutionResults>,
        receipt_validator: Arc<dyn ReceiptValidator>,
        approval_validator: Arc<dyn ApprovalValidator>,
        assigner: Arc<dyn Assigner>,
        execution_tree: Arc<dyn ExecutionTree>,
        seals: Arc<dyn IncorporatedResultSeals>,
        config: SealingConfig,
    ) -> SealingCore {
        SealingCore {
            state,
            headers,
            receipts_db,
            results_db,
            receipt_validator,
            approval_validator,
            assigner,
            execution_tree,
            incorporated_results: IncorporatedResults::new(),
            approvals: Approvals::new(),
            seals,
            pending_receipts: Mutex::new(AHashMap::new()),
            config,
        }
    }

    /// Ingests one execution receipt.
    ///
    /// Returns `true` if the receipt was admitted, `false` if it was
    /// buffered awaiting its parent result.
    pub fn process_receipt(
        &self,
        origin: Identifier,
        receipt: &ExecutionReceipt,
    ) -> Result<bool, EngineError> {
        let result = &receipt.execution_result;
        let result_id = result.id();

        self.receipt_validator
            .validate(receipt)
            .map_err(|e| EngineError::InvalidInput {
                origin,
                reason: format!("invalid receipt {:?}: {e}", receipt.id()),
            })?;

        // the parent result must be known before the receipt is admitted
        let parent_known = match self.results_db.by_id(result.previous_result_id) {
            Ok(_) => true,
            Err(StorageError::NotFound) => false,
            Err(e) => return Err(e.into()),
        };
        if !parent_known {
            self.buffer_pending(receipt);
            tracing::debug!(
                target: "sealing",
                event = "receipt_waiting_for_parent",
                receipt_id = ?receipt.id(),
                parent_result_id = ?result.previous_result_id,
            );
            return Ok(false);
        }

        self.admit_receipt(receipt)?;

        // receipts that were waiting on this result can now be admitted
        self.drain_pending(result_id)?;
        Ok(true)
    }

    fn admit_receipt(&self, receipt: &ExecutionReceipt) -> Result<(), EngineError> {
        let result = &receipt.execution_result;
        let block = self.headers.by_block_id(result.block_id)?;

        self.receipts_db.store(receipt)?;
        self.results_db.store(result)?;
        let added = self.execution_tree.add_receipt(receipt, &block)?;
        tracing::info!(
            target: "sealing",
            event = "receipt_admitted",
            receipt_id = ?receipt.id(),
            result_id = ?result.id(),
            block_id = ?result.block_id,
            newly_added = added,
        );

        // the result pertains to its own block in the current sealing
        // phase
        let incorporated = IncorporatedResult::new(result.block_id, result.clone());
        self.incorporated_results.add(incorporated.clone());
        self.try_to_seal(&incorporated)?;
        Ok(())
    }

    fn buffer_pending(&self, receipt: &ExecutionReceipt) {
        let mut pending = self.pending_receipts.lock();
        let total: usize = pending.values().map(Vec::len).sum();
        if total >= self.config.pending_receipts_capacity {
            // drop the buffer's oldest bucket; the network will re-send
            let victim = pending.keys().next().copied();
            if let Some(victim) = victim {
                pending.remove(&victim);
            }
        }
        let bucket = pending
            .entry(receipt.execution_result.previous_result_id)
            .or_default();
        if bucket.iter().all(|r| r.id() != receipt.id()) {
            bucket.push(receipt.clone());
        }
    }

    fn drain_pending(&self, parent_result_id: Identifier) -> Result<(), EngineError> {
        let ready = self.pending_receipts.lock().remove(&parent_result_id);
        let Some(ready) = ready else { return Ok(()) };
        for receipt in ready {
            self.admit_receipt(&receipt)?;
            self.drain_pending(receipt.execution_result.id())?;
        }
        Ok(())
    }

    /// Ingests one result approval.
    ///
    /// Approvals for unknown results are discarded without error — the
    /// verifier re-sends, or the network re-processes once a matching
    /// receipt arrives.
    pub fn process_approval(
        &self,
        origin: Identifier,
        approval: &ResultApproval,
    ) -> Result<(), EngineError> {
        let result_id = approval.attestation.execution_result_id;
        match self.results_db.by_id(result_id) {
            Ok(_) => {}
            Err(StorageError::NotFound) => {
                tracing::debug!(
                    target: "sealing",
                    event = "approval_for_unknown_result_discarded",
                    result_id = ?result_id,
                    approver = ?approval.approver_id,
                );
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }

        self.approval_validator
            .validate(approval)
            .map_err(|e| EngineError::InvalidInput {
                origin,
                reason: format!("invalid approval {:?}: {e}", approval.id()),
            })?;

        let added = self.approvals.add(approval.clone());
        tracing::debug!(
            target: "sealing",
            event = "approval_admitted",
            result_id = ?result_id,
            chunk_index = approval.attestation.chunk_index,
            approver = ?approval.approver_id,
            newly_added = added,
        );

        for incorporated in self.incorporated_results.all() {
            if incorporated.result.id() == result_id {
                self.try_to_seal(&incorporated)?;
            }
        }
        Ok(())
    }

    /// Attempts to construct a seal for one incorporated result; returns
    /// whether a candidate seal was emitted.
    fn try_to_seal(&self, incorporated: &IncorporatedResult) -> Result<bool, EngineError> {
        let result = &incorporated.result;
        let result_id = result.id();

        let approved = self.has_sufficient_approvals(incorporated)?;
        let sealable = approved || self.emergency_sealable(incorporated)?;
        if !sealable {
            return Ok(false);
        }

        if self.distinct_executors(result_id, result.block_id)? < 2 {
            tracing::debug!(
                target: "sealing",
                event = "seal_deferred_single_executor",
                result_id = ?result_id,
            );
            return Ok(false);
        }

        let final_state = result
            .final_state()
            .map_err(|e| EngineError::Internal(format!("sealable result {result_id:?}: {e}")))?;
        let seal = Seal {
            block_id: result.block_id,
            result_id,
            final_state,
            service_events: result.service_events.clone(),
        };
        let candidate = IncorporatedResultSeal {
            incorporated_result: incorporated.clone(),
            seal,
        };
        let added = self.seals.add(candidate)?;
        if added {
            tracing::info!(
                target: "sealing",
                event = "candidate_seal_emitted",
                result_id = ?result_id,
                block_id = ?result.block_id,
                emergency = !approved,
            );
        }
        Ok(added)
    }

    fn has_sufficient_approvals(
        &self,
        incorporated: &IncorporatedResult,
    ) -> Result<bool, EngineError> {
        let result = &incorporated.result;
        let result_id = result.id();
        let assignment = self
            .assigner
            .assign(incorporated)
            .map_err(|e| EngineError::Internal(format!("assignment failed: {e}")))?;

        for chunk in &result.chunks {
            if result.is_system_chunk(chunk.index) {
                continue;
            }
            let approvers = self.approvals.approvers_for(result_id, chunk.index);
            let assigned = approvers
                .iter()
                .filter(|approver| assignment.is_assigned(chunk.index, **approver))
                .count();
            if assigned < self.config.required_approvals_for_seal_construction {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Emergency sealing keeps the chain live under verifier outages: a
    /// result whose block lags far enough behind finalization is sealed
    /// without approvals.
    fn emergency_sealable(&self, incorporated: &IncorporatedResult) -> Result<bool, EngineError> {
        if !self.config.emergency_sealing_active {
            return Ok(false);
        }
        let block = self.headers.by_block_id(incorporated.result.block_id)?;
        let finalized = self.state.finalized_head()?;
        Ok(finalized.height >= block.height + self.config.emergency_sealing_depth)
    }

    fn distinct_executors(
        &self,
        result_id: Identifier,
        block_id: Identifier,
    ) -> Result<usize, EngineError> {
        let receipts = self.receipts_db.by_block_id(block_id)?;
        let executors: AHashSet<Identifier> = receipts
            .iter()
            .filter(|r| r.execution_result.id() == result_id)
            .map(|r| r.executor_id)
            .collect();
        Ok(executors.len())
    }

    /// Drops state for everything at or below the new sealed height.
    pub fn prune_up_to(&self, sealed_height: u64) -> Result<(), EngineError> {
        self.execution_tree.prune_up_to(sealed_height)?;
        for incorporated in self.incorporated_results.all() {
            let height = match self.headers.by_block_id(incorporated.result.block_id) {
                Ok(header) => header.height,
                Err(StorageError::NotFound) => continue,
                Err(e) => return Err(e.into()),
            };
            if height < sealed_height {
                self.incorporated_results.remove(incorporated.id());
                self.approvals.remove_result(incorporated.result.id());
            }
        }
        Ok(())
    }

    /// Number of incorporated results still awaiting a seal.
    pub fn pending_results(&self) -> usize {
        self.incorporated_results.size()
    }
}
