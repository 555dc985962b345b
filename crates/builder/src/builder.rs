//! Candidate payload assembly.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use ahash::{AHashMap, AHashSet};

use cascade_api::mempool::{ExecutionTree, Guarantees, IncorporatedResultSeals};
use cascade_api::protocol::ProtocolState;
use cascade_api::storage::{ExecutionResults, Headers, PayloadIndexes, Seals};
use cascade_api::validation::ReceiptValidator;
use cascade_types::error::{BuilderError, StorageError};
use cascade_types::{
    Block, CollectionGuarantee, ExecutionReceipt, Header, Identifier, IncorporatedResultSeal,
    Payload, Seal,
};

/// Builder tunables.
#[derive(Debug, Clone)]
pub struct BuilderConfig {
    /// Height window within which a guarantee's reference block must lie,
    /// and within which collection dedup is enforced.
    pub expiry: u64,
    /// Maximum number of seals per payload.
    pub max_seal_count: usize,
    /// Maximum number of receipts per payload.
    pub max_receipt_count: usize,
    /// The root height of the protocol state; fork walks never descend
    /// below it.
    pub root_height: u64,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        BuilderConfig {
            expiry: 600,
            max_seal_count: 100,
            max_receipt_count: 200,
            root_height: 0,
        }
    }
}

/// Assembles candidate blocks for the consensus leader.
pub struct Builder {
    state: Arc<dyn ProtocolState>,
    headers: Arc<dyn Headers>,
    seals_db: Arc<dyn Seals>,
    indexes: Arc<dyn PayloadIndexes>,
    results_db: Arc<dyn ExecutionResults>,
    guarantee_pool: Arc<dyn Guarantees>,
    seal_pool: Arc<dyn IncorporatedResultSeals>,
    receipt_pool: Arc<dyn ExecutionTree>,
    receipt_validator: Arc<dyn ReceiptValidator>,
    config: BuilderConfig,
}

/// Everything the fork walk learned about the segment between the latest
/// sealed block and the parent.
struct ForkContext {
    last_seal: Seal,
    sealed_result_id: Identifier,
    /// Blocks of the unsealed segment, sealed block inclusive.
    fork_blocks: AHashSet<Identifier>,
    /// Receipts already incorporated on the segment.
    fork_receipts: AHashSet<Identifier>,
    /// Results already incorporated on the segment.
    fork_results: AHashSet<Identifier>,
    /// Collections guaranteed within the expiry horizon.
    fork_collections: AHashSet<Identifier>,
    /// Lowest height a guarantee reference may have.
    expiry_limit: u64,
}

impl Builder {
    /// Wires a builder from its collaborators.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        state: Arc<dyn ProtocolState>,
        headers: Arc<dyn Headers>,
        seals_db: Arc<dyn Seals>,
        indexes: Arc<dyn PayloadIndexes>,
        results_db: Arc<dyn ExecutionResults>,
        guarantee_pool: Arc<dyn Guarantees>,
        seal_pool: Arc<dyn IncorporatedResultSeals>,
        receipt_pool: Arc<dyn ExecutionTree>,
        receipt_validator: Arc<dyn ReceiptValidator>,
        config: BuilderConfig,
    ) -> Builder {
        Builder {
            state,
            headers,
            seals_db,
            indexes,
            results_db,
            guarantee_pool,
            seal_pool,
            receipt_pool,
            receipt_validator,
            config,
        }
    }

    /// Builds a candidate block on the fork ending at `parent_id`.
    ///
    /// The caller's `setter` fills in the consensus fields of the header
    /// (view, signatures); the builder owns chain ID, height, parent,
    /// timestamp, and the payload hash. The assembled block is handed to
    /// `ProtocolState::extend` exactly once before it is returned.
    pub fn build_on(
        &self,
        parent_id: Identifier,
        setter: impl FnOnce(&mut Header) -> Result<(), String>,
    ) -> Result<Block, BuilderError> {
        let parent = self
            .headers
            .by_block_id(parent_id)
            .map_err(|_| BuilderError::MissingAncestor(parent_id))?;

        let fork = self.walk_fork(parent_id, &parent)?;
        let guarantees = self.select_guarantees(&fork)?;
        let seals = self.select_seals(&fork);
        let (receipts, results) = self.select_receipts(&fork)?;

        tracing::debug!(
            target: "builder",
            event = "payload_assembled",
            parent_id = ?parent_id,
            guarantees = guarantees.len(),
            receipts = receipts.len(),
            results = results.len(),
            seals = seals.len(),
        );

        let payload = Payload {
            guarantees,
            receipts: receipts.iter().map(ExecutionReceipt::meta).collect(),
            results,
            seals,
        };

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
            .max(parent.timestamp + 1);

        let mut header = Header {
            chain_id: parent.chain_id.clone(),
            parent_id,
            height: parent.height + 1,
            view: 0,
            payload_hash: payload.hash(),
            timestamp,
            proposer_id: Identifier::ZERO,
            parent_voter_ids: Vec::new(),
            parent_voter_sig: Vec::new(),
            proposer_sig: Vec::new(),
        };
        setter(&mut header).map_err(BuilderError::Setter)?;

        let block = Block { header, payload };
        self.state
            .extend(&block)
            .map_err(|e| BuilderError::Extend(e.to_string()))?;
        Ok(block)
    }

    /// Walks the fork backwards from the parent, collecting the dedup
    /// horizons. Any storage failure aborts the build.
    fn walk_fork(&self, parent_id: Identifier, parent: &Header) -> Result<ForkContext, BuilderError> {
        let last_seal = self.seals_db.by_block_id(parent_id)?;
        let sealed_result = self
            .results_db
            .by_id(last_seal.result_id)
            .map_err(|_| BuilderError::MissingSealedResult(last_seal.result_id))?;
        let sealed_block = self.headers.by_block_id(last_seal.block_id)?;

        // the unsealed segment: parent down to the sealed block inclusive
        let mut fork_blocks = AHashSet::new();
        let mut fork_receipts = AHashSet::new();
        let mut fork_results = AHashSet::new();
        let mut ancestor_id = parent_id;
        loop {
            let ancestor = self
                .headers
                .by_block_id(ancestor_id)
                .map_err(|_| BuilderError::MissingAncestor(ancestor_id))?;
            if ancestor.height < sealed_block.height {
                break;
            }
            fork_blocks.insert(ancestor_id);
            let index = self.indexes.by_block_id(ancestor_id)?;
            fork_receipts.extend(index.receipt_ids);
            fork_results.extend(index.result_ids);
            if ancestor_id == last_seal.block_id || ancestor.height == 0 {
                break;
            }
            ancestor_id = ancestor.parent_id;
        }

        // the guarantee horizon: the last `expiry` heights below the
        // candidate, clamped at the root
        let candidate_height = parent.height + 1;
        let expiry_limit = candidate_height
            .saturating_sub(self.config.expiry)
            .max(self.config.root_height);
        let mut fork_collections = AHashSet::new();
        let mut ancestor_id = parent_id;
        loop {
            let ancestor = self
                .headers
                .by_block_id(ancestor_id)
                .map_err(|_| BuilderError::MissingAncestor(ancestor_id))?;
            if ancestor.height < expiry_limit {
                break;
            }
            let index = self.indexes.by_block_id(ancestor_id)?;
            fork_collections.extend(index.collection_ids);
            if ancestor.height <= expiry_limit || ancestor.height == 0 {
                break;
            }
            ancestor_id = ancestor.parent_id;
        }

        Ok(ForkContext {
            last_seal,
            sealed_result_id: sealed_result.id(),
            fork_blocks,
            fork_receipts,
            fork_results,
            fork_collections,
            expiry_limit,
        })
    }

    /// Guarantees from the pool whose reference block is known, recent
    /// enough, and whose collection is not yet on the fork. Pool order is
    /// preserved.
    fn select_guarantees(
        &self,
        fork: &ForkContext,
    ) -> Result<Vec<CollectionGuarantee>, BuilderError> {
        let mut selected = Vec::new();
        for guarantee in self.guarantee_pool.all() {
            let reference = match self.headers.by_block_id(guarantee.reference_block_id) {
                Ok(header) => header,
                Err(StorageError::NotFound) => continue,
                Err(e) => return Err(e.into()),
            };
            if reference.height < fork.expiry_limit {
                continue;
            }
            if fork.fork_collections.contains(&guarantee.id()) {
                continue;
            }
            selected.push(guarantee);
        }
        Ok(selected)
    }

    /// Seals extending the fork's latest seal, walking forward along the
    /// execution-result chain until the first gap. Only candidates whose
    /// sealed block lies on this fork qualify; conflicting execution
    /// forks never match the chain and are skipped by construction.
    fn select_seals(&self, fork: &ForkContext) -> Vec<Seal> {
        let mut by_previous: AHashMap<Identifier, Vec<IncorporatedResultSeal>> = AHashMap::new();
        for candidate in self.seal_pool.all() {
            by_previous
                .entry(candidate.incorporated_result.result.previous_result_id)
                .or_default()
                .push(candidate);
        }

        let mut seals = Vec::new();
        let mut last_result_id = fork.sealed_result_id;
        while seals.len() < self.config.max_seal_count {
            let Some(candidates) = by_previous.get(&last_result_id) else {
                break;
            };
            let next = candidates.iter().find_map(|candidate| {
                if !fork.fork_blocks.contains(&candidate.seal.block_id) {
                    return None;
                }
                // re-fetch by ID so pool-level admission gates apply
                self.seal_pool.by_id(candidate.id())
            });
            let Some(next) = next else { break };
            last_result_id = next.incorporated_result.result.id();
            seals.push(next.seal);
        }
        seals
    }

    /// Receipts reachable from the latest sealed result, restricted to
    /// this fork, deduplicated against already-incorporated receipts,
    /// and validated. Full results ride along the first time their
    /// result appears on the fork.
    fn select_receipts(
        &self,
        fork: &ForkContext,
    ) -> Result<(Vec<ExecutionReceipt>, Vec<cascade_types::ExecutionResult>), BuilderError> {
        // seed the search root: the sealed result is always in the tree
        let sealed_result = self
            .results_db
            .by_id(fork.last_seal.result_id)
            .map_err(|_| BuilderError::MissingSealedResult(fork.last_seal.result_id))?;
        let sealed_header = self.headers.by_block_id(fork.last_seal.block_id)?;
        self.receipt_pool.add_result(&sealed_result, &sealed_header)?;

        let fork_blocks = &fork.fork_blocks;
        let block_filter = move |header: &Header| fork_blocks.contains(&header.id());

        let sealed_block_id = fork.last_seal.block_id;
        let fork_receipts = &fork.fork_receipts;
        let validator = Arc::clone(&self.receipt_validator);
        let receipt_filter = move |receipt: &ExecutionReceipt| {
            if receipt.execution_result.block_id == sealed_block_id {
                return false;
            }
            if fork_receipts.contains(&receipt.id()) {
                return false;
            }
            validator.validate(receipt).is_ok()
        };

        let mut receipts = self.receipt_pool.reachable_receipts(
            fork.sealed_result_id,
            &block_filter,
            &receipt_filter,
        )?;
        receipts.truncate(self.config.max_receipt_count);

        let mut included = fork.fork_results.clone();
        included.insert(fork.sealed_result_id);
        let mut results = Vec::new();
        for receipt in &receipts {
            let result_id = receipt.execution_result.id();
            if included.insert(result_id) {
                results.push(receipt.execution_result.clone());
            }
        }
        Ok((receipts, results))
    }
}

#[cfg(test)]
mod tests;
