//! Builder test suite.
//!
//! The harness mirrors the shape used across the kernel's integration
//! tests: a chain `first <- f0..f3 <- final <- a0..a3 <- parent`, where
//! `first` is sealed, every later block incorporates a receipt for its
//! parent's result, and a candidate seal for every unsealed block sits
//! ready for the mempool.

use parking_lot::Mutex;

use cascade_mempool::{ExecutionTreePool, GuaranteePool, SealSet};
use cascade_storage::memory::{MemoryHeaders, MemoryPayloadIndexes, MemoryResults};
use cascade_test_utils::fixtures;
use cascade_test_utils::protocol::StubProtocolState;
use cascade_test_utils::validation::AcceptAll;
use cascade_types::ExecutionResult;

use super::*;

/// Seals storage double: explicit per-block routes with a default,
/// standing in for "the latest seal as of any block is X".
#[derive(Default)]
struct RoutedSeals {
    default: Mutex<Option<Seal>>,
    routes: Mutex<AHashMap<Identifier, Seal>>,
}

impl RoutedSeals {
    fn set_default(&self, seal: Seal) {
        *self.default.lock() = Some(seal);
    }

    fn route(&self, block_id: Identifier, seal: Seal) {
        self.routes.lock().insert(block_id, seal);
    }
}

impl Seals for RoutedSeals {
    fn index(&self, block_id: Identifier, seal: &Seal) -> Result<(), StorageError> {
        self.routes.lock().insert(block_id, seal.clone());
        Ok(())
    }

    fn by_block_id(&self, block_id: Identifier) -> Result<Seal, StorageError> {
        if let Some(seal) = self.routes.lock().get(&block_id) {
            return Ok(seal.clone());
        }
        self.default.lock().clone().ok_or(StorageError::NotFound)
    }
}

struct Suite {
    headers: Arc<MemoryHeaders>,
    indexes: Arc<MemoryPayloadIndexes>,
    results_db: Arc<MemoryResults>,
    seals_db: Arc<RoutedSeals>,
    guarantee_pool: Arc<GuaranteePool>,
    seal_pool: Arc<SealSet>,
    receipt_pool: Arc<ExecutionTreePool>,
    state: Arc<StubProtocolState>,

    blocks: AHashMap<Identifier, Block>,
    result_for_block: AHashMap<Identifier, ExecutionResult>,

    first_id: Identifier,
    final_id: Identifier,
    parent_id: Identifier,
    finalized_ids: Vec<Identifier>,
    pending_ids: Vec<Identifier>,

    /// Candidate seals in result-chain order.
    chain: Vec<Seal>,
    irs_list: Vec<IncorporatedResultSeal>,
    last_seal: Seal,
}

impl Suite {
    fn new() -> Suite {
        let headers = Arc::new(MemoryHeaders::default());
        let indexes = Arc::new(MemoryPayloadIndexes::default());
        let results_db = Arc::new(MemoryResults::default());
        let seals_db = Arc::new(RoutedSeals::default());

        let mut suite = Suite {
            headers,
            indexes,
            results_db,
            seals_db,
            guarantee_pool: Arc::new(GuaranteePool::new()),
            seal_pool: Arc::new(SealSet::new(1_000)),
            receipt_pool: Arc::new(ExecutionTreePool::new(1_000)),
            state: Arc::new(StubProtocolState::new(fixtures::header_fixture())),
            blocks: AHashMap::new(),
            result_for_block: AHashMap::new(),
            first_id: Identifier::ZERO,
            final_id: Identifier::ZERO,
            parent_id: Identifier::ZERO,
            finalized_ids: Vec::new(),
            pending_ids: Vec::new(),
            chain: Vec::new(),
            irs_list: Vec::new(),
            last_seal: Seal {
                block_id: Identifier::ZERO,
                result_id: Identifier::ZERO,
                final_state: Default::default(),
                service_events: vec![],
            },
        };

        // first (sealed) <- f0..f3 <- final <- a0..a3 <- parent
        let first = suite.create_and_record_block(None);
        suite.first_id = first.id();
        let first_result = fixtures::execution_result_fixture(&first, None);
        suite.last_seal = fixtures::seal_fixture(&first_result);
        suite.result_for_block.insert(first.id(), first_result.clone());
        suite.results_db.store(&first_result).unwrap();

        let mut previous = first;
        for _ in 0..4 {
            let finalized = suite.create_and_record_block(Some(previous.id()));
            suite.finalized_ids.push(finalized.id());
            previous = finalized;
        }
        let final_block = suite.create_and_record_block(Some(previous.id()));
        suite.final_id = final_block.id();
        previous = final_block;
        for _ in 0..4 {
            let pending = suite.create_and_record_block(Some(previous.id()));
            suite.pending_ids.push(pending.id());
            previous = pending;
        }
        let parent = suite.create_and_record_block(Some(previous.id()));
        suite.parent_id = parent.id();

        suite.seals_db.set_default(suite.last_seal.clone());
        suite
    }

    fn store_block(&mut self, block: &Block) {
        self.headers.store(&block.header).unwrap();
        self.indexes
            .store(block.id(), &block.payload.index())
            .unwrap();
        self.blocks.insert(block.id(), block.clone());
    }

    /// Creates a block on `parent`, incorporating a receipt for the
    /// parent's result and registering a candidate seal for it (unless
    /// the parent is the already-sealed first block).
    fn create_and_record_block(&mut self, parent: Option<Identifier>) -> Block {
        let mut block = match parent {
            None => fixtures::block_fixture(),
            Some(parent_id) => {
                fixtures::block_with_parent(&self.blocks[&parent_id].header.clone())
            }
        };

        let mut sealable: Option<ExecutionResult> = None;
        if let Some(parent_id) = parent {
            let previous_result = self
                .result_for_block
                .get(&parent_id)
                .expect("missing execution result for parent")
                .clone();
            let receipt = fixtures::receipt_fixture(&previous_result);
            let mut payload = Payload::default();
            payload.receipts.push(receipt.meta());
            payload.results.push(previous_result.clone());
            block.set_payload(payload);

            let result = fixtures::execution_result_fixture(&block, Some(&previous_result));
            self.result_for_block.insert(block.id(), result.clone());
            self.results_db.store(&result).unwrap();

            if parent_id != self.first_id {
                sealable = Some(previous_result);
            }
        }

        self.store_block(&block);
        if let Some(result) = sealable {
            self.chain_seal(&result);
        }
        block
    }

    /// Records the candidate seal for `result`.
    fn chain_seal(&mut self, result: &ExecutionResult) {
        let irs = fixtures::incorporated_result_seal_fixture(result);
        self.chain.push(irs.seal.clone());
        self.irs_list.push(irs);
    }

    fn fill_seal_pool(&self) {
        for irs in &self.irs_list {
            self.seal_pool.add(irs.clone()).unwrap();
        }
    }

    fn builder(&self, config: BuilderConfig) -> Builder {
        Builder::new(
            Arc::clone(&self.state) as Arc<dyn ProtocolState>,
            Arc::clone(&self.headers) as Arc<dyn Headers>,
            Arc::clone(&self.seals_db) as Arc<dyn Seals>,
            Arc::clone(&self.indexes) as Arc<dyn PayloadIndexes>,
            Arc::clone(&self.results_db) as Arc<dyn ExecutionResults>,
            Arc::clone(&self.guarantee_pool) as Arc<dyn Guarantees>,
            Arc::clone(&self.seal_pool) as Arc<dyn IncorporatedResultSeals>,
            Arc::clone(&self.receipt_pool) as Arc<dyn ExecutionTree>,
            Arc::new(AcceptAll) as Arc<dyn ReceiptValidator>,
            config,
        )
    }

    fn config(&self) -> BuilderConfig {
        BuilderConfig {
            expiry: 11,
            ..BuilderConfig::default()
        }
    }

    /// Builds on `parent_id` and returns the payload handed to
    /// `ProtocolState::extend`.
    fn build_on(&self, parent_id: Identifier, config: BuilderConfig) -> Payload {
        let built = self
            .builder(config)
            .build_on(parent_id, |header| {
                header.view = 1337;
                Ok(())
            })
            .expect("build should succeed");
        let extended = self.state.last_extended().expect("extend was called");
        assert_eq!(extended.header.view, 1337, "setter must run on the header");
        assert_eq!(extended.id(), built.id());
        extended.payload
    }
}

#[test]
fn payload_empty_valid() {
    let s = Suite::new();
    let payload = s.build_on(s.parent_id, s.config());
    assert!(payload.guarantees.is_empty(), "no guarantees from empty mempool");
    assert!(payload.seals.is_empty(), "no seals from empty mempool");
    assert!(payload.receipts.is_empty());
    assert!(payload.results.is_empty());
}

#[test]
fn payload_guarantees_valid() {
    let s = Suite::new();
    let guarantees = fixtures::guarantees_fixture(16, s.final_id);
    for g in &guarantees {
        s.guarantee_pool.add(g.clone());
    }
    let payload = s.build_on(s.parent_id, s.config());
    assert_eq!(payload.guarantees, guarantees, "pool order is preserved");
}

#[test]
fn payload_guarantees_duplicates_filtered() {
    let mut s = Suite::new();
    let valid = fixtures::guarantees_fixture(4, s.final_id);
    let duplicated = fixtures::guarantees_fixture(12, s.final_id);

    // spread the duplicates over blocks already on the fork
    let fork_blocks: Vec<Identifier> = s
        .finalized_ids
        .iter()
        .chain(s.pending_ids.iter())
        .copied()
        .collect();
    for (i, guarantee) in duplicated.iter().enumerate() {
        let block_id = fork_blocks[i % fork_blocks.len()];
        let mut index = s.indexes.by_block_id(block_id).unwrap();
        index.collection_ids.push(guarantee.id());
        s.indexes.store(block_id, &index).unwrap();
        // keep the local copy coherent
        let block = s.blocks.get_mut(&block_id).unwrap();
        block.payload.guarantees.push(guarantee.clone());
    }

    for g in valid.iter().chain(duplicated.iter()) {
        s.guarantee_pool.add(g.clone());
    }
    let payload = s.build_on(s.parent_id, s.config());
    assert_eq!(payload.guarantees, valid, "incorporated guarantees are dropped");
}

#[test]
fn payload_guarantees_unknown_reference_filtered() {
    let s = Suite::new();
    let valid = fixtures::guarantees_fixture(12, s.final_id);
    let unknown = fixtures::guarantees_fixture(4, fixtures::identifier_fixture());
    for g in valid.iter().chain(unknown.iter()) {
        s.guarantee_pool.add(g.clone());
    }
    let payload = s.build_on(s.parent_id, s.config());
    assert_eq!(payload.guarantees, valid);
}

#[test]
fn payload_guarantees_expired_reference_filtered() {
    let mut s = Suite::new();
    let valid = fixtures::guarantees_fixture(12, s.final_id);

    // a reference block deeper than the expiry window
    let final_height = s.blocks[&s.final_id].header.height;
    let mut old = fixtures::header_fixture();
    old.height = final_height - 12;
    s.headers.store(&old).unwrap();
    let expired = fixtures::guarantees_fixture(4, old.id());

    for g in valid.iter().chain(expired.iter()) {
        s.guarantee_pool.add(g.clone());
    }
    let payload = s.build_on(s.parent_id, s.config());
    assert_eq!(payload.guarantees, valid);
}

#[test]
fn payload_seals_all_valid() {
    let s = Suite::new();
    s.fill_seal_pool();
    let payload = s.build_on(s.parent_id, s.config());
    assert!(payload.guarantees.is_empty());
    assert_eq!(payload.seals, s.chain, "the whole seal chain is included in order");
}

#[test]
fn payload_seals_capped_at_max_seal_count() {
    let s = Suite::new();
    s.fill_seal_pool();
    let config = BuilderConfig {
        max_seal_count: 2,
        ..s.config()
    };
    let payload = s.build_on(s.parent_id, config);
    assert_eq!(payload.seals, s.chain[..2].to_vec());
}

#[test]
fn payload_seals_only_current_fork() {
    let mut s = Suite::new();
    // a competing fork off the finalized block: final <- b0..b7
    let mut fork_head = s.final_id;
    for _ in 0..8 {
        fork_head = s.create_and_record_block(Some(fork_head)).id();
    }
    s.fill_seal_pool();

    let payload = s.build_on(fork_head, s.config());
    assert_eq!(payload.seals.len(), 12, "f0..f3 plus the fork's own chain");
    assert_eq!(&payload.seals[..4], &s.chain[..4]);
    assert_eq!(&payload.seals[4..], &s.chain[s.chain.len() - 8..]);
}

#[test]
fn payload_seals_skip_already_sealed() {
    let s = Suite::new();
    // pretend blocks f0..f3 are already sealed
    s.seals_db.set_default(s.chain[3].clone());
    s.fill_seal_pool();
    let payload = s.build_on(s.parent_id, s.config());
    assert_eq!(payload.seals, s.chain[4..].to_vec());
}

#[test]
fn payload_seals_missing_next_seal_stops_chain() {
    let s = Suite::new();
    for (i, irs) in s.irs_list.iter().enumerate() {
        if i != 0 {
            s.seal_pool.add(irs.clone()).unwrap();
        }
    }
    let payload = s.build_on(s.parent_id, s.config());
    assert!(payload.seals.is_empty(), "chain cannot start without the next seal");
}

#[test]
fn payload_seals_missing_interim_seal_truncates_chain() {
    let s = Suite::new();
    for (i, irs) in s.irs_list.iter().enumerate() {
        if i != 3 {
            s.seal_pool.add(irs.clone()).unwrap();
        }
    }
    let payload = s.build_on(s.parent_id, s.config());
    assert_eq!(payload.seals, s.chain[..3].to_vec());
}

#[test]
fn payload_seals_avoid_execution_forks() {
    let mut s = Suite::new();
    // F <- A <- B <- C <- D, with two competing execution chains over the
    // segment: the roots of both chains claim to execute F, but only the
    // first one gets sealed (in block D).
    let block_f = s.blocks[&s.final_id].clone();
    let res_f1 = fixtures::execution_result_fixture(&block_f, None);
    let res_f2 = fixtures::execution_result_fixture(&block_f, None);

    // each block incorporates the receipts for its parent from both
    // execution chains; blocks are finalized in order so every payload
    // only references already-fixed IDs
    let incorporate = |results: &[&ExecutionResult]| {
        let mut payload = Payload::default();
        for result in results {
            payload.receipts.push(fixtures::receipt_fixture(result).meta());
            payload.results.push((*result).clone());
        }
        payload
    };
    let mut block_a = fixtures::block_with_parent(&block_f.header);
    block_a.set_payload(incorporate(&[&res_f1, &res_f2]));

    let res_a1 = fixtures::execution_result_fixture(&block_a, Some(&res_f1));
    let res_a2 = fixtures::execution_result_fixture(&block_a, Some(&res_f2));
    let mut block_b = fixtures::block_with_parent(&block_a.header);
    block_b.set_payload(incorporate(&[&res_a1, &res_a2]));

    let res_b1 = fixtures::execution_result_fixture(&block_b, Some(&res_a1));
    let res_b2 = fixtures::execution_result_fixture(&block_b, Some(&res_a2));
    let mut block_c = fixtures::block_with_parent(&block_b.header);
    block_c.set_payload(incorporate(&[&res_b1, &res_b2]));

    // block D seals the first chain's root result
    let seal_f = fixtures::seal_fixture(&res_f1);
    let mut block_d = fixtures::block_with_parent(&block_c.header);
    let mut payload_d = Payload::default();
    payload_d.seals.push(seal_f.clone());
    block_d.set_payload(payload_d);

    for block in [&block_a, &block_b, &block_c, &block_d] {
        let block = (*block).clone();
        s.store_block(&block);
    }
    s.seals_db.set_default(seal_f);
    s.results_db.store(&res_f1).unwrap();

    let config = BuilderConfig {
        expiry: 4,
        ..s.config()
    };

    // a seal for the conflicting execution fork never chains up
    s.seal_pool
        .add(fixtures::incorporated_result_seal_fixture(&res_a2))
        .unwrap();
    let payload = s.build_on(block_d.id(), config.clone());
    assert!(
        payload.seals.is_empty(),
        "conflicting execution fork must not be sealed"
    );

    // with candidates from both execution forks, only the sealed chain
    // extends
    let irs_a1 = fixtures::incorporated_result_seal_fixture(&res_a1);
    let irs_b1 = fixtures::incorporated_result_seal_fixture(&res_b1);
    s.seal_pool.add(irs_a1.clone()).unwrap();
    s.seal_pool.add(irs_b1.clone()).unwrap();
    s.seal_pool
        .add(fixtures::incorporated_result_seal_fixture(&res_b2))
        .unwrap();
    let payload = s.build_on(block_d.id(), config);
    assert_eq!(payload.seals, vec![irs_a1.seal, irs_b1.seal]);
}

#[test]
fn payload_receipts_as_provided_by_the_execution_tree() {
    let s = Suite::new();
    // receipts chained from the sealed result across the fork's blocks
    let sealed_result = s.result_for_block[&s.first_id].clone();
    let fork_blocks: Vec<Block> = s
        .finalized_ids
        .iter()
        .map(|id| s.blocks[id].clone())
        .collect();
    let receipts = fixtures::receipt_chain_for(&fork_blocks, &sealed_result);
    for receipt in &receipts {
        let header = &s.blocks[&receipt.execution_result.block_id].header;
        s.receipt_pool.add_receipt(receipt, header).unwrap();
    }

    let payload = s.build_on(s.parent_id, s.config());
    let expected_metas: Vec<_> = receipts.iter().map(ExecutionReceipt::meta).collect();
    let expected_results: Vec<_> = receipts
        .iter()
        .map(|r| r.execution_result.clone())
        .collect();
    assert_eq!(payload.receipts, expected_metas);
    assert_eq!(payload.results, expected_results);
}

#[test]
fn payload_receipts_capped_at_max_receipt_count() {
    let s = Suite::new();
    let sealed_result = s.result_for_block[&s.first_id].clone();
    let fork_blocks: Vec<Block> = s
        .finalized_ids
        .iter()
        .chain(s.pending_ids.iter().take(1))
        .map(|id| s.blocks[id].clone())
        .collect();
    let receipts = fixtures::receipt_chain_for(&fork_blocks, &sealed_result);
    assert_eq!(receipts.len(), 5);
    for receipt in &receipts {
        let header = &s.blocks[&receipt.execution_result.block_id].header;
        s.receipt_pool.add_receipt(receipt, header).unwrap();
    }

    let config = BuilderConfig {
        max_receipt_count: 3,
        ..s.config()
    };
    let payload = s.build_on(s.parent_id, config);
    assert_eq!(payload.receipts.len(), 3);
    assert_eq!(payload.results.len(), 3);
    let expected_metas: Vec<_> = receipts[..3].iter().map(ExecutionReceipt::meta).collect();
    assert_eq!(payload.receipts, expected_metas);
}

#[test]
fn payload_receipts_skip_receipts_for_sealed_block() {
    let s = Suite::new();
    // a competing receipt for the sealed block itself
    let sealed_result = s.result_for_block[&s.first_id].clone();
    let receipt = fixtures::receipt_fixture(&sealed_result);
    let header = &s.blocks[&s.first_id].header;
    s.receipt_pool.add_receipt(&receipt, header).unwrap();

    let payload = s.build_on(s.parent_id, s.config());
    assert!(
        payload.receipts.is_empty(),
        "receipts for the sealed block are never included"
    );
}

#[test]
fn payload_receipts_skip_duplicates_on_fork() {
    let s = Suite::new();
    // re-offer receipts that the fork's blocks already incorporate
    for block_id in s.finalized_ids.iter().chain(s.pending_ids.iter()) {
        let block = &s.blocks[block_id];
        let results = block.payload.results_by_id();
        for meta in &block.payload.receipts {
            let result = results[&meta.result_id];
            let receipt =
                cascade_types::ExecutionReceipt::from_meta(meta.clone(), (*result).clone());
            let header = &s.blocks[&receipt.execution_result.block_id].header;
            s.receipt_pool.add_receipt(&receipt, header).unwrap();
        }
    }

    let payload = s.build_on(s.parent_id, s.config());
    assert!(
        payload.receipts.is_empty(),
        "already incorporated receipts must not re-appear"
    );
    assert!(payload.results.is_empty());
}

#[test]
fn payload_receipts_require_connected_parent_result() {
    let s = Suite::new();
    // receipts for consecutive fork blocks, with the middle one withheld
    let sealed_result = s.result_for_block[&s.first_id].clone();
    let fork_blocks: Vec<Block> = s
        .finalized_ids
        .iter()
        .map(|id| s.blocks[id].clone())
        .collect();
    let receipts = fixtures::receipt_chain_for(&fork_blocks, &sealed_result);
    for (i, receipt) in receipts.iter().enumerate() {
        if i == 1 {
            continue; // the gap
        }
        let header = &s.blocks[&receipt.execution_result.block_id].header;
        s.receipt_pool.add_receipt(receipt, header).unwrap();
    }

    let payload = s.build_on(s.parent_id, s.config());
    let expected: Vec<_> = receipts[..1].iter().map(ExecutionReceipt::meta).collect();
    assert_eq!(
        payload.receipts, expected,
        "receipts beyond the gap are not connected to the sealed result"
    );
}

#[test]
fn payload_receipts_extend_multiple_execution_forks() {
    let s = Suite::new();
    // two competing results for the first unsealed block, each extended
    // over the next block
    let sealed_result = s.result_for_block[&s.first_id].clone();
    let block_a = s.blocks[&s.finalized_ids[0]].clone();
    let block_b = s.blocks[&s.finalized_ids[1]].clone();

    let res_a1 = fixtures::execution_result_fixture(&block_a, Some(&sealed_result));
    let res_a2 = fixtures::execution_result_fixture(&block_a, Some(&sealed_result));
    let rec_a1 = fixtures::receipt_fixture(&res_a1);
    let rec_a2 = fixtures::receipt_fixture(&res_a2);
    let res_b1 = fixtures::execution_result_fixture(&block_b, Some(&res_a1));
    let res_b2 = fixtures::execution_result_fixture(&block_b, Some(&res_a2));
    let rec_b1 = fixtures::receipt_fixture(&res_b1);
    let rec_b2 = fixtures::receipt_fixture(&res_b2);

    for (receipt, block) in [
        (&rec_a1, &block_a),
        (&rec_a2, &block_a),
        (&rec_b1, &block_b),
        (&rec_b2, &block_b),
    ] {
        s.receipt_pool.add_receipt(receipt, &block.header).unwrap();
    }

    let payload = s.build_on(s.parent_id, s.config());
    assert_eq!(
        payload.receipts.len(),
        4,
        "both execution paths are extended"
    );
    assert_eq!(payload.results.len(), 4);
    for receipt in [&rec_a1, &rec_a2, &rec_b1, &rec_b2] {
        assert!(payload.receipts.contains(&receipt.meta()));
    }
}

#[test]
fn payload_receipts_meta_only_for_already_incorporated_results() {
    let s = Suite::new();
    // a second executor's receipt for a result a fork block already
    // incorporates: block f1 carries the result executing f0, which
    // chains directly onto the sealed result
    let carrier = s.blocks[&s.finalized_ids[1]].clone();
    let incorporated_result = carrier.payload.results[0].clone();
    assert_eq!(incorporated_result.block_id, s.finalized_ids[0]);
    let second_receipt = fixtures::receipt_fixture(&incorporated_result);
    let executed_header = s.blocks[&incorporated_result.block_id].header.clone();
    s.receipt_pool
        .add_receipt(&second_receipt, &executed_header)
        .unwrap();

    let payload = s.build_on(s.parent_id, s.config());
    assert_eq!(payload.receipts, vec![second_receipt.meta()]);
    assert!(
        payload.results.is_empty(),
        "the result is already on the fork and must not ride along again"
    );
}

#[test]
fn build_on_unknown_parent_fails() {
    let s = Suite::new();
    let err = s
        .builder(s.config())
        .build_on(fixtures::identifier_fixture(), |_| Ok(()))
        .unwrap_err();
    assert!(matches!(err, BuilderError::MissingAncestor(_)));
}

#[test]
fn failing_setter_aborts_the_build() {
    let s = Suite::new();
    let err = s
        .builder(s.config())
        .build_on(s.parent_id, |_| Err("no signing key".to_string()))
        .unwrap_err();
    assert!(matches!(err, BuilderError::Setter(_)));
    assert!(s.state.last_extended().is_none(), "extend must not run");
}

#[test]
fn failing_extension_surfaces_as_build_error() {
    let s = Suite::new();
    s.state.fail_extensions("candidate conflicts with finality");
    let err = s
        .builder(s.config())
        .build_on(s.parent_id, |_| Ok(()))
        .unwrap_err();
    assert!(matches!(err, BuilderError::Extend(_)));
}

#[test]
fn payload_hash_commits_to_the_assembled_payload() {
    let s = Suite::new();
    s.fill_seal_pool();
    let payload = s.build_on(s.parent_id, s.config());
    let extended = s.state.last_extended().unwrap();
    assert_eq!(extended.header.payload_hash, payload.hash());
}

#[test]
fn receipts_for_unrelated_forks_are_filtered() {
    let mut s = Suite::new();
    // a side block off the finalized block, not on the build fork, whose
    // result chains directly onto the sealed result
    let side = fixtures::block_with_parent(&s.blocks[&s.final_id].header.clone());
    s.store_block(&side);
    let sealed_result = s.result_for_block[&s.first_id].clone();
    let side_result = fixtures::execution_result_fixture(&side, Some(&sealed_result));
    let receipt = fixtures::receipt_fixture(&side_result);
    s.receipt_pool
        .add_receipt(&receipt, &side.header)
        .unwrap();

    let payload = s.build_on(s.parent_id, s.config());
    assert!(
        !payload.receipts.contains(&receipt.meta()),
        "receipts executed on a sibling fork must not leak in"
    );
}
