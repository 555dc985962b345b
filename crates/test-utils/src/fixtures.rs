//! Entity fixtures for reproducible tests.
//!
//! Every fixture returns a structurally valid entity with randomized
//! identity so collisions between unrelated fixtures are impossible.
//! Chained helpers (`block_with_parent`, `receipt_chain_for`) keep the
//! invariants the kernel relies on: heights increase by one, chunk state
//! commitments chain, and receipts reference their parent results.

use cascade_types::{
    Attestation, Block, Chunk, Collection, CollectionGuarantee, ExecutionReceipt, ExecutionResult,
    Header, Identifier, IncorporatedResult, IncorporatedResultSeal, Payload, ResultApproval, Seal,
    StateCommitment, TransactionBody,
};

/// A random identifier.
pub fn identifier_fixture() -> Identifier {
    Identifier(rand::random())
}

/// A random state commitment.
pub fn state_commitment_fixture() -> StateCommitment {
    StateCommitment(rand::random())
}

/// A root header at a random height.
pub fn header_fixture() -> Header {
    let payload = Payload::default();
    Header {
        chain_id: "cascade-test".to_string(),
        parent_id: identifier_fixture(),
        height: rand::random::<u32>() as u64 + 100,
        view: rand::random::<u32>() as u64 + 100,
        payload_hash: payload.hash(),
        timestamp: 1_600_000_000_000,
        proposer_id: identifier_fixture(),
        parent_voter_ids: vec![identifier_fixture()],
        parent_voter_sig: b"voter-sig".to_vec(),
        proposer_sig: b"proposer-sig".to_vec(),
    }
}

/// A header extending `parent` by one height.
pub fn header_with_parent(parent: &Header) -> Header {
    let payload = Payload::default();
    Header {
        chain_id: parent.chain_id.clone(),
        parent_id: parent.id(),
        height: parent.height + 1,
        view: parent.view + 1 + rand::random::<u8>() as u64 % 3,
        payload_hash: payload.hash(),
        timestamp: parent.timestamp + 1_000,
        proposer_id: identifier_fixture(),
        parent_voter_ids: vec![identifier_fixture()],
        parent_voter_sig: b"voter-sig".to_vec(),
        proposer_sig: b"proposer-sig".to_vec(),
    }
}

/// A root block with an empty payload.
pub fn block_fixture() -> Block {
    Block {
        header: header_fixture(),
        payload: Payload::default(),
    }
}

/// A block extending `parent` with an empty payload.
pub fn block_with_parent(parent: &Header) -> Block {
    Block {
        header: header_with_parent(parent),
        payload: Payload::default(),
    }
}

/// A chain of `count` empty blocks extending `parent`.
pub fn chain_fixture(count: usize, parent: &Header) -> Vec<Block> {
    let mut chain = Vec::with_capacity(count);
    let mut previous = parent.clone();
    for _ in 0..count {
        let block = block_with_parent(&previous);
        previous = block.header.clone();
        chain.push(block);
    }
    chain
}

/// A transaction with a random script.
pub fn transaction_fixture() -> TransactionBody {
    TransactionBody {
        script: identifier_fixture().0.to_vec(),
        arguments: vec![],
    }
}

/// A collection with `count` random transactions.
pub fn collection_fixture(count: usize) -> Collection {
    Collection {
        transactions: (0..count).map(|_| transaction_fixture()).collect(),
    }
}

/// A guarantee referencing `reference_block_id`.
pub fn guarantee_with_reference(reference_block_id: Identifier) -> CollectionGuarantee {
    CollectionGuarantee {
        collection_id: identifier_fixture(),
        reference_block_id,
        signer_ids: vec![identifier_fixture()],
        signature: b"guarantee-sig".to_vec(),
    }
}

/// `count` guarantees referencing `reference_block_id`.
pub fn guarantees_fixture(count: usize, reference_block_id: Identifier) -> Vec<CollectionGuarantee> {
    (0..count)
        .map(|_| guarantee_with_reference(reference_block_id))
        .collect()
}

/// A chunk at `index` within `block_id`, chaining `start` to a random
/// end state.
pub fn chunk_fixture(block_id: Identifier, index: u64, start: StateCommitment) -> Chunk {
    Chunk {
        index,
        collection_index: index,
        start_state: start,
        event_collection: identifier_fixture(),
        block_id,
        total_computation_used: 7,
        number_of_transactions: 1,
        end_state: state_commitment_fixture(),
    }
}

/// An execution result for `block`, chained onto `previous` when given.
/// Chunk state commitments chain correctly and the final chunk plays the
/// system chunk.
pub fn execution_result_fixture(
    block: &Block,
    previous: Option<&ExecutionResult>,
) -> ExecutionResult {
    let start = previous
        .map(|p| p.final_state().expect("fixture results have chunks"))
        .unwrap_or_else(state_commitment_fixture);
    let block_id = block.id();
    let first = chunk_fixture(block_id, 0, start);
    let second = chunk_fixture(block_id, 1, first.end_state);
    ExecutionResult {
        previous_result_id: previous.map(|p| p.id()).unwrap_or_else(identifier_fixture),
        block_id,
        chunks: vec![first, second],
        service_events: vec![],
    }
}

/// A receipt for `result` from a random executor.
pub fn receipt_fixture(result: &ExecutionResult) -> ExecutionReceipt {
    receipt_from_executor(result, identifier_fixture())
}

/// A receipt for `result` from the given executor.
pub fn receipt_from_executor(result: &ExecutionResult, executor_id: Identifier) -> ExecutionReceipt {
    ExecutionReceipt {
        executor_id,
        execution_result: result.clone(),
        spocks: result.chunks.iter().map(|c| c.id().0.to_vec()).collect(),
        executor_signature: b"executor-sig".to_vec(),
    }
}

/// A receipt for `block` with a random (unchained) result.
pub fn receipt_for_block(block: &Block) -> ExecutionReceipt {
    receipt_fixture(&execution_result_fixture(block, None))
}

/// One receipt per block, each chained onto the previous receipt's
/// result, starting from `seed`.
pub fn receipt_chain_for(blocks: &[Block], seed: &ExecutionResult) -> Vec<ExecutionReceipt> {
    let mut receipts = Vec::with_capacity(blocks.len());
    let mut previous = seed.clone();
    for block in blocks {
        let result = execution_result_fixture(block, Some(&previous));
        previous = result.clone();
        receipts.push(receipt_fixture(&result));
    }
    receipts
}

/// A seal for `result`.
pub fn seal_fixture(result: &ExecutionResult) -> Seal {
    Seal {
        block_id: result.block_id,
        result_id: result.id(),
        final_state: result.final_state().expect("fixture results have chunks"),
        service_events: result.service_events.clone(),
    }
}

/// A candidate seal for `result`, incorporated at the result's own block.
pub fn incorporated_result_seal_fixture(result: &ExecutionResult) -> IncorporatedResultSeal {
    IncorporatedResultSeal {
        seal: seal_fixture(result),
        incorporated_result: IncorporatedResult::new(result.block_id, result.clone()),
    }
}

/// An approval for one chunk of `result` from the given verifier.
pub fn approval_fixture(
    result: &ExecutionResult,
    chunk_index: u64,
    approver_id: Identifier,
) -> ResultApproval {
    ResultApproval {
        attestation: Attestation {
            block_id: result.block_id,
            execution_result_id: result.id(),
            chunk_index,
        },
        approver_id,
        attestation_signature: b"attestation-sig".to_vec(),
        spock: b"spock".to_vec(),
        verifier_signature: b"verifier-sig".to_vec(),
    }
}
