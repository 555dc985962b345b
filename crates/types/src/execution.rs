//! Execution results, receipts, and chunks.

use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};

use crate::error::EntityError;
use crate::identifier::{Identifier, StateCommitment};

/// A contiguous span of a block's execution, bracketed by register state
/// commitments.
///
/// Chunks of a result chain: `chunks[i + 1].start_state` equals
/// `chunks[i].end_state`, and the first chunk starts at the previous
/// result's final state. The last chunk of every result is the system
/// chunk.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct Chunk {
    /// Index of this chunk within its result.
    pub index: u64,
    /// Index of the collection executed by this chunk.
    pub collection_index: u64,
    /// The register state before executing the chunk.
    pub start_state: StateCommitment,
    /// Commitment to the events emitted by the chunk.
    pub event_collection: Identifier,
    /// The block this chunk belongs to.
    pub block_id: Identifier,
    /// Total computation spent by the chunk.
    pub total_computation_used: u64,
    /// Number of transactions in the chunk.
    pub number_of_transactions: u64,
    /// The register state after executing the chunk.
    pub end_state: StateCommitment,
}

impl Chunk {
    /// The identifier of this chunk.
    pub fn id(&self) -> Identifier {
        Identifier::of(self)
    }
}

/// The kind of a protocol-level service event.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub enum ServiceEventKind {
    /// Configuration of an upcoming epoch.
    EpochSetup,
    /// Commitment of an upcoming epoch.
    EpochCommit,
}

/// A protocol-level event emitted by the service account during execution
/// and carried through receipts into seals.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct ServiceEvent {
    /// The kind of event.
    pub kind: ServiceEventKind,
    /// The encoded event payload; opaque to the kernel.
    pub payload: Vec<u8>,
}

/// A block's deterministic execution output.
///
/// Results form a DAG keyed by `previous_result_id`; cycles are impossible
/// because the previous result must already be known when a result is
/// admitted.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct ExecutionResult {
    /// The result this one extends.
    pub previous_result_id: Identifier,
    /// The executed block.
    pub block_id: Identifier,
    /// The chunks of the execution, system chunk last.
    pub chunks: Vec<Chunk>,
    /// Service events emitted during execution.
    pub service_events: Vec<ServiceEvent>,
}

impl ExecutionResult {
    /// The identifier of this result.
    pub fn id(&self) -> Identifier {
        Identifier::of(self)
    }

    /// The register state after the full execution, i.e. the end state of
    /// the system chunk.
    pub fn final_state(&self) -> Result<StateCommitment, EntityError> {
        self.chunks
            .last()
            .map(|c| c.end_state)
            .ok_or(EntityError::NoChunks)
    }

    /// Whether the chunk at `index` is the system chunk.
    pub fn is_system_chunk(&self, index: u64) -> bool {
        index + 1 == self.chunks.len() as u64
    }
}

/// An executor's claim that a block produced a particular result.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct ExecutionReceipt {
    /// The executor that produced this receipt.
    pub executor_id: Identifier,
    /// The claimed execution result.
    pub execution_result: ExecutionResult,
    /// One SPoCK per chunk, binding the executor to the state-touch trace.
    pub spocks: Vec<Vec<u8>>,
    /// The executor's signature over the receipt.
    pub executor_signature: Vec<u8>,
}

impl ExecutionReceipt {
    /// The identifier of this receipt.
    ///
    /// Derived from the executor and the result so that the same claim by
    /// the same executor is one entity regardless of how it travelled.
    pub fn id(&self) -> Identifier {
        Identifier::of(&(self.executor_id, self.execution_result.id()))
    }

    /// Strips the full result down to the receipt metadata stored in block
    /// payloads.
    pub fn meta(&self) -> ExecutionReceiptMeta {
        ExecutionReceiptMeta {
            executor_id: self.executor_id,
            result_id: self.execution_result.id(),
            spocks: self.spocks.clone(),
            executor_signature: self.executor_signature.clone(),
        }
    }

    /// Reassembles a full receipt from its metadata and the referenced
    /// result.
    pub fn from_meta(meta: ExecutionReceiptMeta, result: ExecutionResult) -> ExecutionReceipt {
        ExecutionReceipt {
            executor_id: meta.executor_id,
            execution_result: result,
            spocks: meta.spocks,
            executor_signature: meta.executor_signature,
        }
    }
}

/// An execution receipt with the result replaced by its identifier.
///
/// Block payloads carry metas; the full result is included separately the
/// first time it appears on a fork.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct ExecutionReceiptMeta {
    /// The executor that produced the receipt.
    pub executor_id: Identifier,
    /// The identifier of the claimed result.
    pub result_id: Identifier,
    /// One SPoCK per chunk.
    pub spocks: Vec<Vec<u8>>,
    /// The executor's signature over the receipt.
    pub executor_signature: Vec<u8>,
}

impl ExecutionReceiptMeta {
    /// The identifier of the receipt this meta stands for.
    pub fn id(&self) -> Identifier {
        Identifier::of(&(self.executor_id, self.result_id))
    }
}
