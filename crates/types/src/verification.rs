//! Chunk data packs, verifiable chunks, and chunk faults.

use parity_scale_codec::{Decode, Encode};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::block::Header;
use crate::collection::Collection;
use crate::execution::{Chunk, ExecutionResult};
use crate::identifier::{Identifier, StateCommitment};

/// A minimal witness allowing re-execution of a chunk without the full
/// ledger.
///
/// `proof` is an encoded batch of Merkle inclusion/exclusion witnesses
/// sufficient to answer every register read the chunk performs.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct ChunkDataPack {
    /// The chunk this pack belongs to.
    pub chunk_id: Identifier,
    /// The register state the proof is anchored to.
    pub start_state: StateCommitment,
    /// Encoded ledger batch proof.
    pub proof: Vec<u8>,
    /// The collection executed by the chunk.
    pub collection_id: Identifier,
}

impl ChunkDataPack {
    /// The identifier of this pack.
    pub fn id(&self) -> Identifier {
        Identifier::of(self)
    }
}

/// Everything a verifier needs to check one chunk.
#[derive(Debug, Clone)]
pub struct VerifiableChunkData {
    /// Whether the chunk is the result's system chunk.
    pub is_system_chunk: bool,
    /// The chunk under verification.
    pub chunk: Chunk,
    /// The header of the executed block.
    pub header: Header,
    /// The result the chunk belongs to.
    pub result: ExecutionResult,
    /// The chunk's collection; ignored for system chunks.
    pub collection: Collection,
    /// The witness for the chunk's register reads.
    pub chunk_data_pack: ChunkDataPack,
    /// The state the chunk claims to end in: the next chunk's start state,
    /// or the result's final state for the last chunk.
    pub end_state: StateCommitment,
}

/// An outstanding request for a chunk data pack.
///
/// `agrees` are executors whose receipts commit to the result under
/// verification; `disagrees` committed to a conflicting result but still
/// executed the block and can serve the pack.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct ChunkDataPackRequest {
    /// The requested chunk.
    pub chunk_id: Identifier,
    /// Height of the block the chunk belongs to.
    pub height: u64,
    /// Executors that agree with the result under verification.
    pub agrees: Vec<Identifier>,
    /// Executors that committed to a conflicting result.
    pub disagrees: Vec<Identifier>,
}

impl ChunkDataPackRequest {
    /// The identifier of this request, which is the requested chunk's ID.
    pub fn id(&self) -> Identifier {
        self.chunk_id
    }

    /// Samples up to `count` request targets.
    ///
    /// Agreeing executors are preferred; disagreeing ones fill the
    /// remainder. Order within each group is randomized so repeated
    /// retries spread load across executors.
    pub fn sample_targets(&self, count: usize) -> Vec<Identifier> {
        let mut rng = rand::thread_rng();
        let mut targets = self.agrees.clone();
        targets.shuffle(&mut rng);
        targets.truncate(count);
        if targets.len() < count {
            let mut fallback = self.disagrees.clone();
            fallback.shuffle(&mut rng);
            fallback.truncate(count - targets.len());
            targets.extend(fallback);
        }
        targets
    }
}

/// A typed fault produced by chunk verification.
///
/// Faults are values, not errors: they justify a slashing challenge and
/// are returned to the caller alongside an `Ok` verdict. Internal errors
/// that prevent any verdict travel separately.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub enum ChunkFault {
    /// The chunk data pack was malformed or inconsistent with the chunk's
    /// start state.
    InvalidVerifiableChunk {
        /// The faulted chunk's index.
        chunk_index: u64,
        /// The result the chunk belongs to.
        execution_result_id: Identifier,
        /// Human-readable description of the inconsistency.
        reason: String,
    },
    /// The chunk touched registers the proof did not cover.
    MissingRegisterTouch {
        /// The faulted chunk's index.
        chunk_index: u64,
        /// The result the chunk belongs to.
        execution_result_id: Identifier,
        /// The uncovered register paths, hex-encoded for reporting.
        registers: Vec<String>,
    },
    /// Re-execution ended in a different state than the receipt claims.
    NonMatchingFinalState {
        /// The faulted chunk's index.
        chunk_index: u64,
        /// The result the chunk belongs to.
        execution_result_id: Identifier,
        /// The state computed by re-execution.
        computed: StateCommitment,
        /// The state declared by the chunk.
        declared: StateCommitment,
    },
}

impl ChunkFault {
    /// The index of the faulted chunk.
    pub fn chunk_index(&self) -> u64 {
        match self {
            ChunkFault::InvalidVerifiableChunk { chunk_index, .. }
            | ChunkFault::MissingRegisterTouch { chunk_index, .. }
            | ChunkFault::NonMatchingFinalState { chunk_index, .. } => *chunk_index,
        }
    }

    /// The result the faulted chunk belongs to.
    pub fn execution_result_id(&self) -> Identifier {
        match self {
            ChunkFault::InvalidVerifiableChunk {
                execution_result_id, ..
            }
            | ChunkFault::MissingRegisterTouch {
                execution_result_id, ..
            }
            | ChunkFault::NonMatchingFinalState {
                execution_result_id, ..
            } => *execution_result_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(agrees: usize, disagrees: usize) -> ChunkDataPackRequest {
        ChunkDataPackRequest {
            chunk_id: Identifier::of(&1u8),
            height: 10,
            agrees: (0..agrees as u8).map(|i| Identifier::of(&(i, "agree"))).collect(),
            disagrees: (0..disagrees as u8)
                .map(|i| Identifier::of(&(i, "disagree")))
                .collect(),
        }
    }

    #[test]
    fn sampling_prefers_agreeing_executors() {
        let req = request(3, 3);
        let targets = req.sample_targets(2);
        assert_eq!(targets.len(), 2);
        for t in &targets {
            assert!(req.agrees.contains(t));
        }
    }

    #[test]
    fn sampling_falls_back_to_disagreeing_executors() {
        let req = request(1, 3);
        let targets = req.sample_targets(3);
        assert_eq!(targets.len(), 3);
        assert!(targets.contains(&req.agrees[0]));
        assert_eq!(targets.iter().filter(|t| req.disagrees.contains(t)).count(), 2);
    }

    #[test]
    fn sampling_caps_at_available_targets() {
        let req = request(1, 1);
        assert_eq!(req.sample_targets(5).len(), 2);
    }
}
