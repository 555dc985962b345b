//! Validation and assignment seams consumed by the sealing pipeline, and
//! the handler interface for delivered chunk data packs.

use std::collections::HashMap;

use thiserror::Error;

use cascade_types::error::ErrorCode;
use cascade_types::{
    ChunkDataPack, Collection, ExecutionReceipt, Identifier, IncorporatedResult, ResultApproval,
};

/// Why a receipt or approval was rejected.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// The signature does not verify.
    #[error("invalid signature")]
    InvalidSignature,
    /// The sender is not a staked node of the required role.
    #[error("node {0:?} is not a staked {1}")]
    Unstaked(Identifier, &'static str),
    /// The approver is not assigned to the approved chunk.
    #[error("verifier {0:?} is not assigned to chunk {1}")]
    NotAssigned(Identifier, u64),
    /// The entity is structurally malformed.
    #[error("malformed entity: {0}")]
    Malformed(String),
}

impl ErrorCode for ValidationError {
    fn code(&self) -> &'static str {
        match self {
            Self::InvalidSignature => "VALIDATION_INVALID_SIGNATURE",
            Self::Unstaked(_, _) => "VALIDATION_UNSTAKED",
            Self::NotAssigned(_, _) => "VALIDATION_NOT_ASSIGNED",
            Self::Malformed(_) => "VALIDATION_MALFORMED",
        }
    }
}

/// Validates execution receipts: executor is staked, chunks are
/// consistent, signature verifies.
pub trait ReceiptValidator: Send + Sync {
    /// Checks a receipt for admission.
    fn validate(&self, receipt: &ExecutionReceipt) -> Result<(), ValidationError>;
}

/// Validates result approvals: approver is a staked verifier assigned to
/// the chunk, signatures verify.
pub trait ApprovalValidator: Send + Sync {
    /// Checks an approval for admission.
    fn validate(&self, approval: &ResultApproval) -> Result<(), ValidationError>;
}

/// Which verifiers must attest which chunk of an incorporated result.
#[derive(Debug, Clone, Default)]
pub struct Assignment {
    verifiers_by_chunk: HashMap<u64, Vec<Identifier>>,
}

impl Assignment {
    /// An empty assignment.
    pub fn new() -> Assignment {
        Assignment::default()
    }

    /// Assigns `verifiers` to the chunk at `chunk_index`.
    pub fn add(&mut self, chunk_index: u64, verifiers: Vec<Identifier>) {
        self.verifiers_by_chunk.insert(chunk_index, verifiers);
    }

    /// The verifiers assigned to the chunk at `chunk_index`.
    pub fn verifiers_for(&self, chunk_index: u64) -> &[Identifier] {
        self.verifiers_by_chunk
            .get(&chunk_index)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Whether `verifier` is assigned to the chunk at `chunk_index`.
    pub fn is_assigned(&self, chunk_index: u64, verifier: Identifier) -> bool {
        self.verifiers_for(chunk_index).contains(&verifier)
    }
}

/// Derives the chunk assignment for an incorporated result.
pub trait Assigner: Send + Sync {
    /// The assignment for `incorporated_result`.
    fn assign(&self, incorporated_result: &IncorporatedResult)
        -> Result<Assignment, ValidationError>;
}

/// Receives chunk data packs delivered by the requester, exactly once
/// per chunk.
pub trait ChunkDataPackHandler: Send + Sync {
    /// Handles a delivered chunk data pack and its collection.
    fn handle_chunk_data_pack(
        &self,
        origin: Identifier,
        chunk_data_pack: ChunkDataPack,
        collection: Collection,
    );

    /// Notifies that a pending chunk belongs to a block that has been
    /// sealed; its request was dropped.
    fn notify_chunk_data_pack_sealed(&self, chunk_id: Identifier);
}
