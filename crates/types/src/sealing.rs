//! Seals, incorporated results, and result approvals.

use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};

use crate::execution::{ExecutionResult, ServiceEvent};
use crate::identifier::{Identifier, StateCommitment};

/// A finalized commitment that an execution result is canonical on the fork
/// that incorporates the seal.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct Seal {
    /// The sealed block.
    pub block_id: Identifier,
    /// The sealed execution result.
    pub result_id: Identifier,
    /// The final register state committed by the sealed result.
    pub final_state: StateCommitment,
    /// Service events carried over from the sealed result.
    pub service_events: Vec<ServiceEvent>,
}

impl Seal {
    /// The identifier of this seal.
    pub fn id(&self) -> Identifier {
        Identifier::of(self)
    }
}

/// An execution result paired with the block on which it is being
/// considered for sealing.
///
/// Two receipts for the same result incorporated in different blocks are
/// distinct entities: approval assignment depends on the incorporating
/// block. In the current sealing phase `incorporated_block_id` equals
/// `result.block_id`; the field is kept independent so a later phase can
/// reference the block that actually incorporates the result.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct IncorporatedResult {
    /// The block relative to which the result is considered.
    pub incorporated_block_id: Identifier,
    /// The execution result.
    pub result: ExecutionResult,
}

impl IncorporatedResult {
    /// Pairs a result with its incorporating block.
    pub fn new(incorporated_block_id: Identifier, result: ExecutionResult) -> Self {
        IncorporatedResult {
            incorporated_block_id,
            result,
        }
    }

    /// The identifier of this pairing.
    pub fn id(&self) -> Identifier {
        Identifier::of(&(self.incorporated_block_id, self.result.id()))
    }
}

/// A seal together with the incorporated result it seals.
///
/// This pairing is what the sealing core emits and the payload builder
/// places into payloads.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct IncorporatedResultSeal {
    /// The incorporated result being sealed.
    pub incorporated_result: IncorporatedResult,
    /// The seal for the incorporated result.
    pub seal: Seal,
}

impl IncorporatedResultSeal {
    /// The identifier of the candidate, which is the incorporated result's
    /// identifier.
    pub fn id(&self) -> Identifier {
        self.incorporated_result.id()
    }
}

/// A verifier's statement about a single chunk of a single result.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct Attestation {
    /// The executed block.
    pub block_id: Identifier,
    /// The result the attestation refers to.
    pub execution_result_id: Identifier,
    /// The chunk within the result.
    pub chunk_index: u64,
}

/// A verification node's approval of one chunk of an execution result.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct ResultApproval {
    /// What is being approved.
    pub attestation: Attestation,
    /// The verifier issuing the approval.
    pub approver_id: Identifier,
    /// Signature over the attestation.
    pub attestation_signature: Vec<u8>,
    /// The verifier's SPoCK for the chunk, matching the executor's.
    pub spock: Vec<u8>,
    /// Signature over the whole approval.
    pub verifier_signature: Vec<u8>,
}

impl ResultApproval {
    /// The identifier of this approval.
    pub fn id(&self) -> Identifier {
        Identifier::of(&(
            self.attestation.execution_result_id,
            self.attestation.chunk_index,
            self.approver_id,
        ))
    }
}
