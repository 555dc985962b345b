//! Wire messages exchanged between node roles.
//!
//! Framing and transport are outside the kernel; these types fix the
//! semantics of what travels on each channel.

use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};

use crate::block::{Header, Payload};
use crate::collection::Collection;
use crate::execution::ExecutionReceipt;
use crate::identifier::Identifier;
use crate::sealing::ResultApproval;
use crate::verification::ChunkDataPack;

/// Logical network channels engines register on.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Encode, Decode)]
pub enum Channel {
    /// Block proposals among consensus nodes.
    ConsensusCommittee,
    /// Execution receipts from execution to consensus and verification.
    ReceiveReceipts,
    /// Result approvals from verification to consensus.
    ReceiveApprovals,
    /// Chunk data pack requests and responses.
    RequestChunks,
}

/// A block proposal broadcast by the elected leader.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct BlockProposal {
    /// The proposed header.
    pub header: Header,
    /// The proposed payload.
    pub payload: Payload,
}

/// A request for a chunk data pack.
///
/// The nonce makes every retry a distinct message so receiver-side
/// deduplication cannot suppress legitimate retries.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct ChunkDataRequest {
    /// The requested chunk.
    pub chunk_id: Identifier,
    /// Fresh random nonce.
    pub nonce: u64,
}

/// An execution node's answer to a [`ChunkDataRequest`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct ChunkDataResponse {
    /// The requested chunk data pack.
    pub chunk_data_pack: ChunkDataPack,
    /// The chunk's collection; empty for system chunks.
    pub collection: Collection,
    /// Echo of the request nonce.
    pub nonce: u64,
}

/// Any message the kernel's engines exchange.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub enum NetworkMessage {
    /// A block proposal.
    BlockProposal(BlockProposal),
    /// A chunk data pack request.
    ChunkDataRequest(ChunkDataRequest),
    /// A chunk data pack response.
    ChunkDataResponse(ChunkDataResponse),
    /// An execution receipt.
    ExecutionReceipt(ExecutionReceipt),
    /// A result approval.
    ResultApproval(ResultApproval),
}
