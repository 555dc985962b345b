//! Blocks, headers, and payloads.

use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};

use crate::collection::CollectionGuarantee;
use crate::execution::{ExecutionReceiptMeta, ExecutionResult};
use crate::identifier::Identifier;
use crate::sealing::Seal;

/// A block header.
///
/// Height increases by exactly one per parent; the view strictly increases
/// but may skip values when leaders fail to produce a proposal.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct Header {
    /// The chain this block belongs to.
    pub chain_id: String,
    /// The identifier of the parent block.
    pub parent_id: Identifier,
    /// The height of this block in the chain.
    pub height: u64,
    /// The consensus view in which this block was proposed.
    pub view: u64,
    /// The hash of the block payload.
    pub payload_hash: Identifier,
    /// The UNIX timestamp (in milliseconds) when the block was proposed.
    pub timestamp: u64,
    /// The identity of the proposer.
    pub proposer_id: Identifier,
    /// The identities that voted for the parent block.
    pub parent_voter_ids: Vec<Identifier>,
    /// The aggregated signature over the parent vote.
    pub parent_voter_sig: Vec<u8>,
    /// The proposer's signature over this header.
    pub proposer_sig: Vec<u8>,
}

impl Header {
    /// The identifier of the block carrying this header.
    ///
    /// Signatures are excluded from the identity so that a header's ID is
    /// stable across signing.
    pub fn id(&self) -> Identifier {
        #[derive(Encode)]
        struct Body<'a> {
            chain_id: &'a String,
            parent_id: &'a Identifier,
            height: u64,
            view: u64,
            payload_hash: &'a Identifier,
            timestamp: u64,
            proposer_id: &'a Identifier,
        }
        Identifier::of(&Body {
            chain_id: &self.chain_id,
            parent_id: &self.parent_id,
            height: self.height,
            view: self.view,
            payload_hash: &self.payload_hash,
            timestamp: self.timestamp,
            proposer_id: &self.proposer_id,
        })
    }
}

/// The payload of a block: everything the proposer incorporated.
///
/// A payload may legally be empty.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default, Encode, Decode)]
pub struct Payload {
    /// Collection guarantees incorporated by this block.
    pub guarantees: Vec<CollectionGuarantee>,
    /// Execution receipt metadata incorporated by this block.
    pub receipts: Vec<ExecutionReceiptMeta>,
    /// Execution results incorporated for the first time on this fork.
    pub results: Vec<ExecutionResult>,
    /// Seals incorporated by this block.
    pub seals: Vec<Seal>,
}

impl Payload {
    /// The hash committed to by `Header::payload_hash`.
    pub fn hash(&self) -> Identifier {
        Identifier::of(self)
    }

    /// Flattens the payload into the per-block incorporation index.
    pub fn index(&self) -> Index {
        Index {
            collection_ids: self.guarantees.iter().map(|g| g.collection_id).collect(),
            receipt_ids: self.receipts.iter().map(|m| m.id()).collect(),
            result_ids: self.results.iter().map(|r| r.id()).collect(),
            seal_ids: self.seals.iter().map(|s| s.id()).collect(),
        }
    }

    /// Looks up the full results carried in this payload by their ID.
    pub fn results_by_id(&self) -> std::collections::HashMap<Identifier, &ExecutionResult> {
        self.results.iter().map(|r| (r.id(), r)).collect()
    }
}

/// The identifiers of everything a single block incorporates.
///
/// Stored per block so that fork walks can answer "is X already on this
/// fork?" without decoding full payloads.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default, Encode, Decode)]
pub struct Index {
    /// Collections guaranteed by this block.
    pub collection_ids: Vec<Identifier>,
    /// Receipts incorporated by this block.
    pub receipt_ids: Vec<Identifier>,
    /// Results incorporated by this block.
    pub result_ids: Vec<Identifier>,
    /// Seals incorporated by this block.
    pub seal_ids: Vec<Identifier>,
}

/// A block: header plus payload.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct Block {
    /// The block header.
    pub header: Header,
    /// The block payload; `header.payload_hash` must equal `payload.hash()`.
    pub payload: Payload,
}

impl Block {
    /// The identifier of this block.
    pub fn id(&self) -> Identifier {
        self.header.id()
    }

    /// Replaces the payload and refreshes the header's payload hash.
    pub fn set_payload(&mut self, payload: Payload) {
        self.header.payload_hash = payload.hash();
        self.payload = payload;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> Header {
        Header {
            chain_id: "cascade-test".to_string(),
            parent_id: Identifier::ZERO,
            height: 1,
            view: 1,
            payload_hash: Payload::default().hash(),
            timestamp: 0,
            proposer_id: Identifier::ZERO,
            parent_voter_ids: vec![],
            parent_voter_sig: vec![],
            proposer_sig: vec![],
        }
    }

    #[test]
    fn header_id_ignores_signatures() {
        let a = header();
        let mut b = header();
        b.proposer_sig = vec![1, 2, 3];
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn header_id_binds_payload_hash() {
        let a = header();
        let mut b = header();
        b.payload_hash = Identifier::of(&1u8);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn empty_payload_indexes_empty() {
        let index = Payload::default().index();
        assert!(index.collection_ids.is_empty());
        assert!(index.receipt_ids.is_empty());
        assert!(index.result_ids.is_empty());
        assert!(index.seal_ids.is_empty());
    }
}
