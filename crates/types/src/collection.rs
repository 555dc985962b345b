//! Collections, transactions, and collection guarantees.

use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};

use crate::identifier::Identifier;

/// A transaction body.
///
/// The transaction language is outside the kernel's scope: the script and
/// its arguments are opaque bytes interpreted by the virtual machine.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct TransactionBody {
    /// The script to execute.
    pub script: Vec<u8>,
    /// Arguments passed to the script.
    pub arguments: Vec<Vec<u8>>,
}

impl TransactionBody {
    /// The identifier of this transaction.
    pub fn id(&self) -> Identifier {
        Identifier::of(self)
    }
}

/// An ordered batch of transactions produced by a collection cluster.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default, Encode, Decode)]
pub struct Collection {
    /// The transactions of this collection, in execution order.
    pub transactions: Vec<TransactionBody>,
}

impl Collection {
    /// The identifier of this collection.
    pub fn id(&self) -> Identifier {
        Identifier::of(self)
    }

    /// Number of transactions in the collection.
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    /// Whether the collection holds no transactions.
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

/// A collection cluster's commitment that a collection is available and
/// will be executed.
///
/// Valid on a fork iff the reference block is a known ancestor within the
/// configured expiry window and the collection has not yet been
/// incorporated on that fork.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct CollectionGuarantee {
    /// The guaranteed collection.
    pub collection_id: Identifier,
    /// The block the signers used as their reference point.
    pub reference_block_id: Identifier,
    /// The collection nodes that signed the guarantee.
    pub signer_ids: Vec<Identifier>,
    /// The aggregated signature of the signers.
    pub signature: Vec<u8>,
}

impl CollectionGuarantee {
    /// The identifier of the guarantee, which is the collection it covers.
    pub fn id(&self) -> Identifier {
        self.collection_id
    }
}
