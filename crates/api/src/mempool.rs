//! Mempool seams.
//!
//! Mempools own their entries; engines and the builder hold handles to
//! these traits. Absence from a pool always means "not yet, or evicted" —
//! callers re-query instead of caching.

use std::time::{Duration, Instant};

use cascade_types::error::MempoolError;
use cascade_types::{
    ChunkDataPackRequest, CollectionGuarantee, ExecutionReceipt, ExecutionResult, Header,
    Identifier, IncorporatedResultSeal,
};

/// Fork-membership predicate over block headers.
pub type BlockFilter<'a> = &'a (dyn Fn(&Header) -> bool + Send + Sync);

/// Admission predicate over receipts.
pub type ReceiptFilter<'a> = &'a (dyn Fn(&ExecutionReceipt) -> bool + Send + Sync);

/// The execution-tree mempool: an ordered forest of execution results
/// with their receipts, supporting filtered reachability search from a
/// sealed root.
pub trait ExecutionTree: Send + Sync {
    /// Adds a result without a receipt. The parent result must already be
    /// in the tree, or the result becomes a root. Idempotent.
    fn add_result(&self, result: &ExecutionResult, block: &Header) -> Result<(), MempoolError>;

    /// Adds a receipt, implicitly adding its result. Returns whether the
    /// receipt was new.
    fn add_receipt(&self, receipt: &ExecutionReceipt, block: &Header)
        -> Result<bool, MempoolError>;

    /// Yields receipts whose results transitively descend from
    /// `from_result_id`, restricted to blocks passing `block_filter` and
    /// receipts passing `receipt_filter`, in topological order (parents
    /// before children), without duplicates.
    fn reachable_receipts(
        &self,
        from_result_id: Identifier,
        block_filter: BlockFilter<'_>,
        receipt_filter: ReceiptFilter<'_>,
    ) -> Result<Vec<ExecutionReceipt>, MempoolError>;

    /// Drops results for blocks at or below `sealed_height` that are no
    /// longer reachable from the live roots.
    fn prune_up_to(&self, sealed_height: u64) -> Result<(), MempoolError>;

    /// Number of receipts currently held.
    fn size(&self) -> usize;
}

/// The guarantee mempool. Iteration order is insertion order, which the
/// builder preserves into payloads.
pub trait Guarantees: Send + Sync {
    /// Adds a guarantee; returns whether it was new.
    fn add(&self, guarantee: CollectionGuarantee) -> bool;
    /// Snapshot of all guarantees, oldest first.
    fn all(&self) -> Vec<CollectionGuarantee>;
    /// Removes a guarantee; returns whether it was present.
    fn remove(&self, collection_id: Identifier) -> bool;
    /// Number of guarantees currently held.
    fn size(&self) -> usize;
}

/// Callback observing candidate seals ejected from a bounded pool.
/// Callers must tolerate spurious ejections.
pub type OnEjection = Box<dyn Fn(&IncorporatedResultSeal) + Send + Sync>;

/// The candidate-seal mempool, indexed by incorporated-result ID.
pub trait IncorporatedResultSeals: Send + Sync {
    /// Adds a candidate seal; returns whether it was new.
    fn add(&self, seal: IncorporatedResultSeal) -> Result<bool, MempoolError>;
    /// Snapshot of all candidate seals.
    fn all(&self) -> Vec<IncorporatedResultSeal>;
    /// Retrieves a candidate seal by ID, if admissible.
    fn by_id(&self, id: Identifier) -> Option<IncorporatedResultSeal>;
    /// Removes a candidate seal; returns whether it was present.
    fn remove(&self, id: Identifier) -> bool;
    /// Drops every candidate seal.
    fn clear(&self);
    /// Registers a callback fired on ejection.
    fn register_ejection_callback(&self, callback: OnEjection);
    /// Number of candidate seals currently held.
    fn size(&self) -> usize;
}

/// Retry bookkeeping for one outstanding chunk data pack request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestHistory {
    /// Number of dispatch attempts so far.
    pub attempts: u64,
    /// When the last attempt was dispatched.
    pub last_attempt: Instant,
    /// Minimum wait before the next attempt qualifies.
    pub retry_after: Duration,
}

/// Atomic update applied to a request's history on dispatch.
pub type HistoryUpdater<'a> = &'a (dyn Fn(RequestHistory) -> RequestHistory + Send + Sync);

/// Decides whether a request may be dispatched this cycle.
pub type RequestQualifier<'a> = &'a (dyn Fn(&RequestHistory) -> bool + Send + Sync);

/// The pending chunk-data-pack request mempool: the single source of
/// truth for "am I allowed to resend this request now?".
pub trait ChunkRequests: Send + Sync {
    /// Adds a request with fresh history; returns whether it was new.
    fn add(&self, request: ChunkDataPackRequest) -> bool;
    /// Removes a request; returns whether it was present.
    fn remove(&self, chunk_id: Identifier) -> bool;
    /// The request's retry history, if pending.
    fn request_history(&self, chunk_id: Identifier) -> Option<RequestHistory>;
    /// Atomically applies `updater` to the request's history. Returns the
    /// updated history, or `None` if the request is not pending.
    fn update_request_history(
        &self,
        chunk_id: Identifier,
        updater: HistoryUpdater<'_>,
    ) -> Option<RequestHistory>;
    /// Snapshot of all pending requests.
    fn all(&self) -> Vec<ChunkDataPackRequest>;
    /// Number of pending requests.
    fn size(&self) -> usize;
}
