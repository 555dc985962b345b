//! The collection-guarantee pool.
//!
//! Preserves insertion order: the builder copies qualifying guarantees
//! into payloads in the order collection nodes delivered them.

use ahash::AHashSet;
use parking_lot::Mutex;

use cascade_api::mempool::Guarantees;
use cascade_types::{CollectionGuarantee, Identifier};

#[derive(Default)]
struct Inner {
    order: Vec<CollectionGuarantee>,
    known: AHashSet<Identifier>,
}

/// An insertion-ordered set of collection guarantees.
#[derive(Default)]
pub struct GuaranteePool {
    inner: Mutex<Inner>,
}

impl GuaranteePool {
    /// An empty pool.
    pub fn new() -> GuaranteePool {
        GuaranteePool::default()
    }
}

impl Guarantees for GuaranteePool {
    fn add(&self, guarantee: CollectionGuarantee) -> bool {
        let mut inner = self.inner.lock();
        if !inner.known.insert(guarantee.id()) {
            return false;
        }
        inner.order.push(guarantee);
        true
    }

    fn all(&self) -> Vec<CollectionGuarantee> {
        self.inner.lock().order.clone()
    }

    fn remove(&self, collection_id: Identifier) -> bool {
        let mut inner = self.inner.lock();
        if !inner.known.remove(&collection_id) {
            return false;
        }
        inner.order.retain(|g| g.id() != collection_id);
        true
    }

    fn size(&self) -> usize {
        self.inner.lock().order.len()
    }
}
