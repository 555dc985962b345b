//! A bounded collection of trie versions.
//!
//! The forest holds the recent versions of the ledger, keyed by root hash.
//! It is a storage abstraction, not a cache: evicting a version that is
//! still needed is an application logic error, so the capacity must be
//! chosen large enough that the least recently used version is never
//! needed again. An optional callback observes evictions.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;

use cascade_types::StateCommitment;

use crate::proof::TrieBatchProof;
use crate::trie::Trie;
use crate::{LedgerError, Path, Query, Update, Value};

/// Callback invoked with every evicted trie version.
pub type OnTrieEvicted = Box<dyn Fn(&Trie) + Send + Sync>;

/// A bounded, concurrency-safe set of trie versions.
pub struct Forest {
    tries: Mutex<LruCache<StateCommitment, Arc<Trie>>>,
    on_evicted: Option<OnTrieEvicted>,
}

impl Forest {
    /// Creates a forest holding at most `capacity` versions, seeded with
    /// the empty trie.
    pub fn new(capacity: usize, on_evicted: Option<OnTrieEvicted>) -> Result<Forest, LedgerError> {
        let capacity = NonZeroUsize::new(capacity).ok_or_else(|| {
            LedgerError::InvalidUpdate("forest capacity must be positive".to_string())
        })?;
        let forest = Forest {
            tries: Mutex::new(LruCache::new(capacity)),
            on_evicted,
        };
        forest.add_trie(Arc::new(Trie::empty()))?;
        Ok(forest)
    }

    /// The root hash of the empty trie.
    pub fn empty_root(&self) -> StateCommitment {
        StateCommitment(crate::hash::empty_root_hash())
    }

    /// Registers a trie version. Re-adding a version with identical
    /// content is a no-op; a trie with the same root but different
    /// content is a conflict.
    pub fn add_trie(&self, trie: Arc<Trie>) -> Result<(), LedgerError> {
        let root = StateCommitment(trie.root_hash());
        let evicted = {
            let mut tries = self.tries.lock();
            if let Some(existing) = tries.get(&root) {
                if existing.leaves() != trie.leaves() {
                    return Err(LedgerError::Conflict(format!(
                        "forest already holds a trie with root {root} but other content"
                    )));
                }
                return Ok(());
            }
            tries.push(root, trie)
        };
        if let Some((evicted_root, evicted_trie)) = evicted {
            tracing::debug!(
                target: "ledger",
                event = "trie_evicted",
                root = %evicted_root,
                "forest capacity reached"
            );
            if let Some(cb) = &self.on_evicted {
                cb(&evicted_trie);
            }
        }
        Ok(())
    }

    /// Looks up the trie version for `state`.
    pub fn get_trie(&self, state: StateCommitment) -> Result<Arc<Trie>, LedgerError> {
        self.tries
            .lock()
            .get(&state)
            .cloned()
            .ok_or(LedgerError::UnknownState(state))
    }

    /// Reads register values for a query, preserving caller order.
    ///
    /// Duplicate paths are collapsed into a single trie lookup; the VM is
    /// expected to deduplicate, so this is a precaution.
    pub fn read(&self, query: &Query) -> Result<Vec<Value>, LedgerError> {
        if query.paths.is_empty() {
            return Ok(Vec::new());
        }
        let trie = self.get_trie(query.state)?;
        let (unique, positions) = dedup(&query.paths);
        let values = trie.read(&unique);
        Ok(positions.iter().map(|&i| values[i].clone()).collect())
    }

    /// Applies a batch update and returns the new version's commitment.
    /// Later writes to the same register win.
    pub fn update(&self, update: &Update) -> Result<StateCommitment, LedgerError> {
        let trie = self.get_trie(update.state)?;
        if update.paths.is_empty() {
            return Ok(update.state);
        }
        let new_trie = Arc::new(trie.update(&update.paths, &update.values));
        let root = StateCommitment(new_trie.root_hash());
        self.add_trie(new_trie)?;
        Ok(root)
    }

    /// Produces a batch proof for a query, preserving caller order.
    pub fn proofs(&self, query: &Query) -> Result<TrieBatchProof, LedgerError> {
        if query.paths.is_empty() {
            return Ok(TrieBatchProof::default());
        }
        let trie = self.get_trie(query.state)?;
        let (unique, positions) = dedup(&query.paths);
        let batch = trie.prove(&unique);
        Ok(TrieBatchProof {
            proofs: positions.iter().map(|&i| batch.proofs[i].clone()).collect(),
        })
    }

    /// Number of versions currently held.
    pub fn size(&self) -> usize {
        self.tries.lock().len()
    }
}

/// Collapses duplicates while remembering, per original position, the
/// index of its unique representative.
fn dedup(paths: &[Path]) -> (Vec<Path>, Vec<usize>) {
    let mut unique: Vec<Path> = Vec::with_capacity(paths.len());
    let mut positions = Vec::with_capacity(paths.len());
    for path in paths {
        match unique.iter().position(|p| p == path) {
            Some(i) => positions.push(i),
            None => {
                unique.push(*path);
                positions.push(unique.len() - 1);
            }
        }
    }
    (unique, positions)
}
