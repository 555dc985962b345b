//! The pending chunk-data-pack request pool.
//!
//! Tracks every outstanding request together with its retry history. All
//! mutations are serialized under one mutex, so the atomic
//! `update_request_history` is what the requester consults before
//! resending: this pool is the single source of truth for retry
//! permission.

use std::time::{Duration, Instant};

use ahash::AHashMap;
use parking_lot::Mutex;

use cascade_api::mempool::{ChunkRequests, HistoryUpdater, RequestHistory};
use cascade_types::{ChunkDataPackRequest, Identifier};

struct Entry {
    request: ChunkDataPackRequest,
    history: RequestHistory,
}

/// Bounded-by-usage map from chunk ID to pending request.
pub struct ChunkRequestsPool {
    entries: Mutex<AHashMap<Identifier, Entry>>,
    initial_retry: Duration,
}

impl ChunkRequestsPool {
    /// Creates a pool whose fresh requests start with `initial_retry` as
    /// their backoff.
    pub fn new(initial_retry: Duration) -> ChunkRequestsPool {
        ChunkRequestsPool {
            entries: Mutex::new(AHashMap::new()),
            initial_retry,
        }
    }
}

impl ChunkRequests for ChunkRequestsPool {
    fn add(&self, request: ChunkDataPackRequest) -> bool {
        let mut entries = self.entries.lock();
        let chunk_id = request.chunk_id;
        if entries.contains_key(&chunk_id) {
            return false;
        }
        entries.insert(
            chunk_id,
            Entry {
                request,
                history: RequestHistory {
                    attempts: 0,
                    last_attempt: Instant::now(),
                    retry_after: self.initial_retry,
                },
            },
        );
        true
    }

    fn remove(&self, chunk_id: Identifier) -> bool {
        self.entries.lock().remove(&chunk_id).is_some()
    }

    fn request_history(&self, chunk_id: Identifier) -> Option<RequestHistory> {
        self.entries.lock().get(&chunk_id).map(|e| e.history)
    }

    fn update_request_history(
        &self,
        chunk_id: Identifier,
        updater: HistoryUpdater<'_>,
    ) -> Option<RequestHistory> {
        let mut entries = self.entries.lock();
        let entry = entries.get_mut(&chunk_id)?;
        entry.history = updater(entry.history);
        Some(entry.history)
    }

    fn all(&self) -> Vec<ChunkDataPackRequest> {
        self.entries
            .lock()
            .values()
            .map(|e| e.request.clone())
            .collect()
    }

    fn size(&self) -> usize {
        self.entries.lock().len()
    }
}

/// Stock qualifier: a request may be dispatched on its first attempt, or
/// once its backoff interval has elapsed since the last attempt.
pub fn retry_after_qualifier(history: &RequestHistory) -> bool {
    history.attempts == 0 || history.last_attempt.elapsed() >= history.retry_after
}

/// Stock updater: counts the attempt, stamps it, and doubles the backoff
/// up to `max`.
pub fn exponential_backoff_updater(
    max: Duration,
) -> impl Fn(RequestHistory) -> RequestHistory + Send + Sync {
    move |history| RequestHistory {
        attempts: history.attempts + 1,
        last_attempt: Instant::now(),
        retry_after: (history.retry_after * 2).min(max),
    }
}
