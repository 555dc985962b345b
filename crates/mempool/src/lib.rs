#![forbid(unsafe_code)]

//! # Cascade Mempools
//!
//! Concurrency-safe in-memory pools feeding the sealing pipeline and the
//! payload builder. Every pool owns its entries and guards them with its
//! own mutex; callers get snapshots, never references into pool
//! internals.

mod approvals;
mod chunk_requests;
mod execution_tree;
mod guarantees;
mod incorporated_results;
mod seals;

pub use approvals::Approvals;
pub use chunk_requests::{exponential_backoff_updater, retry_after_qualifier, ChunkRequestsPool};
pub use execution_tree::ExecutionTreePool;
pub use guarantees::GuaranteePool;
pub use incorporated_results::IncorporatedResults;
pub use seals::{MultiReceiptGatedSeals, SealSet};
