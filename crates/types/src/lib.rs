#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! # Cascade Kernel Types
//!
//! This crate is the foundational library for the Cascade kernel, containing
//! the canonical data structures exchanged between the consensus, sealing,
//! and verification subsystems.
//!
//! ## Architectural Role
//!
//! As the base crate, `cascade-types` has minimal dependencies and is itself
//! a dependency for almost every other crate in the workspace. This structure
//! prevents circular dependencies and provides a stable, canonical definition
//! for shared types like `Block`, `ExecutionReceipt`, `Seal`, and the error
//! enums shared across the engines.

/// A top-level `Result` alias used by modules that deal in storage access.
pub type Result<T, E = crate::error::StorageError> = std::result::Result<T, E>;

/// Blocks, headers, payloads, and the per-block incorporation index.
pub mod block;
/// The canonical, deterministic binary codec for consensus-critical data.
pub mod codec;
/// Collections, transactions, and collection guarantees.
pub mod collection;
/// Error types shared across the kernel.
pub mod error;
/// Execution results, receipts, and chunks.
pub mod execution;
/// Content-addressed identifiers and state commitments.
pub mod identifier;
/// Wire messages exchanged between node roles.
pub mod messages;
/// Seals, incorporated results, and result approvals.
pub mod sealing;
/// Chunk data packs, verifiable chunks, and chunk faults.
pub mod verification;

pub use block::{Block, Header, Index, Payload};
pub use collection::{Collection, CollectionGuarantee, TransactionBody};
pub use execution::{
    Chunk, ExecutionReceipt, ExecutionReceiptMeta, ExecutionResult, ServiceEvent, ServiceEventKind,
};
pub use identifier::{Identifier, StateCommitment};
pub use sealing::{Attestation, IncorporatedResult, IncorporatedResultSeal, ResultApproval, Seal};
pub use verification::{ChunkDataPack, ChunkDataPackRequest, ChunkFault, VerifiableChunkData};
