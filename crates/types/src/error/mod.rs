//! Error types shared across the Cascade kernel.
//!
//! Two axes matter throughout the kernel: *fault vs. internal error* and
//! *recoverable vs. fatal*. Chunk faults are values (see
//! [`crate::verification::ChunkFault`]) and never appear here; the enums
//! below are genuine errors propagated to callers.

use thiserror::Error;

use crate::identifier::Identifier;

/// A trait for assigning a stable, machine-readable string code to an error.
pub trait ErrorCode {
    /// Returns the unique, stable string identifier for this error variant.
    fn code(&self) -> &'static str;
}

/// Errors surfaced by storage implementations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The requested entity is not stored. This is the *normal* sentinel
    /// for absent data and is matched on by callers.
    #[error("entity not found")]
    NotFound,
    /// A different entity is already stored under the same key.
    #[error("conflicting entity already stored under key {0}")]
    AlreadyExists(Identifier),
    /// The storage backend failed; unexpected and generally fatal for the
    /// operation in progress.
    #[error("storage backend error: {0}")]
    Backend(String),
    /// Stored bytes could not be decoded.
    #[error("stored entity could not be decoded: {0}")]
    Decode(String),
}

impl ErrorCode for StorageError {
    fn code(&self) -> &'static str {
        match self {
            Self::NotFound => "STORAGE_NOT_FOUND",
            Self::AlreadyExists(_) => "STORAGE_ALREADY_EXISTS",
            Self::Backend(_) => "STORAGE_BACKEND_ERROR",
            Self::Decode(_) => "STORAGE_DECODE_ERROR",
        }
    }
}

/// Errors surfaced by mempool operations.
#[derive(Error, Debug)]
pub enum MempoolError {
    /// An entry references a parent that the pool does not know.
    #[error("unknown parent result {0}")]
    UnknownParent(Identifier),
    /// An entry conflicts with one already admitted under the same key.
    #[error("conflicting entry for {0}")]
    Conflict(Identifier),
    /// The pool rejected the entry because it is over capacity and the
    /// entry lost the eviction comparison.
    #[error("pool is full")]
    Full,
    /// A storage dependency of the pool failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ErrorCode for MempoolError {
    fn code(&self) -> &'static str {
        match self {
            Self::UnknownParent(_) => "MEMPOOL_UNKNOWN_PARENT",
            Self::Conflict(_) => "MEMPOOL_CONFLICT",
            Self::Full => "MEMPOOL_FULL",
            Self::Storage(_) => "MEMPOOL_STORAGE_ERROR",
        }
    }
}

/// Errors surfaced by engine event processing.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The engine received an event type it does not handle.
    #[error("invalid event type: {0}")]
    InvalidEventType(&'static str),
    /// The event failed validation and was rejected.
    #[error("invalid input from {origin:?}: {reason}")]
    InvalidInput {
        /// The node the event came from.
        origin: Identifier,
        /// Why the event was rejected.
        reason: String,
    },
    /// The engine is shutting down and no longer accepts work.
    #[error("engine is terminating")]
    Terminating,
    /// A network publish failed.
    #[error("network error: {0}")]
    Network(String),
    /// An internal dependency failed; the event may be retried.
    #[error("internal error: {0}")]
    Internal(String),
    /// A storage dependency failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// A mempool dependency failed.
    #[error(transparent)]
    Mempool(#[from] MempoolError),
}

impl ErrorCode for EngineError {
    fn code(&self) -> &'static str {
        match self {
            Self::InvalidEventType(_) => "ENGINE_INVALID_EVENT",
            Self::InvalidInput { .. } => "ENGINE_INVALID_INPUT",
            Self::Terminating => "ENGINE_TERMINATING",
            Self::Network(_) => "ENGINE_NETWORK_ERROR",
            Self::Internal(_) => "ENGINE_INTERNAL_ERROR",
            Self::Storage(_) => "ENGINE_STORAGE_ERROR",
            Self::Mempool(_) => "ENGINE_MEMPOOL_ERROR",
        }
    }
}

/// Errors surfaced while building a block payload.
///
/// Any storage failure during the fork walk is fatal for the build; the
/// caller logs it and waits for the next view.
#[derive(Error, Debug)]
pub enum BuilderError {
    /// A block referenced during the fork walk is missing from storage.
    #[error("missing fork ancestor {0}")]
    MissingAncestor(Identifier),
    /// The sealed execution result referenced by the latest seal is
    /// missing from storage.
    #[error("missing sealed result {0}")]
    MissingSealedResult(Identifier),
    /// Extending protocol state with the candidate failed.
    #[error("could not extend protocol state: {0}")]
    Extend(String),
    /// The caller-provided header setter failed.
    #[error("header setter failed: {0}")]
    Setter(String),
    /// A storage dependency failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// A mempool dependency failed.
    #[error(transparent)]
    Mempool(#[from] MempoolError),
}

impl ErrorCode for BuilderError {
    fn code(&self) -> &'static str {
        match self {
            Self::MissingAncestor(_) => "BUILDER_MISSING_ANCESTOR",
            Self::MissingSealedResult(_) => "BUILDER_MISSING_SEALED_RESULT",
            Self::Extend(_) => "BUILDER_EXTEND_FAILED",
            Self::Setter(_) => "BUILDER_SETTER_FAILED",
            Self::Storage(_) => "BUILDER_STORAGE_ERROR",
            Self::Mempool(_) => "BUILDER_MEMPOOL_ERROR",
        }
    }
}

/// Errors raised by entity-level accessors.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum EntityError {
    /// An execution result carried no chunks.
    #[error("execution result has no chunks")]
    NoChunks,
}

impl ErrorCode for EntityError {
    fn code(&self) -> &'static str {
        match self {
            Self::NoChunks => "ENTITY_NO_CHUNKS",
        }
    }
}
