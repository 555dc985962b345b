//! Ledger error types.

use thiserror::Error;

use cascade_types::error::ErrorCode;
use cascade_types::StateCommitment;

use crate::Path;

/// Errors surfaced by tries, forests, and partial tries.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// One or more queried or updated paths are not covered by the ledger
    /// view. For partial tries this is the distinguished missing-key
    /// condition that verification turns into a chunk fault.
    #[error("paths not covered by ledger view: {}", format_paths(.paths))]
    MissingPaths {
        /// The uncovered paths.
        paths: Vec<Path>,
    },
    /// The referenced trie version is not held by this forest.
    #[error("unknown state commitment {0}")]
    UnknownState(StateCommitment),
    /// A batch proof failed to decode or to verify against its root.
    #[error("malformed proof: {0}")]
    MalformedProof(String),
    /// Two tries with the same root but different content were offered to
    /// a forest, or proof witnesses contradict each other.
    #[error("state conflict: {0}")]
    Conflict(String),
    /// A batch update was structurally invalid.
    #[error("invalid update: {0}")]
    InvalidUpdate(String),
}

impl LedgerError {
    /// Whether this error is the missing-path sentinel.
    pub fn is_missing_paths(&self) -> bool {
        matches!(self, LedgerError::MissingPaths { .. })
    }
}

impl ErrorCode for LedgerError {
    fn code(&self) -> &'static str {
        match self {
            Self::MissingPaths { .. } => "LEDGER_MISSING_PATHS",
            Self::UnknownState(_) => "LEDGER_UNKNOWN_STATE",
            Self::MalformedProof(_) => "LEDGER_MALFORMED_PROOF",
            Self::Conflict(_) => "LEDGER_CONFLICT",
            Self::InvalidUpdate(_) => "LEDGER_INVALID_UPDATE",
        }
    }
}

fn format_paths(paths: &[Path]) -> String {
    paths
        .iter()
        .map(|p| format!("{p:?}"))
        .collect::<Vec<_>>()
        .join(", ")
}
