#![forbid(unsafe_code)]

//! # Cascade Verification
//!
//! The verification node's core: the [`ChunkVerifier`] re-executes a
//! chunk's transactions against the partial ledger witnessed by its chunk
//! data pack, and the [`RequesterEngine`] keeps fetching the data packs
//! the verifier needs until they arrive.

mod requester;
mod verifier;

pub use requester::{RequesterConfig, RequesterEngine};
pub use verifier::{ChunkVerifier, VerificationError, Verdict};
