#![forbid(unsafe_code)]

//! # Cascade Storage
//!
//! Storage implementations behind the `cascade_api::storage` seams.
//!
//! [`memory`] holds lock-guarded in-memory stores plus a reference
//! protocol state; they back the engines' unit tests and any role that
//! keeps its indices hot. [`chaindb`] persists the chain index — block
//! bodies, the height→ID index, and the finalized/sealed/root height
//! scalars — in a single `redb` file with real transactions.

pub mod chaindb;
pub mod memory;
