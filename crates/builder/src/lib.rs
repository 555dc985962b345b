#![forbid(unsafe_code)]

//! # Cascade Builder
//!
//! The consensus payload builder. Given a parent block on some fork, it
//! assembles the maximal valid payload for that fork — collection
//! guarantees, execution receipts and results, and seals — and extends
//! protocol state with the candidate. Every selection step consults only
//! data reachable from the parent: nothing known solely through a
//! sibling fork can enter the payload.

mod builder;

pub use builder::{Builder, BuilderConfig};
