#![forbid(unsafe_code)]

//! # Cascade Test Utilities
//!
//! Entity fixtures and test doubles shared by the kernel's test suites.
//! Fixtures produce structurally valid entities with randomized
//! identities; doubles implement the `cascade_api` seams with observable,
//! scriptable behavior.

pub mod fixtures;
pub mod network;
pub mod protocol;
pub mod validation;
pub mod vm;
