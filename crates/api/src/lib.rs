#![forbid(unsafe_code)]

//! # Cascade Kernel API
//!
//! The trait seams between the kernel's engines and their collaborators.
//! Everything the engines consume — virtual machine, protocol state,
//! storage, network conduits, mempools, validators — is specified here so
//! that node roles can wire concrete implementations (or test doubles)
//! without the engines knowing the difference.
//!
//! The crate also hosts the [`unit::Unit`] lifecycle helper that every
//! engine is built on.

pub mod mempool;
pub mod network;
pub mod protocol;
pub mod storage;
pub mod unit;
pub mod validation;
pub mod vm;
