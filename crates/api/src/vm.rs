//! The virtual machine seam and register views.
//!
//! The kernel never interprets transactions itself: it hands them to a
//! [`VirtualMachine`] together with a [`DeltaView`] over the ledger
//! fragment it controls. The view records every register touch in order,
//! which is what the SPoCK secret is derived from.

use std::collections::BTreeMap;

use parity_scale_codec::Encode;
use sha2::{Digest, Sha256};
use thiserror::Error;

use cascade_ledger::{RegisterKey, Value};
use cascade_types::error::ErrorCode;
use cascade_types::{Header, TransactionBody};

/// Errors raised by the virtual machine or the views it runs against.
///
/// These are infrastructure failures; a transaction failing on its own
/// terms is part of the execution result, not an error.
#[derive(Error, Debug)]
pub enum VmError {
    /// Reading a register from the underlying ledger failed.
    #[error("register read failed: {0}")]
    ReadFailed(String),
    /// A non-deterministic failure inside the machine.
    #[error("virtual machine internal error: {0}")]
    Internal(String),
}

impl ErrorCode for VmError {
    fn code(&self) -> &'static str {
        match self {
            Self::ReadFailed(_) => "VM_READ_FAILED",
            Self::Internal(_) => "VM_INTERNAL_ERROR",
        }
    }
}

/// Execution context handed to the machine alongside each transaction.
#[derive(Debug, Clone)]
pub struct VmContext {
    /// The chain being executed.
    pub chain_id: String,
    /// The chain's service account address.
    pub service_address: Vec<u8>,
    /// The header of the block being executed, once known.
    pub block_header: Option<Header>,
    /// Whether account creation is restricted to privileged accounts.
    pub restricted_account_creation: bool,
    /// Whether contract deployment is restricted to privileged accounts.
    pub restricted_deployment: bool,
    /// Whether service events are collected from execution.
    pub service_event_collection_enabled: bool,
}

impl VmContext {
    /// A default context for ordinary transactions on `chain_id`.
    pub fn new(chain_id: impl Into<String>, service_address: impl Into<Vec<u8>>) -> VmContext {
        VmContext {
            chain_id: chain_id.into(),
            service_address: service_address.into(),
            block_header: None,
            restricted_account_creation: true,
            restricted_deployment: true,
            service_event_collection_enabled: false,
        }
    }

    /// The same context scoped to a concrete block.
    pub fn with_block_header(&self, header: Header) -> VmContext {
        let mut ctx = self.clone();
        ctx.block_header = Some(header);
        ctx
    }

    /// Derives the relaxed context system chunks execute under: no
    /// account-creation or deployment restrictions, service events
    /// collected.
    pub fn system_chunk(&self) -> VmContext {
        let mut ctx = self.clone();
        ctx.restricted_account_creation = false;
        ctx.restricted_deployment = false;
        ctx.service_event_collection_enabled = true;
        ctx
    }
}

/// The protocol-defined housekeeping transaction executed as the last
/// chunk of every block, targeting the chain's service account.
pub fn system_chunk_transaction(service_address: &[u8]) -> TransactionBody {
    TransactionBody {
        script: b"cascade/system-chunk".to_vec(),
        arguments: vec![service_address.to_vec()],
    }
}

/// A transaction prepared for execution, carrying its index within the
/// chunk.
#[derive(Debug, Clone)]
pub struct TransactionProcedure {
    /// Position of the transaction in its chunk.
    pub index: u32,
    /// The transaction body.
    pub transaction: TransactionBody,
}

impl TransactionProcedure {
    /// Wraps a transaction body for execution at `index`.
    pub fn new(transaction: TransactionBody, index: u32) -> TransactionProcedure {
        TransactionProcedure { index, transaction }
    }
}

/// An opaque per-chunk program cache.
///
/// Verification creates a fresh cache per chunk: prior state may have
/// changed between chunks, so reusing compiled programs across chunks is
/// unsound there.
#[derive(Debug, Default)]
pub struct Programs {
    cache: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl Programs {
    /// An empty cache.
    pub fn new_empty() -> Programs {
        Programs::default()
    }

    /// Looks up a compiled program.
    pub fn get(&self, key: &[u8]) -> Option<&Vec<u8>> {
        self.cache.get(key)
    }

    /// Stores a compiled program.
    pub fn set(&mut self, key: Vec<u8>, program: Vec<u8>) {
        self.cache.insert(key, program);
    }
}

/// The machine that runs transactions. Implementations own the complete
/// semantics of transaction failure; `run` errors only for infrastructure
/// failures that invalidate the whole execution.
pub trait VirtualMachine: Send + Sync {
    /// Executes one transaction against `view`.
    fn run(
        &self,
        ctx: &VmContext,
        proc: &TransactionProcedure,
        view: &mut DeltaView<'_>,
        programs: &mut Programs,
    ) -> Result<(), VmError>;
}

/// The source a root view reads registers from.
pub trait BaseRead: Send + Sync {
    /// Reads a register; absent registers read as the empty value.
    fn read(&self, key: &RegisterKey) -> Result<Value, VmError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode)]
enum TouchKind {
    Read,
    Write,
}

/// One recorded register touch.
#[derive(Debug, Clone, Encode)]
struct Touch {
    kind: TouchKind,
    key: RegisterKey,
    value: Value,
}

enum ViewParent<'a> {
    Base(&'a dyn BaseRead),
    View(&'a DeltaView<'a>),
}

/// A layered register view.
///
/// Reads fall through to the parent layer; writes stay local until the
/// view is merged back. Every touch is recorded in order so that two
/// identical executions produce identical SPoCK secrets.
pub struct DeltaView<'a> {
    parent: ViewParent<'a>,
    delta: BTreeMap<RegisterKey, Value>,
    touches: Vec<Touch>,
}

impl<'a> DeltaView<'a> {
    /// A root view over `base`.
    pub fn new(base: &'a dyn BaseRead) -> DeltaView<'a> {
        DeltaView {
            parent: ViewParent::Base(base),
            delta: BTreeMap::new(),
            touches: Vec::new(),
        }
    }

    /// A child view layered on top of this one.
    pub fn new_child(&self) -> DeltaView<'_> {
        DeltaView {
            parent: ViewParent::View(self),
            delta: BTreeMap::new(),
            touches: Vec::new(),
        }
    }

    fn lookup(&self, key: &RegisterKey) -> Result<Value, VmError> {
        if let Some(value) = self.delta.get(key) {
            return Ok(value.clone());
        }
        match &self.parent {
            ViewParent::Base(base) => base.read(key),
            ViewParent::View(parent) => parent.lookup(key),
        }
    }

    /// Reads a register, recording the touch.
    pub fn get(&mut self, key: &RegisterKey) -> Result<Value, VmError> {
        let value = self.lookup(key)?;
        self.touches.push(Touch {
            kind: TouchKind::Read,
            key: key.clone(),
            value: value.clone(),
        });
        Ok(value)
    }

    /// Writes a register, recording the touch.
    pub fn set(&mut self, key: RegisterKey, value: Value) {
        self.touches.push(Touch {
            kind: TouchKind::Write,
            key: key.clone(),
            value: value.clone(),
        });
        self.delta.insert(key, value);
    }

    /// Consumes a child view into its delta and touch log, releasing the
    /// borrow on the parent so the parts can be merged back.
    pub fn into_parts(self) -> (BTreeMap<RegisterKey, Value>, ViewParts) {
        let delta = self.delta;
        (delta, ViewParts { touches: self.touches })
    }

    /// Merges a child's delta and touch log into this view. The child's
    /// writes win; its touches extend this view's log in order.
    pub fn merge_child(&mut self, delta: BTreeMap<RegisterKey, Value>, parts: ViewParts) {
        self.touches.extend(parts.touches);
        for (key, value) in delta {
            self.delta.insert(key, value);
        }
    }

    /// The registers written through this view, in key order.
    pub fn register_updates(&self) -> (Vec<RegisterKey>, Vec<Value>) {
        let mut keys = Vec::with_capacity(self.delta.len());
        let mut values = Vec::with_capacity(self.delta.len());
        for (key, value) in &self.delta {
            keys.push(key.clone());
            values.push(value.clone());
        }
        (keys, values)
    }

    /// The secret derived from the ordered touch log. Identical
    /// executions yield identical secrets.
    pub fn spock_secret(&self) -> Vec<u8> {
        let mut hasher = Sha256::new();
        for touch in &self.touches {
            hasher.update(touch.encode());
        }
        hasher.finalize().to_vec()
    }
}

/// The opaque touch log of a consumed view.
pub struct ViewParts {
    touches: Vec<Touch>,
}
