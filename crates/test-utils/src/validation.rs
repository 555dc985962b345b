//! Validator and assigner doubles.

use std::collections::HashMap;

use parking_lot::Mutex;

use cascade_api::validation::{
    Assigner, Assignment, ApprovalValidator, ReceiptValidator, ValidationError,
};
use cascade_types::{ExecutionReceipt, Identifier, IncorporatedResult, ResultApproval};

/// Accepts every receipt and approval.
#[derive(Default)]
pub struct AcceptAll;

impl ReceiptValidator for AcceptAll {
    fn validate(&self, _receipt: &ExecutionReceipt) -> Result<(), ValidationError> {
        Ok(())
    }
}

impl ApprovalValidator for AcceptAll {
    fn validate(&self, _approval: &ResultApproval) -> Result<(), ValidationError> {
        Ok(())
    }
}

/// Rejects listed entities, accepts the rest.
#[derive(Default)]
pub struct Denylist {
    rejected: Mutex<Vec<Identifier>>,
}

impl Denylist {
    /// An empty denylist.
    pub fn new() -> Denylist {
        Denylist::default()
    }

    /// Rejects the entity with this ID from now on.
    pub fn deny(&self, id: Identifier) {
        self.rejected.lock().push(id);
    }

    fn is_denied(&self, id: Identifier) -> bool {
        self.rejected.lock().contains(&id)
    }
}

impl ReceiptValidator for Denylist {
    fn validate(&self, receipt: &ExecutionReceipt) -> Result<(), ValidationError> {
        if self.is_denied(receipt.id()) {
            return Err(ValidationError::InvalidSignature);
        }
        Ok(())
    }
}

impl ApprovalValidator for Denylist {
    fn validate(&self, approval: &ResultApproval) -> Result<(), ValidationError> {
        if self.is_denied(approval.id()) {
            return Err(ValidationError::InvalidSignature);
        }
        Ok(())
    }
}

/// Assigns a fixed verifier committee to every chunk of every result.
pub struct FixedAssigner {
    verifiers: Vec<Identifier>,
}

impl FixedAssigner {
    /// Every chunk gets `verifiers` as its committee.
    pub fn new(verifiers: Vec<Identifier>) -> FixedAssigner {
        FixedAssigner { verifiers }
    }
}

impl Assigner for FixedAssigner {
    fn assign(
        &self,
        incorporated_result: &IncorporatedResult,
    ) -> Result<Assignment, ValidationError> {
        let mut assignment = Assignment::new();
        for chunk in &incorporated_result.result.chunks {
            assignment.add(chunk.index, self.verifiers.clone());
        }
        Ok(assignment)
    }
}

/// Assigns per-chunk committees configured by the test.
#[derive(Default)]
pub struct TableAssigner {
    by_chunk: HashMap<u64, Vec<Identifier>>,
}

impl TableAssigner {
    /// Builds an assigner from explicit (chunk index, committee) rows.
    pub fn new(rows: impl IntoIterator<Item = (u64, Vec<Identifier>)>) -> TableAssigner {
        TableAssigner {
            by_chunk: rows.into_iter().collect(),
        }
    }
}

impl Assigner for TableAssigner {
    fn assign(
        &self,
        _incorporated_result: &IncorporatedResult,
    ) -> Result<Assignment, ValidationError> {
        let mut assignment = Assignment::new();
        for (chunk, verifiers) in &self.by_chunk {
            assignment.add(*chunk, verifiers.clone());
        }
        Ok(assignment)
    }
}
