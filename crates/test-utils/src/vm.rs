//! A deterministic scripted virtual machine.
//!
//! The mock machine interprets a transaction's script as a SCALE-encoded
//! list of register operations, which lets tests choose exactly which
//! registers an execution touches. A reserved script makes the machine
//! fail with an internal error, for exercising the fault-vs-error split.

use parity_scale_codec::{Decode, Encode};

use cascade_api::vm::{
    DeltaView, Programs, TransactionProcedure, VirtualMachine, VmContext, VmError,
};
use cascade_ledger::RegisterKey;
use cascade_types::TransactionBody;

/// Script bytes that make [`ScriptedVm`] fail with an internal error.
pub const FAILING_SCRIPT: &[u8] = b"cascade-test/vm-failure";

/// One register operation a scripted transaction performs.
#[derive(Encode, Decode, Debug, Clone)]
pub enum RegisterOp {
    /// Read a register.
    Read(RegisterKey),
    /// Write a value to a register.
    Write(RegisterKey, Vec<u8>),
}

/// Builds a transaction that performs `ops` in order.
pub fn scripted_transaction(ops: &[RegisterOp]) -> TransactionBody {
    TransactionBody {
        script: ops.to_vec().encode(),
        arguments: vec![],
    }
}

/// A transaction that fails inside the machine.
pub fn failing_transaction() -> TransactionBody {
    TransactionBody {
        script: FAILING_SCRIPT.to_vec(),
        arguments: vec![],
    }
}

/// A machine replaying scripted register operations.
#[derive(Default)]
pub struct ScriptedVm;

impl ScriptedVm {
    /// A fresh machine.
    pub fn new() -> ScriptedVm {
        ScriptedVm
    }
}

impl VirtualMachine for ScriptedVm {
    fn run(
        &self,
        _ctx: &VmContext,
        proc: &TransactionProcedure,
        view: &mut DeltaView<'_>,
        _programs: &mut Programs,
    ) -> Result<(), VmError> {
        if proc.transaction.script == FAILING_SCRIPT {
            return Err(VmError::Internal("scripted failure".to_string()));
        }
        let ops = Vec::<RegisterOp>::decode(&mut proc.transaction.script.as_slice())
            .map_err(|e| VmError::Internal(format!("unreadable script: {e}")))?;
        for op in ops {
            match op {
                RegisterOp::Read(key) => {
                    view.get(&key)?;
                }
                RegisterOp::Write(key, value) => {
                    view.set(key, value);
                }
            }
        }
        Ok(())
    }
}
