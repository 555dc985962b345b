//! The chunk verifier.
//!
//! Re-executes a chunk's transactions through the virtual machine against
//! a partial trie reconstructed from the chunk data pack, then checks the
//! recomputed end state against the one the receipt declares.
//!
//! Verdicts and faults are separate from errors: a [`ChunkFault`] is
//! evidence for a slashing challenge and travels in the `Ok` branch; an
//! `Err` means the verifier could not reach any verdict and should retry
//! with a fresh data pack.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use cascade_api::vm::{
    system_chunk_transaction, BaseRead, DeltaView, Programs, TransactionProcedure, VirtualMachine,
    VmContext, VmError,
};
use cascade_ledger::{LedgerError, PartialTrie, Path, RegisterKey, Value};
use cascade_types::error::ErrorCode;
use cascade_types::{ChunkFault, StateCommitment, VerifiableChunkData};

/// The verifier's verdict on a chunk.
#[derive(Debug)]
pub enum Verdict {
    /// The chunk re-executed cleanly; the SPoCK secret binds this
    /// verifier to the observed state-touch sequence.
    Passed {
        /// The SPoCK secret derived from the chunk view.
        spock: Vec<u8>,
    },
    /// The chunk is provably wrong; the fault justifies a challenge.
    Faulted(ChunkFault),
}

/// Internal failures that prevent any verdict.
#[derive(Error, Debug)]
pub enum VerificationError {
    /// `verify` was called on a system chunk, or `verify_system_chunk` on
    /// an ordinary one.
    #[error("wrong method invoked for {0} chunk")]
    WrongChunkType(&'static str),
    /// A transaction aborted inside the machine for infrastructure
    /// reasons.
    #[error("failed to execute transaction {index}: {source}")]
    Execution {
        /// Index of the failing transaction within the chunk.
        index: u32,
        /// The underlying machine failure.
        #[source]
        source: VmError,
    },
    /// The ledger failed outside the missing-path discipline.
    #[error("ledger failure: {0}")]
    Ledger(#[from] LedgerError),
}

impl ErrorCode for VerificationError {
    fn code(&self) -> &'static str {
        match self {
            Self::WrongChunkType(_) => "VERIFY_WRONG_CHUNK_TYPE",
            Self::Execution { .. } => "VERIFY_EXECUTION_FAILED",
            Self::Ledger(_) => "VERIFY_LEDGER_FAILURE",
        }
    }
}

/// Re-executes chunks and classifies their faults.
pub struct ChunkVerifier {
    vm: Arc<dyn VirtualMachine>,
    vm_ctx: VmContext,
    system_chunk_ctx: VmContext,
}

impl ChunkVerifier {
    /// A verifier executing through `vm` under `vm_ctx`.
    pub fn new(vm: Arc<dyn VirtualMachine>, vm_ctx: VmContext) -> ChunkVerifier {
        let system_chunk_ctx = vm_ctx.system_chunk();
        ChunkVerifier {
            vm,
            vm_ctx,
            system_chunk_ctx,
        }
    }

    /// Verifies an ordinary chunk by executing its collection.
    ///
    /// Refuses to run on system chunks.
    pub fn verify(&self, vc: &VerifiableChunkData) -> Result<Verdict, VerificationError> {
        if vc.is_system_chunk {
            return Err(VerificationError::WrongChunkType("system"));
        }
        let procedures: Vec<TransactionProcedure> = vc
            .collection
            .transactions
            .iter()
            .enumerate()
            .map(|(i, tx)| TransactionProcedure::new(tx.clone(), i as u32))
            .collect();
        let ctx = self.vm_ctx.with_block_header(vc.header.clone());
        self.verify_in_context(&ctx, vc, &procedures)
    }

    /// Verifies a system chunk by executing the protocol's housekeeping
    /// transaction under the relaxed system context.
    ///
    /// Refuses to run on ordinary chunks.
    pub fn verify_system_chunk(
        &self,
        vc: &VerifiableChunkData,
    ) -> Result<Verdict, VerificationError> {
        if !vc.is_system_chunk {
            return Err(VerificationError::WrongChunkType("non-system"));
        }
        let tx = system_chunk_transaction(&self.system_chunk_ctx.service_address);
        let procedures = vec![TransactionProcedure::new(tx, 0)];
        let ctx = self.system_chunk_ctx.with_block_header(vc.header.clone());
        self.verify_in_context(&ctx, vc, &procedures)
    }

    fn verify_in_context(
        &self,
        ctx: &VmContext,
        vc: &VerifiableChunkData,
        procedures: &[TransactionProcedure],
    ) -> Result<Verdict, VerificationError> {
        let chunk_index = vc.chunk.index;
        let result_id = vc.result.id();
        let pack = &vc.chunk_data_pack;

        // reconstruct the witnessed ledger fragment
        let mut trie = match PartialTrie::new(&pack.proof, pack.start_state) {
            Ok(trie) => trie,
            Err(e) => {
                return Ok(Verdict::Faulted(ChunkFault::InvalidVerifiableChunk {
                    chunk_index,
                    execution_result_id: result_id,
                    reason: format!("error constructing partial trie: {e}"),
                }));
            }
        };

        // programs are never reused across chunks: state may have changed
        // between them
        let mut programs = Programs::new_empty();

        let reader = ChunkReader {
            trie: &trie,
            unknown: Mutex::new(BTreeMap::new()),
        };

        let (spock, update_keys, update_values) = {
            let mut chunk_view = DeltaView::new(&reader);
            for proc in procedures {
                let run_result = {
                    let mut tx_view = chunk_view.new_child();
                    self.vm
                        .run(ctx, proc, &mut tx_view, &mut programs)
                        .map(|()| tx_view.into_parts())
                };
                match run_result {
                    Ok((delta, parts)) => {
                        // the machine owns transaction-level error
                        // semantics; the view is merged unconditionally
                        chunk_view.merge_child(delta, parts);
                    }
                    Err(source) => {
                        return Err(VerificationError::Execution {
                            index: proc.index,
                            source,
                        });
                    }
                }
            }
            let (keys, values) = chunk_view.register_updates();
            (chunk_view.spock_secret(), keys, values)
        };

        let unknown = {
            let ChunkReader { unknown, .. } = reader;
            unknown.into_inner()
        };
        if !unknown.is_empty() {
            return Ok(Verdict::Faulted(ChunkFault::MissingRegisterTouch {
                chunk_index,
                execution_result_id: result_id,
                registers: unknown.values().map(|k| k.to_string()).collect(),
            }));
        }

        // apply the chunk's register updates to the fragment and compare
        // the recomputed root with the declared end state
        let paths: Vec<Path> = update_keys.iter().map(RegisterKey::path).collect();
        let computed = match trie.set(&paths, &update_values) {
            Ok(root) => StateCommitment(root),
            Err(LedgerError::MissingPaths { paths }) => {
                return Ok(Verdict::Faulted(ChunkFault::MissingRegisterTouch {
                    chunk_index,
                    execution_result_id: result_id,
                    registers: paths.iter().map(|p| p.to_string()).collect(),
                }));
            }
            Err(e) => return Err(e.into()),
        };

        if computed != vc.end_state {
            return Ok(Verdict::Faulted(ChunkFault::NonMatchingFinalState {
                chunk_index,
                execution_result_id: result_id,
                computed,
                declared: vc.end_state,
            }));
        }

        Ok(Verdict::Passed { spock })
    }
}

/// Base reads for the chunk view: witnessed registers come from the
/// partial trie; unwitnessed reads return the empty value and are
/// recorded, because a single uncovered touch invalidates the whole
/// chunk after execution.
struct ChunkReader<'a> {
    trie: &'a PartialTrie,
    unknown: Mutex<BTreeMap<Path, RegisterKey>>,
}

impl BaseRead for ChunkReader<'_> {
    fn read(&self, key: &RegisterKey) -> Result<Value, VmError> {
        let path = key.path();
        match self.trie.get(&[path]) {
            Ok(mut values) => Ok(values.pop().unwrap_or_default()),
            Err(e) if e.is_missing_paths() => {
                self.unknown.lock().insert(path, key.clone());
                Ok(Vec::new())
            }
            Err(e) => Err(VmError::ReadFailed(e.to_string())),
        }
    }
}
