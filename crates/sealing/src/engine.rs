//! The sealing engine front-end.
//!
//! Queues inbound receipts and approvals and drains them through the
//! [`SealingCore`] in a single worker, so core processing is strictly
//! sequential even though the network delivers concurrently. Events are
//! only ordered within this engine's own queues; the core tolerates any
//! cross-engine interleaving by discarding approvals for unknown results.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use cascade_api::network::Engine;
use cascade_api::unit::Unit;
use cascade_types::error::EngineError;
use cascade_types::messages::NetworkMessage;
use cascade_types::{ExecutionReceipt, Identifier, ResultApproval};

use crate::core::SealingCore;

enum QueuedEvent {
    Receipt(Identifier, Box<ExecutionReceipt>),
    Approval(Identifier, Box<ResultApproval>),
}

/// The queued front-end around the sealing core.
pub struct SealingEngine {
    unit: Unit,
    core: Arc<SealingCore>,
    sender: mpsc::UnboundedSender<QueuedEvent>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<QueuedEvent>>>,
}

impl SealingEngine {
    /// Wraps `core` with inbound queues.
    pub fn new(core: Arc<SealingCore>) -> Arc<SealingEngine> {
        let (sender, receiver) = mpsc::unbounded_channel();
        Arc::new(SealingEngine {
            unit: Unit::new(),
            core,
            sender,
            receiver: Mutex::new(Some(receiver)),
        })
    }

    /// The wrapped core.
    pub fn core(&self) -> &Arc<SealingCore> {
        &self.core
    }

    /// Starts the worker that drains the queues.
    pub fn ready(self: &Arc<Self>) {
        let core = Arc::clone(&self.core);
        let mut receiver = self
            .receiver
            .lock()
            .take()
            .expect("sealing engine started twice");
        let mut shutdown = self.unit.ctx();
        self.unit.launch(async move {
            loop {
                tokio::select! {
                    event = receiver.recv() => {
                        let Some(event) = event else { break };
                        Self::handle(&core, event);
                    }
                    _ = shutdown.changed() => break,
                }
            }
        });
    }

    /// Stops the worker; queued events that were not yet drained are
    /// dropped (the network re-delivers).
    pub async fn done(&self) {
        self.unit.done().await;
    }

    fn handle(core: &SealingCore, event: QueuedEvent) {
        let outcome = match event {
            QueuedEvent::Receipt(origin, receipt) => {
                core.process_receipt(origin, &receipt).map(|_| ())
            }
            QueuedEvent::Approval(origin, approval) => core.process_approval(origin, &approval),
        };
        if let Err(e) = outcome {
            tracing::warn!(target: "sealing", event = "event_rejected", error = %e);
        }
    }

    /// Fire-and-forget submission; queue errors are logged.
    pub fn submit(self: &Arc<Self>, origin: Identifier, event: NetworkMessage) {
        let engine = Arc::clone(self);
        self.unit.launch(async move {
            if let Err(e) = engine.process(origin, event).await {
                tracing::error!(target: "sealing", event = "submit_failed", error = %e);
            }
        });
    }
}

#[async_trait]
impl Engine for SealingEngine {
    async fn process(&self, origin: Identifier, event: NetworkMessage) -> Result<(), EngineError> {
        let queued = match event {
            NetworkMessage::ExecutionReceipt(receipt) => {
                QueuedEvent::Receipt(origin, Box::new(receipt))
            }
            NetworkMessage::ResultApproval(approval) => {
                QueuedEvent::Approval(origin, Box::new(approval))
            }
            _ => return Err(EngineError::InvalidEventType("sealing")),
        };
        self.sender
            .send(queued)
            .map_err(|_| EngineError::Terminating)
    }
}
