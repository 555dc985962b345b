//! The chunk-data-pack requester engine.
//!
//! Keeps dispatching `ChunkDataRequest`s for every pending chunk until a
//! response arrives, then hands the pack to the registered handler
//! exactly once. Retry pacing is delegated to the qualifier and updater
//! functions consulted against the pending-request pool, which is the
//! single source of truth for retry permission.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;

use cascade_api::mempool::{ChunkRequests, RequestHistory};
use cascade_api::network::{Conduit, Engine, Network};
use cascade_api::protocol::ProtocolState;
use cascade_api::unit::Unit;
use cascade_api::validation::ChunkDataPackHandler;
use cascade_types::error::EngineError;
use cascade_types::messages::{Channel, ChunkDataRequest, NetworkMessage};
use cascade_types::{ChunkDataPack, ChunkDataPackRequest, Collection, Identifier};

/// Tunables for the requester.
#[derive(Debug, Clone)]
pub struct RequesterConfig {
    /// Interval of the retry timer.
    pub retry_interval: Duration,
    /// Maximum number of executors asked per dispatch.
    pub request_targets: usize,
}

impl Default for RequesterConfig {
    fn default() -> Self {
        RequesterConfig {
            retry_interval: Duration::from_secs(10),
            request_targets: 2,
        }
    }
}

type Qualifier = Box<dyn Fn(&RequestHistory) -> bool + Send + Sync>;
type Updater = Box<dyn Fn(RequestHistory) -> RequestHistory + Send + Sync>;

/// The requester engine.
pub struct RequesterEngine {
    unit: Unit,
    state: Arc<dyn ProtocolState>,
    pending: Arc<dyn ChunkRequests>,
    conduit: OnceLock<Arc<dyn Conduit>>,
    handler: OnceLock<Arc<dyn ChunkDataPackHandler>>,
    qualifier: Qualifier,
    updater: Updater,
    config: RequesterConfig,
}

impl RequesterEngine {
    /// Creates the engine; attach the network and handler before calling
    /// [`ready`](Self::ready).
    pub fn new(
        state: Arc<dyn ProtocolState>,
        pending: Arc<dyn ChunkRequests>,
        config: RequesterConfig,
        qualifier: impl Fn(&RequestHistory) -> bool + Send + Sync + 'static,
        updater: impl Fn(RequestHistory) -> RequestHistory + Send + Sync + 'static,
    ) -> Arc<RequesterEngine> {
        Arc::new(RequesterEngine {
            unit: Unit::new(),
            state,
            pending,
            conduit: OnceLock::new(),
            handler: OnceLock::new(),
            qualifier: Box::new(qualifier),
            updater: Box::new(updater),
            config,
        })
    }

    /// Registers the engine on the chunk-request channel.
    pub fn attach_network(self: &Arc<Self>, network: &dyn Network) -> Result<(), EngineError> {
        let conduit = network.register(Channel::RequestChunks, Arc::clone(self) as Arc<dyn Engine>)?;
        self.conduit
            .set(conduit)
            .map_err(|_| EngineError::Internal("network attached twice".to_string()))
    }

    /// Registers the downstream consumer of delivered chunk data packs.
    pub fn with_handler(&self, handler: Arc<dyn ChunkDataPackHandler>) {
        if self.handler.set(handler).is_err() {
            tracing::warn!(target: "requester", event = "handler_replaced_ignored");
        }
    }

    /// Starts the periodic retry loop. Fails if no handler is attached:
    /// delivered packs would have nowhere to go.
    pub fn ready(self: &Arc<Self>) -> Result<(), EngineError> {
        if self.handler.get().is_none() {
            return Err(EngineError::Internal(
                "requester started without a chunk data pack handler".to_string(),
            ));
        }
        let engine = Arc::clone(self);
        self.unit.launch_periodically(
            move || {
                let engine = Arc::clone(&engine);
                async move { engine.on_timer().await }
            },
            self.config.retry_interval,
            Duration::ZERO,
        );
        Ok(())
    }

    /// Stops the retry loop, letting an in-flight tick finish.
    pub async fn done(&self) {
        self.unit.done().await;
    }

    /// Accepts a chunk data pack request for dispatch.
    pub fn request(&self, request: ChunkDataPackRequest) {
        let added = self.pending.add(request.clone());
        tracing::info!(
            target: "requester",
            event = "request_arrived",
            chunk_id = ?request.chunk_id,
            block_height = request.height,
            agree_executors = request.agrees.len(),
            disagree_executors = request.disagrees.len(),
            added_to_pending = added,
        );
    }

    /// Fire-and-forget event submission; processing errors are logged.
    pub fn submit(self: &Arc<Self>, origin: Identifier, event: NetworkMessage) {
        let engine = Arc::clone(self);
        self.unit.launch(async move {
            if let Err(e) = engine.process(origin, event).await {
                tracing::error!(target: "requester", event = "process_failed", error = %e);
            }
        });
    }

    /// One pass over all pending requests.
    pub(crate) async fn on_timer(&self) {
        let pending = self.pending.all();
        tracing::debug!(
            target: "requester",
            event = "retry_tick",
            total = pending.len(),
        );

        let last_sealed = match self.state.sealed_head() {
            Ok(header) => header.height,
            Err(e) => {
                tracing::error!(
                    target: "requester",
                    event = "sealed_head_unavailable",
                    error = %e,
                );
                return;
            }
        };

        for request in pending {
            self.handle_pending_request(&request, last_sealed).await;
        }
    }

    async fn handle_pending_request(&self, request: &ChunkDataPackRequest, last_sealed: u64) {
        // chunks of sealed blocks no longer need verification
        if request.height <= last_sealed {
            let removed = self.pending.remove(request.chunk_id);
            if let Some(handler) = self.handler.get() {
                handler.notify_chunk_data_pack_sealed(request.chunk_id);
            }
            tracing::info!(
                target: "requester",
                event = "sealed_request_dropped",
                chunk_id = ?request.chunk_id,
                removed,
            );
            return;
        }

        let qualified = self
            .pending
            .request_history(request.chunk_id)
            .map(|history| (self.qualifier)(&history))
            .unwrap_or(false);
        if !qualified {
            tracing::debug!(
                target: "requester",
                event = "request_not_qualified",
                chunk_id = ?request.chunk_id,
            );
            return;
        }

        if let Err(e) = self.dispatch(request).await {
            tracing::error!(
                target: "requester",
                event = "dispatch_failed",
                chunk_id = ?request.chunk_id,
                error = %e,
            );
            return;
        }

        match self
            .pending
            .update_request_history(request.chunk_id, &*self.updater)
        {
            Some(history) => tracing::info!(
                target: "requester",
                event = "request_dispatched",
                chunk_id = ?request.chunk_id,
                attempts = history.attempts,
                retry_after_ms = history.retry_after.as_millis() as u64,
            ),
            None => tracing::info!(
                target: "requester",
                event = "request_dispatched",
                chunk_id = ?request.chunk_id,
                pending_request_updated = false,
            ),
        }
    }

    async fn dispatch(&self, request: &ChunkDataPackRequest) -> Result<(), EngineError> {
        let conduit = self
            .conduit
            .get()
            .ok_or_else(|| EngineError::Internal("requester has no conduit".to_string()))?;
        let message = NetworkMessage::ChunkDataRequest(ChunkDataRequest {
            chunk_id: request.chunk_id,
            // a fresh nonce per dispatch keeps receiver-side dedup from
            // swallowing retries
            nonce: rand::random(),
        });
        let targets = request.sample_targets(self.config.request_targets);
        conduit.publish(message, &targets).await
    }

    fn handle_chunk_data_pack(
        &self,
        origin: Identifier,
        chunk_data_pack: ChunkDataPack,
        collection: Collection,
    ) {
        let chunk_id = chunk_data_pack.chunk_id;
        tracing::debug!(
            target: "requester",
            event = "chunk_data_pack_received",
            chunk_id = ?chunk_id,
            origin = ?origin,
        );

        // only deliver while the request is still pending; concurrent or
        // repeated responses find nothing to remove and are dropped
        let removed = self.pending.remove(chunk_id);
        if !removed {
            tracing::debug!(
                target: "requester",
                event = "stale_chunk_data_pack_dropped",
                chunk_id = ?chunk_id,
            );
            return;
        }

        if let Some(handler) = self.handler.get() {
            handler.handle_chunk_data_pack(origin, chunk_data_pack, collection);
            tracing::info!(
                target: "requester",
                event = "chunk_data_pack_delivered",
                chunk_id = ?chunk_id,
            );
        }
    }
}

#[async_trait]
impl Engine for RequesterEngine {
    async fn process(&self, origin: Identifier, event: NetworkMessage) -> Result<(), EngineError> {
        match event {
            NetworkMessage::ChunkDataResponse(response) => {
                self.unit
                    .do_serial(async {
                        self.handle_chunk_data_pack(
                            origin,
                            response.chunk_data_pack,
                            response.collection,
                        );
                    })
                    .await;
                Ok(())
            }
            _ => Err(EngineError::InvalidEventType("requester")),
        }
    }
}
