//! An in-memory network hub.
//!
//! The hub connects engines registered on logical channels without any
//! transport: published messages are recorded for inspection and can be
//! delivered synchronously to the engines registered on the same channel
//! of peer hubs.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use cascade_api::network::{Conduit, Engine, Network};
use cascade_types::error::EngineError;
use cascade_types::messages::{Channel, NetworkMessage};
use cascade_types::Identifier;

/// One message published through a stub conduit.
#[derive(Clone)]
pub struct PublishedMessage {
    /// The channel the message went out on.
    pub channel: Channel,
    /// The published message.
    pub message: NetworkMessage,
    /// The requested recipients.
    pub targets: Vec<Identifier>,
}

#[derive(Default)]
struct HubState {
    engines: HashMap<Channel, Vec<Arc<dyn Engine>>>,
    published: Vec<PublishedMessage>,
}

/// A process-local message hub standing in for the transport.
#[derive(Clone, Default)]
pub struct StubHub {
    state: Arc<Mutex<HubState>>,
}

impl StubHub {
    /// A fresh hub with no registered engines.
    pub fn new() -> StubHub {
        StubHub::default()
    }

    /// Everything published so far, in order.
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.state.lock().published.clone()
    }

    /// Drops the publish log.
    pub fn clear_published(&self) {
        self.state.lock().published.clear();
    }

    /// Delivers an event to every engine registered on `channel`,
    /// propagating the first processing error.
    pub async fn deliver(
        &self,
        channel: Channel,
        origin: Identifier,
        event: NetworkMessage,
    ) -> Result<(), EngineError> {
        let engines: Vec<Arc<dyn Engine>> = self
            .state
            .lock()
            .engines
            .get(&channel)
            .cloned()
            .unwrap_or_default();
        for engine in engines {
            engine.process(origin, event.clone()).await?;
        }
        Ok(())
    }
}

struct StubConduit {
    channel: Channel,
    state: Arc<Mutex<HubState>>,
}

#[async_trait]
impl Conduit for StubConduit {
    async fn publish(
        &self,
        message: NetworkMessage,
        targets: &[Identifier],
    ) -> Result<(), EngineError> {
        self.state.lock().published.push(PublishedMessage {
            channel: self.channel,
            message,
            targets: targets.to_vec(),
        });
        Ok(())
    }
}

impl Network for StubHub {
    fn register(
        &self,
        channel: Channel,
        engine: Arc<dyn Engine>,
    ) -> Result<Arc<dyn Conduit>, EngineError> {
        let mut state = self.state.lock();
        state.engines.entry(channel).or_default().push(engine);
        Ok(Arc::new(StubConduit {
            channel,
            state: Arc::clone(&self.state),
        }))
    }
}

/// A conduit that fails every publish, for exercising error paths.
pub struct FailingConduit;

#[async_trait]
impl Conduit for FailingConduit {
    async fn publish(
        &self,
        _message: NetworkMessage,
        _targets: &[Identifier],
    ) -> Result<(), EngineError> {
        Err(EngineError::Network("stub publish failure".to_string()))
    }
}
