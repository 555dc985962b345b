//! The network seam.
//!
//! The transport (gossip, framing, peer management) is an external
//! collaborator. Engines register on a logical channel and receive a
//! conduit for publishing; inbound traffic is delivered through the
//! [`Engine`] trait.

use std::sync::Arc;

use async_trait::async_trait;

use cascade_types::error::EngineError;
use cascade_types::messages::{Channel, NetworkMessage};
use cascade_types::Identifier;

/// An engine as the network sees it: a sink for inbound events.
///
/// `process` is synchronous from the caller's perspective and propagates
/// the processing error; fire-and-forget submission is layered on top by
/// each engine.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Processes one inbound event from `origin`.
    async fn process(&self, origin: Identifier, event: NetworkMessage) -> Result<(), EngineError>;
}

/// A handle for publishing on one channel.
#[async_trait]
pub trait Conduit: Send + Sync {
    /// Publishes a message to the given targets. Per-call timeouts are
    /// enforced by the transport.
    async fn publish(
        &self,
        message: NetworkMessage,
        targets: &[Identifier],
    ) -> Result<(), EngineError>;
}

/// The node's network attachment point.
pub trait Network: Send + Sync {
    /// Registers `engine` on `channel` and returns the conduit for it.
    fn register(
        &self,
        channel: Channel,
        engine: Arc<dyn Engine>,
    ) -> Result<Arc<dyn Conduit>, EngineError>;
}
