use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::BusError;

/// Trait for publishing and subscribing to logical channels.
///
/// Implementations must be `Send + Sync` and safe for concurrent access.
/// Delivery is at-least-once at best: a backend may redeliver, reorder
/// across topics, or drop messages published to a topic with no
/// subscribers. Consumers correlate and deduplicate by message content,
/// never by delivery order.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Publish a payload to a topic. Succeeds even when nobody is
    /// subscribed; fire-and-forget topics rely on this.
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), BusError>;

    /// Open a subscription receiving every message published to `topic`
    /// from this point on.
    async fn subscribe(&self, topic: &str) -> Result<Subscription, BusError>;
}

/// A live subscription to a single topic.
///
/// Backends pump messages into the channel handed to
/// [`Subscription::new`]; dropping the subscription ends the pump.
pub struct Subscription {
    receiver: mpsc::Receiver<Bytes>,
}

impl Subscription {
    /// Wrap a receiver fed by the backend.
    #[must_use]
    pub fn new(receiver: mpsc::Receiver<Bytes>) -> Self {
        Self { receiver }
    }

    /// Receive the next message, or `None` once the backend drops the
    /// topic.
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.receiver.recv().await
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}
