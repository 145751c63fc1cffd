//! In-memory message bus backend.
//!
//! Backs integration tests and stub quota authorities. Topics are
//! broadcast channels: every subscriber sees every message published
//! after it subscribed, and publishing to a topic nobody listens on
//! silently drops the message, matching fire-and-forget semantics.

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use tokio::sync::{broadcast, mpsc};

use metron_bus::{BusError, MessageBus, Subscription};

/// Buffered messages per topic before slow subscribers start lagging.
const TOPIC_CAPACITY: usize = 256;

/// In-memory [`MessageBus`] built on per-topic broadcast channels.
#[derive(Default)]
pub struct MemoryBus {
    topics: DashMap<String, broadcast::Sender<Bytes>>,
}

impl MemoryBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn sender(&self, topic: &str) -> broadcast::Sender<Bytes> {
        self.topics
            .entry(topic.to_owned())
            .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0)
            .clone()
    }
}

impl std::fmt::Debug for MemoryBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBus")
            .field("topics", &self.topics.len())
            .finish()
    }
}

#[async_trait]
impl MessageBus for MemoryBus {
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), BusError> {
        // A send error only means no subscriber exists right now; the
        // message is dropped, which is exactly fire-and-forget.
        let _ = self.sender(topic).send(payload);
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<Subscription, BusError> {
        let mut source = self.sender(topic).subscribe();
        let (tx, rx) = mpsc::channel(TOPIC_CAPACITY);

        tokio::spawn(async move {
            loop {
                match source.recv().await {
                    Ok(payload) => {
                        if tx.send(payload).await.is_err() {
                            break; // subscriber dropped
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Ok(Subscription::new(rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn conformance() {
        let bus = MemoryBus::new();
        metron_bus::testing::run_bus_conformance_tests(&bus)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn subscriber_only_sees_messages_after_subscribing() {
        let bus = MemoryBus::new();
        bus.publish("t", Bytes::from_static(b"early")).await.unwrap();
        let mut sub = bus.subscribe("t").await.unwrap();
        bus.publish("t", Bytes::from_static(b"late")).await.unwrap();
        assert_eq!(sub.recv().await.as_deref(), Some(&b"late"[..]));
    }

    #[tokio::test]
    async fn publish_after_subscriber_dropped_succeeds() {
        let bus = MemoryBus::new();
        let sub = bus.subscribe("t").await.unwrap();
        drop(sub);
        bus.publish("t", Bytes::from_static(b"x")).await.unwrap();
    }

    #[tokio::test]
    async fn interleaved_topics() {
        let bus = MemoryBus::new();
        let mut a = bus.subscribe("a").await.unwrap();
        let mut b = bus.subscribe("b").await.unwrap();
        bus.publish("b", Bytes::from_static(b"1")).await.unwrap();
        bus.publish("a", Bytes::from_static(b"2")).await.unwrap();
        assert_eq!(a.recv().await.as_deref(), Some(&b"2"[..]));
        assert_eq!(b.recv().await.as_deref(), Some(&b"1"[..]));
    }
}
