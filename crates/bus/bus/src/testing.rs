use bytes::Bytes;

use crate::error::BusError;
use crate::transport::MessageBus;

/// Run the full bus conformance test suite.
///
/// Call this from your backend's test module with a fresh bus instance.
///
/// # Errors
///
/// Returns an error if any conformance test fails.
pub async fn run_bus_conformance_tests(bus: &dyn MessageBus) -> Result<(), BusError> {
    test_publish_without_subscribers(bus).await?;
    test_subscribe_then_publish(bus).await?;
    test_fan_out(bus).await?;
    test_topics_are_isolated(bus).await?;
    Ok(())
}

async fn test_publish_without_subscribers(bus: &dyn MessageBus) -> Result<(), BusError> {
    // Fire-and-forget topics depend on this not erroring.
    bus.publish("conformance.nobody-listening", Bytes::from_static(b"x"))
        .await?;
    Ok(())
}

async fn test_subscribe_then_publish(bus: &dyn MessageBus) -> Result<(), BusError> {
    let mut sub = bus.subscribe("conformance.basic").await?;
    bus.publish("conformance.basic", Bytes::from_static(b"hello"))
        .await?;
    let msg = sub.recv().await;
    assert_eq!(msg.as_deref(), Some(&b"hello"[..]), "subscriber should receive the payload");
    Ok(())
}

async fn test_fan_out(bus: &dyn MessageBus) -> Result<(), BusError> {
    let mut a = bus.subscribe("conformance.fan-out").await?;
    let mut b = bus.subscribe("conformance.fan-out").await?;
    bus.publish("conformance.fan-out", Bytes::from_static(b"copy"))
        .await?;
    assert_eq!(a.recv().await.as_deref(), Some(&b"copy"[..]));
    assert_eq!(b.recv().await.as_deref(), Some(&b"copy"[..]));
    Ok(())
}

async fn test_topics_are_isolated(bus: &dyn MessageBus) -> Result<(), BusError> {
    let mut other = bus.subscribe("conformance.topic-b").await?;
    let mut target = bus.subscribe("conformance.topic-a").await?;
    bus.publish("conformance.topic-a", Bytes::from_static(b"only-a"))
        .await?;
    assert_eq!(target.recv().await.as_deref(), Some(&b"only-a"[..]));

    // The other topic must stay quiet.
    let quiet = tokio::time::timeout(std::time::Duration::from_millis(50), other.recv()).await;
    assert!(quiet.is_err(), "message leaked across topics");
    Ok(())
}
