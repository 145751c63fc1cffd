use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, error};

use metron_bus::{MessageBus, topic};
use metron_core::Alert;

/// Best-effort publisher of operational alerts.
///
/// Stateless; formats and publishes the alert event. Never blocks or
/// fails the caller — internal errors are logged only.
#[derive(Clone)]
pub struct AlertEmitter {
    bus: Arc<dyn MessageBus>,
}

impl AlertEmitter {
    /// Create an emitter publishing to the alerts topic.
    #[must_use]
    pub fn new(bus: Arc<dyn MessageBus>) -> Self {
        Self { bus }
    }

    /// Publish an alert. Failures are swallowed after logging.
    pub async fn emit(&self, alert: Alert) {
        let alert_id = alert.alert_id;
        let payload = match serde_json::to_vec(&alert) {
            Ok(payload) => Bytes::from(payload),
            Err(e) => {
                error!(error = %e, %alert_id, "failed to encode alert");
                return;
            }
        };
        match self.bus.publish(topic::ALERTS, payload).await {
            Ok(()) => debug!(
                %alert_id,
                severity = %alert.severity,
                code = %alert.code,
                "alert published"
            ),
            Err(e) => error!(error = %e, %alert_id, "failed to publish alert"),
        }
    }
}

impl std::fmt::Debug for AlertEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertEmitter").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metron_bus_memory::MemoryBus;
    use metron_core::{AlertSeverity, CustomerId, FeatureId, ServiceName};

    #[tokio::test]
    async fn emits_alert_to_alert_topic() {
        let bus: Arc<dyn MessageBus> = Arc::new(MemoryBus::new());
        let mut sink = bus.subscribe(topic::ALERTS).await.unwrap();
        let emitter = AlertEmitter::new(Arc::clone(&bus));

        emitter
            .emit(Alert::consumption_failure(
                CustomerId::new("cust-1"),
                FeatureId::new("create-invoice"),
                1,
                ServiceName::new("invoicing"),
                "publish failed",
            ))
            .await;

        let payload = sink.recv().await.unwrap();
        let alert: Alert = serde_json::from_slice(&payload).unwrap();
        assert_eq!(alert.severity, AlertSeverity::Critical);
        assert!(alert.service_restricted);
    }

    #[tokio::test]
    async fn emit_without_sink_does_not_fail() {
        let bus: Arc<dyn MessageBus> = Arc::new(MemoryBus::new());
        let emitter = AlertEmitter::new(bus);
        emitter
            .emit(Alert::consumption_failure(
                CustomerId::new("c"),
                FeatureId::new("f"),
                1,
                ServiceName::new("s"),
                "x",
            ))
            .await;
    }
}
