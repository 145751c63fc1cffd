use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, error};

use metron_bus::{MessageBus, topic};
use metron_core::{Alert, ConsumptionEvent, CustomerId, FeatureId, ServiceName};

use crate::alerts::AlertEmitter;

/// Publishes fire-and-forget usage events to the authority.
///
/// Never propagates a failure into the business path: a publish error is
/// logged, raised as a critical alert (the customer's bookkeeping may now
/// be inconsistent), and reported back only as a `false` return. There is
/// no local retry; the bus may redeliver on its own.
#[derive(Clone)]
pub struct ConsumptionReporter {
    bus: Arc<dyn MessageBus>,
    service: ServiceName,
    alerts: AlertEmitter,
}

impl ConsumptionReporter {
    /// Create a reporter attributing events to `service`.
    #[must_use]
    pub fn new(bus: Arc<dyn MessageBus>, service: ServiceName) -> Self {
        let alerts = AlertEmitter::new(Arc::clone(&bus));
        Self {
            bus,
            service,
            alerts,
        }
    }

    /// The service name stamped on every event.
    #[must_use]
    pub fn service(&self) -> &ServiceName {
        &self.service
    }

    /// The alert emitter used on consumption failure.
    #[must_use]
    pub fn alerts(&self) -> &AlertEmitter {
        &self.alerts
    }

    /// Build and publish a usage event. Returns whether it was published.
    pub async fn report(
        &self,
        customer: CustomerId,
        feature: FeatureId,
        amount: u64,
        action_type: impl Into<String>,
        success: bool,
        context: HashMap<String, serde_json::Value>,
    ) -> bool {
        let mut event = ConsumptionEvent::new(
            customer,
            feature,
            amount,
            self.service.clone(),
            action_type,
            success,
        );
        event.context = context;
        self.report_event(event).await
    }

    /// Publish a fully-built usage event. Returns whether it was published.
    pub async fn report_event(&self, event: ConsumptionEvent) -> bool {
        let consumption_id = event.consumption_id;
        match self.try_publish(&event).await {
            Ok(()) => {
                debug!(
                    %consumption_id,
                    customer = %event.customer,
                    feature = %event.feature,
                    amount = event.amount,
                    "consumption reported"
                );
                true
            }
            Err(cause) => {
                error!(
                    error = %cause,
                    %consumption_id,
                    customer = %event.customer,
                    feature = %event.feature,
                    "failed to report consumption"
                );
                self.alerts
                    .emit(Alert::consumption_failure(
                        event.customer.clone(),
                        event.feature.clone(),
                        event.amount,
                        self.service.clone(),
                        &cause,
                    ))
                    .await;
                false
            }
        }
    }

    async fn try_publish(&self, event: &ConsumptionEvent) -> Result<(), String> {
        let payload = serde_json::to_vec(event).map_err(|e| e.to_string())?;
        self.bus
            .publish(topic::CONSUMPTION, Bytes::from(payload))
            .await
            .map_err(|e| e.to_string())
    }
}

impl std::fmt::Debug for ConsumptionReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsumptionReporter")
            .field("service", &self.service)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use metron_bus::{BusError, Subscription};
    use metron_bus_memory::MemoryBus;

    #[tokio::test]
    async fn reports_consumption_event() {
        let bus: Arc<dyn MessageBus> = Arc::new(MemoryBus::new());
        let mut authority = bus.subscribe(topic::CONSUMPTION).await.unwrap();
        let reporter = ConsumptionReporter::new(Arc::clone(&bus), ServiceName::new("invoicing"));

        let published = reporter
            .report(
                CustomerId::new("cust-1"),
                FeatureId::new("create-invoice"),
                2,
                "create",
                true,
                HashMap::new(),
            )
            .await;
        assert!(published);

        let payload = authority.recv().await.unwrap();
        let event: ConsumptionEvent = serde_json::from_slice(&payload).unwrap();
        assert_eq!(event.amount, 2);
        assert_eq!(event.service.as_str(), "invoicing");
        assert!(event.success);
    }

    /// Bus whose consumption topic rejects every publish.
    struct BrokenConsumptionBus {
        inner: MemoryBus,
    }

    #[async_trait]
    impl MessageBus for BrokenConsumptionBus {
        async fn publish(&self, topic_name: &str, payload: Bytes) -> Result<(), BusError> {
            if topic_name == topic::CONSUMPTION {
                return Err(BusError::Publish("broker unreachable".into()));
            }
            self.inner.publish(topic_name, payload).await
        }

        async fn subscribe(&self, topic_name: &str) -> Result<Subscription, BusError> {
            self.inner.subscribe(topic_name).await
        }
    }

    #[tokio::test]
    async fn failure_raises_critical_alert_and_returns_false() {
        let bus: Arc<dyn MessageBus> = Arc::new(BrokenConsumptionBus {
            inner: MemoryBus::new(),
        });
        let mut alert_sink = bus.subscribe(topic::ALERTS).await.unwrap();
        let reporter = ConsumptionReporter::new(Arc::clone(&bus), ServiceName::new("invoicing"));

        let published = reporter
            .report(
                CustomerId::new("cust-1"),
                FeatureId::new("create-invoice"),
                1,
                "create",
                true,
                HashMap::new(),
            )
            .await;
        assert!(!published);

        let payload = alert_sink.recv().await.unwrap();
        let alert: Alert = serde_json::from_slice(&payload).unwrap();
        assert_eq!(alert.severity, metron_core::AlertSeverity::Critical);
        assert!(alert.service_restricted);
        assert_eq!(alert.code, "consumption_error");
    }
}
