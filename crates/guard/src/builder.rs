use std::sync::Arc;
use std::time::Duration;

use metron_bus::MessageBus;
use metron_core::{FeaturePolicy, PolicyRegistry, ServiceName};

use crate::correlator::{DEFAULT_TIMEOUT, RequestReplyCorrelator};
use crate::error::GuardError;
use crate::guard::AdmissionGuard;
use crate::reporter::ConsumptionReporter;

/// Fluent builder for constructing an [`AdmissionGuard`].
///
/// A bus and a service name must be supplied; everything else has
/// defaults (5 s decision deadline, empty policy registry).
pub struct GuardBuilder {
    bus: Option<Arc<dyn MessageBus>>,
    service: Option<ServiceName>,
    timeout: Duration,
    policies: PolicyRegistry,
}

impl GuardBuilder {
    /// Create a new builder with all optional fields set to their defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            bus: None,
            service: None,
            timeout: DEFAULT_TIMEOUT,
            policies: PolicyRegistry::new(),
        }
    }

    /// Set the message bus carrying the admission channels.
    #[must_use]
    pub fn bus(mut self, bus: Arc<dyn MessageBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Set the service name stamped on consumption events and alerts.
    #[must_use]
    pub fn service(mut self, service: impl Into<ServiceName>) -> Self {
        self.service = Some(service.into());
        self
    }

    /// Set the decision deadline for each check round trip.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Attach an admission policy to an operation.
    #[must_use]
    pub fn policy(mut self, operation: impl Into<String>, policy: FeaturePolicy) -> Self {
        self.policies.register(operation, policy);
        self
    }

    /// Replace the whole policy registry.
    #[must_use]
    pub fn policies(mut self, policies: PolicyRegistry) -> Self {
        self.policies = policies;
        self
    }

    /// Consume the builder, start the reply listener, and produce a
    /// configured [`AdmissionGuard`].
    ///
    /// Returns a [`GuardError::Configuration`] if required fields (bus,
    /// service name) have not been set, or a [`GuardError::Bus`] if the
    /// response subscription cannot be opened.
    pub async fn build(self) -> Result<AdmissionGuard, GuardError> {
        let bus = self
            .bus
            .ok_or_else(|| GuardError::Configuration("message bus is required".into()))?;
        let service = self
            .service
            .ok_or_else(|| GuardError::Configuration("service name is required".into()))?;

        let correlator =
            Arc::new(RequestReplyCorrelator::start(Arc::clone(&bus), self.timeout).await?);
        let reporter = Arc::new(ConsumptionReporter::new(bus, service.clone()));

        Ok(AdmissionGuard::new(
            correlator,
            reporter,
            self.policies,
            service,
        ))
    }
}

impl Default for GuardBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metron_bus_memory::MemoryBus;

    #[tokio::test]
    async fn build_missing_bus_returns_error() {
        let result = GuardBuilder::new().service("invoicing").build().await;
        let err = result.unwrap_err();
        assert!(err.to_string().contains("message bus is required"));
    }

    #[tokio::test]
    async fn build_missing_service_returns_error() {
        let bus: Arc<dyn MessageBus> = Arc::new(MemoryBus::new());
        let result = GuardBuilder::new().bus(bus).build().await;
        let err = result.unwrap_err();
        assert!(err.to_string().contains("service name is required"));
    }

    #[tokio::test]
    async fn build_with_required_fields_succeeds() {
        let bus: Arc<dyn MessageBus> = Arc::new(MemoryBus::new());
        let guard = GuardBuilder::new()
            .bus(bus)
            .service("invoicing")
            .policy("create_invoice", FeaturePolicy::new("create-invoice"))
            .build()
            .await
            .unwrap();
        assert_eq!(guard.policies().len(), 1);
        assert_eq!(guard.service().as_str(), "invoicing");
    }
}
