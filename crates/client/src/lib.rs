//! Manual access-check and consumption client.
//!
//! The same check/consume capability the guard applies declaratively,
//! exposed as a plain callable for call sites that are not wrapped by
//! it: batch jobs, internal reconciliation, event-driven consumers
//! reporting usage for work another service already had approved.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use metron_bus::MessageBus;
use metron_core::{AccessRequest, ConsumptionEvent, CustomerId, FeatureId, ServiceName};
use metron_guard::{ConsumptionReporter, DEFAULT_TIMEOUT, GuardError, RequestReplyCorrelator};

/// Result of a manual access check.
///
/// Deliberately error-free: any failure of the underlying round trip is
/// translated to `allowed = false` (fail-closed), never thrown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessCheck {
    /// Whether the caller may proceed.
    pub allowed: bool,
    /// Why access was refused, when it was.
    pub reason: Option<String>,
    /// Units consumed in the current period.
    pub current_usage: Option<u64>,
    /// Maximum units allowed in the current period.
    pub limit: Option<u64>,
    /// Units left before the limit is reached.
    pub remaining_quota: Option<u64>,
}

/// Programmatic check/consume client over the admission primitives.
pub struct AccessClient {
    correlator: Arc<RequestReplyCorrelator>,
    reporter: Arc<ConsumptionReporter>,
}

impl AccessClient {
    /// Connect a standalone client: opens its own correlator on `bus`
    /// with the default 5 s deadline.
    pub async fn connect(
        bus: Arc<dyn MessageBus>,
        service: impl Into<ServiceName>,
    ) -> Result<Self, GuardError> {
        Self::connect_with_timeout(bus, service, DEFAULT_TIMEOUT).await
    }

    /// Connect with an explicit decision deadline.
    pub async fn connect_with_timeout(
        bus: Arc<dyn MessageBus>,
        service: impl Into<ServiceName>,
        timeout: Duration,
    ) -> Result<Self, GuardError> {
        let correlator = Arc::new(RequestReplyCorrelator::start(Arc::clone(&bus), timeout).await?);
        let reporter = Arc::new(ConsumptionReporter::new(bus, service.into()));
        Ok(Self {
            correlator,
            reporter,
        })
    }

    /// Build a client sharing an existing guard's correlator and reporter,
    /// avoiding a second response subscription in the same process.
    #[must_use]
    pub fn from_parts(
        correlator: Arc<RequestReplyCorrelator>,
        reporter: Arc<ConsumptionReporter>,
    ) -> Self {
        Self {
            correlator,
            reporter,
        }
    }

    /// Ask the authority whether `customer` may consume `amount` units of
    /// `feature`. Fail-closed: an unreachable authority yields
    /// `allowed = false` with the `"service unavailable"` reason.
    pub async fn check_access(
        &self,
        customer: impl Into<CustomerId>,
        feature: impl Into<FeatureId>,
        amount: u64,
        action_type: impl Into<String>,
    ) -> AccessCheck {
        let action_type: String = action_type.into();
        let request = AccessRequest::new(customer, feature, amount)
            .context_value("action_type", serde_json::json!(action_type));
        let response = self.correlator.send(request).await;

        debug!(
            decision = ?response.decision,
            remaining = response.limits.remaining_usage,
            "manual access check"
        );

        AccessCheck {
            allowed: response.decision.is_approved(),
            reason: response.denial_reason,
            current_usage: Some(response.limits.current_usage),
            limit: Some(response.limits.limit_value),
            remaining_quota: Some(response.limits.remaining_usage),
        }
    }

    /// Report that `customer` consumed `amount` units of `feature`.
    /// Returns whether the event was published; failures are alerted by
    /// the reporter and never raised here.
    pub async fn consume_feature(
        &self,
        customer: impl Into<CustomerId>,
        feature: impl Into<FeatureId>,
        amount: u64,
        action_type: impl Into<String>,
    ) -> bool {
        self.reporter
            .report(
                customer.into(),
                feature.into(),
                amount,
                action_type,
                true,
                HashMap::new(),
            )
            .await
    }

    /// Report a fully-built consumption event, e.g. one carrying the
    /// `consumption_token` from an approval issued to another service.
    pub async fn consume_event(&self, event: ConsumptionEvent) -> bool {
        self.reporter.report_event(event).await
    }
}

impl std::fmt::Debug for AccessClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessClient").finish_non_exhaustive()
    }
}
