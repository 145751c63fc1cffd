use std::sync::Arc;

use tracing::{debug, info, instrument};

use metron_core::{
    AccessRequest, AccessResponse, CallContext, ConsumptionEvent, ConsumptionMode, FeaturePolicy,
    PolicyRegistry, ServiceName,
};

use crate::correlator::RequestReplyCorrelator;
use crate::error::{AccessDenial, AdmissionError, AdmissionFailure};
use crate::reporter::ConsumptionReporter;

/// Terminal admission state for one gated invocation.
///
/// Each invocation moves `Idle → Checking → {Approved, Denied, Bypassed}`;
/// the denied leg surfaces as [`AdmissionFailure::Denied`], the rest as
/// these variants.
#[derive(Debug)]
pub enum Admission {
    /// No policy is attached to the operation; it runs ungated and the
    /// bus is never contacted.
    Unprotected,
    /// An admin principal skipped the check on a bypassable policy. No
    /// request is sent and no consumption is recorded.
    Bypassed,
    /// The authority approved; the response is retained for the
    /// consumption step.
    Approved(AccessResponse),
}

/// Wraps protected operations with a synchronous-style quota check over
/// the asynchronous bus.
///
/// The guard owns no counter state: all shared mutable state lives in
/// the external quota authority, and two concurrent checks for the same
/// customer/feature pair are only as isolated as the authority's own
/// decision step makes them.
pub struct AdmissionGuard {
    correlator: Arc<RequestReplyCorrelator>,
    reporter: Arc<ConsumptionReporter>,
    policies: PolicyRegistry,
    service: ServiceName,
}

impl AdmissionGuard {
    pub(crate) fn new(
        correlator: Arc<RequestReplyCorrelator>,
        reporter: Arc<ConsumptionReporter>,
        policies: PolicyRegistry,
        service: ServiceName,
    ) -> Self {
        Self {
            correlator,
            reporter,
            policies,
            service,
        }
    }

    /// The correlator backing this guard, shared with manual clients.
    #[must_use]
    pub fn correlator(&self) -> Arc<RequestReplyCorrelator> {
        Arc::clone(&self.correlator)
    }

    /// The reporter backing this guard, shared with manual clients.
    #[must_use]
    pub fn reporter(&self) -> Arc<ConsumptionReporter> {
        Arc::clone(&self.reporter)
    }

    /// The registered admission policies.
    #[must_use]
    pub fn policies(&self) -> &PolicyRegistry {
        &self.policies
    }

    /// The service name this guard runs in.
    #[must_use]
    pub fn service(&self) -> &ServiceName {
        &self.service
    }

    /// Run the admission check for `operation` without invoking anything.
    ///
    /// This is the programmatic pre-check: callers that cannot wrap their
    /// work in [`invoke`](Self::invoke) can admit first and act on the
    /// returned state themselves.
    #[instrument(name = "guard.check", skip_all, fields(operation = operation))]
    pub async fn check(
        &self,
        operation: &str,
        ctx: &CallContext,
    ) -> Result<Admission, AdmissionFailure> {
        match self.policies.get(operation) {
            None => {
                debug!("no policy attached, allowing");
                Ok(Admission::Unprotected)
            }
            Some(policy) => self.admit(policy, ctx).await,
        }
    }

    /// Gate `op` behind the admission policy registered for `operation`.
    ///
    /// - No policy: `op` runs ungated.
    /// - Admin bypass: `op` runs, nothing is sent or consumed.
    /// - `Approved` in pre-consumption mode: `op` runs; the approval
    ///   already reflects the committed reservation.
    /// - `Approved` in post-consumption mode: `op` runs; a consumption
    ///   event is reported only if it returns `Ok`.
    /// - Denied (including fail-closed timeouts): `op` never runs.
    pub async fn invoke<F, Fut, T, E>(
        &self,
        operation: &str,
        ctx: &CallContext,
        op: F,
    ) -> Result<T, AdmissionError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let Some(policy) = self.policies.get(operation).cloned() else {
            return op().await.map_err(AdmissionError::Operation);
        };

        match self.admit(&policy, ctx).await? {
            Admission::Unprotected | Admission::Bypassed => {
                op().await.map_err(AdmissionError::Operation)
            }
            Admission::Approved(response) => {
                let result = op().await;
                if result.is_ok() && policy.consumption_mode == ConsumptionMode::ConsumeOnSuccess {
                    self.report_consumption(&policy, ctx, &response).await;
                }
                result.map_err(AdmissionError::Operation)
            }
        }
    }

    async fn admit(
        &self,
        policy: &FeaturePolicy,
        ctx: &CallContext,
    ) -> Result<Admission, AdmissionFailure> {
        let Some(principal) = ctx.principal.as_ref() else {
            return Err(AdmissionFailure::Unauthenticated);
        };

        if policy.bypass_for_admin && principal.is_admin() {
            info!(
                feature = %policy.feature,
                user = %principal.id,
                customer = %ctx.customer,
                "admin bypass, skipping quota check"
            );
            return Ok(Admission::Bypassed);
        }

        let mut request = AccessRequest::new(
            ctx.customer.clone(),
            policy.feature.clone(),
            policy.amount,
        )
        .user(principal.id.clone())
        .context_value("action_type", serde_json::json!(policy.action_type));
        request.context.extend(ctx.attributes.clone());

        let response = self.correlator.send(request).await;
        if response.decision.is_approved() {
            debug!(
                feature = %policy.feature,
                customer = %ctx.customer,
                remaining = response.limits.remaining_usage,
                "access approved"
            );
            Ok(Admission::Approved(response))
        } else {
            info!(
                feature = %policy.feature,
                customer = %ctx.customer,
                reason = response.denial_reason.as_deref().unwrap_or("unspecified"),
                "access denied"
            );
            Err(AdmissionFailure::Denied(AccessDenial::from_response(
                policy, &response,
            )))
        }
    }

    async fn report_consumption(
        &self,
        policy: &FeaturePolicy,
        ctx: &CallContext,
        response: &AccessResponse,
    ) {
        let mut event = ConsumptionEvent::new(
            ctx.customer.clone(),
            policy.feature.clone(),
            policy.amount,
            self.service.clone(),
            policy.action_type.clone(),
            true,
        );
        event.context = ctx.attributes.clone();
        if let Some(token) = response.consumption_token.clone() {
            event = event.consumption_token(token);
        }
        // Outcome is logged and alerted inside the reporter; the business
        // result is already decided at this point.
        let _ = self.reporter.report_event(event).await;
    }
}

impl std::fmt::Debug for AdmissionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionGuard")
            .field("service", &self.service)
            .field("policies", &self.policies.len())
            .finish_non_exhaustive()
    }
}
