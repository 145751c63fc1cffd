use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{CustomerId, FeatureId, ServiceName};

/// A fire-and-forget usage record published to the authority.
///
/// Delivery is at-least-once from the reporter's perspective: there is no
/// local retry, but the bus may redeliver. The stream is independent of
/// the request/response exchange and carries no ordering guarantee
/// relative to it; the authority tolerates out-of-order consumption.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumptionEvent {
    /// Unique identifier for this record.
    pub consumption_id: Uuid,
    /// Customer whose counter is charged.
    pub customer: CustomerId,
    /// Feature that was exercised.
    pub feature: FeatureId,
    /// Units consumed.
    pub amount: u64,
    /// Service that performed the work.
    pub service: ServiceName,
    /// Action type from the policy (e.g. `"use"`, `"create"`).
    pub action_type: String,
    /// Identifier of the business resource produced, when there is one.
    #[serde(default)]
    pub resource_id: Option<String>,
    /// Token from an earlier approval, when the check and the consumption
    /// happened in different services.
    #[serde(default)]
    pub consumption_token: Option<String>,
    /// Free-form context forwarded to the authority.
    #[serde(default)]
    pub context: HashMap<String, serde_json::Value>,
    /// Whether the gated operation succeeded.
    pub success: bool,
    /// When the consumption occurred.
    pub timestamp: DateTime<Utc>,
}

impl ConsumptionEvent {
    /// Create an event with a fresh `consumption_id`, stamped now.
    #[must_use]
    pub fn new(
        customer: impl Into<CustomerId>,
        feature: impl Into<FeatureId>,
        amount: u64,
        service: impl Into<ServiceName>,
        action_type: impl Into<String>,
        success: bool,
    ) -> Self {
        Self {
            consumption_id: Uuid::new_v4(),
            customer: customer.into(),
            feature: feature.into(),
            amount,
            service: service.into(),
            action_type: action_type.into(),
            resource_id: None,
            consumption_token: None,
            context: HashMap::new(),
            success,
            timestamp: Utc::now(),
        }
    }

    /// Attach the identifier of the resource the operation produced.
    #[must_use]
    pub fn resource_id(mut self, id: impl Into<String>) -> Self {
        self.resource_id = Some(id.into());
        self
    }

    /// Attach the consumption token from an earlier approval.
    #[must_use]
    pub fn consumption_token(mut self, token: impl Into<String>) -> Self {
        self.consumption_token = Some(token.into());
        self
    }

    /// Attach a context entry.
    #[must_use]
    pub fn context_value(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }
}

/// Why the authority reset a customer's counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetType {
    /// A billing period rolled over.
    BillingPeriod,
    /// An operator reset the counters by hand.
    Manual,
    /// The customer changed plans.
    PlanChange,
}

/// Broadcast by the authority when a customer's limits change.
///
/// Shares the bus and the customer/feature key space with the admission
/// exchange but is consumed by the authority's own subscribers, not by
/// the guard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsUpdateEvent {
    /// Customer whose limits changed.
    pub customer: CustomerId,
    /// New per-feature limits.
    pub feature_limits: HashMap<FeatureId, u64>,
    /// The subscription plan now in effect.
    pub subscription_plan: String,
}

/// Broadcast by the authority when it resets usage counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetCountersEvent {
    /// Customer whose counters were reset.
    pub customer: CustomerId,
    /// Why the reset happened.
    pub reset_type: ResetType,
    /// Features affected; empty means all.
    #[serde(default)]
    pub features: Vec<FeatureId>,
}
