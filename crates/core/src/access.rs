use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{CustomerId, FeatureId, UserId};

/// Denial reason used for every fail-closed synthesized response.
pub const SERVICE_UNAVAILABLE_REASON: &str = "service unavailable";

/// A quota check sent to the authority over the request channel.
///
/// `request_id` is the correlation key and is unique per attempt; it is
/// never reused across retries, so a late duplicate response can always
/// be attributed (and discarded) unambiguously.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessRequest {
    /// Correlation key, fresh per attempt.
    pub request_id: Uuid,
    /// Customer whose quota is charged.
    pub customer: CustomerId,
    /// Feature being exercised.
    pub feature: FeatureId,
    /// Units the caller wants to consume.
    pub requested_amount: u64,
    /// End user acting for the customer, when known.
    #[serde(default)]
    pub user: Option<UserId>,
    /// Free-form invocation context forwarded to the authority.
    #[serde(default)]
    pub context: HashMap<String, serde_json::Value>,
}

impl AccessRequest {
    /// Create a request with a fresh `request_id` and empty context.
    #[must_use]
    pub fn new(
        customer: impl Into<CustomerId>,
        feature: impl Into<FeatureId>,
        requested_amount: u64,
    ) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            customer: customer.into(),
            feature: feature.into(),
            requested_amount,
            user: None,
            context: HashMap::new(),
        }
    }

    /// Attach the acting user.
    #[must_use]
    pub fn user(mut self, user: impl Into<UserId>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Attach a context entry forwarded to the authority.
    #[must_use]
    pub fn context_value(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }
}

/// The authority's verdict on an access request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessDecision {
    /// The caller may proceed.
    Approved,
    /// The caller is over quota or otherwise blocked.
    Denied,
    /// The caller is blocked and a higher plan would lift the limit.
    UpgradeRequired,
}

impl AccessDecision {
    /// Whether this decision lets the gated operation run.
    #[must_use]
    pub fn is_approved(self) -> bool {
        matches!(self, Self::Approved)
    }
}

/// Usage snapshot attached to every access response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageLimits {
    /// Units consumed in the current period.
    pub current_usage: u64,
    /// Maximum units allowed in the current period.
    pub limit_value: u64,
    /// Units left before the limit is reached.
    pub remaining_usage: u64,
    /// Consumed share of the limit, 0–100 (may exceed 100 on overshoot).
    pub usage_percentage: f64,
    /// When the current period resets, if the authority reports it.
    #[serde(default)]
    pub reset_date: Option<DateTime<Utc>>,
}

impl UsageLimits {
    /// Build a snapshot from raw counters, enforcing
    /// `remaining_usage = max(0, limit_value - current_usage)`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn new(current_usage: u64, limit_value: u64, reset_date: Option<DateTime<Utc>>) -> Self {
        let usage_percentage = if limit_value == 0 {
            100.0
        } else {
            (current_usage as f64 / limit_value as f64) * 100.0
        };
        Self {
            current_usage,
            limit_value,
            remaining_usage: limit_value.saturating_sub(current_usage),
            usage_percentage,
            reset_date,
        }
    }

    /// The all-zero, fully-exhausted snapshot used for synthesized denials.
    #[must_use]
    pub fn exhausted() -> Self {
        Self {
            current_usage: 0,
            limit_value: 0,
            remaining_usage: 0,
            usage_percentage: 100.0,
            reset_date: None,
        }
    }
}

/// The authority's reply to an [`AccessRequest`], matched by `request_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessResponse {
    /// Correlation key copied from the originating request.
    pub request_id: Uuid,
    /// The verdict.
    pub decision: AccessDecision,
    /// Usage snapshot at decision time.
    pub limits: UsageLimits,
    /// Why access was denied, when it was.
    #[serde(default)]
    pub denial_reason: Option<String>,
    /// Plan that would lift the limit, for `UpgradeRequired` decisions.
    #[serde(default)]
    pub suggested_plan_id: Option<String>,
    /// Token a downstream service presents when reporting the actual
    /// consumption for this approval later.
    #[serde(default)]
    pub consumption_token: Option<String>,
    /// How long the authority took to decide.
    pub processing_time_ms: u64,
}

impl AccessResponse {
    /// An approval carrying the given usage snapshot.
    #[must_use]
    pub fn approved(request_id: Uuid, limits: UsageLimits) -> Self {
        Self {
            request_id,
            decision: AccessDecision::Approved,
            limits,
            denial_reason: None,
            suggested_plan_id: None,
            consumption_token: None,
            processing_time_ms: 0,
        }
    }

    /// A denial with the given reason and usage snapshot.
    #[must_use]
    pub fn denied(request_id: Uuid, limits: UsageLimits, reason: impl Into<String>) -> Self {
        Self {
            request_id,
            decision: AccessDecision::Denied,
            limits,
            denial_reason: Some(reason.into()),
            suggested_plan_id: None,
            consumption_token: None,
            processing_time_ms: 0,
        }
    }

    /// The synthesized fail-closed denial returned when the authority is
    /// unreachable: all usage fields zero, `usage_percentage = 100`, and
    /// a fixed `"service unavailable"` reason. Unreachability denies
    /// access; it never grants it.
    #[must_use]
    pub fn service_unavailable(request_id: Uuid) -> Self {
        Self {
            request_id,
            decision: AccessDecision::Denied,
            limits: UsageLimits::exhausted(),
            denial_reason: Some(SERVICE_UNAVAILABLE_REASON.to_owned()),
            suggested_plan_id: None,
            consumption_token: None,
            processing_time_ms: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_ids_are_unique_per_attempt() {
        let a = AccessRequest::new("cust-1", "create-invoice", 1);
        let b = AccessRequest::new("cust-1", "create-invoice", 1);
        assert_ne!(a.request_id, b.request_id);
    }

    #[test]
    fn request_builder() {
        let req = AccessRequest::new("cust-1", "create-invoice", 2)
            .user("user-9")
            .context_value("region", serde_json::json!("eu"));
        assert_eq!(req.requested_amount, 2);
        assert_eq!(req.user.as_ref().unwrap().as_str(), "user-9");
        assert_eq!(req.context.get("region"), Some(&serde_json::json!("eu")));
    }

    #[test]
    fn limits_remaining_is_clamped() {
        let limits = UsageLimits::new(12, 10, None);
        assert_eq!(limits.remaining_usage, 0);
        assert!(limits.usage_percentage > 100.0);

        let limits = UsageLimits::new(4, 10, None);
        assert_eq!(limits.remaining_usage, 6);
        assert!((limits.usage_percentage - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn limits_zero_limit_is_fully_used() {
        let limits = UsageLimits::new(0, 0, None);
        assert_eq!(limits.remaining_usage, 0);
        assert!((limits.usage_percentage - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn service_unavailable_is_fail_closed() {
        let id = Uuid::new_v4();
        let resp = AccessResponse::service_unavailable(id);
        assert_eq!(resp.request_id, id);
        assert_eq!(resp.decision, AccessDecision::Denied);
        assert_eq!(resp.denial_reason.as_deref(), Some("service unavailable"));
        assert_eq!(resp.limits.limit_value, 0);
        assert_eq!(resp.limits.current_usage, 0);
        assert!((resp.limits.usage_percentage - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn decision_is_approved() {
        assert!(AccessDecision::Approved.is_approved());
        assert!(!AccessDecision::Denied.is_approved());
        assert!(!AccessDecision::UpgradeRequired.is_approved());
    }

    #[test]
    fn response_serde_roundtrip() {
        let resp = AccessResponse::approved(Uuid::new_v4(), UsageLimits::new(4, 10, None));
        let json = serde_json::to_string(&resp).unwrap();
        let back: AccessResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(back.request_id, resp.request_id);
        assert_eq!(back.decision, AccessDecision::Approved);
        assert_eq!(back.limits.remaining_usage, 6);
    }

    #[test]
    fn decision_serde_snake_case() {
        let json = serde_json::to_string(&AccessDecision::UpgradeRequired).unwrap();
        assert_eq!(json, "\"upgrade_required\"");
    }
}
