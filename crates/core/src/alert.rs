use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{CustomerId, FeatureId, ServiceName};

/// How urgent an alert is to an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

impl std::fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => f.write_str("info"),
            Self::Warning => f.write_str("warning"),
            Self::Critical => f.write_str("critical"),
        }
    }
}

/// Best-effort operational alert published to the alert sink.
///
/// Emission never blocks or fails the business call that triggered it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    /// Unique identifier for this alert.
    pub alert_id: Uuid,
    /// Urgency.
    pub severity: AlertSeverity,
    /// Machine-readable alert code (e.g. `"consumption_error"`).
    pub code: String,
    /// Customer the alert concerns.
    pub customer: CustomerId,
    /// Feature the alert concerns, when specific to one.
    #[serde(default)]
    pub feature: Option<FeatureId>,
    /// Human-readable description.
    pub message: String,
    /// Signals that this customer's usage bookkeeping may be inconsistent
    /// and the service should be treated as restricted for them.
    pub service_restricted: bool,
    /// Service that raised the alert.
    pub service: ServiceName,
    /// When the alert was raised.
    pub timestamp: DateTime<Utc>,
}

impl Alert {
    /// The critical alert raised when a consumption event could not be
    /// published: the customer's bookkeeping may now be inconsistent.
    #[must_use]
    pub fn consumption_failure(
        customer: CustomerId,
        feature: FeatureId,
        amount: u64,
        service: ServiceName,
        cause: impl std::fmt::Display,
    ) -> Self {
        Self {
            alert_id: Uuid::new_v4(),
            severity: AlertSeverity::Critical,
            code: "consumption_error".to_owned(),
            customer,
            feature: Some(feature.clone()),
            message: format!(
                "failed to report consumption of {amount} unit(s) of {feature}: {cause}"
            ),
            service_restricted: true,
            service,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consumption_failure_is_critical_and_restricting() {
        let alert = Alert::consumption_failure(
            CustomerId::new("cust-1"),
            FeatureId::new("create-invoice"),
            2,
            ServiceName::new("invoicing"),
            "publish failed",
        );
        assert_eq!(alert.severity, AlertSeverity::Critical);
        assert_eq!(alert.code, "consumption_error");
        assert!(alert.service_restricted);
        assert!(alert.message.contains("create-invoice"));
        assert!(alert.message.contains("publish failed"));
    }

    #[test]
    fn alert_ids_are_unique() {
        let a = Alert::consumption_failure(
            CustomerId::new("c"),
            FeatureId::new("f"),
            1,
            ServiceName::new("s"),
            "x",
        );
        let b = Alert::consumption_failure(
            CustomerId::new("c"),
            FeatureId::new("f"),
            1,
            ServiceName::new("s"),
            "x",
        );
        assert_ne!(a.alert_id, b.alert_id);
    }

    #[test]
    fn severity_serde_snake_case() {
        let json = serde_json::to_string(&AlertSeverity::Critical).unwrap();
        assert_eq!(json, "\"critical\"");
    }

    #[test]
    fn alert_serde_roundtrip() {
        let alert = Alert::consumption_failure(
            CustomerId::new("cust-1"),
            FeatureId::new("f"),
            1,
            ServiceName::new("svc"),
            "boom",
        );
        let json = serde_json::to_string(&alert).unwrap();
        let back: Alert = serde_json::from_str(&json).unwrap();
        assert_eq!(back.alert_id, alert.alert_id);
        assert_eq!(back.severity, AlertSeverity::Critical);
    }
}
