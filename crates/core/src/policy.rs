use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::FeatureId;

/// When usage is charged against the customer's counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsumptionMode {
    /// Usage is reserved by the authority as part of approving the check.
    /// An `Approved` decision means the amount is already committed; the
    /// guard records nothing itself.
    ConsumeOnApproval,
    /// Usage is reported only after the wrapped operation succeeds. A
    /// failed operation emits no consumption event.
    ConsumeOnSuccess,
}

impl std::fmt::Display for ConsumptionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConsumeOnApproval => f.write_str("consume_on_approval"),
            Self::ConsumeOnSuccess => f.write_str("consume_on_success"),
        }
    }
}

/// Static admission policy attached to a protected operation.
///
/// Defined once per operation and read on every invocation; the guard and
/// the manual access client consume it identically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeaturePolicy {
    /// The feature whose quota gates this operation.
    pub feature: FeatureId,
    /// Units consumed per invocation.
    #[serde(default = "default_amount")]
    pub amount: u64,
    /// Action type recorded with each consumption (e.g. `"use"`, `"create"`).
    #[serde(default = "default_action_type")]
    pub action_type: String,
    /// Whether principals with the admin role skip the check entirely.
    #[serde(default)]
    pub bypass_for_admin: bool,
    /// Message surfaced on denial instead of the authority's reason.
    #[serde(default)]
    pub custom_error_message: Option<String>,
    /// When usage is charged for this operation.
    #[serde(default = "default_consumption_mode")]
    pub consumption_mode: ConsumptionMode,
}

fn default_amount() -> u64 {
    1
}

fn default_action_type() -> String {
    "use".to_owned()
}

fn default_consumption_mode() -> ConsumptionMode {
    ConsumptionMode::ConsumeOnApproval
}

impl FeaturePolicy {
    /// Create a policy for `feature` with all defaults (`amount = 1`,
    /// `action_type = "use"`, no bypass, pre-consumption).
    #[must_use]
    pub fn new(feature: impl Into<FeatureId>) -> Self {
        Self {
            feature: feature.into(),
            amount: default_amount(),
            action_type: default_action_type(),
            bypass_for_admin: false,
            custom_error_message: None,
            consumption_mode: default_consumption_mode(),
        }
    }

    /// Set the units consumed per invocation.
    #[must_use]
    pub fn amount(mut self, amount: u64) -> Self {
        self.amount = amount;
        self
    }

    /// Set the action type recorded with consumption events.
    #[must_use]
    pub fn action_type(mut self, action_type: impl Into<String>) -> Self {
        self.action_type = action_type.into();
        self
    }

    /// Allow admin principals to skip the check.
    #[must_use]
    pub fn bypass_for_admin(mut self, bypass: bool) -> Self {
        self.bypass_for_admin = bypass;
        self
    }

    /// Set the denial message surfaced instead of the authority's reason.
    #[must_use]
    pub fn custom_error_message(mut self, message: impl Into<String>) -> Self {
        self.custom_error_message = Some(message.into());
        self
    }

    /// Set when usage is charged for this operation.
    #[must_use]
    pub fn consumption_mode(mut self, mode: ConsumptionMode) -> Self {
        self.consumption_mode = mode;
        self
    }
}

/// Lookup table mapping operation names to their admission policies.
///
/// Operations without an entry are unprotected: the guard allows them
/// without contacting the bus.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyRegistry {
    policies: HashMap<String, FeaturePolicy>,
}

impl PolicyRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a policy for the named operation, replacing any previous one.
    pub fn register(&mut self, operation: impl Into<String>, policy: FeaturePolicy) {
        self.policies.insert(operation.into(), policy);
    }

    /// Fluent form of [`register`](Self::register) for builder-style setup.
    #[must_use]
    pub fn with(mut self, operation: impl Into<String>, policy: FeaturePolicy) -> Self {
        self.register(operation, policy);
        self
    }

    /// Look up the policy attached to an operation.
    #[must_use]
    pub fn get(&self, operation: &str) -> Option<&FeaturePolicy> {
        self.policies.get(operation)
    }

    /// Number of registered policies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    /// Whether the registry has no policies.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_defaults() {
        let policy = FeaturePolicy::new("create-invoice");
        assert_eq!(policy.amount, 1);
        assert_eq!(policy.action_type, "use");
        assert!(!policy.bypass_for_admin);
        assert!(policy.custom_error_message.is_none());
        assert_eq!(policy.consumption_mode, ConsumptionMode::ConsumeOnApproval);
    }

    #[test]
    fn policy_builder_chain() {
        let policy = FeaturePolicy::new("credit-score")
            .amount(5)
            .action_type("run")
            .bypass_for_admin(true)
            .custom_error_message("credit score quota reached")
            .consumption_mode(ConsumptionMode::ConsumeOnSuccess);
        assert_eq!(policy.amount, 5);
        assert_eq!(policy.action_type, "run");
        assert!(policy.bypass_for_admin);
        assert_eq!(
            policy.custom_error_message.as_deref(),
            Some("credit score quota reached")
        );
        assert_eq!(policy.consumption_mode, ConsumptionMode::ConsumeOnSuccess);
    }

    #[test]
    fn policy_deserializes_with_defaults() {
        let json = r#"{"feature": "create-invoice"}"#;
        let policy: FeaturePolicy = serde_json::from_str(json).unwrap();
        assert_eq!(policy.feature.as_str(), "create-invoice");
        assert_eq!(policy.amount, 1);
        assert_eq!(policy.consumption_mode, ConsumptionMode::ConsumeOnApproval);
    }

    #[test]
    fn consumption_mode_display() {
        assert_eq!(
            format!("{}", ConsumptionMode::ConsumeOnApproval),
            "consume_on_approval"
        );
        assert_eq!(
            format!("{}", ConsumptionMode::ConsumeOnSuccess),
            "consume_on_success"
        );
    }

    #[test]
    fn consumption_mode_serde() {
        let json = serde_json::to_string(&ConsumptionMode::ConsumeOnSuccess).unwrap();
        assert_eq!(json, "\"consume_on_success\"");
        let back: ConsumptionMode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ConsumptionMode::ConsumeOnSuccess);
    }

    #[test]
    fn registry_lookup() {
        let registry = PolicyRegistry::new()
            .with("create_invoice", FeaturePolicy::new("create-invoice"))
            .with("post_transaction", FeaturePolicy::new("post-transaction"));
        assert_eq!(registry.len(), 2);
        assert!(registry.get("create_invoice").is_some());
        assert!(registry.get("delete_invoice").is_none());
    }

    #[test]
    fn registry_replaces_on_register() {
        let mut registry = PolicyRegistry::new();
        registry.register("op", FeaturePolicy::new("f").amount(1));
        registry.register("op", FeaturePolicy::new("f").amount(3));
        assert_eq!(registry.get("op").unwrap().amount, 3);
    }

    #[test]
    fn policy_serde_roundtrip() {
        let policy = FeaturePolicy::new("portfolio-rebalance")
            .amount(2)
            .consumption_mode(ConsumptionMode::ConsumeOnSuccess);
        let json = serde_json::to_string(&policy).unwrap();
        let back: FeaturePolicy = serde_json::from_str(&json).unwrap();
        assert_eq!(back.feature, policy.feature);
        assert_eq!(back.amount, 2);
        assert_eq!(back.consumption_mode, ConsumptionMode::ConsumeOnSuccess);
    }
}
