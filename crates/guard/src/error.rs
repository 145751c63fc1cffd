use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use metron_bus::BusError;
use metron_core::{AccessResponse, FeatureId, FeaturePolicy};

/// Structured denial raised before a gated operation runs.
///
/// Carries forbidden-equivalent semantics for HTTP edges plus the usage
/// snapshot the authority reported (zeroed for synthesized fail-closed
/// denials).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessDenial {
    /// Message surfaced to the caller. Precedence: the policy's custom
    /// message, else the authority's denial reason, else a generic one.
    pub message: String,
    /// Feature whose quota blocked the call.
    pub feature: FeatureId,
    /// Units consumed in the current period.
    pub current_usage: u64,
    /// Maximum units allowed in the current period.
    pub limit: u64,
    /// When the current period resets, if known.
    pub reset_date: Option<DateTime<Utc>>,
    /// Whether a higher plan would lift the limit.
    pub upgrade_required: bool,
    /// Plan that would lift the limit, when the authority suggests one.
    pub suggested_plan_id: Option<String>,
}

impl AccessDenial {
    /// Build the denial for a non-approved response to `policy`'s check.
    #[must_use]
    pub fn from_response(policy: &FeaturePolicy, response: &AccessResponse) -> Self {
        let message = policy
            .custom_error_message
            .clone()
            .or_else(|| response.denial_reason.clone())
            .unwrap_or_else(|| format!("quota exceeded for feature {}", policy.feature));
        Self {
            message,
            feature: policy.feature.clone(),
            current_usage: response.limits.current_usage,
            limit: response.limits.limit_value,
            reset_date: response.limits.reset_date,
            upgrade_required: matches!(
                response.decision,
                metron_core::AccessDecision::UpgradeRequired
            ),
            suggested_plan_id: response.suggested_plan_id.clone(),
        }
    }

    /// HTTP status equivalent for this denial.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        403
    }
}

/// Failures from the pre-operation admission check.
#[derive(Debug, Error)]
pub enum AdmissionFailure {
    /// The calling context carries no authenticated principal. Rejected
    /// before any quota logic; this is a caller error, not a denial.
    #[error("caller is not authenticated")]
    Unauthenticated,

    /// The authority denied the check, or it was unreachable and the
    /// check failed closed.
    #[error("access denied: {}", .0.message)]
    Denied(AccessDenial),
}

/// Outcome of a gated invocation, wrapping the operation's own error.
#[derive(Debug, Error)]
pub enum AdmissionError<E> {
    /// The calling context carries no authenticated principal.
    #[error("caller is not authenticated")]
    Unauthenticated,

    /// The check was denied; the operation never ran.
    #[error("access denied: {}", .0.message)]
    Denied(AccessDenial),

    /// The operation ran and failed on its own terms.
    #[error("{0}")]
    Operation(E),
}

impl<E> AdmissionError<E> {
    /// The denial payload, when this is a denial.
    #[must_use]
    pub fn denial(&self) -> Option<&AccessDenial> {
        match self {
            Self::Denied(denial) => Some(denial),
            _ => None,
        }
    }
}

impl<E> From<AdmissionFailure> for AdmissionError<E> {
    fn from(failure: AdmissionFailure) -> Self {
        match failure {
            AdmissionFailure::Unauthenticated => Self::Unauthenticated,
            AdmissionFailure::Denied(denial) => Self::Denied(denial),
        }
    }
}

/// Errors constructing or wiring the guard itself.
#[derive(Debug, Error)]
pub enum GuardError {
    /// The guard was misconfigured (e.g. missing required components).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The bus could not be reached while wiring subscriptions.
    #[error("bus error: {0}")]
    Bus(#[from] BusError),
}
