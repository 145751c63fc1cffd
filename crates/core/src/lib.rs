pub mod access;
pub mod alert;
pub mod caller;
pub mod consumption;
pub mod policy;
pub mod types;

pub use access::{
    AccessDecision, AccessRequest, AccessResponse, SERVICE_UNAVAILABLE_REASON, UsageLimits,
};
pub use alert::{Alert, AlertSeverity};
pub use caller::{ADMIN_ROLE, CallContext, Principal};
pub use consumption::{ConsumptionEvent, LimitsUpdateEvent, ResetCountersEvent, ResetType};
pub use policy::{ConsumptionMode, FeaturePolicy, PolicyRegistry};
pub use types::{CustomerId, FeatureId, ServiceName, UserId};
