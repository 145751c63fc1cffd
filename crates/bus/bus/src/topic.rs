//! Logical channel names shared by every component on the bus.
//!
//! The request/reply exchange uses the `access-request`/`access-response`
//! pair; everything else is fire-and-forget.

/// Guard/client → authority: `AccessRequest` payloads.
pub const ACCESS_REQUEST: &str = "business-feature.access-request";

/// Authority → guard/client: `AccessResponse` payloads, matched to their
/// request by `request_id`.
pub const ACCESS_RESPONSE: &str = "business-feature.access-response";

/// Reporter → authority: `ConsumptionEvent` payloads.
pub const CONSUMPTION: &str = "business-feature.consumption";

/// Authority → subscribers: `LimitsUpdateEvent` payloads.
pub const LIMITS_UPDATED: &str = "business-feature.limits-updated";

/// Authority → subscribers: `ResetCountersEvent` payloads.
pub const RESET_COUNTERS: &str = "business-feature.reset-counters";

/// Alert emitter → alert sink: `Alert` payloads.
pub const ALERTS: &str = "business-feature.alerts";
