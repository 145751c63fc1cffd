//! Admission control for monetized business features.
//!
//! Wraps protected operations with a synchronous-style quota check
//! performed over an asynchronous message bus, fails closed when the
//! quota authority is unreachable, and reports usage either at approval
//! time or after the wrapped operation succeeds.

pub mod alerts;
pub mod builder;
pub mod correlator;
pub mod error;
pub mod guard;
pub mod reporter;

pub use alerts::AlertEmitter;
pub use builder::GuardBuilder;
pub use correlator::{DEFAULT_TIMEOUT, RequestReplyCorrelator};
pub use error::{AccessDenial, AdmissionError, AdmissionFailure, GuardError};
pub use guard::{Admission, AdmissionGuard};
pub use reporter::ConsumptionReporter;
