pub mod error;
pub mod testing;
pub mod topic;
pub mod transport;

pub use error::BusError;
pub use transport::{MessageBus, Subscription};
