use thiserror::Error;

/// Errors surfaced by a message bus backend.
#[derive(Debug, Error)]
pub enum BusError {
    /// Publishing a message failed.
    #[error("publish failed: {0}")]
    Publish(String),

    /// Creating a subscription failed.
    #[error("subscribe failed: {0}")]
    Subscribe(String),

    /// The bus or topic has been shut down.
    #[error("bus closed")]
    Closed,

    /// A payload could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),
}
