//! Error types for adapters.

use thiserror::Error;

/// Errors that can occur while talking to a message bus.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Connecting to the broker, or opening a producer context, failed.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Authentication failed.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The broker rejected or dropped an outbound message.
    #[error("Publish failed: {0}")]
    Publish(String),

    /// Subscribing to an inbound topic failed.
    #[error("Subscribe failed: {0}")]
    Subscribe(String),

    /// The outbound batch could not be encoded.
    #[error("Failed to encode batch: {0}")]
    Encode(String),

    /// A received payload could not be decoded into a batch.
    #[error("Failed to decode batch: {0}")]
    Decode(String),

    /// Closing a producer context failed.
    #[error("Failed to release producer context: {0}")]
    Release(String),
}

impl From<serde_json::Error> for AdapterError {
    fn from(err: serde_json::Error) -> Self {
        AdapterError::Encode(err.to_string())
    }
}

#[cfg(feature = "rabbitmq")]
impl From<lapin::Error> for AdapterError {
    fn from(err: lapin::Error) -> Self {
        match &err {
            lapin::Error::IOError(_) | lapin::Error::InvalidConnectionState(_) => {
                AdapterError::Connection(err.to_string())
            }
            _ => AdapterError::Publish(err.to_string()),
        }
    }
}
