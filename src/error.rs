//! Error types for a single transformation invocation.

use avail_adapters::AdapterError;
use thiserror::Error;

/// Why an invocation ended without publishing a batch.
///
/// Every variant is terminal for the invocation it came from. None of them
/// asks the transport to redeliver the inbound message.
#[derive(Debug, Error)]
pub enum TransformError {
    /// The inbound payload is not a valid metric batch: unparsable JSON,
    /// missing required fields, wrong field types, or non-UTF-8 bytes.
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// The outbound destination is not configured or not reachable.
    #[error("Outbound destination {0} is not available")]
    NoOutboundDestination(String),

    /// Acquiring the producer context, encoding, or sending failed.
    #[error("Publish failed: {0}")]
    PublishFailure(#[from] AdapterError),
}

impl TransformError {
    /// Whether this should be reported as an error rather than a warning.
    ///
    /// A missing destination is an expected runtime condition.
    pub fn is_hard_failure(&self) -> bool {
        !matches!(self, TransformError::NoOutboundDestination(_))
    }
}

impl From<serde_json::Error> for TransformError {
    fn from(err: serde_json::Error) -> Self {
        TransformError::MalformedPayload(err.to_string())
    }
}

impl From<std::str::Utf8Error> for TransformError {
    fn from(err: std::str::Utf8Error) -> Self {
        TransformError::MalformedPayload(format!("payload is not UTF-8: {}", err))
    }
}
