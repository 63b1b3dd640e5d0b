//! The metric transformer: raw metric batch in, availability batch out.
//!
//! Each call to [`MetricTransformer::process`] is self-contained. It parses
//! one payload, derives one record per status-code sample, and publishes the
//! resulting batch through a producer context that is acquired and released
//! within the call. Nothing is carried over between calls, so a single
//! transformer can be shared across any number of concurrent deliveries.

use std::sync::Arc;

use avail_adapters::{AdapterError, Encoded, Encoding, ProducerContext, PublishCapability};
use avail_types::{AvailBatch, MetricBatch};
use tracing::{debug, warn};

use crate::TransformError;

/// Name reported when no outbound destination is configured at all.
pub const UNCONFIGURED_DESTINATION: &str = "<unconfigured>";

/// Result of a successful invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The batch was sent as one message.
    Published(AvailBatch),
    /// The batch was empty and empty publishes are disabled.
    SkippedEmpty,
}

impl Outcome {
    /// The published batch, if any.
    pub fn batch(&self) -> Option<&AvailBatch> {
        match self {
            Outcome::Published(batch) => Some(batch),
            Outcome::SkippedEmpty => None,
        }
    }
}

/// Parse a raw payload into a typed metric batch.
///
/// Any deviation from the expected shape fails the whole batch; there is no
/// field-by-field recovery.
pub fn parse(payload: &str) -> Result<MetricBatch, TransformError> {
    Ok(serde_json::from_str(payload)?)
}

/// Parse a payload and derive its availability batch without publishing.
pub fn transform(payload: &str) -> Result<AvailBatch, TransformError> {
    let batch = parse(payload)?;
    let records: AvailBatch = batch.availability_records().collect();

    debug!(
        tenant = %batch.tenant_id(),
        samples = batch.samples().len(),
        records = records.len(),
        "Derived availability records"
    );

    Ok(records)
}

/// Turns metric batches into availability batches and publishes them.
pub struct MetricTransformer {
    publisher: Arc<dyn PublishCapability>,
    encoding: Encoding,
    skip_empty: bool,
}

impl MetricTransformer {
    /// Create a transformer publishing JSON through `publisher`.
    ///
    /// Empty batches are published unless [`MetricTransformer::skip_empty`]
    /// is enabled.
    pub fn new(publisher: Arc<dyn PublishCapability>) -> Self {
        Self {
            publisher,
            encoding: Encoding::default(),
            skip_empty: false,
        }
    }

    /// Set the wire encoding of outbound batches.
    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Suppress publishing when no sample qualified.
    pub fn skip_empty(mut self, skip: bool) -> Self {
        self.skip_empty = skip;
        self
    }

    /// Run one invocation for a raw inbound payload.
    pub async fn process(&self, payload: &str) -> Result<Outcome, TransformError> {
        let batch = transform(payload)?;

        if batch.is_empty() && self.skip_empty {
            debug!("No status-code samples, skipping empty publish");
            return Ok(Outcome::SkippedEmpty);
        }

        self.publish(&batch).await?;
        Ok(Outcome::Published(batch))
    }

    /// Run one invocation for raw payload bytes.
    pub async fn process_bytes(&self, payload: &[u8]) -> Result<Outcome, TransformError> {
        let payload = std::str::from_utf8(payload)?;
        self.process(payload).await
    }

    /// Send `batch` as a single message to the outbound destination.
    ///
    /// The producer context is released whether or not the send succeeded,
    /// and also when this future is dropped or panics before finishing.
    pub async fn publish(&self, batch: &AvailBatch) -> Result<(), TransformError> {
        let destination = match self.publisher.destination() {
            Some(destination) if self.publisher.is_available() => destination,
            configured => {
                let name = configured.unwrap_or(UNCONFIGURED_DESTINATION);
                return Err(TransformError::NoOutboundDestination(name.to_string()));
            }
        };

        let message = self.encoding.encode(batch)?;

        let mut context = ContextGuard::new(self.publisher.acquire().await?);
        let sent = context.send(destination, &message).await;
        let released = context.release().await;

        match (sent, released) {
            (Ok(()), Ok(())) => {
                debug!(
                    destination,
                    records = batch.len(),
                    bytes = message.bytes.len(),
                    "Published availability batch"
                );
                Ok(())
            }
            (Ok(()), Err(e)) => Err(e.into()),
            (Err(e), released) => {
                if let Err(release_err) = released {
                    warn!(destination, error = %release_err, "Failed to release producer context");
                }
                Err(e.into())
            }
        }
    }
}

/// Owns a producer context for the duration of one publish.
///
/// Dropping the guard before [`ContextGuard::release`] completes hands the
/// context to a background task that releases it.
struct ContextGuard {
    context: Option<Box<dyn ProducerContext>>,
}

impl ContextGuard {
    fn new(context: Box<dyn ProducerContext>) -> Self {
        Self {
            context: Some(context),
        }
    }

    async fn send(&mut self, destination: &str, message: &Encoded) -> Result<(), AdapterError> {
        match self.context.as_mut() {
            Some(context) => context.send(destination, message).await,
            None => Err(AdapterError::Publish(
                "producer context already released".to_string(),
            )),
        }
    }

    async fn release(&mut self) -> Result<(), AdapterError> {
        let result = match self.context.as_mut() {
            Some(context) => context.release().await,
            None => Ok(()),
        };
        // Only forget the context once release has run to completion
        self.context = None;
        result
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        let Some(mut context) = self.context.take() else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!("Releasing abandoned producer context");
                handle.spawn(async move {
                    if let Err(e) = context.release().await {
                        warn!(error = %e, "Failed to release abandoned producer context");
                    }
                });
            }
            Err(_) => warn!("No runtime available, dropping producer context unreleased"),
        }
    }
}

impl std::fmt::Debug for MetricTransformer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricTransformer")
            .field("destination", &self.publisher.destination())
            .field("encoding", &self.encoding)
            .field("skip_empty", &self.skip_empty)
            .finish()
    }
}
