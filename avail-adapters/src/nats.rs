//! NATS adapter for receiving metric batches and publishing availability.
//!
//! One client connection is shared by the subscription and every producer
//! context. A producer context is a lightweight handle on that client; its
//! release flushes pending writes so a batch has left the process before the
//! invocation completes.
//!
//! ## Example
//!
//! ```rust,no_run
//! use avail_adapters::nats::NatsBroker;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let broker = NatsBroker::builder()
//!         .url("nats://localhost:4222")
//!         .build()
//!         .await?;
//!
//!     let publisher = broker.publisher(Some("HawkularAvailData".to_string()));
//!     let (mut deliveries, _task) = broker.subscribe("HawkularMetricData").await?;
//!
//!     while let Some(payload) = deliveries.recv().await {
//!         println!("received {} bytes", payload.len());
//!     }
//!
//!     Ok(())
//! }
//! ```

use async_nats::connection::State;
use async_nats::Client;
use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::{
    AdapterError, Deliveries, Encoded, ProducerContext, PublishCapability, DELIVERY_BUFFER,
};

/// A connected NATS client.
#[derive(Clone)]
pub struct NatsBroker {
    client: Client,
}

impl NatsBroker {
    /// Create a new builder for configuring the connection.
    pub fn builder() -> NatsBrokerBuilder {
        NatsBrokerBuilder::default()
    }

    /// A publisher for `destination` sharing this connection.
    pub fn publisher(&self, destination: Option<String>) -> NatsPublisher {
        NatsPublisher {
            client: self.client.clone(),
            destination,
        }
    }

    /// Subscribe to `subject` and forward each payload to the returned channel.
    ///
    /// The forwarding task stops when the subscription ends or the receiver
    /// is dropped.
    pub async fn subscribe(
        &self,
        subject: &str,
    ) -> Result<(Deliveries, JoinHandle<()>), AdapterError> {
        let mut subscriber = self
            .client
            .subscribe(subject.to_string())
            .await
            .map_err(|e| AdapterError::Subscribe(e.to_string()))?;

        info!(subject, "Subscribed to NATS subject");

        let (tx, rx) = mpsc::channel(DELIVERY_BUFFER);
        let subject = subject.to_string();

        let handle = tokio::spawn(async move {
            while let Some(message) = subscriber.next().await {
                if tx.send(message.payload.to_vec()).await.is_err() {
                    debug!(subject = %subject, "Delivery receiver dropped, stopping subscription");
                    break;
                }
            }
        });

        Ok((rx, handle))
    }
}

impl std::fmt::Debug for NatsBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NatsBroker").finish()
    }
}

/// Publishes availability batches to a NATS subject.
#[derive(Clone)]
pub struct NatsPublisher {
    client: Client,
    destination: Option<String>,
}

impl std::fmt::Debug for NatsPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NatsPublisher")
            .field("destination", &self.destination)
            .finish()
    }
}

#[async_trait]
impl PublishCapability for NatsPublisher {
    fn destination(&self) -> Option<&str> {
        self.destination.as_deref()
    }

    fn is_available(&self) -> bool {
        self.destination.is_some() && matches!(self.client.connection_state(), State::Connected)
    }

    async fn acquire(&self) -> Result<Box<dyn ProducerContext>, AdapterError> {
        Ok(Box::new(NatsContext {
            client: self.client.clone(),
        }))
    }
}

struct NatsContext {
    client: Client,
}

#[async_trait]
impl ProducerContext for NatsContext {
    async fn send(&mut self, destination: &str, message: &Encoded) -> Result<(), AdapterError> {
        self.client
            .publish(destination.to_string(), message.bytes.clone().into())
            .await
            .map_err(|e| AdapterError::Publish(e.to_string()))
    }

    async fn release(&mut self) -> Result<(), AdapterError> {
        self.client
            .flush()
            .await
            .map_err(|e| AdapterError::Release(e.to_string()))
    }
}

/// Builder for NatsBroker.
#[derive(Debug, Default)]
pub struct NatsBrokerBuilder {
    url: Option<String>,
    credentials: Option<String>,
}

impl NatsBrokerBuilder {
    /// Set the NATS server URL (default: "nats://localhost:4222").
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Set the path to a credentials file for authentication.
    pub fn credentials_file(mut self, path: impl Into<String>) -> Self {
        self.credentials = Some(path.into());
        self
    }

    /// Connect to the server.
    pub async fn build(self) -> Result<NatsBroker, AdapterError> {
        let url = self
            .url
            .unwrap_or_else(|| "nats://localhost:4222".to_string());

        let client = if let Some(creds) = self.credentials {
            async_nats::ConnectOptions::new()
                .credentials_file(&creds)
                .await
                .map_err(|e| AdapterError::Auth(e.to_string()))?
                .connect(&url)
                .await
                .map_err(|e| AdapterError::Connection(e.to_string()))?
        } else {
            async_nats::connect(&url)
                .await
                .map_err(|e| AdapterError::Connection(e.to_string()))?
        };

        info!(url = %url, "Connected to NATS");

        Ok(NatsBroker { client })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let builder = NatsBroker::builder().url("nats://localhost:4222");

        assert!(builder.url.is_some());
        assert_eq!(builder.url.unwrap(), "nats://localhost:4222");
        assert!(builder.credentials.is_none());
    }

    #[test]
    fn test_builder_credentials() {
        let builder = NatsBroker::builder().credentials_file("/etc/nats/avail.creds");
        assert_eq!(builder.credentials.as_deref(), Some("/etc/nats/avail.creds"));
    }
}
