//! RabbitMQ adapter using AMQP 0.9.1 via `lapin`.
//!
//! Metric batches and availability batches travel through a single topic
//! exchange; the inbound topic and the outbound destination are routing keys.
//!
//! - A producer context is a dedicated AMQP channel, opened on acquire and
//!   closed on release.
//! - A subscription binds an exclusive, auto-delete queue to the inbound
//!   routing key and acks each delivery once it is handed to the consumer.
//!
//! ## Example
//!
//! ```rust,no_run
//! use avail_adapters::rabbitmq::RabbitMqBroker;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let broker = RabbitMqBroker::builder()
//!         .url("amqp://127.0.0.1:5672/%2f")
//!         .exchange("hawkular")
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

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, ExchangeDeclareOptions,
    QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::{
    AdapterError, Deliveries, Encoded, ProducerContext, PublishCapability, DELIVERY_BUFFER,
};

const REPLY_SUCCESS: u16 = 200;
const CONSUMER_TAG: &str = "avail-creator";

/// A connected RabbitMQ broker with a declared topic exchange.
#[derive(Clone)]
pub struct RabbitMqBroker {
    connection: Arc<Connection>,
    exchange: String,
}

impl RabbitMqBroker {
    /// Create a new builder for configuring the connection.
    pub fn builder() -> RabbitMqBrokerBuilder {
        RabbitMqBrokerBuilder::default()
    }

    /// The exchange used for both directions.
    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    /// A publisher routing to `destination` on this broker's exchange.
    pub fn publisher(&self, destination: Option<String>) -> RabbitMqPublisher {
        RabbitMqPublisher {
            connection: self.connection.clone(),
            exchange: self.exchange.clone(),
            destination,
        }
    }

    /// Bind a private queue to `topic` and forward each payload to the
    /// returned channel.
    pub async fn subscribe(
        &self,
        topic: &str,
    ) -> Result<(Deliveries, JoinHandle<()>), AdapterError> {
        let channel = self
            .connection
            .create_channel()
            .await
            .map_err(|e| AdapterError::Subscribe(e.to_string()))?;

        let queue = channel
            .queue_declare(
                "",
                QueueDeclareOptions {
                    exclusive: true,
                    auto_delete: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| AdapterError::Subscribe(e.to_string()))?;

        channel
            .queue_bind(
                queue.name().as_str(),
                &self.exchange,
                topic,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| AdapterError::Subscribe(e.to_string()))?;

        let mut consumer = channel
            .basic_consume(
                queue.name().as_str(),
                CONSUMER_TAG,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| AdapterError::Subscribe(e.to_string()))?;

        info!(
            exchange = %self.exchange,
            topic,
            queue = %queue.name().as_str(),
            "Subscribed to RabbitMQ topic"
        );

        let (tx, rx) = mpsc::channel(DELIVERY_BUFFER);
        let topic = topic.to_string();

        let handle = tokio::spawn(async move {
            // Keep the channel open for as long as the consumer runs
            let _channel = channel;

            while let Some(delivery) = consumer.next().await {
                match delivery {
                    Ok(delivery) => {
                        let acker = delivery.acker;
                        // Unacked deliveries are requeued by the broker once the channel closes
                        if tx.send(delivery.data).await.is_err() {
                            debug!(topic = %topic, "Delivery receiver closed, stopping consumer");
                            break;
                        }
                        // Acked once handed over: a delivery is consumed whatever the outcome
                        if let Err(e) = acker.ack(BasicAckOptions::default()).await {
                            warn!(topic = %topic, error = %e, "Failed to ack delivery");
                        }
                    }
                    Err(e) => {
                        error!(topic = %topic, error = %e, "Error reading from RabbitMQ consumer");
                        break;
                    }
                }
            }
        });

        Ok((rx, handle))
    }
}

impl std::fmt::Debug for RabbitMqBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RabbitMqBroker")
            .field("exchange", &self.exchange)
            .finish()
    }
}

/// Publishes availability batches to the exchange under a routing key.
#[derive(Clone)]
pub struct RabbitMqPublisher {
    connection: Arc<Connection>,
    exchange: String,
    destination: Option<String>,
}

impl std::fmt::Debug for RabbitMqPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RabbitMqPublisher")
            .field("exchange", &self.exchange)
            .field("destination", &self.destination)
            .finish()
    }
}

#[async_trait]
impl PublishCapability for RabbitMqPublisher {
    fn destination(&self) -> Option<&str> {
        self.destination.as_deref()
    }

    fn is_available(&self) -> bool {
        self.destination.is_some() && self.connection.status().connected()
    }

    async fn acquire(&self) -> Result<Box<dyn ProducerContext>, AdapterError> {
        let channel = self
            .connection
            .create_channel()
            .await
            .map_err(|e| AdapterError::Connection(e.to_string()))?;

        Ok(Box::new(RabbitMqContext {
            channel,
            exchange: self.exchange.clone(),
        }))
    }
}

struct RabbitMqContext {
    channel: Channel,
    exchange: String,
}

#[async_trait]
impl ProducerContext for RabbitMqContext {
    async fn send(&mut self, destination: &str, message: &Encoded) -> Result<(), AdapterError> {
        let properties = BasicProperties::default().with_content_type(message.content_type.into());

        self.channel
            .basic_publish(
                &self.exchange,
                destination,
                BasicPublishOptions::default(),
                &message.bytes,
                properties,
            )
            .await?
            .await?;

        Ok(())
    }

    async fn release(&mut self) -> Result<(), AdapterError> {
        self.channel
            .close(REPLY_SUCCESS, "OK")
            .await
            .map_err(|e| AdapterError::Release(e.to_string()))
    }
}

/// Builder for RabbitMqBroker.
#[derive(Debug, Default)]
pub struct RabbitMqBrokerBuilder {
    url: Option<String>,
    exchange: Option<String>,
}

impl RabbitMqBrokerBuilder {
    /// Set the AMQP URL (default: "amqp://127.0.0.1:5672/%2f").
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Set the topic exchange name (default: "hawkular").
    pub fn exchange(mut self, exchange: impl Into<String>) -> Self {
        self.exchange = Some(exchange.into());
        self
    }

    fn url_or_default(&self) -> String {
        self.url
            .clone()
            .unwrap_or_else(|| "amqp://127.0.0.1:5672/%2f".to_string())
    }

    fn exchange_or_default(&self) -> String {
        self.exchange
            .clone()
            .unwrap_or_else(|| "hawkular".to_string())
    }

    /// Connect and declare the exchange.
    pub async fn build(self) -> Result<RabbitMqBroker, AdapterError> {
        let url = self.url_or_default();
        let exchange = self.exchange_or_default();

        let connection = Connection::connect(&url, ConnectionProperties::default())
            .await
            .map_err(|e| AdapterError::Connection(e.to_string()))?;

        let channel = connection.create_channel().await?;
        channel
            .exchange_declare(
                &exchange,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;
        channel.close(REPLY_SUCCESS, "OK").await?;

        info!(exchange = %exchange, "Connected to RabbitMQ");

        Ok(RabbitMqBroker {
            connection: Arc::new(connection),
            exchange,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let builder = RabbitMqBroker::builder();
        assert_eq!(builder.url_or_default(), "amqp://127.0.0.1:5672/%2f");
        assert_eq!(builder.exchange_or_default(), "hawkular");
    }

    #[test]
    fn test_builder_custom() {
        let builder = RabbitMqBroker::builder()
            .url("amqp://rabbit.local:5672/metrics")
            .exchange("monitoring");

        assert_eq!(builder.url_or_default(), "amqp://rabbit.local:5672/metrics");
        assert_eq!(builder.exchange_or_default(), "monitoring");
    }
}
