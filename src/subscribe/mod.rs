//! Message bus wiring for the availability pipeline.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────┐   raw payloads   ┌───────────────────────┐
//! │ Broker subscription   │─────────────────▶│ run_deliveries        │
//! │ (inbound topic)       │   mpsc channel   │ (bounded concurrency) │
//! └───────────────────────┘                  └───────────┬───────────┘
//!                                                        │ one call per delivery
//!                                                        ▼
//!                                            ┌───────────────────────┐
//!                                            │ MetricTransformer     │
//!                                            │ parse ▶ derive ▶ send │
//!                                            └───────────┬───────────┘
//!                                                        │ scoped producer context
//!                                                        ▼
//!                                            ┌───────────────────────┐
//!                                            │ Outbound destination  │
//!                                            └───────────────────────┘
//! ```

mod delivery;

pub use delivery::{report, run_deliveries, DeliveryOutcome, DeliverySummary};

use std::sync::Arc;

use anyhow::Result;
use avail_adapters::{Deliveries, PublishCapability};
use tokio::task::JoinHandle;
use tracing::info;

use crate::settings::{BrokerKind, Settings};

/// A live connection: the inbound deliveries and the outbound capability.
pub struct Connected {
    pub deliveries: Deliveries,
    pub publisher: Arc<dyn PublishCapability>,
    /// Background task forwarding broker deliveries into `deliveries`.
    pub subscription: JoinHandle<()>,
}

impl std::fmt::Debug for Connected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connected")
            .field("destination", &self.publisher.destination())
            .finish()
    }
}

/// Connect to the configured broker and subscribe to the inbound topic.
pub async fn connect(settings: &Settings) -> Result<Connected> {
    let inbound = settings.topics.inbound.as_str();
    let outbound = settings.topics.outbound_destination().map(str::to_string);

    info!(
        broker = ?settings.broker.kind,
        inbound,
        outbound = outbound.as_deref().unwrap_or(crate::UNCONFIGURED_DESTINATION),
        "Connecting to message bus"
    );

    match settings.broker.kind {
        #[cfg(feature = "nats")]
        BrokerKind::Nats => {
            use avail_adapters::nats::NatsBroker;

            let mut builder = NatsBroker::builder();
            if let Some(url) = &settings.broker.url {
                builder = builder.url(url);
            }
            if let Some(creds) = &settings.broker.credentials_file {
                builder = builder.credentials_file(creds);
            }
            let broker = builder.build().await?;

            let (deliveries, subscription) = broker.subscribe(inbound).await?;
            Ok(Connected {
                deliveries,
                publisher: Arc::new(broker.publisher(outbound)),
                subscription,
            })
        }
        #[cfg(feature = "rabbitmq")]
        BrokerKind::Rabbitmq => {
            use avail_adapters::rabbitmq::RabbitMqBroker;

            let mut builder = RabbitMqBroker::builder();
            if let Some(url) = &settings.broker.url {
                builder = builder.url(url);
            }
            if let Some(exchange) = &settings.broker.exchange {
                builder = builder.exchange(exchange);
            }
            let broker = builder.build().await?;

            let (deliveries, subscription) = broker.subscribe(inbound).await?;
            Ok(Connected {
                deliveries,
                publisher: Arc::new(broker.publisher(outbound)),
                subscription,
            })
        }
        #[allow(unreachable_patterns)]
        other => Err(anyhow::anyhow!(
            "Broker {:?} is not supported by this build (enable the matching feature)",
            other
        )),
    }
}
