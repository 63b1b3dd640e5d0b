//! # avail-adapters
//!
//! Message bus plumbing for the availability pipeline.
//!
//! The transformation core never talks to a broker directly. It consumes two
//! capabilities defined here:
//!
//! - [`PublishCapability`]: reports whether the outbound destination is
//!   available and hands out short-lived [`ProducerContext`]s
//! - [`Deliveries`]: a channel of raw inbound payloads fed by a subscription
//!
//! ## Supported Systems
//!
//! - **Memory** (always built) - In-process publisher for tests and local wiring
//! - **NATS** (`nats` feature) - Core NATS subjects via `async-nats`
//! - **RabbitMQ** (`rabbitmq` feature) - Topic exchange via `lapin`
//!
//! ## Quick Start (memory)
//!
//! ```rust
//! use avail_adapters::{Encoding, MemoryPublisher, ProducerContext, PublishCapability};
//! use avail_types::AvailBatch;
//!
//! # tokio_test::block_on(async {
//! let publisher = MemoryPublisher::new("HawkularAvailData");
//! let encoded = Encoding::Json.encode(&AvailBatch::new()).unwrap();
//!
//! let mut context = publisher.acquire().await.unwrap();
//! context.send("HawkularAvailData", &encoded).await.unwrap();
//! context.release().await.unwrap();
//!
//! assert_eq!(publisher.sent().len(), 1);
//! assert_eq!(publisher.open_contexts(), 0);
//! # });
//! ```

use async_trait::async_trait;

pub mod codec;
pub mod error;
pub mod memory;

#[cfg(feature = "rabbitmq")]
pub mod rabbitmq;

#[cfg(feature = "nats")]
pub mod nats;

pub use codec::{Encoded, Encoding};
pub use error::AdapterError;
pub use memory::{MemoryPublisher, SentMessage};

// Re-export types for convenience
pub use avail_types::{AvailBatch, AvailRecord, Availability, MetricBatch};

/// Raw inbound payloads, one per broker delivery.
pub type Deliveries = tokio::sync::mpsc::Receiver<Vec<u8>>;

/// Capacity of the channel between a subscription and its consumer.
pub const DELIVERY_BUFFER: usize = 64;

/// Access to the outbound destination.
///
/// Implementations are created once from environment configuration and
/// shared by every invocation; each invocation acquires its own
/// [`ProducerContext`] and releases it before returning.
#[async_trait]
pub trait PublishCapability: Send + Sync {
    /// Name of the outbound destination, if one is configured.
    fn destination(&self) -> Option<&str>;

    /// Whether the destination is configured and the broker reachable.
    ///
    /// When this returns false no context is acquired and nothing is sent.
    fn is_available(&self) -> bool;

    /// Open a short-lived producer context.
    async fn acquire(&self) -> Result<Box<dyn ProducerContext>, AdapterError>;
}

/// A scoped producer connection.
///
/// Callers must invoke [`ProducerContext::release`] exactly once on every
/// path, whether or not `send` succeeded.
#[async_trait]
pub trait ProducerContext: Send {
    /// Send one encoded message to `destination`.
    async fn send(&mut self, destination: &str, message: &Encoded) -> Result<(), AdapterError>;

    /// Flush and close the context.
    async fn release(&mut self) -> Result<(), AdapterError>;
}
