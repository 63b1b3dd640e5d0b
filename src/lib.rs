//! # avail-creator
//!
//! A transformation stage for an availability-monitoring pipeline.
//!
//! It subscribes to raw metric batches, picks out the HTTP status-code
//! samples (`<resourceId>.status.code`), turns each one into an `UP`/`DOWN`
//! availability record, and republishes the records of every inbound batch
//! as one outbound message.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐    ┌────────────────┐    ┌───────────────────┐    ┌──────────────┐
//! │  subscribe   │───▶│ run_deliveries │───▶│ MetricTransformer │───▶│  Publish-    │
//! │  (inbound)   │    │  (per message) │    │  parse ▶ derive   │    │  Capability  │
//! └──────────────┘    └────────────────┘    └───────────────────┘    └──────────────┘
//! ```
//!
//! - **[`transformer`]**: parsing, filtering, availability derivation and the
//!   scoped outbound publish
//! - **[`subscribe`]**: broker connection and the delivery loop that logs and
//!   swallows per-message failures
//! - **[`settings`]**: layered file + environment configuration
//! - **[`telemetry`]**: `tracing` subscriber setup
//!
//! ## Usage
//!
//! ```
//! use std::sync::Arc;
//! use avail_adapters::MemoryPublisher;
//! use avail_creator::MetricTransformer;
//!
//! # tokio_test::block_on(async {
//! let publisher = MemoryPublisher::new("HawkularAvailData");
//! let transformer = MetricTransformer::new(Arc::new(publisher.clone()));
//!
//! let payload = r#"{"metricData":{"tenantId":"t1","data":[
//!     {"source":"web1.status.code","value":503.0,"timestamp":1700000000000.0}
//! ]}}"#;
//!
//! transformer.process(payload).await.unwrap();
//!
//! assert_eq!(publisher.sent().len(), 1);
//! # });
//! ```

pub mod error;
pub mod settings;
pub mod subscribe;
pub mod telemetry;
pub mod transformer;

pub use error::TransformError;
pub use settings::Settings;
pub use transformer::{parse, transform, MetricTransformer, Outcome, UNCONFIGURED_DESTINATION};
