//! # avail-types
//!
//! Types shared by every stage of the availability pipeline: the raw metric
//! batches published by collectors, and the availability records derived
//! from their HTTP status-code samples.
//!
//! ## Features
//!
//! - `std` (default): Standard library support
//! - `serde`: JSON serialization via serde, using the camelCase wire names
//!   (`metricData`, `tenantId`, `resourceId`, ...)
//! - `minicbor`: Compact binary serialization via CBOR
//! - `all`: Enable all serialization formats
//!
//! ## Example
//!
//! ```rust
//! use avail_types::{Availability, MetricBatch};
//!
//! let batch = MetricBatch::builder("t1")
//!     .sample("R1.status.code", 200.0, 1000.0)
//!     .sample("R1.response.time", 12.5, 1000.0)
//!     .sample("R2.status.code", 503.0, 2000.0)
//!     .build();
//!
//! let records: Vec<_> = batch.availability_records().collect();
//!
//! assert_eq!(records.len(), 2);
//! assert_eq!(records[0].availability, Availability::Up);
//! assert_eq!(records[1].availability, Availability::Down);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod availability;
mod metrics;
mod record;

pub use availability::*;
pub use metrics::*;
pub use record::*;

/// Suffix identifying HTTP status-code samples in a metric `source`.
///
/// Only samples whose source ends with this suffix are turned into
/// availability records; every other metric family is ignored.
pub const STATUS_CODE_SUFFIX: &str = ".status.code";
