//! Raw metric batches as published by the metric collectors.

use alloc::string::String;
use alloc::vec::Vec;

use crate::{AvailRecord, Availability, STATUS_CODE_SUFFIX};

/// Top-level inbound message: one tenant's batch of metric samples.
///
/// On the wire this is `{"metricData": {"tenantId": ..., "data": [...]}}`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct MetricBatch {
    pub metric_data: MetricData,
}

/// Tenant id and the ordered samples of a [`MetricBatch`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct MetricData {
    /// Tenant shared by every sample in the batch.
    pub tenant_id: String,

    /// Samples in publication order.
    pub data: Vec<MetricSample>,
}

/// A single metric data point.
///
/// `source` is a dotted identifier of the form `<resourceId>.<metricName>...`.
/// Collectors emit both `value` and `timestamp` as JSON numbers, frequently
/// with a fractional representation even when logically integral.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MetricSample {
    pub source: String,
    pub value: f64,
    /// Milliseconds since the Unix epoch.
    pub timestamp: f64,
}

impl MetricSample {
    /// Create a new sample.
    pub fn new(source: impl Into<String>, value: f64, timestamp: f64) -> Self {
        Self {
            source: source.into(),
            value,
            timestamp,
        }
    }

    /// Whether this sample belongs to the HTTP status-code metric family.
    pub fn is_status_code(&self) -> bool {
        self.source.ends_with(STATUS_CODE_SUFFIX)
    }

    /// The resource id: everything before the first `.` of `source`.
    ///
    /// Returns `None` when `source` contains no `.` at all.
    pub fn resource_id(&self) -> Option<&str> {
        resource_id(&self.source)
    }

    /// The status code, truncated toward zero.
    pub fn status_code(&self) -> i64 {
        self.value as i64
    }

    /// The timestamp in whole milliseconds, truncated toward zero.
    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp as i64
    }

    /// Convert a status-code sample into an availability record.
    ///
    /// Returns `None` for samples of any other metric family, and for
    /// sources without a resource id.
    pub fn to_record(&self, tenant_id: &str) -> Option<AvailRecord> {
        if !self.is_status_code() {
            return None;
        }
        let resource_id = self.resource_id()?;

        Some(AvailRecord {
            tenant_id: tenant_id.into(),
            resource_id: resource_id.into(),
            timestamp: self.timestamp_ms(),
            availability: Availability::from_status_code(self.status_code()),
        })
    }
}

/// Extract the resource id from a dotted metric source.
///
/// Splits on the first `.` only, so `"abc.def.status.code"` yields `"abc"`.
pub fn resource_id(source: &str) -> Option<&str> {
    source.split_once('.').map(|(id, _)| id)
}

impl MetricBatch {
    /// Create a builder for a tenant's batch.
    pub fn builder(tenant_id: impl Into<String>) -> MetricBatchBuilder {
        MetricBatchBuilder::new(tenant_id)
    }

    pub fn tenant_id(&self) -> &str {
        &self.metric_data.tenant_id
    }

    pub fn samples(&self) -> &[MetricSample] {
        &self.metric_data.data
    }

    /// Availability records for every qualifying sample, in input order.
    pub fn availability_records(&self) -> impl Iterator<Item = AvailRecord> + '_ {
        let tenant_id = self.tenant_id();
        self.samples()
            .iter()
            .filter_map(move |sample| sample.to_record(tenant_id))
    }
}

/// Builder for `MetricBatch`.
#[derive(Debug)]
pub struct MetricBatchBuilder {
    tenant_id: String,
    data: Vec<MetricSample>,
}

impl MetricBatchBuilder {
    /// Create a new builder.
    pub fn new(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            data: Vec::new(),
        }
    }

    /// Append a sample.
    pub fn sample(mut self, source: impl Into<String>, value: f64, timestamp: f64) -> Self {
        self.data.push(MetricSample::new(source, value, timestamp));
        self
    }

    /// Build the batch.
    pub fn build(self) -> MetricBatch {
        MetricBatch {
            metric_data: MetricData {
                tenant_id: self.tenant_id,
                data: self.data,
            },
        }
    }
}
