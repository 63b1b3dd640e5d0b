//! Availability records and the outbound batch that carries them.

use alloc::string::String;
use alloc::vec::Vec;

use crate::Availability;

/// Availability of one resource at one point in time.
///
/// Built from exactly one status-code sample; never aggregated.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
#[cfg_attr(feature = "minicbor", derive(minicbor::Encode, minicbor::Decode))]
pub struct AvailRecord {
    #[cfg_attr(feature = "minicbor", n(0))]
    pub tenant_id: String,

    #[cfg_attr(feature = "minicbor", n(1))]
    pub resource_id: String,

    /// Milliseconds since the Unix epoch.
    #[cfg_attr(feature = "minicbor", n(2))]
    pub timestamp: i64,

    #[cfg_attr(feature = "minicbor", n(3))]
    pub availability: Availability,
}

impl AvailRecord {
    pub fn new(
        tenant_id: impl Into<String>,
        resource_id: impl Into<String>,
        timestamp: i64,
        availability: Availability,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            resource_id: resource_id.into(),
            timestamp,
            availability,
        }
    }
}

/// The ordered records derived from one inbound batch.
///
/// Serializes as a plain sequence of records. An empty batch is still a
/// valid message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
#[cfg_attr(feature = "minicbor", derive(minicbor::Encode, minicbor::Decode))]
#[cfg_attr(feature = "minicbor", cbor(transparent))]
pub struct AvailBatch(#[cfg_attr(feature = "minicbor", n(0))] Vec<AvailRecord>);

impl AvailBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: AvailRecord) {
        self.0.push(record);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn records(&self) -> &[AvailRecord] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &AvailRecord> {
        self.0.iter()
    }

    pub fn into_records(self) -> Vec<AvailRecord> {
        self.0
    }

    /// Number of records reporting `DOWN`.
    pub fn down_count(&self) -> usize {
        self.0.iter().filter(|r| !r.availability.is_up()).count()
    }
}

impl FromIterator<AvailRecord> for AvailBatch {
    fn from_iter<I: IntoIterator<Item = AvailRecord>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<Vec<AvailRecord>> for AvailBatch {
    fn from(records: Vec<AvailRecord>) -> Self {
        Self(records)
    }
}

impl IntoIterator for AvailBatch {
    type Item = AvailRecord;
    type IntoIter = alloc::vec::IntoIter<AvailRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_batch() -> AvailBatch {
        AvailBatch::from(alloc::vec![
            AvailRecord::new("t1", "R1", 1000, Availability::Up),
            AvailRecord::new("t1", "R2", 2000, Availability::Down),
        ])
    }

    #[test]
    fn test_batch_accessors() {
        let batch = sample_batch();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.down_count(), 1);
        assert_eq!(batch.records()[1].resource_id, "R2");
        assert!(AvailBatch::new().is_empty());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serde_wire_shape() {
        let json = serde_json::to_value(sample_batch()).unwrap();

        assert_eq!(
            json,
            serde_json::json!([
                {"tenantId": "t1", "resourceId": "R1", "timestamp": 1000, "availability": "UP"},
                {"tenantId": "t1", "resourceId": "R2", "timestamp": 2000, "availability": "DOWN"}
            ])
        );
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_empty_batch_serializes_as_empty_array() {
        let json = serde_json::to_string(&AvailBatch::new()).unwrap();
        assert_eq!(json, "[]");
    }

    #[cfg(feature = "minicbor")]
    #[test]
    fn test_minicbor_roundtrip() {
        let batch = sample_batch();

        let bytes = minicbor::to_vec(&batch).unwrap();
        let parsed: AvailBatch = minicbor::decode(&bytes).unwrap();

        assert_eq!(batch, parsed);
    }
}
