//! Wire encodings for outbound availability batches.

use avail_types::AvailBatch;
use serde::{Deserialize, Serialize};

use crate::AdapterError;

/// How an [`AvailBatch`] is serialized before it is handed to a broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    /// A JSON array of records (`application/json`).
    #[default]
    Json,
    /// CBOR via minicbor (`application/cbor`).
    Cbor,
}

/// An encoded batch, ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoded {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
}

impl Encoding {
    /// MIME type announced alongside the payload.
    pub const fn content_type(&self) -> &'static str {
        match self {
            Encoding::Json => "application/json",
            Encoding::Cbor => "application/cbor",
        }
    }

    /// Encode a batch.
    pub fn encode(&self, batch: &AvailBatch) -> Result<Encoded, AdapterError> {
        let bytes = match self {
            Encoding::Json => serde_json::to_vec(batch)?,
            Encoding::Cbor => {
                minicbor::to_vec(batch).map_err(|e| AdapterError::Encode(e.to_string()))?
            }
        };

        Ok(Encoded {
            bytes,
            content_type: self.content_type(),
        })
    }

    /// Decode a batch previously produced by [`Encoding::encode`].
    pub fn decode(&self, bytes: &[u8]) -> Result<AvailBatch, AdapterError> {
        match self {
            Encoding::Json => {
                serde_json::from_slice(bytes).map_err(|e| AdapterError::Decode(e.to_string()))
            }
            Encoding::Cbor => {
                minicbor::decode(bytes).map_err(|e| AdapterError::Decode(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use avail_types::{AvailRecord, Availability};

    fn batch() -> AvailBatch {
        AvailBatch::from(vec![
            AvailRecord::new("t1", "R1", 1000, Availability::Up),
            AvailRecord::new("t1", "R2", 2000, Availability::Down),
        ])
    }

    #[test]
    fn test_json_encoding() {
        let encoded = Encoding::Json.encode(&batch()).unwrap();

        assert_eq!(encoded.content_type, "application/json");
        let text = String::from_utf8(encoded.bytes).unwrap();
        assert!(text.starts_with(r#"[{"tenantId":"t1","resourceId":"R1","timestamp":1000,"availability":"UP"}"#));
    }

    #[test]
    fn test_cbor_decodes_back() {
        let encoded = Encoding::Cbor.encode(&batch()).unwrap();

        assert_eq!(encoded.content_type, "application/cbor");
        assert_eq!(Encoding::Cbor.decode(&encoded.bytes).unwrap(), batch());
    }

    #[test]
    fn test_decode_failure_is_reported_as_decode() {
        for encoding in [Encoding::Json, Encoding::Cbor] {
            let err = encoding.decode(b"\xff not a batch").unwrap_err();
            assert!(matches!(err, AdapterError::Decode(_)), "{encoding:?}: {err}");
            assert!(err.to_string().starts_with("Failed to decode batch"));
        }
    }

    #[test]
    fn test_empty_batch_is_encodable() {
        let encoded = Encoding::Json.encode(&AvailBatch::new()).unwrap();
        assert_eq!(encoded.bytes, b"[]");
    }

    #[test]
    fn test_encoding_from_config_name() {
        let enc: Encoding = serde_json::from_str("\"cbor\"").unwrap();
        assert_eq!(enc, Encoding::Cbor);
        assert_eq!(Encoding::default(), Encoding::Json);
    }
}
