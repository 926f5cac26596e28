//! JSON codec for stored records.
//!
//! Records travel to and from Redis as JSON strings. Encoding failures map
//! to [`RepositoryError::Serialization`] and decoding failures to
//! [`RepositoryError::Deserialization`], so callers can tell "bad data"
//! apart from "no data" and "store unavailable".

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::error;

use crate::error::RepositoryError;

/// Encode a record to its wire form.
pub fn encode<T: Serialize>(record: &T) -> Result<String, RepositoryError> {
    serde_json::to_string(record).map_err(|e| {
        error!(error = %e, "failed to serialize record");
        RepositoryError::Serialization(e)
    })
}

/// Decode wire bytes into a record, validating required fields and types.
pub fn decode<T: DeserializeOwned>(data: &str) -> Result<T, RepositoryError> {
    serde_json::from_str(data).map_err(|e| {
        error!(error = %e, "failed to deserialize stored record");
        RepositoryError::Deserialization(e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Sample {
        name: String,
        count: u32,
    }

    #[test]
    fn round_trip() {
        let sample = Sample {
            name: "widget".into(),
            count: 7,
        };
        let wire = encode(&sample).unwrap();
        let back: Sample = decode(&wire).unwrap();
        assert_eq!(back, sample);
    }

    #[test]
    fn malformed_payload_is_deserialization_error() {
        let err = decode::<Sample>("{not json").unwrap_err();
        assert!(matches!(err, RepositoryError::Deserialization(_)));
    }

    #[test]
    fn shape_mismatch_is_deserialization_error() {
        // Valid JSON, wrong shape: `count` is missing.
        let err = decode::<Sample>(r#"{"name": "widget"}"#).unwrap_err();
        assert!(matches!(err, RepositoryError::Deserialization(_)));
    }
}
