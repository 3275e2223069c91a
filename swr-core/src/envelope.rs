//! Envelope codec for cache entries.
//!
//! An envelope wraps a cached payload together with the instant after which
//! it should be revalidated. The byte form is JSON:
//!
//! ```text
//! {"v":1,"data":<payload>,"revalidate_at":"2024-05-01T12:00:00.123456789Z"}
//! ```
//!
//! Timestamps are written as RFC 3339 with nanosecond precision, so a decoded
//! envelope compares equal to the one that was encoded.

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{CodecError, Timestamp};

/// Current envelope format version.
pub const ENVELOPE_VERSION: u32 = 1;

/// A cached payload plus its soft-expiry instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    #[serde(rename = "v")]
    version: u32,
    data: T,
    revalidate_at: Timestamp,
}

impl<T> Envelope<T> {
    /// Wrap a payload with its revalidation instant.
    pub fn new(data: T, revalidate_at: Timestamp) -> Self {
        Self {
            version: ENVELOPE_VERSION,
            data,
            revalidate_at,
        }
    }

    /// The cached payload.
    pub fn data(&self) -> &T {
        &self.data
    }

    /// When the payload stops being fresh.
    pub fn revalidate_at(&self) -> Timestamp {
        self.revalidate_at
    }

    /// True once `now` is past `revalidate_at`.
    pub fn is_stale(&self, now: Timestamp) -> bool {
        self.revalidate_at < now
    }

    pub fn into_parts(self) -> (T, Timestamp) {
        (self.data, self.revalidate_at)
    }
}

impl<T: Serialize> Envelope<T> {
    /// Serialize to the stored byte form.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(self).map_err(|e| CodecError::Encode {
            reason: e.to_string(),
        })
    }
}

impl<T: DeserializeOwned> Envelope<T> {
    /// Parse the stored byte form. Nothing is returned unless every field
    /// decodes and the version matches.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        let envelope: Envelope<T> =
            serde_json::from_slice(bytes).map_err(|e| CodecError::Decode {
                reason: e.to_string(),
            })?;
        if envelope.version != ENVELOPE_VERSION {
            return Err(CodecError::UnsupportedVersion {
                found: envelope.version,
                expected: ENVELOPE_VERSION,
            });
        }
        Ok(envelope)
    }
}

/// Encode `(payload, revalidate_at)` into bytes.
pub fn encode<T: Serialize>(payload: &T, revalidate_at: Timestamp) -> Result<Vec<u8>, CodecError> {
    Envelope::new(payload, revalidate_at).to_bytes()
}

/// Decode bytes back into `(payload, revalidate_at)`.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<(T, Timestamp), CodecError> {
    Envelope::from_bytes(bytes).map(Envelope::into_parts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use std::collections::BTreeMap;

    #[test]
    fn test_round_trip_preserves_nanoseconds() {
        let at = Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap();
        let bytes = encode(&json!({"n": 1}), at).unwrap();
        let (payload, decoded_at): (serde_json::Value, _) = decode(&bytes).unwrap();
        assert_eq!(payload, json!({"n": 1}));
        assert_eq!(decoded_at, at);
    }

    #[test]
    fn test_wire_shape() {
        let at = Utc.timestamp_opt(0, 0).unwrap();
        let bytes = encode(&"x", at).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["v"], json!(1));
        assert_eq!(value["data"], json!("x"));
        assert!(value["revalidate_at"].as_str().unwrap().starts_with("1970-01-01T00:00:00"));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = decode::<serde_json::Value>(b"not json").unwrap_err();
        assert!(matches!(err, CodecError::Decode { .. }));
    }

    #[test]
    fn test_decode_rejects_wrong_payload_shape() {
        let at = Utc::now();
        let bytes = encode(&"a string", at).unwrap();
        let err = decode::<Vec<u32>>(&bytes).unwrap_err();
        assert!(matches!(err, CodecError::Decode { .. }));
    }

    #[test]
    fn test_decode_rejects_unknown_version() {
        let bytes = br#"{"v":2,"data":1,"revalidate_at":"2024-01-01T00:00:00Z"}"#;
        let err = decode::<u32>(bytes).unwrap_err();
        assert_eq!(
            err,
            CodecError::UnsupportedVersion {
                found: 2,
                expected: ENVELOPE_VERSION
            }
        );
    }

    #[test]
    fn test_encode_fails_for_unserializable_payload() {
        // JSON object keys must be strings.
        let mut map = BTreeMap::new();
        map.insert(vec![1u8], 1u8);
        let err = encode(&map, Utc::now()).unwrap_err();
        assert!(matches!(err, CodecError::Encode { .. }));
    }

    #[test]
    fn test_is_stale() {
        let now = Utc::now();
        let envelope = Envelope::new((), now);
        assert!(!envelope.is_stale(now));
        assert!(envelope.is_stale(now + chrono::Duration::milliseconds(1)));
        assert!(!envelope.is_stale(now - chrono::Duration::seconds(1)));
    }
}
