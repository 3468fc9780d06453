//! Storage containers written by the codec.
//!
//! Both containers are JSON documents. Binary fields travel as standard
//! base64 strings. The signed container keeps `data` as a raw JSON slice so
//! the exact signed bytes survive a store round trip.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::value::RawValue;

/// Ciphertext-only container. Holds nothing derived from the plaintext
/// except the ciphertext itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedEnvelope {
    #[serde(with = "base64_bytes")]
    pub ciphertext: Vec<u8>,
}

impl EncryptedEnvelope {
    pub fn new(ciphertext: Vec<u8>) -> Self {
        Self { ciphertext }
    }

    pub fn to_vec(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn from_slice(raw: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(raw)
    }
}

/// Canonical payload plus a detached signature over exactly those bytes.
#[derive(Debug, Serialize, Deserialize)]
pub struct SignedEnvelope {
    data: Box<RawValue>,
    #[serde(with = "base64_bytes")]
    signature: Vec<u8>,
}

impl SignedEnvelope {
    /// Wrap already-canonical JSON. Fails if `canonical` is not a single JSON value.
    pub fn new(canonical: String, signature: Vec<u8>) -> serde_json::Result<Self> {
        Ok(Self {
            data: RawValue::from_string(canonical)?,
            signature,
        })
    }

    /// The signed bytes, verbatim.
    pub fn data(&self) -> &[u8] {
        self.data.get().as_bytes()
    }

    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// Decode the payload from the preserved bytes.
    pub fn parse<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_str(self.data.get())
    }

    pub fn to_vec(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn from_slice(raw: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(raw)
    }
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn signed_envelope_preserves_data_bytes() {
        // Deliberately non-sorted key order and odd spacing.
        let canonical = r#"{"z":1,  "a":[true,null]}"#.to_string();
        let envelope = SignedEnvelope::new(canonical.clone(), vec![1, 2, 3]).expect("envelope");

        let raw = envelope.to_vec().expect("encode");
        let decoded = SignedEnvelope::from_slice(&raw).expect("decode");
        assert_eq!(decoded.data(), canonical.as_bytes());
        assert_eq!(decoded.signature(), &[1, 2, 3]);

        let value: serde_json::Value = decoded.parse().expect("parse");
        assert_eq!(value, json!({"a": [true, null], "z": 1}));
    }

    #[test]
    fn signed_envelope_rejects_non_json_payload() {
        assert!(SignedEnvelope::new("not json".into(), vec![]).is_err());
    }

    #[test]
    fn encrypted_envelope_encodes_ciphertext_as_base64() {
        let envelope = EncryptedEnvelope::new(vec![0xde, 0xad, 0xbe, 0xef]);
        let raw = envelope.to_vec().expect("encode");
        assert_eq!(raw, br#"{"ciphertext":"3q2+7w=="}"#);
        assert_eq!(EncryptedEnvelope::from_slice(&raw).expect("decode"), envelope);
    }

    #[test]
    fn encrypted_envelope_rejects_bad_base64() {
        let err = EncryptedEnvelope::from_slice(br#"{"ciphertext":"***"}"#);
        assert!(err.is_err());
    }
}
