use thiserror::Error;

use crate::{
    protection::CryptoError,
    store::{StoreError, StoreOp},
};

/// Errors returned by [`crate::EnvelopeCodec`]. Each variant names the key
/// it was operating on and keeps the lower-layer error as its source.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// The caller's value could not be canonicalized, or a payload could
    /// not be decoded into the requested type.
    #[error("serialization failed for key {key}: {source}")]
    Serialization {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    /// The stored record is not a valid container.
    #[error("malformed envelope for key {key}: {source}")]
    MalformedEnvelope {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("{source} (key {key})")]
    Crypto {
        key: String,
        #[source]
        source: CryptoError,
    },
    #[error("store {op} failed for key {key}: {source}")]
    Store {
        key: String,
        op: StoreOp,
        #[source]
        source: StoreError,
    },
}

impl EnvelopeError {
    pub fn key(&self) -> &str {
        match self {
            EnvelopeError::Serialization { key, .. }
            | EnvelopeError::MalformedEnvelope { key, .. }
            | EnvelopeError::Crypto { key, .. }
            | EnvelopeError::Store { key, .. } => key,
        }
    }

    /// True when the store reported the key as absent.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            EnvelopeError::Store {
                source: StoreError::NotFound { .. },
                ..
            }
        )
    }

    /// True when a compare-and-swap lost to a concurrent writer; reread and retry.
    pub fn is_cas_conflict(&self) -> bool {
        matches!(
            self,
            EnvelopeError::Store {
                source: StoreError::CasConflict { .. },
                ..
            }
        )
    }

    pub(crate) fn serialization(key: &str, source: serde_json::Error) -> Self {
        EnvelopeError::Serialization {
            key: key.to_string(),
            source,
        }
    }

    pub(crate) fn malformed(key: &str, source: serde_json::Error) -> Self {
        EnvelopeError::MalformedEnvelope {
            key: key.to_string(),
            source,
        }
    }

    pub(crate) fn crypto(key: &str, source: CryptoError) -> Self {
        EnvelopeError::Crypto {
            key: key.to_string(),
            source,
        }
    }

    pub(crate) fn store(key: &str, op: StoreOp, source: StoreError) -> Self {
        EnvelopeError::Store {
            key: key.to_string(),
            op,
            source,
        }
    }
}
