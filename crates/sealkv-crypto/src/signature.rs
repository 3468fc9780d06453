//! Detached signature encoding: an 8-byte signer id followed by the 64-byte
//! Ed25519 signature.

use std::fmt;

use ed25519_dalek::{Signature, Signer as _, SigningKey, VerifyingKey};
use sha2::{Digest, Sha256};

use crate::error::ProviderError;

pub const KEY_ID_LEN: usize = 8;
pub const SIGNATURE_LEN: usize = KEY_ID_LEN + ed25519_dalek::SIGNATURE_LENGTH;

/// Short signer identifier: the first 8 bytes of SHA-256 over the verifying key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyId([u8; KEY_ID_LEN]);

impl KeyId {
    pub fn of(key: &VerifyingKey) -> Self {
        let digest = Sha256::digest(key.as_bytes());
        let mut id = [0u8; KEY_ID_LEN];
        id.copy_from_slice(&digest[..KEY_ID_LEN]);
        Self(id)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_ID_LEN] {
        &self.0
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetachedSignature {
    pub signer: KeyId,
    pub signature: Signature,
}

impl DetachedSignature {
    pub fn create(key: &SigningKey, message: &[u8]) -> Self {
        Self {
            signer: KeyId::of(&key.verifying_key()),
            signature: key.sign(message),
        }
    }

    pub fn to_bytes(&self) -> [u8; SIGNATURE_LEN] {
        let mut out = [0u8; SIGNATURE_LEN];
        out[..KEY_ID_LEN].copy_from_slice(self.signer.as_bytes());
        out[KEY_ID_LEN..].copy_from_slice(&self.signature.to_bytes());
        out
    }

    pub fn from_bytes(raw: &[u8]) -> Result<Self, ProviderError> {
        if raw.len() != SIGNATURE_LEN {
            return Err(ProviderError::MalformedSignature(format!(
                "expected {SIGNATURE_LEN} bytes, got {}",
                raw.len()
            )));
        }
        let mut id = [0u8; KEY_ID_LEN];
        id.copy_from_slice(&raw[..KEY_ID_LEN]);
        let signature = Signature::from_slice(&raw[KEY_ID_LEN..])
            .map_err(|e| ProviderError::MalformedSignature(e.to_string()))?;
        Ok(Self {
            signer: KeyId(id),
            signature,
        })
    }

    /// Strict Ed25519 verification against `key`.
    pub fn check(&self, key: &VerifyingKey, message: &[u8]) -> Result<(), ProviderError> {
        key.verify_strict(message, &self.signature)
            .map_err(|_| ProviderError::BadSignature)
    }
}
