use std::path::PathBuf;

use thiserror::Error;

use crate::signature::KeyId;

/// Causes wrapped inside `sealkv_core::CryptoError` by [`crate::AsymmetricProvider`].
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("public key ring is empty")]
    NoRecipients,
    #[error("private key ring is empty")]
    NoPrivateKeys,
    #[error("ciphertext is passphrase-encrypted; only recipient keys are supported")]
    PassphraseEnvelope,
    #[error("signer {0} is not in the trusted key ring")]
    UnknownSigner(KeyId),
    #[error("signature does not match the signed data")]
    BadSignature,
    #[error("malformed signature: {0}")]
    MalformedSignature(String),
    #[error("malformed signed message: {0}")]
    MalformedSignedMessage(String),
    #[error("crypto backend: {0}")]
    Backend(String),
    #[error("stream i/o: {0}")]
    Io(#[from] std::io::Error),
}

impl ProviderError {
    pub(crate) fn backend<E: ToString>(err: E) -> Self {
        ProviderError::Backend(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum KeyRingError {
    #[error("failed to read key ring {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("key ring is not valid TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid key {name}: {reason}")]
    InvalidKey { name: String, reason: String },
}
