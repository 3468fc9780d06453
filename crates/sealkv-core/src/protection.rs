use std::io::{Read, Write};

use thiserror::Error;

/// Boxed cause carried by [`CryptoError`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failures of a protection transform, one variant per direction.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("encrypt failed: {0}")]
    Encrypt(#[source] BoxError),
    #[error("decrypt failed: {0}")]
    Decrypt(#[source] BoxError),
    #[error("sign failed: {0}")]
    Sign(#[source] BoxError),
    #[error("failed to check signature: {0}")]
    Verify(#[source] BoxError),
}

impl CryptoError {
    pub fn encrypt(cause: impl Into<BoxError>) -> Self {
        CryptoError::Encrypt(cause.into())
    }

    pub fn decrypt(cause: impl Into<BoxError>) -> Self {
        CryptoError::Decrypt(cause.into())
    }

    pub fn sign(cause: impl Into<BoxError>) -> Self {
        CryptoError::Sign(cause.into())
    }

    pub fn verify(cause: impl Into<BoxError>) -> Self {
        CryptoError::Verify(cause.into())
    }
}

/// Capability set for protecting byte streams before they reach a store.
///
/// Implementations own their key material. The trait is object safe so
/// codecs can hold `Box<dyn ProtectionProvider>` when the backend is chosen
/// at runtime.
pub trait ProtectionProvider: Send + Sync {
    /// Encrypt `plaintext` to every configured recipient, writing the
    /// ciphertext to `sink`.
    fn encrypt(&self, plaintext: &mut dyn Read, sink: &mut dyn Write) -> Result<(), CryptoError>;

    /// Open a ciphertext stream. The returned reader yields plaintext; it
    /// must be drained and then dropped. Integrity failures in the body may
    /// surface as read errors.
    fn decrypt<'r>(&self, ciphertext: &'r mut dyn Read)
        -> Result<Box<dyn Read + 'r>, CryptoError>;

    /// Produce a self-contained signed message (cleartext plus inline signature).
    fn sign(&self, plaintext: &mut dyn Read, sink: &mut dyn Write) -> Result<(), CryptoError>;

    /// Produce only the signature bytes over `plaintext`.
    fn sign_detached(
        &self,
        plaintext: &mut dyn Read,
        sink: &mut dyn Write,
    ) -> Result<(), CryptoError>;

    /// Check a message produced by [`ProtectionProvider::sign`] and return
    /// the signed cleartext.
    fn verify(&self, signed: &mut dyn Read) -> Result<Vec<u8>, CryptoError>;

    /// Check a detached signature over `signed`.
    fn verify_detached(
        &self,
        signed: &mut dyn Read,
        signature: &mut dyn Read,
    ) -> Result<(), CryptoError>;
}

impl<P: ProtectionProvider + ?Sized> ProtectionProvider for Box<P> {
    fn encrypt(&self, plaintext: &mut dyn Read, sink: &mut dyn Write) -> Result<(), CryptoError> {
        (**self).encrypt(plaintext, sink)
    }

    fn decrypt<'r>(
        &self,
        ciphertext: &'r mut dyn Read,
    ) -> Result<Box<dyn Read + 'r>, CryptoError> {
        (**self).decrypt(ciphertext)
    }

    fn sign(&self, plaintext: &mut dyn Read, sink: &mut dyn Write) -> Result<(), CryptoError> {
        (**self).sign(plaintext, sink)
    }

    fn sign_detached(
        &self,
        plaintext: &mut dyn Read,
        sink: &mut dyn Write,
    ) -> Result<(), CryptoError> {
        (**self).sign_detached(plaintext, sink)
    }

    fn verify(&self, signed: &mut dyn Read) -> Result<Vec<u8>, CryptoError> {
        (**self).verify(signed)
    }

    fn verify_detached(
        &self,
        signed: &mut dyn Read,
        signature: &mut dyn Read,
    ) -> Result<(), CryptoError> {
        (**self).verify_detached(signed, signature)
    }
}
