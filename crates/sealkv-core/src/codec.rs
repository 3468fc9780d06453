use std::io::Read;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, instrument};

use crate::{
    envelope::{EncryptedEnvelope, SignedEnvelope},
    error::EnvelopeError,
    protection::{CryptoError, ProtectionProvider},
    store::{Cas, Expiry, StoreAdapter, StoreError, StoreOp, Stored},
};

/// Result of a put. `created` is false only when an exclusive put found the
/// key already present, in which case nothing was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PutOutcome {
    pub created: bool,
    pub cas: Option<Cas>,
}

/// A decoded value together with the version it was read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched<T> {
    pub value: T,
    pub cas: Cas,
}

/// Wraps values in encrypted or signed envelopes on their way into a store
/// and unwraps them on the way out.
///
/// Each call does one serialize, one crypto transform and one store call.
/// Nothing is retried: a CAS conflict is returned to the caller, who should
/// reread and try again.
pub struct EnvelopeCodec<S, P> {
    store: S,
    provider: P,
}

impl<S: StoreAdapter, P: ProtectionProvider> EnvelopeCodec<S, P> {
    pub fn new(store: S, provider: P) -> Self {
        Self { store, provider }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Encrypt `value` and write it. With `must_not_exist` the write uses
    /// the store's exclusive add.
    #[instrument(skip_all, fields(key = %key, must_not_exist))]
    pub async fn put_encrypted<T: Serialize + ?Sized>(
        &self,
        key: &str,
        expiry: Expiry,
        value: &T,
        must_not_exist: bool,
    ) -> Result<PutOutcome, EnvelopeError> {
        let record = self.seal(key, value)?;
        self.write(key, expiry, &record, must_not_exist).await
    }

    /// Encrypt `value` and write it only if the stored version is `expected`.
    #[instrument(skip_all, fields(key = %key, expected = %expected))]
    pub async fn put_encrypted_cas<T: Serialize + ?Sized>(
        &self,
        key: &str,
        expiry: Expiry,
        value: &T,
        expected: Cas,
    ) -> Result<Cas, EnvelopeError> {
        let record = self.seal(key, value)?;
        self.write_cas(key, expiry, &record, expected).await
    }

    #[instrument(skip_all, fields(key = %key))]
    pub async fn get_encrypted<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Fetched<T>, EnvelopeError> {
        let stored = self.read(key).await?;
        let envelope = EncryptedEnvelope::from_slice(&stored.value)
            .map_err(|e| EnvelopeError::malformed(key, e))?;
        let plaintext = self.open(key, &envelope.ciphertext)?;
        let value =
            serde_json::from_slice(&plaintext).map_err(|e| EnvelopeError::serialization(key, e))?;
        Ok(Fetched {
            value,
            cas: stored.cas,
        })
    }

    /// Sign `value` and write it next to its detached signature.
    #[instrument(skip_all, fields(key = %key, must_not_exist))]
    pub async fn put_signed<T: Serialize + ?Sized>(
        &self,
        key: &str,
        expiry: Expiry,
        value: &T,
        must_not_exist: bool,
    ) -> Result<PutOutcome, EnvelopeError> {
        let record = self.sign_record(key, value)?;
        self.write(key, expiry, &record, must_not_exist).await
    }

    /// Optimistic-concurrency write of a signed value.
    #[instrument(skip_all, fields(key = %key, expected = %expected))]
    pub async fn put_signed_cas<T: Serialize + ?Sized>(
        &self,
        key: &str,
        expiry: Expiry,
        value: &T,
        expected: Cas,
    ) -> Result<Cas, EnvelopeError> {
        let record = self.sign_record(key, value)?;
        self.write_cas(key, expiry, &record, expected).await
    }

    /// Read a signed value. The signature is checked against the stored
    /// payload bytes, and the value is decoded from those same bytes.
    #[instrument(skip_all, fields(key = %key))]
    pub async fn get_signed<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Fetched<T>, EnvelopeError> {
        let stored = self.read(key).await?;
        let envelope = SignedEnvelope::from_slice(&stored.value)
            .map_err(|e| EnvelopeError::malformed(key, e))?;
        self.provider
            .verify_detached(&mut envelope.data(), &mut envelope.signature())
            .map_err(|e| EnvelopeError::crypto(key, e))?;
        let value = envelope
            .parse()
            .map_err(|e| EnvelopeError::serialization(key, e))?;
        Ok(Fetched {
            value,
            cas: stored.cas,
        })
    }

    #[instrument(skip_all, fields(key = %key))]
    pub async fn remove(&self, key: &str, cas: Option<Cas>) -> Result<(), EnvelopeError> {
        self.store
            .remove(key, cas)
            .await
            .map_err(|e| EnvelopeError::store(key, StoreOp::Remove, e))
    }

    fn seal<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<Vec<u8>, EnvelopeError> {
        let canonical =
            serde_json::to_vec(value).map_err(|e| EnvelopeError::serialization(key, e))?;
        let mut ciphertext = Vec::new();
        self.provider
            .encrypt(&mut canonical.as_slice(), &mut ciphertext)
            .map_err(|e| EnvelopeError::crypto(key, e))?;
        EncryptedEnvelope::new(ciphertext)
            .to_vec()
            .map_err(|e| EnvelopeError::serialization(key, e))
    }

    fn open(&self, key: &str, ciphertext: &[u8]) -> Result<Vec<u8>, EnvelopeError> {
        let mut source = ciphertext;
        let mut reader = self
            .provider
            .decrypt(&mut source)
            .map_err(|e| EnvelopeError::crypto(key, e))?;
        let mut plaintext = Vec::new();
        reader
            .read_to_end(&mut plaintext)
            .map_err(|e| EnvelopeError::crypto(key, CryptoError::decrypt(e)))?;
        Ok(plaintext)
    }

    fn sign_record<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
    ) -> Result<Vec<u8>, EnvelopeError> {
        let canonical =
            serde_json::to_string(value).map_err(|e| EnvelopeError::serialization(key, e))?;
        let mut signature = Vec::new();
        self.provider
            .sign_detached(&mut canonical.as_bytes(), &mut signature)
            .map_err(|e| EnvelopeError::crypto(key, e))?;
        SignedEnvelope::new(canonical, signature)
            .and_then(|envelope| envelope.to_vec())
            .map_err(|e| EnvelopeError::serialization(key, e))
    }

    async fn read(&self, key: &str) -> Result<Stored, EnvelopeError> {
        self.store
            .get(key)
            .await
            .map_err(|e| EnvelopeError::store(key, StoreOp::Get, e))
    }

    async fn write(
        &self,
        key: &str,
        expiry: Expiry,
        record: &[u8],
        must_not_exist: bool,
    ) -> Result<PutOutcome, EnvelopeError> {
        if !must_not_exist {
            let cas = self
                .store
                .set(key, expiry, record)
                .await
                .map_err(|e| EnvelopeError::store(key, StoreOp::Set, e))?;
            return Ok(PutOutcome {
                created: true,
                cas: Some(cas),
            });
        }

        match self.store.add(key, expiry, record).await {
            Ok(cas) => Ok(PutOutcome {
                created: true,
                cas: Some(cas),
            }),
            Err(StoreError::AlreadyExists { .. }) => {
                debug!("key already present, exclusive put skipped");
                Ok(PutOutcome {
                    created: false,
                    cas: None,
                })
            }
            Err(err) => Err(EnvelopeError::store(key, StoreOp::Add, err)),
        }
    }

    async fn write_cas(
        &self,
        key: &str,
        expiry: Expiry,
        record: &[u8],
        expected: Cas,
    ) -> Result<Cas, EnvelopeError> {
        self.store
            .cas_write(key, expiry, record, expected)
            .await
            .map_err(|e| EnvelopeError::store(key, StoreOp::CasWrite, e))
    }
}
