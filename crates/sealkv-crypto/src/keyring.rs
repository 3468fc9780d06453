//! Key rings handed to [`crate::AsymmetricProvider`] at construction.
//!
//! A ring file is TOML with one `[[key]]` table per entity:
//!
//! ```toml
//! [[key]]
//! name = "ops"
//! age = "age1..."              # or AGE-SECRET-KEY-1... in a private ring
//! ed25519 = "base64 32 bytes"  # verifying key, or signing key in a private ring
//! ```

use std::{fmt, fs, path::Path};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use ed25519_dalek::{SigningKey, VerifyingKey};
use serde::Deserialize;

use crate::{error::KeyRingError, signature::KeyId};

/// Decryption identity plus signing key for one entity.
#[derive(Clone)]
pub struct PrivateKey {
    pub name: String,
    identity: age::x25519::Identity,
    signing: SigningKey,
}

impl PrivateKey {
    pub fn new(
        name: impl Into<String>,
        identity: age::x25519::Identity,
        signing: SigningKey,
    ) -> Self {
        Self {
            name: name.into(),
            identity,
            signing,
        }
    }

    /// The public half of this entity.
    pub fn public(&self) -> PublicKey {
        PublicKey::new(
            self.name.clone(),
            self.identity.to_public(),
            self.signing.verifying_key(),
        )
    }

    pub(crate) fn identity(&self) -> &age::x25519::Identity {
        &self.identity
    }

    pub(crate) fn signing(&self) -> &SigningKey {
        &self.signing
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print key bytes.
        f.debug_struct("PrivateKey")
            .field("name", &self.name)
            .field("key_id", &KeyId::of(&self.signing.verifying_key()))
            .finish_non_exhaustive()
    }
}

/// Encryption recipient plus verifying key for one entity.
#[derive(Clone)]
pub struct PublicKey {
    pub name: String,
    recipient: age::x25519::Recipient,
    verifying: VerifyingKey,
    key_id: KeyId,
}

impl PublicKey {
    pub fn new(
        name: impl Into<String>,
        recipient: age::x25519::Recipient,
        verifying: VerifyingKey,
    ) -> Self {
        Self {
            name: name.into(),
            key_id: KeyId::of(&verifying),
            recipient,
            verifying,
        }
    }

    pub fn key_id(&self) -> KeyId {
        self.key_id
    }

    pub(crate) fn recipient(&self) -> &age::x25519::Recipient {
        &self.recipient
    }

    pub(crate) fn verifying(&self) -> &VerifyingKey {
        &self.verifying
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicKey")
            .field("name", &self.name)
            .field("recipient", &self.recipient.to_string())
            .field("key_id", &self.key_id)
            .finish()
    }
}

/// Ordered private keys. The first entry is the only one that signs.
#[derive(Debug, Clone, Default)]
pub struct PrivateKeyRing(Vec<PrivateKey>);

impl PrivateKeyRing {
    pub fn new(keys: Vec<PrivateKey>) -> Self {
        Self(keys)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, KeyRingError> {
        let file: RingFile = toml::from_str(contents)?;
        file.keys
            .into_iter()
            .map(|entry| {
                let identity = entry
                    .age
                    .trim()
                    .parse::<age::x25519::Identity>()
                    .map_err(|e| invalid(&entry.name, e))?;
                let bytes = decode_key_bytes(&entry.name, &entry.ed25519)?;
                let signing = SigningKey::from_bytes(&bytes);
                Ok(PrivateKey::new(entry.name, identity, signing))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    pub fn signer(&self) -> Option<&PrivateKey> {
        self.0.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PrivateKey> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Public halves of every entry, in order.
    pub fn public_ring(&self) -> PublicKeyRing {
        PublicKeyRing(self.0.iter().map(PrivateKey::public).collect())
    }
}

/// Recipients for encryption and trusted signers for verification.
#[derive(Debug, Clone, Default)]
pub struct PublicKeyRing(Vec<PublicKey>);

impl PublicKeyRing {
    pub fn new(keys: Vec<PublicKey>) -> Self {
        Self(keys)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, KeyRingError> {
        let file: RingFile = toml::from_str(contents)?;
        file.keys
            .into_iter()
            .map(|entry| {
                let recipient = entry
                    .age
                    .trim()
                    .parse::<age::x25519::Recipient>()
                    .map_err(|e| invalid(&entry.name, e))?;
                let bytes = decode_key_bytes(&entry.name, &entry.ed25519)?;
                let verifying =
                    VerifyingKey::from_bytes(&bytes).map_err(|e| invalid(&entry.name, e))?;
                Ok(PublicKey::new(entry.name, recipient, verifying))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    pub fn find(&self, id: KeyId) -> Option<&PublicKey> {
        self.0.iter().find(|k| k.key_id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PublicKey> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Everything a provider needs; owned by the provider once constructed.
#[derive(Debug, Clone, Default)]
pub struct KeyRingConfig {
    pub private: PrivateKeyRing,
    pub public: PublicKeyRing,
}

impl KeyRingConfig {
    pub fn new(private: PrivateKeyRing, public: PublicKeyRing) -> Self {
        Self { private, public }
    }

    pub fn from_toml_strs(private: &str, public: &str) -> Result<Self, KeyRingError> {
        Ok(Self {
            private: PrivateKeyRing::from_toml_str(private)?,
            public: PublicKeyRing::from_toml_str(public)?,
        })
    }

    /// Read both ring files from disk.
    pub fn load(
        private_path: impl AsRef<Path>,
        public_path: impl AsRef<Path>,
    ) -> Result<Self, KeyRingError> {
        let private = read_ring(private_path.as_ref())?;
        let public = read_ring(public_path.as_ref())?;
        Self::from_toml_strs(&private, &public)
    }
}

#[derive(Debug, Deserialize)]
struct RingFile {
    #[serde(default, rename = "key")]
    keys: Vec<RingEntry>,
}

#[derive(Debug, Deserialize)]
struct RingEntry {
    name: String,
    age: String,
    ed25519: String,
}

fn read_ring(path: &Path) -> Result<String, KeyRingError> {
    fs::read_to_string(path).map_err(|source| KeyRingError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn decode_key_bytes(name: &str, encoded: &str) -> Result<[u8; 32], KeyRingError> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| invalid(name, e))?;
    bytes.try_into().map_err(|bytes: Vec<u8>| KeyRingError::InvalidKey {
        name: name.to_string(),
        reason: format!("expected 32 ed25519 bytes, got {}", bytes.len()),
    })
}

fn invalid<E: ToString>(name: &str, err: E) -> KeyRingError {
    KeyRingError::InvalidKey {
        name: name.to_string(),
        reason: err.to_string(),
    }
}
