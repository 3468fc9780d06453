//! Asymmetric protection provider for sealkv envelopes.
//! Encryption is age (X25519) to every recipient in the public ring, with the
//! plaintext gzip-compressed first; signatures are Ed25519 from the first
//! private ring entry.

pub mod armor;
pub mod clearsign;
pub mod error;
pub mod keyring;
pub mod provider;
pub mod signature;

#[cfg(test)]
pub(crate) mod test_keys;

pub use error::{KeyRingError, ProviderError};
pub use keyring::{KeyRingConfig, PrivateKey, PrivateKeyRing, PublicKey, PublicKeyRing};
pub use provider::AsymmetricProvider;
