use age::secrecy::ExposeSecret;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;

use crate::{
    keyring::{KeyRingConfig, PrivateKey, PrivateKeyRing, PublicKeyRing},
    provider::AsymmetricProvider,
};

pub(crate) fn entity(name: &str) -> PrivateKey {
    PrivateKey::new(
        name,
        age::x25519::Identity::generate(),
        SigningKey::generate(&mut OsRng),
    )
}

pub(crate) fn private_ring_toml(keys: &[&PrivateKey]) -> String {
    keys.iter()
        .map(|k| {
            format!(
                "[[key]]\nname = \"{}\"\nage = \"{}\"\ned25519 = \"{}\"\n\n",
                k.name,
                k.identity().to_string().expose_secret(),
                STANDARD.encode(k.signing().to_bytes()),
            )
        })
        .collect()
}

pub(crate) fn public_ring_toml(keys: &[&PrivateKey]) -> String {
    keys.iter()
        .map(|k| {
            format!(
                "[[key]]\nname = \"{}\"\nage = \"{}\"\ned25519 = \"{}\"\n\n",
                k.name,
                k.identity().to_public(),
                STANDARD.encode(k.signing().verifying_key().as_bytes()),
            )
        })
        .collect()
}

/// Provider holding `private` for decrypt/sign and trusting `public`.
pub(crate) fn provider(private: &[&PrivateKey], public: &[&PrivateKey]) -> AsymmetricProvider {
    let private_ring = PrivateKeyRing::new(private.iter().map(|k| (*k).clone()).collect());
    let public_ring = PublicKeyRing::new(public.iter().map(|k| k.public()).collect());
    AsymmetricProvider::new(KeyRingConfig::new(private_ring, public_ring))
}
