use std::io::{self, Read, Write};

use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use sealkv_core::protection::{CryptoError, ProtectionProvider};
use tracing::{debug, instrument};

use crate::{
    clearsign,
    error::ProviderError,
    keyring::{KeyRingConfig, PrivateKey, PrivateKeyRing, PublicKeyRing},
    signature::DetachedSignature,
};

/// age + Ed25519 implementation of [`ProtectionProvider`].
///
/// Encryption targets every key in the public ring; decryption tries every
/// key in the private ring. Signing only ever uses the first private ring
/// entry: this provider is a single-signer capability, and callers that
/// rely on which key signed should order the ring accordingly.
#[derive(Debug, Clone)]
pub struct AsymmetricProvider {
    private: PrivateKeyRing,
    public: PublicKeyRing,
}

impl AsymmetricProvider {
    pub fn new(config: KeyRingConfig) -> Self {
        Self {
            private: config.private,
            public: config.public,
        }
    }

    /// The key used for every signature this provider produces.
    pub fn signer(&self) -> Option<&PrivateKey> {
        self.private.signer()
    }

    pub fn private_ring(&self) -> &PrivateKeyRing {
        &self.private
    }

    pub fn public_ring(&self) -> &PublicKeyRing {
        &self.public
    }

    fn detached(&self, message: &[u8]) -> Result<DetachedSignature, ProviderError> {
        let signer = self.signer().ok_or(ProviderError::NoPrivateKeys)?;
        debug!(signer = %signer.name, "signing");
        Ok(DetachedSignature::create(signer.signing(), message))
    }

    fn check(&self, message: &[u8], signature: &[u8]) -> Result<(), ProviderError> {
        let signature = DetachedSignature::from_bytes(signature)?;
        let key = self
            .public
            .find(signature.signer)
            .ok_or(ProviderError::UnknownSigner(signature.signer))?;
        signature.check(key.verifying(), message)
    }
}

impl ProtectionProvider for AsymmetricProvider {
    #[instrument(skip_all, fields(recipients = self.public.len()))]
    fn encrypt(&self, plaintext: &mut dyn Read, sink: &mut dyn Write) -> Result<(), CryptoError> {
        let recipients: Vec<Box<dyn age::Recipient + Send>> = self
            .public
            .iter()
            .map(|k| Box::new(k.recipient().clone()) as Box<dyn age::Recipient + Send>)
            .collect();
        let encryptor = age::Encryptor::with_recipients(recipients)
            .ok_or_else(|| CryptoError::encrypt(ProviderError::NoRecipients))?;

        let stream = encryptor
            .wrap_output(sink)
            .map_err(|e| CryptoError::encrypt(ProviderError::backend(e)))?;
        let mut gz = GzEncoder::new(stream, Compression::default());
        io::copy(plaintext, &mut gz).map_err(|e| CryptoError::encrypt(ProviderError::Io(e)))?;
        let stream = gz
            .finish()
            .map_err(|e| CryptoError::encrypt(ProviderError::Io(e)))?;
        stream
            .finish()
            .map_err(|e| CryptoError::encrypt(ProviderError::Io(e)))?;
        Ok(())
    }

    #[instrument(skip_all, fields(identities = self.private.len()))]
    fn decrypt<'r>(
        &self,
        ciphertext: &'r mut dyn Read,
    ) -> Result<Box<dyn Read + 'r>, CryptoError> {
        if self.private.is_empty() {
            return Err(CryptoError::decrypt(ProviderError::NoPrivateKeys));
        }
        let decryptor = match age::Decryptor::new(ciphertext)
            .map_err(|e| CryptoError::decrypt(ProviderError::backend(e)))?
        {
            age::Decryptor::Recipients(d) => d,
            _ => return Err(CryptoError::decrypt(ProviderError::PassphraseEnvelope)),
        };

        let identities = self
            .private
            .iter()
            .map(|k| k.identity() as &dyn age::Identity);
        let stream = decryptor
            .decrypt(identities)
            .map_err(|e| CryptoError::decrypt(ProviderError::backend(e)))?;
        Ok(Box::new(GzDecoder::new(stream)))
    }

    fn sign(&self, plaintext: &mut dyn Read, sink: &mut dyn Write) -> Result<(), CryptoError> {
        let message = read_all(plaintext).map_err(CryptoError::sign)?;
        let signature = self.detached(&message).map_err(CryptoError::sign)?;
        clearsign::encode(sink, &message, &signature.to_bytes())
            .map_err(|e| CryptoError::sign(ProviderError::Io(e)))
    }

    fn sign_detached(
        &self,
        plaintext: &mut dyn Read,
        sink: &mut dyn Write,
    ) -> Result<(), CryptoError> {
        let message = read_all(plaintext).map_err(CryptoError::sign)?;
        let signature = self.detached(&message).map_err(CryptoError::sign)?;
        sink.write_all(&signature.to_bytes())
            .map_err(|e| CryptoError::sign(ProviderError::Io(e)))
    }

    fn verify(&self, signed: &mut dyn Read) -> Result<Vec<u8>, CryptoError> {
        let raw = read_all(signed).map_err(CryptoError::verify)?;
        let parsed = clearsign::decode(&raw).map_err(CryptoError::verify)?;
        self.check(&parsed.cleartext, &parsed.signature)
            .map_err(CryptoError::verify)?;
        Ok(parsed.cleartext)
    }

    fn verify_detached(
        &self,
        signed: &mut dyn Read,
        signature: &mut dyn Read,
    ) -> Result<(), CryptoError> {
        let message = read_all(signed).map_err(CryptoError::verify)?;
        let signature = read_all(signature).map_err(CryptoError::verify)?;
        self.check(&message, &signature).map_err(CryptoError::verify)
    }
}

fn read_all(reader: &mut dyn Read) -> Result<Vec<u8>, ProviderError> {
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf)?;
    Ok(buf)
}
