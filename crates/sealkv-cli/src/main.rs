mod cli;
mod config;
mod storage;

use crate::cli::{ConfigCommand, GetArgs, PutArgs};
use clap::Parser;
use color_eyre::{eyre::WrapErr, Result};
use sealkv_core::{EnvelopeCodec, Expiry, ProtectionProvider, StoreAdapter};
use serde_json::Value;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing();

    let cli = cli::Cli::parse();
    let config = config::load()?;
    match cli.command.unwrap_or(cli::Command::Version) {
        cli::Command::Version => print_version(),
        cli::Command::Health => run_health_check(&config).await?,
        cli::Command::Config(ConfigCommand::Init) => init_config(&config)?,
        cli::Command::Put(args) => run_put(args, &config).await?,
        cli::Command::Get(args) => run_get(args, &config).await?,
        cli::Command::Remove { key } => run_remove(&key, &config).await?,
    }

    Ok(())
}

fn init_tracing() {
    // Respect user-provided filters, default to info to avoid noisy stdout.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

fn print_version() {
    println!("sealkv {}", env!("CARGO_PKG_VERSION"));
}

/// Round-trips both envelope kinds through the configured store and key rings.
async fn run_health_check(config: &config::Config) -> Result<()> {
    let codec = storage::codec_from_config(config)?;
    run_codec_health(&codec).await?;
    println!("Storage: ok");
    Ok(())
}

async fn run_codec_health<S, P>(codec: &EnvelopeCodec<S, P>) -> Result<()>
where
    S: StoreAdapter,
    P: ProtectionProvider,
{
    let probe = serde_json::json!({ "probe": "ok" });
    for (key, signed) in [("health/encrypted", false), ("health/signed", true)] {
        if signed {
            codec.put_signed(key, Expiry::Never, &probe, false).await?;
        } else {
            codec.put_encrypted(key, Expiry::Never, &probe, false).await?;
        }
        // Once written, the record is removed whatever the read-back did.
        let read = if signed {
            codec.get_signed::<Value>(key).await
        } else {
            codec.get_encrypted::<Value>(key).await
        };
        let removed = codec.remove(key, None).await;
        let round_trip = read?.value;
        removed?;

        if round_trip != probe {
            color_eyre::eyre::bail!("{key}: round-trip returned a different value");
        }
    }
    Ok(())
}

fn init_config(config: &config::Config) -> Result<()> {
    let path = config::write_default_if_missing(config)?;
    println!("Config initialized at {}", path.display());
    Ok(())
}

async fn run_put(args: PutArgs, config: &config::Config) -> Result<()> {
    let value: Value = serde_json::from_str(&args.json).wrap_err("value is not valid JSON")?;
    let codec = storage::codec_from_config(config)?;
    let outcome = if args.sign {
        codec
            .put_signed(&args.key, Expiry::Never, &value, args.exclusive)
            .await?
    } else {
        codec
            .put_encrypted(&args.key, Expiry::Never, &value, args.exclusive)
            .await?
    };

    match outcome.cas {
        Some(cas) if outcome.created => {
            info!(key = %args.key, %cas, "stored");
            println!("{cas}");
        }
        _ => {
            warn!(key = %args.key, "key already exists; nothing written");
            color_eyre::eyre::bail!("{} already exists", args.key);
        }
    }
    Ok(())
}

async fn run_get(args: GetArgs, config: &config::Config) -> Result<()> {
    let codec = storage::codec_from_config(config)?;
    let fetched = if args.sign {
        codec.get_signed::<Value>(&args.key).await?
    } else {
        codec.get_encrypted::<Value>(&args.key).await?
    };
    println!("{}", serde_json::to_string_pretty(&fetched.value)?);
    Ok(())
}

async fn run_remove(key: &str, config: &config::Config) -> Result<()> {
    let store = storage::store_from_config(config)?;
    store
        .remove(key, None)
        .await
        .wrap_err_with(|| format!("failed to remove {key}"))?;
    println!("Removed {key}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::{self, Read, Write};

    use super::*;
    use sealkv_core::{CryptoError, MemoryStore, StoreError};
    use sealkv_store::FileStore;

    fn empty_provider() -> sealkv_crypto::AsymmetricProvider {
        sealkv_crypto::AsymmetricProvider::new(sealkv_crypto::KeyRingConfig::default())
    }

    /// Identity transform with a constant signature. With `readable` false it
    /// still writes but can neither decrypt nor verify.
    struct Passthrough {
        readable: bool,
    }

    impl Passthrough {
        fn check_readable(&self) -> Result<(), CryptoError> {
            if self.readable {
                Ok(())
            } else {
                Err(CryptoError::decrypt(io::Error::other("no private key")))
            }
        }
    }

    impl ProtectionProvider for Passthrough {
        fn encrypt(
            &self,
            plaintext: &mut dyn Read,
            sink: &mut dyn Write,
        ) -> Result<(), CryptoError> {
            io::copy(plaintext, sink).map_err(CryptoError::encrypt)?;
            Ok(())
        }

        fn decrypt<'r>(
            &self,
            ciphertext: &'r mut dyn Read,
        ) -> Result<Box<dyn Read + 'r>, CryptoError> {
            self.check_readable()?;
            Ok(Box::new(ciphertext))
        }

        fn sign(
            &self,
            plaintext: &mut dyn Read,
            sink: &mut dyn Write,
        ) -> Result<(), CryptoError> {
            io::copy(plaintext, sink).map_err(CryptoError::sign)?;
            Ok(())
        }

        fn sign_detached(
            &self,
            _plaintext: &mut dyn Read,
            sink: &mut dyn Write,
        ) -> Result<(), CryptoError> {
            sink.write_all(b"ok").map_err(CryptoError::sign)
        }

        fn verify(&self, signed: &mut dyn Read) -> Result<Vec<u8>, CryptoError> {
            let mut out = Vec::new();
            signed.read_to_end(&mut out).map_err(CryptoError::verify)?;
            Ok(out)
        }

        fn verify_detached(
            &self,
            _signed: &mut dyn Read,
            _signature: &mut dyn Read,
        ) -> Result<(), CryptoError> {
            self.check_readable()
        }
    }

    #[tokio::test]
    async fn health_round_trips_and_cleans_up() {
        let dir = tempfile::tempdir().expect("tempdir");
        let codec = EnvelopeCodec::new(FileStore::new(dir.path()), Passthrough { readable: true });
        run_codec_health(&codec).await.expect("healthy");
        for key in ["health/encrypted", "health/signed"] {
            let err = codec.store().get(key).await.expect_err("probe removed");
            assert!(matches!(err, StoreError::NotFound { .. }));
        }
    }

    #[tokio::test]
    async fn health_fails_without_keys() {
        let codec = EnvelopeCodec::new(MemoryStore::new(), empty_provider());
        assert!(run_codec_health(&codec).await.is_err());
    }

    #[tokio::test]
    async fn health_cleans_up_when_read_back_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        let codec = EnvelopeCodec::new(FileStore::new(dir.path()), Passthrough { readable: false });
        let err = run_codec_health(&codec).await.expect_err("cannot read back");
        assert!(err.to_string().contains("health/encrypted"), "{err}");
        for key in ["health/encrypted", "health/signed"] {
            let err = codec.store().get(key).await.expect_err("nothing left behind");
            assert!(matches!(err, StoreError::NotFound { .. }));
        }
    }
}
