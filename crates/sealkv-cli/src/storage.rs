use std::path::PathBuf;

use crate::config::Config;
use color_eyre::{eyre::WrapErr, Result};
use dirs::data_dir;
use sealkv_core::EnvelopeCodec;
use sealkv_crypto::{AsymmetricProvider, KeyRingConfig};
use sealkv_store::FileStore;
use tracing::debug;

pub type Codec = EnvelopeCodec<FileStore, AsymmetricProvider>;

/// Resolve the default data directory for sealkv.
pub fn default_data_dir() -> Result<PathBuf> {
    let base = data_dir().ok_or_else(|| color_eyre::eyre::eyre!("no data dir available"))?;
    Ok(base.join("sealkv"))
}

/// File store rooted at the configured data directory, or the platform default.
pub fn store_from_config(config: &Config) -> Result<FileStore> {
    let root = match &config.data_dir {
        Some(root) => root.clone(),
        None => default_data_dir()?,
    };
    debug!(?root, "initializing file store");
    Ok(FileStore::new(root))
}

/// Provider built from the configured key-ring files.
pub fn provider_from_config(config: &Config) -> Result<AsymmetricProvider> {
    let paths = config.keyring.as_ref().ok_or_else(|| {
        color_eyre::eyre::eyre!(
            "no [keyring] configured; run `sealkv config init` and add key-ring files"
        )
    })?;
    let rings = KeyRingConfig::load(&paths.private, &paths.public)
        .wrap_err("failed to load key rings")?;
    debug!(
        private = rings.private.len(),
        public = rings.public.len(),
        "loaded key rings"
    );
    Ok(AsymmetricProvider::new(rings))
}

pub fn codec_from_config(config: &Config) -> Result<Codec> {
    Ok(EnvelopeCodec::new(
        store_from_config(config)?,
        provider_from_config(config)?,
    ))
}
