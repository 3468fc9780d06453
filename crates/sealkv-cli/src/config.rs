use std::{
    fs,
    path::{Path, PathBuf},
};

use color_eyre::Result;
use dirs::config_dir;
use serde::{Deserialize, Serialize};

/// User-level configuration loaded from `~/.config/sealkv/config.toml` (platform-specific).
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct Config {
    /// Override for the file store's data directory.
    pub data_dir: Option<PathBuf>,
    /// Key-ring files used for encryption and signing.
    pub keyring: Option<KeyRingPaths>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct KeyRingPaths {
    /// Ring holding this machine's age identities and Ed25519 signing keys.
    pub private: PathBuf,
    /// Ring of recipients and trusted signers.
    pub public: PathBuf,
}

/// Load config from the default path; if missing, return defaults.
pub fn load() -> Result<Config> {
    let path = default_path()?;
    load_from_path(path)
}

/// Load config from a given path; if missing or empty, return defaults.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(Config::default());
    }
    let contents = fs::read_to_string(path)?;
    if contents.trim().is_empty() {
        return Ok(Config::default());
    }
    let cfg: Config = toml::from_str(&contents)?;
    Ok(cfg)
}

/// Resolve the default config path (platform aware).
pub fn default_path() -> Result<PathBuf> {
    Ok(default_dir()?.join("config.toml"))
}

fn default_dir() -> Result<PathBuf> {
    let base = config_dir().ok_or_else(|| color_eyre::eyre::eyre!("no config dir available"))?;
    Ok(base.join("sealkv"))
}

/// Write `config` to the default path unless a file is already there.
/// Key-ring paths default to `private.toml` and `public.toml` beside it.
pub fn write_default_if_missing(config: &Config) -> Result<PathBuf> {
    let dir = default_dir()?;
    let mut config = config.clone();
    config.keyring.get_or_insert_with(|| KeyRingPaths {
        private: dir.join("private.toml"),
        public: dir.join("public.toml"),
    });
    write_to_path_if_missing(&config, &dir.join("config.toml"))
}

fn write_to_path_if_missing(config: &Config, path: &Path) -> Result<PathBuf> {
    if path.exists() {
        return Ok(path.to_path_buf());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let body = toml::to_string_pretty(config)?;
    fs::write(path, body)?;
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_default_when_missing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg = load_from_path(dir.path().join("config.toml")).expect("load");
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn returns_default_when_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "  \n").expect("write");
        assert_eq!(load_from_path(&path).expect("load"), Config::default());
    }

    #[test]
    fn parses_custom_config() {
        let contents = r#"
            data_dir = "/tmp/sealkv-data"
            [keyring]
            private = "/etc/sealkv/private.toml"
            public = "/etc/sealkv/public.toml"
        "#;
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        fs::write(&path, contents).expect("write temp config");

        let cfg = load_from_path(&path).expect("load");
        assert_eq!(
            cfg,
            Config {
                data_dir: Some(PathBuf::from("/tmp/sealkv-data")),
                keyring: Some(KeyRingPaths {
                    private: PathBuf::from("/etc/sealkv/private.toml"),
                    public: PathBuf::from("/etc/sealkv/public.toml"),
                }),
            }
        );
    }

    #[test]
    fn rejects_keyring_without_public_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "[keyring]\nprivate = \"p.toml\"\n").expect("write");
        assert!(load_from_path(&path).is_err());
    }

    #[test]
    fn write_creates_file_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("config.toml");
        let cfg = Config {
            data_dir: Some(PathBuf::from("/tmp/sealkv-data")),
            keyring: None,
        };

        write_to_path_if_missing(&cfg, &path).expect("write should succeed");
        let other = Config::default();
        let second = write_to_path_if_missing(&other, &path).expect("second write ok");
        assert_eq!(second, path);
        assert_eq!(load_from_path(&path).expect("load"), cfg);
    }
}
