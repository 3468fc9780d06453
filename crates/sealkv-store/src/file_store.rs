use std::{
    fs::{self, File},
    io::{Read, Write},
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use sealkv_core::store::{parse_counter, Cas, Expiry, StoreAdapter, StoreError, Stored};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

/// Longest encoded key used verbatim as a file name; longer keys are hashed.
/// Stays well under the common 255-byte file name limit.
const MAX_ENCODED_NAME: usize = 200;

/// File-backed store adapter: one JSON record per key under `root`.
///
/// Each record also carries its full key, so long keys can live under a
/// hashed file name.
///
/// Mutations are serialized through an in-process lock and land via
/// temp-file rename, so `add` and `cas_write` are atomic for callers sharing
/// one `FileStore`. Separate processes on the same directory are not
/// coordinated.
pub struct FileStore {
    root: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(sanitize_key(key))
    }

    /// Current live record, removing it first if it has expired.
    fn live(&self, key: &str) -> Result<Option<StoredRecord>, StoreError> {
        let path = self.path_for(key);
        let Some(record) = read_record(&path)? else {
            return Ok(None);
        };
        if record.key != key {
            return Err(StoreError::io(format!(
                "record {} belongs to a different key",
                path.display()
            )));
        }
        if record.is_expired(now_millis()?) {
            debug!(key, "dropping expired record");
            remove_file(&path)?;
            return Ok(None);
        }
        Ok(Some(record))
    }

    fn store(
        &self,
        key: &str,
        expiry: Expiry,
        value: &[u8],
        previous: Option<Cas>,
    ) -> Result<Cas, StoreError> {
        fs::create_dir_all(&self.root).map_err(StoreError::io)?;
        let cas = next_cas(previous)?;
        let expires_at_ms = match expiry {
            Expiry::Never => None,
            Expiry::After(ttl) => {
                let ttl_ms = saturating_u64(ttl.as_millis());
                Some(now_millis()?.saturating_add(ttl_ms))
            }
        };
        let record = StoredRecord {
            key: key.to_string(),
            cas: cas.get(),
            expires_at_ms,
            value: URL_SAFE_NO_PAD.encode(value),
        };
        write_record(&self.path_for(key), &record)?;
        Ok(cas)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredRecord {
    key: String,
    cas: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at_ms: Option<u64>,
    value: String,
}

impl StoredRecord {
    fn is_expired(&self, now_ms: u64) -> bool {
        self.expires_at_ms.is_some_and(|at| now_ms >= at)
    }

    fn cas(&self) -> Cas {
        Cas::new(self.cas)
    }

    fn bytes(&self) -> Result<Vec<u8>, StoreError> {
        URL_SAFE_NO_PAD
            .decode(&self.value)
            .map_err(|e| StoreError::io(format!("record decode failed: {e}")))
    }
}

#[async_trait]
impl StoreAdapter for FileStore {
    #[instrument(skip_all, fields(key = %key))]
    async fn get(&self, key: &str) -> Result<Stored, StoreError> {
        let _guard = self.lock.lock().await;
        let record = self.live(key)?.ok_or_else(|| not_found(key))?;
        Ok(Stored {
            value: record.bytes()?,
            cas: record.cas(),
        })
    }

    #[instrument(skip_all, fields(key = %key))]
    async fn set(&self, key: &str, expiry: Expiry, value: &[u8]) -> Result<Cas, StoreError> {
        let _guard = self.lock.lock().await;
        let previous = self.live(key)?.map(|r| r.cas());
        self.store(key, expiry, value, previous)
    }

    #[instrument(skip_all, fields(key = %key))]
    async fn add(&self, key: &str, expiry: Expiry, value: &[u8]) -> Result<Cas, StoreError> {
        let _guard = self.lock.lock().await;
        if self.live(key)?.is_some() {
            return Err(StoreError::AlreadyExists {
                key: key.to_string(),
            });
        }
        self.store(key, expiry, value, None)
    }

    #[instrument(skip_all, fields(key = %key))]
    async fn cas_write(
        &self,
        key: &str,
        expiry: Expiry,
        value: &[u8],
        expected: Cas,
    ) -> Result<Cas, StoreError> {
        let _guard = self.lock.lock().await;
        let current = self.live(key)?.ok_or_else(|| not_found(key))?.cas();
        if current != expected {
            return Err(StoreError::CasConflict {
                key: key.to_string(),
            });
        }
        self.store(key, expiry, value, Some(current))
    }

    #[instrument(skip_all, fields(key = %key))]
    async fn incr(
        &self,
        key: &str,
        delta: u64,
        initial: u64,
        expiry: Expiry,
    ) -> Result<u64, StoreError> {
        let _guard = self.lock.lock().await;
        let (next, previous) = match self.live(key)? {
            Some(record) => (
                parse_counter(key, &record.bytes()?)?.wrapping_add(delta),
                Some(record.cas()),
            ),
            None => (initial, None),
        };
        self.store(key, expiry, next.to_string().as_bytes(), previous)?;
        Ok(next)
    }

    #[instrument(skip_all, fields(key = %key))]
    async fn remove(&self, key: &str, cas: Option<Cas>) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let current = self.live(key)?.ok_or_else(|| not_found(key))?.cas();
        if cas.is_some_and(|c| c != current) {
            return Err(StoreError::CasConflict {
                key: key.to_string(),
            });
        }
        remove_file(&self.path_for(key))
    }
}

fn write_record(path: &Path, record: &StoredRecord) -> Result<(), StoreError> {
    let parent = path.parent().ok_or_else(|| StoreError::Io {
        reason: "invalid storage path".to_string(),
    })?;
    fs::create_dir_all(parent).map_err(StoreError::io)?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(StoreError::io)?;
    let json = serde_json::to_vec(record).map_err(StoreError::io)?;
    tmp.write_all(&json).map_err(StoreError::io)?;
    tmp.flush().map_err(StoreError::io)?;
    tmp.persist(path).map_err(|e| StoreError::io(e.error))?;
    Ok(())
}

fn read_record(path: &Path) -> Result<Option<StoredRecord>, StoreError> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(StoreError::io(err)),
    };

    let mut buf = Vec::new();
    file.read_to_end(&mut buf).map_err(StoreError::io)?;
    serde_json::from_slice(&buf)
        .map(Some)
        .map_err(|e| StoreError::io(format!("corrupt record {}: {e}", path.display())))
}

fn remove_file(path: &Path) -> Result<(), StoreError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(StoreError::io(err)),
    }
}

/// Monotonic per key: wall-clock nanoseconds, bumped past the previous token.
fn next_cas(previous: Option<Cas>) -> Result<Cas, StoreError> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(StoreError::io)?
        .as_nanos();
    let now = saturating_u64(now);
    let floor = previous.map_or(0, |c| c.get().saturating_add(1));
    Ok(Cas::new(now.max(floor)))
}

fn now_millis() -> Result<u64, StoreError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| saturating_u64(d.as_millis()))
        .map_err(StoreError::io)
}

fn saturating_u64(value: u128) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}

/// File name for a key. `.` is outside the URL-safe base64 alphabet, so
/// hashed names never collide with encoded ones.
fn sanitize_key(key: &str) -> String {
    let encoded = URL_SAFE_NO_PAD.encode(key);
    if encoded.len() <= MAX_ENCODED_NAME {
        return encoded;
    }
    let digest = Sha256::digest(key.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    format!("sha256.{hex}")
}

fn not_found(key: &str) -> StoreError {
    StoreError::NotFound {
        key: key.to_string(),
    }
}
