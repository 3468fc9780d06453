use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
    time::Instant,
};

use async_trait::async_trait;

use super::{parse_counter, Cas, Expiry, StoreAdapter, StoreError, Stored};

/// In-process store adapter for tests and embedded use.
/// Every operation runs under a single lock, so `add` and `cas_write` are
/// atomic against concurrent callers sharing a clone.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    last_cas: u64,
}

#[derive(Debug, Clone)]
struct Entry {
    value: Vec<u8>,
    cas: Cas,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

impl Inner {
    fn next_cas(&mut self) -> Cas {
        self.last_cas += 1;
        Cas::new(self.last_cas)
    }

    /// Live entry for a key; expired entries are dropped on access.
    fn live(&mut self, key: &str) -> Option<&Entry> {
        let now = Instant::now();
        if self.entries.get(key).is_some_and(|e| !e.is_live(now)) {
            self.entries.remove(key);
        }
        self.entries.get(key)
    }

    fn insert(&mut self, key: &str, expiry: Expiry, value: &[u8]) -> Cas {
        let cas = self.next_cas();
        let expires_at = match expiry {
            Expiry::Never => None,
            // A TTL past the clock's range never expires.
            Expiry::After(ttl) => Instant::now().checked_add(ttl),
        };
        self.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_vec(),
                cas,
                expires_at,
            },
        );
        cas
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw bytes currently held for a key, bypassing expiry. Test hook for
    /// inspecting what actually got persisted.
    #[cfg(any(test, feature = "test-util"))]
    pub fn raw(&self, key: &str) -> Option<Vec<u8>> {
        self.lock().ok()?.entries.get(key).map(|e| e.value.clone())
    }

    /// Overwrite the raw bytes for a key without touching its version.
    /// Returns false when the key is not present.
    #[cfg(any(test, feature = "test-util"))]
    #[must_use]
    pub fn replace_raw(&self, key: &str, value: Vec<u8>) -> bool {
        match self.lock() {
            Ok(mut inner) => match inner.entries.get_mut(key) {
                Some(entry) => {
                    entry.value = value;
                    true
                }
                None => false,
            },
            Err(_) => false,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner.lock().map_err(|err| StoreError::Io {
            reason: format!("lock poisoned: {err}"),
        })
    }
}

#[async_trait]
impl StoreAdapter for MemoryStore {
    async fn get(&self, key: &str) -> Result<Stored, StoreError> {
        let mut inner = self.lock()?;
        inner
            .live(key)
            .map(|e| Stored {
                value: e.value.clone(),
                cas: e.cas,
            })
            .ok_or_else(|| StoreError::NotFound {
                key: key.to_string(),
            })
    }

    async fn set(&self, key: &str, expiry: Expiry, value: &[u8]) -> Result<Cas, StoreError> {
        let mut inner = self.lock()?;
        Ok(inner.insert(key, expiry, value))
    }

    async fn add(&self, key: &str, expiry: Expiry, value: &[u8]) -> Result<Cas, StoreError> {
        let mut inner = self.lock()?;
        if inner.live(key).is_some() {
            return Err(StoreError::AlreadyExists {
                key: key.to_string(),
            });
        }
        Ok(inner.insert(key, expiry, value))
    }

    async fn cas_write(
        &self,
        key: &str,
        expiry: Expiry,
        value: &[u8],
        expected: Cas,
    ) -> Result<Cas, StoreError> {
        let mut inner = self.lock()?;
        match inner.live(key).map(|e| e.cas) {
            None => Err(StoreError::NotFound {
                key: key.to_string(),
            }),
            Some(current) if current != expected => Err(StoreError::CasConflict {
                key: key.to_string(),
            }),
            Some(_) => Ok(inner.insert(key, expiry, value)),
        }
    }

    async fn incr(
        &self,
        key: &str,
        delta: u64,
        initial: u64,
        expiry: Expiry,
    ) -> Result<u64, StoreError> {
        let mut inner = self.lock()?;
        let current = inner.live(key).map(|e| e.value.clone());
        let next = match current {
            Some(raw) => parse_counter(key, &raw)?.wrapping_add(delta),
            None => initial,
        };
        inner.insert(key, expiry, next.to_string().as_bytes());
        Ok(next)
    }

    async fn remove(&self, key: &str, cas: Option<Cas>) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        match inner.live(key).map(|e| e.cas) {
            None => Err(StoreError::NotFound {
                key: key.to_string(),
            }),
            Some(current) if cas.is_some_and(|c| c != current) => Err(StoreError::CasConflict {
                key: key.to_string(),
            }),
            Some(_) => {
                inner.entries.remove(key);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn set_then_get_returns_value_and_version() {
        let store = MemoryStore::new();
        let cas = store.set("k", Expiry::Never, b"v").await.expect("set");
        let stored = store.get("k").await.expect("get");
        assert_eq!(stored.value, b"v");
        assert_eq!(stored.cas, cas);

        let err = store.get("missing").await.expect_err("missing key");
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn add_is_exclusive() {
        let store = MemoryStore::new();
        store.add("k", Expiry::Never, b"first").await.expect("add");
        let err = store
            .add("k", Expiry::Never, b"second")
            .await
            .expect_err("second add should fail");
        assert!(matches!(err, StoreError::AlreadyExists { .. }));
        assert_eq!(store.get("k").await.unwrap().value, b"first");
    }

    #[tokio::test]
    async fn cas_write_rejects_stale_tokens() {
        let store = MemoryStore::new();
        let t0 = store.set("k", Expiry::Never, b"v0").await.unwrap();
        let t1 = store
            .cas_write("k", Expiry::Never, b"v1", t0)
            .await
            .expect("fresh token");
        assert_ne!(t0, t1);

        let err = store
            .cas_write("k", Expiry::Never, b"v2", t0)
            .await
            .expect_err("stale token");
        assert!(matches!(err, StoreError::CasConflict { .. }));

        let err = store
            .cas_write("absent", Expiry::Never, b"v", t1)
            .await
            .expect_err("absent key");
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn remove_honours_cas() {
        let store = MemoryStore::new();
        let t0 = store.set("k", Expiry::Never, b"v").await.unwrap();
        let err = store
            .remove("k", Some(Cas::new(t0.get() + 100)))
            .await
            .expect_err("wrong cas");
        assert!(matches!(err, StoreError::CasConflict { .. }));
        store.remove("k", Some(t0)).await.expect("remove");

        let err = store.remove("k", None).await.expect_err("already gone");
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn incr_creates_then_adds() {
        let store = MemoryStore::new();
        assert_eq!(store.incr("n", 5, 10, Expiry::Never).await.unwrap(), 10);
        assert_eq!(store.incr("n", 5, 10, Expiry::Never).await.unwrap(), 15);
        assert_eq!(store.get("n").await.unwrap().value, b"15");

        store.set("text", Expiry::Never, b"abc").await.unwrap();
        let err = store
            .incr("text", 1, 0, Expiry::Never)
            .await
            .expect_err("not numeric");
        assert!(matches!(err, StoreError::Io { .. }));
    }

    #[tokio::test]
    async fn expired_entries_read_as_missing() {
        let store = MemoryStore::new();
        store
            .set("k", Expiry::After(Duration::from_millis(20)), b"v")
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;

        let err = store.get("k").await.expect_err("expired");
        assert!(matches!(err, StoreError::NotFound { .. }));
        store
            .add("k", Expiry::Never, b"again")
            .await
            .expect("add over expired entry");
    }

    #[tokio::test]
    async fn ttl_beyond_clock_range_never_expires() {
        let store = MemoryStore::new();
        store
            .set("k", Expiry::After(Duration::MAX), b"v")
            .await
            .expect("set with huge ttl");
        store
            .add("fresh", Expiry::After(Duration::MAX), b"v")
            .await
            .expect("add with huge ttl");
        let count = store.incr("n", 1, 7, Expiry::After(Duration::MAX)).await;
        assert_eq!(count.expect("incr with huge ttl"), 7);
        assert_eq!(store.get("k").await.expect("still live").value, b"v");
    }

    #[tokio::test]
    async fn replace_raw_reports_missing_keys() {
        let store = MemoryStore::new();
        assert!(!store.replace_raw("absent", b"x".to_vec()));
        let cas = store.set("k", Expiry::Never, b"v").await.unwrap();
        assert!(store.replace_raw("k", b"w".to_vec()));
        let stored = store.get("k").await.unwrap();
        assert_eq!(stored.value, b"w");
        assert_eq!(stored.cas, cas);
    }
}
