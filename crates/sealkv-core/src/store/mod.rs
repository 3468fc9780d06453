use std::{fmt, time::Duration};

use async_trait::async_trait;
use thiserror::Error;

mod memory;

pub use memory::MemoryStore;

/// Errors produced by store adapters.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Requested key does not exist (or has expired).
    #[error("entry not found for key: {key}")]
    NotFound { key: String },
    /// An exclusive create found the key already present.
    #[error("entry already exists for key: {key}")]
    AlreadyExists { key: String },
    /// The stored version no longer matches the caller's token.
    #[error("cas mismatch for key: {key}")]
    CasConflict { key: String },
    /// Underlying storage failure.
    #[error("storage failure: {reason}")]
    Io { reason: String },
}

impl StoreError {
    pub fn io(reason: impl ToString) -> Self {
        StoreError::Io {
            reason: reason.to_string(),
        }
    }
}

/// Opaque version stamp handed out by a store on every read and write.
///
/// The only meaningful operation is equality; adapters decide how tokens are
/// minted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cas(u64);

impl Cas {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Cas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Expiry hint passed through to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Expiry {
    #[default]
    Never,
    After(Duration),
}

/// A record read back from the store together with its current version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stored {
    pub value: Vec<u8>,
    pub cas: Cas,
}

/// Store operation names, carried in error context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    Get,
    Set,
    Add,
    CasWrite,
    Incr,
    Remove,
}

impl fmt::Display for StoreOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StoreOp::Get => "get",
            StoreOp::Set => "set",
            StoreOp::Add => "add",
            StoreOp::CasWrite => "cas",
            StoreOp::Incr => "incr",
            StoreOp::Remove => "remove",
        };
        f.write_str(name)
    }
}

/// Minimal key-value contract the envelope codec drives.
///
/// Values are opaque byte blobs. Implementations must make `add`,
/// `cas_write` and `remove` atomic with respect to each other on the same key.
#[async_trait]
pub trait StoreAdapter: Send + Sync {
    /// Fetch the value and its current version.
    async fn get(&self, key: &str) -> Result<Stored, StoreError>;

    /// Unconditionally write a value (last writer wins).
    async fn set(&self, key: &str, expiry: Expiry, value: &[u8]) -> Result<Cas, StoreError>;

    /// Write only if the key is absent; `AlreadyExists` otherwise.
    async fn add(&self, key: &str, expiry: Expiry, value: &[u8]) -> Result<Cas, StoreError>;

    /// Write only if the stored version equals `expected`.
    async fn cas_write(
        &self,
        key: &str,
        expiry: Expiry,
        value: &[u8],
        expected: Cas,
    ) -> Result<Cas, StoreError>;

    /// Add `delta` to a decimal counter, creating it with `initial` when absent.
    async fn incr(
        &self,
        key: &str,
        delta: u64,
        initial: u64,
        expiry: Expiry,
    ) -> Result<u64, StoreError>;

    /// Delete a key, optionally conditioned on its version.
    async fn remove(&self, key: &str, cas: Option<Cas>) -> Result<(), StoreError>;
}

/// Parse a stored counter value.
pub fn parse_counter(key: &str, raw: &[u8]) -> Result<u64, StoreError> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .ok_or_else(|| StoreError::Io {
            reason: format!("value for key {key} is not a counter"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_counters_and_rejects_garbage() {
        assert_eq!(parse_counter("k", b"42").unwrap(), 42);
        assert_eq!(parse_counter("k", b" 7\n").unwrap(), 7);
        let err = parse_counter("k", b"{\"n\":1}").expect_err("not a counter");
        assert!(matches!(err, StoreError::Io { .. }));
    }

    #[test]
    fn cas_displays_as_fixed_width_hex() {
        assert_eq!(Cas::new(255).to_string(), "00000000000000ff");
    }
}
