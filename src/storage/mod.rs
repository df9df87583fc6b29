//! Key-value storage abstraction.
//!
//! Every backend (in-memory, file, Redis, SQL, ...) implements [`Storage`].
//! Operations are assumed atomic per key; no cross-key transaction is
//! offered. Durability and clustering are the backend's business.

mod file;
mod memory;
pub mod pattern;

use std::time::Duration;

pub use file::FileStorage;
pub use memory::MemoryStorage;

use crate::error::StorageResult;

/// TTL value meaning "never expires".
pub const NO_EXPIRATION: Duration = Duration::ZERO;

/// A value held by a storage backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageValue {
    /// Text payload.
    Text(String),
    /// Opaque binary payload.
    Blob(Vec<u8>),
}

impl StorageValue {
    /// Borrow the payload as text, if it is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Blob(_) => None,
        }
    }
}

impl From<String> for StorageValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for StorageValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<Vec<u8>> for StorageValue {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Blob(bytes)
    }
}

/// Remaining lifetime of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// Key exists and never expires.
    Persistent,
    /// Key does not exist.
    Missing,
    /// Key expires after this duration.
    Remaining(Duration),
}

impl Ttl {
    /// Sentinel for keys without expiration.
    pub const PERSISTENT_SENTINEL: i64 = -1;
    /// Sentinel for absent keys.
    pub const MISSING_SENTINEL: i64 = -2;

    /// Encode as whole seconds: `-1` never expires, `-2` absent.
    pub fn as_secs_sentinel(&self) -> i64 {
        match self {
            Self::Persistent => Self::PERSISTENT_SENTINEL,
            Self::Missing => Self::MISSING_SENTINEL,
            Self::Remaining(d) => i64::try_from(d.as_secs()).unwrap_or(i64::MAX),
        }
    }

    /// Decode the sentinel encoding. Other negative values count as missing.
    pub fn from_secs_sentinel(secs: i64) -> Self {
        match secs {
            Self::PERSISTENT_SENTINEL => Self::Persistent,
            s if s < 0 => Self::Missing,
            s => Self::Remaining(Duration::from_secs(s as u64)),
        }
    }

    /// Whether the key exists.
    pub fn exists(&self) -> bool {
        !matches!(self, Self::Missing)
    }
}

/// Capability contract for a key-value backend.
///
/// Implementations must be shareable across threads; sessions hold an
/// `Arc<dyn Storage>` and call into it while holding their own write lock.
pub trait Storage: Send + Sync {
    /// Upsert `value` under `key`. A zero `ttl` means no expiration.
    /// Overwrites any existing value and expiration.
    fn set(&self, key: &str, value: StorageValue, ttl: Duration) -> StorageResult<()>;

    /// Fetch the value under `key`; `Ok(None)` when absent.
    fn get(&self, key: &str) -> StorageResult<Option<StorageValue>>;

    /// Remove every listed key. Absent keys are not an error.
    fn delete(&self, keys: &[&str]) -> StorageResult<()>;

    /// Presence check.
    fn exists(&self, key: &str) -> bool;

    /// All keys matching a glob pattern (`*`, `?`). Order is unspecified.
    fn keys(&self, pattern: &str) -> StorageResult<Vec<String>>;

    /// Set or replace the expiration of an existing key. A zero `ttl`
    /// removes the expiration.
    fn expire(&self, key: &str, ttl: Duration) -> StorageResult<()>;

    /// Remaining lifetime of `key`.
    fn ttl(&self, key: &str) -> StorageResult<Ttl>;

    /// Remove every key. Meant for tests and bootstrap only.
    fn clear(&self) -> StorageResult<()>;

    /// Liveness check.
    fn ping(&self) -> StorageResult<()>;
}
