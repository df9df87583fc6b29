//! In-process storage backend.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard};
use std::time::{Duration, Instant};

use super::pattern::KeyPattern;
use super::{Storage, StorageValue, Ttl};
use crate::error::{StorageError, StorageResult};

#[derive(Debug, Clone)]
struct Entry {
    value: StorageValue,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(value: StorageValue, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: deadline(ttl),
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

fn deadline(ttl: Duration) -> Option<Instant> {
    if ttl.is_zero() {
        None
    } else {
        Instant::now().checked_add(ttl)
    }
}

/// Thread-safe in-memory key-value store with lazy expiration.
///
/// Expired entries are invisible to every read and are dropped on the next
/// write or `keys` scan.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryStorage {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (non-expired) keys.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.read_recovered()
            .values()
            .filter(|entry| !entry.is_expired(now))
            .count()
    }

    /// Whether the store holds no live keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read access for the infallible accessors (`len`, `exists`).
    fn read_recovered(&self) -> RwLockReadGuard<'_, HashMap<String, Entry>> {
        // Every write is a single insert, remove or clear, so a poisoned
        // map is still consistent.
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn purge_expired(entries: &mut HashMap<String, Entry>) {
        let now = Instant::now();
        entries.retain(|_, entry| !entry.is_expired(now));
    }

    fn live<'a>(entries: &'a HashMap<String, Entry>, key: &str) -> Option<&'a Entry> {
        entries
            .get(key)
            .filter(|entry| !entry.is_expired(Instant::now()))
    }
}

impl Storage for MemoryStorage {
    fn set(&self, key: &str, value: StorageValue, ttl: Duration) -> StorageResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| StorageError::LockPoisoned)?;
        Self::purge_expired(&mut entries);
        entries.insert(key.to_string(), Entry::new(value, ttl));
        Ok(())
    }

    fn get(&self, key: &str) -> StorageResult<Option<StorageValue>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| StorageError::LockPoisoned)?;
        Ok(Self::live(&entries, key).map(|entry| entry.value.clone()))
    }

    fn delete(&self, keys: &[&str]) -> StorageResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| StorageError::LockPoisoned)?;
        for key in keys {
            entries.remove(*key);
        }
        Ok(())
    }

    fn exists(&self, key: &str) -> bool {
        Self::live(&self.read_recovered(), key).is_some()
    }

    fn keys(&self, pattern: &str) -> StorageResult<Vec<String>> {
        let pattern = KeyPattern::new(pattern)?;
        let mut entries = self
            .entries
            .write()
            .map_err(|_| StorageError::LockPoisoned)?;
        Self::purge_expired(&mut entries);
        Ok(entries
            .keys()
            .filter(|key| pattern.matches(key))
            .cloned()
            .collect())
    }

    fn expire(&self, key: &str, ttl: Duration) -> StorageResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| StorageError::LockPoisoned)?;
        let now = Instant::now();
        if let Some(entry) = entries.get_mut(key).filter(|e| !e.is_expired(now)) {
            entry.expires_at = deadline(ttl);
        }
        Ok(())
    }

    fn ttl(&self, key: &str) -> StorageResult<Ttl> {
        let entries = self
            .entries
            .read()
            .map_err(|_| StorageError::LockPoisoned)?;
        let ttl = match Self::live(&entries, key) {
            None => Ttl::Missing,
            Some(Entry {
                expires_at: None, ..
            }) => Ttl::Persistent,
            Some(Entry {
                expires_at: Some(at),
                ..
            }) => Ttl::Remaining(at.saturating_duration_since(Instant::now())),
        };
        Ok(ttl)
    }

    fn clear(&self) -> StorageResult<()> {
        self.entries
            .write()
            .map_err(|_| StorageError::LockPoisoned)?
            .clear();
        Ok(())
    }

    fn ping(&self) -> StorageResult<()> {
        self.entries
            .read()
            .map(|_| ())
            .map_err(|_| StorageError::LockPoisoned)
    }
}
