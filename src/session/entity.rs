//! Storage-backed session entity.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, info, warn};

use super::record::{storage_key, RecordRef};
use super::{SessionId, SessionState, Value};
use crate::error::{Result, SessionError};
use crate::storage::{Storage, NO_EXPIRATION};

/// Lock-protected part of a session.
#[derive(Debug, Default)]
struct Inner {
    data: HashMap<String, Value>,
    state: SessionState,
}

/// Concurrency-safe attribute map written through to a [`Storage`].
///
/// Reads are served from memory under a shared lock. Every mutation takes
/// the exclusive lock, updates memory, and rewrites the whole record
/// before returning, so the storage call sits on the critical path.
///
/// Two `Session` values with the same id (other process, or a second
/// `load`) do not coordinate: the last successful write wins.
pub struct Session {
    id: SessionId,
    create_time: i64,
    inner: RwLock<Inner>,
    storage: Arc<dyn Storage>,
    prefix: String,
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

impl Session {
    /// Build a fresh, not yet persisted session.
    ///
    /// Fails with [`SessionError::EmptyId`] on an empty id. Nothing is
    /// written until the first mutation; see [`super::create`] for a
    /// constructor that persists immediately.
    pub fn new(
        id: impl Into<String>,
        storage: Arc<dyn Storage>,
        prefix: impl Into<String>,
    ) -> Result<Self> {
        let id = SessionId::new(id)?;
        Ok(Self::from_parts(
            id,
            unix_now(),
            HashMap::new(),
            SessionState::Transient,
            storage,
            prefix.into(),
        ))
    }

    pub(crate) fn from_parts(
        id: SessionId,
        create_time: i64,
        data: HashMap<String, Value>,
        state: SessionState,
        storage: Arc<dyn Storage>,
        prefix: String,
    ) -> Self {
        Self {
            id,
            create_time,
            inner: RwLock::new(Inner { data, state }),
            storage,
            prefix,
        }
    }

    /// Session identifier.
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Creation time, unix epoch seconds.
    pub fn create_time(&self) -> i64 {
        self.create_time
    }

    /// Namespace prefix this session was opened with.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Key of the backing record.
    pub fn storage_key(&self) -> String {
        storage_key(&self.prefix, self.id.as_str())
    }

    /// Current persistence state.
    pub fn state(&self) -> SessionState {
        self.read().state
    }

    // ============ Reads ============

    /// Raw attribute value.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.read().data.get(key).cloned()
    }

    /// Text attribute; empty string when absent or not text.
    pub fn get_string(&self, key: &str) -> String {
        self.read()
            .data
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_default()
    }

    /// Integer attribute narrowed to `i32`; `0` when absent, not numeric,
    /// or out of range.
    pub fn get_int(&self, key: &str) -> i32 {
        self.read()
            .data
            .get(key)
            .and_then(Value::as_i32)
            .unwrap_or(0)
    }

    /// Integer attribute; `0` when absent or not numeric.
    pub fn get_int64(&self, key: &str) -> i64 {
        self.read()
            .data
            .get(key)
            .and_then(Value::as_i64)
            .unwrap_or(0)
    }

    /// Float attribute; `0.0` when absent or not numeric.
    pub fn get_float(&self, key: &str) -> f64 {
        self.read()
            .data
            .get(key)
            .and_then(Value::as_f64)
            .unwrap_or(0.0)
    }

    /// Boolean attribute; `false` when absent or not boolean.
    pub fn get_bool(&self, key: &str) -> bool {
        self.read()
            .data
            .get(key)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Attribute as plain JSON; `Null` when absent.
    pub fn get_json(&self, key: &str) -> serde_json::Value {
        self.read()
            .data
            .get(key)
            .map(Value::to_json)
            .unwrap_or(serde_json::Value::Null)
    }

    pub fn has(&self, key: &str) -> bool {
        self.read().data.contains_key(key)
    }

    /// Attribute names, in no particular order.
    pub fn keys(&self) -> Vec<String> {
        self.read().data.keys().cloned().collect()
    }

    pub fn size(&self) -> usize {
        self.read().data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Copy of the whole attribute map.
    pub fn snapshot(&self) -> HashMap<String, Value> {
        self.read().data.clone()
    }

    // ============ Mutations ============

    /// Store `value` under `key` and write the record through.
    ///
    /// On a storage failure the in-memory map keeps the new value; the
    /// caller should retry or discard this instance.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<()> {
        if key.is_empty() {
            return Err(SessionError::EmptyKey);
        }
        let mut inner = self.write()?;
        self.ensure_alive(&inner)?;

        inner.data.insert(key.to_string(), value.into());
        self.save(&mut inner, "set")
    }

    /// Remove `key` (absent is fine) and write the record through.
    pub fn delete(&self, key: &str) -> Result<()> {
        let mut inner = self.write()?;
        self.ensure_alive(&inner)?;

        inner.data.remove(key);
        self.save(&mut inner, "delete")
    }

    /// Drop every attribute and write the empty record through.
    pub fn clear(&self) -> Result<()> {
        let mut inner = self.write()?;
        self.ensure_alive(&inner)?;

        inner.data.clear();
        self.save(&mut inner, "clear")
    }

    /// Remove the backing record.
    ///
    /// In-memory data stays readable. Later mutations fail with
    /// [`SessionError::Destroyed`]. Calling this again is harmless.
    pub fn destroy(&self) -> Result<()> {
        let mut inner = self.write()?;
        let key = self.storage_key();

        self.storage
            .delete(&[key.as_str()])
            .map_err(|e| SessionError::storage("destroy", e))?;

        inner.state = SessionState::Destroyed;
        info!(session = %self.id, "session destroyed");
        Ok(())
    }

    /// Write the current record without changing any attribute.
    pub(crate) fn persist(&self) -> Result<()> {
        let mut inner = self.write()?;
        self.ensure_alive(&inner)?;
        self.save(&mut inner, "save")
    }

    // ============ Internal ============

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        // Writers never leave `Inner` half-updated, so a poisoned lock
        // still guards a usable map.
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>> {
        self.inner.write().map_err(|_| SessionError::LockPoisoned)
    }

    fn ensure_alive(&self, inner: &Inner) -> Result<()> {
        if inner.state.can_persist() {
            Ok(())
        } else {
            Err(SessionError::Destroyed(self.id.to_string()))
        }
    }

    /// Serialize `{id, createTime, data}` and write it under the session
    /// key with no expiration. Caller holds the write lock.
    fn save(&self, inner: &mut Inner, op: &'static str) -> Result<()> {
        let payload = RecordRef {
            id: self.id.as_str(),
            create_time: self.create_time,
            data: &inner.data,
        }
        .encode()?;

        let key = self.storage_key();
        if let Err(e) = self.storage.set(&key, payload, NO_EXPIRATION) {
            warn!(session = %self.id, op, error = %e, "write-through failed");
            return Err(SessionError::storage(op, e));
        }

        inner.state = SessionState::Persisted;
        debug!(session = %self.id, op, key = %key, size = inner.data.len(), "session persisted");
        Ok(())
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.read();
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("create_time", &self.create_time)
            .field("prefix", &self.prefix)
            .field("state", &inner.state)
            .field("data", &inner.data)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{StorageError, StorageResult};
    use crate::storage::{MemoryStorage, StorageValue, Ttl};
    use std::time::Duration;

    fn memory() -> Arc<dyn Storage> {
        Arc::new(MemoryStorage::new())
    }

    /// Backend whose writes always fail.
    struct BrokenStorage;

    impl Storage for BrokenStorage {
        fn set(&self, _: &str, _: StorageValue, _: Duration) -> StorageResult<()> {
            Err(StorageError::Unavailable("connection refused".into()))
        }
        fn get(&self, _: &str) -> StorageResult<Option<StorageValue>> {
            Err(StorageError::Unavailable("connection refused".into()))
        }
        fn delete(&self, _: &[&str]) -> StorageResult<()> {
            Err(StorageError::Unavailable("connection refused".into()))
        }
        fn exists(&self, _: &str) -> bool {
            false
        }
        fn keys(&self, _: &str) -> StorageResult<Vec<String>> {
            Ok(Vec::new())
        }
        fn expire(&self, _: &str, _: Duration) -> StorageResult<()> {
            Ok(())
        }
        fn ttl(&self, _: &str) -> StorageResult<Ttl> {
            Ok(Ttl::Missing)
        }
        fn clear(&self) -> StorageResult<()> {
            Ok(())
        }
        fn ping(&self) -> StorageResult<()> {
            Err(StorageError::Unavailable("connection refused".into()))
        }
    }

    #[test]
    fn test_new_rejects_empty_id() {
        let err = Session::new("", memory(), "satoken:").unwrap_err();
        assert!(matches!(err, SessionError::EmptyId));
    }

    #[test]
    fn test_new_is_transient_and_empty() {
        let storage = memory();
        let session = Session::new("u1", Arc::clone(&storage), "satoken:").unwrap();

        assert_eq!(session.state(), SessionState::Transient);
        assert!(session.is_empty());
        assert!(session.create_time() > 0);
        assert!(!storage.exists("satoken:session:u1"));
    }

    #[test]
    fn test_set_writes_through() {
        let storage = memory();
        let session = Session::new("u1", Arc::clone(&storage), "satoken:").unwrap();
        session.set("role", "admin").unwrap();

        assert_eq!(session.state(), SessionState::Persisted);
        let stored = storage.get("satoken:session:u1").unwrap().unwrap();
        let json: serde_json::Value = serde_json::from_str(stored.as_text().unwrap()).unwrap();
        assert_eq!(json["id"], "u1");
        assert_eq!(json["data"]["role"], "admin");
        assert_eq!(storage.ttl("satoken:session:u1").unwrap(), Ttl::Persistent);
    }

    #[test]
    fn test_set_empty_key_skips_storage() {
        let session = Session::new("u1", Arc::new(BrokenStorage), "").unwrap();
        let err = session.set("", "x").unwrap_err();

        assert!(matches!(err, SessionError::EmptyKey));
        assert!(session.is_empty());
    }

    #[test]
    fn test_typed_getters() {
        let session = Session::new("u1", memory(), "").unwrap();
        session.set("name", "alice").unwrap();
        session.set("age", 30).unwrap();
        session.set("score", 9.75).unwrap();
        session.set("admin", true).unwrap();

        assert_eq!(session.get_string("name"), "alice");
        assert_eq!(session.get_int("age"), 30);
        assert_eq!(session.get_int64("age"), 30);
        assert_eq!(session.get_int("score"), 9);
        assert_eq!(session.get_float("age"), 30.0);
        assert!(session.get_bool("admin"));
        assert_eq!(session.get_json("age"), serde_json::json!(30));
    }

    #[test]
    fn test_typed_getters_lenient_on_mismatch() {
        let session = Session::new("u1", memory(), "").unwrap();
        session.set("name", "alice").unwrap();
        session.set("huge", i64::MAX).unwrap();

        assert_eq!(session.get_int("name"), 0);
        assert_eq!(session.get_int64("name"), 0);
        assert!(!session.get_bool("name"));
        assert_eq!(session.get_string("huge"), "");
        assert_eq!(session.get_int("huge"), 0);
        assert_eq!(session.get_int64("huge"), i64::MAX);
        assert_eq!(session.get_string("missing"), "");
        assert_eq!(session.get_json("missing"), serde_json::Value::Null);
    }

    #[test]
    fn test_has_keys_size() {
        let session = Session::new("u1", memory(), "").unwrap();
        session.set("a", 1).unwrap();
        session.set("b", 2).unwrap();

        assert!(session.has("a"));
        assert!(!session.has("c"));
        assert_eq!(session.size(), 2);

        let mut keys = session.keys();
        keys.sort();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn test_delete_and_clear_persist() {
        let storage = memory();
        let session = Session::new("u1", Arc::clone(&storage), "").unwrap();
        session.set("a", 1).unwrap();
        session.set("b", 2).unwrap();

        session.delete("a").unwrap();
        session.delete("never-set").unwrap();
        assert!(!session.has("a"));

        let stored = storage.get("session:u1").unwrap().unwrap();
        assert!(!stored.as_text().unwrap().contains("\"a\""));

        session.clear().unwrap();
        assert!(session.is_empty());
        let stored = storage.get("session:u1").unwrap().unwrap();
        let json: serde_json::Value = serde_json::from_str(stored.as_text().unwrap()).unwrap();
        assert_eq!(json["data"], serde_json::json!({}));
    }

    #[test]
    fn test_storage_failure_surfaces_but_memory_updated() {
        let session = Session::new("u1", Arc::new(BrokenStorage), "").unwrap();
        let err = session.set("role", "admin").unwrap_err();

        assert!(matches!(err, SessionError::Storage { op: "set", .. }));
        assert_eq!(session.get_string("role"), "admin");
        assert_eq!(session.state(), SessionState::Transient);
    }

    #[test]
    fn test_non_finite_float_is_serialize_error() {
        let storage = memory();
        let session = Session::new("u1", Arc::clone(&storage), "").unwrap();
        session.set("ok", 1.5).unwrap();

        let err = session.set("ratio", f64::INFINITY).unwrap_err();
        assert!(matches!(err, SessionError::Serialize(_)));

        // The stored record is the last good one; no `null` was written.
        let stored = storage.get("session:u1").unwrap().unwrap();
        let json: serde_json::Value = serde_json::from_str(stored.as_text().unwrap()).unwrap();
        assert_eq!(json["data"], serde_json::json!({"ok": 1.5}));
    }

    #[test]
    fn test_destroy_keeps_memory_and_blocks_writes() {
        let storage = memory();
        let session = Session::new("u1", Arc::clone(&storage), "").unwrap();
        session.set("role", "admin").unwrap();

        session.destroy().unwrap();
        assert_eq!(session.state(), SessionState::Destroyed);
        assert!(!storage.exists("session:u1"));
        assert_eq!(session.get_string("role"), "admin");

        let err = session.set("role", "user").unwrap_err();
        assert!(matches!(err, SessionError::Destroyed(_)));
        assert!(!storage.exists("session:u1"));

        // Second destroy is a no-op on storage.
        session.destroy().unwrap();
    }

    #[test]
    fn test_destroy_propagates_storage_error() {
        let session = Session::new("u1", Arc::new(BrokenStorage), "").unwrap();
        let err = session.destroy().unwrap_err();
        assert!(matches!(err, SessionError::Storage { op: "destroy", .. }));
        assert_eq!(session.state(), SessionState::Transient);
    }

    #[test]
    fn test_debug_hides_storage() {
        let session = Session::new("u1", memory(), "p:").unwrap();
        let debug = format!("{:?}", session);
        assert!(debug.contains("u1"));
        assert!(debug.contains("p:"));
    }
}
