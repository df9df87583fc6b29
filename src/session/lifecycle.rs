//! Session lifecycle: create, load, destroy, enumerate.
//!
//! Storage and prefix are passed explicitly to every call; there is no
//! global manager.

use std::sync::Arc;

use tracing::{debug, info};

use super::record::{key_pattern, storage_key, SessionRecord};
use super::{Session, SessionId, SessionState};
use crate::error::{Result, SessionError};
use crate::storage::Storage;

/// Build a session and persist its empty record right away.
///
/// An existing record under the same id is replaced by the empty one and
/// its data is lost. Use [`load_or_create`] to keep stored data.
pub fn create(id: &str, storage: Arc<dyn Storage>, prefix: &str) -> Result<Session> {
    let session = Session::new(id, storage, prefix)?;
    session.persist()?;
    info!(session = %session.id(), "session created");
    Ok(session)
}

/// Rehydrate a session from storage.
///
/// Errors: [`SessionError::EmptyId`] for an empty id,
/// [`SessionError::NotFound`] when no record exists,
/// [`SessionError::InvalidData`] when the record cannot be decoded or
/// belongs to another id, [`SessionError::Storage`] on backend failure.
pub fn load(id: &str, storage: Arc<dyn Storage>, prefix: &str) -> Result<Session> {
    let id = SessionId::new(id)?;
    let key = storage_key(prefix, id.as_str());

    let stored = storage
        .get(&key)
        .map_err(|e| SessionError::storage("load", e))?
        .ok_or_else(|| SessionError::NotFound(id.to_string()))?;

    let record = SessionRecord::decode(&stored)?;
    if record.id != id.as_str() {
        return Err(SessionError::InvalidData(format!(
            "record under {} belongs to session {}",
            key, record.id
        )));
    }

    debug!(session = %id, key = %key, "session loaded");
    Ok(Session::from_parts(
        id,
        record.create_time,
        record.data.unwrap_or_default(),
        SessionState::Persisted,
        storage,
        prefix.to_string(),
    ))
}

/// Load the session, or create and persist a new one if none is stored.
pub fn load_or_create(id: &str, storage: Arc<dyn Storage>, prefix: &str) -> Result<Session> {
    match load(id, Arc::clone(&storage), prefix) {
        Err(SessionError::NotFound(_)) => create(id, storage, prefix),
        other => other,
    }
}

/// Whether a record is stored for `id`.
pub fn exists(id: &str, storage: &dyn Storage, prefix: &str) -> Result<bool> {
    let id = SessionId::new(id)?;
    Ok(storage.exists(&storage_key(prefix, id.as_str())))
}

/// Remove the record for `id` without loading it. Absent is fine.
pub fn destroy_by_id(id: &str, storage: &dyn Storage, prefix: &str) -> Result<()> {
    let id = SessionId::new(id)?;
    let key = storage_key(prefix, id.as_str());
    storage
        .delete(&[key.as_str()])
        .map_err(|e| SessionError::storage("destroy", e))?;
    info!(session = %id, "session destroyed");
    Ok(())
}

/// Ids of every session stored under `prefix`, sorted.
///
/// `prefix` is used inside a glob pattern, so `*` or `?` in it act as
/// wildcards.
pub fn list_ids(storage: &dyn Storage, prefix: &str) -> Result<Vec<SessionId>> {
    let keys = storage
        .keys(&key_pattern(prefix))
        .map_err(|e| SessionError::storage("list", e))?;
    let head = storage_key(prefix, "");

    let mut ids: Vec<SessionId> = keys
        .iter()
        .filter_map(|key| key.strip_prefix(head.as_str()))
        .filter_map(|id| SessionId::new(id).ok())
        .collect();
    ids.sort();
    Ok(ids)
}
