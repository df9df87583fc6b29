//! Persisted representation of a session.
//!
//! Only `{id, createTime, data}` is ever written. Locks, the storage handle
//! and the key prefix live on [`super::Session`] and are re-attached on load.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::Value;
use crate::error::SessionError;
use crate::storage::StorageValue;

/// Fixed infix between the namespace prefix and the session id.
pub const SESSION_KEY_PREFIX: &str = "session:";

/// Storage key for a session: `prefix + "session:" + id`.
pub fn storage_key(prefix: &str, id: &str) -> String {
    let mut key = String::with_capacity(prefix.len() + SESSION_KEY_PREFIX.len() + id.len());
    key.push_str(prefix);
    key.push_str(SESSION_KEY_PREFIX);
    key.push_str(id);
    key
}

/// Glob pattern matching every session key under `prefix`.
pub fn key_pattern(prefix: &str) -> String {
    format!("{}{}*", prefix, SESSION_KEY_PREFIX)
}

/// Borrowed view written on every save.
#[derive(Debug, Serialize)]
pub(crate) struct RecordRef<'a> {
    pub id: &'a str,
    #[serde(rename = "createTime")]
    pub create_time: i64,
    pub data: &'a HashMap<String, Value>,
}

impl RecordRef<'_> {
    pub fn encode(&self) -> Result<StorageValue, SessionError> {
        Ok(StorageValue::Text(serde_json::to_string(self)?))
    }
}

/// Owned record decoded on load.
#[derive(Debug, Deserialize)]
pub(crate) struct SessionRecord {
    pub id: String,
    #[serde(rename = "createTime")]
    pub create_time: i64,
    #[serde(default)]
    pub data: Option<HashMap<String, Value>>,
}

impl SessionRecord {
    /// Decode a stored payload. Anything other than a JSON text record is
    /// `InvalidData`.
    pub fn decode(value: &StorageValue) -> Result<Self, SessionError> {
        let text = value
            .as_text()
            .ok_or_else(|| SessionError::InvalidData("stored value is not text".into()))?;
        let record: SessionRecord =
            serde_json::from_str(text).map_err(|e| SessionError::InvalidData(e.to_string()))?;
        if record.id.is_empty() {
            return Err(SessionError::InvalidData("record has empty id".into()));
        }
        Ok(record)
    }
}
