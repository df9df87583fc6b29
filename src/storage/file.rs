//! JSON-file storage backend.
//!
//! All records live in one JSON document. Reads reload the file, so
//! several handles and processes can share it. Every mutation holds an
//! advisory lock on `<path>.lock` for its read-modify-write cycle and
//! replaces the document through a fresh temp file and a rename, so
//! readers only ever see a complete document.

use std::collections::HashMap;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::debug;

use super::pattern::KeyPattern;
use super::{Storage, StorageValue, Ttl};
use crate::error::{StorageError, StorageResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum FileValue {
    Text(String),
    Blob(Vec<u8>),
}

impl From<StorageValue> for FileValue {
    fn from(value: StorageValue) -> Self {
        match value {
            StorageValue::Text(s) => Self::Text(s),
            StorageValue::Blob(b) => Self::Blob(b),
        }
    }
}

impl From<FileValue> for StorageValue {
    fn from(value: FileValue) -> Self {
        match value {
            FileValue::Text(s) => Self::Text(s),
            FileValue::Blob(b) => Self::Blob(b),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FileEntry {
    value: FileValue,
    /// Unix epoch milliseconds; absent means no expiration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at_ms: Option<u64>,
}

impl FileEntry {
    fn is_expired(&self, now_ms: u64) -> bool {
        self.expires_at_ms.is_some_and(|at| at <= now_ms)
    }
}

type Records = HashMap<String, FileEntry>;

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn deadline_ms(ttl: Duration) -> Option<u64> {
    if ttl.is_zero() {
        None
    } else {
        Some(now_ms().saturating_add(ttl.as_millis() as u64))
    }
}

/// Exclusive advisory lock on the store's lock file, released on drop.
struct WriteLock(File);

impl WriteLock {
    fn acquire(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)?;
        FileExt::lock_exclusive(&file)?;
        Ok(Self(file))
    }
}

impl Drop for WriteLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.0);
    }
}

/// Storage backend persisting every record into a single JSON file.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    lock_path: PathBuf,
}

impl FileStorage {
    /// Open (or lazily create) the store at `path`.
    ///
    /// The parent directory is created if missing; the file itself is
    /// written on the first mutation.
    pub fn open(path: impl Into<PathBuf>) -> StorageResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut lock_path = OsString::from(path.as_os_str());
        lock_path.push(".lock");
        Ok(Self {
            path,
            lock_path: PathBuf::from(lock_path),
        })
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_records(&self) -> StorageResult<Records> {
        match fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(Records::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Records::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn dir(&self) -> &Path {
        match self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => parent,
            None => Path::new("."),
        }
    }

    fn write_records(&self, records: &Records) -> StorageResult<()> {
        let mut tmp = NamedTempFile::new_in(self.dir())?;
        tmp.write_all(&serde_json::to_vec_pretty(records)?)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| StorageError::Io(e.error))?;
        debug!(path = %self.path.display(), count = records.len(), "store file written");
        Ok(())
    }

    /// Run a read-modify-write cycle; expired entries are dropped first.
    fn modify<F>(&self, f: F) -> StorageResult<()>
    where
        F: FnOnce(&mut Records),
    {
        let _lock = WriteLock::acquire(&self.lock_path)?;
        let mut records = self.read_records()?;
        let now = now_ms();
        records.retain(|_, entry| !entry.is_expired(now));
        f(&mut records);
        self.write_records(&records)
    }

    fn live_entry(&self, key: &str) -> StorageResult<Option<FileEntry>> {
        let mut records = self.read_records()?;
        Ok(records
            .remove(key)
            .filter(|entry| !entry.is_expired(now_ms())))
    }
}

impl Storage for FileStorage {
    fn set(&self, key: &str, value: StorageValue, ttl: Duration) -> StorageResult<()> {
        let entry = FileEntry {
            value: value.into(),
            expires_at_ms: deadline_ms(ttl),
        };
        self.modify(|records| {
            records.insert(key.to_string(), entry);
        })
    }

    fn get(&self, key: &str) -> StorageResult<Option<StorageValue>> {
        Ok(self.live_entry(key)?.map(|entry| entry.value.into()))
    }

    fn delete(&self, keys: &[&str]) -> StorageResult<()> {
        if keys.is_empty() {
            return Ok(());
        }
        self.modify(|records| {
            for key in keys {
                records.remove(*key);
            }
        })
    }

    fn exists(&self, key: &str) -> bool {
        matches!(self.live_entry(key), Ok(Some(_)))
    }

    fn keys(&self, pattern: &str) -> StorageResult<Vec<String>> {
        let pattern = KeyPattern::new(pattern)?;
        let now = now_ms();
        Ok(self
            .read_records()?
            .into_iter()
            .filter(|(key, entry)| !entry.is_expired(now) && pattern.matches(key))
            .map(|(key, _)| key)
            .collect())
    }

    fn expire(&self, key: &str, ttl: Duration) -> StorageResult<()> {
        self.modify(|records| {
            if let Some(entry) = records.get_mut(key) {
                entry.expires_at_ms = deadline_ms(ttl);
            }
        })
    }

    fn ttl(&self, key: &str) -> StorageResult<Ttl> {
        let ttl = match self.live_entry(key)? {
            None => Ttl::Missing,
            Some(FileEntry {
                expires_at_ms: None,
                ..
            }) => Ttl::Persistent,
            Some(FileEntry {
                expires_at_ms: Some(at),
                ..
            }) => Ttl::Remaining(Duration::from_millis(at.saturating_sub(now_ms()))),
        };
        Ok(ttl)
    }

    fn clear(&self) -> StorageResult<()> {
        self.modify(|records| records.clear())
    }

    fn ping(&self) -> StorageResult<()> {
        let dir = self.dir();
        if !dir.is_dir() {
            return Err(StorageError::Unavailable(format!(
                "directory {} does not exist",
                dir.display()
            )));
        }
        self.read_records().map(|_| ())
    }
}
