//! Command execution for the `auth-session` binary.

use std::io::Write;
use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::cli::Command;
use crate::error::{SessionError, StorageError};
use crate::session::{self, Session, Value};
use crate::storage::Storage;

/// Number of parallel writers used by the demo.
const DEMO_WRITERS: usize = 16;

/// Errors surfaced by a command.
#[derive(Error, Debug)]
pub enum CommandError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("failed to write output: {0}")]
    Io(#[from] std::io::Error),

    #[error("background task failed: {0}")]
    Join(String),

    #[error("demo check failed: {0}")]
    Check(String),
}

/// Parse a CLI value: valid JSON keeps its type, anything else is text.
pub fn parse_value(raw: &str) -> Value {
    serde_json::from_str::<serde_json::Value>(raw)
        .map(Value::from)
        .unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Run one command against `storage`, writing human output to `out`.
pub async fn execute<W: Write>(
    command: &Command,
    storage: Arc<dyn Storage>,
    prefix: &str,
    out: &mut W,
) -> Result<(), CommandError> {
    match command {
        Command::Set { id, key, value } => {
            let session = session::load_or_create(id, storage, prefix)?;
            session.set(key, parse_value(value))?;
            writeln!(out, "OK")?;
        }
        Command::Get { id, key } => {
            let session = session::load(id, storage, prefix)?;
            match key {
                Some(key) => match session.get(key) {
                    Some(value) => writeln!(out, "{}", value.to_json())?,
                    None => writeln!(out, "(nil)")?,
                },
                None => {
                    let data: serde_json::Map<String, serde_json::Value> = session
                        .snapshot()
                        .into_iter()
                        .map(|(k, v)| (k, v.to_json()))
                        .collect();
                    let view = serde_json::json!({
                        "id": session.id().as_str(),
                        "createTime": session.create_time(),
                        "data": data,
                    });
                    writeln!(
                        out,
                        "{}",
                        serde_json::to_string_pretty(&view).map_err(SessionError::from)?
                    )?;
                }
            }
        }
        Command::Del { id, key } => {
            let session = session::load(id, storage, prefix)?;
            session.delete(key)?;
            writeln!(out, "OK")?;
        }
        Command::Destroy { id } => {
            session::destroy_by_id(id, storage.as_ref(), prefix)?;
            writeln!(out, "OK")?;
        }
        Command::List => {
            for id in session::list_ids(storage.as_ref(), prefix)? {
                writeln!(out, "{}", id)?;
            }
        }
        Command::Ttl { key } => {
            writeln!(out, "{}", storage.ttl(key)?.as_secs_sentinel())?;
        }
        Command::Ping => {
            storage.ping()?;
            writeln!(out, "PONG")?;
        }
        Command::Demo => demo(storage, prefix, out).await?,
    }
    Ok(())
}

/// Walk through create, write, reload, parallel writes and destroy.
async fn demo<W: Write>(
    storage: Arc<dyn Storage>,
    prefix: &str,
    out: &mut W,
) -> Result<(), CommandError> {
    let id = "demo-user";
    session::destroy_by_id(id, storage.as_ref(), prefix)?;

    writeln!(out, "1. Create session {}", id)?;
    let session = Session::new(id, Arc::clone(&storage), prefix)?;
    session.set("role", "admin")?;
    session.set("age", 30)?;
    session.set("permissions", vec!["user:read", "user:write", "admin:*"])?;
    writeln!(out, "   stored under {}", session.storage_key())?;

    writeln!(out, "2. Reload from storage")?;
    let loaded = session::load(id, Arc::clone(&storage), prefix)?;
    writeln!(out, "   role = {}", loaded.get_string("role"))?;
    writeln!(out, "   age  = {}", loaded.get_int("age"))?;
    if loaded.get_string("role") != "admin" || loaded.get_int("age") != 30 {
        return Err(CommandError::Check("reloaded values differ".into()));
    }

    writeln!(out, "3. {} parallel writers", DEMO_WRITERS)?;
    let shared = Arc::new(loaded);
    let mut handles = Vec::with_capacity(DEMO_WRITERS);
    for i in 0..DEMO_WRITERS {
        let session = Arc::clone(&shared);
        handles.push(tokio::task::spawn_blocking(move || {
            session.set(&format!("key-{}", i), i as i64)
        }));
    }
    for handle in handles {
        handle
            .await
            .map_err(|e| CommandError::Join(e.to_string()))??;
    }

    let reloaded = session::load(id, Arc::clone(&storage), prefix)?;
    let written = (0..DEMO_WRITERS)
        .filter(|i| reloaded.has(&format!("key-{}", i)))
        .count();
    writeln!(out, "   {} of {} keys persisted", written, DEMO_WRITERS)?;
    if written != DEMO_WRITERS {
        return Err(CommandError::Check(format!(
            "lost updates: {} of {} keys",
            written, DEMO_WRITERS
        )));
    }

    writeln!(out, "4. Destroy")?;
    shared.destroy()?;
    match session::load(id, storage, prefix) {
        Err(SessionError::NotFound(_)) => writeln!(out, "   session gone")?,
        Err(e) => return Err(e.into()),
        Ok(_) => return Err(CommandError::Check("session survived destroy".into())),
    }

    info!("demo completed");
    writeln!(out, "Demo completed")?;
    Ok(())
}
