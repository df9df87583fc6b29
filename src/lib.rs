//! # auth-session
//!
//! Storage-backed session data for authentication toolkits.
//!
//! A [`Session`] holds arbitrary per-principal attributes (roles,
//! permissions, custom fields) and writes every change through to a
//! pluggable [`Storage`] backend, so the data survives across requests and
//! processes.
//!
//! ## Features
//!
//! - **Pluggable storage**: one [`Storage`] trait for in-memory, file,
//!   Redis or SQL backends
//! - **Write-through**: every mutation persists the full record before
//!   returning
//! - **Concurrency-safe**: shared reads, exclusive writes per session
//! - **Typed values**: a tagged [`Value`] with lenient typed getters
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use auth_session::{session, MemoryStorage, Storage};
//!
//! fn main() -> auth_session::Result<()> {
//!     auth_session::logging::try_init().ok();
//!
//!     let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
//!
//!     let s = session::create("1000", Arc::clone(&storage), "satoken:")?;
//!     s.set("role", "admin")?;
//!     s.set("age", 30)?;
//!
//!     let loaded = session::load("1000", storage, "satoken:")?;
//!     assert_eq!(loaded.get_string("role"), "admin");
//!     assert_eq!(loaded.get_int("age"), 30);
//!
//!     loaded.destroy()?;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod session;
pub mod storage;

// Re-export commonly used types
pub use error::{Result, SessionError, StorageError, StorageResult};
pub use session::{Session, SessionId, SessionState, Value};
pub use storage::{FileStorage, MemoryStorage, Storage, StorageValue, Ttl, NO_EXPIRATION};
