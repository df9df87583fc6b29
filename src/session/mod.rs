//! Session management module.
//!
//! A [`Session`] is an attribute map owned by one principal, kept in memory
//! and written through to a [`crate::storage::Storage`] on every mutation.

mod entity;
mod id;
mod lifecycle;
mod record;
mod state;
mod value;

pub use entity::Session;
pub use id::SessionId;
pub use lifecycle::{create, destroy_by_id, exists, list_ids, load, load_or_create};
pub use record::{key_pattern, storage_key, SESSION_KEY_PREFIX};
pub use state::SessionState;
pub use value::Value;
