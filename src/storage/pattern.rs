//! Glob-style key matching used by `Storage::keys`.
//!
//! `*` matches any run of characters (including none and `/`), `?` matches
//! exactly one character, `[...]` is a character class. Everything else is
//! literal.

use glob::{MatchOptions, Pattern};

use crate::error::{StorageError, StorageResult};

const KEY_MATCH: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Compiled key pattern.
#[derive(Debug, Clone)]
pub struct KeyPattern(Pattern);

impl KeyPattern {
    /// Compile `pattern`; a malformed glob is a backend error.
    pub fn new(pattern: &str) -> StorageResult<Self> {
        Pattern::new(pattern)
            .map(Self)
            .map_err(|e| StorageError::Backend(format!("invalid key pattern '{}': {}", pattern, e)))
    }

    /// Check whether `key` matches.
    pub fn matches(&self, key: &str) -> bool {
        self.0.matches_with(key, KEY_MATCH)
    }
}
