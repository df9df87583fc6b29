//! Session persistence state machine.

/// Where a session stands relative to its backing record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Constructed in memory, nothing written yet.
    #[default]
    Transient,
    /// Last mutation (or load) matches the stored record.
    Persisted,
    /// Backing record removed; no further writes allowed.
    Destroyed,
}

impl SessionState {
    /// Check if transition to target state is valid.
    ///
    /// Valid transitions:
    /// - Transient -> Persisted
    /// - Persisted -> Persisted
    /// - Transient -> Destroyed
    /// - Persisted -> Destroyed
    /// - Destroyed -> Destroyed (repeated destroy)
    pub fn can_transition_to(&self, target: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (*self, target),
            (Transient, Persisted)
                | (Persisted, Persisted)
                | (Transient, Destroyed)
                | (Persisted, Destroyed)
                | (Destroyed, Destroyed)
        )
    }

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Destroyed)
    }

    /// Check if the session may still write to storage.
    pub fn can_persist(&self) -> bool {
        !self.is_terminal()
    }
}
