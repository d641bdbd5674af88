//! The session lifecycle state machine.

use std::fmt;

/// The lifecycle state of a session handle.
///
/// ```text
///                 ┌──→ Creating ──┐
/// Uninitialized ──┤               ├──→ Active ──→ Closed
///                 └──→ Joining ───┘
/// ```
///
/// - **Uninitialized**: nothing has been asked of the backend yet.
/// - **Creating / Joining**: a backend round-trip is in flight. The
///   factory owns this phase; no handle exists yet.
/// - **Active**: subscribed and usable. Sending and the ownership fields
///   are only meaningful here.
/// - **Closed**: unsubscribed and left. Terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Creating,
    Joining,
    Active,
    Closed,
}

impl SessionState {
    /// Returns `true` if the handle can send and relay messages.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// Returns `true` if transitioning to `target` is valid.
    pub fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Uninitialized, Self::Creating)
                | (Self::Uninitialized, Self::Joining)
                | (Self::Creating, Self::Active)
                | (Self::Joining, Self::Active)
                | (Self::Active, Self::Closed)
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "Uninitialized"),
            Self::Creating => write!(f, "Creating"),
            Self::Joining => write!(f, "Joining"),
            Self::Active => write!(f, "Active"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}
