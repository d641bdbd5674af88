//! Process-wide index of live sessions.
//!
//! Enforces the "one handle per session per process" invariant: a session
//! id is claimed before (join) or right after (create) the backend
//! round-trip, and released when the handle closes or construction fails.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use lobbyforge_protocol::{MemberId, SessionId};

use crate::SessionError;

/// A summary of a live session handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveSession {
    /// The session's id.
    pub session_id: SessionId,
    /// Owner snapshot taken at construction.
    pub owner: MemberId,
    /// Whether the local member was the owner at construction.
    pub is_owner: bool,
}

/// Shared registry of session ids with a live (or in-flight) handle.
///
/// Cloning is cheap; clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    /// `None` while the handle is still being established.
    entries: Arc<Mutex<HashMap<SessionId, Option<LiveSession>>>>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves `session_id` for a handle being established.
    ///
    /// # Errors
    /// Returns [`SessionError::AlreadyOpen`] if the id is already claimed.
    pub(crate) fn claim(&self, session_id: SessionId) -> Result<(), SessionError> {
        let mut entries = self.lock();
        if entries.contains_key(&session_id) {
            return Err(SessionError::AlreadyOpen(session_id));
        }
        entries.insert(session_id, None);
        Ok(())
    }

    /// Records the finished handle under its claimed id.
    pub(crate) fn activate(&self, live: LiveSession) {
        self.lock().insert(live.session_id, Some(live));
    }

    /// Frees `session_id`. Returns `false` if it wasn't claimed.
    pub(crate) fn release(&self, session_id: SessionId) -> bool {
        self.lock().remove(&session_id).is_some()
    }

    /// Returns `true` if `session_id` is claimed or live.
    pub fn contains(&self, session_id: SessionId) -> bool {
        self.lock().contains_key(&session_id)
    }

    /// Every fully established session.
    pub fn live(&self) -> Vec<LiveSession> {
        self.lock().values().flatten().copied().collect()
    }

    /// Number of claimed or live ids.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if nothing is claimed.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SessionId, Option<LiveSession>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
