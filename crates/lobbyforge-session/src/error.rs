//! Error types for the session layer.

use std::time::Duration;

use lobbyforge_backend::BackendError;
use lobbyforge_protocol::{ProtocolError, SessionId};

/// Errors that can occur while creating, joining, or using a session.
///
/// Two variants are diagnostics rather than failures:
/// [`IdentifierMismatch`](Self::IdentifierMismatch) and
/// [`MetadataPublish`](Self::MetadataPublish) are built so they can be
/// logged with a consistent message, but no public operation returns
/// them. Closing a session twice is not an error at all.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A backend call failed outright (unreachable, unknown session,
    /// request refused).
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// The backend never fired the create/join callback within the
    /// configured timeout, or dropped it without firing.
    #[error("{operation} callback never fired (waited {timeout:?})")]
    CallbackNeverFires {
        operation: &'static str,
        timeout: Duration,
    },

    /// The join callback reported a different session than the one
    /// requested. The requested id is kept.
    #[error(
        "join for session {requested} reported session {reported}; keeping {requested}"
    )]
    IdentifierMismatch {
        requested: SessionId,
        reported: SessionId,
    },

    /// Publishing owner metadata failed. Best-effort, never fatal.
    #[error("could not publish metadata {key:?} on session {session_id}: {source}")]
    MetadataPublish {
        session_id: SessionId,
        key: &'static str,
        #[source]
        source: BackendError,
    },

    /// This process already holds a live handle for the session.
    #[error("session {0} is already open in this process")]
    AlreadyOpen(SessionId),

    /// The handle was closed; it can't send or be reused.
    #[error("session {0} is closed")]
    Closed(SessionId),

    /// The request was rejected before reaching the backend.
    #[error("invalid session config: {0}")]
    InvalidConfig(String),

    /// Encoding a typed payload failed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
