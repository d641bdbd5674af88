use lobbyforge_protocol::SessionId;

/// Errors a matchmaking backend can report.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// The backend can't be reached or isn't initialized.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// The backend doesn't know this session (never existed, or everyone
    /// left and it was destroyed).
    #[error("unknown session {0}")]
    UnknownSession(SessionId),

    /// No chat entry exists at this index.
    #[error("no message at index {index} in session {session_id}")]
    MessageNotFound { session_id: SessionId, index: u32 },

    /// The backend refused the request (not a member, payload too large,
    /// rate limited, and so on).
    #[error("request rejected: {0}")]
    Rejected(String),
}
