//! Unified error type for Lobbyforge.

use lobbyforge_backend::BackendError;
use lobbyforge_protocol::ProtocolError;
use lobbyforge_session::SessionError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `lobbyforge` facade, you deal with this single error
/// type instead of importing errors from each sub-crate. The `#[from]`
/// attribute on each variant auto-generates `From` impls, so the `?`
/// operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum LobbyforgeError {
    /// A payload error (encode, decode, malformed identifier).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A backend call failed.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// A session lifecycle error (timeout, already open, closed).
    #[error(transparent)]
    Session(#[from] SessionError),
}
