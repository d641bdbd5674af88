//! Matchmaking backend abstraction for Lobbyforge.
//!
//! Provides the [`MatchmakingBackend`] and [`IdentityProvider`] traits: the
//! complete capability surface the session core relies on. A real
//! deployment implements them over its platform's matchmaking SDK; tests
//! and demos use the in-process [`LoopbackBackend`].
//!
//! # Feature Flags
//!
//! - `loopback` (default): the in-process [`LoopbackNetwork`] /
//!   [`LoopbackBackend`] simulation

mod completion;
mod error;
mod identity;
#[cfg(feature = "loopback")]
mod loopback;

pub use completion::Completion;
pub use error::BackendError;
pub use identity::IdentityProvider;
#[cfg(feature = "loopback")]
pub use loopback::{LoopbackBackend, LoopbackNetwork};

use std::fmt;

use lobbyforge_protocol::{
    ChatEntry, MemberId, MessageNotice, SessionId, Visibility,
};
use tokio::sync::mpsc;

/// Where the backend delivers chat notices for a subscription.
pub type NoticeSink = mpsc::UnboundedSender<MessageNotice>;

/// Opaque identifier for a chat-notice subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Creates a new `SubscriptionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// The matchmaking capabilities the session core calls into.
///
/// Every method takes `&self`: backends are process-wide services and
/// handle their own synchronization. Only creating and joining are
/// asynchronous, and they answer through a [`Completion`] instead of a
/// return value because that's how matchmaking SDKs deliver results: a
/// callback that fires later, or not at all when the request fails.
///
/// Chat traffic arrives as [`MessageNotice`]s on every subscribed sink,
/// for every session the local member belongs to. The backend does not
/// scope subscriptions to a session.
pub trait MatchmakingBackend: Send + Sync + 'static {
    /// Requests a new session.
    ///
    /// On success the backend fires `done` with the new session's id. On
    /// failure it may drop `done` without firing it, or never touch it
    /// again.
    ///
    /// # Errors
    /// Returns an error only if the request couldn't be issued at all.
    fn create_session(
        &self,
        visibility: Visibility,
        max_members: u32,
        done: Completion<SessionId>,
    ) -> Result<(), BackendError>;

    /// Requests to join an existing session.
    ///
    /// On success the backend fires `done` with an id that is *supposed*
    /// to be `session_id`. Callers must not rely on that; some backends
    /// have been observed reporting a different value.
    fn join_session(
        &self,
        session_id: SessionId,
        done: Completion<SessionId>,
    ) -> Result<(), BackendError>;

    /// Returns the member the backend currently considers the owner.
    fn session_owner(
        &self,
        session_id: SessionId,
    ) -> Result<MemberId, BackendError>;

    /// Sets a key-value metadata entry on a session. Owner only.
    fn set_session_metadata(
        &self,
        session_id: SessionId,
        key: &str,
        value: &str,
    ) -> Result<(), BackendError>;

    /// Reads a metadata entry. `Ok(None)` if the key isn't set.
    fn session_metadata(
        &self,
        session_id: SessionId,
        key: &str,
    ) -> Result<Option<String>, BackendError>;

    /// Broadcasts an opaque payload to every current member.
    fn send_message(
        &self,
        session_id: SessionId,
        payload: &[u8],
    ) -> Result<(), BackendError>;

    /// Fetches a chat entry by its index in the session's log.
    fn fetch_message(
        &self,
        session_id: SessionId,
        index: u32,
    ) -> Result<ChatEntry, BackendError>;

    /// Starts delivering chat notices to `sink`.
    fn subscribe(&self, sink: NoticeSink) -> SubscriptionId;

    /// Stops delivering notices for `id`. Unknown ids are ignored.
    fn unsubscribe(&self, id: SubscriptionId);

    /// Leaves a session.
    fn leave_session(&self, session_id: SessionId) -> Result<(), BackendError>;
}
