//! The session factory: the only way to obtain a [`Session`].
//!
//! Both entry points follow the same shape:
//!
//! ```text
//! create_session() ──→ backend.create_session ──┐
//!                                               ├──→ await callback (bounded)
//! join_session()   ──→ backend.join_session ────┘            │
//!                                                            ▼
//!                                  resolve owner + local identity
//!                                                            │
//!                                          owner? publish Name/Guid
//!                                                            │
//!                                                            ▼
//!                                       Session::start → [Active]
//! ```
//!
//! # The join identifier
//!
//! The join callback carries a session id, but backends have been seen
//! reporting a value that doesn't match the request (once a literal
//! placeholder). Whether that is a backend bug or a misread contract is
//! unresolved. The factory therefore always builds the handle from the id
//! the caller asked for, which is the one the backend honors for later
//! calls, and logs an `IdentifierMismatch` warning whenever the two
//! differ so operators can investigate.

use std::sync::Arc;

use lobbyforge_backend::{Completion, IdentityProvider, MatchmakingBackend};
use lobbyforge_protocol::{LocalIdentity, MemberId, SessionId, metadata};
use tokio::sync::oneshot;

use crate::registry::LiveSession;
use crate::session::SessionParts;
use crate::{
    CreateConfig, FactoryConfig, Session, SessionError, SessionRegistry,
    SessionState, ShutdownHooks,
};

/// Creates and joins sessions against an injected backend.
///
/// The backend and identity provider are explicit dependencies rather
/// than process globals, so tests can hand in a loopback backend.
///
/// ## Lifecycle
///
/// ```text
/// [Uninitialized] ──create──→ [Creating] ──callback──→ [Active] ──close──→ [Closed]
///        └─────────join────→ [Joining] ──callback──┘
///                                  │
///                                  └──timeout──→ CallbackNeverFires
/// ```
pub struct SessionFactory<B: MatchmakingBackend, I: IdentityProvider> {
    backend: Arc<B>,
    identity: Arc<I>,
    config: FactoryConfig,
    registry: SessionRegistry,
    hooks: ShutdownHooks,
}

impl<B: MatchmakingBackend, I: IdentityProvider> SessionFactory<B, I> {
    /// Creates a factory with its own registry and shutdown hooks.
    pub fn new(backend: Arc<B>, identity: Arc<I>, config: FactoryConfig) -> Self {
        Self {
            backend,
            identity,
            config,
            registry: SessionRegistry::new(),
            hooks: ShutdownHooks::new(),
        }
    }

    /// Uses a shared shutdown hook registry, typically the one the host
    /// runs from its signal handler.
    pub fn with_hooks(mut self, hooks: ShutdownHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Uses a shared session registry, so several factories in one process
    /// still enforce one handle per session.
    pub fn with_registry(mut self, registry: SessionRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// The factory's configuration.
    pub fn config(&self) -> &FactoryConfig {
        &self.config
    }

    /// The shutdown hooks sessions from this factory register with.
    pub fn hooks(&self) -> &ShutdownHooks {
        &self.hooks
    }

    /// The registry of live sessions.
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Every fully established session from this factory's registry.
    pub fn live_sessions(&self) -> Vec<LiveSession> {
        self.registry.live()
    }

    /// Creates a new session. The local member becomes its owner.
    ///
    /// # Errors
    /// - [`SessionError::InvalidConfig`] if `max_members` or the factory's
    ///   `event_capacity` is 0
    /// - [`SessionError::Backend`] if the request or the ownership queries
    ///   fail
    /// - [`SessionError::CallbackNeverFires`] if the backend doesn't answer
    ///   within `handshake_timeout`
    pub async fn create_session(
        &self,
        config: CreateConfig,
    ) -> Result<Session<B>, SessionError> {
        if config.max_members == 0 {
            return Err(SessionError::InvalidConfig(
                "max_members must be at least 1".into(),
            ));
        }
        self.check_config()?;

        tracing::debug!(
            from = %SessionState::Uninitialized,
            to = %SessionState::Creating,
            visibility = %config.visibility,
            max_members = config.max_members,
            "creating session"
        );

        let (done, rx) = Completion::channel("create");
        self.backend
            .create_session(config.visibility, config.max_members, done)?;
        let session_id = self.await_callback("create", rx).await?;

        if let Err(e) = self.registry.claim(session_id) {
            self.leave_quietly(session_id, "create collided with an open handle");
            return Err(e);
        }
        let session = self.establish(session_id);
        if session.is_err() {
            self.registry.release(session_id);
        }
        let session = session?;

        tracing::info!(%session_id, "session created");
        Ok(session)
    }

    /// Joins an existing session.
    ///
    /// The returned handle always carries `target`, whatever id the
    /// backend's callback reports.
    ///
    /// # Errors
    /// - [`SessionError::AlreadyOpen`] if this process already holds a
    ///   handle for `target`
    /// - [`SessionError::Backend`] if the request or the ownership queries
    ///   fail
    /// - [`SessionError::CallbackNeverFires`] if the join doesn't complete
    ///   within `handshake_timeout` (including a join the backend refused).
    ///   The factory then leaves `target` so no membership is orphaned.
    pub async fn join_session(
        &self,
        target: SessionId,
    ) -> Result<Session<B>, SessionError> {
        self.check_config()?;
        self.registry.claim(target)?;

        let session = self.join_claimed(target).await;
        if session.is_err() {
            self.registry.release(target);
        }
        let session = session?;

        tracing::info!(session_id = %target, "session joined");
        Ok(session)
    }

    /// Checks whether a session advertises this factory's `app_guid`.
    pub fn is_compatible(&self, session_id: SessionId) -> Result<bool, SessionError> {
        let guid = self.backend.session_metadata(session_id, metadata::GUID)?;
        Ok(guid.as_deref() == Some(self.config.app_guid.as_str()))
    }

    async fn join_claimed(
        &self,
        target: SessionId,
    ) -> Result<Session<B>, SessionError> {
        tracing::debug!(
            from = %SessionState::Uninitialized,
            to = %SessionState::Joining,
            session_id = %target,
            "joining session"
        );

        let (done, rx) = Completion::channel("join");
        self.backend.join_session(target, done)?;
        let reported = match self.await_callback("join", rx).await {
            Ok(reported) => reported,
            Err(e) => {
                // The backend may have admitted us before the callback was
                // lost.
                self.leave_quietly(target, "join callback never fired");
                return Err(e);
            }
        };

        if reported != target {
            let anomaly = SessionError::IdentifierMismatch {
                requested: target,
                reported,
            };
            tracing::warn!(error = %anomaly, "join reported a different session id");
        }

        self.establish(target)
    }

    /// Waits for a create/join callback, bounded by `handshake_timeout`.
    ///
    /// When this returns an error the receiver has been dropped, so a
    /// callback that fires later is discarded by its `Completion`.
    async fn await_callback(
        &self,
        operation: &'static str,
        rx: oneshot::Receiver<SessionId>,
    ) -> Result<SessionId, SessionError> {
        let timeout = self.config.handshake_timeout;
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(session_id)) => Ok(session_id),
            Ok(Err(_)) => {
                tracing::warn!(operation, "backend dropped the callback without firing it");
                Err(SessionError::CallbackNeverFires { operation, timeout })
            }
            Err(_) => {
                tracing::warn!(operation, ?timeout, "backend callback timed out");
                Err(SessionError::CallbackNeverFires { operation, timeout })
            }
        }
    }

    /// Resolves ownership, publishes owner metadata, and starts the handle.
    fn establish(&self, session_id: SessionId) -> Result<Session<B>, SessionError> {
        let (owner, local) = match self.resolve_ownership(session_id) {
            Ok(resolved) => resolved,
            Err(e) => {
                self.leave_quietly(session_id, "setup failed after the callback");
                return Err(e);
            }
        };

        let is_owner = owner == local.id;
        if is_owner {
            self.publish_metadata(session_id, &local);
        }

        Ok(Session::start(SessionParts {
            session_id,
            owner,
            is_owner,
            backend: Arc::clone(&self.backend),
            relay_scope: self.config.relay_scope,
            event_capacity: self.config.event_capacity,
            hooks: self.hooks.clone(),
            registry: self.registry.clone(),
        }))
    }

    fn check_config(&self) -> Result<(), SessionError> {
        if self.config.event_capacity == 0 {
            return Err(SessionError::InvalidConfig(
                "event_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Leaves a session no handle will own. Failures are logged only.
    fn leave_quietly(&self, session_id: SessionId, reason: &'static str) {
        match self.backend.leave_session(session_id) {
            Ok(()) => tracing::debug!(%session_id, reason, "left orphaned session"),
            Err(e) => tracing::warn!(
                %session_id,
                reason,
                error = %e,
                "could not leave orphaned session"
            ),
        }
    }

    fn resolve_ownership(
        &self,
        session_id: SessionId,
    ) -> Result<(MemberId, LocalIdentity), SessionError> {
        let owner = self.backend.session_owner(session_id)?;
        let local = self.identity.local_identity()?;
        Ok((owner, local))
    }

    /// Best-effort: failures are logged, never returned.
    fn publish_metadata(&self, session_id: SessionId, local: &LocalIdentity) {
        let name = format!("{}'s Lobby", local.display_name);
        let entries = [
            (metadata::NAME, name.as_str()),
            (metadata::GUID, self.config.app_guid.as_str()),
        ];
        for (key, value) in entries {
            if let Err(source) =
                self.backend.set_session_metadata(session_id, key, value)
            {
                let err = SessionError::MetadataPublish {
                    session_id,
                    key,
                    source,
                };
                tracing::warn!(error = %err, "metadata publish failed");
            }
        }
    }
}

impl<B: MatchmakingBackend, I: IdentityProvider> std::fmt::Debug
    for SessionFactory<B, I>
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionFactory")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("hooks", &self.hooks)
            .finish()
    }
}
