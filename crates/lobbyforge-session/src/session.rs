//! The session handle: one live membership in a backend session.
//!
//! A [`Session`] is what the factory hands back after a successful create
//! or join. It knows:
//! - WHICH session it is (`session_id`)
//! - WHO owned it when it was established (`owner`, `is_owner`)
//! - WHETHER it is still usable (`state`)
//!
//! and it owns the backend subscription that feeds its event stream.
//!
//! # Closing
//!
//! `close()` unsubscribes, stops the relay, and leaves the backend
//! session. It runs at most once no matter how it is reached: an explicit
//! call, the shutdown hook, or `Drop`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use lobbyforge_backend::{MatchmakingBackend, SubscriptionId};
use lobbyforge_protocol::{Codec, MemberId, SessionId};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::event::{SessionEvent, SessionEvents};
use crate::hooks::HookId;
use crate::registry::LiveSession;
use crate::relay::{Gate, Relay};
use crate::{
    RelayScope, SessionError, SessionRegistry, SessionState, ShutdownHooks,
};

/// Everything a handle needs from its factory.
pub(crate) struct SessionParts<B: MatchmakingBackend> {
    pub(crate) session_id: SessionId,
    pub(crate) owner: MemberId,
    pub(crate) is_owner: bool,
    pub(crate) backend: Arc<B>,
    pub(crate) relay_scope: RelayScope,
    pub(crate) event_capacity: usize,
    pub(crate) hooks: ShutdownHooks,
    pub(crate) registry: SessionRegistry,
}

/// State shared between the handle and its shutdown hook.
struct SessionInner<B: MatchmakingBackend> {
    session_id: SessionId,
    owner: MemberId,
    is_owner: bool,
    backend: Arc<B>,
    subscription: SubscriptionId,
    /// Guards the one-way trip to `Closed`.
    state: Mutex<SessionState>,
    /// Held by the relay across each emission.
    gate: Gate,
    relay: Mutex<Option<JoinHandle<()>>>,
    hook: Mutex<Option<HookId>>,
    hooks: ShutdownHooks,
    registry: SessionRegistry,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<B: MatchmakingBackend> SessionInner<B> {
    fn state(&self) -> SessionState {
        *lock(&self.state)
    }

    fn close(&self) -> Result<(), SessionError> {
        {
            let mut state = lock(&self.state);
            if !state.can_transition_to(SessionState::Closed) {
                tracing::trace!(session_id = %self.session_id, "already closed");
                return Ok(());
            }
            *state = SessionState::Closed;
        }

        // Flipped under the relay's emission lock.
        *self.gate.lock().unwrap_or_else(PoisonError::into_inner) = false;
        self.backend.unsubscribe(self.subscription);
        if let Some(relay) = lock(&self.relay).take() {
            relay.abort();
        }
        if let Some(hook) = lock(&self.hook).take() {
            self.hooks.unregister(hook);
        }
        self.registry.release(self.session_id);

        match self.backend.leave_session(self.session_id) {
            Ok(()) => {
                tracing::info!(session_id = %self.session_id, "session closed");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(
                    session_id = %self.session_id,
                    error = %e,
                    "session closed locally but leave failed"
                );
                Err(e.into())
            }
        }
    }
}

/// A live membership in a backend session.
///
/// Created only by [`SessionFactory`](crate::SessionFactory). Closed
/// explicitly with [`close`](Self::close), by the shutdown hooks, or when
/// dropped.
pub struct Session<B: MatchmakingBackend> {
    inner: Arc<SessionInner<B>>,
    events: Option<SessionEvents>,
}

impl<B: MatchmakingBackend> Session<B> {
    /// Subscribes, registers the shutdown hook, starts the relay, and
    /// queues the `Connect` event.
    ///
    /// Must be called from within a Tokio runtime (the relay is spawned).
    pub(crate) fn start(parts: SessionParts<B>) -> Self {
        let SessionParts {
            session_id,
            owner,
            is_owner,
            backend,
            relay_scope,
            event_capacity,
            hooks,
            registry,
        } = parts;

        // The relay drains this without blocking; the bound sits on events.
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();
        let subscription = backend.subscribe(notice_tx);
        let gate: Gate = Arc::new(Mutex::new(true));

        let inner = Arc::new(SessionInner {
            session_id,
            owner,
            is_owner,
            backend: Arc::clone(&backend),
            subscription,
            state: Mutex::new(SessionState::Active),
            gate: Arc::clone(&gate),
            relay: Mutex::new(None),
            hook: Mutex::new(None),
            hooks: hooks.clone(),
            registry: registry.clone(),
        });

        // The hook holds a weak reference: a registered hook must not keep
        // a dropped session alive.
        let weak: Weak<SessionInner<B>> = Arc::downgrade(&inner);
        let hook = hooks.register(move || {
            if let Some(inner) = weak.upgrade() {
                if let Err(e) = inner.close() {
                    tracing::warn!(error = %e, "close from shutdown hook failed");
                }
            }
        });
        *lock(&inner.hook) = Some(hook);

        let (event_tx, events) = SessionEvents::channel(event_capacity);
        // Queued before the relay starts, so it is always first. The
        // buffer is fresh and non-empty, so this can't fail.
        let _ = event_tx.try_send(SessionEvent::Connect(session_id));

        let relay = Relay {
            session_id,
            backend,
            scope: relay_scope,
            gate,
            notices: notice_rx,
            events: event_tx,
        }
        .spawn();
        *lock(&inner.relay) = Some(relay);

        registry.activate(LiveSession {
            session_id,
            owner,
            is_owner,
        });

        tracing::info!(%session_id, %owner, is_owner, %subscription, "session active");

        Self {
            inner,
            events: Some(events),
        }
    }

    /// The backend identifier of this session.
    pub fn session_id(&self) -> SessionId {
        self.inner.session_id
    }

    /// The owner reported by the backend when this handle was established.
    ///
    /// This is a snapshot: if ownership later moves at the backend, this
    /// value doesn't change.
    pub fn owner(&self) -> MemberId {
        self.inner.owner
    }

    /// Whether the local member owned the session at construction.
    pub fn is_owner(&self) -> bool {
        self.inner.is_owner
    }

    /// The current lifecycle state: `Active` or `Closed`.
    pub fn state(&self) -> SessionState {
        self.inner.state()
    }

    /// Returns `true` until the session is closed.
    pub fn is_active(&self) -> bool {
        self.state().is_active()
    }

    /// Takes the event stream. Returns `None` after the first call.
    ///
    /// The first event is always [`SessionEvent::Connect`].
    pub fn take_events(&mut self) -> Option<SessionEvents> {
        self.events.take()
    }

    /// Broadcasts an opaque payload to every current member, including
    /// this one. No acknowledgment, no retry.
    ///
    /// # Errors
    /// - [`SessionError::Closed`] if the session was closed
    /// - [`SessionError::Backend`] if the backend refused the send
    pub fn send_message(&self, payload: &[u8]) -> Result<(), SessionError> {
        if !self.is_active() {
            return Err(SessionError::Closed(self.inner.session_id));
        }
        self.inner
            .backend
            .send_message(self.inner.session_id, payload)?;
        tracing::trace!(
            session_id = %self.inner.session_id,
            bytes = payload.len(),
            "message sent"
        );
        Ok(())
    }

    /// Encodes `value` with `codec` and sends it.
    pub fn send_encoded<T, C>(
        &self,
        codec: &C,
        value: &T,
    ) -> Result<(), SessionError>
    where
        T: Serialize,
        C: Codec,
    {
        let payload = codec.encode(value)?;
        self.send_message(&payload)
    }

    /// Unsubscribes, stops relaying, and leaves the backend session.
    ///
    /// Calling this more than once is fine: later calls do nothing and
    /// return `Ok(())`.
    ///
    /// # Errors
    /// Returns [`SessionError::Backend`] if the backend's leave call
    /// failed. The handle is closed locally either way.
    pub fn close(&self) -> Result<(), SessionError> {
        self.inner.close()
    }
}

impl<B: MatchmakingBackend> Drop for Session<B> {
    fn drop(&mut self) {
        if let Err(e) = self.inner.close() {
            tracing::warn!(error = %e, "close on drop failed");
        }
    }
}

impl<B: MatchmakingBackend> std::fmt::Debug for Session<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("session_id", &self.inner.session_id)
            .field("owner", &self.inner.owner)
            .field("is_owner", &self.inner.is_owner)
            .field("state", &self.inner.state())
            .finish()
    }
}
