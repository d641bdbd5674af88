//! In-process matchmaking backend.
//!
//! A [`LoopbackNetwork`] simulates a matchmaking service inside the current
//! process. Each participant gets its own [`LoopbackBackend`] bound to one
//! member id, and all backends created from the same network see the same
//! sessions. That is enough to run a host and several guests in one test,
//! or in the `lobby-chat` demo, without any real network activity.
//!
//! The backend also exposes fault controls (held callbacks, a forced join
//! report, metadata failures, a global "unavailable" switch) so the session
//! layer's error paths can be exercised deterministically.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use lobbyforge_protocol::{
    ChatEntry, EntryKind, LocalIdentity, MemberId, MessageNotice, SessionId,
    Visibility,
};
use rand::Rng;

use crate::{
    BackendError, Completion, IdentityProvider, MatchmakingBackend,
    NoticeSink, SubscriptionId,
};

// ---------------------------------------------------------------------------
// Shared network state
// ---------------------------------------------------------------------------

/// One simulated session.
#[derive(Debug)]
struct LoopbackSession {
    owner: MemberId,
    /// Join order. The first remaining member inherits ownership.
    members: Vec<MemberId>,
    max_members: u32,
    visibility: Visibility,
    metadata: HashMap<String, String>,
    log: Vec<ChatEntry>,
}

#[derive(Debug, Default)]
struct NetworkState {
    sessions: HashMap<SessionId, LoopbackSession>,
    /// Every live subscription, with the member it belongs to.
    subscribers: HashMap<SubscriptionId, (MemberId, NoticeSink)>,
    next_subscription: u64,
}

impl NetworkState {
    fn session(&self, id: SessionId) -> Result<&LoopbackSession, BackendError> {
        self.sessions.get(&id).ok_or(BackendError::UnknownSession(id))
    }

    fn session_mut(
        &mut self,
        id: SessionId,
    ) -> Result<&mut LoopbackSession, BackendError> {
        self.sessions
            .get_mut(&id)
            .ok_or(BackendError::UnknownSession(id))
    }

    /// Delivers a notice to every subscription owned by a member of the
    /// notice's session. Closed sinks are skipped.
    fn broadcast(&self, notice: &MessageNotice) -> usize {
        let Some(session) = self.sessions.get(&notice.session_id) else {
            return 0;
        };
        self.subscribers
            .values()
            .filter(|(member, _)| session.members.contains(member))
            .filter(|(_, sink)| sink.send(notice.clone()).is_ok())
            .count()
    }

    fn fresh_session_id(&self) -> SessionId {
        let mut rng = rand::rng();
        loop {
            let candidate = SessionId(rng.random::<u64>());
            if candidate.0 != 0 && !self.sessions.contains_key(&candidate) {
                return candidate;
            }
        }
    }
}

/// A simulated matchmaking service shared by several [`LoopbackBackend`]s.
///
/// Cloning is cheap: clones share the same sessions.
#[derive(Debug, Clone, Default)]
pub struct LoopbackNetwork {
    state: Arc<Mutex<NetworkState>>,
}

impl LoopbackNetwork {
    /// Creates an empty network.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend bound to `member`.
    pub fn backend(
        &self,
        member: MemberId,
        display_name: impl Into<String>,
    ) -> LoopbackBackend {
        LoopbackBackend {
            network: self.clone(),
            identity: LocalIdentity {
                id: member,
                display_name: display_name.into(),
            },
            faults: Mutex::new(Faults::default()),
            held: Mutex::new(Vec::new()),
            leave_calls: AtomicUsize::new(0),
        }
    }

    /// Creates a session owned by `owner` without going through a backend,
    /// as if some remote member had created it.
    pub fn seed_session(
        &self,
        session_id: SessionId,
        owner: MemberId,
        max_members: u32,
    ) {
        self.lock().sessions.insert(
            session_id,
            LoopbackSession {
                owner,
                members: vec![owner],
                max_members,
                visibility: Visibility::Public,
                metadata: HashMap::new(),
                log: Vec::new(),
            },
        );
    }

    /// Appends an entry to a session's log without notifying anyone.
    /// Returns the entry's index.
    pub fn push_entry(
        &self,
        session_id: SessionId,
        entry: ChatEntry,
    ) -> Result<u32, BackendError> {
        let mut state = self.lock();
        let session = state.session_mut(session_id)?;
        session.log.push(entry);
        Ok(log_index(&session.log))
    }

    /// Current members of a session, in join order. Empty if unknown.
    pub fn members(&self, session_id: SessionId) -> Vec<MemberId> {
        self.lock()
            .sessions
            .get(&session_id)
            .map(|s| s.members.clone())
            .unwrap_or_default()
    }

    /// The visibility a session was created with.
    pub fn visibility(&self, session_id: SessionId) -> Option<Visibility> {
        self.lock().sessions.get(&session_id).map(|s| s.visibility)
    }

    /// Returns `true` if the session exists.
    pub fn contains(&self, session_id: SessionId) -> bool {
        self.lock().sessions.contains_key(&session_id)
    }

    fn lock(&self) -> MutexGuard<'_, NetworkState> {
        // A panicking test thread must not wedge every other participant.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn log_index(log: &[ChatEntry]) -> u32 {
    u32::try_from(log.len().saturating_sub(1)).unwrap_or(u32::MAX)
}

// ---------------------------------------------------------------------------
// Per-member backend
// ---------------------------------------------------------------------------

/// Fault switches. All off by default.
#[derive(Debug, Default)]
struct Faults {
    hold_callbacks: bool,
    join_report: Option<SessionId>,
    next_session_id: Option<SessionId>,
    fail_metadata: bool,
    unavailable: bool,
}

/// One member's view of a [`LoopbackNetwork`].
///
/// Implements both [`MatchmakingBackend`] and [`IdentityProvider`], so a
/// single value can be handed to the session factory for both roles.
#[derive(Debug)]
pub struct LoopbackBackend {
    network: LoopbackNetwork,
    identity: LocalIdentity,
    faults: Mutex<Faults>,
    /// Callbacks withheld while `hold_callbacks` is on, with the id each
    /// one will report.
    held: Mutex<Vec<(Completion<SessionId>, SessionId)>>,
    leave_calls: AtomicUsize,
}

impl LoopbackBackend {
    /// Creates a backend on its own private network.
    pub fn standalone(
        member: MemberId,
        display_name: impl Into<String>,
    ) -> Self {
        LoopbackNetwork::new().backend(member, display_name)
    }

    /// The network this backend belongs to.
    pub fn network(&self) -> &LoopbackNetwork {
        &self.network
    }

    /// The member this backend acts as.
    pub fn member(&self) -> MemberId {
        self.identity.id
    }

    // -- Fault controls --------------------------------------------------

    /// While on, create/join callbacks are withheld instead of fired.
    pub fn hold_callbacks(&self, hold: bool) {
        self.faults().hold_callbacks = hold;
    }

    /// Fires every withheld callback. Returns how many reached a requester
    /// that was still waiting.
    pub fn release_held_callbacks(&self) -> usize {
        let held = std::mem::take(
            &mut *self.held.lock().unwrap_or_else(PoisonError::into_inner),
        );
        held.into_iter()
            .filter(|(done, _)| !done.is_abandoned())
            .map(|(done, reported)| done.complete(reported))
            .filter(|delivered| *delivered)
            .count()
    }

    /// Makes join callbacks report `id` instead of the requested session.
    pub fn report_join_as(&self, id: Option<SessionId>) {
        self.faults().join_report = id;
    }

    /// Makes the next created session use `id`.
    pub fn assign_next_session_id(&self, id: SessionId) {
        self.faults().next_session_id = Some(id);
    }

    /// While on, metadata writes are rejected.
    pub fn fail_metadata(&self, fail: bool) {
        self.faults().fail_metadata = fail;
    }

    /// While on, every call fails with [`BackendError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.faults().unavailable = unavailable;
    }

    /// Delivers `notice` straight to this member's subscriptions, whether
    /// or not the session exists. Returns how many sinks accepted it.
    pub fn inject_notice(&self, notice: MessageNotice) -> usize {
        let state = self.network.lock();
        state
            .subscribers
            .values()
            .filter(|(member, _)| *member == self.identity.id)
            .filter(|(_, sink)| sink.send(notice.clone()).is_ok())
            .count()
    }

    // -- Counters --------------------------------------------------------

    /// How many times `leave_session` was called on this backend.
    pub fn leave_calls(&self) -> usize {
        self.leave_calls.load(Ordering::SeqCst)
    }

    /// How many live subscriptions this member has.
    pub fn subscriber_count(&self) -> usize {
        self.network
            .lock()
            .subscribers
            .values()
            .filter(|(member, _)| *member == self.identity.id)
            .count()
    }

    // -- Internals -------------------------------------------------------

    fn faults(&self) -> MutexGuard<'_, Faults> {
        self.faults.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_available(&self) -> Result<(), BackendError> {
        if self.faults().unavailable {
            return Err(BackendError::Unavailable(
                "loopback backend switched off".into(),
            ));
        }
        Ok(())
    }

    fn deliver(&self, done: Completion<SessionId>, reported: SessionId) {
        if done.is_abandoned() {
            tracing::debug!(
                operation = done.operation(),
                %reported,
                "requester gone, skipping callback"
            );
            return;
        }
        if self.faults().hold_callbacks {
            tracing::debug!(
                operation = done.operation(),
                %reported,
                "holding callback"
            );
            self.held
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push((done, reported));
            return;
        }
        done.complete(reported);
    }
}

impl MatchmakingBackend for LoopbackBackend {
    fn create_session(
        &self,
        visibility: Visibility,
        max_members: u32,
        done: Completion<SessionId>,
    ) -> Result<(), BackendError> {
        self.check_available()?;
        if max_members == 0 {
            return Err(BackendError::Rejected(
                "a session needs room for at least one member".into(),
            ));
        }

        let forced = self.faults().next_session_id.take();
        let session_id = {
            let mut state = self.network.lock();
            let session_id =
                forced.unwrap_or_else(|| state.fresh_session_id());
            state.sessions.insert(
                session_id,
                LoopbackSession {
                    owner: self.identity.id,
                    members: vec![self.identity.id],
                    max_members,
                    visibility,
                    metadata: HashMap::new(),
                    log: Vec::new(),
                },
            );
            session_id
        };

        tracing::debug!(
            %session_id,
            member = %self.identity.id,
            %visibility,
            max_members,
            "loopback session created"
        );
        self.deliver(done, session_id);
        Ok(())
    }

    fn join_session(
        &self,
        session_id: SessionId,
        done: Completion<SessionId>,
    ) -> Result<(), BackendError> {
        self.check_available()?;

        {
            let mut state = self.network.lock();
            let Some(session) = state.sessions.get_mut(&session_id) else {
                // Matchmaking SDKs report a failed join by never firing
                // the success callback.
                tracing::debug!(%session_id, "join target missing, dropping callback");
                return Ok(());
            };
            if !session.members.contains(&self.identity.id) {
                if session.members.len() >= session.max_members as usize {
                    tracing::debug!(%session_id, "join target full, dropping callback");
                    return Ok(());
                }
                session.members.push(self.identity.id);
            }
        }

        let reported = self.faults().join_report.unwrap_or(session_id);
        self.deliver(done, reported);
        Ok(())
    }

    fn session_owner(
        &self,
        session_id: SessionId,
    ) -> Result<MemberId, BackendError> {
        self.check_available()?;
        Ok(self.network.lock().session(session_id)?.owner)
    }

    fn set_session_metadata(
        &self,
        session_id: SessionId,
        key: &str,
        value: &str,
    ) -> Result<(), BackendError> {
        self.check_available()?;
        if self.faults().fail_metadata {
            return Err(BackendError::Rejected("metadata write refused".into()));
        }
        let mut state = self.network.lock();
        let session = state.session_mut(session_id)?;
        if session.owner != self.identity.id {
            return Err(BackendError::Rejected(
                "only the owner can set metadata".into(),
            ));
        }
        session.metadata.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn session_metadata(
        &self,
        session_id: SessionId,
        key: &str,
    ) -> Result<Option<String>, BackendError> {
        self.check_available()?;
        Ok(self
            .network
            .lock()
            .session(session_id)?
            .metadata
            .get(key)
            .cloned())
    }

    fn send_message(
        &self,
        session_id: SessionId,
        payload: &[u8],
    ) -> Result<(), BackendError> {
        self.check_available()?;
        let mut state = self.network.lock();
        let session = state.session_mut(session_id)?;
        if !session.members.contains(&self.identity.id) {
            return Err(BackendError::Rejected(format!(
                "member {} is not in session {session_id}",
                self.identity.id
            )));
        }

        session.log.push(ChatEntry {
            sender: self.identity.id,
            kind: EntryKind::ChatMessage,
            data: payload.to_vec(),
        });
        let notice = MessageNotice {
            session_id,
            sender: self.identity.id,
            kind: EntryKind::ChatMessage,
            index: log_index(&session.log),
        };

        let delivered = state.broadcast(&notice);
        tracing::trace!(%session_id, index = notice.index, delivered, "chat message posted");
        Ok(())
    }

    fn fetch_message(
        &self,
        session_id: SessionId,
        index: u32,
    ) -> Result<ChatEntry, BackendError> {
        self.check_available()?;
        self.network
            .lock()
            .session(session_id)?
            .log
            .get(index as usize)
            .cloned()
            .ok_or(BackendError::MessageNotFound { session_id, index })
    }

    fn subscribe(&self, sink: NoticeSink) -> SubscriptionId {
        let mut state = self.network.lock();
        state.next_subscription += 1;
        let id = SubscriptionId::new(state.next_subscription);
        state.subscribers.insert(id, (self.identity.id, sink));
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.network.lock().subscribers.remove(&id);
    }

    fn leave_session(&self, session_id: SessionId) -> Result<(), BackendError> {
        self.leave_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        let mut state = self.network.lock();
        let session = state.session_mut(session_id)?;
        let before = session.members.len();
        session.members.retain(|m| *m != self.identity.id);
        if session.members.len() == before {
            return Err(BackendError::Rejected(format!(
                "member {} is not in session {session_id}",
                self.identity.id
            )));
        }

        let was_owner = session.owner == self.identity.id;
        match session.members.first().copied() {
            None => {
                state.sessions.remove(&session_id);
                tracing::debug!(%session_id, "last member left, session destroyed");
            }
            Some(next) if was_owner => {
                session.owner = next;
                tracing::debug!(%session_id, new_owner = %next, "ownership migrated");
            }
            Some(_) => {}
        }
        Ok(())
    }
}

impl IdentityProvider for LoopbackBackend {
    fn local_identity(&self) -> Result<LocalIdentity, BackendError> {
        self.check_available()?;
        Ok(self.identity.clone())
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;

    fn host_and_guest() -> (LoopbackBackend, LoopbackBackend) {
        let network = LoopbackNetwork::new();
        (
            network.backend(MemberId(1), "host"),
            network.backend(MemberId(2), "guest"),
        )
    }

    async fn create(backend: &LoopbackBackend) -> SessionId {
        let (done, rx) = Completion::channel("create");
        backend
            .create_session(Visibility::Public, 4, done)
            .expect("create should be issued");
        rx.await.expect("create callback should fire")
    }

    async fn join(backend: &LoopbackBackend, id: SessionId) -> SessionId {
        let (done, rx) = Completion::channel("join");
        backend.join_session(id, done).expect("join should be issued");
        rx.await.expect("join callback should fire")
    }

    // =====================================================================
    // create / join
    // =====================================================================

    #[tokio::test]
    async fn test_create_session_makes_creator_owner() {
        let (host, _) = host_and_guest();

        let id = create(&host).await;

        assert_eq!(host.session_owner(id).unwrap(), MemberId(1));
        assert_eq!(host.network().members(id), vec![MemberId(1)]);
        assert_eq!(host.network().visibility(id), Some(Visibility::Public));
    }

    #[tokio::test]
    async fn test_create_session_uses_assigned_id() {
        let (host, _) = host_and_guest();
        host.assign_next_session_id(SessionId(42));

        assert_eq!(create(&host).await, SessionId(42));
        // Only the next one.
        assert_ne!(create(&host).await, SessionId(42));
    }

    #[test]
    fn test_create_session_zero_capacity_is_rejected() {
        let (host, _) = host_and_guest();
        let (done, _rx) = Completion::channel("create");

        let result = host.create_session(Visibility::Private, 0, done);

        assert!(matches!(result, Err(BackendError::Rejected(_))));
    }

    #[tokio::test]
    async fn test_join_session_adds_member_and_reports_id() {
        let (host, guest) = host_and_guest();
        let id = create(&host).await;

        let reported = join(&guest, id).await;

        assert_eq!(reported, id);
        assert_eq!(
            host.network().members(id),
            vec![MemberId(1), MemberId(2)]
        );
    }

    #[tokio::test]
    async fn test_join_session_reports_forced_id() {
        let (host, guest) = host_and_guest();
        let id = create(&host).await;
        guest.report_join_as(Some(SessionId(1)));

        assert_eq!(join(&guest, id).await, SessionId(1));
    }

    #[tokio::test]
    async fn test_join_missing_session_drops_callback() {
        let (_, guest) = host_and_guest();
        let (done, rx) = Completion::channel("join");

        guest.join_session(SessionId(404), done).unwrap();

        assert!(rx.await.is_err(), "callback must never fire");
    }

    #[tokio::test]
    async fn test_join_full_session_drops_callback() {
        let network = LoopbackNetwork::new();
        network.seed_session(SessionId(5), MemberId(9), 1);
        let guest = network.backend(MemberId(2), "guest");
        let (done, rx) = Completion::channel("join");

        guest.join_session(SessionId(5), done).unwrap();

        assert!(rx.await.is_err());
        assert_eq!(network.members(SessionId(5)), vec![MemberId(9)]);
    }

    // =====================================================================
    // held callbacks
    // =====================================================================

    #[tokio::test]
    async fn test_held_callback_fires_on_release() {
        let (host, _) = host_and_guest();
        host.hold_callbacks(true);
        let (done, rx) = Completion::channel("create");
        host.create_session(Visibility::Public, 2, done).unwrap();

        assert_eq!(host.release_held_callbacks(), 1);
        assert!(rx.await.is_ok());
    }

    #[test]
    fn test_release_after_requester_gave_up_delivers_nothing() {
        let (host, _) = host_and_guest();
        host.hold_callbacks(true);
        let (done, rx) = Completion::channel("create");
        host.create_session(Visibility::Public, 2, done).unwrap();
        drop(rx);

        assert_eq!(host.release_held_callbacks(), 0);
    }

    // =====================================================================
    // metadata
    // =====================================================================

    #[tokio::test]
    async fn test_metadata_round_trip_for_owner() {
        let (host, guest) = host_and_guest();
        let id = create(&host).await;

        host.set_session_metadata(id, "Guid", "demo/1").unwrap();

        assert_eq!(
            guest.session_metadata(id, "Guid").unwrap().as_deref(),
            Some("demo/1")
        );
        assert_eq!(guest.session_metadata(id, "Name").unwrap(), None);
    }

    #[tokio::test]
    async fn test_metadata_write_by_non_owner_is_rejected() {
        let (host, guest) = host_and_guest();
        let id = create(&host).await;
        join(&guest, id).await;

        let result = guest.set_session_metadata(id, "Name", "mine now");

        assert!(matches!(result, Err(BackendError::Rejected(_))));
    }

    #[tokio::test]
    async fn test_fail_metadata_rejects_owner_writes() {
        let (host, _) = host_and_guest();
        let id = create(&host).await;
        host.fail_metadata(true);

        assert!(host.set_session_metadata(id, "Name", "x").is_err());
    }

    // =====================================================================
    // messaging
    // =====================================================================

    #[tokio::test]
    async fn test_send_message_notifies_every_member() {
        let (host, guest) = host_and_guest();
        let id = create(&host).await;
        join(&guest, id).await;
        let (host_tx, mut host_rx) = mpsc::unbounded_channel();
        let (guest_tx, mut guest_rx) = mpsc::unbounded_channel();
        host.subscribe(host_tx);
        guest.subscribe(guest_tx);

        guest.send_message(id, b"hello").unwrap();

        let expected = MessageNotice {
            session_id: id,
            sender: MemberId(2),
            kind: EntryKind::ChatMessage,
            index: 0,
        };
        assert_eq!(host_rx.recv().await.unwrap(), expected);
        assert_eq!(guest_rx.recv().await.unwrap(), expected);
        assert_eq!(host.fetch_message(id, 0).unwrap().data, b"hello");
    }

    #[tokio::test]
    async fn test_send_message_from_non_member_is_rejected() {
        let (host, guest) = host_and_guest();
        let id = create(&host).await;

        let result = guest.send_message(id, b"let me in");

        assert!(matches!(result, Err(BackendError::Rejected(_))));
    }

    #[tokio::test]
    async fn test_fetch_message_out_of_range_is_not_found() {
        let (host, _) = host_and_guest();
        let id = create(&host).await;

        let result = host.fetch_message(id, 3);

        assert_eq!(
            result,
            Err(BackendError::MessageNotFound { session_id: id, index: 3 })
        );
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery() {
        let (host, _) = host_and_guest();
        let id = create(&host).await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sub = host.subscribe(tx);
        assert_eq!(host.subscriber_count(), 1);

        host.unsubscribe(sub);
        host.send_message(id, b"anyone?").unwrap();

        assert_eq!(host.subscriber_count(), 0);
        // The sink was dropped with the subscription, so the channel is
        // closed and empty.
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn test_inject_notice_reaches_only_this_member() {
        let (host, guest) = host_and_guest();
        let (host_tx, mut host_rx) = mpsc::unbounded_channel();
        let (guest_tx, mut guest_rx) = mpsc::unbounded_channel();
        host.subscribe(host_tx);
        guest.subscribe(guest_tx);

        let delivered = host.inject_notice(MessageNotice {
            session_id: SessionId(77),
            sender: MemberId(5),
            kind: EntryKind::Typing,
            index: 0,
        });

        assert_eq!(delivered, 1);
        assert!(host_rx.try_recv().is_ok());
        assert!(guest_rx.try_recv().is_err());
    }

    // =====================================================================
    // leave
    // =====================================================================

    #[tokio::test]
    async fn test_leave_migrates_ownership_to_next_member() {
        let (host, guest) = host_and_guest();
        let id = create(&host).await;
        join(&guest, id).await;

        host.leave_session(id).unwrap();

        assert_eq!(guest.session_owner(id).unwrap(), MemberId(2));
        assert_eq!(host.leave_calls(), 1);
    }

    #[tokio::test]
    async fn test_last_member_leaving_destroys_session() {
        let (host, _) = host_and_guest();
        let id = create(&host).await;

        host.leave_session(id).unwrap();

        assert!(!host.network().contains(id));
        assert!(matches!(
            host.leave_session(id),
            Err(BackendError::UnknownSession(_))
        ));
        assert_eq!(host.leave_calls(), 2, "failed leaves are counted too");
    }

    // =====================================================================
    // availability / identity
    // =====================================================================

    #[test]
    fn test_unavailable_backend_fails_every_call() {
        let (host, _) = host_and_guest();
        host.set_unavailable(true);
        let (done, _rx) = Completion::channel("create");

        assert!(matches!(
            host.create_session(Visibility::Public, 2, done),
            Err(BackendError::Unavailable(_))
        ));
        assert!(host.local_identity().is_err());
        assert!(host.session_owner(SessionId(1)).is_err());
    }

    #[test]
    fn test_local_identity_reports_bound_member() {
        let backend = LoopbackBackend::standalone(MemberId(11), "ferris");

        let identity = backend.local_identity().unwrap();

        assert_eq!(identity.id, MemberId(11));
        assert_eq!(identity.display_name, "ferris");
    }
}
