//! The chat relay: backend notices in, session events out.
//!
//! Each session runs one relay task. The backend pushes a
//! [`MessageNotice`] for every chat entry posted in any session the local
//! member belongs to; the relay filters them by [`RelayScope`], fetches
//! the full entry, and emits a [`SessionEvent::Message`].
//!
//! Notices are handled one at a time in arrival order, so events come out
//! in the order the backend delivered them. Forwarding is best-effort: a
//! notice whose entry can't be fetched is logged and dropped.

use std::sync::{Arc, Mutex, PoisonError};

use lobbyforge_backend::MatchmakingBackend;
use lobbyforge_protocol::{MessageNotice, SessionId};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

use crate::RelayScope;
use crate::event::{EventSender, SessionEvent};

/// Shared open/closed flag. `close()` flips it under the lock, and the
/// relay emits only while holding the lock, so nothing is emitted once
/// `close()` has returned.
pub(crate) type Gate = Arc<Mutex<bool>>;

pub(crate) struct Relay<B: MatchmakingBackend> {
    pub(crate) session_id: SessionId,
    pub(crate) backend: Arc<B>,
    pub(crate) scope: RelayScope,
    pub(crate) gate: Gate,
    pub(crate) notices: mpsc::UnboundedReceiver<MessageNotice>,
    pub(crate) events: EventSender,
}

/// What the loop does after an emission attempt.
enum Flow {
    Continue,
    Stop,
}

impl<B: MatchmakingBackend> Relay<B> {
    /// Spawns the relay loop on the current runtime.
    pub(crate) fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) {
        tracing::debug!(session_id = %self.session_id, "relay started");

        while let Some(notice) = self.notices.recv().await {
            if !self.is_open() {
                break;
            }
            let Some(event) = self.translate(notice) else {
                continue;
            };
            if let Flow::Stop = self.emit(event) {
                break;
            }
        }

        tracing::debug!(session_id = %self.session_id, "relay stopped");
    }

    fn is_open(&self) -> bool {
        *self.gate.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Hands `event` to the consumer without waiting. A full buffer drops
    /// the event.
    fn emit(&self, event: SessionEvent) -> Flow {
        let open = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
        // The fetch may have raced a close.
        if !*open {
            return Flow::Stop;
        }
        match self.events.try_send(event) {
            Ok(()) => Flow::Continue,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(
                    session_id = %self.session_id,
                    "event buffer full, dropping message"
                );
                Flow::Continue
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(
                    session_id = %self.session_id,
                    "event consumer gone, relay stopping"
                );
                Flow::Stop
            }
        }
    }

    /// Turns a notice into an event, or `None` if it should be dropped.
    fn translate(&self, notice: MessageNotice) -> Option<SessionEvent> {
        if self.scope == RelayScope::PerSession
            && notice.session_id != self.session_id
        {
            tracing::trace!(
                session_id = %self.session_id,
                source = %notice.session_id,
                "notice for another session, skipping"
            );
            return None;
        }

        match self.backend.fetch_message(notice.session_id, notice.index) {
            Ok(entry) => Some(SessionEvent::Message {
                entry,
                sender: notice.sender,
            }),
            Err(e) => {
                tracing::warn!(
                    session_id = %self.session_id,
                    source = %notice.session_id,
                    index = notice.index,
                    error = %e,
                    "could not fetch chat entry, dropping notice"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use lobbyforge_backend::{LoopbackBackend, LoopbackNetwork};
    use lobbyforge_protocol::{ChatEntry, EntryKind, MemberId};

    use super::*;
    use crate::event::SessionEvents;

    struct Fixture {
        network: LoopbackNetwork,
        notices: mpsc::UnboundedSender<MessageNotice>,
        events: SessionEvents,
        gate: Gate,
        relay: Relay<LoopbackBackend>,
    }

    /// A relay for session 10 with two entries in sessions 10 and 20.
    fn fixture(scope: RelayScope, capacity: usize) -> Fixture {
        let network = LoopbackNetwork::new();
        network.seed_session(SessionId(10), MemberId(1), 4);
        network.seed_session(SessionId(20), MemberId(1), 4);
        for id in [10, 20] {
            network
                .push_entry(SessionId(id), entry(MemberId(3), b"hi"))
                .unwrap();
        }
        let backend = Arc::new(network.backend(MemberId(1), "host"));
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();
        let (event_tx, events) = SessionEvents::channel(capacity);
        let gate = Arc::new(Mutex::new(true));
        let relay = Relay {
            session_id: SessionId(10),
            backend,
            scope,
            gate: Arc::clone(&gate),
            notices: notice_rx,
            events: event_tx,
        };
        Fixture {
            network,
            notices: notice_tx,
            events,
            gate,
            relay,
        }
    }

    fn entry(sender: MemberId, data: &[u8]) -> ChatEntry {
        ChatEntry {
            sender,
            kind: EntryKind::ChatMessage,
            data: data.to_vec(),
        }
    }

    fn notice(session: u64, index: u32) -> MessageNotice {
        MessageNotice {
            session_id: SessionId(session),
            sender: MemberId(3),
            kind: EntryKind::ChatMessage,
            index,
        }
    }

    #[test]
    fn test_translate_own_session_emits_fetched_entry() {
        let f = fixture(RelayScope::PerSession, 8);

        let event = f.relay.translate(notice(10, 0));

        assert_eq!(
            event,
            Some(SessionEvent::Message {
                entry: entry(MemberId(3), b"hi"),
                sender: MemberId(3),
            })
        );
    }

    #[test]
    fn test_translate_per_session_skips_other_sessions() {
        let f = fixture(RelayScope::PerSession, 8);

        assert_eq!(f.relay.translate(notice(20, 0)), None);
    }

    #[test]
    fn test_translate_global_relays_other_sessions() {
        let f = fixture(RelayScope::Global, 8);

        assert!(f.relay.translate(notice(20, 0)).is_some());
    }

    #[test]
    fn test_translate_fetch_failure_drops_notice() {
        let f = fixture(RelayScope::PerSession, 8);

        assert_eq!(f.relay.translate(notice(10, 99)), None);
    }

    #[tokio::test]
    async fn test_run_preserves_delivery_order() {
        let mut f = fixture(RelayScope::PerSession, 8);
        f.network
            .push_entry(SessionId(10), entry(MemberId(4), b"second"))
            .unwrap();
        let handle = f.relay.spawn();

        f.notices.send(notice(10, 0)).unwrap();
        f.notices.send(notice(10, 1)).unwrap();
        drop(f.notices);
        handle.await.unwrap();

        let mut payloads = Vec::new();
        while let Some(SessionEvent::Message { entry, .. }) = f.events.try_recv()
        {
            payloads.push(entry.data);
        }
        assert_eq!(payloads, vec![b"hi".to_vec(), b"second".to_vec()]);
    }

    #[tokio::test]
    async fn test_run_stops_when_deactivated() {
        let mut f = fixture(RelayScope::PerSession, 8);
        *f.gate.lock().unwrap() = false;
        let handle = f.relay.spawn();

        f.notices.send(notice(10, 0)).unwrap();
        handle.await.unwrap();

        assert_eq!(f.events.try_recv(), None);
    }

    #[tokio::test]
    async fn test_run_full_buffer_drops_instead_of_queueing() {
        let mut f = fixture(RelayScope::PerSession, 2);
        for _ in 0..3 {
            f.network
                .push_entry(SessionId(10), entry(MemberId(4), b"more"))
                .unwrap();
        }
        let handle = f.relay.spawn();

        for index in 0..4 {
            f.notices.send(notice(10, index)).unwrap();
        }
        drop(f.notices);
        handle.await.unwrap();

        let mut received = 0;
        while f.events.try_recv().is_some() {
            received += 1;
        }
        assert_eq!(received, 2, "only the buffer's worth is kept");
    }

    #[test]
    fn test_emit_after_gate_closed_stops() {
        let mut f = fixture(RelayScope::PerSession, 8);
        *f.gate.lock().unwrap() = false;

        let event = f.relay.translate(notice(10, 0)).unwrap();

        assert!(matches!(f.relay.emit(event), Flow::Stop));
        assert_eq!(f.events.try_recv(), None);
    }
}
