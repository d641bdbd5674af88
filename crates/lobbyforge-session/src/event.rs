//! Events a session handle emits to its consumer.

use lobbyforge_protocol::{ChatEntry, MemberId, SessionId};
use tokio::sync::mpsc;

/// Something that happened on a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The handle is ready. Always the first event, emitted exactly once.
    Connect(SessionId),

    /// A chat entry was posted. `entry` is exactly what the backend
    /// returned for the notice; `sender` is the member the notice named.
    Message { entry: ChatEntry, sender: MemberId },
}

pub(crate) type EventSender = mpsc::Sender<SessionEvent>;

/// The receiving end of a session's events.
///
/// Obtained once from [`Session::take_events`](crate::Session::take_events).
/// Yields `None` after the session is closed and every event emitted
/// before the close has been received.
///
/// The buffer is bounded by
/// [`FactoryConfig::event_capacity`](crate::FactoryConfig::event_capacity).
/// While it is full, new events are dropped rather than queued.
#[derive(Debug)]
pub struct SessionEvents {
    rx: mpsc::Receiver<SessionEvent>,
}

impl SessionEvents {
    /// `capacity` must be non-zero.
    pub(crate) fn channel(capacity: usize) -> (EventSender, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self { rx })
    }

    /// Waits for the next event.
    pub async fn recv(&mut self) -> Option<SessionEvent> {
        self.rx.recv().await
    }

    /// Returns the next event if one is already queued.
    pub fn try_recv(&mut self) -> Option<SessionEvent> {
        self.rx.try_recv().ok()
    }
}
