//! One-shot completion tokens for callback-style backend requests.
//!
//! Matchmaking backends answer "create" and "join" requests through a
//! callback that fires some time later, or never. A [`Completion`] is the
//! callback: the session layer creates one, hands it to the backend along
//! with the request, and awaits the paired receiver.
//!
//! The token is consumed by [`Completion::complete`], so the type system
//! guarantees it fires at most once. If the waiting side has already given
//! up (timed out, or was dropped), completing is a harmless no-op that
//! returns `false`. A late callback therefore can never resurrect a request
//! the caller abandoned.

use tokio::sync::oneshot;

/// A single-use callback handed to the backend.
#[derive(Debug)]
pub struct Completion<T> {
    operation: &'static str,
    tx: oneshot::Sender<T>,
}

impl<T> Completion<T> {
    /// Creates a token and the receiver the requester awaits.
    ///
    /// `operation` names the request ("create", "join") in log output.
    pub fn channel(operation: &'static str) -> (Self, oneshot::Receiver<T>) {
        let (tx, rx) = oneshot::channel();
        (Self { operation, tx }, rx)
    }

    /// Fires the callback with `value`.
    ///
    /// Returns `true` if the requester received it, `false` if the
    /// requester already stopped waiting. In the `false` case the value is
    /// dropped.
    pub fn complete(self, value: T) -> bool {
        let delivered = self.tx.send(value).is_ok();
        if !delivered {
            tracing::debug!(
                operation = self.operation,
                "late completion discarded, requester stopped waiting"
            );
        }
        delivered
    }

    /// Returns `true` if the requester has stopped waiting.
    ///
    /// Backends can use this to skip work for abandoned requests.
    pub fn is_abandoned(&self) -> bool {
        self.tx.is_closed()
    }

    /// The operation name this token was created for.
    pub fn operation(&self) -> &'static str {
        self.operation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_complete_delivers_value_to_receiver() {
        let (done, rx) = Completion::channel("create");

        assert!(done.complete(42u64));
        assert_eq!(rx.await.unwrap(), 42);
    }

    #[test]
    fn test_complete_after_receiver_dropped_returns_false() {
        let (done, rx) = Completion::<u64>::channel("join");
        drop(rx);

        assert!(done.is_abandoned());
        assert!(!done.complete(7), "nobody is listening anymore");
    }

    #[tokio::test]
    async fn test_dropped_token_closes_receiver() {
        // A backend that drops the token without firing it is the same as
        // a callback that will never fire. The receiver sees that at once.
        let (done, rx) = Completion::<u64>::channel("join");
        drop(done);

        assert!(rx.await.is_err());
    }

    #[test]
    fn test_operation_name_is_kept() {
        let (done, _rx) = Completion::<u64>::channel("create");
        assert_eq!(done.operation(), "create");
        assert!(!done.is_abandoned());
    }
}
