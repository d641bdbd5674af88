//! End-to-end use of the facade: everything through `lobbyforge::prelude`,
//! every error converted by `?` into `LobbyforgeError`.

use std::sync::Arc;
use std::time::Duration;

use lobbyforge::prelude::*;
use lobbyforge::shutdown;
use serde::{Deserialize, Serialize};

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Ready {
    slot: u8,
}

type Factory = SessionFactory<LoopbackBackend, LoopbackBackend>;

fn factory(backend: &Arc<LoopbackBackend>, hooks: &ShutdownHooks) -> Factory {
    SessionFactory::new(
        Arc::clone(backend),
        Arc::clone(backend),
        FactoryConfig::default(),
    )
    .with_hooks(hooks.clone())
}

async fn next_message(events: &mut SessionEvents) -> Option<ChatEntry> {
    loop {
        match tokio::time::timeout(Duration::from_secs(1), events.recv()).await {
            Ok(Some(SessionEvent::Message { entry, .. })) => return Some(entry),
            Ok(Some(SessionEvent::Connect(_))) => continue,
            Ok(None) | Err(_) => return None,
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_host_and_guest_exchange_typed_message() -> Result<(), LobbyforgeError> {
    let network = LoopbackNetwork::new();
    let hooks = ShutdownHooks::new();
    let host_backend = Arc::new(network.backend(MemberId(1), "ana"));
    let guest_backend = Arc::new(network.backend(MemberId(2), "bo"));
    let host = factory(&host_backend, &hooks);
    let guest = factory(&guest_backend, &hooks);

    let hosted = host.create_session(CreateConfig::default()).await?;
    let session_id: SessionId = hosted.session_id().to_string().parse()?;
    let mut joined = guest.join_session(session_id).await?;
    let mut events = joined.take_events().expect("fresh handle");

    hosted.send_encoded(&JsonCodec, &Ready { slot: 2 })?;

    let entry = next_message(&mut events).await.expect("message relayed");
    let ready: Ready = entry.decode(&JsonCodec)?;
    assert_eq!(ready, Ready { slot: 2 });

    joined.close()?;
    hosted.close()?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_signal_closes_every_factory_session() {
    let network = LoopbackNetwork::new();
    let hooks = ShutdownHooks::new();
    let host_backend = Arc::new(network.backend(MemberId(1), "ana"));
    let guest_backend = Arc::new(network.backend(MemberId(2), "bo"));
    let host = factory(&host_backend, &hooks);
    let guest = factory(&guest_backend, &hooks);
    let hosted = host.create_session(CreateConfig::default()).await.unwrap();
    let joined = guest.join_session(hosted.session_id()).await.unwrap();

    let ran = shutdown::close_on(async {}, &hooks).await;

    assert_eq!(ran, 2);
    assert_eq!(hosted.state(), SessionState::Closed);
    assert_eq!(joined.state(), SessionState::Closed);
    assert!(!network.contains(hosted.session_id()));
}

#[test]
fn test_malformed_session_id_converts_to_protocol_error() {
    let parsed: Result<SessionId, LobbyforgeError> =
        "lobby-7".parse::<SessionId>().map_err(Into::into);

    assert!(matches!(parsed, Err(LobbyforgeError::Protocol(_))));
}
