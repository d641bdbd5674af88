use std::sync::Arc;
use std::time::Duration;

use lobbyforge::prelude::*;
use lobbyforge::shutdown;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Chat types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatLine {
    pub author: String,
    pub text: String,
}

/// The guest is a tiny bot: it answers greetings and questions.
fn reply_to(line: &ChatLine, me: &str) -> Option<ChatLine> {
    if line.author == me {
        return None;
    }
    let text = line.text.to_lowercase();
    let answer = if text.starts_with("hi") || text.starts_with("hello") {
        format!("hey {}!", line.author)
    } else if text.ends_with('?') {
        "no idea, ask the host".to_string()
    } else {
        return None;
    };
    Some(ChatLine {
        author: me.to_string(),
        text: answer,
    })
}

// ---------------------------------------------------------------------------
// Participants
// ---------------------------------------------------------------------------

type Factory = SessionFactory<LoopbackBackend, LoopbackBackend>;

fn participant(
    network: &LoopbackNetwork,
    member: MemberId,
    name: &str,
    hooks: &ShutdownHooks,
) -> Factory {
    let backend = Arc::new(network.backend(member, name));
    SessionFactory::new(
        Arc::clone(&backend),
        backend,
        FactoryConfig::default().with_app_guid("lobby-chat/1"),
    )
    .with_hooks(hooks.clone())
}

/// Relays the bot's replies until its session closes.
async fn run_bot(session: Arc<Session<LoopbackBackend>>, mut events: SessionEvents) {
    let me = "bo";
    while let Some(event) = events.recv().await {
        let SessionEvent::Message { entry, sender } = event else {
            continue;
        };
        let line: ChatLine = match entry.decode(&JsonCodec) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(%sender, error = %e, "unreadable chat line");
                continue;
            }
        };
        if let Some(reply) = reply_to(&line, me) {
            if let Err(e) = session.send_encoded(&JsonCodec, &reply) {
                tracing::warn!(error = %e, "bot could not reply");
                break;
            }
        }
    }
}

/// Prints every chat line the host sees, until `expected` lines arrived.
async fn print_transcript(events: &mut SessionEvents, expected: usize) -> Vec<ChatLine> {
    let mut transcript = Vec::new();
    while transcript.len() < expected {
        let next = tokio::time::timeout(Duration::from_secs(2), events.recv()).await;
        match next {
            Ok(Some(SessionEvent::Connect(id))) => println!("* connected to session {id}"),
            Ok(Some(SessionEvent::Message { entry, .. })) => {
                if let Ok(line) = entry.decode::<ChatLine, _>(&JsonCodec) {
                    println!("<{}> {}", line.author, line.text);
                    transcript.push(line);
                }
            }
            Ok(None) | Err(_) => break,
        }
    }
    transcript
}

/// Host opens a lobby, the bot joins, they chat, both leave.
async fn run_lobby(
    network: &LoopbackNetwork,
    hooks: &ShutdownHooks,
) -> Result<Vec<ChatLine>, LobbyforgeError> {
    let host = participant(network, MemberId(1), "ana", hooks);
    let guest = participant(network, MemberId(2), "bo", hooks);

    let mut hosted = host
        .create_session(CreateConfig {
            visibility: Visibility::FriendsOnly,
            max_members: 4,
        })
        .await?;
    let session_id = hosted.session_id();
    let mut host_events = hosted.take_events().ok_or(SessionError::Closed(session_id))?;

    if !guest.is_compatible(session_id)? {
        tracing::warn!(%session_id, "lobby advertises a different app");
    }
    let mut joined = guest.join_session(session_id).await?;
    let guest_events = joined.take_events().ok_or(SessionError::Closed(session_id))?;
    let joined = Arc::new(joined);
    let bot = tokio::spawn(run_bot(Arc::clone(&joined), guest_events));

    for text in ["hello everyone", "anyone up for a match?", "see you"] {
        hosted.send_encoded(
            &JsonCodec,
            &ChatLine {
                author: "ana".into(),
                text: text.into(),
            },
        )?;
    }

    // Three host lines plus two bot replies.
    let transcript = print_transcript(&mut host_events, 5).await;

    joined.close()?;
    hosted.close()?;
    bot.abort();
    Ok(transcript)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    lobbyforge::logging::init("info");

    let network = LoopbackNetwork::new();
    let hooks = ShutdownHooks::new();

    tokio::select! {
        result = run_lobby(&network, &hooks) => {
            let transcript = result?;
            println!("* {} lines exchanged", transcript.len());
        }
        closed = shutdown::close_on_ctrl_c(&hooks) => {
            println!("* interrupted, closed {} session(s)", closed?);
        }
    }
    Ok(())
}
