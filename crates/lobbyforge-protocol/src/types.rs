//! Core types shared by every Lobbyforge layer.
//!
//! These are the values that cross the boundary between the matchmaking
//! backend and the local session core: identifiers, visibility modes,
//! chat notifications, and the chat entries they point at.
//!
//! Nothing here performs I/O. The backend crate moves these values around;
//! the session crate interprets them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// The backend-assigned identifier of a session.
///
/// Backends hand these out as 64-bit values, but callers usually see them
/// as strings (in invite links, logs, config files). `Display` and
/// `FromStr` convert between the two forms losslessly, so
/// `"42".parse::<SessionId>()` gives back `SessionId(42)` and
/// `SessionId(42).to_string()` gives back `"42"`.
///
/// Like `MemberId`, this is a newtype: you cannot pass a member id where a
/// session id is expected, even though both are `u64` underneath.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(SessionId).map_err(|_| {
            ProtocolError::InvalidIdentifier(format!(
                "session id must be a 64-bit unsigned integer, got {s:?}"
            ))
        })
    }
}

/// The durable identifier of a session member (a player account).
///
/// Owner comparisons are plain `==` on this type, which is why it derives
/// `PartialEq` and `Eq`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(pub u64);

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MemberId {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(MemberId).map_err(|_| {
            ProtocolError::InvalidIdentifier(format!(
                "member id must be a 64-bit unsigned integer, got {s:?}"
            ))
        })
    }
}

/// Who the local process is, as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalIdentity {
    /// The local member's durable identifier.
    pub id: MemberId,
    /// Human-readable name, used to label sessions this member owns.
    pub display_name: String,
}

// ---------------------------------------------------------------------------
// Visibility
// ---------------------------------------------------------------------------

/// Who can discover and join a session.
///
/// `#[serde(rename_all = "snake_case")]` gives `"friends_only"` in JSON,
/// which reads naturally in config files.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Listed and joinable by anyone.
    #[default]
    Public,

    /// Listed and joinable by friends of current members only.
    FriendsOnly,

    /// Not listed. Joinable by anyone who knows the id.
    Private,

    /// Not listed. Joinable only with an invite.
    InviteOnly,
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Public => write!(f, "public"),
            Self::FriendsOnly => write!(f, "friends-only"),
            Self::Private => write!(f, "private"),
            Self::InviteOnly => write!(f, "invite-only"),
        }
    }
}

// ---------------------------------------------------------------------------
// Metadata keys
// ---------------------------------------------------------------------------

/// Well-known keys in a session's key-value metadata.
///
/// The owner publishes both right after creating a session. Other members
/// read [`GUID`](metadata::GUID) to decide whether a session belongs to a
/// compatible application before joining it.
pub mod metadata {
    /// Human-readable session name.
    pub const NAME: &str = "Name";

    /// Application/protocol identifier.
    pub const GUID: &str = "Guid";
}

// ---------------------------------------------------------------------------
// Chat entries and notices
// ---------------------------------------------------------------------------

/// The kind of a chat entry, as the backend classifies it.
///
/// Most traffic is [`EntryKind::ChatMessage`]. The other variants are
/// backend-generated entries that share the same stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// A payload sent by a member.
    ChatMessage,
    /// A member started typing.
    Typing,
    /// A member entered the session.
    Entered,
    /// A member left the session.
    Left,
    /// A member was removed by the backend.
    Kicked,
    /// Any kind this crate doesn't model, carried as the raw code.
    Other(u8),
}

/// A lightweight "new message available" signal from the backend.
///
/// The backend's chat stream doesn't carry message bodies, only where to
/// find them. The relay turns a notice into a full [`ChatEntry`] by asking
/// the backend for `(session_id, index)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageNotice {
    /// The session the message was posted to.
    pub session_id: SessionId,
    /// Who posted it.
    pub sender: MemberId,
    /// What kind of entry it is.
    pub kind: EntryKind,
    /// Position in the session's chat log.
    pub index: u32,
}

/// A full chat entry fetched from the backend.
///
/// The session core never mutates these: what the backend returns is
/// exactly what consumers receive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEntry {
    /// Who posted the entry.
    pub sender: MemberId,
    /// What kind of entry it is.
    pub kind: EntryKind,
    /// The opaque payload bytes.
    pub data: Vec<u8>,
}

impl ChatEntry {
    /// Decodes the payload into a typed value with the given codec.
    ///
    /// Counterpart of `Session::send_encoded` on the sending side.
    pub fn decode<T, C>(&self, codec: &C) -> Result<T, ProtocolError>
    where
        T: serde::de::DeserializeOwned,
        C: crate::Codec,
    {
        codec.decode(&self.data)
    }
}

// =========================================================================
// Tests
// =========================================================================
