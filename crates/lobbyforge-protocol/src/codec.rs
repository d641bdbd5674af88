//! Codecs for typed chat payloads.
//!
//! The backend only moves opaque bytes between members. Applications
//! usually want to send structured values instead ("player ready", "map
//! selected"), so this module defines a [`Codec`] trait that turns a typed
//! value into payload bytes and back. The session layer stays agnostic:
//! `Session::send_encoded` and [`ChatEntry::decode`](crate::ChatEntry::decode)
//! accept any codec.
//!
//! [`JsonCodec`] is the provided implementation. It is human-readable,
//! which makes chat traffic easy to inspect while debugging.

use serde::{de::DeserializeOwned, Serialize};

use crate::ProtocolError;

/// Encodes typed values into payload bytes and decodes them back.
///
/// `Send + Sync + 'static` lets a single codec value be shared by every
/// session in the process, including across spawned tasks.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into payload bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if the value can't be represented
    /// in this format.
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes payload bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed or
    /// don't match the expected type. Payloads come from other members,
    /// so this should be treated as untrusted input.
    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] backed by `serde_json`.
///
/// Behind the `json` feature flag (enabled by default).
///
/// ## Example
///
/// ```rust
/// use lobbyforge_protocol::{Codec, JsonCodec, Visibility};
///
/// let codec = JsonCodec;
/// let bytes = codec.encode(&Visibility::FriendsOnly).unwrap();
/// assert_eq!(bytes, b"\"friends_only\"");
///
/// let decoded: Visibility = codec.decode(&bytes).unwrap();
/// assert_eq!(decoded, Visibility::FriendsOnly);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
