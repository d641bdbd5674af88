//! Error types for the protocol layer.
//!
//! Each Lobbyforge crate defines its own error enum, so a `ProtocolError`
//! always means "a value couldn't be converted", never a backend or
//! lifecycle problem.

/// Errors that can occur while converting protocol values.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serializing a payload failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserializing a payload failed: malformed bytes, missing fields,
    /// or a payload of a different type than expected.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// A textual identifier couldn't be parsed.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),
}
