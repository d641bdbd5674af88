//! Shared vocabulary for Lobbyforge.
//!
//! This crate defines the values every other layer speaks in:
//!
//! - **Identifiers** ([`SessionId`], [`MemberId`], [`LocalIdentity`])
//! - **Session settings** ([`Visibility`], [`metadata`] keys)
//! - **Chat traffic** ([`MessageNotice`], [`ChatEntry`], [`EntryKind`])
//! - **Codecs** ([`Codec`] trait, [`JsonCodec`]) for typed payloads
//! - **Errors** ([`ProtocolError`])
//!
//! # Architecture
//!
//! ```text
//! Backend (capability traits) → Protocol (values) ← Session (lifecycle)
//! ```
//!
//! The protocol crate has no I/O and no async code. It is the one crate
//! both the backend and the session layers depend on.

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    ChatEntry, EntryKind, LocalIdentity, MemberId, MessageNotice, SessionId,
    Visibility, metadata,
};
