//! # Lobbyforge
//!
//! Session lifecycle management for peer matchmaking backends.
//!
//! Lobbyforge wraps a callback-driven matchmaking service behind a
//! [`SessionFactory`](prelude::SessionFactory). You hand it a backend and an
//! identity provider, and get back [`Session`](prelude::Session) handles
//! that know who owns them, relay chat as events, and always leave the
//! backend session when they go away.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use lobbyforge::prelude::*;
//!
//! # async fn run() -> Result<(), LobbyforgeError> {
//! let backend = Arc::new(LoopbackBackend::standalone(MemberId(1), "ana"));
//! let factory = SessionFactory::new(
//!     Arc::clone(&backend),
//!     Arc::clone(&backend),
//!     FactoryConfig::default(),
//! );
//!
//! let mut session = factory.create_session(CreateConfig::default()).await?;
//! let mut events = session.take_events().expect("events are taken once");
//! while let Some(event) = events.recv().await {
//!     println!("{event:?}");
//! }
//! session.close()?;
//! # Ok(())
//! # }
//! ```

mod error;
pub mod logging;
pub mod shutdown;

pub use error::LobbyforgeError;
pub use lobbyforge_backend as backend;
pub use lobbyforge_protocol as protocol;
pub use lobbyforge_session as session;

/// The types most applications need.
pub mod prelude {
    pub use crate::LobbyforgeError;
    pub use lobbyforge_backend::{
        BackendError, Completion, IdentityProvider, LoopbackBackend,
        LoopbackNetwork, MatchmakingBackend,
    };
    pub use lobbyforge_protocol::{
        ChatEntry, Codec, EntryKind, JsonCodec, LocalIdentity, MemberId,
        SessionId, Visibility,
    };
    pub use lobbyforge_session::{
        CreateConfig, FactoryConfig, RelayScope, Session, SessionError,
        SessionEvent, SessionEvents, SessionFactory, SessionState,
        ShutdownHooks,
    };
}
