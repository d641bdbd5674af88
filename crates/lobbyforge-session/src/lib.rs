//! Session lifecycle management for Lobbyforge.
//!
//! This crate turns a callback-driven matchmaking backend into a session
//! object with a clear lifecycle:
//!
//! 1. **Establishing**: [`SessionFactory`] creates or joins a session and
//!    waits (bounded) for the backend's callback
//! 2. **Ownership**: the handle snapshots the owner once and publishes
//!    `Name`/`Guid` metadata when the local member owns it
//! 3. **Relaying**: backend chat notices become [`SessionEvent`]s
//! 4. **Cleanup**: [`Session::close`] leaves exactly once, backed up by
//!    [`ShutdownHooks`] and `Drop`
//!
//! # How it fits in the stack
//!
//! ```text
//! Application (above)  <- consumes SessionEvents, calls send_message
//!     ↕
//! Session Layer (this crate)  <- lifecycle, ownership, relay
//!     ↕
//! Backend Layer (below)  <- MatchmakingBackend, IdentityProvider
//! ```

mod config;
mod error;
mod event;
mod factory;
mod hooks;
mod registry;
mod relay;
mod session;
mod state;

pub use config::{CreateConfig, FactoryConfig, RelayScope};
pub use error::SessionError;
pub use event::{SessionEvent, SessionEvents};
pub use factory::SessionFactory;
pub use hooks::{HookId, ShutdownHooks};
pub use registry::{LiveSession, SessionRegistry};
pub use session::Session;
pub use state::SessionState;
