//! Session configuration.

use std::time::Duration;

use lobbyforge_protocol::Visibility;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// CreateConfig
// ---------------------------------------------------------------------------

/// Settings for a new session, passed to
/// [`SessionFactory::create_session`](crate::SessionFactory::create_session).
///
/// `CreateConfig::default()` gives a public session for up to 8 members.
/// Override just the fields you care about:
///
/// ```rust
/// use lobbyforge_protocol::Visibility;
/// use lobbyforge_session::CreateConfig;
///
/// let config = CreateConfig {
///     visibility: Visibility::FriendsOnly,
///     ..CreateConfig::default()
/// };
/// assert_eq!(config.max_members, 8);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreateConfig {
    /// Who can discover and join the session.
    pub visibility: Visibility,

    /// Maximum number of members, including the owner. Must be at least 1.
    pub max_members: u32,
}

impl Default for CreateConfig {
    fn default() -> Self {
        Self {
            visibility: Visibility::Public,
            max_members: 8,
        }
    }
}

// ---------------------------------------------------------------------------
// RelayScope
// ---------------------------------------------------------------------------

/// Which backend notices a session's relay forwards.
///
/// The backend's chat stream isn't scoped to a session: every subscriber
/// sees traffic from every session the local member belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayScope {
    /// Forward only notices for the handle's own session. Correct when
    /// several sessions are live in one process.
    #[default]
    PerSession,

    /// Forward every notice regardless of its session. Only sound while
    /// at most one session is live per process.
    Global,
}

// ---------------------------------------------------------------------------
// FactoryConfig
// ---------------------------------------------------------------------------

/// Configuration for a [`SessionFactory`](crate::SessionFactory).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FactoryConfig {
    /// How long create/join wait for the backend callback before failing
    /// with `CallbackNeverFires`.
    ///
    /// Default: 10 seconds.
    pub handshake_timeout: Duration,

    /// Application identifier the owner publishes under the `Guid`
    /// metadata key. Other members compare it to recognize compatible
    /// sessions.
    pub app_guid: String,

    /// Which notices each session relays.
    pub relay_scope: RelayScope,

    /// How many undelivered events a session holds for its consumer.
    /// Further events are dropped until the consumer catches up.
    ///
    /// Default: 256. Must be at least 1.
    pub event_capacity: usize,
}

impl FactoryConfig {
    /// Sets the create/join callback timeout.
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Sets the application identifier.
    pub fn with_app_guid(mut self, guid: impl Into<String>) -> Self {
        self.app_guid = guid.into();
        self
    }

    /// Sets the relay scope.
    pub fn with_relay_scope(mut self, scope: RelayScope) -> Self {
        self.relay_scope = scope;
        self
    }

    /// Sets the per-session event buffer size.
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }
}

impl Default for FactoryConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(10),
            app_guid: "lobbyforge/1".to_string(),
            relay_scope: RelayScope::PerSession,
            event_capacity: 256,
        }
    }
}
