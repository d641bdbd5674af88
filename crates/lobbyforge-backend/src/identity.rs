//! Local identity hook.
//!
//! Lobbyforge doesn't know who the local user is. That belongs to the
//! platform (a game launcher, an account service, a config file). The
//! [`IdentityProvider`] trait is the seam: one method that answers "who am
//! I?", consulted once per session at construction time to decide
//! ownership.

use lobbyforge_protocol::LocalIdentity;

use crate::BackendError;

/// Resolves the local member's identity.
///
/// # Example
///
/// ```rust
/// use lobbyforge_backend::{BackendError, IdentityProvider};
/// use lobbyforge_protocol::{LocalIdentity, MemberId};
///
/// /// A fixed identity read from configuration.
/// struct StaticIdentity(LocalIdentity);
///
/// impl IdentityProvider for StaticIdentity {
///     fn local_identity(&self) -> Result<LocalIdentity, BackendError> {
///         Ok(self.0.clone())
///     }
/// }
///
/// let me = StaticIdentity(LocalIdentity {
///     id: MemberId(76561198000000001),
///     display_name: "ferris".into(),
/// });
/// assert_eq!(me.local_identity().unwrap().display_name, "ferris");
/// ```
pub trait IdentityProvider: Send + Sync + 'static {
    /// Returns the local member's id and display name.
    ///
    /// # Errors
    /// Returns [`BackendError::Unavailable`] if the identity can't be
    /// resolved (platform not signed in, service unreachable).
    fn local_identity(&self) -> Result<LocalIdentity, BackendError>;
}
