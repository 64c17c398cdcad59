//! Session: the one place the client reads the current identity from.
//!
//! Built once at startup from the active provider and passed down by
//! reference (or cheap clone). Consumers either read `current_identity()` at
//! the moment they need it or hold a `watch()` receiver to be notified of
//! changes; nothing keeps its own copy of the identity. Dropping the last
//! clone releases the provider subscription.

use std::sync::Arc;

use tokio::sync::watch;

use super::{AuthError, AuthProvider};
use crate::models::Identity;

#[derive(Clone)]
pub struct Session {
    provider: Arc<dyn AuthProvider>,
    identity: watch::Receiver<Option<Identity>>,
}

impl Session {
    pub fn new(provider: Arc<dyn AuthProvider>) -> Self {
        let identity = provider.identity_changes();
        Self { provider, identity }
    }

    /// Identity at this instant, or `None` when signed out.
    pub fn current_identity(&self) -> Option<Identity> {
        self.identity.borrow().clone()
    }

    pub fn is_signed_in(&self) -> bool {
        self.identity.borrow().is_some()
    }

    /// Receiver notified on every sign-in, sign-out and session expiry.
    pub fn watch(&self) -> watch::Receiver<Option<Identity>> {
        self.identity.clone()
    }

    pub async fn sign_in(&self) -> Result<Identity, AuthError> {
        self.provider.sign_in().await.map_err(|e| {
            tracing::error!("Sign in error: {}", e);
            e
        })
    }

    pub async fn sign_out(&self) -> Result<(), AuthError> {
        self.provider.sign_out().await.map_err(|e| {
            tracing::error!("Sign out error: {}", e);
            e
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::local::LocalAuth;

    fn alice() -> Identity {
        Identity {
            uid: "u1".to_string(),
            display_name: Some("Alice".to_string()),
            email: Some("a@x.com".to_string()),
            photo_url: Some("p".to_string()),
        }
    }

    #[tokio::test]
    async fn test_session_follows_provider() {
        let session = Session::new(Arc::new(LocalAuth::new(alice(), false)));
        let mut changes = session.watch();
        assert!(session.current_identity().is_none());

        session.sign_in().await.unwrap();
        changes.changed().await.unwrap();
        assert_eq!(session.current_identity(), Some(alice()));
        assert!(session.is_signed_in());

        session.sign_out().await.unwrap();
        changes.changed().await.unwrap();
        assert!(changes.borrow().is_none());
        assert!(session.current_identity().is_none());
    }

    #[tokio::test]
    async fn test_clones_share_identity() {
        let session = Session::new(Arc::new(LocalAuth::new(alice(), true)));
        let other = session.clone();
        assert_eq!(other.current_identity().map(|i| i.uid), Some("u1".to_string()));

        session.sign_out().await.unwrap();
        assert!(other.current_identity().is_none());
    }
}
