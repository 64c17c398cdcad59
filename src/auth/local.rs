//! Offline identity provider: signs in one configured identity.

use futures::future::{BoxFuture, FutureExt};
use tokio::sync::watch;

use super::{AuthError, AuthProvider};
use crate::models::Identity;

pub struct LocalAuth {
    identity: Identity,
    current: watch::Sender<Option<Identity>>,
}

impl LocalAuth {
    pub fn new(identity: Identity, signed_in: bool) -> Self {
        let (current, _) = watch::channel(signed_in.then(|| identity.clone()));
        Self { identity, current }
    }
}

impl AuthProvider for LocalAuth {
    fn identity_changes(&self) -> watch::Receiver<Option<Identity>> {
        self.current.subscribe()
    }

    fn sign_in(&self) -> BoxFuture<'_, Result<Identity, AuthError>> {
        async move {
            self.current.send_replace(Some(self.identity.clone()));
            tracing::info!("Signed in locally as {}", self.identity.label());
            Ok(self.identity.clone())
        }
        .boxed()
    }

    fn sign_out(&self) -> BoxFuture<'_, Result<(), AuthError>> {
        async move {
            self.current.send_replace(None);
            tracing::info!("Signed out");
            Ok(())
        }
        .boxed()
    }
}
